/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! Register windows.
//!
//! A window is a block of 32-bit registers addressed by word index. The real one maps a
//! page of physical memory through `/dev/mem` or `/dev/gpiomem`, tests substitute an
//! array-backed fake. Drivers never touch raw pointers, they build a [`Reg`] over a
//! window and use the `tock-registers` interfaces on it.

use {
    core::{fmt, marker::PhantomData, ptr::NonNull},
    std::{fs::File, io, sync::Arc},
    tock_registers::{
        interfaces::{Readable, Writeable},
        RegisterLongName,
    },
};

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

/// A block of 32-bit registers addressed by word index.
pub trait RegisterWindow: Send + Sync {
    /// Volatile read of the word at `index`.
    fn read(&self, index: usize) -> u32;

    /// Volatile write of the word at `index`.
    fn write(&self, index: usize, value: u32);

    /// Physical address the window was mapped from, 0 if it has none.
    fn physical_base(&self) -> u64 {
        0
    }
}

/// One register of a window, typed by its bitfield description.
///
/// Allows writing
/// ```ignore
/// Reg::<CM_CTL::Register>::new(window, CM_PWMCTL).modify(CM_CTL::ENAB::SET);
/// ```
/// instead of shifting and masking by hand.
pub struct Reg<'a, R: RegisterLongName = ()> {
    window: &'a dyn RegisterWindow,
    index: usize,
    associated_register: PhantomData<R>,
}

/// A page of physical memory mapped into the process.
pub struct MappedWindow {
    base: NonNull<u32>,
    len: usize,
    physical: u64,
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl<T: RegisterWindow + ?Sized> RegisterWindow for Arc<T> {
    fn read(&self, index: usize) -> u32 {
        (**self).read(index)
    }

    fn write(&self, index: usize, value: u32) {
        (**self).write(index, value)
    }

    fn physical_base(&self) -> u64 {
        (**self).physical_base()
    }
}

impl<T: RegisterWindow + ?Sized> RegisterWindow for Box<T> {
    fn read(&self, index: usize) -> u32 {
        (**self).read(index)
    }

    fn write(&self, index: usize, value: u32) {
        (**self).write(index, value)
    }

    fn physical_base(&self) -> u64 {
        (**self).physical_base()
    }
}

impl<'a, R: RegisterLongName> Reg<'a, R> {
    pub fn new(window: &'a dyn RegisterWindow, index: usize) -> Self {
        Self {
            window,
            index,
            associated_register: PhantomData,
        }
    }
}

impl<R: RegisterLongName> Readable for Reg<'_, R> {
    type T = u32;
    type R = R;

    fn get(&self) -> u32 {
        self.window.read(self.index)
    }
}

impl<R: RegisterLongName> Writeable for Reg<'_, R> {
    type T = u32;
    type R = R;

    fn set(&self, value: u32) {
        self.window.write(self.index, value)
    }
}

impl MappedWindow {
    /// Map `len` bytes of `file` starting at `offset`; `physical` tags the window with the
    /// ARM physical address it corresponds to.
    pub fn map(file: &File, offset: u64, len: usize, physical: u64) -> io::Result<Self> {
        let base = sys::map(file, offset, len)?;
        Ok(Self {
            base,
            len,
            physical,
        })
    }

    /// Number of 32-bit words in the window.
    pub fn words(&self) -> usize {
        self.len / 4
    }
}

// The mapping is plain device memory shared by all threads, accesses are single volatile words.
unsafe impl Send for MappedWindow {}
unsafe impl Sync for MappedWindow {}

impl RegisterWindow for MappedWindow {
    fn read(&self, index: usize) -> u32 {
        assert!(index < self.words(), "register index {index} outside window");
        unsafe { self.base.as_ptr().add(index).read_volatile() }
    }

    fn write(&self, index: usize, value: u32) {
        assert!(index < self.words(), "register index {index} outside window");
        unsafe { self.base.as_ptr().add(index).write_volatile(value) }
    }

    fn physical_base(&self) -> u64 {
        self.physical
    }
}

impl Drop for MappedWindow {
    fn drop(&mut self) {
        sys::unmap(self.base, self.len);
    }
}

impl fmt::Debug for MappedWindow {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "MappedWindow {{ physical: {:#x}, len: {:#x} }}",
            self.physical, self.len
        )
    }
}

//--------------------------------------------------------------------------------------------------
// OS Interface Code
//--------------------------------------------------------------------------------------------------

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod sys {
            use {
                core::ptr::{self, NonNull},
                std::{fs::File, io, os::fd::AsRawFd},
            };

            pub fn map(file: &File, offset: u64, len: usize) -> io::Result<NonNull<u32>> {
                let offset = libc::off_t::try_from(offset)
                    .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
                let addr = unsafe {
                    libc::mmap(
                        ptr::null_mut(),
                        len,
                        libc::PROT_READ | libc::PROT_WRITE,
                        libc::MAP_SHARED,
                        file.as_raw_fd(),
                        offset,
                    )
                };
                if addr == libc::MAP_FAILED {
                    return Err(io::Error::last_os_error());
                }
                NonNull::new(addr.cast::<u32>())
                    .ok_or_else(|| io::Error::from(io::ErrorKind::AddrNotAvailable))
            }

            pub fn unmap(base: NonNull<u32>, len: usize) {
                unsafe {
                    libc::munmap(base.as_ptr().cast(), len);
                }
            }
        }
    } else {
        mod sys {
            use {
                core::ptr::NonNull,
                std::{fs::File, io},
            };

            pub fn map(_file: &File, _offset: u64, _len: usize) -> io::Result<NonNull<u32>> {
                Err(io::Error::from(io::ErrorKind::Unsupported))
            }

            pub fn unmap(_base: NonNull<u32>, _len: usize) {}
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
pub(crate) use fake::{Access, FakeWindow};

#[cfg(test)]
mod fake {
    use {
        super::RegisterWindow,
        parking_lot::Mutex,
        std::time::{Duration, Instant},
    };

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Access {
        Read(usize, u32),
        Write(usize, u32),
    }

    type WriteHook = Box<dyn Fn(&mut [u32], usize, u32) + Send + Sync>;

    /// Array-backed window that records every access with a timestamp.
    pub struct FakeWindow {
        words: Mutex<Vec<u32>>,
        log: Mutex<Vec<(Access, Instant)>>,
        on_write: Option<WriteHook>,
    }

    impl FakeWindow {
        pub fn new(words: usize) -> Self {
            Self {
                words: Mutex::new(vec![0; words]),
                log: Mutex::new(Vec::new()),
                on_write: None,
            }
        }

        /// Run `hook` after every write, with the backing words already updated.
        pub fn with_hook(
            words: usize,
            hook: impl Fn(&mut [u32], usize, u32) + Send + Sync + 'static,
        ) -> Self {
            Self {
                on_write: Some(Box::new(hook)),
                ..Self::new(words)
            }
        }

        /// Set a word without logging an access.
        pub fn poke(&self, index: usize, value: u32) {
            self.words.lock()[index] = value;
        }

        /// Inspect a word without logging an access.
        pub fn peek(&self, index: usize) -> u32 {
            self.words.lock()[index]
        }

        pub fn accesses(&self) -> Vec<Access> {
            self.log.lock().iter().map(|(access, _)| *access).collect()
        }

        pub fn writes(&self) -> Vec<(usize, u32)> {
            self.log
                .lock()
                .iter()
                .filter_map(|(access, _)| match access {
                    Access::Write(index, value) => Some((*index, *value)),
                    Access::Read(..) => None,
                })
                .collect()
        }

        /// Time between consecutive writes.
        pub fn write_gaps(&self) -> Vec<Duration> {
            let log = self.log.lock();
            let stamps: Vec<Instant> = log
                .iter()
                .filter(|(access, _)| matches!(access, Access::Write(..)))
                .map(|(_, at)| *at)
                .collect();
            stamps.windows(2).map(|w| w[1] - w[0]).collect()
        }

        pub fn access_count(&self) -> usize {
            self.log.lock().len()
        }

        pub fn clear_log(&self) {
            self.log.lock().clear();
        }
    }

    impl RegisterWindow for FakeWindow {
        fn read(&self, index: usize) -> u32 {
            let value = self.words.lock()[index];
            self.log.lock().push((Access::Read(index, value), Instant::now()));
            value
        }

        fn write(&self, index: usize, value: u32) {
            let mut words = self.words.lock();
            words[index] = value;
            if let Some(hook) = &self.on_write {
                hook(&mut words, index, value);
            }
            drop(words);
            self.log.lock().push((Access::Write(index, value), Instant::now()));
        }
    }
}
