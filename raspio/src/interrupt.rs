/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! Edge interrupts through the GPIO character device.
//!
//! The chip (`/dev/gpiochip0`) is opened once. Each requested line yields an [`EventHandle`]
//! whose [`wait`](EventHandle::wait) blocks until an edge arrives, the timeout expires or the
//! handle is cancelled. Cancelling wakes a blocked waiter, closes the line descriptor and can
//! be repeated safely.

use {
    bitflags::bitflags,
    core::{fmt, time::Duration},
    log::{debug, warn},
    parking_lot::RwLock,
    snafu::{ResultExt, Snafu},
    std::{
        fs::{File, OpenOptions},
        io,
        os::fd::OwnedFd,
        path::{Path, PathBuf},
        sync::Arc,
        thread::{self, JoinHandle},
    },
};

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum InterruptError {
    #[snafu(display("cannot open {}", path.display()))]
    OpenChip { path: PathBuf, source: io::Error },
    #[snafu(display("cannot request edge events on line {line}"))]
    RequestLine { line: u8, source: io::Error },
    #[snafu(display("cannot create the wake-up descriptor"))]
    WakeUp { source: io::Error },
    #[snafu(display("waiting for an edge on line {line} failed"))]
    Wait { line: u8, source: io::Error },
    #[snafu(display("cannot start the interrupt thread for line {line}"))]
    Spawn { line: u8, source: io::Error },
    #[snafu(display("pin {pin} is not an onboard GPIO"))]
    NotOnboard { pin: u32 },
}

pub type Result<T> = ::core::result::Result<T, InterruptError>;

bitflags! {
    /// Edges a line reports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EventFlags: u32 {
        const RISING_EDGE = 1 << 0;
        const FALLING_EDGE = 1 << 1;
        const BOTH_EDGES = Self::RISING_EDGE.bits() | Self::FALLING_EDGE.bits();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
    Both,
}

/// One edge reported by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// Kernel timestamp in nanoseconds.
    pub timestamp: u64,
    pub edge: Edge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Event(Event),
    Timeout,
    Cancelled,
}

/// The GPIO character device.
pub struct Chip {
    file: File,
    path: PathBuf,
}

/// Edge events of one line.
pub struct EventHandle {
    line: u8,
    events: RwLock<Option<OwnedFd>>,
    wake: OwnedFd,
}

/// A thread running a callback for every edge of one line.
pub struct InterruptThread {
    handle: Arc<EventHandle>,
    thread: Option<JoinHandle<()>>,
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl Edge {
    pub const fn flags(self) -> EventFlags {
        match self {
            Edge::Rising => EventFlags::RISING_EDGE,
            Edge::Falling => EventFlags::FALLING_EDGE,
            Edge::Both => EventFlags::BOTH_EDGES,
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Edge::Rising => "rising",
            Edge::Falling => "falling",
            Edge::Both => "both",
        })
    }
}

impl Chip {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .context(OpenChipSnafu { path })?;
        debug!("opened {}", path.display());
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start edge reporting on a native line.
    pub fn request(&self, line: u8, edge: Edge) -> Result<EventHandle> {
        let events = sys::request_line_events(&self.file, line, edge.flags())
            .context(RequestLineSnafu { line })?;
        debug!("line {line}: {edge} edge events requested");
        EventHandle::new(line, events)
    }
}

impl EventHandle {
    pub(crate) fn new(line: u8, events: OwnedFd) -> Result<Self> {
        Ok(Self {
            line,
            events: RwLock::new(Some(events)),
            wake: sys::event_fd().context(WakeUpSnafu)?,
        })
    }

    pub fn line(&self) -> u8 {
        self.line
    }

    pub fn is_cancelled(&self) -> bool {
        self.events.read().is_none()
    }

    /// Block until an edge arrives, `timeout` passes, or the handle is cancelled.
    /// `None` waits forever.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<WaitOutcome> {
        let events = self.events.read();
        let Some(fd) = events.as_ref() else {
            return Ok(WaitOutcome::Cancelled);
        };
        let line = self.line;
        match sys::poll_two(fd, &self.wake, timeout).context(WaitSnafu { line })? {
            sys::Ready::Timeout => Ok(WaitOutcome::Timeout),
            sys::Ready::Second => Ok(WaitOutcome::Cancelled),
            sys::Ready::First => {
                let (timestamp, id) = sys::read_event(fd).context(WaitSnafu { line })?;
                let edge = match id {
                    1 => Edge::Rising,
                    2 => Edge::Falling,
                    _ => Edge::Both,
                };
                Ok(WaitOutcome::Event(Event { timestamp, edge }))
            }
        }
    }

    /// Wake any waiter and release the line. Further calls do nothing.
    pub fn cancel(&self) {
        if let Err(err) = sys::signal(&self.wake) {
            warn!("line {}: cannot wake the waiter: {err}", self.line);
        }
        if self.events.write().take().is_some() {
            debug!("line {}: events released", self.line);
        }
    }
}

impl fmt::Debug for EventHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EventHandle")
            .field("line", &self.line)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl InterruptThread {
    /// Run `callback` on its own thread for every edge of `handle`.
    pub fn spawn(handle: EventHandle, mut callback: impl FnMut(Event) + Send + 'static) -> Result<Self> {
        let line = handle.line();
        let handle = Arc::new(handle);
        let waiter = handle.clone();
        let thread = thread::Builder::new()
            .name(format!("raspio-irq-{line}"))
            .spawn(move || loop {
                match waiter.wait(None) {
                    Ok(WaitOutcome::Event(event)) => callback(event),
                    Ok(WaitOutcome::Timeout) => continue,
                    Ok(WaitOutcome::Cancelled) => break,
                    Err(err) => {
                        warn!("{err}, interrupt thread stops");
                        break;
                    }
                }
            })
            .context(SpawnSnafu { line })?;
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> &EventHandle {
        &self.handle
    }

    /// Cancel the line and wait for the thread to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.handle.cancel();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("interrupt callback for line {} panicked", self.handle.line());
            }
        }
    }
}

impl Drop for InterruptThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

//--------------------------------------------------------------------------------------------------
// Private Code
//--------------------------------------------------------------------------------------------------

/// Poll timeout in milliseconds, rounded up so a wait never ends before `timeout` has passed.
/// `None` waits forever.
fn poll_timeout_ms(timeout: Option<Duration>) -> i32 {
    timeout.map_or(-1, |t| {
        t.as_nanos().div_ceil(1_000_000).min(i32::MAX as u128) as i32
    })
}

//--------------------------------------------------------------------------------------------------
// OS Interface Code
//--------------------------------------------------------------------------------------------------

mod sys {
    use {
        super::EventFlags,
        core::time::Duration,
        std::{fs::File, io, os::fd::OwnedFd},
    };

    pub enum Ready {
        First,
        Second,
        Timeout,
    }

    cfg_if::cfg_if! {
        if #[cfg(target_os = "linux")] {
            use {
                static_assertions::const_assert_eq,
                std::os::fd::{AsRawFd, FromRawFd},
            };

            /// `struct gpioevent_request` of the v1 character device ABI.
            #[repr(C)]
            struct EventRequest {
                line_offset: u32,
                handle_flags: u32,
                event_flags: u32,
                consumer_label: [u8; 32],
                fd: libc::c_int,
            }

            /// `struct gpioevent_data`.
            #[repr(C)]
            #[derive(Default)]
            struct EventData {
                timestamp: u64,
                id: u32,
            }

            const_assert_eq!(core::mem::size_of::<EventRequest>(), 48);
            const_assert_eq!(core::mem::size_of::<EventData>(), 16);

            /// `_IOWR(0xB4, 0x04, struct gpioevent_request)`
            const GPIO_GET_LINEEVENT_IOCTL: u32 = 0xc030_b404;
            const GPIOHANDLE_REQUEST_INPUT: u32 = 1 << 0;
            const CONSUMER: &[u8] = b"raspio";

            pub fn request_line_events(chip: &File, line: u8, edges: EventFlags) -> io::Result<OwnedFd> {
                let mut request = EventRequest {
                    line_offset: line.into(),
                    handle_flags: GPIOHANDLE_REQUEST_INPUT,
                    event_flags: edges.bits(),
                    consumer_label: [0; 32],
                    fd: -1,
                };
                request.consumer_label[..CONSUMER.len()].copy_from_slice(CONSUMER);
                let rc = unsafe {
                    libc::ioctl(
                        chip.as_raw_fd(),
                        GPIO_GET_LINEEVENT_IOCTL as _,
                        &mut request as *mut EventRequest,
                    )
                };
                if rc < 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(unsafe { OwnedFd::from_raw_fd(request.fd) })
            }

            pub fn event_fd() -> io::Result<OwnedFd> {
                let fd = unsafe { libc::eventfd(0, libc::EFD_CLOEXEC | libc::EFD_NONBLOCK) };
                if fd < 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(unsafe { OwnedFd::from_raw_fd(fd) })
            }

            pub fn signal(wake: &OwnedFd) -> io::Result<()> {
                let one: u64 = 1;
                let rc = unsafe {
                    libc::write(wake.as_raw_fd(), (&one as *const u64).cast(), 8)
                };
                if rc < 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            }

            pub fn poll_two(first: &OwnedFd, second: &OwnedFd, timeout: Option<Duration>) -> io::Result<Ready> {
                let timeout: libc::c_int = super::poll_timeout_ms(timeout);
                let mut fds = [
                    libc::pollfd { fd: first.as_raw_fd(), events: libc::POLLIN | libc::POLLPRI, revents: 0 },
                    libc::pollfd { fd: second.as_raw_fd(), events: libc::POLLIN, revents: 0 },
                ];
                loop {
                    let rc = unsafe { libc::poll(fds.as_mut_ptr(), 2, timeout) };
                    if rc < 0 {
                        let err = io::Error::last_os_error();
                        if err.kind() == io::ErrorKind::Interrupted {
                            continue;
                        }
                        return Err(err);
                    }
                    return Ok(if fds[1].revents != 0 {
                        Ready::Second
                    } else if fds[0].revents != 0 {
                        Ready::First
                    } else {
                        Ready::Timeout
                    });
                }
            }

            pub fn read_event(fd: &OwnedFd) -> io::Result<(u64, u32)> {
                let mut data = EventData::default();
                let size = core::mem::size_of::<EventData>();
                let rc = unsafe {
                    libc::read(fd.as_raw_fd(), (&mut data as *mut EventData).cast(), size)
                };
                if rc < 0 {
                    return Err(io::Error::last_os_error());
                }
                if rc as usize != size {
                    return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
                }
                Ok((data.timestamp, data.id))
            }
        } else {
            fn unsupported<T>() -> io::Result<T> {
                Err(io::Error::from(io::ErrorKind::Unsupported))
            }

            pub fn request_line_events(_chip: &File, _line: u8, _edges: EventFlags) -> io::Result<OwnedFd> {
                unsupported()
            }

            pub fn event_fd() -> io::Result<OwnedFd> {
                unsupported()
            }

            pub fn signal(_wake: &OwnedFd) -> io::Result<()> {
                unsupported()
            }

            pub fn poll_two(_first: &OwnedFd, _second: &OwnedFd, _timeout: Option<Duration>) -> io::Result<Ready> {
                unsupported()
            }

            pub fn read_event(_fd: &OwnedFd) -> io::Result<(u64, u32)> {
                unsupported()
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use {
        super::*,
        std::{
            io::Write,
            os::fd::FromRawFd,
            sync::mpsc,
            time::Instant,
        },
    };

    /// A pipe standing in for a line event descriptor: (read end, write end).
    fn pipe() -> (OwnedFd, File) {
        let mut fds = [0; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        unsafe { (OwnedFd::from_raw_fd(fds[0]), File::from_raw_fd(fds[1])) }
    }

    fn event_bytes(timestamp: u64, id: u32) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&timestamp.to_ne_bytes());
        bytes[8..12].copy_from_slice(&id.to_ne_bytes());
        bytes
    }

    #[test]
    fn edge_flags() {
        assert_eq!(Edge::Rising.flags().bits(), 1);
        assert_eq!(Edge::Falling.flags().bits(), 2);
        assert_eq!(Edge::Both.flags(), EventFlags::RISING_EDGE | EventFlags::FALLING_EDGE);
    }

    #[test]
    fn wait_reports_events_and_timeouts() {
        let (read, mut write) = pipe();
        let handle = EventHandle::new(17, read).unwrap();

        assert_eq!(
            handle.wait(Some(Duration::from_millis(10))).unwrap(),
            WaitOutcome::Timeout
        );

        write.write_all(&event_bytes(123_456, 2)).unwrap();
        assert_eq!(
            handle.wait(Some(Duration::from_millis(100))).unwrap(),
            WaitOutcome::Event(Event {
                timestamp: 123_456,
                edge: Edge::Falling
            })
        );
    }

    #[test]
    fn poll_timeout_rounds_up() {
        assert_eq!(poll_timeout_ms(None), -1);
        assert_eq!(poll_timeout_ms(Some(Duration::ZERO)), 0);
        assert_eq!(poll_timeout_ms(Some(Duration::from_micros(900))), 1);
        assert_eq!(poll_timeout_ms(Some(Duration::from_micros(2_001))), 3);
        assert_eq!(poll_timeout_ms(Some(Duration::from_millis(10))), 10);
        assert_eq!(poll_timeout_ms(Some(Duration::from_secs(u64::MAX))), i32::MAX);
    }

    #[test]
    fn submillisecond_wait_lasts_the_whole_timeout() {
        let (read, _write) = pipe();
        let handle = EventHandle::new(6, read).unwrap();
        let timeout = Duration::from_micros(900);
        let start = Instant::now();
        assert_eq!(handle.wait(Some(timeout)).unwrap(), WaitOutcome::Timeout);
        assert!(start.elapsed() >= timeout, "returned after {:?}", start.elapsed());
    }

    #[test]
    fn cancel_twice_is_harmless() {
        let (read, _write) = pipe();
        let handle = EventHandle::new(4, read).unwrap();
        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
        assert_eq!(handle.wait(None).unwrap(), WaitOutcome::Cancelled);
    }

    #[test]
    fn cancel_wakes_a_blocked_waiter() {
        let (read, _write) = pipe();
        let handle = Arc::new(EventHandle::new(5, read).unwrap());
        let waiter = handle.clone();
        let (done, finished) = mpsc::channel();
        let thread = thread::spawn(move || {
            done.send(waiter.wait(None).unwrap()).unwrap();
        });

        thread::sleep(Duration::from_millis(20));
        let start = Instant::now();
        handle.cancel();
        assert_eq!(
            finished.recv_timeout(Duration::from_secs(5)).unwrap(),
            WaitOutcome::Cancelled
        );
        assert!(start.elapsed() < Duration::from_secs(5));
        thread.join().unwrap();
        assert!(handle.is_cancelled());
    }

    #[test]
    fn interrupt_thread_runs_callback_until_stopped() {
        let (read, mut write) = pipe();
        let handle = EventHandle::new(22, read).unwrap();
        let (tx, rx) = mpsc::channel();
        let worker = InterruptThread::spawn(handle, move |event| {
            let _ = tx.send(event);
        })
        .unwrap();

        write.write_all(&event_bytes(1, 1)).unwrap();
        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(event.edge, Edge::Rising);

        worker.stop();
    }
}
