/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! Peripheral register windows.
//!
//! Opens `/dev/mem`, or the restricted GPIO-only device when that is not available, and maps
//! the blocks the board's SoC generation needs. The windows live as long as the [`Windows`]
//! value; dropping it unmaps them.

use {
    crate::{
        board::{BoardClassification, Soc},
        config::{Config, DevicePreference},
        geometry::timer,
        mmio::{MappedWindow, RegisterWindow},
    },
    core::fmt,
    log::{debug, info, warn},
    snafu::{ResultExt, Snafu},
    std::{
        fs::{File, OpenOptions},
        io,
        os::unix::fs::OpenOptionsExt,
        path::{Path, PathBuf},
    },
};

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum MapError {
    #[snafu(display("cannot open {}", path.display()))]
    Open { path: PathBuf, source: io::Error },
    #[snafu(display("cannot map the {block} block at {address:#x}"))]
    Map {
        block: &'static str,
        address: u64,
        source: io::Error,
    },
}

pub type Result<T> = ::core::result::Result<T, MapError>;

/// How much of the peripheral space is reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// `/dev/mem`: every block.
    Full,
    /// `/dev/gpiomem*`: GPIO only (plus RIO and pads on RP1).
    Restricted,
}

/// The mapped register blocks. Blocks the SoC lacks or the device does not expose are `None`.
pub struct Windows {
    pub access: Access,
    pub gpio: Box<dyn RegisterWindow>,
    pub pwm: Option<Box<dyn RegisterWindow>>,
    pub clock: Option<Box<dyn RegisterWindow>>,
    pub pads: Option<Box<dyn RegisterWindow>>,
    pub timer: Option<Box<dyn RegisterWindow>>,
    /// RP1 registered I/O block.
    pub rio: Option<Box<dyn RegisterWindow>>,
}

pub const BLOCK_SIZE: usize = 4 * 1024;
pub const RIO_BLOCK_SIZE: usize = 16 * 1024;

/// Offsets from the BCM peripheral base.
pub mod bcm {
    pub const GPIO: u64 = 0x0020_0000;
    pub const PWM: u64 = 0x0020_c000;
    pub const CLOCK: u64 = 0x0010_1000;
    pub const PADS: u64 = 0x0010_0000;
    pub const TIMER: u64 = 0x0000_b000;
}

/// Offsets from the RP1 peripheral base, and inside `/dev/gpiomem0`.
pub mod rp1 {
    pub const IO_BANK0: u64 = 0x000d_0000;
    pub const SYS_RIO0: u64 = 0x000e_0000;
    pub const PADS_BANK0: u64 = 0x000f_0000;

    pub const GPIOMEM_IO_BANK0: u64 = 0x0_0000;
    pub const GPIOMEM_SYS_RIO0: u64 = 0x1_0000;
    pub const GPIOMEM_PADS_BANK0: u64 = 0x2_0000;
}

const DEV_GPIOMEM: &str = "/dev/gpiomem";
const DEV_GPIOMEM0: &str = "/dev/gpiomem0";

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl Windows {
    /// Map the blocks of `board` through the device `config` asks for.
    ///
    /// With [`DevicePreference::Auto`] a privileged device that cannot be opened or mapped is
    /// given up in favour of the restricted one.
    pub fn open(board: &BoardClassification, config: &Config) -> Result<Self> {
        let soc = board.soc();
        let restricted_path = config
            .gpiomem_path
            .as_deref()
            .unwrap_or_else(|| restricted_device(soc));

        match config.device {
            DevicePreference::RestrictedOnly => {
                Self::map_device(soc, restricted_path, Access::Restricted)
            }
            DevicePreference::Auto => {
                match Self::map_device(soc, &config.mem_path, Access::Full) {
                    Ok(windows) => Ok(windows),
                    Err(err) => {
                        warn!("{err}, falling back to {}", restricted_path.display());
                        Self::map_device(soc, restricted_path, Access::Restricted)
                    }
                }
            }
        }
    }

    /// Only a GPIO block, as seen through `/dev/gpiomem`.
    pub fn restricted(gpio: Box<dyn RegisterWindow>) -> Self {
        Self {
            access: Access::Restricted,
            gpio,
            pwm: None,
            clock: None,
            pads: None,
            timer: None,
            rio: None,
        }
    }

    /// Every BCM block.
    pub fn bcm(
        gpio: Box<dyn RegisterWindow>,
        pwm: Box<dyn RegisterWindow>,
        clock: Box<dyn RegisterWindow>,
        pads: Box<dyn RegisterWindow>,
    ) -> Self {
        Self {
            access: Access::Full,
            gpio,
            pwm: Some(pwm),
            clock: Some(clock),
            pads: Some(pads),
            timer: None,
            rio: None,
        }
    }

    /// The three RP1 blocks.
    pub fn rp1(
        io_bank: Box<dyn RegisterWindow>,
        rio: Box<dyn RegisterWindow>,
        pads: Box<dyn RegisterWindow>,
    ) -> Self {
        Self {
            access: Access::Full,
            gpio: io_bank,
            pwm: None,
            clock: None,
            pads: Some(pads),
            timer: None,
            rio: Some(rio),
        }
    }

    pub fn with_access(self, access: Access) -> Self {
        Self { access, ..self }
    }

    pub fn is_restricted(&self) -> bool {
        self.access == Access::Restricted
    }
}

impl fmt::Debug for Windows {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let base = |w: &Option<Box<dyn RegisterWindow>>| w.as_ref().map(|w| w.physical_base());
        f.debug_struct("Windows")
            .field("access", &self.access)
            .field("gpio", &self.gpio.physical_base())
            .field("pwm", &base(&self.pwm))
            .field("clock", &base(&self.clock))
            .field("pads", &base(&self.pads))
            .field("timer", &base(&self.timer))
            .field("rio", &base(&self.rio))
            .finish()
    }
}

/// Put the ARM timer into free-running mode with the counter ticking at 1 MHz.
pub fn start_timer(timer: &dyn RegisterWindow) {
    timer.write(timer::CONTROL, 0x0000_0280);
    timer.write(timer::PRE_DIVIDER, 0x0000_00f9);
}

//--------------------------------------------------------------------------------------------------
// Private Code
//--------------------------------------------------------------------------------------------------

impl Windows {
    fn map_device(soc: Soc, path: &Path, access: Access) -> Result<Self> {
        let file = open_device(path)?;
        let windows = match (soc, access) {
            (Soc::Bcm2712, Access::Full) => {
                let base = soc.peripheral_base();
                Self::rp1(
                    map(&file, "IO_BANK0", base + rp1::IO_BANK0, BLOCK_SIZE, base + rp1::IO_BANK0)?,
                    map(&file, "SYS_RIO0", base + rp1::SYS_RIO0, RIO_BLOCK_SIZE, base + rp1::SYS_RIO0)?,
                    map(&file, "PADS_BANK0", base + rp1::PADS_BANK0, BLOCK_SIZE, base + rp1::PADS_BANK0)?,
                )
            }
            (Soc::Bcm2712, Access::Restricted) => {
                let base = soc.peripheral_base();
                Self::rp1(
                    map(&file, "IO_BANK0", rp1::GPIOMEM_IO_BANK0, BLOCK_SIZE, base + rp1::IO_BANK0)?,
                    map(&file, "SYS_RIO0", rp1::GPIOMEM_SYS_RIO0, RIO_BLOCK_SIZE, base + rp1::SYS_RIO0)?,
                    map(&file, "PADS_BANK0", rp1::GPIOMEM_PADS_BANK0, BLOCK_SIZE, base + rp1::PADS_BANK0)?,
                )
                .with_access(access)
            }
            (_, Access::Full) => {
                let base = soc.peripheral_base();
                let block = |name, offset| map(&file, name, base + offset, BLOCK_SIZE, base + offset);
                let windows = Self {
                    access,
                    gpio: block("GPIO", bcm::GPIO)?,
                    pwm: Some(block("PWM", bcm::PWM)?),
                    clock: Some(block("clock", bcm::CLOCK)?),
                    pads: Some(block("pads", bcm::PADS)?),
                    timer: Some(block("timer", bcm::TIMER)?),
                    rio: None,
                };
                if let Some(timer) = &windows.timer {
                    start_timer(&**timer);
                }
                windows
            }
            // The restricted device exposes the GPIO block alone, at offset 0.
            (_, Access::Restricted) => Self::restricted(map(&file, "GPIO", 0, BLOCK_SIZE, 0)?),
        };

        info!("mapped {} registers through {}", soc.name(), path.display());
        Ok(windows)
    }
}

fn restricted_device(soc: Soc) -> &'static Path {
    match soc {
        Soc::Bcm2712 => Path::new(DEV_GPIOMEM0),
        _ => Path::new(DEV_GPIOMEM),
    }
}

fn open_device(path: &Path) -> Result<File> {
    debug!("opening {}", path.display());
    OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_SYNC)
        .open(path)
        .context(OpenSnafu { path })
}

fn map(
    file: &File,
    block: &'static str,
    offset: u64,
    len: usize,
    physical: u64,
) -> Result<Box<dyn RegisterWindow>> {
    debug!("mapping {block} at {physical:#x} (file offset {offset:#x}, {len:#x} bytes)");
    let window = MappedWindow::map(file, offset, len, physical).context(MapSnafu {
        block,
        address: physical,
    })?;
    Ok(Box::new(window))
}

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{board::identify, mmio::FakeWindow},
        std::{
            ffi::CString,
            fs,
            os::unix::ffi::OsStrExt,
            process,
            sync::Arc,
        },
    };

    fn pi3() -> BoardClassification {
        identify("Hardware\t: BCM2835\nRevision\t: a02082\n").unwrap()
    }

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("raspio-{}-{name}", process::id()))
    }

    /// A zeroed regular file standing in for the restricted GPIO device.
    fn fake_gpiomem(name: &str) -> PathBuf {
        let path = scratch_path(name);
        fs::write(&path, vec![0u8; BLOCK_SIZE]).unwrap();
        path
    }

    /// Opens read-write but cannot be mapped.
    fn unmappable(name: &str) -> PathBuf {
        let path = scratch_path(name);
        let _ = fs::remove_file(&path);
        let cpath = CString::new(path.as_os_str().as_bytes()).unwrap();
        assert_eq!(unsafe { libc::mkfifo(cpath.as_ptr(), 0o600) }, 0);
        path
    }

    #[test]
    fn timer_is_started_free_running() {
        let timer = FakeWindow::new(BLOCK_SIZE / 4);
        start_timer(&timer);
        assert_eq!(timer.writes(), vec![(0x102, 0x280), (0x107, 0xf9)]);
    }

    #[test]
    fn restricted_windows_carry_gpio_only() {
        let windows = Windows::restricted(Box::new(Arc::new(FakeWindow::new(64))));
        assert!(windows.is_restricted());
        assert!(windows.pwm.is_none());
        assert!(windows.clock.is_none());
        assert!(windows.pads.is_none());
        assert!(windows.rio.is_none());
    }

    #[test]
    fn restricted_device_depends_on_soc() {
        assert_eq!(restricted_device(Soc::Bcm2712), Path::new("/dev/gpiomem0"));
        assert_eq!(restricted_device(Soc::Bcm2711), Path::new("/dev/gpiomem"));
    }

    #[test]
    fn missing_mem_device_falls_back_to_gpiomem() {
        let gpiomem = fake_gpiomem("fallback-gpiomem");
        let config = Config::default()
            .with_mem_path("/nonexistent/mem")
            .with_gpiomem_path(&gpiomem);

        let windows = Windows::open(&pi3(), &config).unwrap();
        assert_eq!(windows.access, Access::Restricted);
        assert!(windows.is_restricted());
        assert!(windows.pwm.is_none());
        assert!(windows.timer.is_none());

        let windows = Windows::open(&pi3(), &config.with_device(DevicePreference::RestrictedOnly))
            .unwrap();
        assert!(windows.is_restricted());
        assert_eq!(windows.gpio.physical_base(), 0);
        fs::remove_file(gpiomem).unwrap();
    }

    #[test]
    fn unmappable_mem_device_falls_back_to_gpiomem() {
        let mem = unmappable("unmappable-mem");
        let gpiomem = fake_gpiomem("unmappable-gpiomem");
        let config = Config::default()
            .with_mem_path(&mem)
            .with_gpiomem_path(&gpiomem);

        let windows = Windows::open(&pi3(), &config).unwrap();
        assert!(windows.is_restricted());
        fs::remove_file(mem).unwrap();
        fs::remove_file(gpiomem).unwrap();
    }

    #[test]
    fn restricted_only_never_tries_mem() {
        let config = Config::default()
            .with_device(DevicePreference::RestrictedOnly)
            .with_gpiomem_path("/nonexistent/gpiomem");
        let err = Windows::open(&pi3(), &config).unwrap_err();
        assert!(matches!(err, MapError::Open { ref path, .. } if path == Path::new("/nonexistent/gpiomem")));
    }

    #[test]
    fn missing_device_is_an_open_error() {
        let err = open_device(Path::new("/nonexistent/gpiomem")).unwrap_err();
        assert!(matches!(err, MapError::Open { .. }));
        assert!(err.to_string().contains("/nonexistent/gpiomem"));
    }
}
