/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! Errors and the usage-violation policy.
//!
//! Set-up failures are returned as [`Error`] and are meant to be fatal: nothing can be done
//! with a board that was not identified or whose registers could not be mapped. Misuse of
//! the register operations (unconnected pins, capabilities the pin or SoC lacks, features
//! forbidden in restricted mode) is not returned to the caller; it is handed to the
//! configured [`UsagePolicy`] instead.

use {
    crate::{
        board::BoardError, extension::ExtensionError, interrupt::InterruptError,
        memory::MapError, pins::NumberingScheme,
    },
    log::{debug, error, warn},
    snafu::{ErrorCompat, Snafu},
    std::{io, path::PathBuf},
};

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("cannot read the hardware descriptor {}", path.display()))]
    Descriptor { path: PathBuf, source: io::Error },
    #[snafu(context(false), display("cannot identify the board: {source}"))]
    Board { source: BoardError },
    #[snafu(context(false), display("cannot map the peripheral registers: {source}"))]
    Map { source: MapError },
    #[snafu(context(false), display("interrupt set-up failed: {source}"))]
    Interrupt { source: InterruptError },
    #[snafu(context(false), display("extension registration failed: {source}"))]
    Extension { source: ExtensionError },
    #[snafu(display("raspio is already set up"))]
    AlreadySetUp,
}

pub type Result<T> = ::core::result::Result<T, Error>;

/// Misuse of a register operation.
#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum UsageError {
    #[snafu(display("pin {pin} is not connected in the {scheme} numbering"))]
    Unmapped { pin: u32, scheme: NumberingScheme },
    #[snafu(display("GPIO {native} has no {what} function"))]
    Unsupported { what: &'static str, native: u8 },
    #[snafu(display("{what} is not available on {soc}"))]
    NotOnThisSoc { what: &'static str, soc: &'static str },
    #[snafu(display("{what} needs /dev/mem but only the restricted GPIO device is mapped"))]
    Restricted { what: &'static str },
    #[snafu(display("{what} {value} is out of range"))]
    OutOfRange { what: &'static str, value: u32 },
}

/// What to do when a usage error is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// Do nothing (logged at debug level).
    Ignore,
    /// Do nothing and log a warning.
    Warn,
    /// Log an error and panic.
    Abort,
}

/// Response to the two classes of usage error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsagePolicy {
    /// Unconnected pins, pins without the requested capability, SoCs without it.
    pub unsupported: Violation,
    /// PWM, clock and pad configuration attempted through the restricted device.
    pub restricted: Violation,
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl Error {
    /// A hint for the user on how to get past this failure.
    pub fn remedy(&self) -> &'static str {
        match self {
            Error::Descriptor { .. } | Error::Board { .. } => {
                "make sure this is a Raspberry Pi running a kernel that exposes the board \
                 revision in /proc/cpuinfo"
            }
            Error::Map { .. } => {
                "run as root for /dev/mem, or add the user to the gpio group for /dev/gpiomem"
            }
            Error::Interrupt { .. } => {
                "check that /dev/gpiochip0 exists and the line is not claimed by another process"
            }
            Error::Extension { .. } => "extension pin ranges must start at 64 and must not overlap",
            Error::AlreadySetUp => "call one of the raspio::setup functions exactly once",
        }
    }
}

impl UsageError {
    pub fn is_restricted(&self) -> bool {
        matches!(self, UsageError::Restricted { .. })
    }
}

impl Violation {
    /// Carry out the policy for `err`. Returns only if the policy does not abort.
    pub fn apply(self, err: &UsageError) {
        match self {
            Violation::Ignore => debug!("ignored: {err}"),
            Violation::Warn => warn!("{err}, ignored"),
            Violation::Abort => {
                error!("{err}");
                panic!("raspio: {err}");
            }
        }
    }
}

impl Default for UsagePolicy {
    fn default() -> Self {
        Self {
            unsupported: Violation::Warn,
            restricted: Violation::Abort,
        }
    }
}

impl UsagePolicy {
    /// Every violation is a panic.
    pub const fn strict() -> Self {
        Self {
            unsupported: Violation::Abort,
            restricted: Violation::Abort,
        }
    }

    /// Every violation is a silent no-op.
    pub const fn lenient() -> Self {
        Self {
            unsupported: Violation::Ignore,
            restricted: Violation::Ignore,
        }
    }

    pub fn handle(&self, err: &UsageError) {
        if err.is_restricted() {
            self.restricted.apply(err)
        } else {
            self.unsupported.apply(err)
        }
    }
}

/// Print a structured diagnostic for a set-up failure and terminate the process.
pub fn fatal(err: &Error) -> ! {
    error!("{err}");
    eprintln!("raspio: unable to continue.");
    eprintln!("  error:   {err}");
    for cause in ErrorCompat::iter_chain(err).skip(1) {
        eprintln!("  cause:   {cause}");
    }
    let system = sys::SystemInfo::current();
    eprintln!(
        "  system:  {} {} ({})",
        system.sysname, system.release, system.machine
    );
    eprintln!("  remedy:  {}", err.remedy());
    std::process::exit(1)
}

//--------------------------------------------------------------------------------------------------
// OS Interface Code
//--------------------------------------------------------------------------------------------------

mod sys {
    pub struct SystemInfo {
        pub sysname: String,
        pub release: String,
        pub machine: String,
    }

    cfg_if::cfg_if! {
        if #[cfg(target_os = "linux")] {
            use std::ffi::CStr;

            impl SystemInfo {
                pub fn current() -> Self {
                    let mut uts: libc::utsname = unsafe { core::mem::zeroed() };
                    if unsafe { libc::uname(&mut uts) } != 0 {
                        return Self::unknown();
                    }
                    let field = |raw: &[libc::c_char]| {
                        unsafe { CStr::from_ptr(raw.as_ptr()) }
                            .to_string_lossy()
                            .into_owned()
                    };
                    Self {
                        sysname: field(&uts.sysname),
                        release: field(&uts.release),
                        machine: field(&uts.machine),
                    }
                }
            }
        } else {
            impl SystemInfo {
                pub fn current() -> Self {
                    Self::unknown()
                }
            }
        }
    }

    impl SystemInfo {
        #[allow(dead_code)]
        fn unknown() -> Self {
            Self {
                sysname: std::env::consts::OS.into(),
                release: "unknown".into(),
                machine: std::env::consts::ARCH.into(),
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_warns_on_unsupported_and_aborts_on_restricted() {
        let policy = UsagePolicy::default();
        policy.handle(&UsageError::Unsupported {
            what: "PWM",
            native: 4,
        });
        let restricted = std::panic::catch_unwind(|| {
            UsagePolicy::default().handle(&UsageError::Restricted { what: "PWM" })
        });
        assert!(restricted.is_err());
    }

    #[test]
    fn lenient_policy_never_panics() {
        UsagePolicy::lenient().handle(&UsageError::Restricted { what: "pad drive" });
    }

    #[test]
    fn strict_policy_aborts_on_unmapped_pins() {
        let result = std::panic::catch_unwind(|| {
            UsagePolicy::strict().handle(&UsageError::Unmapped {
                pin: 1,
                scheme: NumberingScheme::Physical,
            })
        });
        assert!(result.is_err());
    }

    #[test]
    fn board_errors_convert_and_carry_a_remedy() {
        let err: Error = BoardError::NoRevision.into();
        assert!(matches!(err, Error::Board { .. }));
        assert!(err.remedy().contains("/proc/cpuinfo"));
        assert!(err.to_string().contains("Revision"));
    }

    #[test]
    fn usage_error_messages() {
        let err = UsageError::Unmapped {
            pin: 1,
            scheme: NumberingScheme::Physical,
        };
        assert_eq!(
            err.to_string(),
            "pin 1 is not connected in the Physical numbering"
        );
        assert!(UsageError::Restricted { what: "PWM" }.is_restricted());
    }
}
