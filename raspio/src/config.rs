/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! Run-time configuration of a [`Gpio`](crate::Gpio) instance.

use {
    crate::{error::UsagePolicy, gpio::SoftwareOutput, pins::NumberingScheme},
    core::fmt,
    std::{path::PathBuf, sync::Arc},
};

/// Which memory device to map the registers through.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DevicePreference {
    /// `/dev/mem`, falling back to the restricted GPIO device.
    #[default]
    Auto,
    /// Only the restricted GPIO device (`/dev/gpiomem`, `/dev/gpiomem0` on RP1 boards).
    RestrictedOnly,
}

#[derive(Clone)]
pub struct Config {
    pub scheme: NumberingScheme,
    pub device: DevicePreference,
    pub policy: UsagePolicy,
    pub cpuinfo_path: PathBuf,
    pub gpiochip_path: PathBuf,
    pub mem_path: PathBuf,
    /// Restricted GPIO device; picked from the SoC when unset.
    pub gpiomem_path: Option<PathBuf>,
    /// Receives pins switched to a software PWM or tone mode.
    pub software_output: Option<Arc<dyn SoftwareOutput>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scheme: NumberingScheme::default(),
            device: DevicePreference::default(),
            policy: UsagePolicy::default(),
            cpuinfo_path: PathBuf::from("/proc/cpuinfo"),
            gpiochip_path: PathBuf::from("/dev/gpiochip0"),
            mem_path: PathBuf::from("/dev/mem"),
            gpiomem_path: None,
            software_output: None,
        }
    }
}

impl Config {
    pub fn with_scheme(self, scheme: NumberingScheme) -> Self {
        Self { scheme, ..self }
    }

    pub fn with_device(self, device: DevicePreference) -> Self {
        Self { device, ..self }
    }

    pub fn with_policy(self, policy: UsagePolicy) -> Self {
        Self { policy, ..self }
    }

    pub fn with_cpuinfo_path(self, path: impl Into<PathBuf>) -> Self {
        Self {
            cpuinfo_path: path.into(),
            ..self
        }
    }

    pub fn with_gpiochip_path(self, path: impl Into<PathBuf>) -> Self {
        Self {
            gpiochip_path: path.into(),
            ..self
        }
    }

    pub fn with_mem_path(self, path: impl Into<PathBuf>) -> Self {
        Self {
            mem_path: path.into(),
            ..self
        }
    }

    pub fn with_gpiomem_path(self, path: impl Into<PathBuf>) -> Self {
        Self {
            gpiomem_path: Some(path.into()),
            ..self
        }
    }

    pub fn with_software_output(self, output: Arc<dyn SoftwareOutput>) -> Self {
        Self {
            software_output: Some(output),
            ..self
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Config")
            .field("scheme", &self.scheme)
            .field("device", &self.device)
            .field("policy", &self.policy)
            .field("cpuinfo_path", &self.cpuinfo_path)
            .field("gpiochip_path", &self.gpiochip_path)
            .field("mem_path", &self.mem_path)
            .field("gpiomem_path", &self.gpiomem_path)
            .field("software_output", &self.software_output.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::error::Violation};

    #[test]
    fn builders_override_defaults() {
        let config = Config::default()
            .with_scheme(NumberingScheme::Physical)
            .with_device(DevicePreference::RestrictedOnly)
            .with_policy(UsagePolicy::strict())
            .with_cpuinfo_path("/tmp/cpuinfo")
            .with_gpiomem_path("/tmp/gpiomem");
        assert_eq!(config.scheme, NumberingScheme::Physical);
        assert_eq!(config.device, DevicePreference::RestrictedOnly);
        assert_eq!(config.policy.unsupported, Violation::Abort);
        assert_eq!(config.cpuinfo_path, PathBuf::from("/tmp/cpuinfo"));
        assert_eq!(config.gpiochip_path, PathBuf::from("/dev/gpiochip0"));
        assert_eq!(config.mem_path, PathBuf::from("/dev/mem"));
        assert_eq!(config.gpiomem_path, Some(PathBuf::from("/tmp/gpiomem")));
    }
}
