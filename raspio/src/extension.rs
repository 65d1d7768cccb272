/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! Extension devices.
//!
//! Pins numbered 64 and above belong to external chips (port expanders, ADCs and the like).
//! A driver registers a pin range with an [`ExtensionDevice`]; operations on a pin in that
//! range are forwarded to it with the pin's offset inside the range. Ranges cannot overlap,
//! so the first match is the only match.

use {
    crate::{
        gpio::{Level, PinMode, Pull},
        pins::ONBOARD_PINS,
    },
    core::fmt,
    log::info,
    snafu::{ensure, OptionExt, Snafu},
};

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum ExtensionError {
    #[snafu(display("extension pin base {base} is inside the onboard range 0..64"))]
    BelowOnboard { base: u32 },
    #[snafu(display("extension at {base} has no pins"))]
    Empty { base: u32 },
    #[snafu(display("extension range {base}+{count} does not fit in 32 bits"))]
    TooLarge { base: u32, count: u32 },
    #[snafu(display(
        "extension range {base}..={max} overlaps \"{name}\" at {other_base}..={other_max}"
    ))]
    Overlap {
        base: u32,
        max: u32,
        name: String,
        other_base: u32,
        other_max: u32,
    },
}

pub type Result<T> = ::core::result::Result<T, ExtensionError>;

/// Operations an extension chip can provide. Anything not implemented falls back to a
/// harmless default: configuration is ignored, reads return low or 0.
///
/// `offset` is the pin's position inside the registered range.
#[allow(unused_variables)]
pub trait ExtensionDevice: Send + Sync {
    fn name(&self) -> &str {
        "extension"
    }

    fn pin_mode(&self, offset: u32, mode: PinMode) {}

    fn pull_up_dn_control(&self, offset: u32, pull: Pull) {}

    fn digital_read(&self, offset: u32) -> Level {
        Level::Low
    }

    fn digital_write(&self, offset: u32, level: Level) {}

    fn pwm_write(&self, offset: u32, value: u32) {}

    fn analog_read(&self, offset: u32) -> i32 {
        0
    }

    fn analog_write(&self, offset: u32, value: i32) {}
}

/// A registered pin range.
pub struct ExtensionNode {
    base: u32,
    max: u32,
    device: Box<dyn ExtensionDevice>,
}

/// Registered ranges in registration order.
#[derive(Default)]
pub struct ExtensionRegistry {
    nodes: Vec<ExtensionNode>,
}

/// Stands in for an unregistered extension pin.
struct NullDevice;

impl ExtensionDevice for NullDevice {
    fn name(&self) -> &str {
        "unregistered"
    }
}

static NULL_DEVICE: NullDevice = NullDevice;

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl ExtensionNode {
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Last pin of the range, inclusive.
    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn contains(&self, pin: u32) -> bool {
        (self.base..=self.max).contains(&pin)
    }

    pub fn device(&self) -> &dyn ExtensionDevice {
        &*self.device
    }
}

impl fmt::Debug for ExtensionNode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} [{}..={}]", self.device.name(), self.base, self.max)
    }
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim pins `base..base + count` for `device`.
    pub fn register(
        &mut self,
        base: u32,
        count: u32,
        device: Box<dyn ExtensionDevice>,
    ) -> Result<&ExtensionNode> {
        ensure!(base >= ONBOARD_PINS, BelowOnboardSnafu { base });
        ensure!(count > 0, EmptySnafu { base });
        let max = base
            .checked_add(count - 1)
            .context(TooLargeSnafu { base, count })?;

        if let Some(other) = self
            .nodes
            .iter()
            .find(|node| base <= node.max && node.base <= max)
        {
            return OverlapSnafu {
                base,
                max,
                name: other.device.name(),
                other_base: other.base,
                other_max: other.max,
            }
            .fail();
        }

        info!("extension \"{}\" on pins {base}..={max}", device.name());
        self.nodes.push(ExtensionNode { base, max, device });
        Ok(&self.nodes[self.nodes.len() - 1])
    }

    /// The node whose range holds `pin`.
    pub fn find(&self, pin: u32) -> Option<&ExtensionNode> {
        self.nodes.iter().find(|node| node.contains(pin))
    }

    /// The device serving `pin` and the pin's offset in its range. Unclaimed pins get a
    /// device with only the default behaviour.
    pub fn device(&self, pin: u32) -> (&dyn ExtensionDevice, u32) {
        match self.find(pin) {
            Some(node) => (node.device(), pin - node.base),
            None => (&NULL_DEVICE as &dyn ExtensionDevice, 0),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExtensionNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use {super::*, parking_lot::Mutex, std::sync::Arc};

    #[derive(Default)]
    struct Recorder {
        writes: Mutex<Vec<(u32, Level)>>,
    }

    struct Shared(Arc<Recorder>);

    impl ExtensionDevice for Shared {
        fn name(&self) -> &str {
            "recorder"
        }

        fn digital_write(&self, offset: u32, level: Level) {
            self.0.writes.lock().push((offset, level));
        }

        fn digital_read(&self, offset: u32) -> Level {
            Level::from(offset % 2 == 1)
        }
    }

    struct Quiet;
    impl ExtensionDevice for Quiet {}

    #[test]
    fn base_must_be_above_onboard_pins() {
        let mut registry = ExtensionRegistry::new();
        assert_eq!(
            registry.register(63, 4, Box::new(Quiet)).unwrap_err(),
            ExtensionError::BelowOnboard { base: 63 }
        );
        assert!(registry.register(64, 4, Box::new(Quiet)).is_ok());
    }

    #[test]
    fn ranges_must_not_overlap() {
        let mut registry = ExtensionRegistry::new();
        registry.register(100, 16, Box::new(Quiet)).unwrap();
        assert!(matches!(
            registry.register(115, 2, Box::new(Quiet)),
            Err(ExtensionError::Overlap { other_base: 100, other_max: 115, .. })
        ));
        assert!(matches!(
            registry.register(90, 11, Box::new(Quiet)),
            Err(ExtensionError::Overlap { .. })
        ));
        assert!(registry.register(116, 1, Box::new(Quiet)).is_ok());
        assert!(registry.register(90, 10, Box::new(Quiet)).is_ok());
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn degenerate_ranges_are_rejected() {
        let mut registry = ExtensionRegistry::new();
        assert_eq!(
            registry.register(200, 0, Box::new(Quiet)).unwrap_err(),
            ExtensionError::Empty { base: 200 }
        );
        assert!(matches!(
            registry.register(u32::MAX, 2, Box::new(Quiet)),
            Err(ExtensionError::TooLarge { .. })
        ));
    }

    #[test]
    fn dispatch_passes_offsets() {
        let recorder = Arc::new(Recorder::default());
        let mut registry = ExtensionRegistry::new();
        registry
            .register(100, 8, Box::new(Shared(recorder.clone())))
            .unwrap();

        let (device, offset) = registry.device(103);
        device.digital_write(offset, Level::High);
        assert_eq!(*recorder.writes.lock(), vec![(3, Level::High)]);
        assert_eq!(device.digital_read(offset), Level::High);
        assert_eq!(registry.find(108).map(|n| n.base()), None);
    }

    #[test]
    fn defaults_are_harmless() {
        let registry = ExtensionRegistry::new();
        let (device, _) = registry.device(500);
        assert_eq!(device.name(), "unregistered");
        device.pin_mode(0, PinMode::Output);
        device.digital_write(0, Level::High);
        assert_eq!(device.digital_read(0), Level::Low);
        assert_eq!(device.analog_read(0), 0);

        let quiet = Quiet;
        assert_eq!(quiet.digital_read(1), Level::Low);
        assert_eq!(quiet.analog_read(1), 0);
    }
}
