/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! Register-level back-ends, one per peripheral generation.
//!
//! Everything that differs between SoC generations sits behind [`Peripherals`]. The choice is
//! made once, by [`select`], from the board classification; operations never test the board
//! generation again. Pins passed in are native and already checked against
//! [`Peripherals::pin_count`].

use {
    crate::{
        board::{BoardClassification, Soc},
        error::UsageError,
        geometry::PinFunction,
        gpio::{Level, Pull, PwmMode},
        memory::Windows,
    },
    log::debug,
};

pub mod bcm;
pub mod rp1;

pub use {bcm::Bcm, rp1::Rp1};

/// Direction of a plain GPIO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// Register operations of one peripheral generation.
///
/// The plain GPIO operations cannot fail. Operations that need a capability the pin, the SoC
/// or the mapped device may lack report it as a [`UsageError`] without touching any register.
pub trait Peripherals: Send + Sync {
    fn name(&self) -> &'static str;

    /// Native pins `0..pin_count()` exist.
    fn pin_count(&self) -> u8;

    fn set_direction(&self, native: u8, direction: Direction);

    fn function(&self, native: u8) -> PinFunction;

    fn read(&self, native: u8) -> Level;

    /// A single word write, never read-modify-write.
    fn write(&self, native: u8, level: Level);

    /// Levels of native pins 0..=31 as a bit mask.
    fn read_bank(&self) -> u32;

    /// Clear the pins in `clear`, then set the pins in `set`; native pins 0..=31.
    fn write_bank(&self, set: u32, clear: u32);

    fn set_pull(&self, native: u8, pull: Pull);

    /// Route the PWM function to the pin.
    fn route_pwm(&self, native: u8) -> Result<(), UsageError>;

    fn pwm_write(&self, native: u8, value: u32) -> Result<(), UsageError>;

    fn pwm_set_mode(&self, mode: PwmMode) -> Result<(), UsageError>;

    fn pwm_set_range(&self, range: u32) -> Result<(), UsageError>;

    fn pwm_set_clock(&self, divisor: u32) -> Result<(), UsageError>;

    /// Route the general purpose clock to the pin.
    fn route_clock(&self, native: u8) -> Result<(), UsageError>;

    fn clock_set(&self, native: u8, frequency: u32) -> Result<(), UsageError>;

    fn set_pad_drive(&self, group: u8, value: u8) -> Result<(), UsageError>;
}

/// Pick the back-end for the board's SoC.
pub fn select(board: &BoardClassification, windows: Windows) -> Box<dyn Peripherals> {
    let backend: Box<dyn Peripherals> = match board.soc() {
        Soc::Bcm2712 => Box::new(Rp1::new(windows)),
        soc => Box::new(Bcm::new(soc, windows)),
    };
    debug!("using the {} register back-end", backend.name());
    backend
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{board::identify, mmio::FakeWindow},
    };

    fn board(revision: &str) -> BoardClassification {
        identify(&format!("Revision\t: {revision}\n")).unwrap()
    }

    #[test]
    fn backend_follows_the_soc() {
        let fake = || Box::new(FakeWindow::new(4096));
        let pi3 = select(
            &board("a02082"),
            Windows::bcm(fake(), fake(), fake(), fake()),
        );
        assert_eq!(pi3.name(), "BCM283x");
        assert_eq!(pi3.pin_count(), 54);

        let pi4 = select(
            &board("b03111"),
            Windows::bcm(fake(), fake(), fake(), fake()),
        );
        assert_eq!(pi4.name(), "BCM2711");

        let pi5 = select(&board("c04170"), Windows::rp1(fake(), fake(), fake()));
        assert_eq!(pi5.name(), "RP1");
        assert_eq!(pi5.pin_count(), 28);
    }
}
