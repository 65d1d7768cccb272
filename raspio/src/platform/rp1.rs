/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! RP1 I/O controller (Raspberry Pi 5 family).
//!
//! Every pin has a STATUS/CTRL pair in IO_BANK0 selecting its function, and its own pad
//! register holding pulls and input enable. Plain GPIO output goes through the registered
//! I/O block (SYS_RIO0), whose set and clear aliases make single-pin writes atomic. Hardware
//! PWM, the general purpose clocks and BCM-style pad groups are not reachable here.

use {
    super::{Direction, Peripherals},
    crate::{
        error::UsageError,
        geometry::{rp1, PinFunction},
        gpio::{Level, Pull, PwmMode},
        memory::Windows,
        mmio::{Reg, RegisterWindow},
    },
    tock_registers::{
        interfaces::{ReadWriteable, Readable, Writeable},
        register_bitfields,
    },
};

//--------------------------------------------------------------------------------------------------
// Private Definitions
//--------------------------------------------------------------------------------------------------

register_bitfields! {
    u32,

    GPIO_STATUS [
        /// Input level after the filter: 01 low, 10 high.
        LEVEL OFFSET(22) NUMBITS(2) [
            Low = 0b01,
            High = 0b10
        ]
    ],

    GPIO_CTRL [
        /// Filter/debounce time constant
        F_M OFFSET(5) NUMBITS(7) [],
        FUNCSEL OFFSET(0) NUMBITS(5) [
            Alt0 = 0,
            Alt1 = 1,
            Alt2 = 2,
            Alt3 = 3,
            Alt4 = 4,
            SysRio = 5,
            Alt6 = 6,
            Alt7 = 7,
            Alt8 = 8,
            Null = 0x1f
        ]
    ],

    PAD [
        OD OFFSET(7) NUMBITS(1) [],
        IE OFFSET(6) NUMBITS(1) [],
        DRIVE OFFSET(4) NUMBITS(2) [
            Drive2mA = 0,
            Drive4mA = 1,
            Drive8mA = 2,
            Drive12mA = 3
        ],
        PUE OFFSET(3) NUMBITS(1) [],
        PDE OFFSET(2) NUMBITS(1) [],
        SCHMITT OFFSET(1) NUMBITS(1) [],
        SLEWFAST OFFSET(0) NUMBITS(1) []
    ]
}

const DEBOUNCE_DEFAULT: u32 = 4;

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

pub struct Rp1 {
    windows: Windows,
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl Rp1 {
    pub fn new(windows: Windows) -> Self {
        debug_assert!(windows.rio.is_some() && windows.pads.is_some());
        Self { windows }
    }

    fn io_bank(&self) -> &dyn RegisterWindow {
        &*self.windows.gpio
    }

    fn rio(&self) -> &dyn RegisterWindow {
        match &self.windows.rio {
            Some(rio) => &**rio,
            None => &*self.windows.gpio,
        }
    }

    fn pads(&self) -> &dyn RegisterWindow {
        match &self.windows.pads {
            Some(pads) => &**pads,
            None => &*self.windows.gpio,
        }
    }

    fn ctrl(&self, native: u8) -> Reg<'_, GPIO_CTRL::Register> {
        Reg::new(self.io_bank(), rp1::ctrl(native))
    }

    fn pad(&self, native: u8) -> Reg<'_, PAD::Register> {
        Reg::new(self.pads(), rp1::pad(native))
    }

    fn not_here(what: &'static str) -> UsageError {
        UsageError::NotOnThisSoc { what, soc: "RP1" }
    }
}

//--------------------------------------------------------------------------------------------------
// OS Interface Code
//--------------------------------------------------------------------------------------------------

impl Peripherals for Rp1 {
    fn name(&self) -> &'static str {
        "RP1"
    }

    fn pin_count(&self) -> u8 {
        rp1::PINS
    }

    fn set_direction(&self, native: u8, direction: Direction) {
        // Input enabled, output not disabled; pulls stay as they are.
        self.pad(native).modify(PAD::IE::SET + PAD::OD::CLEAR);
        self.ctrl(native)
            .write(GPIO_CTRL::FUNCSEL::SysRio + GPIO_CTRL::F_M.val(DEBOUNCE_DEFAULT));
        let alias = match direction {
            Direction::Input => rp1::RIO_CLR,
            Direction::Output => rp1::RIO_SET,
        };
        self.rio().write(alias + rp1::RIO_OE, 1 << native);
    }

    fn function(&self, native: u8) -> PinFunction {
        match self.ctrl(native).read(GPIO_CTRL::FUNCSEL) {
            5 => {
                if self.rio().read(rp1::RIO_OE) & (1 << native) != 0 {
                    PinFunction::Output
                } else {
                    PinFunction::Input
                }
            }
            alt @ 0..=8 => PinFunction::Alt(alt as u8),
            _ => PinFunction::Off,
        }
    }

    fn read(&self, native: u8) -> Level {
        let status = Reg::<GPIO_STATUS::Register>::new(self.io_bank(), rp1::status(native));
        // Only the two one-hot patterns are valid, anything else reads as low.
        match status.read_as_enum(GPIO_STATUS::LEVEL) {
            Some(GPIO_STATUS::LEVEL::Value::High) => Level::High,
            _ => Level::Low,
        }
    }

    fn write(&self, native: u8, level: Level) {
        let alias = match level {
            Level::High => rp1::RIO_SET,
            Level::Low => rp1::RIO_CLR,
        };
        self.rio().write(alias + rp1::RIO_OUT, 1 << native);
    }

    fn read_bank(&self) -> u32 {
        self.rio().read(rp1::RIO_NOSYNC_IN)
    }

    fn write_bank(&self, set: u32, clear: u32) {
        self.rio().write(rp1::RIO_CLR + rp1::RIO_OUT, clear);
        self.rio().write(rp1::RIO_SET + rp1::RIO_OUT, set);
    }

    fn set_pull(&self, native: u8, pull: Pull) {
        self.pad(native).modify(match pull {
            Pull::Off => PAD::PUE::CLEAR + PAD::PDE::CLEAR,
            Pull::Up => PAD::PUE::SET + PAD::PDE::CLEAR,
            Pull::Down => PAD::PUE::CLEAR + PAD::PDE::SET,
        });
    }

    fn route_pwm(&self, _native: u8) -> Result<(), UsageError> {
        Err(Self::not_here("hardware PWM"))
    }

    fn pwm_write(&self, _native: u8, _value: u32) -> Result<(), UsageError> {
        Err(Self::not_here("hardware PWM"))
    }

    fn pwm_set_mode(&self, _mode: PwmMode) -> Result<(), UsageError> {
        Err(Self::not_here("hardware PWM"))
    }

    fn pwm_set_range(&self, _range: u32) -> Result<(), UsageError> {
        Err(Self::not_here("hardware PWM"))
    }

    fn pwm_set_clock(&self, _divisor: u32) -> Result<(), UsageError> {
        Err(Self::not_here("hardware PWM"))
    }

    fn route_clock(&self, _native: u8) -> Result<(), UsageError> {
        Err(Self::not_here("GPIO clock"))
    }

    fn clock_set(&self, _native: u8, _frequency: u32) -> Result<(), UsageError> {
        Err(Self::not_here("GPIO clock"))
    }

    fn set_pad_drive(&self, _group: u8, _value: u8) -> Result<(), UsageError> {
        Err(Self::not_here("pad group drive"))
    }
}

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::mmio::FakeWindow,
        std::sync::Arc,
    };

    struct Fakes {
        io_bank: Arc<FakeWindow>,
        rio: Arc<FakeWindow>,
        pads: Arc<FakeWindow>,
    }

    fn rp1() -> (Rp1, Fakes) {
        let fakes = Fakes {
            io_bank: Arc::new(FakeWindow::new(1024)),
            rio: Arc::new(FakeWindow::new(4096)),
            pads: Arc::new(FakeWindow::new(1024)),
        };
        let windows = Windows::rp1(
            Box::new(fakes.io_bank.clone()),
            Box::new(fakes.rio.clone()),
            Box::new(fakes.pads.clone()),
        );
        (Rp1::new(windows), fakes)
    }

    #[test]
    fn status_level_decoding() {
        let (rp1, fakes) = rp1();
        for (status, level) in [
            (0x0040_0000, Level::Low),
            (0x0080_0000, Level::High),
            (0x00c0_0000, Level::Low),
            (0x0000_0000, Level::Low),
            (0xff80_ffff, Level::High),
        ] {
            fakes.io_bank.poke(rp1::status(4), status);
            assert_eq!(rp1.read(4), level, "status {status:#010x}");
        }
    }

    #[test]
    fn outputs_use_the_rio_aliases() {
        let (rp1, fakes) = rp1();
        rp1.write(17, Level::High);
        rp1.write(17, Level::Low);
        assert_eq!(
            fakes.rio.writes(),
            vec![(0x800, 1 << 17), (0xc00, 1 << 17)]
        );
    }

    #[test]
    fn bank_reads_come_from_the_input_register() {
        let (rp1, fakes) = rp1();
        fakes.rio.poke(0x08 / 4, 0x0000_a5a5);
        fakes.rio.poke(0x0c / 4, 0xffff_ffff);
        assert_eq!(rp1.read_bank(), 0x0000_a5a5);
    }

    #[test]
    fn direction_selects_rio_and_output_enable() {
        let (rp1, fakes) = rp1();
        fakes.pads.poke(rp1::pad(17), 0b1000_1000); // OD and pull-up
        rp1.set_direction(17, Direction::Output);

        assert_eq!(fakes.pads.peek(rp1::pad(17)), 0b0100_1000);
        assert_eq!(fakes.io_bank.peek(rp1::ctrl(17)), 5 | (4 << 5));
        assert_eq!(fakes.rio.writes(), vec![(0x801, 1 << 17)]);

        rp1.set_direction(17, Direction::Input);
        assert_eq!(fakes.rio.writes().last(), Some(&(0xc01, 1 << 17)));
    }

    #[test]
    fn function_readback() {
        let (rp1, fakes) = rp1();
        fakes.io_bank.poke(rp1::ctrl(2), 5);
        fakes.rio.poke(rp1::RIO_OE, 1 << 2);
        assert_eq!(rp1.function(2), PinFunction::Output);
        fakes.rio.poke(rp1::RIO_OE, 0);
        assert_eq!(rp1.function(2), PinFunction::Input);
        fakes.io_bank.poke(rp1::ctrl(2), 3);
        assert_eq!(rp1.function(2), PinFunction::Alt(3));
        fakes.io_bank.poke(rp1::ctrl(2), 0x1f);
        assert_eq!(rp1.function(2), PinFunction::Off);
    }

    #[test]
    fn pulls_use_pad_bits() {
        let (rp1, fakes) = rp1();
        fakes.pads.poke(rp1::pad(3), 0b0101_0000);
        rp1.set_pull(3, Pull::Up);
        assert_eq!(fakes.pads.peek(rp1::pad(3)), 0b0101_1000);
        rp1.set_pull(3, Pull::Down);
        assert_eq!(fakes.pads.peek(rp1::pad(3)), 0b0101_0100);
        rp1.set_pull(3, Pull::Off);
        assert_eq!(fakes.pads.peek(rp1::pad(3)), 0b0101_0000);
    }

    #[test]
    fn pwm_and_clocks_are_not_on_rp1() {
        let (rp1, fakes) = rp1();
        assert!(matches!(
            rp1.route_pwm(18),
            Err(UsageError::NotOnThisSoc { .. })
        ));
        assert!(rp1.pwm_set_clock(32).is_err());
        assert!(rp1.clock_set(4, 100_000).is_err());
        assert!(rp1.set_pad_drive(0, 7).is_err());
        assert_eq!(fakes.io_bank.access_count(), 0);
        assert_eq!(fakes.rio.access_count(), 0);
    }
}
