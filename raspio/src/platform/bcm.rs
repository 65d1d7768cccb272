/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! BCM2835, BCM2836/7 and BCM2711 peripherals.
//!
//! The three share the GPIO, PWM, clock manager and pads blocks. They differ only in how pull
//! resistors are set and in the PWM clock source frequency of the BCM2711.

use {
    super::{Direction, Peripherals},
    crate::{
        board::Soc,
        error::UsageError,
        geometry::{
            self, clock, clock_capability, gpio, pads, pwm, pwm_capability, Function, PinFunction,
        },
        gpio::{Level, Pull, PwmMode},
        memory::Windows,
        mmio::{Reg, RegisterWindow},
        time,
    },
    tock_registers::{
        fields::FieldValue,
        interfaces::{ReadWriteable, Readable, Writeable},
        register_bitfields,
    },
};

//--------------------------------------------------------------------------------------------------
// Private Definitions
//--------------------------------------------------------------------------------------------------

register_bitfields! {
    u32,

    /// PWM control
    PWM_CTL [
        MSEN2 OFFSET(15) NUMBITS(1) [],
        USEF2 OFFSET(13) NUMBITS(1) [],
        POLA2 OFFSET(12) NUMBITS(1) [],
        SBIT2 OFFSET(11) NUMBITS(1) [],
        RPTL2 OFFSET(10) NUMBITS(1) [],
        MODE2 OFFSET(9) NUMBITS(1) [],
        PWEN2 OFFSET(8) NUMBITS(1) [],
        MSEN1 OFFSET(7) NUMBITS(1) [],
        CLRF1 OFFSET(6) NUMBITS(1) [],
        USEF1 OFFSET(5) NUMBITS(1) [],
        POLA1 OFFSET(4) NUMBITS(1) [],
        SBIT1 OFFSET(3) NUMBITS(1) [],
        RPTL1 OFFSET(2) NUMBITS(1) [],
        MODE1 OFFSET(1) NUMBITS(1) [],
        PWEN1 OFFSET(0) NUMBITS(1) []
    ],

    /// Clock manager control, for the PWM clock and the general purpose clocks
    CM_CTL [
        PASSWD OFFSET(24) NUMBITS(8) [
            Passwd = 0x5a
        ],
        MASH OFFSET(9) NUMBITS(2) [],
        FLIP OFFSET(8) NUMBITS(1) [],
        BUSY OFFSET(7) NUMBITS(1) [],
        KILL OFFSET(5) NUMBITS(1) [],
        ENAB OFFSET(4) NUMBITS(1) [],
        SRC OFFSET(0) NUMBITS(4) [
            Ground = 0,
            Oscillator = 1,
            TestDebug0 = 2,
            TestDebug1 = 3,
            PllA = 4,
            PllC = 5,
            PllD = 6,
            HdmiAux = 7
        ]
    ],

    /// Clock manager divisor
    CM_DIV [
        PASSWD OFFSET(24) NUMBITS(8) [
            Passwd = 0x5a
        ],
        DIVI OFFSET(12) NUMBITS(12) [],
        DIVF OFFSET(0) NUMBITS(12) []
    ],

    /// Pad control of one bank
    PADS_CTL [
        PASSWD OFFSET(24) NUMBITS(8) [
            Passwd = 0x5a
        ],
        SLEW OFFSET(4) NUMBITS(1) [],
        HYST OFFSET(3) NUMBITS(1) [],
        DRIVE OFFSET(0) NUMBITS(3) []
    ],

    /// Legacy pull control
    GPPUD [
        PUD OFFSET(0) NUMBITS(2) [
            Off = 0b00,
            Down = 0b01,
            Up = 0b10
        ]
    ]
}

/// The oscillator feeding the general purpose clocks.
const OSCILLATOR_HZ: u64 = 19_200_000;

/// Integer and fractional parts are 12 bits wide.
const DIVISOR_MAX: u32 = 4095;

const STROBE_DELAY_US: u32 = 5;
const CLOCK_STOP_DELAY_US: u32 = 110;
const RANGE_DELAY_US: u32 = 10;

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

/// How the SoC sets pull resistors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullScheme {
    /// Global GPPUD value clocked into pins through GPPUDCLKn.
    Strobe,
    /// Per-pin 2-bit fields in GPIO_PUP_PDN_CNTRL_REGn (BCM2711).
    PerPin,
}

pub struct Bcm {
    soc: Soc,
    pull: PullScheme,
    windows: Windows,
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl Bcm {
    pub const PIN_COUNT: u8 = 54;

    pub fn new(soc: Soc, windows: Windows) -> Self {
        let pull = match soc {
            Soc::Bcm2711 => PullScheme::PerPin,
            _ => PullScheme::Strobe,
        };
        Self { soc, pull, windows }
    }

    pub fn pull_scheme(&self) -> PullScheme {
        self.pull
    }

    fn gpio(&self) -> &dyn RegisterWindow {
        &*self.windows.gpio
    }

    /// A block only `/dev/mem` exposes.
    fn block<'a>(
        &self,
        block: &'a Option<Box<dyn RegisterWindow>>,
        what: &'static str,
    ) -> Result<&'a dyn RegisterWindow, UsageError> {
        match block {
            Some(window) => Ok(&**window),
            None => Err(UsageError::Restricted { what }),
        }
    }

    fn set_function(&self, native: u8, function: Function) {
        let geometry = geometry::geometry(native);
        Reg::<()>::new(self.gpio(), geometry.fsel).modify(FieldValue::<u32, ()>::new(
            0b111,
            geometry.fsel_shift,
            function.into(),
        ));
    }

    fn strobe_pull(&self, native: u8, pull: Pull) {
        let geometry = geometry::geometry(native);
        let pud = Reg::<GPPUD::Register>::new(self.gpio(), gpio::GPPUD);
        let clock = Reg::<()>::new(self.gpio(), geometry.pud_clock);

        pud.write(match pull {
            Pull::Off => GPPUD::PUD::Off,
            Pull::Down => GPPUD::PUD::Down,
            Pull::Up => GPPUD::PUD::Up,
        });
        time::delay_microseconds(STROBE_DELAY_US);

        clock.set(1 << geometry.bit);
        time::delay_microseconds(STROBE_DELAY_US);

        pud.set(0);
        time::delay_microseconds(STROBE_DELAY_US);

        clock.set(0);
        time::delay_microseconds(STROBE_DELAY_US);
    }

    fn per_pin_pull(&self, native: u8, pull: Pull) {
        let geometry = geometry::geometry(native);
        // The BCM2711 swaps the up and down codes of the legacy register.
        let code = match pull {
            Pull::Off => 0b00,
            Pull::Up => 0b01,
            Pull::Down => 0b10,
        };
        Reg::<()>::new(self.gpio(), geometry.pull).modify(FieldValue::<u32, ()>::new(
            0b11,
            geometry.pull_shift,
            code,
        ));
    }

    /// Stop a clock generator and wait for it to report idle. Busy is polled without a timeout.
    fn stop_clock(control: &Reg<'_, CM_CTL::Register>, settle_us: u32) {
        control.write(CM_CTL::PASSWD::Passwd + CM_CTL::SRC::Oscillator);
        time::delay_microseconds(settle_us);
        while control.is_set(CM_CTL::BUSY) {
            time::delay_microseconds(1);
        }
    }
}

/// Integer and fractional divisors for `frequency` from the 19.2 MHz oscillator.
pub const fn clock_divisors(frequency: u32) -> (u32, u32) {
    let frequency = frequency as u64;
    let mut divi = (OSCILLATOR_HZ / frequency) as u32;
    let divf = ((OSCILLATOR_HZ % frequency) * 4096 / OSCILLATOR_HZ) as u32;
    if divi > DIVISOR_MAX {
        divi = DIVISOR_MAX;
    }
    (divi, divf)
}

/// The BCM2711 PWM clock runs from a 54 MHz source instead of 19.2 MHz; scale the divisor so
/// the same value gives the same PWM frequency on every board.
pub const fn pwm_divisor(soc: Soc, divisor: u32) -> u32 {
    let divisor = match soc {
        Soc::Bcm2711 => (540 * divisor as u64 / 192) as u32,
        _ => divisor,
    };
    divisor & DIVISOR_MAX
}

//--------------------------------------------------------------------------------------------------
// OS Interface Code
//--------------------------------------------------------------------------------------------------

impl Peripherals for Bcm {
    fn name(&self) -> &'static str {
        match self.pull {
            PullScheme::Strobe => "BCM283x",
            PullScheme::PerPin => "BCM2711",
        }
    }

    fn pin_count(&self) -> u8 {
        Self::PIN_COUNT
    }

    fn set_direction(&self, native: u8, direction: Direction) {
        self.set_function(
            native,
            match direction {
                Direction::Input => Function::Input,
                Direction::Output => Function::Output,
            },
        );
    }

    fn function(&self, native: u8) -> PinFunction {
        let geometry = geometry::geometry(native);
        let bits = self.gpio().read(geometry.fsel) >> geometry.fsel_shift;
        Function::from_bits(bits).into()
    }

    fn read(&self, native: u8) -> Level {
        let geometry = geometry::geometry(native);
        Level::from(self.gpio().read(geometry.level) & (1 << geometry.bit) != 0)
    }

    fn write(&self, native: u8, level: Level) {
        let geometry = geometry::geometry(native);
        let index = match level {
            Level::High => geometry.set,
            Level::Low => geometry.clear,
        };
        self.gpio().write(index, 1 << geometry.bit);
    }

    fn read_bank(&self) -> u32 {
        self.gpio().read(gpio::GPLEV0)
    }

    fn write_bank(&self, set: u32, clear: u32) {
        self.gpio().write(gpio::GPCLR0, clear);
        self.gpio().write(gpio::GPSET0, set);
    }

    fn set_pull(&self, native: u8, pull: Pull) {
        match self.pull {
            PullScheme::Strobe => self.strobe_pull(native, pull),
            PullScheme::PerPin => self.per_pin_pull(native, pull),
        }
    }

    fn route_pwm(&self, native: u8) -> Result<(), UsageError> {
        let capability = pwm_capability(native).ok_or(UsageError::Unsupported {
            what: "PWM",
            native,
        })?;
        self.block(&self.windows.pwm, "PWM")?;
        self.set_function(native, capability.function);
        // Let the pin settle before the PWM block is reprogrammed.
        time::delay_microseconds(CLOCK_STOP_DELAY_US);
        Ok(())
    }

    fn pwm_write(&self, native: u8, value: u32) -> Result<(), UsageError> {
        let capability = pwm_capability(native).ok_or(UsageError::Unsupported {
            what: "PWM",
            native,
        })?;
        let pwm = self.block(&self.windows.pwm, "PWM")?;
        pwm.write(capability.channel.data(), value);
        Ok(())
    }

    fn pwm_set_mode(&self, mode: PwmMode) -> Result<(), UsageError> {
        let pwm = self.block(&self.windows.pwm, "PWM")?;
        let control = Reg::<PWM_CTL::Register>::new(pwm, pwm::CTL);
        match mode {
            PwmMode::MarkSpace => control.write(
                PWM_CTL::PWEN1::SET + PWM_CTL::PWEN2::SET + PWM_CTL::MSEN1::SET + PWM_CTL::MSEN2::SET,
            ),
            PwmMode::Balanced => control.write(PWM_CTL::PWEN1::SET + PWM_CTL::PWEN2::SET),
        }
        Ok(())
    }

    fn pwm_set_range(&self, range: u32) -> Result<(), UsageError> {
        let pwm = self.block(&self.windows.pwm, "PWM")?;
        pwm.write(pwm::RNG1, range);
        time::delay_microseconds(RANGE_DELAY_US);
        pwm.write(pwm::RNG2, range);
        time::delay_microseconds(RANGE_DELAY_US);
        Ok(())
    }

    fn pwm_set_clock(&self, divisor: u32) -> Result<(), UsageError> {
        let pwm = self.block(&self.windows.pwm, "PWM clock")?;
        let clocks = self.block(&self.windows.clock, "PWM clock")?;
        let divisor = pwm_divisor(self.soc, divisor);

        let pwm_control = Reg::<PWM_CTL::Register>::new(pwm, pwm::CTL);
        let clock_control = Reg::<CM_CTL::Register>::new(clocks, clock::CM_PWMCTL);

        // Changing the divisor while the clock runs glitches it at low divisors.
        let saved = pwm_control.get();
        pwm_control.set(0);
        Self::stop_clock(&clock_control, CLOCK_STOP_DELAY_US);

        Reg::<CM_DIV::Register>::new(clocks, clock::CM_PWMDIV)
            .write(CM_DIV::PASSWD::Passwd + CM_DIV::DIVI.val(divisor));
        clock_control.write(CM_CTL::PASSWD::Passwd + CM_CTL::ENAB::SET + CM_CTL::SRC::Oscillator);

        pwm_control.set(saved);
        Ok(())
    }

    fn route_clock(&self, native: u8) -> Result<(), UsageError> {
        let capability = clock_capability(native).ok_or(UsageError::Unsupported {
            what: "clock",
            native,
        })?;
        self.block(&self.windows.clock, "GPIO clock")?;
        self.set_function(native, capability.function);
        time::delay_microseconds(CLOCK_STOP_DELAY_US);
        Ok(())
    }

    fn clock_set(&self, native: u8, frequency: u32) -> Result<(), UsageError> {
        let capability = clock_capability(native).ok_or(UsageError::Unsupported {
            what: "clock",
            native,
        })?;
        if frequency == 0 {
            return Err(UsageError::OutOfRange {
                what: "clock frequency",
                value: frequency,
            });
        }
        let clocks = self.block(&self.windows.clock, "GPIO clock")?;
        let (divi, divf) = clock_divisors(frequency);

        let control = Reg::<CM_CTL::Register>::new(clocks, capability.control);
        Self::stop_clock(&control, 0);
        Reg::<CM_DIV::Register>::new(clocks, capability.divisor)
            .write(CM_DIV::PASSWD::Passwd + CM_DIV::DIVI.val(divi) + CM_DIV::DIVF.val(divf));
        control.write(CM_CTL::PASSWD::Passwd + CM_CTL::ENAB::SET + CM_CTL::SRC::Oscillator);
        Ok(())
    }

    fn set_pad_drive(&self, group: u8, value: u8) -> Result<(), UsageError> {
        if group >= pads::GROUPS {
            return Err(UsageError::OutOfRange {
                what: "pad group",
                value: group.into(),
            });
        }
        let pads_block = self.block(&self.windows.pads, "pad drive")?;
        Reg::<PADS_CTL::Register>::new(pads_block, pads::PADS_GPIO_0_27 + group as usize).write(
            PADS_CTL::PASSWD::Passwd
                + PADS_CTL::SLEW::SET
                + PADS_CTL::HYST::SET
                + PADS_CTL::DRIVE.val((value & 0b111).into()),
        );
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::mmio::{Access, FakeWindow},
        core::time::Duration,
        std::sync::Arc,
    };

    struct Fakes {
        gpio: Arc<FakeWindow>,
        pwm: Arc<FakeWindow>,
        clock: Arc<FakeWindow>,
        pads: Arc<FakeWindow>,
    }

    fn full(soc: Soc) -> (Bcm, Fakes) {
        let fakes = Fakes {
            gpio: Arc::new(FakeWindow::new(1024)),
            pwm: Arc::new(FakeWindow::new(1024)),
            clock: Arc::new(FakeWindow::new(1024)),
            pads: Arc::new(FakeWindow::new(1024)),
        };
        let windows = Windows::bcm(
            Box::new(fakes.gpio.clone()),
            Box::new(fakes.pwm.clone()),
            Box::new(fakes.clock.clone()),
            Box::new(fakes.pads.clone()),
        );
        (Bcm::new(soc, windows), fakes)
    }

    fn restricted() -> (Bcm, Arc<FakeWindow>) {
        let gpio = Arc::new(FakeWindow::new(1024));
        let windows = Windows::restricted(Box::new(gpio.clone()));
        (Bcm::new(Soc::Bcm2837, windows), gpio)
    }

    #[test]
    fn pin_transitions() {
        let (bcm, fakes) = full(Soc::Bcm2835);
        bcm.set_direction(1, Direction::Output);
        assert_eq!(fakes.gpio.peek(0), 0b001_000);
        bcm.set_direction(12, Direction::Input);
        assert_eq!(fakes.gpio.peek(1), 0);
        bcm.set_function(35, Function::Alt1);
        assert_eq!(fakes.gpio.peek(3), 0b101_000_000_000_000_000);
        assert_eq!(bcm.function(35), PinFunction::Alt(1));
        assert_eq!(bcm.function(1), PinFunction::Output);
    }

    #[test]
    fn function_select_keeps_neighbours() {
        let (bcm, fakes) = full(Soc::Bcm2835);
        fakes.gpio.poke(1, 0xffff_ffff);
        bcm.set_direction(17, Direction::Input);
        assert_eq!(fakes.gpio.peek(1), 0xffff_ffff & !(0b111 << 21));
    }

    #[test]
    fn outputs_are_single_word_writes() {
        let (bcm, fakes) = full(Soc::Bcm2835);
        bcm.write(1, Level::High);
        bcm.write(1, Level::Low);
        bcm.write(35, Level::High);
        bcm.write(35, Level::Low);
        assert_eq!(
            fakes.gpio.accesses(),
            vec![
                Access::Write(7, 0b10),
                Access::Write(10, 0b10),
                Access::Write(8, 0b1000),
                Access::Write(11, 0b1000),
            ]
        );
    }

    #[test]
    fn inputs_test_the_level_bit() {
        let (bcm, fakes) = full(Soc::Bcm2835);
        assert_eq!(bcm.read(1), Level::Low);
        fakes.gpio.poke(13, 0b10);
        assert_eq!(bcm.read(1), Level::High);
        assert_eq!(bcm.read(35), Level::Low);
        fakes.gpio.poke(14, 0b1000);
        assert_eq!(bcm.read(35), Level::High);
    }

    #[test]
    fn legacy_pull_is_a_four_step_strobe() {
        let (bcm, fakes) = full(Soc::Bcm2837);
        bcm.set_pull(17, Pull::Up);
        assert_eq!(
            fakes.gpio.writes(),
            vec![(37, 0b10), (38, 1 << 17), (37, 0), (38, 0)]
        );
        for gap in fakes.gpio.write_gaps() {
            assert!(gap >= Duration::from_micros(5), "strobe step after {gap:?}");
        }

        fakes.gpio.clear_log();
        bcm.set_pull(35, Pull::Down);
        assert_eq!(
            fakes.gpio.writes(),
            vec![(37, 0b01), (39, 1 << 3), (37, 0), (39, 0)]
        );
    }

    #[test]
    fn bcm2711_pull_is_a_two_bit_field() {
        let (bcm, fakes) = full(Soc::Bcm2711);
        fakes.gpio.poke(58, 0xffff_ffff);
        bcm.set_pull(17, Pull::Up);
        assert_eq!(fakes.gpio.peek(58), 0xffff_fff7);
        bcm.set_pull(17, Pull::Down);
        assert_eq!(fakes.gpio.peek(58), 0xffff_fffb);
        bcm.set_pull(17, Pull::Off);
        assert_eq!(fakes.gpio.peek(58), 0xffff_fff3);
        assert_eq!(fakes.gpio.writes().len(), 3);
    }

    #[test]
    fn pwm_clock_sequence() {
        let (bcm, fakes) = full(Soc::Bcm2837);
        fakes.pwm.poke(pwm::CTL, 0x81);
        bcm.pwm_set_clock(32).unwrap();

        assert_eq!(
            fakes.pwm.writes(),
            vec![(pwm::CTL, 0), (pwm::CTL, 0x81)],
            "PWM stopped and restored"
        );
        assert_eq!(
            fakes.clock.writes(),
            vec![
                (clock::CM_PWMCTL, 0x5a00_0001),
                (clock::CM_PWMDIV, 0x5a00_0000 | (32 << 12)),
                (clock::CM_PWMCTL, 0x5a00_0011),
            ]
        );
    }

    #[test]
    fn bcm2711_rescales_the_pwm_divisor() {
        assert_eq!(pwm_divisor(Soc::Bcm2711, 32), 90);
        assert_eq!(pwm_divisor(Soc::Bcm2837, 32), 32);
        assert_eq!(pwm_divisor(Soc::Bcm2835, 4096), 0);
        assert_eq!(pwm_divisor(Soc::Bcm2711, 4095), (540 * 4095 / 192) & 4095);

        let (bcm, fakes) = full(Soc::Bcm2711);
        bcm.pwm_set_clock(32).unwrap();
        assert_eq!(fakes.clock.peek(clock::CM_PWMDIV), 0x5a00_0000 | (90 << 12));
    }

    #[test]
    fn pwm_modes_and_range() {
        let (bcm, fakes) = full(Soc::Bcm2835);
        bcm.pwm_set_mode(PwmMode::MarkSpace).unwrap();
        assert_eq!(fakes.pwm.peek(pwm::CTL), 0x8181);
        bcm.pwm_set_mode(PwmMode::Balanced).unwrap();
        assert_eq!(fakes.pwm.peek(pwm::CTL), 0x0101);

        fakes.pwm.clear_log();
        bcm.pwm_set_range(1024).unwrap();
        assert_eq!(
            fakes.pwm.writes(),
            vec![(pwm::RNG1, 1024), (pwm::RNG2, 1024)]
        );
    }

    #[test]
    fn pwm_routing_and_data_registers() {
        let (bcm, fakes) = full(Soc::Bcm2835);
        bcm.route_pwm(18).unwrap();
        assert_eq!(bcm.function(18), PinFunction::Alt(5));
        bcm.pwm_write(18, 512).unwrap();
        bcm.pwm_write(13, 100).unwrap();
        assert_eq!(fakes.pwm.peek(pwm::DAT1), 512);
        assert_eq!(fakes.pwm.peek(pwm::DAT2), 100);

        fakes.gpio.clear_log();
        assert_eq!(
            bcm.route_pwm(17),
            Err(UsageError::Unsupported {
                what: "PWM",
                native: 17
            })
        );
        assert_eq!(fakes.gpio.access_count(), 0);
    }

    #[test]
    fn clock_divisor_math() {
        assert_eq!(clock_divisors(100_000), (192, 0));
        assert_eq!(clock_divisors(1_000_000), (19, 42));
        assert_eq!(clock_divisors(19_200_000), (1, 0));
        assert_eq!(clock_divisors(1_000).0, 4095);
    }

    #[test]
    fn gpio_clock_sequence() {
        let (bcm, fakes) = full(Soc::Bcm2835);
        bcm.route_clock(4).unwrap();
        assert_eq!(bcm.function(4), PinFunction::Alt(0));
        bcm.clock_set(4, 100_000).unwrap();
        assert_eq!(
            fakes.clock.writes(),
            vec![
                (clock::CM_GP0CTL, 0x5a00_0001),
                (clock::CM_GP0DIV, 0x5a00_0000 | (192 << 12)),
                (clock::CM_GP0CTL, 0x5a00_0011),
            ]
        );
        assert!(bcm.clock_set(17, 100_000).is_err());
        assert!(bcm.clock_set(4, 0).is_err());
    }

    #[test]
    fn pad_drive() {
        let (bcm, fakes) = full(Soc::Bcm2835);
        bcm.set_pad_drive(1, 7).unwrap();
        assert_eq!(fakes.pads.peek(12), 0x5a00_001f);
        bcm.set_pad_drive(0, 0x0a).unwrap();
        assert_eq!(fakes.pads.peek(11), 0x5a00_001a);
        assert!(bcm.set_pad_drive(3, 1).is_err());
    }

    #[test]
    fn restricted_mode_refuses_pwm_clock_and_pads() {
        let (bcm, gpio) = restricted();
        let restricted = |r: Result<(), UsageError>| matches!(r, Err(UsageError::Restricted { .. }));
        assert!(restricted(bcm.route_pwm(18)));
        assert!(restricted(bcm.pwm_set_clock(32)));
        assert!(restricted(bcm.pwm_set_range(1024)));
        assert!(restricted(bcm.clock_set(4, 100_000)));
        assert!(restricted(bcm.set_pad_drive(0, 7)));
        assert_eq!(gpio.access_count(), 0);

        bcm.write(17, Level::High);
        assert_eq!(gpio.writes(), vec![(7, 1 << 17)]);
    }

    #[test]
    fn bank_writes_clear_before_set() {
        let (bcm, fakes) = full(Soc::Bcm2835);
        bcm.write_bank(0b1010, 0b0101);
        assert_eq!(fakes.gpio.writes(), vec![(10, 0b0101), (7, 0b1010)]);
        fakes.gpio.poke(13, 0xdead);
        assert_eq!(bcm.read_bank(), 0xdead);
    }
}
