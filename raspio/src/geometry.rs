/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! Register geometry.
//!
//! Where each native pin lives in the register blocks: which word, which bit, which
//! alternate function brings out PWM or a general purpose clock. Regular layouts are
//! computed, the irregular PWM and clock subsets are literal tables.

// Descriptions taken from
// https://github.com/raspberrypi/documentation/files/1888662/BCM2837-ARM-Peripherals.-.Revised.-.V2-1.pdf
// and the RP1 peripherals datasheet.

use {core::fmt, static_assertions::const_assert_eq};

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

/// Word indices in the BCM GPIO block.
pub mod gpio {
    pub const GPFSEL0: usize = 0;
    pub const GPSET0: usize = 7;
    pub const GPCLR0: usize = 10;
    pub const GPLEV0: usize = 13;
    pub const GPPUD: usize = 37;
    pub const GPPUDCLK0: usize = 38;
    /// BCM2711 only.
    pub const GPIO_PUP_PDN_CNTRL0: usize = 57;
}

/// Word indices in the PWM block.
pub mod pwm {
    pub const CTL: usize = 0;
    pub const STA: usize = 1;
    pub const RNG1: usize = 4;
    pub const DAT1: usize = 5;
    pub const RNG2: usize = 8;
    pub const DAT2: usize = 9;
}

/// Word indices in the clock manager block.
pub mod clock {
    pub const CM_GP0CTL: usize = 28;
    pub const CM_GP0DIV: usize = 29;
    pub const CM_GP1CTL: usize = 30;
    pub const CM_GP1DIV: usize = 31;
    pub const CM_GP2CTL: usize = 32;
    pub const CM_GP2DIV: usize = 33;
    pub const CM_PWMCTL: usize = 40;
    pub const CM_PWMDIV: usize = 41;
}

/// Word indices in the pads block.
pub mod pads {
    /// Pad control of bank 0 (GPIO 0-27); banks 1 and 2 follow.
    pub const PADS_GPIO_0_27: usize = 11;
    pub const GROUPS: u8 = 3;
}

/// Word indices in the system timer block.
pub mod timer {
    pub const CONTROL: usize = 0x408 / 4;
    pub const PRE_DIVIDER: usize = 0x41c / 4;
}

/// Word indices in the RP1 blocks.
pub mod rp1 {
    pub const PINS: u8 = 28;
    /// IO_BANK0: per-pin STATUS, CTRL pairs.
    pub const fn status(pin: u8) -> usize {
        2 * pin as usize
    }
    pub const fn ctrl(pin: u8) -> usize {
        2 * pin as usize + 1
    }
    /// PADS_BANK0: word 0 is the voltage select, pins follow.
    pub const fn pad(pin: u8) -> usize {
        1 + pin as usize
    }
    /// SYS_RIO0 registers and their atomic aliases.
    pub const RIO_OUT: usize = 0;
    pub const RIO_OE: usize = 1;
    /// Input levels without the two-flop synchroniser, at byte offset 0x08.
    pub const RIO_NOSYNC_IN: usize = 2;
    pub const RIO_SET: usize = 0x2000 / 4;
    pub const RIO_CLR: usize = 0x3000 / 4;
}

/// Alternate function select code of the BCM GPIO block.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Input = 0b000,
    Output = 0b001,
    Alt0 = 0b100,
    Alt1 = 0b101,
    Alt2 = 0b110,
    Alt3 = 0b111,
    Alt4 = 0b011,
    Alt5 = 0b010,
}

/// What a pin is currently routed to, independent of the SoC generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinFunction {
    Input,
    Output,
    Alt(u8),
    /// Not connected to any function (RP1 `NULL` selection).
    Off,
}

/// Location of one native pin in the BCM GPIO block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub native: u8,
    pub fsel: usize,
    pub fsel_shift: usize,
    pub set: usize,
    pub clear: usize,
    pub level: usize,
    /// Bit of the pin in the SET/CLR/LEV/PUDCLK words.
    pub bit: usize,
    pub pud_clock: usize,
    /// BCM2711 pull register and field shift.
    pub pull: usize,
    pub pull_shift: usize,
}

/// PWM channel a pin can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PwmChannel {
    One,
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmGeometry {
    pub function: Function,
    pub channel: PwmChannel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockGeometry {
    pub function: Function,
    pub control: usize,
    pub divisor: usize,
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl Function {
    /// Decode a 3-bit function select field.
    pub const fn from_bits(bits: u32) -> Function {
        match bits & 0b111 {
            0b000 => Function::Input,
            0b001 => Function::Output,
            0b100 => Function::Alt0,
            0b101 => Function::Alt1,
            0b110 => Function::Alt2,
            0b111 => Function::Alt3,
            0b011 => Function::Alt4,
            _ => Function::Alt5,
        }
    }
}

impl ::core::convert::From<Function> for u32 {
    fn from(f: Function) -> Self {
        f as u32
    }
}

impl From<Function> for PinFunction {
    fn from(f: Function) -> Self {
        match f {
            Function::Input => PinFunction::Input,
            Function::Output => PinFunction::Output,
            Function::Alt0 => PinFunction::Alt(0),
            Function::Alt1 => PinFunction::Alt(1),
            Function::Alt2 => PinFunction::Alt(2),
            Function::Alt3 => PinFunction::Alt(3),
            Function::Alt4 => PinFunction::Alt(4),
            Function::Alt5 => PinFunction::Alt(5),
        }
    }
}

impl fmt::Display for PinFunction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PinFunction::Input => f.write_str("IN"),
            PinFunction::Output => f.write_str("OUT"),
            PinFunction::Alt(n) => write!(f, "ALT{n}"),
            PinFunction::Off => f.write_str("OFF"),
        }
    }
}

impl PwmChannel {
    pub const fn data(self) -> usize {
        match self {
            PwmChannel::One => pwm::DAT1,
            PwmChannel::Two => pwm::DAT2,
        }
    }
}

/// BCM register geometry of a native pin (0..=53).
pub const fn geometry(native: u8) -> Geometry {
    let pin = native as usize;
    Geometry {
        native,
        fsel: gpio::GPFSEL0 + pin / 10,
        fsel_shift: (pin % 10) * 3,
        set: gpio::GPSET0 + pin / 32,
        clear: gpio::GPCLR0 + pin / 32,
        level: gpio::GPLEV0 + pin / 32,
        bit: pin % 32,
        pud_clock: gpio::GPPUDCLK0 + pin / 32,
        pull: gpio::GPIO_PUP_PDN_CNTRL0 + pin / 16,
        pull_shift: (pin % 16) * 2,
    }
}

/// Alternate function and channel bringing PWM out on a native pin.
pub const fn pwm_capability(native: u8) -> Option<PwmGeometry> {
    let (function, channel) = match native {
        12 => (Function::Alt0, PwmChannel::One),
        13 => (Function::Alt0, PwmChannel::Two),
        18 => (Function::Alt5, PwmChannel::One),
        19 => (Function::Alt5, PwmChannel::Two),
        40 => (Function::Alt0, PwmChannel::One),
        41 => (Function::Alt0, PwmChannel::Two),
        45 => (Function::Alt0, PwmChannel::Two),
        _ => return None,
    };
    Some(PwmGeometry { function, channel })
}

/// Alternate function and clock manager registers of a general purpose clock pin.
pub const fn clock_capability(native: u8) -> Option<ClockGeometry> {
    use clock::*;
    let (function, control, divisor) = match native {
        4 | 32 | 34 => (Function::Alt0, CM_GP0CTL, CM_GP0DIV),
        20 => (Function::Alt5, CM_GP0CTL, CM_GP0DIV),
        5 | 42 | 44 => (Function::Alt0, CM_GP1CTL, CM_GP1DIV),
        21 => (Function::Alt5, CM_GP1CTL, CM_GP1DIV),
        6 | 43 => (Function::Alt0, CM_GP2CTL, CM_GP2DIV),
        _ => return None,
    };
    Some(ClockGeometry {
        function,
        control,
        divisor,
    })
}

// The blocks are 4 KiB windows, every index must stay inside.
const_assert_eq!(geometry(53).fsel, 5);
const_assert_eq!(geometry(53).pull, 60);
const_assert_eq!((rp1::RIO_CLR + rp1::RIO_NOSYNC_IN < 16 * 1024 / 4), true);

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_select_fields() {
        assert_eq!(geometry(1).fsel, 0);
        assert_eq!(geometry(1).fsel_shift, 3);
        assert_eq!(geometry(12).fsel, 1);
        assert_eq!(geometry(12).fsel_shift, 6);
        assert_eq!(geometry(35).fsel, 3);
        assert_eq!(geometry(35).fsel_shift, 15);
    }

    #[test]
    fn set_clear_level_banks() {
        let low = geometry(17);
        assert_eq!((low.set, low.clear, low.level, low.bit), (7, 10, 13, 17));
        let high = geometry(35);
        assert_eq!((high.set, high.clear, high.level, high.bit), (8, 11, 14, 3));
        assert_eq!(high.pud_clock, 39);
    }

    #[test]
    fn bcm2711_pull_fields() {
        assert_eq!((geometry(0).pull, geometry(0).pull_shift), (57, 0));
        assert_eq!((geometry(17).pull, geometry(17).pull_shift), (58, 2));
        assert_eq!((geometry(47).pull, geometry(47).pull_shift), (59, 30));
    }

    #[test]
    fn pwm_pins() {
        let capable: Vec<u8> = (0..54).filter(|&p| pwm_capability(p).is_some()).collect();
        assert_eq!(capable, vec![12, 13, 18, 19, 40, 41, 45]);
        assert_eq!(
            pwm_capability(18),
            Some(PwmGeometry {
                function: Function::Alt5,
                channel: PwmChannel::One
            })
        );
        assert_eq!(pwm_capability(45).map(|g| g.channel.data()), Some(pwm::DAT2));
    }

    #[test]
    fn clock_pins() {
        let capable: Vec<u8> = (0..54).filter(|&p| clock_capability(p).is_some()).collect();
        assert_eq!(capable, vec![4, 5, 6, 20, 21, 32, 34, 42, 43, 44]);
        let gp1 = clock_capability(21).unwrap();
        assert_eq!(gp1.function, Function::Alt5);
        assert_eq!((gp1.control, gp1.divisor), (30, 31));
        assert_eq!(clock_capability(43).map(|g| g.control), Some(32));
    }

    #[test]
    fn function_codes_round_trip_through_bits() {
        for f in [
            Function::Input,
            Function::Output,
            Function::Alt0,
            Function::Alt1,
            Function::Alt2,
            Function::Alt3,
            Function::Alt4,
            Function::Alt5,
        ] {
            assert_eq!(Function::from_bits(f as u32), f);
        }
        assert_eq!(PinFunction::from(Function::Alt4), PinFunction::Alt(4));
    }

    #[test]
    fn rp1_indices() {
        assert_eq!(rp1::status(4), 8);
        assert_eq!(rp1::ctrl(4), 9);
        assert_eq!(rp1::pad(0), 1);
        assert_eq!(rp1::RIO_SET, 0x800);
        assert_eq!(rp1::RIO_CLR, 0xc00);
    }
}
