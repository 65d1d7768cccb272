/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! Pin numbering.
//!
//! Callers address pins in one of three schemes. The relation between the schemes is a
//! property of the board's silkscreen, not of any formula, so each header generation has
//! its own literal tables.

use {
    crate::board::Layout,
    core::{fmt, str::FromStr},
    static_assertions::const_assert,
};

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

/// How caller-supplied pin numbers are interpreted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberingScheme {
    /// Sequential wiringPi numbers.
    #[default]
    Logical,
    /// The SoC's own GPIO numbers.
    Native,
    /// Position on the 40-pin header (plus the P5 connector on Rev 2 boards).
    Physical,
}

/// Number of scheme-relative pins handled onboard; everything at or above goes to extensions.
pub const ONBOARD_PINS: u32 = 64;

/// Scheme-relative to native pin translation, fixed for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinMap {
    layout: Layout,
    scheme: NumberingScheme,
    table: Option<&'static PinTable>,
}

//--------------------------------------------------------------------------------------------------
// Private Definitions
//--------------------------------------------------------------------------------------------------

type PinTable = [i8; ONBOARD_PINS as usize];

/// Not connected.
const NC: i8 = -1;

const WPI_TO_NATIVE_REV1: PinTable = [
    17, 18, 21, 22, 23, 24, 25, 4, // From the Original Wiki - GPIO 0 through 7
    0, 1, // I2C  - SDA0, SCL0
    8, 7, // SPI  - CE1, CE0
    10, 9, 11, // SPI  - MOSI, MISO, SCLK
    14, 15, // UART - Tx, Rx
    // Padding:
    NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, // ... 31
    NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, // ... 47
    NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, // ... 63
];

const WPI_TO_NATIVE_REV2: PinTable = [
    17, 18, 27, 22, 23, 24, 25, 4, // From the Original Wiki - GPIO 0 through 7
    2, 3, // I2C  - SDA1, SCL1
    8, 7, // SPI  - CE1, CE0
    10, 9, 11, // SPI  - MOSI, MISO, SCLK
    14, 15, // UART - Tx, Rx
    28, 29, 30, 31, // Rev 2: New GPIOs 8 though 11
    5, 6, 13, 19, 26, // B+
    12, 16, 20, 21, // B+
    0, 1, // B+ ID_SD, ID_SC
    // Padding:
    NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, // ... 47
    NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, // ... 63
];

const PHYS_TO_NATIVE_REV1: PinTable = [
    NC, // 0
    NC, NC, // 1, 2
    0, NC, //
    1, NC, //
    4, 14, //
    NC, 15, //
    17, 18, //
    21, NC, //
    22, 23, //
    NC, 24, //
    10, NC, //
    9, 25, //
    11, 8, //
    NC, 7, // 25, 26
    // Padding:
    NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, // ... 47
    NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, NC, // ... 63
];

const PHYS_TO_NATIVE_REV2: PinTable = [
    NC, // 0
    NC, NC, // 1, 2
    2, NC, //
    3, NC, //
    4, 14, //
    NC, 15, //
    17, 18, //
    27, NC, //
    22, 23, //
    NC, 24, //
    10, NC, //
    9, 25, //
    11, 8, //
    NC, 7, // 25, 26
    // B+
    0, 1, //
    5, NC, //
    6, 12, //
    13, NC, //
    19, 16, //
    26, 20, //
    NC, 21, // 39, 40
    // The P5 connector on the Rev 2 boards:
    NC, NC, //
    NC, NC, //
    NC, NC, //
    NC, NC, //
    NC, NC, //
    28, 29, //
    30, 31, //
    NC, NC, //
    NC, NC, //
    NC, NC, //
    NC, NC, // 61, 62
    NC,     // 63
];

/// Header function of each native pin on the standard layout.
const NATIVE_NAMES: [&str; ONBOARD_PINS as usize] = [
    "SDA.0", "SCL.0", "SDA.1", "SCL.1", "GPIO. 7", "GPIO.21", "GPIO.22", "CE1", // 0..7
    "CE0", "MISO", "MOSI", "SCLK", "GPIO.26", "GPIO.23", "TxD", "RxD", // 8..15
    "GPIO.27", "GPIO. 0", "GPIO. 1", "GPIO.24", "GPIO.28", "GPIO.29", "GPIO. 3", "GPIO. 4", // ..23
    "GPIO. 5", "GPIO. 6", "GPIO.25", "GPIO. 2", "GPIO.17", "GPIO.18", "GPIO.19", "GPIO.20", // ..31
    "", "", "", "", "", "", "", "", "", "", "", "", "", "", "", "", // 32..47
    "", "", "", "", "", "", "", "", "", "", "", "", "", "", "", "", // 48..63
];

/// Labels of the header pins that are not GPIOs.
const POWER_PINS: [(u32, &str); 12] = [
    (1, "3.3v"),
    (2, "5v"),
    (4, "5v"),
    (6, "0v"),
    (9, "0v"),
    (14, "0v"),
    (17, "3.3v"),
    (20, "0v"),
    (25, "0v"),
    (30, "0v"),
    (34, "0v"),
    (39, "0v"),
];

/// Every entry is either NC or a native pin the SoCs can have.
const fn table_is_valid(table: &PinTable) -> bool {
    let mut i = 0;
    while i < table.len() {
        if table[i] != NC && (table[i] < 0 || table[i] > 53) {
            return false;
        }
        i += 1;
    }
    true
}

const fn connected(table: &PinTable) -> usize {
    let mut i = 0;
    let mut count = 0;
    while i < table.len() {
        if table[i] != NC {
            count += 1;
        }
        i += 1;
    }
    count
}

const_assert!(table_is_valid(&WPI_TO_NATIVE_REV1));
const_assert!(table_is_valid(&WPI_TO_NATIVE_REV2));
const_assert!(table_is_valid(&PHYS_TO_NATIVE_REV1));
const_assert!(table_is_valid(&PHYS_TO_NATIVE_REV2));
// Rev 1 exposes 17 GPIOs, Rev 2 adds P5 and the B+ header for 32.
const_assert!(connected(&WPI_TO_NATIVE_REV1) == 17);
const_assert!(connected(&PHYS_TO_NATIVE_REV1) == 17);
const_assert!(connected(&WPI_TO_NATIVE_REV2) == 32);
const_assert!(connected(&PHYS_TO_NATIVE_REV2) == 32);

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl NumberingScheme {
    pub const fn name(self) -> &'static str {
        match self {
            NumberingScheme::Logical => "wPi",
            NumberingScheme::Native => "BCM",
            NumberingScheme::Physical => "Physical",
        }
    }
}

impl fmt::Display for NumberingScheme {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NumberingScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wpi" | "logical" | "wiringpi" => Ok(NumberingScheme::Logical),
            "bcm" | "gpio" | "native" => Ok(NumberingScheme::Native),
            "phys" | "physical" | "header" => Ok(NumberingScheme::Physical),
            other => Err(format!("unknown numbering scheme {other:?}")),
        }
    }
}

impl PinMap {
    pub const fn new(layout: Layout, scheme: NumberingScheme) -> Self {
        let table = match (scheme, layout) {
            (NumberingScheme::Native, _) => None,
            (NumberingScheme::Logical, Layout::Legacy) => Some(&WPI_TO_NATIVE_REV1),
            (NumberingScheme::Logical, Layout::Standard) => Some(&WPI_TO_NATIVE_REV2),
            (NumberingScheme::Physical, Layout::Legacy) => Some(&PHYS_TO_NATIVE_REV1),
            (NumberingScheme::Physical, Layout::Standard) => Some(&PHYS_TO_NATIVE_REV2),
        };
        Self {
            layout,
            scheme,
            table,
        }
    }

    pub const fn scheme(&self) -> NumberingScheme {
        self.scheme
    }

    pub const fn layout(&self) -> Layout {
        self.layout
    }

    /// Size of the onboard pin range of every scheme.
    pub const fn onboard_len(&self) -> u32 {
        ONBOARD_PINS
    }

    /// Native pin behind a scheme-relative onboard pin, `None` if nothing is connected there
    /// or the pin is outside the onboard range.
    pub const fn native(&self, pin: u32) -> Option<u8> {
        if pin >= ONBOARD_PINS {
            return None;
        }
        match self.table {
            None => Some(pin as u8),
            Some(table) => match table[pin as usize] {
                NC => None,
                native => Some(native as u8),
            },
        }
    }

    /// First scheme-relative pin that resolves to `native`.
    pub fn from_native(&self, native: u8) -> Option<u32> {
        (0..ONBOARD_PINS).find(|&pin| self.native(pin) == Some(native))
    }

    /// All connected scheme-relative pins in order, with their native pin.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u8)> + '_ {
        (0..ONBOARD_PINS).filter_map(|pin| self.native(pin).map(|native| (pin, native)))
    }
}

/// wiringPi number to native pin.
pub const fn wpi_to_native(layout: Layout, pin: u32) -> Option<u8> {
    PinMap::new(layout, NumberingScheme::Logical).native(pin)
}

/// Header position to native pin.
pub const fn phys_to_native(layout: Layout, pin: u32) -> Option<u8> {
    PinMap::new(layout, NumberingScheme::Physical).native(pin)
}

/// Header function name of a native pin, empty if it is not routed to a header.
pub fn native_name(native: u8) -> &'static str {
    NATIVE_NAMES.get(native as usize).copied().unwrap_or("")
}

/// Label of a physical header pin: the GPIO name, or its power rail.
pub fn header_label(layout: Layout, physical: u32) -> &'static str {
    if let Some(native) = phys_to_native(layout, physical) {
        return match (layout, native) {
            // The Rev 1 header routes I2C0 where later boards route I2C1.
            (Layout::Legacy, 0) => "SDA.0",
            (Layout::Legacy, 1) => "SCL.0",
            (Layout::Legacy, 21) => "GPIO. 2",
            _ => native_name(native),
        };
    }
    POWER_PINS
        .iter()
        .find(|(pin, _)| *pin == physical)
        .map_or("", |(_, label)| *label)
}

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------
