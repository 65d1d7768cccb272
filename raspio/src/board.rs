/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! Board identification.
//!
//! The kernel exposes the board revision code as the `Revision` line of
//! `/proc/cpuinfo`. Two encodings exist: the old one is an opaque 4-digit
//! code looked up in a fixed table, the new one (bit 23 set) packs model,
//! maker, memory and revision into bit-fields.
//!
//! ```text
//!  31   26 25 24 23 22   20 19  16 15  12 11           4 3      0
//! +-------+-----+--+-------+------+------+--------------+--------+
//! |   -   | W O |N |  MEM  | MAKE | PROC |     TYPE     |  REV   |
//! +-------+-----+--+-------+------+------+--------------+--------+
//! ```

use {
    bit_field::BitField,
    core::fmt,
    log::{debug, warn},
    snafu::{ensure, OptionExt, Snafu},
};

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum BoardError {
    #[snafu(display("no \"Revision\" line in the hardware descriptor"))]
    NoRevision,
    #[snafu(display("no colon in the \"Revision\" line: {line:?}"))]
    NoColon { line: String },
    #[snafu(display("revision value {value:?} does not start with a hex digit"))]
    NotHex { value: String },
    #[snafu(display("revision value {value:?} is shorter than 4 characters"))]
    TooShort { value: String },
    #[snafu(display("revision value {value:?} does not fit in 32 bits"))]
    Overflow { value: String },
    #[snafu(display("revision code {code:#08x} names unknown board type {kind:#04x}"))]
    UnknownModel { code: u32, kind: u8 },
    #[snafu(display(
        "revision code {code:#08x} uses the new encoding but looks like a Rev 1 header layout"
    ))]
    InconsistentLayout { code: u32 },
}

pub type Result<T> = ::core::result::Result<T, BoardError>;

/// Board type, numbered the way the new-style revision code numbers it.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Model {
    A = 0x00,
    B = 0x01,
    APlus = 0x02,
    BPlus = 0x03,
    Pi2B = 0x04,
    Alpha = 0x05,
    Cm1 = 0x06,
    Pi3B = 0x08,
    Zero = 0x09,
    Cm3 = 0x0a,
    ZeroW = 0x0c,
    Pi3BPlus = 0x0d,
    Pi3APlus = 0x0e,
    Cm3Plus = 0x10,
    Pi4B = 0x11,
    Zero2W = 0x12,
    Pi400 = 0x13,
    Cm4 = 0x14,
    Cm4S = 0x15,
    Pi5 = 0x17,
    Cm5 = 0x18,
    Pi500 = 0x19,
    Cm5Lite = 0x1a,
}

/// Board manufacturer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Maker {
    Sony,
    Egoman,
    Embest,
    SonyJapan,
    Embest2,
    Stadium,
    Other(u8),
}

/// Header pinout generation.
///
/// Only the very first Model B boards (codes `0002` and `0003`) have the Rev 1
/// header with 17 usable GPIOs; everything else shares the Rev 2 numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    Legacy,
    Standard,
}

/// SoC family, which decides the peripheral base and register behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Soc {
    Bcm2835,
    Bcm2837,
    Bcm2711,
    /// BCM2712 with the RP1 I/O controller.
    Bcm2712,
}

/// Everything the rest of the crate needs to know about the running board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardClassification {
    /// Raw revision code as read from the descriptor.
    pub code: u32,
    pub model: Model,
    /// Silicon / PCB revision. Old-style codes report 0 (v1), 1 (v1.1), 2 (v1.2).
    pub revision: u8,
    /// Memory size class, see [`BoardClassification::memory_mb`].
    pub memory: u8,
    pub maker: Maker,
    pub layout: Layout,
    /// The warranty bit (or an old-style code longer than 4 digits) is set.
    pub overvolted: bool,
    /// The code used the new bit-field encoding.
    pub new_style: bool,
    /// Set once the window manager fell back to the restricted device.
    pub restricted: bool,
}

//--------------------------------------------------------------------------------------------------
// Private Definitions
//--------------------------------------------------------------------------------------------------

const NEW_STYLE_BIT: usize = 23;

/// Old-style codes: (code, model, revision, memory class, maker).
const LEGACY_CODES: [(&str, Model, u8, u8, Maker); 23] = [
    ("0002", Model::B, 0, 0, Maker::Egoman),
    ("0003", Model::B, 1, 0, Maker::Egoman),
    ("0004", Model::B, 2, 0, Maker::Sony),
    ("0005", Model::B, 2, 0, Maker::Egoman),
    ("0006", Model::B, 2, 0, Maker::Egoman),
    ("0007", Model::A, 2, 0, Maker::Egoman),
    ("0008", Model::A, 2, 0, Maker::Sony),
    ("0009", Model::A, 2, 0, Maker::Egoman),
    ("000d", Model::B, 2, 1, Maker::Egoman),
    ("000e", Model::B, 2, 1, Maker::Sony),
    ("000f", Model::B, 2, 1, Maker::Egoman),
    ("0010", Model::BPlus, 2, 1, Maker::Sony),
    ("0013", Model::BPlus, 2, 1, Maker::Embest),
    ("0016", Model::BPlus, 2, 1, Maker::Sony),
    ("0019", Model::BPlus, 2, 1, Maker::Egoman),
    ("0011", Model::Cm1, 1, 1, Maker::Sony),
    ("0014", Model::Cm1, 1, 1, Maker::Embest),
    ("0017", Model::Cm1, 1, 1, Maker::Sony),
    ("001a", Model::Cm1, 1, 1, Maker::Egoman),
    ("0012", Model::APlus, 1, 0, Maker::Sony),
    ("0015", Model::APlus, 1, 1, Maker::Embest),
    ("0018", Model::APlus, 1, 0, Maker::Sony),
    ("001b", Model::APlus, 1, 0, Maker::Egoman),
];

const LEGACY_LAYOUT_CODES: [&str; 2] = ["0002", "0003"];

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl Model {
    pub const fn from_code(code: u8) -> Option<Model> {
        Some(match code {
            0x00 => Model::A,
            0x01 => Model::B,
            0x02 => Model::APlus,
            0x03 => Model::BPlus,
            0x04 => Model::Pi2B,
            0x05 => Model::Alpha,
            0x06 => Model::Cm1,
            0x08 => Model::Pi3B,
            0x09 => Model::Zero,
            0x0a => Model::Cm3,
            0x0c => Model::ZeroW,
            0x0d => Model::Pi3BPlus,
            0x0e => Model::Pi3APlus,
            0x10 => Model::Cm3Plus,
            0x11 => Model::Pi4B,
            0x12 => Model::Zero2W,
            0x13 => Model::Pi400,
            0x14 => Model::Cm4,
            0x15 => Model::Cm4S,
            0x17 => Model::Pi5,
            0x18 => Model::Cm5,
            0x19 => Model::Pi500,
            0x1a => Model::Cm5Lite,
            _ => return None,
        })
    }

    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn name(self) -> &'static str {
        match self {
            Model::A => "Model A",
            Model::B => "Model B",
            Model::APlus => "Model A+",
            Model::BPlus => "Model B+",
            Model::Pi2B => "Pi 2",
            Model::Alpha => "Alpha",
            Model::Cm1 => "CM",
            Model::Pi3B => "Pi 3",
            Model::Zero => "Pi Zero",
            Model::Cm3 => "CM3",
            Model::ZeroW => "Pi Zero-W",
            Model::Pi3BPlus => "Pi 3B+",
            Model::Pi3APlus => "Pi 3A+",
            Model::Cm3Plus => "CM3+",
            Model::Pi4B => "Pi 4B",
            Model::Zero2W => "Pi Zero2-W",
            Model::Pi400 => "Pi 400",
            Model::Cm4 => "CM4",
            Model::Cm4S => "CM4S",
            Model::Pi5 => "Pi 5",
            Model::Cm5 => "CM5",
            Model::Pi500 => "Pi 500",
            Model::Cm5Lite => "CM5 Lite",
        }
    }

    pub const fn soc(self) -> Soc {
        match self {
            Model::A
            | Model::B
            | Model::APlus
            | Model::BPlus
            | Model::Alpha
            | Model::Cm1
            | Model::Zero
            | Model::ZeroW => Soc::Bcm2835,
            Model::Pi2B
            | Model::Pi3B
            | Model::Cm3
            | Model::Pi3BPlus
            | Model::Pi3APlus
            | Model::Cm3Plus
            | Model::Zero2W => Soc::Bcm2837,
            Model::Pi4B | Model::Pi400 | Model::Cm4 | Model::Cm4S => Soc::Bcm2711,
            Model::Pi5 | Model::Cm5 | Model::Pi500 | Model::Cm5Lite => Soc::Bcm2712,
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Maker {
    pub const fn from_code(code: u8) -> Maker {
        match code {
            0 => Maker::Sony,
            1 => Maker::Egoman,
            2 => Maker::Embest,
            3 => Maker::SonyJapan,
            4 => Maker::Embest2,
            5 => Maker::Stadium,
            other => Maker::Other(other),
        }
    }

    pub const fn code(self) -> u8 {
        match self {
            Maker::Sony => 0,
            Maker::Egoman => 1,
            Maker::Embest => 2,
            Maker::SonyJapan => 3,
            Maker::Embest2 => 4,
            Maker::Stadium => 5,
            Maker::Other(code) => code,
        }
    }
}

impl fmt::Display for Maker {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Maker::Sony => f.write_str("Sony"),
            Maker::Egoman => f.write_str("Egoman"),
            Maker::Embest | Maker::Embest2 => f.write_str("Embest"),
            Maker::SonyJapan => f.write_str("Sony Japan"),
            Maker::Stadium => f.write_str("Stadium"),
            Maker::Other(code) => write!(f, "Unknown ({code})"),
        }
    }
}

// Per <https://www.raspberrypi.com/documentation/computers/raspberry-pi.html#peripheral-addresses>:
//
// SoC     Peripheral Address
// BCM2835 0x20000000
// BCM2836 0x3f000000
// BCM2837 0x3f000000
// BCM2711 0xfe000000
// BCM2712 RP1 behind PCIe, its peripheral window is at 0x1f_0000_0000
impl Soc {
    /// ARM-side physical address of the peripheral block.
    pub const fn peripheral_base(self) -> u64 {
        match self {
            Soc::Bcm2835 => 0x2000_0000,
            Soc::Bcm2837 => 0x3f00_0000,
            Soc::Bcm2711 => 0xfe00_0000,
            Soc::Bcm2712 => 0x1f_0000_0000,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Soc::Bcm2835 => "BCM2835",
            Soc::Bcm2837 => "BCM2837",
            Soc::Bcm2711 => "BCM2711",
            Soc::Bcm2712 => "BCM2712/RP1",
        }
    }
}

impl BoardClassification {
    /// Catch-all for well-formed old-style codes missing from the table.
    pub const fn unknown_legacy(code: u32, layout: Layout, overvolted: bool) -> Self {
        Self {
            code,
            model: Model::A,
            revision: 0,
            memory: 0,
            maker: Maker::Sony,
            layout,
            overvolted,
            new_style: false,
            restricted: false,
        }
    }

    pub const fn soc(&self) -> Soc {
        self.model.soc()
    }

    /// Memory size in megabytes.
    pub const fn memory_mb(&self) -> u32 {
        256 << self.memory
    }

    pub const fn with_restricted(self, restricted: bool) -> Self {
        Self { restricted, ..self }
    }
}

impl fmt::Display for BoardClassification {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} rev {} ({} MB, {}) on {}, revision code {:#x}",
            self.model,
            self.revision,
            self.memory_mb(),
            self.maker,
            self.soc().name(),
            self.code
        )?;
        if self.overvolted {
            f.write_str(", warranty bit set")?;
        }
        Ok(())
    }
}

/// Classify the board from the text of a hardware descriptor (`/proc/cpuinfo`).
pub fn identify(descriptor: &str) -> Result<BoardClassification> {
    let value = revision_value(descriptor)?;

    let digits = value
        .split(|c: char| !c.is_ascii_hexdigit())
        .next()
        .unwrap_or_default();
    let code = u32::from_str_radix(digits, 16)
        .ok()
        .context(OverflowSnafu { value })?;

    // Both header heuristics are evaluated here, once, and must agree.
    let last4 = value
        .get(value.len() - 4..)
        .unwrap_or(value)
        .to_ascii_lowercase();
    let legacy_layout = LEGACY_LAYOUT_CODES.contains(&last4.as_str());
    let new_style = code.get_bit(NEW_STYLE_BIT);

    ensure!(!(new_style && legacy_layout), InconsistentLayoutSnafu { code });

    let layout = if legacy_layout {
        Layout::Legacy
    } else {
        Layout::Standard
    };

    let board = if new_style {
        decode_new_style(code, layout)?
    } else {
        decode_legacy(code, &last4, layout, value.len() > 4)
    };
    debug!("identified board: {}", board);
    Ok(board)
}

//--------------------------------------------------------------------------------------------------
// Private Code
//--------------------------------------------------------------------------------------------------

/// Extract the value of the `Revision` line, validated but not parsed.
fn revision_value(descriptor: &str) -> Result<&str> {
    let line = descriptor
        .lines()
        .find(|line| line.starts_with("Revision"))
        .context(NoRevisionSnafu)?
        .trim_end();

    let (_, value) = line
        .split_once(':')
        .context(NoColonSnafu { line })?;
    let value = value.trim_start();

    ensure!(
        value.starts_with(|c: char| c.is_ascii_hexdigit()),
        NotHexSnafu { value }
    );
    ensure!(value.len() >= 4, TooShortSnafu { value });

    Ok(value)
}

fn decode_new_style(code: u32, layout: Layout) -> Result<BoardClassification> {
    let kind = code.get_bits(4..12) as u8;
    let model = Model::from_code(kind).context(UnknownModelSnafu { code, kind })?;

    Ok(BoardClassification {
        code,
        model,
        revision: code.get_bits(0..4) as u8,
        memory: code.get_bits(20..23) as u8,
        maker: Maker::from_code(code.get_bits(16..20) as u8),
        layout,
        overvolted: code.get_bits(24..26) != 0,
        new_style: true,
        restricted: false,
    })
}

fn decode_legacy(code: u32, last4: &str, layout: Layout, overvolted: bool) -> BoardClassification {
    match LEGACY_CODES.iter().find(|entry| entry.0 == last4) {
        Some(&(_, model, revision, memory, maker)) => {
            // Only the two Rev 1 Model B codes may select the Rev 1 header.
            debug_assert!(layout == Layout::Standard || (model == Model::B && revision < 2));
            BoardClassification {
                code,
                model,
                revision,
                memory,
                maker,
                layout,
                overvolted,
                new_style: false,
                restricted: false,
            }
        }
        None => {
            warn!("unrecognised old-style revision code {last4}, assuming a Model A");
            BoardClassification::unknown_legacy(code, layout, overvolted)
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------
