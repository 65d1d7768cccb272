/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! The pin-level API.
//!
//! A [`Gpio`] owns the board classification, the mapped register back-end and the extension
//! registry. Pins are given in the configured numbering scheme; each call resolves the pin
//! once and then goes to the back-end (onboard), to an extension device (64 and above), or to
//! the usage policy (unconnected pins, which never reach a register).

use {
    crate::{
        board::{self, BoardClassification},
        config::Config,
        error::{DescriptorSnafu, Result, UsageError, UsagePolicy},
        extension::{ExtensionDevice, ExtensionRegistry},
        geometry::PinFunction,
        interrupt::{self, Chip, Edge, EventHandle, InterruptThread},
        memory::Windows,
        pins::{self, NumberingScheme, PinMap, ONBOARD_PINS},
        platform::{self, Direction, Peripherals},
        time,
    },
    core::{fmt, ops::Not, str::FromStr},
    log::{debug, info, warn},
    once_cell::sync::OnceCell,
    parking_lot::RwLock,
    snafu::ResultExt,
    std::{fs, path::PathBuf, sync::Arc},
};

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pull {
    Off,
    Down,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinMode {
    Input,
    Output,
    PwmOutput,
    GpioClock,
    /// Output driven by an installed [`SoftwareOutput`] as PWM.
    SoftPwmOutput,
    /// Output driven by an installed [`SoftwareOutput`] as a tone.
    SoftToneOutput,
}

/// PWM output algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PwmMode {
    MarkSpace,
    Balanced,
}

/// Drives pins switched to one of the software output modes.
pub trait SoftwareOutput: Send + Sync {
    fn configure(&self, pin: u32, native: u8, mode: PinMode);
}

/// Counter frequency assumed by [`Gpio::pwm_tone_write`]: 19.2 MHz / 32.
pub const PWM_TONE_CLOCK: u32 = 600_000;

const PWM_DEFAULT_RANGE: u32 = 1024;
const PWM_DEFAULT_DIVISOR: u32 = 32;
const CLOCK_DEFAULT_HZ: u32 = 100_000;

/// Logical pins taking part in the byte operations.
const BYTE_PINS: u32 = 8;

pub struct Gpio {
    board: BoardClassification,
    pins: PinMap,
    backend: Box<dyn Peripherals>,
    extensions: RwLock<ExtensionRegistry>,
    policy: UsagePolicy,
    software_output: Option<Arc<dyn SoftwareOutput>>,
    gpiochip_path: PathBuf,
    chip: OnceCell<Chip>,
}

//--------------------------------------------------------------------------------------------------
// Private Definitions
//--------------------------------------------------------------------------------------------------

enum Route {
    Onboard(u8),
    Extension,
    Unmapped,
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl From<Level> for bool {
    fn from(level: Level) -> Self {
        level == Level::High
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> Self {
        level as u8
    }
}

impl Not for Level {
    type Output = Level;

    fn not(self) -> Level {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Level::Low => "LOW",
            Level::High => "HIGH",
        })
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "0" | "low" | "off" => Ok(Level::Low),
            "1" | "high" | "on" => Ok(Level::High),
            _ => Err(format!("unknown level \"{s}\", expected 0 or 1")),
        }
    }
}

impl fmt::Display for Pull {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Pull::Off => "off",
            Pull::Down => "down",
            Pull::Up => "up",
        })
    }
}

impl FromStr for Pull {
    type Err = String;

    fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" | "tri" | "none" => Ok(Pull::Off),
            "down" | "dn" => Ok(Pull::Down),
            "up" => Ok(Pull::Up),
            _ => Err(format!("unknown pull \"{s}\", expected up, down or off")),
        }
    }
}

impl fmt::Display for PinMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            PinMode::Input => "in",
            PinMode::Output => "out",
            PinMode::PwmOutput => "pwm",
            PinMode::GpioClock => "clock",
            PinMode::SoftPwmOutput => "softpwm",
            PinMode::SoftToneOutput => "softtone",
        })
    }
}

impl FromStr for PinMode {
    type Err = String;

    fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "in" | "input" => Ok(PinMode::Input),
            "out" | "output" => Ok(PinMode::Output),
            "pwm" => Ok(PinMode::PwmOutput),
            "clock" | "gpclk" => Ok(PinMode::GpioClock),
            "softpwm" => Ok(PinMode::SoftPwmOutput),
            "softtone" => Ok(PinMode::SoftToneOutput),
            _ => Err(format!("unknown pin mode \"{s}\"")),
        }
    }
}

impl Gpio {
    /// Identify the board from the hardware descriptor and map its registers.
    pub fn setup(config: Config) -> Result<Self> {
        time::start();
        let descriptor = fs::read_to_string(&config.cpuinfo_path).context(DescriptorSnafu {
            path: config.cpuinfo_path.clone(),
        })?;
        let board = board::identify(&descriptor)?;
        info!("{board}");
        Self::with_board(board, config)
    }

    /// Map the registers of an already identified board.
    pub fn with_board(board: BoardClassification, config: Config) -> Result<Self> {
        let windows = Windows::open(&board, &config)?;
        Ok(Self::from_parts(board, config, windows))
    }

    /// Assemble an instance from already mapped windows.
    pub fn from_parts(board: BoardClassification, config: Config, windows: Windows) -> Self {
        let board = board.with_restricted(windows.is_restricted());
        let pins = PinMap::new(board.layout, config.scheme);
        let backend = platform::select(&board, windows);
        info!(
            "{} pin numbering, {} back-end{}",
            config.scheme,
            backend.name(),
            if board.restricted { ", restricted" } else { "" }
        );
        Self {
            board,
            pins,
            backend,
            extensions: RwLock::new(ExtensionRegistry::new()),
            policy: config.policy,
            software_output: config.software_output,
            gpiochip_path: config.gpiochip_path,
            chip: OnceCell::new(),
        }
    }

    pub fn board(&self) -> &BoardClassification {
        &self.board
    }

    pub fn scheme(&self) -> NumberingScheme {
        self.pins.scheme()
    }

    pub fn pin_map(&self) -> &PinMap {
        &self.pins
    }

    pub fn policy(&self) -> UsagePolicy {
        self.policy
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn is_restricted(&self) -> bool {
        self.board.restricted
    }

    /// Native GPIO number of an onboard pin, if it is connected.
    pub fn to_native(&self, pin: u32) -> Option<u8> {
        match self.route(pin) {
            Route::Onboard(native) => Some(native),
            _ => None,
        }
    }

    pub fn pin_mode(&self, pin: u32, mode: PinMode) {
        let native = match self.route(pin) {
            Route::Onboard(native) => native,
            Route::Extension => return self.extension(pin, |dev, offset| dev.pin_mode(offset, mode)),
            Route::Unmapped => return self.unmapped(pin),
        };
        match mode {
            PinMode::Input => self.backend.set_direction(native, Direction::Input),
            PinMode::Output => self.backend.set_direction(native, Direction::Output),
            PinMode::PwmOutput => self.checked(self.enable_pwm(native)),
            PinMode::GpioClock => self.checked(self.enable_clock(native)),
            PinMode::SoftPwmOutput | PinMode::SoftToneOutput => {
                self.backend.set_direction(native, Direction::Output);
                match &self.software_output {
                    Some(output) => output.configure(pin, native, mode),
                    None => warn!("pin {pin}: {mode} mode needs a software output driver, none installed"),
                }
            }
        }
    }

    pub fn digital_read(&self, pin: u32) -> Level {
        match self.route(pin) {
            Route::Onboard(native) => self.backend.read(native),
            Route::Extension => self.extension(pin, |dev, offset| dev.digital_read(offset)),
            Route::Unmapped => {
                self.unmapped(pin);
                Level::Low
            }
        }
    }

    pub fn digital_write(&self, pin: u32, level: Level) {
        match self.route(pin) {
            Route::Onboard(native) => self.backend.write(native, level),
            Route::Extension => self.extension(pin, |dev, offset| dev.digital_write(offset, level)),
            Route::Unmapped => self.unmapped(pin),
        }
    }

    pub fn pull_up_dn_control(&self, pin: u32, pull: Pull) {
        match self.route(pin) {
            Route::Onboard(native) => self.backend.set_pull(native, pull),
            Route::Extension => {
                self.extension(pin, |dev, offset| dev.pull_up_dn_control(offset, pull))
            }
            Route::Unmapped => self.unmapped(pin),
        }
    }

    /// Current function of an onboard pin. `None` for extension and unconnected pins.
    pub fn get_alt(&self, pin: u32) -> Option<PinFunction> {
        match self.route(pin) {
            Route::Onboard(native) => Some(self.backend.function(native)),
            Route::Extension => None,
            Route::Unmapped => {
                self.unmapped(pin);
                None
            }
        }
    }

    pub fn pwm_write(&self, pin: u32, value: u32) {
        match self.route(pin) {
            Route::Onboard(native) => self.checked(self.backend.pwm_write(native, value)),
            Route::Extension => self.extension(pin, |dev, offset| dev.pwm_write(offset, value)),
            Route::Unmapped => self.unmapped(pin),
        }
    }

    /// Output a square wave of `frequency` Hz on a PWM pin, assuming the default PWM clock.
    /// Zero silences the pin.
    pub fn pwm_tone_write(&self, pin: u32, frequency: u32) {
        if frequency == 0 {
            return self.pwm_write(pin, 0);
        }
        let range = PWM_TONE_CLOCK / frequency;
        self.pwm_set_range(range);
        self.pwm_write(pin, range / 2);
    }

    pub fn pwm_set_mode(&self, mode: PwmMode) {
        self.checked(self.backend.pwm_set_mode(mode));
    }

    pub fn pwm_set_range(&self, range: u32) {
        self.checked(self.backend.pwm_set_range(range));
    }

    pub fn pwm_set_clock(&self, divisor: u32) {
        self.checked(self.backend.pwm_set_clock(divisor));
    }

    pub fn gpio_clock_set(&self, pin: u32, frequency: u32) {
        match self.route(pin) {
            Route::Onboard(native) => self.checked(self.backend.clock_set(native, frequency)),
            Route::Extension => debug!("pin {pin}: extension pins have no clock, ignored"),
            Route::Unmapped => self.unmapped(pin),
        }
    }

    /// Write logical pins 0..=7 at once, pin 0 from the least significant bit. Pins are
    /// cleared first, then set.
    pub fn digital_write_byte(&self, value: u8) {
        let (mut set, mut clear) = (0u32, 0u32);
        for (bit, native) in self.byte_pins() {
            if value & (1 << bit) != 0 {
                set |= 1 << native;
            } else {
                clear |= 1 << native;
            }
        }
        self.backend.write_bank(set, clear);
    }

    /// Read logical pins 0..=7 at once, pin 0 into the least significant bit.
    pub fn digital_read_byte(&self) -> u8 {
        let bank = self.backend.read_bank();
        self.byte_pins()
            .filter(|(_, native)| bank & (1 << native) != 0)
            .fold(0, |byte, (bit, _)| byte | (1 << bit))
    }

    /// Drive strength (0..=7) of a pad group.
    pub fn set_pad_drive(&self, group: u8, value: u8) {
        self.checked(self.backend.set_pad_drive(group, value));
    }

    /// Onboard pins have no analogue input and read 0.
    pub fn analog_read(&self, pin: u32) -> i32 {
        match self.route(pin) {
            Route::Extension => self.extension(pin, |dev, offset| dev.analog_read(offset)),
            Route::Onboard(_) => 0,
            Route::Unmapped => {
                self.unmapped(pin);
                0
            }
        }
    }

    pub fn analog_write(&self, pin: u32, value: i32) {
        match self.route(pin) {
            Route::Extension => self.extension(pin, |dev, offset| dev.analog_write(offset, value)),
            Route::Onboard(_) => debug!("pin {pin}: no analogue output onboard, ignored"),
            Route::Unmapped => self.unmapped(pin),
        }
    }

    /// Attach `device` to pins `base..base + count`.
    pub fn register_extension(
        &self,
        base: u32,
        count: u32,
        device: Box<dyn ExtensionDevice>,
    ) -> Result<()> {
        self.extensions.write().register(base, count, device)?;
        Ok(())
    }

    /// Start edge reporting on an onboard pin. The GPIO chip is opened on first use.
    pub fn request_interrupt(&self, pin: u32, edge: Edge) -> Result<EventHandle> {
        let native = self
            .to_native(pin)
            .ok_or(interrupt::InterruptError::NotOnboard { pin })?;
        let handle = self
            .chip
            .get_or_try_init(|| Chip::open(&self.gpiochip_path))?
            .request(native, edge)?;
        Ok(handle)
    }

    /// Run `callback` on a dedicated thread for every `edge` on `pin`.
    pub fn on_interrupt(
        &self,
        pin: u32,
        edge: Edge,
        callback: impl FnMut(interrupt::Event) + Send + 'static,
    ) -> Result<InterruptThread> {
        Ok(InterruptThread::spawn(self.request_interrupt(pin, edge)?, callback)?)
    }
}

impl fmt::Debug for Gpio {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Gpio")
            .field("board", &self.board)
            .field("scheme", &self.pins.scheme())
            .field("backend", &self.backend.name())
            .field("extensions", &self.extensions.read().len())
            .field("policy", &self.policy)
            .finish()
    }
}

//--------------------------------------------------------------------------------------------------
// Private Code
//--------------------------------------------------------------------------------------------------

impl Gpio {
    fn route(&self, pin: u32) -> Route {
        if pin >= ONBOARD_PINS {
            return Route::Extension;
        }
        match self.pins.native(pin) {
            Some(native) if native < self.backend.pin_count() => Route::Onboard(native),
            _ => Route::Unmapped,
        }
    }

    fn extension<T>(&self, pin: u32, f: impl FnOnce(&dyn ExtensionDevice, u32) -> T) -> T {
        let registry = self.extensions.read();
        let (device, offset) = registry.device(pin);
        f(device, offset)
    }

    fn unmapped(&self, pin: u32) {
        self.policy.handle(&UsageError::Unmapped {
            pin,
            scheme: self.pins.scheme(),
        });
    }

    fn checked(&self, result: ::core::result::Result<(), UsageError>) {
        if let Err(err) = result {
            self.policy.handle(&err);
        }
    }

    fn enable_pwm(&self, native: u8) -> ::core::result::Result<(), UsageError> {
        self.backend.route_pwm(native)?;
        self.backend.pwm_set_mode(PwmMode::Balanced)?;
        self.backend.pwm_set_range(PWM_DEFAULT_RANGE)?;
        self.backend.pwm_set_clock(PWM_DEFAULT_DIVISOR)
    }

    fn enable_clock(&self, native: u8) -> ::core::result::Result<(), UsageError> {
        self.backend.route_clock(native)?;
        self.backend.clock_set(native, CLOCK_DEFAULT_HZ)
    }

    /// (bit, native) of the logical pins 0..=7, whatever the configured scheme.
    fn byte_pins(&self) -> impl Iterator<Item = (u32, u8)> {
        let layout = self.board.layout;
        (0..BYTE_PINS).filter_map(move |bit| pins::wpi_to_native(layout, bit).map(|n| (bit, n)))
    }
}

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------
