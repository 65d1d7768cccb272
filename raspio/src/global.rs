/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! Process-wide instance and free-function API.
//!
//! One of the `setup*` functions installs the instance; every other function here panics if
//! none was installed.

use {
    crate::{
        config::Config,
        error::{fatal, Error, Result},
        extension::ExtensionDevice,
        geometry::PinFunction,
        gpio::{Gpio, Level, PinMode, Pull, PwmMode},
        interrupt::{Edge, Event, EventHandle, InterruptThread},
        pins::NumberingScheme,
    },
    once_cell::sync::OnceCell,
};

static INSTANCE: OnceCell<Gpio> = OnceCell::new();

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

/// Set up with logical pin numbers.
pub fn setup() -> Result<&'static Gpio> {
    setup_with(Config::default().with_scheme(NumberingScheme::Logical))
}

/// Set up with native GPIO numbers.
pub fn setup_gpio() -> Result<&'static Gpio> {
    setup_with(Config::default().with_scheme(NumberingScheme::Native))
}

/// Set up with physical header positions.
pub fn setup_phys() -> Result<&'static Gpio> {
    setup_with(Config::default().with_scheme(NumberingScheme::Physical))
}

pub fn setup_with(config: Config) -> Result<&'static Gpio> {
    if INSTANCE.get().is_some() {
        return Err(Error::AlreadySetUp);
    }
    let gpio = Gpio::setup(config)?;
    INSTANCE.set(gpio).map_err(|_| Error::AlreadySetUp)?;
    Ok(gpio_instance())
}

/// [`setup`], printing a diagnostic and exiting on failure.
pub fn setup_or_exit() -> &'static Gpio {
    setup().unwrap_or_else(|err| fatal(&err))
}

pub fn setup_gpio_or_exit() -> &'static Gpio {
    setup_gpio().unwrap_or_else(|err| fatal(&err))
}

pub fn setup_phys_or_exit() -> &'static Gpio {
    setup_phys().unwrap_or_else(|err| fatal(&err))
}

/// The installed instance, if any.
pub fn try_gpio() -> Option<&'static Gpio> {
    INSTANCE.get()
}

/// The installed instance.
///
/// # Panics
///
/// If no `setup*` function has succeeded yet.
pub fn gpio_instance() -> &'static Gpio {
    match INSTANCE.get() {
        Some(gpio) => gpio,
        None => panic!("raspio is not set up: call raspio::setup(), setup_gpio() or setup_phys() first"),
    }
}

pub fn pin_mode(pin: u32, mode: PinMode) {
    gpio_instance().pin_mode(pin, mode)
}

pub fn digital_read(pin: u32) -> Level {
    gpio_instance().digital_read(pin)
}

pub fn digital_write(pin: u32, level: Level) {
    gpio_instance().digital_write(pin, level)
}

pub fn pull_up_dn_control(pin: u32, pull: Pull) {
    gpio_instance().pull_up_dn_control(pin, pull)
}

pub fn get_alt(pin: u32) -> Option<PinFunction> {
    gpio_instance().get_alt(pin)
}

pub fn pwm_write(pin: u32, value: u32) {
    gpio_instance().pwm_write(pin, value)
}

pub fn pwm_tone_write(pin: u32, frequency: u32) {
    gpio_instance().pwm_tone_write(pin, frequency)
}

pub fn pwm_set_mode(mode: PwmMode) {
    gpio_instance().pwm_set_mode(mode)
}

pub fn pwm_set_range(range: u32) {
    gpio_instance().pwm_set_range(range)
}

pub fn pwm_set_clock(divisor: u32) {
    gpio_instance().pwm_set_clock(divisor)
}

pub fn gpio_clock_set(pin: u32, frequency: u32) {
    gpio_instance().gpio_clock_set(pin, frequency)
}

pub fn digital_write_byte(value: u8) {
    gpio_instance().digital_write_byte(value)
}

pub fn digital_read_byte() -> u8 {
    gpio_instance().digital_read_byte()
}

pub fn set_pad_drive(group: u8, value: u8) {
    gpio_instance().set_pad_drive(group, value)
}

pub fn analog_read(pin: u32) -> i32 {
    gpio_instance().analog_read(pin)
}

pub fn analog_write(pin: u32, value: i32) {
    gpio_instance().analog_write(pin, value)
}

pub fn register_extension(
    base: u32,
    count: u32,
    device: Box<dyn ExtensionDevice>,
) -> Result<()> {
    gpio_instance().register_extension(base, count, device)
}

pub fn request_interrupt(pin: u32, edge: Edge) -> Result<EventHandle> {
    gpio_instance().request_interrupt(pin, edge)
}

pub fn on_interrupt(
    pin: u32,
    edge: Edge,
    callback: impl FnMut(Event) + Send + 'static,
) -> Result<InterruptThread> {
    gpio_instance().on_interrupt(pin, edge, callback)
}

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use {super::*, std::panic::catch_unwind};

    #[test]
    fn calls_before_setup_name_the_missing_call() {
        let result = catch_unwind(|| digital_read(0));
        let payload = result.unwrap_err();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_default();
        assert!(message.contains("raspio::setup()"), "{message}");
    }

    #[test]
    fn failed_setup_leaves_nothing_installed() {
        let err = setup_with(Config::default().with_cpuinfo_path("/nonexistent/cpuinfo"))
            .unwrap_err();
        assert!(matches!(err, Error::Descriptor { .. }));
        assert!(try_gpio().is_none());
    }
}
