/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! Raspberry Pi GPIO, PWM and GPIO clock access from Linux user space.
//!
//! The board is identified from `/proc/cpuinfo`, the peripheral registers are mapped through
//! `/dev/mem` (or the restricted `/dev/gpiomem*` device) and pins are driven by writing those
//! registers directly. Pins are numbered in one of three schemes chosen at set-up; pins from
//! 64 upwards belong to registered extension devices.
//!
//! ```no_run
//! use raspio::{Level, PinMode};
//!
//! raspio::setup_or_exit();
//! raspio::pin_mode(0, PinMode::Output);
//! raspio::digital_write(0, Level::High);
//! ```

#![allow(clippy::upper_case_acronyms)]
#![allow(clippy::enum_variant_names)]

pub mod board;
pub mod config;
pub mod error;
pub mod extension;
pub mod geometry;
mod global;
pub mod gpio;
pub mod interrupt;
pub mod logger;
pub mod memory;
pub mod mmio;
pub mod pins;
pub mod platform;
pub mod sync;
pub mod time;

pub use {
    board::{BoardClassification, Layout, Maker, Model, Soc},
    config::{Config, DevicePreference},
    error::{Error, Result, UsageError, UsagePolicy, Violation},
    extension::ExtensionDevice,
    geometry::PinFunction,
    global::*,
    gpio::{Gpio, Level, PinMode, Pull, PwmMode, SoftwareOutput},
    interrupt::{Edge, Event, EventHandle, InterruptThread, WaitOutcome},
    pins::NumberingScheme,
    time::{delay, delay_microseconds, micros, millis},
};
