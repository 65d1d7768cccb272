/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! Delays and the process uptime clock.

use {
    core::time::Duration,
    once_cell::sync::Lazy,
    std::{hint, thread, time::Instant},
};

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Below this, sleeping overshoots by far more than the delay itself.
const SPIN_THRESHOLD: Duration = Duration::from_micros(100);

/// Start the uptime clock if nothing has read it yet.
pub fn start() {
    Lazy::force(&EPOCH);
}

/// Time since the uptime clock was started.
pub fn uptime() -> Duration {
    EPOCH.elapsed()
}

/// Milliseconds of uptime, wrapping at 2^32.
pub fn millis() -> u32 {
    uptime().as_millis() as u32
}

/// Microseconds of uptime, wrapping at 2^32.
pub fn micros() -> u32 {
    uptime().as_micros() as u32
}

/// Block the calling thread for `ms` milliseconds.
pub fn delay(ms: u32) {
    thread::sleep(Duration::from_millis(ms.into()));
}

/// Block the calling thread for at least `us` microseconds.
pub fn delay_microseconds(us: u32) {
    spin_for(Duration::from_micros(us.into()));
}

/// Busy-wait short delays, sleep long ones. Never returns early.
pub fn spin_for(duration: Duration) {
    if duration.is_zero() {
        return;
    }
    if duration >= SPIN_THRESHOLD {
        thread::sleep(duration);
        return;
    }
    let start = Instant::now();
    while start.elapsed() < duration {
        hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_delays_are_not_cut_short() {
        let start = Instant::now();
        delay_microseconds(5);
        assert!(start.elapsed() >= Duration::from_micros(5));
    }

    #[test]
    fn long_delays_sleep() {
        let start = Instant::now();
        delay_microseconds(1_500);
        assert!(start.elapsed() >= Duration::from_micros(1_500));
    }

    #[test]
    fn uptime_is_monotonic() {
        start();
        let a = micros();
        delay(1);
        assert!(micros().wrapping_sub(a) >= 1_000);
        assert!(millis() <= micros() / 1000 + 1);
    }
}
