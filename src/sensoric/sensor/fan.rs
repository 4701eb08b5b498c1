// Sensoric - Record Raspberry Pi sensor readings in a database
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use crate::sensor::core::{FanSpeed, SensorError, SensorErrorKind};
use rppal::gpio::{Gpio, InputPin, Trigger};
use std::fmt::{Debug, Formatter};
use std::time::{Duration, Instant};

/// BCM GPIO pin the tachometer wire of the fan is connected to by default.
pub const DEFAULT_TACH_BCM_PIN: u8 = 16;

/// Number of falling edges the fan emits for each full revolution.
pub const PULSES_PER_REVOLUTION: f64 = 2.0;

/// How long pulses are counted for during a single read.
pub const SAMPLE_WINDOW: Duration = Duration::from_secs(1);

/// Pulses arriving sooner than this after the previous accepted pulse are noise.
pub const DEBOUNCE_INTERVAL: Duration = Duration::from_millis(5);

/// Source of monotonic timestamps used to measure the time between pulses.
pub trait TickSource {
    /// Time elapsed since some fixed, arbitrary, point.
    fn now(&self) -> Duration;
}

/// `TickSource` backed by the system monotonic clock.
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Abstraction around an edge-detecting GPIO input to allow for easier testing.
///
/// A pin is acquired and configured for falling-edge detection by `acquire`, polled
/// with `wait_for_falling_edge`, and handed back to the system with `release`.
pub trait TachPin {
    fn acquire(&mut self) -> Result<(), SensorError>;

    /// Block until a falling edge is detected or `timeout` elapses, returning `true`
    /// if an edge was detected and `false` on timeout.
    fn wait_for_falling_edge(&mut self, timeout: Duration) -> Result<bool, SensorError>;

    fn release(&mut self);

    fn pin(&self) -> u8;
}

/// `TachPin` implementation backed by an `rppal` input pin with a pull-up resistor.
#[derive(Debug)]
pub struct GpioTachPin {
    bcm_gpio_pin: u8,
    input: Option<InputPin>,
    fresh: bool,
}

impl GpioTachPin {
    /// Create a new tachometer pin based on the BCM GPIO pin number of the fan
    /// tachometer wire. The pin is not acquired until the fan is read.
    ///
    /// Note that the BCM GPIO pin number is NOT the same as the physical pin number.
    /// See [pinout] for more information.
    ///
    /// [pinout]: https://www.raspberrypi.com/documentation/computers/os.html#gpio-and-the-40-pin-header
    pub fn new(bcm_gpio_pin: u8) -> Self {
        Self {
            bcm_gpio_pin,
            input: None,
            fresh: false,
        }
    }
}

impl TachPin for GpioTachPin {
    fn acquire(&mut self) -> Result<(), SensorError> {
        let controller = Gpio::new().map_err(|e| {
            SensorError::KindMsgCause(
                SensorErrorKind::Initialization,
                "unable to create GPIO controller",
                Box::new(e),
            )
        })?;

        let pin = controller.get(self.bcm_gpio_pin).map_err(|e| {
            SensorError::KindMsgCause(
                SensorErrorKind::Initialization,
                "unable to acquire pin from controller",
                Box::new(e),
            )
        })?;

        let mut input = pin.into_input_pullup();
        input.set_interrupt(Trigger::FallingEdge).map_err(|e| {
            SensorError::KindMsgCause(
                SensorErrorKind::Initialization,
                "unable to enable falling edge detection",
                Box::new(e),
            )
        })?;

        self.input = Some(input);
        self.fresh = true;
        Ok(())
    }

    fn wait_for_falling_edge(&mut self, timeout: Duration) -> Result<bool, SensorError> {
        let input = self
            .input
            .as_mut()
            .ok_or(SensorError::KindMsg(SensorErrorKind::Gpio, "pin has not been acquired"))?;

        // Discard any edges cached before the sampling window started.
        let reset = self.fresh;
        self.fresh = false;

        input
            .poll_interrupt(reset, Some(timeout))
            .map(|level| level.is_some())
            .map_err(|e| SensorError::KindMsgCause(SensorErrorKind::Gpio, "unable to poll for falling edge", Box::new(e)))
    }

    fn release(&mut self) {
        if let Some(mut input) = self.input.take() {
            if let Err(e) = input.clear_interrupt() {
                tracing::warn!(message = "unable to clear edge detection", bcm_pin = self.bcm_gpio_pin, error = %e);
            }

            // Dropping the pin resets its mode and pull-up state.
            drop(input);
            tracing::trace!(message = "released tachometer pin", bcm_pin = self.bcm_gpio_pin);
        }
    }

    fn pin(&self) -> u8 {
        self.bcm_gpio_pin
    }
}

/// Releases the wrapped pin when dropped, on both success and error paths.
struct PinGuard<'a> {
    pin: &'a mut dyn TachPin,
}

impl Drop for PinGuard<'_> {
    fn drop(&mut self) {
        self.pin.release();
    }
}

/// Time between accepted pulses observed during a single sampling window.
#[derive(Debug, Default)]
struct Intervals {
    accepted: Vec<Duration>,
    discarded: usize,
}

impl Intervals {
    /// Count falling edges on the pin until `window` has elapsed according to `clock`.
    ///
    /// The first interval is measured from the start of the window. Intervals shorter
    /// than `debounce` are discarded and do not move the reference timestamp forward.
    fn from_tach_pin(
        pin: &mut dyn TachPin,
        clock: &dyn TickSource,
        window: Duration,
        debounce: Duration,
    ) -> Result<Self, SensorError> {
        let mut intervals = Intervals::default();
        let start = clock.now();
        let mut last = start;

        loop {
            let elapsed = clock.now().saturating_sub(start);
            if elapsed >= window {
                break;
            }

            if !pin.wait_for_falling_edge(window - elapsed)? {
                break;
            }

            let now = clock.now();
            let delta = now.saturating_sub(last);
            if delta < debounce {
                intervals.discarded += 1;
                continue;
            }

            intervals.accepted.push(delta);
            last = now;
        }

        tracing::trace!(
            message = "counted tachometer pulses",
            accepted = intervals.accepted.len(),
            discarded = intervals.discarded
        );

        Ok(intervals)
    }

    fn average(&self) -> Option<Duration> {
        if self.accepted.is_empty() {
            return None;
        }

        let total: Duration = self.accepted.iter().sum();
        Some(total / self.accepted.len() as u32)
    }

    /// Fan speed based on the average interval between pulses, zero if there were none.
    fn speed(&self, pulses_per_rev: f64) -> FanSpeed {
        let rpm = match self.average() {
            Some(avg) if !avg.is_zero() => (1.0 / avg.as_secs_f64() / pulses_per_rev) * 60.0,
            _ => 0.0,
        };

        FanSpeed::from(rpm)
    }
}

/// Read fan speed by counting tachometer pulses over a fixed sampling window.
pub struct FanSensor {
    pin: Box<dyn TachPin>,
    clock: Box<dyn TickSource>,
    window: Duration,
    debounce: Duration,
    pulses_per_rev: f64,
}

impl FanSensor {
    pub fn from_pin<T>(pin: T) -> Self
    where
        T: TachPin + 'static,
    {
        Self::with_clock(pin, MonotonicClock::new())
    }

    pub fn with_clock<T, C>(pin: T, clock: C) -> Self
    where
        T: TachPin + 'static,
        C: TickSource + 'static,
    {
        Self {
            pin: Box::new(pin),
            clock: Box::new(clock),
            window: SAMPLE_WINDOW,
            debounce: DEBOUNCE_INTERVAL,
            pulses_per_rev: PULSES_PER_REVOLUTION,
        }
    }

    /// Sample the tachometer for the length of the sampling window and compute the
    /// fan speed. A stopped fan emits no pulses and reads as zero.
    ///
    /// The pin is acquired at the start of each read and always released before this
    /// method returns.
    pub fn read(&mut self) -> Result<FanSpeed, SensorError> {
        self.pin.acquire()?;
        let mut guard = PinGuard { pin: self.pin.as_mut() };
        let intervals = Intervals::from_tach_pin(&mut *guard.pin, self.clock.as_ref(), self.window, self.debounce)?;
        let speed = intervals.speed(self.pulses_per_rev);

        tracing::debug!(message = "computed fan speed", speed = %speed, pulses = intervals.accepted.len());
        Ok(speed)
    }
}

impl Debug for FanSensor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanSensor")
            .field("pin", &self.pin.pin())
            .field("window", &self.window)
            .field("debounce", &self.debounce)
            .finish()
    }
}
