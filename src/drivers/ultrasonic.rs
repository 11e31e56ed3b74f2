//! HC-SR04 style ultrasonic range finder.
//!
//! ## Measurement
//!
//! 1. TRIG low 2 µs, high 10 µs, low.
//! 2. Wait for ECHO to go high, then time how long it stays high.
//! 3. `cm = echo_us * 0.034 / 2` (speed of sound ≈ 0.034 cm/µs, out and
//!    back).
//!
//! Either wait is bounded by the echo timeout (30 ms by default, about
//! 5 m); a timeout reads as [`Distance::Invalid`].
//!
//! The echo is timed by busy-polling the pin against a microsecond clock,
//! which blocks the loop for at most twice the timeout.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::fsm::condition::Distance;

/// Speed of sound in cm per microsecond.
const SOUND_CM_PER_US: f32 = 0.034;

/// Convert an echo pulse width to a distance.  Zero means no echo.
pub fn echo_to_distance(echo_us: u32) -> Distance {
    if echo_us == 0 {
        return Distance::Invalid;
    }
    Distance::from_cm(echo_us as f32 * SOUND_CM_PER_US / 2.0)
}

/// Anything that yields one distance sample per call.
pub trait RangeFinder {
    fn measure(&mut self) -> Distance;
}

pub struct Ultrasonic<T, E, D, C> {
    trig: T,
    echo: E,
    delay: D,
    /// Monotonic microsecond clock.
    micros: C,
    timeout_us: u32,
}

impl<T, E, D, C> Ultrasonic<T, E, D, C>
where
    T: OutputPin,
    E: InputPin,
    D: DelayNs,
    C: FnMut() -> u64,
{
    pub fn new(trig: T, echo: E, delay: D, micros: C, timeout_us: u32) -> Self {
        Self {
            trig,
            echo,
            delay,
            micros,
            timeout_us,
        }
    }

    /// Fire one ping and measure the echo.  Pin errors read as invalid.
    pub fn measure(&mut self) -> Distance {
        if self.trigger().is_err() {
            return Distance::Invalid;
        }
        echo_to_distance(self.pulse_high_us())
    }

    fn trigger(&mut self) -> Result<(), T::Error> {
        self.trig.set_low()?;
        self.delay.delay_us(2);
        self.trig.set_high()?;
        self.delay.delay_us(10);
        self.trig.set_low()
    }

    /// Width of the next high pulse on ECHO, 0 on timeout.
    fn pulse_high_us(&mut self) -> u32 {
        let timeout = u64::from(self.timeout_us);
        let start = (self.micros)();

        // Wait for the rising edge.
        loop {
            match self.echo.is_high() {
                Ok(true) => break,
                Ok(false) => {}
                Err(_) => return 0,
            }
            if (self.micros)().saturating_sub(start) >= timeout {
                return 0;
            }
        }

        let rise = (self.micros)();
        loop {
            match self.echo.is_high() {
                Ok(true) => {}
                Ok(false) => break,
                Err(_) => return 0,
            }
            if (self.micros)().saturating_sub(rise) >= timeout {
                return 0;
            }
        }
        let width = (self.micros)().saturating_sub(rise);
        u32::try_from(width).unwrap_or(0)
    }
}

impl<T, E, D, C> RangeFinder for Ultrasonic<T, E, D, C>
where
    T: OutputPin,
    E: InputPin,
    D: DelayNs,
    C: FnMut() -> u64,
{
    fn measure(&mut self) -> Distance {
        Ultrasonic::measure(self)
    }
}
