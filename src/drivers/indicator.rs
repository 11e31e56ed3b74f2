//! Buzzer and red/green LED driver for the alarm.
//!
//! ## Hardware
//!
//! - Buzzer module on GPIO22, **active-low** (LOW = sounding).
//! - Red LED on GPIO2, green LED on GPIO4, both active-high.
//!
//! Generic over `embedded_hal::digital::OutputPin` so the same driver runs
//! on `esp_idf_hal::gpio::PinDriver` and on the host test doubles.

use embedded_hal::digital::OutputPin;
use log::info;

use crate::app::ports::IndicatorPort;
use crate::error::{ActuatorError, Result};
use crate::fsm::context::AlarmOutputs;

pub struct AlarmIndicator<B, R, G> {
    buzzer: B,
    red: R,
    green: G,
    current: Option<AlarmOutputs>,
}

impl<B, R, G> AlarmIndicator<B, R, G>
where
    B: OutputPin,
    R: OutputPin,
    G: OutputPin,
{
    /// Takes the pins and silences the buzzer straight away.
    pub fn new(buzzer: B, red: R, green: G) -> Result<Self> {
        let mut this = Self {
            buzzer,
            red,
            green,
            current: None,
        };
        this.buzzer
            .set_high()
            .map_err(|_| ActuatorError::GpioWriteFailed)?;
        Ok(this)
    }

    /// Drive all three outputs.
    pub fn apply(&mut self, outputs: AlarmOutputs) -> Result<()> {
        // Active-low buzzer.
        set(&mut self.buzzer, !outputs.buzzer)?;
        set(&mut self.red, outputs.red)?;
        set(&mut self.green, outputs.green)?;

        let leds_changed = self
            .current
            .is_none_or(|c| c.red != outputs.red || c.green != outputs.green);
        if leds_changed {
            info!(
                "LED | red={} green={}",
                on_off(outputs.red),
                on_off(outputs.green)
            );
        }
        self.current = Some(outputs);
        Ok(())
    }

    /// Last command written, `None` before the first `apply`.
    pub fn current(&self) -> Option<AlarmOutputs> {
        self.current
    }
}

impl<B, R, G> IndicatorPort for AlarmIndicator<B, R, G>
where
    B: OutputPin,
    R: OutputPin,
    G: OutputPin,
{
    fn apply(&mut self, outputs: AlarmOutputs) -> Result<()> {
        AlarmIndicator::apply(self, outputs)
    }
}

fn set(pin: &mut impl OutputPin, high: bool) -> Result<()> {
    let res = if high { pin.set_high() } else { pin.set_low() };
    res.map_err(|_| ActuatorError::GpioWriteFailed.into())
}

fn on_off(v: bool) -> &'static str {
    if v { "on" } else { "off" }
}
