//! Analog light sensor (photoresistor divider) on ADC1.
//!
//! Brighter light → higher raw value.  The reading is the raw 12-bit ADC
//! count; the alarm threshold is expressed in the same units.

use log::warn;

use crate::drivers::hw_init;
use crate::error::{Result, SensorError};

/// Full-scale value of the 12-bit ADC.
pub const ADC_MAX: u16 = 4095;

pub struct LightSensor {
    channel: u32,
    last: u16,
}

impl LightSensor {
    pub fn new(channel: u32) -> Self {
        Self { channel, last: 0 }
    }

    /// One raw sample, clamped to 12 bits.
    pub fn read(&mut self) -> Result<u16> {
        let raw = hw_init::adc1_read(self.channel).ok_or(SensorError::AdcReadFailed)?;
        self.last = clamp_12bit(raw);
        Ok(self.last)
    }

    /// Sample, falling back to the previous value when the ADC errors.
    pub fn read_or_last(&mut self) -> u16 {
        match self.read() {
            Ok(v) => v,
            Err(e) => {
                warn!("Light: {} (holding {})", e, self.last);
                self.last
            }
        }
    }

    pub fn last(&self) -> u16 {
        self.last
    }
}

fn clamp_12bit(raw: i32) -> u16 {
    raw.clamp(0, i32::from(ADC_MAX)) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_to_adc_range() {
        assert_eq!(clamp_12bit(-5), 0);
        assert_eq!(clamp_12bit(1600), 1600);
        assert_eq!(clamp_12bit(9000), ADC_MAX);
    }

    #[test]
    fn host_read_uses_simulated_adc() {
        let mut s = LightSensor::new(hw_init::ADC1_CH_LIGHT);
        hw_init::sim_set_adc(hw_init::ADC1_CH_LIGHT, Some(1234));
        assert_eq!(s.read(), Ok(1234));
        hw_init::sim_set_adc(hw_init::ADC1_CH_LIGHT, None);
        assert_eq!(s.read(), Err(SensorError::AdcReadFailed.into()));
        assert_eq!(s.read_or_last(), 1234);
    }
}
