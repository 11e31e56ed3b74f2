//! Peripheral drivers and one-shot hardware initialisation.

pub mod button;
pub mod hw_init;
pub mod indicator;
pub mod light;
pub mod tft;
pub mod ultrasonic;
