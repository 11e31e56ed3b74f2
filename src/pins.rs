//! GPIO / peripheral pin assignments for both rig boards.
//!
//! Single source of truth: the raw sys-call paths and the camera
//! configuration read these numbers, and the binaries pick the matching
//! `esp_idf_hal` pins.  Change a pin here and in the binary together.

/// Camera node (ESP32 + OV7670 + 128×128 TFT).
pub mod camera {
    // -----------------------------------------------------------------------
    // OV7670 camera (SCCB + 8-bit parallel)
    // -----------------------------------------------------------------------

    pub const SIOD_GPIO: i32 = 21;
    pub const SIOC_GPIO: i32 = 22;
    pub const VSYNC_GPIO: i32 = 34;
    pub const HREF_GPIO: i32 = 35;
    pub const XCLK_GPIO: i32 = 32;
    pub const PCLK_GPIO: i32 = 33;
    /// D0 – D7.
    pub const DATA_GPIO: [i32; 8] = [27, 17, 16, 15, 14, 13, 12, 4];
    /// XCLK fed to the sensor.
    pub const XCLK_FREQ_HZ: i32 = 10_000_000;

    // -----------------------------------------------------------------------
    // TFT panel (SPI2)
    // -----------------------------------------------------------------------

    pub const TFT_MOSI_GPIO: i32 = 23;
    pub const TFT_SCLK_GPIO: i32 = 18;
    pub const TFT_CS_GPIO: i32 = 5;
    pub const TFT_DC_GPIO: i32 = 2;
    pub const TFT_RST_GPIO: i32 = 19;
    pub const TFT_SPI_FREQ_HZ: u32 = 27_000_000;
}

/// Sensor node (ESP32 + HC-SR04 + photoresistor + buzzer/LEDs + button).
pub mod sensor {
    // -----------------------------------------------------------------------
    // Ultrasonic range finder
    // -----------------------------------------------------------------------

    pub const TRIG_GPIO: i32 = 5;
    pub const ECHO_GPIO: i32 = 18;

    // -----------------------------------------------------------------------
    // Light sensor (ADC1 channel 6)
    // -----------------------------------------------------------------------

    pub const LIGHT_GPIO: i32 = 34;

    // -----------------------------------------------------------------------
    // Alarm outputs
    // -----------------------------------------------------------------------

    /// Active-low buzzer module.
    pub const BUZZER_GPIO: i32 = 22;
    pub const LED_R_GPIO: i32 = 2;
    pub const LED_G_GPIO: i32 = 4;

    // -----------------------------------------------------------------------
    // User button (active-low, internal pull-up, falling-edge interrupt)
    // -----------------------------------------------------------------------

    pub const BUTTON_GPIO: i32 = 23;
}
