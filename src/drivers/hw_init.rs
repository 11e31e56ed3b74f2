//! One-shot hardware peripheral initialization for the sensor node.
//!
//! Configures the light sensor ADC channel and the button input, and
//! registers the button ISR, using raw ESP-IDF sys calls.  Called once
//! from `main()` before the loop starts.  Output pins (buzzer, LEDs,
//! ultrasonic trigger) are owned by `esp_idf_hal::gpio::PinDriver`s
//! instead.
//!
//! On the host every entry point is a simulation no-op, and the ADC reads
//! from a settable table so the light driver can be exercised in tests.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

use crate::drivers::button::Debouncer;
use crate::error::Error;
#[cfg(target_os = "espidf")]
use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
    IsrInstallFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
        }
    }
}

impl From<HwInitError> for Error {
    fn from(e: HwInitError) -> Self {
        log::error!("hw_init: {}", e);
        match e {
            HwInitError::AdcInitFailed(_) => Self::Init("ADC1"),
            HwInitError::GpioConfigFailed(_) => Self::Init("GPIO"),
            HwInitError::IsrInstallFailed(_) => Self::Init("GPIO ISR"),
        }
    }
}

/// Map an `esp_err_t` (`ESP_OK` is 0) to `Ok` or to `err(rc)`.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
fn esp_check(ret: i32, err: fn(i32) -> HwInitError) -> Result<(), HwInitError> {
    if ret == 0 {
        Ok(())
    } else {
        Err(err(ret))
    }
}

/// ADC1 channel of the light sensor (GPIO34).
pub const ADC1_CH_LIGHT: u32 = 6;

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the loop; single-threaded.
    unsafe {
        init_adc()?;
        init_button_input()?;
    }
    info!("hw_init: ADC and button configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── ADC (oneshot) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// SAFETY: Only from the single-threaded init path or the main-loop read
/// path; `init_adc()` completes before the loop starts.
#[cfg(target_os = "espidf")]
unsafe fn adc1_handle() -> adc_oneshot_unit_handle_t {
    unsafe { ADC1_HANDLE }
}

#[cfg(target_os = "espidf")]
unsafe fn init_adc() -> Result<(), HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: ADC1_HANDLE is only written here, once at boot.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    // 12 dB attenuation: full 0 – 3.3 V swing of the divider.
    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };
    let ret = unsafe { adc_oneshot_config_channel(adc1_handle(), ADC1_CH_LIGHT, &chan_cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    info!("hw_init: ADC1 CH{} (light) configured", ADC1_CH_LIGHT);
    Ok(())
}

/// Raw ADC1 sample, `None` if the driver reports an error.
#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> Option<i32> {
    let mut raw: i32 = 0;
    // SAFETY: adc1_handle() contract, main-loop access only.
    let ret = unsafe { adc_oneshot_read(adc1_handle(), channel, &mut raw) };
    (ret == ESP_OK as i32).then_some(raw)
}

#[cfg(not(target_os = "espidf"))]
mod sim {
    use core::sync::atomic::{AtomicI32, Ordering};

    /// `i32::MIN` marks a channel whose read fails.
    const FAIL: i32 = i32::MIN;

    static ADC: [AtomicI32; 10] = [const { AtomicI32::new(0) }; 10];

    pub fn read(channel: u32) -> Option<i32> {
        let v = ADC.get(channel as usize)?.load(Ordering::Relaxed);
        (v != FAIL).then_some(v)
    }

    pub fn set(channel: u32, value: Option<i32>) {
        if let Some(slot) = ADC.get(channel as usize) {
            slot.store(value.unwrap_or(FAIL), Ordering::Relaxed);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn adc1_read(channel: u32) -> Option<i32> {
    sim::read(channel)
}

/// Host only: set what the simulated ADC returns (`None` = read error).
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_adc(channel: u32, value: Option<i32>) {
    sim::set(channel, value);
}

// ── Button input + ISR ────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_button_input() -> Result<(), HwInitError> {
    let btn_cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pins::sensor::BUTTON_GPIO,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_NEGEDGE,
    };
    let ret = unsafe { gpio_config(&btn_cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }
    Ok(())
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn button_gpio_isr(arg: *mut core::ffi::c_void) {
    // SAFETY: `arg` is the `&'static Debouncer` registered in
    // `init_button_isr`; the debouncer only exposes atomics.
    let debouncer = unsafe { &*(arg as *const Debouncer) };
    // SAFETY: timer and GPIO level reads are register accesses, ISR-safe.
    let now_ms = (unsafe { esp_timer_get_time() } / 1_000) as u32;
    let level = unsafe { gpio_get_level(pins::sensor::BUTTON_GPIO) } != 0;
    debouncer.record_level(level);
    debouncer.notify_edge(now_ms);
}

/// Install the GPIO ISR service and attach the button handler.  The
/// debouncer is passed to the ISR as its argument.
#[cfg(target_os = "espidf")]
pub fn init_button_isr(debouncer: &'static Debouncer) -> Result<(), HwInitError> {
    let arg = core::ptr::from_ref(debouncer).cast_mut().cast::<core::ffi::c_void>();
    // SAFETY: gpio_install_isr_service is idempotent; ESP_ERR_INVALID_STATE
    // means it was already installed.  The handler only touches the
    // debouncer's atomics, which outlive the registration ('static).
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK as i32 && ret != ESP_ERR_INVALID_STATE as i32 {
            return Err(HwInitError::IsrInstallFailed(ret));
        }

        // Falling edge: active-low with pull-up.
        esp_check(
            gpio_set_intr_type(pins::sensor::BUTTON_GPIO, gpio_int_type_t_GPIO_INTR_NEGEDGE),
            HwInitError::GpioConfigFailed,
        )?;
        esp_check(
            gpio_isr_handler_add(pins::sensor::BUTTON_GPIO, Some(button_gpio_isr), arg),
            HwInitError::IsrInstallFailed,
        )?;
        esp_check(
            gpio_intr_enable(pins::sensor::BUTTON_GPIO),
            HwInitError::IsrInstallFailed,
        )?;
    }
    info!(
        "hw_init: button ISR on GPIO{} ({} ms refractory)",
        pins::sensor::BUTTON_GPIO,
        debouncer.refractory_ms()
    );
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_button_isr(debouncer: &'static Debouncer) -> Result<(), HwInitError> {
    log::info!(
        "hw_init(sim): button ISR skipped ({} ms refractory)",
        debouncer.refractory_ms()
    );
    Ok(())
}
