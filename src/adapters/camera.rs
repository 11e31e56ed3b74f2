//! Camera adapter for node A.
//!
//! On ESP-IDF the `espressif/esp32-camera` component is driven through its
//! generated bindings (`esp_idf_svc::sys::camera`) at QQVGA RGB565.  The
//! image header sent ahead of every upload is a 16-bit bitfields BMP header
//! built once at init.
//!
//! ```text
//!  off  size  field
//!   0    2    "BM"
//!   2    4    file size (header + pixels)
//!  10    4    pixel data offset (66)
//!  14    4    info header size (40)
//!  18    4    width
//!  22    4    -height (top-down rows)
//!  26    2    planes = 1
//!  28    2    bpp = 16
//!  30    4    compression = 3 (bitfields)
//!  34    4    image size
//!  54   12    R/G/B masks F800 / 07E0 / 001F
//! ```

/// Size of the upload header.
pub const BMP_HEADER_LEN: usize = 66;

const BI_BITFIELDS: u32 = 3;
const RGB565_MASKS: [u32; 3] = [0xF800, 0x07E0, 0x001F];

fn put_u32(buf: &mut [u8; BMP_HEADER_LEN], at: usize, v: u32) {
    buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
}

/// 16-bit RGB565 BMP header for a `width × height` frame.
pub fn bmp_header(width: u16, height: u16) -> [u8; BMP_HEADER_LEN] {
    let image = u32::from(width) * u32::from(height) * 2;
    let mut h = [0u8; BMP_HEADER_LEN];
    h[0] = b'B';
    h[1] = b'M';
    put_u32(&mut h, 2, BMP_HEADER_LEN as u32 + image);
    put_u32(&mut h, 10, BMP_HEADER_LEN as u32);
    put_u32(&mut h, 14, 40);
    put_u32(&mut h, 18, u32::from(width));
    h[22..26].copy_from_slice(&(-i32::from(height)).to_le_bytes());
    h[26..28].copy_from_slice(&1u16.to_le_bytes());
    h[28..30].copy_from_slice(&16u16.to_le_bytes());
    put_u32(&mut h, 30, BI_BITFIELDS);
    put_u32(&mut h, 34, image);
    for (i, mask) in RGB565_MASKS.iter().enumerate() {
        put_u32(&mut h, 54 + i * 4, *mask);
    }
    h
}

#[cfg(target_os = "espidf")]
pub use device::EspCamera;

#[cfg(target_os = "espidf")]
mod device {
    use esp_idf_svc::sys::{camera, esp};
    use log::info;

    use super::{BMP_HEADER_LEN, bmp_header};
    use crate::app::ports::{CameraPort, Frame};
    use crate::error::{Result, SensorError};
    use crate::pins;

    /// QQVGA.
    pub const WIDTH: u16 = 160;
    pub const HEIGHT: u16 = 120;

    pub struct EspCamera {
        fb: *mut camera::camera_fb_t,
        header: [u8; BMP_HEADER_LEN],
    }

    impl EspCamera {
        pub fn init() -> anyhow::Result<Self> {
            let [d0, d1, d2, d3, d4, d5, d6, d7] = pins::camera::DATA_GPIO;
            let config = camera::camera_config_t {
                pin_pwdn: -1,
                pin_reset: -1,
                pin_xclk: pins::camera::XCLK_GPIO,
                __bindgen_anon_1: camera::camera_config_t__bindgen_ty_1 {
                    pin_sccb_sda: pins::camera::SIOD_GPIO,
                },
                __bindgen_anon_2: camera::camera_config_t__bindgen_ty_2 {
                    pin_sccb_scl: pins::camera::SIOC_GPIO,
                },
                pin_d0: d0,
                pin_d1: d1,
                pin_d2: d2,
                pin_d3: d3,
                pin_d4: d4,
                pin_d5: d5,
                pin_d6: d6,
                pin_d7: d7,
                pin_vsync: pins::camera::VSYNC_GPIO,
                pin_href: pins::camera::HREF_GPIO,
                pin_pclk: pins::camera::PCLK_GPIO,
                xclk_freq_hz: pins::camera::XCLK_FREQ_HZ,
                ledc_timer: camera::ledc_timer_t_LEDC_TIMER_0,
                ledc_channel: camera::ledc_channel_t_LEDC_CHANNEL_0,
                pixel_format: camera::pixformat_t_PIXFORMAT_RGB565,
                frame_size: camera::framesize_t_FRAMESIZE_QQVGA,
                jpeg_quality: 12,
                fb_count: 1,
                fb_location: camera::camera_fb_location_t_CAMERA_FB_IN_DRAM,
                grab_mode: camera::camera_grab_mode_t_CAMERA_GRAB_LATEST,
                ..Default::default()
            };
            // SAFETY: called once from main before any capture.
            esp!(unsafe { camera::esp_camera_init(&config) })?;
            info!("Camera: OV7670 {}x{} RGB565", WIDTH, HEIGHT);
            Ok(Self {
                fb: core::ptr::null_mut(),
                header: bmp_header(WIDTH, HEIGHT),
            })
        }

        fn release(&mut self) {
            if !self.fb.is_null() {
                // SAFETY: fb came from esp_camera_fb_get and is returned once.
                unsafe { camera::esp_camera_fb_return(self.fb) };
                self.fb = core::ptr::null_mut();
            }
        }
    }

    impl CameraPort for EspCamera {
        fn capture(&mut self) -> Result<()> {
            self.release();
            // SAFETY: driver initialised in `init`.
            let fb = unsafe { camera::esp_camera_fb_get() };
            if fb.is_null() {
                return Err(SensorError::FrameUnavailable.into());
            }
            self.fb = fb;
            Ok(())
        }

        fn frame(&self) -> Result<Frame<'_>> {
            if self.fb.is_null() {
                return Err(SensorError::FrameUnavailable.into());
            }
            // SAFETY: fb stays valid until the next capture or drop, both
            // of which need `&mut self`.
            let fb = unsafe { &*self.fb };
            let pixels = unsafe { core::slice::from_raw_parts(fb.buf, fb.len) };
            Ok(Frame {
                width: fb.width as u16,
                height: fb.height as u16,
                pixels,
            })
        }

        fn header(&self) -> &[u8] {
            &self.header
        }
    }

    impl Drop for EspCamera {
        fn drop(&mut self) {
            self.release();
        }
    }
}
