//! ST7735 128×128 TFT preview panel over SPI.
//!
//! ## Hardware
//!
//! - SPI2: MOSI GPIO23, SCLK GPIO18, CS GPIO5 (handled by the SPI device).
//! - DC GPIO2 (LOW = command, HIGH = data), RST GPIO19.
//!
//! The panel takes RGB565 pixels MSB first.  The camera frame is mapped
//! onto the panel by nearest-neighbour sampling:
//!
//! ```text
//!   src_x = x * frame_w / 128      src_y = y * frame_h / 128
//!   idx   = (src_y * frame_w + src_x) * 2
//!   pixel = (frame[idx + 1] << 8) | frame[idx]
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiDevice;
use log::info;

use crate::app::ports::{DisplayPort, Frame};
use crate::error::{ActuatorError, Result};

/// Panel edge in pixels.
pub const PANEL: u16 = 128;

// ST7735 command set (subset)
const SWRESET: u8 = 0x01;
const SLPOUT: u8 = 0x11;
const INVOFF: u8 = 0x20;
const DISPON: u8 = 0x29;
const CASET: u8 = 0x2A;
const RASET: u8 = 0x2B;
const RAMWR: u8 = 0x2C;
const MADCTL: u8 = 0x36;
const COLMOD: u8 = 0x3A;

/// Panel RAM offset of the 128×128 "green tab" modules.
const COL_OFFSET: u16 = 2;
const ROW_OFFSET: u16 = 1;

/// Colour of one preview pixel, black when the frame is too short.
pub fn preview_pixel(frame: &Frame<'_>, x: u16, y: u16) -> u16 {
    let w = usize::from(frame.width);
    let h = usize::from(frame.height);
    let src_x = usize::from(x) * w / usize::from(PANEL);
    let src_y = usize::from(y) * h / usize::from(PANEL);
    let idx = (src_y * w + src_x) * 2;
    match frame.pixels.get(idx..idx + 2) {
        Some(&[lo, hi]) => u16::from_le_bytes([lo, hi]),
        _ => 0,
    }
}

/// All 128×128 preview pixels, row-major.
pub fn preview_pixels<'f>(frame: &'f Frame<'_>) -> impl Iterator<Item = u16> + 'f {
    (0..PANEL).flat_map(move |y| (0..PANEL).map(move |x| preview_pixel(frame, x, y)))
}

pub struct Tft<SPI, DC> {
    spi: SPI,
    dc: DC,
    line: [u8; PANEL as usize * 2],
    frames: u32,
}

impl<SPI, DC> Tft<SPI, DC>
where
    SPI: SpiDevice,
    DC: OutputPin,
{
    pub fn new(spi: SPI, dc: DC) -> Self {
        Self {
            spi,
            dc,
            line: [0; PANEL as usize * 2],
            frames: 0,
        }
    }

    /// Reset and configure the controller, then clear to black.
    pub fn init(&mut self, rst: &mut impl OutputPin, delay: &mut impl DelayNs) -> Result<()> {
        rst.set_low().map_err(|_| ActuatorError::GpioWriteFailed)?;
        delay.delay_ms(10);
        rst.set_high().map_err(|_| ActuatorError::GpioWriteFailed)?;
        delay.delay_ms(120);

        self.command(SWRESET, &[])?;
        delay.delay_ms(150);
        self.command(SLPOUT, &[])?;
        delay.delay_ms(120);
        self.command(COLMOD, &[0x05])?; // 16-bit colour
        self.command(MADCTL, &[0xC8])?; // row/col exchange, BGR
        self.command(INVOFF, &[])?;
        self.command(DISPON, &[])?;
        delay.delay_ms(20);

        self.fill(0x0000)?;
        info!("TFT: {}x{} panel ready", PANEL, PANEL);
        Ok(())
    }

    pub fn fill(&mut self, colour: u16) -> Result<()> {
        self.set_window(0, 0, PANEL - 1, PANEL - 1)?;
        let [hi, lo] = colour.to_be_bytes();
        for px in self.line.chunks_exact_mut(2) {
            px[0] = hi;
            px[1] = lo;
        }
        self.data_mode()?;
        for _ in 0..PANEL {
            self.spi
                .write(&self.line)
                .map_err(|_| ActuatorError::SpiWriteFailed)?;
        }
        Ok(())
    }

    /// Push one scaled frame, a row per SPI write.
    pub fn draw_preview(&mut self, frame: &Frame<'_>) -> Result<()> {
        self.set_window(0, 0, PANEL - 1, PANEL - 1)?;
        self.data_mode()?;
        for y in 0..PANEL {
            for x in 0..PANEL {
                let [hi, lo] = preview_pixel(frame, x, y).to_be_bytes();
                let i = usize::from(x) * 2;
                self.line[i] = hi;
                self.line[i + 1] = lo;
            }
            self.spi
                .write(&self.line)
                .map_err(|_| ActuatorError::SpiWriteFailed)?;
        }
        self.frames = self.frames.wrapping_add(1);
        Ok(())
    }

    /// Frames pushed since init.
    pub fn frames(&self) -> u32 {
        self.frames
    }

    fn set_window(&mut self, x0: u16, y0: u16, x1: u16, y1: u16) -> Result<()> {
        let [a, b] = (x0 + COL_OFFSET).to_be_bytes();
        let [c, d] = (x1 + COL_OFFSET).to_be_bytes();
        self.command(CASET, &[a, b, c, d])?;
        let [a, b] = (y0 + ROW_OFFSET).to_be_bytes();
        let [c, d] = (y1 + ROW_OFFSET).to_be_bytes();
        self.command(RASET, &[a, b, c, d])?;
        self.command(RAMWR, &[])
    }

    fn command(&mut self, cmd: u8, args: &[u8]) -> Result<()> {
        self.dc.set_low().map_err(|_| ActuatorError::GpioWriteFailed)?;
        self.spi
            .write(&[cmd])
            .map_err(|_| ActuatorError::SpiWriteFailed)?;
        if !args.is_empty() {
            self.data_mode()?;
            self.spi
                .write(args)
                .map_err(|_| ActuatorError::SpiWriteFailed)?;
        }
        Ok(())
    }

    fn data_mode(&mut self) -> Result<()> {
        self.dc
            .set_high()
            .map_err(|_| ActuatorError::GpioWriteFailed.into())
    }
}

impl<SPI, DC> DisplayPort for Tft<SPI, DC>
where
    SPI: SpiDevice,
    DC: OutputPin,
{
    fn show_preview(&mut self, frame: &Frame<'_>) -> Result<()> {
        self.draw_preview(frame)
    }
}
