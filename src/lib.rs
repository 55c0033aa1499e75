//! ST7789 TFT bring-up and DMA framebuffer streaming for S3C2440-class SoCs.
//!
//! ## How the panel is fed
//!
//! The ST7789 is a TFT controller with its own frame memory. It listens on a
//! four-wire serial bus plus two discrete lines:
//!
//! ### Signal names
//! - **SCK / MOSI** – SPI clock and data into the controller
//! - **D/C** – LOW marks the byte on the bus as a command, HIGH as parameter or pixel data
//! - **RES** – Hardware reset, active LOW
//!
//! ### Bring-up workflow
//! 1. Both discrete lines are switched to outputs and the SPI pins to their bus function.
//! 2. The SPI channel is set up as master, CPOL = CPHA = 1, in DMA request mode, and its prescaler programmed for the requested SCK rate.
//! 3. RES is pulsed LOW, then the panel is given time to come out of reset.
//! 4. A tag-length-value command table is played over the bus: sleep out, pixel format, porch, voltages, gamma, inversion, display on, and finally the full-screen column/row window followed by `RAMWR`.
//! 5. D/C is left HIGH. From here on every byte the panel receives is pixel data.
//! 6. A DMA channel is pointed at the framebuffer and at the SPI transmit register, paced by the SPI channel's request line and set to reload automatically.
//!
//! ### Implications for software
//! - The DMA channel never stops. Once triggered, it re-sends the whole frame for as long as the system runs, so drawing into the framebuffer shows up on the next pass.
//! - Nothing is double-buffered; a frame may be shown half old, half new.
//! - All blocking happens during bring-up: SPI ready polls and the reset delays.
//!
//! ## Modules
//!
//! | Module            | Role                                                        |
//! |-------------------|-------------------------------------------------------------|
//! | [`regs`]          | [`RegisterIo`] boundary, [`HardwareContext`]                |
//! | [`poll`]          | Busy-wait with an optional iteration bound                  |
//! | [`spi`]           | SPI channel: control word, prescaler, byte transfers        |
//! | [`dma`]           | DMA channel: addresses, control word, trigger, status       |
//! | [`gpio`]          | Reset and D/C lines                                         |
//! | [`sequencer`]     | Tag-length-value command tables                             |
//! | [`command`]       | ST7789 opcodes, [`Geometry`], the init table                |
//! | [`framebuffer`]   | RGB565 [`FrameBuffer`] in wire byte order                   |
//! | [`display`]       | [`St7789`]: bring-up and hand-off to the DMA stream         |
//!
//! ## Example
//!
//! ```rust,no_run
//! use st7789_dma::framebuffer::FrameBuffer240x240;
//! use st7789_dma::regs::{HardwareContext, Mmio};
//! use st7789_dma::{DisplayConfig, St7789};
//! # struct Delay;
//! # impl embedded_hal::delay::DelayNs for Delay { fn delay_ns(&mut self, _ns: u32) {} }
//!
//! static mut FRAMEBUFFER: FrameBuffer240x240 = FrameBuffer240x240::new();
//!
//! // SAFETY: running on the SoC with its peripheral registers mapped 1:1
//! let io = unsafe { Mmio::new() };
//! let hw = HardwareContext::new(io, Delay, 50_000_000);
//! let mut display = St7789::new(hw, DisplayConfig::default()).unwrap();
//!
//! // SAFETY: the only reference to FRAMEBUFFER
//! let framebuffer = unsafe { &mut *core::ptr::addr_of_mut!(FRAMEBUFFER) };
//! display.init_with_buffer(framebuffer).unwrap();
//! ```
//!
//! ## Available Feature Flags
//!
//! ### `defmt` Feature
//! Implements `defmt::Format` for the public types and logs bring-up progress
//! through `defmt`: each step at debug level, each table command at trace
//! level and the hand-off at info level. Without the feature the log
//! statements compile to nothing.
//!
//! ```toml
//! [dependencies]
//! st7789-dma = { version = "0.1.0", features = ["defmt"] }
//! ```
#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

#[macro_use]
mod fmt;

pub mod command;
pub mod display;
pub mod dma;
pub mod framebuffer;
pub mod gpio;
pub mod poll;
pub mod regs;
pub mod sequencer;
pub mod spi;

#[cfg(test)]
mod testing;

use embedded_graphics::pixelcolor::Rgb565;

pub use command::Geometry;
pub use display::{DisplayConfig, Error, St7789};
pub use framebuffer::FrameBuffer;
pub use regs::{HardwareContext, RegisterIo};

/// Color type used by the framebuffer and the pixel write path.
pub type Color = Rgb565;

#[cfg(test)]
mod tests {
    extern crate std;

    use embedded_graphics::pixelcolor::RgbColor;

    use super::*;

    #[test]
    fn test_color_type_alias() {
        let red: Color = Color::RED;
        assert_eq!(red.r(), Color::MAX_R);
        assert_eq!(red.g(), 0);
        assert_eq!(red.b(), 0);
        assert_eq!(Color::MAX_G, 63);
    }

    #[test]
    fn test_default_geometry_matches_framebuffer() {
        let config = DisplayConfig::default();
        assert_eq!(
            config.geometry,
            framebuffer::FrameBuffer240x240::geometry()
        );
        assert_eq!(
            config.geometry.frame_bytes() as usize,
            framebuffer::FrameBuffer240x240::size_bytes()
        );
        assert!(config.geometry.frame_bytes() <= u64::from(dma::MAX_TRANSFER_COUNT));
    }

    #[test]
    fn test_default_prescaler() {
        let config = DisplayConfig::default();
        assert_eq!(spi::prescaler_for(50_000_000, config.baud_hz), 0);
    }
}
