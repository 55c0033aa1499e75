//! DMA-readable RGB565 framebuffer.
//!
//! Pixels are stored row-major, two bytes each, high byte first: exactly the
//! byte order the panel expects after `RAMWR` with `COLMOD = 0x05`. Handing the
//! buffer to the DMA channel therefore needs no conversion step, and the
//! channel's unit count is [`FrameBuffer::size_bytes`].
//!
//! # Example
//! ```rust
//! use embedded_graphics::pixelcolor::{Rgb565, RgbColor};
//! use embedded_graphics::prelude::*;
//! use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
//! use st7789_dma::framebuffer::FrameBuffer;
//!
//! let mut framebuffer = FrameBuffer::<32, 48>::new();
//!
//! Rectangle::new(Point::new(4, 4), Size::new(8, 8))
//!     .into_styled(PrimitiveStyle::with_fill(Rgb565::RED))
//!     .draw(&mut framebuffer)
//!     .unwrap();
//!
//! assert_eq!(framebuffer.pixel(Point::new(5, 5)), Some(Rgb565::RED));
//! assert_eq!(framebuffer.pixel(Point::new(0, 0)), Some(Rgb565::BLACK));
//! ```
//!
//! # Safety
//! [`ReadBuffer`] is implemented for `&mut FrameBuffer` only, so the pointer
//! handed to the DMA channel always refers to storage that stays put. The
//! continuously reloading stream started by
//! [`St7789::init_with_buffer`](crate::display::St7789::init_with_buffer)
//! additionally needs that borrow to be `'static`.

use core::convert::Infallible;

use embedded_dma::ReadBuffer;
use embedded_graphics::pixelcolor::raw::RawU16;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::{IntoStorage, OriginDimensions, Point, Size};
use embedded_graphics::primitives::Rectangle;
use embedded_graphics::Pixel;

use crate::command::Geometry;

/// Bytes per stored pixel.
pub const BYTES_PER_PIXEL: usize = 2;

/// Framebuffer for the 240×240 module.
pub type FrameBuffer240x240 = FrameBuffer<240, 240>;

/// Encode a color the way it travels on the wire.
#[must_use]
pub fn color_to_bytes(color: Rgb565) -> [u8; BYTES_PER_PIXEL] {
    color.into_storage().to_be_bytes()
}

/// Decode two wire bytes into a color.
#[must_use]
pub fn color_from_bytes(bytes: [u8; BYTES_PER_PIXEL]) -> Rgb565 {
    Rgb565::from(RawU16::new(u16::from_be_bytes(bytes)))
}

/// RGB565 frame storage.
///
/// # Type Parameters
/// - `ROWS`: panel height in pixels
/// - `COLS`: panel width in pixels
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(C)]
#[repr(align(4))]
pub struct FrameBuffer<const ROWS: usize, const COLS: usize> {
    rows: [[[u8; BYTES_PER_PIXEL]; COLS]; ROWS],
}

impl<const ROWS: usize, const COLS: usize> Default for FrameBuffer<ROWS, COLS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const ROWS: usize, const COLS: usize> FrameBuffer<ROWS, COLS> {
    /// A black frame.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rows: [[[0; BYTES_PER_PIXEL]; COLS]; ROWS],
        }
    }

    /// Size of the pixel storage in bytes.
    #[must_use]
    pub const fn size_bytes() -> usize {
        ROWS * COLS * BYTES_PER_PIXEL
    }

    /// The panel geometry this buffer matches.
    #[must_use]
    pub const fn geometry() -> Geometry {
        Geometry::new(COLS as u16, ROWS as u16, BYTES_PER_PIXEL as u8)
    }

    /// Set every pixel to black.
    pub fn clear(&mut self) {
        self.fill(Rgb565::new(0, 0, 0));
    }

    /// Set every pixel to `color`.
    pub fn fill(&mut self, color: Rgb565) {
        let bytes = color_to_bytes(color);
        for row in &mut self.rows {
            row.fill(bytes);
        }
    }

    /// Set one pixel. Points outside the frame are ignored.
    pub fn set_pixel(&mut self, p: Point, color: Rgb565) {
        if let Some((x, y)) = Self::index(p) {
            self.rows[y][x] = color_to_bytes(color);
        }
    }

    /// Read one pixel back, `None` outside the frame.
    #[must_use]
    pub fn pixel(&self, p: Point) -> Option<Rgb565> {
        Self::index(p).map(|(x, y)| color_from_bytes(self.rows[y][x]))
    }

    /// The pixel storage in transfer order.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.rows.as_flattened().as_flattened()
    }

    fn index(p: Point) -> Option<(usize, usize)> {
        let x = usize::try_from(p.x).ok()?;
        let y = usize::try_from(p.y).ok()?;
        (x < COLS && y < ROWS).then_some((x, y))
    }
}

impl<const ROWS: usize, const COLS: usize> OriginDimensions for FrameBuffer<ROWS, COLS> {
    fn size(&self) -> Size {
        Size::new(COLS as u32, ROWS as u32)
    }
}

impl<const ROWS: usize, const COLS: usize> embedded_graphics::draw_target::DrawTarget
    for FrameBuffer<ROWS, COLS>
{
    type Color = Rgb565;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            self.set_pixel(point, color);
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let area = area.intersection(&Rectangle::new(Point::zero(), self.size()));
        let Some(bottom_right) = area.bottom_right() else {
            return Ok(());
        };
        let bytes = color_to_bytes(color);
        let (x0, y0) = (area.top_left.x as usize, area.top_left.y as usize);
        let (x1, y1) = (bottom_right.x as usize, bottom_right.y as usize);
        for row in &mut self.rows[y0..=y1] {
            row[x0..=x1].fill(bytes);
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.fill(color);
        Ok(())
    }
}

unsafe impl<const ROWS: usize, const COLS: usize> ReadBuffer for &mut FrameBuffer<ROWS, COLS> {
    type Word = u8;

    unsafe fn read_buffer(&self) -> (*const u8, usize) {
        let ptr = &self.rows as *const _ as *const u8;
        let len = core::mem::size_of_val(&self.rows);
        (ptr, len)
    }
}

impl<const ROWS: usize, const COLS: usize> core::fmt::Debug for FrameBuffer<ROWS, COLS> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("rows", &ROWS)
            .field("cols", &COLS)
            .field("size", &core::mem::size_of_val(&self.rows))
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl<const ROWS: usize, const COLS: usize> defmt::Format for FrameBuffer<ROWS, COLS> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "FrameBuffer<{}, {}>", ROWS, COLS);
        defmt::write!(f, " size: {}", core::mem::size_of_val(&self.rows));
    }
}
