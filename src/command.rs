//! ST7789 command set and the power-on initialization table.

use crate::sequencer::CommandTable;

/// Sleep out.
pub const SLPOUT: u8 = 0x11;
/// Display inversion on.
pub const INVON: u8 = 0x21;
/// Display on.
pub const DISPON: u8 = 0x29;
/// Column address set.
pub const CASET: u8 = 0x2A;
/// Row address set.
pub const RASET: u8 = 0x2B;
/// Memory write. Every data byte after it lands in frame memory.
pub const RAMWR: u8 = 0x2C;
/// Memory data access control (scan direction, RGB/BGR order).
pub const MADCTL: u8 = 0x36;
/// Interface pixel format.
pub const COLMOD: u8 = 0x3A;
/// Porch setting.
pub const PORCTRL: u8 = 0xB2;
/// Gate control.
pub const GCTRL: u8 = 0xB7;
/// VCOM setting.
pub const VCOMS: u8 = 0xBB;
/// LCM control.
pub const LCMCTRL: u8 = 0xC0;
/// VDV and VRH command enable.
pub const VDVVRHEN: u8 = 0xC2;
/// VRH set.
pub const VRHS: u8 = 0xC3;
/// VDV set.
pub const VDVS: u8 = 0xC4;
/// Frame rate control in normal mode.
pub const FRCTRL2: u8 = 0xC6;
/// Power control 1.
pub const PWCTRL1: u8 = 0xD0;
/// Positive voltage gamma control.
pub const PVGAMCTRL: u8 = 0xE0;
/// Negative voltage gamma control.
pub const NVGAMCTRL: u8 = 0xE1;

/// `COLMOD` parameter for 16 bits per pixel (RGB565).
pub const COLMOD_RGB565: u8 = 0x05;

/// Panel resolution and pixel depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Geometry {
    /// Visible columns.
    pub cols: u16,
    /// Visible rows.
    pub rows: u16,
    /// Bytes sent per pixel.
    pub bytes_per_pixel: u8,
}

impl Geometry {
    /// 240×240 panel in RGB565.
    pub const ST7789_240X240: Self = Self::new(240, 240, 2);

    /// Describe a panel.
    #[must_use]
    pub const fn new(cols: u16, rows: u16, bytes_per_pixel: u8) -> Self {
        Self {
            cols,
            rows,
            bytes_per_pixel,
        }
    }

    /// Number of pixels.
    #[must_use]
    pub const fn pixel_count(&self) -> u32 {
        self.cols as u32 * self.rows as u32
    }

    /// Bytes in one full frame, which is also the DMA unit count for byte
    /// transfers.
    ///
    /// Wide enough for any `cols`, `rows` and `bytes_per_pixel`.
    #[must_use]
    pub const fn frame_bytes(&self) -> u64 {
        self.pixel_count() as u64 * self.bytes_per_pixel as u64
    }

    /// `CASET` parameters covering every column: start and end, big-endian.
    #[must_use]
    pub const fn column_window(&self) -> [u8; 4] {
        window(self.cols)
    }

    /// `RASET` parameters covering every row: start and end, big-endian.
    #[must_use]
    pub const fn row_window(&self) -> [u8; 4] {
        window(self.rows)
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::ST7789_240X240
    }
}

const fn window(extent: u16) -> [u8; 4] {
    let [hi, lo] = extent.saturating_sub(1).to_be_bytes();
    [0, 0, hi, lo]
}

const COLUMNS: [u8; 4] = Geometry::ST7789_240X240.column_window();
const ROWS: [u8; 4] = Geometry::ST7789_240X240.row_window();

/// Power-on sequence for a 240×240 ST7789 module, ending with `RAMWR` so the
/// panel is ready to take pixel data.
#[rustfmt::skip]
pub const INIT_TABLE: &[u8] = &[
    SLPOUT, 0,
    MADCTL, 1, 0x00,
    COLMOD, 1, COLMOD_RGB565,
    PORCTRL, 5, 0x0C, 0x0C, 0x00, 0x33, 0x33,
    GCTRL, 1, 0x35,
    VCOMS, 1, 0x19,
    LCMCTRL, 1, 0x2C,
    VDVVRHEN, 1, 0x01,
    VRHS, 1, 0x12,
    VDVS, 1, 0x20,
    FRCTRL2, 1, 0x0F,
    PWCTRL1, 2, 0xA4, 0xA1,
    PVGAMCTRL, 14,
        0xD0, 0x04, 0x0D, 0x11, 0x13, 0x2B, 0x3F,
        0x54, 0x4C, 0x18, 0x0D, 0x0B, 0x1F, 0x23,
    NVGAMCTRL, 14,
        0xD0, 0x04, 0x0C, 0x11, 0x13, 0x2C, 0x3F,
        0x44, 0x51, 0x2F, 0x1F, 0x1F, 0x20, 0x23,
    INVON, 0,
    SLPOUT, 0,
    DISPON, 0,
    CASET, 4, COLUMNS[0], COLUMNS[1], COLUMNS[2], COLUMNS[3],
    RASET, 4, ROWS[0], ROWS[1], ROWS[2], ROWS[3],
    RAMWR, 0,
];

/// [`INIT_TABLE`], validated at compile time.
pub const INIT_COMMANDS: CommandTable<'static> = match CommandTable::new(INIT_TABLE) {
    Ok(table) => table,
    Err(_) => panic!("INIT_TABLE is malformed"),
};

/// Check that the `CASET`/`RASET` records of `table`, if present, address the
/// whole of `geometry`.
///
/// Returns the offending opcode on mismatch.
pub(crate) fn window_mismatch(table: &CommandTable<'_>, geometry: &Geometry) -> Option<u8> {
    [
        (CASET, geometry.column_window()),
        (RASET, geometry.row_window()),
    ]
    .into_iter()
    .find_map(|(opcode, expected)| match table.find(opcode) {
        Some(command) if command.params != expected => Some(opcode),
        _ => None,
    })
}
