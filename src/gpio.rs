//! Discrete GPIO lines driving the panel's reset and command/data inputs.
//!
//! | Line | Pin  | Direction | Meaning                          |
//! |------|------|-----------|----------------------------------|
//! | RES  | GPG5 | Output    | Panel hardware reset, active low |
//! | D/C  | GPG6 | Output    | Low = command, high = data       |
//!
//! Each port has a control register holding two mode bits per pin and a data
//! register holding one level bit per pin.

use crate::regs::RegisterIo;

/// GPIO controller base address.
pub const GPIO_BASE: u32 = 0x5600_0000;

/// Port E configuration register (SPI0 pins live here).
pub(crate) const GPECON: u32 = GPIO_BASE + 0x40;
/// Port G configuration register.
pub const GPGCON: u32 = GPIO_BASE + 0x60;
/// Port G data register.
pub const GPGDAT: u32 = GPIO_BASE + 0x64;

/// Two-bit pin function selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PinMode {
    /// Pin is an input.
    Input = 0b00,
    /// Pin is a push-pull output.
    Output = 0b01,
    /// Pin is routed to its first alternate peripheral function.
    Alternate = 0b10,
}

/// Replace the two mode bits of `pin` inside a port configuration word.
#[must_use]
pub const fn with_pin_mode(con: u32, pin: u8, mode: PinMode) -> u32 {
    let shift = (pin as u32) * 2;
    (con & !(0b11 << shift)) | ((mode as u32) << shift)
}

/// A single GPIO line identified by its port registers and pin number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Line {
    con: u32,
    dat: u32,
    pin: u8,
}

impl Line {
    /// Describe pin `pin` of the port whose control and data registers are at
    /// `con` and `dat`.
    #[must_use]
    pub const fn new(con: u32, dat: u32, pin: u8) -> Self {
        Self { con, dat, pin }
    }

    /// Pin number within its port.
    #[must_use]
    pub const fn pin(&self) -> u8 {
        self.pin
    }

    const fn mask(&self) -> u32 {
        1 << self.pin
    }

    /// Program the pin function, leaving the other pins of the port alone.
    pub fn set_mode<R: RegisterIo>(&self, io: &mut R, mode: PinMode) {
        let pin = self.pin;
        io.modify(self.con, |con| with_pin_mode(con, pin, mode));
    }

    /// Drive the line high.
    pub fn set_high<R: RegisterIo>(&self, io: &mut R) {
        let mask = self.mask();
        io.modify(self.dat, |dat| dat | mask);
    }

    /// Drive the line low.
    pub fn set_low<R: RegisterIo>(&self, io: &mut R) {
        let mask = self.mask();
        io.modify(self.dat, |dat| dat & !mask);
    }

    /// Level currently latched in the data register.
    pub fn is_set_high<R: RegisterIo>(&self, io: &mut R) -> bool {
        io.read(self.dat) & self.mask() != 0
    }
}

/// The panel's reset and command/data select lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlLines {
    reset: Line,
    dc: Line,
}

impl ControlLines {
    /// Board wiring: RES on GPG5, D/C on GPG6.
    pub const BOARD: Self = Self::new(
        Line::new(GPGCON, GPGDAT, 5),
        Line::new(GPGCON, GPGDAT, 6),
    );

    /// Pair up a reset line and a command/data line.
    #[must_use]
    pub const fn new(reset: Line, dc: Line) -> Self {
        Self { reset, dc }
    }

    /// Reset line.
    #[must_use]
    pub const fn reset(&self) -> Line {
        self.reset
    }

    /// Command/data select line.
    #[must_use]
    pub const fn dc(&self) -> Line {
        self.dc
    }

    /// Switch both lines to output mode.
    pub fn configure<R: RegisterIo>(&self, io: &mut R) {
        self.reset.set_mode(io, PinMode::Output);
        self.dc.set_mode(io, PinMode::Output);
    }

    /// Mark the next bus byte as a command.
    pub fn select_command<R: RegisterIo>(&self, io: &mut R) {
        self.dc.set_low(io);
    }

    /// Mark the next bus byte as parameter or pixel data.
    pub fn select_data<R: RegisterIo>(&self, io: &mut R) {
        self.dc.set_high(io);
    }

    /// Hold the panel in reset.
    pub fn assert_reset<R: RegisterIo>(&self, io: &mut R) {
        self.reset.set_low(io);
    }

    /// Let the panel out of reset.
    pub fn release_reset<R: RegisterIo>(&self, io: &mut R) {
        self.reset.set_high(io);
    }
}

impl Default for ControlLines {
    fn default() -> Self {
        Self::BOARD
    }
}
