//! SPI channel driver.
//!
//! The SoC has two SPI channels, each with a small register block:
//!
//! | Offset | Register | Use                                          |
//! |--------|----------|----------------------------------------------|
//! | `0x00` | SPCON    | Mode, clock enable, master, polarity, phase  |
//! | `0x04` | SPSTA    | Bit 0 `REDY`: shift register idle            |
//! | `0x08` | SPPIN    | Pin control (unused here)                    |
//! | `0x0C` | SPPRE    | Baud rate prescaler                          |
//! | `0x10` | SPTDAT   | Transmit data, also the DMA destination      |
//! | `0x14` | SPRDAT   | Receive data                                 |
//!
//! The shift register is full duplex: writing SPTDAT shifts a byte out and a
//! byte in at the same time. `REDY` is set while the channel is idle and clear
//! while a byte is in flight; the driver observes it but does not model it.

use bitfield::bitfield;

use crate::gpio::{with_pin_mode, PinMode, GPECON};
use crate::poll::{poll_until, PollBound, Timeout};
use crate::regs::RegisterIo;

/// SPI controller base address.
pub const SPI_BASE: u32 = 0x5900_0000;
/// Number of SPI channels.
pub const CHANNEL_COUNT: u8 = 2;

const CHANNEL_STRIDE: u32 = 0x20;

mod offset {
    pub const SPCON: u32 = 0x00;
    pub const SPSTA: u32 = 0x04;
    pub const SPPRE: u32 = 0x0C;
    pub const SPTDAT: u32 = 0x10;
    pub const SPRDAT: u32 = 0x14;
}

/// `SPSTA.REDY`
const STATUS_READY: u32 = 1 << 0;

/// How SPTDAT is fed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TransferMode {
    /// Software polls `REDY` and writes SPTDAT.
    Polling = 0b00,
    /// An interrupt is raised when the channel becomes ready.
    Interrupt = 0b01,
    /// The channel raises a DMA request when it becomes ready.
    Dma = 0b10,
}

bitfield! {
    /// SPI control word (SPCONn).
    ///
    /// The bit layout is as follows:
    /// - Bits 6-5: SMOD, how SPTDAT is read/written (see [`TransferMode`])
    /// - Bit 4: ENSCK, drive SCK (master only)
    /// - Bit 3: MSTR, master when set
    /// - Bit 2: CPOL, clock idles high when set
    /// - Bit 1: CPHA, transfer format B when set
    /// - Bit 0: TAGD, transmit auto garbage data mode
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct Spcon(u32);
    impl Debug;
    pub u8, smod, set_smod: 6, 5;
    pub ensck, set_ensck: 4;
    pub mstr, set_mstr: 3;
    pub cpol, set_cpol: 2;
    pub cpha, set_cpha: 1;
    pub tagd, set_tagd: 0;
}

impl Spcon {
    /// An all-zero control word: slave, polling, clock disabled.
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Master with SCK enabled, in the given transfer mode and clock format.
    #[must_use]
    pub const fn master(mode: TransferMode, cpol: bool, cpha: bool) -> Self {
        Self(
            ((mode as u32) << 5)
                | (1 << 4)
                | (1 << 3)
                | ((cpol as u32) << 2)
                | ((cpha as u32) << 1),
        )
    }

    /// Raw register value.
    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.0
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Spcon {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Spcon({=u32:#x})", self.0);
    }
}

/// Prescaler for a requested SCK rate.
///
/// The hardware divides by `prescaler + 1`:
/// `baud = pclk / 2 / (prescaler + 1)`, so `prescaler = pclk / 2 / target - 1`
/// using integer division, which rounds toward the next lower achievable
/// rate. The result is clamped to the 8-bit field: targets faster than
/// `pclk / 2` give 0, a zero or very slow target gives 255.
#[must_use]
pub const fn prescaler_for(pclk_hz: u32, target_hz: u32) -> u8 {
    if target_hz == 0 {
        return u8::MAX;
    }
    let divider = pclk_hz / 2 / target_hz;
    if divider == 0 {
        return 0;
    }
    let prescaler = divider - 1;
    if prescaler > u8::MAX as u32 {
        u8::MAX
    } else {
        prescaler as u8
    }
}

/// Handle to one validated SPI channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiChannel {
    index: u8,
}

impl SpiChannel {
    /// Resolve a channel index. Returns `None` for an index outside the
    /// supported set, so register access through an invalid channel is not
    /// representable.
    #[must_use]
    pub const fn select(index: u8) -> Option<Self> {
        if index < CHANNEL_COUNT {
            Some(Self { index })
        } else {
            None
        }
    }

    /// Channel index.
    #[must_use]
    pub const fn index(&self) -> u8 {
        self.index
    }

    const fn register(&self, offset: u32) -> u32 {
        SPI_BASE + CHANNEL_STRIDE * self.index as u32 + offset
    }

    /// Physical address of SPTDAT, the destination for DMA streaming.
    #[must_use]
    pub const fn data_register_address(&self) -> u32 {
        self.register(offset::SPTDAT)
    }

    /// Physical address of SPSTA.
    #[must_use]
    pub const fn status_register_address(&self) -> u32 {
        self.register(offset::SPSTA)
    }

    /// Physical address of SPPRE.
    #[must_use]
    pub const fn prescaler_register_address(&self) -> u32 {
        self.register(offset::SPPRE)
    }

    /// Physical address of SPCON.
    #[must_use]
    pub const fn control_register_address(&self) -> u32 {
        self.register(offset::SPCON)
    }

    /// Write the control word.
    ///
    /// SPCON is cleared first: toggling mode bits in place can leave the
    /// shift register state machine in an inconsistent phase.
    pub fn configure<R: RegisterIo>(&self, io: &mut R, control: Spcon) {
        io.write(self.control_register_address(), 0);
        io.write(self.control_register_address(), control.bits());
    }

    /// Program SPPRE for `target_hz` given the peripheral clock, returning
    /// the value written. See [`prescaler_for`].
    pub fn set_clock_rate<R: RegisterIo>(&self, io: &mut R, pclk_hz: u32, target_hz: u32) -> u8 {
        let prescaler = prescaler_for(pclk_hz, target_hz);
        io.write(self.prescaler_register_address(), u32::from(prescaler));
        prescaler
    }

    /// Read back the programmed prescaler.
    pub fn prescaler<R: RegisterIo>(&self, io: &mut R) -> u8 {
        (io.read(self.prescaler_register_address()) & 0xFF) as u8
    }

    /// SCK rate produced by the programmed prescaler.
    pub fn clock_rate<R: RegisterIo>(&self, io: &mut R, pclk_hz: u32) -> u32 {
        pclk_hz / 2 / (u32::from(self.prescaler(io)) + 1)
    }

    fn wait_ready<R: RegisterIo>(&self, io: &mut R, bound: PollBound) -> Result<(), Timeout> {
        let status = self.status_register_address();
        poll_until(bound, || io.read(status) & STATUS_READY != 0)
    }

    /// Shift `byte` out and return the byte shifted in.
    ///
    /// Waits for `REDY` before writing SPTDAT and again before SPRDAT holds
    /// the received byte.
    ///
    /// # Errors
    /// [`Timeout`] if `bound` is finite and `REDY` never appeared.
    pub fn transfer_byte<R: RegisterIo>(
        &self,
        io: &mut R,
        byte: u8,
        bound: PollBound,
    ) -> Result<u8, Timeout> {
        self.wait_ready(io, bound)?;
        io.write(self.data_register_address(), u32::from(byte));
        self.wait_ready(io, bound)?;
        Ok((io.read(self.register(offset::SPRDAT)) & 0xFF) as u8)
    }

    /// Shift `byte` out, discarding whatever was shifted in.
    ///
    /// # Errors
    /// [`Timeout`] if `bound` is finite and `REDY` never appeared.
    pub fn write_only<R: RegisterIo>(
        &self,
        io: &mut R,
        byte: u8,
        bound: PollBound,
    ) -> Result<(), Timeout> {
        self.wait_ready(io, bound)?;
        io.write(self.data_register_address(), u32::from(byte));
        self.wait_ready(io, bound)
    }

    /// Route the channel's pins to the SPI function.
    ///
    /// Channel 0 uses GPE11 (MISO), GPE12 (MOSI) and GPE13 (CLK). Channel 1
    /// shares port G with the panel control lines on this board and is left
    /// alone.
    pub fn route_pins<R: RegisterIo>(&self, io: &mut R) {
        if self.index != 0 {
            return;
        }
        io.modify(GPECON, |con| {
            let con = with_pin_mode(con, 11, PinMode::Alternate);
            let con = with_pin_mode(con, 12, PinMode::Alternate);
            with_pin_mode(con, 13, PinMode::Alternate)
        });
    }
}
