//! ST7789 bring-up and hand-off to a free-running DMA stream.
//!
//! [`St7789::init`] runs the whole power-on sequence once:
//!
//! 1. GPIO: reset and D/C lines to output, SPI pins to their bus function
//! 2. SPI: control word, then the prescaler for the requested baud rate
//! 3. Reset pulse on the panel
//! 4. Init table playback (D/C low for commands, high for parameters). The
//!    table ends with the full-screen window and `RAMWR`
//! 5. D/C left high: every byte from here on is pixel data
//! 6. DMA: framebuffer → SPTDAT, paced by the SPI handshake, auto reload
//! 7. Trigger
//!
//! After the trigger the SPI channel's request line owns the transfer
//! channel and the panel is refreshed from the framebuffer forever. Nothing
//! in this module stops the stream.
//!
//! # Example
//! ```rust
//! # use st7789_dma::regs::RegisterIo;
//! # struct Regs;
//! # impl RegisterIo for Regs {
//! #     fn read(&mut self, addr: u32) -> u32 { if addr & 0xF == 0x4 { 1 } else { 0 } }
//! #     fn write(&mut self, _addr: u32, _value: u32) {}
//! # }
//! # struct Delay;
//! # impl embedded_hal::delay::DelayNs for Delay { fn delay_ns(&mut self, _ns: u32) {} }
//! use st7789_dma::display::{DisplayConfig, SessionState, St7789};
//! use st7789_dma::regs::HardwareContext;
//!
//! let hw = HardwareContext::new(Regs, Delay, 50_000_000);
//! let mut display = St7789::new(hw, DisplayConfig::default()).unwrap();
//!
//! let session = display.init(0x3000_0000).unwrap();
//! assert_eq!(session.units(), 240 * 240 * 2);
//! assert_eq!(session.state(), SessionState::HandedOff);
//! ```

use embedded_dma::ReadBuffer;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_hal::delay::DelayNs;

use crate::command::{self, Geometry};
use crate::dma::{AddressControl, Dcon, DmaChannel, TransferStatus, MAX_TRANSFER_COUNT};
use crate::framebuffer::color_to_bytes;
use crate::gpio::ControlLines;
use crate::poll::{PollBound, Timeout};
use crate::regs::{HardwareContext, RegisterIo};
use crate::sequencer::{play_into, CommandSink, CommandTable, TableError};
use crate::spi::{SpiChannel, Spcon, TransferMode};

/// How the DMA source address moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SourceLayout {
    /// A whole frame in memory: the source address increments per unit.
    #[default]
    Linear,
    /// A single FIFO-like location: the source address stays fixed.
    Circular,
}

impl SourceLayout {
    const fn address_control(self) -> AddressControl {
        match self {
            Self::Linear => AddressControl::memory_increment(),
            Self::Circular => AddressControl::memory_fixed(),
        }
    }
}

/// Bring-up parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DisplayConfig {
    /// SPI channel wired to the panel.
    pub spi_channel: u8,
    /// DMA channel that streams the framebuffer.
    pub dma_channel: u8,
    /// Requested SCK rate in hertz.
    pub baud_hz: u32,
    /// SPI control word.
    pub bus_mode: Spcon,
    /// How long the reset line is held low.
    pub reset_low_ms: u32,
    /// How long to wait after releasing reset before the first command.
    pub reset_recovery_ms: u32,
    /// Bound on every SPI ready poll.
    pub poll_bound: PollBound,
    /// How the DMA source address moves.
    pub source_layout: SourceLayout,
    /// Panel resolution and pixel depth.
    pub geometry: Geometry,
    /// Command table played after reset.
    pub init_table: &'static [u8],
    /// Reset and D/C wiring.
    pub lines: ControlLines,
}

impl DisplayConfig {
    /// The board defaults: SPI0 at 25 MHz in DMA mode with CPOL = CPHA = 1,
    /// DMA1, 100 ms reset timings, unbounded polling and the 240×240 table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            spi_channel: 0,
            dma_channel: 1,
            baud_hz: 25_000_000,
            bus_mode: Spcon::master(TransferMode::Dma, true, true),
            reset_low_ms: 100,
            reset_recovery_ms: 100,
            poll_bound: PollBound::Unbounded,
            source_layout: SourceLayout::Linear,
            geometry: Geometry::ST7789_240X240,
            init_table: command::INIT_TABLE,
            lines: ControlLines::BOARD,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle of the framebuffer stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionState {
    /// Channel registers programmed, not yet triggered.
    Configured,
    /// Triggered; the SPI request line paces the channel from now on.
    HandedOff,
}

/// The programmed framebuffer stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransferSession {
    channel: DmaChannel,
    source: u32,
    destination: u32,
    units: u32,
    state: SessionState,
}

impl TransferSession {
    /// DMA channel carrying the stream.
    #[must_use]
    pub const fn channel(&self) -> DmaChannel {
        self.channel
    }

    /// Framebuffer base address.
    #[must_use]
    pub const fn source(&self) -> u32 {
        self.source
    }

    /// SPI transmit data register address.
    #[must_use]
    pub const fn destination(&self) -> u32 {
        self.destination
    }

    /// Bytes per pass.
    #[must_use]
    pub const fn units(&self) -> u32 {
        self.units
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }
}

/// Everything that can go wrong bringing the panel up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// No SPI channel with this index.
    InvalidSpiChannel(u8),
    /// No DMA channel with this index.
    InvalidDmaChannel(u8),
    /// The DMA channel cannot be paced by the SPI channel.
    NoHandshakeRoute {
        /// SPI channel index.
        spi: u8,
        /// DMA channel index.
        dma: u8,
    },
    /// A frame needs more units than the 20-bit transfer count holds.
    TransferTooLarge(u64),
    /// The geometry has no pixels, so there is nothing to stream.
    EmptyFrame,
    /// The supplied buffer is shorter than one frame.
    BufferTooSmall {
        /// Bytes in one frame.
        needed: usize,
        /// Bytes the buffer provides.
        available: usize,
    },
    /// The stream was already started.
    AlreadyStreaming,
    /// The table's `CASET` or `RASET` record does not cover the geometry.
    WindowMismatch {
        /// The offending command byte.
        command: u8,
    },
    /// The init table is malformed.
    Table(TableError),
    /// The SPI channel never became ready.
    Timeout,
}

impl From<TableError> for Error {
    fn from(err: TableError) -> Self {
        Self::Table(err)
    }
}

impl From<Timeout> for Error {
    fn from(_: Timeout) -> Self {
        Self::Timeout
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidSpiChannel(index) => write!(f, "no SPI channel {index}"),
            Self::InvalidDmaChannel(index) => write!(f, "no DMA channel {index}"),
            Self::NoHandshakeRoute { spi, dma } => {
                write!(f, "DMA channel {dma} cannot be paced by SPI channel {spi}")
            }
            Self::TransferTooLarge(units) => write!(
                f,
                "frame of {units} bytes exceeds the transfer count limit of {MAX_TRANSFER_COUNT}"
            ),
            Self::BufferTooSmall { needed, available } => write!(
                f,
                "buffer holds {available} bytes but a frame needs {needed}"
            ),
            Self::EmptyFrame => f.write_str("panel geometry has no pixels"),
            Self::AlreadyStreaming => f.write_str("framebuffer stream already started"),
            Self::WindowMismatch { command } => write!(
                f,
                "command {command:#04x} in the init table does not match the panel geometry"
            ),
            Self::Table(err) => write!(f, "invalid init table: {err}"),
            Self::Timeout => core::fmt::Display::fmt(&Timeout, f),
        }
    }
}

impl core::error::Error for Error {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Table(err) => Some(err),
            _ => None,
        }
    }
}

/// Sends commands and parameters over the SPI channel, driving D/C.
struct PanelWriter<'a, R> {
    io: &'a mut R,
    spi: SpiChannel,
    lines: ControlLines,
    bound: PollBound,
}

impl<R: RegisterIo> CommandSink for PanelWriter<'_, R> {
    type Error = Timeout;

    fn write_command(&mut self, opcode: u8) -> Result<(), Timeout> {
        trace!("command {=u8:#x}", opcode);
        self.lines.select_command(self.io);
        self.spi.write_only(self.io, opcode, self.bound)
    }

    fn write_parameter(&mut self, param: u8) -> Result<(), Timeout> {
        self.lines.select_data(self.io);
        self.spi.write_only(self.io, param, self.bound)
    }
}

/// ST7789 panel on an SPI channel, refreshed by a DMA channel.
pub struct St7789<R, D> {
    hw: HardwareContext<R, D>,
    config: DisplayConfig,
    spi: SpiChannel,
    dma: DmaChannel,
    request_source: u8,
    table: CommandTable<'static>,
    units: u32,
    session: Option<TransferSession>,
}

impl<R, D> St7789<R, D>
where
    R: RegisterIo,
    D: DelayNs,
{
    /// Validate `config` against the hardware. No register is touched.
    ///
    /// # Errors
    /// - [`Error::InvalidSpiChannel`] / [`Error::InvalidDmaChannel`] for an
    ///   index with no channel behind it
    /// - [`Error::NoHandshakeRoute`] if the DMA channel cannot be paced by the
    ///   SPI channel
    /// - [`Error::TransferTooLarge`] if a frame does not fit the transfer
    ///   count
    /// - [`Error::EmptyFrame`] if the geometry has no pixels
    /// - [`Error::Table`] for a malformed init table
    /// - [`Error::WindowMismatch`] if the table addresses a different window
    pub fn new(hw: HardwareContext<R, D>, config: DisplayConfig) -> Result<Self, Error> {
        let spi = hw
            .spi_channel(config.spi_channel)
            .ok_or(Error::InvalidSpiChannel(config.spi_channel))?;
        let dma = hw
            .dma_channel(config.dma_channel)
            .ok_or(Error::InvalidDmaChannel(config.dma_channel))?;
        let request_source = dma
            .spi_request_source(spi)
            .ok_or(Error::NoHandshakeRoute {
                spi: spi.index(),
                dma: dma.index(),
            })?;
        let frame_bytes = config.geometry.frame_bytes();
        let units = u32::try_from(frame_bytes)
            .ok()
            .filter(|&units| units <= MAX_TRANSFER_COUNT)
            .ok_or(Error::TransferTooLarge(frame_bytes))?;
        if units == 0 {
            return Err(Error::EmptyFrame);
        }
        let table = CommandTable::new(config.init_table)?;
        if let Some(command) = command::window_mismatch(&table, &config.geometry) {
            return Err(Error::WindowMismatch { command });
        }

        Ok(Self {
            hw,
            config,
            spi,
            dma,
            request_source,
            table,
            units,
            session: None,
        })
    }

    /// Bring the panel up and start streaming from `framebuffer_base`.
    ///
    /// `framebuffer_base` is the physical address of at least
    /// `geometry.frame_bytes()` bytes in transfer order (see
    /// [`FrameBuffer`](crate::framebuffer::FrameBuffer)). The memory must stay
    /// valid for as long as the system runs.
    ///
    /// # Errors
    /// - [`Error::AlreadyStreaming`] on a second call
    /// - [`Error::Timeout`] if a bounded SPI poll gave up during playback;
    ///   the DMA channel is left untouched in that case
    pub fn init(&mut self, framebuffer_base: u32) -> Result<&TransferSession, Error> {
        if self.session.is_some() {
            return Err(Error::AlreadyStreaming);
        }
        let DisplayConfig {
            baud_hz,
            bus_mode,
            reset_low_ms,
            reset_recovery_ms,
            poll_bound,
            source_layout,
            lines,
            ..
        } = self.config;
        let (spi, dma) = (self.spi, self.dma);
        let pclk_hz = self.hw.pclk_hz();

        debug!("configuring control lines and SPI{=u8} pins", spi.index());
        lines.configure(self.hw.io());
        spi.route_pins(self.hw.io());

        spi.configure(self.hw.io(), bus_mode);
        let prescaler = spi.set_clock_rate(self.hw.io(), pclk_hz, baud_hz);
        debug!(
            "SPI{=u8}: control {}, prescaler {=u8}",
            spi.index(),
            bus_mode,
            prescaler
        );

        debug!("panel reset");
        lines.assert_reset(self.hw.io());
        self.hw.delay_ms(reset_low_ms);
        lines.release_reset(self.hw.io());
        self.hw.delay_ms(reset_recovery_ms);

        let table = self.table;
        let consumed = play_into(
            &table,
            PanelWriter {
                io: self.hw.io(),
                spi,
                lines,
                bound: poll_bound,
            },
        )
        .inspect_err(|_| warn!("SPI{=u8} stopped responding, DMA left idle", spi.index()))?;
        debug!("init table played, {=usize} bytes", consumed);

        lines.select_data(self.hw.io());

        let destination = spi.data_register_address();
        let io = self.hw.io();
        dma.set_source(io, framebuffer_base, source_layout.address_control());
        dma.set_destination(io, destination, AddressControl::peripheral_fixed());
        dma.set_control(io, Dcon::handshake_stream(self.request_source, self.units));
        let mut session = TransferSession {
            channel: dma,
            source: framebuffer_base,
            destination,
            units: self.units,
            state: SessionState::Configured,
        };
        debug!("DMA{=u8} configured: {}", dma.index(), session);

        dma.trigger(io);
        session.state = SessionState::HandedOff;
        info!(
            "streaming {=u32} bytes from {=u32:#x} to SPI{=u8}",
            session.units,
            session.source,
            spi.index()
        );

        Ok(self.session.insert(session))
    }

    /// [`init`](Self::init) with the address of a DMA-safe buffer.
    ///
    /// The buffer is never given back: the stream reads from it for the rest
    /// of the program.
    ///
    /// # Errors
    /// [`Error::BufferTooSmall`] if `buffer` is shorter than one frame, then
    /// anything [`init`](Self::init) returns.
    pub fn init_with_buffer<B>(&mut self, buffer: B) -> Result<&TransferSession, Error>
    where
        B: ReadBuffer<Word = u8> + 'static,
    {
        // SAFETY: `buffer` is forgotten below once the stream is running, so
        // the memory it describes is never released or handed out again.
        let (ptr, available) = unsafe { buffer.read_buffer() };
        let needed = self.units as usize;
        if available < needed {
            return Err(Error::BufferTooSmall { needed, available });
        }
        let session = self.init(ptr as usize as u32)?;
        core::mem::forget(buffer);
        Ok(session)
    }

    /// Send one command byte with D/C low.
    ///
    /// Only before [`init`](Self::init): once the stream runs, D/C must stay
    /// high or the panel takes streamed pixels as commands.
    ///
    /// # Errors
    /// - [`Error::AlreadyStreaming`] after a successful [`init`](Self::init)
    /// - [`Error::Timeout`] if the bounded SPI poll gave up
    pub fn write_command(&mut self, opcode: u8) -> Result<(), Error> {
        if self.session.is_some() {
            return Err(Error::AlreadyStreaming);
        }
        Ok(self.writer().write_command(opcode)?)
    }

    /// Send one data byte with D/C high.
    ///
    /// Once the stream is running this competes with the DMA channel for the
    /// transmit register.
    ///
    /// # Errors
    /// [`Error::Timeout`] if the bounded SPI poll gave up.
    pub fn write_data(&mut self, byte: u8) -> Result<(), Error> {
        Ok(self.writer().write_parameter(byte)?)
    }

    /// Send one pixel, high byte first.
    ///
    /// # Errors
    /// [`Error::Timeout`] if the bounded SPI poll gave up.
    pub fn write_color(&mut self, color: Rgb565) -> Result<(), Error> {
        let mut writer = self.writer();
        for byte in color_to_bytes(color) {
            writer.write_parameter(byte)?;
        }
        Ok(())
    }

    fn writer(&mut self) -> PanelWriter<'_, R> {
        PanelWriter {
            io: self.hw.io(),
            spi: self.spi,
            lines: self.config.lines,
            bound: self.config.poll_bound,
        }
    }

    /// The stream, once [`init`](Self::init) has succeeded.
    #[must_use]
    pub fn session(&self) -> Option<&TransferSession> {
        self.session.as_ref()
    }

    /// Progress of the running stream, `None` before [`init`](Self::init).
    pub fn transfer_status(&mut self) -> Option<TransferStatus> {
        let channel = self.session?.channel;
        Some(channel.status(self.hw.io()))
    }

    /// Bring-up parameters.
    #[must_use]
    pub fn config(&self) -> &DisplayConfig {
        &self.config
    }

    /// Give back the hardware context. A running stream keeps running.
    pub fn release(self) -> HardwareContext<R, D> {
        self.hw
    }
}

impl<R, D> core::fmt::Debug for St7789<R, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("St7789")
            .field("spi", &self.spi)
            .field("dma", &self.dma)
            .field("units", &self.units)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
