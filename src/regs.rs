//! Register access boundary and the hardware context that owns it.
//!
//! Every driver in this crate talks to the SoC through [`RegisterIo`]. On the
//! target the [`Mmio`] implementation performs volatile 32-bit accesses to
//! physical addresses; host tests substitute a recording register file.
//!
//! The [`HardwareContext`] is built once at startup and handed to the display
//! orchestrator. It owns the register I/O, the millisecond delay and the
//! peripheral clock frequency, and resolves channel indices into driver
//! handles. Nothing in the crate keeps hidden global state.

use embedded_hal::delay::DelayNs;

use crate::dma::DmaChannel;
use crate::spi::SpiChannel;

/// Width-typed access to memory-mapped peripheral registers.
///
/// All registers touched by this crate are accessed as 32-bit words, even the
/// ones whose meaningful field is narrower (the SPI prescaler and data
/// registers, for example).
pub trait RegisterIo {
    /// Read the 32-bit register at `addr`.
    fn read(&mut self, addr: u32) -> u32;

    /// Write `value` to the 32-bit register at `addr`.
    fn write(&mut self, addr: u32, value: u32);

    /// Read-modify-write the register at `addr`.
    fn modify<F>(&mut self, addr: u32, f: F)
    where
        F: FnOnce(u32) -> u32,
    {
        let value = self.read(addr);
        self.write(addr, f(value));
    }
}

impl<T: RegisterIo> RegisterIo for &mut T {
    fn read(&mut self, addr: u32) -> u32 {
        T::read(self, addr)
    }

    fn write(&mut self, addr: u32, value: u32) {
        T::write(self, addr, value);
    }
}

/// Volatile register access to the physical address space.
#[derive(Debug)]
pub struct Mmio {
    _private: (),
}

impl Mmio {
    /// Create the memory-mapped register accessor.
    ///
    /// # Safety
    /// The caller must guarantee that every address handed to this accessor
    /// is a mapped, 4-byte aligned device register, and that no other code
    /// writes the SPI, DMA and GPIO port E/G registers concurrently.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl RegisterIo for Mmio {
    #[inline]
    fn read(&mut self, addr: u32) -> u32 {
        // SAFETY: guaranteed by the contract of `Mmio::new`.
        unsafe { core::ptr::read_volatile(addr as usize as *const u32) }
    }

    #[inline]
    fn write(&mut self, addr: u32, value: u32) {
        // SAFETY: guaranteed by the contract of `Mmio::new`.
        unsafe { core::ptr::write_volatile(addr as usize as *mut u32, value) }
    }
}

/// Process-wide hardware handle: register I/O, delay and clock information.
///
/// Constructed once at startup and passed explicitly to the components that
/// need it.
pub struct HardwareContext<R, D> {
    io: R,
    delay: D,
    pclk_hz: u32,
}

impl<R, D> HardwareContext<R, D>
where
    R: RegisterIo,
    D: DelayNs,
{
    /// Bundle the register accessor, the delay provider and the APB
    /// peripheral clock (PCLK) frequency in hertz.
    pub fn new(io: R, delay: D, pclk_hz: u32) -> Self {
        Self { io, delay, pclk_hz }
    }

    /// Peripheral clock frequency in hertz.
    #[must_use]
    pub fn pclk_hz(&self) -> u32 {
        self.pclk_hz
    }

    /// Mutable access to the register I/O.
    pub fn io(&mut self) -> &mut R {
        &mut self.io
    }

    /// Busy-wait for at least `ms` milliseconds.
    pub fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    /// Resolve an SPI channel index, see [`SpiChannel::select`].
    #[must_use]
    pub fn spi_channel(&self, index: u8) -> Option<SpiChannel> {
        SpiChannel::select(index)
    }

    /// Resolve a DMA channel index, see [`DmaChannel::select`].
    #[must_use]
    pub fn dma_channel(&self, index: u8) -> Option<DmaChannel> {
        DmaChannel::select(index)
    }

    /// Give back the register I/O and the delay provider.
    pub fn into_parts(self) -> (R, D) {
        (self.io, self.delay)
    }
}

impl<R, D> core::fmt::Debug for HardwareContext<R, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HardwareContext")
            .field("pclk_hz", &self.pclk_hz)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::testing::{Event, FakeRegisters};

    #[test]
    fn test_modify_reads_then_writes() {
        let mut io = FakeRegisters::new();
        io.set(0x1000, 0b1010);

        io.modify(0x1000, |v| v | 0b0101);

        assert_eq!(io.value(0x1000), 0b1111);
        let events = io.events();
        assert_eq!(
            events[events.len() - 2..],
            [
                Event::Read {
                    addr: 0x1000,
                    value: 0b1010
                },
                Event::Write {
                    addr: 0x1000,
                    value: 0b1111
                },
            ]
        );
    }

    #[test]
    fn test_mut_ref_forwards() {
        fn poke<R: RegisterIo>(mut io: R) -> u32 {
            io.write(0x2000, 7);
            io.read(0x2000)
        }

        let mut io = FakeRegisters::new();
        assert_eq!(poke(&mut io), 7);
        assert_eq!(io.value(0x2000), 7);
    }

    #[test]
    fn test_context_resolves_channels() {
        let io = FakeRegisters::new();
        let delay = io.delay();
        let hw = HardwareContext::new(io, delay, 50_000_000);

        assert_eq!(hw.pclk_hz(), 50_000_000);
        assert!(hw.spi_channel(0).is_some());
        assert!(hw.spi_channel(1).is_some());
        assert!(hw.spi_channel(2).is_none());
        assert!(hw.dma_channel(3).is_some());
        assert!(hw.dma_channel(4).is_none());
    }

    #[test]
    fn test_context_delay_is_forwarded() {
        let io = FakeRegisters::new();
        let delay = io.delay();
        let mut hw = HardwareContext::new(io, delay, 50_000_000);

        hw.delay_ms(100);

        let (io, _delay) = hw.into_parts();
        assert_eq!(io.delays(), std::vec![100]);
    }
}
