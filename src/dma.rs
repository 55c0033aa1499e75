//! DMA channel driver.
//!
//! Four channels, each with this register block:
//!
//! | Offset | Register  | Use                                             |
//! |--------|-----------|-------------------------------------------------|
//! | `0x00` | DISRC     | Source start address                            |
//! | `0x04` | DISRCC    | Source bus and increment policy                 |
//! | `0x08` | DIDST     | Destination start address                       |
//! | `0x0C` | DIDSTC    | Destination bus and increment policy            |
//! | `0x10` | DCON      | Mode, request source, size and transfer count   |
//! | `0x14` | DSTAT     | Busy state and current transfer count           |
//! | `0x18` | DCSRC     | Current source address                          |
//! | `0x1C` | DCDST     | Current destination address                     |
//! | `0x20` | DMASKTRIG | Stop, on/off and software trigger               |
//!
//! There is deliberately no stop operation here. A channel configured without
//! auto reload turns itself off when its count reaches zero; one configured
//! with auto reload runs until the system is reset, which is what continuous
//! framebuffer streaming relies on.

use bitfield::bitfield;

use crate::regs::RegisterIo;
use crate::spi::SpiChannel;

/// DMA controller base address.
pub const DMA_BASE: u32 = 0x4B00_0000;
/// Number of DMA channels.
pub const CHANNEL_COUNT: u8 = 4;
/// Largest value the 20-bit DCON transfer count can hold.
pub const MAX_TRANSFER_COUNT: u32 = 0x000F_FFFF;

const CHANNEL_STRIDE: u32 = 0x40;

mod offset {
    pub const DISRC: u32 = 0x00;
    pub const DISRCC: u32 = 0x04;
    pub const DIDST: u32 = 0x08;
    pub const DIDSTC: u32 = 0x0C;
    pub const DCON: u32 = 0x10;
    pub const DSTAT: u32 = 0x14;
    pub const DMASKTRIG: u32 = 0x20;
}

bitfield! {
    /// Source or destination control word (DISRCCn / DIDSTCn).
    ///
    /// The bit layout is as follows:
    /// - Bit 1: LOC, the address is on the peripheral bus (APB) when set,
    ///   on the system bus (AHB, memory) when clear
    /// - Bit 0: INC, the address stays fixed when set, increments when clear
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct AddressControl(u32);
    impl Debug;
    pub peripheral, set_peripheral: 1;
    pub fixed, set_fixed: 0;
}

impl AddressControl {
    /// Memory address that advances after every unit.
    #[must_use]
    pub const fn memory_increment() -> Self {
        Self(0b00)
    }

    /// Memory address that is re-read for every unit.
    #[must_use]
    pub const fn memory_fixed() -> Self {
        Self(0b01)
    }

    /// Single peripheral register, such as a transmit data register.
    #[must_use]
    pub const fn peripheral_fixed() -> Self {
        Self(0b11)
    }

    /// Raw register value.
    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.0
    }
}

/// Unit size moved per transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DataSize {
    /// 8-bit units.
    Byte = 0b00,
    /// 16-bit units.
    HalfWord = 0b01,
    /// 32-bit units.
    Word = 0b10,
}

bitfield! {
    /// Channel control word (DCONn).
    ///
    /// The bit layout is as follows:
    /// - Bit 31: DMD_HS, handshake mode when set, demand mode when clear
    /// - Bit 30: SYNC, DREQ/DACK synchronised to HCLK when set
    /// - Bit 29: INT, interrupt on terminal count
    /// - Bit 28: TSZ, 4-unit burst when set, single unit when clear
    /// - Bit 27: SERVMODE, whole service when set, single service when clear
    /// - Bits 26-24: HWSRCSEL, hardware request source
    /// - Bit 23: SWHW_SEL, hardware request when set, software when clear
    /// - Bit 22: RELOAD, no auto reload when set
    /// - Bits 21-20: DSZ, unit size (see [`DataSize`])
    /// - Bits 19-0: TC, initial transfer count
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct Dcon(u32);
    impl Debug;
    pub handshake, set_handshake: 31;
    pub sync, set_sync: 30;
    pub interrupt, set_interrupt: 29;
    pub burst, set_burst: 28;
    pub whole_service, set_whole_service: 27;
    pub u8, request_source, set_request_source: 26, 24;
    pub hardware_request, set_hardware_request: 23;
    pub no_reload, set_no_reload: 22;
    pub u8, data_size, set_data_size: 21, 20;
    pub transfer_count, set_transfer_count: 19, 0;
}

impl Dcon {
    /// An all-zero control word: demand mode, software request, auto reload,
    /// byte units, zero count.
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Handshake-paced, hardware-requested, auto-reloading byte stream of
    /// `count` units from `request_source`.
    ///
    /// `count` is truncated to the 20-bit field; callers check it against
    /// [`MAX_TRANSFER_COUNT`] first.
    #[must_use]
    pub fn handshake_stream(request_source: u8, count: u32) -> Self {
        let mut dcon = Self::new();
        dcon.set_handshake(true);
        dcon.set_request_source(request_source);
        dcon.set_hardware_request(true);
        dcon.set_no_reload(false);
        dcon.set_data_size(DataSize::Byte as u8);
        dcon.set_transfer_count(count & MAX_TRANSFER_COUNT);
        dcon
    }

    /// One-shot software-triggered transfer of `count` units.
    #[must_use]
    pub fn software_oneshot(size: DataSize, count: u32) -> Self {
        let mut dcon = Self::new();
        dcon.set_whole_service(true);
        dcon.set_no_reload(true);
        dcon.set_data_size(size as u8);
        dcon.set_transfer_count(count & MAX_TRANSFER_COUNT);
        dcon
    }

    /// Raw register value.
    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.0
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Dcon {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Dcon({=u32:#x})", self.0);
    }
}

bitfield! {
    /// Mask/trigger word (DMASKTRIGn).
    ///
    /// - Bit 2: STOP, stop after the current atomic transfer
    /// - Bit 1: ON_OFF, channel on
    /// - Bit 0: SW_TRIG, request a transfer in software request mode
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct MaskTrigger(u32);
    impl Debug;
    pub stop, set_stop: 2;
    pub on, set_on: 1;
    pub software_trigger, set_software_trigger: 0;
}

bitfield! {
    /// Channel status word (DSTATn), read only.
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    struct Dstat(u32);
    impl Debug;
    pub u8, state, _: 21, 20;
    pub current_count, _: 19, 0;
}

/// Snapshot of a channel's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransferStatus {
    /// The controller is servicing a request on this channel.
    pub busy: bool,
    /// Units left in the current pass.
    pub remaining: u32,
}

/// Handle to one validated DMA channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmaChannel {
    index: u8,
}

impl DmaChannel {
    /// Resolve a channel index. Returns `None` outside `0..4`.
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

    /// Physical address of one of this channel's registers.
    const fn register(&self, offset: u32) -> u32 {
        DMA_BASE + CHANNEL_STRIDE * self.index as u32 + offset
    }

    /// Hardware request selector that connects `spi`'s transmit request to
    /// this channel, if the request matrix has such a route.
    ///
    /// Channel 1 can be paced by SPI0 (`0b011`) and channel 3 by SPI1
    /// (`0b010`); no other pairing exists.
    #[must_use]
    pub const fn spi_request_source(&self, spi: SpiChannel) -> Option<u8> {
        match (self.index, spi.index()) {
            (1, 0) => Some(0b011),
            (3, 1) => Some(0b010),
            _ => None,
        }
    }

    /// Program the source address and its control word.
    pub fn set_source<R: RegisterIo>(&self, io: &mut R, address: u32, control: AddressControl) {
        io.write(self.register(offset::DISRC), address);
        io.write(self.register(offset::DISRCC), control.bits());
    }

    /// Program the destination address and its control word.
    pub fn set_destination<R: RegisterIo>(
        &self,
        io: &mut R,
        address: u32,
        control: AddressControl,
    ) {
        io.write(self.register(offset::DIDST), address);
        io.write(self.register(offset::DIDSTC), control.bits());
    }

    /// Program the channel control word.
    pub fn set_control<R: RegisterIo>(&self, io: &mut R, control: Dcon) {
        io.write(self.register(offset::DCON), control.bits());
    }

    /// Read back the channel control word.
    pub fn control<R: RegisterIo>(&self, io: &mut R) -> Dcon {
        Dcon(io.read(self.register(offset::DCON)))
    }

    /// Turn the channel on.
    ///
    /// In software request mode this also raises the one-shot software
    /// request; in hardware request mode the channel only arms and the
    /// selected peripheral paces every unit from then on. Returns the word
    /// written to DMASKTRIG.
    pub fn trigger<R: RegisterIo>(&self, io: &mut R) -> MaskTrigger {
        let software = !self.control(io).hardware_request();
        let mut trigger = MaskTrigger::default();
        trigger.set_on(true);
        trigger.set_software_trigger(software);
        io.write(self.register(offset::DMASKTRIG), trigger.0);
        trigger
    }

    /// Read the channel status.
    pub fn status<R: RegisterIo>(&self, io: &mut R) -> TransferStatus {
        let dstat = Dstat(io.read(self.register(offset::DSTAT)));
        TransferStatus {
            busy: dstat.state() != 0,
            remaining: dstat.current_count(),
        }
    }
}
