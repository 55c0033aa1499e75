//! Host-side test doubles for the register boundary and the delay provider.

extern crate std;

use core::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;

use crate::regs::RegisterIo;
use crate::spi::SpiChannel;

/// One observable interaction with the fake hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
    Read { addr: u32, value: u32 },
    Write { addr: u32, value: u32 },
    Delay { ms: u32 },
}

/// A register file that remembers every access.
///
/// Reads return the last written value unless a scripted sequence is queued
/// for the address, in which case the queue is drained first. The SPI status
/// registers start out ready, as they do after reset.
pub(crate) struct FakeRegisters {
    values: BTreeMap<u32, u32>,
    scripted: BTreeMap<u32, VecDeque<u32>>,
    log: Rc<RefCell<Vec<Event>>>,
}

impl FakeRegisters {
    pub(crate) fn new() -> Self {
        let mut fake = Self {
            values: BTreeMap::new(),
            scripted: BTreeMap::new(),
            log: Rc::new(RefCell::new(Vec::new())),
        };
        for index in 0..crate::spi::CHANNEL_COUNT {
            if let Some(channel) = SpiChannel::select(index) {
                fake.set(channel.status_register_address(), 0x01);
            }
        }
        fake
    }

    /// Set a register value without logging an access.
    pub(crate) fn set(&mut self, addr: u32, value: u32) {
        self.values.insert(addr, value);
    }

    /// Queue values that successive reads of `addr` return before falling
    /// back to the stored value.
    pub(crate) fn script(&mut self, addr: u32, values: &[u32]) {
        self.scripted
            .entry(addr)
            .or_default()
            .extend(values.iter().copied());
    }

    pub(crate) fn value(&self, addr: u32) -> u32 {
        self.values.get(&addr).copied().unwrap_or(0)
    }

    /// A delay provider that records into the same event log.
    pub(crate) fn delay(&self) -> RecordingDelay {
        RecordingDelay {
            log: Rc::clone(&self.log),
        }
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.log.borrow().clone()
    }

    pub(crate) fn writes(&self) -> Vec<(u32, u32)> {
        self.log
            .borrow()
            .iter()
            .filter_map(|event| match *event {
                Event::Write { addr, value } => Some((addr, value)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn writes_to(&self, addr: u32) -> Vec<u32> {
        self.writes()
            .into_iter()
            .filter(|(a, _)| *a == addr)
            .map(|(_, v)| v)
            .collect()
    }

    pub(crate) fn reads_of(&self, addr: u32) -> usize {
        self.log
            .borrow()
            .iter()
            .filter(|event| matches!(event, Event::Read { addr: a, .. } if *a == addr))
            .count()
    }

    pub(crate) fn delays(&self) -> Vec<u32> {
        self.log
            .borrow()
            .iter()
            .filter_map(|event| match *event {
                Event::Delay { ms } => Some(ms),
                _ => None,
            })
            .collect()
    }
}

impl RegisterIo for FakeRegisters {
    fn read(&mut self, addr: u32) -> u32 {
        let value = match self.scripted.get_mut(&addr).and_then(VecDeque::pop_front) {
            Some(value) => value,
            None => self.value(addr),
        };
        self.log.borrow_mut().push(Event::Read { addr, value });
        value
    }

    fn write(&mut self, addr: u32, value: u32) {
        self.values.insert(addr, value);
        self.log.borrow_mut().push(Event::Write { addr, value });
    }
}

/// Delay provider that logs requested milliseconds instead of sleeping.
pub(crate) struct RecordingDelay {
    log: Rc<RefCell<Vec<Event>>>,
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.log.borrow_mut().push(Event::Delay {
            ms: ns / 1_000_000,
        });
    }

    fn delay_ms(&mut self, ms: u32) {
        self.log.borrow_mut().push(Event::Delay { ms });
    }
}
