// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Simulated controller, interrupt controller, wait queue and DMA channels
//! for unit tests.
//!
//! Everything is leaked to `'static` so the interrupt "hardware" can call
//! back into the driver while the driver is blocked inside the wait queue.

#![allow(dead_code)]

use core::cell::{Cell, RefCell};
use core::ptr::NonNull;
use core::time::Duration;

use std::boxed::Box;
use std::collections::VecDeque;
use std::vec::Vec;

use crate::platform::{
    Clock, DmaChannel, DmaClient, DmaDescriptor, DmaDirection, InterruptControl, IrqLine,
    IrqLines, SgEntry, WaitQueue,
};
use crate::registers::{
    RegisterWindow, CONTROL, DATA_OFFSET, PIN_CONTROL, SPBFCR, SPCR, SPPCR, SPSR, STATUS,
};
use crate::rspi::Rspi;
use crate::variant::Variant;

const REGISTER_SPACE: usize = 0x40;

/// Simulated clock rate, in Hz.
pub(crate) const CLOCK_HZ: u32 = 48_000_000;

/// Number of interrupt/DMA steps a wait runs before it gives up.
const WAIT_STEPS: usize = 32;

/// An access to the data register.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Access {
    Read8,
    Read16,
    Write8(u8),
    Write16(u16),
}

/// Register file plus a shift register model.
///
/// Each data write keeps the transmitter busy for `tx_latency` steps and,
/// unless Legacy transmit-only mode is selected, queues one received unit:
/// the written value in loopback mode, the peer's byte otherwise. Received
/// units become visible once the transmitter is idle again.
pub(crate) struct SimHardware {
    variant: Variant,
    regs: RefCell<[u8; REGISTER_SPACE]>,
    rx: RefCell<VecDeque<u16>>,
    error_flags: Cell<u8>,
    tx_busy: Cell<u32>,
    tx_latency: Cell<u32>,
    tx_stalled: Cell<bool>,
    rx_stalled: Cell<bool>,
    peer: Cell<u8>,
    accesses: RefCell<Vec<Access>>,
    writes: RefCell<Vec<(usize, u32)>>,
    dma_written: RefCell<Vec<u8>>,
}

impl SimHardware {
    pub(crate) fn new(variant: Variant) -> SimHardware {
        SimHardware {
            variant,
            regs: RefCell::new([0; REGISTER_SPACE]),
            rx: RefCell::new(VecDeque::new()),
            error_flags: Cell::new(0),
            tx_busy: Cell::new(0),
            tx_latency: Cell::new(0),
            tx_stalled: Cell::new(false),
            rx_stalled: Cell::new(false),
            peer: Cell::new(0xff),
            accesses: RefCell::new(Vec::new()),
            writes: RefCell::new(Vec::new()),
            dma_written: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn reg8(&self, offset: usize) -> u8 {
        self.regs.borrow()[offset]
    }

    pub(crate) fn reg16(&self, offset: usize) -> u16 {
        let regs = self.regs.borrow();
        u16::from_le_bytes([regs[offset], regs[offset + 1]])
    }

    pub(crate) fn reg32(&self, offset: usize) -> u32 {
        let regs = self.regs.borrow();
        u32::from_le_bytes([
            regs[offset],
            regs[offset + 1],
            regs[offset + 2],
            regs[offset + 3],
        ])
    }

    /// Every value written to the register at `offset`, oldest first.
    pub(crate) fn writes_to(&self, offset: usize) -> Vec<u32> {
        self.writes
            .borrow()
            .iter()
            .filter(|(o, _)| *o == offset)
            .map(|(_, v)| *v)
            .collect()
    }

    /// Every non-data register write, oldest first.
    pub(crate) fn writes(&self) -> Vec<(usize, u32)> {
        self.writes.borrow().clone()
    }

    pub(crate) fn data_accesses(&self) -> Vec<Access> {
        self.accesses.borrow().clone()
    }

    pub(crate) fn dma_written(&self) -> Vec<u8> {
        self.dma_written.borrow().clone()
    }

    pub(crate) fn clear_log(&self) {
        self.writes.borrow_mut().clear();
        self.accesses.borrow_mut().clear();
    }

    pub(crate) fn set_tx_latency(&self, steps: u32) {
        self.tx_latency.set(steps);
    }

    pub(crate) fn stall_tx(&self, stalled: bool) {
        self.tx_stalled.set(stalled);
    }

    pub(crate) fn stall_rx(&self, stalled: bool) {
        self.rx_stalled.set(stalled);
    }

    /// Byte the remote device shifts in when not in loopback.
    pub(crate) fn set_peer(&self, byte: u8) {
        self.peer.set(byte);
    }

    /// Queue a received unit as if it had arrived earlier.
    pub(crate) fn push_rx(&self, byte: u8) {
        self.rx.borrow_mut().push_back(u16::from(byte));
    }

    pub(crate) fn raise_overrun(&self) {
        self.error_flags
            .set(self.error_flags.get() | SPSR::OVRF::SET.value);
    }

    pub(crate) fn rx_pending(&self) -> bool {
        !self.rx_stalled.get() && self.tx_busy.get() == 0 && !self.rx.borrow().is_empty()
    }

    fn tx_empty(&self) -> bool {
        !self.tx_stalled.get() && self.tx_busy.get() == 0
    }

    fn status(&self) -> u8 {
        let mut spsr = self.error_flags.get();
        if self.tx_empty() {
            spsr |= SPSR::SPTEF::SET.value | SPSR::TEND::SET.value;
        }
        if self.rx_pending() {
            spsr |= SPSR::SPRF::SET.value;
        }
        spsr
    }

    fn control(&self) -> u8 {
        self.reg8(CONTROL.offset())
    }

    /// Receive and transmit interrupt requests currently asserted.
    pub(crate) fn pending(&self) -> (bool, bool) {
        let spcr = self.control();
        (
            spcr & SPCR::SPRIE::SET.value != 0 && self.rx_pending(),
            spcr & SPCR::SPTIE::SET.value != 0 && self.tx_empty(),
        )
    }

    pub(crate) fn tick(&self) {
        let busy = self.tx_busy.get();
        if busy > 0 && !self.tx_stalled.get() {
            self.tx_busy.set(busy - 1);
        }
    }

    fn shift(&self, value: u16) {
        self.tx_busy.set(self.tx_latency.get());
        let tx_only = self.variant == Variant::Legacy
            && self.control() & SPCR::TXMD::SET.value != 0;
        if tx_only {
            return;
        }
        let loopback = self.reg8(PIN_CONTROL.offset()) & SPPCR::SPLP::SET.value != 0;
        let received = if loopback {
            value
        } else {
            u16::from(self.peer.get())
        };
        self.rx.borrow_mut().push_back(received);
    }

    fn data_write(&self, access: Access, value: u16) {
        self.accesses.borrow_mut().push(access);
        self.shift(value);
    }

    fn data_read(&self, access: Access) -> u16 {
        self.accesses.borrow_mut().push(access);
        self.rx.borrow_mut().pop_front().unwrap_or(0)
    }

    /// A unit written by the transmit DMA request.
    pub(crate) fn dma_write(&self, byte: u8) {
        self.dma_written.borrow_mut().push(byte);
        self.shift(u16::from(byte));
    }

    /// A unit taken by the receive DMA request.
    pub(crate) fn dma_read(&self) -> u8 {
        self.rx.borrow_mut().pop_front().unwrap_or(0) as u8
    }

    pub(crate) fn rx_available(&self) -> usize {
        if self.rx_stalled.get() {
            0
        } else {
            self.rx.borrow().len()
        }
    }

    fn store(&self, offset: usize, bytes: &[u8], value: u32) {
        self.regs.borrow_mut()[offset..offset + bytes.len()].copy_from_slice(bytes);
        self.writes.borrow_mut().push((offset, value));
    }
}

impl RegisterWindow for SimHardware {
    fn read8(&self, offset: usize) -> u8 {
        if offset == DATA_OFFSET {
            self.data_read(Access::Read8) as u8
        } else if offset == STATUS.offset() {
            self.status()
        } else {
            self.reg8(offset)
        }
    }

    fn read16(&self, offset: usize) -> u16 {
        if offset == DATA_OFFSET {
            self.data_read(Access::Read16)
        } else {
            self.reg16(offset)
        }
    }

    fn read32(&self, offset: usize) -> u32 {
        self.reg32(offset)
    }

    fn write8(&self, offset: usize, value: u8) {
        if offset == DATA_OFFSET {
            self.data_write(Access::Write8(value), u16::from(value));
            return;
        }
        if offset == STATUS.offset() {
            // Error flags clear on writing zero.
            self.error_flags.set(self.error_flags.get() & value);
            self.writes.borrow_mut().push((offset, u32::from(value)));
            return;
        }
        let resets = SPBFCR::TXRST::SET.value | SPBFCR::RXRST::SET.value;
        let is_buffer_control = self
            .variant
            .buffer_control()
            .is_some_and(|reg| reg.offset() == offset);
        if is_buffer_control && value & resets != 0 {
            self.rx.borrow_mut().clear();
        }
        self.store(offset, &[value], u32::from(value));
    }

    fn write16(&self, offset: usize, value: u16) {
        if offset == DATA_OFFSET {
            self.data_write(Access::Write16(value), value);
            return;
        }
        self.store(offset, &value.to_le_bytes(), u32::from(value));
    }

    fn write32(&self, offset: usize, value: u32) {
        self.store(offset, &value.to_le_bytes(), value);
    }
}

/// Platform interrupt-controller masking events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum IrqEvent {
    Enable(IrqLine),
    Disable(IrqLine),
}

/// Interrupt controller with nesting disable depth per line.
pub(crate) struct SimIrq {
    events: RefCell<Vec<IrqEvent>>,
}

impl SimIrq {
    pub(crate) fn new() -> SimIrq {
        SimIrq {
            events: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn events(&self) -> Vec<IrqEvent> {
        self.events.borrow().clone()
    }

    pub(crate) fn is_enabled(&self, line: IrqLine) -> bool {
        let depth = self.events.borrow().iter().fold(0i32, |depth, e| match *e {
            IrqEvent::Disable(l) if l == line => depth + 1,
            IrqEvent::Enable(l) if l == line => depth - 1,
            _ => depth,
        });
        depth <= 0
    }
}

impl InterruptControl for SimIrq {
    fn enable(&self, line: IrqLine) {
        self.events.borrow_mut().push(IrqEvent::Enable(line));
    }

    fn disable(&self, line: IrqLine) {
        self.events.borrow_mut().push(IrqEvent::Disable(line));
    }
}

/// A wait queue that steps the simulated hardware instead of sleeping.
pub(crate) struct SimWait {
    pump: Cell<Option<&'static dyn Fn()>>,
    waits: Cell<usize>,
    wakes: Cell<usize>,
    expired: RefCell<Vec<Duration>>,
}

impl SimWait {
    pub(crate) fn new() -> SimWait {
        SimWait {
            pump: Cell::new(None),
            waits: Cell::new(0),
            wakes: Cell::new(0),
            expired: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn set_pump(&self, pump: &'static dyn Fn()) {
        self.pump.set(Some(pump));
    }

    pub(crate) fn waits(&self) -> usize {
        self.waits.get()
    }

    pub(crate) fn wakes(&self) -> usize {
        self.wakes.get()
    }

    /// Timeouts of the waits that expired.
    pub(crate) fn timeouts(&self) -> Vec<Duration> {
        self.expired.borrow().clone()
    }
}

impl WaitQueue for SimWait {
    fn wait_timeout(&self, condition: &dyn Fn() -> bool, timeout: Duration) -> bool {
        self.waits.set(self.waits.get() + 1);
        for _ in 0..WAIT_STEPS {
            if condition() {
                return true;
            }
            if let Some(pump) = self.pump.get() {
                pump();
            }
        }
        if condition() {
            return true;
        }
        self.expired.borrow_mut().push(timeout);
        false
    }

    fn wake_all(&self) {
        self.wakes.set(self.wakes.get() + 1);
    }
}

pub(crate) struct SimClock(pub(crate) u32);

impl Clock for SimClock {
    fn rate_hz(&self) -> u32 {
        self.0
    }
}

/// A DMA channel wired to the simulated data register.
///
/// A transmit descriptor completes in one step while `SPTIE` requests
/// transfers. A receive descriptor completes once `SPRIE` is set and enough
/// units are queued.
pub(crate) struct SimDma {
    hw: &'static SimHardware,
    client: Cell<Option<&'static dyn DmaClient>>,
    mapped: Cell<usize>,
    fail_map: Cell<bool>,
    fail_prepare: Cell<bool>,
    stalled: Cell<bool>,
    descriptors: RefCell<Vec<(SgEntry, DmaDirection)>>,
    queued: RefCell<Vec<(DmaDescriptor, bool)>>,
    active: RefCell<Vec<(DmaDescriptor, bool)>>,
    submissions: Cell<usize>,
    terminations: Cell<usize>,
}

impl SimDma {
    pub(crate) fn new(hw: &'static SimHardware) -> SimDma {
        SimDma {
            hw,
            client: Cell::new(None),
            mapped: Cell::new(0),
            fail_map: Cell::new(false),
            fail_prepare: Cell::new(false),
            stalled: Cell::new(false),
            descriptors: RefCell::new(Vec::new()),
            queued: RefCell::new(Vec::new()),
            active: RefCell::new(Vec::new()),
            submissions: Cell::new(0),
            terminations: Cell::new(0),
        }
    }

    pub(crate) fn fail_map(&self, fail: bool) {
        self.fail_map.set(fail);
    }

    pub(crate) fn fail_prepare(&self, fail: bool) {
        self.fail_prepare.set(fail);
    }

    pub(crate) fn stall(&self, stalled: bool) {
        self.stalled.set(stalled);
    }

    /// Buffers currently mapped.
    pub(crate) fn mapped(&self) -> usize {
        self.mapped.get()
    }

    pub(crate) fn submissions(&self) -> usize {
        self.submissions.get()
    }

    pub(crate) fn terminations(&self) -> usize {
        self.terminations.get()
    }

    /// Run every active descriptor that the controller is requesting.
    pub(crate) fn tick(&self) {
        if self.stalled.get() {
            return;
        }
        let spcr = self.hw.reg8(CONTROL.offset());
        let active = self.active.take();
        let mut waiting = Vec::new();
        for (desc, notify) in active {
            let (entry, direction) = self.descriptors.borrow()[desc.0];
            let base = entry.dma_address as *mut u8;
            let done = match direction {
                DmaDirection::MemToDev if spcr & SPCR::SPTIE::SET.value != 0 => {
                    for i in 0..entry.len {
                        // Safety: the entry maps a live buffer of `len` bytes.
                        let byte = unsafe { base.add(i).read() };
                        self.hw.dma_write(byte);
                    }
                    true
                }
                DmaDirection::DevToMem
                    if spcr & SPCR::SPRIE::SET.value != 0
                        && self.hw.rx_available() >= entry.len =>
                {
                    for i in 0..entry.len {
                        let byte = self.hw.dma_read();
                        // Safety: the entry maps a live buffer of `len` bytes.
                        unsafe { base.add(i).write(byte) };
                    }
                    true
                }
                _ => false,
            };
            if !done {
                waiting.push((desc, notify));
            } else if notify {
                if let Some(client) = self.client.get() {
                    client.transfer_done();
                }
            }
        }
        self.active.borrow_mut().extend(waiting);
    }
}

impl DmaChannel<'static> for SimDma {
    fn set_client(&self, client: &'static dyn DmaClient) {
        self.client.set(Some(client));
    }

    fn map(&self, buffer: NonNull<u8>, len: usize, _direction: DmaDirection) -> Option<SgEntry> {
        if self.fail_map.get() {
            return None;
        }
        self.mapped.set(self.mapped.get() + 1);
        Some(SgEntry {
            dma_address: buffer.as_ptr() as usize,
            len,
        })
    }

    fn unmap(&self, _entry: SgEntry, _direction: DmaDirection) {
        self.mapped.set(self.mapped.get() - 1);
    }

    fn prepare(&self, entry: &SgEntry, direction: DmaDirection) -> Option<DmaDescriptor> {
        if self.fail_prepare.get() {
            return None;
        }
        let mut descriptors = self.descriptors.borrow_mut();
        descriptors.push((*entry, direction));
        Some(DmaDescriptor(descriptors.len() - 1))
    }

    fn submit(&self, descriptor: DmaDescriptor, notify: bool) {
        self.submissions.set(self.submissions.get() + 1);
        self.queued.borrow_mut().push((descriptor, notify));
    }

    fn issue_pending(&self) {
        let queued = self.queued.take();
        self.active.borrow_mut().extend(queued);
    }

    fn terminate(&self) {
        self.terminations.set(self.terminations.get() + 1);
        self.queued.borrow_mut().clear();
        self.active.borrow_mut().clear();
    }
}

fn leak<T>(value: T) -> &'static T {
    Box::leak(Box::new(value))
}

/// A controller wired to simulated hardware.
pub(crate) struct Harness {
    pub(crate) hw: &'static SimHardware,
    pub(crate) irq: &'static SimIrq,
    pub(crate) wait: &'static SimWait,
    pub(crate) tx_dma: &'static SimDma,
    pub(crate) rx_dma: &'static SimDma,
    pub(crate) lines: IrqLines,
    pub(crate) rspi: &'static Rspi<'static, &'static SimHardware>,
}

impl Harness {
    const LINES: IrqLines = IrqLines::new(1, 2);

    /// PIO only.
    pub(crate) fn new(variant: Variant) -> Harness {
        Harness::build(variant, Self::LINES, false)
    }

    pub(crate) fn with_lines(variant: Variant, lines: IrqLines) -> Harness {
        Harness::build(variant, lines, false)
    }

    /// Transmit and receive DMA channels attached.
    pub(crate) fn with_dma(variant: Variant) -> Harness {
        Harness::build(variant, Self::LINES, true)
    }

    pub(crate) fn with_dma_lines(variant: Variant, lines: IrqLines) -> Harness {
        Harness::build(variant, lines, true)
    }

    fn build(variant: Variant, lines: IrqLines, dma: bool) -> Harness {
        let hw = leak(SimHardware::new(variant));
        let irq = leak(SimIrq::new());
        let wait = leak(SimWait::new());
        let clock = leak(SimClock(CLOCK_HZ));
        let tx_dma = leak(SimDma::new(hw));
        let rx_dma = leak(SimDma::new(hw));
        let rspi = leak(Rspi::new(hw, variant, clock, irq, lines, wait));

        if dma {
            let tx: &'static dyn DmaChannel<'static> = tx_dma;
            let rx: &'static dyn DmaChannel<'static> = rx_dma;
            rspi.set_dma(Some(tx), Some(rx));
        }

        let pump: Box<dyn Fn()> = Box::new(move || {
            hw.tick();
            let (rx_request, tx_request) = hw.pending();
            if lines.is_multiplexed() {
                if (rx_request || tx_request) && irq.is_enabled(lines.rx) {
                    rspi.handle_interrupt(lines.rx);
                }
            } else {
                if rx_request && irq.is_enabled(lines.rx) {
                    rspi.handle_interrupt(lines.rx);
                }
                if tx_request && irq.is_enabled(lines.tx) {
                    rspi.handle_interrupt(lines.tx);
                }
            }
            tx_dma.tick();
            rx_dma.tick();
        });
        wait.set_pump(Box::leak(pump));

        Harness {
            hw,
            irq,
            wait,
            tx_dma,
            rx_dma,
            lines,
            rspi,
        }
    }
}
