// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! The controller state and its message-level interface.

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use core::time::Duration;

use log::{debug, trace, warn};
use tock_registers::fields::FieldValue;
use tock_registers::LocalRegisterCopy;

use crate::config::{ClockPhase, ClockPolarity, DeviceConfig, CONFIG};
use crate::dispatch::Strategy;
use crate::error::ErrorCode;
use crate::platform::{
    Clock, DmaChannel, DmaClient, InterruptControl, IrqLine, IrqLines, IrqReturn, WaitQueue,
};
use crate::registers::{
    command, AccessWidth, RegisterWindow, Registers, BIT_RATE, CONTROL, SEQUENCE_CONTROL, SPCMD,
    SPCR, SPPCR, SPSCR, SPSR, STATUS,
};
use crate::sequencer::CommandSequence;
use crate::transfer::{Message, Transfer};
use crate::variant::{ConfigSettings, Variant};

/// Upper bound on every blocking wait.
pub const TRANSFER_TIMEOUT: Duration = Duration::from_secs(1);

/// Frame size programmed by [`Rspi::setup`].
const ACCESS_SIZE_BITS: u8 = 8;

/// One RSPI, RZ RSPI or QSPI controller.
///
/// All methods take `&self`. The transfer path runs in one blocking caller
/// context at a time; interrupt handlers and DMA completions may run
/// concurrently with it and only touch the cached status and the DMA
/// completion flag.
pub struct Rspi<'a, W: RegisterWindow> {
    pub(crate) registers: Registers<W>,
    pub(crate) variant: Variant,
    clock: &'a dyn Clock,
    pub(crate) irq: &'a dyn InterruptControl,
    pub(crate) irq_lines: IrqLines,
    wait: &'a dyn WaitQueue,

    max_speed_hz: Cell<u32>,
    /// Base command word: clock mode, data length and SSLKP.
    command: Cell<LocalRegisterCopy<u16, SPCMD::Register>>,
    pin_control: Cell<LocalRegisterCopy<u8, SPPCR::Register>>,
    multi_io: Cell<bool>,

    tx_dma: Cell<Option<&'a dyn DmaChannel<'a>>>,
    rx_dma: Cell<Option<&'a dyn DmaChannel<'a>>>,

    /// Last status register value seen by a waiter or interrupt handler.
    status: AtomicU8,
    pub(crate) dma_done: AtomicBool,
}

impl<'a, W: RegisterWindow> Rspi<'a, W> {
    pub fn new(
        window: W,
        variant: Variant,
        clock: &'a dyn Clock,
        irq: &'a dyn InterruptControl,
        irq_lines: IrqLines,
        wait: &'a dyn WaitQueue,
    ) -> Rspi<'a, W> {
        Rspi {
            registers: Registers::new(window),
            variant,
            clock,
            irq,
            irq_lines,
            wait,
            max_speed_hz: Cell::new(0),
            command: Cell::new(LocalRegisterCopy::new(SPCMD::SSLKP::SET.value)),
            pin_control: Cell::new(LocalRegisterCopy::new(0)),
            multi_io: Cell::new(false),
            tx_dma: Cell::new(None),
            rx_dma: Cell::new(None),
            status: AtomicU8::new(0),
            dma_done: AtomicBool::new(false),
        }
    }

    /// Attach DMA channels.
    ///
    /// A receive channel is only useful together with a transmit channel, so
    /// `rx` is ignored when `tx` is `None`. The controller registers itself
    /// as the client of both.
    pub fn set_dma(
        &'a self,
        tx: Option<&'a dyn DmaChannel<'a>>,
        rx: Option<&'a dyn DmaChannel<'a>>,
    ) {
        let rx = match (tx, rx) {
            (None, Some(_)) => {
                warn!("rspi: receive DMA without transmit DMA, ignoring");
                None
            }
            _ => rx,
        };
        if let Some(tx) = tx {
            tx.set_client(self);
            debug!("rspi: use DMA transfer on tx");
        }
        if let Some(rx) = rx {
            rx.set_client(self);
            debug!("rspi: use DMA transfer on rx");
        }
        self.tx_dma.set(tx);
        self.rx_dma.set(rx);
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Data register access width currently programmed.
    pub fn access_width(&self) -> AccessWidth {
        self.registers.access_width()
    }

    /// Base command word as it will be programmed into slot 0.
    pub fn command_word(&self) -> u16 {
        self.command.get().get()
    }

    /// Update the cached command word. SSL level keeping is always on while
    /// the controller is in use.
    fn set_command_word(&self, mut word: LocalRegisterCopy<u16, SPCMD::Register>) {
        word.modify(SPCMD::SSLKP::SET);
        self.command.set(word);
    }

    /// Prepare the controller for `device`.
    ///
    /// Fails with [`ErrorCode::NoSupport`] if the device asks for a wire
    /// width this variant cannot drive.
    pub fn setup(&self, device: &DeviceConfig) -> Result<(), ErrorCode> {
        let max = self.variant.max_width();
        if device.tx_width > max || device.rx_width > max {
            warn!(
                "rspi: {:?} cannot do {:?}/{:?} wire modes",
                self.variant, device.tx_width, device.rx_width
            );
            return Err(ErrorCode::NoSupport);
        }

        self.max_speed_hz.set(device.max_speed_hz);

        let mut word = LocalRegisterCopy::new(0);
        if device.polarity == ClockPolarity::IdleHigh {
            word.modify(SPCMD::CPOL::SET);
        }
        if device.phase == ClockPhase::SampleTrailing {
            word.modify(SPCMD::CPHA::SET);
        }
        self.set_command_word(word);

        let mut pin_control = LocalRegisterCopy::new(0);
        if device.loopback {
            pin_control.modify(SPPCR::SPLP::SET);
        }
        self.pin_control.set(pin_control);
        self.multi_io.set(device.is_multi_io());

        self.configure(ACCESS_SIZE_BITS);
        Ok(())
    }

    /// Run the variant's Config Programmer for `access_size`-bit frames.
    fn configure(&self, access_size: u8) {
        let settings = ConfigSettings {
            clock_hz: self.clock.rate_hz(),
            max_speed_hz: self.max_speed_hz.get(),
            pin_control: self.pin_control.get(),
            command: self.command.get(),
        };
        let word = self.variant.configure(&self.registers, &settings, access_size);
        self.set_command_word(word);
        debug!(
            "rspi: {:?} clock {} Hz, max {} Hz, divisor {}",
            self.variant,
            settings.clock_hz,
            settings.max_speed_hz,
            self.registers.get(BIT_RATE).get()
        );
    }

    /// Program the command sequencer for a multi-wire message and enable the
    /// controller.
    ///
    /// On failure nothing has been written.
    pub fn prepare_message(&self, message: &Message<'_, '_>) -> Result<(), ErrorCode> {
        if self.variant == Variant::Qspi && self.multi_io.get() {
            let seq = CommandSequence::plan(message.transfers())?;
            seq.program(&self.registers, self.command.get());
        }
        self.registers.modify(CONTROL, SPCR::SPE::SET);
        Ok(())
    }

    /// Disable the controller and return to single-slot operation.
    pub fn unprepare_message(&self, _message: &Message<'_, '_>) {
        self.registers.modify(CONTROL, SPCR::SPE::CLEAR);
        self.registers.set(command(0), self.command.get().get());
        self.registers.write(SEQUENCE_CONTROL, SPSCR::SPSLN.val(0));
    }

    /// Move the data of one transfer.
    pub fn transfer(&self, xfer: &mut Transfer<'_>) -> Result<(), ErrorCode> {
        let loopback = self.pin_control.get().is_set(SPPCR::SPLP);
        let strategy = Strategy::select(
            self.variant,
            loopback,
            self.tx_dma.get(),
            self.rx_dma.get(),
            xfer,
        );
        if CONFIG.trace_transfers {
            trace!("rspi: {} bytes via {:?}", xfer.len(), strategy);
        }

        let (tx, rx) = xfer.buffers();
        match (strategy, tx, rx) {
            (Strategy::DmaSend(chan), Some(tx), None) => self.send_dma(chan, tx),
            (Strategy::DmaSendReceive(chan_tx, chan_rx), Some(tx), Some(rx)) => {
                self.send_receive_dma(chan_tx, chan_rx, tx, rx)
            }
            (Strategy::PioOut, tx, _) => self.transfer_out(tx),
            (Strategy::PioIn, _, rx) => self.transfer_in(rx),
            (_, tx, rx) => self.transfer_out_in(tx, rx),
        }
    }

    /// Prepare, run every transfer in order, then unprepare.
    ///
    /// Unpreparation happens even if a transfer fails. The first error is
    /// returned and later transfers are skipped.
    pub fn transfer_message(&self, message: &mut Message<'_, '_>) -> Result<(), ErrorCode> {
        self.prepare_message(message)?;
        let result = message
            .transfers_mut()
            .iter_mut()
            .try_for_each(|xfer| self.transfer(xfer));
        self.unprepare_message(message);
        result
    }

    /// Tear down: stop DMA, disable the controller and clear slot 0.
    pub fn release(&self) {
        if let Some(chan) = self.rx_dma.take() {
            chan.terminate();
        }
        if let Some(chan) = self.tx_dma.take() {
            chan.terminate();
        }
        self.registers.modify(CONTROL, SPCR::SPE::CLEAR);
        self.command.set(LocalRegisterCopy::new(0));
        self.registers.set(command(0), 0);
    }

    pub(crate) fn enable_irq(&self, bits: FieldValue<u8, SPCR::Register>) {
        let spcr = self.registers.get(CONTROL).get();
        self.registers.set(CONTROL, spcr | bits.value);
    }

    pub(crate) fn disable_irq(&self, bits: FieldValue<u8, SPCR::Register>) {
        let spcr = self.registers.get(CONTROL).get();
        self.registers.set(CONTROL, spcr & !bits.value);
    }

    /// Wait until any of the status bits in `flags` is set.
    ///
    /// If they already are, returns without touching the interrupt enables.
    /// Otherwise `enable` is set in `SPCR` for the duration of the wait and
    /// is clear again on return.
    pub(crate) fn wait_for_flag(
        &self,
        flags: FieldValue<u8, SPSR::Register>,
        enable: FieldValue<u8, SPCR::Register>,
    ) -> Result<(), ErrorCode> {
        let status = self.registers.get(STATUS).get();
        self.status.store(status, Ordering::Release);
        if status & flags.value != 0 {
            return Ok(());
        }

        self.enable_irq(enable);
        let flagged = || self.status.load(Ordering::Acquire) & flags.value != 0;
        let woken = self.wait.wait_timeout(&flagged, TRANSFER_TIMEOUT);
        self.disable_irq(enable);

        if woken || flagged() {
            Ok(())
        } else {
            Err(ErrorCode::Timeout)
        }
    }

    pub(crate) fn wait_for_tx_empty(&self) -> Result<(), ErrorCode> {
        self.wait_for_flag(SPSR::SPTEF::SET, SPCR::SPTIE::SET)
    }

    pub(crate) fn wait_for_rx_full(&self) -> Result<(), ErrorCode> {
        self.wait_for_flag(SPSR::SPRF::SET, SPCR::SPRIE::SET)
    }

    /// Wait for the DMA completion callback.
    pub(crate) fn wait_for_dma(&self) -> Result<(), ErrorCode> {
        let done = || self.dma_done.load(Ordering::Acquire);
        if self.wait.wait_timeout(&done, TRANSFER_TIMEOUT) || done() {
            Ok(())
        } else {
            Err(ErrorCode::Timeout)
        }
    }

    /// Entry point for the platform interrupt line(s).
    pub fn handle_interrupt(&self, line: IrqLine) -> IrqReturn {
        if self.irq_lines.is_multiplexed() {
            if line == self.irq_lines.rx {
                return self.handle_mux_interrupt();
            }
        } else if line == self.irq_lines.rx {
            return self.handle_rx_interrupt();
        } else if line == self.irq_lines.tx {
            return self.handle_tx_interrupt();
        }
        IrqReturn::None
    }

    /// Shared receive/transmit interrupt.
    pub fn handle_mux_interrupt(&self) -> IrqReturn {
        let spsr = self.latch_status();
        let disable = match (spsr.is_set(SPSR::SPRF), spsr.is_set(SPSR::SPTEF)) {
            (true, true) => SPCR::SPRIE::SET + SPCR::SPTIE::SET,
            (true, false) => SPCR::SPRIE::SET,
            (false, true) => SPCR::SPTIE::SET,
            (false, false) => return IrqReturn::None,
        };
        self.disable_irq(disable);
        self.wait.wake_all();
        IrqReturn::Handled
    }

    /// Dedicated receive interrupt.
    pub fn handle_rx_interrupt(&self) -> IrqReturn {
        if self.latch_status().is_set(SPSR::SPRF) {
            self.disable_irq(SPCR::SPRIE::SET);
            self.wait.wake_all();
            return IrqReturn::Handled;
        }
        IrqReturn::None
    }

    /// Dedicated transmit interrupt.
    pub fn handle_tx_interrupt(&self) -> IrqReturn {
        if self.latch_status().is_set(SPSR::SPTEF) {
            self.disable_irq(SPCR::SPTIE::SET);
            self.wait.wake_all();
            return IrqReturn::Handled;
        }
        IrqReturn::None
    }

    fn latch_status(&self) -> LocalRegisterCopy<u8, SPSR::Register> {
        let spsr = self.registers.get(STATUS);
        self.status.store(spsr.get(), Ordering::Release);
        spsr
    }
}

impl<'a, W: RegisterWindow> DmaClient for Rspi<'a, W> {
    fn transfer_done(&self) {
        self.dma_done.store(true, Ordering::Release);
        self.wait.wake_all();
    }
}
