// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! DMA transfers.
//!
//! While a DMA transfer runs, the controller's transmit/receive requests
//! drive the DMA engine instead of the CPU, so the matching platform
//! interrupt lines are masked and only the channel completion callback
//! signals the waiter.

use core::marker::PhantomData;
use core::ptr::NonNull;
use core::sync::atomic::Ordering;

use log::error;

use crate::error::ErrorCode;
use crate::platform::{DmaChannel, DmaDescriptor, DmaDirection, SgEntry};
use crate::registers::{RegisterWindow, CONTROL, SPCR};
use crate::rspi::Rspi;

/// A buffer mapped for one DMA channel. Unmapped on drop.
struct MappedBuffer<'c, 'b> {
    channel: &'c dyn DmaChannel<'c>,
    entry: SgEntry,
    direction: DmaDirection,
    _buffer: PhantomData<&'b mut [u8]>,
}

impl<'c, 'b> MappedBuffer<'c, 'b> {
    fn map(
        channel: &'c dyn DmaChannel<'c>,
        buffer: NonNull<u8>,
        len: usize,
        direction: DmaDirection,
    ) -> Result<Self, ErrorCode> {
        let entry = channel
            .map(buffer, len, direction)
            .ok_or(ErrorCode::ResourceUnavailable)?;
        Ok(MappedBuffer {
            channel,
            entry,
            direction,
            _buffer: PhantomData,
        })
    }

    fn to_device(channel: &'c dyn DmaChannel<'c>, buffer: &'b [u8]) -> Result<Self, ErrorCode> {
        let ptr = NonNull::from(buffer).cast::<u8>();
        Self::map(channel, ptr, buffer.len(), DmaDirection::MemToDev)
    }

    fn from_device(
        channel: &'c dyn DmaChannel<'c>,
        buffer: &'b mut [u8],
    ) -> Result<Self, ErrorCode> {
        let len = buffer.len();
        let ptr = NonNull::from(buffer).cast::<u8>();
        Self::map(channel, ptr, len, DmaDirection::DevToMem)
    }

    fn prepare(&self) -> Result<DmaDescriptor, ErrorCode> {
        self.channel
            .prepare(&self.entry, self.direction)
            .ok_or(ErrorCode::IoError)
    }
}

impl Drop for MappedBuffer<'_, '_> {
    fn drop(&mut self) {
        self.channel.unmap(self.entry, self.direction);
    }
}

impl<'a, W: RegisterWindow> Rspi<'a, W> {
    /// Transmit-only DMA. Completion is signalled by the transmit channel.
    pub(crate) fn send_dma(
        &self,
        chan_tx: &'a dyn DmaChannel<'a>,
        tx: &[u8],
    ) -> Result<(), ErrorCode> {
        let tx_buf = MappedBuffer::to_device(chan_tx, tx)?;
        let desc_tx = tx_buf.prepare()?;

        // The transmit request now belongs to the DMA engine.
        self.irq.disable(self.irq_lines.tx);

        if self.variant.has_tx_only_mode() {
            self.registers.modify(CONTROL, SPCR::TXMD::SET);
        }
        self.enable_irq(SPCR::SPTIE::SET);
        self.dma_done.store(false, Ordering::Release);

        chan_tx.submit(desc_tx, true);
        chan_tx.issue_pending();

        let result = self.wait_for_dma();
        if result.is_err() {
            error!("rspi: DMA transmit timeout");
            chan_tx.terminate();
        }

        self.disable_irq(SPCR::SPTIE::SET);
        self.irq.enable(self.irq_lines.tx);
        result
    }

    /// Full-duplex DMA. Completion is signalled by the receive channel,
    /// which finishes last.
    pub(crate) fn send_receive_dma(
        &self,
        chan_tx: &'a dyn DmaChannel<'a>,
        chan_rx: &'a dyn DmaChannel<'a>,
        tx: &[u8],
        rx: &mut [u8],
    ) -> Result<(), ErrorCode> {
        let tx_buf = MappedBuffer::to_device(chan_tx, tx)?;
        let desc_tx = tx_buf.prepare()?;
        let rx_buf = MappedBuffer::from_device(chan_rx, rx)?;
        let desc_rx = rx_buf.prepare()?;

        self.variant.receive_init(&self.registers);

        self.irq.disable(self.irq_lines.tx);
        if !self.irq_lines.is_multiplexed() {
            self.irq.disable(self.irq_lines.rx);
        }

        if self.variant.has_tx_only_mode() {
            self.registers.modify(CONTROL, SPCR::TXMD::CLEAR);
        }
        self.enable_irq(SPCR::SPTIE::SET + SPCR::SPRIE::SET);
        self.dma_done.store(false, Ordering::Release);

        chan_rx.submit(desc_rx, true);
        chan_rx.issue_pending();
        chan_tx.submit(desc_tx, false);
        chan_tx.issue_pending();

        let result = self.wait_for_dma();
        if result.is_err() {
            error!("rspi: DMA transmit/receive timeout");
            chan_tx.terminate();
            chan_rx.terminate();
        }

        self.disable_irq(SPCR::SPTIE::SET + SPCR::SPRIE::SET);
        self.irq.enable(self.irq_lines.tx);
        if !self.irq_lines.is_multiplexed() {
            self.irq.enable(self.irq_lines.rx);
        }

        // Unmap receive before transmit.
        drop(rx_buf);
        drop(tx_buf);
        result
    }
}
