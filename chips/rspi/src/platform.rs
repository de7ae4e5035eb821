// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interfaces the controller needs from the platform.
//!
//! Resource discovery and handler installation are the board's business. The
//! driver only needs to query the functional clock, mask and unmask its
//! interrupt lines at the interrupt controller, block the calling context
//! with a timeout, and (optionally) drive DMA channels.

use core::ptr::NonNull;
use core::time::Duration;

/// Functional clock feeding the bit-rate generator.
pub trait Clock {
    fn rate_hz(&self) -> u32;
}

/// Identifier of a line at the platform interrupt controller.
pub type IrqLine = u32;

/// Interrupt-controller level masking of the controller's lines.
///
/// This is distinct from the enable bits in the controller's own `SPCR`. The
/// driver masks lines while DMA owns the transmit/receive requests.
pub trait InterruptControl {
    fn enable(&self, line: IrqLine);
    fn disable(&self, line: IrqLine);
}

/// The receive and transmit interrupt lines.
///
/// Some parts route both sources through one multiplexed line.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IrqLines {
    pub rx: IrqLine,
    pub tx: IrqLine,
}

impl IrqLines {
    pub const fn new(rx: IrqLine, tx: IrqLine) -> Self {
        IrqLines { rx, tx }
    }

    pub const fn multiplexed(line: IrqLine) -> Self {
        IrqLines { rx: line, tx: line }
    }

    pub fn is_multiplexed(&self) -> bool {
        self.rx == self.tx
    }
}

/// What an interrupt handler did with an interrupt.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IrqReturn {
    /// The interrupt was not raised by this controller.
    None,
    Handled,
}

/// A wait queue the calling context can block on.
///
/// `wait_timeout` must return as soon as `condition` holds after a
/// `wake_all`, or once `timeout` has elapsed. `wake_all` is called from
/// interrupt and DMA callback context and must not block.
pub trait WaitQueue {
    /// Returns whether `condition` was observed true before the deadline.
    fn wait_timeout(&self, condition: &dyn Fn() -> bool, timeout: Duration) -> bool;
    fn wake_all(&self);
}

/// Direction of a DMA transfer relative to the controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DmaDirection {
    /// Memory to the data register (transmit).
    MemToDev,
    /// Data register to memory (receive).
    DevToMem,
}

/// One mapped scatter-gather entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SgEntry {
    /// Bus address of the buffer as seen by the DMA engine.
    pub dma_address: usize,
    pub len: usize,
}

/// Handle to a prepared DMA descriptor, owned by the channel that issued it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DmaDescriptor(pub usize);

/// Completion callback for DMA transfers submitted with notification.
pub trait DmaClient {
    fn transfer_done(&self);
}

/// A slave DMA channel already configured for the controller's data
/// register.
pub trait DmaChannel<'a> {
    fn set_client(&self, client: &'a dyn DmaClient);

    /// Make `len` bytes at `buffer` visible to the DMA engine. Returns `None`
    /// if the buffer cannot be mapped.
    fn map(&self, buffer: NonNull<u8>, len: usize, direction: DmaDirection) -> Option<SgEntry>;

    fn unmap(&self, entry: SgEntry, direction: DmaDirection);

    /// Prepare a single-entry slave transfer. Returns `None` if the engine
    /// has no descriptor available.
    fn prepare(&self, entry: &SgEntry, direction: DmaDirection) -> Option<DmaDescriptor>;

    /// Queue a prepared descriptor. When `notify` is set the client's
    /// `transfer_done` runs once the descriptor completes.
    fn submit(&self, descriptor: DmaDescriptor, notify: bool);

    /// Start all queued descriptors.
    fn issue_pending(&self);

    /// Abort everything queued or running on the channel.
    fn terminate(&self);
}
