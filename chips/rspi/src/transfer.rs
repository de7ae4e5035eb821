// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Transfers and messages as handed to the controller.

use core::cmp;

use tock_registers::fields::FieldValue;

use crate::registers::SPCMD;

/// Number of data lines used per clock in one direction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum WireWidth {
    #[default]
    Single,
    Dual,
    Quad,
}

/// Wire-mode class of a transfer, as programmed into a command slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransferMode {
    Single,
    DualWrite,
    QuadWrite,
    DualRead,
    QuadRead,
}

impl TransferMode {
    /// SPIMOD and SPRW bits for this mode.
    pub(crate) fn command_bits(self) -> FieldValue<u16, SPCMD::Register> {
        match self {
            TransferMode::Single => SPCMD::SPIMOD::Single + SPCMD::SPRW::CLEAR,
            TransferMode::DualWrite => SPCMD::SPIMOD::Dual + SPCMD::SPRW::CLEAR,
            TransferMode::QuadWrite => SPCMD::SPIMOD::Quad + SPCMD::SPRW::CLEAR,
            TransferMode::DualRead => SPCMD::SPIMOD::Dual + SPCMD::SPRW::SET,
            TransferMode::QuadRead => SPCMD::SPIMOD::Quad + SPCMD::SPRW::SET,
        }
    }
}

/// One data movement: transmit, receive, or both at once.
///
/// When both buffers are present the transfer moves as many bytes as the
/// shorter of the two holds. Buffers are borrowed for the duration of the
/// transfer and never retained.
#[derive(Debug)]
pub struct Transfer<'b> {
    tx: Option<&'b [u8]>,
    rx: Option<&'b mut [u8]>,
    len: usize,
    tx_width: WireWidth,
    rx_width: WireWidth,
}

impl<'b> Transfer<'b> {
    pub fn write(tx: &'b [u8]) -> Self {
        Transfer {
            len: tx.len(),
            tx: Some(tx),
            rx: None,
            tx_width: WireWidth::Single,
            rx_width: WireWidth::Single,
        }
    }

    pub fn read(rx: &'b mut [u8]) -> Self {
        Transfer {
            len: rx.len(),
            tx: None,
            rx: Some(rx),
            tx_width: WireWidth::Single,
            rx_width: WireWidth::Single,
        }
    }

    pub fn write_read(tx: &'b [u8], rx: &'b mut [u8]) -> Self {
        Transfer {
            len: cmp::min(tx.len(), rx.len()),
            tx: Some(tx),
            rx: Some(rx),
            tx_width: WireWidth::Single,
            rx_width: WireWidth::Single,
        }
    }

    pub fn with_tx_width(mut self, width: WireWidth) -> Self {
        self.tx_width = width;
        self
    }

    pub fn with_rx_width(mut self, width: WireWidth) -> Self {
        self.rx_width = width;
        self
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn tx_width(&self) -> WireWidth {
        self.tx_width
    }

    pub fn rx_width(&self) -> WireWidth {
        self.rx_width
    }

    pub fn has_tx(&self) -> bool {
        self.tx.is_some()
    }

    pub fn has_rx(&self) -> bool {
        self.rx.is_some()
    }

    /// Both buffers, cut to the transfer length.
    pub(crate) fn buffers(&mut self) -> (Option<&[u8]>, Option<&mut [u8]>) {
        let len = self.len;
        (
            self.tx.map(|tx| &tx[..len]),
            self.rx.as_deref_mut().map(|rx| &mut rx[..len]),
        )
    }

    /// The command slot mode this transfer needs.
    ///
    /// A transmit buffer decides the mode when present; receive width only
    /// matters for receive-only transfers.
    pub fn mode(&self) -> TransferMode {
        if self.tx.is_some() {
            return match self.tx_width {
                WireWidth::Quad => TransferMode::QuadWrite,
                WireWidth::Dual => TransferMode::DualWrite,
                WireWidth::Single => TransferMode::Single,
            };
        }
        if self.rx.is_some() {
            return match self.rx_width {
                WireWidth::Quad => TransferMode::QuadRead,
                WireWidth::Dual => TransferMode::DualRead,
                WireWidth::Single => TransferMode::Single,
            };
        }
        TransferMode::Single
    }
}

/// An ordered group of transfers forming one logical operation.
#[derive(Debug)]
pub struct Message<'m, 'b> {
    transfers: &'m mut [Transfer<'b>],
}

impl<'m, 'b> Message<'m, 'b> {
    pub fn new(transfers: &'m mut [Transfer<'b>]) -> Self {
        Message { transfers }
    }

    pub fn transfers(&self) -> &[Transfer<'b>] {
        self.transfers
    }

    pub(crate) fn transfers_mut(&mut self) -> &mut [Transfer<'b>] {
        self.transfers
    }

    pub fn len(&self) -> usize {
        self.transfers.len()
    }
}
