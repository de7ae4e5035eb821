// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Choice of data-movement strategy for one transfer.

use core::fmt;

use crate::platform::DmaChannel;
use crate::transfer::{Transfer, WireWidth};
use crate::variant::Variant;

/// How a transfer moves its data.
#[derive(Copy, Clone)]
pub(crate) enum Strategy<'a> {
    /// Programmed I/O, one unit at a time, both directions as present.
    PioOutIn,
    /// Programmed I/O, transmit only. QSPI multi-wire writes.
    PioOut,
    /// Programmed I/O, receive only. QSPI multi-wire reads.
    PioIn,
    /// Transmit-only DMA.
    DmaSend(&'a dyn DmaChannel<'a>),
    /// Bidirectional DMA.
    DmaSendReceive(&'a dyn DmaChannel<'a>, &'a dyn DmaChannel<'a>),
}

impl fmt::Debug for Strategy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::PioOutIn => "pio",
            Strategy::PioOut => "pio-out",
            Strategy::PioIn => "pio-in",
            Strategy::DmaSend(_) => "dma-tx",
            Strategy::DmaSendReceive(..) => "dma-txrx",
        })
    }
}

impl<'a> Strategy<'a> {
    pub(crate) fn select(
        variant: Variant,
        loopback: bool,
        tx_dma: Option<&'a dyn DmaChannel<'a>>,
        rx_dma: Option<&'a dyn DmaChannel<'a>>,
        xfer: &Transfer<'_>,
    ) -> Strategy<'a> {
        match variant {
            Variant::Legacy | Variant::Rz => Self::select_rspi(tx_dma, rx_dma, xfer),
            Variant::Qspi => Self::select_qspi(loopback, xfer),
        }
    }

    fn select_rspi(
        tx_dma: Option<&'a dyn DmaChannel<'a>>,
        rx_dma: Option<&'a dyn DmaChannel<'a>>,
        xfer: &Transfer<'_>,
    ) -> Strategy<'a> {
        if xfer.len() == 0 || !xfer.has_tx() {
            return Strategy::PioOutIn;
        }
        match (tx_dma, rx_dma, xfer.has_rx()) {
            (Some(tx), Some(rx), true) => Strategy::DmaSendReceive(tx, rx),
            (Some(tx), _, false) => Strategy::DmaSend(tx),
            _ => Strategy::PioOutIn,
        }
    }

    fn select_qspi(loopback: bool, xfer: &Transfer<'_>) -> Strategy<'a> {
        if loopback {
            Strategy::PioOutIn
        } else if xfer.has_tx() && xfer.tx_width() > WireWidth::Single {
            Strategy::PioOut
        } else if xfer.has_rx() && xfer.rx_width() > WireWidth::Single {
            Strategy::PioIn
        } else {
            Strategy::PioOutIn
        }
    }
}
