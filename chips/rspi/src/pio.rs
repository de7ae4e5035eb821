// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Programmed I/O: the CPU moves every data unit through the data register.

use log::error;

use crate::error::ErrorCode;
use crate::registers::{RegisterWindow, CONTROL, SPCR};
use crate::rspi::Rspi;
use crate::variant::Variant;

impl<'a, W: RegisterWindow> Rspi<'a, W> {
    fn data_out(&self, data: u8) -> Result<(), ErrorCode> {
        self.wait_for_tx_empty().map_err(|e| {
            error!("rspi: transmit timeout");
            e
        })?;
        self.registers.write_data(u16::from(data));
        Ok(())
    }

    fn data_in(&self) -> Result<u8, ErrorCode> {
        self.wait_for_rx_full().map_err(|e| {
            error!("rspi: receive timeout");
            e
        })?;
        Ok(self.registers.read_data() as u8)
    }

    /// Shift out `tx` and/or fill `rx`, unit by unit. When both are present
    /// they have the same length.
    fn pio_transfer(&self, tx: Option<&[u8]>, mut rx: Option<&mut [u8]>) -> Result<(), ErrorCode> {
        let count = match (tx, rx.as_deref()) {
            (Some(tx), _) => tx.len(),
            (None, Some(rx)) => rx.len(),
            (None, None) => 0,
        };
        for i in 0..count {
            if let Some(tx) = tx {
                self.data_out(tx[i])?;
            }
            if let Some(rx) = rx.as_deref_mut() {
                rx[i] = self.data_in()?;
            }
        }
        Ok(())
    }

    /// Full-duplex or transmit-only PIO, finishing once the last unit has
    /// left the transmit buffer.
    pub(crate) fn transfer_out_in(
        &self,
        tx: Option<&[u8]>,
        rx: Option<&mut [u8]>,
    ) -> Result<(), ErrorCode> {
        match self.variant {
            Variant::Legacy => {
                let mut spcr = self.registers.get(CONTROL);
                if rx.is_some() {
                    self.variant.receive_init(&self.registers);
                    spcr.modify(SPCR::TXMD::CLEAR);
                } else {
                    spcr.modify(SPCR::TXMD::SET);
                }
                self.registers.set(CONTROL, spcr.get());
            }
            Variant::Rz | Variant::Qspi => self.variant.receive_init(&self.registers),
        }

        self.pio_transfer(tx, rx)?;
        self.wait_for_tx_empty()
    }

    /// QSPI multi-wire write.
    pub(crate) fn transfer_out(&self, tx: Option<&[u8]>) -> Result<(), ErrorCode> {
        self.pio_transfer(tx, None)?;
        self.wait_for_tx_empty()
    }

    /// QSPI multi-wire read. Completes as soon as the last unit is read.
    pub(crate) fn transfer_in(&self, rx: Option<&mut [u8]>) -> Result<(), ErrorCode> {
        self.pio_transfer(None, rx)
    }
}
