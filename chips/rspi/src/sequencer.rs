// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! QSPI command sequencer.
//!
//! A QSPI message may mix single, dual and quad wire transfers. The hardware
//! runs through up to [`QSPI_NUM_SPCMD`] command slots per message, each with
//! its own mode bits and a byte count. Consecutive transfers in the same mode
//! share a slot.

use log::error;
use tock_registers::LocalRegisterCopy;

use crate::error::ErrorCode;
use crate::registers::{
    command, length_multiplier, RegisterWindow, Registers, SEQUENCE_CONTROL, SPCMD, SPSCR,
};
use crate::transfer::{Transfer, TransferMode};

/// Number of command slots on QSPI.
pub const QSPI_NUM_SPCMD: usize = 4;

/// One command slot: the wire mode and how many bytes run in it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CommandSlot {
    pub mode: TransferMode,
    pub len: u32,
}

/// The command slots a message needs, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSequence {
    slots: [CommandSlot; QSPI_NUM_SPCMD],
    used: usize,
}

impl CommandSequence {
    /// Group `transfers` into runs of equal mode.
    ///
    /// Fails with [`ErrorCode::ConfigurationError`] if the message needs more
    /// runs than there are command slots.
    pub fn plan(transfers: &[Transfer<'_>]) -> Result<CommandSequence, ErrorCode> {
        let mut seq = CommandSequence {
            slots: [CommandSlot {
                mode: TransferMode::Single,
                len: 0,
            }; QSPI_NUM_SPCMD],
            used: 0,
        };

        for xfer in transfers {
            let mode = xfer.mode();
            let len = u32::try_from(xfer.len()).unwrap_or(u32::MAX);

            if let Some(last) = seq.slots[..seq.used].last_mut() {
                if last.mode == mode {
                    last.len = last.len.saturating_add(len);
                    continue;
                }
            }

            if seq.used >= QSPI_NUM_SPCMD {
                error!("qspi: too many different transfer modes");
                return Err(ErrorCode::ConfigurationError);
            }
            seq.slots[seq.used] = CommandSlot { mode, len };
            seq.used += 1;
        }

        Ok(seq)
    }

    pub fn slots(&self) -> &[CommandSlot] {
        &self.slots[..self.used]
    }

    /// Write every slot's command word and byte count, then the sequence
    /// length. An empty plan writes nothing.
    pub(crate) fn program<W: RegisterWindow>(
        &self,
        regs: &Registers<W>,
        base: LocalRegisterCopy<u16, SPCMD::Register>,
    ) {
        for (i, slot) in self.slots().iter().enumerate() {
            let mut word = base;
            word.modify(slot.mode.command_bits());
            regs.set(command(i), word.get());
            regs.set(length_multiplier(i), slot.len);
        }
        if self.used > 0 {
            regs.write(SEQUENCE_CONTROL, SPSCR::SPSLN.val((self.used - 1) as u8));
        }
    }
}
