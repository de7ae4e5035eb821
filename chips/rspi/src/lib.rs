// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Transfer engine for the Renesas RSPI family of serial shift-register
//! controllers.
//!
//! Three register-compatible variants are supported:
//!
//! - [`Variant::Legacy`]: RSPI as found on SH parts. 16-bit data register
//!   access, optional transmit-only mode, up to eight command slots.
//! - [`Variant::Rz`]: RSPI on RZ/A1H. Byte access, transmit/receive FIFOs.
//! - [`Variant::Qspi`]: QSPI on R-Car Gen2. Byte access, FIFOs, dual/quad
//!   wire modes and a four-slot command sequencer.
//!
//! The crate owns the register semantics and the transfer protocol only.
//! Platform binding (the register window, the interrupt controller, the
//! clock, DMA channels and a blocking wait primitive) is supplied through
//! the traits in [`platform`] and [`registers::RegisterWindow`].
//!
//! Using [`Rspi`] normally involves:
//!
//! 1. Construct it with [`Rspi::new`] and, if the board has them, attach DMA
//!    channels with [`Rspi::set_dma`], which also makes the controller their
//!    [`platform::DmaClient`]. Route the platform interrupt(s) to
//!    [`Rspi::handle_interrupt`].
//! 2. Call [`Rspi::setup`] for the device about to be addressed.
//! 3. For each message, call [`Rspi::prepare_message`], [`Rspi::transfer`]
//!    for every transfer, then [`Rspi::unprepare_message`]. The
//!    [`Rspi::transfer_message`] helper does exactly that sequence.
//!
//! All blocking points wait at most [`TRANSFER_TIMEOUT`].

#![no_std]

#[cfg(test)]
extern crate std;

pub mod config;
mod dispatch;
mod dma;
mod error;
pub mod platform;
mod pio;
pub mod registers;
mod rspi;
mod sequencer;
pub mod transfer;
mod variant;

#[cfg(test)]
mod sim;

pub use config::{ClockPhase, ClockPolarity, DeviceConfig};
pub use error::ErrorCode;
pub use rspi::{Rspi, TRANSFER_TIMEOUT};
pub use sequencer::{CommandSequence, CommandSlot, QSPI_NUM_SPCMD};
pub use transfer::{Message, Transfer, TransferMode, WireWidth};
pub use variant::{Capabilities, ModeBits, Variant, RSPI_NUM_SPCMD, RSPI_RZ_NUM_SPCMD};
