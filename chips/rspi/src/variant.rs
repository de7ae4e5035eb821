// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Per-variant register programming.
//!
//! The three controllers share a register file but differ in data register
//! width, which optional registers exist, and how the data-length field of a
//! command word is encoded.

use core::cmp;

use tock_registers::LocalRegisterCopy;

use crate::registers::{
    command, length_multiplier, AccessWidth, Register, RegisterWindow, Registers, BIT_RATE,
    CLOCK_DELAY, CONTROL, CONTROL2, NEGATION_DELAY, NEXT_ACCESS_DELAY, PIN_CONTROL,
    QSPI_BUFFER_CONTROL, RZ_BUFFER_CONTROL, SPBFCR, SPCKD, SPCMD, SPCR, SPCR2, SPDCR, SPND,
    SPPCR, SPSR, SSLND, STATUS,
};
use crate::transfer::WireWidth;

/// Number of command slots on Legacy RSPI.
pub const RSPI_NUM_SPCMD: usize = 8;
/// Number of command slots on RZ RSPI.
pub const RSPI_RZ_NUM_SPCMD: usize = 4;

/// Which member of the register family a controller is.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Variant {
    /// RSPI on SH.
    Legacy,
    /// RSPI on RZ/A1H.
    Rz,
    /// QSPI on R-Car Gen2.
    Qspi,
}

/// SPI mode features a variant can provide.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ModeBits {
    pub cpha: bool,
    pub cpol: bool,
    pub loopback: bool,
    pub tx_dual: bool,
    pub tx_quad: bool,
    pub rx_dual: bool,
    pub rx_quad: bool,
}

/// What a variant supports, and what it requires of the caller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub modes: ModeBits,
    /// Every transfer needs a transmit buffer; the controller only clocks
    /// when it shifts data out.
    pub must_tx: bool,
    /// Every transfer needs a receive buffer; received data must be drained.
    pub must_rx: bool,
}

impl Variant {
    /// Look up a variant by device-tree compatible string.
    pub fn from_compatible(compatible: &str) -> Option<Variant> {
        match compatible {
            "renesas,rspi" => Some(Variant::Legacy),
            "renesas,rspi-rz" => Some(Variant::Rz),
            "renesas,qspi" => Some(Variant::Qspi),
            _ => None,
        }
    }

    /// Look up a variant by platform device id.
    pub fn from_platform_id(id: &str) -> Option<Variant> {
        match id {
            "rspi" => Some(Variant::Legacy),
            "rspi-rz" => Some(Variant::Rz),
            "qspi" => Some(Variant::Qspi),
            _ => None,
        }
    }

    pub fn capabilities(self) -> Capabilities {
        let single = ModeBits {
            cpha: true,
            cpol: true,
            loopback: true,
            tx_dual: false,
            tx_quad: false,
            rx_dual: false,
            rx_quad: false,
        };
        match self {
            Variant::Legacy => Capabilities {
                modes: single,
                must_tx: true,
                must_rx: false,
            },
            Variant::Rz => Capabilities {
                modes: single,
                must_tx: true,
                must_rx: true,
            },
            Variant::Qspi => Capabilities {
                modes: ModeBits {
                    tx_dual: true,
                    tx_quad: true,
                    rx_dual: true,
                    rx_quad: true,
                    ..single
                },
                must_tx: true,
                must_rx: true,
            },
        }
    }

    /// Widest wire mode the variant can drive in either direction.
    pub fn max_width(self) -> WireWidth {
        match self {
            Variant::Legacy | Variant::Rz => WireWidth::Single,
            Variant::Qspi => WireWidth::Quad,
        }
    }

    pub fn num_command_slots(self) -> usize {
        match self {
            Variant::Legacy => RSPI_NUM_SPCMD,
            Variant::Rz => RSPI_RZ_NUM_SPCMD,
            Variant::Qspi => crate::sequencer::QSPI_NUM_SPCMD,
        }
    }

    /// Whether `SPCR.TXMD` selects transmit-only mode on this variant.
    pub(crate) fn has_tx_only_mode(self) -> bool {
        self == Variant::Legacy
    }

    /// The FIFO buffer control register, if the variant has FIFOs.
    pub(crate) fn buffer_control(self) -> Option<Register<u8, SPBFCR::Register>> {
        match self {
            Variant::Legacy => None,
            Variant::Rz => Some(RZ_BUFFER_CONTROL),
            Variant::Qspi => Some(QSPI_BUFFER_CONTROL),
        }
    }

    /// Bit-rate register value for the fastest clock not above
    /// `max_speed_hz`, clamped to the register's range.
    ///
    /// The bus clock is `clock_hz / (2 * (n + 1))` on RSPI and
    /// `clock_hz / (2 * n)` on QSPI. A zero `max_speed_hz` selects the
    /// slowest setting.
    pub fn bit_rate_divisor(self, clock_hz: u32, max_speed_hz: u32) -> u8 {
        if max_speed_hz == 0 {
            return u8::MAX;
        }
        let ideal = u64::from(clock_hz).div_ceil(2 * u64::from(max_speed_hz));
        let spbr = match self {
            Variant::Legacy | Variant::Rz => ideal.saturating_sub(1),
            Variant::Qspi => ideal,
        };
        cmp::min(spbr, u64::from(u8::MAX)) as u8
    }

    /// Data-length field of the command word for `access_size` bits.
    fn data_length(self, access_size: u8) -> u16 {
        match self {
            Variant::Legacy | Variant::Rz => u16::from(access_size.wrapping_sub(1)) & 0x0f,
            Variant::Qspi => match access_size {
                8 => 0,
                16 => 1,
                _ => 2,
            },
        }
    }

    /// Program the controller for `access_size`-bit frames.
    ///
    /// Returns the command word with the data length merged in, which the
    /// caller caches for later slot programming.
    pub(crate) fn configure<W: RegisterWindow>(
        self,
        regs: &Registers<W>,
        settings: &ConfigSettings,
        access_size: u8,
    ) -> LocalRegisterCopy<u16, SPCMD::Register> {
        // Output mode, MOSI idle level and (optionally) loopback.
        regs.set(PIN_CONTROL, settings.pin_control.get());

        regs.set(
            BIT_RATE,
            self.bit_rate_divisor(settings.clock_hz, settings.max_speed_hz),
        );

        // No dummy transmission, one frame.
        match self {
            Variant::Legacy => regs.set_data_control(
                SPDCR::TXDMY::CLEAR + SPDCR::SPLW.val(0),
                AccessWidth::HalfWord,
            ),
            Variant::Rz => {
                regs.set_data_control(SPDCR::TXDMY::CLEAR + SPDCR::SPLW::Byte, AccessWidth::Byte)
            }
            Variant::Qspi => regs.set_data_control(
                SPDCR::TXDMY::CLEAR + SPDCR::SPLW.val(0),
                AccessWidth::Byte,
            ),
        }

        regs.write(CLOCK_DELAY, SPCKD::SCKDL.val(0));
        regs.write(NEGATION_DELAY, SSLND::SLNDL.val(0));
        regs.write(NEXT_ACCESS_DELAY, SPND::SPNDL.val(0));

        if self == Variant::Legacy {
            regs.write(
                CONTROL2,
                SPCR2::PTE::CLEAR + SPCR2::SPIE::CLEAR + SPCR2::SPOE::CLEAR + SPCR2::SPPE::CLEAR,
            );
        }

        let mut cmd = settings.command;
        cmd.modify(SPCMD::SPB.val(self.data_length(access_size)));

        match self {
            Variant::Legacy | Variant::Rz => {
                regs.set(command(0), cmd.get());
                // Function enable is left to message preparation.
                regs.write(CONTROL, SPCR::MSTR::SET);
            }
            Variant::Qspi => {
                cmd.modify(SPCMD::SCKDEN::SET + SPCMD::SLNDEN::SET + SPCMD::SPNDEN::SET);
                regs.set(length_multiplier(0), 0);
                self.reset_buffers(regs);
                regs.set(command(0), cmd.get());
                regs.write(CONTROL, SPCR::SPE::SET + SPCR::MSTR::SET);
            }
        }

        cmd
    }

    /// Reset the transmit and receive FIFOs, then return them to normal
    /// operation. No-op on variants without FIFOs.
    pub(crate) fn reset_buffers<W: RegisterWindow>(self, regs: &Registers<W>) {
        if let Some(spbfcr) = self.buffer_control() {
            regs.write(spbfcr, SPBFCR::TXRST::SET + SPBFCR::RXRST::SET);
            regs.write(spbfcr, SPBFCR::TXRST::CLEAR + SPBFCR::RXRST::CLEAR);
        }
    }

    /// Discard stale receive state before a transfer that reads data.
    pub(crate) fn receive_init<W: RegisterWindow>(self, regs: &Registers<W>) {
        let spsr = regs.get(STATUS);
        if spsr.is_set(SPSR::SPRF) {
            // Dummy read.
            let _ = regs.read_data();
        }
        // QSPI has no overrun flag.
        if self != Variant::Qspi && spsr.is_set(SPSR::OVRF) {
            regs.modify(STATUS, SPSR::OVRF::CLEAR);
        }
        self.reset_buffers(regs);
    }
}

/// Cached values the Config Programmer needs.
pub(crate) struct ConfigSettings {
    pub(crate) clock_hz: u32,
    pub(crate) max_speed_hz: u32,
    pub(crate) pin_control: LocalRegisterCopy<u8, SPPCR::Register>,
    pub(crate) command: LocalRegisterCopy<u16, SPCMD::Register>,
}
