// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Driver configuration.
//!
//! Two kinds of configuration live here:
//!
//! - [`DeviceConfig`], the per-device settings handed to
//!   [`Rspi::setup`](crate::Rspi::setup) by whoever owns the bus.
//! - [`CONFIG`], a compile-time constant. As in the Tock kernel, boolean
//!   options are read from cargo features in exactly one place, so every code
//!   path stays type-checked and disabled paths fold away as constants.

use crate::transfer::WireWidth;

/// Data structure holding compile-time configuration options.
pub(crate) struct Config {
    /// Whether each transfer is traced through the `log` facade.
    ///
    /// If enabled, the dispatcher logs the chosen data-movement strategy and
    /// length of every transfer at `trace` level.
    pub(crate) trace_transfers: bool,
}

/// The unique `Config` instance. This is the only location in the crate
/// where `#[cfg(x)]`-style feature checks are permitted.
pub(crate) const CONFIG: Config = Config {
    trace_transfers: cfg!(feature = "trace_transfers"),
};

/// Clock polarity (CPOL): whether the clock is high or low when idle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ClockPolarity {
    /// The clock is low when the bus is not active. This is CPOL = 0.
    #[default]
    IdleLow,
    /// The clock is high when the bus is not active. This is CPOL = 1.
    IdleHigh,
}

/// Clock phase (CPHA): whether data is sampled on the leading or trailing
/// clock edge.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ClockPhase {
    /// Sample on the leading clock edge. This is CPHA = 0.
    #[default]
    SampleLeading,
    /// Sample on the trailing clock edge. This is CPHA = 1.
    SampleTrailing,
}

/// Settings for one peripheral device on the bus.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Highest clock rate the device tolerates. The divisor is rounded so the
    /// bus never runs faster than this.
    pub max_speed_hz: u32,
    pub polarity: ClockPolarity,
    pub phase: ClockPhase,
    /// Route the transmit shift register back into the receiver.
    pub loopback: bool,
    /// Widest wire mode the device accepts when transmitting.
    pub tx_width: WireWidth,
    /// Widest wire mode the device accepts when receiving.
    pub rx_width: WireWidth,
}

impl DeviceConfig {
    /// A mode-0, single-wire device clocked at up to `max_speed_hz`.
    pub const fn new(max_speed_hz: u32) -> Self {
        DeviceConfig {
            max_speed_hz,
            polarity: ClockPolarity::IdleLow,
            phase: ClockPhase::SampleLeading,
            loopback: false,
            tx_width: WireWidth::Single,
            rx_width: WireWidth::Single,
        }
    }

    pub const fn with_clock(mut self, polarity: ClockPolarity, phase: ClockPhase) -> Self {
        self.polarity = polarity;
        self.phase = phase;
        self
    }

    pub const fn with_loopback(mut self, loopback: bool) -> Self {
        self.loopback = loopback;
        self
    }

    pub const fn with_widths(mut self, tx_width: WireWidth, rx_width: WireWidth) -> Self {
        self.tx_width = tx_width;
        self.rx_width = rx_width;
        self
    }

    /// Whether the device uses more than one data line in either direction.
    ///
    /// Messages for such devices go through the QSPI command sequencer.
    pub fn is_multi_io(&self) -> bool {
        self.tx_width != WireWidth::Single || self.rx_width != WireWidth::Single
    }
}
