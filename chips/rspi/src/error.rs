// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Standard error enum for controller operations.

use core::fmt;

/// Errors reported by [`Rspi`](crate::Rspi).
///
/// None of these are retried internally. Each one propagates unchanged to the
/// caller of `transfer`, `prepare_message` or `setup`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum ErrorCode {
    /// A status flag or DMA completion did not arrive within the fixed
    /// deadline.
    Timeout = 0,
    /// A buffer could not be mapped for DMA.
    ResourceUnavailable = 1,
    /// The DMA engine could not prepare a descriptor.
    IoError = 2,
    /// A message needs more distinct wire modes than there are command slots.
    ConfigurationError = 3,
    /// The device asks for a mode the controller variant cannot drive.
    NoSupport = 4,
}

impl From<ErrorCode> for usize {
    fn from(err: ErrorCode) -> usize {
        err as usize
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ErrorCode::Timeout => "timed out",
            ErrorCode::ResourceUnavailable => "DMA mapping failed",
            ErrorCode::IoError => "DMA descriptor preparation failed",
            ErrorCode::ConfigurationError => "too many different transfer modes",
            ErrorCode::NoSupport => "mode not supported by this controller",
        };
        f.write_str(msg)
    }
}
