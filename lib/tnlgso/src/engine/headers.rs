// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Access to fixed-layout headers within packet bytes.

use core::mem::size_of;
use thiserror::Error;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

/// A header could not be read.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum HdrError {
    #[error("{hdr} header truncated: need {needed} bytes, have {available}")]
    Truncated { hdr: &'static str, needed: usize, available: usize },

    #[error("bad IP version: {vsn}")]
    BadVersion { vsn: u8 },

    #[error("bad IPv4 header length: {hdr_len}")]
    BadHdrLen { hdr_len: u8 },
}

/// A header type which lives in packet bytes as-is.
pub trait RawHeader:
    FromBytes + IntoBytes + Immutable + KnownLayout + Unaligned + Sized
{
    /// The name used when reporting errors.
    const NAME: &'static str;

    const SIZE: usize = size_of::<Self>();

    /// View the header found `off` bytes into `bytes`.
    fn at(bytes: &[u8], off: usize) -> Result<&Self, HdrError> {
        let trunc = HdrError::Truncated {
            hdr: Self::NAME,
            needed: off + Self::SIZE,
            available: bytes.len(),
        };

        let src = bytes.get(off..).ok_or(trunc)?;
        Self::ref_from_prefix(src).map(|(hdr, _)| hdr).map_err(|_| trunc)
    }

    /// Mutably view the header found `off` bytes into `bytes`.
    fn at_mut(bytes: &mut [u8], off: usize) -> Result<&mut Self, HdrError> {
        let trunc = HdrError::Truncated {
            hdr: Self::NAME,
            needed: off + Self::SIZE,
            available: bytes.len(),
        };

        let src = bytes.get_mut(off..).ok_or(trunc)?;
        Self::mut_from_prefix(src).map(|(hdr, _)| hdr).map_err(|_| trunc)
    }
}
