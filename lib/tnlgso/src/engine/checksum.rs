// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Types for calculating the internet checksum, and for finishing a
//! partially computed checksum in software.
//!
//! # Checksums and Endianness
//!
//! The internet checksum is a sequence of two bytes, not a logical
//! `u16`. To compute it we treat each pair of bytes as a native 16-bit
//! integer, which is why every conversion in here uses
//! `{to,from}_ne_bytes()`. As the bytes being summed are all in
//! network order, storing the result back into memory natively also
//! stores it in network order. See RFC 1071 §1.B.
//!
//! # Relevant RFCs
//!
//! * 1071 Computing the Internet Checksum
//!
//! * 1624 Computation of the Internet Checksum via Incremental Update

use crate::ddi::pkt::CsumState;
use crate::ddi::pkt::Pkt;
use thiserror::Error;

/// The checksum value, as it is contained in a network header.
///
/// This holds the bytes with one's complement applied.
pub struct HeaderChecksum {
    inner: [u8; 2],
}

impl HeaderChecksum {
    /// Return the bytes of this header checksum.
    pub fn bytes(&self) -> [u8; 2] {
        self.inner
    }

    /// Wrap the checksum bytes in a header.
    pub fn wrap(hc: [u8; 2]) -> Self {
        Self { inner: hc }
    }
}

impl From<Checksum> for HeaderChecksum {
    /// Finalize the rolling checksum and put it into header form by
    /// performing one's complement.
    fn from(mut csum: Checksum) -> HeaderChecksum {
        Self { inner: (!csum.finalize()).to_ne_bytes() }
    }
}

/// A rolling one's complement checksum calculation.
///
/// Carries are delayed until the finalized sum is needed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Checksum {
    inner: u32,
}

impl Checksum {
    /// Creates a new checksum counter.
    pub fn new() -> Self {
        Self::from(0)
    }

    /// Update the sum by adding the contents of `bytes`.
    ///
    /// An odd trailing byte is summed as if followed by a zero byte,
    /// so only the last slice added may have an odd length.
    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.inner = csum_add(self.inner, bytes);
    }

    /// Create a new rolling checksum, starting with the passed in
    /// `bytes`.
    pub fn compute(bytes: &[u8]) -> Self {
        Self { inner: csum_add(0, bytes) }
    }

    /// Finalize the sum by adding up all the accumulated carries and
    /// returning the resulting value as a `u16`.
    pub fn finalize(&mut self) -> u16 {
        while (self.inner >> 16) != 0 {
            self.inner = (self.inner >> 16) + (self.inner & 0xFFFF);
        }

        (self.inner & 0xFFFF) as u16
    }
}

impl From<HeaderChecksum> for Checksum {
    // Convert a header's checksum bytes into a rolling checksum.
    fn from(hc: HeaderChecksum) -> Self {
        Self { inner: (!u16::from_ne_bytes(hc.bytes())) as u32 }
    }
}

impl From<u32> for Checksum {
    fn from(csum: u32) -> Self {
        Self { inner: csum }
    }
}

fn csum_add(mut csum: u32, bytes: &[u8]) -> u32 {
    let mut words = bytes.chunks_exact(2);

    for w in &mut words {
        csum = csum.wrapping_add(u16::from_ne_bytes([w[0], w[1]]) as u32);
        // Fold early so a maximally sized packet cannot overflow.
        if csum & 0x8000_0000 != 0 {
            csum = (csum >> 16) + (csum & 0xFFFF);
        }
    }

    if let [last] = words.remainder() {
        csum += u16::from_ne_bytes([*last, 0]) as u32;
    }

    csum
}

#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum CsumError {
    /// The checksum start or the checksum field lies outside the
    /// packet data.
    #[error(
        "checksum start {start} + stuff {stuff} outside of {len} byte packet"
    )]
    BadOffsets { start: isize, stuff: u16, len: usize },

    /// Oversized packets have their checksums handled per segment.
    #[error("cannot finish checksum of a GSO packet")]
    Gso,
}

/// Finishes a partially computed checksum so no one downstream has
/// to.
pub trait CsumResolver {
    /// Finish the checksum of `pkt` in place. Packets whose checksum
    /// is not partially computed are left alone.
    fn finish(&self, pkt: &mut Pkt) -> Result<(), CsumError>;
}

/// Finish checksums in software.
#[derive(Clone, Copy, Debug, Default)]
pub struct SwCsum;

impl CsumResolver for SwCsum {
    fn finish(&self, pkt: &mut Pkt) -> Result<(), CsumError> {
        let CsumState::Partial { stuff, .. } = pkt.csum() else {
            return Ok(());
        };

        if pkt.is_gso() {
            return Err(CsumError::Gso);
        }

        let len = pkt.len();
        let bad = CsumError::BadOffsets {
            start: pkt.csum_start_offset().unwrap_or_default(),
            stuff,
            len,
        };
        let start = pkt
            .csum_start_offset()
            .and_then(|s| usize::try_from(s).ok())
            .ok_or(bad)?;
        let field = start + usize::from(stuff);
        if field + 2 > len {
            return Err(bad);
        }

        let csum = HeaderChecksum::from(Checksum::compute(&pkt[start..]));
        pkt[field..field + 2].copy_from_slice(&csum.bytes());
        pkt.set_csum(CsumState::None);
        Ok(())
    }
}
