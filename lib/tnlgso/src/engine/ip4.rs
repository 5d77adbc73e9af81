// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! IPv4 headers.

use super::checksum::Checksum;
use super::checksum::HeaderChecksum;
use super::headers::HdrError;
use super::headers::RawHeader;
use crate::ddi::pkt::Pkt;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

pub const IPV4_HDR_LEN: usize = 20;
pub const IPV4_HDR_LEN_MASK: u8 = 0x0F;
pub const IPV4_HDR_VER_SHIFT: u8 = 4;
pub const IPV4_VERSION: u8 = 4;

pub const IP_PROTO_TCP: u8 = 6;
pub const IP_PROTO_UDP: u8 = 17;

/// Note: For now we keep this unaligned to be safe.
#[repr(C)]
#[derive(
    Clone, Debug, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned,
)]
pub struct Ipv4HdrRaw {
    pub ver_hdr_len: u8,
    pub dscp_ecn: u8,
    pub total_len: [u8; 2],
    pub ident: [u8; 2],
    pub frag_and_flags: [u8; 2],
    pub ttl: u8,
    pub proto: u8,
    pub csum: [u8; 2],
    pub src: [u8; 4],
    pub dst: [u8; 4],
}

impl RawHeader for Ipv4HdrRaw {
    const NAME: &'static str = "ipv4";
}

const _: () = assert!(Ipv4HdrRaw::SIZE == IPV4_HDR_LEN);

impl Default for Ipv4HdrRaw {
    fn default() -> Self {
        Ipv4HdrRaw {
            ver_hdr_len: 0x45,
            dscp_ecn: 0x0,
            total_len: [0x0; 2],
            ident: [0x0; 2],
            frag_and_flags: [0x40, 0x0],
            ttl: 64,
            proto: 0xFF,
            csum: [0x0; 2],
            src: [0x0; 4],
            dst: [0x0; 4],
        }
    }
}

impl Ipv4HdrRaw {
    /// Return the reported IP version field from the packet.
    #[inline]
    pub fn version(&self) -> u8 {
        self.ver_hdr_len >> IPV4_HDR_VER_SHIFT
    }

    /// Return the header length, in bytes.
    #[inline]
    pub fn hdr_len(&self) -> usize {
        usize::from(self.ver_hdr_len & IPV4_HDR_LEN_MASK) * 4
    }

    #[inline]
    pub fn ident(&self) -> u16 {
        u16::from_be_bytes(self.ident)
    }

    #[inline]
    pub fn set_ident(&mut self, ident: u16) {
        self.ident = ident.to_be_bytes();
    }

    /// Return the value of the `Total Length` field.
    #[inline]
    pub fn total_len(&self) -> u16 {
        u16::from_be_bytes(self.total_len)
    }

    /// Set the `Total Length` field.
    #[inline]
    pub fn set_total_len(&mut self, len: u16) {
        self.total_len = len.to_be_bytes();
    }

    #[inline]
    pub fn proto(&self) -> u8 {
        self.proto
    }

    #[inline]
    pub fn csum(&self) -> [u8; 2] {
        self.csum
    }

    /// Make sure this is a header we know how to walk: version 4 and
    /// a header length no shorter than the fixed header.
    pub fn validate(&self) -> Result<(), HdrError> {
        match self.version() {
            IPV4_VERSION => {}
            vsn => return Err(HdrError::BadVersion { vsn }),
        }

        if self.hdr_len() < IPV4_HDR_LEN {
            return Err(HdrError::BadHdrLen { hdr_len: self.ver_hdr_len });
        }

        Ok(())
    }
}

/// The IPv4 header at the packet's network header marker.
pub fn ip4_hdr(pkt: &Pkt) -> Result<&Ipv4HdrRaw, HdrError> {
    let ip = Ipv4HdrRaw::at(pkt.network_bytes(), 0)?;
    ip.validate()?;
    Ok(ip)
}

/// The IPv4 header at the packet's network header marker.
pub fn ip4_hdr_mut(pkt: &mut Pkt) -> Result<&mut Ipv4HdrRaw, HdrError> {
    let ip = Ipv4HdrRaw::at_mut(pkt.network_bytes_mut(), 0)?;
    ip.validate()?;
    Ok(ip)
}

/// Recompute the header checksum of the IPv4 header at the packet's
/// network header marker, options included.
pub fn ip4_fill_csum(pkt: &mut Pkt) -> Result<(), HdrError> {
    let hdr_len = ip4_hdr(pkt)?.hdr_len();
    let bytes = pkt.network_bytes_mut();
    if bytes.len() < hdr_len {
        return Err(HdrError::Truncated {
            hdr: Ipv4HdrRaw::NAME,
            needed: hdr_len,
            available: bytes.len(),
        });
    }

    let hdr = &mut bytes[..hdr_len];
    hdr[10..12].copy_from_slice(&[0, 0]);
    let csum = HeaderChecksum::from(Checksum::compute(hdr));
    hdr[10..12].copy_from_slice(&csum.bytes());
    Ok(())
}
