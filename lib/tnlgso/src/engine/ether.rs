// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Ethernet framing: header lengths and VLAN tags.

use super::headers::RawHeader;
pub use crate::api::EtherType;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

pub const ETHER_HDR_LEN: usize = 14;
pub const VLAN_HDR_LEN: usize = 4;

/// An 802.1Q/802.1ad tag, as it follows the tag protocol identifier.
#[repr(C)]
#[derive(
    Clone, Debug, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned,
)]
pub struct VlanHdrRaw {
    pub tci: [u8; 2],
    pub ether_type: [u8; 2],
}

impl RawHeader for VlanHdrRaw {
    const NAME: &'static str = "vlan";
}

impl VlanHdrRaw {
    /// The protocol of whatever follows this tag.
    pub fn ether_type(&self) -> EtherType {
        EtherType::from(u16::from_be_bytes(self.ether_type))
    }
}

const _: () = assert!(VlanHdrRaw::SIZE == VLAN_HDR_LEN);
