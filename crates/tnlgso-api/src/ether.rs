// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Layer 2 protocol identifiers.

use core::fmt;
use core::fmt::Debug;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

pub const ETHER_TYPE_ETHER: u16 = 0x6558;
pub const ETHER_TYPE_IPV4: u16 = 0x0800;
pub const ETHER_TYPE_ARP: u16 = 0x0806;
pub const ETHER_TYPE_VLAN: u16 = 0x8100;
pub const ETHER_TYPE_IPV6: u16 = 0x86DD;
pub const ETHER_TYPE_MPLS_UC: u16 = 0x8847;
pub const ETHER_TYPE_MPLS_MC: u16 = 0x8848;
pub const ETHER_TYPE_QINQ: u16 = 0x88A8;

/// The protocol identifier carried in an Ethernet header, a VLAN tag,
/// or a packet's declared protocol.
///
/// The value `0` is never a valid protocol and is used to mean
/// "undefined", e.g. when a tag chain could not be walked.
#[derive(
    Clone, Copy, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub enum EtherType {
    Ether,
    Ipv4,
    Arp,
    Vlan,
    Ipv6,
    Mpls,
    MplsMcast,
    QinQ,
    Unknown(u16),
}

impl EtherType {
    pub const UNDEFINED: Self = Self::Unknown(0);

    /// Is this one of the two VLAN tag protocols (802.1Q, 802.1ad)?
    pub fn is_vlan(self) -> bool {
        matches!(self, Self::Vlan | Self::QinQ)
    }

    /// Is this one of the MPLS-over-Ethernet protocols?
    pub fn is_mpls(self) -> bool {
        matches!(self, Self::Mpls | Self::MplsMcast)
    }
}

impl From<u16> for EtherType {
    fn from(raw: u16) -> Self {
        match raw {
            ETHER_TYPE_ETHER => Self::Ether,
            ETHER_TYPE_IPV4 => Self::Ipv4,
            ETHER_TYPE_ARP => Self::Arp,
            ETHER_TYPE_VLAN => Self::Vlan,
            ETHER_TYPE_IPV6 => Self::Ipv6,
            ETHER_TYPE_MPLS_UC => Self::Mpls,
            ETHER_TYPE_MPLS_MC => Self::MplsMcast,
            ETHER_TYPE_QINQ => Self::QinQ,
            _ => Self::Unknown(raw),
        }
    }
}

impl From<EtherType> for u16 {
    fn from(et: EtherType) -> Self {
        use EtherType::*;

        match et {
            Ether => ETHER_TYPE_ETHER,
            Ipv4 => ETHER_TYPE_IPV4,
            Arp => ETHER_TYPE_ARP,
            Vlan => ETHER_TYPE_VLAN,
            Ipv6 => ETHER_TYPE_IPV6,
            Mpls => ETHER_TYPE_MPLS_UC,
            MplsMcast => ETHER_TYPE_MPLS_MC,
            QinQ => ETHER_TYPE_QINQ,
            Unknown(val) => val,
        }
    }
}

impl Default for EtherType {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

impl Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:04X}", u16::from(*self))
    }
}

/// We are never really interested in internal representation of
/// [`EtherType`].
impl Debug for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self}")
    }
}
