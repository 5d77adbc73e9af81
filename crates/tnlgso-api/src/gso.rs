// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Segmentation offload types shared by producers of oversized
//! packets and the segmentation path.

use bitflags::bitflags;
use serde::Deserialize;
use serde::Serialize;

bitflags! {
/// Offload features a segmentation engine may assume of the device
/// the segments are destined for. An empty set forces the engine to
/// do all of the work in software.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct OffloadFlags: u32 {
    /// Scatter/gather IO.
    const SG = 1 << 0;
    /// The device computes the IPv4 header checksum.
    const IP_CSUM = 1 << 1;
    /// The device computes any L4 checksum given start/stuff offsets.
    const HW_CSUM = 1 << 2;
    /// The device performs TCPv4 segmentation.
    const TSO = 1 << 3;
    /// The device performs TCPv6 segmentation.
    const TSO6 = 1 << 4;
    /// The device segments GRE encapsulated traffic.
    const GSO_GRE = 1 << 5;
    /// The device segments UDP tunnel encapsulated traffic.
    const GSO_UDP_TUNNEL = 1 << 6;
}
}

bitflags! {
/// The kind of segmentation an oversized packet requires.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct GsoType: u16 {
    const TCPV4 = 1 << 0;
    const UDP = 1 << 1;
    /// The packet came from an untrusted source and its descriptor
    /// must be verified before use.
    const DODGY = 1 << 2;
    const TCPV6 = 1 << 3;
    const GRE = 1 << 4;
    const IPXIP4 = 1 << 5;
    const UDP_TUNNEL = 1 << 6;

    const TUNNEL_FLAGS = Self::GRE.bits() | Self::IPXIP4.bits() |
        Self::UDP_TUNNEL.bits();
}
}

/// The capabilities of the segmentation engine in this environment.
///
/// This is resolved once, when the datapath is brought up, and handed
/// to the segmentation path. Nothing below it inspects the environment.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct GsoCaps {
    /// The engine honors the transmit-path hint. When `false` the
    /// engine only has a transmit-path entry point, and every request
    /// is made as a transmit-path request.
    pub tx_path_hint: bool,

    /// The engine looks through VLAN tags and MPLS markers on its
    /// own. When `false` the declared protocol is resolved before the
    /// engine is called and restored on every segment afterwards.
    pub resolves_tags: bool,

    /// The offload features offered to callers that do not force
    /// software segmentation.
    pub features: OffloadFlags,
}

impl Default for GsoCaps {
    fn default() -> Self {
        Self {
            tx_path_hint: true,
            resolves_tags: true,
            features: OffloadFlags::empty(),
        }
    }
}

impl GsoCaps {
    /// The value of the transmit-path flag to actually pass to the
    /// engine for a request made with `tx_path`.
    pub fn effective_tx_path(&self, tx_path: bool) -> bool {
        if self.tx_path_hint { tx_path } else { true }
    }
}
