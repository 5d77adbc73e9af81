// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Resolution of a packet's real network protocol.
//!
//! A packet's declared protocol names whatever follows its Ethernet
//! header, which may be a VLAN tag (or a stack of them) rather than
//! the network header. Segmentation engines dispatch on the declared
//! protocol, so before handing a packet to one we look through the
//! tags to find what is really there.

use super::ether::ETHER_HDR_LEN;
use super::ether::EtherType;
use super::ether::VLAN_HDR_LEN;
use super::ether::VlanHdrRaw;
use super::headers::HdrError;
use super::headers::RawHeader;
use crate::ddi::pkt::Pkt;

/// Return the protocol of the first header in `pkt` that is neither a
/// VLAN tag nor an MPLS marker.
///
/// The packet's data must start at its Ethernet header. The packet is
/// only read, so calling this twice gives the same answer twice.
///
/// # Errors
///
/// [`HdrError::Truncated`] if a tag is declared but the packet ends
/// before the whole tag. Callers must not try to segment such a
/// packet; its protocol is undefined.
pub fn network_protocol(pkt: &Pkt) -> Result<EtherType, HdrError> {
    network_depth(pkt).map(|(proto, _)| proto)
}

/// Like [`network_protocol`], but also return the number of bytes of
/// VLAN tags between the Ethernet header and the network header.
pub fn network_depth(pkt: &Pkt) -> Result<(EtherType, usize), HdrError> {
    let mut proto = pkt.protocol();
    let inner = pkt.inner_protocol();

    // The label stack was already unwrapped; the inner protocol hint
    // is all that is left of what it carried.
    if proto.is_mpls() && !inner.is_mpls() {
        proto = inner;
    }

    let mut depth = ETHER_HDR_LEN;
    while proto.is_vlan() {
        proto = VlanHdrRaw::at(pkt, depth)?.ether_type();
        depth += VLAN_HDR_LEN;
    }

    Ok((proto, depth - ETHER_HDR_LEN))
}

#[cfg(test)]
mod test {
    use super::*;
    use alloc::vec::Vec;

    #[rustfmt::skip]
    const ETHER: [u8; 12] = [
        0xA8, 0x40, 0x25, 0xFF, 0x00, 0x01,
        0xA8, 0x40, 0x25, 0x00, 0x00, 0x63,
    ];

    // Build a frame with the given tags (TPIDs), each followed by the
    // next tag or the terminal protocol, and a bit of payload.
    fn frame(tags: &[u16], terminal: u16) -> Pkt {
        let mut bytes = Vec::from(ETHER);
        let first = tags.first().copied().unwrap_or(terminal);
        bytes.extend_from_slice(&first.to_be_bytes());

        for (i, _) in tags.iter().enumerate() {
            let next = tags.get(i + 1).copied().unwrap_or(terminal);
            bytes.extend_from_slice(&(100 + i as u16).to_be_bytes());
            bytes.extend_from_slice(&next.to_be_bytes());
        }

        bytes.extend_from_slice(&[0x45, 0x00, 0x00, 0x14]);
        let mut pkt = Pkt::copy(bytes);
        pkt.set_protocol(EtherType::from(first));
        pkt
    }

    #[test]
    fn untagged() {
        let pkt = frame(&[], 0x0800);
        assert_eq!(network_depth(&pkt), Ok((EtherType::Ipv4, 0)));
    }

    #[test]
    fn single_tag() {
        let pkt = frame(&[0x8100], 0x86DD);
        assert_eq!(network_depth(&pkt), Ok((EtherType::Ipv6, VLAN_HDR_LEN)));
    }

    #[test]
    fn stacked_tags() {
        let pkt = frame(&[0x88A8, 0x8100, 0x8100], 0x0800);
        assert_eq!(
            network_depth(&pkt),
            Ok((EtherType::Ipv4, 3 * VLAN_HDR_LEN))
        );
    }

    #[test]
    fn unknown_terminal_is_returned_as_is() {
        let pkt = frame(&[0x8100], 0x1234);
        assert_eq!(network_protocol(&pkt), Ok(EtherType::Unknown(0x1234)));
    }

    #[test]
    fn mpls_uses_inner_protocol() {
        let mut pkt = frame(&[], 0x8847);
        pkt.set_inner_protocol(EtherType::Ipv4);
        assert_eq!(network_protocol(&pkt), Ok(EtherType::Ipv4));

        // The hint itself may name a tag, which is then walked.
        let mut pkt = frame(&[0x8100], 0x0800);
        pkt.set_protocol(EtherType::MplsMcast);
        pkt.set_inner_protocol(EtherType::Vlan);
        assert_eq!(network_depth(&pkt), Ok((EtherType::Ipv4, VLAN_HDR_LEN)));
    }

    #[test]
    fn mpls_in_mpls_stays_mpls() {
        let mut pkt = frame(&[], 0x8847);
        pkt.set_inner_protocol(EtherType::MplsMcast);
        assert_eq!(network_protocol(&pkt), Ok(EtherType::Mpls));
    }

    #[test]
    fn truncated_tag() {
        let mut pkt = frame(&[0x8100, 0x8100], 0x0800);
        // Keep the first tag and half of the second.
        pkt.trim(ETHER_HDR_LEN + VLAN_HDR_LEN + 2);
        assert_eq!(
            network_protocol(&pkt),
            Err(HdrError::Truncated {
                hdr: "vlan",
                needed: ETHER_HDR_LEN + 2 * VLAN_HDR_LEN,
                available: ETHER_HDR_LEN + VLAN_HDR_LEN + 2,
            })
        );

        // A tag declared on a packet with no room for any of it.
        let mut pkt = Pkt::copy(&ETHER[..6]);
        pkt.set_protocol(EtherType::QinQ);
        assert!(network_protocol(&pkt).is_err());
    }

    #[test]
    fn idempotent() {
        let pkt = frame(&[0x88A8, 0x8100], 0x86DD);
        let before = pkt.to_vec();
        let first = network_protocol(&pkt);
        let second = network_protocol(&pkt);
        assert_eq!(first, second);
        assert_eq!(first, Ok(EtherType::Ipv6));
        assert_eq!(&pkt[..], &before[..]);
        assert_eq!(pkt.protocol(), EtherType::QinQ);
    }
}
