// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Tunnel-aware segmentation.
//!
//! A segmentation engine knows how to split an oversized IP packet,
//! but not one wrapped in a tunnel. Given a packet laid out as
//!
//! ```text
//! +---------+---------------+-----------+----------+---------------+
//! | outer   | tunnel header | inner L2  | inner L3 | inner L4 and  |
//! | IPv4    | (UDP, GRE...) | (+ tags)  |          | payload       |
//! +---------+---------------+-----------+----------+---------------+
//! ^ data    ^               ^ inner mac ^ inner network
//! ```
//!
//! the [`Segmenter`] copies everything up to the inner network header
//! aside as an [`OuterHdr`], lets the engine split the inner L3
//! packet, and then puts an identical copy of the outer header in
//! front of every segment.

use super::ether::EtherType;
use super::headers::HdrError;
use super::ip4::IPV4_HDR_LEN;
use super::resolve::network_protocol;
use crate::api::GsoCaps;
use crate::api::OffloadFlags;
use crate::ddi::pkt::Pkt;
use crate::ddi::pkt::PktChain;
use crate::ddi::pkt::SegAdjustError;
use alloc::boxed::Box;
use thiserror::Error;

/// An engine failed to segment a packet.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum EngineError {
    #[error("no segmentation handler for protocol {0}")]
    Unsupported(EtherType),

    #[error("malformed packet: {0}")]
    Malformed(&'static str),

    #[error("segmentation failed: errno {0}")]
    Errno(i32),
}

/// A generic segmentation engine.
///
/// The engine knows nothing about tunnels. It dispatches purely on
/// the packet's declared protocol, and expects the packet's data to
/// start at the network header it is to split.
pub trait SegmentEngine {
    /// Split `pkt` according to its GSO descriptor.
    ///
    /// `features` are the offloads the destination device provides;
    /// an empty set means everything must be done in software.
    /// `tx_path` is true when the segments are headed straight for a
    /// device (which may pick up some of the work), and false when they
    /// are to be processed locally first.
    ///
    /// An empty chain is a valid answer, but one the caller will
    /// treat as a failure.
    fn segment(
        &self,
        pkt: &Pkt,
        features: OffloadFlags,
        tx_path: bool,
    ) -> Result<PktChain, EngineError>;
}

/// A per-segment fixup of the outer encapsulation.
///
/// This is the tunnel's chance to patch outer header fields which
/// depend on the final size of each segment, e.g. a UDP length or a
/// GRE checksum.
pub trait SegmentFixup {
    fn fix(&self, seg: &mut Pkt);
}

impl<F> SegmentFixup for F
where
    F: Fn(&mut Pkt),
{
    fn fix(&self, seg: &mut Pkt) {
        self(seg)
    }
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum SegmentError {
    #[error(
        "bad inner header offsets: mac {inner_mac}, network {inner_net}, \
         packet length {len}"
    )]
    BadOffsets { inner_mac: isize, inner_net: isize, len: usize },

    #[error("outer header of {len} bytes cannot hold an IPv4 header")]
    OuterTooShort { len: usize },

    #[error("inner protocol: {0}")]
    Resolve(#[from] HdrError),

    #[error("engine: {0}")]
    Engine(#[from] EngineError),

    #[error("engine produced no segments")]
    NoSegments,

    #[error("header adjust: {0}")]
    Adjust(#[from] SegAdjustError),
}

/// A snapshot of a tunneled packet's outer encapsulation: the outer
/// IPv4 header, the tunnel header, and the inner L2 header, in that
/// order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OuterHdr {
    bytes: Box<[u8]>,
    inner_mac_off: usize,
}

impl OuterHdr {
    /// Copy out the encapsulation of `pkt`, from the start of data up
    /// to its inner network header.
    pub fn capture(pkt: &Pkt) -> Result<Self, SegmentError> {
        let bad = SegmentError::BadOffsets {
            inner_mac: pkt.inner_mac_offset(),
            inner_net: pkt.inner_network_offset(),
            len: pkt.len(),
        };

        let (Ok(inner_mac_off), Ok(hlen)) = (
            usize::try_from(pkt.inner_mac_offset()),
            usize::try_from(pkt.inner_network_offset()),
        ) else {
            return Err(bad);
        };

        if inner_mac_off > hlen || hlen > pkt.len() {
            return Err(bad);
        }

        if hlen < IPV4_HDR_LEN {
            return Err(SegmentError::OuterTooShort { len: hlen });
        }

        Ok(Self { bytes: Box::from(&pkt[..hlen]), inner_mac_off })
    }

    /// The whole encapsulation.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The length of the whole encapsulation.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Distance from the outer IPv4 header to the inner L2 header.
    pub fn inner_mac_offset(&self) -> usize {
        self.inner_mac_off
    }

    /// Put this encapsulation in front of `seg`, whose data starts at
    /// its (inner) network header, and describe the result as a fresh
    /// tunnel-terminated packet.
    ///
    /// The outer IPv4 header is the leading part of the copy, so it is
    /// restamped byte for byte along with the rest.
    fn apply(&self, seg: &mut Pkt) -> Result<(), SegAdjustError> {
        seg.write_bytes_front(&self.bytes);
        seg.reset_mac_header();
        seg.reset_network_header();
        seg.set_transport_header(IPV4_HDR_LEN)?;
        seg.set_inner_mac_header(self.inner_mac_off)?;
        seg.set_inner_network_header(self.bytes.len())?;
        seg.set_mac_len(0);
        Ok(())
    }
}

/// Segment `pkt` through `engine`, honoring the capabilities of the
/// engine.
///
/// If the engine does not look through tags itself, the declared
/// protocol is resolved before the call, and restored on every
/// segment after it. Either way `pkt` keeps its declared protocol.
pub fn gso_segment<E>(
    pkt: &mut Pkt,
    engine: &E,
    caps: &GsoCaps,
    features: OffloadFlags,
    tx_path: bool,
) -> Result<PktChain, SegmentError>
where
    E: SegmentEngine + ?Sized,
{
    let tx_path = caps.effective_tx_path(tx_path);

    if caps.resolves_tags {
        return Ok(engine.segment(pkt, features, tx_path)?);
    }

    let declared = pkt.protocol();
    let resolved = network_protocol(pkt)?;
    pkt.set_protocol(resolved);
    let res = engine.segment(pkt, features, tx_path);
    pkt.set_protocol(declared);

    let mut segs = res?;
    for seg in &mut segs {
        seg.set_protocol(declared);
    }

    Ok(segs)
}

/// Segments oversized tunneled packets.
pub struct Segmenter<E> {
    engine: E,
    caps: GsoCaps,
}

impl<E: SegmentEngine> Segmenter<E> {
    pub fn new(engine: E, caps: GsoCaps) -> Self {
        Self { engine, caps }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn caps(&self) -> &GsoCaps {
        &self.caps
    }

    /// Segment the untunneled packet `pkt`, whose data starts at the
    /// header the engine dispatches on, offering the engine the
    /// configured offload features.
    pub fn gso_segment(
        &self,
        pkt: &mut Pkt,
        tx_path: bool,
    ) -> Result<PktChain, SegmentError> {
        gso_segment(pkt, &self.engine, &self.caps, self.caps.features, tx_path)
    }

    /// Split the tunneled packet `pkt` into a chain of segments, each
    /// carrying a copy of the original outer encapsulation.
    ///
    /// The data of `pkt` must start at its outer IPv4 header, and its
    /// inner mac and network markers must be set. Whatever happens,
    /// `pkt` is consumed.
    ///
    /// Each produced segment has its mac and network markers at the
    /// outer IPv4 header, its transport marker right after it, a zero
    /// `mac_len`, and the original declared protocol. The `fixup`, if
    /// any, runs once per segment after the encapsulation is in place.
    ///
    /// Tags on the inner frame are only walked when the declared
    /// protocol says the packet is tagged; the declared protocol of a
    /// tunneled packet is that of the outer header. No offload features
    /// are offered to the engine.
    pub fn segment(
        &self,
        mut pkt: Pkt,
        tx_path: bool,
        fixup: Option<&dyn SegmentFixup>,
    ) -> Result<PktChain, SegmentError> {
        let outer = OuterHdr::capture(&pkt)?;
        let proto = pkt.protocol();

        // Expose the inner frame to learn what it really carries: the
        // engine dispatches on the declared protocol alone.
        pkt.pull(outer.inner_mac_offset())?;
        let inner = network_protocol(&pkt)?;
        pkt.set_protocol(inner);

        // Hand over nothing but the inner L3 packet.
        pkt.pull(outer.len() - outer.inner_mac_offset())?;
        pkt.reset_mac_header();
        pkt.reset_network_header();
        pkt.reset_transport_header();

        let mut segs = gso_segment(
            &mut pkt,
            &self.engine,
            &self.caps,
            OffloadFlags::empty(),
            tx_path,
        )?;

        if segs.is_empty() {
            return Err(SegmentError::NoSegments);
        }

        for seg in &mut segs {
            outer.apply(seg)?;

            if let Some(fixup) = fixup {
                fixup.fix(seg);
            }

            seg.set_protocol(proto);
        }

        Ok(segs)
    }
}
