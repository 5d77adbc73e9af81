// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Owned packet buffers and chains of them.
//!
//! A [`Pkt`] is a single contiguous buffer with room in front of the
//! data for headers to be pushed, together with the header markers
//! and offload state the datapath tracks for each packet. Header
//! markers are stored as positions within the allocation, not within
//! the data; pushing or pulling bytes moves the start of data but
//! leaves every marker where it was. This is what lets the segmenter
//! peel an outer header off, hand the inner packet to the engine, and
//! still know where the outer headers began.
//!
//! A [`PktChain`] is an ordered, owned sequence of packets. It is what
//! segmentation produces and what the output path consumes.

use crate::api::EtherType;
use crate::api::GsoType;
use alloc::collections::VecDeque;
use alloc::collections::vec_deque;
use alloc::vec::Vec;
use bitflags::bitflags;
use core::ops::Deref;
use core::ops::DerefMut;
use thiserror::Error;

/// The headroom reserved by [`Pkt::new`].
pub const PKT_DEF_HEADROOM: usize = 64;

#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum SegAdjustError {
    /// Moving the start of data would put it past the end of data.
    #[error("start of data would move past end of data")]
    StartPastEnd,

    /// A header marker would land past the end of data.
    #[error("header marker at offset {offset} is past end of data ({len})")]
    MarkerPastEnd { offset: usize, len: usize },
}

/// How much of a packet's L4 checksum is still owed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CsumState {
    /// Nothing needs to be done, either because there is no checksum
    /// or because whoever produced the packet does not care.
    #[default]
    None,

    /// The pseudo-header sum has been stored in the checksum field,
    /// and the sum over the bytes from `start` to the end of data
    /// must still be folded in. The checksum field lives `stuff`
    /// bytes past `start`.
    ///
    /// `start` is a position within the allocation, like the header
    /// markers.
    Partial { start: usize, stuff: u16 },

    /// The checksum is complete.
    Complete,
}

/// The segmentation descriptor of an oversized packet.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GsoInfo {
    /// The payload size of each produced segment.
    pub size: u16,
    /// The number of segments the producer expects, if known.
    pub segs: u16,
    pub kind: GsoType,
}

bitflags! {
/// Per-packet state bits of the IP layer.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct IpCbFlags: u16 {
    const FORWARDED = 1 << 0;
    const XFRM_TUNNEL_SIZE = 1 << 1;
    const XFRM_TRANSFORMED = 1 << 2;
    const FRAG_COMPLETE = 1 << 3;
    const REROUTED = 1 << 4;
    const FRAG_PMTU = 1 << 5;
}
}

/// The IP layer's transient per-packet state.
///
/// This must never leak from one datagram to another. Every segment
/// produced from an oversized packet starts with an empty one.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct IpCb {
    pub flags: IpCbFlags,
    /// Length of the IP options carried in the header.
    pub opt_len: u8,
    /// The interface index the packet arrived on, zero if local.
    pub iif: i32,
}

impl IpCb {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A single owned packet.
///
/// Dereferences to the bytes between the start and end of data.
#[derive(Clone, Debug)]
pub struct Pkt {
    buf: Vec<u8>,
    head: usize,
    tail: usize,

    mac_hdr: usize,
    net_hdr: usize,
    transport_hdr: usize,
    inner_mac_hdr: usize,
    inner_net_hdr: usize,

    protocol: EtherType,
    inner_protocol: EtherType,
    mac_len: u16,
    csum: CsumState,
    gso: Option<GsoInfo>,
    cb: IpCb,
}

impl Deref for Pkt {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.buf[self.head..self.tail]
    }
}

impl DerefMut for Pkt {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf[self.head..self.tail]
    }
}

impl Pkt {
    /// Allocate a new, empty [`Pkt`] with [`PKT_DEF_HEADROOM`] bytes
    /// of headroom and room for `len` bytes of data.
    pub fn new(len: usize) -> Self {
        Self::new_with_headroom(PKT_DEF_HEADROOM, len)
    }

    /// Allocate a new, empty [`Pkt`] with `head_len` bytes of
    /// headroom and room for `body_len` bytes of data.
    ///
    /// All header markers start out at the start of data.
    pub fn new_with_headroom(head_len: usize, body_len: usize) -> Self {
        let mut buf = Vec::with_capacity(head_len + body_len);
        buf.resize(head_len, 0);

        Self {
            buf,
            head: head_len,
            tail: head_len,
            mac_hdr: head_len,
            net_hdr: head_len,
            transport_hdr: head_len,
            inner_mac_hdr: head_len,
            inner_net_hdr: head_len,
            protocol: EtherType::default(),
            inner_protocol: EtherType::default(),
            mac_len: 0,
            csum: CsumState::None,
            gso: None,
            cb: IpCb::default(),
        }
    }

    /// Allocate a new [`Pkt`] holding a copy of `bytes`, with no
    /// headroom.
    pub fn copy(bytes: impl AsRef<[u8]>) -> Self {
        Self::copy_with_headroom(0, bytes)
    }

    /// Allocate a new [`Pkt`] holding a copy of `bytes`, preceded by
    /// `head_len` bytes of headroom.
    pub fn copy_with_headroom(
        head_len: usize,
        bytes: impl AsRef<[u8]>,
    ) -> Self {
        let bytes = bytes.as_ref();
        let mut pkt = Self::new_with_headroom(head_len, bytes.len());
        pkt.write_bytes_back(bytes);
        pkt
    }

    /// Returns the number of bytes available ahead of the start of
    /// data.
    pub fn head_capacity(&self) -> usize {
        self.head
    }

    /// Copies `bytes` into the region after the end of data, growing
    /// the allocation if needed.
    pub fn write_bytes_back(&mut self, bytes: impl AsRef<[u8]>) {
        let bytes = bytes.as_ref();
        // Anything past `tail` is stale; the buffer is only ever
        // shortened from the back by `trim`.
        self.buf.truncate(self.tail);
        self.buf.extend_from_slice(bytes);
        self.tail += bytes.len();
    }

    /// Copies `bytes` into the region before the start of data.
    pub fn write_bytes_front(&mut self, bytes: impl AsRef<[u8]>) {
        let bytes = bytes.as_ref();
        self.push(bytes.len()).copy_from_slice(bytes);
    }

    /// Make sure at least `n` bytes of headroom are available,
    /// reallocating if needed. Every marker keeps pointing at the
    /// same byte of the packet.
    pub fn reserve_head(&mut self, n: usize) {
        if self.head >= n {
            return;
        }

        let delta = n - self.head;
        let mut buf = Vec::with_capacity(self.buf.capacity() + delta);
        buf.resize(delta, 0);
        buf.extend_from_slice(&self.buf);
        self.buf = buf;
        self.shift_markers(delta);
    }

    fn shift_markers(&mut self, delta: usize) {
        self.head += delta;
        self.tail += delta;
        self.mac_hdr += delta;
        self.net_hdr += delta;
        self.transport_hdr += delta;
        self.inner_mac_hdr += delta;
        self.inner_net_hdr += delta;

        if let CsumState::Partial { start, stuff } = self.csum {
            self.csum = CsumState::Partial { start: start + delta, stuff };
        }
    }

    /// Extend the data `n` bytes towards the front, returning the new
    /// bytes for the caller to fill in. Headroom is grown if needed.
    pub fn push(&mut self, n: usize) -> &mut [u8] {
        self.reserve_head(n);
        self.head -= n;
        &mut self.buf[self.head..self.head + n]
    }

    /// Shrink the data by `n` bytes from the front; effectively
    /// removing bytes from the start of the packet.
    ///
    /// # Errors
    ///
    /// `SegAdjustError::StartPastEnd`: Moving the start of data by
    /// `n` would move it past the end of data.
    pub fn pull(&mut self, n: usize) -> Result<(), SegAdjustError> {
        if self.tail - self.head < n {
            return Err(SegAdjustError::StartPastEnd);
        }

        self.head += n;
        Ok(())
    }

    /// Shorten the data to `len` bytes. Does nothing if the packet is
    /// already shorter.
    pub fn trim(&mut self, len: usize) {
        if len < self.len() {
            self.tail = self.head + len;
        }
    }

    /// Position of the byte `offset` bytes past the start of data,
    /// provided it is no further than the end of data.
    fn marker_at(&self, offset: usize) -> Result<usize, SegAdjustError> {
        if offset > self.len() {
            return Err(SegAdjustError::MarkerPastEnd {
                offset,
                len: self.len(),
            });
        }

        Ok(self.head + offset)
    }

    /// Distance of an allocation position from the start of data.
    /// Negative when the position precedes the data.
    fn rel(&self, pos: usize) -> isize {
        pos as isize - self.head as isize
    }

    pub fn reset_mac_header(&mut self) {
        self.mac_hdr = self.head;
    }

    pub fn reset_network_header(&mut self) {
        self.net_hdr = self.head;
    }

    pub fn reset_transport_header(&mut self) {
        self.transport_hdr = self.head;
    }

    pub fn set_network_header(
        &mut self,
        offset: usize,
    ) -> Result<(), SegAdjustError> {
        self.net_hdr = self.marker_at(offset)?;
        Ok(())
    }

    pub fn set_transport_header(
        &mut self,
        offset: usize,
    ) -> Result<(), SegAdjustError> {
        self.transport_hdr = self.marker_at(offset)?;
        Ok(())
    }

    pub fn set_inner_mac_header(
        &mut self,
        offset: usize,
    ) -> Result<(), SegAdjustError> {
        self.inner_mac_hdr = self.marker_at(offset)?;
        Ok(())
    }

    pub fn set_inner_network_header(
        &mut self,
        offset: usize,
    ) -> Result<(), SegAdjustError> {
        self.inner_net_hdr = self.marker_at(offset)?;
        Ok(())
    }

    pub fn mac_offset(&self) -> isize {
        self.rel(self.mac_hdr)
    }

    pub fn network_offset(&self) -> isize {
        self.rel(self.net_hdr)
    }

    pub fn transport_offset(&self) -> isize {
        self.rel(self.transport_hdr)
    }

    /// Distance from the start of data to the inner (tunneled) L2
    /// header.
    pub fn inner_mac_offset(&self) -> isize {
        self.rel(self.inner_mac_hdr)
    }

    /// Distance from the start of data to the inner (tunneled) L3
    /// header. For a packet whose data starts at the outer IP header
    /// this is the length of the whole encapsulation.
    pub fn inner_network_offset(&self) -> isize {
        self.rel(self.inner_net_hdr)
    }

    /// Where the network view starts: the network header marker, kept
    /// within the data.
    fn network_start(&self) -> usize {
        self.net_hdr.clamp(self.head, self.tail)
    }

    /// The bytes from the network header marker to the end of data.
    /// If the marker has been pulled off, this is the whole data.
    pub fn network_bytes(&self) -> &[u8] {
        &self.buf[self.network_start()..self.tail]
    }

    /// The bytes from the network header marker to the end of data.
    /// If the marker has been pulled off, this is the whole data.
    pub fn network_bytes_mut(&mut self) -> &mut [u8] {
        let start = self.network_start();
        &mut self.buf[start..self.tail]
    }

    /// Do the markers describe a sane layout: mac before network
    /// before transport, none of them past the end of data?
    pub fn markers_valid(&self) -> bool {
        self.mac_hdr <= self.net_hdr
            && self.net_hdr <= self.transport_hdr
            && self.transport_hdr <= self.tail
            && self.inner_mac_hdr <= self.inner_net_hdr
            && self.inner_net_hdr <= self.tail
    }

    pub fn protocol(&self) -> EtherType {
        self.protocol
    }

    pub fn set_protocol(&mut self, protocol: EtherType) {
        self.protocol = protocol;
    }

    /// The protocol hint left behind when an MPLS label stack was
    /// logically unwrapped earlier in the pipeline.
    pub fn inner_protocol(&self) -> EtherType {
        self.inner_protocol
    }

    pub fn set_inner_protocol(&mut self, protocol: EtherType) {
        self.inner_protocol = protocol;
    }

    pub fn mac_len(&self) -> u16 {
        self.mac_len
    }

    pub fn set_mac_len(&mut self, len: u16) {
        self.mac_len = len;
    }

    pub fn csum(&self) -> CsumState {
        self.csum
    }

    /// Mark the checksum as partially computed. `start` is relative
    /// to the start of data, `stuff` relative to `start`.
    pub fn set_csum_partial(
        &mut self,
        start: usize,
        stuff: u16,
    ) -> Result<(), SegAdjustError> {
        let start = self.marker_at(start)?;
        self.csum = CsumState::Partial { start, stuff };
        Ok(())
    }

    pub fn set_csum(&mut self, csum: CsumState) {
        self.csum = csum;
    }

    /// Distance from the start of data to the checksum start of a
    /// partially computed checksum.
    pub fn csum_start_offset(&self) -> Option<isize> {
        match self.csum {
            CsumState::Partial { start, .. } => Some(self.rel(start)),
            _ => None,
        }
    }

    pub fn gso(&self) -> Option<GsoInfo> {
        self.gso
    }

    /// Does this packet need segmentation before it may go out?
    pub fn is_gso(&self) -> bool {
        self.gso.is_some()
    }

    pub fn set_gso(&mut self, gso: Option<GsoInfo>) {
        self.gso = gso;
    }

    pub fn cb(&self) -> &IpCb {
        &self.cb
    }

    pub fn cb_mut(&mut self) -> &mut IpCb {
        &mut self.cb
    }

    /// Reset the IP layer state to empty.
    pub fn clear_cb(&mut self) {
        self.cb = IpCb::default();
    }
}

/// An ordered chain of owned packets.
///
/// Order of insertion is the order of transmission.
#[derive(Debug, Default)]
pub struct PktChain(VecDeque<Pkt>);

impl PktChain {
    /// Create an empty packet chain.
    pub fn empty() -> Self {
        Self(VecDeque::new())
    }

    /// Removes the next packet from the front of the chain and returns
    /// it, taking ownership. The packet is no longer linked to anything.
    pub fn pop_front(&mut self) -> Option<Pkt> {
        self.0.pop_front()
    }

    /// Adds an owned packet to the end of this chain.
    pub fn append(&mut self, pkt: Pkt) {
        self.0.push_back(pkt);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> vec_deque::Iter<'_, Pkt> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> vec_deque::IterMut<'_, Pkt> {
        self.0.iter_mut()
    }
}

impl From<Pkt> for PktChain {
    fn from(pkt: Pkt) -> Self {
        Self(VecDeque::from([pkt]))
    }
}

impl FromIterator<Pkt> for PktChain {
    fn from_iter<I: IntoIterator<Item = Pkt>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for PktChain {
    type Item = Pkt;
    type IntoIter = vec_deque::IntoIter<Pkt>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a mut PktChain {
    type Item = &'a mut Pkt;
    type IntoIter = vec_deque::IterMut<'a, Pkt>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter_mut()
    }
}
