// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Common routines for integration tests.

// This type of pedantry is more trouble than its worth here.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

pub use tnlgso::api::EtherType;
pub use tnlgso::api::GsoCaps;
pub use tnlgso::api::GsoType;
pub use tnlgso::api::OffloadFlags;
pub use tnlgso::api::XmitCfg;
pub use tnlgso::api::XmitCode;
pub use tnlgso::ddi::pkt::CsumState;
pub use tnlgso::ddi::pkt::GsoInfo;
pub use tnlgso::ddi::pkt::Pkt;
pub use tnlgso::ddi::pkt::PktChain;
pub use tnlgso::engine::checksum::Checksum;
pub use tnlgso::engine::checksum::CsumResolver;
pub use tnlgso::engine::checksum::HeaderChecksum;
pub use tnlgso::engine::ether::ETHER_HDR_LEN;
pub use tnlgso::engine::ether::VLAN_HDR_LEN;
pub use tnlgso::engine::ip4::IP_PROTO_UDP;
pub use tnlgso::engine::ip4::IPV4_HDR_LEN;
pub use tnlgso::engine::ip4::ip4_fill_csum;
pub use tnlgso::engine::ip4::ip4_hdr;
pub use tnlgso::engine::ip4::ip4_hdr_mut;
pub use tnlgso::engine::segment::EngineError;
pub use tnlgso::engine::segment::SegmentEngine;
pub use tnlgso::engine::segment::SegmentError;
pub use tnlgso::engine::segment::SegmentFixup;
pub use tnlgso::engine::segment::Segmenter;
pub use tnlgso::engine::segment::gso_segment;
pub use tnlgso::engine::xmit::NetOutput;
pub use tnlgso::engine::xmit::Reinjector;
pub use tnlgso::engine::xmit::XmitResult;
pub use tnlgso::provider::LogLevel;
pub use tnlgso::provider::LogProvider;
pub use tnlgso::provider::Providers;

pub const UDP_HDR_LEN: usize = 8;
pub const GENEVE_HDR_LEN: usize = 8;
pub const GENEVE_PORT: u16 = 6081;

/// Offset of the inner Ethernet header in a tunneled packet.
pub const INNER_MAC_OFF: usize = IPV4_HDR_LEN + UDP_HDR_LEN + GENEVE_HDR_LEN;

pub const OUTER_SRC: [u8; 4] = [172, 20, 14, 16];
pub const OUTER_DST: [u8; 4] = [172, 20, 14, 17];
pub const INNER_SRC: [u8; 4] = [10, 0, 0, 5];
pub const INNER_DST: [u8; 4] = [10, 0, 0, 6];
pub const INNER_IDENT: u16 = 0x4242;

/// An IPv4 header without options and with its checksum filled in.
pub fn ipv4_hdr(
    proto: u8,
    ident: u16,
    total_len: u16,
    src: [u8; 4],
    dst: [u8; 4],
) -> [u8; IPV4_HDR_LEN] {
    let mut hdr = [0u8; IPV4_HDR_LEN];
    hdr[0] = 0x45;
    hdr[2..4].copy_from_slice(&total_len.to_be_bytes());
    hdr[4..6].copy_from_slice(&ident.to_be_bytes());
    hdr[6] = 0x40;
    hdr[8] = 64;
    hdr[9] = proto;
    hdr[12..16].copy_from_slice(&src);
    hdr[16..20].copy_from_slice(&dst);

    let csum = HeaderChecksum::from(Checksum::compute(&hdr));
    hdr[10..12].copy_from_slice(&csum.bytes());
    hdr
}

/// An Ethernet header followed by one 802.1Q tag per entry of `vids`,
/// ending with `ether_type`.
pub fn ether_hdr(vids: &[u16], ether_type: u16) -> Vec<u8> {
    let mut hdr = vec![0xA8, 0x40, 0x25, 0xF7, 0x00, 0x66];
    hdr.extend_from_slice(&[0xA8, 0x40, 0x25, 0xF7, 0x00, 0x77]);

    for vid in vids {
        hdr.extend_from_slice(&0x8100u16.to_be_bytes());
        hdr.extend_from_slice(&vid.to_be_bytes());
    }

    hdr.extend_from_slice(&ether_type.to_be_bytes());
    hdr
}

/// A recognizable payload of `len` bytes.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// An inner frame: Ethernet, `vids.len()` VLAN tags, IPv4, UDP
/// payload.
pub fn inner_frame(vids: &[u16], body: &[u8]) -> Vec<u8> {
    let total_len = (IPV4_HDR_LEN + body.len()) as u16;
    let mut frame = ether_hdr(vids, 0x0800);
    frame.extend_from_slice(&ipv4_hdr(
        IP_PROTO_UDP,
        INNER_IDENT,
        total_len,
        INNER_SRC,
        INNER_DST,
    ));
    frame.extend_from_slice(body);
    frame
}

/// Length of everything in front of the inner IPv4 header.
pub fn outer_len(vids: &[u16]) -> usize {
    INNER_MAC_OFF + ETHER_HDR_LEN + vids.len() * VLAN_HDR_LEN
}

/// An oversized Geneve tunneled packet whose inner IPv4 packet carries
/// `body`, to be split into segments of `mss` bytes. The data starts at
/// the outer IPv4 header.
pub fn tunneled(vids: &[u16], body: &[u8], mss: u16, ident: u16) -> Pkt {
    let inner = inner_frame(vids, body);
    let total_len = (INNER_MAC_OFF + inner.len()) as u16;
    let udp_len = (UDP_HDR_LEN + GENEVE_HDR_LEN + inner.len()) as u16;

    let mut bytes = Vec::with_capacity(total_len as usize);
    bytes.extend_from_slice(&ipv4_hdr(
        IP_PROTO_UDP,
        ident,
        total_len,
        OUTER_SRC,
        OUTER_DST,
    ));
    bytes.extend_from_slice(&7777u16.to_be_bytes());
    bytes.extend_from_slice(&GENEVE_PORT.to_be_bytes());
    bytes.extend_from_slice(&udp_len.to_be_bytes());
    bytes.extend_from_slice(&[0, 0]);
    // Geneve: no options, transparent ethernet, VNI 99.
    bytes.extend_from_slice(&[0x00, 0x00, 0x65, 0x58, 0x00, 0x00, 0x63, 0x00]);
    bytes.extend_from_slice(&inner);

    let mut pkt = Pkt::copy_with_headroom(16, bytes);
    pkt.reset_mac_header();
    pkt.reset_network_header();
    pkt.set_transport_header(IPV4_HDR_LEN).unwrap();
    pkt.set_inner_mac_header(INNER_MAC_OFF).unwrap();
    pkt.set_inner_network_header(outer_len(vids)).unwrap();
    pkt.set_protocol(EtherType::Ipv4);

    let segs = body.len().div_ceil(usize::from(mss)) as u16;
    pkt.set_gso(Some(GsoInfo {
        size: mss,
        segs,
        kind: GsoType::UDP | GsoType::UDP_TUNNEL,
    }));
    pkt
}

/// The IPv4 identification of the header at `pkt`'s network marker.
pub fn ident(pkt: &Pkt) -> u16 {
    ip4_hdr(pkt).unwrap().ident()
}

/// What a [`SoftGso`] was asked to do.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EngineCall {
    pub protocol: EtherType,
    pub features: OffloadFlags,
    pub tx_path: bool,
    pub len: usize,
}

/// A reference software segmentation engine.
///
/// It splits an IPv4 packet's payload into chunks of the GSO size,
/// giving each chunk a copy of the IPv4 header with its length,
/// identification, and checksum fixed up. Like a real engine, every
/// segment inherits the source packet's control block.
#[derive(Debug, Default)]
pub struct SoftGso {
    pub calls: RefCell<Vec<EngineCall>>,
    pub fail: Option<EngineError>,
    pub produce_nothing: bool,
}

impl SoftGso {
    pub fn failing(err: EngineError) -> Self {
        Self { fail: Some(err), ..Default::default() }
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl SegmentEngine for SoftGso {
    fn segment(
        &self,
        pkt: &Pkt,
        features: OffloadFlags,
        tx_path: bool,
    ) -> Result<PktChain, EngineError> {
        self.calls.borrow_mut().push(EngineCall {
            protocol: pkt.protocol(),
            features,
            tx_path,
            len: pkt.len(),
        });

        if let Some(err) = &self.fail {
            return Err(err.clone());
        }

        if pkt.protocol() != EtherType::Ipv4 {
            return Err(EngineError::Unsupported(pkt.protocol()));
        }

        if self.produce_nothing {
            return Ok(PktChain::empty());
        }

        let mss = match pkt.gso() {
            Some(gso) if gso.size > 0 => usize::from(gso.size),
            _ => return Err(EngineError::Malformed("no GSO size")),
        };

        let ip = ip4_hdr(pkt).map_err(|_| EngineError::Malformed("ipv4"))?;
        let hdr_len = ip.hdr_len();
        let base = ip.ident();
        let bytes = pkt.network_bytes();
        if bytes.len() < hdr_len {
            return Err(EngineError::Malformed("ipv4 truncated"));
        }
        let (hdr, body) = bytes.split_at(hdr_len);

        let mut chain = PktChain::empty();
        for (i, chunk) in body.chunks(mss).enumerate() {
            let mut seg = Pkt::new(hdr_len + chunk.len());
            seg.write_bytes_back(hdr);
            seg.write_bytes_back(chunk);
            seg.reset_network_header();
            seg.set_transport_header(hdr_len)
                .map_err(|_| EngineError::Malformed("segment"))?;

            let ip = ip4_hdr_mut(&mut seg)
                .map_err(|_| EngineError::Malformed("segment"))?;
            ip.set_total_len((hdr_len + chunk.len()) as u16);
            ip.set_ident(base.wrapping_add(i as u16));
            ip4_fill_csum(&mut seg)
                .map_err(|_| EngineError::Malformed("segment"))?;

            seg.set_protocol(pkt.protocol());
            *seg.cb_mut() = *pkt.cb();
            chain.append(seg);
        }

        Ok(chain)
    }
}

/// An output path which records everything sent to it.
///
/// Like the network layer, it fills in the total length and header
/// checksum of the outgoing IPv4 header. Sends return the scripted
/// codes in order, then success.
#[derive(Debug, Default)]
pub struct RecordingOutput {
    pub sent: Vec<Pkt>,
    pub script: VecDeque<XmitCode>,
}

impl RecordingOutput {
    pub fn scripted(codes: impl IntoIterator<Item = XmitCode>) -> Self {
        Self { sent: vec![], script: codes.into_iter().collect() }
    }
}

impl NetOutput for RecordingOutput {
    fn send(&mut self, mut pkt: Pkt) -> XmitCode {
        let len = pkt.len() as u16;
        if let Ok(ip) = ip4_hdr_mut(&mut pkt) {
            ip.set_total_len(len);
            ip4_fill_csum(&mut pkt).unwrap();
        }

        self.sent.push(pkt);
        self.script.pop_front().unwrap_or(XmitCode::Success)
    }
}

/// A log provider which keeps every message.
#[derive(Clone, Debug, Default)]
pub struct CaptureLog(pub Arc<Mutex<Vec<(LogLevel, String)>>>);

impl CaptureLog {
    pub fn lines(&self, level: LogLevel) -> Vec<String> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, msg)| msg.clone())
            .collect()
    }
}

impl LogProvider for CaptureLog {
    fn log(&self, level: LogLevel, msg: &str) {
        self.0.lock().unwrap().push((level, msg.to_string()));
    }
}

pub fn reinjector(
    engine: SoftGso,
    out: RecordingOutput,
    cfg: XmitCfg,
) -> Reinjector<SoftGso, RecordingOutput> {
    Reinjector::new(engine, out, cfg, Providers::null())
}
