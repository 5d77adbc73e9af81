// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Egress re-injection.
//!
//! Locally generated tunnel packets come down here on their way to
//! the network-layer output path. Oversized packets are segmented
//! first, each segment getting its own IPv4 identification; packets
//! with a partially computed checksum have it finished. Everything
//! that results is sent, one packet at a time.

use super::checksum::CsumResolver;
use super::checksum::SwCsum;
use super::ip4::ip4_hdr;
use super::ip4::ip4_hdr_mut;
use super::segment::SegmentEngine;
use super::segment::SegmentFixup;
use super::segment::Segmenter;
use super::stat::XmitStats;
use crate::api::XmitCfg;
use crate::api::XmitCode;
use crate::ddi::pkt::CsumState;
use crate::ddi::pkt::Pkt;
use crate::ddi::pkt::PktChain;
use crate::provider::LogLevel;
use crate::provider::Providers;

/// The network-layer output path.
///
/// It is expected to fill in what the network layer fills in for any
/// locally generated datagram, like the outer IPv4 total length and
/// header checksum.
pub trait NetOutput {
    /// Send a single packet, taking ownership of it.
    fn send(&mut self, pkt: Pkt) -> XmitCode;
}

/// An output path which reports its status in raw form: zero or a
/// positive `NET_XMIT_*` code, or a negated errno.
pub struct RawOutput<F>(pub F);

impl<F> NetOutput for RawOutput<F>
where
    F: FnMut(Pkt) -> i32,
{
    fn send(&mut self, pkt: Pkt) -> XmitCode {
        XmitCode::from_raw((self.0)(pkt))
    }
}

/// The outcome of [`Reinjector::xmit()`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum XmitResult {
    /// `count` packets were handed to the output path. The `status`
    /// is [`XmitCode::Success`] unless at least one send failed, in
    /// which case it is the status of the last one that did.
    Sent { count: usize, status: XmitCode },

    /// Segmentation failed and the packet was dropped without telling
    /// the caller.
    SegDropped,

    /// The checksum could not be finished and the packet was dropped.
    CsumDropped,
}

impl XmitResult {
    /// The status to report to whoever handed us the packet.
    pub fn code(&self) -> XmitCode {
        match self {
            Self::Sent { status, .. } => *status,
            Self::SegDropped => XmitCode::Success,
            Self::CsumDropped => XmitCode::Drop,
        }
    }

    /// The status in the raw form of the output path.
    pub fn to_raw(&self) -> i32 {
        self.code().to_raw()
    }
}

/// Resolves the offload state of outgoing packets before handing
/// them to the output path.
pub struct Reinjector<E, O, C = SwCsum> {
    segmenter: Segmenter<E>,
    out: O,
    csum: C,
    debug: bool,
    providers: Providers,
    stats: XmitStats,
}

impl<E, O> Reinjector<E, O, SwCsum>
where
    E: SegmentEngine,
    O: NetOutput,
{
    pub fn new(engine: E, out: O, cfg: XmitCfg, providers: Providers) -> Self {
        Self {
            segmenter: Segmenter::new(engine, cfg.caps),
            out,
            csum: SwCsum,
            debug: cfg.debug,
            providers,
            stats: XmitStats::default(),
        }
    }
}

impl<E, O, C> Reinjector<E, O, C>
where
    E: SegmentEngine,
    O: NetOutput,
    C: CsumResolver,
{
    /// Replace the checksum resolver.
    pub fn with_csum<C2: CsumResolver>(self, csum: C2) -> Reinjector<E, O, C2> {
        Reinjector {
            segmenter: self.segmenter,
            out: self.out,
            csum,
            debug: self.debug,
            providers: self.providers,
            stats: self.stats,
        }
    }

    pub fn stats(&self) -> &XmitStats {
        &self.stats
    }

    pub fn segmenter(&self) -> &Segmenter<E> {
        &self.segmenter
    }

    pub fn output(&self) -> &O {
        &self.out
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.out
    }

    fn log(&self, level: LogLevel, msg: &str) {
        self.providers.log.log(level, msg);
    }

    /// Send a locally generated tunnel packet whose data starts at its
    /// outer IPv4 header.
    ///
    /// An oversized packet is segmented as a non transmit-path
    /// request, with `fixup` applied to each segment, and the segments
    /// are numbered consecutively starting from the packet's own IPv4
    /// identification. If segmentation fails the packet is dropped and
    /// the caller is told all is well. A packet with a partially
    /// computed checksum has it finished first, and is dropped if that
    /// is not possible.
    ///
    /// Sending does not stop at the first failure.
    pub fn xmit(
        &mut self,
        pkt: Pkt,
        fixup: Option<&dyn SegmentFixup>,
    ) -> XmitResult {
        self.stats.pkts_in += 1;

        if pkt.is_gso() {
            self.stats.gso_pkts += 1;
            return self.xmit_gso(pkt, fixup);
        }

        let mut pkt = pkt;
        if let CsumState::Partial { .. } = pkt.csum() {
            if let Err(e) = self.csum.finish(&mut pkt) {
                self.stats.csum_drops += 1;
                self.log(
                    LogLevel::Warn,
                    &format!("dropping packet, checksum not finished: {e}"),
                );
                return XmitResult::CsumDropped;
            }
        }

        self.send_chain(PktChain::from(pkt), None)
    }

    fn xmit_gso(
        &mut self,
        pkt: Pkt,
        fixup: Option<&dyn SegmentFixup>,
    ) -> XmitResult {
        let base = match ip4_hdr(&pkt) {
            Ok(ip) => ip.ident(),
            Err(e) => {
                self.stats.seg_drops += 1;
                self.log(
                    LogLevel::Warn,
                    &format!("dropping GSO packet, bad outer header: {e}"),
                );
                return XmitResult::SegDropped;
            }
        };

        let len = pkt.len();
        let gso = pkt.gso().unwrap_or_default();
        let segs = match self.segmenter.segment(pkt, false, fixup) {
            Ok(segs) => segs,
            Err(e) => {
                self.stats.seg_drops += 1;
                self.log(
                    LogLevel::Warn,
                    &format!("dropping GSO packet, segmentation failed: {e}"),
                );
                return XmitResult::SegDropped;
            }
        };

        self.stats.segs_out += segs.len() as u64;
        if self.debug {
            self.log(
                LogLevel::Note,
                &format!(
                    "segmented {len} byte packet ({:?}) into {} segments \
                     ({} expected), ident base {base}",
                    gso.kind,
                    segs.len(),
                    gso.segs,
                ),
            );
        }

        self.send_chain(segs, Some(base))
    }

    /// Hand every packet of `chain` to the output path, in order. When
    /// a `base` identification is given, packet `i` is renumbered to
    /// `base + i`.
    fn send_chain(
        &mut self,
        mut chain: PktChain,
        base: Option<u16>,
    ) -> XmitResult {
        let mut status = XmitCode::Success;
        let mut count = 0;
        let mut i: u16 = 0;

        while let Some(mut pkt) = chain.pop_front() {
            let idx = i;
            i = i.wrapping_add(1);

            if let Some(base) = base {
                let ident = base.wrapping_add(idx);
                match ip4_hdr_mut(&mut pkt) {
                    Ok(ip) => ip.set_ident(ident),
                    Err(e) => {
                        self.stats.out_fails += 1;
                        self.log(
                            LogLevel::Warn,
                            &format!("dropping segment {idx}: {e}"),
                        );
                        status = XmitCode::Drop;
                        continue;
                    }
                }
            }

            pkt.clear_cb();
            let res = self.out.send(pkt);
            count += 1;
            self.stats.sent += 1;

            if res == XmitCode::Congested {
                self.stats.congested += 1;
            } else if res.is_surfaced() {
                self.stats.out_fails += 1;
                self.log(LogLevel::Warn, &format!("send failed: {res}"));
                status = res;
            }
        }

        XmitResult::Sent { count, status }
    }
}
