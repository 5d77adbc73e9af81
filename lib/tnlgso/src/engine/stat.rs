// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Re-injector statistics.

use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

/// Counters kept by a single re-injector.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
pub struct XmitStats {
    /// Packets handed to the re-injector.
    pub pkts_in: u64,
    /// Packets which needed segmentation.
    pub gso_pkts: u64,
    /// Segments produced from those packets.
    pub segs_out: u64,
    /// Packets dropped because segmentation failed.
    pub seg_drops: u64,
    /// Packets dropped because their checksum could not be finished.
    pub csum_drops: u64,
    /// Packets handed to the output path.
    pub sent: u64,
    /// Sends which the output path reported as failed.
    pub out_fails: u64,
    /// Sends which the output path accepted but flagged as congested.
    pub congested: u64,
}

impl Display for XmitStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "in: {} gso: {} segs: {} seg_drops: {} csum_drops: {} \
             sent: {} out_fails: {} congested: {}",
            self.pkts_in,
            self.gso_pkts,
            self.segs_out,
            self.seg_drops,
            self.csum_drops,
            self.sent,
            self.out_fails,
            self.congested,
        )
    }
}
