// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use crate::gso::GsoCaps;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

pub const NET_XMIT_SUCCESS: i32 = 0x00;
pub const NET_XMIT_DROP: i32 = 0x01;
pub const NET_XMIT_CN: i32 = 0x02;

/// The status of handing a single packet to the network-layer output
/// path.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum XmitCode {
    Success,
    /// The packet was dropped by the output path.
    Drop,
    /// The packet was queued, but the output path is congested.
    Congested,
    /// The output path failed with the given (positive) errno.
    Errno(i32),
}

impl XmitCode {
    /// Does this status need to be reported to the caller?
    ///
    /// A congestion notification is not a failure of this packet; it
    /// went out.
    pub fn is_surfaced(&self) -> bool {
        !matches!(self, Self::Success | Self::Congested)
    }

    /// Convert from the raw status used by the output path: negative
    /// values are errnos, positive values are `NET_XMIT_*` codes.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            NET_XMIT_SUCCESS => Self::Success,
            NET_XMIT_DROP => Self::Drop,
            NET_XMIT_CN => Self::Congested,
            r if r < 0 => Self::Errno(r.saturating_neg()),
            // Unknown positive codes are treated as drops.
            _ => Self::Drop,
        }
    }

    pub fn to_raw(self) -> i32 {
        match self {
            Self::Success => NET_XMIT_SUCCESS,
            Self::Drop => NET_XMIT_DROP,
            Self::Congested => NET_XMIT_CN,
            Self::Errno(e) => -e,
        }
    }
}

impl Display for XmitCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Drop => write!(f, "drop"),
            Self::Congested => write!(f, "congested"),
            Self::Errno(e) => write!(f, "errno {e}"),
        }
    }
}

/// Configuration of a re-injector.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
#[serde(default)]
pub struct XmitCfg {
    /// What the segmentation engine underneath can do.
    pub caps: GsoCaps,

    /// Log a note for every packet that gets segmented.
    pub debug: bool,
}
