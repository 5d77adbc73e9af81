// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The segmentation engine.
//!
//! All code under this namespace is guarded by the `engine` feature flag.
pub mod checksum;
pub mod ether;
pub mod headers;
pub mod ip4;
pub mod resolve;
pub mod segment;
pub mod stat;
pub mod xmit;

pub use crate::api::EtherType;
