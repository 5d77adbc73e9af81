// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Segmentation and re-injection of oversized tunneled packets.
//!
//! An oversized packet carrying an IP-in-IP style tunnel cannot be
//! handed to a generic segmentation engine as-is: the engine only
//! knows how to split the inner packet. This crate peels the outer
//! encapsulation, has the engine split the inner packet, rebuilds the
//! outer encapsulation on every segment, and then pushes the segments
//! through the network-layer output path with fresh IPv4
//! identification values.
//!
//! The three moving parts live under [`engine`]:
//!
//! * [`engine::resolve`]: find the real L3 protocol under VLAN tags.
//! * [`engine::segment`]: tunnel-aware segmentation.
//! * [`engine::xmit`]: local output of a packet or segment chain.

#![cfg_attr(not(feature = "std"), no_std)]
#![allow(clippy::len_without_is_empty)]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

#[cfg_attr(feature = "engine", macro_use)]
extern crate alloc;

#[cfg(feature = "engine")]
#[macro_use]
extern crate cfg_if;

/// The API types, re-exported so consumers need only one crate.
pub mod api {
    pub use tnlgso_api::*;
}

#[cfg(feature = "engine")]
pub mod ddi;
#[cfg(feature = "engine")]
pub mod engine;
#[cfg(feature = "engine")]
pub mod provider;
