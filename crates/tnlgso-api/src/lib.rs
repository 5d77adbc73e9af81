// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

#![no_std]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

#[cfg(any(feature = "std", test))]
#[macro_use]
extern crate std;

extern crate alloc;

pub mod ether;
pub mod gso;
pub mod xmit;

pub use ether::*;
pub use gso::*;
pub use xmit::*;

/// The overall version of the API. Anytime an API is added, removed,
/// or modified, this number should increment. Currently we attach no
/// semantic meaning to the number other than as a means to verify
/// that producers and consumers of these types agree.
pub const API_VERSION: u64 = 1;
