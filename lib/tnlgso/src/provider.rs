// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Providers allow the datapath to be stood up in different contexts
//! by plugging in the platform services it needs. Today that is only
//! logging: a unit test wants `println!`, a userland daemon wants a
//! structured logger, and a hot path with nobody listening wants
//! nothing at all.

use alloc::boxed::Box;
use core::fmt;
use core::fmt::Display;

/// The set of all platform-specific providers required by the
/// re-injector.
pub struct Providers {
    pub log: Box<dyn LogProvider>,
}

impl Providers {
    /// Providers which discard everything.
    pub fn null() -> Self {
        Self { log: Box::new(NullLog) }
    }
}

/// A logging provider provides the means to log messages to some
/// destination based on the context in which we are running.
///
/// Logging levels are provided by [`LogLevel`]. These levels will map
/// to the underlying provider with varying degrees of success.
pub trait LogProvider: Send + Sync {
    /// Log a message at the specified level.
    fn log(&self, level: LogLevel, msg: &str);
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogLevel {
    Note,
    Warn,
    Error,
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let level_s = match self {
            Self::Note => "[NOTE]",
            Self::Warn => "[WARN]",
            Self::Error => "[ERROR]",
        };
        write!(f, "{level_s}")
    }
}

#[derive(Clone, Copy, Debug)]
pub struct NullLog;

impl LogProvider for NullLog {
    fn log(&self, _level: LogLevel, _msg: &str) {}
}

cfg_if! {
    if #[cfg(feature = "std")] {
        #[derive(Clone, Copy, Debug)]
        pub struct PrintlnLog;

        impl LogProvider for PrintlnLog {
            fn log(&self, level: LogLevel, msg: &str) {
                println!("{level} {msg}");
            }
        }

        /// Log through a [`slog::Logger`].
        #[derive(Clone, Debug)]
        pub struct SlogLog(pub slog::Logger);

        impl LogProvider for SlogLog {
            fn log(&self, level: LogLevel, msg: &str) {
                match level {
                    LogLevel::Note => slog::info!(self.0, "{}", msg),
                    LogLevel::Warn => slog::warn!(self.0, "{}", msg),
                    LogLevel::Error => slog::error!(self.0, "{}", msg),
                }
            }
        }
    }
}
