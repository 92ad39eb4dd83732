// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for ipplex.

use thiserror::Error;

/// Top-level error type for all ipplex operations.
///
/// Variants line up with the failure domains a caller must distinguish:
/// invalid-argument errors are reported back and never logged above `debug`,
/// transient-I/O is retried with back-off before it ever reaches a caller,
/// and fatal errors mean log-and-shut-down.
#[derive(Debug, Error)]
pub enum IpplexError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("busy: {0}")]
    Busy(String),

    #[error("transient I/O error: {0}")]
    TransientIo(String),

    #[error("driver error: {0}")]
    Driver(String),

    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("fatal system error: {0}")]
    Fatal(String),

    #[error("remote IPP error: {0}")]
    RemoteIpp(String),

    #[error("device error: {0}")]
    Device(String),

    #[error("discovery error: {0}")]
    Discovery(String),

    #[error("no such printer: {0}")]
    NoSuchPrinter(i32),

    #[error("no such job: {0}")]
    NoSuchJob(i32),

    #[error("no such subscription: {0}")]
    NoSuchSubscription(i32),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IpplexError {
    /// Whether this error must never be logged louder than `debug` (the
    /// invalid-argument domain is reported to the caller only).
    pub fn is_caller_only(&self) -> bool {
        matches!(self, IpplexError::InvalidArgument(_))
    }

    /// Whether the failure is safe to retry automatically.
    pub fn is_transient(&self) -> bool {
        matches!(self, IpplexError::TransientIo(_) | IpplexError::Busy(_))
    }
}

/// Alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, IpplexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_is_caller_only() {
        assert!(IpplexError::InvalidArgument("bad uri".into()).is_caller_only());
        assert!(!IpplexError::Fatal("disk gone".into()).is_caller_only());
    }

    #[test]
    fn transient_classification() {
        assert!(IpplexError::TransientIo("timeout".into()).is_transient());
        assert!(IpplexError::Busy("max-active-jobs".into()).is_transient());
        assert!(!IpplexError::Driver("jam".into()).is_transient());
    }
}
