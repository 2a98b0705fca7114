use std::fmt;
use std::io;

use backtrace::Backtrace;

use crate::transaction_id::TransactionId;

/// Error kinds surfaced by the core (spec.md §7). No error is recovered
/// inside the core; every operation returns a `CoreResult` and the
/// caller decides whether to retry or abort its own transaction.
pub enum CoreError {
    /// Deadlock victim selection. The requesting transaction must
    /// unwind; its pre-existing locks remain held until the caller
    /// invokes `transactionComplete(tid, commit=false)`.
    Aborted { tid: TransactionId },
    /// I/O failure from `PageStore`, or eviction failure (every
    /// resident page is dirty).
    Storage(io::Error),
    /// A page-store call for a page outside the requested table, or a
    /// schema mismatch on insert.
    Invalid(String),
}

impl CoreError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        CoreError::Invalid(msg.into())
    }

    pub fn storage(err: io::Error) -> Self {
        CoreError::Storage(err)
    }

    pub fn aborted(tid: TransactionId) -> Self {
        CoreError::Aborted { tid }
    }

    /// Render the error together with a backtrace captured at the call
    /// site, for diagnostic logging. Mirrors the teacher's
    /// `err.show_backtrace()` convention.
    pub fn with_backtrace(&self) -> String {
        format!("{}\n{:?}", self, Backtrace::new())
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Aborted { tid } => write!(f, "transaction {} aborted (deadlock victim)", tid),
            CoreError::Storage(e) => write!(f, "storage error: {}", e),
            CoreError::Invalid(msg) => write!(f, "invalid request: {}", msg),
        }
    }
}

impl fmt::Debug for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CoreError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CoreError {
    fn from(e: io::Error) -> Self {
        CoreError::Storage(e)
    }
}
