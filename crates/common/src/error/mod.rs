//! Error classification shared by the dip-api crates
//!
//! Every error type in the workspace implements [`ErrorClassification`] so
//! callers can decide uniformly whether a failure is worth retrying and how
//! loudly to report it.
//!
//! | Level | Use Case | Examples |
//! |-------|----------|----------|
//! | **Info** | Expected conditions | Empty search results |
//! | **Warning** | Degraded but recoverable | Expired session, rate limiting |
//! | **Error** | Failure requiring attention | Transport failures, rejected credentials |
//! | **Critical** | Caller bug or broken configuration | Missing base URL, unsigned request |

use std::fmt;

/// Severity levels for monitoring and log routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Expected condition, informational only
    Info,
    /// Degraded but operational
    Warning,
    /// Failure requiring attention
    Error,
    /// System integrity or configuration at risk
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        };
        f.write_str(label)
    }
}

/// Standard interface for classifying errors
pub trait ErrorClassification {
    /// Can the failed operation be retried as-is?
    fn is_retryable(&self) -> bool;

    /// How serious is this error?
    fn severity(&self) -> ErrorSeverity;

    /// Does this error require immediate attention?
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }
}
