//! Error types for the beam-spot monitor.

/// Protocol misuse of the interval lifecycle.
///
/// These are programming errors in the caller. They are always logged and, in
/// strict mode, escalate to a panic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    /// `open` was called for an interval that is still open.
    IntervalAlreadyOpen(u32),
    /// The interval was never opened, or has already been closed and disposed.
    UnknownInterval(u32),
    /// A write or a second close reached an interval that is already closed.
    IntervalClosed(u32),
    /// The database estimate is resolved at open and cannot be replaced.
    DatabaseFixed(u32),
}

impl std::fmt::Display for MonitorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IntervalAlreadyOpen(id) => write!(f, "interval {} is already open", id),
            Self::UnknownInterval(id) => write!(f, "interval {} is not open", id),
            Self::IntervalClosed(id) => write!(f, "interval {} is already closed", id),
            Self::DatabaseFixed(id) => {
                write!(f, "database estimate of interval {} is fixed at open", id)
            }
        }
    }
}

impl std::error::Error for MonitorError {}

/// Failure of an external estimate provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider could not be reached or raised an error.
    Unavailable(String),
    /// The provider answered, but holds no valid record for the interval.
    NoRecord(u32),
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(reason) => write!(f, "provider unavailable: {}", reason),
            Self::NoRecord(id) => write!(f, "no valid record for interval {}", id),
        }
    }
}

impl std::error::Error for ProviderError {}
