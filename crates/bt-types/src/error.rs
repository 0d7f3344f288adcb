use std::fmt;

/// Single sum-typed error used across every core crate.
///
/// Each component crate (`bt-pnl`, `bt-execution`, `bt-risk`, ...) keeps its
/// own distinct error enum elsewhere in this codebase's lineage; here
/// they're deliberately collapsed into one taxonomy because the day loop
/// pipes a failure from any component straight up to the coordinator and a
/// caller needs to match on failure category, not on which crate raised it.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    InvalidArgument(String),
    NotInitialized(String),
    DataUnavailable(String),
    InvalidData(String),
    /// Defined for completeness of the taxonomy. Never constructed by the
    /// risk manager itself — it only reports a recommended scale via
    /// `RiskResult`. A caller that wants a hard stop on a risk breach
    /// raises this from the scale it receives.
    RiskLimitExceeded(String),
    /// Optimizer failures are warnings, not hard stops: a caller may
    /// swallow this and fall back to pre-optimization positions.
    OptimizationFailure(String),
    Cancelled,
    Internal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Error::NotInitialized(msg) => write!(f, "not initialized: {msg}"),
            Error::DataUnavailable(msg) => write!(f, "data unavailable: {msg}"),
            Error::InvalidData(msg) => write!(f, "invalid data: {msg}"),
            Error::RiskLimitExceeded(msg) => write!(f, "risk limit exceeded: {msg}"),
            Error::OptimizationFailure(msg) => write!(f, "optimization failure: {msg}"),
            Error::Cancelled => write!(f, "cancelled"),
            Error::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
