use thiserror::Error;

/// Result type alias for DNSBL core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by the decision core.
///
/// These are caller contract violations, never DNS failures: transient
/// network problems are folded into `UNKNOWN` probe results instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A component that needs at least one zone was given none
    #[error("zone list must contain at least one zone")]
    EmptyZoneList,

    /// A result was reported for a zone the tracker was not built with
    #[error("unknown DNSBL zone: {0}")]
    UnknownZone(String),

    /// A failed check was reported without saying how it failed
    #[error("failure kind is required when reporting a failed check for {zone}")]
    MissingFailureKind {
        /// Zone the failed check belongs to
        zone: String,
    },

    /// Invalid IPv4 address
    #[error("invalid IPv4 address: {0}")]
    InvalidIp(String),

    /// Empty or malformed zone name
    #[error("invalid DNSBL zone: {0:?}")]
    InvalidZone(String),

    /// A DNSBL query name could not be decoded
    #[error("invalid DNSBL query name: {0}")]
    InvalidQueryName(String),
}
