use thiserror::Error;

/// Result type alias for probing operations
pub type Result<T> = std::result::Result<T, ProbeError>;

/// Errors from the probing layer.
///
/// DNS failures are never reported here: they become `UNKNOWN` probe
/// results. These variants cover setup and caller mistakes only.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Fan-out was asked to check an IP against no zones
    #[error("zone list must contain at least one zone")]
    EmptyZoneList,

    /// The resolver could not be constructed
    #[error("resolver error: {0}")]
    Resolver(String),

    /// Contract violation reported by the core
    #[error(transparent)]
    Core(#[from] dnsbl_core::CoreError),
}
