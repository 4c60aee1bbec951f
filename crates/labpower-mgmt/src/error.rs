//! Error types for power management operations

use labpower_connect::ConnectionError;
use thiserror::Error;

/// Error type for power management operations
#[derive(Debug, Error)]
pub enum PowerError {
    /// Generic power management failure
    #[error("power management error: {0}")]
    PowerManagement(String),

    /// SNMP request never got a usable answer from the PDU
    #[error("PDU configuration error: {0}")]
    PduConfiguration(String),

    /// PDU answered with a non-zero SNMP error status
    #[error("PDU SNMP error: {0}")]
    PduSnmp(String),

    /// Required command-line tool is missing on the host
    #[error("tool not available: {0}")]
    ToolNotAvailable(String),

    /// Invalid configuration or target
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// State name outside the backend's legal set
    #[error("unsupported state '{state}' for {backend}")]
    UnsupportedState { state: String, backend: &'static str },

    /// Operation not offered by the backend
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Transport failure
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// HTTP client failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl PowerError {
    pub(crate) fn power(message: impl Into<String>) -> Self {
        PowerError::PowerManagement(message.into())
    }
}

/// Result type for power management operations
pub type Result<T> = std::result::Result<T, PowerError>;
