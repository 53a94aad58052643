//! Error types for the failover engine
//!
//! Probe-side errors are recovered locally by the selector. Provider-side
//! errors are surfaced per operation and retried on the next scheduled tick.

use thiserror::Error;

/// Result type alias for failover operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the failover system
#[derive(Error, Debug)]
pub enum Error {
    /// The address could not be resolved or opened for probing
    #[error("Probe of {address} failed: {reason}")]
    ProbeFailure {
        /// Candidate address as configured
        address: String,
        /// Transport-level reason
        reason: String,
    },

    /// Every address in a candidate group failed to probe
    #[error("No candidate available in group {group} of {domain}")]
    NoCandidateAvailable {
        /// Domain name
        domain: String,
        /// Zero-based group index
        group: usize,
    },

    /// The provider has no zone matching the domain
    #[error("Zone not found for {0}")]
    ZoneNotFound(String),

    /// Listing remote records failed
    #[error("Record query failed: {0}")]
    QueryFailed(String),

    /// Creating a record failed
    #[error("Create of {ip} failed: {reason}")]
    CreateFailed {
        /// Address of the record that was not created
        ip: String,
        /// Provider message
        reason: String,
    },

    /// Rewriting a record in place failed
    #[error("Update of record {id} failed: {reason}")]
    UpdateFailed {
        /// Provider record handle
        id: String,
        /// Provider message
        reason: String,
    },

    /// Deleting a record failed
    #[error("Delete of record {id} failed: {reason}")]
    DeleteFailed {
        /// Provider record handle
        id: String,
        /// Provider message
        reason: String,
    },

    /// Invalid or incomplete configuration; fatal at startup
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Reading the configuration file failed
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// A provider response did not decode
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The provider API could not be reached or timed out
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Credentials rejected (401/403)
    #[error("Credentials rejected: {0}")]
    Authentication(String),

    /// Provider asked us to slow down (429)
    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    /// Provider object missing (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other provider-side failure, including 5xx responses
    #[error("{provider} returned an error: {message}")]
    Provider {
        provider: String,
        message: String,
    },
}

impl Error {
    /// Create a probe failure
    pub fn probe_failure(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ProbeFailure {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Create a "zone not found" error
    pub fn zone_not_found(domain: impl Into<String>) -> Self {
        Self::ZoneNotFound(domain.into())
    }

    /// Create a query failure
    pub fn query_failed(msg: impl Into<String>) -> Self {
        Self::QueryFailed(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// True for errors the selector recovers from by skipping the address
    pub fn is_probe_failure(&self) -> bool {
        matches!(self, Self::ProbeFailure { .. })
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}
