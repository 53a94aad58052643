// # Prober Trait
//
// Defines the interface for actively measuring one candidate address.
//
// ## Implementations
//
// - TCP handshake timing: `failover-probe-tcp` crate
// - ICMP echo over unprivileged datagram sockets: `failover-probe-icmp` crate
//
// ## Usage
//
// ```rust,ignore
// use failover_core::Prober;
// use std::time::Duration;
//
// let sample = prober.probe("10.0.0.1", Duration::from_secs(3), 4).await?;
// println!("{}/{} replies", sample.packets_received, sample.packets_sent);
// ```

use async_trait::async_trait;
use std::time::Duration;

use crate::model::ProbeSample;

/// Trait for probe transports
///
/// # Contract
///
/// - Sends `sample_count` probes at a fixed ~100 ms spacing, bounded by
///   `timeout` overall
/// - An address that cannot be resolved or opened for probing returns
///   `Err(Error::ProbeFailure)`
/// - An unreachable address is a successful probe with
///   `packets_received = 0`
///
/// # Trust Level: Untrusted
///
/// Probers perform network I/O towards candidates only. They do not retry,
/// score, or decide anything; scoring and selection belong to the selector.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe one address
    ///
    /// # Parameters
    ///
    /// - `address`: Candidate address as configured (already trimmed)
    /// - `timeout`: Overall budget for all samples, > 0
    /// - `sample_count`: Number of probes to send, >= 1
    async fn probe(
        &self,
        address: &str,
        timeout: Duration,
        sample_count: u32,
    ) -> Result<ProbeSample, crate::Error>;

    /// Get the prober name (for logging/debugging)
    fn prober_name(&self) -> &'static str;
}

/// Helper trait for constructing probers from configuration
pub trait ProberFactory: Send + Sync {
    /// Create a Prober instance from configuration
    fn create(
        &self,
        config: &crate::config::ProberConfig,
    ) -> Result<Box<dyn Prober>, crate::Error>;
}
