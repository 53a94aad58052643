// # TCP Prober
//
// Measures a candidate by timing TCP handshakes against a fixed port.
//
// ## Why TCP
//
// A handshake towards the port the service actually listens on needs no
// privileges or sysctl tuning, works where ICMP is filtered and reflects what
// clients of the published record will see. `failover-probe-icmp` is the echo
// based alternative.
//
// ## Accounting
//
// - Each sample is one `connect()`, paced by `failover_core::sampling`
// - A completed handshake is a reply, its duration the round-trip time
// - A refused, unreachable or timed-out connection is a lost packet

use async_trait::async_trait;
use failover_core::config::ProberConfig;
use failover_core::model::ProbeSample;
use failover_core::sampling::collect_samples;
use failover_core::traits::{Prober, ProberFactory};
use failover_core::{Error, ProviderRegistry, Result};

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::Instant;

/// Default port probed on every candidate
pub const DEFAULT_PORT: u16 = 443;

/// TCP handshake prober
#[derive(Debug, Clone)]
pub struct TcpProber {
    port: u16,
}

impl TcpProber {
    /// Create a prober connecting to `port`
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    /// Port connected to on every candidate
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Default for TcpProber {
    fn default() -> Self {
        Self::new(DEFAULT_PORT)
    }
}

/// Time one handshake; `None` when it did not complete in time
async fn connect_once(target: SocketAddr, budget: Duration) -> Option<Duration> {
    let start = Instant::now();
    match tokio::time::timeout(budget, TcpStream::connect(target)).await {
        Ok(Ok(stream)) => {
            let elapsed = start.elapsed();
            drop(stream);
            Some(elapsed)
        }
        Ok(Err(e)) => {
            tracing::trace!("Connect to {} failed: {}", target, e);
            None
        }
        Err(_) => {
            tracing::trace!("Connect to {} timed out after {:?}", target, budget);
            None
        }
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(
        &self,
        address: &str,
        timeout: Duration,
        sample_count: u32,
    ) -> Result<ProbeSample> {
        let ip: IpAddr = address
            .trim()
            .parse()
            .map_err(|_| Error::probe_failure(address, "not an IP address"))?;
        if sample_count == 0 {
            return Err(Error::probe_failure(address, "sample count must be at least 1"));
        }

        let target = SocketAddr::new(ip, self.port);
        let sample = collect_samples(address, timeout, sample_count, |_, budget| {
            connect_once(target, budget)
        })
        .await;

        tracing::debug!(
            "TCP probe {}: {}/{} handshakes, avg {:.1}ms",
            target,
            sample.packets_received,
            sample.packets_sent,
            sample.average_rtt_millis
        );

        Ok(sample)
    }

    fn prober_name(&self) -> &'static str {
        "tcp"
    }
}

/// Factory for creating TCP probers
pub struct TcpProberFactory;

impl ProberFactory for TcpProberFactory {
    fn create(&self, config: &ProberConfig) -> Result<Box<dyn Prober>> {
        match config {
            ProberConfig::Tcp { port } => {
                if *port == 0 {
                    return Err(Error::config("TCP probe port must be > 0"));
                }
                Ok(Box::new(TcpProber::new(*port)))
            }
            _ => Err(Error::config("Invalid config for TCP prober")),
        }
    }
}

/// Register the TCP prober with a registry
pub fn register(registry: &ProviderRegistry) {
    registry.register_prober("tcp", Box::new(TcpProberFactory));
}
