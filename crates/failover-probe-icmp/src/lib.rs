// # ICMP Prober
//
// Measures a candidate with ICMP echo requests, the classic ping.
//
// ## Sockets
//
// Echo requests go out through `SOCK_DGRAM` ICMP sockets, which Linux grants
// to unprivileged processes whose group is inside
// `net.ipv4.ping_group_range` (macOS allows them to everyone). A host that
// refuses the socket fails every probe rather than reporting total loss. One
// socket per address family is opened on first use and shared by every probe
// afterwards; a failed open is retried on the next probe.
//
// ## Accounting
//
// - Each sample is one echo request, paced by `failover_core::sampling`
// - An echo reply is a reply, its delay the round-trip time
// - A timeout or a send error is a lost packet
// - A socket that cannot be opened fails the probe
//
// `failover-probe-tcp` is the alternative for hosts where ICMP sockets are
// unavailable or ICMP is filtered on the path.

use async_trait::async_trait;
use failover_core::config::{ProberConfig, MAX_ICMP_PAYLOAD_SIZE};
use failover_core::model::ProbeSample;
use failover_core::sampling::collect_samples;
use failover_core::traits::{Prober, ProberFactory};
use failover_core::{Error, ProviderRegistry, Result};

use std::net::IpAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use surge_ping::{Client, Config, PingIdentifier, PingSequence, SurgeError, ICMP};
use tokio::sync::OnceCell;

/// Default echo payload size, as sent by ping(8)
pub const DEFAULT_PAYLOAD_SIZE: usize = 56;

/// Echo identifiers handed out to successive probes
static NEXT_IDENTIFIER: AtomicU16 = AtomicU16::new(0);

/// ICMP echo prober
pub struct IcmpProber {
    payload: Vec<u8>,
    v4: OnceCell<Client>,
    v6: OnceCell<Client>,
}

impl IcmpProber {
    /// Create a prober sending `payload_size` bytes per echo request
    pub fn new(payload_size: usize) -> Self {
        Self {
            payload: vec![0; payload_size],
            v4: OnceCell::new(),
            v6: OnceCell::new(),
        }
    }

    /// Bytes of payload per echo request
    pub fn payload_size(&self) -> usize {
        self.payload.len()
    }

    /// Socket for the address family of `ip`, opened on first use
    async fn client(&self, ip: IpAddr) -> std::io::Result<&Client> {
        let (cell, kind) = match ip {
            IpAddr::V4(_) => (&self.v4, ICMP::V4),
            IpAddr::V6(_) => (&self.v6, ICMP::V6),
        };
        cell.get_or_try_init(|| async move {
            let config = Config::builder().kind(kind).build();
            Client::new(&config)
        })
        .await
    }
}

impl Default for IcmpProber {
    fn default() -> Self {
        Self::new(DEFAULT_PAYLOAD_SIZE)
    }
}

/// Identifier for one probe, distinct across concurrent probes of this process
fn next_identifier() -> u16 {
    let base = std::process::id() as u16;
    base.wrapping_add(NEXT_IDENTIFIER.fetch_add(1, Ordering::Relaxed))
}

/// Send one echo request; `None` when no reply arrived in time
async fn echo_once(
    client: &Client,
    ip: IpAddr,
    identifier: u16,
    sequence: u16,
    budget: Duration,
    payload: &[u8],
) -> Option<Duration> {
    let mut pinger = client.pinger(ip, PingIdentifier(identifier)).await;
    pinger.timeout(budget);
    match pinger.ping(PingSequence(sequence), payload).await {
        Ok((_, rtt)) => Some(rtt),
        Err(SurgeError::Timeout { .. }) => {
            tracing::trace!("Echo {} to {} timed out after {:?}", sequence, ip, budget);
            None
        }
        Err(e) => {
            tracing::trace!("Echo {} to {} failed: {}", sequence, ip, e);
            None
        }
    }
}

#[async_trait]
impl Prober for IcmpProber {
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

        let client = self.client(ip).await.map_err(|e| {
            Error::probe_failure(address, format!("cannot open ICMP socket: {}", e))
        })?;
        let identifier = next_identifier();
        let payload = self.payload.as_slice();

        let sample = collect_samples(address, timeout, sample_count, |sequence, budget| {
            echo_once(client, ip, identifier, sequence, budget, payload)
        })
        .await;

        tracing::debug!(
            "ICMP probe {}: {}/{} replies, avg {:.1}ms",
            ip,
            sample.packets_received,
            sample.packets_sent,
            sample.average_rtt_millis
        );

        Ok(sample)
    }

    fn prober_name(&self) -> &'static str {
        "icmp"
    }
}

/// Factory for creating ICMP probers
pub struct IcmpProberFactory;

impl ProberFactory for IcmpProberFactory {
    fn create(&self, config: &ProberConfig) -> Result<Box<dyn Prober>> {
        match config {
            ProberConfig::Icmp { payload_size } => {
                if *payload_size > MAX_ICMP_PAYLOAD_SIZE {
                    return Err(Error::config(format!(
                        "ICMP payload_size must be <= {}",
                        MAX_ICMP_PAYLOAD_SIZE
                    )));
                }
                Ok(Box::new(IcmpProber::new(*payload_size)))
            }
            _ => Err(Error::config("Invalid config for ICMP prober")),
        }
    }
}

/// Register the ICMP prober with a registry
pub fn register(registry: &ProviderRegistry) {
    registry.register_prober("icmp", Box::new(IcmpProberFactory));
}
