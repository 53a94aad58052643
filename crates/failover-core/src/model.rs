//! Data model shared by the selector, reconciler and scheduler
//!
//! Every value here is transient: samples and scores live for one probe,
//! desired and remote records for one reconciliation pass.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{RecordType, SelectionMode};

/// Aggregate result of probing one address
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSample {
    /// Address as it was probed
    pub address: String,
    /// Probes sent
    pub packets_sent: u32,
    /// Replies received
    pub packets_received: u32,
    /// Mean round-trip time over received replies
    pub average_rtt_millis: f64,
}

impl ProbeSample {
    /// Fraction of probes lost, clamped to [0, 1]
    ///
    /// A sample with nothing sent counts as total loss.
    pub fn loss_rate(&self) -> f64 {
        if self.packets_sent == 0 {
            return 1.0;
        }
        let received = f64::from(self.packets_received);
        let sent = f64::from(self.packets_sent);
        (1.0 - received / sent).clamp(0.0, 1.0)
    }
}

/// Score of one probed address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityResult {
    /// Address the score belongs to
    pub address: String,
    /// Latency used for scoring
    pub latency_millis: u32,
    /// Loss rate in [0, 1]
    pub loss_rate: f64,
    /// Quality in [0, 100], higher is better
    pub quality_score: f64,
}

impl QualityResult {
    /// Strict comparison used for best-candidate tracking
    ///
    /// Equal scores are not better, so the earlier candidate is kept.
    pub fn is_better_than(&self, other: &QualityResult) -> bool {
        self.quality_score > other.quality_score
    }
}

/// Runtime probe policy of one domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbePolicy {
    /// Time between cycles
    pub interval: Duration,
    /// Budget for probing one address
    pub timeout: Duration,
    /// Probes per address
    pub sample_count: u32,
}

/// Immutable per-domain settings resolved from the configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DomainSpec {
    /// Record name
    pub name: String,
    /// Record type
    pub record_type: RecordType,
    /// Proxied flag for created records
    pub proxied: bool,
    /// Ordered candidate groups, each possibly comma-separated
    pub candidate_groups: Vec<String>,
    /// Per-group or single selection
    pub selection: SelectionMode,
    /// Probe policy
    pub policy: ProbePolicy,
}

impl DomainSpec {
    /// Build the desired record for a selected address
    pub fn desired_record(&self, ip: impl Into<String>) -> DesiredRecord {
        DesiredRecord {
            domain_name: self.name.clone(),
            ip: ip.into(),
            record_type: self.record_type,
            proxied: self.proxied,
        }
    }
}

/// The winner of one candidate group
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedAddress {
    /// Group the address was chosen from
    pub group: usize,
    /// Its score
    pub quality: QualityResult,
}

impl SelectedAddress {
    /// Selected address
    pub fn address(&self) -> &str {
        &self.quality.address
    }
}

/// A record the domain should have after this cycle
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DesiredRecord {
    /// Record name
    pub domain_name: String,
    /// Record content
    pub ip: String,
    /// Record type
    pub record_type: RecordType,
    /// Proxied flag
    pub proxied: bool,
}

/// A record as the provider reports it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Provider record handle
    pub id: String,
    /// Record name
    pub domain_name: String,
    /// Record content
    pub ip: String,
    /// Record type
    pub record_type: RecordType,
    /// Proxied flag
    pub proxied: bool,
    /// Zone the record lives in
    pub zone_id: String,
}

/// Split one configured candidate entry into individual addresses
///
/// Entries may hold comma-separated lists; blanks are dropped.
pub fn split_addresses(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
