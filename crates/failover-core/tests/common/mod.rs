//! Test doubles and common utilities for contract tests
//!
//! The doubles are scripted rather than simulated: a test states up front
//! what each address measures and what the provider holds, then inspects the
//! calls that were made.

#![allow(dead_code)]

use failover_core::config::{
    DomainConfig, EngineConfig, FailoverConfig, ProbeConfig, ProberConfig, ProviderConfig,
    RecordType,
};
use failover_core::error::{Error, Result};
use failover_core::model::{DesiredRecord, ProbeSample, RemoteRecord};
use failover_core::traits::{DnsProvider, Prober};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a scripted address does when probed
#[derive(Debug, Clone)]
pub enum ProbeScript {
    /// Every probe answered with this round-trip time
    Latency(u32),
    /// Nothing answered
    Unreachable,
    /// The probe itself fails
    Fail,
    /// Sleep before answering with this round-trip time
    Slow(Duration, u32),
}

/// Latency that scores exactly `score` with zero loss
///
/// With no loss the score is `100 - 0.08 * latency`.
pub fn latency_for_score(score: u32) -> u32 {
    (100 - score) * 25 / 2
}

/// A prober answering from a script, counting calls per address
#[derive(Clone, Default)]
pub struct ScriptedProber {
    scripts: Arc<Mutex<HashMap<String, ProbeScript>>>,
    calls: Arc<Mutex<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl ScriptedProber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script one address
    pub fn with(self, address: &str, script: ProbeScript) -> Self {
        self.set(address, script);
        self
    }

    /// Change the script of one address while the engine runs
    pub fn set(&self, address: &str, script: ProbeScript) {
        self.scripts
            .lock()
            .unwrap()
            .insert(address.to_string(), script);
    }

    /// Addresses probed so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of probes of one address
    pub fn call_count(&self, address: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.as_str() == address)
            .count()
    }

    /// Highest number of probes that were running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Prober for ScriptedProber {
    async fn probe(
        &self,
        address: &str,
        _timeout: Duration,
        sample_count: u32,
    ) -> Result<ProbeSample> {
        self.calls.lock().unwrap().push(address.to_string());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or(ProbeScript::Fail);

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let answered = |rtt: u32| ProbeSample {
            address: address.to_string(),
            packets_sent: sample_count,
            packets_received: sample_count,
            average_rtt_millis: f64::from(rtt),
        };

        let outcome = match script {
            ProbeScript::Latency(rtt) => Ok(answered(rtt)),
            ProbeScript::Unreachable => Ok(ProbeSample {
                address: address.to_string(),
                packets_sent: sample_count,
                packets_received: 0,
                average_rtt_millis: 0.0,
            }),
            ProbeScript::Fail => Err(Error::probe_failure(address, "scripted failure")),
            ProbeScript::Slow(delay, rtt) => {
                tokio::time::sleep(delay).await;
                Ok(answered(rtt))
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    fn prober_name(&self) -> &'static str {
        "scripted"
    }
}

/// One provider call, as observed by the recording provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    FindZone(String),
    List(String),
    Create(String),
    Update { id: String, ip: String },
    Delete(String),
}

#[derive(Default)]
struct ProviderState {
    zones: HashMap<String, String>,
    records: Vec<RemoteRecord>,
    calls: Vec<ProviderCall>,
    next_id: usize,
    failing_creates: HashSet<String>,
    failing_deletes: HashSet<String>,
    fail_list: bool,
}

/// An in-memory provider that records every call
///
/// Clones share state, so a test can keep one handle while the engine owns
/// another.
#[derive(Clone, Default)]
pub struct RecordingProvider {
    state: Arc<Mutex<ProviderState>>,
}

impl RecordingProvider {
    /// Provider hosting a single zone
    pub fn with_zone(zone_name: &str, zone_id: &str) -> Self {
        let provider = Self::default();
        provider
            .state
            .lock()
            .unwrap()
            .zones
            .insert(zone_name.to_string(), zone_id.to_string());
        provider
    }

    /// Seed an existing A record
    pub fn seed(&self, name: &str, ip: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = format!("seed-{}", state.next_id);
        state.next_id += 1;
        let zone_id = zone_for(&state.zones, name).unwrap_or_default();
        state.records.push(RemoteRecord {
            id: id.clone(),
            domain_name: name.to_string(),
            ip: ip.to_string(),
            record_type: RecordType::A,
            proxied: false,
            zone_id,
        });
        id
    }

    /// Make creates of one IP fail
    pub fn fail_create(&self, ip: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_creates
            .insert(ip.to_string());
    }

    /// Make deletes of one record ID fail
    pub fn fail_delete(&self, id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_deletes
            .insert(id.to_string());
    }

    /// Make listing fail
    pub fn fail_list(&self) {
        self.state.lock().unwrap().fail_list = true;
    }

    /// IPs currently held for a name, sorted
    pub fn ips(&self, name: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut ips: Vec<String> = state
            .records
            .iter()
            .filter(|r| r.domain_name == name)
            .map(|r| r.ip.clone())
            .collect();
        ips.sort();
        ips
    }

    /// Every call so far
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Mutating calls only
    pub fn mutations(&self) -> Vec<ProviderCall> {
        self.calls()
            .into_iter()
            .filter(|c| {
                matches!(
                    c,
                    ProviderCall::Create(_) | ProviderCall::Update { .. } | ProviderCall::Delete(_)
                )
            })
            .collect()
    }

    /// Forget recorded calls, keep records
    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }
}

fn zone_for(zones: &HashMap<String, String>, name: &str) -> Option<String> {
    let mut candidate = name;
    loop {
        if let Some(id) = zones.get(candidate) {
            return Some(id.clone());
        }
        candidate = candidate.split_once('.')?.1;
    }
}

#[async_trait::async_trait]
impl DnsProvider for RecordingProvider {
    async fn find_zone(&self, domain: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProviderCall::FindZone(domain.to_string()));
        zone_for(&state.zones, domain).ok_or_else(|| Error::zone_not_found(domain))
    }

    async fn list_records(
        &self,
        zone_id: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<Vec<RemoteRecord>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProviderCall::List(name.to_string()));
        if state.fail_list {
            return Err(Error::http("scripted list failure"));
        }
        Ok(state
            .records
            .iter()
            .filter(|r| r.zone_id == zone_id && r.domain_name == name && r.record_type == record_type)
            .cloned()
            .collect())
    }

    async fn create_record(&self, zone_id: &str, record: &DesiredRecord) -> Result<RemoteRecord> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProviderCall::Create(record.ip.clone()));
        if state.failing_creates.contains(&record.ip) {
            return Err(Error::http("scripted create failure"));
        }
        let id = format!("rec-{}", state.next_id);
        state.next_id += 1;
        let created = RemoteRecord {
            id,
            domain_name: record.domain_name.clone(),
            ip: record.ip.clone(),
            record_type: record.record_type,
            proxied: record.proxied,
            zone_id: zone_id.to_string(),
        };
        state.records.push(created.clone());
        Ok(created)
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        record: &DesiredRecord,
    ) -> Result<RemoteRecord> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProviderCall::Update {
            id: record_id.to_string(),
            ip: record.ip.clone(),
        });
        let existing = state
            .records
            .iter_mut()
            .find(|r| r.id == record_id && r.zone_id == zone_id)
            .ok_or_else(|| Error::not_found(record_id))?;
        existing.ip = record.ip.clone();
        existing.proxied = record.proxied;
        Ok(existing.clone())
    }

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProviderCall::Delete(record_id.to_string()));
        if state.failing_deletes.contains(record_id) {
            return Err(Error::http("scripted delete failure"));
        }
        let before = state.records.len();
        state
            .records
            .retain(|r| !(r.id == record_id && r.zone_id == zone_id));
        if state.records.len() == before {
            return Err(Error::not_found(record_id));
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "recording"
    }
}

/// Desired A record for a name
pub fn desired(name: &str, ip: &str) -> DesiredRecord {
    DesiredRecord {
        domain_name: name.to_string(),
        ip: ip.to_string(),
        record_type: RecordType::A,
        proxied: false,
    }
}

/// Helper to create a minimal FailoverConfig for testing
pub fn minimal_config(domains: Vec<DomainConfig>) -> FailoverConfig {
    FailoverConfig {
        provider: ProviderConfig::Cloudflare {
            api_token: "test-token".to_string(),
            email: None,
            zone_id: None,
            dry_run: false,
        },
        prober: ProberConfig::default(),
        probe: ProbeConfig {
            interval_secs: 60,
            timeout_ms: 1000,
            samples: 4,
        },
        domains,
        engine: EngineConfig {
            startup_stagger_ms: 0,
            event_channel_capacity: 100,
            update_in_place: false,
        },
    }
}

/// Domain with the given candidate groups
pub fn domain(name: &str, groups: &[&str]) -> DomainConfig {
    DomainConfig::new(name, groups.iter().map(|g| g.to_string()).collect())
}
