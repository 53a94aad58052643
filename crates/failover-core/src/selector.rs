//! Candidate selection
//!
//! Probes every candidate of a domain, scores the successful samples and
//! keeps the best one per group (or across all groups). Probe failures only
//! remove the failing address from this cycle.
//!
//! Probes of one domain fan out concurrently. Outcomes are put back in
//! configuration order before any comparison, so the first-seen tie-break
//! does not depend on which probe finished first.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::{RecordType, SelectionMode};
use crate::error::{Error, Result};
use crate::model::{split_addresses, DesiredRecord, DomainSpec, ProbePolicy, QualityResult, SelectedAddress};
use crate::scoring;
use crate::traits::Prober;

/// Slack on top of the probe budget before a probe call is abandoned
const PROBE_GRACE: Duration = Duration::from_secs(1);

/// A candidate that could not be scored this cycle
#[derive(Debug)]
pub struct ProbeFailureReport {
    /// Group the address belongs to
    pub group: usize,
    /// Candidate address
    pub address: String,
    /// Why it was excluded
    pub error: Error,
}

/// Outcome of selecting a domain's addresses for one cycle
#[derive(Debug, Default)]
pub struct DomainSelection {
    /// Winners in group order; one entry per group in per-group mode, a
    /// single entry in single mode. `None` marks a group without any
    /// successfully probed candidate.
    pub winners: Vec<Option<SelectedAddress>>,
    /// Candidates excluded by probe failures
    pub failures: Vec<ProbeFailureReport>,
}

impl DomainSelection {
    /// Selected addresses in group order, without duplicates
    pub fn addresses(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for selected in self.winners.iter().flatten() {
            if !seen.contains(&selected.address()) {
                seen.push(selected.address());
            }
        }
        seen
    }

    /// Desired record set for the domain
    pub fn desired_records(&self, spec: &DomainSpec) -> Vec<DesiredRecord> {
        self.addresses()
            .into_iter()
            .map(|ip| spec.desired_record(ip))
            .collect()
    }

    /// True when no group produced a winner
    pub fn is_empty(&self) -> bool {
        self.winners.iter().all(Option::is_none)
    }
}

/// Probes and ranks candidate addresses
#[derive(Clone)]
pub struct CandidateSelector {
    prober: Arc<dyn Prober>,
}

impl CandidateSelector {
    /// Create a selector on top of a probe transport
    pub fn new(prober: Arc<dyn Prober>) -> Self {
        Self { prober }
    }

    /// Pick the best address of one of the domain's groups
    ///
    /// The group entry may be a comma-separated list. Returns `None` when
    /// every address failed to probe, or when `group` is out of range.
    pub async fn select_best(&self, spec: &DomainSpec, group: usize) -> Option<QualityResult> {
        let entry = spec.candidate_groups.get(group)?;
        let candidates: Vec<(usize, String)> = split_addresses(entry)
            .into_iter()
            .map(|address| (group, address))
            .collect();

        let outcomes = self
            .probe_all(&candidates, &spec.policy, spec.record_type)
            .await;
        let mut scored = Vec::with_capacity(outcomes.len());
        for ((_, address), outcome) in candidates.into_iter().zip(outcomes) {
            match outcome {
                Ok(quality) => scored.push(quality),
                Err(e) => warn!("Probe {} failed, skipping: {}", address, e),
            }
        }

        best_in_group(&spec.name, group, scored, |quality| quality)
    }

    /// Select the desired addresses of a domain for this cycle
    pub async fn select_for_domain(&self, spec: &DomainSpec) -> DomainSelection {
        let candidates: Vec<(usize, String)> = spec
            .candidate_groups
            .iter()
            .enumerate()
            .flat_map(|(group, entry)| {
                split_addresses(entry)
                    .into_iter()
                    .map(move |address| (group, address))
            })
            .collect();

        let outcomes = self
            .probe_all(&candidates, &spec.policy, spec.record_type)
            .await;

        let mut per_group: Vec<Vec<SelectedAddress>> = vec![Vec::new(); spec.candidate_groups.len()];
        let mut failures = Vec::new();

        for ((group, address), outcome) in candidates.into_iter().zip(outcomes) {
            match outcome {
                Ok(quality) => {
                    info!(
                        "Probe {}: latency={}ms loss={:.2} quality={:.2}",
                        address, quality.latency_millis, quality.loss_rate, quality.quality_score
                    );
                    per_group[group].push(SelectedAddress { group, quality });
                }
                Err(error) => {
                    warn!("Probe {} failed, skipping: {}", address, error);
                    failures.push(ProbeFailureReport {
                        group,
                        address,
                        error,
                    });
                }
            }
        }

        let winners = match spec.selection {
            SelectionMode::PerGroup => per_group
                .into_iter()
                .enumerate()
                .map(|(group, scored)| {
                    best_in_group(&spec.name, group, scored, |selected| &selected.quality)
                })
                .collect(),
            SelectionMode::Single => {
                let best = pick_best_by(per_group.into_iter().flatten(), |selected| {
                    &selected.quality
                });
                if best.is_none() {
                    warn!("No candidate available for {}", spec.name);
                }
                vec![best]
            }
        };

        DomainSelection { winners, failures }
    }

    /// Probe every candidate concurrently, returning outcomes in input order
    async fn probe_all(
        &self,
        candidates: &[(usize, String)],
        policy: &ProbePolicy,
        record_type: RecordType,
    ) -> Vec<Result<QualityResult>> {
        let mut slots: Vec<Option<Result<QualityResult>>> =
            candidates.iter().map(|_| None).collect();
        let mut tasks = JoinSet::new();

        for (index, (_, address)) in candidates.iter().enumerate() {
            if let Ok(ip) = address.parse::<IpAddr>()
                && !record_type.matches(&ip)
            {
                slots[index] = Some(Err(Error::probe_failure(
                    address.as_str(),
                    format!("address family does not match {} record", record_type),
                )));
                continue;
            }

            let prober = Arc::clone(&self.prober);
            let address = address.clone();
            let policy = *policy;
            tasks.spawn(async move {
                let outcome = probe_one(prober.as_ref(), &address, &policy).await;
                (index, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => debug!("Probe task did not complete: {}", e),
            }
        }

        slots
            .into_iter()
            .zip(candidates)
            .map(|(slot, (_, address))| {
                slot.unwrap_or_else(|| {
                    Err(Error::probe_failure(address.as_str(), "probe task aborted"))
                })
            })
            .collect()
    }
}

async fn probe_one(
    prober: &dyn Prober,
    address: &str,
    policy: &ProbePolicy,
) -> Result<QualityResult> {
    let call = prober.probe(address, policy.timeout, policy.sample_count);
    let sample = tokio::time::timeout(policy.timeout + PROBE_GRACE, call)
        .await
        .map_err(|_| Error::probe_failure(address, "probe exceeded its timeout"))??;

    debug!("Probe stats for {}: {:?}", address, sample);
    let mut quality = scoring::evaluate(&sample);
    quality.address = address.to_string();
    Ok(quality)
}

/// Running-best selection with first-seen priority on ties
pub fn pick_best(scored: impl IntoIterator<Item = QualityResult>) -> Option<QualityResult> {
    pick_best_by(scored, |quality| quality)
}

/// Running-best selection over anything carrying a quality result
pub fn pick_best_by<T>(
    scored: impl IntoIterator<Item = T>,
    quality: impl Fn(&T) -> &QualityResult,
) -> Option<T> {
    let mut best: Option<T> = None;
    for candidate in scored {
        match &best {
            Some(current) if !quality(&candidate).is_better_than(quality(current)) => {}
            _ => best = Some(candidate),
        }
    }
    best
}

/// Best of one group, warning when the whole group came up empty
fn best_in_group<T>(
    domain: &str,
    group: usize,
    scored: Vec<T>,
    quality: impl Fn(&T) -> &QualityResult,
) -> Option<T> {
    let best = pick_best_by(scored, quality);
    if best.is_none() {
        warn!(
            "{}",
            Error::NoCandidateAvailable {
                domain: domain.to_string(),
                group,
            }
        );
    }
    best
}
