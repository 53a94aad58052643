//! Failover engine
//!
//! The FailoverEngine is responsible for:
//! - Running one independent scheduler task per configured domain
//! - Asking the candidate selector for the best address(es) on every tick
//! - Handing the desired record set to the reconciler
//! - Emitting events for monitoring
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ domain task  │─── tick ───┐        (one per domain)
//! └──────────────┘            │
//!                             ▼
//!                   ┌──────────────────┐
//!                   │ CandidateSelector│── Prober
//!                   └──────────────────┘
//!                             │ desired set
//!                             ▼
//!                   ┌──────────────────┐
//!                   │   Reconciler     │── DnsProvider
//!                   └──────────────────┘
//!                             │
//!                             ▼
//!                       EngineEvent channel
//! ```
//!
//! ## Cycle
//!
//! 1. Probe every candidate of the domain and score the samples
//! 2. Keep the best address per group (or one overall)
//! 3. Reconcile the provider's records onto the selected addresses
//! 4. Emit events describing what happened
//!
//! A cycle never aborts the domain task. Failures are logged and the next
//! tick is the retry.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::FailoverConfig;
use crate::error::Result;
use crate::model::DomainSpec;
use crate::reconciler::{AppliedOperation, ReconcileOutcome, Reconciler};
use crate::selector::CandidateSelector;
use crate::traits::{DnsProvider, Prober};

/// Events emitted by the FailoverEngine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Engine started
    Started {
        domains_count: usize,
    },

    /// A domain cycle began
    CycleStarted {
        domain: String,
        at: DateTime<Utc>,
    },

    /// A candidate could not be probed and was excluded this cycle
    ProbeFailed {
        domain: String,
        address: String,
        error: String,
    },

    /// Best candidate of a group
    CandidateSelected {
        domain: String,
        group: usize,
        address: String,
        quality_score: f64,
    },

    /// Every candidate of a group failed
    NoCandidate {
        domain: String,
        group: usize,
    },

    /// Record created
    RecordCreated {
        domain: String,
        ip: String,
    },

    /// Record rewritten in place
    RecordUpdated {
        domain: String,
        previous_ip: String,
        ip: String,
    },

    /// Record deleted
    RecordDeleted {
        domain: String,
        ip: String,
    },

    /// Zone lookup, listing, or a single record operation failed
    OperationFailed {
        domain: String,
        error: String,
    },

    /// Nothing was selected, remote records were left untouched
    ReconciliationSkipped {
        domain: String,
        reason: String,
    },

    /// A domain cycle finished
    CycleCompleted {
        domain: String,
        changes: usize,
        failures: usize,
        at: DateTime<Utc>,
    },

    /// Engine stopped
    Stopped {
        reason: String,
    },
}

/// Core failover engine
///
/// ## Lifecycle
///
/// 1. Create with [`FailoverEngine::new()`]
/// 2. Start with [`FailoverEngine::run()`]
/// 3. Every domain runs a cycle immediately, then once per interval
/// 4. Engine runs until a shutdown signal is received
///
/// ## Scheduling
///
/// Each domain owns a task with its own interval. A cycle is awaited inside
/// the task, so cycles of one domain never overlap; ticks missed while a
/// cycle runs are skipped. Domains share nothing mutable.
///
/// ## Load Resistance
///
/// - **Bounded event channel**: events are dropped (logged) when full
/// - **Startup stagger**: domain `i` starts `i * startup_stagger_ms` late
pub struct FailoverEngine {
    runner: CycleRunner,

    /// Domains to manage, inheritance already resolved
    domains: Vec<DomainSpec>,

    /// Delay between the starts of consecutive domain tasks
    startup_stagger: Duration,
}

impl FailoverEngine {
    /// Create a new failover engine
    ///
    /// # Parameters
    ///
    /// - `prober`: Probe transport
    /// - `provider`: DNS provider implementation
    /// - `config`: Failover configuration (validated here)
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        prober: Box<dyn Prober>,
        provider: Box<dyn DnsProvider>,
        config: FailoverConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let runner = CycleRunner {
            selector: CandidateSelector::new(Arc::from(prober)),
            reconciler: Reconciler::new(Arc::from(provider))
                .with_update_in_place(config.engine.update_in_place),
            event_tx: tx,
        };

        let engine = Self {
            runner,
            domains: config.domain_specs(),
            startup_stagger: Duration::from_millis(config.engine.startup_stagger_ms),
        };

        Ok((engine, rx))
    }

    /// Domains managed by this engine
    pub fn domains(&self) -> &[DomainSpec] {
        &self.domains
    }

    /// Run the engine until Ctrl-C
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: The signal handler could not be installed
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the engine with a controlled shutdown signal
    ///
    /// Dropping the sender counts as a shutdown request.
    pub async fn run_with_shutdown(&self, shutdown_rx: oneshot::Receiver<()>) -> Result<()> {
        self.run_internal(Some(shutdown_rx)).await
    }

    /// Run one cycle for a single domain
    pub async fn run_cycle(&self, spec: &DomainSpec) -> Result<ReconcileOutcome> {
        self.runner.run_cycle(spec).await
    }

    async fn run_internal(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.runner.emit_event(EngineEvent::Started {
            domains_count: self.domains.len(),
        });
        info!("Failover engine started with {} domain(s)", self.domains.len());

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();

        for (index, spec) in self.domains.iter().cloned().enumerate() {
            let delay = self
                .startup_stagger
                .saturating_mul(u32::try_from(index).unwrap_or(u32::MAX));
            let span = info_span!("domain", domain = %spec.name);
            tasks.spawn(
                domain_loop(self.runner.clone(), spec, delay, stop_rx.clone()).instrument(span),
            );
        }

        let signal = match shutdown_rx {
            Some(rx) => {
                let _ = rx.await;
                Ok(())
            }
            None => tokio::signal::ctrl_c().await,
        };

        info!("Shutdown signal received");
        let _ = stop_tx.send(true);

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Domain task ended abnormally: {}", e);
            }
        }

        self.runner.emit_event(EngineEvent::Stopped {
            reason: "Shutdown signal".to_string(),
        });
        info!("All domain tasks stopped, engine stopped");

        signal.map_err(Into::into)
    }
}

/// Everything a domain task needs to run cycles
#[derive(Clone)]
struct CycleRunner {
    selector: CandidateSelector,
    reconciler: Reconciler,
    event_tx: mpsc::Sender<EngineEvent>,
}

impl CycleRunner {
    async fn run_cycle(&self, spec: &DomainSpec) -> Result<ReconcileOutcome> {
        let span = info_span!("cycle", domain = %spec.name);
        self.run_cycle_inner(spec).instrument(span).await
    }

    async fn run_cycle_inner(&self, spec: &DomainSpec) -> Result<ReconcileOutcome> {
        let domain = spec.name.clone();
        debug!("Cycle started");
        self.emit_event(EngineEvent::CycleStarted {
            domain: domain.clone(),
            at: Utc::now(),
        });

        let selection = self.selector.select_for_domain(spec).await;

        for failure in &selection.failures {
            self.emit_event(EngineEvent::ProbeFailed {
                domain: domain.clone(),
                address: failure.address.clone(),
                error: failure.error.to_string(),
            });
        }

        for (group, winner) in selection.winners.iter().enumerate() {
            match winner {
                Some(selected) => {
                    info!(
                        "Selected {} for group {} (quality={:.2})",
                        selected.address(),
                        group,
                        selected.quality.quality_score
                    );
                    self.emit_event(EngineEvent::CandidateSelected {
                        domain: domain.clone(),
                        group,
                        address: selected.address().to_string(),
                        quality_score: selected.quality.quality_score,
                    });
                }
                None => self.emit_event(EngineEvent::NoCandidate {
                    domain: domain.clone(),
                    group,
                }),
            }
        }

        let desired = selection.desired_records(spec);
        let result = self.reconciler.reconcile(&spec.name, &desired).await;

        let (changes, failures) = match &result {
            Ok(ReconcileOutcome::Skipped) => {
                self.emit_event(EngineEvent::ReconciliationSkipped {
                    domain: domain.clone(),
                    reason: "no candidate available".to_string(),
                });
                (0, 0)
            }
            Ok(ReconcileOutcome::Applied(report)) => {
                for applied in &report.applied {
                    self.emit_event(applied_event(&domain, applied));
                }
                for failure in &report.failures {
                    self.emit_event(EngineEvent::OperationFailed {
                        domain: domain.clone(),
                        error: failure.to_string(),
                    });
                }
                (report.applied.len(), report.failures.len())
            }
            Err(e) => {
                error!("Reconciliation failed: {}", e);
                self.emit_event(EngineEvent::OperationFailed {
                    domain: domain.clone(),
                    error: e.to_string(),
                });
                (0, 1)
            }
        };

        debug!("Cycle completed: {} change(s), {} failure(s)", changes, failures);
        self.emit_event(EngineEvent::CycleCompleted {
            domain,
            changes,
            failures,
            at: Utc::now(),
        });

        result
    }

    /// Send an event without ever blocking the cycle
    fn emit_event(&self, event: EngineEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody is listening
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

fn applied_event(domain: &str, applied: &AppliedOperation) -> EngineEvent {
    match applied {
        AppliedOperation::Created(record) => EngineEvent::RecordCreated {
            domain: domain.to_string(),
            ip: record.ip.clone(),
        },
        AppliedOperation::Updated { previous, current } => EngineEvent::RecordUpdated {
            domain: domain.to_string(),
            previous_ip: previous.ip.clone(),
            ip: current.ip.clone(),
        },
        AppliedOperation::Deleted(record) => EngineEvent::RecordDeleted {
            domain: domain.to_string(),
            ip: record.ip.clone(),
        },
    }
}

/// Per-domain scheduler: run immediately, then once per interval
async fn domain_loop(
    runner: CycleRunner,
    spec: DomainSpec,
    start_delay: Duration,
    mut stop: watch::Receiver<bool>,
) {
    if !start_delay.is_zero() {
        tokio::select! {
            _ = tokio::time::sleep(start_delay) => {}
            _ = stop.changed() => return,
        }
    }

    // The first tick completes immediately
    let mut interval = tokio::time::interval(spec.policy.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ticks = IntervalStream::new(interval);

    loop {
        tokio::select! {
            biased;
            _ = stop.changed() => break,
            tick = ticks.next() => {
                if tick.is_none() {
                    break;
                }
                tokio::select! {
                    biased;
                    _ = stop.changed() => {
                        debug!("Cycle interrupted by shutdown");
                        break;
                    }
                    _ = runner.run_cycle(&spec) => {}
                }
            }
        }
    }

    debug!("Domain task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecordType;
    use crate::model::RemoteRecord;

    fn record(ip: &str) -> RemoteRecord {
        RemoteRecord {
            id: format!("id-{}", ip),
            domain_name: "example.com".to_string(),
            ip: ip.to_string(),
            record_type: RecordType::A,
            proxied: false,
            zone_id: "zone".to_string(),
        }
    }

    #[test]
    fn test_applied_event_mapping() {
        let event = applied_event(
            "example.com",
            &AppliedOperation::Updated {
                previous: record("10.0.0.2"),
                current: record("10.0.0.1"),
            },
        );
        assert_eq!(
            event,
            EngineEvent::RecordUpdated {
                domain: "example.com".to_string(),
                previous_ip: "10.0.0.2".to_string(),
                ip: "10.0.0.1".to_string(),
            }
        );

        let event = applied_event("example.com", &AppliedOperation::Deleted(record("10.0.0.2")));
        assert!(matches!(event, EngineEvent::RecordDeleted { ip, .. } if ip == "10.0.0.2"));
    }
}
