//! Record reconciliation
//!
//! Converges the provider's records for one name onto the desired set.
//! Desired and remote records are matched by IP string only; any other field
//! difference is ignored.
//!
//! ## Pass
//!
//! 1. Resolve the zone for the name
//! 2. List current records of the name and type
//! 3. Diff by IP into a [`ReconciliationPlan`]
//! 4. Apply creates (or in-place updates) first, then deletes
//!
//! Each operation is attempted independently. Failures are reported, never
//! retried within the pass.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::model::{DesiredRecord, RemoteRecord};
use crate::traits::DnsProvider;

/// Records to create and delete, keyed by IP
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    /// Desired records whose IP is absent remotely
    pub to_create: Vec<DesiredRecord>,
    /// Remote records whose IP is not desired
    pub to_delete: Vec<RemoteRecord>,
}

impl ReconciliationPlan {
    /// Diff desired against current records by IP
    pub fn compute(desired: &[DesiredRecord], current: &[RemoteRecord]) -> Self {
        let current_ips: HashSet<&str> = current.iter().map(|r| r.ip.as_str()).collect();
        let desired_ips: HashSet<&str> = desired.iter().map(|r| r.ip.as_str()).collect();

        let mut planned: HashSet<&str> = HashSet::new();
        let to_create = desired
            .iter()
            .filter(|r| !current_ips.contains(r.ip.as_str()))
            .filter(|r| planned.insert(r.ip.as_str()))
            .cloned()
            .collect();

        let to_delete = current
            .iter()
            .filter(|r| !desired_ips.contains(r.ip.as_str()))
            .cloned()
            .collect();

        Self {
            to_create,
            to_delete,
        }
    }

    /// True when remote state already matches
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_delete.is_empty()
    }

    /// Provider operations realizing the plan, creates before deletes
    ///
    /// With `update_in_place`, each record to create is paired with a record
    /// to delete (in plan order) and issued as one update.
    pub fn operations(&self, update_in_place: bool) -> Vec<RecordOperation> {
        let paired = if update_in_place {
            self.to_create.len().min(self.to_delete.len())
        } else {
            0
        };

        let updates = self.to_create[..paired]
            .iter()
            .zip(&self.to_delete[..paired])
            .map(|(desired, existing)| RecordOperation::Update {
                existing: existing.clone(),
                desired: desired.clone(),
            });
        let creates = self.to_create[paired..]
            .iter()
            .cloned()
            .map(RecordOperation::Create);
        let deletes = self.to_delete[paired..]
            .iter()
            .cloned()
            .map(RecordOperation::Delete);

        updates.chain(creates).chain(deletes).collect()
    }
}

/// One provider call of a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOperation {
    /// Create a record
    Create(DesiredRecord),
    /// Rewrite an existing record's content
    Update {
        /// Record being rewritten
        existing: RemoteRecord,
        /// Content it should carry
        desired: DesiredRecord,
    },
    /// Delete a record
    Delete(RemoteRecord),
}

/// A provider call that succeeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppliedOperation {
    /// Record created
    Created(RemoteRecord),
    /// Record rewritten
    Updated {
        /// Record before the call
        previous: RemoteRecord,
        /// Record after the call
        current: RemoteRecord,
    },
    /// Record deleted
    Deleted(RemoteRecord),
}

/// Result of one applied pass
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Zone the records live in
    pub zone_id: String,
    /// Computed plan
    pub plan: ReconciliationPlan,
    /// Calls that succeeded
    pub applied: Vec<AppliedOperation>,
    /// Calls that failed (`CreateFailed`, `UpdateFailed`, `DeleteFailed`)
    pub failures: Vec<Error>,
}

impl ReconcileReport {
    /// True when every planned call succeeded
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// What a call to [`Reconciler::reconcile`] did
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// Nothing was desired, so remote state was left alone
    Skipped,
    /// The pass ran
    Applied(ReconcileReport),
}

/// Converges remote records onto a desired set
#[derive(Clone)]
pub struct Reconciler {
    provider: Arc<dyn DnsProvider>,
    update_in_place: bool,
}

impl Reconciler {
    /// Create a reconciler issuing plain creates and deletes
    pub fn new(provider: Arc<dyn DnsProvider>) -> Self {
        Self {
            provider,
            update_in_place: false,
        }
    }

    /// Rewrite stale records in place where possible
    pub fn with_update_in_place(mut self, update_in_place: bool) -> Self {
        self.update_in_place = update_in_place;
        self
    }

    /// Run one reconciliation pass for `domain_name`
    ///
    /// An empty `desired` set never deletes anything: the pass is skipped.
    ///
    /// # Errors
    ///
    /// - `ZoneNotFound` when the provider has no zone for the name
    /// - `QueryFailed` when listing current records fails
    ///
    /// Failures of individual operations are collected in the report.
    pub async fn reconcile(
        &self,
        domain_name: &str,
        desired: &[DesiredRecord],
    ) -> Result<ReconcileOutcome> {
        let Some(first) = desired.first() else {
            warn!(
                "No desired records for {}, skipping reconciliation this cycle",
                domain_name
            );
            return Ok(ReconcileOutcome::Skipped);
        };
        let record_type = first.record_type;

        let zone_id = self.provider.find_zone(domain_name).await.map_err(|e| match e {
            Error::NotFound(_) => Error::zone_not_found(domain_name),
            other => other,
        })?;

        let current = self
            .provider
            .list_records(&zone_id, domain_name, record_type)
            .await
            .map_err(|e| match e {
                Error::QueryFailed(_) => e,
                other => Error::query_failed(format!("{} ({}): {}", domain_name, record_type, other)),
            })?;

        let plan = ReconciliationPlan::compute(desired, &current);
        let mut report = ReconcileReport {
            zone_id,
            plan,
            ..Default::default()
        };

        if report.plan.is_empty() {
            debug!("Records for {} already match desired state", domain_name);
            return Ok(ReconcileOutcome::Applied(report));
        }

        info!(
            "Reconciling {}: {} to create, {} to delete",
            domain_name,
            report.plan.to_create.len(),
            report.plan.to_delete.len()
        );

        for operation in report.plan.operations(self.update_in_place) {
            match self.apply(&report.zone_id, operation).await {
                Ok(applied) => report.applied.push(applied),
                Err(e) => {
                    error!("Record operation for {} failed: {}", domain_name, e);
                    report.failures.push(e);
                }
            }
        }

        Ok(ReconcileOutcome::Applied(report))
    }

    async fn apply(&self, zone_id: &str, operation: RecordOperation) -> Result<AppliedOperation> {
        match operation {
            RecordOperation::Create(desired) => {
                let created = self
                    .provider
                    .create_record(zone_id, &desired)
                    .await
                    .map_err(|e| Error::CreateFailed {
                        ip: desired.ip.clone(),
                        reason: e.to_string(),
                    })?;
                info!("Created {} {} -> {}", desired.record_type, desired.domain_name, desired.ip);
                Ok(AppliedOperation::Created(created))
            }
            RecordOperation::Update { existing, desired } => {
                let updated = self
                    .provider
                    .update_record(zone_id, &existing.id, &desired)
                    .await
                    .map_err(|e| Error::UpdateFailed {
                        id: existing.id.clone(),
                        reason: e.to_string(),
                    })?;
                info!(
                    "Updated {} {} -> {} (was: {})",
                    desired.record_type, desired.domain_name, desired.ip, existing.ip
                );
                Ok(AppliedOperation::Updated {
                    previous: existing,
                    current: updated,
                })
            }
            RecordOperation::Delete(existing) => {
                self.provider
                    .delete_record(zone_id, &existing.id)
                    .await
                    .map_err(|e| Error::DeleteFailed {
                        id: existing.id.clone(),
                        reason: e.to_string(),
                    })?;
                info!(
                    "Deleted {} {} -> {}",
                    existing.record_type, existing.domain_name, existing.ip
                );
                Ok(AppliedOperation::Deleted(existing))
            }
        }
    }
}
