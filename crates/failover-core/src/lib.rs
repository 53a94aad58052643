// # failover-core
//
// Core library for quality-based DNS failover.
//
// ## Architecture Overview
//
// Each configured domain has an ordered list of candidate groups. On every
// tick the engine probes the candidates, keeps the best address per group and
// converges the provider's records onto that set:
//
// - **Prober**: Trait for measuring reachability and latency of one address
// - **sampling**: Pacing of probe attempts shared by the transports
// - **scoring**: Pure quality score, 0 to 100, higher is better
// - **CandidateSelector**: Probes a domain's candidates and picks winners
// - **DnsProvider**: Trait for listing and mutating records via provider APIs
// - **Reconciler**: Diffs desired against remote records by IP and applies it
// - **FailoverEngine**: One scheduler task per domain, events for monitoring
// - **ProviderRegistry**: Plugin-based registry for providers and probers
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Plugin-Based**: Providers and probers are registered by name
// 3. **Library-First**: All core functionality can be used as a library
// 4. **Stateless Cycles**: Nothing is persisted; every tick recomputes from scratch
// 5. **Never Delete-All**: An empty selection leaves remote records untouched

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod reconciler;
pub mod registry;
pub mod sampling;
pub mod scoring;
pub mod selector;
pub mod traits;

// Re-export core types for convenience
pub use config::{DomainConfig, FailoverConfig, ProberConfig, ProviderConfig, RecordType};
pub use engine::{EngineEvent, FailoverEngine};
pub use error::{Error, Result};
pub use model::{DesiredRecord, DomainSpec, ProbePolicy, ProbeSample, QualityResult, RemoteRecord};
pub use reconciler::{ReconcileOutcome, ReconcileReport, Reconciler, ReconciliationPlan};
pub use registry::ProviderRegistry;
pub use selector::CandidateSelector;
pub use traits::{DnsProvider, Prober};
