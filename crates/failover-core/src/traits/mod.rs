//! Core traits for the failover system
//!
//! This module defines the two external capabilities the engine drives.
//!
//! - [`Prober`]: Measure reachability and latency of one address
//! - [`DnsProvider`]: List, create, update and delete records via a provider API

pub mod dns_provider;
pub mod prober;

pub use dns_provider::{DnsProvider, DnsProviderFactory};
pub use prober::{Prober, ProberFactory};
