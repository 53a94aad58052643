// # DNS Provider Trait
//
// Defines the record-store capability the reconciler converges.
//
// ## Implementations
//
// - Cloudflare: `failover-provider-cloudflare` crate
// - Future: Route53, DigitalOcean, etc.
//
// ## Usage
//
// ```rust,ignore
// use failover_core::DnsProvider;
// use failover_core::config::RecordType;
//
// let zone_id = provider.find_zone("www.example.com").await?;
// let records = provider
//     .list_records(&zone_id, "www.example.com", RecordType::A)
//     .await?;
// ```

use async_trait::async_trait;

use crate::config::RecordType;
use crate::model::{DesiredRecord, RemoteRecord};

/// Trait for DNS provider implementations
///
/// Implementations must be safe for concurrent use: one instance is shared
/// by every domain task.
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
/// - ✅ Parse provider-specific responses
/// - ✅ Return success or failure (the next engine tick is the retry)
///
/// ## Forbidden Capabilities
/// - ❌ Spawn tasks or threads
/// - ❌ Implement retry logic or backoff
/// - ❌ Cache records between calls
/// - ❌ Decide which records should exist (owned by the reconciler)
///
/// Every call must be bounded by a request timeout.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Resolve the zone identifier owning a record name
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The zone ID
    /// - `Err(Error::ZoneNotFound)`: No zone matches the name
    /// - `Err(Error)`: Transport or API failure
    async fn find_zone(&self, domain: &str) -> Result<String, crate::Error>;

    /// List the records of one name and type in a zone
    async fn list_records(
        &self,
        zone_id: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<Vec<RemoteRecord>, crate::Error>;

    /// Create a record
    async fn create_record(
        &self,
        zone_id: &str,
        record: &DesiredRecord,
    ) -> Result<RemoteRecord, crate::Error>;

    /// Rewrite an existing record with new content
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        record: &DesiredRecord,
    ) -> Result<RemoteRecord, crate::Error>;

    /// Delete a record
    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this provider
    ///
    /// # Returns
    ///
    /// A boxed DnsProvider trait object
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn DnsProvider>, crate::Error>;
}
