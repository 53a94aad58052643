// # Cloudflare DNS Provider
//
// This crate provides the Cloudflare implementation of `DnsProvider` for the
// failover engine.
//
// ## Behavior
//
// - ✅ One HTTP request per trait call (zone lookup may walk a few suffixes)
// - ✅ Full error propagation (the next engine tick is the retry)
// - ✅ HTTP timeout configured (10 seconds)
// - ✅ Specific errors for HTTP status codes (401/403, 404, 429, 5xx)
// - ✅ Response envelopes checked for `success: true`
// - ✅ Dry-run mode for safe testing
// - ✅ A and AAAA records
// - ✅ Zone auto-discovery and explicit zone ID
// - ❌ NO retry, backoff or caching
// - ❌ NO background tasks
//
// ## Security Requirements
//
// - API token NEVER appears in logs or `Debug` output
// - Provider creation fails fast if the token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...&type=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`
// - Delete DNS Record: DELETE `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use failover_core::config::{ProviderConfig, RecordType};
use failover_core::model::{DesiredRecord, RemoteRecord};
use failover_core::traits::{DnsProvider, DnsProviderFactory};
use failover_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (10 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Page size for record listing; one page covers any realistic candidate set
const RECORDS_PER_PAGE: &str = "500";

/// TTL value meaning "automatic" in the Cloudflare API
const AUTOMATIC_TTL: u32 = 1;

/// Environment variable switching every Cloudflare provider to dry-run
pub const MODE_ENV: &str = "FAILOVER_MODE";

/// How requests authenticate
#[derive(Clone)]
enum Credentials {
    /// Scoped API token, sent as a bearer token
    Token(String),
    /// Legacy global API key with the account email
    GlobalKey { email: String, key: String },
}

/// Cloudflare DNS provider
///
/// # Trust Level: Untrusted
///
/// This provider is isolated, stateless, and single-shot. Deciding which
/// records should exist is owned by the reconciler.
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all GET requests (zone lookup, record listing)
/// - Log the intended POST/PUT/DELETE
/// - **NOT** actually modify DNS records
pub struct CloudflareProvider {
    /// ⚠️ NEVER log this value
    credentials: Credentials,

    /// Zone ID (optional, looked up from the record name otherwise)
    zone_id: Option<String>,

    /// API base URL without trailing slash
    api_base: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Bound on every API request
    http_timeout: Duration,

    /// Dry-run mode: lookups only, mutations are logged
    dry_run: bool,
}

// Custom Debug implementation that hides the credentials
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let auth = match &self.credentials {
            Credentials::Token(_) => "token",
            Credentials::GlobalKey { .. } => "global-key",
        };
        f.debug_struct("CloudflareProvider")
            .field("credentials", &"<REDACTED>")
            .field("auth", &auth)
            .field("zone_id", &self.zone_id)
            .field("api_base", &self.api_base)
            .field("http_timeout", &self.http_timeout)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

/// Response envelope shared by every API v4 endpoint
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct DnsRecord {
    id: String,
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    content: String,
    #[serde(default)]
    proxied: bool,
    #[serde(default)]
    zone_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct RecordPayload<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: &'a str,
    ttl: u32,
    proxied: bool,
}

impl<'a> From<&'a DesiredRecord> for RecordPayload<'a> {
    fn from(record: &'a DesiredRecord) -> Self {
        Self {
            record_type: record.record_type.as_str(),
            name: &record.domain_name,
            content: &record.ip,
            ttl: AUTOMATIC_TTL,
            proxied: record.proxied,
        }
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: API token with Zone:DNS:Edit permissions, or the
    ///   global API key when `email` is set
    /// - `email`: Account email, switches to `X-Auth-Email`/`X-Auth-Key`
    /// - `zone_id`: Optional zone ID (looked up otherwise)
    /// - `dry_run`: If true, perform lookups but skip mutations
    ///
    /// # Errors
    ///
    /// - `Error::Config` if the token is empty or the HTTP client cannot be built
    pub fn new(
        api_token: impl Into<String>,
        email: Option<String>,
        zone_id: Option<String>,
        dry_run: bool,
    ) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let credentials = match email {
            Some(email) => Credentials::GlobalKey {
                email,
                key: api_token,
            },
            None => Credentials::Token(api_token),
        };

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            credentials,
            zone_id,
            api_base: CLOUDFLARE_API_BASE.to_string(),
            client,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            dry_run,
        })
    }

    /// Point the provider at another API endpoint
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Replace the default 10 second request timeout
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Whether mutations are only logged
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Start an authenticated request
    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.api_base, path))
            .timeout(self.http_timeout)
            .header("Content-Type", "application/json");

        match &self.credentials {
            Credentials::Token(token) => builder.bearer_auth(token),
            Credentials::GlobalKey { email, key } => builder
                .header("X-Auth-Email", email)
                .header("X-Auth-Key", key),
        }
    }

    /// Send a request and unwrap the API envelope
    ///
    /// `context` names the operation in error messages.
    async fn send<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<T> {
        let response = builder
            .send()
            .await
            .map_err(|e| Error::http(format!("{}: request failed: {}", context, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status, context, &error_text));
        }

        let envelope: Envelope<T> = response.json().await.map_err(|e| {
            Error::provider("cloudflare", format!("{}: failed to parse response: {}", context, e))
        })?;

        if !envelope.success {
            return Err(Error::provider(
                "cloudflare",
                format!("{}: {}", context, describe_errors(&envelope.errors)),
            ));
        }

        envelope.result.ok_or_else(|| {
            Error::provider("cloudflare", format!("{}: response has no result", context))
        })
    }

    fn to_remote(&self, record: DnsRecord, zone_id: &str) -> Option<RemoteRecord> {
        let record_type = match record.record_type.as_str() {
            "A" => RecordType::A,
            "AAAA" => RecordType::Aaaa,
            _ => return None,
        };
        Some(RemoteRecord {
            id: record.id,
            domain_name: record.name,
            ip: record.content,
            record_type,
            proxied: record.proxied,
            zone_id: record.zone_id.unwrap_or_else(|| zone_id.to_string()),
        })
    }

    fn dry_run_record(&self, id: &str, zone_id: &str, record: &DesiredRecord) -> RemoteRecord {
        RemoteRecord {
            id: id.to_string(),
            domain_name: record.domain_name.clone(),
            ip: record.ip.clone(),
            record_type: record.record_type,
            proxied: record.proxied,
            zone_id: zone_id.to_string(),
        }
    }
}

/// Map a non-success HTTP status to an error
fn status_error(status: reqwest::StatusCode, context: &str, body: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{}: invalid API credentials or insufficient permissions. Status: {}",
            context, status
        )),
        404 => Error::not_found(format!("{}: {}", context, status)),
        429 => Error::rate_limited(format!(
            "{}: rate limit exceeded, retry later. Status: {}",
            context, status
        )),
        500..=599 => Error::provider(
            "cloudflare",
            format!("{}: server error (transient): {} - {}", context, status, body),
        ),
        _ => Error::provider("cloudflare", format!("{}: {} - {}", context, status, body)),
    }
}

fn describe_errors(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "request was not successful".to_string();
    }
    errors
        .iter()
        .map(|e| format!("[{}] {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Candidate zone names for a record name, most specific first
///
/// `a.b.example.com` yields `a.b.example.com`, `b.example.com`, `example.com`.
/// Single-label suffixes are never zones.
fn zone_candidates(domain: &str) -> Vec<&str> {
    let domain = domain.trim_end_matches('.');
    let mut candidates = Vec::new();
    let mut rest = domain;
    while rest.contains('.') {
        candidates.push(rest);
        match rest.split_once('.') {
            Some((_, parent)) => rest = parent,
            None => break,
        }
    }
    candidates
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    /// Resolve the zone owning `domain`
    ///
    /// ```http
    /// GET /zones?name=<suffix>
    /// ```
    ///
    /// Walks the suffixes of the name and returns the first exact match.
    async fn find_zone(&self, domain: &str) -> Result<String> {
        if let Some(zone_id) = &self.zone_id {
            tracing::debug!("Using pre-configured zone ID");
            return Ok(zone_id.clone());
        }

        for candidate in zone_candidates(domain) {
            tracing::debug!("Looking up zone ID for: {}", candidate);
            let zones: Vec<Zone> = self
                .send(
                    self.request(reqwest::Method::GET, "/zones")
                        .query(&[("name", candidate)]),
                    "zone lookup",
                )
                .await?;

            if let Some(zone) = zones
                .into_iter()
                .find(|z| z.name.eq_ignore_ascii_case(candidate))
            {
                tracing::debug!("Found zone ID for {}: {}", candidate, zone.id);
                return Ok(zone.id);
            }
        }

        Err(Error::zone_not_found(domain))
    }

    async fn list_records(
        &self,
        zone_id: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<Vec<RemoteRecord>> {
        tracing::debug!("Listing {} records for {}", record_type, name);

        let records: Vec<DnsRecord> = self
            .send(
                self.request(reqwest::Method::GET, &format!("/zones/{}/dns_records", zone_id))
                    .query(&[
                        ("name", name),
                        ("type", record_type.as_str()),
                        ("per_page", RECORDS_PER_PAGE),
                    ]),
                "record listing",
            )
            .await
            .map_err(|e| Error::query_failed(format!("{} ({}): {}", name, record_type, e)))?;

        Ok(records
            .into_iter()
            .filter_map(|r| self.to_remote(r, zone_id))
            .filter(|r| r.record_type == record_type)
            .collect())
    }

    async fn create_record(&self, zone_id: &str, record: &DesiredRecord) -> Result<RemoteRecord> {
        let payload = RecordPayload::from(record);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would POST /zones/{}/dns_records with payload: {}",
                zone_id,
                serde_json::to_string(&payload)?
            );
            return Ok(self.dry_run_record("dry-run", zone_id, record));
        }

        let created: DnsRecord = self
            .send(
                self.request(reqwest::Method::POST, &format!("/zones/{}/dns_records", zone_id))
                    .json(&payload),
                "record creation",
            )
            .await?;

        self.to_remote(created, zone_id).ok_or_else(|| {
            Error::provider("cloudflare", "created record has an unexpected type")
        })
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        record: &DesiredRecord,
    ) -> Result<RemoteRecord> {
        let payload = RecordPayload::from(record);
        let path = format!("/zones/{}/dns_records/{}", zone_id, record_id);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would PUT {} with payload: {}",
                path,
                serde_json::to_string(&payload)?
            );
            return Ok(self.dry_run_record(record_id, zone_id, record));
        }

        let updated: DnsRecord = self
            .send(
                self.request(reqwest::Method::PUT, &path).json(&payload),
                "record update",
            )
            .await?;

        self.to_remote(updated, zone_id).ok_or_else(|| {
            Error::provider("cloudflare", "updated record has an unexpected type")
        })
    }

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<()> {
        let path = format!("/zones/{}/dns_records/{}", zone_id, record_id);

        if self.dry_run {
            tracing::info!("[DRY-RUN] Would DELETE {}", path);
            return Ok(());
        }

        let _: serde_json::Value = self
            .send(self.request(reqwest::Method::DELETE, &path), "record deletion")
            .await?;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }
}

/// Factory for creating Cloudflare providers
pub struct CloudflareFactory;

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        match config {
            ProviderConfig::Cloudflare {
                api_token,
                email,
                zone_id,
                dry_run,
            } => {
                if api_token.is_empty() {
                    return Err(Error::config("Cloudflare API token is required"));
                }

                let dry_run = *dry_run
                    || std::env::var(MODE_ENV)
                        .map(|mode| mode.eq_ignore_ascii_case("dry-run"))
                        .unwrap_or(false);

                if dry_run {
                    tracing::warn!("Cloudflare provider running in DRY-RUN mode - no changes will be made");
                }

                Ok(Box::new(CloudflareProvider::new(
                    api_token.clone(),
                    email.clone(),
                    zone_id.clone(),
                    dry_run,
                )?))
            }
            _ => Err(Error::config("Invalid config for Cloudflare provider")),
        }
    }
}

/// Register the Cloudflare provider with a registry
///
/// # Example
///
/// ```rust
/// use failover_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// failover_provider_cloudflare::register(&registry);
/// assert!(registry.has_provider("cloudflare"));
/// ```
pub fn register(registry: &failover_core::ProviderRegistry) {
    registry.register_provider("cloudflare", Box::new(CloudflareFactory));
}

#[cfg(test)]
mod stub;
