//! Configuration types for the failover system
//!
//! The whole configuration is read once at startup from a TOML file. A
//! domain's `[domains.probe]` table overrides the top-level `[probe]` policy
//! field by field; anything it leaves out is inherited.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::model::{DomainSpec, ProbePolicy};

/// Main failover configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverConfig {
    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// Probe transport configuration
    #[serde(default)]
    pub prober: ProberConfig,

    /// Default probe policy, inherited by domains without their own
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Domains to keep pointed at their best candidates
    #[serde(default)]
    pub domains: Vec<DomainConfig>,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl FailoverConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, crate::Error> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.domains.is_empty() {
            return Err(crate::Error::config("No domains configured"));
        }

        self.provider.validate()?;
        self.prober.validate()?;
        self.probe.validate("probe")?;

        for domain in &self.domains {
            domain.validate(&self.probe)?;
        }

        if self.engine.event_channel_capacity == 0 {
            return Err(crate::Error::config("event_channel_capacity must be > 0"));
        }

        Ok(())
    }

    /// Resolve every domain into its immutable runtime form
    pub fn domain_specs(&self) -> Vec<DomainSpec> {
        self.domains
            .iter()
            .map(|domain| domain.to_spec(&self.probe))
            .collect()
    }
}

/// DNS provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare provider
    Cloudflare {
        /// API token, or the global API key when `email` is set
        #[serde(default)]
        api_token: String,
        /// Account email for legacy key authentication
        #[serde(default)]
        email: Option<String>,
        /// Zone ID (optional, looked up from the record name otherwise)
        #[serde(default)]
        zone_id: Option<String>,
        /// Perform lookups only and log intended changes
        #[serde(default)]
        dry_run: bool,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Cloudflare { api_token, email, .. } => {
                if api_token.is_empty() {
                    return Err(crate::Error::config("Cloudflare API token cannot be empty"));
                }
                if email.as_deref().is_some_and(|e| !e.contains('@')) {
                    return Err(crate::Error::config("Cloudflare account email is malformed"));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom provider config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Cloudflare { .. } => "cloudflare",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Largest echo payload that fits an Ethernet frame without fragmenting
pub const MAX_ICMP_PAYLOAD_SIZE: usize = 1472;

/// Probe transport configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProberConfig {
    /// TCP handshake timing against a fixed port
    Tcp {
        /// Port to connect to on every candidate
        #[serde(default = "default_tcp_port")]
        port: u16,
    },

    /// ICMP echo, over unprivileged datagram sockets where the host allows them
    Icmp {
        /// Echo payload size in bytes
        #[serde(default = "default_icmp_payload_size")]
        payload_size: usize,
    },

    /// Custom prober
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProberConfig {
    /// Validate the prober configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProberConfig::Tcp { port } => {
                if *port == 0 {
                    return Err(crate::Error::config("TCP probe port must be > 0"));
                }
                Ok(())
            }
            ProberConfig::Icmp { payload_size } => {
                if *payload_size > MAX_ICMP_PAYLOAD_SIZE {
                    return Err(crate::Error::config(format!(
                        "ICMP payload_size must be <= {}",
                        MAX_ICMP_PAYLOAD_SIZE
                    )));
                }
                Ok(())
            }
            ProberConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom prober factory cannot be empty"));
                }
                Ok(())
            }
        }
    }

    /// Get the prober type name
    pub fn type_name(&self) -> &str {
        match self {
            ProberConfig::Tcp { .. } => "tcp",
            ProberConfig::Icmp { .. } => "icmp",
            ProberConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for ProberConfig {
    fn default() -> Self {
        ProberConfig::Tcp {
            port: default_tcp_port(),
        }
    }
}

/// Probe policy as written in the configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Seconds between cycles for a domain
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Overall budget for probing one address, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Number of probes sent to each address
    #[serde(default = "default_samples")]
    pub samples: u32,
}

impl ProbeConfig {
    fn validate(&self, scope: &str) -> Result<(), crate::Error> {
        if self.interval_secs == 0 {
            return Err(crate::Error::config(format!("{}: interval_secs must be > 0", scope)));
        }
        if self.timeout_ms == 0 {
            return Err(crate::Error::config(format!("{}: timeout_ms must be > 0", scope)));
        }
        if self.samples == 0 {
            return Err(crate::Error::config(format!("{}: samples must be >= 1", scope)));
        }
        Ok(())
    }

    /// Convert into the runtime policy
    pub fn policy(&self) -> ProbePolicy {
        ProbePolicy {
            interval: Duration::from_secs(self.interval_secs),
            timeout: Duration::from_millis(self.timeout_ms),
            sample_count: self.samples,
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            timeout_ms: default_timeout_ms(),
            samples: default_samples(),
        }
    }
}

/// Per-domain probe settings layered over the top-level policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOverride {
    /// Seconds between cycles for this domain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,

    /// Per-address probe budget for this domain, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Probes sent to each address of this domain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples: Option<u32>,
}

impl ProbeOverride {
    /// Apply the fields that are set on top of `base`
    pub fn apply(&self, base: &ProbeConfig) -> ProbeConfig {
        ProbeConfig {
            interval_secs: self.interval_secs.unwrap_or(base.interval_secs),
            timeout_ms: self.timeout_ms.unwrap_or(base.timeout_ms),
            samples: self.samples.unwrap_or(base.samples),
        }
    }
}

/// One domain and its candidate addresses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Fully qualified record name (e.g., "example.com" or "www.example.com")
    pub name: String,

    /// Record type managed for this name
    #[serde(default)]
    pub record_type: RecordType,

    /// Whether created records go through the provider's proxy
    #[serde(default)]
    pub proxied: bool,

    /// Candidate groups; each entry is one address or a comma-separated list
    pub ips: Vec<String>,

    /// One best address per group, or one across all groups
    #[serde(default)]
    pub selection: SelectionMode,

    /// Domain-specific probe settings
    #[serde(default)]
    pub probe: Option<ProbeOverride>,
}

impl DomainConfig {
    /// Create a domain configuration with default policy
    pub fn new(name: impl Into<String>, ips: Vec<String>) -> Self {
        Self {
            name: name.into(),
            record_type: RecordType::default(),
            proxied: false,
            ips,
            selection: SelectionMode::default(),
            probe: None,
        }
    }

    /// Set the record type
    pub fn with_record_type(mut self, record_type: RecordType) -> Self {
        self.record_type = record_type;
        self
    }

    /// Set the selection mode
    pub fn with_selection(mut self, selection: SelectionMode) -> Self {
        self.selection = selection;
        self
    }

    /// Validate the domain configuration against the inherited policy
    pub fn validate(&self, default_probe: &ProbeConfig) -> Result<(), crate::Error> {
        validate_domain_name(&self.name)?;

        let has_candidate = self
            .ips
            .iter()
            .any(|group| !crate::model::split_addresses(group).is_empty());
        if !has_candidate {
            return Err(crate::Error::config(format!(
                "Domain {} has no candidate addresses",
                self.name
            )));
        }

        self.effective_probe(default_probe).validate(&self.name)
    }

    /// Probe policy after layering this domain's overrides on `default_probe`
    pub fn effective_probe(&self, default_probe: &ProbeConfig) -> ProbeConfig {
        match &self.probe {
            Some(overrides) => overrides.apply(default_probe),
            None => *default_probe,
        }
    }

    fn to_spec(&self, default_probe: &ProbeConfig) -> DomainSpec {
        DomainSpec {
            name: self.name.clone(),
            record_type: self.record_type,
            proxied: self.proxied,
            candidate_groups: self.ips.clone(),
            selection: self.selection,
            policy: self.effective_probe(default_probe).policy(),
        }
    }
}

/// DNS record type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    /// A record (IPv4)
    #[default]
    #[serde(alias = "ipv4", alias = "A")]
    A,
    /// AAAA record (IPv6)
    #[serde(alias = "ipv6", alias = "AAAA")]
    Aaaa,
}

impl RecordType {
    /// Wire name of the record type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }

    /// Whether an address belongs to this record type's family
    pub fn matches(&self, ip: &std::net::IpAddr) -> bool {
        match self {
            RecordType::A => ip.is_ipv4(),
            RecordType::Aaaa => ip.is_ipv6(),
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How candidate groups collapse into the desired set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// One best address per group
    #[default]
    PerGroup,
    /// One best address across every group
    Single,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Delay between starting consecutive domain tasks (in milliseconds)
    #[serde(default = "default_startup_stagger_ms")]
    pub startup_stagger_ms: u64,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped with a warning log.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Rewrite stale records with an update instead of create + delete
    #[serde(default)]
    pub update_in_place: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            startup_stagger_ms: default_startup_stagger_ms(),
            event_channel_capacity: default_event_channel_capacity(),
            update_in_place: false,
        }
    }
}

/// Validate that a string is a valid domain name
///
/// Basic RFC 1035 checks: total length, label length, label characters.
pub fn validate_domain_name(domain: &str) -> Result<(), crate::Error> {
    if domain.is_empty() {
        return Err(crate::Error::config("Domain name cannot be empty"));
    }

    if domain.len() > 253 {
        return Err(crate::Error::config(format!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        )));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(crate::Error::config(format!(
                "Domain name has empty label: '{}'",
                domain
            )));
        }

        if label.len() > 63 {
            return Err(crate::Error::config(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        // Wildcard labels are valid record names
        if label == "*" {
            continue;
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(crate::Error::config(format!(
                "Domain label contains invalid characters. Label: '{}'",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(crate::Error::config(format!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            )));
        }
    }

    Ok(())
}

fn default_tcp_port() -> u16 {
    443
}

fn default_icmp_payload_size() -> usize {
    56
}

fn default_interval_secs() -> u64 {
    300
}

fn default_timeout_ms() -> u64 {
    3000
}

fn default_samples() -> u32 {
    4
}

fn default_startup_stagger_ms() -> u64 {
    1000
}

fn default_event_channel_capacity() -> usize {
    1000
}
