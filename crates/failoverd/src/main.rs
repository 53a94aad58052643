// # failoverd - DNS failover daemon
//
// Thin integration layer: all probing, scoring and reconciliation logic
// lives in failover-core. The daemon is responsible for:
// 1. Reading settings from environment variables
// 2. Loading and validating the TOML configuration file
// 3. Initializing logging and the runtime
// 4. Registering providers and probers
// 5. Running the failover engine until SIGTERM/SIGINT
//
// ## Environment
//
// - `FAILOVER_CONFIG`: Path to the TOML configuration (default `config.toml`)
// - `FAILOVER_PROVIDER_API_TOKEN`: Overrides `provider.api_token` from the file
// - `FAILOVER_LOG_LEVEL`: trace, debug, info, warn or error (default `info`)
// - `FAILOVER_MODE`: `dry-run` forces the Cloudflare provider into dry-run
//
// ## Example
//
// ```bash
// export FAILOVER_CONFIG=/etc/failover/config.toml
// export FAILOVER_PROVIDER_API_TOKEN=...
// failoverd
// ```

use anyhow::{Context, Result};
use failover_core::{
    EngineEvent, FailoverConfig, FailoverEngine, ProviderConfig, ProviderRegistry,
};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::{mpsc, oneshot};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

const DEFAULT_CONFIG_PATH: &str = "config.toml";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Exit codes for different termination scenarios
///
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailoverExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<FailoverExitCode> for ExitCode {
    fn from(code: FailoverExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Settings taken from the environment
#[derive(Debug)]
struct DaemonSettings {
    config_path: PathBuf,
    api_token: Option<String>,
    log_level: String,
}

impl DaemonSettings {
    fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            config_path: lookup("FAILOVER_CONFIG")
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
                .into(),
            api_token: lookup("FAILOVER_PROVIDER_API_TOKEN").filter(|t| !t.is_empty()),
            log_level: lookup("FAILOVER_LOG_LEVEL")
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        }
    }

    fn log_level(&self) -> Result<Level> {
        parse_log_level(&self.log_level)
    }

    /// Read the configuration file and apply environment overrides
    fn load_config(&self) -> Result<FailoverConfig> {
        let mut config = FailoverConfig::from_file(&self.config_path).with_context(|| {
            format!(
                "Failed to load configuration from {}",
                self.config_path.display()
            )
        })?;

        if let Some(token) = &self.api_token {
            apply_token_override(&mut config, token);
        }

        check_placeholder_token(&config.provider)?;
        config.validate()?;
        Ok(config)
    }
}

fn parse_log_level(value: &str) -> Result<Level> {
    match value.trim().to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "FAILOVER_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            value
        ),
    }
}

fn apply_token_override(config: &mut FailoverConfig, token: &str) {
    if let ProviderConfig::Cloudflare { api_token, .. } = &mut config.provider {
        *api_token = token.to_string();
    }
}

/// Reject tokens copied verbatim from documentation
fn check_placeholder_token(provider: &ProviderConfig) -> Result<()> {
    if let ProviderConfig::Cloudflare { api_token, .. } = provider {
        let lower = api_token.to_lowercase();
        if lower.contains("your_token") || lower.contains("replace_me") || lower == "token" {
            anyhow::bail!(
                "provider.api_token appears to be a placeholder. \
                Set a real token or export FAILOVER_PROVIDER_API_TOKEN."
            );
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let settings = DaemonSettings::from_env();

    let log_level = match settings.log_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return FailoverExitCode::ConfigError.into();
        }
    };

    let config = match settings.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return FailoverExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return FailoverExitCode::ConfigError.into();
    }

    info!("Starting failoverd");
    info!(
        "Configuration loaded from {}: {} domain(s)",
        settings.config_path.display(),
        config.domains.len()
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return FailoverExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        let (engine, events) = match build_engine(config) {
            Ok(parts) => parts,
            Err(e) => {
                error!("Startup error: {:#}", e);
                return FailoverExitCode::ConfigError;
            }
        };

        match run_daemon(engine, events).await {
            Ok(()) => FailoverExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                FailoverExitCode::RuntimeError
            }
        }
    });

    info!("failoverd stopped");
    code.into()
}

fn build_registry() -> ProviderRegistry {
    let registry = ProviderRegistry::new();

    #[cfg(feature = "cloudflare")]
    {
        debug!("Registering Cloudflare provider");
        failover_provider_cloudflare::register(&registry);
    }

    #[cfg(feature = "tcp")]
    {
        debug!("Registering TCP prober");
        failover_probe_tcp::register(&registry);
    }

    #[cfg(feature = "icmp")]
    {
        debug!("Registering ICMP prober");
        failover_probe_icmp::register(&registry);
    }

    registry
}

/// Create the provider and prober named by the configuration
fn build_engine(
    config: FailoverConfig,
) -> Result<(FailoverEngine, mpsc::Receiver<EngineEvent>)> {
    let registry = build_registry();

    let provider = registry.create_provider(&config.provider).with_context(|| {
        format!(
            "Provider '{}' is unavailable (built with: {:?})",
            config.provider.type_name(),
            registry.list_providers()
        )
    })?;
    let prober = registry.create_prober(&config.prober).with_context(|| {
        format!(
            "Prober '{}' is unavailable (built with: {:?})",
            config.prober.type_name(),
            registry.list_probers()
        )
    })?;

    info!(
        "Using provider '{}' and prober '{}'",
        provider.provider_name(),
        prober.prober_name()
    );

    Ok(FailoverEngine::new(prober, provider, config)?)
}

async fn run_daemon(
    engine: FailoverEngine,
    mut events: mpsc::Receiver<EngineEvent>,
) -> Result<()> {
    for spec in engine.domains() {
        info!("Managing domain: {}", spec.name);
    }

    let event_logger = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
    });

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let signals = tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Signal handling failed, shutting down: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    let result = engine.run_with_shutdown(shutdown_rx).await;

    signals.abort();
    drop(engine);
    if let Err(e) = event_logger.await {
        warn!("Event logger ended abnormally: {}", e);
    }

    result.context("Failover engine failed")
}

fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::ProbeFailed { .. } | EngineEvent::OperationFailed { .. } => {
            warn!("Engine event: {:?}", event)
        }
        EngineEvent::RecordCreated { .. }
        | EngineEvent::RecordUpdated { .. }
        | EngineEvent::RecordDeleted { .. } => info!("Engine event: {:?}", event),
        _ => debug!("Engine event: {:?}", event),
    }
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for Ctrl-C
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for CTRL-C")?;
    Ok("SIGINT")
}
