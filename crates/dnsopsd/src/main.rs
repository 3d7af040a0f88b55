//! # dnsopsd
//!
//! The DNSOps daemon: a thin integration layer that parses configuration,
//! wires sources, provider, registry and policy into a controller, and
//! runs the reconciliation loop until terminated. All reconciliation
//! logic lives in `dnsops-core`.

mod config;
mod metrics;

use anyhow::{bail, Context, Result};
use clap::Parser;
use config::{Config, LogFormat, ProviderKind, RegistryKind, SourceKind};
use dnsops_core::plan::policy_by_name;
use dnsops_core::source::{DedupSource, DummySource, EmptySource, MultiSource};
use dnsops_core::traits::{Provider, Source};
use dnsops_core::zone::ZoneIdFilter;
use dnsops_core::{Controller, ControllerConfig, NoopRegistry, Registry, TxtRegistry};
use dnsops_provider_cloudflare::CloudflareProvider;
use dnsops_provider_inmemory::InMemoryProvider;
use dnsops_source_connector::ConnectorSource;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{error, info};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Exit codes for the daemon:
/// - 0: clean shutdown (once-mode success or termination signal)
/// - 1: configuration error or startup failure
/// - 2: runtime error (fatal tick in once-mode, unexpected failure)
#[derive(Debug, Clone, Copy)]
enum DnsOpsExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<DnsOpsExitCode> for ExitCode {
    fn from(code: DnsOpsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let config = match Config::try_parse() {
        Ok(config) => config,
        Err(e) => {
            let _ = e.print();
            return DnsOpsExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("configuration validation error: {e}");
        return DnsOpsExitCode::ConfigError.into();
    }

    initialize_logging(&config);
    info!(config = %config, "starting dnsopsd");
    if config.dry_run {
        info!("dry-run mode, no changes to DNS records will be made");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to create tokio runtime");
            return DnsOpsExitCode::RuntimeError.into();
        }
    };

    runtime
        .block_on(async {
            match run_daemon(config).await {
                Ok(code) => code,
                Err(e) => {
                    error!(error = %e, "daemon error");
                    DnsOpsExitCode::RuntimeError
                }
            }
        })
        .into()
}

fn initialize_logging(config: &Config) {
    let level: tracing::Level = config.log_level.into();
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_max_level(level)
            .json()
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_max_level(level).init(),
    }
}

async fn run_daemon(config: Config) -> Result<DnsOpsExitCode> {
    let _metrics_handle = metrics::start_metrics_server(config.metrics_address.clone());

    let source = build_source(&config);
    let registry = build_registry(&config)?;
    let policy = policy_by_name(config.policy.as_str())
        .with_context(|| format!("invalid policy: {}", config.policy.as_str()))?;

    let controller_config = ControllerConfig {
        interval: config.interval,
        min_event_sync_interval: config.min_event_sync_interval,
        owner_id: config.txt_owner_id.clone(),
        managed_record_types: config.managed_record_types.clone(),
        domain_filter: config.effective_domain_filter(),
        ..ControllerConfig::default()
    };
    let (controller, mut event_rx) = Controller::new(source, registry, policy, controller_config);
    let controller = Arc::new(controller);

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            metrics::record_event(&event);
        }
    });

    if config.once {
        controller.run_once().await?;
        return Ok(DnsOpsExitCode::CleanShutdown);
    }

    if config.events {
        controller.clone().watch_source_events();
    }

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(wait_for_shutdown_signal(shutdown_tx));

    controller.schedule_run_once(tokio::time::Instant::now());
    controller.run(shutdown_rx).await;

    Ok(DnsOpsExitCode::CleanShutdown)
}

fn build_source(config: &Config) -> Box<dyn Source> {
    let sources: Vec<Box<dyn Source>> = config
        .sources
        .iter()
        .map(|kind| -> Box<dyn Source> {
            match kind {
                SourceKind::Dummy => Box::new(DummySource::new(&config.fqdn_template)),
                SourceKind::Connector => {
                    Box::new(ConnectorSource::new(config.connector_source_server.clone()))
                }
                SourceKind::Empty => Box::new(EmptySource),
            }
        })
        .collect();

    // Combine the configured sources into a single, deduplicated source.
    Box::new(DedupSource::new(Box::new(MultiSource::new(
        sources,
        config.default_targets.clone(),
    ))))
}

fn build_provider(config: &Config) -> Result<Box<dyn Provider>> {
    let domain_filter = config.effective_domain_filter();
    match config.provider {
        ProviderKind::Cloudflare => {
            let provider = CloudflareProvider::new(
                config.cloudflare_api_token.clone(),
                domain_filter,
                ZoneIdFilter::new(config.zone_id_filter.clone()),
                config.cloudflare_zones_per_page,
                config.cloudflare_proxied,
                config.dry_run,
            )
            .context("failed to initialize cloudflare provider")?;
            Ok(Box::new(provider))
        }
        ProviderKind::Inmemory => {
            if config.inmemory_zones.is_empty() {
                bail!("the inmemory provider needs at least one --inmemory-zone");
            }
            Ok(Box::new(
                InMemoryProvider::new(config.inmemory_zones.clone())
                    .with_domain_filter(domain_filter)
                    .with_dry_run(config.dry_run),
            ))
        }
    }
}

fn build_registry(config: &Config) -> Result<Box<dyn Registry>> {
    let provider = build_provider(config)?;
    match config.registry {
        RegistryKind::Noop => Ok(Box::new(NoopRegistry::new(provider))),
        RegistryKind::Txt => {
            let registry = TxtRegistry::new(
                provider,
                &config.txt_owner_id,
                &config.txt_prefix,
                &config.txt_suffix,
                &config.txt_wildcard_replacement,
                config.txt_cache_interval,
            )
            .context("failed to initialize TXT registry")?;
            Ok(Box::new(registry))
        }
    }
}

async fn wait_for_shutdown_signal(shutdown_tx: oneshot::Sender<()>) {
    #[cfg(unix)]
    {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                error!(error = %e, "failed to set up SIGTERM handler");
                return;
            }
        };
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM, terminating"),
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!(error = %e, "failed to wait for SIGINT");
                    return;
                }
                info!("received SIGINT, terminating");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to wait for SIGINT");
            return;
        }
        info!("received SIGINT, terminating");
    }

    let _ = shutdown_tx.send(());
}
