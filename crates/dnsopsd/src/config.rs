//! Daemon configuration.
//!
//! Every flag accepts an environment variable equivalent: the uppercased
//! flag name with dashes replaced by underscores and a `DNSOPS_` prefix
//! (`--txt-owner-id` → `DNSOPS_TXT_OWNER_ID`).

use clap::{Parser, ValueEnum};
use dnsops_core::endpoint::{DomainFilter, RecordType};
use regex::Regex;
use std::fmt;
use std::time::Duration;

const PASSWORD_MASK: &str = "******";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    Dummy,
    Connector,
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    Cloudflare,
    Inmemory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyKind {
    Sync,
    UpsertOnly,
    CreateOnly,
}

impl PolicyKind {
    /// The policy name as registered with the plan module.
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::Sync => "sync",
            PolicyKind::UpsertOnly => "upsert-only",
            PolicyKind::CreateOnly => "create-only",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RegistryKind {
    Txt,
    Noop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Project-wide configuration, populated from command-line flags and
/// their environment variable equivalents.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dnsopsd",
    version,
    about = "DNSOps synchronizes DNS records of one or more sources with DNS providers.",
    long_about = "DNSOps synchronizes DNS records of one or more sources with DNS providers.\n\n\
                  All flags may be replaced with env vars: `--example-flag value` becomes `DNSOPS_EXAMPLE_FLAG=value`."
)]
pub struct Config {
    /// The resource types that are queried for endpoints; repeat for
    /// multiple sources (required).
    #[arg(long = "source", env = "DNSOPS_SOURCE", value_enum, required = true, value_delimiter = ',')]
    pub sources: Vec<SourceKind>,

    /// Comma-separated parent names used by the dummy source to generate
    /// DNS names.
    #[arg(long = "fqdn-template", env = "DNSOPS_FQDN_TEMPLATE", default_value = "")]
    pub fqdn_template: String,

    /// The server to connect to for the connector source; valid only when
    /// using the connector source.
    #[arg(
        long = "connector-source-server",
        env = "DNSOPS_CONNECTOR_SOURCE_SERVER",
        default_value = "localhost:9876"
    )]
    pub connector_source_server: String,

    /// Globally set targets that REPLACE the targets of every source
    /// endpoint (an operator override; per-source targets are discarded).
    /// Repeat for multiple targets.
    #[arg(long = "default-targets", env = "DNSOPS_DEFAULT_TARGETS", value_delimiter = ',')]
    pub default_targets: Vec<String>,

    /// The DNS provider where the DNS records will be created (required).
    #[arg(long = "provider", env = "DNSOPS_PROVIDER", value_enum)]
    pub provider: ProviderKind,

    /// Limit possible target zones by a domain suffix; repeat for
    /// multiple domains.
    #[arg(long = "domain-filter", env = "DNSOPS_DOMAIN_FILTER", value_delimiter = ',')]
    pub domain_filter: Vec<String>,

    /// Exclude subdomains from the domain filter.
    #[arg(long = "exclude-domains", env = "DNSOPS_EXCLUDE_DOMAINS", value_delimiter = ',')]
    pub exclude_domains: Vec<String>,

    /// Limit possible domains and target zones by a regex filter;
    /// overrides domain-filter.
    #[arg(long = "regex-domain-filter", env = "DNSOPS_REGEX_DOMAIN_FILTER", value_parser = parse_regex)]
    pub regex_domain_filter: Option<Regex>,

    /// Regex filter that excludes domains matched by regex-domain-filter.
    #[arg(long = "regex-domain-exclusion", env = "DNSOPS_REGEX_DOMAIN_EXCLUSION", value_parser = parse_regex)]
    pub regex_domain_exclusion: Option<Regex>,

    /// Filter target zones by hosted zone id; repeat for multiple zones.
    #[arg(long = "zone-id-filter", env = "DNSOPS_ZONE_ID_FILTER", value_delimiter = ',')]
    pub zone_id_filter: Vec<String>,

    /// How DNS records are synchronized between sources and providers.
    #[arg(long = "policy", env = "DNSOPS_POLICY", value_enum, default_value = "sync")]
    pub policy: PolicyKind,

    /// The registry implementation used to keep track of DNS record
    /// ownership.
    #[arg(long = "registry", env = "DNSOPS_REGISTRY", value_enum, default_value = "txt")]
    pub registry: RegistryKind,

    /// When using the TXT registry, a name that identifies this instance
    /// of DNSOps.
    #[arg(long = "txt-owner-id", env = "DNSOPS_TXT_OWNER_ID", default_value = "default")]
    pub txt_owner_id: String,

    /// When using the TXT registry, a custom string prefixed to each
    /// ownership DNS record. Mutually exclusive with txt-suffix.
    #[arg(
        long = "txt-prefix",
        env = "DNSOPS_TXT_PREFIX",
        default_value = "",
        conflicts_with = "txt_suffix"
    )]
    pub txt_prefix: String,

    /// When using the TXT registry, a custom string suffixed to the host
    /// portion of each ownership DNS record. Mutually exclusive with
    /// txt-prefix.
    #[arg(long = "txt-suffix", env = "DNSOPS_TXT_SUFFIX", default_value = "")]
    pub txt_suffix: String,

    /// When using the TXT registry, a custom string used instead of an
    /// asterisk for TXT records corresponding to wildcard DNS records.
    #[arg(
        long = "txt-wildcard-replacement",
        env = "DNSOPS_TXT_WILDCARD_REPLACEMENT",
        default_value = ""
    )]
    pub txt_wildcard_replacement: String,

    /// The interval between registry cache synchronizations (0s to
    /// disable the cache).
    #[arg(long = "txt-cache-interval", env = "DNSOPS_TXT_CACHE_INTERVAL", default_value = "0s", value_parser = parse_duration)]
    pub txt_cache_interval: Duration,

    /// The interval between two consecutive synchronizations.
    #[arg(long = "interval", env = "DNSOPS_INTERVAL", default_value = "1m", value_parser = parse_duration)]
    pub interval: Duration,

    /// The minimum interval between two consecutive synchronizations
    /// triggered from watch events.
    #[arg(
        long = "min-event-sync-interval",
        env = "DNSOPS_MIN_EVENT_SYNC_INTERVAL",
        default_value = "5s",
        value_parser = parse_duration
    )]
    pub min_event_sync_interval: Duration,

    /// Comma-separated list of record types to manage.
    #[arg(
        long = "managed-record-types",
        env = "DNSOPS_MANAGED_RECORD_TYPES",
        value_delimiter = ',',
        default_value = "A,CNAME",
        value_parser = parse_record_type
    )]
    pub managed_record_types: Vec<RecordType>,

    /// Exit the synchronization loop after the first iteration.
    #[arg(long = "once", env = "DNSOPS_ONCE")]
    pub once: bool,

    /// Print DNS record changes rather than actually performing them.
    #[arg(long = "dry-run", env = "DNSOPS_DRY_RUN")]
    pub dry_run: bool,

    /// In addition to running every interval, trigger the reconciliation
    /// loop when supported sources change.
    #[arg(long = "events", env = "DNSOPS_EVENTS")]
    pub events: bool,

    /// Address to serve metrics and the health check on.
    #[arg(long = "metrics-address", env = "DNSOPS_METRICS_ADDRESS", default_value = "0.0.0.0:7979")]
    pub metrics_address: String,

    /// The format in which log messages are printed.
    #[arg(long = "log-format", env = "DNSOPS_LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,

    /// The level of logging.
    #[arg(long = "log-level", env = "DNSOPS_LOG_LEVEL", value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// When using the Cloudflare provider, enable the proxy mode by
    /// default.
    #[arg(long = "cloudflare-proxied", env = "DNSOPS_CLOUDFLARE_PROXIED")]
    pub cloudflare_proxied: bool,

    /// When using the Cloudflare provider, how many zones per page are
    /// listed (max 50).
    #[arg(
        long = "cloudflare-zones-per-page",
        env = "DNSOPS_CLOUDFLARE_ZONES_PER_PAGE",
        default_value_t = 50
    )]
    pub cloudflare_zones_per_page: usize,

    /// When using the Cloudflare provider, the API token (sensitive;
    /// masked in logged configuration).
    #[arg(
        long = "cloudflare-api-token",
        env = "DNSOPS_CLOUDFLARE_API_TOKEN",
        default_value = "",
        hide_env_values = true
    )]
    pub cloudflare_api_token: String,

    /// Pre-configured zones for the inmemory provider; repeat for
    /// multiple zones.
    #[arg(long = "inmemory-zone", env = "DNSOPS_INMEMORY_ZONE", value_delimiter = ',')]
    pub inmemory_zones: Vec<String>,
}

impl Config {
    /// Validation beyond what the flag parser enforces.
    pub fn validate(&self) -> Result<(), String> {
        if self.sources.is_empty() {
            return Err("no sources specified".to_string());
        }
        if !self.txt_prefix.is_empty() && !self.txt_suffix.is_empty() {
            return Err("txt-prefix and txt-suffix are mutually exclusive".to_string());
        }
        if self.managed_record_types.is_empty() {
            return Err("no managed record types specified".to_string());
        }
        if self.provider == ProviderKind::Cloudflare && self.cloudflare_api_token.is_empty() {
            return Err("cloudflare-api-token is required for the cloudflare provider".to_string());
        }
        Ok(())
    }

    /// The effective domain filter: the regex variant overrides the
    /// literal suffix variant.
    pub fn effective_domain_filter(&self) -> DomainFilter {
        match &self.regex_domain_filter {
            Some(include) => {
                DomainFilter::regex(include.clone(), self.regex_domain_exclusion.clone())
            }
            None => DomainFilter::with_exclusions(
                self.domain_filter.clone(),
                self.exclude_domains.clone(),
            ),
        }
    }
}

impl fmt::Display for Config {
    /// The loggable configuration, with sensitive values replaced by a
    /// mask.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut masked = self.clone();
        if !masked.cloudflare_api_token.is_empty() {
            masked.cloudflare_api_token = PASSWORD_MASK.to_string();
        }
        write!(f, "{masked:?}")
    }
}

fn parse_regex(value: &str) -> Result<Regex, String> {
    Regex::new(value).map_err(|e| e.to_string())
}

fn parse_record_type(value: &str) -> Result<RecordType, String> {
    value.parse::<RecordType>().map_err(|e| e.to_string())
}

/// Parses a Go-style duration string: an integer with an optional `ms`,
/// `s`, `m` or `h` unit. A bare integer is taken as seconds.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("duration cannot be empty".to_string());
    }
    let split = value
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);
    let amount: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration value: {value}"))?;
    match unit {
        "ms" => Ok(Duration::from_millis(amount)),
        "" | "s" => Ok(Duration::from_secs(amount)),
        "m" => Ok(Duration::from_secs(amount * 60)),
        "h" => Ok(Duration::from_secs(amount * 3600)),
        _ => Err(format!(
            "unsupported duration unit '{unit}', use ms, s, m or h"
        )),
    }
}
