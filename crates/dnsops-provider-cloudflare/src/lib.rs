//! # Cloudflare DNS provider
//!
//! A [`Provider`] implementation over the Cloudflare v4 HTTP API.
//!
//! Cloudflare does not support sets of targets: it returns one entry per
//! (name, type, content), so the read path groups records by name and type
//! into multi-target endpoints, and the write path fans each change out
//! into per-target API calls. Records are routed to zones by longest
//! suffix match.
//!
//! The provider is an isolated integration: one pass of API calls per
//! operation, no retry or backoff (owned by the controller), no caching
//! beyond a single `apply_changes` call. The API token never appears in
//! logs or `Debug` output.

use async_trait::async_trait;
use dnsops_core::endpoint::{DomainFilter, Endpoint, RecordType, Ttl};
use dnsops_core::error::{Error, Result};
use dnsops_core::plan::{compare_boolean, Changes};
use dnsops_core::traits::{difference, Provider};
use dnsops_core::zone::{ZoneIdFilter, ZoneIdName};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info};

/// Cloudflare API base URL.
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// HTTP timeout for API requests.
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Cloudflare's "automatic" TTL sentinel.
const DEFAULT_CLOUDFLARE_RECORD_TTL: i64 = 1;

/// Provider-specific property toggling the Cloudflare proxy per endpoint.
pub const CLOUDFLARE_PROXIED_KEY: &str = "dnsops/cloudflare-proxied";

/// Records per page when listing zones or records.
const RECORDS_PER_PAGE: usize = 100;

#[derive(Debug, Clone, Deserialize)]
struct Zone {
    id: String,
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct DnsRecord {
    id: String,
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    content: String,
    ttl: i64,
    #[serde(default)]
    proxied: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    result: Vec<T>,
    #[serde(default)]
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct SingleResponse<T> {
    result: T,
}

#[derive(Debug, Clone, Serialize)]
struct RecordPayload {
    #[serde(rename = "type")]
    record_type: String,
    name: String,
    content: String,
    ttl: i64,
    proxied: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChangeAction {
    Create,
    Update,
    Delete,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeAction::Create => "CREATE",
            ChangeAction::Update => "UPDATE",
            ChangeAction::Delete => "DELETE",
        })
    }
}

/// One per-target change against the Cloudflare API.
#[derive(Debug, Clone)]
struct CloudflareChange {
    action: ChangeAction,
    record: RecordPayload,
}

/// DNS provider for Cloudflare.
pub struct CloudflareProvider {
    client: reqwest::Client,
    api_token: String,
    domain_filter: DomainFilter,
    zone_id_filter: ZoneIdFilter,
    zones_per_page: usize,
    proxied_by_default: bool,
    dry_run: bool,
}

impl fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("domain_filter", &self.domain_filter)
            .field("zones_per_page", &self.zones_per_page)
            .field("proxied_by_default", &self.proxied_by_default)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareProvider {
    /// Creates a Cloudflare provider. The token needs Zone:DNS:Edit
    /// permissions and never shows up in logs.
    pub fn new(
        api_token: impl Into<String>,
        domain_filter: DomainFilter,
        zone_id_filter: ZoneIdFilter,
        zones_per_page: usize,
        proxied_by_default: bool,
        dry_run: bool,
    ) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("cloudflare API token cannot be empty"));
        }
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::provider("cloudflare", e.to_string()))?;
        Ok(Self {
            client,
            api_token,
            domain_filter,
            zone_id_filter,
            zones_per_page: zones_per_page.max(1),
            proxied_by_default,
            dry_run,
        })
    }

    async fn api_get<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| Error::provider("cloudflare", format!("HTTP request failed: {e}")))?;
        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| Error::provider("cloudflare", format!("failed to parse response: {e}")))
    }

    /// The zones this provider manages: either the explicitly configured
    /// zone ids, or all reachable zones narrowed by the domain filter.
    async fn zones(&self) -> Result<Vec<Zone>> {
        let mut zones = Vec::new();

        if !self.zone_id_filter.is_empty() {
            debug!("zone id filter configured, only looking up defined zone ids");
            for zone_id in self.zone_id_filter.zone_ids() {
                let url = format!("{CLOUDFLARE_API_BASE}/zones/{zone_id}");
                match self.api_get::<SingleResponse<Zone>>(&url).await {
                    Ok(response) => {
                        debug!(zone = %response.result.name, id = %response.result.id, "adding zone for consideration");
                        zones.push(response.result);
                    }
                    Err(e) => error!(zone = %zone_id, error = %e, "zone lookup failed"),
                }
            }
            return Ok(zones);
        }

        let mut page = 1u32;
        loop {
            let url = format!(
                "{CLOUDFLARE_API_BASE}/zones?page={page}&per_page={}",
                self.zones_per_page
            );
            let response: ListResponse<Zone> = self.api_get(&url).await?;
            for zone in response.result {
                if !self.domain_filter.matches(&zone.name) {
                    debug!(zone = %zone.name, "zone not in domain filter");
                    continue;
                }
                zones.push(zone);
            }
            let total_pages = response.result_info.unwrap_or_default().total_pages;
            if page >= total_pages {
                break;
            }
            page += 1;
        }
        Ok(zones)
    }

    async fn zone_records(&self, zone_id: &str) -> Result<Vec<DnsRecord>> {
        let mut records = Vec::new();
        let mut page = 1u32;
        loop {
            let url = format!(
                "{CLOUDFLARE_API_BASE}/zones/{zone_id}/dns_records?page={page}&per_page={RECORDS_PER_PAGE}"
            );
            let response: ListResponse<DnsRecord> = self.api_get(&url).await?;
            records.extend(response.result);
            let total_pages = response.result_info.unwrap_or_default().total_pages;
            if page >= total_pages {
                break;
            }
            page += 1;
        }
        Ok(records)
    }

    fn new_change(&self, action: ChangeAction, endpoint: &Endpoint, target: &str) -> CloudflareChange {
        let ttl = if endpoint.record_ttl.is_configured() {
            endpoint.record_ttl.0
        } else {
            DEFAULT_CLOUDFLARE_RECORD_TTL
        };
        CloudflareChange {
            action,
            record: RecordPayload {
                record_type: endpoint.record_type.to_string(),
                name: endpoint.dns_name.clone(),
                content: target.to_string(),
                ttl,
                proxied: should_be_proxied(endpoint, self.proxied_by_default),
            },
        }
    }

    /// Sends per-zone change sets to the API. Individual record failures
    /// are logged and skipped; only zone/record listing failures abort.
    async fn submit_changes(&self, changes: Vec<CloudflareChange>) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let zones = self.zones().await?;
        let changes_by_zone = changes_by_zone(&zones, changes);

        for (zone_id, changes) in changes_by_zone {
            let records = self.zone_records(&zone_id).await.map_err(|e| {
                Error::provider("cloudflare", format!("could not fetch records from zone: {e}"))
            })?;

            for change in changes {
                info!(
                    record = %change.record.name,
                    r#type = %change.record.record_type,
                    ttl = change.record.ttl,
                    action = %change.action,
                    zone = %zone_id,
                    "changing record"
                );
                if self.dry_run {
                    continue;
                }
                if let Err(e) = self.submit_change(&zone_id, &records, &change).await {
                    error!(
                        record = %change.record.name,
                        action = %change.action,
                        error = %e,
                        "failed to apply record change"
                    );
                }
            }
        }
        Ok(())
    }

    async fn submit_change(
        &self,
        zone_id: &str,
        records: &[DnsRecord],
        change: &CloudflareChange,
    ) -> Result<()> {
        match change.action {
            ChangeAction::Create => {
                let url = format!("{CLOUDFLARE_API_BASE}/zones/{zone_id}/dns_records");
                let response = self
                    .client
                    .post(&url)
                    .bearer_auth(&self.api_token)
                    .json(&change.record)
                    .send()
                    .await
                    .map_err(|e| Error::provider("cloudflare", e.to_string()))?;
                check_status(response).await?;
            }
            ChangeAction::Update | ChangeAction::Delete => {
                let Some(record_id) = find_record_id(records, &change.record) else {
                    return Err(Error::provider("cloudflare", "failed to find previous record"));
                };
                let url =
                    format!("{CLOUDFLARE_API_BASE}/zones/{zone_id}/dns_records/{record_id}");
                let request = if change.action == ChangeAction::Update {
                    self.client.put(&url).json(&change.record)
                } else {
                    self.client.delete(&url)
                };
                let response = request
                    .bearer_auth(&self.api_token)
                    .send()
                    .await
                    .map_err(|e| Error::provider("cloudflare", e.to_string()))?;
                check_status(response).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Provider for CloudflareProvider {
    async fn records(&self) -> Result<Vec<Endpoint>> {
        let zones = self.zones().await?;
        let mut endpoints = Vec::new();
        for zone in zones {
            let records = self.zone_records(&zone.id).await?;
            endpoints.extend(group_by_name_and_type(records));
        }
        Ok(endpoints)
    }

    async fn apply_changes(&self, changes: &Changes) -> Result<()> {
        let mut cloudflare_changes = Vec::new();

        for endpoint in &changes.create {
            for target in endpoint.targets.iter() {
                cloudflare_changes.push(self.new_change(ChangeAction::Create, endpoint, target));
            }
        }

        for (current, desired) in changes.update_old.iter().zip(&changes.update_new) {
            let (add, remove, leave) = difference(&current.targets, &desired.targets);
            for target in &add {
                cloudflare_changes.push(self.new_change(ChangeAction::Create, desired, target));
            }
            for target in &leave {
                cloudflare_changes.push(self.new_change(ChangeAction::Update, desired, target));
            }
            for target in &remove {
                cloudflare_changes.push(self.new_change(ChangeAction::Delete, current, target));
            }
        }

        for endpoint in &changes.delete {
            for target in endpoint.targets.iter() {
                cloudflare_changes.push(self.new_change(ChangeAction::Delete, endpoint, target));
            }
        }

        self.submit_changes(cloudflare_changes).await
    }

    /// Proxied endpoints get their TTL forced to "automatic". Consumes and
    /// returns the endpoints; shared inputs are never rewritten.
    fn adjust_endpoints(&self, endpoints: Vec<Endpoint>) -> Vec<Endpoint> {
        endpoints
            .into_iter()
            .map(|mut ep| {
                if should_be_proxied(&ep, self.proxied_by_default) {
                    ep.record_ttl = Ttl(0);
                }
                ep
            })
            .collect()
    }

    fn property_values_equal(&self, name: &str, previous: &str, current: &str) -> bool {
        if name == CLOUDFLARE_PROXIED_KEY {
            return compare_boolean(self.proxied_by_default, name, previous, current);
        }
        previous == current
    }

    fn domain_filter(&self) -> DomainFilter {
        self.domain_filter.clone()
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = match status.as_u16() {
        401 | 403 => format!("authentication failed: invalid token or insufficient permissions ({status})"),
        404 => format!("not found ({status}): {body}"),
        429 => format!("rate limit exceeded ({status})"),
        500..=599 => format!("server error (transient, {status}): {body}"),
        _ => format!("request failed ({status}): {body}"),
    };
    Err(Error::provider("cloudflare", message))
}

/// Whether an endpoint should go through the Cloudflare proxy. TXT, SRV
/// and NS records and wildcard names are never proxied.
fn should_be_proxied(endpoint: &Endpoint, proxied_by_default: bool) -> bool {
    let mut proxied = proxied_by_default;
    if let Some(value) = endpoint.provider_specific_property(CLOUDFLARE_PROXIED_KEY) {
        match value.parse::<bool>() {
            Ok(b) => proxied = b,
            Err(e) => error!(property = CLOUDFLARE_PROXIED_KEY, error = %e, "failed to parse property"),
        }
    }
    let type_not_supported = matches!(
        endpoint.record_type,
        RecordType::Txt | RecordType::Srv | RecordType::Ns
    );
    if type_not_supported || endpoint.dns_name.contains('*') {
        proxied = false;
    }
    proxied
}

/// Routes per-target changes into per-zone buckets by longest suffix
/// match; changes matching no zone are dropped with a debug log.
fn changes_by_zone(
    zones: &[Zone],
    changes: Vec<CloudflareChange>,
) -> HashMap<String, Vec<CloudflareChange>> {
    let mut routing = ZoneIdName::new();
    let mut by_zone: HashMap<String, Vec<CloudflareChange>> = HashMap::new();
    for zone in zones {
        routing.add(zone.id.clone(), zone.name.clone());
        by_zone.insert(zone.id.clone(), Vec::new());
    }

    for change in changes {
        match routing.find_zone(&change.record.name) {
            Some((zone_id, _)) => {
                if let Some(bucket) = by_zone.get_mut(zone_id) {
                    bucket.push(change);
                }
            }
            None => {
                debug!(
                    record = %change.record.name,
                    "skipping record because no hosted zone matching record DNS name was detected"
                );
            }
        }
    }
    by_zone
}

fn find_record_id(records: &[DnsRecord], payload: &RecordPayload) -> Option<String> {
    records
        .iter()
        .find(|r| {
            r.name == payload.name
                && r.record_type == payload.record_type
                && r.content == payload.content
        })
        .map(|r| r.id.clone())
}

/// Groups raw per-target records by (name, type) into single endpoints
/// with a target sequence, dropping unsupported record types.
fn group_by_name_and_type(records: Vec<DnsRecord>) -> Vec<Endpoint> {
    let mut groups: Vec<(String, RecordType, Vec<DnsRecord>)> = Vec::new();
    for record in records {
        let Ok(record_type) = record.record_type.parse::<RecordType>() else {
            continue;
        };
        let key = format!("{}{}", record.name, record.record_type);
        match groups.iter_mut().find(|(k, _, _)| *k == key) {
            Some((_, _, group)) => group.push(record),
            None => groups.push((key, record_type, vec![record])),
        }
    }

    groups
        .into_iter()
        .map(|(_, record_type, group)| {
            let targets: Vec<String> = group.iter().map(|r| r.content.clone()).collect();
            let first = &group[0];
            Endpoint::new_with_ttl(&first.name, record_type, Ttl(first.ttl), targets)
                .with_provider_specific(CLOUDFLARE_PROXIED_KEY, &first.proxied.to_string())
        })
        .collect()
}
