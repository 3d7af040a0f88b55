//! # In-memory provider
//!
//! A [`Provider`] holding records in process memory, organized into
//! pre-configured zones. Useful for dry-running sources against a real
//! control loop and as the end-to-end test vehicle.
//!
//! Apply semantics follow the provider contract: individual invalid
//! changes are logged and skipped, the overall call succeeds, and records
//! matching no configured zone are dropped with a debug log.

use async_trait::async_trait;
use dnsops_core::endpoint::{DomainFilter, Endpoint};
use dnsops_core::error::Result;
use dnsops_core::plan::Changes;
use dnsops_core::traits::Provider;
use dnsops_core::zone::ZoneIdName;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, info, warn};

/// DNS provider over in-process zone maps. Zone ids equal zone names.
pub struct InMemoryProvider {
    zones: RwLock<HashMap<String, Vec<Endpoint>>>,
    domain_filter: DomainFilter,
    dry_run: bool,
}

impl InMemoryProvider {
    /// Creates a provider with the given pre-configured zone names.
    pub fn new<I, S>(zone_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let zones = zone_names
            .into_iter()
            .map(|name| (name.into().trim_end_matches('.').to_lowercase(), Vec::new()))
            .collect();
        Self {
            zones: RwLock::new(zones),
            domain_filter: DomainFilter::default(),
            dry_run: false,
        }
    }

    /// Restricts the provider to names matching `filter`.
    pub fn with_domain_filter(mut self, filter: DomainFilter) -> Self {
        self.domain_filter = filter;
        self
    }

    /// Logs intended changes without storing them.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn zone_routing(&self) -> ZoneIdName {
        let mut routing = ZoneIdName::new();
        for name in self.zones.read().unwrap().keys() {
            routing.add(name.clone(), name.clone());
        }
        routing
    }

    fn same_identity(a: &Endpoint, b: &Endpoint) -> bool {
        a.dns_name == b.dns_name
            && a.record_type == b.record_type
            && a.set_identifier == b.set_identifier
    }
}

#[async_trait]
impl Provider for InMemoryProvider {
    async fn records(&self) -> Result<Vec<Endpoint>> {
        let zones = self.zones.read().unwrap();
        Ok(zones.values().flatten().cloned().collect())
    }

    async fn apply_changes(&self, changes: &Changes) -> Result<()> {
        let routing = self.zone_routing();
        let mut zones = self.zones.write().unwrap();

        let route = |ep: &Endpoint| -> Option<String> {
            match routing.find_zone(&ep.dns_name) {
                Some((zone_id, _)) => Some(zone_id.to_string()),
                None => {
                    debug!(record = %ep, "skipping record with no matching hosted zone");
                    None
                }
            }
        };

        for ep in &changes.create {
            let Some(zone_id) = route(ep) else { continue };
            info!(record = %ep, zone = %zone_id, action = "CREATE", "changing record");
            if self.dry_run {
                continue;
            }
            let Some(records) = zones.get_mut(&zone_id) else { continue };
            if records.iter().any(|r| Self::same_identity(r, ep)) {
                warn!(record = %ep, "skipping create of already existing record");
                continue;
            }
            records.push(ep.clone());
        }

        for (old, new) in changes.update_old.iter().zip(&changes.update_new) {
            let Some(zone_id) = route(new) else { continue };
            info!(record = %new, zone = %zone_id, action = "UPDATE", "changing record");
            if self.dry_run {
                continue;
            }
            let Some(records) = zones.get_mut(&zone_id) else { continue };
            match records.iter_mut().find(|r| Self::same_identity(r, old)) {
                Some(record) => *record = new.clone(),
                None => warn!(record = %old, "skipping update of missing record"),
            }
        }

        for ep in &changes.delete {
            let Some(zone_id) = route(ep) else { continue };
            info!(record = %ep, zone = %zone_id, action = "DELETE", "changing record");
            if self.dry_run {
                continue;
            }
            let Some(records) = zones.get_mut(&zone_id) else { continue };
            let before = records.len();
            records.retain(|r| !Self::same_identity(r, ep));
            if records.len() == before {
                warn!(record = %ep, "skipping delete of missing record");
            }
        }

        Ok(())
    }

    fn domain_filter(&self) -> DomainFilter {
        self.domain_filter.clone()
    }
}
