//! Zone routing and filtering helpers shared by concrete providers.

use std::collections::HashMap;

/// Maps opaque zone IDs to zone suffix names and routes record names to
/// the zone whose name is the longest suffix of the record name.
#[derive(Debug, Clone, Default)]
pub struct ZoneIdName(HashMap<String, String>);

impl ZoneIdName {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, zone_id: impl Into<String>, zone_name: impl Into<String>) {
        self.0.insert(zone_id.into(), zone_name.into());
    }

    /// Finds the zone for a record name: the zone name must equal the
    /// hostname or match `.<zone_name>` at its end; among candidates the
    /// longest zone name wins. Returns `(zone_id, zone_name)`.
    pub fn find_zone(&self, hostname: &str) -> Option<(&str, &str)> {
        let mut suitable: Option<(&str, &str)> = None;
        for (zone_id, zone_name) in &self.0 {
            if hostname == zone_name || hostname.ends_with(&format!(".{zone_name}")) {
                match suitable {
                    Some((_, name)) if name.len() >= zone_name.len() => {}
                    _ => suitable = Some((zone_id, zone_name)),
                }
            }
        }
        suitable
    }
}

/// Holds a list of zone ids to filter by. An empty filter includes all
/// zones.
#[derive(Debug, Clone, Default)]
pub struct ZoneIdFilter {
    zone_ids: Vec<String>,
}

impl ZoneIdFilter {
    pub fn new(zone_ids: Vec<String>) -> Self {
        Self {
            zone_ids: zone_ids.into_iter().filter(|id| !id.is_empty()).collect(),
        }
    }

    /// Whether a zone matches one of the provided zone ids.
    pub fn matches(&self, zone_id: &str) -> bool {
        self.zone_ids.is_empty() || self.zone_ids.iter().any(|id| zone_id.ends_with(id))
    }

    pub fn is_empty(&self) -> bool {
        self.zone_ids.is_empty()
    }

    pub fn zone_ids(&self) -> &[String] {
        &self.zone_ids
    }
}
