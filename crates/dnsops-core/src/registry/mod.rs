//! Ownership registries.
//!
//! A registry decorates a provider so that reads attach ownership metadata
//! to the returned endpoints and writes maintain whatever persistent
//! ownership marker the registry uses. The TXT registry stores companion
//! TXT records next to each managed record; the noop registry tracks
//! nothing and passes straight through.

mod noop;
mod txt;

pub use noop::NoopRegistry;
pub use txt::TxtRegistry;

use crate::endpoint::{DomainFilter, Endpoint};
use crate::error::Result;
use crate::plan::Changes;
use async_trait::async_trait;
use tracing::debug;

/// Enables the ownership concept on top of a provider.
///
/// `records` returns all records registered with the DNS provider, each
/// entry carrying owner information in its labels. `apply_changes`
/// propagates the changes to the provider API and correspondingly updates
/// ownership depending on the registry in use.
#[async_trait]
pub trait Registry: Send + Sync {
    async fn records(&self) -> Result<Vec<Endpoint>>;
    async fn apply_changes(&self, changes: &Changes) -> Result<()>;
    fn adjust_endpoints(&self, endpoints: Vec<Endpoint>) -> Vec<Endpoint>;
    fn property_values_equal(&self, name: &str, previous: &str, current: &str) -> bool;
    fn domain_filter(&self) -> DomainFilter;
}

/// Keeps only the endpoints whose `owner` label matches `owner_id`.
pub(crate) fn filter_owned_records(owner_id: &str, endpoints: &[Endpoint]) -> Vec<Endpoint> {
    endpoints
        .iter()
        .filter(|ep| {
            let owned = ep.labels.owner() == Some(owner_id);
            if !owned {
                debug!(
                    endpoint = %ep,
                    found = ep.labels.owner().unwrap_or(""),
                    required = owner_id,
                    "skipping endpoint because owner id does not match"
                );
            }
            owned
        })
        .cloned()
        .collect()
}
