//! A registry without ownership, directly propagating changes to the DNS
//! provider.

use super::Registry;
use crate::endpoint::{DomainFilter, Endpoint};
use crate::error::Result;
use crate::plan::Changes;
use crate::traits::Provider;
use async_trait::async_trait;

/// Implements the registry contract without any ownership concept.
pub struct NoopRegistry {
    provider: Box<dyn Provider>,
}

impl NoopRegistry {
    pub fn new(provider: Box<dyn Provider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Registry for NoopRegistry {
    /// Returns the current records from the DNS provider.
    async fn records(&self) -> Result<Vec<Endpoint>> {
        self.provider.records().await
    }

    /// Propagates changes to the DNS provider.
    async fn apply_changes(&self, changes: &Changes) -> Result<()> {
        self.provider.apply_changes(changes).await
    }

    fn adjust_endpoints(&self, endpoints: Vec<Endpoint>) -> Vec<Endpoint> {
        self.provider.adjust_endpoints(endpoints)
    }

    fn property_values_equal(&self, name: &str, previous: &str, current: &str) -> bool {
        self.provider.property_values_equal(name, previous, current)
    }

    fn domain_filter(&self) -> DomainFilter {
        self.provider.domain_filter()
    }
}
