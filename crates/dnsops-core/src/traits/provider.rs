//! The Provider contract.
//!
//! A provider is the binding to an authoritative DNS backend: it reads the
//! records currently in its zones and applies change sets. Providers are
//! isolated integrations; retry and scheduling decisions are owned by the
//! controller.

use crate::endpoint::{DomainFilter, Endpoint};
use crate::error::Result;
use crate::plan::Changes;
use async_trait::async_trait;

/// Trait DNS providers implement.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Returns every record currently in zones this provider manages,
    /// grouped so that multiple targets for the same (name, type) collapse
    /// into a single endpoint with a target sequence.
    async fn records(&self) -> Result<Vec<Endpoint>>;

    /// Best-effort application of a change set. Individual change failures
    /// are logged and skipped; the call fails only when zones cannot be
    /// fetched or the API is unreachable.
    async fn apply_changes(&self, changes: &Changes) -> Result<()>;

    /// Provider-specific normalization of desired endpoints, e.g. forcing
    /// an unset TTL when a proxy toggle is on. Returns new values and never
    /// mutates shared inputs.
    fn adjust_endpoints(&self, endpoints: Vec<Endpoint>) -> Vec<Endpoint> {
        endpoints
    }

    /// Comparator for provider-specific properties, allowing non-syntactic
    /// equality such as boolean parsing.
    fn property_values_equal(&self, _name: &str, previous: &str, current: &str) -> bool {
        previous == current
    }

    /// Provider-imposed zone scoping, to be intersected with user filters.
    fn domain_filter(&self) -> DomainFilter {
        DomainFilter::default()
    }
}

/// Ensures that a hostname receives a trailing dot if it hasn't already.
/// IP address literals are returned unchanged.
pub fn ensure_trailing_dot(hostname: &str) -> String {
    if hostname.parse::<std::net::IpAddr>().is_ok() {
        return hostname.to_string();
    }
    format!("{}.", hostname.trim_end_matches('.'))
}

/// Tells which entries need to be respectively added, removed, or left
/// untouched for `current` to be transformed into `desired`.
pub fn difference(
    current: &[String],
    desired: &[String],
) -> (Vec<String>, Vec<String>, Vec<String>) {
    let mut index: std::collections::HashSet<&String> = current.iter().collect();
    let mut add = Vec::new();
    let mut leave = Vec::new();
    for target in desired {
        if index.remove(target) {
            leave.push(target.clone());
        } else {
            add.push(target.clone());
        }
    }
    let remove = index.into_iter().cloned().collect();
    (add, remove, leave)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_trailing_dot_leaves_ips_alone() {
        assert_eq!(ensure_trailing_dot("example.com"), "example.com.");
        assert_eq!(ensure_trailing_dot("example.com."), "example.com.");
        assert_eq!(ensure_trailing_dot("192.0.2.1"), "192.0.2.1");
    }

    #[test]
    fn difference_splits_target_sets() {
        let current = vec!["a".to_string(), "b".to_string()];
        let desired = vec!["b".to_string(), "c".to_string()];
        let (add, remove, leave) = difference(&current, &desired);
        assert_eq!(add, vec!["c".to_string()]);
        assert_eq!(remove, vec!["a".to_string()]);
        assert_eq!(leave, vec!["b".to_string()]);
    }
}
