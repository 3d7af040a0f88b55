//! Plan computation: diffs desired against current records and produces a
//! minimal change set subject to policy, ownership and conflict
//! resolution.

mod conflict;
mod policy;

pub use conflict::{ConflictResolver, PerResource};
pub use policy::{policy_by_name, CreateOnlyPolicy, Policy, SyncPolicy, UpsertOnlyPolicy};

use crate::endpoint::{DomainFilter, Endpoint, RecordType, OWNER_LABEL_KEY};
use std::collections::BTreeMap;
use tracing::debug;

/// The transition from current towards desired state, grouped into four
/// ordered sequences. `update_old[i]` and `update_new[i]` describe the same
/// record identity before and after the change and are paired by index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changes {
    pub create: Vec<Endpoint>,
    pub update_old: Vec<Endpoint>,
    pub update_new: Vec<Endpoint>,
    pub delete: Vec<Endpoint>,
}

impl Changes {
    /// Whether the change set contains no work at all.
    pub fn is_empty(&self) -> bool {
        self.create.is_empty()
            && self.update_old.is_empty()
            && self.update_new.is_empty()
            && self.delete.is_empty()
    }
}

/// Comparator for provider-specific property values, injected by the
/// registry/provider pair driving the plan.
pub type PropertyComparator<'a> = &'a (dyn Fn(&str, &str, &str) -> bool + Sync);

/// Compares two boolean-valued property strings, falling back to the
/// provider default when a value is absent or unparsable.
pub fn compare_boolean(default: bool, name: &str, previous: &str, current: &str) -> bool {
    let parse = |value: &str| -> bool {
        if value.is_empty() {
            return default;
        }
        match value.parse::<bool>() {
            Ok(b) => b,
            Err(_) => {
                debug!(property = name, value, "failed to parse boolean property");
                default
            }
        }
    };
    parse(previous) == parse(current)
}

/// One reconciliation pass' inputs: the current records (from the
/// registry, ownership attached), the desired records (from the sources,
/// provider-adjusted) and the knobs governing the diff.
pub struct Plan<'a> {
    pub current: Vec<Endpoint>,
    pub desired: Vec<Endpoint>,
    pub domain_filter: &'a DomainFilter,
    pub managed_record_types: &'a [RecordType],
    pub owner_id: &'a str,
    pub resolver: &'a dyn ConflictResolver,
    pub policy: &'a dyn Policy,
    pub property_comparator: PropertyComparator<'a>,
}

/// A record key: the triple uniquely identifying an endpoint within one
/// reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct PlanKey {
    dns_name: String,
    record_type: RecordType,
    set_identifier: String,
}

impl PlanKey {
    fn of(ep: &Endpoint) -> Self {
        PlanKey {
            dns_name: ep.dns_name.to_lowercase(),
            record_type: ep.record_type,
            set_identifier: ep.set_identifier.clone(),
        }
    }
}

#[derive(Default)]
struct Row {
    current: Option<Endpoint>,
    candidates: Vec<Endpoint>,
}

impl Plan<'_> {
    /// Computes the change set. The result is empty iff desired and
    /// owned-current coincide in all observable fields.
    pub fn calculate(&self) -> Changes {
        let mut rows: BTreeMap<PlanKey, Row> = BTreeMap::new();

        for ep in self.current.iter().filter(|ep| self.keeps(ep)) {
            rows.entry(PlanKey::of(ep)).or_default().current = Some(ep.clone());
        }
        for ep in self.desired.iter().filter(|ep| self.keeps(ep)) {
            if ep.targets.is_empty() {
                debug!(endpoint = %ep, "skipping desired endpoint without targets");
                continue;
            }
            rows.entry(PlanKey::of(ep))
                .or_default()
                .candidates
                .push(ep.clone());
        }

        let mut changes = Changes::default();
        for (_, row) in rows {
            match (row.current, row.candidates) {
                (None, candidates) if !candidates.is_empty() => {
                    changes
                        .create
                        .push(self.resolver.resolve_create(&candidates).clone());
                }
                (Some(current), candidates) if !candidates.is_empty() => {
                    let desired = self.resolver.resolve_update(&current, &candidates);
                    if !self.needs_update(&current, desired) {
                        continue;
                    }
                    if !self.owns(&current) {
                        debug!(endpoint = %current, "skipping update of foreign endpoint");
                        continue;
                    }
                    let mut new = desired.clone();
                    inherit_owner(&current, &mut new);
                    changes.update_old.push(current);
                    changes.update_new.push(new);
                }
                (Some(current), _) => {
                    if self.owns(&current) {
                        changes.delete.push(current);
                    } else {
                        debug!(endpoint = %current, "skipping delete of foreign endpoint");
                    }
                }
                (None, _) => {}
            }
        }

        self.policy.apply(changes)
    }

    fn keeps(&self, ep: &Endpoint) -> bool {
        self.managed_record_types.contains(&ep.record_type)
            && self.domain_filter.matches(&ep.dns_name)
    }

    fn owns(&self, ep: &Endpoint) -> bool {
        ep.labels.owner() == Some(self.owner_id)
    }

    fn needs_update(&self, current: &Endpoint, desired: &Endpoint) -> bool {
        if !current.targets.same(&desired.targets) {
            return true;
        }
        if desired.record_ttl.is_configured() && desired.record_ttl != current.record_ttl {
            return true;
        }
        self.provider_specific_changed(current, desired)
    }

    fn provider_specific_changed(&self, current: &Endpoint, desired: &Endpoint) -> bool {
        let equal = self.property_comparator;
        let mut desired_properties: BTreeMap<&str, &str> = desired
            .provider_specific
            .iter()
            .map(|p| (p.name.as_str(), p.value.as_str()))
            .collect();
        for property in &current.provider_specific {
            match desired_properties.remove(property.name.as_str()) {
                Some(desired_value) => {
                    if !equal(&property.name, &property.value, desired_value) {
                        return true;
                    }
                }
                None => {
                    if !equal(&property.name, &property.value, "") {
                        return true;
                    }
                }
            }
        }
        desired_properties
            .iter()
            .any(|(name, value)| !equal(name, "", value))
    }
}

fn inherit_owner(from: &Endpoint, to: &mut Endpoint) {
    if let Some(owner) = from.labels.owner() {
        let owner = owner.to_string();
        to.labels.insert(OWNER_LABEL_KEY, &owner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{Targets, Ttl, OWNER_LABEL_KEY, RESOURCE_LABEL_KEY};

    const MANAGED: &[RecordType] = &[RecordType::A, RecordType::Cname];

    fn owned(mut ep: Endpoint, owner: &str) -> Endpoint {
        ep.labels.insert(OWNER_LABEL_KEY, owner);
        ep
    }

    fn syntactic_equal(_name: &str, previous: &str, current: &str) -> bool {
        previous == current
    }

    fn plan<'a>(
        current: Vec<Endpoint>,
        desired: Vec<Endpoint>,
        filter: &'a DomainFilter,
        policy: &'a dyn Policy,
    ) -> Plan<'a> {
        Plan {
            current,
            desired,
            domain_filter: filter,
            managed_record_types: MANAGED,
            owner_id: "default",
            resolver: &PerResource,
            policy,
            property_comparator: &syntactic_equal,
        }
    }

    #[test]
    fn new_desired_record_is_created() {
        let filter = DomainFilter::default();
        let desired = vec![Endpoint::new("svc.example.com", RecordType::A, ["192.0.2.10"])];
        let changes = plan(vec![], desired.clone(), &filter, &SyncPolicy).calculate();
        assert_eq!(changes.create, desired);
        assert!(changes.update_old.is_empty());
        assert!(changes.delete.is_empty());
    }

    #[test]
    fn identical_state_yields_empty_changes() {
        let filter = DomainFilter::default();
        let ep = Endpoint::new("svc.example.com", RecordType::A, ["192.0.2.10"]);
        let current = vec![owned(ep.clone(), "default")];
        let changes = plan(current, vec![ep], &filter, &SyncPolicy).calculate();
        assert!(changes.is_empty());
    }

    #[test]
    fn changed_targets_yield_paired_update() {
        let filter = DomainFilter::default();
        let current = vec![owned(
            Endpoint::new("svc.example.com", RecordType::A, ["192.0.2.10"]),
            "default",
        )];
        let desired = vec![Endpoint::new("svc.example.com", RecordType::A, ["192.0.2.20"])];
        let changes = plan(current.clone(), desired, &filter, &SyncPolicy).calculate();
        assert_eq!(changes.update_old, current);
        assert_eq!(changes.update_new.len(), 1);
        assert_eq!(changes.update_new[0].targets, Targets::from(["192.0.2.20"]));
        // Owner label is inherited from the matched current endpoint.
        assert_eq!(changes.update_new[0].labels.owner(), Some("default"));
    }

    #[test]
    fn configured_ttl_difference_triggers_update() {
        let filter = DomainFilter::default();
        let current = vec![owned(
            Endpoint::new_with_ttl("svc.example.com", RecordType::A, Ttl(300), ["192.0.2.10"]),
            "default",
        )];
        let desired = vec![Endpoint::new_with_ttl(
            "svc.example.com",
            RecordType::A,
            Ttl(600),
            ["192.0.2.10"],
        )];
        let changes = plan(current.clone(), desired, &filter, &SyncPolicy).calculate();
        assert_eq!(changes.update_new.len(), 1);

        // An unset desired TTL is not a difference.
        let desired = vec![Endpoint::new("svc.example.com", RecordType::A, ["192.0.2.10"])];
        let changes = plan(current, desired, &filter, &SyncPolicy).calculate();
        assert!(changes.is_empty());
    }

    #[test]
    fn orphaned_owned_record_is_deleted() {
        let filter = DomainFilter::default();
        let current = vec![owned(
            Endpoint::new("old.example.com", RecordType::A, ["192.0.2.1"]),
            "default",
        )];
        let changes = plan(current.clone(), vec![], &filter, &SyncPolicy).calculate();
        assert_eq!(changes.delete, current);
    }

    #[test]
    fn foreign_records_are_never_touched() {
        let filter = DomainFilter::default();
        // No labels at all: foreign.
        let unlabeled = vec![Endpoint::new("a.example.com", RecordType::A, ["192.0.2.1"])];
        let changes = plan(unlabeled, vec![], &filter, &SyncPolicy).calculate();
        assert!(changes.is_empty());

        // Labeled with another owner: foreign too, for deletes and updates.
        let other = vec![owned(
            Endpoint::new("a.example.com", RecordType::A, ["192.0.2.1"]),
            "other",
        )];
        let changes = plan(other.clone(), vec![], &filter, &SyncPolicy).calculate();
        assert!(changes.is_empty());

        let desired = vec![Endpoint::new("a.example.com", RecordType::A, ["192.0.2.2"])];
        let changes = plan(other, desired, &filter, &SyncPolicy).calculate();
        assert!(changes.is_empty());
    }

    #[test]
    fn unmanaged_types_and_filtered_domains_are_dropped() {
        let filter = DomainFilter::new(vec!["example.com".to_string()]);
        let desired = vec![
            Endpoint::new("svc.example.com", RecordType::Txt, ["\"some text\""]),
            Endpoint::new("svc.example.org", RecordType::A, ["192.0.2.1"]),
            Endpoint::new("svc.example.com", RecordType::A, ["192.0.2.1"]),
        ];
        let changes = plan(vec![], desired, &filter, &SyncPolicy).calculate();
        assert_eq!(changes.create.len(), 1);
        assert_eq!(changes.create[0].dns_name, "svc.example.com");
        assert_eq!(changes.create[0].record_type, RecordType::A);
    }

    #[test]
    fn conflicting_candidates_resolve_to_smallest_targets() {
        let filter = DomainFilter::default();
        let desired = vec![
            Endpoint::new("svc.example.com", RecordType::A, ["10.0.0.2"]),
            Endpoint::new("svc.example.com", RecordType::A, ["10.0.0.1"]),
        ];
        let changes = plan(vec![], desired, &filter, &SyncPolicy).calculate();
        assert_eq!(changes.create.len(), 1);
        assert_eq!(changes.create[0].targets, Targets::from(["10.0.0.1"]));
    }

    #[test]
    fn resolve_update_prefers_current_resource() {
        let filter = DomainFilter::default();
        let mut current = owned(
            Endpoint::new("svc.example.com", RecordType::A, ["10.0.0.1"]),
            "default",
        );
        current.labels.insert(RESOURCE_LABEL_KEY, "r2");

        let mut c1 = Endpoint::new("svc.example.com", RecordType::A, ["10.0.0.1"]);
        c1.labels.insert(RESOURCE_LABEL_KEY, "r1");
        let mut c2 = Endpoint::new("svc.example.com", RecordType::A, ["10.0.0.9"]);
        c2.labels.insert(RESOURCE_LABEL_KEY, "r2");

        let changes = plan(vec![current], vec![c1, c2], &filter, &SyncPolicy).calculate();
        // The r2 candidate wins despite larger targets, and its target
        // change is applied.
        assert_eq!(changes.update_new.len(), 1);
        assert_eq!(changes.update_new[0].targets, Targets::from(["10.0.0.9"]));
    }

    #[test]
    fn upsert_only_policy_suppresses_deletes() {
        let filter = DomainFilter::default();
        let current = vec![owned(
            Endpoint::new("old.example.com", RecordType::A, ["192.0.2.1"]),
            "default",
        )];
        let changes = plan(current, vec![], &filter, &UpsertOnlyPolicy).calculate();
        assert!(changes.is_empty());
    }

    #[test]
    fn create_only_policy_keeps_only_creates() {
        let filter = DomainFilter::default();
        let current = vec![owned(
            Endpoint::new("old.example.com", RecordType::A, ["192.0.2.1"]),
            "default",
        )];
        let desired = vec![
            Endpoint::new("new.example.com", RecordType::A, ["192.0.2.2"]),
            Endpoint::new("old.example.com", RecordType::A, ["192.0.2.9"]),
        ];
        let changes = plan(current, desired, &filter, &CreateOnlyPolicy).calculate();
        assert_eq!(changes.create.len(), 1);
        assert!(changes.update_old.is_empty());
        assert!(changes.update_new.is_empty());
        assert!(changes.delete.is_empty());
    }

    #[test]
    fn provider_specific_comparison_uses_the_comparator() {
        let filter = DomainFilter::default();
        let current = vec![owned(
            Endpoint::new("svc.example.com", RecordType::A, ["192.0.2.1"])
                .with_provider_specific("proxied", "1"),
            "default",
        )];
        let desired = vec![Endpoint::new("svc.example.com", RecordType::A, ["192.0.2.1"])
            .with_provider_specific("proxied", "true")];

        // Syntactic comparison sees a difference.
        let changes = plan(current.clone(), desired.clone(), &filter, &SyncPolicy).calculate();
        assert_eq!(changes.update_new.len(), 1);

        // A boolean-aware comparator does not.
        let policy = SyncPolicy;
        let comparator =
            |name: &str, previous: &str, current: &str| compare_boolean(false, name, previous, current);
        let mut p = plan(current, desired, &filter, &policy);
        p.property_comparator = &comparator;
        assert!(p.calculate().is_empty());
    }

    #[test]
    fn compare_boolean_falls_back_to_default() {
        assert!(compare_boolean(true, "p", "", "true"));
        assert!(compare_boolean(false, "p", "garbage", "false"));
        assert!(!compare_boolean(false, "p", "true", "false"));
    }

    #[test]
    fn no_record_appears_in_both_create_and_delete() {
        let filter = DomainFilter::default();
        let current = vec![owned(
            Endpoint::new("svc.example.com", RecordType::A, ["192.0.2.1"]),
            "default",
        )];
        let desired = vec![Endpoint::new("svc.example.com", RecordType::A, ["192.0.2.2"])];
        let changes = plan(current, desired, &filter, &SyncPolicy).calculate();
        let created: Vec<&str> = changes.create.iter().map(|e| e.dns_name.as_str()).collect();
        for deleted in &changes.delete {
            assert!(!created.contains(&deleted.dns_name.as_str()));
        }
        assert_eq!(changes.update_old.len(), changes.update_new.len());
    }

    #[test]
    fn unlabeled_current_with_desired_candidate_blocks_creation() {
        // A foreign record occupying the key must not be recreated either.
        let filter = DomainFilter::default();
        let current = vec![Endpoint::new("svc.example.com", RecordType::A, ["192.0.2.1"])];
        let desired = vec![Endpoint::new("svc.example.com", RecordType::A, ["192.0.2.2"])];
        let changes = plan(current, desired, &filter, &SyncPolicy).calculate();
        assert!(changes.is_empty());
    }
}
