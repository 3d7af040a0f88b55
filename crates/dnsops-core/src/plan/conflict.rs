//! Conflict resolution between endpoints contending for the same record
//! key.

use crate::endpoint::Endpoint;

/// Makes a decision when two or more resources try to acquire the same DNS
/// name. Resolution must be deterministic: the same candidate set yields
/// the same winner across runs.
pub trait ConflictResolver: Send + Sync {
    /// Picks the winner when the record key is not present in the current
    /// state yet. `candidates` is never empty.
    fn resolve_create<'a>(&self, candidates: &'a [Endpoint]) -> &'a Endpoint;

    /// Picks the winner when `current` already holds the record key.
    /// `candidates` is never empty.
    fn resolve_update<'a>(&self, current: &Endpoint, candidates: &'a [Endpoint]) -> &'a Endpoint;
}

/// Allows only one resource to own a given DNS name.
pub struct PerResource;

impl ConflictResolver for PerResource {
    /// Takes the candidate with the minimal target set (per
    /// [`Targets::is_less`](crate::endpoint::Targets::is_less)) to acquire
    /// the record.
    fn resolve_create<'a>(&self, candidates: &'a [Endpoint]) -> &'a Endpoint {
        let mut min = &candidates[0];
        for ep in &candidates[1..] {
            if ep.targets.is_less(&min.targets) {
                min = ep;
            }
        }
        min
    }

    /// Uses `current` as the base: the first candidate whose `resource`
    /// label matches the current owner's wins. If none matches, falls back
    /// to [`resolve_create`](Self::resolve_create).
    fn resolve_update<'a>(&self, current: &Endpoint, candidates: &'a [Endpoint]) -> &'a Endpoint {
        let current_resource = current.labels.resource();
        let mut sorted: Vec<&Endpoint> = candidates.iter().collect();
        sorted.sort_by(|x, y| {
            if x.targets.is_less(&y.targets) {
                std::cmp::Ordering::Less
            } else if y.targets.is_less(&x.targets) {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        });
        for ep in sorted {
            if ep.labels.resource() == current_resource {
                return ep;
            }
        }
        self.resolve_create(candidates)
    }
}
