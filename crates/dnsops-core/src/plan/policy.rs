//! Policies apply operational rules to a computed change set.
//!
//! A policy is a pure function on a [`Changes`] record. Policies never
//! reorder or merge entries; they only drop whole classes of changes.

use super::Changes;

/// Applies rules to a set of changes.
pub trait Policy: Send + Sync {
    fn apply(&self, changes: Changes) -> Changes;
}

/// Full synchronization of DNS records.
pub struct SyncPolicy;

impl Policy for SyncPolicy {
    /// Returns the set of changes as is.
    fn apply(&self, changes: Changes) -> Changes {
        changes
    }
}

/// Allows everything but deleting DNS records.
pub struct UpsertOnlyPolicy;

impl Policy for UpsertOnlyPolicy {
    /// Strips out any deletions.
    fn apply(&self, changes: Changes) -> Changes {
        Changes {
            delete: Vec::new(),
            ..changes
        }
    }
}

/// Allows only creating DNS records.
pub struct CreateOnlyPolicy;

impl Policy for CreateOnlyPolicy {
    /// Strips out updates and deletions.
    fn apply(&self, changes: Changes) -> Changes {
        Changes {
            create: changes.create,
            ..Changes::default()
        }
    }
}

/// Looks up a built-in policy by its configured name.
pub fn policy_by_name(name: &str) -> Option<Box<dyn Policy>> {
    match name {
        "sync" => Some(Box::new(SyncPolicy)),
        "upsert-only" => Some(Box::new(UpsertOnlyPolicy)),
        "create-only" => Some(Box::new(CreateOnlyPolicy)),
        _ => None,
    }
}
