//! Built-in sources and source composers.
//!
//! The controller consumes exactly one [`Source`]; multiple configured
//! sources are merged by [`MultiSource`] and stripped of duplicates by
//! [`DedupSource`].

mod dummy;

pub use dummy::DummySource;

use crate::endpoint::{Endpoint, Targets};
use crate::error::Result;
use crate::traits::{EventHandler, Source};
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::debug;

/// A source that merges the endpoints of its nested sources.
///
/// When `default_targets` is non-empty, every child endpoint's targets are
/// replaced with that list: a global operator override that discards
/// per-source targets.
pub struct MultiSource {
    children: Vec<Box<dyn Source>>,
    default_targets: Vec<String>,
}

impl MultiSource {
    pub fn new(children: Vec<Box<dyn Source>>, default_targets: Vec<String>) -> Self {
        Self {
            children,
            default_targets,
        }
    }
}

#[async_trait]
impl Source for MultiSource {
    /// Collects endpoints of all nested sources into a single sequence.
    /// A failure from any child aborts the whole call.
    async fn endpoints(&self) -> Result<Vec<Endpoint>> {
        let mut result = Vec::new();
        for child in &self.children {
            let mut endpoints = child.endpoints().await?;
            if !self.default_targets.is_empty() {
                for ep in &mut endpoints {
                    ep.targets = Targets(self.default_targets.clone());
                }
            }
            result.append(&mut endpoints);
        }
        Ok(result)
    }

    fn add_event_handler(&self, handler: EventHandler) {
        for child in &self.children {
            child.add_event_handler(handler.clone());
        }
    }
}

/// A source that removes duplicate endpoints from its wrapped source,
/// keyed on (name, set identifier, canonical targets). The first
/// occurrence wins.
pub struct DedupSource {
    source: Box<dyn Source>,
}

impl DedupSource {
    pub fn new(source: Box<dyn Source>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Source for DedupSource {
    async fn endpoints(&self) -> Result<Vec<Endpoint>> {
        let mut result = Vec::new();
        let mut collected = HashSet::new();

        for ep in self.source.endpoints().await? {
            let identifier = format!(
                "{} / {} / {}",
                ep.dns_name,
                ep.set_identifier,
                ep.targets.canonical()
            );
            if !collected.insert(identifier) {
                debug!(endpoint = %ep, "removing duplicate endpoint");
                continue;
            }
            result.push(ep);
        }

        Ok(result)
    }

    fn add_event_handler(&self, handler: EventHandler) {
        self.source.add_event_handler(handler);
    }
}

/// A source that returns no endpoints.
pub struct EmptySource;

#[async_trait]
impl Source for EmptySource {
    async fn endpoints(&self) -> Result<Vec<Endpoint>> {
        Ok(Vec::new())
    }
}
