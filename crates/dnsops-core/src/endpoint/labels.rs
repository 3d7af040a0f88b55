//! Ownership metadata attached to endpoints.
//!
//! Labels are persisted inside companion TXT records as a comma-separated
//! token list: `origin=dnsops,dnsops/owner=default,dnsops/resource=r1`,
//! keys sorted ascending. A TXT record whose content carries no `origin`
//! token, or an origin other than ours, belongs to somebody else and parses
//! to [`InvalidOrigin`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// The origin token identifying records owned by this controller family.
const ORIGIN: &str = "dnsops";

/// Label key naming the controller instance that owns an endpoint.
pub const OWNER_LABEL_KEY: &str = "owner";
/// Label key identifying the resource which acquired the DNS name.
pub const RESOURCE_LABEL_KEY: &str = "resource";

/// Returned when an ownership record's origin is missing or foreign.
/// Not a failure: it signals "treat this record as foreign, never mutate".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("origin is unknown or not found")]
pub struct InvalidOrigin;

/// Metadata related to an endpoint, stored via serialization in a companion
/// TXT record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Labels(BTreeMap<String, String>);

impl Labels {
    /// Returns empty labels.
    pub fn new() -> Self {
        Labels(BTreeMap::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        self.0.insert(key.to_string(), value.to_string());
    }

    /// The `owner` label, if present.
    pub fn owner(&self) -> Option<&str> {
        self.get(OWNER_LABEL_KEY)
    }

    /// The `resource` label, if present.
    pub fn resource(&self) -> Option<&str> {
        self.get(RESOURCE_LABEL_KEY)
    }

    /// Parses labels from their serialized form.
    ///
    /// Tokens are split on `,`, then on the first `=`; tokens without
    /// exactly one `=` are skipped. Finding `origin=<other>` or no origin
    /// token at all yields [`InvalidOrigin`].
    pub fn parse(label_text: &str) -> Result<Labels, InvalidOrigin> {
        let label_text = label_text.trim_matches('"');
        let mut labels = BTreeMap::new();
        let mut found_origin = false;
        let prefix = format!("{ORIGIN}/");

        for token in label_text.split(',') {
            if token.split('=').count() != 2 {
                continue;
            }
            let (key, value) = token.split_once('=').expect("token contains one '='");
            if key == "origin" {
                if value != ORIGIN {
                    return Err(InvalidOrigin);
                }
                found_origin = true;
                continue;
            }
            if let Some(key) = key.strip_prefix(&prefix) {
                labels.insert(key.to_string(), value.to_string());
            }
        }

        if !found_origin {
            return Err(InvalidOrigin);
        }

        Ok(Labels(labels))
    }

    /// Serializes the labels into the recognizable format string, keys
    /// sorted ascending. `with_quotes` wraps the result in double quotes
    /// for storage inside a TXT record.
    pub fn serialize(&self, with_quotes: bool) -> String {
        let mut tokens = vec![format!("origin={ORIGIN}")];
        for (key, value) in &self.0 {
            tokens.push(format!("{ORIGIN}/{key}={value}"));
        }
        let joined = tokens.join(",");
        if with_quotes {
            format!("\"{joined}\"")
        } else {
            joined
        }
    }
}

impl FromIterator<(String, String)> for Labels {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Labels(iter.into_iter().collect())
    }
}
