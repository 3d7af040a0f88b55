//! The canonical DNS record representation.
//!
//! An [`Endpoint`] describes one desired or current DNS record: a name, a
//! set of targets, a record type, a TTL and the ownership labels attached
//! by the registry. Endpoints are created fresh on every reconciliation
//! tick and discarded afterwards; the companion ownership records on the
//! provider are the only durable state.

mod domain_filter;
mod labels;

pub use domain_filter::DomainFilter;
pub use labels::{InvalidOrigin, Labels, OWNER_LABEL_KEY, RESOURCE_LABEL_KEY};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Minimum TTL a source may configure, in seconds.
pub const TTL_MINIMUM: i64 = 1;
/// Maximum TTL a source may configure, in seconds.
pub const TTL_MAXIMUM: i64 = i32::MAX as i64;

/// DNS record types managed by DNSOps. Anything else is filtered out on
/// ingress from providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    Cname,
    Srv,
    Txt,
    Ns,
}

impl RecordType {
    /// The wire representation of the record type.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Cname => "CNAME",
            RecordType::Srv => "SRV",
            RecordType::Txt => "TXT",
            RecordType::Ns => "NS",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "A" => Ok(RecordType::A),
            "CNAME" => Ok(RecordType::Cname),
            "SRV" => Ok(RecordType::Srv),
            "TXT" => Ok(RecordType::Txt),
            "NS" => Ok(RecordType::Ns),
            other => Err(crate::Error::config(format!(
                "unsupported record type: {other}"
            ))),
        }
    }
}

/// Returns true only for record types DNSOps knows how to manage.
pub fn supported_record_type(record_type: &str) -> bool {
    RecordType::from_str(record_type).is_ok()
}

/// Record TTL in seconds. A value of `0` means "unset, use the provider
/// default".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Ttl(pub i64);

impl Ttl {
    /// Whether a TTL was explicitly configured by a source.
    pub fn is_configured(&self) -> bool {
        self.0 > 0
    }

    /// Clamps a configured TTL into the supported range; `0` stays unset.
    pub fn clamped(self) -> Self {
        if self.0 <= 0 {
            Ttl(0)
        } else {
            Ttl(self.0.clamp(TTL_MINIMUM, TTL_MAXIMUM))
        }
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The targets of a DNS record: IPv4 literals for A records, hostnames for
/// CNAME, and so on.
///
/// Equality between target sets is case-insensitive and order-insensitive.
/// [`Targets::is_less`] defines a total order used for deterministic
/// tie-breaks between conflicting endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Targets(pub Vec<String>);

impl Targets {
    /// Whether two target sets coincide under case-insensitive comparison,
    /// ignoring order.
    pub fn same(&self, other: &Targets) -> bool {
        self.0.len() == other.0.len() && self.lowercase_sorted() == other.lowercase_sorted()
    }

    /// Total order over target sets: shorter sets sort first, equal-length
    /// sets compare lexicographically after sorting.
    pub fn is_less(&self, other: &Targets) -> bool {
        if self.0.len() != other.0.len() {
            return self.0.len() < other.0.len();
        }
        let mut a = self.0.clone();
        let mut b = other.0.clone();
        a.sort();
        b.sort();
        a < b
    }

    /// A canonical string form (sorted, lowercased) used as a dedup key.
    pub fn canonical(&self) -> String {
        self.lowercase_sorted().join(";")
    }

    fn lowercase_sorted(&self) -> Vec<String> {
        let mut targets: Vec<String> = self.0.iter().map(|t| t.to_lowercase()).collect();
        targets.sort();
        targets
    }
}

impl fmt::Display for Targets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(";"))
    }
}

impl std::ops::Deref for Targets {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<String>> for Targets {
    fn from(targets: Vec<String>) -> Self {
        Targets(targets)
    }
}

impl<const N: usize> From<[&str; N]> for Targets {
    fn from(targets: [&str; N]) -> Self {
        Targets(targets.iter().map(|t| t.to_string()).collect())
    }
}

/// A provider-dependent hint attached to an endpoint, e.g. a proxy toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSpecificProperty {
    pub name: String,
    pub value: String,
}

/// One desired or current DNS record.
///
/// The triple (`dns_name`, `record_type`, `set_identifier`) uniquely
/// identifies an endpoint within a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Fully-qualified domain name, lowercased, without a trailing dot.
    pub dns_name: String,
    /// The record targets.
    pub targets: Targets,
    pub record_type: RecordType,
    /// Disambiguates weighted/geo record sets sharing the same name.
    #[serde(default)]
    pub set_identifier: String,
    #[serde(default)]
    pub record_ttl: Ttl,
    /// Ownership metadata, attached by the registry on the read path.
    #[serde(default)]
    pub labels: Labels,
    /// Provider-dependent hints.
    #[serde(default)]
    pub provider_specific: Vec<ProviderSpecificProperty>,
}

impl Endpoint {
    /// Creates an endpoint with an unset TTL.
    pub fn new(dns_name: &str, record_type: RecordType, targets: impl Into<Targets>) -> Self {
        Self::new_with_ttl(dns_name, record_type, Ttl(0), targets)
    }

    /// Creates an endpoint with the given TTL, clamped into the supported
    /// range. The DNS name is normalized: trailing dot stripped, lowercased.
    pub fn new_with_ttl(
        dns_name: &str,
        record_type: RecordType,
        ttl: Ttl,
        targets: impl Into<Targets>,
    ) -> Self {
        let targets = targets.into();
        let targets = Targets(
            targets
                .0
                .into_iter()
                .map(|t| t.trim_end_matches('.').to_string())
                .collect(),
        );
        Endpoint {
            dns_name: dns_name.trim_end_matches('.').to_lowercase(),
            targets,
            record_type,
            set_identifier: String::new(),
            record_ttl: ttl.clamped(),
            labels: Labels::new(),
            provider_specific: Vec::new(),
        }
    }

    pub fn with_set_identifier(mut self, set_identifier: &str) -> Self {
        self.set_identifier = set_identifier.to_string();
        self
    }

    /// Attaches a provider-specific property.
    pub fn with_provider_specific(mut self, name: &str, value: &str) -> Self {
        self.provider_specific.push(ProviderSpecificProperty {
            name: name.to_string(),
            value: value.to_string(),
        });
        self
    }

    /// Looks up a provider-specific property by name.
    pub fn provider_specific_property(&self, name: &str) -> Option<&str> {
        self.provider_specific
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} IN {} {} {}",
            self.dns_name, self.record_ttl, self.record_type, self.set_identifier, self.targets
        )
    }
}
