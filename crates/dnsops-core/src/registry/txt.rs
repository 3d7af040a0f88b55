//! The TXT ownership registry.
//!
//! For every record it manages, the registry stores a companion TXT record
//! whose content is the serialized label set, e.g.
//! `"origin=dnsops,dnsops/owner=default,dnsops/resource=r1"`. On the read
//! path companions are stripped from the provider's records and their
//! labels attached to the matching target record; records with no
//! recognized companion come back with empty labels and are treated as
//! foreign downstream.

use super::{filter_owned_records, Registry};
use crate::endpoint::{
    DomainFilter, Endpoint, Labels, RecordType, OWNER_LABEL_KEY,
};
use crate::error::{Error, Result};
use crate::plan::Changes;
use crate::traits::Provider;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Derives companion-record names from target-record names.
///
/// Either a prefix is prepended to the whole name, or a suffix is appended
/// to the host portion; the two are mutually exclusive. Wildcard labels
/// (`*`) are replaced with a configured literal when generating companion
/// names, since TXT wildcards are commonly disallowed upstream.
#[derive(Debug, Clone)]
enum NameMapper {
    Prefix {
        prefix: String,
        wildcard_replacement: String,
    },
    Suffix {
        suffix: String,
        wildcard_replacement: String,
    },
}

impl NameMapper {
    fn new(prefix: &str, suffix: &str, wildcard_replacement: &str) -> Result<Self> {
        if !prefix.is_empty() && !suffix.is_empty() {
            return Err(Error::config(
                "txt-prefix and txt-suffix are mutually exclusive",
            ));
        }
        let wildcard_replacement = wildcard_replacement.to_lowercase();
        if suffix.is_empty() {
            Ok(NameMapper::Prefix {
                prefix: prefix.to_lowercase(),
                wildcard_replacement,
            })
        } else {
            Ok(NameMapper::Suffix {
                suffix: suffix.to_lowercase(),
                wildcard_replacement,
            })
        }
    }

    fn wildcard_replacement(&self) -> &str {
        match self {
            NameMapper::Prefix {
                wildcard_replacement,
                ..
            }
            | NameMapper::Suffix {
                wildcard_replacement,
                ..
            } => wildcard_replacement,
        }
    }

    /// The companion name for an endpoint name.
    fn to_txt_name(&self, endpoint_name: &str) -> String {
        let name = if !self.wildcard_replacement().is_empty() {
            endpoint_name.replacen('*', self.wildcard_replacement(), 1)
        } else {
            endpoint_name.to_string()
        };
        match self {
            NameMapper::Prefix { prefix, .. } => format!("{prefix}{name}"),
            NameMapper::Suffix { suffix, .. } => match name.split_once('.') {
                Some((host, parent)) => format!("{host}{suffix}.{parent}"),
                None => format!("{name}{suffix}"),
            },
        }
    }

    /// Undoes the companion transform; `None` when the name does not carry
    /// the configured prefix/suffix.
    fn to_endpoint_name(&self, txt_name: &str) -> Option<String> {
        match self {
            NameMapper::Prefix { prefix, .. } => {
                txt_name.strip_prefix(prefix.as_str()).map(str::to_string)
            }
            NameMapper::Suffix { suffix, .. } => match txt_name.split_once('.') {
                Some((host, parent)) => host
                    .strip_suffix(suffix.as_str())
                    .map(|host| format!("{host}.{parent}")),
                None => txt_name.strip_suffix(suffix.as_str()).map(str::to_string),
            },
        }
    }
}

struct Snapshot {
    endpoints: Vec<Endpoint>,
    refreshed_at: Instant,
}

/// Decorates a provider with TXT-record based ownership.
pub struct TxtRegistry {
    provider: Box<dyn Provider>,
    owner_id: String,
    mapper: NameMapper,
    cache_interval: Duration,
    cache: Mutex<Option<Snapshot>>,
}

impl TxtRegistry {
    /// Creates a TXT registry wrapping `provider`. `prefix` and `suffix`
    /// are mutually exclusive; `cache_interval` of zero disables the
    /// records cache.
    pub fn new(
        provider: Box<dyn Provider>,
        owner_id: &str,
        prefix: &str,
        suffix: &str,
        wildcard_replacement: &str,
        cache_interval: Duration,
    ) -> Result<Self> {
        if owner_id.is_empty() {
            return Err(Error::config("owner id cannot be empty"));
        }
        Ok(Self {
            provider,
            owner_id: owner_id.to_string(),
            mapper: NameMapper::new(prefix, suffix, wildcard_replacement)?,
            cache_interval,
            cache: Mutex::new(None),
        })
    }

    /// Synthesizes the companion TXT record carrying `labels` for a
    /// managed endpoint.
    fn ownership_record(&self, endpoint: &Endpoint) -> Endpoint {
        Endpoint::new(
            &self.mapper.to_txt_name(&endpoint.dns_name),
            RecordType::Txt,
            [endpoint.labels.serialize(true).as_str()],
        )
    }

    fn cached_records(&self) -> Option<Vec<Endpoint>> {
        if self.cache_interval.is_zero() {
            return None;
        }
        let cache = self.cache.lock().unwrap();
        cache
            .as_ref()
            .filter(|snap| snap.refreshed_at.elapsed() < self.cache_interval)
            .map(|snap| snap.endpoints.clone())
    }

    fn refresh_cache(&self, endpoints: &[Endpoint]) {
        if self.cache_interval.is_zero() {
            return;
        }
        *self.cache.lock().unwrap() = Some(Snapshot {
            endpoints: endpoints.to_vec(),
            refreshed_at: Instant::now(),
        });
    }

    /// Folds an applied change set into the cached snapshot so reads
    /// within the cache interval reflect the write.
    fn apply_to_cache(&self, changes: &Changes) {
        if self.cache_interval.is_zero() {
            return;
        }
        let mut cache = self.cache.lock().unwrap();
        let Some(snapshot) = cache.as_mut() else {
            return;
        };
        let same_identity = |a: &Endpoint, b: &Endpoint| {
            a.dns_name == b.dns_name
                && a.record_type == b.record_type
                && a.set_identifier == b.set_identifier
        };
        for created in &changes.create {
            snapshot.endpoints.push(created.clone());
        }
        for (old, new) in changes.update_old.iter().zip(&changes.update_new) {
            for ep in &mut snapshot.endpoints {
                if same_identity(ep, old) {
                    *ep = new.clone();
                }
            }
        }
        for deleted in &changes.delete {
            snapshot.endpoints.retain(|ep| !same_identity(ep, deleted));
        }
    }

    fn invalidate_cache(&self) {
        *self.cache.lock().unwrap() = None;
    }
}

#[async_trait]
impl Registry for TxtRegistry {
    /// Calls the wrapped provider, separates the TXT records that parse as
    /// ownership, and attaches their labels to the corresponding target
    /// records.
    async fn records(&self) -> Result<Vec<Endpoint>> {
        if let Some(cached) = self.cached_records() {
            debug!("returning cached records");
            return Ok(cached);
        }

        let records = self.provider.records().await?;
        let mut endpoints = Vec::new();
        let mut label_map: HashMap<String, Labels> = HashMap::new();

        for record in records {
            if record.record_type != RecordType::Txt {
                endpoints.push(record);
                continue;
            }
            let content = record.targets.first().map(String::as_str).unwrap_or("");
            match Labels::parse(content) {
                Ok(labels) => {
                    // An ownership companion: consume it.
                    if let Some(name) = self.mapper.to_endpoint_name(&record.dns_name) {
                        label_map.insert(name, labels);
                    }
                }
                Err(_) => {
                    debug!(record = %record, "TXT record has foreign or missing origin");
                    endpoints.push(record);
                }
            }
        }

        for ep in &mut endpoints {
            let labels = label_map.get(&ep.dns_name).or_else(|| {
                let replacement = self.mapper.wildcard_replacement();
                if ep.dns_name.contains('*') && !replacement.is_empty() {
                    label_map.get(&ep.dns_name.replacen('*', replacement, 1))
                } else {
                    None
                }
            });
            if let Some(labels) = labels {
                ep.labels = labels.clone();
            }
        }

        self.refresh_cache(&endpoints);
        Ok(endpoints)
    }

    /// Translates the change set into provider calls plus ownership-record
    /// maintenance: companions are created next to creates, removed next
    /// to deletes, and rewritten on updates only when labels changed.
    async fn apply_changes(&self, changes: &Changes) -> Result<()> {
        let mut filtered = Changes {
            create: changes.create.clone(),
            update_old: Vec::new(),
            update_new: Vec::new(),
            delete: filter_owned_records(&self.owner_id, &changes.delete),
        };
        for (old, new) in changes.update_old.iter().zip(&changes.update_new) {
            if old.labels.owner() == Some(self.owner_id.as_str()) {
                filtered.update_old.push(old.clone());
                filtered.update_new.push(new.clone());
            } else {
                debug!(endpoint = %old, "skipping update of record not owned by us");
            }
        }

        for record in &mut filtered.create {
            record.labels.insert(OWNER_LABEL_KEY, &self.owner_id);
        }
        for record in &mut filtered.update_new {
            record.labels.insert(OWNER_LABEL_KEY, &self.owner_id);
        }

        let mut outgoing = filtered.clone();
        for record in &filtered.create {
            outgoing.create.push(self.ownership_record(record));
        }
        for record in &filtered.delete {
            outgoing.delete.push(self.ownership_record(record));
        }
        for (old, new) in filtered.update_old.iter().zip(&filtered.update_new) {
            if old.labels != new.labels {
                outgoing.update_old.push(self.ownership_record(old));
                outgoing.update_new.push(self.ownership_record(new));
            }
        }

        match self.provider.apply_changes(&outgoing).await {
            Ok(()) => {
                self.apply_to_cache(&filtered);
                Ok(())
            }
            Err(e) => {
                self.invalidate_cache();
                Err(e)
            }
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::RESOURCE_LABEL_KEY;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockProvider {
        records: Mutex<Vec<Endpoint>>,
        applied: Mutex<Vec<Changes>>,
        records_calls: AtomicUsize,
    }

    impl MockProvider {
        fn new(records: Vec<Endpoint>) -> Self {
            Self {
                records: Mutex::new(records),
                applied: Mutex::new(Vec::new()),
                records_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        async fn records(&self) -> Result<Vec<Endpoint>> {
            self.records_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.records.lock().unwrap().clone())
        }

        async fn apply_changes(&self, changes: &Changes) -> Result<()> {
            self.applied.lock().unwrap().push(changes.clone());
            Ok(())
        }
    }

    fn registry_over(
        provider: Box<dyn Provider>,
        prefix: &str,
        suffix: &str,
        cache_interval: Duration,
    ) -> TxtRegistry {
        TxtRegistry::new(provider, "default", prefix, suffix, "", cache_interval).unwrap()
    }

    fn owned_companion(name: &str, resource: &str) -> Endpoint {
        let mut labels = Labels::new();
        labels.insert(OWNER_LABEL_KEY, "default");
        labels.insert(RESOURCE_LABEL_KEY, resource);
        Endpoint::new(name, RecordType::Txt, [labels.serialize(true).as_str()])
    }

    #[test]
    fn prefix_and_suffix_are_mutually_exclusive() {
        let provider = Box::new(MockProvider::new(vec![]));
        let result = TxtRegistry::new(provider, "default", "pre-", "-suf", "", Duration::ZERO);
        assert!(result.is_err());

        let provider = Box::new(MockProvider::new(vec![]));
        assert!(TxtRegistry::new(provider, "", "", "", "", Duration::ZERO).is_err());
    }

    #[test]
    fn name_mapper_prefix_round_trips() {
        let mapper = NameMapper::new("dnsops-", "", "").unwrap();
        assert_eq!(mapper.to_txt_name("svc.example.com"), "dnsops-svc.example.com");
        assert_eq!(
            mapper.to_endpoint_name("dnsops-svc.example.com"),
            Some("svc.example.com".to_string())
        );
        assert_eq!(mapper.to_endpoint_name("svc.example.com"), None);
    }

    #[test]
    fn name_mapper_suffix_transforms_host_portion() {
        let mapper = NameMapper::new("", "-owned", "").unwrap();
        assert_eq!(mapper.to_txt_name("svc.example.com"), "svc-owned.example.com");
        assert_eq!(
            mapper.to_endpoint_name("svc-owned.example.com"),
            Some("svc.example.com".to_string())
        );
        assert_eq!(mapper.to_endpoint_name("svc.example.com"), None);
    }

    #[test]
    fn name_mapper_replaces_wildcards() {
        let mapper = NameMapper::new("dnsops-", "", "wildcard").unwrap();
        assert_eq!(
            mapper.to_txt_name("*.example.com"),
            "dnsops-wildcard.example.com"
        );
    }

    #[tokio::test]
    async fn records_attaches_labels_and_strips_companions() {
        let a_record = Endpoint::new("svc.example.com", RecordType::A, ["192.0.2.10"]);
        let provider = MockProvider::new(vec![
            a_record.clone(),
            owned_companion("svc.example.com", "r1"),
        ]);
        let registry = registry_over(Box::new(provider), "", "", Duration::ZERO);

        let records = registry.records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].dns_name, "svc.example.com");
        assert_eq!(records[0].labels.owner(), Some("default"));
        assert_eq!(records[0].labels.resource(), Some("r1"));
    }

    #[tokio::test]
    async fn records_keeps_foreign_txt_with_empty_labels() {
        let provider = MockProvider::new(vec![
            Endpoint::new("svc.example.com", RecordType::A, ["192.0.2.10"]),
            Endpoint::new("svc.example.com", RecordType::Txt, ["origin=other"]),
        ]);
        let registry = registry_over(Box::new(provider), "", "", Duration::ZERO);

        let records = registry.records().await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|ep| ep.labels.owner().is_none()));
    }

    #[tokio::test]
    async fn records_undoes_prefix_when_matching_companions() {
        let provider = MockProvider::new(vec![
            Endpoint::new("svc.example.com", RecordType::A, ["192.0.2.10"]),
            owned_companion("dnsops-svc.example.com", "r1"),
        ]);
        let registry = registry_over(Box::new(provider), "dnsops-", "", Duration::ZERO);

        let records = registry.records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].labels.owner(), Some("default"));
    }

    #[tokio::test]
    async fn create_appends_ownership_companion() {
        let provider = std::sync::Arc::new(MockProvider::new(vec![]));
        let registry = TxtRegistry::new(
            Box::new(SharedProvider(provider.clone())),
            "default",
            "",
            "",
            "",
            Duration::ZERO,
        )
        .unwrap();

        let mut desired = Endpoint::new("svc.example.com", RecordType::A, ["192.0.2.10"]);
        desired.labels.insert(RESOURCE_LABEL_KEY, "r1");
        registry
            .apply_changes(&Changes {
                create: vec![desired],
                ..Changes::default()
            })
            .await
            .unwrap();

        let applied = provider.applied.lock().unwrap();
        assert_eq!(applied.len(), 1);
        let creates = &applied[0].create;
        assert_eq!(creates.len(), 2);
        assert_eq!(creates[0].record_type, RecordType::A);
        assert_eq!(creates[1].record_type, RecordType::Txt);
        assert_eq!(creates[1].dns_name, "svc.example.com");
        assert_eq!(
            creates[1].targets[0],
            "\"origin=dnsops,dnsops/owner=default,dnsops/resource=r1\""
        );
    }

    #[tokio::test]
    async fn delete_of_foreign_records_is_filtered_out() {
        let provider = std::sync::Arc::new(MockProvider::new(vec![]));
        let registry = TxtRegistry::new(
            Box::new(SharedProvider(provider.clone())),
            "default",
            "",
            "",
            "",
            Duration::ZERO,
        )
        .unwrap();

        let foreign = Endpoint::new("svc.example.com", RecordType::A, ["192.0.2.10"]);
        registry
            .apply_changes(&Changes {
                delete: vec![foreign],
                ..Changes::default()
            })
            .await
            .unwrap();

        let applied = provider.applied.lock().unwrap();
        assert!(applied[0].delete.is_empty());
    }

    #[tokio::test]
    async fn update_rewrites_companion_only_when_labels_change() {
        let provider = std::sync::Arc::new(MockProvider::new(vec![]));
        let registry = TxtRegistry::new(
            Box::new(SharedProvider(provider.clone())),
            "default",
            "",
            "",
            "",
            Duration::ZERO,
        )
        .unwrap();

        let mut old = Endpoint::new("svc.example.com", RecordType::A, ["192.0.2.10"]);
        old.labels.insert(OWNER_LABEL_KEY, "default");
        old.labels.insert(RESOURCE_LABEL_KEY, "r1");
        let mut new = Endpoint::new("svc.example.com", RecordType::A, ["192.0.2.20"]);
        new.labels.insert(OWNER_LABEL_KEY, "default");
        new.labels.insert(RESOURCE_LABEL_KEY, "r1");

        registry
            .apply_changes(&Changes {
                update_old: vec![old.clone()],
                update_new: vec![new.clone()],
                ..Changes::default()
            })
            .await
            .unwrap();

        {
            let applied = provider.applied.lock().unwrap();
            // Same labels: only the record pair itself, no TXT rewrite.
            assert_eq!(applied[0].update_old.len(), 1);
            assert_eq!(applied[0].update_new.len(), 1);
        }

        new.labels.insert(RESOURCE_LABEL_KEY, "r2");
        registry
            .apply_changes(&Changes {
                update_old: vec![old],
                update_new: vec![new],
                ..Changes::default()
            })
            .await
            .unwrap();

        let applied = provider.applied.lock().unwrap();
        assert_eq!(applied[1].update_old.len(), 2);
        assert_eq!(applied[1].update_new.len(), 2);
        assert_eq!(applied[1].update_new[1].record_type, RecordType::Txt);
    }

    #[tokio::test(start_paused = true)]
    async fn cache_serves_reads_within_interval_and_reflects_writes() {
        let provider = std::sync::Arc::new(MockProvider::new(vec![]));
        let registry = TxtRegistry::new(
            Box::new(SharedProvider(provider.clone())),
            "default",
            "",
            "",
            "",
            Duration::from_secs(60),
        )
        .unwrap();

        assert!(registry.records().await.unwrap().is_empty());
        assert!(registry.records().await.unwrap().is_empty());
        assert_eq!(provider.records_calls.load(Ordering::SeqCst), 1);

        let mut desired = Endpoint::new("svc.example.com", RecordType::A, ["192.0.2.10"]);
        desired.labels.insert(RESOURCE_LABEL_KEY, "r1");
        registry
            .apply_changes(&Changes {
                create: vec![desired],
                ..Changes::default()
            })
            .await
            .unwrap();

        let records = registry.records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].labels.owner(), Some("default"));
        assert_eq!(provider.records_calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        let _ = registry.records().await.unwrap();
        assert_eq!(provider.records_calls.load(Ordering::SeqCst), 2);
    }

    /// Shares one mock provider between the registry and the test.
    struct SharedProvider(std::sync::Arc<MockProvider>);

    #[async_trait]
    impl Provider for SharedProvider {
        async fn records(&self) -> Result<Vec<Endpoint>> {
            self.0.records().await
        }

        async fn apply_changes(&self, changes: &Changes) -> Result<()> {
            self.0.apply_changes(changes).await
        }
    }
}
