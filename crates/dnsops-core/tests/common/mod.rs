//! Test doubles shared by the reconciliation contract tests.

use async_trait::async_trait;
use dnsops_core::endpoint::Endpoint;
use dnsops_core::error::{Error, Result};
use dnsops_core::plan::Changes;
use dnsops_core::traits::{EventHandler, Provider, Source};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A source yielding a fixed endpoint list, mutable by the test, with
/// fireable event handlers.
pub struct StaticSource {
    endpoints: Mutex<Vec<Endpoint>>,
    handlers: Mutex<Vec<EventHandler>>,
}

impl StaticSource {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self {
            endpoints: Mutex::new(endpoints),
            handlers: Mutex::new(Vec::new()),
        }
    }

    pub fn shared(endpoints: Vec<Endpoint>) -> Arc<Self> {
        Arc::new(Self::new(endpoints))
    }

    pub fn set_endpoints(&self, endpoints: Vec<Endpoint>) {
        *self.endpoints.lock().unwrap() = endpoints;
    }

    /// Invokes every registered event handler once.
    pub fn fire_event(&self) {
        for handler in self.handlers.lock().unwrap().iter() {
            handler();
        }
    }
}

#[async_trait]
impl Source for StaticSource {
    async fn endpoints(&self) -> Result<Vec<Endpoint>> {
        Ok(self.endpoints.lock().unwrap().clone())
    }

    fn add_event_handler(&self, handler: EventHandler) {
        self.handlers.lock().unwrap().push(handler);
    }
}

/// A handle to a shared [`StaticSource`] usable as a boxed source.
pub struct SharedSource(pub Arc<StaticSource>);

#[async_trait]
impl Source for SharedSource {
    async fn endpoints(&self) -> Result<Vec<Endpoint>> {
        self.0.endpoints().await
    }

    fn add_event_handler(&self, handler: EventHandler) {
        self.0.add_event_handler(handler);
    }
}

/// Observable state of a [`RecordingProvider`].
#[derive(Default)]
pub struct ProviderState {
    pub records: Mutex<Vec<Endpoint>>,
    pub applied: Mutex<Vec<Changes>>,
    pub records_calls: AtomicUsize,
    pub fail_records: AtomicBool,
}

impl ProviderState {
    pub fn with_records(records: Vec<Endpoint>) -> Arc<Self> {
        let state = Self::default();
        *state.records.lock().unwrap() = records;
        Arc::new(state)
    }

    pub fn tick_count(&self) -> usize {
        self.records_calls.load(Ordering::SeqCst)
    }

    pub fn applied_changes(&self) -> Vec<Changes> {
        self.applied.lock().unwrap().clone()
    }

    pub fn last_applied(&self) -> Changes {
        self.applied
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("at least one change set applied")
    }
}

/// A provider that records every applied change set and mutates its
/// in-memory record list accordingly, so consecutive ticks observe the
/// effects of earlier ones.
pub struct RecordingProvider(pub Arc<ProviderState>);

#[async_trait]
impl Provider for RecordingProvider {
    async fn records(&self) -> Result<Vec<Endpoint>> {
        self.0.records_calls.fetch_add(1, Ordering::SeqCst);
        if self.0.fail_records.load(Ordering::SeqCst) {
            return Err(Error::provider("recording", "records unavailable"));
        }
        Ok(self.0.records.lock().unwrap().clone())
    }

    async fn apply_changes(&self, changes: &Changes) -> Result<()> {
        self.0.applied.lock().unwrap().push(changes.clone());

        let same_identity = |a: &Endpoint, b: &Endpoint| {
            a.dns_name == b.dns_name
                && a.record_type == b.record_type
                && a.set_identifier == b.set_identifier
        };
        // Stored copies lose their labels: a real provider persists only
        // record data, ownership lives in the companion TXT records.
        let strip = |ep: &Endpoint| {
            let mut ep = ep.clone();
            ep.labels = dnsops_core::Labels::new();
            ep
        };
        let mut records = self.0.records.lock().unwrap();
        for created in &changes.create {
            records.push(strip(created));
        }
        for (old, new) in changes.update_old.iter().zip(&changes.update_new) {
            for record in records.iter_mut() {
                if same_identity(record, old) {
                    *record = strip(new);
                }
            }
        }
        for deleted in &changes.delete {
            records.retain(|record| !same_identity(record, deleted));
        }
        Ok(())
    }
}
