//! The reconciliation control loop.
//!
//! A single controller task drives periodic and event-triggered ticks.
//! Each tick fetches the current records from the registry and the desired
//! endpoints from the source, computes a plan, applies the policy and
//! hands the resulting change set back to the registry. Event
//! notifications are debounced: between `last_run_at` and `last_run_at +
//! min_event_sync_interval` at most one extra run is scheduled regardless
//! of event volume.
//!
//! The controller emits [`ControllerEvent`]s over a bounded channel for
//! external monitoring; the loop itself never blocks on consumers.

use crate::endpoint::{DomainFilter, RecordType};
use crate::error::Result;
use crate::plan::{ConflictResolver, PerResource, Plan, Policy};
use crate::registry::Registry;
use crate::traits::Source;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Events emitted by the controller for monitoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    /// One reconciliation tick completed.
    TickCompleted {
        duration: Duration,
        created: usize,
        updated: usize,
        deleted: usize,
    },
    /// One reconciliation tick failed; the loop continues.
    TickFailed { duration: Duration, error: String },
}

/// Controller settings.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Interval between two consecutive periodic synchronizations.
    pub interval: Duration,
    /// Minimum interval between two consecutive event-triggered
    /// synchronizations.
    pub min_event_sync_interval: Duration,
    /// Identity written into ownership records; records owned by anyone
    /// else are never mutated.
    pub owner_id: String,
    /// Record types the controller reconciles.
    pub managed_record_types: Vec<RecordType>,
    /// User-configured name scoping.
    pub domain_filter: DomainFilter,
    /// Capacity of the monitoring event channel.
    pub event_channel_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            min_event_sync_interval: Duration::from_secs(5),
            owner_id: "default".to_string(),
            managed_record_types: vec![RecordType::A, RecordType::Cname],
            domain_filter: DomainFilter::default(),
            event_channel_capacity: 64,
        }
    }
}

/// Drives reconciliation between a source of desired endpoints and a
/// registry-wrapped provider.
pub struct Controller {
    source: Box<dyn Source>,
    registry: Box<dyn Registry>,
    policy: Box<dyn Policy>,
    resolver: Box<dyn ConflictResolver>,
    interval: Duration,
    min_event_sync_interval: Duration,
    owner_id: String,
    managed_record_types: Vec<RecordType>,
    domain_filter: DomainFilter,
    next_run_at: Mutex<Instant>,
    last_run_at: Mutex<Instant>,
    event_tx: mpsc::Sender<ControllerEvent>,
}

impl Controller {
    /// Creates a controller and the receiver of its monitoring events.
    pub fn new(
        source: Box<dyn Source>,
        registry: Box<dyn Registry>,
        policy: Box<dyn Policy>,
        config: ControllerConfig,
    ) -> (Self, mpsc::Receiver<ControllerEvent>) {
        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity.max(1));
        let now = Instant::now();
        let controller = Self {
            source,
            registry,
            policy,
            resolver: Box::new(PerResource),
            interval: config.interval,
            min_event_sync_interval: config.min_event_sync_interval,
            owner_id: config.owner_id,
            managed_record_types: config.managed_record_types,
            domain_filter: config.domain_filter,
            next_run_at: Mutex::new(now),
            last_run_at: Mutex::new(now),
            event_tx,
        };
        (controller, event_rx)
    }

    /// Binds the source's event handler to the debounced scheduler, so
    /// upstream changes trigger reconciliation without the source deciding
    /// when work happens.
    pub fn watch_source_events(self: std::sync::Arc<Self>) {
        let controller = std::sync::Arc::downgrade(&self);
        self.source.add_event_handler(std::sync::Arc::new(move || {
            if let Some(controller) = controller.upgrade() {
                controller.schedule_run_once(Instant::now());
            }
        }));
    }

    /// One full reconciliation: fetch current, fetch desired, plan, apply.
    /// Fails iff planning inputs could not be gathered or applying failed.
    pub async fn run_once(&self) -> Result<()> {
        let start = Instant::now();
        let result = self.reconcile().await;
        let duration = start.elapsed();
        *self.last_run_at.lock().unwrap() = Instant::now();

        match result {
            Ok((created, updated, deleted)) => {
                debug!(created, updated, deleted, ?duration, "reconciliation complete");
                self.emit(ControllerEvent::TickCompleted {
                    duration,
                    created,
                    updated,
                    deleted,
                });
                Ok(())
            }
            Err(e) => {
                self.emit(ControllerEvent::TickFailed {
                    duration,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn reconcile(&self) -> Result<(usize, usize, usize)> {
        let current = self.registry.records().await?;
        let desired = self.source.endpoints().await?;
        let desired = self.registry.adjust_endpoints(desired);

        let registry = &self.registry;
        let plan = Plan {
            current,
            desired,
            domain_filter: &self.domain_filter,
            managed_record_types: &self.managed_record_types,
            owner_id: &self.owner_id,
            resolver: self.resolver.as_ref(),
            policy: self.policy.as_ref(),
            property_comparator: &|name, previous, current| {
                registry.property_values_equal(name, previous, current)
            },
        };
        let changes = plan.calculate();

        if changes.is_empty() {
            debug!("all records are already up to date");
        }
        let counts = (
            changes.create.len(),
            changes.update_new.len(),
            changes.delete.len(),
        );
        self.registry.apply_changes(&changes).await?;
        Ok(counts)
    }

    /// Coalesces a burst of event notifications into at most one extra run
    /// per debounce window.
    pub fn schedule_run_once(&self, now: Instant) {
        let last_run_at = *self.last_run_at.lock().unwrap();
        let mut next_run_at = self.next_run_at.lock().unwrap();
        *next_run_at = (last_run_at + self.min_event_sync_interval).max(now);
    }

    fn should_run_once(&self, now: Instant) -> bool {
        let mut next_run_at = self.next_run_at.lock().unwrap();
        if now < *next_run_at {
            return false;
        }
        *next_run_at = now + self.interval;
        true
    }

    /// Loops until the shutdown signal fires, waking on the interval tick
    /// or a scheduled event-triggered run. Tick errors are logged and do
    /// not terminate the loop.
    pub async fn run(&self, mut shutdown: oneshot::Receiver<()>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            if self.should_run_once(Instant::now()) {
                if let Err(e) = self.run_once().await {
                    error!(error = %e, "reconciliation failed");
                }
            }
            tokio::select! {
                _ = ticker.tick() => {}
                _ = &mut shutdown => {
                    info!("terminating main controller loop");
                    return;
                }
            }
        }
    }

    fn emit(&self, event: ControllerEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("controller event channel full, dropping event");
        }
    }
}
