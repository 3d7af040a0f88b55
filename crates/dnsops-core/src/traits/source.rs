//! The Source contract.
//!
//! A source is a producer of desired endpoints: the dummy generator, the
//! remote connector, or any future integration. Sources present a
//! synchronous, cancellable-by-drop interface to the controller; they may
//! run parallel work internally.

use crate::endpoint::Endpoint;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Callback invoked when a source observes an upstream change.
///
/// Handler invocations are advisory: the controller debounces them, so a
/// burst of notifications schedules at most one extra reconciliation per
/// debounce window.
pub type EventHandler = Arc<dyn Fn() + Send + Sync>;

/// Trait for desired-endpoint producers.
///
/// # Failure semantics
///
/// `endpoints` reports failures in full; partial results are never
/// returned. A failed source fails the whole reconciliation tick.
#[async_trait]
pub trait Source: Send + Sync {
    /// Produces the currently desired endpoints. May be slow; callers
    /// cancel by dropping the future.
    async fn endpoints(&self) -> Result<Vec<Endpoint>>;

    /// Registers a callback to be invoked whenever the source observes an
    /// upstream change. Sources without a change feed ignore the handler.
    fn add_event_handler(&self, _handler: EventHandler) {}
}
