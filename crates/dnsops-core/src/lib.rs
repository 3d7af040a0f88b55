//! # dnsops-core
//!
//! Core library for the DNSOps reconciler.
//!
//! DNSOps continuously synchronizes desired DNS records, derived from one
//! or more pluggable sources of truth, against an authoritative DNS
//! provider. It owns the records it manages, identifies them by embedded
//! ownership metadata, and converges the provider's zones toward the
//! desired state through discrete change sets subject to a configurable
//! policy.
//!
//! ## Architecture Overview
//!
//! - **Source**: trait producing the desired endpoints
//! - **Provider**: trait reading and mutating authoritative DNS records
//! - **Plan**: diff of desired vs. current into a minimal change set
//! - **Registry**: ownership layer wrapping a provider (TXT companions)
//! - **Controller**: the control loop with coalesced event-triggered and
//!   periodic ticks
//!
//! Data flow per reconciliation tick:
//!
//! ```text
//! Sources ── dedup/merge ──► desired ─┐
//!                                     ▼
//! Registry.records ──► current ──► Plan ──► Policy ──► Registry.apply_changes
//! ```

pub mod controller;
pub mod endpoint;
pub mod error;
pub mod plan;
pub mod registry;
pub mod source;
pub mod traits;
pub mod zone;

// Re-export core types for convenience.
pub use controller::{Controller, ControllerConfig, ControllerEvent};
pub use endpoint::{DomainFilter, Endpoint, Labels, RecordType, Targets, Ttl};
pub use error::{Error, Result};
pub use plan::{Changes, Plan, Policy};
pub use registry::{NoopRegistry, Registry, TxtRegistry};
pub use traits::{Provider, Source};
