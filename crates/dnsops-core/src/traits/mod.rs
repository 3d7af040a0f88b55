//! Core trait definitions for the DNSOps system.
//!
//! Submodules define the contracts the controller composes:
//! - [`Source`]: produces the desired endpoints
//! - [`Provider`]: reads and mutates the authoritative DNS records

pub mod provider;
pub mod source;

pub use provider::{difference, ensure_trailing_dot, Provider};
pub use source::{EventHandler, Source};
