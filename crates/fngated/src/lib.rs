//! fngated: assembly of the fngate gateway.
//!
//! The binary wires the registry, the runtime supervisor and the REST API
//! together. This library half holds the pieces worth testing on their own:
//! configuration layering and startup reconciliation.

pub mod reconcile;
pub mod settings;

pub use reconcile::{ReconcileReport, reconcile};
pub use settings::ServeArgs;
