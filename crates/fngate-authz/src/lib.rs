//! fngate-authz: subject-to-tenant access checks.
//!
//! Callers present a flat, comma-separated list of subject strings taken
//! from an already verified bearer token. Access to a tenant is granted when
//! any presented subject
//!
//! - is one of the configured super roles,
//! - equals the tenant name, or
//! - derives to the tenant name by dropping one trailing `-qualifier`
//!   (`acme-admin` → `acme`).
//!
//! There are no stored grants; everything is decided from the strings.
//! The check is pure and holds no state beyond its configuration, so one
//! [`SubjectVerifier`] can be shared freely across request tasks.

pub mod subject;

pub use subject::{eval_tenant, SubjectVerifier, TenantEvaluator};
