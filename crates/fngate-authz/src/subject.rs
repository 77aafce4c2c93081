//! Subject verification.

use fngate_core::topic_name::topic_segments;
use tracing::debug;

/// Separator between subjects in a claim list.
const SUBJECT_SEPARATOR: char = ',';

/// Separator between a tenant and its trailing role qualifier.
const QUALIFIER_SEPARATOR: char = '-';

/// Decides whether one claimed subject stands for the required tenant.
pub type TenantEvaluator = fn(required: &str, claimed: &str) -> bool;

/// Tenant-derivation rule: strip one trailing `-`-delimited qualifier.
///
/// A subject without `-` derives to itself. The derived tenant must be
/// non-empty and equal `required`.
pub fn eval_tenant(required: &str, claimed: &str) -> bool {
    let derived = match claimed.rsplit_once(QUALIFIER_SEPARATOR) {
        Some((tenant, _qualifier)) => tenant,
        None => claimed,
    };
    !derived.is_empty() && derived == required
}

#[derive(Debug, Clone)]
pub struct SubjectVerifier {
    super_roles: Vec<String>,
    tenant_eval: TenantEvaluator,
}

impl SubjectVerifier {
    /// Verifier with the default tenant-derivation rule.
    pub fn new(super_roles: Vec<String>) -> Self {
        Self::with_evaluator(super_roles, eval_tenant)
    }

    pub fn with_evaluator(super_roles: Vec<String>, tenant_eval: TenantEvaluator) -> Self {
        Self {
            super_roles,
            tenant_eval,
        }
    }

    pub fn is_super_role(&self, subject: &str) -> bool {
        self.super_roles.iter().any(|role| role == subject)
    }

    /// True if any subject in `claimed_csv` grants access to `required`.
    ///
    /// Entries are trimmed and empty entries skipped. Default deny.
    pub fn verify_subject(&self, required: &str, claimed_csv: &str) -> bool {
        claimed_csv
            .split(SUBJECT_SEPARATOR)
            .map(str::trim)
            .filter(|subject| !subject.is_empty())
            .any(|subject| {
                self.is_super_role(subject)
                    || subject == required
                    || (self.tenant_eval)(required, subject)
            })
    }

    /// Check access to the tenant that owns `topic_full_name`.
    ///
    /// Fails closed when the name has fewer than four segments or the
    /// tenant segment is empty.
    pub fn verify_subject_for_topic(&self, topic_full_name: &str, claimed_csv: &str) -> bool {
        let segments = topic_segments(topic_full_name);
        if segments.len() < 4 {
            debug!(topic = topic_full_name, "topic name too short for tenant lookup");
            return false;
        }
        let tenant = segments[1];
        if tenant.is_empty() {
            debug!(topic = topic_full_name, "topic name has an empty tenant");
            return false;
        }
        self.verify_subject(tenant, claimed_csv)
    }
}
