//! Fully qualified topic names.
//!
//! A topic full name has four segments: persistence mode, tenant, namespace
//! and topic. The canonical rendering is `persistent://tenant/ns/topic`; the
//! flat `persistent/tenant/ns/topic` spelling is accepted on input.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Topic durability mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Persistence {
    Persistent,
    NonPersistent,
}

impl Persistence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Persistence::Persistent => "persistent",
            Persistence::NonPersistent => "non-persistent",
        }
    }
}

impl FromStr for Persistence {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "persistent" => Ok(Persistence::Persistent),
            "non-persistent" => Ok(Persistence::NonPersistent),
            _ => Err(CoreError::InvalidPersistence(s.to_string())),
        }
    }
}

/// Split a topic full name into its path segments.
///
/// The `://` after the persistence mode counts as a single separator, so
/// both spellings yield the same segments. No validation is done here.
pub fn topic_segments(full_name: &str) -> Vec<&str> {
    match full_name.split_once("://") {
        Some((mode, rest)) => std::iter::once(mode).chain(rest.split('/')).collect(),
        None => full_name.split('/').collect(),
    }
}

/// A parsed, validated topic full name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicName {
    pub persistence: Persistence,
    pub tenant: String,
    pub namespace: String,
    pub topic: String,
}

impl TopicName {
    /// Parse a full name; exactly four non-empty segments are required.
    pub fn parse(full_name: &str) -> CoreResult<Self> {
        let segments = topic_segments(full_name);
        let [mode, tenant, namespace, topic] = segments.as_slice() else {
            return Err(CoreError::MalformedTopicName(full_name.to_string()));
        };
        if [tenant, namespace, topic].iter().any(|s| s.trim().is_empty()) {
            return Err(CoreError::MalformedTopicName(full_name.to_string()));
        }
        Ok(Self {
            persistence: mode.parse()?,
            tenant: tenant.to_string(),
            namespace: namespace.to_string(),
            topic: topic.to_string(),
        })
    }
}

impl fmt::Display for TopicName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}/{}/{}",
            self.persistence.as_str(),
            self.tenant,
            self.namespace,
            self.topic
        )
    }
}

impl FromStr for TopicName {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_treat_scheme_separator_as_one() {
        assert_eq!(
            topic_segments("persistent://acme/ns1/orders"),
            vec!["persistent", "acme", "ns1", "orders"]
        );
        assert_eq!(
            topic_segments("persistent/acme/ns1/orders"),
            vec!["persistent", "acme", "ns1", "orders"]
        );
        assert_eq!(topic_segments("bad/topic"), vec!["bad", "topic"]);
    }

    #[test]
    fn parse_both_spellings() {
        let a = TopicName::parse("persistent://acme/ns1/orders").unwrap();
        let b = TopicName::parse("persistent/acme/ns1/orders").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.tenant, "acme");
        assert_eq!(a.to_string(), "persistent://acme/ns1/orders");
    }

    #[test]
    fn parse_non_persistent() {
        let t: TopicName = "non-persistent://acme/ns1/ticks".parse().unwrap();
        assert_eq!(t.persistence, Persistence::NonPersistent);
    }

    #[test]
    fn parse_rejects_wrong_segment_count() {
        assert!(TopicName::parse("bad/topic").is_err());
        assert!(TopicName::parse("persistent://acme/ns1/a/b").is_err());
    }

    #[test]
    fn parse_rejects_empty_tenant_and_unknown_mode() {
        assert!(matches!(
            TopicName::parse("persistent:///ns1/orders"),
            Err(CoreError::MalformedTopicName(_))
        ));
        assert!(matches!(
            TopicName::parse("durable://acme/ns1/orders"),
            Err(CoreError::InvalidPersistence(_))
        ));
    }
}
