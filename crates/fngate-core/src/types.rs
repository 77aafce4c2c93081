//! Domain types shared across the gateway.
//!
//! `FunctionDefinition` is the persisted record; everything else is a
//! component of it. All types round-trip through JSON for storage and for
//! the REST surface.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Registry key of a function: `tenant + name`.
pub type FunctionKey = String;

/// Placeholder written over access tokens before a record leaves the gateway.
pub const REDACTED: &str = "***";

/// Derive the registry key for a tenant-scoped function name.
///
/// Plain concatenation. Names are tenant-scoped so the pair is unique in
/// practice, not by construction.
pub fn function_key(tenant: &str, name: &str) -> FunctionKey {
    format!("{tenant}{name}")
}

/// Current Unix epoch in milliseconds.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Next `updated_at` stamp after `previous`; never equal to or behind it.
pub fn next_stamp(previous: u64) -> u64 {
    epoch_millis().max(previous.saturating_add(1))
}

// ── Enums ──────────────────────────────────────────────────────────

/// Runtime a function's source is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguagePack {
    Javascript,
}

impl LanguagePack {
    /// File extension used when staging uploaded source.
    pub fn extension(&self) -> &'static str {
        match self {
            LanguagePack::Javascript => "js",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LanguagePack::Javascript => "javascript",
        }
    }
}

impl FromStr for LanguagePack {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "js" | "javascript" | "node" | "nodejs" => Ok(LanguagePack::Javascript),
            _ => Err(CoreError::UnsupportedLanguage(s.to_string())),
        }
    }
}

impl fmt::Display for LanguagePack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What invokes a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Topic,
    Http,
    Cron,
}

impl FromStr for TriggerType {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "topic" | "topic-trigger" | "pulsar-topic" => Ok(TriggerType::Topic),
            "http" | "http-trigger" => Ok(TriggerType::Http),
            "cron" | "cron-trigger" => Ok(TriggerType::Cron),
            _ => Err(CoreError::InvalidTriggerType(s.to_string())),
        }
    }
}

/// Desired run state of a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionStatus {
    #[default]
    Running,
    Stopped,
}

impl FromStr for FunctionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "running" | "activated" => Ok(FunctionStatus::Running),
            "stopped" | "deactivated" => Ok(FunctionStatus::Stopped),
            _ => Err(CoreError::InvalidStatus(s.to_string())),
        }
    }
}

/// Consumer subscription mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionType {
    #[default]
    Exclusive,
    Shared,
    Failover,
    KeyShared,
}

impl FromStr for SubscriptionType {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exclusive" => Ok(SubscriptionType::Exclusive),
            "shared" => Ok(SubscriptionType::Shared),
            "failover" => Ok(SubscriptionType::Failover),
            "key_shared" | "keyshared" | "key-shared" => Ok(SubscriptionType::KeyShared),
            _ => Err(CoreError::InvalidSubscriptionType(s.to_string())),
        }
    }
}

/// Where a new subscription starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialPosition {
    #[default]
    Latest,
    Earliest,
}

impl FromStr for InitialPosition {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest" => Ok(InitialPosition::Latest),
            "earliest" => Ok(InitialPosition::Earliest),
            _ => Err(CoreError::InvalidInitialPosition(s.to_string())),
        }
    }
}

// ── Topic bindings ─────────────────────────────────────────────────

/// Subscription settings for a binding the function consumes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerSettings {
    pub subscription_name: String,
    pub subscription_type: SubscriptionType,
    pub initial_position: InitialPosition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_shared_policy: Option<String>,
}

/// One endpoint of a pub/sub linkage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicBinding {
    pub broker_url: String,
    /// `persistence://tenant/namespace/topic`.
    pub topic_full_name: String,
    pub access_token: String,
    pub tenant: String,
    /// Present only for input bindings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer: Option<ConsumerSettings>,
}

impl TopicBinding {
    /// Mask the access token in place.
    pub fn redact(&mut self) {
        self.access_token = REDACTED.to_string();
    }
}

// ── Function definition ────────────────────────────────────────────

/// A tenant's registered function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub id: FunctionKey,
    pub tenant: String,
    pub name: String,
    pub language_pack: LanguagePack,
    pub parallelism: u32,
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub status: FunctionStatus,
    #[serde(default)]
    pub input_topic: Option<TopicBinding>,
    #[serde(default)]
    pub output_topic: Option<TopicBinding>,
    #[serde(default)]
    pub log_topic: Option<TopicBinding>,
    /// One base URL per provisioned worker.
    #[serde(default)]
    pub worker_urls: Vec<String>,
    pub source_file_path: PathBuf,
    /// Unix epoch milliseconds.
    pub created_at: u64,
    /// Unix epoch milliseconds.
    pub updated_at: u64,
}

impl FunctionDefinition {
    /// A running, single-worker, topic-triggered definition with no bindings.
    pub fn new(tenant: &str, name: &str, language_pack: LanguagePack) -> Self {
        Self {
            id: function_key(tenant, name),
            tenant: tenant.to_string(),
            name: name.to_string(),
            language_pack,
            parallelism: 1,
            trigger_type: TriggerType::Topic,
            status: FunctionStatus::Running,
            input_topic: None,
            output_topic: None,
            log_topic: None,
            worker_urls: Vec::new(),
            source_file_path: PathBuf::new(),
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Registry key derived from `(tenant, name)`.
    pub fn key(&self) -> FunctionKey {
        function_key(&self.tenant, &self.name)
    }

    /// Copy of this record with every binding's access token masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for binding in [
            copy.input_topic.as_mut(),
            copy.output_topic.as_mut(),
            copy.log_topic.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            binding.redact();
        }
        copy
    }
}
