//! Topic full names and consumer subscription parameters.

use std::collections::HashMap;

use fngate_core::{InitialPosition, Persistence, SubscriptionType, TopicName};
use tracing::debug;
use uuid::Uuid;

use crate::error::{TopicError, TopicResult};

/// Marks a generated subscription name: the consumer position is not
/// expected to survive a reconnect.
pub const NON_RESUMABLE_PREFIX: &str = "NonResumable";

/// Shortest subscription name a caller may choose.
pub const MIN_SUBSCRIPTION_NAME_LEN: usize = 5;

pub const SUBSCRIPTION_NAME_PARAM: &str = "SubscriptionName";
pub const SUBSCRIPTION_TYPE_PARAM: &str = "SubscriptionType";
pub const INITIAL_POSITION_PARAM: &str = "SubscriptionInitialPosition";

/// Resolved consumer parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionParams {
    pub name: String,
    pub initial_position: InitialPosition,
    pub subscription_type: SubscriptionType,
}

impl SubscriptionParams {
    /// False for generated names.
    #[cfg(test)]
    fn is_resumable(&self) -> bool {
        !self.name.starts_with(NON_RESUMABLE_PREFIX)
    }
}

/// Assemble `persistence://tenant/namespace/topic` from route parts.
///
/// Every part is required; missing or blank parts fail with
/// `IncompleteTopicParts`.
pub fn build_topic_full_name(
    persistence: Option<&str>,
    tenant: Option<&str>,
    namespace: Option<&str>,
    topic: Option<&str>,
) -> TopicResult<String> {
    let present = |part: Option<_>| part.map(str::trim).filter(|p| !p.is_empty());
    let (Some(persistence), Some(tenant), Some(namespace), Some(topic)) = (
        present(persistence),
        present(tenant),
        present(namespace),
        present(topic),
    ) else {
        return Err(TopicError::IncompleteTopicParts);
    };

    let name = TopicName {
        persistence: persistence.parse::<Persistence>()?,
        tenant: tenant.to_string(),
        namespace: namespace.to_string(),
        topic: topic.to_string(),
    };
    Ok(name.to_string())
}

/// Resolve consumer parameters from query parameters.
///
/// Recognized keys: `SubscriptionType` (default `exclusive`),
/// `SubscriptionInitialPosition` (default `latest`) and `SubscriptionName`
/// (generated when absent). Empty values count as absent.
pub fn resolve_subscription_params(
    params: &HashMap<String, String>,
) -> TopicResult<SubscriptionParams> {
    let get = |key: &str| params.get(key).map(String::as_str);
    resolve_subscription(
        get(SUBSCRIPTION_NAME_PARAM),
        get(SUBSCRIPTION_TYPE_PARAM),
        get(INITIAL_POSITION_PARAM),
    )
}

/// Resolve consumer parameters from individually supplied values.
pub fn resolve_subscription(
    name: Option<&str>,
    subscription_type: Option<&str>,
    initial_position: Option<&str>,
) -> TopicResult<SubscriptionParams> {
    let non_empty = |value: Option<_>| value.filter(|v: &&str| !v.is_empty());

    let subscription_type = match non_empty(subscription_type) {
        Some(value) => value.parse::<SubscriptionType>()?,
        None => SubscriptionType::default(),
    };
    let initial_position = match non_empty(initial_position) {
        Some(value) => value.parse::<InitialPosition>()?,
        None => InitialPosition::default(),
    };

    let name = match non_empty(name) {
        None => {
            let generated = format!("{NON_RESUMABLE_PREFIX}{}", Uuid::new_v4());
            debug!(subscription = %generated, "generated non-resumable subscription name");
            generated
        }
        Some(given) if given.chars().count() < MIN_SUBSCRIPTION_NAME_LEN => {
            return Err(TopicError::SubscriptionNameTooShort {
                min: MIN_SUBSCRIPTION_NAME_LEN,
                got: given.to_string(),
            });
        }
        Some(given) => given.to_string(),
    };

    Ok(SubscriptionParams {
        name,
        initial_position,
        subscription_type,
    })
}
