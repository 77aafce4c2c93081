//! Topic binding validation.
//!
//! A [`TopicBindingRequest`] is the untyped shape a binding arrives in; the
//! validators turn it into a typed [`TopicBinding`] or say why they cannot.

use fngate_core::{ConsumerSettings, TopicBinding, TopicName};
use serde::Deserialize;
use url::Url;

use crate::error::{TopicError, TopicResult};
use crate::subscription::resolve_subscription;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopicBindingRequest {
    pub broker_url: String,
    pub topic_full_name: String,
    #[serde(default)]
    pub access_token: String,
    pub tenant: String,
    #[serde(default)]
    pub subscription_name: Option<String>,
    #[serde(default)]
    pub subscription_type: Option<String>,
    #[serde(default)]
    pub initial_position: Option<String>,
    #[serde(default)]
    pub key_shared_policy: Option<String>,
}

fn check_broker_url(raw: &str) -> TopicResult<()> {
    match Url::parse(raw) {
        Ok(url) if url.has_host() => Ok(()),
        _ => Err(TopicError::Validation(format!("not a URL {raw}"))),
    }
}

fn check_topic_name(raw: &str) -> TopicResult<()> {
    TopicName::parse(raw)
        .map(|_| ())
        .map_err(|e| TopicError::Validation(e.to_string()))
}

/// Validate a binding the function consumes from.
///
/// Requires a broker URL with a host, a four-segment topic name, a
/// non-blank subscription name, and a valid subscription type and initial
/// position (defaults apply when those two are omitted).
pub fn validate_function_topic(req: &TopicBindingRequest) -> TopicResult<TopicBinding> {
    check_broker_url(&req.broker_url)?;
    check_topic_name(&req.topic_full_name)?;

    let name = req
        .subscription_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| TopicError::Validation("subscription name is missing".to_string()))?;
    let params = resolve_subscription(
        Some(name),
        req.subscription_type.as_deref(),
        req.initial_position.as_deref(),
    )?;

    Ok(TopicBinding {
        broker_url: req.broker_url.clone(),
        topic_full_name: req.topic_full_name.clone(),
        access_token: req.access_token.clone(),
        tenant: req.tenant.clone(),
        consumer: Some(ConsumerSettings {
            subscription_name: params.name,
            subscription_type: params.subscription_type,
            initial_position: params.initial_position,
            key_shared_policy: req.key_shared_policy.clone().filter(|p| !p.is_empty()),
        }),
    })
}

/// Validate a binding the function only produces to.
pub fn validate_output_topic(req: &TopicBindingRequest) -> TopicResult<TopicBinding> {
    check_broker_url(&req.broker_url)?;
    check_topic_name(&req.topic_full_name)?;
    Ok(TopicBinding {
        broker_url: req.broker_url.clone(),
        topic_full_name: req.topic_full_name.clone(),
        access_token: req.access_token.clone(),
        tenant: req.tenant.clone(),
        consumer: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fngate_core::{InitialPosition, SubscriptionType};

    fn request() -> TopicBindingRequest {
        TopicBindingRequest {
            broker_url: "pulsar+ssl://broker.example.com:6651".to_string(),
            topic_full_name: "persistent://acme/ns1/orders".to_string(),
            access_token: "token".to_string(),
            tenant: "acme".to_string(),
            subscription_name: Some("orders-fn".to_string()),
            subscription_type: Some("shared".to_string()),
            initial_position: None,
            key_shared_policy: None,
        }
    }

    #[test]
    fn valid_consumer_binding() {
        let binding = validate_function_topic(&request()).unwrap();
        let consumer = binding.consumer.unwrap();
        assert_eq!(consumer.subscription_name, "orders-fn");
        assert_eq!(consumer.subscription_type, SubscriptionType::Shared);
        assert_eq!(consumer.initial_position, InitialPosition::Latest);
        assert_eq!(binding.access_token, "token");
    }

    #[test]
    fn malformed_broker_url() {
        let mut req = request();
        req.broker_url = "not a url".to_string();
        assert!(matches!(
            validate_function_topic(&req),
            Err(TopicError::Validation(msg)) if msg.contains("not a URL")
        ));
    }

    #[test]
    fn blank_subscription() {
        let mut req = request();
        req.subscription_name = Some("   ".to_string());
        assert!(matches!(
            validate_function_topic(&req),
            Err(TopicError::Validation(msg)) if msg.contains("subscription")
        ));
        req.subscription_name = None;
        assert!(validate_function_topic(&req).is_err());
    }

    #[test]
    fn invalid_enums_surface_their_kind() {
        let mut req = request();
        req.subscription_type = Some("fanout".to_string());
        assert!(matches!(
            validate_function_topic(&req),
            Err(TopicError::InvalidSubscriptionType(_))
        ));

        let mut req = request();
        req.initial_position = Some("middle".to_string());
        assert!(matches!(
            validate_function_topic(&req),
            Err(TopicError::InvalidInitialPosition(_))
        ));
    }

    #[test]
    fn topic_name_needs_four_segments() {
        let mut req = request();
        req.topic_full_name = "bad/topic".to_string();
        assert!(matches!(validate_function_topic(&req), Err(TopicError::Validation(_))));
        assert!(matches!(validate_output_topic(&req), Err(TopicError::Validation(_))));
    }

    #[test]
    fn output_binding_has_no_consumer() {
        let mut req = request();
        req.subscription_name = None;
        let binding = validate_output_topic(&req).unwrap();
        assert!(binding.consumer.is_none());
    }
}
