//! fngate-topic: topic and subscription configuration.
//!
//! Turns loosely typed request parameters (route segments, query strings,
//! form fields) into canonical topic names and validated
//! [`TopicBinding`](fngate_core::TopicBinding)s that an external broker
//! client can consume.

pub mod binding;
pub mod error;
pub mod subscription;

pub use binding::{validate_function_topic, validate_output_topic, TopicBindingRequest};
pub use error::{TopicError, TopicResult};
pub use subscription::{
    build_topic_full_name, resolve_subscription, resolve_subscription_params, SubscriptionParams,
    MIN_SUBSCRIPTION_NAME_LEN, NON_RESUMABLE_PREFIX,
};
