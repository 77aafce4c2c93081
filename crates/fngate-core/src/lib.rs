//! fngate-core: shared types for the fngate function gateway.
//!
//! Holds the persisted record shapes (`FunctionDefinition`, `TopicBinding`),
//! the closed enums the rest of the workspace dispatches on, topic name
//! parsing and the gateway configuration file format.

pub mod config;
pub mod error;
pub mod topic_name;
pub mod types;

pub use config::GatewayConfig;
pub use error::{CoreError, CoreResult};
pub use topic_name::{Persistence, TopicName};
pub use types::*;
