//! Multipart function uploads.
//!
//! A POST to `/v2/function/{tenant}/{function}` carries the function's
//! settings as text fields and its source as the `source` file field.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::Multipart;
use fngate_core::{FunctionDefinition, FunctionStatus, TopicBinding, TriggerType};
use fngate_runtime::parse_language_pack;
use fngate_topic::{TopicBindingRequest, validate_function_topic, validate_output_topic};
use tracing::debug;

use crate::error::{ApiError, ApiResult};

pub const LANGUAGE_PACK: &str = "language-pack";
pub const PARALLELISM: &str = "parallelism";
pub const TRIGGER_TYPE: &str = "trigger-type";
pub const FUNCTION_STATUS: &str = "function-status";
pub const INPUT_TOPIC: &str = "input-topic";
pub const OUTPUT_TOPIC: &str = "output-topic";
pub const LOG_TOPIC: &str = "log-topic";
pub const SUBSCRIPTION_NAME: &str = "subscription-name";
pub const SUBSCRIPTION_TYPE: &str = "subscription-type";
pub const INITIAL_POSITION: &str = "subscription-initial-position";
pub const KEY_SHARED_POLICY: &str = "key-shared-policy";
pub const SOURCE: &str = "source";

const DEFAULT_LANGUAGE_PACK: &str = "javascript";

/// Fields of one upload, read fully into memory.
#[derive(Debug, Default)]
pub struct FunctionUpload {
    fields: HashMap<String, String>,
    pub source: Option<Bytes>,
}

/// Per-request values that come from the path and headers.
#[derive(Debug, Clone)]
pub struct UploadContext {
    pub tenant: String,
    pub name: String,
    pub broker_url: Option<String>,
    pub access_token: String,
}

impl FunctionUpload {
    pub async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut upload = FunctionUpload::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::Validation(e.to_string()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if name == SOURCE {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(e.to_string()))?;
                debug!(bytes = bytes.len(), ?file_name, "source received");
                upload.source = Some(bytes);
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(e.to_string()))?;
                upload.fields.insert(name, value);
            }
        }
        Ok(upload)
    }

    #[cfg(test)]
    fn from_fields<'a>(
        fields: impl IntoIterator<Item = (&'a str, &'a str)>,
        source: Option<Bytes>,
    ) -> Self {
        Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            source,
        }
    }

    /// A trimmed, non-empty field value.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Turn the upload into a definition with typed, validated bindings.
    ///
    /// The source path and worker URLs are left for the caller to fill in.
    pub fn to_definition(
        &self,
        ctx: &UploadContext,
        max_parallelism: u32,
    ) -> ApiResult<FunctionDefinition> {
        let pack = parse_language_pack(self.field(LANGUAGE_PACK).unwrap_or(DEFAULT_LANGUAGE_PACK))?;
        let mut def = FunctionDefinition::new(&ctx.tenant, &ctx.name, pack);

        def.parallelism = match self.field(PARALLELISM) {
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| ApiError::Validation(format!("invalid parallelism {raw}")))?,
            None => 1,
        };
        if def.parallelism == 0 || def.parallelism > max_parallelism {
            return Err(ApiError::Validation(format!(
                "parallelism must be between 1 and {max_parallelism}, got {}",
                def.parallelism
            )));
        }

        if let Some(raw) = self.field(TRIGGER_TYPE) {
            def.trigger_type = raw
                .parse::<TriggerType>()
                .map_err(|e| ApiError::Validation(e.to_string()))?;
        }
        def.status = self
            .field(FUNCTION_STATUS)
            .unwrap_or_default()
            .parse::<FunctionStatus>()
            .map_err(|e| ApiError::Validation(e.to_string()))?;

        if def.trigger_type == TriggerType::Topic {
            let topic = self
                .field(INPUT_TOPIC)
                .ok_or_else(|| ApiError::Validation("input topic is missing".to_string()))?;
            let mut req = self.binding_request(ctx, topic)?;
            req.subscription_name = self.field(SUBSCRIPTION_NAME).map(str::to_string);
            req.subscription_type = self.field(SUBSCRIPTION_TYPE).map(str::to_string);
            req.initial_position = self.field(INITIAL_POSITION).map(str::to_string);
            req.key_shared_policy = self.field(KEY_SHARED_POLICY).map(str::to_string);
            def.input_topic = Some(validate_function_topic(&req)?);
        } else if self.field(INPUT_TOPIC).is_some() {
            debug!(trigger = ?def.trigger_type, "input topic ignored for non-topic trigger");
        }

        def.output_topic = self.producer_binding(ctx, OUTPUT_TOPIC)?;
        def.log_topic = self.producer_binding(ctx, LOG_TOPIC)?;
        Ok(def)
    }

    fn producer_binding(&self, ctx: &UploadContext, field: &str) -> ApiResult<Option<TopicBinding>> {
        match self.field(field) {
            Some(topic) => {
                let req = self.binding_request(ctx, topic)?;
                Ok(Some(validate_output_topic(&req)?))
            }
            None => Ok(None),
        }
    }

    fn binding_request(&self, ctx: &UploadContext, topic: &str) -> ApiResult<TopicBindingRequest> {
        let broker_url = ctx
            .broker_url
            .clone()
            .ok_or_else(|| ApiError::Validation("broker URL is missing".to_string()))?;
        Ok(TopicBindingRequest {
            broker_url,
            topic_full_name: topic.to_string(),
            access_token: ctx.access_token.clone(),
            tenant: ctx.tenant.clone(),
            ..TopicBindingRequest::default()
        })
    }
}
