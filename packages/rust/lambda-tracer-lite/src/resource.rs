//! Function metadata from the Lambda environment.
//!
//! The Lambda runtime exposes the function's identity through environment
//! variables. This module reads them once per invocation and combines them
//! with the invocation context into the function span payload.
//!
//! ## Environment Variables
//! - `AWS_LAMBDA_FUNCTION_NAME`: function name
//! - `AWS_LAMBDA_FUNCTION_VERSION`: version (`$LATEST` when unset)
//! - `AWS_REGION`: region
//! - `AWS_LAMBDA_FUNCTION_MEMORY_SIZE`: configured memory in MB
//! - `AWS_LAMBDA_LOG_GROUP_NAME` / `AWS_LAMBDA_LOG_STREAM_NAME`: CloudWatch location
//!
//! Additional tags can be supplied through `LAMBDA_TRACER_TAGS` in the format
//! `key=value,key2=value2`. Values can be URL-encoded if they contain special
//! characters.

use crate::span::FunctionInfo;
use crate::triggers::Trigger;
use lambda_runtime::Context;
use std::env;
use urlencoding::decode;

/// Environment variable holding extra function tags.
pub const TAGS_ENV_VAR: &str = "LAMBDA_TRACER_TAGS";

/// Identity of the running function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionResource {
    pub name: String,
    pub version: String,
    pub region: String,
    pub memory_size: Option<String>,
    pub log_group_name: Option<String>,
    pub log_stream_name: Option<String>,
    pub tags: Vec<(String, String)>,
}

impl FunctionResource {
    /// Read the function identity from the environment.
    pub fn from_env() -> Self {
        Self {
            name: env::var("AWS_LAMBDA_FUNCTION_NAME").unwrap_or_default(),
            version: env::var("AWS_LAMBDA_FUNCTION_VERSION")
                .unwrap_or_else(|_| "$LATEST".to_string()),
            region: env::var("AWS_REGION").unwrap_or_default(),
            memory_size: env::var("AWS_LAMBDA_FUNCTION_MEMORY_SIZE").ok(),
            log_group_name: env::var("AWS_LAMBDA_LOG_GROUP_NAME").ok(),
            log_stream_name: env::var("AWS_LAMBDA_LOG_STREAM_NAME").ok(),
            tags: env::var(TAGS_ENV_VAR)
                .map(|raw| parse_tags(&raw))
                .unwrap_or_default(),
        }
    }

    /// Function span payload for one invocation.
    pub fn function_info(
        &self,
        context: &Context,
        cold_start: bool,
        triggers: Vec<Trigger>,
    ) -> FunctionInfo {
        FunctionInfo {
            name: self.name.clone(),
            version: self.version.clone(),
            region: self.region.clone(),
            memory_allocated: self.memory_size.clone(),
            arn: context.invoked_function_arn.clone(),
            aws_request_id: context.request_id.clone(),
            log_group_name: self.log_group_name.clone(),
            log_stream_name: self.log_stream_name.clone(),
            cold_start,
            event: None,
            triggers,
            max_finish_time: i64::try_from(context.deadline).unwrap_or(i64::MAX),
            return_value: None,
            tags: self
                .tags
                .iter()
                .map(|(k, v)| (k.clone(), v.clone().into()))
                .collect(),
        }
    }
}

/// Parse `key=value,key2=value2`, URL-decoding values. Malformed pairs are skipped.
fn parse_tags(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            let value = decode(value.trim())
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.trim().to_string());
            Some((key.to_string(), value))
        })
        .collect()
}
