//! The upstream request boundary and its retry orchestration.
//!
//! The transport itself (HTTP, authentication, wire schema) lives outside
//! this crate; all we require of it is a single-shot `ask` returning text,
//! with error responses flagged in-band by an `Error` prefix. The retry
//! policy here is deliberately plain: a fixed interval and a fixed attempt
//! budget, because the upstream provider already rate-limits.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The opaque "ask the model" collaborator.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn ask(&self, prompt: &str) -> String;
}

#[async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for Arc<T> {
    async fn ask(&self, prompt: &str) -> String {
        (**self).ask(prompt).await
    }
}

/// Retry behavior for a single request. The retryable prefixes are an
/// upstream-collaborator detail, so they are configuration rather than
/// hard-coded literals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed wait between attempts. No backoff, no jitter.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Response prefixes classified as transient.
    #[serde(default = "default_retryable_prefixes")]
    pub retryable_prefixes: Vec<String>,
    /// Returned verbatim when every attempt came back retryable.
    #[serde(default = "default_exhausted_message")]
    pub exhausted_message: String,
}

fn default_max_attempts() -> u32 {
    6
}

fn default_retry_delay_ms() -> u64 {
    3_000
}

fn default_retryable_prefixes() -> Vec<String> {
    vec![
        "Error: The operation has timed out".to_string(),
        "Error: Too many requests".to_string(),
    ]
}

fn default_exhausted_message() -> String {
    "Error: The AI service did not return a usable response after repeated attempts.".to_string()
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            retryable_prefixes: default_retryable_prefixes(),
            exhausted_message: default_exhausted_message(),
        }
    }
}

impl RetryPolicy {
    /// Empty content or a recognized transient prefix is worth retrying;
    /// anything else, success or not, is final.
    pub fn is_retryable(&self, response: &str) -> bool {
        response.trim().is_empty()
            || self
                .retryable_prefixes
                .iter()
                .any(|prefix| response.starts_with(prefix.as_str()))
    }
}

/// Ask the transport, retrying retryable responses up to the policy's
/// attempt budget with a fixed delay between attempts.
///
/// At most one `ask` call is outstanding at a time, and no partial-attempt
/// state leaks to the caller: the return value is either the first final
/// response or the policy's exhausted message.
pub async fn request_with_retry(
    transport: &dyn ChatTransport,
    prompt: &str,
    policy: &RetryPolicy,
) -> String {
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        let response = transport.ask(prompt).await;
        if !policy.is_retryable(&response) {
            return response;
        }
        debug!(attempt, max_attempts = attempts, "retryable response from transport");
        if attempt < attempts {
            tokio::time::sleep(Duration::from_millis(policy.retry_delay_ms)).await;
        }
    }
    policy.exhausted_message.clone()
}
