//! Retrying chat wrapper
//!
//! `safe_chat` retries connection-class failures with the engine's
//! exponential-backoff policy (3 attempts, 1 s → 2 s → 4 s by default).
//! Non-transient errors surface immediately and never consume retries.

use crate::error::{LlmError, Result};
use crate::traits::{ChatModel, ChatRequest, ChatResponse};
use tradegraph_core::retry::RetryPolicy;

/// Call `model.chat`, retrying transient failures per `policy`.
pub async fn safe_chat(
    model: &dyn ChatModel,
    request: ChatRequest,
    policy: &RetryPolicy,
) -> Result<ChatResponse> {
    let mut attempt = 0usize;
    loop {
        match model.chat(request.clone()).await {
            Ok(response) => return Ok(response),
            Err(err) if err.is_transient() => {
                attempt += 1;
                if !policy.should_retry(attempt) {
                    tracing::warn!(
                        model = model.model_name(),
                        attempts = attempt,
                        error = %err,
                        "transient LLM failures exhausted retry budget"
                    );
                    return Err(err);
                }
                let delay = policy.calculate_delay(attempt - 1);
                tracing::debug!(
                    model = model.model_name(),
                    attempt,
                    ?delay,
                    error = %err,
                    "retrying transient LLM failure"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Default policy for LLM calls: 3 attempts, 1 s initial, factor 2.
pub fn default_llm_retry() -> RetryPolicy {
    RetryPolicy::new(3)
        .with_initial_interval(1.0)
        .with_backoff_factor(2.0)
        .with_jitter(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Message;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct FlakyModel {
        failures_before_success: Mutex<usize>,
        transient: bool,
    }

    #[async_trait]
    impl ChatModel for FlakyModel {
        async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse> {
            let mut remaining = self.failures_before_success.lock();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(if self.transient {
                    LlmError::Connection("refused".into())
                } else {
                    LlmError::Configuration("bad key".into())
                });
            }
            Ok(ChatResponse {
                message: Message::ai("ok"),
                usage: None,
            })
        }

        fn model_name(&self) -> &str {
            "flaky"
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3)
            .with_initial_interval(0.001)
            .with_jitter(false)
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let model = FlakyModel {
            failures_before_success: Mutex::new(2),
            transient: true,
        };
        let response = safe_chat(&model, ChatRequest::default(), &fast_policy())
            .await
            .unwrap();
        assert_eq!(response.message.content, "ok");
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let model = FlakyModel {
            failures_before_success: Mutex::new(1),
            transient: false,
        };
        let err = safe_chat(&model, ChatRequest::default(), &fast_policy())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Configuration(_)));
        // One failure was queued; a retry would have succeeded.
        assert_eq!(*model.failures_before_success.lock(), 0);
    }

    #[tokio::test]
    async fn test_retry_budget_exhausts() {
        let model = FlakyModel {
            failures_before_success: Mutex::new(10),
            transient: true,
        };
        let err = safe_chat(&model, ChatRequest::default(), &fast_policy())
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
