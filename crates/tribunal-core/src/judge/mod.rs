use crate::errors::{EvalError, EvalResult};
use crate::model::{Judge, JudgeQuestion, Verdict};
use crate::providers::llm::{CompletionRequest, LlmClient, ProviderError};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Clone, Debug)]
pub struct InvokePolicy {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for InvokePolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            attempt_timeout: Duration::from_secs(60),
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// Sends one question to one judge and turns the reply into a verdict.
#[derive(Clone)]
pub struct JudgeService {
    client: Arc<dyn LlmClient>,
    policy: InvokePolicy,
}

impl JudgeService {
    pub fn new(client: Arc<dyn LlmClient>, policy: InvokePolicy) -> Self {
        Self { client, policy }
    }

    pub fn provider_name(&self) -> &'static str {
        self.client.provider_name()
    }

    pub async fn invoke(
        &self,
        judge: &Judge,
        question: &JudgeQuestion,
    ) -> EvalResult<(Verdict, Option<String>)> {
        let req = CompletionRequest {
            model: judge.model.clone(),
            system: judge.system_prompt.clone(),
            prompt: serde_json::to_string(question)?,
        };

        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = match tokio::time::timeout(
                self.policy.attempt_timeout,
                self.client.complete(&req),
            )
            .await
            {
                Ok(r) => r,
                Err(_) => Err(ProviderError::Timeout(self.policy.attempt_timeout)),
            };

            match result {
                Ok(resp) => {
                    let verdict = classify(&resp.text);
                    debug!(judge = %judge.name, model = %judge.model, %verdict, attempt, "judge replied");
                    return Ok((verdict, resp.reasoning));
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let backoff = backoff_for(&self.policy, attempt, &e);
                    warn!(
                        judge = %judge.name,
                        error = %e,
                        attempt,
                        max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        "retrying judge request"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    return Err(EvalError::Invocation {
                        attempts: attempt,
                        message: e.to_string(),
                    })
                }
            }
        }
    }
}

/// Case-sensitive prefix match on the raw reply.
pub fn classify(text: &str) -> Verdict {
    if text.starts_with("pass") {
        Verdict::Pass
    } else if text.starts_with("fail") {
        Verdict::Fail
    } else {
        if !text.starts_with("inconclusive") {
            warn!(response = %text, "unexpected judge response outside verdict");
        }
        Verdict::Inconclusive
    }
}

fn backoff_for(policy: &InvokePolicy, attempt: u32, err: &ProviderError) -> Duration {
    if let ProviderError::RateLimited {
        retry_after: Some(retry_after),
    } = err
    {
        let base_ms = (*retry_after).min(policy.max_backoff).as_millis() as u64;
        let jitter: f64 = rand::thread_rng().gen_range(0.9_f64..=1.1_f64);
        return Duration::from_millis(((base_ms as f64) * jitter).round() as u64);
    }

    let exp = policy
        .base_backoff
        .saturating_mul(1u32 << (attempt - 1).min(16))
        .min(policy.max_backoff);
    let ceiling = exp.as_millis() as u64;
    if ceiling == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling).max(10))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LlmResponse;
    use crate::providers::llm::fake::FakeClient;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> InvokePolicy {
        InvokePolicy {
            base_backoff: Duration::ZERO,
            ..Default::default()
        }
    }

    fn question() -> JudgeQuestion {
        JudgeQuestion {
            question_text: "Is the sky blue?".into(),
            answer: serde_json::json!({ "choice": "yes", "reasoning": "Observed on a clear day." }),
        }
    }

    #[test]
    fn classification_is_prefix_based() {
        assert_eq!(classify("pass"), Verdict::Pass);
        assert_eq!(classify("passed, confidently"), Verdict::Pass);
        assert_eq!(classify("fail: wrong choice"), Verdict::Fail);
        assert_eq!(classify("inconclusive"), Verdict::Inconclusive);
        assert_eq!(classify("I think it passes"), Verdict::Inconclusive);
        assert_eq!(classify("Pass"), Verdict::Inconclusive);
        assert_eq!(classify(""), Verdict::Inconclusive);
    }

    #[test]
    fn backoff_is_capped() {
        let policy = InvokePolicy::default();
        let err = ProviderError::Network { message: "x".into() };
        for attempt in 1..10 {
            assert!(backoff_for(&policy, attempt, &err) <= policy.max_backoff);
        }
        let limited = ProviderError::RateLimited {
            retry_after: Some(Duration::from_secs(600)),
        };
        assert!(backoff_for(&policy, 1, &limited) <= Duration::from_secs(33));
    }

    #[tokio::test]
    async fn returns_verdict_and_reasoning() -> anyhow::Result<()> {
        let client = Arc::new(FakeClient::new().with_response("fail").with_reasoning("wrong"));
        let svc = JudgeService::new(client, fast_policy());
        let judge = Judge::new("strict", "gpt-4o", "Reply pass or fail.");
        let (verdict, reasoning) = svc.invoke(&judge, &question()).await?;
        assert_eq!(verdict, Verdict::Fail);
        assert_eq!(reasoning.as_deref(), Some("wrong"));
        Ok(())
    }

    #[tokio::test]
    async fn transient_failures_are_retried() -> anyhow::Result<()> {
        let client = Arc::new(
            FakeClient::new()
                .with_response("pass")
                .failing_first(4, ProviderError::Network { message: "reset".into() }),
        );
        let svc = JudgeService::new(client.clone(), fast_policy());
        let (verdict, _) = svc.invoke(&Judge::new("j", "m", "p"), &question()).await?;
        assert_eq!(verdict, Verdict::Pass);
        assert_eq!(client.calls(), 5);
        Ok(())
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let client = Arc::new(
            FakeClient::new().failing_first(10, ProviderError::Http { status: 503, message: "busy".into() }),
        );
        let svc = JudgeService::new(client.clone(), fast_policy());
        let err = svc
            .invoke(&Judge::new("j", "m", "p"), &question())
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::Invocation { attempts: 5, .. }), "got {err:?}");
        assert_eq!(client.calls(), 5);
    }

    /// Never answers; counts how often it was asked.
    #[derive(Default)]
    struct SilentClient {
        calls: AtomicU32,
    }

    #[async_trait]
    impl LlmClient for SilentClient {
        async fn complete(&self, _req: &CompletionRequest) -> Result<LlmResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }

        fn provider_name(&self) -> &'static str {
            "silent"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn each_attempt_is_bounded_by_the_timeout() {
        let client = Arc::new(SilentClient::default());
        let svc = JudgeService::new(
            client.clone(),
            InvokePolicy {
                attempt_timeout: Duration::from_secs(2),
                ..fast_policy()
            },
        );
        let err = svc
            .invoke(&Judge::new("j", "m", "p"), &question())
            .await
            .unwrap_err();
        match err {
            EvalError::Invocation { attempts, message } => {
                assert_eq!(attempts, 5);
                assert!(message.contains("timed out"), "{message}");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(client.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let client = Arc::new(
            FakeClient::new().failing_first(10, ProviderError::Http { status: 401, message: "bad key".into() }),
        );
        let svc = JudgeService::new(client.clone(), fast_policy());
        let err = svc
            .invoke(&Judge::new("j", "m", "p"), &question())
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::Invocation { attempts: 1, .. }));
        assert_eq!(client.calls(), 1);
    }
}
