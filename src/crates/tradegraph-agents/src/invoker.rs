//! Tool invoker: budgets, dedup, cache, timeout, retry, parallel dispatch
//!
//! Every tool call an analyst makes goes through here. The invoker enforces
//! the per-analyst call budget and argument dedup (the ledger never
//! shrinks), serves repeated calls from the process-wide TTL cache without
//! debiting the budget, bounds each dispatch with a timeout, and retries
//! transient failures with exponential backoff.
//!
//! Within one analyst iteration, requested calls execute concurrently and
//! results return in request order, keyed by `tool_call_id`. One failing
//! call never aborts its siblings; it materializes as an error payload in
//! that call's slot.

use crate::config::AnalysisConfig;
use crate::tools::{AnalystKind, Tool, ToolContext, ToolError, ToolRegistry};
use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Instant;
use tradegraph_core::cache::{CacheMetrics, TtlCache};
use tradegraph_core::retry::RetryPolicy;
use tradegraph_llm::messages::{Message, ToolCall};

/// Per-analyst call accounting. Entries are only ever added.
#[derive(Debug, Default)]
struct AnalystLedger {
    total_calls: usize,
    /// tool name → list of (arg hash, normalized arg string)
    arg_hashes: HashMap<String, Vec<(u64, String)>>,
}

/// Uniform async tool executor shared by all analysts in a session.
pub struct ToolInvoker {
    registry: Arc<ToolRegistry>,
    cache: Arc<TtlCache<String>>,
    ledger: Mutex<HashMap<AnalystKind, AnalystLedger>>,
    config: Arc<AnalysisConfig>,
}

impl ToolInvoker {
    /// Create an invoker over the given registry. The cache is typically
    /// shared process-wide so sessions benefit from each other's fetches.
    pub fn new(
        registry: Arc<ToolRegistry>,
        cache: Arc<TtlCache<String>>,
        config: Arc<AnalysisConfig>,
    ) -> Self {
        Self {
            registry,
            cache,
            ledger: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Whether `analyst` may call `tool_name` with `args` right now.
    /// Returns `(false, reason)` when the budget is spent or the arguments
    /// duplicate a prior call by the same analyst.
    pub fn can_call(&self, analyst: AnalystKind, tool_name: &str, args: &Value) -> (bool, Option<String>) {
        let ledger = self.ledger.lock();
        if let Some(entry) = ledger.get(&analyst) {
            if entry.total_calls >= self.config.max_total_tool_calls_per_analyst {
                return (
                    false,
                    Some(format!(
                        "tool budget exhausted ({} calls)",
                        entry.total_calls
                    )),
                );
            }
            let hash = arg_hash(args);
            if let Some(calls) = entry.arg_hashes.get(tool_name) {
                if calls.iter().any(|(h, _)| *h == hash) {
                    return (
                        false,
                        Some(format!("duplicate arguments for {tool_name}")),
                    );
                }
            }
        }
        (true, None)
    }

    /// Number of budget-debited calls the analyst has made.
    pub fn total_calls(&self, analyst: AnalystKind) -> usize {
        self.ledger
            .lock()
            .get(&analyst)
            .map(|l| l.total_calls)
            .unwrap_or(0)
    }

    /// Commit a call to the ledger.
    pub fn record_call(&self, analyst: AnalystKind, tool_name: &str, args: &Value) {
        let mut ledger = self.ledger.lock();
        let entry = ledger.entry(analyst).or_default();
        entry.total_calls += 1;
        entry
            .arg_hashes
            .entry(tool_name.to_string())
            .or_default()
            .push((arg_hash(args), normalize_args(args)));
    }

    /// Execute one tool call: cache → dispatch (timeout) → retry on
    /// transient classes → cache insert + ledger debit.
    ///
    /// Cache hits return without a budget debit.
    pub async fn invoke(
        &self,
        analyst: AnalystKind,
        tool_name: &str,
        args: Value,
        ctx: &ToolContext,
    ) -> Result<String, ToolError> {
        let key = cache_key(tool_name, &args);
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!(tool = tool_name, %analyst, "tool cache hit");
            return Ok(cached);
        }

        let tool = self
            .registry
            .get(tool_name)
            .ok_or_else(|| ToolError::UnknownTool(tool_name.to_string()))?;

        let policy = RetryPolicy::new(self.config.tool_retry_attempts + 1)
            .with_initial_interval(1.0)
            .with_backoff_factor(2.0)
            .with_jitter(false);

        let mut attempt = 0usize;
        let text = loop {
            let started = Instant::now();
            let outcome = tokio::time::timeout(
                self.config.tool_timeout,
                tool.invoke(args.clone(), ctx),
            )
            .await;

            let result = match outcome {
                Ok(inner) => inner,
                Err(_) => Err(ToolError::Timeout(self.config.tool_timeout)),
            };

            match result {
                Ok(output) => {
                    tracing::debug!(
                        tool = tool_name,
                        %analyst,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "tool call succeeded"
                    );
                    break output.text;
                }
                Err(err) if tool.is_transient_error(&err) => {
                    attempt += 1;
                    if !policy.should_retry(attempt) {
                        tracing::warn!(tool = tool_name, %analyst, error = %err, "transient retries exhausted");
                        return Err(ToolError::TransientExhausted(err.to_string()));
                    }
                    let delay = policy.calculate_delay(attempt - 1);
                    tracing::debug!(tool = tool_name, attempt, ?delay, "retrying transient tool failure");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        };

        self.cache.insert(key, text.clone());
        self.record_call(analyst, tool_name, &args);
        Ok(text)
    }

    /// Execute the surviving tool calls of one analyst iteration
    /// concurrently. Results come back as tool messages in request order;
    /// a failed call becomes an error payload in its slot.
    pub async fn execute_parallel(
        &self,
        analyst: AnalystKind,
        calls: &[ToolCall],
        ctx: &ToolContext,
    ) -> Vec<Message> {
        let started = Instant::now();

        let futures: Vec<_> = calls
            .iter()
            .map(|call| {
                let call = call.clone();
                let ctx = ctx.clone();
                async move {
                    let call_started = Instant::now();
                    let result = self
                        .invoke(analyst, &call.name, call.args.clone(), &ctx)
                        .await;
                    (call, result, call_started.elapsed())
                }
            })
            .collect();

        let results = join_all(futures).await;

        let sequential_total: u128 = results.iter().map(|(_, _, d)| d.as_millis()).sum();
        let wall = started.elapsed().as_millis().max(1);
        let failures = results.iter().filter(|(_, r, _)| r.is_err()).count();
        tracing::info!(
            %analyst,
            calls = calls.len(),
            failures,
            wall_ms = wall as u64,
            speedup = %format!("{:.2}x", sequential_total as f64 / wall as f64),
            "parallel tool dispatch finished"
        );

        results
            .into_iter()
            .map(|(call, result, _)| match result {
                Ok(text) => Message::tool(text, &call.id).with_name(&call.name),
                Err(err) => {
                    Message::tool(format!("Tool error: {err}"), &call.id).with_name(&call.name)
                }
            })
            .collect()
    }

    /// Cache counters for metrics and tests.
    pub fn cache_metrics(&self) -> CacheMetrics {
        self.cache.metrics()
    }
}

/// Normalize arguments to a canonical string: objects are key-sorted
/// recursively so `{a,b}` and `{b,a}` hash identically.
pub fn normalize_args(args: &Value) -> String {
    canonicalize(args).to_string()
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect();
            serde_json::to_value(sorted).unwrap_or(Value::Null)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Hash of normalized arguments.
pub fn arg_hash(args: &Value) -> u64 {
    let mut hasher = DefaultHasher::new();
    normalize_args(args).hash(&mut hasher);
    hasher.finish()
}

/// Cache key over tool name and normalized arguments.
pub fn cache_key(tool_name: &str, args: &Value) -> String {
    format!("{tool_name}:{:016x}", arg_hash(args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolOutput;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingTool {
        calls: AtomicUsize,
        failures_before_success: usize,
        transient: bool,
    }

    impl CountingTool {
        fn ok() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures_before_success: 0,
                transient: true,
            }
        }

        fn flaky(failures: usize, transient: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures_before_success: failures,
                transient,
            }
        }
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn name(&self) -> &str {
            "counting"
        }

        fn description(&self) -> &str {
            "test tool"
        }

        fn args_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn invoke(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures_before_success {
                return Err(if self.transient {
                    ToolError::Transient("flaky".into())
                } else {
                    ToolError::Permanent("rejected".into())
                });
            }
            Ok(ToolOutput::text(format!("payload for {}", args["q"])))
        }
    }

    fn invoker_with(tool: CountingTool, config: AnalysisConfig) -> ToolInvoker {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(tool));
        let config = Arc::new(config);
        ToolInvoker::new(
            Arc::new(registry),
            Arc::new(TtlCache::new(64, config.tool_cache_ttl)),
            config,
        )
    }

    fn fast_config() -> AnalysisConfig {
        let mut config = AnalysisConfig::default();
        config.tool_timeout = Duration::from_millis(200);
        config
    }

    #[tokio::test]
    async fn test_invoke_records_ledger_and_caches() {
        let invoker = invoker_with(CountingTool::ok(), fast_config());
        let ctx = ToolContext::default();

        let first = invoker
            .invoke(AnalystKind::Market, "counting", json!({"q": 1}), &ctx)
            .await
            .unwrap();
        assert_eq!(invoker.total_calls(AnalystKind::Market), 1);

        // Second invocation with the same args hits the cache: same payload,
        // no budget debit.
        let second = invoker
            .invoke(AnalystKind::News, "counting", json!({"q": 1}), &ctx)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(invoker.total_calls(AnalystKind::News), 0);
        assert_eq!(invoker.cache_metrics().hits, 1);
    }

    #[tokio::test]
    async fn test_budget_enforcement() {
        let invoker = invoker_with(CountingTool::ok(), fast_config());
        let ctx = ToolContext::default();

        for q in 0..3 {
            invoker
                .invoke(AnalystKind::Market, "counting", json!({"q": q}), &ctx)
                .await
                .unwrap();
        }
        let (ok, reason) = invoker.can_call(AnalystKind::Market, "counting", &json!({"q": 99}));
        assert!(!ok);
        assert!(reason.unwrap().contains("budget"));
    }

    #[tokio::test]
    async fn test_duplicate_args_rejected_regardless_of_key_order() {
        let invoker = invoker_with(CountingTool::ok(), fast_config());
        let ctx = ToolContext::default();

        invoker
            .invoke(
                AnalystKind::Market,
                "counting",
                json!({"a": 1, "b": 2}),
                &ctx,
            )
            .await
            .unwrap();

        let (ok, reason) =
            invoker.can_call(AnalystKind::Market, "counting", &json!({"b": 2, "a": 1}));
        assert!(!ok);
        assert!(reason.unwrap().contains("duplicate"));
    }

    #[tokio::test]
    async fn test_transient_failures_retry_then_succeed() {
        let mut config = fast_config();
        config.tool_retry_attempts = 2;
        // Shrink backoff by letting tokio's timer run; initial interval is 1s,
        // so run with paused time.
        tokio::time::pause();
        let invoker = invoker_with(CountingTool::flaky(2, true), config);
        let ctx = ToolContext::default();

        let result = invoker
            .invoke(AnalystKind::Market, "counting", json!({"q": 1}), &ctx)
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_permanent_failure_surfaces_immediately() {
        let invoker = invoker_with(CountingTool::flaky(5, false), fast_config());
        let ctx = ToolContext::default();

        let err = invoker
            .invoke(AnalystKind::Market, "counting", json!({"q": 1}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Permanent(_)));
        assert_eq!(invoker.total_calls(AnalystKind::Market), 0);
    }

    #[tokio::test]
    async fn test_parallel_results_in_request_order_with_failures_isolated() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(CountingTool::ok()));
        let config = Arc::new(fast_config());
        let invoker = ToolInvoker::new(
            Arc::new(registry),
            Arc::new(TtlCache::new(64, config.tool_cache_ttl)),
            config,
        );

        let calls = vec![
            ToolCall::new("id_a", "counting", json!({"q": "a"})),
            ToolCall::new("id_b", "missing_tool", json!({})),
            ToolCall::new("id_c", "counting", json!({"q": "c"})),
        ];
        let messages = invoker
            .execute_parallel(AnalystKind::Market, &calls, &ToolContext::default())
            .await;

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].tool_call_id.as_deref(), Some("id_a"));
        assert_eq!(messages[1].tool_call_id.as_deref(), Some("id_b"));
        assert_eq!(messages[2].tool_call_id.as_deref(), Some("id_c"));
        assert!(messages[1].content.contains("Tool error"));
        assert!(messages[0].content.contains("payload"));
    }

    #[test]
    fn test_cache_key_is_stable_under_key_reordering() {
        assert_eq!(
            cache_key("t", &json!({"x": 1, "y": [1, 2]})),
            cache_key("t", &json!({"y": [1, 2], "x": 1})),
        );
    }
}
