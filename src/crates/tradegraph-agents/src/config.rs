//! Per-session analysis configuration
//!
//! Immutable once a session starts: the builder produces a validated config
//! that is passed by `Arc` to every kernel. The server applies environment
//! overrides before building; nothing reads configuration globals at
//! runtime.

use crate::tools::AnalystKind;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Recognized configuration options for one analysis session.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Cap on investment debate rounds (1..=5)
    pub max_debate_rounds: usize,
    /// Reserved for iterated risk rounds; the risk debate currently runs one
    /// parallel fan-out
    pub max_risk_discuss_rounds: usize,
    /// Hard per-analyst tool-call budget
    pub max_total_tool_calls_per_analyst: usize,
    /// Per-tool-call timeout
    pub tool_timeout: Duration,
    /// Retry attempts on transient tool errors (beyond the first try)
    pub tool_retry_attempts: usize,
    /// TTL for cached tool results
    pub tool_cache_ttl: Duration,
    /// Session-wide deadline
    pub execution_timeout: Duration,
    /// Max node activations (1..=100)
    pub recursion_limit: usize,
    /// Use the perspective projector for risk debators
    pub enable_smart_context: bool,
    /// Declare consensus when the judge's quality score reaches this value,
    /// even on a "no" verdict. Off by default.
    pub force_consensus_threshold: Option<u8>,
    /// Per-agent word-count hints injected into prompts
    pub response_word_limits: HashMap<String, usize>,
    /// Top-N articles kept from the news feed
    pub news_max_articles: usize,
    /// Soft bound on analyst channel length before force-completion
    pub message_soft_limit: usize,
    /// Analysts to dispatch (defaults to all four)
    pub selected_analysts: Vec<AnalystKind>,
    /// When set, persist session artifacts under this directory
    pub results_dir: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_debate_rounds: 3,
            max_risk_discuss_rounds: 1,
            max_total_tool_calls_per_analyst: 3,
            tool_timeout: Duration::from_secs(30),
            tool_retry_attempts: 2,
            tool_cache_ttl: Duration::from_secs(300),
            execution_timeout: Duration::from_secs(120),
            recursion_limit: 50,
            enable_smart_context: true,
            force_consensus_threshold: None,
            response_word_limits: default_word_limits(),
            news_max_articles: 15,
            message_soft_limit: 6,
            selected_analysts: AnalystKind::all().to_vec(),
            results_dir: None,
        }
    }
}

fn default_word_limits() -> HashMap<String, usize> {
    let mut limits = HashMap::new();
    limits.insert("analyst".to_string(), 300);
    limits.insert("researcher".to_string(), 250);
    limits.insert("judge".to_string(), 200);
    limits.insert("research_manager".to_string(), 400);
    limits.insert("trader".to_string(), 300);
    limits.insert("risk_debator".to_string(), 150);
    limits.insert("risk_judge".to_string(), 300);
    limits
}

impl AnalysisConfig {
    /// Start building a config from the defaults.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }

    /// Word limit for an agent role, falling back to the analyst limit.
    pub fn word_limit(&self, role: &str) -> usize {
        self.response_word_limits
            .get(role)
            .copied()
            .unwrap_or_else(|| self.response_word_limits.get("analyst").copied().unwrap_or(300))
    }
}

/// Builder that clamps out-of-range values instead of failing.
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    /// Debate round cap; clamped into 1..=5.
    pub fn max_debate_rounds(mut self, rounds: usize) -> Self {
        self.config.max_debate_rounds = rounds.clamp(1, 5);
        self
    }

    /// Per-analyst tool budget; at least 1.
    pub fn max_total_tool_calls_per_analyst(mut self, calls: usize) -> Self {
        self.config.max_total_tool_calls_per_analyst = calls.max(1);
        self
    }

    /// Per-call tool timeout; zero is rejected by keeping the prior value.
    pub fn tool_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.config.tool_timeout = timeout;
        }
        self
    }

    /// Transient-retry attempts for tools.
    pub fn tool_retry_attempts(mut self, attempts: usize) -> Self {
        self.config.tool_retry_attempts = attempts;
        self
    }

    /// Tool cache TTL.
    pub fn tool_cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.tool_cache_ttl = ttl;
        self
    }

    /// Session deadline; zero is rejected by keeping the prior value.
    pub fn execution_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.config.execution_timeout = timeout;
        }
        self
    }

    /// Recursion limit; clamped into 1..=100.
    pub fn recursion_limit(mut self, limit: usize) -> Self {
        self.config.recursion_limit = limit.clamp(1, 100);
        self
    }

    /// Toggle the smart-context projector.
    pub fn enable_smart_context(mut self, enabled: bool) -> Self {
        self.config.enable_smart_context = enabled;
        self
    }

    /// Force-consensus quality threshold (1..=10), or None to disable.
    pub fn force_consensus_threshold(mut self, threshold: Option<u8>) -> Self {
        self.config.force_consensus_threshold = threshold.map(|t| t.clamp(1, 10));
        self
    }

    /// Override a role's word limit.
    pub fn word_limit(mut self, role: impl Into<String>, words: usize) -> Self {
        self.config.response_word_limits.insert(role.into(), words);
        self
    }

    /// Select which analysts to dispatch.
    pub fn selected_analysts(mut self, analysts: Vec<AnalystKind>) -> Self {
        if !analysts.is_empty() {
            self.config.selected_analysts = analysts;
        }
        self
    }

    /// Enable persistence under the given directory.
    pub fn results_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.config.results_dir = dir;
        self
    }

    /// Finish building.
    pub fn build(self) -> AnalysisConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_contract() {
        let config = AnalysisConfig::default();
        assert_eq!(config.max_debate_rounds, 3);
        assert_eq!(config.max_total_tool_calls_per_analyst, 3);
        assert_eq!(config.tool_timeout, Duration::from_secs(30));
        assert_eq!(config.tool_cache_ttl, Duration::from_secs(300));
        assert_eq!(config.execution_timeout, Duration::from_secs(120));
        assert_eq!(config.recursion_limit, 50);
        assert!(config.enable_smart_context);
        assert!(config.force_consensus_threshold.is_none());
        assert_eq!(config.selected_analysts.len(), 4);
    }

    #[test]
    fn test_builder_clamps_out_of_range() {
        let config = AnalysisConfig::builder()
            .max_debate_rounds(0)
            .recursion_limit(500)
            .build();
        assert_eq!(config.max_debate_rounds, 1);
        assert_eq!(config.recursion_limit, 100);
    }

    #[test]
    fn test_zero_timeouts_are_rejected() {
        let config = AnalysisConfig::builder()
            .execution_timeout(Duration::ZERO)
            .tool_timeout(Duration::ZERO)
            .build();
        assert_eq!(config.execution_timeout, Duration::from_secs(120));
        assert_eq!(config.tool_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_word_limit_fallback() {
        let config = AnalysisConfig::default();
        assert_eq!(config.word_limit("trader"), 300);
        assert_eq!(config.word_limit("unknown_role"), 300);
        assert_eq!(config.word_limit("risk_debator"), 150);
    }
}
