//! Perspective-specific context projection
//!
//! The three risk debators read the same underlying reports, but each needs
//! a different slice: the aggressive debator wants growth signals, the
//! conservative one wants risk signals, the neutral one wants the balanced
//! overview. Handing each the full accumulated state triples the token
//! spend for no quality gain.
//!
//! The projector extracts perspective-relevant sentences with regex/keyword
//! scans, assembles labeled sections, and enforces a per-component
//! character budget (≈6,000 tokens × 4 bytes). It never fabricates: every
//! extracted line is a substring of its source report. Projections are
//! cached under a content hash, so requesting all three perspectives over
//! one state re-reads nothing.

use parking_lot::Mutex;
use regex::RegexSet;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Risk debate perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Perspective {
    Aggressive,
    Conservative,
    Neutral,
}

impl Perspective {
    /// All perspectives in stable aggregation order.
    pub fn all() -> [Perspective; 3] {
        [
            Perspective::Aggressive,
            Perspective::Conservative,
            Perspective::Neutral,
        ]
    }

    /// Config/cache key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Perspective::Aggressive => "aggressive",
            Perspective::Conservative => "conservative",
            Perspective::Neutral => "neutral",
        }
    }

    /// Speaker label used in debate histories.
    pub fn speaker(&self) -> &'static str {
        match self {
            Perspective::Aggressive => "Risky Analyst",
            Perspective::Conservative => "Safe Analyst",
            Perspective::Neutral => "Neutral Analyst",
        }
    }

    /// The `current_*` field this perspective writes.
    pub fn current_field(&self) -> &'static str {
        match self {
            Perspective::Aggressive => "current_risky_response",
            Perspective::Conservative => "current_safe_response",
            Perspective::Neutral => "current_neutral_response",
        }
    }

    /// The history field this perspective appends to.
    pub fn history_field(&self) -> &'static str {
        match self {
            Perspective::Aggressive => "risky_history",
            Perspective::Conservative => "safe_history",
            Perspective::Neutral => "neutral_history",
        }
    }

    /// Graph node name.
    pub fn node_name(&self) -> String {
        format!("{}_risk", self.as_str())
    }
}

impl std::fmt::Display for Perspective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Full context handed to the projector.
#[derive(Debug, Clone, Default)]
pub struct ProjectionInput {
    pub investment_plan: String,
    pub trader_decision: String,
    pub market_report: String,
    pub sentiment_report: String,
    pub news_report: String,
    pub fundamentals_report: String,
}

/// Truncation marker appended when a projection overflows its budget.
pub const BUDGET_MARKER: &str = "\n\n[TRUNCATED FOR TOKEN BUDGET]";

/// Character budget per projected component (~6,000 tokens).
const COMPONENT_CHAR_BUDGET: usize = 6_000 * 4;

/// Perspective-specific, budgeted context views over the session reports.
pub struct ContextProjector {
    cache: Mutex<HashMap<String, String>>,
    hits: Mutex<u64>,
    char_budget: usize,
}

impl Default for ContextProjector {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextProjector {
    /// Projector with the standard component budget.
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            hits: Mutex::new(0),
            char_budget: COMPONENT_CHAR_BUDGET,
        }
    }

    /// Override the character budget (tests use small budgets).
    pub fn with_char_budget(mut self, budget: usize) -> Self {
        self.char_budget = budget;
        self
    }

    /// Produce the projected context for a perspective. Deterministic:
    /// equal inputs yield equal output, served from cache after the first
    /// projection.
    pub fn project(&self, perspective: Perspective, input: &ProjectionInput) -> String {
        let key = cache_key(perspective, input);
        if let Some(cached) = self.cache.lock().get(&key) {
            *self.hits.lock() += 1;
            tracing::debug!(%perspective, "projector cache hit");
            return cached.clone();
        }

        let context = match perspective {
            Perspective::Aggressive => self.aggressive_view(input),
            Perspective::Conservative => self.conservative_view(input),
            Perspective::Neutral => self.neutral_view(input),
        };
        let context = self.enforce_budget(context, perspective);

        self.cache.lock().insert(key, context.clone());
        context
    }

    /// `(entries, hits)` counters for metrics.
    pub fn cache_stats(&self) -> (usize, u64) {
        (self.cache.lock().len(), *self.hits.lock())
    }

    fn aggressive_view(&self, input: &ProjectionInput) -> String {
        let mut sections = Vec::new();
        if !input.investment_plan.is_empty() {
            sections.push(format!(
                "GROWTH OPPORTUNITIES:\n{}",
                extract_key_points(&input.investment_plan, &GROWTH_KEYWORDS, 400)
            ));
        }
        if !input.market_report.is_empty() {
            sections.push(format!(
                "BULLISH MARKET SIGNALS:\n{}",
                extract_matching_lines(&input.market_report, bullish_patterns(), 5, "No clear bullish signals detected")
            ));
        }
        if !input.news_report.is_empty() {
            sections.push(format!(
                "POSITIVE CATALYSTS:\n{}",
                extract_headlines(&input.news_report, positive_patterns(), 3, "No significant positive catalysts")
            ));
        }
        if !input.fundamentals_report.is_empty() {
            sections.push(format!(
                "GROWTH FUNDAMENTALS:\n{}",
                extract_matching_lines(&input.fundamentals_report, growth_metric_patterns(), 6, "Limited growth metrics available")
            ));
        }
        if !input.sentiment_report.is_empty() {
            sections.push(format!(
                "BULLISH SENTIMENT:\n{}",
                extract_keyword_lines(&input.sentiment_report, &["bullish", "buy", "positive", "optimistic", "strong"], 3, "Mixed sentiment signals")
            ));
        }
        sections.join("\n\n")
    }

    fn conservative_view(&self, input: &ProjectionInput) -> String {
        let mut sections = Vec::new();
        if !input.investment_plan.is_empty() {
            sections.push(format!(
                "RISK CONSIDERATIONS:\n{}",
                extract_key_points(&input.investment_plan, &RISK_KEYWORDS, 400)
            ));
        }
        if !input.market_report.is_empty() {
            sections.push(format!(
                "MARKET RISK INDICATORS:\n{}",
                extract_matching_lines(&input.market_report, bearish_patterns(), 5, "No clear risk signals detected")
            ));
        }
        if !input.news_report.is_empty() {
            sections.push(format!(
                "RISK CATALYSTS:\n{}",
                extract_headlines(&input.news_report, negative_patterns(), 3, "No significant risk catalysts")
            ));
        }
        if !input.fundamentals_report.is_empty() {
            sections.push(format!(
                "FINANCIAL RISKS:\n{}",
                extract_matching_lines(&input.fundamentals_report, risk_metric_patterns(), 6, "Limited risk metrics available")
            ));
        }
        if !input.sentiment_report.is_empty() {
            sections.push(format!(
                "BEARISH SENTIMENT:\n{}",
                extract_keyword_lines(&input.sentiment_report, &["bearish", "sell", "negative", "pessimistic", "weak"], 3, "Limited bearish signals")
            ));
        }
        sections.join("\n\n")
    }

    fn neutral_view(&self, input: &ProjectionInput) -> String {
        let mut sections = Vec::new();
        if !input.investment_plan.is_empty() {
            sections.push(format!(
                "INVESTMENT THESIS:\n{}",
                extract_summary(&input.investment_plan, 300)
            ));
        }
        if !input.market_report.is_empty() {
            sections.push(format!(
                "MARKET OVERVIEW:\n{}",
                extract_keyword_lines(&input.market_report, &["overview", "summary", "trend", "price", "volume", "signal"], 4, "Limited market data")
            ));
        }
        if !input.news_report.is_empty() {
            sections.push(format!("NEWS SUMMARY:\n{}", news_summary(&input.news_report)));
        }
        if !input.fundamentals_report.is_empty() {
            sections.push(format!(
                "VALUATION SUMMARY:\n{}",
                extract_keyword_lines(&input.fundamentals_report, &["p/e", "p/b", "ev", "dividend", "market cap"], 5, "Limited valuation data")
            ));
        }
        if !input.sentiment_report.is_empty() {
            sections.push(format!(
                "SENTIMENT OVERVIEW:\n{}",
                extract_keyword_lines(&input.sentiment_report, &["score", "average", "overall", "summary", "sentiment"], 3, "Neutral sentiment signals")
            ));
        }
        sections.join("\n\n")
    }

    fn enforce_budget(&self, context: String, perspective: Perspective) -> String {
        if context.chars().count() <= self.char_budget {
            return context;
        }
        tracing::warn!(
            %perspective,
            chars = context.chars().count(),
            budget = self.char_budget,
            "projection over budget; truncating"
        );
        let head: String = context.chars().take(self.char_budget).collect();
        format!("{head}{BUDGET_MARKER}")
    }
}

const GROWTH_KEYWORDS: [&str; 8] = [
    "growth", "upside", "potential", "opportunity", "expansion", "increase", "strong", "beat",
];

const RISK_KEYWORDS: [&str; 8] = [
    "risk", "downside", "concern", "threat", "weakness", "decline", "miss", "problem",
];

fn bullish_patterns() -> RegexSet {
    RegexSet::new([
        r"(?i)bullish.*signal",
        r"(?i)uptrend.*continue",
        r"(?i)support.*strong",
        r"(?i)breakout.*confirm",
        r"(?i)momentum.*positive",
        r"(?i)oversold.*bounce",
        r"(?i)higher.*high",
        r"(?i)golden.*cross",
        r"(?i)buy.*signal",
        r"(?i)bullish.*outlook",
        r"(?i)upward.*trend",
    ])
    .expect("bullish patterns compile")
}

fn bearish_patterns() -> RegexSet {
    RegexSet::new([
        r"(?i)bearish.*signal",
        r"(?i)downtrend.*confirm",
        r"(?i)resistance.*strong",
        r"(?i)breakdown.*pattern",
        r"(?i)momentum.*negative",
        r"(?i)overbought.*risk",
        r"(?i)lower.*low",
        r"(?i)death.*cross",
        r"(?i)sell.*signal",
        r"(?i)bearish.*outlook",
        r"(?i)downward.*trend",
    ])
    .expect("bearish patterns compile")
}

fn positive_patterns() -> RegexSet {
    RegexSet::new([
        r"(?i)sentiment: positive",
        r"(?i)upgrade",
        r"(?i)beat.*expect",
        r"(?i)strong.*result",
        r"(?i)growth.*accelerat",
        r"(?i)positive.*outlook",
        r"(?i)exceeds.*estimate",
        r"(?i)buy.*rating",
        r"(?i)target.*raise",
    ])
    .expect("positive patterns compile")
}

fn negative_patterns() -> RegexSet {
    RegexSet::new([
        r"(?i)sentiment: negative",
        r"(?i)downgrade",
        r"(?i)miss.*expect",
        r"(?i)weak.*result",
        r"(?i)decline.*revenue",
        r"(?i)negative.*outlook",
        r"(?i)below.*estimate",
        r"(?i)sell.*rating",
        r"(?i)target.*cut",
    ])
    .expect("negative patterns compile")
}

fn growth_metric_patterns() -> RegexSet {
    RegexSet::new([
        r"(?i)revenue growth",
        r"(?i)margin.*expansion",
        r"(?i)roe",
        r"(?i)earnings.*growth",
        r"(?i)free cash flow",
        r"(?i)p/e ratio",
        r"(?i)market cap",
    ])
    .expect("growth metric patterns compile")
}

fn risk_metric_patterns() -> RegexSet {
    RegexSet::new([
        r"(?i)debt.*equity",
        r"(?i)current.*ratio",
        r"(?i)cash",
        r"(?i)debt",
        r"(?i)liquidity",
        r"(?i)bankruptcy",
        r"(?i)default",
        r"(?i)credit.*rating",
    ])
    .expect("risk metric patterns compile")
}

/// Sentences containing any focus keyword, capped by characters.
fn extract_key_points(text: &str, keywords: &[&str], max_chars: usize) -> String {
    let mut selected: Vec<&str> = Vec::new();
    let mut total = 0usize;

    for sentence in text.split_inclusive(['.', '!', '?']) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }
        let lower = sentence.to_lowercase();
        if keywords.iter().any(|k| lower.contains(k)) {
            total += sentence.len() + 1;
            selected.push(sentence);
            if total > max_chars {
                break;
            }
        }
    }

    let joined = selected.join(" ");
    if joined.is_empty() {
        text.chars().take(max_chars).collect()
    } else {
        joined.chars().take(max_chars).collect()
    }
}

/// Lines matching any pattern in the set, joined with ` | `.
fn extract_matching_lines(text: &str, patterns: RegexSet, cap: usize, fallback: &str) -> String {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && patterns.is_match(line))
        .take(cap)
        .collect();
    if lines.is_empty() {
        fallback.to_string()
    } else {
        lines.join(" | ")
    }
}

/// Headline part (before `|`) of lines matching any pattern.
fn extract_headlines(text: &str, patterns: RegexSet, cap: usize, fallback: &str) -> String {
    let headlines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && patterns.is_match(line))
        .map(|line| line.split('|').next().unwrap_or(line).trim())
        .take(cap)
        .collect();
    if headlines.is_empty() {
        fallback.to_string()
    } else {
        headlines.join(" | ")
    }
}

/// Lines containing any of the case-insensitive keywords.
fn extract_keyword_lines(text: &str, keywords: &[&str], cap: usize, fallback: &str) -> String {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| {
            if line.is_empty() {
                return false;
            }
            let lower = line.to_lowercase();
            keywords.iter().any(|k| lower.contains(k))
        })
        .take(cap)
        .collect();
    if lines.is_empty() {
        fallback.to_string()
    } else {
        lines.join(" | ")
    }
}

/// Conclusion/summary paragraph, or the first paragraph as fallback.
fn extract_summary(text: &str, max_chars: usize) -> String {
    let lower = text.to_lowercase();
    for marker in ["conclusion", "summary", "recommendation", "final"] {
        if let Some(pos) = lower.find(marker) {
            let tail = &text[pos..];
            let section = tail.split("\n\n").next().unwrap_or(tail);
            return section.chars().take(max_chars).collect();
        }
    }
    let first = text.split("\n\n").next().unwrap_or(text);
    first.chars().take(max_chars).collect()
}

/// Sentiment distribution plus a couple of key headlines.
fn news_summary(news_report: &str) -> String {
    let lower = news_report.to_lowercase();
    let positive = lower.matches("sentiment: positive").count();
    let negative = lower.matches("sentiment: negative").count();
    let neutral = lower.matches("sentiment: neutral").count();

    let mut summary = format!(
        "News Sentiment Distribution: {positive} Positive, {neutral} Neutral, {negative} Negative"
    );

    let headlines: Vec<&str> = news_report
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && (line.contains('.') || line.contains("Source:")))
        .take(2)
        .collect();
    if !headlines.is_empty() {
        summary.push_str(&format!(" | Key Headlines: {}", headlines.join(" | ")));
    }

    summary.chars().take(400).collect()
}

fn cache_key(perspective: Perspective, input: &ProjectionInput) -> String {
    let mut hasher = DefaultHasher::new();
    for field in [
        &input.investment_plan,
        &input.trader_decision,
        &input.market_report,
        &input.sentiment_report,
        &input.news_report,
        &input.fundamentals_report,
    ] {
        field.hash(&mut hasher);
    }
    format!("{}_{:016x}", perspective.as_str(), hasher.finish())
}
