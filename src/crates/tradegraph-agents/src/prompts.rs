//! Prompt templates for every agent role
//!
//! Templates are plain format functions; the word-limit clause is injected
//! at construction so response length is controlled at the prompt level
//! before any post-hoc truncation applies.

use crate::context::Perspective;
use crate::tokens::word_limit_clause;
use crate::tools::AnalystKind;

/// Initial message seeded into every analyst channel by the dispatcher.
pub fn dispatch_message(ticker: &str, trade_date: &str) -> String {
    format!(
        "Begin comprehensive analysis for {ticker} on {trade_date}.\n\n\
         You are part of a parallel analysis team. Conduct your specialized \
         analysis independently:\n\
         - Use your dedicated tools to gather data\n\
         - Provide thorough analysis within your domain\n\
         - Generate a complete report with actionable insights\n\n\
         Company: {ticker}\nAnalysis Date: {trade_date}"
    )
}

/// System prompt for an analyst, scoped to its toolkit.
pub fn analyst_system(
    kind: AnalystKind,
    ticker: &str,
    trade_date: &str,
    tool_names: &[String],
    word_limit: usize,
) -> String {
    let (role, focus) = match kind {
        AnalystKind::Market => (
            "market analyst",
            "price action, technical indicators, volume, support/resistance levels and insider signals",
        ),
        AnalystKind::Social => (
            "social media analyst",
            "retail sentiment across social platforms, discussion volume and sentiment shifts",
        ),
        AnalystKind::News => (
            "news analyst",
            "company and macro news flow, catalysts, analyst actions and guidance changes",
        ),
        AnalystKind::Fundamentals => (
            "fundamentals analyst",
            "financial statements, growth, margins, balance-sheet strength and insider activity",
        ),
    };

    format!(
        "You are the {role} on an equity research team analyzing {ticker} for {trade_date}.\n\
         Focus on {focus}.\n\n\
         Available tools: {tools}.\n\
         Fetch data with your tools before writing. When you have enough data, \
         write your final report: a clear, structured analysis with concrete \
         numbers and an explicit takeaway. Do not fabricate data; if a source \
         returned nothing, say so.\n{limit}",
        tools = tool_names.join(", "),
        limit = word_limit_clause(word_limit),
    )
}

/// Bull researcher turn.
pub fn bull_prompt(
    reports: &str,
    debate_history: &str,
    judge_feedback: &str,
    word_limit: usize,
) -> String {
    let continuation = if debate_history.is_empty() {
        String::new()
    } else {
        format!(
            "\n\nDebate so far:\n{debate_history}\n\n\
             You must: (1) address the bear's strongest prior point, \
             (2) incorporate the judge's feedback: {feedback}, \
             (3) advance your thesis with new evidence rather than repeating it.",
            feedback = if judge_feedback.is_empty() { "none yet" } else { judge_feedback },
        )
    };

    format!(
        "You are the bull researcher arguing FOR investing. Build an \
         evidence-based case from the analyst reports.\n\nAnalyst reports:\n{reports}\
         {continuation}\n\n{limit}",
        limit = word_limit_clause(word_limit),
    )
}

/// Bear researcher turn.
pub fn bear_prompt(
    reports: &str,
    debate_history: &str,
    judge_feedback: &str,
    word_limit: usize,
) -> String {
    let continuation = if debate_history.is_empty() {
        String::new()
    } else {
        format!(
            "\n\nDebate so far:\n{debate_history}\n\n\
             You must: (1) address the bull's strongest prior point, \
             (2) incorporate the judge's feedback: {feedback}, \
             (3) advance your thesis with new evidence rather than repeating it.",
            feedback = if judge_feedback.is_empty() { "none yet" } else { judge_feedback },
        )
    };

    format!(
        "You are the bear researcher arguing AGAINST investing. Build an \
         evidence-based case from the analyst reports.\n\nAnalyst reports:\n{reports}\
         {continuation}\n\n{limit}",
        limit = word_limit_clause(word_limit),
    )
}

/// Debate judge verdict request; the four-line format is parsed downstream.
pub fn judge_prompt(debate_history: &str, round: usize, word_limit: usize) -> String {
    format!(
        "You are the debate judge evaluating round {round} of a bull/bear \
         investment debate.\n\nDebate history:\n{debate_history}\n\n\
         Evaluate these arguments and determine if consensus has been reached \
         for making an investment decision. Respond in exactly this format:\n\
         CONSENSUS REACHED: Yes/No\n\
         UNRESOLVED POINTS: [list the specific disagreements that remain]\n\
         NEXT ROUND FOCUS: [specific areas to explore if consensus not reached]\n\
         QUALITY SCORE: [1-10 rating of argument quality]\n\n{limit}",
        limit = word_limit_clause(word_limit),
    )
}

/// Research manager synthesis over the concluded debate.
pub fn research_manager_prompt(reports: &str, debate_history: &str, judge_decision: &str, word_limit: usize) -> String {
    format!(
        "You are the research manager. The bull/bear debate has concluded.\n\n\
         Analyst reports:\n{reports}\n\nDebate:\n{debate_history}\n\n\
         Judge's verdict:\n{judge_decision}\n\n\
         Synthesize a single investment plan: thesis, key evidence from both \
         sides, decision lean, and conditions that would change your view.\n\
         {limit}",
        limit = word_limit_clause(word_limit),
    )
}

/// Trader plan over the investment plan.
pub fn trader_prompt(investment_plan: &str, reports: &str, word_limit: usize) -> String {
    format!(
        "You are the trader. Turn the investment plan into an executable \
         trade.\n\nInvestment plan:\n{investment_plan}\n\nAnalyst reports:\n{reports}\n\n\
         Your plan must state explicitly: ACTION (buy/sell/hold), ENTRY price \
         or zone, STOP LOSS, TAKE PROFIT, POSITION SIZE (% of portfolio), and \
         CONFIDENCE (low/medium/high) with one line of reasoning each.\n{limit}",
        limit = word_limit_clause(word_limit),
    )
}

/// One risk debator's focused turn over its projected context.
pub fn risk_debator_prompt(perspective: Perspective, context: &str, word_limit: usize) -> String {
    let (stance, asks) = match perspective {
        Perspective::Aggressive => (
            "As the Aggressive Risk Analyst, champion high-reward opportunities while acknowledging risks.",
            "1. High-reward opportunities and growth potential\n\
             2. Why the risks are worth taking\n\
             3. Potential upside scenarios\n\
             4. Risk mitigation strategies for aggressive positions",
        ),
        Perspective::Conservative => (
            "As the Conservative Risk Analyst, emphasize capital preservation and risk mitigation.",
            "1. Capital preservation strategies\n\
             2. Potential downside risks and worst-case scenarios\n\
             3. Risk mitigation and hedging strategies\n\
             4. Safe position sizing recommendations",
        ),
        Perspective::Neutral => (
            "As the Neutral Risk Analyst, provide a balanced perspective weighing both risks and opportunities.",
            "1. Objective risk-reward analysis\n\
             2. Balanced position sizing recommendations\n\
             3. Conditional strategies based on market scenarios\n\
             4. Data-driven recommendations without bias",
        ),
    };

    format!(
        "{stance}\n\n{context}\n\nProvide your perspective emphasizing:\n{asks}\n\n\
         Be concise. Focus on actionable insights.\n{limit}",
        limit = word_limit_clause(word_limit),
    )
}

/// Risk judge's final decision request.
pub fn risk_judge_prompt(
    combined_history: &str,
    trader_plan: &str,
    degraded: bool,
    word_limit: usize,
) -> String {
    let degraded_note = if degraded {
        "\nNote: one or more risk perspectives were unavailable (cancelled before \
         completion). State the reduced confidence this implies in your decision.\n"
    } else {
        ""
    };

    format!(
        "You are the risk judge. Three risk analysts have debated the trader's \
         plan.\n\nTrader plan:\n{trader_plan}\n\nRisk debate:\n{combined_history}\n\
         {degraded_note}\n\
         Render the final trade decision: BUY, SELL, or HOLD, with position \
         sizing guidance and the decisive risk factors.\n{limit}",
        limit = word_limit_clause(word_limit),
    )
}

/// System prompt for the signal processor's quick model.
pub const SIGNAL_SYSTEM_PROMPT: &str =
    "You are an efficient assistant designed to analyze paragraphs or financial \
     reports provided by a group of analysts. Your task is to extract the \
     investment decision: SELL, BUY, or HOLD. Provide only the extracted \
     decision (SELL, BUY, or HOLD) as your output, without adding any \
     additional text or information.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyst_system_lists_tools_and_limit() {
        let prompt = analyst_system(
            AnalystKind::Market,
            "AAPL",
            "2025-01-02",
            &["price_history".to_string(), "technical_indicators".to_string()],
            300,
        );
        assert!(prompt.contains("market analyst"));
        assert!(prompt.contains("price_history, technical_indicators"));
        assert!(prompt.contains("MAX WORDS: 300"));
    }

    #[test]
    fn test_bull_prompt_first_round_has_no_continuation() {
        let prompt = bull_prompt("reports here", "", "", 250);
        assert!(!prompt.contains("Debate so far"));
        let with_history = bull_prompt("reports here", "Bull: x\nBear: y", "focus valuation", 250);
        assert!(with_history.contains("Debate so far"));
        assert!(with_history.contains("focus valuation"));
    }

    #[test]
    fn test_judge_prompt_mandates_verdict_format() {
        let prompt = judge_prompt("history", 2, 200);
        assert!(prompt.contains("CONSENSUS REACHED: Yes/No"));
        assert!(prompt.contains("QUALITY SCORE:"));
    }

    #[test]
    fn test_risk_judge_prompt_mentions_degraded_mode() {
        let degraded = risk_judge_prompt("history", "plan", true, 300);
        assert!(degraded.contains("reduced confidence"));
        let normal = risk_judge_prompt("history", "plan", false, 300);
        assert!(!normal.contains("reduced confidence"));
    }
}
