//! Token counting and response-length control
//!
//! One tokenizer per process: the encoder is expensive to build, so it is
//! initialized lazily and shared. Truncation comes in two shapes used by
//! different kernels:
//!
//! - **Middle truncation** (social outputs): keep head and tail, elide the
//!   middle. Social payloads front-load the summary and end with the data
//!   table, so both ends carry signal.
//! - **End truncation** (risk perspectives): keep the head, mark the cut.
//!
//! Analyst report fields are preserved in full unless they exceed the
//! safety cap (~8,000 tokens), in which case the cut is logged.

use std::sync::OnceLock;
use tiktoken_rs::CoreBPE;

/// Elision marker inserted by middle truncation.
pub const ELISION_MARKER: &str = "\n[... truncated ...]\n";

/// Terminal marker appended by end truncation.
pub const TERMINAL_MARKER: &str = "\n[truncated]";

/// Safety cap for analyst report fields, in tokens.
pub const REPORT_TOKEN_CAP: usize = 8_000;

static ENCODER: OnceLock<CoreBPE> = OnceLock::new();

/// Process-wide cached encoder.
fn encoder() -> &'static CoreBPE {
    ENCODER.get_or_init(|| tiktoken_rs::cl100k_base().expect("cl100k_base tokenizer unavailable"))
}

/// Count tokens in a text with the shared encoder.
pub fn count_tokens(text: &str) -> usize {
    encoder().encode_with_special_tokens(text).len()
}

/// Keep the first `max_chars / 2` and last `max_chars / 4` characters,
/// eliding the middle. Returns the input unchanged when it fits.
pub fn truncate_middle(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head_len = max_chars / 2;
    let tail_len = max_chars / 4;

    let head: String = text.chars().take(head_len).collect();
    let tail: String = {
        let chars: Vec<char> = text.chars().collect();
        chars[chars.len() - tail_len..].iter().collect()
    };

    format!("{head}{ELISION_MARKER}{tail}")
}

/// Keep the first `max_chars` characters, appending a terminal marker when
/// anything was cut.
pub fn truncate_end(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{head}{TERMINAL_MARKER}")
}

/// Enforce the report safety cap; logs when a report is cut.
pub fn enforce_report_cap(report: String, field: &str) -> String {
    let tokens = count_tokens(&report);
    if tokens <= REPORT_TOKEN_CAP {
        return report;
    }
    // Approximate 4 chars per token when cutting back to the cap.
    let max_chars = REPORT_TOKEN_CAP * 4;
    tracing::warn!(field, tokens, cap = REPORT_TOKEN_CAP, "report exceeded safety cap; truncating");
    truncate_end(&report, max_chars)
}

/// Word-limit clause injected into prompt templates.
pub fn word_limit_clause(limit: usize) -> String {
    format!("MAX WORDS: {limit}")
}
