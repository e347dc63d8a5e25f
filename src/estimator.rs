//! Coarse token estimation for admission decisions.
//!
//! The estimate is an admission gate, not a billing oracle: a fixed
//! characters-per-token ratio is enough to decide whether a request may be
//! attempted. The backend-reported actual usage is what gets committed to a
//! sender's daily counter.

use crate::types::Message;

/// Characters per token for the coarse estimate. Matches the rule of thumb
/// used by most hosted inference APIs for English text.
const CHARS_PER_TOKEN: u64 = 4;

/// Estimate the token count of a single piece of text.
///
/// Deterministic, no failure mode: empty or garbage input yields 0, never an
/// error. Rounds up so short non-empty strings count as at least one token.
pub fn estimate(text: &str) -> u64 {
    let chars = text.chars().count() as u64;
    chars.div_ceil(CHARS_PER_TOKEN)
}

/// Sum the projected cost of a multi-message request.
pub fn estimate_messages(messages: &[Message]) -> u64 {
    messages.iter().map(|m| estimate(&m.content)).sum()
}
