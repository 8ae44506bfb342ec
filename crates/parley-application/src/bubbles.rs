//! Reply splitting and typing-delay pacing.

use parley_core::config::MAX_BUBBLES;
use std::time::Duration;

const PARAGRAPH_BREAK: &str = "\n\n";

/// Length tiers (in characters) at which the typing delay steps up. A bubble
/// shorter than `TIERS[i]` gets fraction `i / TIERS.len()` of the range.
const TIERS: [usize; 4] = [20, 50, 100, 200];

/// Splits a reply into at most [`MAX_BUBBLES`] bubbles on blank lines.
///
/// Blank paragraphs are dropped and surrounding whitespace trimmed. When there
/// are more paragraphs than bubbles, the last bubble carries the remainder
/// rejoined with blank lines.
pub fn split_into_bubbles(text: &str) -> Vec<String> {
    let parts: Vec<&str> = text
        .split(PARAGRAPH_BREAK)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();

    if parts.len() <= MAX_BUBBLES {
        return parts.into_iter().map(str::to_string).collect();
    }

    let (head, tail) = parts.split_at(MAX_BUBBLES - 1);
    let mut bubbles: Vec<String> = head.iter().map(|part| part.to_string()).collect();
    bubbles.push(tail.join(PARAGRAPH_BREAK));
    bubbles
}

/// Typing delay for a bubble, non-decreasing in its character count and
/// clamped to `[min, max]`.
pub fn typing_delay(text: &str, min: Duration, max: Duration) -> Duration {
    let max = max.max(min);
    let length = text.chars().count();
    let tier = TIERS
        .iter()
        .position(|&limit| length < limit)
        .unwrap_or(TIERS.len());

    let span = max - min;
    min + span.mul_f64(tier as f64 / TIERS.len() as f64)
}
