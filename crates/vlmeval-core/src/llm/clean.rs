//! Normalization of completion text.

/// Conversational lead-ins some models put before the actual answer.
const PREAMBLES: [&str; 5] = ["Okay, here's", "Here's", "Here is", "The answer is:", "Sure,"];

/// How far into the text the lead-in's colon may appear.
const PREAMBLE_WINDOW: usize = 100;

/// Strip a conversational preamble ending in ':' and surrounding whitespace.
///
/// Only text that starts with a known lead-in and has a colon within the
/// first 100 characters is cut; everything else is just trimmed.
pub fn clean_output(text: &str) -> String {
    let trimmed = text.trim();
    let lower = trimmed.to_lowercase();
    let has_preamble = PREAMBLES
        .iter()
        .any(|p| lower.starts_with(&p.to_lowercase()));

    if has_preamble {
        if let Some((idx, _)) = trimmed
            .char_indices()
            .take(PREAMBLE_WINDOW)
            .find(|(_, c)| *c == ':')
        {
            return trimmed[idx + 1..].trim().to_string();
        }
    }
    trimmed.to_string()
}
