//! Extraction of the answer part of a decoded generation.
//!
//! Prompts are expected in the form `"<question> Réponse :"`. The marker
//! search runs over the whole decoded text, so a prompt that contains the
//! marker before its end extracts from the wrong place.

pub const ANSWER_MARKER: &str = "Réponse :";

/// Tie-break order:
/// 1. text after the last `ANSWER_MARKER`, trimmed;
/// 2. otherwise the text after the first `prompt.chars().count()` characters, trimmed;
/// 3. if that is empty, the whole decoded text unchanged.
pub fn extract_answer(decoded: &str, prompt: &str) -> String {
    if let Some(idx) = decoded.rfind(ANSWER_MARKER) {
        return decoded[idx + ANSWER_MARKER.len()..].trim().to_string();
    }

    let prompt_chars = prompt.chars().count();
    let continuation = match decoded.char_indices().nth(prompt_chars) {
        Some((offset, _)) => decoded[offset..].trim(),
        None => "",
    };

    if continuation.is_empty() {
        decoded.to_string()
    } else {
        continuation.to_string()
    }
}

/// First `max_chars` characters, for log lines.
pub fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((offset, _)) => &text[..offset],
        None => text,
    }
}
