//! Tolerant extraction of a JSON document from free-form LLM response text.
//!
//! Chat models rarely return pure JSON: the payload is usually wrapped in
//! prose, markdown fences, or both, and the surrounding text may itself
//! contain stray braces (emoticons, code fragments). Three strategies are
//! tried in fixed priority order and the first success wins.

use crate::types::{KEY_EXPLANATION, KEY_STEPS};

/// Extract the best-candidate JSON document from `response`.
///
/// Returns a borrowed sub-slice of the input, or `None` when no strategy
/// matched — in which case the caller must not attempt to parse.
pub fn extract_json(response: &str) -> Option<&str> {
    fenced_block(response)
        .or_else(|| key_anchored(response))
        .or_else(|| outermost_braces(response))
}

/// Strategy 1: a markdown code fence, optionally tagged `json`.
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let mut body = &text[open + 3..];
    let tagged = body
        .trim_start()
        .get(..4)
        .map_or(false, |tag| tag.eq_ignore_ascii_case("json"));
    if tagged {
        // Skip the language tag line so it does not end up in the payload.
        let newline = body.find('\n')?;
        body = &body[newline + 1..];
    }
    let close = body.find("```")?;
    Some(body[..close].trim())
}

/// Strategy 2: anchor on the schema's own key names and balance braces from
/// there. This survives unbalanced brace noise elsewhere in the prose because
/// only the object that actually carries both keys is scanned.
fn key_anchored(text: &str) -> Option<&str> {
    let steps_key = format!("\"{}\"", KEY_STEPS);
    let explanation_key = format!("\"{}\"", KEY_EXPLANATION);
    let anchor = text.find(&steps_key)?.min(text.find(&explanation_key)?);

    // Walk backward from the anchor to the nearest unescaped '{'.
    let bytes = text.as_bytes();
    let mut start = None;
    let mut i = anchor;
    while i > 0 {
        i -= 1;
        if bytes[i] == b'{' && (i == 0 || bytes[i - 1] != b'\\') {
            start = Some(i);
            break;
        }
    }
    let start = start?;

    // Walk forward balancing braces; the document ends when depth returns
    // to zero.
    let mut depth = 1usize;
    for (offset, b) in bytes[start + 1..].iter().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 2]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Strategy 3: last resort, first `{` through last `}`.
fn outermost_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}
