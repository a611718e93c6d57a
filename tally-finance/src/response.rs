//! Parse the service's free-text reply into a [`Classification`].
//!
//! Models wrap JSON in code fences or chat around it, so the reply is
//! narrowed to the outermost `{...}` before decoding. The category must be
//! one of the taxonomy labels; nothing else is trusted.

use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use tally_core::{Category, Classification, Error, Result};

/// Confidence assumed when the reply omits one
const DEFAULT_CONFIDENCE: f64 = 0.5;

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[A-Za-z]*").expect("valid fence regex"));

#[derive(Deserialize)]
struct Reply {
    category: String,
    confidence: Option<f64>,
}

pub fn parse_reply(reply: &str) -> Result<Classification> {
    let text = FENCE_RE.replace_all(reply, "");
    let text = text.trim();

    let (start, end) = (text.find('{'), text.rfind('}'));
    let (label, confidence) = match (start, end) {
        (Some(s), Some(e)) if s < e => {
            let reply: Reply = serde_json::from_str(&text[s..=e]).map_err(|e| {
                Error::InvalidResponse(format!("invalid JSON ({e}) | Raw: {}", truncate(text)))
            })?;
            (reply.category, reply.confidence)
        }
        // Bare label, e.g. `Food`
        _ => (text.trim_matches(|c: char| c == '"' || c == '.').to_string(), None),
    };

    let category = Category::from_taxonomy(&label).ok_or_else(|| {
        Error::InvalidResponse(format!("category {label:?} is not in the taxonomy"))
    })?;

    let confidence = confidence
        .filter(|c| c.is_finite())
        .unwrap_or(DEFAULT_CONFIDENCE);
    Ok(Classification::new(category, confidence))
}

fn truncate(s: &str) -> String {
    match s.char_indices().nth(200) {
        Some((i, _)) => format!("{}...", &s[..i]),
        None => s.to_string(),
    }
}
