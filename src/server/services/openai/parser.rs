use regex::Regex;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Empty or invalid response")]
    Empty,
    #[error("Could not parse JSON response")]
    Unparseable,
}

/// Extracts a JSON object from raw model output. Four strategies are tried
/// in fixed priority order; the first that yields a value wins. Each
/// strategy is a pure function that declines by returning None, so a failed
/// strategy never prevents the next one from running.
pub fn parse_any(raw: &str) -> Result<Value, ParseError> {
    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return Err(ParseError::Empty);
    }

    let strategies: [fn(&str) -> Option<Value>; 4] = [
        parse_fenced_block,
        parse_direct_object,
        parse_bare_array,
        parse_embedded_object,
    ];

    strategies
        .iter()
        .find_map(|strategy| strategy(cleaned))
        .ok_or(ParseError::Unparseable)
}

/// JSON inside a ```json fenced code block, case-insensitive, spanning lines.
fn parse_fenced_block(text: &str) -> Option<Value> {
    let fence = Regex::new(r"(?is)```json\s*(.*?)\s*```").unwrap();
    let inner = fence.captures(text)?.get(1)?.as_str();
    serde_json::from_str(inner).ok()
}

/// The whole text as a JSON object. Non-object values are declined so the
/// bare-array strategy below gets its chance.
fn parse_direct_object(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text)
        .ok()
        .filter(Value::is_object)
}

/// Models sometimes return a bare array instead of the requested object;
/// wrap it under the expected key.
fn parse_bare_array(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text).ok()? {
        Value::Array(items) if !items.is_empty() => Some(json!({ "qa_resultados": items })),
        _ => None,
    }
}

/// Last resort: the first-to-last brace span anywhere in the text, for
/// models that wrap the JSON in prose.
fn parse_embedded_object(text: &str) -> Option<Value> {
    let braces = Regex::new(r"(?s)\{.*\}").unwrap();
    let span = braces.find(text)?.as_str();
    serde_json::from_str(span).ok()
}
