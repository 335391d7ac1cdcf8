//! JSON extraction strategies with light repair

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

use super::parser::{ExtractedFields, ExtractionStrategy};
use crate::records::RecordKind;

static FENCED_JSON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[ \t]*(?i:json)[ \t]*\r?\n(.*?)```").expect("valid fence regex")
});

static TRAILING_COMMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").expect("valid trailing comma regex"));

static LINE_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*//.*$").expect("valid comment regex"));

/// Repair common model mistakes: trailing commas and whole-line `//` comments
fn repair_json(input: &str) -> String {
    let result = LINE_COMMENT_RE.replace_all(input, "");
    TRAILING_COMMA_RE.replace_all(&result, "$1").to_string()
}

/// Parse as-is first, then after repair
fn parse_lenient(input: &str) -> Option<Value> {
    serde_json::from_str::<Value>(input)
        .or_else(|_| serde_json::from_str::<Value>(&repair_json(input)))
        .ok()
}

/// The balanced `{...}` starting at byte offset `start`, string-aware
fn balanced_object(input: &str, start: usize) -> Option<&str> {
    let substring = &input[start..];
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in substring.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&substring[..=i]);
                }
            }
            _ => {}
        }
    }

    None
}

fn camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for c in key.chars() {
        if c == '_' || c == '-' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn camel_keys(map: Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in map {
        out.entry(camel_case(&key)).or_insert(value);
    }
    out
}

fn wrapper_names(kind: RecordKind) -> &'static [&'static str] {
    match kind {
        RecordKind::Challenge => &["challenge"],
        RecordKind::Feedback => &["feedback"],
        RecordKind::LetterResponse => &["letterResponse", "letter", "response"],
    }
}

/// Turn a decoded JSON value into record fields.
///
/// Keys are normalized to camelCase, a lone wrapper object named after the
/// record is unwrapped, and letters accept `response` for `content`.
pub(crate) fn into_fields(value: Value, kind: RecordKind) -> Option<ExtractedFields> {
    let Value::Object(map) = value else {
        return None;
    };
    let mut fields = camel_keys(map);

    if fields.len() == 1 {
        let wrapped = fields
            .iter()
            .find(|(key, value)| value.is_object() && wrapper_names(kind).contains(&key.as_str()))
            .map(|(key, _)| key.clone());
        if let Some(Value::Object(inner)) = wrapped.and_then(|key| fields.remove(&key)) {
            fields = camel_keys(inner);
        }
    }

    if let Some(Value::Object(insights)) = fields.remove("insights") {
        fields.insert("insights".to_string(), Value::Object(camel_keys(insights)));
    }

    if kind == RecordKind::LetterResponse && !fields.contains_key("content") {
        if let Some(response) = fields.remove("response") {
            fields.insert("content".to_string(), response);
        }
    }

    Some(fields)
}

/// Reads the first ```json fenced block
#[derive(Debug, Clone, Copy, Default)]
pub struct FencedJsonStrategy;

impl ExtractionStrategy for FencedJsonStrategy {
    fn name(&self) -> &'static str {
        "fenced_json"
    }

    fn extract(&self, raw: &str, kind: RecordKind) -> Option<ExtractedFields> {
        let caps = FENCED_JSON_RE.captures(raw)?;
        let value = parse_lenient(caps.get(1)?.as_str().trim())?;
        into_fields(value, kind)
    }
}

/// Reads the first balanced `{...}` that decodes as a JSON object
#[derive(Debug, Clone, Copy, Default)]
pub struct LooseJsonStrategy;

impl ExtractionStrategy for LooseJsonStrategy {
    fn name(&self) -> &'static str {
        "loose_json"
    }

    fn extract(&self, raw: &str, kind: RecordKind) -> Option<ExtractedFields> {
        raw.match_indices('{')
            .filter_map(|(start, _)| balanced_object(raw, start))
            .find_map(|candidate| match parse_lenient(candidate) {
                Some(value @ Value::Object(_)) => Some(value),
                _ => None,
            })
            .and_then(|value| into_fields(value, kind))
    }
}
