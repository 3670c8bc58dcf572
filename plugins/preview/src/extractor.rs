//! Best-effort recovery of the `getInfo()` object from extension source
//!
//! This is not a JavaScript parser. It locates `getInfo() { ... return { ... }`,
//! cuts the returned object out with a brace scan that skips quoted strings,
//! rewrites the common JS-object spellings into JSON and hands the result to
//! `serde_json`. Template literals containing braces and regex literals
//! containing quotes are not supported.

use engine_bridge_core::{BridgeError, Language, Text};
use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::{
    BlockDescriptor, ExtensionDescriptor, DEFAULT_COLOR1, DEFAULT_COLOR2, DEFAULT_EXTENSION_ID,
};

/// Why a source text produced no descriptor
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("no getInfo() method found")]
    MissingGetInfo,

    #[error("getInfo() has no `return {{` statement")]
    MissingReturn,

    #[error("unbalanced braces in the getInfo() return value")]
    Unbalanced,

    #[error("normalized object is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected shape: {0}")]
    Shape(String),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl From<ExtractError> for BridgeError {
    fn from(err: ExtractError) -> Self {
        BridgeError::extraction(err.to_string())
    }
}

/// Extract a descriptor, or nothing if the source can't be understood
pub fn extract(source: &str, language: Language) -> Option<ExtensionDescriptor> {
    match try_extract(source, language) {
        Ok(descriptor) => {
            tracing::debug!(
                "Extracted extension {} with {} blocks",
                descriptor.id,
                descriptor.blocks.len()
            );
            Some(descriptor)
        }
        Err(ExtractError::MissingGetInfo) => {
            tracing::debug!("Source has no getInfo() method");
            None
        }
        Err(e) => {
            tracing::warn!("Failed to extract extension info: {}", e);
            None
        }
    }
}

/// Extract a descriptor, reporting the failure reason
pub fn try_extract(source: &str, language: Language) -> Result<ExtensionDescriptor, ExtractError> {
    let object = locate_info_object(source)?;
    let json = normalize(object)?;
    let value: Value = serde_json::from_str(&json)?;
    build_descriptor(value, language)
}

/// Slice of `source` holding the object literal returned by `getInfo()`
pub fn locate_info_object(source: &str) -> Result<&str, ExtractError> {
    let get_info = Regex::new(r"getInfo\s*\(\s*\)\s*\{")?;
    let returns = Regex::new(r"return\s*\{")?;

    let after_get_info = get_info
        .find(source)
        .ok_or(ExtractError::MissingGetInfo)?
        .end();

    let return_match = returns
        .find(&source[after_get_info..])
        .ok_or(ExtractError::MissingReturn)?;

    // The match ends just past the opening brace
    let open = after_get_info + return_match.end() - 1;
    let close = matching_brace(source, open).ok_or(ExtractError::Unbalanced)?;

    Ok(&source[open..=close])
}

/// Byte index of the brace closing the one at `open`, skipping quoted strings
pub fn matching_brace(source: &str, open: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    if bytes.get(open) != Some(&b'{') {
        return None;
    }

    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'"' | b'\'') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }

    None
}

/// Piece of the object literal, either code or a complete string literal
enum Segment<'a> {
    Code(&'a str),
    Quoted { quote: char, body: &'a str },
}

fn split_segments(object: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut code_start = 0;
    let mut chars = object.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if c != '"' && c != '\'' {
            continue;
        }

        if code_start < start {
            segments.push(Segment::Code(&object[code_start..start]));
        }

        let mut end = object.len();
        while let Some((i, inner)) = chars.next() {
            if inner == '\\' {
                chars.next();
            } else if inner == c {
                end = i;
                break;
            }
        }

        let body_end = end.min(object.len());
        segments.push(Segment::Quoted {
            quote: c,
            body: &object[start + 1..body_end],
        });
        code_start = (end + 1).min(object.len());
    }

    if code_start < object.len() {
        segments.push(Segment::Code(&object[code_start..]));
    }

    segments
}

/// Rewrite a JS object literal into JSON text
///
/// Steps, applied outside string literals: `Ns.BlockType.X` and
/// `Ns.ArgumentType.X` become `"X"`, bare keys get quoted, single-quoted
/// strings become double-quoted and trailing commas are dropped.
pub fn normalize(object: &str) -> Result<String, ExtractError> {
    let enum_member = Regex::new(r"\b[A-Za-z_$][\w$]*\.(?:BlockType|ArgumentType)\.(\w+)")?;
    let bare_key = Regex::new(r"([{,]\s*)([\w$]+)(\s*:)")?;
    let trailing_comma = Regex::new(r",(\s*[}\]])")?;

    let mut json = String::with_capacity(object.len() + 64);
    let mut pending_code = String::new();

    let flush = |code: &mut String, out: &mut String| {
        let step = enum_member.replace_all(code, "\"$1\"");
        let step = bare_key.replace_all(&step, "$1\"$2\"$3");
        out.push_str(&step);
        code.clear();
    };

    for segment in split_segments(object) {
        match segment {
            Segment::Code(code) => pending_code.push_str(code),
            Segment::Quoted { quote, body } => {
                flush(&mut pending_code, &mut json);
                json.push('"');
                if quote == '"' {
                    json.push_str(body);
                } else {
                    json.push_str(&requote_single(body));
                }
                json.push('"');
            }
        }
    }
    flush(&mut pending_code, &mut json);

    Ok(strip_trailing_commas(&trailing_comma, &json))
}

/// Body of a single-quoted JS string, re-escaped for a double-quoted one
fn requote_single(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('\'') => out.push('\''),
                Some(escaped) => {
                    out.push('\\');
                    out.push(escaped);
                }
                None => out.push('\\'),
            },
            '"' => out.push_str("\\\""),
            other => out.push(other),
        }
    }
    out
}

/// Trailing commas only ever sit in code, so string bodies are left alone
fn strip_trailing_commas(pattern: &Regex, json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut last = 0;
    for segment_range in code_ranges(json) {
        out.push_str(&json[last..segment_range.start]);
        out.push_str(&pattern.replace_all(&json[segment_range.clone()], "$1"));
        last = segment_range.end;
    }
    out.push_str(&json[last..]);
    out
}

/// Ranges of `json` lying outside double-quoted strings
fn code_ranges(json: &str) -> Vec<std::ops::Range<usize>> {
    let mut ranges = Vec::new();
    let mut start = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in json.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
                start = i + 1;
            }
        } else if c == '"' {
            ranges.push(start..i);
            in_string = true;
        }
    }

    if !in_string {
        ranges.push(start..json.len());
    }

    ranges
}

fn build_descriptor(value: Value, language: Language) -> Result<ExtensionDescriptor, ExtractError> {
    let Value::Object(info) = value else {
        return Err(ExtractError::Shape("getInfo() must return an object".into()));
    };

    let blocks = match info.get("blocks") {
        Some(Value::Array(entries)) => entries
            .iter()
            .filter(|entry| entry.is_object())
            .map(|entry| {
                serde_json::from_value::<BlockDescriptor>(entry.clone())
                    .map_err(|e| ExtractError::Shape(format!("block: {}", e)))
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(other) if is_truthy(other) => {
            return Err(ExtractError::Shape("`blocks` must be an array".into()));
        }
        _ => Vec::new(),
    };

    let menus = match info.get("menus") {
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<IndexMap<_, _>>(),
        Some(other) if is_truthy(other) => {
            return Err(ExtractError::Shape("`menus` must be an object".into()));
        }
        _ => IndexMap::new(),
    };

    Ok(ExtensionDescriptor {
        id: text_or(&info, "id", DEFAULT_EXTENSION_ID),
        name: text_or(&info, "name", language.text(Text::UnnamedExtension)),
        color1: text_or(&info, "color1", DEFAULT_COLOR1),
        color2: text_or(&info, "color2", DEFAULT_COLOR2),
        blocks,
        menus,
    })
}

/// JS truthiness of a JSON value
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn text_or(info: &Map<String, Value>, key: &str, default: &str) -> String {
    match info.get(key) {
        Some(value) if is_truthy(value) => match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
        _ => default.to_string(),
    }
}
