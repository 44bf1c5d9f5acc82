//! Variable references inside step parameters.
//!
//! * `$name` / `$name.child` as the entire string value: replaced by the
//!   referenced output itself.
//! * `{{name}}` / `{{name.child}}` inside a string: replaced by its text.
//! * A leading `$$` is a literal `$`.

use crate::artifact::Artifact;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference {
    pub name: String,
    pub child: Option<String>,
}

impl Reference {
    /// Text used to look the reference up: `name` or `name.child`.
    pub fn target(&self) -> String {
        match &self.child {
            Some(child) => format!("{}.{}", self.name, child),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.target())
    }
}

/// Letters, digits, `_` and `-`, not starting with a digit or `-`.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn parse_target(s: &str) -> Option<Reference> {
    let (name, child) = match s.split_once('.') {
        Some((name, child)) => (name, Some(child)),
        None => (s, None),
    };
    if !is_identifier(name) || child.map_or(false, |c| !is_identifier(c)) {
        return None;
    }
    Some(Reference {
        name: name.to_string(),
        child: child.map(str::to_string),
    })
}

/// A string that is exactly `$name` or `$name.child`.
pub fn parse_whole(s: &str) -> Option<Reference> {
    if s.starts_with("$$") {
        return None;
    }
    parse_target(s.strip_prefix('$')?)
}

enum Segment<'a> {
    Literal(&'a str),
    Reference(Reference),
}

/// Split a string into literal text and `{{...}}` references.
/// Braces that do not hold a valid target stay literal.
fn segments(s: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest = s;
    while let Some(open) = rest.find("{{") {
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            break;
        };
        match parse_target(after[..close].trim()) {
            Some(reference) => {
                if open > 0 {
                    out.push(Segment::Literal(&rest[..open]));
                }
                out.push(Segment::Reference(reference));
            }
            None => out.push(Segment::Literal(&rest[..open + 2 + close + 2])),
        }
        rest = &after[close + 2..];
    }
    if !rest.is_empty() {
        out.push(Segment::Literal(rest));
    }
    out
}

/// Every reference in a value, searching arrays and objects, in order of appearance.
pub fn scan(value: &Value) -> Vec<Reference> {
    let mut found = Vec::new();
    collect(value, &mut found);
    found
}

fn collect(value: &Value, found: &mut Vec<Reference>) {
    match value {
        Value::String(s) => {
            if let Some(reference) = parse_whole(s) {
                found.push(reference);
            } else {
                for segment in segments(s) {
                    if let Segment::Reference(reference) = segment {
                        found.push(reference);
                    }
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect(item, found)),
        Value::Object(map) => map.values().for_each(|item| collect(item, found)),
        _ => {}
    }
}

pub fn contains_reference(value: &Value) -> bool {
    !scan(value).is_empty()
}

/// Whole-value reference, if the value is one.
pub fn whole_reference(value: &Value) -> Option<Reference> {
    value.as_str().and_then(parse_whole)
}

/// Replace references using `resolve`. Escapes are unescaped in the same pass.
pub fn substitute<E>(
    value: &Value,
    resolve: &mut impl FnMut(&Reference) -> Result<Artifact, E>,
) -> Result<Value, E> {
    match value {
        Value::String(s) => {
            if let Some(reference) = parse_whole(s) {
                return Ok(resolve(&reference)?.reference_value());
            }
            if let Some(escaped) = s.strip_prefix("$$") {
                return Ok(Value::String(format!("${}", escaped)));
            }
            let parts = segments(s);
            if !parts.iter().any(|p| matches!(p, Segment::Reference(_))) {
                return Ok(value.clone());
            }
            let mut text = String::with_capacity(s.len());
            for part in parts {
                match part {
                    Segment::Literal(literal) => text.push_str(literal),
                    Segment::Reference(reference) => {
                        text.push_str(&resolve(&reference)?.interpolation_text())
                    }
                }
            }
            Ok(Value::String(text))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| substitute(item, resolve))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, item) in map {
                out.insert(key.clone(), substitute(item, resolve)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}
