//! Input schema for a model: parameter names, kinds and whether they are required.

use crate::registry::category::ArtifactKind;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Text,
    Integer,
    Number,
    Boolean,
    /// URL of an image (literal or produced by an earlier step).
    Image,
    Video,
    Audio,
    /// One of a fixed set of string values.
    Choice(&'static [&'static str]),
    /// Anything; passed through untouched.
    Json,
}

impl ParamKind {
    /// Whether a whole-value reference to an artifact of `kind` may fill this parameter.
    pub fn accepts(self, kind: ArtifactKind) -> bool {
        match self {
            ParamKind::Image => kind == ArtifactKind::Image,
            ParamKind::Video => kind == ArtifactKind::Video,
            ParamKind::Audio => kind == ArtifactKind::Audio,
            ParamKind::Text => kind == ArtifactKind::Text,
            ParamKind::Json => true,
            ParamKind::Integer | ParamKind::Number | ParamKind::Boolean | ParamKind::Choice(_) => {
                false
            }
        }
    }

    /// Check a literal value. Returns a reason on mismatch.
    pub fn check_literal(self, value: &Value) -> Result<(), String> {
        match self {
            ParamKind::Text | ParamKind::Image | ParamKind::Video | ParamKind::Audio => {
                if value.is_string() {
                    Ok(())
                } else {
                    Err(format!("must be a string, got {}", json_type(value)))
                }
            }
            ParamKind::Integer => {
                if value.is_i64() || value.is_u64() || as_numeric_string(value).map_or(false, |n| n.fract() == 0.0) {
                    Ok(())
                } else {
                    Err(format!("must be an integer, got {}", json_type(value)))
                }
            }
            ParamKind::Number => {
                if value.is_number() || as_numeric_string(value).is_some() {
                    Ok(())
                } else {
                    Err(format!("must be a number, got {}", json_type(value)))
                }
            }
            ParamKind::Boolean => {
                if value.is_boolean() {
                    Ok(())
                } else {
                    Err(format!("must be true or false, got {}", json_type(value)))
                }
            }
            ParamKind::Choice(choices) => match value.as_str() {
                Some(s) if choices.contains(&s) => Ok(()),
                _ => Err(format!("must be one of: {}", choices.join(", "))),
            },
            ParamKind::Json => Ok(()),
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Text => f.write_str("text"),
            ParamKind::Integer => f.write_str("integer"),
            ParamKind::Number => f.write_str("number"),
            ParamKind::Boolean => f.write_str("boolean"),
            ParamKind::Image => f.write_str("image"),
            ParamKind::Video => f.write_str("video"),
            ParamKind::Audio => f.write_str("audio"),
            ParamKind::Choice(_) => f.write_str("choice"),
            ParamKind::Json => f.write_str("json"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

impl ParamSpec {
    pub const fn required(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// Numbers sometimes arrive as strings ("5", "5s" for durations).
pub(crate) fn as_numeric_string(value: &Value) -> Option<f64> {
    let s = value.as_str()?.trim();
    let s = s.strip_suffix('s').unwrap_or(s);
    s.parse::<f64>().ok()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
