//! Per-model cost formulas: pure functions of the step parameters.

use crate::chain::reference::contains_reference;
use crate::cost::money::Money;
use crate::error::ValidationError;
use crate::registry::schema::as_numeric_string;
use serde_json::{Map, Value};

/// Media length assumed when the length comes from an earlier step's output.
const ASSUMED_SECONDS: f64 = 10.0;
/// Text length assumed when the text comes from an earlier step's output.
const ASSUMED_CHARS: f64 = 1_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CostFormula {
    /// Fixed price per call.
    Flat(Money),
    /// Price per generated item, times an integer count parameter.
    PerItem {
        unit: Money,
        param: &'static str,
        default: u32,
    },
    /// Price per second of media. Without a default the parameter is mandatory.
    PerSecond {
        rate: Money,
        param: &'static str,
        default: Option<f64>,
    },
    /// Price per 1000 characters of a text parameter.
    PerThousandChars { rate: Money, param: &'static str },
    /// Price picked by a string parameter such as resolution.
    Tiered {
        param: &'static str,
        tiers: &'static [(&'static str, Money)],
        default: &'static str,
    },
    /// Per-second rate picked by a tier parameter.
    TieredPerSecond {
        tier_param: &'static str,
        tiers: &'static [(&'static str, Money)],
        default_tier: &'static str,
        seconds_param: &'static str,
        default_seconds: Option<f64>,
    },
}

/// Result of evaluating a formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormulaValue {
    pub amount: Money,
    /// Some input was a reference, so an assumed value was used.
    pub approximate: bool,
}

enum Input<'a> {
    Absent,
    Reference,
    Literal(&'a Value),
}

fn input<'a>(params: &'a Map<String, Value>, name: &str) -> Input<'a> {
    match params.get(name) {
        None | Some(Value::Null) => Input::Absent,
        Some(value) if contains_reference(value) => Input::Reference,
        Some(value) => Input::Literal(value),
    }
}

impl CostFormula {
    /// Parameter names the formula reads.
    pub fn params(&self) -> Vec<&'static str> {
        match self {
            CostFormula::Flat(_) => Vec::new(),
            CostFormula::PerItem { param, .. }
            | CostFormula::PerSecond { param, .. }
            | CostFormula::PerThousandChars { param, .. }
            | CostFormula::Tiered { param, .. } => vec![param],
            CostFormula::TieredPerSecond {
                tier_param,
                seconds_param,
                ..
            } => vec![tier_param, seconds_param],
        }
    }

    pub fn evaluate(
        &self,
        step_id: &str,
        params: &Map<String, Value>,
    ) -> Result<FormulaValue, ValidationError> {
        match *self {
            CostFormula::Flat(amount) => Ok(FormulaValue {
                amount,
                approximate: false,
            }),
            CostFormula::PerItem {
                unit,
                param,
                default,
            } => {
                let (count, approximate) = count(step_id, params, param, default)?;
                Ok(FormulaValue {
                    amount: priced(step_id, param, unit, count as f64)?,
                    approximate,
                })
            }
            CostFormula::PerSecond {
                rate,
                param,
                default,
            } => {
                let (secs, approximate) = seconds(step_id, params, param, default)?;
                Ok(FormulaValue {
                    amount: priced(step_id, param, rate, secs)?,
                    approximate,
                })
            }
            CostFormula::PerThousandChars { rate, param } => {
                let (chars, approximate) = characters(step_id, params, param)?;
                Ok(FormulaValue {
                    amount: priced(step_id, param, rate, chars / 1_000.0)?,
                    approximate,
                })
            }
            CostFormula::Tiered {
                param,
                tiers,
                default,
            } => {
                let (amount, approximate) = tier(step_id, params, param, tiers, default)?;
                Ok(FormulaValue {
                    amount,
                    approximate,
                })
            }
            CostFormula::TieredPerSecond {
                tier_param,
                tiers,
                default_tier,
                seconds_param,
                default_seconds,
            } => {
                let (rate, tier_approx) = tier(step_id, params, tier_param, tiers, default_tier)?;
                let (secs, secs_approx) = seconds(step_id, params, seconds_param, default_seconds)?;
                Ok(FormulaValue {
                    amount: priced(step_id, seconds_param, rate, secs)?,
                    approximate: tier_approx || secs_approx,
                })
            }
        }
    }
}

fn missing(step_id: &str, param: &str) -> ValidationError {
    ValidationError::MissingParameter {
        step_id: step_id.to_string(),
        param: param.to_string(),
    }
}

fn invalid(step_id: &str, param: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidParameter {
        step_id: step_id.to_string(),
        param: param.to_string(),
        reason: reason.into(),
    }
}

fn priced(
    step_id: &str,
    param: &str,
    rate: Money,
    factor: f64,
) -> Result<Money, ValidationError> {
    rate.checked_scale(factor)
        .ok_or_else(|| invalid(step_id, param, "is too large to price"))
}

fn number(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| as_numeric_string(value))
        .filter(|n| n.is_finite() && *n >= 0.0)
}

fn seconds(
    step_id: &str,
    params: &Map<String, Value>,
    param: &str,
    default: Option<f64>,
) -> Result<(f64, bool), ValidationError> {
    match input(params, param) {
        Input::Absent => default
            .map(|d| (d, false))
            .ok_or_else(|| missing(step_id, param)),
        Input::Reference => Ok((default.unwrap_or(ASSUMED_SECONDS), true)),
        Input::Literal(value) => number(value)
            .map(|n| (n, false))
            .ok_or_else(|| invalid(step_id, param, "must be a non-negative number of seconds")),
    }
}

fn count(
    step_id: &str,
    params: &Map<String, Value>,
    param: &str,
    default: u32,
) -> Result<(u32, bool), ValidationError> {
    match input(params, param) {
        Input::Absent => Ok((default, false)),
        Input::Reference => Ok((default, true)),
        Input::Literal(value) => number(value)
            .filter(|n| n.fract() == 0.0 && *n >= 1.0)
            .map(|n| (n as u32, false))
            .ok_or_else(|| invalid(step_id, param, "must be a positive integer")),
    }
}

fn characters(
    step_id: &str,
    params: &Map<String, Value>,
    param: &str,
) -> Result<(f64, bool), ValidationError> {
    match input(params, param) {
        Input::Absent => Err(missing(step_id, param)),
        Input::Reference => Ok((ASSUMED_CHARS, true)),
        Input::Literal(Value::String(text)) => Ok((text.chars().count() as f64, false)),
        Input::Literal(_) => Err(invalid(step_id, param, "must be a string")),
    }
}

fn tier(
    step_id: &str,
    params: &Map<String, Value>,
    param: &str,
    tiers: &[(&str, Money)],
    default: &str,
) -> Result<(Money, bool), ValidationError> {
    let lookup = |name: &str| {
        tiers
            .iter()
            .find(|(tier, _)| *tier == name)
            .map(|(_, amount)| *amount)
    };
    let names = || {
        tiers
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(", ")
    };
    let (selected, approximate) = match input(params, param) {
        Input::Absent => (default, false),
        Input::Reference => (default, true),
        Input::Literal(value) => match value.as_str() {
            Some(name) => (name, false),
            None => return Err(invalid(step_id, param, format!("must be one of: {}", names()))),
        },
    };
    lookup(selected)
        .map(|amount| (amount, approximate))
        .ok_or_else(|| invalid(step_id, param, format!("must be one of: {}", names())))
}
