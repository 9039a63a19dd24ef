use super::record::QuantityUnit;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;
use std::str::FromStr;

/// Largest magnitude accepted for any amount, rate or quantity.
pub const AMOUNT_LIMIT: i64 = 1_000_000_000_000;

/// Outcome of normalizing a numeric field.
///
/// `Defaulted` covers absent, null, unparsable and out-of-range values; callers that only
/// need the amount collapse it to zero through [`Normalized::value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Normalized {
    Present(Decimal),
    #[default]
    Defaulted,
}

impl Normalized {
    pub fn value(self) -> Decimal {
        match self {
            Normalized::Present(value) => value,
            Normalized::Defaulted => Decimal::ZERO,
        }
    }

    pub fn is_present(self) -> bool {
        matches!(self, Normalized::Present(_))
    }

    /// The value when it was supplied and is strictly positive.
    pub fn positive(self) -> Option<Decimal> {
        match self {
            Normalized::Present(value) if value > Decimal::ZERO => Some(value),
            _ => None,
        }
    }
}

pub(crate) fn normalize_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

pub(crate) fn normalize_amount(value: &Value) -> Normalized {
    let parsed = match value {
        Value::Number(number) => parse_decimal(&number.to_string()),
        Value::String(text) => parse_decimal(text.trim()),
        _ => None,
    };

    parsed.map_or(Normalized::Defaulted, Normalized::Present)
}

pub(crate) fn normalize_unit(value: &Value) -> Option<QuantityUnit> {
    let text = normalize_text(value)?;
    match text.to_ascii_lowercase().as_str() {
        "day" | "days" => Some(QuantityUnit::Days),
        "hour" | "hours" | "hr" | "hrs" => Some(QuantityUnit::Hours),
        _ => None,
    }
}

pub(crate) fn normalize_flag(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => {
            let trimmed = text.trim();
            !trimmed.is_empty()
                && !matches!(
                    trimmed.to_ascii_lowercase().as_str(),
                    "false" | "0" | "no"
                )
        }
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

/// Rounds to cents, half away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Whether a value sits inside [`AMOUNT_LIMIT`].
pub fn within_limit(value: Decimal) -> bool {
    value.abs() <= Decimal::from(AMOUNT_LIMIT)
}

/// Collapses a normalized field to a finalized monetary amount.
pub fn money(value: Normalized) -> Decimal {
    round_money(value.value())
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    if text.is_empty() {
        return None;
    }

    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
        .filter(|value| within_limit(*value))
}
