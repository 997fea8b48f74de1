//! Comparison evaluation for condition nodes.
//!
//! A comparison names a dot-separated context path, an operator, and an
//! expected value. Numbers compare numerically regardless of integer vs
//! float representation; a missing path behaves like JSON null.

use crate::template::lookup_path;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    /// Equal.
    Eq,
    /// Not equal.
    NotEq,
    /// Greater than (numeric).
    Gt,
    /// Greater than or equal (numeric).
    Gte,
    /// Less than (numeric).
    Lt,
    /// Less than or equal (numeric).
    Lte,
    /// String contains substring, or array contains element.
    Contains,
    /// Path resolves to a non-null value; the expected value is ignored.
    Exists,
}

/// A comparison between a context path and an expected value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Dot-separated path into the execution context.
    pub field: String,
    /// The operator to apply.
    pub op: CompareOp,
    /// The expected value on the right-hand side.
    #[serde(default)]
    pub value: JsonValue,
}

impl Comparison {
    /// Creates a comparison.
    #[must_use]
    pub fn new(field: impl Into<String>, op: CompareOp, value: JsonValue) -> Self {
        Self {
            field: field.into(),
            op,
            value,
        }
    }

    /// Evaluates this comparison against the execution context.
    #[must_use]
    pub fn evaluate(&self, context: &JsonValue) -> bool {
        let actual = lookup_path(context, &self.field);

        match self.op {
            CompareOp::Eq => values_equal(actual, &self.value),
            CompareOp::NotEq => !values_equal(actual, &self.value),
            CompareOp::Gt => compare_numbers(actual, &self.value, |a, b| a > b),
            CompareOp::Gte => compare_numbers(actual, &self.value, |a, b| a >= b),
            CompareOp::Lt => compare_numbers(actual, &self.value, |a, b| a < b),
            CompareOp::Lte => compare_numbers(actual, &self.value, |a, b| a <= b),
            CompareOp::Contains => check_contains(actual, &self.value),
            CompareOp::Exists => matches!(actual, Some(v) if !v.is_null()),
        }
    }
}

fn values_equal(actual: Option<&JsonValue>, expected: &JsonValue) -> bool {
    match actual {
        // A missing path behaves like null.
        None => expected.is_null(),
        Some(JsonValue::Number(a)) => match expected {
            JsonValue::Number(b) => match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
                _ => false,
            },
            _ => false,
        },
        Some(v) => v == expected,
    }
}

fn compare_numbers<F>(actual: Option<&JsonValue>, expected: &JsonValue, cmp: F) -> bool
where
    F: Fn(f64, f64) -> bool,
{
    match (actual.and_then(JsonValue::as_f64), expected.as_f64()) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

fn check_contains(actual: Option<&JsonValue>, expected: &JsonValue) -> bool {
    match (actual, expected) {
        // String contains substring.
        (Some(JsonValue::String(s)), JsonValue::String(substr)) => s.contains(substr.as_str()),
        // Array contains element.
        (Some(JsonValue::Array(arr)), expected) => {
            arr.iter().any(|v| values_equal(Some(v), expected))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_equality() {
        let context = json!({"intent": "quote"});
        assert!(Comparison::new("intent", CompareOp::Eq, json!("quote")).evaluate(&context));
        assert!(!Comparison::new("intent", CompareOp::Eq, json!("support")).evaluate(&context));
    }

    #[test]
    fn string_not_equal() {
        let context = json!({"stage": "new"});
        assert!(Comparison::new("stage", CompareOp::NotEq, json!("won")).evaluate(&context));
        assert!(!Comparison::new("stage", CompareOp::NotEq, json!("new")).evaluate(&context));
    }

    #[test]
    fn number_comparisons() {
        let context = json!({"budget": 1500});

        assert!(Comparison::new("budget", CompareOp::Gt, json!(1000)).evaluate(&context));
        assert!(!Comparison::new("budget", CompareOp::Gt, json!(2000)).evaluate(&context));
        assert!(Comparison::new("budget", CompareOp::Gte, json!(1500)).evaluate(&context));
        assert!(Comparison::new("budget", CompareOp::Lt, json!(2000)).evaluate(&context));
        assert!(Comparison::new("budget", CompareOp::Lte, json!(1500)).evaluate(&context));
        assert!(!Comparison::new("budget", CompareOp::Lte, json!(1499)).evaluate(&context));
    }

    #[test]
    fn integer_and_float_compare_equal() {
        let context = json!({"score": 7.0});
        assert!(Comparison::new("score", CompareOp::Eq, json!(7)).evaluate(&context));
    }

    #[test]
    fn missing_field_is_null() {
        let context = json!({});
        assert!(Comparison::new("missing", CompareOp::Eq, json!(null)).evaluate(&context));
        assert!(!Comparison::new("missing", CompareOp::Eq, json!("x")).evaluate(&context));
        assert!(!Comparison::new("missing", CompareOp::Gt, json!(0)).evaluate(&context));
    }

    #[test]
    fn contains_substring() {
        let context = json!({"message": "cual es el precio?"});
        assert!(Comparison::new("message", CompareOp::Contains, json!("precio")).evaluate(&context));
        assert!(!Comparison::new("message", CompareOp::Contains, json!("envio")).evaluate(&context));
    }

    #[test]
    fn contains_array_element() {
        let context = json!({"tags": ["vip", "returning"]});
        assert!(Comparison::new("tags", CompareOp::Contains, json!("vip")).evaluate(&context));
        assert!(!Comparison::new("tags", CompareOp::Contains, json!("new")).evaluate(&context));
    }

    #[test]
    fn exists_check() {
        let context = json!({"lead_id": "lead_123", "empty": null});
        assert!(Comparison::new("lead_id", CompareOp::Exists, json!(null)).evaluate(&context));
        assert!(!Comparison::new("empty", CompareOp::Exists, json!(null)).evaluate(&context));
        assert!(!Comparison::new("missing", CompareOp::Exists, json!(null)).evaluate(&context));
    }

    #[test]
    fn nested_path_comparison() {
        let context = json!({"nodes": {"http": {"status": 200}}});
        assert!(Comparison::new("nodes.http.status", CompareOp::Eq, json!(200)).evaluate(&context));
    }

    #[test]
    fn comparison_serde_roundtrip() {
        let comparison = Comparison::new("budget", CompareOp::Gt, json!(1000));
        let json = serde_json::to_string(&comparison).expect("serialize");
        let parsed: Comparison = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(comparison, parsed);
    }
}
