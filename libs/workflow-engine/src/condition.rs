//! The predicate mini-language transitions and step conditions are written
//! in: a single `<path> <op> <literal>` comparison, dot-path addressed into
//! a JSON data map.
//!
//! Kept as a pure function deliberately — see DESIGN.md — rather than grown
//! into an ad-hoc expression interpreter living inside the executor.

use serde_json::Value;

/// Comparison operators the grammar recognizes, longest-prefix first so
/// `===` is never mistaken for `==`.
const OPERATORS: &[&str] = &["===", "!==", "==", "!=", ">=", "<=", ">", "<"];

/// Evaluate `predicate` against `data`.
///
/// Returns `None` when `predicate` doesn't parse as `<path> <op> <literal>`.
/// Callers decide the conservative default for their position in the graph:
/// `unwrap_or(false)` for transition conditions (don't follow the edge),
/// `unwrap_or(true)` for step-level conditions (don't spuriously block).
#[must_use]
pub fn evaluate_condition(predicate: &str, data: &Value) -> Option<bool> {
    let predicate = predicate.trim();

    for op in OPERATORS {
        if let Some(idx) = find_operator(predicate, op) {
            let path = predicate[..idx].trim();
            let literal = predicate[idx + op.len()..].trim();
            if path.is_empty() || literal.is_empty() {
                continue;
            }
            let left = resolve_path(data, path);
            let right = parse_literal(literal);
            return Some(compare(left.as_ref(), op, &right));
        }
    }

    None
}

/// Find the first occurrence of `op` that isn't a substring of a longer
/// operator already matched (so `!=` isn't found inside `!==`).
fn find_operator(predicate: &str, op: &str) -> Option<usize> {
    let idx = predicate.find(op)?;
    // Reject a short match that's actually part of a longer operator at the
    // same position (e.g. "==" matching inside "===").
    for longer in OPERATORS {
        if longer.len() > op.len() && predicate[idx..].starts_with(longer) {
            return None;
        }
    }
    Some(idx)
}

/// Resolve a dot-separated path into `data`. A missing key at any segment
/// yields `None` (null).
fn resolve_path<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = data;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// A literal from the predicate's right-hand side, parsed without knowing
/// the left-hand side's type yet.
#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Number(f64),
    Bool(bool),
    Null,
    String(String),
}

fn parse_literal(raw: &str) -> Literal {
    if let Some(unquoted) = strip_quotes(raw) {
        return Literal::String(unquoted.to_string());
    }
    match raw {
        "true" => return Literal::Bool(true),
        "false" => return Literal::Bool(false),
        "null" => return Literal::Null,
        _ => {}
    }
    if let Ok(n) = raw.parse::<f64>() {
        return Literal::Number(n);
    }
    Literal::String(raw.to_string())
}

fn strip_quotes(raw: &str) -> Option<&str> {
    let bytes = raw.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return Some(&raw[1..raw.len() - 1]);
        }
    }
    None
}

/// Compare a resolved JSON value (possibly absent) against a parsed literal
/// using `op`. Numeric comparison is used whenever both sides are numeric;
/// otherwise string/bool/null equality applies. `>`, `<`, `>=`, `<=` are
/// only meaningful for numbers and return `false` for any other pairing.
fn compare(left: Option<&Value>, op: &str, right: &Literal) -> bool {
    let left_num = left.and_then(Value::as_f64);
    let right_num = match right {
        Literal::Number(n) => Some(*n),
        _ => None,
    };

    if let (Some(l), Some(r)) = (left_num, right_num) {
        return match op {
            "==" | "===" => (l - r).abs() < f64::EPSILON,
            "!=" | "!==" => (l - r).abs() >= f64::EPSILON,
            ">" => l > r,
            "<" => l < r,
            ">=" => l >= r,
            "<=" => l <= r,
            _ => false,
        };
    }

    match op {
        "==" | "===" => values_equal(left, right),
        "!=" | "!==" => !values_equal(left, right),
        _ => false,
    }
}

fn values_equal(left: Option<&Value>, right: &Literal) -> bool {
    match (left, right) {
        (None, Literal::Null) => true,
        (Some(Value::Null), Literal::Null) => true,
        (Some(Value::String(s)), Literal::String(r)) => s == r,
        (Some(Value::Bool(b)), Literal::Bool(r)) => b == r,
        (Some(Value::Number(n)), Literal::Number(r)) => n.as_f64().is_some_and(|n| (n - r).abs() < f64::EPSILON),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strict_equality_operator() {
        let data = json!({"user": {"plan": "premium"}});
        assert_eq!(evaluate_condition("user.plan === \"premium\"", &data), Some(true));
        assert_eq!(evaluate_condition("user.plan === \"basic\"", &data), Some(false));
    }

    #[test]
    fn strict_inequality_operator() {
        let data = json!({"user": {"plan": "basic"}});
        assert_eq!(evaluate_condition("user.plan !== \"premium\"", &data), Some(true));
    }

    #[test]
    fn loose_equality_and_inequality() {
        let data = json!({"n": 1});
        assert_eq!(evaluate_condition("n == 1", &data), Some(true));
        assert_eq!(evaluate_condition("n != 2", &data), Some(true));
    }

    #[test]
    fn numeric_ordering_operators() {
        let data = json!({"score": 7});
        assert_eq!(evaluate_condition("score > 5", &data), Some(true));
        assert_eq!(evaluate_condition("score < 5", &data), Some(false));
        assert_eq!(evaluate_condition("score >= 7", &data), Some(true));
        assert_eq!(evaluate_condition("score <= 7", &data), Some(true));
    }

    #[test]
    fn dotted_path_miss_compares_false_except_null() {
        let data = json!({});
        assert_eq!(evaluate_condition("missing.path == 1", &data), Some(false));
        assert_eq!(evaluate_condition("missing.path == null", &data), Some(true));
    }

    #[test]
    fn unquoted_string_literal() {
        let data = json!({"status": "active"});
        assert_eq!(evaluate_condition("status == active", &data), Some(true));
    }

    #[test]
    fn unparseable_predicate_returns_none() {
        let data = json!({});
        assert_eq!(evaluate_condition("not a predicate at all", &data), None);
        assert_eq!(evaluate_condition("", &data), None);
    }

    #[test]
    fn numeric_literal_compares_numerically_against_string_valued_number() {
        let data = json!({"count": 10});
        assert_eq!(evaluate_condition("count > 2", &data), Some(true));
    }
}
