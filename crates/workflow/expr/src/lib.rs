//! A minimal Boolean expression interpreter operating on a read-only
//! context of an instance's form data.
//!
//! Intentionally tiny: this is not a general logic engine. It understands
//! exactly the operators below, `{"var": "<path>"}` value lookup, and
//! nothing else. Ported in spirit (not literally) from the reference
//! Go implementation's `jsonlogic.go`.

pub mod calc;

use serde_json::Value;
use workflow_types::{InstanceData, WorkflowError, WorkflowResult};

/// Evaluate a condition expression against form data.
///
/// A `None`/`null` expression is vacuously true. Unknown operators fail
/// evaluation rather than silently passing.
pub fn eval(expr: &Value, data: &InstanceData) -> WorkflowResult<bool> {
    if expr.is_null() {
        return Ok(true);
    }

    let Value::Object(map) = expr else {
        return Err(WorkflowError::validation("condition must be an object"));
    };

    // A well-formed condition has exactly one operator key. We evaluate
    // the first and ignore extras, mirroring the reference implementation.
    let Some((op, args)) = map.iter().next() else {
        return Ok(true);
    };
    let args = args.as_array().cloned().unwrap_or_default();

    match op.as_str() {
        "==" => {
            let (a, b) = binary_operands(&args, data)?;
            Ok(values_equal(&a, &b))
        }
        "!=" => {
            let (a, b) = binary_operands(&args, data)?;
            Ok(!values_equal(&a, &b))
        }
        ">" => compare(&args, data, |a, b| a > b),
        "<" => compare(&args, data, |a, b| a < b),
        ">=" => compare(&args, data, |a, b| a >= b),
        "<=" => compare(&args, data, |a, b| a <= b),
        "and" => {
            for sub in &args {
                if !eval(sub, data)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        "or" => {
            for sub in &args {
                if eval(sub, data)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        other => Err(WorkflowError::validation(format!("unsupported operator: {other}"))),
    }
}

fn binary_operands(args: &[Value], data: &InstanceData) -> WorkflowResult<(Value, Value)> {
    let a = args.first().cloned().unwrap_or(Value::Null);
    let b = args.get(1).cloned().unwrap_or(Value::Null);
    Ok((resolve(&a, data)?, resolve(&b, data)?))
}

fn compare(
    args: &[Value],
    data: &InstanceData,
    cmp: impl Fn(f64, f64) -> bool,
) -> WorkflowResult<bool> {
    let (a, b) = binary_operands(args, data)?;
    Ok(cmp(to_f64(&a), to_f64(&b)))
}

/// Resolve a value position: a literal passes through, `{"var": path}`
/// looks up form data, and any other object is itself a nested condition
/// evaluated to a boolean.
fn resolve(v: &Value, data: &InstanceData) -> WorkflowResult<Value> {
    if let Value::Object(map) = v {
        if let Some(path) = map.get("var") {
            let path = path.as_str().unwrap_or("");
            return Ok(resolve_var(path, data));
        }
        let b = eval(v, data)?;
        return Ok(Value::Bool(b));
    }
    Ok(v.clone())
}

fn resolve_var(path: &str, data: &InstanceData) -> Value {
    if let Some(key) = path.strip_prefix("form.") {
        return data.get(key).cloned().unwrap_or(Value::Null);
    }
    if path == "form" {
        return Value::Object(data.clone());
    }
    Value::Null
}

/// Numeric coercion: native number -> number; string -> decimal parse
/// (failure -> 0); boolean/null/other -> 0.
fn to_f64(v: &Value) -> f64 {
    match v {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Equality prefers numeric comparison whenever either operand coerces to
/// a nonzero number; otherwise falls back to canonical string comparison.
fn values_equal(a: &Value, b: &Value) -> bool {
    let (af, bf) = (to_f64(a), to_f64(b));
    if af != 0.0 || bf != 0.0 {
        return af == bf;
    }
    stringify(a) == stringify(b)
}

fn stringify(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
