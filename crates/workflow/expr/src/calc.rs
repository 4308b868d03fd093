//! Derived-field calculations: `sum(<subtableField>.<column>)`.
//!
//! Distinct from the Boolean expression evaluator in `lib.rs` — this is a
//! tiny formula mini-language with exactly one supported shape, consumed
//! by the transition coordinator after a data patch and before required
//! field validation.

use serde_json::Value;
use workflow_types::{Calc, InstanceData, WorkflowError, WorkflowResult};

/// Recompute every calculated field in `schema.calculations` against
/// `data`, writing results back in place.
pub fn recompute(calculations: &[Calc], data: &mut InstanceData) -> WorkflowResult<()> {
    for calc in calculations {
        let value = eval_calc(&calc.expr, data)?;
        data.insert(calc.target_field_id.clone(), value);
    }
    Ok(())
}

fn eval_calc(expr: &str, data: &InstanceData) -> WorkflowResult<Value> {
    let inner = expr
        .strip_prefix("sum(")
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| WorkflowError::validation(format!("unsupported calc expr: {expr}")))?;

    let (subtable, column) = inner
        .split_once('.')
        .ok_or_else(|| WorkflowError::validation(format!("malformed sum() target: {inner}")))?;

    let rows = data.get(subtable).and_then(Value::as_array);
    let total: f64 = rows
        .map(|rows| {
            rows.iter()
                .filter_map(|row| row.get(column))
                .filter_map(Value::as_f64)
                .sum()
        })
        .unwrap_or(0.0);

    Ok(serde_json::json!(total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sums_a_subtable_column() {
        let mut data = InstanceData::new();
        data.insert(
            "items".into(),
            json!([{"cost": 10.5}, {"cost": 2}, {"city": "x"}]),
        );
        let calc = Calc { target_field_id: "totalCost".into(), expr: "sum(items.cost)".into() };
        recompute(std::slice::from_ref(&calc), &mut data).unwrap();
        assert_eq!(data.get("totalCost").unwrap(), &json!(12.5));
    }

    #[test]
    fn missing_subtable_sums_to_zero() {
        let mut data = InstanceData::new();
        let calc = Calc { target_field_id: "totalCost".into(), expr: "sum(items.cost)".into() };
        recompute(std::slice::from_ref(&calc), &mut data).unwrap();
        assert_eq!(data.get("totalCost").unwrap(), &json!(0.0));
    }

    #[test]
    fn malformed_expr_is_rejected() {
        let err = eval_calc("avg(items.cost)", &InstanceData::new()).unwrap_err();
        assert!(matches!(err, WorkflowError::ValidationError(_)));
    }
}
