//! Edge resolution: pick the first outgoing edge matching `(from, on)`
//! whose condition evaluates true.

use workflow_types::{Edge, EdgeAction, FormSchema, InstanceData, WorkflowResult};

/// Iterate `schema`'s edges in declaration order; skip those with a
/// different `from` or `on`; the first whose condition evaluates true (a
/// missing condition is treated as true) wins. Deterministic.
pub fn resolve_edge(
    schema: &FormSchema,
    from: &str,
    on: &EdgeAction,
    data: &InstanceData,
) -> WorkflowResult<Option<Edge>> {
    for edge in schema.workflow.outgoing_edges(from) {
        if &edge.on != on {
            continue;
        }
        let condition = edge.condition.clone().unwrap_or(serde_json::Value::Null);
        if workflow_expr::eval(&condition, data)? {
            return Ok(Some(edge.clone()));
        }
    }
    Ok(None)
}

/// As `resolve_edge`, but on action `reject` substitutes the synthetic
/// terminal edge `{from: node, to: "end", on: reject, mode: OR}` when
/// resolution otherwise finds nothing. Preserves the rule that a reject
/// always terminates if the schema did not author an explicit edge.
pub fn resolve_edge_with_reject_fallback(
    schema: &FormSchema,
    from: &str,
    on: &EdgeAction,
    data: &InstanceData,
) -> WorkflowResult<Option<Edge>> {
    if let Some(edge) = resolve_edge(schema, from, on, data)? {
        return Ok(Some(edge));
    }
    if *on == EdgeAction::Reject {
        return Ok(Some(Edge::synthetic_reject(from)));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use workflow_types::fixtures::leave_form_v1;
    use workflow_types::InstanceData;

    fn data(days: f64) -> InstanceData {
        let mut m = InstanceData::new();
        m.insert("days".into(), serde_json::json!(days));
        m
    }

    #[test]
    fn submit_from_start_routes_to_manager() {
        let schema = leave_form_v1();
        let edge = resolve_edge(&schema, "start", &EdgeAction::Submit, &InstanceData::new())
            .unwrap()
            .unwrap();
        assert_eq!(edge.to, "manager");
    }

    #[test]
    fn manager_approve_routes_by_days_condition() {
        let schema = leave_form_v1();
        let short = resolve_edge(&schema, "manager", &EdgeAction::Approve, &data(2.0))
            .unwrap()
            .unwrap();
        assert_eq!(short.to, "end");

        let long = resolve_edge(&schema, "manager", &EdgeAction::Approve, &data(5.0))
            .unwrap()
            .unwrap();
        assert_eq!(long.to, "hr");
    }

    #[test]
    fn first_matching_edge_wins_in_declaration_order() {
        let schema = leave_form_v1();
        // days=3 only satisfies the <=3 edge (declared second), never the >3 one.
        let edge = resolve_edge(&schema, "manager", &EdgeAction::Approve, &data(3.0))
            .unwrap()
            .unwrap();
        assert_eq!(edge.to, "end");
    }

    #[test]
    fn no_match_returns_none() {
        let schema = leave_form_v1();
        let edge = resolve_edge(&schema, "hr", &EdgeAction::Reject, &InstanceData::new()).unwrap();
        assert!(edge.is_none());
    }

    #[test]
    fn reject_fallback_synthesizes_edge_to_end() {
        let schema = leave_form_v1();
        let edge =
            resolve_edge_with_reject_fallback(&schema, "hr", &EdgeAction::Reject, &InstanceData::new())
                .unwrap()
                .unwrap();
        assert_eq!(edge.to, "end");
        assert_eq!(edge.from, "hr");
    }

    #[test]
    fn reject_fallback_does_not_apply_to_other_actions() {
        let schema = leave_form_v1();
        let edge = resolve_edge_with_reject_fallback(
            &schema,
            "hr",
            &EdgeAction::Return,
            &InstanceData::new(),
        )
        .unwrap();
        // hr -> start return edge IS authored, so this should resolve normally.
        assert_eq!(edge.unwrap().to, "start");
    }
}
