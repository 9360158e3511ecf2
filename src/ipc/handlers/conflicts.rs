use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{required_param, required_uuid};
use crate::ipc::types::{AppState, Request};
use crate::reconcile::{ReconcileError, ResolveAction};
use serde_json::json;

fn handle_conflicts_list(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    // With a conflictId, report that one prompt's lifecycle state instead.
    if req.params.get("conflictId").is_some() {
        let conflict_id = required_uuid(req, "conflictId")?;
        let Some(conflict_state) = state.results.conflict_state(conflict_id) else {
            return Err(ReconcileError::UnknownConflict(conflict_id).into());
        };
        return Ok(json!({ "conflictId": conflict_id, "lifecycle": conflict_state }));
    }
    Ok(json!({ "conflicts": state.results.pending() }))
}

fn handle_conflicts_resolve(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let conflict_id = required_uuid(req, "conflictId")?;
    let action: ResolveAction = required_param(req, "action")?;
    let resolution = state.results.resolve(conflict_id, action)?;
    Ok(json!(resolution))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "conflicts.list" => Some(match handle_conflicts_list(state, req) {
            Ok(v) => ok(&req.id, v),
            Err(e) => e.response(&req.id),
        }),
        "conflicts.resolve" => Some(match handle_conflicts_resolve(state, req) {
            Ok(v) => ok(&req.id, v),
            Err(e) => e.response(&req.id),
        }),
        _ => None,
    }
}
