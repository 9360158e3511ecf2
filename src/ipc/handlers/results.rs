use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{optional_str, required_param, required_uuid};
use crate::ipc::types::{AppState, Request};
use crate::reconcile::{Candidate, RecordPatch};
use serde_json::json;

const SCAN_BATCH_MAX_CANDIDATES: usize = 500;

fn handle_results_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "records": state.results.records() }))
}

fn handle_results_scan(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let candidate: Candidate = required_param(req, "candidate")?;
    let assessment = optional_str(req, "assessment");
    let outcome = state.results.scan(candidate, assessment);
    Ok(json!(outcome))
}

fn handle_results_scan_batch(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let candidates: Vec<Candidate> = required_param(req, "candidates")?;
    if candidates.len() > SCAN_BATCH_MAX_CANDIDATES {
        return Err(HandlerErr {
            code: "bad_params",
            message: "too many candidates in one batch".to_string(),
            details: Some(json!({
                "count": candidates.len(),
                "max": SCAN_BATCH_MAX_CANDIDATES
            })),
        });
    }
    let assessment = optional_str(req, "assessment");
    let outcomes = state.results.scan_batch(candidates, assessment);
    let duplicates = outcomes
        .iter()
        .filter(|o| matches!(o, crate::reconcile::ScanOutcome::Duplicate { .. }))
        .count();
    Ok(json!({
        "outcomes": outcomes,
        "added": outcomes.len() - duplicates,
        "duplicates": duplicates
    }))
}

fn handle_results_update(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let record_id = required_uuid(req, "recordId")?;
    let patch: RecordPatch = required_param(req, "patch")?;
    let index = state.results.update(record_id, patch)?;
    Ok(json!({
        "index": index,
        "record": state.results.records()[index]
    }))
}

fn handle_results_remove(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let record_id = required_uuid(req, "recordId")?;
    let removed = state.results.remove(record_id)?;
    Ok(json!({ "removed": removed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "results.list" => return Some(handle_results_list(state, req)),
        "results.scan" => handle_results_scan(state, req),
        "results.scanBatch" => handle_results_scan_batch(state, req),
        "results.update" => handle_results_update(state, req),
        "results.remove" => handle_results_remove(state, req),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
