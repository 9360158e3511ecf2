use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use tracing::info;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "records": state.results.records().len(),
            "pendingConflicts": state.results.pending().len(),
            "sheets": state.view.sheets().len(),
            "activeTab": state.view.active_tab(),
        }),
    )
}

fn handle_session_reset(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.reset();
    info!("session reset");
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "session.reset" => Some(handle_session_reset(state, req)),
        _ => None,
    }
}
