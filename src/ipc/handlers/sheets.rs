use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{required_param, required_str};
use crate::ipc::types::{AppState, Request};
use crate::sheets::{derive_level, SheetsCollection};
use serde_json::json;

fn handle_sheets_render(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let sheets: SheetsCollection = required_param(req, "sheets")?;
    let panel = state.view.render(sheets);
    Ok(json!({ "panel": panel }))
}

fn handle_sheets_select(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let sheet_name = required_str(req, "sheetName")?;
    Ok(match state.view.select_tab(sheet_name) {
        Some(panel) => json!({ "changed": true, "panel": panel }),
        None => json!({
            "changed": false,
            "activeTab": state.view.active_tab()
        }),
    })
}

fn handle_sheets_toggle_rows(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "activeTab": state.view.active_tab(),
            "rows": state.view.toggle_rows()
        }),
    )
}

fn handle_sheets_derive_level(req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let class_name = required_str(req, "className")?;
    Ok(json!(derive_level(class_name)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "sheets.render" => handle_sheets_render(state, req),
        "sheets.select" => handle_sheets_select(state, req),
        "sheets.toggleRows" => return Some(handle_sheets_toggle_rows(state, req)),
        "sheets.deriveLevel" => handle_sheets_derive_level(req),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
