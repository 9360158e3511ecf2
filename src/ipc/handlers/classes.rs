use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn picker_view(state: &AppState) -> serde_json::Value {
    json!({
        "chips": state.picker.chips(),
        "selected": state.picker.selected(),
        "primary": state.picker.primary(),
        "emptyMessage": state.picker.empty_message(),
    })
}

fn handle_classes_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    // A missing roster is a failed fetch on the browser side; degrade the same way.
    let roster = req.params.get("roster").cloned().unwrap_or_default();
    state.picker.load_roster(&roster);
    ok(&req.id, picker_view(state))
}

fn handle_classes_toggle(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let class_name = required_str(req, "className")?;
    if class_name.trim().is_empty() {
        return Err(HandlerErr::bad_params("className must not be empty"));
    }
    let selected = state.picker.toggle(class_name);
    let mut view = picker_view(state);
    view["toggled"] = json!({ "className": class_name.trim(), "selected": selected });
    Ok(view)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.load" => Some(handle_classes_load(state, req)),
        "classes.toggle" => Some(match handle_classes_toggle(state, req) {
            Ok(v) => ok(&req.id, v),
            Err(e) => e.response(&req.id),
        }),
        "classes.selected" => Some(ok(&req.id, picker_view(state))),
        _ => None,
    }
}
