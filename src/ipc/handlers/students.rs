use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use crate::students::classify;
use serde_json::json;

fn handle_students_add_outcome(req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let student_name = required_str(req, "studentName")?.trim();
    let class_name = required_str(req, "className")?.trim();
    let response = req.params.get("response").cloned().unwrap_or_default();
    Ok(json!(classify(&response, student_name, class_name)))
}

pub fn try_handle(_state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.addOutcome" => Some(match handle_students_add_outcome(req) {
            Ok(v) => ok(&req.id, v),
            Err(e) => e.response(&req.id),
        }),
        _ => None,
    }
}
