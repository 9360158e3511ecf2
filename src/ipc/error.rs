use serde_json::json;

use crate::reconcile::ReconcileError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn bad_params(message: impl Into<String>) -> Self {
        Self {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<ReconcileError> for HandlerErr {
    fn from(e: ReconcileError) -> Self {
        let details = match &e {
            ReconcileError::UnknownConflict(id) => Some(json!({ "conflictId": id })),
            ReconcileError::UnknownRecord(id) => Some(json!({ "recordId": id })),
            ReconcileError::AlreadyResolved { id, action } => {
                Some(json!({ "conflictId": id, "action": action }))
            }
            ReconcileError::WouldDuplicate { index } => Some(json!({ "existingIndex": index })),
        };
        Self {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}
