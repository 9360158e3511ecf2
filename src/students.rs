use serde::Serialize;
use serde_json::{json, Value};

const FALLBACK_ERROR: &str = "Something went wrong.";

/// How the browser layer should react to a student add/move reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum StudentOutcome {
    #[serde(rename_all = "camelCase")]
    Added {
        message: String,
        total_students: Option<i64>,
    },
    /// The backend found a similar name; repeating the call with `retry`
    /// forces the add.
    NeedsConfirmation { warning: String, retry: Value },
    Duplicate { message: String },
    Failed { message: String },
}

fn text(reply: &Value, key: &str) -> Option<String> {
    reply
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn flag(reply: &Value, key: &str) -> bool {
    reply.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

pub fn classify(reply: &Value, student_name: &str, class_name: &str) -> StudentOutcome {
    if flag(reply, "success") {
        return StudentOutcome::Added {
            message: text(reply, "message")
                .unwrap_or_else(|| format!("Added {student_name} to {class_name}.")),
            total_students: reply.get("total_students").and_then(|v| v.as_i64()),
        };
    }
    if flag(reply, "needs_confirmation") {
        return StudentOutcome::NeedsConfirmation {
            warning: text(reply, "warning")
                .unwrap_or_else(|| format!("A similar name already exists in {class_name}.")),
            retry: json!({
                "studentName": student_name,
                "className": class_name,
                "force": true
            }),
        };
    }
    if flag(reply, "duplicate") {
        return StudentOutcome::Duplicate {
            message: text(reply, "error")
                .unwrap_or_else(|| format!("{student_name} is already in {class_name}.")),
        };
    }
    StudentOutcome::Failed {
        message: text(reply, "error").unwrap_or_else(|| FALLBACK_ERROR.to_string()),
    }
}
