use serde::de::DeserializeOwned;
use serde_json::json;
use uuid::Uuid;

use crate::ipc::error::HandlerErr;
use crate::ipc::types::Request;

pub fn required_str<'a>(req: &'a Request, key: &str) -> Result<&'a str, HandlerErr> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {key}")))
}

pub fn optional_str<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    req.params.get(key).and_then(|v| v.as_str())
}

pub fn required_uuid(req: &Request, key: &str) -> Result<Uuid, HandlerErr> {
    let raw = required_str(req, key)?;
    Uuid::parse_str(raw).map_err(|e| HandlerErr {
        code: "bad_params",
        message: format!("invalid {key}: {e}"),
        details: Some(json!({ key: raw })),
    })
}

/// Deserializes `params[key]` into `T`.
pub fn required_param<T: DeserializeOwned>(req: &Request, key: &str) -> Result<T, HandlerErr> {
    let Some(raw) = req.params.get(key) else {
        return Err(HandlerErr::bad_params(format!("missing {key}")));
    };
    serde_json::from_value(raw.clone())
        .map_err(|e| HandlerErr::bad_params(format!("invalid {key}: {e}")))
}
