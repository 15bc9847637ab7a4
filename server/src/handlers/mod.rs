//! Request handlers shared by the HTTP and WebSocket routes.

mod websocket;

pub use websocket::handle_websocket_connection;

use crate::error::{AppError, Result};
use roster_engine::Fields;
use serde_json::Value;

/// Accept only JSON objects as record bodies and patches.
pub fn object_body(body: Value) -> Result<Fields> {
    match body {
        Value::Object(fields) => Ok(fields),
        other => Err(AppError::BadRequest(format!(
            "request body must be a JSON object, got {}",
            kind_of(&other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
