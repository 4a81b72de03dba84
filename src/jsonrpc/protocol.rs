//! JSON-RPC 2.0 protocol constants and payload helpers
//!
//! Provides the version constant, the numeric error codes used on the wire,
//! and small helpers for composing and inspecting message payloads as per
//! https://www.jsonrpc.org/specification

use serde_json::{Value, json};

/// JSON-RPC 2.0 version identifier
pub const JSONRPC_VERSION: &str = "2.0";

// ============================================================================
// Error Codes
// ============================================================================

/// JSON-RPC error codes emitted by the endpoint.
///
/// The first five come from the JSON-RPC specification; `NotInitialized`
/// (-32002) is reserved by LSP for messages received before the `initialize`
/// handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    ParseError = -32700,
    InvalidRequest = -32600,
    MethodNotFound = -32601,
    InvalidParams = -32602,
    InternalError = -32603,
    NotInitialized = -32002,
}

impl ErrorCode {
    /// Numeric wire value of the code
    pub fn code(self) -> i32 {
        self as i32
    }
}

// ============================================================================
// Payload Builders
// ============================================================================

/// Compose an error payload, echoing the request `id` when one is known.
///
/// `Endpoint::write` merges the `jsonrpc` version field on the way out, so
/// builders only produce the distinguishing members.
pub fn error_payload(id: Option<&Value>, code: ErrorCode, message: &str) -> Value {
    let mut payload = json!({
        "error": {
            "code": code.code(),
            "message": message,
        }
    });
    if let Some(id) = id {
        payload["id"] = id.clone();
    }
    payload
}

// ============================================================================
// Payload Accessors
// ============================================================================

/// Method name of a message, if it carries one (requests and notifications)
pub fn method_of(message: &Value) -> Option<&str> {
    message.get("method").and_then(Value::as_str)
}

/// Request `id` of a message, if present
pub fn id_of(message: &Value) -> Option<&Value> {
    message.get("id")
}
