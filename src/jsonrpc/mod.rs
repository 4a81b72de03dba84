//! JSON-RPC 2.0 endpoint with LSP framing
//!
//! Layered the same way the wire is:
//!
//! - **Protocol**: version constant, error codes, payload helpers
//! - **Endpoint**: byte-at-a-time framing parser, lifecycle gating and
//!   dispatch, plus the outbound writing half

pub mod endpoint;
pub mod protocol;

pub use endpoint::{Endpoint, HandlerError, Outbound};
pub use protocol::ErrorCode;
