//! Language server for the OpenCL C kernel language
//!
//! Speaks LSP framing and JSON-RPC 2.0 over a byte stream and produces
//! diagnostics by compiling kernels on a real OpenCL device, translating
//! the driver's build log into LSP `Diagnostic` records.
//!
//! Layering, leaves first:
//!
//! - **opencl**: driver seam (traits + mock, system backend behind the
//!   `opencl` feature) and device inspection
//! - **diagnostics**: device selection policy, compile driver, build-log
//!   parsing
//! - **jsonrpc**: byte-at-a-time framing, lifecycle, dispatch
//! - **server**: LSP method handlers and the document store
//! - **logging**: tracing setup (stderr or file; stdout is the wire)

pub mod diagnostics;
pub mod jsonrpc;
pub mod logging;
pub mod opencl;
pub mod server;
