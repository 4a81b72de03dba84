//! LSP method handlers gluing the endpoint to the diagnostics engine
//!
//! Registers the server's method surface, keeps the latest text of every
//! open document and publishes diagnostics whenever a document changes.
//! The server advertises full-document sync, so `didChange` always carries
//! the complete text.

use crate::diagnostics::{DiagnosticsEngine, Source};
use crate::jsonrpc::{Endpoint, HandlerError, Outbound};
use serde_json::{Value, json};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{debug, error, info};

/// Document store plus lifecycle flags, shared across handlers
#[derive(Default)]
struct ServerState {
    /// uri → latest full document text
    documents: HashMap<String, String>,
    shutdown_requested: bool,
    exit_code: Option<i32>,
}

/// The language server: a JSON-RPC endpoint with the LSP method surface
/// registered against a diagnostics engine.
pub struct LspServer {
    endpoint: Endpoint,
    state: Rc<RefCell<ServerState>>,
}

impl LspServer {
    pub fn new(engine: DiagnosticsEngine) -> Self {
        let engine = Rc::new(RefCell::new(engine));
        let state = Rc::new(RefCell::new(ServerState::default()));
        let mut endpoint = Endpoint::new();
        register_handlers(&mut endpoint, &engine, &state);
        Self { endpoint, state }
    }

    /// Install the outbound byte sink
    pub fn register_output(&mut self, sink: impl FnMut(&[u8]) + 'static) {
        self.endpoint.register_output(sink);
    }

    /// Feed one byte from the transport
    pub fn consume(&mut self, byte: u8) {
        self.endpoint.consume(byte);
    }

    /// True once a message completed dispatch; call [`reset`](Self::reset)
    /// before feeding further bytes.
    pub fn is_ready(&self) -> bool {
        self.endpoint.is_ready()
    }

    pub fn reset(&mut self) {
        self.endpoint.reset();
    }

    /// Exit code requested via the `exit` notification, if any
    pub fn exit_code(&self) -> Option<i32> {
        self.state.borrow().exit_code
    }
}

// ============================================================================
// Handler Registration
// ============================================================================

fn register_handlers(
    endpoint: &mut Endpoint,
    engine: &Rc<RefCell<DiagnosticsEngine>>,
    state: &Rc<RefCell<ServerState>>,
) {
    {
        let engine = Rc::clone(engine);
        endpoint.register_method("initialize", move |message, out| {
            let options = &message["params"]["initializationOptions"];
            {
                let mut engine = engine.borrow_mut();
                if let Some(build_options) = options.get("buildOptions") {
                    engine.set_build_options(build_options);
                }
                if let Some(max_problems) =
                    options.get("maxNumberOfProblems").and_then(Value::as_u64)
                {
                    engine.set_max_problems(max_problems as usize);
                }
                if let Some(device_id) = options.get("deviceID").and_then(Value::as_u64) {
                    engine.select_device(device_id as u32);
                }
            }
            out.write(json!({
                "id": message["id"],
                "result": {
                    "capabilities": {
                        "textDocumentSync": { "openClose": true, "change": 1 }
                    }
                }
            }));
            Ok(())
        });
    }

    endpoint.register_method("initialized", |_, _| {
        debug!("Server: Client finished initialization");
        Ok(())
    });

    {
        let engine = Rc::clone(engine);
        let state = Rc::clone(state);
        endpoint.register_method("textDocument/didOpen", move |message, out| {
            let uri = document_uri(message)?;
            let text = message
                .pointer("/params/textDocument/text")
                .and_then(Value::as_str)
                .ok_or("didOpen without document text")?
                .to_string();
            debug!("Server: Opened document {}", uri);
            state.borrow_mut().documents.insert(uri.clone(), text.clone());
            publish(&engine.borrow(), out, &uri, &text);
            Ok(())
        });
    }

    {
        let engine = Rc::clone(engine);
        let state = Rc::clone(state);
        endpoint.register_method("textDocument/didChange", move |message, out| {
            let uri = document_uri(message)?;
            // Full sync: the last change entry carries the whole document.
            let text = message
                .pointer("/params/contentChanges")
                .and_then(Value::as_array)
                .and_then(|changes| changes.last())
                .and_then(|change| change.get("text"))
                .and_then(Value::as_str)
                .ok_or("didChange without full document text")?
                .to_string();
            state.borrow_mut().documents.insert(uri.clone(), text.clone());
            publish(&engine.borrow(), out, &uri, &text);
            Ok(())
        });
    }

    {
        let state = Rc::clone(state);
        endpoint.register_method("textDocument/didClose", move |message, out| {
            let uri = document_uri(message)?;
            debug!("Server: Closed document {}", uri);
            state.borrow_mut().documents.remove(&uri);
            // Clear any squiggles the editor still shows for the document.
            out.write(json!({
                "method": "textDocument/publishDiagnostics",
                "params": { "uri": uri, "diagnostics": [] }
            }));
            Ok(())
        });
    }

    {
        let engine = Rc::clone(engine);
        let state = Rc::clone(state);
        endpoint.register_method("$/revalidate", move |message, out| {
            let uri = message
                .pointer("/params/uri")
                .and_then(Value::as_str)
                .ok_or("revalidation without a document uri")?
                .to_string();
            let text = state
                .borrow()
                .documents
                .get(&uri)
                .cloned()
                .ok_or_else(|| format!("unknown document: {}", uri))?;
            publish(&engine.borrow(), out, &uri, &text);
            Ok(())
        });
    }

    {
        let state = Rc::clone(state);
        endpoint.register_method("shutdown", move |message, out| {
            info!("Server: Shutdown requested");
            state.borrow_mut().shutdown_requested = true;
            out.write(json!({ "id": message["id"], "result": null }));
            Ok(())
        });
    }

    {
        let state = Rc::clone(state);
        endpoint.register_method("exit", move |_, _| {
            let mut state = state.borrow_mut();
            let code = if state.shutdown_requested { 0 } else { 1 };
            info!("Server: Exit requested, code {}", code);
            state.exit_code = Some(code);
            Ok(())
        });
    }
}

fn document_uri(message: &Value) -> Result<String, HandlerError> {
    Ok(message
        .pointer("/params/textDocument/uri")
        .and_then(Value::as_str)
        .ok_or("message without a document uri")?
        .to_string())
}

/// Run diagnostics for a document and publish the result.
///
/// `publishDiagnostics` is a notification with no error channel, so a
/// failing validation degrades to an empty report.
fn publish(engine: &DiagnosticsEngine, out: &mut Outbound, uri: &str, text: &str) {
    let source = Source {
        text: text.to_string(),
        file_path: uri_to_path(uri),
    };
    let diagnostics = match engine.get(&source) {
        Ok(diagnostics) => diagnostics,
        Err(err) => {
            error!("Server: Failed to get diagnostics for {}: {}", uri, err);
            Vec::new()
        }
    };
    info!("Server: Publishing {} diagnostics for {}", diagnostics.len(), uri);
    out.write(json!({
        "method": "textDocument/publishDiagnostics",
        "params": { "uri": uri, "diagnostics": diagnostics }
    }));
}

fn uri_to_path(uri: &str) -> Option<PathBuf> {
    uri.strip_prefix("file://").map(PathBuf::from)
}

// ============================================================================
// Tests
// ============================================================================
