//! JSON-RPC endpoint with LSP message framing
//!
//! A byte-at-a-time incremental parser for the LSP envelope
//! (`Content-Length` header block, CRLF-terminated, followed by a JSON body)
//! plus the dispatch state machine sitting on top of it: lifecycle gating,
//! `$/setTrace` handling, method routing, and error reporting.
//!
//! The endpoint is a plain value with no hidden global state; multiple
//! endpoints can coexist, which the tests rely on.

use crate::jsonrpc::protocol::{self, ErrorCode, JSONRPC_VERSION};
use regex::Regex;
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::{debug, error, trace, warn};

/// Header lines are `Name: Value`; surrounding value whitespace is trimmed.
/// Part of the wire contract, pinned here and covered by unit tests.
const HEADER_LINE_PATTERN: &str = r"^([^:]+):\s*(.+?)\s*$";

const CONTENT_LENGTH: &str = "Content-Length";
const LE: &str = "\r\n";

/// Maximum body size to prevent memory exhaustion; the declared length is
/// handed to `Vec::reserve`, so it must be bounded before that happens.
const MAX_CONTENT_LENGTH: usize = 16 * 1024 * 1024; // 16MB

/// Errors returned by method and response handlers; logged and swallowed at
/// the dispatch boundary so a failing handler cannot take the server down.
pub type HandlerError = Box<dyn std::error::Error>;

/// Handler for an inbound request or notification
pub type MethodHandler = Box<dyn FnMut(&Value, &mut Outbound) -> Result<(), HandlerError>>;

/// Handler for inbound responses to server-initiated requests
pub type ResponseHandler = Box<dyn FnMut(&Value, &mut Outbound) -> Result<(), HandlerError>>;

/// Sink receiving fully framed outbound bytes
pub type OutputSink = Box<dyn FnMut(&[u8])>;

// ============================================================================
// Outbound Half
// ============================================================================

/// The writing half of the endpoint: output sink plus the tracing flags.
///
/// Split from the parser state so that handlers invoked synchronously from
/// [`Endpoint::consume`] can compose replies without re-borrowing the
/// endpoint itself.
#[derive(Default)]
pub struct Outbound {
    sink: Option<OutputSink>,
    tracing: bool,
    verbose: bool,
}

impl Outbound {
    /// Serialize `payload` (merging in `jsonrpc: "2.0"`), wrap it in the LSP
    /// envelope and emit it to the output sink.
    pub fn write(&mut self, payload: Value) {
        let mut body = payload;
        if let Value::Object(map) = &mut body {
            map.entry("jsonrpc")
                .or_insert_with(|| Value::String(JSONRPC_VERSION.to_string()));
        }
        let content = body.to_string();
        let frame = format!(
            "{CONTENT_LENGTH}: {}{LE}Content-Type: application/vscode-jsonrpc;charset=utf-8{LE}{LE}{content}",
            content.len()
        );
        match self.sink.as_mut() {
            Some(sink) => {
                trace!("Endpoint: Writing frame ({} bytes content)", content.len());
                sink(frame.as_bytes());
            }
            None => error!("Endpoint: No output sink registered, dropping message"),
        }
    }

    /// Emit a JSON-RPC error response, echoing `id` when the failing message
    /// carried one.
    pub fn write_error(&mut self, id: Option<&Value>, code: ErrorCode, message: &str) {
        trace!("Endpoint: Reporting error '{}' ({})", message, code.code());
        self.write(protocol::error_payload(id, code, message));
    }

    /// Emit a `$/logTrace` notification if tracing is enabled.
    ///
    /// The `verbose` field is attached only when verbose tracing was
    /// requested via `initialize` or `$/setTrace`.
    pub fn log_trace(&mut self, message: &str, verbose: &str) {
        if !self.tracing {
            debug!("Endpoint: Tracing is disabled");
            trace!("Endpoint: The message was '{}', verbose: '{}'", message, verbose);
            return;
        }
        let mut params = json!({ "message": message });
        if self.verbose {
            params["verbose"] = json!(verbose);
        }
        self.write(json!({ "method": "$/logTrace", "params": params }));
    }
}

// ============================================================================
// Endpoint
// ============================================================================

/// Framing phase of the inbound parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    ReadingHeaders,
    ReadingBody,
}

/// JSON-RPC endpoint driven one byte at a time.
///
/// The owning byte pump feeds [`consume`](Endpoint::consume) and calls
/// [`reset`](Endpoint::reset) whenever [`is_ready`](Endpoint::is_ready)
/// reports a completed message. Handlers run synchronously from `consume`
/// and must not re-enter it.
pub struct Endpoint {
    phase: Phase,
    buffer: Vec<u8>,
    headers: HashMap<String, String>,
    content_length: usize,
    initialized: bool,
    busy: bool,
    header_regex: Regex,
    handlers: HashMap<String, MethodHandler>,
    response_handler: Option<ResponseHandler>,
    outbound: Outbound,
}

impl Endpoint {
    pub fn new() -> Self {
        Self {
            phase: Phase::ReadingHeaders,
            buffer: Vec::new(),
            headers: HashMap::new(),
            content_length: 0,
            initialized: false,
            busy: true,
            header_regex: Regex::new(HEADER_LINE_PATTERN).expect("header pattern must compile"),
            handlers: HashMap::new(),
            response_handler: None,
            outbound: Outbound::default(),
        }
    }

    /// Install or replace the handler for `method`
    pub fn register_method(
        &mut self,
        method: impl Into<String>,
        handler: impl FnMut(&Value, &mut Outbound) -> Result<(), HandlerError> + 'static,
    ) {
        let method = method.into();
        trace!("Endpoint: Set handler for method '{}'", method);
        self.handlers.insert(method, Box::new(handler));
    }

    /// Install the sink for inbound responses to server-initiated requests
    pub fn register_response_handler(
        &mut self,
        handler: impl FnMut(&Value, &mut Outbound) -> Result<(), HandlerError> + 'static,
    ) {
        trace!("Endpoint: Set response handler");
        self.response_handler = Some(Box::new(handler));
    }

    /// Install the outbound byte sink
    pub fn register_output(&mut self, sink: impl FnMut(&[u8]) + 'static) {
        trace!("Endpoint: Set output sink");
        self.outbound.sink = Some(Box::new(sink));
    }

    /// Feed one byte of input. Never blocks; may synchronously emit output
    /// and invoke a handler before returning.
    pub fn consume(&mut self, byte: u8) {
        self.buffer.push(byte);
        match self.phase {
            Phase::ReadingBody => {
                if self.buffer.len() == self.content_length {
                    self.dispatch();
                }
            }
            Phase::ReadingHeaders => {
                if !self.buffer.ends_with(LE.as_bytes()) {
                    return;
                }
                if self.buffer.len() == LE.len() {
                    self.finish_headers();
                } else {
                    self.read_header_line();
                    self.buffer.clear();
                }
            }
        }
    }

    /// True once a message has completed dispatch; the pump must call
    /// [`reset`](Endpoint::reset) before feeding further bytes.
    pub fn is_ready(&self) -> bool {
        !self.busy
    }

    /// Clear per-message state while preserving lifecycle flags and handler
    /// registrations.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.headers.clear();
        self.content_length = 0;
        self.phase = Phase::ReadingHeaders;
        self.busy = true;
    }

    /// Write a framed message to the output sink. See [`Outbound::write`].
    pub fn write(&mut self, payload: Value) {
        self.outbound.write(payload);
    }

    /// Emit a `$/logTrace` notification. See [`Outbound::log_trace`].
    pub fn log_trace(&mut self, message: &str, verbose: &str) {
        self.outbound.log_trace(message, verbose);
    }

    /// Parse one completed `Name: Value` header line out of the buffer.
    fn read_header_line(&mut self) {
        let line = String::from_utf8_lossy(&self.buffer[..self.buffer.len() - LE.len()]).to_string();
        match self.header_regex.captures(&line) {
            Some(captures) => {
                let name = captures[1].to_string();
                let value = captures[2].to_string();
                if name == CONTENT_LENGTH {
                    self.content_length = value.parse().unwrap_or_else(|_| {
                        error!("Endpoint: Invalid {} value: '{}'", CONTENT_LENGTH, value);
                        0
                    });
                }
                trace!("Endpoint: Header '{}: {}'", name, value);
                self.headers.insert(name, value);
            }
            // Drop the line so the empty-line terminator stays reachable;
            // a missing Content-Length surfaces as InvalidRequest below.
            None => warn!("Endpoint: Discarding malformed header line: '{}'", line),
        }
    }

    /// Handle the empty CRLF line closing the header region.
    fn finish_headers(&mut self) {
        self.buffer.clear();
        if self.content_length == 0 {
            self.headers.clear();
            self.outbound
                .write_error(None, ErrorCode::InvalidRequest, "Invalid content length");
        } else if self.content_length > MAX_CONTENT_LENGTH {
            let message = format!(
                "Message too large: {} bytes (max: {})",
                self.content_length, MAX_CONTENT_LENGTH
            );
            error!("Endpoint: {}", message);
            self.content_length = 0;
            self.headers.clear();
            self.outbound
                .write_error(None, ErrorCode::InvalidRequest, &message);
        } else {
            self.phase = Phase::ReadingBody;
            self.buffer.reserve(self.content_length);
        }
    }

    /// Parse the completed body and route it. Always clears `busy` exactly
    /// once, whether through a handler, an error response, or a silent drop.
    fn dispatch(&mut self) {
        match serde_json::from_slice::<Value>(&self.buffer) {
            Ok(body) => self.route(&body),
            Err(err) => {
                error!("Endpoint: Failed to parse request: {}", err);
                self.buffer.clear();
                self.outbound
                    .write_error(None, ErrorCode::ParseError, "Failed to parse request");
            }
        }
        self.busy = false;
    }

    fn route(&mut self, body: &Value) {
        let Some(method) = protocol::method_of(body).map(str::to_owned) else {
            // No method: this is a response to a server-initiated request.
            if let Some(handler) = self.response_handler.as_mut() {
                debug!("Endpoint: Calling handler for a client response");
                if let Err(err) = handler(body, &mut self.outbound) {
                    error!("Endpoint: Response handler failed: {}", err);
                }
            }
            return;
        };

        if method == "initialize" {
            let trace = body
                .pointer("/params/trace")
                .and_then(Value::as_str)
                .unwrap_or("off");
            self.update_tracing(trace);
            self.initialized = true;
        } else if !self.initialized {
            error!("Endpoint: Unexpected first message: '{}'", method);
            self.outbound.write_error(
                protocol::id_of(body),
                ErrorCode::NotInitialized,
                "Server was not initialized.",
            );
            return;
        } else if method == "$/setTrace" {
            match body.pointer("/params/value").and_then(Value::as_str) {
                Some(value) => self.update_tracing(value),
                None => error!("Endpoint: Failed to read tracing value from $/setTrace"),
            }
        }

        self.fire_method(&method, body);
    }

    fn update_tracing(&mut self, trace: &str) {
        self.outbound.tracing = trace != "off";
        self.outbound.verbose = trace == "verbose";
        debug!(
            "Endpoint: Tracing is {}, verbose: {}",
            self.outbound.tracing, self.outbound.verbose
        );
    }

    fn fire_method(&mut self, method: &str, body: &Value) {
        match self.handlers.get_mut(method) {
            Some(handler) => {
                debug!("Endpoint: Calling handler for method '{}'", method);
                if let Err(err) = handler(body, &mut self.outbound) {
                    error!("Endpoint: Failed to handle method '{}': {}", method, err);
                }
            }
            None => {
                let id = protocol::id_of(body);
                // A response is owed for anything carrying an id, and for
                // named methods outside the optional `$/` namespace.
                let must_respond = id.is_some() || !method.starts_with("$/");
                debug!(
                    "Endpoint: No handler for '{}', response required: {}",
                    method, must_respond
                );
                if must_respond {
                    self.outbound.write_error(
                        id,
                        ErrorCode::MethodNotFound,
                        &format!("Method '{}' is not supported.", method),
                    );
                }
            }
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Frames = Rc<RefCell<Vec<Vec<u8>>>>;

    /// Endpoint wired to a sink that records every outbound frame
    fn recording_endpoint() -> (Endpoint, Frames) {
        let frames: Frames = Rc::new(RefCell::new(Vec::new()));
        let mut endpoint = Endpoint::new();
        let sink_frames = Rc::clone(&frames);
        endpoint.register_output(move |bytes| sink_frames.borrow_mut().push(bytes.to_vec()));
        (endpoint, frames)
    }

    fn frame(content: &str) -> String {
        format!(
            "Content-Length: {}\r\nContent-Type: application/vscode-jsonrpc;charset=utf-8\r\n\r\n{}",
            content.len(),
            content
        )
    }

    /// Feed bytes the way the byte pump does: reset after each dispatch
    fn pump(endpoint: &mut Endpoint, bytes: &[u8]) {
        for &byte in bytes {
            endpoint.consume(byte);
            if endpoint.is_ready() {
                endpoint.reset();
            }
        }
    }

    /// Strip the header block of an outbound frame and parse the body
    fn body_of(frame: &[u8]) -> Value {
        let text = std::str::from_utf8(frame).expect("frame must be UTF-8");
        let separator = text.find("\r\n\r\n").expect("frame must contain a header block");
        serde_json::from_str(&text[separator + 4..]).expect("frame body must be JSON")
    }

    fn initialize(endpoint: &mut Endpoint, trace: &str) {
        endpoint.register_method("initialize", |_, _| Ok(()));
        let request = frame(
            &json!({"id": 0, "method": "initialize", "params": {"processId": 60650, "trace": trace}})
                .to_string(),
        );
        pump(endpoint, request.as_bytes());
    }

    #[test]
    fn test_header_line_pattern() {
        let regex = Regex::new(HEADER_LINE_PATTERN).unwrap();

        let captures = regex.captures("Content-Length: 128").unwrap();
        assert_eq!(&captures[1], "Content-Length");
        assert_eq!(&captures[2], "128");

        // Value whitespace is trimmed, header names are taken verbatim
        let captures = regex.captures("Content-Type:  application/vscode-jsonrpc  ").unwrap();
        assert_eq!(&captures[2], "application/vscode-jsonrpc");

        assert!(regex.captures("no separator here").is_none());
    }

    #[test]
    fn test_write_produces_framed_message() {
        let (mut endpoint, frames) = recording_endpoint();
        endpoint.write(json!({"id": 1, "result": {}}));

        let frames = frames.borrow();
        assert_eq!(frames.len(), 1);

        let text = std::str::from_utf8(&frames[0]).unwrap();
        let body_start = text.find("\r\n\r\n").unwrap() + 4;
        let content = &text[body_start..];
        assert!(text.starts_with(&format!("Content-Length: {}\r\n", content.len())));
        assert!(text.contains("Content-Type: application/vscode-jsonrpc;charset=utf-8\r\n"));

        let body: Value = serde_json::from_str(content).unwrap();
        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["id"], 1);
    }

    #[test]
    fn test_framing_round_trip() {
        // A frame produced by write() comes back through consume() as the
        // same object, modulo the injected version field.
        let (mut sender, sent) = recording_endpoint();
        sender.write(json!({"method": "textDocument/didOpen", "params": {"textDocument": {"uri": "file:///a.cl"}}}));

        let (mut receiver, _) = recording_endpoint();
        initialize(&mut receiver, "off");

        let received: Frames = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&received);
        receiver.register_method("textDocument/didOpen", move |message, _| {
            log.borrow_mut().push(message.to_string().into_bytes());
            Ok(())
        });

        pump(&mut receiver, &sent.borrow()[0]);

        let received = received.borrow();
        assert_eq!(received.len(), 1);
        let message: Value = serde_json::from_slice(&received[0]).unwrap();
        assert_eq!(message["jsonrpc"], "2.0");
        assert_eq!(message["method"], "textDocument/didOpen");
        assert_eq!(message["params"]["textDocument"]["uri"], "file:///a.cl");
    }

    #[test]
    fn test_parse_error_reported() {
        let (mut endpoint, frames) = recording_endpoint();
        let request = frame(r#"{"jsonrpc: 2.0", "id":0, [method]: "initialize"}"#);
        pump(&mut endpoint, request.as_bytes());

        let frames = frames.borrow();
        assert_eq!(frames.len(), 1);
        assert_eq!(body_of(&frames[0])["error"]["code"], -32700);
    }

    #[test]
    fn test_out_of_order_request_rejected() {
        // Anything but initialize is refused until the handshake happened.
        let (mut endpoint, frames) = recording_endpoint();

        let invoked = Rc::new(RefCell::new(0));
        let count = Rc::clone(&invoked);
        endpoint.register_method("textDocument/didOpen", move |_, _| {
            *count.borrow_mut() += 1;
            Ok(())
        });

        let request = frame(
            &json!({"id": 0, "method": "textDocument/didOpen", "params": {}}).to_string(),
        );
        pump(&mut endpoint, request.as_bytes());

        let frames = frames.borrow();
        assert_eq!(frames.len(), 1);
        assert_eq!(body_of(&frames[0])["error"]["code"], -32002);
        assert_eq!(*invoked.borrow(), 0);
    }

    #[test]
    fn test_unsupported_method_answered() {
        let (mut endpoint, frames) = recording_endpoint();
        initialize(&mut endpoint, "off");

        let request = frame(&json!({"id": 7, "method": "textDocument/foo", "params": {}}).to_string());
        pump(&mut endpoint, request.as_bytes());

        let frames = frames.borrow();
        assert_eq!(frames.len(), 1);
        let body = body_of(&frames[0]);
        assert_eq!(body["error"]["code"], -32601);
        assert_eq!(body["id"], 7);
    }

    #[test]
    fn test_optional_notification_dropped_silently() {
        let (mut endpoint, frames) = recording_endpoint();
        initialize(&mut endpoint, "off");

        let request = frame(&json!({"method": "$/cancelRequest", "params": {}}).to_string());
        pump(&mut endpoint, request.as_bytes());

        assert!(frames.borrow().is_empty());
        assert!(!endpoint.is_ready()); // pump() already reset for the next message
    }

    #[test]
    fn test_invalid_content_length_rejected() {
        let (mut endpoint, frames) = recording_endpoint();
        for byte in b"Content-Length: 0\r\n\r\n" {
            endpoint.consume(*byte);
        }

        {
            let frames = frames.borrow();
            assert_eq!(frames.len(), 1);
            assert_eq!(body_of(&frames[0])["error"]["code"], -32600);
        }

        // The endpoint stays in the header phase and accepts the next frame.
        initialize(&mut endpoint, "off");
        let request = frame(&json!({"id": 1, "method": "shutdown"}).to_string());
        pump(&mut endpoint, request.as_bytes());
        assert_eq!(body_of(frames.borrow().last().unwrap())["error"]["code"], -32601);
    }

    #[test]
    fn test_oversized_content_length_rejected() {
        // A hostile length must be refused before any buffer reservation.
        let (mut endpoint, frames) = recording_endpoint();
        for byte in b"Content-Length: 999999999999\r\n\r\n" {
            endpoint.consume(*byte);
        }

        {
            let frames = frames.borrow();
            assert_eq!(frames.len(), 1);
            let body = body_of(&frames[0]);
            assert_eq!(body["error"]["code"], -32600);
            assert!(
                body["error"]["message"]
                    .as_str()
                    .unwrap()
                    .contains("too large")
            );
        }

        // The endpoint stays usable afterwards.
        initialize(&mut endpoint, "off");
        let request = frame(&json!({"id": 5, "method": "workspace/foo"}).to_string());
        pump(&mut endpoint, request.as_bytes());
        assert_eq!(body_of(frames.borrow().last().unwrap())["error"]["code"], -32601);
    }

    #[test]
    fn test_garbage_header_line_recovers() {
        let (mut endpoint, frames) = recording_endpoint();
        for byte in b"complete garbage\r\n\r\n" {
            endpoint.consume(*byte);
        }
        let frames = frames.borrow();
        assert_eq!(frames.len(), 1);
        assert_eq!(body_of(&frames[0])["error"]["code"], -32600);
    }

    #[test]
    fn test_chunk_boundaries_are_invisible() {
        // Consuming the same bytes in chunks of different sizes is
        // observationally identical.
        let request = frame(&json!({"id": 2, "method": "workspace/foo"}).to_string());

        let mut outputs = Vec::new();
        for chunk_size in [1usize, 3, 7, request.len()] {
            let (mut endpoint, frames) = recording_endpoint();
            initialize(&mut endpoint, "off");
            for chunk in request.as_bytes().chunks(chunk_size) {
                pump(&mut endpoint, chunk);
            }
            outputs.push(frames.borrow().clone());
        }

        for output in &outputs[1..] {
            assert_eq!(output, &outputs[0]);
        }
    }

    #[test]
    fn test_trace_notification_after_set_trace() {
        let (mut endpoint, frames) = recording_endpoint();
        initialize(&mut endpoint, "off");

        // Tracing was requested off, so nothing goes out.
        endpoint.log_trace("quiet", "");
        assert!(frames.borrow().is_empty());

        let request = frame(&json!({"method": "$/setTrace", "params": {"value": "verbose"}}).to_string());
        pump(&mut endpoint, request.as_bytes());
        endpoint.log_trace("hi", "detail");

        let frames = frames.borrow();
        let traces: Vec<Value> = frames
            .iter()
            .map(|frame| body_of(frame))
            .filter(|body| body["method"] == "$/logTrace")
            .collect();
        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0]["params"]["message"], "hi");
        assert_eq!(traces[0]["params"]["verbose"], "detail");
    }

    #[test]
    fn test_messages_trace_level_omits_verbose_field() {
        let (mut endpoint, frames) = recording_endpoint();
        initialize(&mut endpoint, "messages");

        endpoint.log_trace("hi", "detail");

        let frames = frames.borrow();
        assert_eq!(frames.len(), 1);
        let body = body_of(&frames[0]);
        assert_eq!(body["params"]["message"], "hi");
        assert!(body["params"].get("verbose").is_none());
    }

    #[test]
    fn test_failing_handler_leaves_endpoint_ready() {
        let (mut endpoint, frames) = recording_endpoint();
        initialize(&mut endpoint, "off");
        endpoint.register_method("workspace/broken", |_, _| Err("boom".into()));

        let request = frame(&json!({"id": 3, "method": "workspace/broken"}).to_string());
        for byte in request.as_bytes() {
            endpoint.consume(*byte);
        }
        assert!(endpoint.is_ready());
        endpoint.reset();

        // The next message is still dispatched normally.
        let request = frame(&json!({"id": 4, "method": "workspace/other"}).to_string());
        pump(&mut endpoint, request.as_bytes());
        let frames = frames.borrow();
        assert_eq!(body_of(frames.last().unwrap())["error"]["code"], -32601);
    }

    #[test]
    fn test_response_routed_to_response_handler() {
        let (mut endpoint, _) = recording_endpoint();
        initialize(&mut endpoint, "off");

        let responses = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&responses);
        endpoint.register_response_handler(move |message, _| {
            log.borrow_mut().push(message.clone());
            Ok(())
        });

        let response = frame(&json!({"id": 12, "result": {"applied": true}}).to_string());
        pump(&mut endpoint, response.as_bytes());

        let responses = responses.borrow();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["result"]["applied"], true);
    }

    #[test]
    fn test_reset_preserves_lifecycle_and_handlers() {
        let (mut endpoint, frames) = recording_endpoint();
        initialize(&mut endpoint, "off");
        endpoint.reset();

        // Still initialized: an unknown method gets MethodNotFound, not the
        // NotInitialized gate.
        let request = frame(&json!({"id": 9, "method": "workspace/foo"}).to_string());
        pump(&mut endpoint, request.as_bytes());
        assert_eq!(body_of(&frames.borrow()[0])["error"]["code"], -32601);
    }

    #[test]
    fn test_unknown_headers_are_stored() {
        let (mut endpoint, _) = recording_endpoint();
        let content = json!({"id": 0, "method": "initialize", "params": {}}).to_string();
        let framed = format!(
            "X-Custom: hello\r\nContent-Length: {}\r\n\r\n{}",
            content.len(),
            content
        );
        for byte in framed.as_bytes() {
            endpoint.consume(*byte);
            if endpoint.is_ready() {
                break; // keep per-message state for inspection
            }
        }
        assert_eq!(endpoint.headers.get("X-Custom").map(String::as_str), Some("hello"));
    }
}
