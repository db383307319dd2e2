use crate::tenant::BOARD_ID_HEADER;
use crate::trace::SourceLocation;
use chrono::{DateTime, SecondsFormat, Utc};
use hyper::Request;
use hyper::header::{HOST, USER_AGENT};
use serde::Serialize;

/// Sentinel request path/method for failures outside request handling.
pub const STARTUP_SENTINEL: &str = "STARTUP";

/// Sentinel user agent for failures outside request handling.
pub const STARTUP_USER_AGENT: &str = "STARTUP_ERROR";

/// Distinguishes a recovered mid-request panic from a reported startup
/// failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    Panic,
    Error,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Panic => "panic",
            FailureKind::Error => "error",
        }
    }
}

/// Request metadata captured before the downstream handler runs, so it is
/// still available if the handler panics and the request is consumed.
#[derive(Clone, Debug)]
pub struct RequestMeta {
    pub path: String,
    pub method: String,
    pub user_agent: String,
    pub host: Option<String>,
    pub query: Option<String>,
    pub board_id_header: Option<String>,
}

impl RequestMeta {
    pub fn capture<B>(req: &Request<B>) -> Self {
        Self {
            path: req.uri().path().to_string(),
            method: req.method().to_string(),
            user_agent: header_str(req, USER_AGENT).unwrap_or_default(),
            host: header_str(req, HOST).or_else(|| req.uri().host().map(String::from)),
            query: req.uri().query().map(String::from),
            board_id_header: header_str(req, BOARD_ID_HEADER),
        }
    }

    /// Fixed metadata for failures that occur before the server is
    /// accepting requests.
    pub fn startup() -> Self {
        Self {
            path: STARTUP_SENTINEL.to_string(),
            method: STARTUP_SENTINEL.to_string(),
            user_agent: STARTUP_USER_AGENT.to_string(),
            host: None,
            query: None,
            board_id_header: None,
        }
    }
}

fn header_str<B>(req: &Request<B>, name: impl hyper::header::AsHeaderName) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(String::from)
}

/// One recovered failure, fully constructed before dispatch and never
/// mutated afterwards. Lives only for the duration of the failure path;
/// nothing is persisted.
#[derive(Clone, Debug)]
pub struct FailureEvent {
    pub board_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub source: Option<SourceLocation>,
    pub message: String,
    pub trace: String,
    pub meta: RequestMeta,
    pub kind: FailureKind,
}

impl FailureEvent {
    pub fn new(
        kind: FailureKind,
        message: String,
        trace: String,
        source: Option<SourceLocation>,
        board_id: Option<String>,
        meta: RequestMeta,
    ) -> Self {
        Self {
            board_id,
            timestamp: Utc::now(),
            source,
            message,
            trace,
            meta,
            kind,
        }
    }

    /// Encodes the event into the wire payload. Absent optionals become
    /// JSON `null` so the consumer can tell "unknown" from "empty";
    /// free-text fields get standard JSON escaping (backslash first, then
    /// quotes, then control characters).
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(&ErrorReport::from(self))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorReport<'a> {
    board_id: Option<&'a str>,
    timestamp: String,
    file: Option<&'a str>,
    line: Option<u32>,
    stack_trace: &'a str,
    message: &'a str,
    exception_type: &'a str,
    request_path: &'a str,
    request_method: &'a str,
    user_agent: &'a str,
}

impl<'a> From<&'a FailureEvent> for ErrorReport<'a> {
    fn from(event: &'a FailureEvent) -> Self {
        Self {
            board_id: event.board_id.as_deref(),
            timestamp: event
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            file: event.source.as_ref().map(|loc| loc.file.as_str()),
            line: event.source.as_ref().map(|loc| loc.line),
            stack_trace: &event.trace,
            message: &event.message,
            exception_type: event.kind.as_str(),
            request_path: &event.meta.path,
            request_method: &event.meta.method,
            user_agent: &event.meta.user_agent,
        }
    }
}
