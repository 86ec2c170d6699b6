use std::fmt::Write as _;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use reqwest::header::HeaderMap;
use reqwest::Request;
use tracing::warn;

use crate::http::transport::{ResponseEnvelope, Transport, TransportError};

/// Shared destination for request/response dumps.
pub type DebugSink = Arc<Mutex<Box<dyn Write + Send>>>;

/// Wrap any writer as a [`DebugSink`].
pub fn debug_sink<W: Write + Send + 'static>(writer: W) -> DebugSink {
    Arc::new(Mutex::new(Box::new(writer)))
}

const REDACTED: &str = "[REDACTED]";

static SENSITIVE_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(authorization|proxy-authorization|cookie|set-cookie|api-key|x-api-key)$")
        .expect("SENSITIVE_HEADER should compile - this is a bug")
});

static SENSITIVE_JSON_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)("(?:password|secret|client_secret|access_token|refresh_token|id_token|token)"\s*:\s*")[^"]*(")"#,
    )
    .expect("SENSITIVE_JSON_FIELD should compile - this is a bug")
});

static SENSITIVE_FORM_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)((?:^|&)(?:password|secret|client_secret|access_token|refresh_token|id_token|token)=)[^&]*",
    )
    .expect("SENSITIVE_FORM_FIELD should compile - this is a bug")
});

/// Dumps every request and response to a sink, then forwards unchanged.
///
/// Each wrapper numbers its requests from zero. Sink failures are logged and
/// otherwise ignored; they never fail the request.
pub struct LoggingTransport {
    next: Arc<dyn Transport>,
    sink: DebugSink,
    next_id: AtomicU64,
}

impl LoggingTransport {
    pub fn new(next: Arc<dyn Transport>, sink: DebugSink) -> Self {
        Self { next, sink, next_id: AtomicU64::new(0) }
    }

    fn write(&self, text: &str) {
        let mut sink = self.sink.lock();
        if let Err(err) = sink.write_all(text.as_bytes()).and_then(|()| sink.flush()) {
            warn!(error = %err, "failed to write HTTP debug log");
        }
    }
}

#[async_trait]
impl Transport for LoggingTransport {
    async fn round_trip(&self, request: Request) -> Result<ResponseEnvelope, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        self.write(&format!(
            "[dip-api {id}] --- Request start --- {}\n{}\n[dip-api {id}] --- Request end ---\n",
            timestamp(),
            dump_request(&request)
        ));

        let result = self.next.round_trip(request).await;

        let dumped = match &result {
            Ok(envelope) => dump_response(envelope),
            Err(err) => match err.envelope() {
                Some(partial) => format!("{}\nerror: {err}", dump_response(partial)),
                None => format!("error: {err}"),
            },
        };
        self.write(&format!(
            "[dip-api {id}] --- Response start --- {}\n{dumped}\n[dip-api {id}] --- Response end ---\n",
            timestamp()
        ));

        result
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn dump_request(request: &Request) -> String {
    let mut out = format!("{} {} HTTP/1.1\n", request.method(), request.url());
    dump_headers(&mut out, request.headers());
    if let Some(body) = request.body().and_then(reqwest::Body::as_bytes) {
        out.push('\n');
        out.push_str(&redact_body(&String::from_utf8_lossy(body)));
    }
    out
}

fn dump_response(envelope: &ResponseEnvelope) -> String {
    let mut out = format!("HTTP/1.1 {}\n", envelope.status);
    dump_headers(&mut out, &envelope.headers);
    if !envelope.body.is_empty() {
        out.push('\n');
        out.push_str(&redact_body(&envelope.text()));
    }
    out
}

fn dump_headers(out: &mut String, headers: &HeaderMap) {
    for (name, value) in headers {
        let shown = if SENSITIVE_HEADER.is_match(name.as_str()) {
            REDACTED.to_string()
        } else {
            String::from_utf8_lossy(value.as_bytes()).into_owned()
        };
        let _ = writeln!(out, "{name}: {shown}");
    }
}

/// Mask credentials in JSON or form-encoded bodies.
pub fn redact_body(body: &str) -> String {
    let masked = SENSITIVE_JSON_FIELD.replace_all(body, format!("${{1}}{REDACTED}${{2}}"));
    SENSITIVE_FORM_FIELD.replace_all(&masked, format!("${{1}}{REDACTED}")).into_owned()
}
