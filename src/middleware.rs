//! The interception handler: runs before and after the downstream handler,
//! captures headers and bodies by content type, and emits one structured
//! log event per request.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, Method, Request, Response, StatusCode, Uri},
    middleware::Next,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tracing::debug;

use crate::capture::CaptureBody;
use crate::config::DumpConfig;
use crate::error::DumpError;
use crate::format;

/// Largest response body the middleware will buffer for inspection.
const MAX_CAPTURE_BYTES: u64 = 1024 * 1024;

/// Requests slower than this are logged as "slow request".
const SLOW_REQUEST_MS: u128 = 2000;

/// Per-request capture state. Created at request entry, consumed by one
/// log emission, never shared across requests.
#[derive(Debug, Default)]
struct Exchange {
    request_headers: Option<Value>,
    request_body: Option<Value>,
    response_headers: Option<Value>,
    response_body: Option<Value>,
    diagnostics: String,
}

impl Exchange {
    fn note(&mut self, message: &str) {
        if !self.diagnostics.is_empty() {
            self.diagnostics.push_str("; ");
        }
        self.diagnostics.push_str(message);
    }
}

/// Dump middleware entry point, attachable via
/// `axum::middleware::from_fn_with_state(Arc::new(config), axum_dump::dump)`.
///
/// Fail-open: nothing this function does can change the HTTP outcome. Every
/// capture failure becomes a diagnostic note on the emitted event.
pub async fn dump(
    State(config): State<Arc<DumpConfig>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let started = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let mut exchange = Exchange::default();

    let request = if config.show_request {
        inspect_request(&config, request, &mut exchange).await
    } else {
        request
    };

    let response = next.run(request).await;

    let response = if config.show_response {
        inspect_response(&config, response, &mut exchange).await
    } else {
        response
    };

    let elapsed_ms = started.elapsed().as_millis();
    // Emission must not delay returning the response.
    tokio::spawn(async move {
        emit(method, uri, elapsed_ms, exchange);
    });

    response
}

/// Pre-downstream phase: request headers, then the request body by content
/// type. The body is restored onto the request so downstream still reads
/// the original bytes.
async fn inspect_request(
    config: &DumpConfig,
    request: Request<Body>,
    exchange: &mut Exchange,
) -> Request<Body> {
    if config.show_headers {
        match format::headers_to_json(request.headers(), &config.header_hidden) {
            Ok(value) => exchange.request_headers = Some(value),
            Err(err) => exchange.note(&format!("parse req header err: {err}")),
        }
    }

    if !config.show_body || declared_content_length(request.headers()) == 0 {
        return request;
    }

    let (parts, body) = request.into_parts();
    let mut capture = CaptureBody::new(body);
    let bytes = match (&mut capture).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            let err = DumpError::BodyRead(err);
            exchange.note(&format!("read req body err: {err}"));
            // Downstream observes the partial bytes and the same read error.
            return Request::from_parts(parts, replay_failure(capture.into_cache(), err));
        }
    };

    match media_type(&parts.headers) {
        Ok(media) => match (media.type_(), media.subtype()) {
            (mime::TEXT, mime::PLAIN) => {
                // Not a key-value structure, no redaction.
                let text = Value::String(String::from_utf8_lossy(&bytes).into_owned());
                exchange.request_body = Some(clamp(config, text));
            }
            (mime::APPLICATION, mime::JSON) => {
                match format::json_from_bytes(&bytes, &config.body_hidden) {
                    Ok(value) => exchange.request_body = Some(clamp(config, value)),
                    Err(err) => exchange.note(&format!("parse req body err: {err}")),
                }
            }
            (mime::APPLICATION, mime::WWW_FORM_URLENCODED) => {
                match format::form_to_json(&bytes, &config.body_hidden) {
                    Ok(value) => exchange.request_body = Some(clamp(config, value)),
                    Err(err) => exchange.note(&format!("parse req body err: {err}")),
                }
            }
            // Multipart uploads and unrecognized types pass through uninspected.
            _ => {}
        },
        Err(message) => exchange.note(&message),
    }

    Request::from_parts(parts, Body::from(bytes))
}

/// Post-downstream phase: response headers, then the response body through
/// the capture adapter. The client-facing response is rebuilt from the
/// captured bytes and stays byte-identical.
async fn inspect_response(
    config: &DumpConfig,
    response: Response<Body>,
    exchange: &mut Exchange,
) -> Response<Body> {
    if config.show_headers {
        match format::headers_to_json(response.headers(), &config.header_hidden) {
            Ok(value) => exchange.response_headers = Some(value),
            Err(err) => exchange.note(&format!("parse res header err: {err}")),
        }
    }

    if !config.show_body || !body_allowed_for_status(response.status()) {
        return response;
    }

    let (parts, body) = response.into_parts();
    if let Err(err) = capturable(&body) {
        exchange.note(&err.to_string());
        return Response::from_parts(parts, body);
    }

    let mut capture = CaptureBody::new(body);
    if let Err(err) = (&mut capture).collect().await {
        let err = DumpError::BodyRead(err);
        exchange.note(&format!("read res body err: {err}"));
        return Response::from_parts(parts, replay_failure(capture.into_cache(), err));
    }

    let cached = capture.into_cache();
    if !cached.is_empty() {
        match media_type(&parts.headers) {
            Ok(media) if media.type_() == mime::APPLICATION && media.subtype() == mime::JSON => {
                match format::json_from_bytes(&cached, &config.body_hidden) {
                    Ok(value) => exchange.response_body = Some(clamp(config, value)),
                    Err(err) => exchange.note(&format!("parse res body err: {err}")),
                }
            }
            // HTML and everything else stays uninspected.
            Ok(_) => {}
            Err(message) => exchange.note(&message),
        }
    }

    Response::from_parts(parts, Body::from(cached))
}

fn emit(method: Method, uri: Uri, elapsed_ms: u128, exchange: Exchange) {
    let message = log_message(elapsed_ms);
    let duration_ms = elapsed_ms as u64;
    let Exchange {
        request_headers,
        request_body,
        response_headers,
        response_body,
        diagnostics,
    } = exchange;
    let request_headers = request_headers.unwrap_or(Value::Null);
    let request_body = request_body.unwrap_or(Value::Null);
    let response_headers = response_headers.unwrap_or(Value::Null);
    let response_body = response_body.unwrap_or(Value::Null);

    if diagnostics.is_empty() {
        debug!(
            request_url = %uri,
            request_method = %method,
            duration_ms,
            request_headers = %request_headers,
            request_body = %request_body,
            response_headers = %response_headers,
            response_body = %response_body,
            "{}",
            message,
        );
    } else {
        debug!(
            request_url = %uri,
            request_method = %method,
            duration_ms,
            request_headers = %request_headers,
            request_body = %request_body,
            response_headers = %response_headers,
            response_body = %response_body,
            dump_error = %diagnostics,
            "{}",
            message,
        );
    }
}

fn log_message(elapsed_ms: u128) -> &'static str {
    if elapsed_ms > SLOW_REQUEST_MS {
        "slow request"
    } else {
        "normal request"
    }
}

/// Rebuilds a body whose read failed partway: the bytes that arrived before
/// the failure are replayed, then the original error is surfaced, so the
/// next reader observes the same outcome it would have without the
/// middleware.
fn replay_failure(cached: Bytes, err: DumpError) -> Body {
    Body::from_stream(futures::stream::iter(vec![Ok(cached), Err(err)]))
}

/// Capture needs a bounded body that fits the buffer; a streaming or
/// oversized body is forwarded untouched.
fn capturable(body: &Body) -> Result<(), DumpError> {
    match http_body::Body::size_hint(body).upper() {
        Some(bound) if bound <= MAX_CAPTURE_BYTES => Ok(()),
        _ => Err(DumpError::CaptureUnavailable(
            "response body is unbounded or exceeds the capture limit, can not read body cache",
        )),
    }
}

fn declared_content_length(headers: &HeaderMap) -> u64 {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .unwrap_or(0)
}

fn media_type(headers: &HeaderMap) -> Result<mime::Mime, String> {
    let raw = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    raw.parse::<mime::Mime>()
        .map_err(|err| format!("content-type {raw:?} parse err: {err}"))
}

fn body_allowed_for_status(status: StatusCode) -> bool {
    !(status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}

fn clamp(config: &DumpConfig, value: Value) -> Value {
    match config.max_string_len {
        Some(max) => format::truncate_strings(value, max),
        None => value,
    }
}
