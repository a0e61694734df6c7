//! Request observation middleware.
//!
//! Every inbound request outside the excluded paths gets a generated
//! request id, one structured "Incoming request" entry, and a perf entry
//! covering the observer's own work (not the downstream handler). The id
//! is attached to the response as `x-request-id` and to the request
//! extensions for downstream correlation. No sub-step failure aborts the
//! request: body-read and parse failures degrade to recorded markers.

use axum::{
    body::{Body, HttpBody},
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use rand::Rng;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::state::AppState;

/// Response header carrying the generated request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Maximum characters kept of a body snippet.
const MAX_BODY_SNIPPET: usize = 1000;

/// Maximum bytes buffered when inspecting a request body.
const MAX_BUFFERED_BODY: usize = 1024 * 1024;

/// Maximum characters kept of a user-agent string.
const MAX_USER_AGENT: usize = 200;

/// Paths never observed: static assets, the image pipeline, the favicon.
const EXCLUDED_PREFIXES: &[&str] = &["/static/", "/images/"];
const EXCLUDED_PATHS: &[&str] = &["/favicon.ico"];

/// Body field names redacted from logged request bodies.
const SENSITIVE_BODY_FIELDS: &[&str] = &["password", "token", "secret", "key"];

/// Request ID extension type.
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

/// Returns false for paths excluded from observation.
pub fn should_observe(path: &str) -> bool {
    if EXCLUDED_PATHS.contains(&path) {
        return false;
    }
    !EXCLUDED_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
}

/// Generates a request identifier: base-36 timestamp plus a random suffix.
/// Unique with overwhelming probability per process; no collision retry.
pub fn generate_request_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    format!("req_{}_{}", to_base36(millis), random_suffix(7))
}

fn to_base36(mut n: u64) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(ALPHABET[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

fn random_suffix(len: usize) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Client metadata derived from request headers, with safe placeholders
/// when absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: String,
    pub referer: String,
    pub origin: String,
    pub accept_language: String,
}

/// Extracts client metadata from headers. The forwarded-for chain wins
/// over the real-ip header; an IPv6-mapped-IPv4 prefix is stripped.
pub fn extract_client_info(headers: &HeaderMap) -> ClientInfo {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let ip = forwarded
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .unwrap_or("unknown");
    let ip = ip.strip_prefix("::ffff:").unwrap_or(ip).to_string();

    let user_agent: String = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .chars()
        .take(MAX_USER_AGENT)
        .collect();

    ClientInfo {
        ip,
        user_agent,
        referer: header_or(headers, "referer", "direct"),
        origin: header_or(headers, "origin", ""),
        accept_language: header_or(headers, "accept-language", ""),
    }
}

fn header_or(headers: &HeaderMap, name: &str, default: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(default)
        .to_string()
}

/// Observes one request: logs it, stamps the request id, passes it through
/// unmodified to the next stage.
pub async fn observe(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    if !should_observe(request.uri().path()) {
        return next.run(request).await;
    }

    let request_id = generate_request_id();
    let timer = state.logger.start_timer();

    let method = request.method().clone();
    let url = request.uri().to_string();
    let client = extract_client_info(request.headers());

    let log = state
        .logger
        .child(json!({ "component": "proxy", "requestId": request_id }));

    let mut data = Map::new();
    data.insert("method".to_string(), json!(method.as_str()));
    data.insert("url".to_string(), json!(url));
    data.insert("ip".to_string(), json!(client.ip));
    data.insert("userAgent".to_string(), json!(client.user_agent));
    data.insert("referer".to_string(), json!(client.referer));
    data.insert("origin".to_string(), json!(client.origin));
    data.insert("acceptLanguage".to_string(), json!(client.accept_language));

    if is_mutating(&method) {
        let headers = request.headers();
        let content_type = header_or(headers, "content-type", "");
        data.insert("contentType".to_string(), json!(content_type));
        data.insert(
            "contentLength".to_string(),
            json!(header_or(headers, "content-length", "0")),
        );
        data.insert("accept".to_string(), json!(header_or(headers, "accept", "")));
        data.insert(
            "authorization".to_string(),
            json!(presence_flag(headers.contains_key("authorization"))),
        );
        data.insert(
            "csrfToken".to_string(),
            json!(presence_flag(headers.contains_key("x-csrf-token"))),
        );

        if content_type.contains("application/json")
            || content_type.contains("application/x-www-form-urlencoded")
        {
            request = inspect_body(request, &content_type, &mut data).await;
        }
    }

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    log.info("Incoming request", Some(Value::Object(data)));
    log.perf("proxy", timer.elapsed_ms(), None);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn presence_flag(present: bool) -> &'static str {
    if present {
        "[PRESENT]"
    } else {
        "[ABSENT]"
    }
}

/// Buffers the request body for inspection and hands an identical body to
/// the downstream handler. Bodies whose declared or hinted size exceeds the
/// buffer cap are not inspected at all: a skip marker is recorded and the
/// stream passes through untouched. A read failure records a marker and
/// degrades to an empty body rather than aborting the request.
async fn inspect_body(
    request: Request,
    content_type: &str,
    data: &mut Map<String, Value>,
) -> Request {
    let declared = request
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);
    let hinted = request.body().size_hint().lower();
    if declared.max(hinted) > MAX_BUFFERED_BODY as u64 {
        data.insert(
            "bodySkipped".to_string(),
            json!("Body exceeds inspection limit"),
        );
        return request;
    }

    let (parts, body) = request.into_parts();
    match axum::body::to_bytes(body, MAX_BUFFERED_BODY).await {
        Ok(bytes) => {
            record_body(&bytes, content_type, data);
            Request::from_parts(parts, Body::from(bytes))
        }
        Err(_) => {
            data.insert(
                "bodyError".to_string(),
                json!("Failed to read request body"),
            );
            Request::from_parts(parts, Body::empty())
        }
    }
}

fn record_body(bytes: &[u8], content_type: &str, data: &mut Map<String, Value>) {
    let text = String::from_utf8_lossy(bytes);
    data.insert("bodySize".to_string(), json!(bytes.len()));

    if content_type.contains("application/json") {
        match serde_json::from_str::<Value>(&text) {
            Ok(mut parsed) => {
                if let Value::Object(map) = &parsed {
                    data.insert("fieldCount".to_string(), json!(map.len()));
                    data.insert(
                        "fields".to_string(),
                        json!(map.keys().cloned().collect::<Vec<_>>()),
                    );
                } else {
                    data.insert("fieldCount".to_string(), json!(0));
                }
                redact_json_fields(&mut parsed);
                let snippet = serde_json::to_string(&parsed).unwrap_or_default();
                data.insert(
                    "requestBody".to_string(),
                    json!(truncate_chars(&snippet, MAX_BODY_SNIPPET)),
                );
            }
            Err(_) => {
                // Unparseable: fall back to the textual patch strategy.
                data.insert("parseError".to_string(), json!("Invalid JSON"));
                let snippet = truncate_chars(&text, MAX_BODY_SNIPPET);
                data.insert("requestBody".to_string(), json!(redact_text(&snippet)));
            }
        }
    } else {
        let pairs: Vec<(String, String)> = form_urlencoded::parse(bytes)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        data.insert("fieldCount".to_string(), json!(pairs.len()));
        data.insert(
            "fields".to_string(),
            json!(pairs.iter().map(|(k, _)| k.clone()).collect::<Vec<_>>()),
        );
        let snippet = pairs
            .iter()
            .map(|(k, v)| {
                if is_sensitive_body_field(k) {
                    format!("{k}=[REDACTED]")
                } else {
                    format!("{k}={v}")
                }
            })
            .collect::<Vec<_>>()
            .join("&");
        data.insert(
            "requestBody".to_string(),
            json!(truncate_chars(&snippet, MAX_BODY_SNIPPET)),
        );
    }
}

fn is_sensitive_body_field(name: &str) -> bool {
    SENSITIVE_BODY_FIELDS
        .iter()
        .any(|field| name.eq_ignore_ascii_case(field))
}

/// Replaces values of sensitive fields in a parsed JSON body, at any depth.
fn redact_json_fields(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if is_sensitive_body_field(key) {
                    *val = Value::String("[REDACTED]".to_string());
                } else {
                    redact_json_fields(val);
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                redact_json_fields(item);
            }
        }
        _ => {}
    }
}

/// Textual fallback redaction for bodies that fail to parse: patches
/// JSON-shaped and form-shaped sensitive fields in place.
fn redact_text(body: &str) -> String {
    static PATTERNS: OnceLock<Vec<(Regex, String)>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        let mut patterns = Vec::new();
        for field in SENSITIVE_BODY_FIELDS {
            if let Ok(re) = Regex::new(&format!(r#"(?i)"{field}"\s*:\s*"[^"]*""#)) {
                patterns.push((re, format!("\"{field}\":\"[REDACTED]\"")));
            }
        }
        for field in ["password", "token", "secret"] {
            if let Ok(re) = Regex::new(&format!(r"(?i){field}=[^&]*")) {
                patterns.push((re, format!("{field}=[REDACTED]")));
            }
        }
        patterns
    });

    let mut result = body.to_string();
    for (re, replacement) in patterns {
        result = re
            .replace_all(&result, replacement.as_str())
            .into_owned();
    }
    result
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
