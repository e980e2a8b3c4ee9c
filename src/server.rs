//! Axum router construction and request dispatch.
//!
//! The [`app`] function wires the relay endpoints and returns a
//! ready-to-serve [`axum::Router`].
//!
//! Dispatch depends only on method and whether the path is empty:
//!
//! | method     | path      | action          |
//! |------------|-----------|-----------------|
//! | POST, PUT  | any       | upload          |
//! | GET        | non-empty | download `path` |
//! | GET        | empty     | usage text      |
//! | other      | any       | 405             |

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, HeaderValue, Method, Request, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use futures::TryStreamExt;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::errors::{generate_request_id, RelayError};
use crate::keys::allocate_key;
use crate::metrics::{metrics_handler, metrics_middleware, DOWNLOADS_TOTAL, UPLOADS_TOTAL};
use crate::resolve;
use crate::storage::backend::{ByteStream, CustomMetadata, DEFAULT_CONTENT_TYPE};
use crate::AppState;

/// Build the axum [`Router`] with the relay routes.
///
/// The returned router is ready to be passed to `axum::serve`.
pub fn app(state: Arc<AppState>) -> Router {
    let mut router = Router::new();
    let metrics_mounted = state.config.observability.metrics;

    // Fixed probes answer GET only; every other method on them goes
    // through the normal dispatch like any other path.
    if state.config.observability.health_check {
        router = router.route("/health", get(health_check).fallback(handle_request));
    }
    if metrics_mounted {
        router = router.route("/metrics", get(metrics_handler).fallback(handle_request));
    }

    router
        .route("/", any(handle_request))
        .route("/*path", any(handle_request))
        .with_state(state)
        // common_headers_middleware is innermost (adds standard headers).
        .layer(middleware::from_fn(common_headers_middleware))
        .layer(TraceLayer::new_for_http())
        // metrics_middleware is outer (captures full request lifecycle).
        .layer(middleware::from_fn_with_state(
            metrics_mounted,
            metrics_middleware,
        ))
        // Uploads are arbitrary length.
        .layer(DefaultBodyLimit::disable())
}

// -- Common headers middleware -----------------------------------------------

/// Middleware that adds common response headers to every response:
/// - `x-request-id`: 16-character hex string
/// - `Date`: RFC 7231 formatted timestamp
/// - `Server`: `yeet`
async fn common_headers_middleware(req: Request<Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    if !headers.contains_key("x-request-id") {
        if let Ok(value) = HeaderValue::from_str(&generate_request_id()) {
            headers.insert("x-request-id", value);
        }
    }

    let date = httpdate::fmt_http_date(std::time::SystemTime::now());
    if let Ok(value) = HeaderValue::from_str(&date) {
        headers.insert("date", value);
    }
    headers.insert("server", HeaderValue::from_static("yeet"));

    response
}

// -- Health check ------------------------------------------------------------

/// `GET /health` -- Returns `{"status": "ok"}` with 200 OK.
async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "application/json")],
        r#"{"status":"ok"}"#,
    )
}

// -- Dispatch ----------------------------------------------------------------

/// What a request asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    Upload,
    Download(String),
    Usage,
    NotAllowed,
}

/// Map method and decoded path (without leading slash) to a [`Route`].
fn classify(method: &Method, path: &str) -> Route {
    if *method == Method::POST || *method == Method::PUT {
        Route::Upload
    } else if *method == Method::GET && !path.is_empty() {
        Route::Download(path.to_string())
    } else if *method == Method::GET {
        Route::Usage
    } else {
        Route::NotAllowed
    }
}

/// Percent-decode the request path and drop its leading slash.
///
/// A path whose escapes do not decode to UTF-8 is kept raw, so it never
/// matches a generated key and is stored verbatim as a filename.
fn request_path(uri: &Uri) -> String {
    let raw = uri.path();
    let decoded = match percent_encoding::percent_decode_str(raw).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.to_string(),
    };
    match decoded.strip_prefix('/') {
        Some(rest) => rest.to_string(),
        None => decoded,
    }
}

/// Characters left as-is when a key is written into a URL path.
const KEY_PATH_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Single entry point for every relay request.
async fn handle_request(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, RelayError> {
    let path = request_path(&uri);

    match classify(&method, &path) {
        Route::Upload => upload(state, &path, &headers, body).await,
        Route::Download(key) => download(state, key).await,
        Route::Usage => Ok(usage(&state.config.server, &headers)),
        Route::NotAllowed => Err(RelayError::MethodNotAllowed),
    }
}

// -- Origin ------------------------------------------------------------------

/// Origin (`scheme://host[:port]`) that upload URLs are built on.
///
/// A configured `public_url` wins; otherwise the request's `Host` and
/// `X-Forwarded-Proto` headers are used, falling back to the bind address.
fn request_origin(server: &ServerConfig, headers: &HeaderMap) -> String {
    if let Some(ref public) = server.public_url {
        return public.trim_end_matches('/').to_string();
    }

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("http");

    match headers.get("host").and_then(|v| v.to_str().ok()) {
        Some(host) if !host.is_empty() => format!("{scheme}://{host}"),
        _ => format!("{scheme}://{}:{}", server.host, server.port),
    }
}

// -- Handlers ----------------------------------------------------------------

/// `GET /` -- plain-text usage.
fn usage(server: &ServerConfig, headers: &HeaderMap) -> Response {
    let origin = request_origin(server, headers);
    let text = format!(
        "yeet - file upload service\n\n\
         Upload: curl -T yourfile.txt {origin}/yourfile.txt\n\
         Download: curl {origin}/<key>\n"
    );
    (StatusCode::OK, [("content-type", "text/plain")], text).into_response()
}

/// `POST|PUT /[filename]` -- store the body under a fresh key.
async fn upload(
    state: Arc<AppState>,
    path: &str,
    headers: &HeaderMap,
    body: Body,
) -> Result<Response, RelayError> {
    let facts = resolve::resolve(path, headers);

    let key = allocate_key(
        state.storage.as_ref(),
        state.keys.as_ref(),
        &facts.extension,
        state.config.keys.max_attempts,
    )
    .await?;

    let metadata = facts.metadata(state.keys.records_extension());
    let stream: ByteStream = Box::pin(body.into_data_stream().map_err(std::io::Error::other));

    state
        .storage
        .put(&key, stream, &facts.content_type, metadata)
        .await?;

    metrics::counter!(UPLOADS_TOTAL, "strategy" => state.config.keys.strategy.as_str())
        .increment(1);
    info!(
        "Stored {} (filename={} type={})",
        key,
        facts.filename.as_deref().unwrap_or("-"),
        facts.content_type
    );

    let url = format!(
        "{}/{}\n",
        request_origin(&state.config.server, headers),
        utf8_percent_encode(&key, &KEY_PATH_ENCODE_SET)
    );
    Ok((StatusCode::CREATED, [("content-type", "text/plain")], url).into_response())
}

/// `GET /:key` -- stream a stored object back with its recorded headers.
async fn download(state: Arc<AppState>, key: String) -> Result<Response, RelayError> {
    let Some(object) = state.storage.get(&key).await? else {
        metrics::counter!(DOWNLOADS_TOTAL, "result" => "miss").increment(1);
        return Err(RelayError::NotFound { key });
    };
    metrics::counter!(DOWNLOADS_TOTAL, "result" => "hit").increment(1);

    let content_type = object
        .content_type
        .as_deref()
        .filter(|ct| !ct.is_empty())
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    let disposition = content_disposition(&key, &object.metadata)
        .and_then(|value| HeaderValue::from_str(&value).ok());

    let mut response = Response::new(Body::from_stream(object.body));
    let hdrs = response.headers_mut();
    hdrs.insert("content-type", content_type);
    if let Some(value) = disposition {
        hdrs.insert("content-disposition", value);
    }

    Ok(response)
}

/// `Content-Disposition` for a download, if a filename can be named.
///
/// The recorded filename wins; otherwise a recorded extension yields
/// `<key>.<extension>`.
fn content_disposition(key: &str, metadata: &CustomMetadata) -> Option<String> {
    let filename = match (metadata.known_filename(), metadata.recorded_extension()) {
        (Some(name), _) => name.to_string(),
        (None, Some(ext)) => format!("{key}.{ext}"),
        (None, None) => return None,
    };
    let escaped = filename.replace('\\', "\\\\").replace('"', "\\\"");
    Some(format!("inline; filename=\"{escaped}\""))
}

// -- Tests --------------------------------------------------------------------
