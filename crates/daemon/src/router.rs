//! HTTP routing and request handlers.
//!
//! Routes under the configured prefix: directory listings and raw file
//! bytes at `GET {prefix}<path>`, zip downloads at `GET {prefix}zip`,
//! mutation RPCs at `POST {prefix}rpc`, and uploads at
//! `POST {prefix}post`. The two POST routes are not registered at all
//! in read-only mode. Requests outside the prefix are redirected to it.
//!
//! Raw file serving (ranges, conditional requests, content types) is
//! delegated wholesale to `tower_http`'s `ServeDir`; this module only
//! decides *whether* a request may reach it.
//!
//! Every handler failure funnels into [`ServeError`], the single
//! boundary that logs the operation and its arguments and answers with
//! an opaque `error` body.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::QueryRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Query, Request, State};
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use percent_encoding::percent_decode_str;
use sandbox::{ops, Policy};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tower::ServiceExt;
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::ui;

/// Upload destination header, percent-encoded.
pub const UPLOAD_PATH_HEADER: &str = "skiff-path";

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    policy: Arc<Policy>,
    serve_dir: ServeDir,
}

impl AppState {
    pub fn new(policy: Policy) -> Self {
        let serve_dir = ServeDir::new(policy.root());
        Self {
            policy: Arc::new(policy),
            serve_dir,
        }
    }
}

/// Build the daemon router for the given state.
pub fn build(state: AppState) -> Router {
    let prefix = state.policy.prefix().to_string();

    let mut router = Router::new().route(&format!("{prefix}zip"), get(zip));
    if !state.policy.is_read_only() {
        router = router
            .route(&format!("{prefix}rpc"), post(rpc))
            .route(&format!("{prefix}post"), post(upload));
    }

    router
        .fallback(content)
        .layer(DefaultBodyLimit::disable())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Uniform request failure: logged server-side, opaque to the client.
pub(crate) struct ServeError {
    op: &'static str,
    args: String,
    source: anyhow::Error,
}

impl ServeError {
    fn internal(op: &'static str, args: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self {
            op,
            args: args.into(),
            source: source.into(),
        }
    }
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        error!(op = self.op, args = %self.args, error = %self.source, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "error").into_response()
    }
}

/// Fallback handler: everything under the prefix that is not one of the
/// registered routes, i.e. directory listings and raw files.
async fn content(State(state): State<AppState>, req: Request) -> Response {
    let raw = req.uri().path().to_string();
    let prefix = state.policy.prefix();

    if !raw.starts_with(prefix) && raw != prefix.trim_end_matches('/') {
        return Redirect::to(prefix).into_response();
    }

    match serve_content(&state, &raw, req).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn serve_content(
    state: &AppState,
    raw: &str,
    req: Request,
) -> Result<Response, ServeError> {
    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|e| ServeError::internal("get content", raw, e))?
        .into_owned();

    let resolved = state
        .policy
        .resolve(&decoded)
        .map_err(|e| ServeError::internal("get content", &*decoded, e))?;

    // A target that does not exist is a handler failure like any other:
    // the client sees the same opaque error whether the path was
    // rejected or merely absent.
    let meta = tokio::fs::metadata(resolved.as_path())
        .await
        .map_err(|e| ServeError::internal("get content", &*decoded, e))?;

    if !meta.is_dir() {
        return serve_file(state, raw, req).await;
    }

    // Directory URLs need the trailing slash for the relative hrefs in
    // the listing to resolve correctly.
    if !raw.ends_with('/') {
        return Ok(Redirect::to(&format!("{raw}/")).into_response());
    }

    let listing = {
        let policy = Arc::clone(&state.policy);
        tokio::task::spawn_blocking(move || sandbox::list(&policy, &resolved))
            .await
            .map_err(|e| ServeError::internal("get content", &*decoded, e))?
            .map_err(|e| ServeError::internal("get content", &*decoded, e))?
    };

    let title = format!(
        "/{}",
        decoded.strip_prefix(state.policy.prefix()).unwrap_or("")
    );
    debug!(path = %decoded, "get content");
    Ok(Html(ui::page(&title, state.policy.is_read_only(), &listing).into_string()).into_response())
}

/// Hand the (already verified) file request to `ServeDir`, which owns
/// ranges, conditional requests, and content-type sniffing.
async fn serve_file(state: &AppState, raw: &str, mut req: Request) -> Result<Response, ServeError> {
    let stripped = raw.strip_prefix(state.policy.prefix()).unwrap_or(raw);
    let uri: Uri = format!("/{stripped}")
        .parse()
        .map_err(|e: axum::http::uri::InvalidUri| ServeError::internal("get content", raw, e))?;
    *req.uri_mut() = uri;

    debug!(path = raw, "serving file bytes");
    let response = state
        .serve_dir
        .clone()
        .oneshot(req)
        .await
        .map_err(|e| ServeError::internal("get content", raw, anyhow::anyhow!(e)))?;
    Ok(response.map(Body::new))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ZipQuery {
    #[serde(rename = "zipPath")]
    zip_path: String,
    #[serde(rename = "zipName")]
    zip_name: String,
}

/// Stream a subtree as a zip attachment.
async fn zip(
    State(state): State<AppState>,
    query: Result<Query<ZipQuery>, QueryRejection>,
) -> Result<Response, ServeError> {
    let Query(query) = query.map_err(|e| ServeError::internal("zip", "", e))?;

    let resolved = state
        .policy
        .resolve(&query.zip_path)
        .map_err(|e| ServeError::internal("zip", &query.zip_path, e))?;

    // The subtree must exist before any header goes out.
    tokio::fs::symlink_metadata(resolved.as_path())
        .await
        .map_err(|e| ServeError::internal("zip", &query.zip_path, e))?;

    let (writer, reader) = tokio::io::duplex(64 * 1024);
    let policy = Arc::clone(&state.policy);
    let zip_path = query.zip_path.clone();
    tokio::spawn(async move {
        if let Err(err) = sandbox::write_zip(&policy, &resolved, writer).await {
            // Headers and earlier entries are already on the wire, so
            // the client gets a truncated archive; nothing can be
            // retracted at this point.
            error!(path = %zip_path, %err, "zip stream aborted");
        }
    });

    let filename = query.zip_name.replace(['"', '\r', '\n'], "");
    debug!(path = %query.zip_path, "zip");
    Response::builder()
        .header(header::CONTENT_TYPE, "application/zip")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}.zip\""),
        )
        .body(Body::from_stream(ReaderStream::new(reader)))
        .map_err(|e| ServeError::internal("zip", &query.zip_path, e))
}

/// Mutation RPC: `{"call": "mkdirp"|"mv"|"rm", "args": [path, ...]}`.
async fn rpc(State(state): State<AppState>, body: Bytes) -> Result<&'static str, ServeError> {
    let call: ops::Call = serde_json::from_slice(&body)
        .map_err(|e| ServeError::internal("rpc", String::from_utf8_lossy(&body), e))?;

    let call_desc = format!("{} {}", call.call, call.args.join(" "));
    let policy = Arc::clone(&state.policy);
    tokio::task::spawn_blocking(move || ops::dispatch(&policy, &call))
        .await
        .map_err(|e| ServeError::internal("rpc", &*call_desc, e))?
        .map_err(|e| ServeError::internal("rpc", &*call_desc, e))?;

    debug!(call = %call_desc, "rpc");
    Ok("ok")
}

/// Upload: destination from the percent-encoded header, content from
/// the first part of the multipart body. No part at all still creates
/// the (empty) file.
async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<&'static str, ServeError> {
    let raw = headers
        .get(UPLOAD_PATH_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            ServeError::internal("upload", "", anyhow::anyhow!("missing {UPLOAD_PATH_HEADER} header"))
        })?;

    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|e| ServeError::internal("upload", raw, e))?
        .into_owned();

    let resolved = state
        .policy
        .resolve(&decoded)
        .map_err(|e| ServeError::internal("upload", &*decoded, e))?;

    let mut multipart = multipart.map_err(|e| ServeError::internal("upload", &*decoded, e))?;

    let mut file = tokio::fs::File::create(resolved.as_path())
        .await
        .map_err(|e| ServeError::internal("upload", &*decoded, e))?;

    if let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ServeError::internal("upload", &*decoded, e))?
    {
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ServeError::internal("upload", &*decoded, e))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| ServeError::internal("upload", &*decoded, e))?;
        }
    }
    file.flush()
        .await
        .map_err(|e| ServeError::internal("upload", &*decoded, e))?;

    debug!(path = %decoded, "upload");
    Ok("ok")
}
