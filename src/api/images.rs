//! Image serving endpoints
//!
//! GET /images/     - Serve a random image
//! GET /images/{id} - Serve `<id>.jpg`

use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio_util::io::ReaderStream;
use tracing::error;

use super::{error_response, AppState};
use crate::images::Resolution;

const NO_CACHE: &str = "no-cache, no-store, must-revalidate";

/// Build the images router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/images", get(random_image))
        .route("/images/", get(random_image))
        .route("/images/{id}", get(image_by_id))
}

/// Serve a randomly chosen image
async fn random_image(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let if_none_match = if_none_match(&headers);
    let images = state.images.clone();
    let deadline = Instant::now() + state.request_timeout;

    let resolution = resolve(&state, move || {
        images.resolve_random(if_none_match.as_deref(), Some(deadline))
    })
    .await;
    respond(resolution).await
}

/// Serve an image by id
async fn image_by_id(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let if_none_match = if_none_match(&headers);
    let images = state.images.clone();
    let deadline = Instant::now() + state.request_timeout;

    let resolution = resolve(&state, move || {
        images.resolve_by_id(&id, if_none_match.as_deref(), Some(deadline))
    })
    .await;
    respond(resolution).await
}

fn if_none_match(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Run a blocking resolution off the async workers, bounded by the request timeout
///
/// The closure carries the same deadline, so its hashing stops on its own.
async fn resolve<F>(state: &AppState, f: F) -> Result<Resolution, &'static str>
where
    F: FnOnce() -> Resolution + Send + 'static,
{
    match tokio::time::timeout(state.request_timeout, tokio::task::spawn_blocking(f)).await {
        Ok(Ok(resolution)) => Ok(resolution),
        Ok(Err(e)) => {
            error!("Image resolution task failed: {}", e);
            Err("failed to resolve image")
        }
        Err(_) => {
            error!("Image resolution exceeded {:?}", state.request_timeout);
            Err("image request timed out")
        }
    }
}

/// Translate a resolution into an HTTP response
async fn respond(resolution: Result<Resolution, &'static str>) -> Response {
    match resolution {
        Ok(Resolution::ServeFile {
            path,
            file_name,
            etag,
        }) => serve_file(path, &file_name, &etag).await,
        Ok(Resolution::NotModified { etag }) => {
            let mut response = StatusCode::NOT_MODIFIED.into_response();
            if let Ok(value) = entity_tag(&etag) {
                response.headers_mut().insert(header::ETAG, value);
            }
            response
        }
        Ok(Resolution::NotFound) => error_response(StatusCode::NOT_FOUND, "image not found"),
        Ok(Resolution::InternalError) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to generate ETag")
        }
        Err(message) => error_response(StatusCode::INTERNAL_SERVER_ERROR, message),
    }
}

/// Stream the image with no-cache headers and its validator
async fn serve_file(path: PathBuf, file_name: &str, etag: &str) -> Response {
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        // Removed between hashing and opening
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return error_response(StatusCode::NOT_FOUND, "image not found")
        }
        Err(e) => {
            error!("Failed to open {}: {}", path.display(), e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to read image");
        }
    };
    let len = file.metadata().await.ok().map(|meta| meta.len());

    let mut response = (
        StatusCode::OK,
        [
            (header::CACHE_CONTROL, NO_CACHE),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "0"),
            (header::CONTENT_TYPE, "image/jpeg"),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response();

    let headers = response.headers_mut();
    if let Ok(value) = entity_tag(etag) {
        headers.insert(header::ETAG, value);
    }
    let disposition = format!("inline; filename=\"{}\"", urlencoding::encode(file_name));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    if let Some(len) = len {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }

    response
}

/// Quote a hex digest as a strong entity tag
fn entity_tag(etag: &str) -> Result<HeaderValue, header::InvalidHeaderValue> {
    HeaderValue::from_str(&format!("\"{}\"", etag))
}
