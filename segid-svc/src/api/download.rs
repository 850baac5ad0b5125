//! Artifact download endpoint

use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/download/:filename
///
/// Streams a stored artifact. Names escaping the artifact root are refused
/// with 403 before any filesystem access.
pub async fn download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    let path = state.artifacts.resolve(&filename).map_err(|e| {
        warn!(filename = %filename, error = %e, "Download refused");
        ApiError::from(e)
    })?;

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound("File not found".to_string()));
        }
        Err(e) => return Err(ApiError::Internal(e.to_string())),
    };
    let metadata = file
        .metadata()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if !metadata.is_file() {
        return Err(ApiError::NotFound("File not found".to_string()));
    }

    debug!(filename = %filename, bytes = metadata.len(), "Serving artifact");
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        [
            (header::CONTENT_TYPE, "audio/mpeg".to_string()),
            (header::CONTENT_LENGTH, metadata.len().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response())
}

/// Build download routes
pub fn download_routes() -> Router<AppState> {
    Router::new().route("/api/download/:filename", get(download))
}
