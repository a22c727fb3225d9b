use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};

use petal_core::blob::BlobRecord;
use petal_core::hash;

use crate::api::AppState;
use crate::error::ApiError;

/// `GET /{sha256}` -- resolve the descriptor and redirect to the object
/// store, carrying the blob's headers for clients that don't follow.
pub async fn get_blob(
    State(state): State<AppState>,
    Path(sha256): Path<String>,
) -> Result<Response, ApiError> {
    let hash = hash::strip_extension(&sha256);
    let record = state.getter.get_blob(hash).await?;

    let mut response = (
        StatusCode::FOUND,
        [(header::LOCATION, record.object_url.clone())],
    )
        .into_response();
    apply_blob_headers(&mut response, &record);
    Ok(response)
}

/// `HEAD /{sha256}` -- existence check; the blob's headers, no body.
pub async fn head_blob(
    State(state): State<AppState>,
    Path(sha256): Path<String>,
) -> Result<Response, ApiError> {
    let hash = hash::strip_extension(&sha256);
    let record = state.getter.get_blob(hash).await?;

    let mut response = StatusCode::OK.into_response();
    apply_blob_headers(&mut response, &record);
    Ok(response)
}

fn apply_blob_headers(response: &mut Response, record: &BlobRecord) {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&record.media_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&record.size.to_string()) {
        headers.insert(header::CONTENT_LENGTH, value);
    }
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
}
