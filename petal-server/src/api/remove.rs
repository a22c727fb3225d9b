use axum::extract::{Path, State};
use axum::http::StatusCode;

use petal_core::hash;

use crate::api::AppState;
use crate::error::ApiError;

/// `DELETE /{sha256}` -- remove the object, then the descriptor.
pub async fn delete_blob(
    State(state): State<AppState>,
    Path(sha256): Path<String>,
) -> Result<StatusCode, ApiError> {
    let hash = hash::strip_extension(&sha256);
    state.deleter.delete_blob(hash).await?;
    Ok(StatusCode::OK)
}
