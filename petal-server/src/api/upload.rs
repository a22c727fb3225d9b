use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::{Extension, Json};
use futures::TryStreamExt;
use tracing::debug;

use petal_auth::Capability;
use petal_core::blob::BlobDescriptor;
use petal_core::error::ServiceError;

use crate::api::AppState;
use crate::error::ApiError;

/// `POST /upload` -- run a capability-validated upload through the
/// orchestrator and return the committed descriptor.
///
/// The capability middleware has already bound the body to the `x` tag, so
/// the resource hash on the extension is the declared content hash.
pub async fn upload(
    State(state): State<AppState>,
    Extension(capability): Extension<Capability>,
    headers: HeaderMap,
    body: Body,
) -> Result<(StatusCode, Json<BlobDescriptor>), ApiError> {
    let declared_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_owned();

    let declared_size = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or_else(|| {
            debug!("could not parse content length, skipping size check");
            -1
        });

    let expected_hash = capability.resource.clone().ok_or_else(|| {
        // Unreachable past the middleware; fail closed regardless.
        ApiError(ServiceError::Unauthorized(
            "upload requires 'x' tag".to_owned(),
        ))
    })?;

    let stream = body
        .into_data_stream()
        .map_err(|e| std::io::Error::other(e.to_string()));

    let descriptor = state
        .uploader
        .upload(
            Box::pin(stream),
            declared_size,
            &expected_hash,
            &declared_type,
            &capability.pubkey,
        )
        .await?;

    Ok((StatusCode::OK, Json(descriptor)))
}
