use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use petal_core::blob::BlobDescriptor;
use petal_core::error::ServiceError;

use crate::api::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    since: Option<String>,
    until: Option<String>,
}

/// `GET /list/{pk}` -- descriptors owned by `pk`, optionally bounded by an
/// upload-time window given as decimal unix seconds.
pub async fn list_blobs(
    State(state): State<AppState>,
    Path(pk): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<BlobDescriptor>>, ApiError> {
    let since = parse_time_param(query.since.as_deref(), "since")?;
    let until = parse_time_param(query.until.as_deref(), "until")?;

    let descriptors = state.lister.list_blobs(&pk, since, until).await?;
    Ok(Json(descriptors))
}

fn parse_time_param(
    value: Option<&str>,
    name: &str,
) -> Result<Option<DateTime<Utc>>, ApiError> {
    let Some(value) = value else {
        return Ok(None);
    };

    value
        .parse::<i64>()
        .ok()
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
        .map(Some)
        .ok_or_else(|| {
            ApiError(ServiceError::BadRequest(format!(
                "invalid '{name}' timestamp"
            )))
        })
}
