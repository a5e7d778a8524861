use axum::{extract::State, Json};
use tracing::instrument;

use super::services::{compute, Stats};
use crate::{auth::CurrentUser, error::AppError, state::AppState};

/// GET /stats/
#[instrument(skip_all)]
pub async fn get_stats(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Stats>, AppError> {
    let stats = compute(state.store.as_ref(), user.id).await?;
    Ok(Json(stats))
}
