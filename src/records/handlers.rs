use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::Pagination;
use crate::{
    auth::CurrentUser,
    error::AppError,
    state::AppState,
    store::{Owned, Record, Repository, Store},
};

/// `/<path>` and `/<path>/` for list/create, `/<path>/:id` for the rest.
pub fn record_routes<R>(path: &str) -> Router<AppState>
where
    R: Record,
    dyn Store: Repository<R>,
{
    let collection = get(list::<R>).post(create::<R>);
    let item = get(fetch::<R>).put(update::<R>).delete(remove::<R>);
    Router::new()
        .route(&format!("/{path}"), collection.clone())
        .route(&format!("/{path}/"), collection)
        .route(&format!("/{path}/:id"), item)
}

#[instrument(skip_all, fields(kind = R::TABLE))]
pub async fn list<R>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    query: Result<Query<Pagination>, QueryRejection>,
) -> Result<Json<Vec<Owned<R>>>, AppError>
where
    R: Record,
    dyn Store: Repository<R>,
{
    let Query(pagination) = query?;
    let page = pagination.page().map_err(AppError::Validation)?;
    let rows = <dyn Store as Repository<R>>::list(state.store.as_ref(), user.id, page).await?;
    Ok(Json(rows))
}

#[instrument(skip_all, fields(kind = R::TABLE))]
pub async fn fetch<R>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Owned<R>>, AppError>
where
    R: Record,
    dyn Store: Repository<R>,
{
    let Path(id) = path?;
    <dyn Store as Repository<R>>::get(state.store.as_ref(), user.id, id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound(R::LABEL))
}

#[instrument(skip_all, fields(kind = R::TABLE))]
pub async fn create<R>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<R>, JsonRejection>,
) -> Result<(StatusCode, Json<Owned<R>>), AppError>
where
    R: Record,
    dyn Store: Repository<R>,
{
    let Json(fields) = payload?;
    let row = <dyn Store as Repository<R>>::create(state.store.as_ref(), user.id, fields).await?;
    info!(user_id = %user.id, id = row.id, "record created");
    Ok((StatusCode::CREATED, Json(row)))
}

#[instrument(skip_all, fields(kind = R::TABLE))]
pub async fn update<R>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<R::Patch>, JsonRejection>,
) -> Result<Json<Owned<R>>, AppError>
where
    R: Record,
    dyn Store: Repository<R>,
{
    let Path(id) = path?;
    let Json(patch) = payload?;
    <dyn Store as Repository<R>>::update(state.store.as_ref(), user.id, id, patch)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound(R::LABEL))
}

#[instrument(skip_all, fields(kind = R::TABLE))]
pub async fn remove<R>(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Owned<R>>, AppError>
where
    R: Record,
    dyn Store: Repository<R>,
{
    let Path(id) = path?;
    let row = <dyn Store as Repository<R>>::delete(state.store.as_ref(), user.id, id)
        .await?
        .ok_or(AppError::NotFound(R::LABEL))?;
    info!(user_id = %user.id, id = row.id, "record deleted");
    Ok(Json(row))
}
