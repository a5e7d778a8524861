use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginForm, PublicUser, RegisterRequest, TokenResponse},
        extractors::CurrentUser,
        services,
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/token", post(login))
        .route("/users", post(register))
        .route("/users/", post(register))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(get_me))
        .route("/users/me/", get(get_me))
}

/// POST /users/
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PublicUser>), AppError> {
    let Json(payload) = payload?;
    let user = services::register(state.store.as_ref(), &payload.email, &payload.password).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// POST /token (form or multipart: username, password)
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    form: LoginForm,
) -> Result<Json<TokenResponse>, AppError> {
    let token =
        services::login(state.store.as_ref(), &state.keys, &form.username, &form.password).await?;
    Ok(Json(TokenResponse::bearer(token)))
}

/// GET /users/me/
#[instrument(skip_all)]
pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(user.into())
}
