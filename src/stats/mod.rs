//! Dashboard statistics derived from the caller's own records.

use axum::{routing::get, Router};

use crate::state::AppState;

pub mod handlers;
pub mod services;

pub use services::{compute, Stats, FOCUS_SCORE_PLACEHOLDER};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(handlers::get_stats))
        .route("/stats/", get(handlers::get_stats))
}
