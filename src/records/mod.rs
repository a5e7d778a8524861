//! User-owned record kinds and their CRUD routes.

use axum::Router;
use serde::{Deserialize, Deserializer};

use crate::state::AppState;

mod dto;
mod events;
mod grades;
pub mod handlers;
mod notes;
mod projects;
mod resources;
mod study_sessions;
mod tasks;

pub use dto::Pagination;
pub use events::{Event, EventPatch};
pub use grades::{Grade, GradePatch};
pub use notes::{Note, NotePatch};
pub use projects::{Project, ProjectPatch};
pub use resources::{ResourceLink, ResourceLinkPatch};
pub use study_sessions::{StudySession, StudySessionPatch};
pub use tasks::{Task, TaskPatch};

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::record_routes::<Task>("tasks"))
        .merge(handlers::record_routes::<Note>("notes"))
        .merge(handlers::record_routes::<ResourceLink>("resources"))
        .merge(handlers::record_routes::<Project>("projects"))
        .merge(handlers::record_routes::<Grade>("grades"))
        .merge(handlers::record_routes::<Event>("events"))
        .merge(handlers::record_routes::<StudySession>("study-sessions"))
}

/// Patch field for a nullable column: absent => `None` (keep),
/// `null` => `Some(None)` (clear), value => `Some(Some(v))`.
pub(crate) fn nullable<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// Assigns `value` to `slot` when the patch carried it.
pub(crate) fn patch_field<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct TagsPatch {
        #[serde(default, deserialize_with = "nullable")]
        tags: Option<Option<String>>,
    }

    #[test]
    fn nullable_distinguishes_absent_null_and_value() {
        let absent: TagsPatch = serde_json::from_str("{}").unwrap();
        let null: TagsPatch = serde_json::from_str(r#"{"tags": null}"#).unwrap();
        let value: TagsPatch = serde_json::from_str(r#"{"tags": "exam"}"#).unwrap();
        assert_eq!(absent.tags, None);
        assert_eq!(null.tags, Some(None));
        assert_eq!(value.tags, Some(Some("exam".to_string())));
    }

    #[test]
    fn patch_field_only_overwrites_when_present() {
        let mut title = "old".to_string();
        patch_field(&mut title, None);
        assert_eq!(title, "old");
        patch_field(&mut title, Some("new".to_string()));
        assert_eq!(title, "new");
    }
}
