use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{nullable, patch_field};
use crate::error::FieldErrors;
use crate::store::{PgQueryAs, Record};

/// Calendar entry. Times are kept as the ISO strings the client sent.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub title: String,
    pub description: Option<String>,
    pub start_time: String,
    pub end_time: String,
    pub recurrence: Option<String>, // e.g. "weekly"
}

#[derive(Debug, Default, Deserialize)]
pub struct EventPatch {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub recurrence: Option<Option<String>>,
}

impl Record for Event {
    type Patch = EventPatch;

    const LABEL: &'static str = "Event";
    const TABLE: &'static str = "events";
    const COLUMNS: &'static [&'static str] =
        &["title", "description", "start_time", "end_time", "recurrence"];

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require_text("title", &self.title);
        errors.require_text("start_time", &self.start_time);
        errors.require_text("end_time", &self.end_time);
        errors.into_result()
    }

    fn merge(&mut self, patch: EventPatch) {
        patch_field(&mut self.title, patch.title);
        patch_field(&mut self.description, patch.description);
        patch_field(&mut self.start_time, patch.start_time);
        patch_field(&mut self.end_time, patch.end_time);
        patch_field(&mut self.recurrence, patch.recurrence);
    }

    fn bind<'q, O>(self, query: PgQueryAs<'q, O>) -> PgQueryAs<'q, O> {
        query
            .bind(self.title)
            .bind(self.description)
            .bind(self.start_time)
            .bind(self.end_time)
            .bind(self.recurrence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn start_and_end_are_required() {
        let e: Event = serde_json::from_value(json!({
            "title": "Lecture", "start_time": "", "end_time": "2024-03-01T10:00"
        }))
        .unwrap();
        let errors = e.validate().unwrap_err();
        assert!(errors.get("start_time").is_some());
        assert!(errors.get("end_time").is_none());
    }
}
