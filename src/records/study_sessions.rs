use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::Date;

use super::{nullable, patch_field};
use crate::error::FieldErrors;
use crate::store::{PgQueryAs, Record};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StudySession {
    pub subject: String,
    pub duration_minutes: i32,
    pub date: Option<Date>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StudySessionPatch {
    pub subject: Option<String>,
    pub duration_minutes: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    pub date: Option<Option<Date>>,
}

impl Record for StudySession {
    type Patch = StudySessionPatch;

    const LABEL: &'static str = "Study session";
    const TABLE: &'static str = "study_sessions";
    const COLUMNS: &'static [&'static str] = &["subject", "duration_minutes", "date"];

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require_text("subject", &self.subject);
        if self.duration_minutes < 0 {
            errors.add("duration_minutes", "must not be negative");
        }
        errors.into_result()
    }

    fn merge(&mut self, patch: StudySessionPatch) {
        patch_field(&mut self.subject, patch.subject);
        patch_field(&mut self.duration_minutes, patch.duration_minutes);
        patch_field(&mut self.date, patch.date);
    }

    fn bind<'q, O>(self, query: PgQueryAs<'q, O>) -> PgQueryAs<'q, O> {
        query
            .bind(self.subject)
            .bind(self.duration_minutes)
            .bind(self.date)
    }
}
