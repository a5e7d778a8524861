use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::Date;

use super::{nullable, patch_field};
use crate::error::FieldErrors;
use crate::store::{PgQueryAs, Record};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub title: String,
    pub description: Option<String>,
    pub deadline: Option<Date>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectPatch {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub deadline: Option<Option<Date>>,
}

impl Record for Project {
    type Patch = ProjectPatch;

    const LABEL: &'static str = "Project";
    const TABLE: &'static str = "projects";
    const COLUMNS: &'static [&'static str] = &["title", "description", "deadline"];

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require_text("title", &self.title);
        errors.into_result()
    }

    fn merge(&mut self, patch: ProjectPatch) {
        patch_field(&mut self.title, patch.title);
        patch_field(&mut self.description, patch.description);
        patch_field(&mut self.deadline, patch.deadline);
    }

    fn bind<'q, O>(self, query: PgQueryAs<'q, O>) -> PgQueryAs<'q, O> {
        query
            .bind(self.title)
            .bind(self.description)
            .bind(self.deadline)
    }
}
