use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::Date;

use super::{nullable, patch_field};
use crate::error::FieldErrors;
use crate::store::{PgQueryAs, Record};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Note {
    pub title: String,
    pub content: Option<String>, // markdown
    pub tags: Option<String>,
    pub created_at: Option<Date>,
    pub updated_at: Option<Date>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotePatch {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub content: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub tags: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub created_at: Option<Option<Date>>,
    #[serde(default, deserialize_with = "nullable")]
    pub updated_at: Option<Option<Date>>,
}

impl Record for Note {
    type Patch = NotePatch;

    const LABEL: &'static str = "Note";
    const TABLE: &'static str = "notes";
    const COLUMNS: &'static [&'static str] =
        &["title", "content", "tags", "created_at", "updated_at"];

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require_text("title", &self.title);
        errors.into_result()
    }

    fn merge(&mut self, patch: NotePatch) {
        patch_field(&mut self.title, patch.title);
        patch_field(&mut self.content, patch.content);
        patch_field(&mut self.tags, patch.tags);
        patch_field(&mut self.created_at, patch.created_at);
        patch_field(&mut self.updated_at, patch.updated_at);
    }

    fn bind<'q, O>(self, query: PgQueryAs<'q, O>) -> PgQueryAs<'q, O> {
        query
            .bind(self.title)
            .bind(self.content)
            .bind(self.tags)
            .bind(self.created_at)
            .bind(self.updated_at)
    }
}
