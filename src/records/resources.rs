use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{nullable, patch_field};
use crate::error::FieldErrors;
use crate::store::{PgQueryAs, Record};

/// Saved link to study material, served under `/resources`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResourceLink {
    pub title: String,
    pub url: Option<String>,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: Option<String>, // Link, PDF, Video, ...
    pub tags: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResourceLinkPatch {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub url: Option<Option<String>>,
    #[serde(default, rename = "type", deserialize_with = "nullable")]
    pub kind: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub tags: Option<Option<String>>,
}

impl Record for ResourceLink {
    type Patch = ResourceLinkPatch;

    const LABEL: &'static str = "Resource";
    const TABLE: &'static str = "resources";
    const COLUMNS: &'static [&'static str] = &["title", "url", "type", "tags"];

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require_text("title", &self.title);
        if let Some(url) = &self.url {
            if url.chars().any(char::is_whitespace) {
                errors.add("url", "must not contain whitespace");
            }
        }
        errors.into_result()
    }

    fn merge(&mut self, patch: ResourceLinkPatch) {
        patch_field(&mut self.title, patch.title);
        patch_field(&mut self.url, patch.url);
        patch_field(&mut self.kind, patch.kind);
        patch_field(&mut self.tags, patch.tags);
    }

    fn bind<'q, O>(self, query: PgQueryAs<'q, O>) -> PgQueryAs<'q, O> {
        query
            .bind(self.title)
            .bind(self.url)
            .bind(self.kind)
            .bind(self.tags)
    }
}
