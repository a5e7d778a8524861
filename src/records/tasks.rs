use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::Date;

use super::{nullable, patch_field};
use crate::error::FieldErrors;
use crate::store::{PgQueryAs, Record};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<Date>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default = "default_priority")]
    pub priority: String, // Low, Medium, High
    #[serde(default = "default_status")]
    pub status: String, // Todo, In Progress, Done
    pub tags: Option<String>, // comma separated
    pub project_id: Option<i64>,
}

fn default_priority() -> String {
    "Medium".into()
}

fn default_status() -> String {
    "Todo".into()
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub due_date: Option<Option<Date>>,
    pub is_completed: Option<bool>,
    pub priority: Option<String>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub tags: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub project_id: Option<Option<i64>>,
}

impl Record for Task {
    type Patch = TaskPatch;

    const LABEL: &'static str = "Task";
    const TABLE: &'static str = "tasks";
    const COLUMNS: &'static [&'static str] = &[
        "title",
        "description",
        "due_date",
        "is_completed",
        "priority",
        "status",
        "tags",
        "project_id",
    ];

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require_text("title", &self.title);
        errors.require_text("priority", &self.priority);
        errors.require_text("status", &self.status);
        errors.into_result()
    }

    fn merge(&mut self, patch: TaskPatch) {
        patch_field(&mut self.title, patch.title);
        patch_field(&mut self.description, patch.description);
        patch_field(&mut self.due_date, patch.due_date);
        patch_field(&mut self.is_completed, patch.is_completed);
        patch_field(&mut self.priority, patch.priority);
        patch_field(&mut self.status, patch.status);
        patch_field(&mut self.tags, patch.tags);
        patch_field(&mut self.project_id, patch.project_id);
    }

    fn bind<'q, O>(self, query: PgQueryAs<'q, O>) -> PgQueryAs<'q, O> {
        query
            .bind(self.title)
            .bind(self.description)
            .bind(self.due_date)
            .bind(self.is_completed)
            .bind(self.priority)
            .bind(self.status)
            .bind(self.tags)
            .bind(self.project_id)
    }

    fn linked_project(&self) -> Option<i64> {
        self.project_id
    }

    fn unlink_project(&mut self, project_id: i64) {
        if self.project_id == Some(project_id) {
            self.project_id = None;
        }
    }
}
