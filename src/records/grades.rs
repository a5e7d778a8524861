use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::Date;

use super::{nullable, patch_field};
use crate::error::FieldErrors;
use crate::store::{PgQueryAs, Record};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Grade {
    pub subject: String,
    pub score: f64,
    #[serde(default = "default_weight")]
    pub weight: f64,
    pub date: Option<Date>,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Default, Deserialize)]
pub struct GradePatch {
    pub subject: Option<String>,
    pub score: Option<f64>,
    pub weight: Option<f64>,
    #[serde(default, deserialize_with = "nullable")]
    pub date: Option<Option<Date>>,
}

impl Record for Grade {
    type Patch = GradePatch;

    const LABEL: &'static str = "Grade";
    const TABLE: &'static str = "grades";
    const COLUMNS: &'static [&'static str] = &["subject", "score", "weight", "date"];

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require_text("subject", &self.subject);
        if !self.score.is_finite() {
            errors.add("score", "must be a finite number");
        }
        if !self.weight.is_finite() || self.weight < 0.0 {
            errors.add("weight", "must be a non-negative number");
        }
        errors.into_result()
    }

    fn merge(&mut self, patch: GradePatch) {
        patch_field(&mut self.subject, patch.subject);
        patch_field(&mut self.score, patch.score);
        patch_field(&mut self.weight, patch.weight);
        patch_field(&mut self.date, patch.date);
    }

    fn bind<'q, O>(self, query: PgQueryAs<'q, O>) -> PgQueryAs<'q, O> {
        query
            .bind(self.subject)
            .bind(self.score)
            .bind(self.weight)
            .bind(self.date)
    }
}
