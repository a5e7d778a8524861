use serde::Serialize;
use uuid::Uuid;

use crate::store::{ActivityTotals, StatsRepository, StoreError};

/// Not computed from anything yet; reported as-is.
pub const FOCUS_SCORE_PLACEHOLDER: &str = "85%";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    #[serde(rename = "pending_tasks")]
    pub pending_task_count: i64,
    #[serde(rename = "notes_created")]
    pub note_count: i64,
    #[serde(rename = "study_hours")]
    pub total_study_hours: f64,
    pub focus_score: &'static str,
}

impl From<ActivityTotals> for Stats {
    fn from(totals: ActivityTotals) -> Self {
        Self {
            pending_task_count: totals.pending_tasks,
            note_count: totals.notes,
            total_study_hours: minutes_to_hours(totals.study_minutes),
            focus_score: FOCUS_SCORE_PLACEHOLDER,
        }
    }
}

/// Minutes to hours at one decimal. Rounds the stored `f64` quotient, so
/// 0.05 (slightly above) goes up and 0.15 (slightly below) goes down.
pub fn minutes_to_hours(minutes: i64) -> f64 {
    let hours = minutes as f64 / 60.0;
    format!("{hours:.1}").parse().unwrap_or(hours)
}

pub async fn compute<S>(store: &S, owner: Uuid) -> Result<Stats, StoreError>
where
    S: StatsRepository + ?Sized,
{
    let totals = store.activity_totals(owner).await?;
    Ok(totals.into())
}
