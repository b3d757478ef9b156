use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// First date the goal is considered active, when it differs from `created_at`.
    pub start_date: Option<NaiveDate>,
    /// Week-start date from which the goal is archived; logs stop accruing after it.
    pub archived_from_week: Option<NaiveDate>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Goal {
    /// A goal belongs to the user's visible set only while it has not been deleted.
    pub fn is_visible(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// The earliest date this goal counts as active: explicit start date when
    /// present, otherwise the creation date.
    pub fn active_from(&self) -> NaiveDate {
        self.start_date.unwrap_or_else(|| self.created_at.date_naive())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGoalRequest {
    pub user_id: String,
    pub name: String,
    pub start_date: Option<NaiveDate>,
}
