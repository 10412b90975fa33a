use std::fmt;
use std::str::FromStr;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::CoreError;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "plans")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub plan_name: String,
    pub order_id: i32,
    pub note: Option<String>,
    pub planned_publish_date: Option<ChronoDateTimeUtc>,
    pub planned_finish_date: Option<ChronoDateTimeUtc>,
    pub status: String,
    pub published_at: Option<ChronoDateTimeUtc>,
    pub finished_at: Option<ChronoDateTimeUtc>,
    pub frozen_at: Option<ChronoDateTimeUtc>,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::orders::Entity",
        from = "Column::OrderId",
        to = "super::orders::Column::Id",
        on_delete = "Cascade"
    )]
    Orders,
    #[sea_orm(has_many = "super::layouts::Entity")]
    Layouts,
}

impl Related<super::orders::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl Related<super::layouts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Layouts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Unknown strings are treated as frozen so nothing mutates a row we cannot classify
    pub fn status(&self) -> PlanStatus {
        match self.status.parse() {
            Ok(status) => status,
            Err(_) => {
                warn!(
                    plan_id = self.id,
                    status = %self.status,
                    "Unknown plan status, treating plan as frozen"
                );
                PlanStatus::Frozen
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Pending,
    InProgress,
    Completed,
    Frozen,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Pending => "pending",
            PlanStatus::InProgress => "in_progress",
            PlanStatus::Completed => "completed",
            PlanStatus::Frozen => "frozen",
        }
    }

    /// Layouts, ratios and tasks can only be restructured before publish
    pub fn allows_structural_changes(&self) -> bool {
        matches!(self, PlanStatus::Pending)
    }

    pub fn accepts_logs(&self) -> bool {
        matches!(self, PlanStatus::InProgress)
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PlanStatus::Pending),
            "in_progress" => Ok(PlanStatus::InProgress),
            "completed" => Ok(PlanStatus::Completed),
            "frozen" => Ok(PlanStatus::Frozen),
            other => Err(CoreError::internal(format!("Unknown plan status: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn plan_with_status(status: &str) -> Model {
        let now = Utc::now();
        Model {
            id: 9,
            plan_name: "Spring run".to_string(),
            order_id: 1,
            note: None,
            planned_publish_date: None,
            planned_finish_date: None,
            status: status.to_string(),
            published_at: None,
            finished_at: None,
            frozen_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_known_status_parses() {
        assert_eq!(plan_with_status("in_progress").status(), PlanStatus::InProgress);
        assert_eq!(plan_with_status("pending").status(), PlanStatus::Pending);
    }

    #[test]
    fn test_corrupt_status_locks_the_plan() {
        let status = plan_with_status("in-progress ").status();
        assert_eq!(status, PlanStatus::Frozen);
        assert!(!status.accepts_logs());
        assert!(!status.allows_structural_changes());
    }
}
