use std::fmt;
use std::str::FromStr;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tasks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub layout_id: i32,
    pub color: String,
    pub planned_layers: i32,
    /// Derived: sum of layers over non-voided logs
    pub completed_layers: i32,
    /// Derived from `completed_layers` and `planned_layers`
    pub status: String,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::layouts::Entity",
        from = "Column::LayoutId",
        to = "super::layouts::Column::Id",
        on_delete = "Cascade"
    )]
    Layouts,
    #[sea_orm(has_many = "super::production_logs::Entity")]
    ProductionLogs,
}

impl Related<super::layouts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Layouts.def()
    }
}

impl Related<super::production_logs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductionLogs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn status(&self) -> TaskStatus {
        TaskStatus::derive(self.completed_layers, self.planned_layers)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    /// Status is a pure function of accumulated and planned layers.
    pub fn derive(completed_layers: i32, planned_layers: i32) -> Self {
        if completed_layers <= 0 {
            TaskStatus::Pending
        } else if completed_layers >= planned_layers {
            TaskStatus::Completed
        } else {
            TaskStatus::InProgress
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(CoreError::internal(format!("Unknown task status: {}", other))),
        }
    }
}
