use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only production record. Only the void columns change after insert.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "production_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub task_id: i32,
    pub worker_id: Option<i32>,
    pub worker_name: Option<String>,
    pub layers_completed: i32,
    pub log_time: ChronoDateTimeUtc,
    pub note: Option<String>,
    pub voided: bool,
    pub void_reason: Option<String>,
    pub voided_by: Option<i32>,
    pub voided_at: Option<ChronoDateTimeUtc>,
    pub voided_by_name: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tasks::Entity",
        from = "Column::TaskId",
        to = "super::tasks::Column::Id",
        on_delete = "Cascade"
    )]
    Tasks,
}

impl Related<super::tasks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tasks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether the log was recorded for this worker, by id or by name
    pub fn is_recorded_for(&self, worker_id: i32, worker_name: &str) -> bool {
        self.worker_id == Some(worker_id)
            || self
                .worker_name
                .as_deref()
                .is_some_and(|name| !name.is_empty() && name == worker_name)
    }
}
