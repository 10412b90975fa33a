use std::sync::Arc;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};

use super::events::{default_observer, WorkflowEvent, WorkflowObserver};
use super::lineage;
use crate::database::entities::{order_items, tasks, TaskStatus};
use crate::errors::{CoreError, CoreResult};

#[derive(Clone)]
pub struct TaskService {
    db: DatabaseConnection,
    observer: Arc<dyn WorkflowObserver>,
}

impl TaskService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            observer: default_observer(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn WorkflowObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// The color has to be one the ancestor order actually contains.
    pub async fn create_task(
        &self,
        layout_id: i32,
        color: &str,
        planned_layers: i32,
    ) -> CoreResult<tasks::Model> {
        let color = color.trim();
        if color.is_empty() {
            return Err(CoreError::validation("color is required"));
        }
        if planned_layers <= 0 {
            return Err(CoreError::validation("planned_layers must be greater than zero")
                .with_field("planned_layers", planned_layers.to_string()));
        }

        let txn = self.db.begin().await?;
        let (layout, plan) = lineage::plan_of_layout(&txn, layout_id).await?;
        lineage::ensure_pending(&plan, "add a task")?;

        let color_known = order_items::Entity::find()
            .filter(order_items::Column::OrderId.eq(plan.order_id))
            .filter(order_items::Column::Color.eq(color))
            .one(&txn)
            .await?
            .is_some();
        if !color_known {
            return Err(CoreError::validation(format!(
                "Color '{}' is not part of order {}",
                color, plan.order_id
            ))
            .with_field("color", color));
        }

        let now = Utc::now();
        let task = tasks::ActiveModel {
            id: NotSet,
            layout_id: Set(layout.id),
            color: Set(color.to_string()),
            planned_layers: Set(planned_layers),
            completed_layers: Set(0),
            status: Set(TaskStatus::Pending.as_str().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        self.observer.notify(&WorkflowEvent::TaskCreated {
            task_id: task.id,
            layout_id,
        });
        Ok(task)
    }

    pub async fn get_task(&self, id: i32) -> CoreResult<tasks::Model> {
        lineage::load_task(&self.db, id).await
    }

    pub async fn list_tasks(&self) -> CoreResult<Vec<tasks::Model>> {
        Ok(tasks::Entity::find()
            .order_by_asc(tasks::Column::Id)
            .all(&self.db)
            .await?)
    }

    pub async fn list_tasks_by_layout(&self, layout_id: i32) -> CoreResult<Vec<tasks::Model>> {
        Ok(tasks::Entity::find()
            .filter(tasks::Column::LayoutId.eq(layout_id))
            .order_by_asc(tasks::Column::Id)
            .all(&self.db)
            .await?)
    }

    pub async fn delete_task(&self, id: i32) -> CoreResult<()> {
        let txn = self.db.begin().await?;
        let (_, plan) = lineage::plan_of_task(&txn, id).await?;
        lineage::ensure_pending(&plan, "delete a task")?;
        lineage::delete_tasks(&txn, &[id]).await?;
        txn.commit().await?;

        self.observer.notify(&WorkflowEvent::TaskDeleted { task_id: id });
        Ok(())
    }
}
