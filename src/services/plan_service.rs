use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tracing::info;

use super::events::{default_observer, WorkflowEvent, WorkflowObserver};
use super::lineage;
use crate::database::entities::{plans, PlanStatus};
use crate::errors::{CoreError, CoreResult};

#[derive(Clone, Debug)]
pub struct PlanCreateRequest {
    pub order_id: i32,
    pub plan_name: String,
    pub note: Option<String>,
    pub planned_publish_date: Option<DateTime<Utc>>,
    pub planned_finish_date: Option<DateTime<Utc>>,
}

/// Plan lifecycle: pending -> in_progress -> completed -> frozen.
///
/// Publishing and freezing are explicit; completion and reopening are
/// derived from task progress in `progress`.
#[derive(Clone)]
pub struct PlanService {
    db: DatabaseConnection,
    observer: Arc<dyn WorkflowObserver>,
}

impl PlanService {
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

    pub async fn create_plan(&self, request: PlanCreateRequest) -> CoreResult<plans::Model> {
        let plan_name = request.plan_name.trim().to_string();
        if plan_name.is_empty() {
            return Err(CoreError::validation("plan_name is required"));
        }

        let txn = self.db.begin().await?;
        lineage::load_order(&txn, request.order_id).await?;

        let now = Utc::now();
        let plan = plans::ActiveModel {
            id: NotSet,
            plan_name: Set(plan_name),
            order_id: Set(request.order_id),
            note: Set(request.note),
            planned_publish_date: Set(request.planned_publish_date),
            planned_finish_date: Set(request.planned_finish_date),
            status: Set(PlanStatus::Pending.as_str().to_string()),
            published_at: Set(None),
            finished_at: Set(None),
            frozen_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        self.observer.notify(&WorkflowEvent::PlanCreated {
            plan_id: plan.id,
            order_id: plan.order_id,
        });
        Ok(plan)
    }

    pub async fn get_plan(&self, id: i32) -> CoreResult<plans::Model> {
        lineage::load_plan(&self.db, id).await
    }

    pub async fn list_plans(&self) -> CoreResult<Vec<plans::Model>> {
        Ok(plans::Entity::find()
            .order_by_desc(plans::Column::CreatedAt)
            .order_by_desc(plans::Column::Id)
            .all(&self.db)
            .await?)
    }

    pub async fn list_plans_by_order(&self, order_id: i32) -> CoreResult<Vec<plans::Model>> {
        Ok(plans::Entity::find()
            .filter(plans::Column::OrderId.eq(order_id))
            .order_by_asc(plans::Column::Id)
            .all(&self.db)
            .await?)
    }

    /// The note stays editable after publish; only a frozen plan refuses it.
    pub async fn update_note(&self, id: i32, note: Option<String>) -> CoreResult<plans::Model> {
        let txn = self.db.begin().await?;
        let plan = lineage::load_plan(&txn, id).await?;
        lineage::ensure_not_frozen(&plan)?;

        let mut active: plans::ActiveModel = plan.into();
        active.note = Set(note);
        active.updated_at = Set(Utc::now());
        let plan = active.update(&txn).await?;
        txn.commit().await?;
        Ok(plan)
    }

    pub async fn publish_plan(&self, id: i32) -> CoreResult<plans::Model> {
        let txn = self.db.begin().await?;
        let plan = lineage::load_plan(&txn, id).await?;

        let status = plan.status();
        if status != PlanStatus::Pending {
            return Err(CoreError::invalid_stage(
                format!("Only pending plans can be published; plan {} is {}", id, status),
                status.as_str(),
            ));
        }

        let task_count = lineage::task_ids_of_plan(&txn, id).await?.len();
        if task_count == 0 {
            return Err(CoreError::invalid_stage(
                format!("Plan {} has no tasks to publish", id),
                status.as_str(),
            ));
        }

        let now = Utc::now();
        let mut active: plans::ActiveModel = plan.into();
        active.status = Set(PlanStatus::InProgress.as_str().to_string());
        active.published_at = Set(Some(now));
        active.updated_at = Set(now);
        let plan = active.update(&txn).await?;
        txn.commit().await?;

        info!(plan_id = id, task_count, "Plan published");
        self.observer
            .notify(&WorkflowEvent::PlanPublished { plan_id: id });
        Ok(plan)
    }

    pub async fn freeze_plan(&self, id: i32) -> CoreResult<plans::Model> {
        let txn = self.db.begin().await?;
        let plan = lineage::load_plan(&txn, id).await?;

        let status = plan.status();
        if status != PlanStatus::Completed {
            return Err(CoreError::invalid_stage(
                format!("Only completed plans can be frozen; plan {} is {}", id, status),
                status.as_str(),
            ));
        }

        let now = Utc::now();
        let mut active: plans::ActiveModel = plan.into();
        active.status = Set(PlanStatus::Frozen.as_str().to_string());
        active.frozen_at = Set(Some(now));
        active.updated_at = Set(now);
        let plan = active.update(&txn).await?;
        txn.commit().await?;

        self.observer
            .notify(&WorkflowEvent::PlanFrozen { plan_id: id });
        Ok(plan)
    }

    /// Allowed in every status; takes layouts, ratios, tasks and logs with it.
    pub async fn delete_plan(&self, id: i32) -> CoreResult<()> {
        let txn = self.db.begin().await?;
        lineage::load_plan(&txn, id).await?;
        lineage::delete_plans(&txn, &[id]).await?;
        txn.commit().await?;

        self.observer
            .notify(&WorkflowEvent::PlanDeleted { plan_id: id });
        Ok(())
    }
}
