use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tracing::debug;

use super::events::{default_observer, WorkflowEvent, WorkflowObserver};
use super::lineage;
use crate::database::entities::{layout_size_ratios, layouts};
use crate::errors::{CoreError, CoreResult};

#[derive(Clone)]
pub struct LayoutService {
    db: DatabaseConnection,
    observer: Arc<dyn WorkflowObserver>,
}

impl LayoutService {
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

    pub async fn create_layout(
        &self,
        plan_id: i32,
        layout_name: &str,
        note: Option<String>,
    ) -> CoreResult<layouts::Model> {
        let layout_name = layout_name.trim();
        if layout_name.is_empty() {
            return Err(CoreError::validation("layout_name is required"));
        }

        let txn = self.db.begin().await?;
        let plan = lineage::load_plan(&txn, plan_id).await?;
        lineage::ensure_pending(&plan, "add a layout")?;

        let now = Utc::now();
        let layout = layouts::ActiveModel {
            id: NotSet,
            plan_id: Set(plan_id),
            layout_name: Set(layout_name.to_string()),
            note: Set(note),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        self.observer.notify(&WorkflowEvent::LayoutCreated {
            layout_id: layout.id,
            plan_id,
        });
        Ok(layout)
    }

    pub async fn get_layout(&self, id: i32) -> CoreResult<layouts::Model> {
        lineage::load_layout(&self.db, id).await
    }

    pub async fn list_layouts_by_plan(&self, plan_id: i32) -> CoreResult<Vec<layouts::Model>> {
        Ok(layouts::Entity::find()
            .filter(layouts::Column::PlanId.eq(plan_id))
            .order_by_asc(layouts::Column::Id)
            .all(&self.db)
            .await?)
    }

    pub async fn update_layout_name(&self, id: i32, layout_name: &str) -> CoreResult<layouts::Model> {
        let layout_name = layout_name.trim();
        if layout_name.is_empty() {
            return Err(CoreError::validation("layout_name is required"));
        }

        let txn = self.db.begin().await?;
        let (layout, plan) = lineage::plan_of_layout(&txn, id).await?;
        lineage::ensure_pending(&plan, "rename a layout")?;

        let mut active: layouts::ActiveModel = layout.into();
        active.layout_name = Set(layout_name.to_string());
        active.updated_at = Set(Utc::now());
        let layout = active.update(&txn).await?;
        txn.commit().await?;
        Ok(layout)
    }

    /// Permitted in every plan status.
    pub async fn update_layout_note(
        &self,
        id: i32,
        note: Option<String>,
    ) -> CoreResult<layouts::Model> {
        let layout = lineage::load_layout(&self.db, id).await?;
        let mut active: layouts::ActiveModel = layout.into();
        active.note = Set(note);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&self.db).await?)
    }

    pub async fn delete_layout(&self, id: i32) -> CoreResult<()> {
        let txn = self.db.begin().await?;
        let (_, plan) = lineage::plan_of_layout(&txn, id).await?;
        lineage::ensure_pending(&plan, "delete a layout")?;
        lineage::delete_layouts(&txn, &[id]).await?;
        txn.commit().await?;

        self.observer
            .notify(&WorkflowEvent::LayoutDeleted { layout_id: id });
        Ok(())
    }

    pub async fn get_layout_ratios(
        &self,
        layout_id: i32,
    ) -> CoreResult<Vec<layout_size_ratios::Model>> {
        lineage::load_layout(&self.db, layout_id).await?;
        Ok(layout_size_ratios::Entity::find()
            .filter(layout_size_ratios::Column::LayoutId.eq(layout_id))
            .order_by_asc(layout_size_ratios::Column::Size)
            .all(&self.db)
            .await?)
    }

    /// Replace the whole size/ratio set of a layout in one transaction.
    pub async fn set_layout_ratios(
        &self,
        layout_id: i32,
        ratios: &[(String, i32)],
    ) -> CoreResult<Vec<layout_size_ratios::Model>> {
        let mut normalized = BTreeMap::new();
        for (size, ratio) in ratios {
            let size = size.trim();
            if size.is_empty() {
                return Err(CoreError::validation("Ratio size cannot be empty"));
            }
            if *ratio < 0 {
                return Err(CoreError::validation(format!(
                    "Ratio for size '{}' cannot be negative",
                    size
                ))
                .with_field("size", size));
            }
            if normalized.insert(size.to_string(), *ratio).is_some() {
                return Err(CoreError::validation(format!(
                    "Size '{}' is listed more than once",
                    size
                ))
                .with_field("size", size));
            }
        }

        let txn = self.db.begin().await?;
        let (_, plan) = lineage::plan_of_layout(&txn, layout_id).await?;
        lineage::ensure_pending(&plan, "change layout ratios")?;

        layout_size_ratios::Entity::delete_many()
            .filter(layout_size_ratios::Column::LayoutId.eq(layout_id))
            .exec(&txn)
            .await?;

        let mut stored = Vec::with_capacity(normalized.len());
        for (size, ratio) in normalized {
            stored.push(
                layout_size_ratios::ActiveModel {
                    id: NotSet,
                    layout_id: Set(layout_id),
                    size: Set(size),
                    ratio: Set(ratio),
                }
                .insert(&txn)
                .await?,
            );
        }
        txn.commit().await?;

        debug!(layout_id, sizes = stored.len(), "Layout ratios replaced");
        Ok(stored)
    }
}
