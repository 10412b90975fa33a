//! Derived progress state.
//!
//! `tasks.completed_layers` is the sum of `layers_completed` over the task's
//! non-voided logs, and `tasks.status` follows from it. A plan that is in
//! progress becomes completed once it has at least one task and every task is
//! completed; a completed plan drops back to in progress as soon as one task
//! is no longer completed. Pending and frozen plans are never touched.
//!
//! These functions are called inside the transaction that changed the logs so
//! the aggregate can never be observed half-applied.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
};
use tracing::debug;

use super::lineage;
use crate::database::entities::{plans, production_logs, tasks, PlanStatus, TaskStatus};
use crate::errors::{CoreError, CoreResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanTransition {
    Unchanged,
    Completed,
    Reopened,
}

/// Result of recomputing one task and its plan.
#[derive(Clone, Debug)]
pub struct Recomputed {
    pub task: tasks::Model,
    pub plan: plans::Model,
    pub transition: PlanTransition,
}

pub async fn recompute_task<C: ConnectionTrait>(conn: &C, task_id: i32) -> CoreResult<tasks::Model> {
    let task = lineage::load_task(conn, task_id).await?;

    let completed = production_logs::Entity::find()
        .filter(production_logs::Column::TaskId.eq(task_id))
        .filter(production_logs::Column::Voided.eq(false))
        .all(conn)
        .await?
        .iter()
        .try_fold(0i64, |total, log| total.checked_add(i64::from(log.layers_completed)))
        .and_then(|total| i32::try_from(total).ok())
        .ok_or_else(|| {
            CoreError::validation(format!(
                "Completed layers of task {} would exceed {}",
                task_id,
                i32::MAX
            ))
        })?;
    let status = TaskStatus::derive(completed, task.planned_layers);

    if task.completed_layers == completed && task.status == status.as_str() {
        return Ok(task);
    }

    debug!(
        task_id,
        completed_layers = completed,
        status = status.as_str(),
        "Recomputed task progress"
    );

    let mut active: tasks::ActiveModel = task.into();
    active.completed_layers = Set(completed);
    active.status = Set(status.as_str().to_string());
    active.updated_at = Set(Utc::now());
    Ok(active.update(conn).await?)
}

pub async fn recompute_plan<C: ConnectionTrait>(
    conn: &C,
    plan_id: i32,
) -> CoreResult<(plans::Model, PlanTransition)> {
    let plan = lineage::load_plan(conn, plan_id).await?;
    let status = plan.status();
    if !matches!(status, PlanStatus::InProgress | PlanStatus::Completed) {
        return Ok((plan, PlanTransition::Unchanged));
    }

    let task_ids = lineage::task_ids_of_plan(conn, plan_id).await?;
    let tasks = if task_ids.is_empty() {
        Vec::new()
    } else {
        tasks::Entity::find()
            .filter(tasks::Column::Id.is_in(task_ids))
            .all(conn)
            .await?
    };
    let all_completed = !tasks.is_empty() && tasks.iter().all(|t| t.status().is_terminal());

    let now = Utc::now();
    let (next, finished_at, transition) = match (status, all_completed) {
        (PlanStatus::InProgress, true) => (
            PlanStatus::Completed,
            Some(now),
            PlanTransition::Completed,
        ),
        (PlanStatus::Completed, false) => (PlanStatus::InProgress, None, PlanTransition::Reopened),
        _ => return Ok((plan, PlanTransition::Unchanged)),
    };

    debug!(plan_id, from = %status, to = %next, "Plan status derived from tasks");

    let mut active: plans::ActiveModel = plan.into();
    active.status = Set(next.as_str().to_string());
    active.finished_at = Set(finished_at);
    active.updated_at = Set(now);
    Ok((active.update(conn).await?, transition))
}

/// Recompute a task and then the plan that owns it.
pub async fn recompute_from_task<C: ConnectionTrait>(
    conn: &C,
    task_id: i32,
) -> CoreResult<Recomputed> {
    let task = recompute_task(conn, task_id).await?;
    let layout = lineage::load_layout(conn, task.layout_id).await?;
    let (plan, transition) = recompute_plan(conn, layout.plan_id).await?;
    Ok(Recomputed {
        task,
        plan,
        transition,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_utils::setup_test_db;
    use crate::database::entities::{layouts, orders};
    use sea_orm::ActiveValue::NotSet;

    async fn seed_plan(
        db: &sea_orm::DatabaseConnection,
        status: PlanStatus,
        planned: &[i32],
    ) -> (plans::Model, Vec<tasks::Model>) {
        let now = Utc::now();
        let order = orders::ActiveModel {
            id: NotSet,
            order_number: Set("PO-1".to_string()),
            style_number: Set("ST-1".to_string()),
            customer_name: Set(None),
            order_start_date: Set(None),
            order_finish_date: Set(None),
            note: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .unwrap();

        let plan = plans::ActiveModel {
            id: NotSet,
            plan_name: Set("P".to_string()),
            order_id: Set(order.id),
            note: Set(None),
            planned_publish_date: Set(None),
            planned_finish_date: Set(None),
            status: Set(status.as_str().to_string()),
            published_at: Set(None),
            finished_at: Set(None),
            frozen_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .unwrap();

        let layout = layouts::ActiveModel {
            id: NotSet,
            plan_id: Set(plan.id),
            layout_name: Set("L".to_string()),
            note: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .unwrap();

        let mut created = Vec::new();
        for planned_layers in planned {
            created.push(
                tasks::ActiveModel {
                    id: NotSet,
                    layout_id: Set(layout.id),
                    color: Set("red".to_string()),
                    planned_layers: Set(*planned_layers),
                    completed_layers: Set(0),
                    status: Set(TaskStatus::Pending.as_str().to_string()),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(db)
                .await
                .unwrap(),
            );
        }

        (plan, created)
    }

    async fn add_log(db: &sea_orm::DatabaseConnection, task_id: i32, layers: i32, voided: bool) {
        production_logs::ActiveModel {
            id: NotSet,
            task_id: Set(task_id),
            worker_id: Set(None),
            worker_name: Set(Some("wang".to_string())),
            layers_completed: Set(layers),
            log_time: Set(Utc::now()),
            note: Set(None),
            voided: Set(voided),
            void_reason: Set(None),
            voided_by: Set(None),
            voided_at: Set(None),
            voided_by_name: Set(None),
        }
        .insert(db)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_task_sum_ignores_voided_logs() {
        let db = setup_test_db().await;
        let (_, tasks) = seed_plan(&db, PlanStatus::InProgress, &[5]).await;
        add_log(&db, tasks[0].id, 2, false).await;
        add_log(&db, tasks[0].id, 2, true).await;

        let task = recompute_task(&db, tasks[0].id).await.unwrap();
        assert_eq!(task.completed_layers, 2);
        assert_eq!(task.status, "in_progress");
    }

    #[tokio::test]
    async fn test_task_sum_beyond_i32_is_rejected() {
        let db = setup_test_db().await;
        let (_, tasks) = seed_plan(&db, PlanStatus::InProgress, &[i32::MAX]).await;
        add_log(&db, tasks[0].id, 2_000_000_000, false).await;
        add_log(&db, tasks[0].id, 2_000_000_000, false).await;

        let err = recompute_task(&db, tasks[0].id).await.unwrap_err();
        assert_eq!(err.kind(), crate::errors::CoreErrorKind::Validation);

        let stored = lineage::load_task(&db, tasks[0].id).await.unwrap();
        assert_eq!(stored.completed_layers, 0);
    }

    #[tokio::test]
    async fn test_plan_completes_and_reopens() {
        let db = setup_test_db().await;
        let (plan, tasks) = seed_plan(&db, PlanStatus::InProgress, &[1, 1]).await;

        add_log(&db, tasks[0].id, 1, false).await;
        let first = recompute_from_task(&db, tasks[0].id).await.unwrap();
        assert_eq!(first.transition, PlanTransition::Unchanged);

        add_log(&db, tasks[1].id, 1, false).await;
        let second = recompute_from_task(&db, tasks[1].id).await.unwrap();
        assert_eq!(second.transition, PlanTransition::Completed);
        assert_eq!(second.plan.status, "completed");
        assert!(second.plan.finished_at.is_some());

        production_logs::Entity::update_many()
            .col_expr(production_logs::Column::Voided, sea_orm::sea_query::Expr::value(true))
            .filter(production_logs::Column::TaskId.eq(tasks[1].id))
            .exec(&db)
            .await
            .unwrap();
        let third = recompute_from_task(&db, tasks[1].id).await.unwrap();
        assert_eq!(third.transition, PlanTransition::Reopened);
        assert_eq!(third.plan.id, plan.id);
        assert_eq!(third.plan.status, "in_progress");
        assert!(third.plan.finished_at.is_none());
    }

    #[tokio::test]
    async fn test_frozen_plan_is_left_alone() {
        let db = setup_test_db().await;
        let (_, tasks) = seed_plan(&db, PlanStatus::Frozen, &[1]).await;
        add_log(&db, tasks[0].id, 1, false).await;

        let result = recompute_from_task(&db, tasks[0].id).await.unwrap();
        assert_eq!(result.task.status, "completed");
        assert_eq!(result.plan.status, "frozen");
        assert_eq!(result.transition, PlanTransition::Unchanged);
    }
}
