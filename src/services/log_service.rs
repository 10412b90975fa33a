use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait,
};
use serde::Serialize;
use tracing::{debug, info};

use super::events::{default_observer, WorkflowEvent, WorkflowObserver};
use super::lineage;
use super::progress::{self, PlanTransition, Recomputed};
use crate::config::VoidPolicy;
use crate::database::entities::{plans, production_logs, tasks, users};
use crate::errors::{CoreError, CoreResult};

pub const DEFAULT_PAGE_SIZE: u64 = 50;
pub const MAX_PAGE_SIZE: u64 = 500;

#[derive(Clone, Debug)]
pub struct LogCreateRequest {
    pub task_id: i32,
    pub worker_id: Option<i32>,
    pub worker_name: Option<String>,
    pub layers_completed: i32,
    pub note: Option<String>,
    /// Defaults to now
    pub log_time: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default)]
pub struct VoidRequest {
    pub reason: Option<String>,
    pub voided_by: Option<i32>,
}

/// Limits applied when a worker voids a log themselves.
#[derive(Clone, Debug)]
pub struct SelfServiceVoid {
    pub worker_id: i32,
    pub worker_name: String,
    pub policy: VoidPolicy,
}

#[derive(Clone, Debug, Default)]
pub struct LogFilter {
    pub task_id: Option<i32>,
    pub worker_id: Option<i32>,
    pub voided: Option<bool>,
}

/// A log write together with the aggregates it changed.
#[derive(Clone, Debug, Serialize)]
pub struct LogOutcome {
    pub log: production_logs::Model,
    pub task: tasks::Model,
    pub plan: plans::Model,
}

#[derive(Clone, Debug, Serialize)]
pub struct LogPage {
    pub logs: Vec<production_logs::Model>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

/// The only write path for production logs, and therefore for task and plan
/// progress.
#[derive(Clone)]
pub struct LogService {
    db: DatabaseConnection,
    observer: Arc<dyn WorkflowObserver>,
}

impl LogService {
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

    pub async fn create_log(&self, request: LogCreateRequest) -> CoreResult<LogOutcome> {
        if request.layers_completed <= 0 {
            return Err(CoreError::validation("layers_completed must be greater than zero")
                .with_field("layers_completed", request.layers_completed.to_string()));
        }
        let mut worker_name = non_empty(request.worker_name);
        if request.worker_id.is_none() && worker_name.is_none() {
            return Err(CoreError::validation(
                "A log needs a worker_id or a worker_name",
            ));
        }

        let txn = self.db.begin().await?;
        let (task, plan) = lineage::plan_of_task(&txn, request.task_id).await?;

        let plan_status = plan.status();
        if !plan_status.accepts_logs() {
            return Err(CoreError::invalid_stage(
                format!(
                    "Logs can only be recorded while the plan is in progress; plan {} is {}",
                    plan.id, plan_status
                ),
                plan_status.as_str(),
            ));
        }
        let task_status = task.status();
        if task_status.is_terminal() {
            return Err(CoreError::invalid_stage(
                format!("Task {} is already {}", task.id, task_status),
                task_status.as_str(),
            ));
        }

        if i64::from(task.completed_layers) + i64::from(request.layers_completed)
            > i64::from(i32::MAX)
        {
            return Err(CoreError::validation(format!(
                "Task {} cannot hold more than {} completed layers",
                task.id,
                i32::MAX
            ))
            .with_field("layers_completed", request.layers_completed.to_string()));
        }

        if let Some(worker_id) = request.worker_id {
            let worker = find_user(&txn, worker_id).await?;
            worker_name.get_or_insert(worker.name);
        }

        let log = production_logs::ActiveModel {
            id: NotSet,
            task_id: Set(task.id),
            worker_id: Set(request.worker_id),
            worker_name: Set(worker_name),
            layers_completed: Set(request.layers_completed),
            log_time: Set(request.log_time.unwrap_or_else(Utc::now)),
            note: Set(non_empty(request.note)),
            voided: Set(false),
            void_reason: Set(None),
            voided_by: Set(None),
            voided_at: Set(None),
            voided_by_name: Set(None),
        }
        .insert(&txn)
        .await?;

        let recomputed = progress::recompute_from_task(&txn, task.id).await?;
        txn.commit().await?;

        self.observer.notify(&WorkflowEvent::LogCreated {
            log_id: log.id,
            task_id: log.task_id,
            layers: log.layers_completed,
        });
        Ok(self.finish(log, recomputed))
    }

    /// Void a log and re-derive task and plan progress. Voiding is one-way;
    /// a second void is a conflict and leaves the aggregates untouched.
    pub async fn void_log(
        &self,
        log_id: i32,
        request: VoidRequest,
        self_service: Option<&SelfServiceVoid>,
    ) -> CoreResult<LogOutcome> {
        let txn = self.db.begin().await?;
        let log = lineage::load_log(&txn, log_id).await?;
        let now = Utc::now();

        if let Some(guard) = self_service {
            check_self_service(&txn, &log, guard, now).await?;
        }

        if log.voided {
            return Err(CoreError::conflict(format!("Log {} is already voided", log_id))
                .with_field("current_status", "voided"));
        }

        let voided_by_name = match request.voided_by {
            Some(user_id) => Some(find_user(&txn, user_id).await?.name),
            None => None,
        };

        let task_id = log.task_id;
        let mut active: production_logs::ActiveModel = log.into();
        active.voided = Set(true);
        active.void_reason = Set(non_empty(request.reason));
        active.voided_by = Set(request.voided_by);
        active.voided_at = Set(Some(now));
        active.voided_by_name = Set(voided_by_name);
        let log = active.update(&txn).await?;

        let recomputed = progress::recompute_from_task(&txn, task_id).await?;
        txn.commit().await?;

        self.observer.notify(&WorkflowEvent::LogVoided {
            log_id,
            task_id,
            voided_by: log.voided_by,
        });
        Ok(self.finish(log, recomputed))
    }

    /// Correct the reason or actor of an existing void. Progress is not
    /// recomputed because the set of counted logs does not change.
    pub async fn amend_void(
        &self,
        log_id: i32,
        request: VoidRequest,
    ) -> CoreResult<production_logs::Model> {
        let txn = self.db.begin().await?;
        let log = lineage::load_log(&txn, log_id).await?;
        if !log.voided {
            return Err(CoreError::conflict(format!("Log {} is not voided", log_id))
                .with_field("current_status", "active"));
        }

        let mut active: production_logs::ActiveModel = log.into();
        if let Some(reason) = request.reason {
            active.void_reason = Set(non_empty(Some(reason)));
        }
        if let Some(user_id) = request.voided_by {
            let user = find_user(&txn, user_id).await?;
            active.voided_by = Set(Some(user.id));
            active.voided_by_name = Set(Some(user.name));
        }
        let log = active.update(&txn).await?;
        txn.commit().await?;

        info!(log_id, "Void metadata amended");
        Ok(log)
    }

    fn finish(&self, log: production_logs::Model, recomputed: Recomputed) -> LogOutcome {
        let plan_id = recomputed.plan.id;
        match recomputed.transition {
            PlanTransition::Completed => self
                .observer
                .notify(&WorkflowEvent::PlanCompleted { plan_id }),
            PlanTransition::Reopened => self
                .observer
                .notify(&WorkflowEvent::PlanReopened { plan_id }),
            PlanTransition::Unchanged => {}
        }

        LogOutcome {
            log,
            task: recomputed.task,
            plan: recomputed.plan,
        }
    }

    pub async fn get_log(&self, id: i32) -> CoreResult<production_logs::Model> {
        lineage::load_log(&self.db, id).await
    }

    /// Distinct worker names across the task's non-voided logs, ascending.
    /// Logs that only carry a worker id use that user's current name.
    pub async fn list_participants(&self, task_id: i32) -> CoreResult<Vec<String>> {
        lineage::load_task(&self.db, task_id).await?;

        let logs = production_logs::Entity::find()
            .filter(production_logs::Column::TaskId.eq(task_id))
            .filter(production_logs::Column::Voided.eq(false))
            .all(&self.db)
            .await?;

        let mut names = BTreeSet::new();
        let mut unnamed_ids = BTreeSet::new();
        for log in logs {
            match (non_empty(log.worker_name), log.worker_id) {
                (Some(name), _) => {
                    names.insert(name);
                }
                (None, Some(id)) => {
                    unnamed_ids.insert(id);
                }
                (None, None) => {}
            }
        }

        if !unnamed_ids.is_empty() {
            let users = users::Entity::find()
                .filter(users::Column::Id.is_in(unnamed_ids))
                .all(&self.db)
                .await?;
            names.extend(users.into_iter().map(|user| user.name));
        }

        Ok(names.into_iter().collect())
    }

    pub async fn list_by_task(&self, task_id: i32) -> CoreResult<Vec<production_logs::Model>> {
        self.list_for_tasks(vec![task_id]).await
    }

    pub async fn list_by_layout(&self, layout_id: i32) -> CoreResult<Vec<production_logs::Model>> {
        let task_ids = lineage::task_ids_of_layout(&self.db, layout_id).await?;
        self.list_for_tasks(task_ids).await
    }

    pub async fn list_by_plan(&self, plan_id: i32) -> CoreResult<Vec<production_logs::Model>> {
        let task_ids = lineage::task_ids_of_plan(&self.db, plan_id).await?;
        self.list_for_tasks(task_ids).await
    }

    async fn list_for_tasks(&self, task_ids: Vec<i32>) -> CoreResult<Vec<production_logs::Model>> {
        if task_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(newest_first(
            production_logs::Entity::find()
                .filter(production_logs::Column::TaskId.is_in(task_ids)),
        )
        .all(&self.db)
        .await?)
    }

    /// Logs recorded for a worker, matched by id or by name.
    pub async fn list_by_worker(
        &self,
        worker_id: Option<i32>,
        worker_name: Option<&str>,
    ) -> CoreResult<Vec<production_logs::Model>> {
        let worker_name = worker_name.map(str::trim).filter(|name| !name.is_empty());
        if worker_id.is_none() && worker_name.is_none() {
            return Err(CoreError::validation(
                "worker_id or worker_name is required",
            ));
        }

        let mut condition = Condition::any();
        if let Some(id) = worker_id {
            condition = condition.add(production_logs::Column::WorkerId.eq(id));
        }
        if let Some(name) = worker_name {
            condition = condition.add(production_logs::Column::WorkerName.eq(name));
        }

        Ok(newest_first(production_logs::Entity::find().filter(condition))
            .all(&self.db)
            .await?)
    }

    pub async fn list_all(
        &self,
        filter: LogFilter,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> CoreResult<LogPage> {
        let limit = limit
            .filter(|limit| *limit > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);
        let offset = offset.unwrap_or(0);

        let mut select = production_logs::Entity::find();
        if let Some(task_id) = filter.task_id {
            select = select.filter(production_logs::Column::TaskId.eq(task_id));
        }
        if let Some(worker_id) = filter.worker_id {
            select = select.filter(production_logs::Column::WorkerId.eq(worker_id));
        }
        if let Some(voided) = filter.voided {
            select = select.filter(production_logs::Column::Voided.eq(voided));
        }

        let total = select.clone().count(&self.db).await?;
        let logs = newest_first(select)
            .limit(limit)
            .offset(offset)
            .all(&self.db)
            .await?;

        Ok(LogPage {
            logs,
            total,
            limit,
            offset,
        })
    }

    /// Voids performed by `worker_id` since `since`.
    pub async fn count_voided_by_worker_since(
        &self,
        worker_id: i32,
        since: DateTime<Utc>,
    ) -> CoreResult<u64> {
        count_voids_since(&self.db, worker_id, since).await
    }

    pub async fn count_voided_by_worker_in_24_hours(&self, worker_id: i32) -> CoreResult<u64> {
        self.count_voided_by_worker_since(worker_id, Utc::now() - Duration::hours(24))
            .await
    }

    pub async fn list_recent_voided(
        &self,
        limit: Option<u64>,
    ) -> CoreResult<Vec<production_logs::Model>> {
        let limit = limit
            .filter(|limit| *limit > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);

        Ok(production_logs::Entity::find()
            .filter(production_logs::Column::Voided.eq(true))
            .order_by_desc(production_logs::Column::VoidedAt)
            .order_by_desc(production_logs::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?)
    }
}

fn newest_first(select: Select<production_logs::Entity>) -> Select<production_logs::Entity> {
    select
        .order_by_desc(production_logs::Column::LogTime)
        .order_by_desc(production_logs::Column::Id)
}

/// Ownership, age and quota checks for a worker voiding their own log.
async fn check_self_service<C: ConnectionTrait>(
    conn: &C,
    log: &production_logs::Model,
    guard: &SelfServiceVoid,
    now: DateTime<Utc>,
) -> CoreResult<()> {
    if !log.is_recorded_for(guard.worker_id, &guard.worker_name) {
        return Err(CoreError::forbidden(format!(
            "Log {} was not recorded by you",
            log.id
        )));
    }

    if now - log.log_time > guard.policy.window {
        return Err(CoreError::forbidden(format!(
            "Log {} is older than {} hours and can no longer be voided",
            log.id,
            guard.policy.window.num_hours()
        )));
    }

    let used = count_voids_since(conn, guard.worker_id, now - guard.policy.window).await?;
    if used >= guard.policy.max_voids {
        debug!(worker_id = guard.worker_id, used, "Void quota exhausted");
        return Err(CoreError::forbidden(format!(
            "Void limit of {} per {} hours reached",
            guard.policy.max_voids,
            guard.policy.window.num_hours()
        ))
        .with_field("voids_used", used.to_string()));
    }

    Ok(())
}

async fn count_voids_since<C: ConnectionTrait>(
    conn: &C,
    worker_id: i32,
    since: DateTime<Utc>,
) -> CoreResult<u64> {
    let voided = production_logs::Entity::find()
        .filter(production_logs::Column::Voided.eq(true))
        .filter(production_logs::Column::VoidedBy.eq(worker_id))
        .all(conn)
        .await?;

    Ok(voided
        .iter()
        .filter(|log| log.voided_at.is_some_and(|at| at >= since))
        .count() as u64)
}

async fn find_user<C: ConnectionTrait>(conn: &C, id: i32) -> CoreResult<users::Model> {
    users::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| CoreError::not_found("User", id.to_string()))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
