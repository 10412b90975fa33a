use super::AppContext;
use crate::auth::Actor;
use crate::database::entities::production_logs;
use crate::errors::{CoreError, CoreResult};
use crate::services::{
    LogCreateRequest, LogFilter, LogOutcome, LogPage, SelfServiceVoid, VoidRequest,
};

impl AppContext {
    /// Supervisors may log for anyone. Everyone else is recorded as the
    /// worker and may not name a different worker id.
    pub async fn create_log(
        &self,
        actor: &Actor,
        mut request: LogCreateRequest,
    ) -> CoreResult<LogOutcome> {
        self.authorize(actor, "log:create")?;

        if !actor.is_supervisor() {
            match request.worker_id {
                Some(worker_id) if worker_id != actor.user_id => {
                    return Err(CoreError::forbidden(
                        "Workers can only record their own production",
                    ));
                }
                _ => {}
            }
            request.worker_id = Some(actor.user_id);
            request.worker_name = Some(actor.name.clone());
            // the void window is measured from log_time
            request.log_time = None;
        }

        self.log_service.create_log(request).await
    }

    /// Void a log on behalf of `actor`. Non-supervisors may only void their
    /// own recent logs and only a limited number of times per window.
    pub async fn void_log(
        &self,
        actor: &Actor,
        log_id: i32,
        reason: Option<String>,
    ) -> CoreResult<LogOutcome> {
        self.authorize(actor, "log:void")?;

        let self_service = (!actor.is_supervisor()).then(|| SelfServiceVoid {
            worker_id: actor.user_id,
            worker_name: actor.name.clone(),
            policy: self.void_policy,
        });

        self.log_service
            .void_log(
                log_id,
                VoidRequest {
                    reason,
                    voided_by: Some(actor.user_id),
                },
                self_service.as_ref(),
            )
            .await
    }

    pub async fn amend_void(
        &self,
        actor: &Actor,
        log_id: i32,
        request: VoidRequest,
    ) -> CoreResult<production_logs::Model> {
        Self::require_supervisor(actor)?;
        self.log_service.amend_void(log_id, request).await
    }

    /// Supervisors see any log; others only logs recorded for them.
    pub async fn get_log(&self, actor: &Actor, id: i32) -> CoreResult<production_logs::Model> {
        Self::ensure_active(actor)?;
        let log = self.log_service.get_log(id).await?;
        if actor.is_supervisor() || log.is_recorded_for(actor.user_id, &actor.name) {
            Ok(log)
        } else {
            Err(CoreError::forbidden(format!(
                "Log {} was not recorded by you",
                id
            )))
        }
    }

    pub async fn list_participants(&self, actor: &Actor, task_id: i32) -> CoreResult<Vec<String>> {
        Self::require_supervisor(actor)?;
        self.log_service.list_participants(task_id).await
    }

    pub async fn list_logs_by_task(
        &self,
        actor: &Actor,
        task_id: i32,
    ) -> CoreResult<Vec<production_logs::Model>> {
        Self::require_supervisor(actor)?;
        self.log_service.list_by_task(task_id).await
    }

    pub async fn list_logs_by_layout(
        &self,
        actor: &Actor,
        layout_id: i32,
    ) -> CoreResult<Vec<production_logs::Model>> {
        Self::require_supervisor(actor)?;
        self.log_service.list_by_layout(layout_id).await
    }

    pub async fn list_logs_by_plan(
        &self,
        actor: &Actor,
        plan_id: i32,
    ) -> CoreResult<Vec<production_logs::Model>> {
        Self::require_supervisor(actor)?;
        self.log_service.list_by_plan(plan_id).await
    }

    pub async fn list_logs_by_worker(
        &self,
        actor: &Actor,
        worker_id: Option<i32>,
        worker_name: Option<&str>,
    ) -> CoreResult<Vec<production_logs::Model>> {
        Self::require_supervisor(actor)?;
        self.log_service.list_by_worker(worker_id, worker_name).await
    }

    pub async fn list_all_logs(
        &self,
        actor: &Actor,
        filter: LogFilter,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> CoreResult<LogPage> {
        Self::require_supervisor(actor)?;
        self.log_service.list_all(filter, limit, offset).await
    }

    pub async fn list_recent_voided(
        &self,
        actor: &Actor,
        limit: Option<u64>,
    ) -> CoreResult<Vec<production_logs::Model>> {
        Self::require_supervisor(actor)?;
        self.log_service.list_recent_voided(limit).await
    }

    pub async fn count_voided_by_worker_in_24_hours(
        &self,
        actor: &Actor,
        worker_id: i32,
    ) -> CoreResult<u64> {
        Self::require_supervisor(actor)?;
        self.log_service
            .count_voided_by_worker_in_24_hours(worker_id)
            .await
    }

    pub async fn list_my_logs(&self, actor: &Actor) -> CoreResult<Vec<production_logs::Model>> {
        Self::ensure_active(actor)?;
        self.log_service
            .list_by_worker(Some(actor.user_id), Some(&actor.name))
            .await
    }
}
