use super::AppContext;
use crate::auth::Actor;
use crate::database::entities::tasks;
use crate::errors::CoreResult;

impl AppContext {
    pub async fn create_task(
        &self,
        actor: &Actor,
        layout_id: i32,
        color: &str,
        planned_layers: i32,
    ) -> CoreResult<tasks::Model> {
        self.authorize(actor, "task:create")?;
        self.task_service
            .create_task(layout_id, color, planned_layers)
            .await
    }

    pub async fn get_task(&self, actor: &Actor, id: i32) -> CoreResult<tasks::Model> {
        self.authorize(actor, "task:read")?;
        self.task_service.get_task(id).await
    }

    pub async fn list_tasks(&self, actor: &Actor) -> CoreResult<Vec<tasks::Model>> {
        self.authorize(actor, "task:read")?;
        self.task_service.list_tasks().await
    }

    pub async fn list_tasks_by_layout(
        &self,
        actor: &Actor,
        layout_id: i32,
    ) -> CoreResult<Vec<tasks::Model>> {
        self.authorize(actor, "task:read")?;
        self.task_service.list_tasks_by_layout(layout_id).await
    }

    pub async fn delete_task(&self, actor: &Actor, id: i32) -> CoreResult<()> {
        self.authorize(actor, "task:delete")?;
        self.task_service.delete_task(id).await
    }
}
