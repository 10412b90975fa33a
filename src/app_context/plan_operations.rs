use super::AppContext;
use crate::auth::Actor;
use crate::database::entities::plans;
use crate::errors::CoreResult;
use crate::services::PlanCreateRequest;

impl AppContext {
    pub async fn create_plan(
        &self,
        actor: &Actor,
        request: PlanCreateRequest,
    ) -> CoreResult<plans::Model> {
        self.authorize(actor, "plan:create")?;
        self.plan_service.create_plan(request).await
    }

    pub async fn get_plan(&self, actor: &Actor, id: i32) -> CoreResult<plans::Model> {
        self.authorize(actor, "plan:read")?;
        self.plan_service.get_plan(id).await
    }

    pub async fn list_plans(&self, actor: &Actor) -> CoreResult<Vec<plans::Model>> {
        self.authorize(actor, "plan:read")?;
        self.plan_service.list_plans().await
    }

    pub async fn list_plans_by_order(
        &self,
        actor: &Actor,
        order_id: i32,
    ) -> CoreResult<Vec<plans::Model>> {
        self.authorize(actor, "plan:read")?;
        self.plan_service.list_plans_by_order(order_id).await
    }

    pub async fn update_plan_note(
        &self,
        actor: &Actor,
        id: i32,
        note: Option<String>,
    ) -> CoreResult<plans::Model> {
        self.authorize(actor, "plan:update")?;
        self.plan_service.update_note(id, note).await
    }

    pub async fn publish_plan(&self, actor: &Actor, id: i32) -> CoreResult<plans::Model> {
        self.authorize(actor, "plan:publish")?;
        self.plan_service.publish_plan(id).await
    }

    pub async fn freeze_plan(&self, actor: &Actor, id: i32) -> CoreResult<plans::Model> {
        self.authorize(actor, "plan:freeze")?;
        self.plan_service.freeze_plan(id).await
    }

    pub async fn delete_plan(&self, actor: &Actor, id: i32) -> CoreResult<()> {
        self.authorize(actor, "plan:delete")?;
        self.plan_service.delete_plan(id).await
    }
}
