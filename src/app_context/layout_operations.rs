use super::AppContext;
use crate::auth::Actor;
use crate::database::entities::{layout_size_ratios, layouts};
use crate::errors::CoreResult;

impl AppContext {
    pub async fn create_layout(
        &self,
        actor: &Actor,
        plan_id: i32,
        layout_name: &str,
        note: Option<String>,
    ) -> CoreResult<layouts::Model> {
        self.authorize(actor, "layout:create")?;
        self.layout_service
            .create_layout(plan_id, layout_name, note)
            .await
    }

    pub async fn get_layout(&self, actor: &Actor, id: i32) -> CoreResult<layouts::Model> {
        self.authorize(actor, "layout:read")?;
        self.layout_service.get_layout(id).await
    }

    pub async fn list_layouts_by_plan(
        &self,
        actor: &Actor,
        plan_id: i32,
    ) -> CoreResult<Vec<layouts::Model>> {
        self.authorize(actor, "layout:read")?;
        self.layout_service.list_layouts_by_plan(plan_id).await
    }

    pub async fn update_layout_name(
        &self,
        actor: &Actor,
        id: i32,
        layout_name: &str,
    ) -> CoreResult<layouts::Model> {
        self.authorize(actor, "layout:update")?;
        self.layout_service.update_layout_name(id, layout_name).await
    }

    pub async fn update_layout_note(
        &self,
        actor: &Actor,
        id: i32,
        note: Option<String>,
    ) -> CoreResult<layouts::Model> {
        self.authorize(actor, "layout:update")?;
        self.layout_service.update_layout_note(id, note).await
    }

    pub async fn delete_layout(&self, actor: &Actor, id: i32) -> CoreResult<()> {
        self.authorize(actor, "layout:delete")?;
        self.layout_service.delete_layout(id).await
    }

    pub async fn get_layout_ratios(
        &self,
        actor: &Actor,
        layout_id: i32,
    ) -> CoreResult<Vec<layout_size_ratios::Model>> {
        self.authorize(actor, "layout:read")?;
        self.layout_service.get_layout_ratios(layout_id).await
    }

    pub async fn set_layout_ratios(
        &self,
        actor: &Actor,
        layout_id: i32,
        ratios: &[(String, i32)],
    ) -> CoreResult<Vec<layout_size_ratios::Model>> {
        self.authorize(actor, "layout_ratios:update")?;
        self.layout_service.set_layout_ratios(layout_id, ratios).await
    }
}
