use chrono::{DateTime, Utc};

use super::AppContext;
use crate::auth::Actor;
use crate::database::entities::orders;
use crate::errors::CoreResult;
use crate::services::{OrderCreateRequest, OrderWithItems};

impl AppContext {
    pub async fn create_order(
        &self,
        actor: &Actor,
        request: OrderCreateRequest,
    ) -> CoreResult<OrderWithItems> {
        self.authorize(actor, "order:create")?;
        self.order_service.create_order(request).await
    }

    pub async fn get_order(&self, actor: &Actor, id: i32) -> CoreResult<OrderWithItems> {
        self.authorize(actor, "order:read")?;
        self.order_service.get_order(id).await
    }

    pub async fn get_order_by_number(
        &self,
        actor: &Actor,
        order_number: &str,
    ) -> CoreResult<OrderWithItems> {
        self.authorize(actor, "order:read")?;
        self.order_service.get_order_by_number(order_number).await
    }

    pub async fn list_orders(&self, actor: &Actor) -> CoreResult<Vec<orders::Model>> {
        self.authorize(actor, "order:read")?;
        self.order_service.list_orders().await
    }

    pub async fn update_order_note(
        &self,
        actor: &Actor,
        id: i32,
        note: Option<String>,
    ) -> CoreResult<orders::Model> {
        self.authorize(actor, "order:update")?;
        self.order_service.update_note(id, note).await
    }

    pub async fn update_order_finish_date(
        &self,
        actor: &Actor,
        id: i32,
        finish_date: Option<DateTime<Utc>>,
    ) -> CoreResult<orders::Model> {
        self.authorize(actor, "order:update")?;
        self.order_service.update_finish_date(id, finish_date).await
    }

    pub async fn delete_order(&self, actor: &Actor, id: i32) -> CoreResult<()> {
        self.authorize(actor, "order:delete")?;
        self.order_service.delete_order(id).await
    }
}
