use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Serialize;

use super::events::{default_observer, WorkflowEvent, WorkflowObserver};
use super::lineage;
use crate::database::entities::{order_items, orders};
use crate::errors::{CoreError, CoreResult};

#[derive(Clone, Debug)]
pub struct OrderItemInput {
    pub color: String,
    pub size: String,
    pub quantity: i32,
}

#[derive(Clone, Debug)]
pub struct OrderCreateRequest {
    pub order_number: String,
    pub style_number: String,
    pub customer_name: Option<String>,
    pub order_start_date: Option<DateTime<Utc>>,
    pub order_finish_date: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub items: Vec<OrderItemInput>,
}

#[derive(Clone, Debug, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: orders::Model,
    pub items: Vec<order_items::Model>,
}

#[derive(Clone)]
pub struct OrderService {
    db: DatabaseConnection,
    observer: Arc<dyn WorkflowObserver>,
}

impl OrderService {
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

    fn validate(request: &OrderCreateRequest) -> CoreResult<()> {
        if request.order_number.trim().is_empty() {
            return Err(CoreError::validation("order_number is required"));
        }
        if request.style_number.trim().is_empty() {
            return Err(CoreError::validation("style_number is required"));
        }
        if request.items.is_empty() {
            return Err(CoreError::validation("An order needs at least one item"));
        }
        for (index, item) in request.items.iter().enumerate() {
            if item.color.trim().is_empty() || item.size.trim().is_empty() {
                return Err(CoreError::validation(format!(
                    "Item {} needs a color and a size",
                    index + 1
                )));
            }
            if item.quantity <= 0 {
                return Err(CoreError::validation(format!(
                    "Item {} quantity must be greater than zero",
                    index + 1
                ))
                .with_field("quantity", item.quantity.to_string()));
            }
        }
        Ok(())
    }

    /// Insert the order and all of its items in one transaction.
    pub async fn create_order(&self, request: OrderCreateRequest) -> CoreResult<OrderWithItems> {
        Self::validate(&request)?;
        let order_number = request.order_number.trim().to_string();

        let txn = self.db.begin().await?;

        let existing = orders::Entity::find()
            .filter(orders::Column::OrderNumber.eq(order_number.as_str()))
            .one(&txn)
            .await?;
        if existing.is_some() {
            return Err(CoreError::conflict(format!(
                "Order number '{}' already exists",
                order_number
            ))
            .with_field("order_number", order_number));
        }

        let now = Utc::now();
        let order = orders::ActiveModel {
            id: NotSet,
            order_number: Set(order_number),
            style_number: Set(request.style_number.trim().to_string()),
            customer_name: Set(request.customer_name),
            order_start_date: Set(request.order_start_date),
            order_finish_date: Set(request.order_finish_date),
            note: Set(request.note),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(request.items.len());
        for item in request.items {
            let item = order_items::ActiveModel {
                id: NotSet,
                order_id: Set(order.id),
                color: Set(item.color.trim().to_string()),
                size: Set(item.size.trim().to_string()),
                quantity: Set(item.quantity),
            }
            .insert(&txn)
            .await?;
            items.push(item);
        }

        txn.commit().await?;

        self.observer.notify(&WorkflowEvent::OrderCreated {
            order_id: order.id,
            order_number: order.order_number.clone(),
        });

        Ok(OrderWithItems { order, items })
    }

    pub async fn get_order(&self, id: i32) -> CoreResult<OrderWithItems> {
        let order = lineage::load_order(&self.db, id).await?;
        self.with_items(order).await
    }

    pub async fn get_order_by_number(&self, order_number: &str) -> CoreResult<OrderWithItems> {
        let order = orders::Entity::find()
            .filter(orders::Column::OrderNumber.eq(order_number.trim()))
            .one(&self.db)
            .await?
            .ok_or_else(|| CoreError::not_found("Order", order_number.trim()))?;
        self.with_items(order).await
    }

    pub async fn list_orders(&self) -> CoreResult<Vec<orders::Model>> {
        Ok(orders::Entity::find()
            .order_by_desc(orders::Column::CreatedAt)
            .order_by_desc(orders::Column::Id)
            .all(&self.db)
            .await?)
    }

    pub async fn list_items(&self, order_id: i32) -> CoreResult<Vec<order_items::Model>> {
        Ok(order_items::Entity::find()
            .filter(order_items::Column::OrderId.eq(order_id))
            .order_by_asc(order_items::Column::Id)
            .all(&self.db)
            .await?)
    }

    async fn with_items(&self, order: orders::Model) -> CoreResult<OrderWithItems> {
        let items = self.list_items(order.id).await?;
        Ok(OrderWithItems { order, items })
    }

    pub async fn update_note(&self, id: i32, note: Option<String>) -> CoreResult<orders::Model> {
        let order = lineage::load_order(&self.db, id).await?;
        let mut active: orders::ActiveModel = order.into();
        active.note = Set(note);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&self.db).await?)
    }

    pub async fn update_finish_date(
        &self,
        id: i32,
        finish_date: Option<DateTime<Utc>>,
    ) -> CoreResult<orders::Model> {
        let order = lineage::load_order(&self.db, id).await?;
        let mut active: orders::ActiveModel = order.into();
        active.order_finish_date = Set(finish_date);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&self.db).await?)
    }

    /// Removes the order with its items, plans, layouts, tasks and logs.
    pub async fn delete_order(&self, id: i32) -> CoreResult<()> {
        let txn = self.db.begin().await?;
        lineage::load_order(&txn, id).await?;
        lineage::delete_order_tree(&txn, id).await?;
        txn.commit().await?;

        self.observer
            .notify(&WorkflowEvent::OrderDeleted { order_id: id });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_utils::setup_test_db;
    use crate::errors::CoreErrorKind;

    fn sample_request(number: &str) -> OrderCreateRequest {
        OrderCreateRequest {
            order_number: number.to_string(),
            style_number: "ST-9".to_string(),
            customer_name: Some("Acme".to_string()),
            order_start_date: None,
            order_finish_date: None,
            note: None,
            items: vec![
                OrderItemInput {
                    color: "red".to_string(),
                    size: "M".to_string(),
                    quantity: 100,
                },
                OrderItemInput {
                    color: "blue".to_string(),
                    size: "L".to_string(),
                    quantity: 50,
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let service = OrderService::new(setup_test_db().await);
        let created = service.create_order(sample_request("PO-1")).await.unwrap();
        assert_eq!(created.items.len(), 2);

        let fetched = service.get_order_by_number("PO-1").await.unwrap();
        assert_eq!(fetched.order.id, created.order.id);
        assert_eq!(fetched.items.len(), 2);
    }

    #[tokio::test]
    async fn test_validation() {
        let service = OrderService::new(setup_test_db().await);

        let mut no_items = sample_request("PO-2");
        no_items.items.clear();
        let mut zero_qty = sample_request("PO-3");
        zero_qty.items[1].quantity = 0;
        let mut blank_color = sample_request("PO-4");
        blank_color.items[0].color = " ".to_string();
        let mut no_style = sample_request("PO-5");
        no_style.style_number = String::new();

        for request in [no_items, zero_qty, blank_color, no_style] {
            let err = service.create_order(request).await.unwrap_err();
            assert_eq!(err.kind(), CoreErrorKind::Validation);
        }
        assert!(service.list_orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_number() {
        let service = OrderService::new(setup_test_db().await);
        service.create_order(sample_request("PO-1")).await.unwrap();
        let err = service
            .create_order(sample_request("PO-1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::Conflict);
        assert_eq!(service.list_orders().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_note_and_delete() {
        let service = OrderService::new(setup_test_db().await);
        let created = service.create_order(sample_request("PO-1")).await.unwrap();

        let updated = service
            .update_note(created.order.id, Some("rush".to_string()))
            .await
            .unwrap();
        assert_eq!(updated.note.as_deref(), Some("rush"));

        service.delete_order(created.order.id).await.unwrap();
        let err = service.get_order(created.order.id).await.unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::NotFound);
        assert!(service.list_items(created.order.id).await.unwrap().is_empty());
    }
}
