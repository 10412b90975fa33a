#![allow(dead_code)]

use std::sync::Arc;

use cutline::auth::{Actor, TokenCodec};
use cutline::database::entities::{layouts, orders, plans, tasks, UserRole};
use cutline::database::test_utils::setup_test_db;
use cutline::services::{
    AuthService, OrderCreateRequest, OrderItemInput, PlanCreateRequest, RecordingObserver,
    UserCreateRequest, UserService,
};
use cutline::AppContext;
use sea_orm::DatabaseConnection;

pub struct Fixture {
    pub ctx: AppContext,
    pub observer: Arc<RecordingObserver>,
    pub admin: Actor,
    pub manager: Actor,
    pub planner: Actor,
    pub worker: Actor,
    pub other_worker: Actor,
}

pub struct SeededPlan {
    pub order: orders::Model,
    pub plan: plans::Model,
    pub layout: layouts::Model,
    pub tasks: Vec<tasks::Model>,
}

pub async fn fixture() -> Fixture {
    fixture_with_db(setup_test_db().await).await
}

/// Seeds the standard cast of users into an already migrated database.
pub async fn fixture_with_db(db: DatabaseConnection) -> Fixture {
    let auth = AuthService::new(db.clone(), TokenCodec::new("integration-secret")).with_hash_cost(4);
    let observer = RecordingObserver::new();
    let ctx = AppContext::new(db.clone(), auth).with_observer(observer.clone());

    let users = UserService::new(db);
    let seed = |name: &'static str, role: UserRole| {
        let users = users.clone();
        async move {
            let user = users
                .create_user(UserCreateRequest {
                    name: name.to_string(),
                    role,
                    user_group: None,
                    note: None,
                })
                .await
                .expect("Failed to seed user");
            Actor::from_user(&user).expect("Seeded user has a known role")
        }
    };

    Fixture {
        admin: seed("admin", UserRole::Admin).await,
        manager: seed("manager", UserRole::Manager).await,
        planner: seed("planner", UserRole::PatternMaker).await,
        worker: seed("wang", UserRole::Worker).await,
        other_worker: seed("li", UserRole::Worker).await,
        ctx,
        observer,
    }
}

pub fn order_request(order_number: &str) -> OrderCreateRequest {
    OrderCreateRequest {
        order_number: order_number.to_string(),
        style_number: "ST-100".to_string(),
        customer_name: Some("Northwind".to_string()),
        order_start_date: None,
        order_finish_date: None,
        note: None,
        items: vec![
            OrderItemInput {
                color: "red".to_string(),
                size: "M".to_string(),
                quantity: 120,
            },
            OrderItemInput {
                color: "navy".to_string(),
                size: "L".to_string(),
                quantity: 80,
            },
        ],
    }
}

/// Order, plan and one layout holding one red task per entry of `planned`.
/// The plan is left pending.
pub async fn seed_pending_plan(f: &Fixture, order_number: &str, planned: &[i32]) -> SeededPlan {
    let order = f
        .ctx
        .create_order(&f.admin, order_request(order_number))
        .await
        .expect("create order")
        .order;

    let plan = f
        .ctx
        .create_plan(
            &f.planner,
            PlanCreateRequest {
                order_id: order.id,
                plan_name: format!("{} plan", order_number),
                note: None,
                planned_publish_date: None,
                planned_finish_date: None,
            },
        )
        .await
        .expect("create plan");

    let layout = f
        .ctx
        .create_layout(&f.planner, plan.id, "Marker A", None)
        .await
        .expect("create layout");

    let mut created = Vec::new();
    for planned_layers in planned {
        created.push(
            f.ctx
                .create_task(&f.planner, layout.id, "red", *planned_layers)
                .await
                .expect("create task"),
        );
    }

    SeededPlan {
        order,
        plan,
        layout,
        tasks: created,
    }
}

/// Same as `seed_pending_plan` but published.
pub async fn seed_running_plan(f: &Fixture, order_number: &str, planned: &[i32]) -> SeededPlan {
    let mut seeded = seed_pending_plan(f, order_number, planned).await;
    seeded.plan = f
        .ctx
        .publish_plan(&f.planner, seeded.plan.id)
        .await
        .expect("publish plan");
    seeded
}
