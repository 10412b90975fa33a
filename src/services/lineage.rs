//! Ancestor lookups and cascade deletes shared by the workflow services.
//!
//! Every function takes the caller's connection so it can run inside an open
//! transaction.

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect};

use crate::database::entities::{
    layout_size_ratios, layouts, order_items, orders, plans, production_logs, tasks, PlanStatus,
};
use crate::errors::{CoreError, CoreResult};

pub(crate) async fn load_order<C: ConnectionTrait>(conn: &C, id: i32) -> CoreResult<orders::Model> {
    orders::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| CoreError::not_found("Order", id.to_string()))
}

pub(crate) async fn load_plan<C: ConnectionTrait>(conn: &C, id: i32) -> CoreResult<plans::Model> {
    plans::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| CoreError::not_found("Plan", id.to_string()))
}

pub(crate) async fn load_layout<C: ConnectionTrait>(
    conn: &C,
    id: i32,
) -> CoreResult<layouts::Model> {
    layouts::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| CoreError::not_found("Layout", id.to_string()))
}

pub(crate) async fn load_task<C: ConnectionTrait>(conn: &C, id: i32) -> CoreResult<tasks::Model> {
    tasks::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| CoreError::not_found("Task", id.to_string()))
}

pub(crate) async fn load_log<C: ConnectionTrait>(
    conn: &C,
    id: i32,
) -> CoreResult<production_logs::Model> {
    production_logs::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| CoreError::not_found("Log", id.to_string()))
}

pub(crate) async fn plan_of_layout<C: ConnectionTrait>(
    conn: &C,
    layout_id: i32,
) -> CoreResult<(layouts::Model, plans::Model)> {
    let layout = load_layout(conn, layout_id).await?;
    let plan = load_plan(conn, layout.plan_id).await?;
    Ok((layout, plan))
}

pub(crate) async fn plan_of_task<C: ConnectionTrait>(
    conn: &C,
    task_id: i32,
) -> CoreResult<(tasks::Model, plans::Model)> {
    let task = load_task(conn, task_id).await?;
    let (_, plan) = plan_of_layout(conn, task.layout_id).await?;
    Ok((task, plan))
}

/// Structural edits to layouts, ratios and tasks are only legal while the
/// plan has not been published.
pub(crate) fn ensure_pending(plan: &plans::Model, action: &str) -> CoreResult<()> {
    let status = plan.status();
    if status.allows_structural_changes() {
        return Ok(());
    }
    Err(CoreError::invalid_stage(
        format!(
            "Cannot {} while plan {} is {}",
            action, plan.id, status
        ),
        status.as_str(),
    ))
}

pub(crate) fn ensure_not_frozen(plan: &plans::Model) -> CoreResult<()> {
    if plan.status() == PlanStatus::Frozen {
        return Err(CoreError::invalid_stage(
            format!("Plan {} is frozen", plan.id),
            PlanStatus::Frozen.as_str(),
        ));
    }
    Ok(())
}

async fn ids<C, E>(conn: &C, select: sea_orm::Select<E>, column: E::Column) -> CoreResult<Vec<i32>>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    Ok(select
        .select_only()
        .column(column)
        .into_tuple::<i32>()
        .all(conn)
        .await?)
}

pub(crate) async fn delete_tasks<C: ConnectionTrait>(conn: &C, task_ids: &[i32]) -> CoreResult<()> {
    if task_ids.is_empty() {
        return Ok(());
    }

    production_logs::Entity::delete_many()
        .filter(production_logs::Column::TaskId.is_in(task_ids.to_vec()))
        .exec(conn)
        .await?;

    tasks::Entity::delete_many()
        .filter(tasks::Column::Id.is_in(task_ids.to_vec()))
        .exec(conn)
        .await?;

    Ok(())
}

pub(crate) async fn delete_layouts<C: ConnectionTrait>(
    conn: &C,
    layout_ids: &[i32],
) -> CoreResult<()> {
    if layout_ids.is_empty() {
        return Ok(());
    }

    let task_ids = ids(
        conn,
        tasks::Entity::find().filter(tasks::Column::LayoutId.is_in(layout_ids.to_vec())),
        tasks::Column::Id,
    )
    .await?;
    delete_tasks(conn, &task_ids).await?;

    layout_size_ratios::Entity::delete_many()
        .filter(layout_size_ratios::Column::LayoutId.is_in(layout_ids.to_vec()))
        .exec(conn)
        .await?;

    layouts::Entity::delete_many()
        .filter(layouts::Column::Id.is_in(layout_ids.to_vec()))
        .exec(conn)
        .await?;

    Ok(())
}

pub(crate) async fn delete_plans<C: ConnectionTrait>(conn: &C, plan_ids: &[i32]) -> CoreResult<()> {
    if plan_ids.is_empty() {
        return Ok(());
    }

    let layout_ids = ids(
        conn,
        layouts::Entity::find().filter(layouts::Column::PlanId.is_in(plan_ids.to_vec())),
        layouts::Column::Id,
    )
    .await?;
    delete_layouts(conn, &layout_ids).await?;

    plans::Entity::delete_many()
        .filter(plans::Column::Id.is_in(plan_ids.to_vec()))
        .exec(conn)
        .await?;

    Ok(())
}

pub(crate) async fn delete_order_tree<C: ConnectionTrait>(conn: &C, order_id: i32) -> CoreResult<()> {
    let plan_ids = ids(
        conn,
        plans::Entity::find().filter(plans::Column::OrderId.eq(order_id)),
        plans::Column::Id,
    )
    .await?;
    delete_plans(conn, &plan_ids).await?;

    order_items::Entity::delete_many()
        .filter(order_items::Column::OrderId.eq(order_id))
        .exec(conn)
        .await?;

    orders::Entity::delete_by_id(order_id).exec(conn).await?;

    Ok(())
}

/// Task ids beneath a layout.
pub(crate) async fn task_ids_of_layout<C: ConnectionTrait>(
    conn: &C,
    layout_id: i32,
) -> CoreResult<Vec<i32>> {
    ids(
        conn,
        tasks::Entity::find().filter(tasks::Column::LayoutId.eq(layout_id)),
        tasks::Column::Id,
    )
    .await
}

/// Task ids beneath every layout of a plan.
pub(crate) async fn task_ids_of_plan<C: ConnectionTrait>(
    conn: &C,
    plan_id: i32,
) -> CoreResult<Vec<i32>> {
    let layout_ids = ids(
        conn,
        layouts::Entity::find().filter(layouts::Column::PlanId.eq(plan_id)),
        layouts::Column::Id,
    )
    .await?;
    if layout_ids.is_empty() {
        return Ok(Vec::new());
    }
    ids(
        conn,
        tasks::Entity::find().filter(tasks::Column::LayoutId.is_in(layout_ids)),
        tasks::Column::Id,
    )
    .await
}
