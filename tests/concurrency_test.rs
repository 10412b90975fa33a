mod common;

use common::{fixture_with_db, seed_running_plan, Fixture};
use cutline::database::entities::{production_logs, UserRole};
use cutline::database::migrations::Migrator;
use cutline::database::{establish_connection, get_database_url};
use cutline::errors::CoreErrorKind;
use cutline::services::{LogCreateRequest, UserCreateRequest, UserService};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    TransactionTrait,
};
use sea_orm_migration::MigratorTrait;
use tempfile::TempDir;

fn log_for(task_id: i32, layers: i32) -> LogCreateRequest {
    LogCreateRequest {
        task_id,
        worker_id: None,
        worker_name: None,
        layers_completed: layers,
        note: None,
        log_time: None,
    }
}

/// File-backed database; the directory must outlive the connection.
async fn file_db() -> (TempDir, String, DatabaseConnection) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cutline.db");
    let url = get_database_url(Some(path.to_str().unwrap()));
    let db = establish_connection(&url).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    (dir, url, db)
}

async fn file_fixture() -> (TempDir, String, Fixture) {
    let (dir, url, db) = file_db().await;
    (dir, url, fixture_with_db(db).await)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_logs_all_land_and_sum() {
    let (_dir, _url, f) = file_fixture().await;
    let seeded = seed_running_plan(&f, "PO-400", &[20]).await;
    let task_id = seeded.tasks[0].id;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let ctx = f.ctx.clone();
        let worker = f.worker.clone();
        handles.push(tokio::spawn(async move {
            ctx.create_log(&worker, log_for(task_id, 1)).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let task = f.ctx.get_task(&f.worker, task_id).await.unwrap();
    assert_eq!(task.completed_layers, 10);
    assert_eq!(task.status, "in_progress");

    let stored: i32 = production_logs::Entity::find()
        .filter(production_logs::Column::TaskId.eq(task_id))
        .filter(production_logs::Column::Voided.eq(false))
        .all(f.ctx.db())
        .await
        .unwrap()
        .iter()
        .map(|log| log.layers_completed)
        .sum();
    assert_eq!(stored, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_self_voids_respect_the_quota() {
    let (_dir, _url, f) = file_fixture().await;
    let seeded = seed_running_plan(&f, "PO-401", &[20]).await;
    let task_id = seeded.tasks[0].id;

    let mut ids = Vec::new();
    for _ in 0..4 {
        let outcome = f.ctx.create_log(&f.worker, log_for(task_id, 1)).await.unwrap();
        ids.push(outcome.log.id);
    }
    for id in &ids[..2] {
        f.ctx.void_log(&f.worker, *id, None).await.unwrap();
    }

    // one void left in the window, two attempts at once
    let mut handles = Vec::new();
    for id in ids[2..].iter().copied() {
        let ctx = f.ctx.clone();
        let worker = f.worker.clone();
        handles.push(tokio::spawn(async move {
            ctx.void_log(&worker, id, Some("double entry".to_string())).await
        }));
    }
    let mut granted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => granted += 1,
            Err(err) => assert_eq!(err.kind(), CoreErrorKind::Forbidden),
        }
    }
    assert_eq!(granted, 1);

    let voided = production_logs::Entity::find()
        .filter(production_logs::Column::TaskId.eq(task_id))
        .filter(production_logs::Column::Voided.eq(true))
        .count(f.ctx.db())
        .await
        .unwrap();
    assert_eq!(voided, 3);

    let task = f.ctx.get_task(&f.worker, task_id).await.unwrap();
    assert_eq!(task.completed_layers, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn writer_locked_out_by_another_process_is_unavailable() {
    let (_dir, url, holder) = file_db().await;
    let other = establish_connection(&url).await.unwrap();

    let txn = holder.begin().await.unwrap();
    txn.execute_unprepared("CREATE TABLE lock_holder (id INTEGER PRIMARY KEY)")
        .await
        .unwrap();

    let err = UserService::new(other)
        .create_user(UserCreateRequest {
            name: "zhou".to_string(),
            role: UserRole::Worker,
            user_group: None,
            note: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), CoreErrorKind::Unavailable);

    txn.rollback().await.unwrap();
}
