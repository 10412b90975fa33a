mod common;

use common::{fixture, seed_running_plan};
use cutline::database::entities::{production_logs, UserRole};
use cutline::errors::CoreErrorKind;
use cutline::services::{LogCreateRequest, ProfileUpdate, UserCreateRequest, UserFilter};
use sea_orm::EntityTrait;

fn new_user(name: &str, role: UserRole) -> UserCreateRequest {
    UserCreateRequest {
        name: name.to_string(),
        role,
        user_group: Some("cutting".to_string()),
        note: None,
    }
}

#[tokio::test]
async fn manager_cannot_touch_supervisor_accounts() {
    let f = fixture().await;

    for role in [UserRole::Admin, UserRole::Manager] {
        let err = f
            .ctx
            .create_user(&f.manager, new_user("boss", role))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::Forbidden);
    }

    let err = f
        .ctx
        .set_user_active(&f.manager, f.admin.user_id, false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), CoreErrorKind::Forbidden);
    let err = f.ctx.delete_user(&f.manager, f.admin.user_id).await.unwrap_err();
    assert_eq!(err.kind(), CoreErrorKind::Forbidden);

    let err = f
        .ctx
        .assign_role(&f.manager, f.worker.user_id, UserRole::Manager)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), CoreErrorKind::Forbidden);

    let promoted = f
        .ctx
        .assign_role(&f.manager, f.worker.user_id, UserRole::PatternMaker)
        .await
        .unwrap();
    assert_eq!(promoted.role(), Some(UserRole::PatternMaker));

    let zhao = f
        .ctx
        .create_user(&f.manager, new_user("zhao", UserRole::Worker))
        .await
        .unwrap();
    assert!(zhao.is_active);
    assert!(!zhao.has_password());
}

#[tokio::test]
async fn supervisors_cannot_act_on_themselves() {
    let f = fixture().await;

    let err = f
        .ctx
        .set_user_active(&f.admin, f.admin.user_id, false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), CoreErrorKind::Forbidden);
    let err = f.ctx.delete_user(&f.admin, f.admin.user_id).await.unwrap_err();
    assert_eq!(err.kind(), CoreErrorKind::Forbidden);
    let err = f
        .ctx
        .assign_role(&f.admin, f.admin.user_id, UserRole::Worker)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), CoreErrorKind::Forbidden);

    // profile edits on oneself are fine
    let me = f
        .ctx
        .update_user_profile(
            &f.admin,
            f.admin.user_id,
            ProfileUpdate {
                note: Some(Some("night shift".to_string())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(me.note.as_deref(), Some("night shift"));
}

#[tokio::test]
async fn one_active_manager_at_a_time() {
    let f = fixture().await;

    let err = f
        .ctx
        .create_user(&f.admin, new_user("second", UserRole::Manager))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), CoreErrorKind::Forbidden);

    f.ctx
        .set_user_active(&f.admin, f.manager.user_id, false)
        .await
        .unwrap();
    let replacement = f
        .ctx
        .create_user(&f.admin, new_user("second", UserRole::Manager))
        .await
        .unwrap();

    // reactivating the old manager would make two
    let err = f
        .ctx
        .set_user_active(&f.admin, f.manager.user_id, true)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), CoreErrorKind::Forbidden);

    f.ctx
        .assign_role(&f.admin, replacement.id, UserRole::Worker)
        .await
        .unwrap();
    f.ctx
        .set_user_active(&f.admin, f.manager.user_id, true)
        .await
        .unwrap();
}

#[tokio::test]
async fn names_are_unique() {
    let f = fixture().await;
    let err = f
        .ctx
        .create_user(&f.admin, new_user("wang", UserRole::Worker))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), CoreErrorKind::Conflict);

    let err = f
        .ctx
        .update_user_profile(
            &f.admin,
            f.other_worker.user_id,
            ProfileUpdate {
                name: Some("wang".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), CoreErrorKind::Conflict);
}

#[tokio::test]
async fn deleting_a_user_keeps_their_logs() {
    let f = fixture().await;
    let seeded = seed_running_plan(&f, "PO-300", &[10]).await;
    let outcome = f
        .ctx
        .create_log(
            &f.other_worker,
            LogCreateRequest {
                task_id: seeded.tasks[0].id,
                worker_id: None,
                worker_name: None,
                layers_completed: 2,
                note: None,
                log_time: None,
            },
        )
        .await
        .unwrap();
    f.ctx
        .void_log(&f.other_worker, outcome.log.id, Some("dup".to_string()))
        .await
        .unwrap();

    f.ctx.delete_user(&f.manager, f.other_worker.user_id).await.unwrap();

    let log = production_logs::Entity::find_by_id(outcome.log.id)
        .one(f.ctx.db())
        .await
        .unwrap()
        .expect("log survives");
    assert_eq!(log.worker_id, None);
    assert_eq!(log.voided_by, None);
    assert_eq!(log.worker_name.as_deref(), Some("li"));
    assert_eq!(log.voided_by_name.as_deref(), Some("li"));

    let err = f
        .ctx
        .get_user(&f.admin, f.other_worker.user_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), CoreErrorKind::NotFound);
}

#[tokio::test]
async fn user_listing() {
    let f = fixture().await;
    let err = f
        .ctx
        .list_users(&f.worker, UserFilter::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), CoreErrorKind::Forbidden);

    let all = f.ctx.list_users(&f.manager, UserFilter::default()).await.unwrap();
    let names: Vec<_> = all.iter().map(|user| user.name.as_str()).collect();
    assert_eq!(names, vec!["admin", "li", "manager", "planner", "wang"]);

    let workers = f
        .ctx
        .list_users(
            &f.manager,
            UserFilter {
                role: Some(UserRole::Worker),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(workers.len(), 2);

    let matched = f
        .ctx
        .list_users(
            &f.manager,
            UserFilter {
                query: Some("AN".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let names: Vec<_> = matched.iter().map(|user| user.name.as_str()).collect();
    assert_eq!(names, vec!["manager", "planner", "wang"]);
}
