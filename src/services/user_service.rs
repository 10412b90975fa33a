use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::info;

use crate::database::entities::{production_logs, users, UserRole};
use crate::errors::{CoreError, CoreResult};

#[derive(Clone, Debug)]
pub struct UserCreateRequest {
    pub name: String,
    pub role: UserRole,
    pub user_group: Option<String>,
    pub note: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct UserFilter {
    /// Case-insensitive substring of name or note
    pub query: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    pub user_group: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub user_group: Option<Option<String>>,
    pub note: Option<Option<String>>,
}

/// Account storage. Actor-dependent rules live in `AppContext`; this service
/// owns name uniqueness and the single-active-admin/manager rule.
#[derive(Clone)]
pub struct UserService {
    db: DatabaseConnection,
}

impl UserService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create_user(&self, request: UserCreateRequest) -> CoreResult<users::Model> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(CoreError::validation("User name is required"));
        }

        let txn = self.db.begin().await?;

        ensure_name_free(&txn, &name, None).await?;
        ensure_role_slot(&txn, request.role, None).await?;

        let mut user = users::ActiveModel::new(name, request.role);
        user.user_group = Set(normalize(request.user_group));
        user.note = Set(normalize(request.note));
        let user = user.insert(&txn).await?;

        txn.commit().await?;

        info!(user_id = user.id, role = %user.role, "User created");
        Ok(user)
    }

    pub async fn get_user(&self, id: i32) -> CoreResult<users::Model> {
        users::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| CoreError::not_found("User", id.to_string()))
    }

    pub async fn get_user_by_name(&self, name: &str) -> CoreResult<users::Model> {
        users::Entity::find()
            .filter(users::Column::Name.eq(name.trim()))
            .one(&self.db)
            .await?
            .ok_or_else(|| CoreError::not_found("User", name.trim()))
    }

    pub async fn list_users(&self, filter: UserFilter) -> CoreResult<Vec<users::Model>> {
        let mut select = users::Entity::find();
        if let Some(role) = filter.role {
            select = select.filter(users::Column::Role.eq(role.as_str()));
        }
        if let Some(active) = filter.is_active {
            select = select.filter(users::Column::IsActive.eq(active));
        }
        if let Some(group) = normalize(filter.user_group) {
            select = select.filter(users::Column::UserGroup.eq(group));
        }

        let users = select
            .order_by_asc(users::Column::Name)
            .all(&self.db)
            .await?;

        let Some(query) = normalize(filter.query).map(|q| q.to_lowercase()) else {
            return Ok(users);
        };

        Ok(users
            .into_iter()
            .filter(|user| {
                user.name.to_lowercase().contains(&query)
                    || user
                        .note
                        .as_deref()
                        .is_some_and(|note| note.to_lowercase().contains(&query))
            })
            .collect())
    }

    pub async fn update_profile(&self, id: i32, update: ProfileUpdate) -> CoreResult<users::Model> {
        let txn = self.db.begin().await?;
        let user = find_user(&txn, id).await?;

        let mut active: users::ActiveModel = user.into();
        if let Some(name) = update.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(CoreError::validation("User name is required"));
            }
            ensure_name_free(&txn, &name, Some(id)).await?;
            active.name = Set(name);
        }
        if let Some(group) = update.user_group {
            active.user_group = Set(normalize(group));
        }
        if let Some(note) = update.note {
            active.note = Set(normalize(note));
        }

        let user = active.set_updated_at().update(&txn).await?;
        txn.commit().await?;
        Ok(user)
    }

    pub async fn assign_role(&self, id: i32, role: UserRole) -> CoreResult<users::Model> {
        let txn = self.db.begin().await?;
        let user = find_user(&txn, id).await?;

        if user.is_active {
            ensure_role_slot(&txn, role, Some(id)).await?;
        }

        let mut active: users::ActiveModel = user.into();
        active.role = Set(role.as_str().to_string());
        let user = active.set_updated_at().update(&txn).await?;
        txn.commit().await?;

        info!(user_id = id, role = %role, "Role assigned");
        Ok(user)
    }

    pub async fn set_active(&self, id: i32, is_active: bool) -> CoreResult<users::Model> {
        let txn = self.db.begin().await?;
        let user = find_user(&txn, id).await?;

        if is_active && !user.is_active {
            if let Some(role) = user.role() {
                ensure_role_slot(&txn, role, Some(id)).await?;
            }
        }

        let mut active: users::ActiveModel = user.into();
        active.is_active = Set(is_active);
        let user = active.set_updated_at().update(&txn).await?;
        txn.commit().await?;

        info!(user_id = id, is_active, "User activation changed");
        Ok(user)
    }

    /// Logs keep their `worker_name`; their user references are cleared.
    pub async fn delete_user(&self, id: i32) -> CoreResult<()> {
        let txn = self.db.begin().await?;
        find_user(&txn, id).await?;

        production_logs::Entity::update_many()
            .col_expr(
                production_logs::Column::WorkerId,
                Expr::value(Option::<i32>::None),
            )
            .filter(production_logs::Column::WorkerId.eq(id))
            .exec(&txn)
            .await?;

        production_logs::Entity::update_many()
            .col_expr(
                production_logs::Column::VoidedBy,
                Expr::value(Option::<i32>::None),
            )
            .filter(production_logs::Column::VoidedBy.eq(id))
            .exec(&txn)
            .await?;

        users::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        info!(user_id = id, "User deleted");
        Ok(())
    }
}

async fn find_user<C: ConnectionTrait>(conn: &C, id: i32) -> CoreResult<users::Model> {
    users::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| CoreError::not_found("User", id.to_string()))
}

async fn ensure_name_free<C: ConnectionTrait>(
    conn: &C,
    name: &str,
    except: Option<i32>,
) -> CoreResult<()> {
    let existing = users::Entity::find()
        .filter(users::Column::Name.eq(name))
        .one(conn)
        .await?;

    match existing {
        Some(user) if Some(user.id) != except => Err(CoreError::conflict(format!(
            "User name '{}' is already taken",
            name
        ))
        .with_field("name", name)),
        _ => Ok(()),
    }
}

/// At most one active admin and one active manager.
async fn ensure_role_slot<C: ConnectionTrait>(
    conn: &C,
    role: UserRole,
    except: Option<i32>,
) -> CoreResult<()> {
    if !role.is_supervisor() {
        return Ok(());
    }

    let mut select = users::Entity::find()
        .filter(users::Column::Role.eq(role.as_str()))
        .filter(users::Column::IsActive.eq(true));
    if let Some(id) = except {
        select = select.filter(users::Column::Id.ne(id));
    }

    if select.one(conn).await?.is_some() {
        return Err(CoreError::forbidden(format!(
            "An active {} already exists",
            role
        )));
    }
    Ok(())
}

fn normalize(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}
