use super::AppContext;
use crate::auth::Actor;
use crate::database::entities::{users, UserRole};
use crate::errors::{CoreError, CoreResult};
use crate::services::{ProfileUpdate, UserCreateRequest, UserFilter};

impl AppContext {
    pub async fn create_user(
        &self,
        actor: &Actor,
        request: UserCreateRequest,
    ) -> CoreResult<users::Model> {
        Self::require_supervisor(actor)?;
        if actor.has_role(UserRole::Manager) && request.role.is_supervisor() {
            return Err(CoreError::forbidden(format!(
                "A manager cannot create {} accounts",
                request.role
            )));
        }
        self.user_service.create_user(request).await
    }

    pub async fn get_user(&self, actor: &Actor, id: i32) -> CoreResult<users::Model> {
        Self::require_supervisor(actor)?;
        self.user_service.get_user(id).await
    }

    pub async fn get_user_by_name(&self, actor: &Actor, name: &str) -> CoreResult<users::Model> {
        Self::require_supervisor(actor)?;
        self.user_service.get_user_by_name(name).await
    }

    pub async fn list_users(
        &self,
        actor: &Actor,
        filter: UserFilter,
    ) -> CoreResult<Vec<users::Model>> {
        Self::require_supervisor(actor)?;
        self.user_service.list_users(filter).await
    }

    pub async fn update_user_profile(
        &self,
        actor: &Actor,
        id: i32,
        update: ProfileUpdate,
    ) -> CoreResult<users::Model> {
        self.load_manageable_user(actor, id).await?;
        self.user_service.update_profile(id, update).await
    }

    pub async fn assign_role(
        &self,
        actor: &Actor,
        id: i32,
        role: UserRole,
    ) -> CoreResult<users::Model> {
        self.load_manageable_user(actor, id).await?;
        if actor.user_id == id {
            return Err(CoreError::forbidden("You cannot change your own role"));
        }
        if actor.has_role(UserRole::Manager) && role.is_supervisor() {
            return Err(CoreError::forbidden(format!(
                "A manager cannot grant the {} role",
                role
            )));
        }
        self.user_service.assign_role(id, role).await
    }

    pub async fn set_user_active(
        &self,
        actor: &Actor,
        id: i32,
        is_active: bool,
    ) -> CoreResult<users::Model> {
        self.load_manageable_user(actor, id).await?;
        if actor.user_id == id && !is_active {
            return Err(CoreError::forbidden("You cannot deactivate yourself"));
        }
        self.user_service.set_active(id, is_active).await
    }

    pub async fn delete_user(&self, actor: &Actor, id: i32) -> CoreResult<()> {
        self.load_manageable_user(actor, id).await?;
        if actor.user_id == id {
            return Err(CoreError::forbidden("You cannot delete yourself"));
        }
        self.user_service.delete_user(id).await
    }

    /// Supervisor check plus "a manager may not act on an admin".
    async fn load_manageable_user(&self, actor: &Actor, id: i32) -> CoreResult<users::Model> {
        Self::require_supervisor(actor)?;
        let target = self.user_service.get_user(id).await?;
        if actor.has_role(UserRole::Manager) && target.role() == Some(UserRole::Admin) {
            return Err(CoreError::forbidden("A manager cannot modify an admin"));
        }
        Ok(target)
    }
}
