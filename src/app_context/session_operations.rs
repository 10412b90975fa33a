use super::AppContext;
use crate::auth::Actor;
use crate::database::entities::UserRole;
use crate::errors::{CoreError, CoreErrorKind, CoreResult};
use crate::services::{LoginResult, TokenPair};

impl AppContext {
    pub async fn login(&self, name: &str, password: &str) -> CoreResult<LoginResult> {
        self.auth_service.login(name, password).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> CoreResult<TokenPair> {
        self.auth_service.refresh(refresh_token).await
    }

    /// Resolve an access token to an actor using the user's current record,
    /// so role and activation changes apply before the token expires.
    pub async fn authenticate(&self, access_token: &str) -> CoreResult<Actor> {
        let claims = self.auth_service.parse_token(access_token)?;
        let user = self
            .user_service
            .get_user(claims.user_id)
            .await
            .map_err(|e| match e.kind() {
                CoreErrorKind::NotFound => CoreError::unauthorized("Token user no longer exists"),
                _ => e,
            })?;
        Actor::from_user(&user)
    }

    pub async fn change_password(
        &self,
        actor: &Actor,
        old_password: &str,
        new_password: &str,
    ) -> CoreResult<()> {
        Self::ensure_active(actor)?;
        self.auth_service
            .change_password(actor.user_id, old_password, new_password)
            .await
    }

    pub async fn set_initial_password(
        &self,
        actor: &Actor,
        user_id: i32,
        new_password: &str,
    ) -> CoreResult<()> {
        Self::require_supervisor(actor)?;
        let target = self.user_service.get_user(user_id).await?;
        if actor.has_role(UserRole::Manager) && target.role() == Some(UserRole::Admin) {
            return Err(CoreError::forbidden(
                "A manager cannot reset an admin's password",
            ));
        }
        self.auth_service
            .set_initial_password(user_id, new_password)
            .await
    }
}
