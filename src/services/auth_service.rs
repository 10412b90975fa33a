use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::auth::{Actor, Claims, TokenCodec, TokenType};
use crate::auth::token::TokenError;
use crate::config::AppConfig;
use crate::database::entities::users;
use crate::errors::{CoreError, CoreResult};

#[derive(Clone, Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct LoginResult {
    pub tokens: TokenPair,
    pub user: users::Model,
}

/// Credential checks and session token issuance.
#[derive(Clone)]
pub struct AuthService {
    db: DatabaseConnection,
    codec: TokenCodec,
    access_ttl: Duration,
    refresh_ttl: Duration,
    hash_cost: u32,
}

impl AuthService {
    pub fn new(db: DatabaseConnection, codec: TokenCodec) -> Self {
        Self {
            db,
            codec,
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
            hash_cost: DEFAULT_COST,
        }
    }

    pub fn from_config(db: DatabaseConnection, config: &AppConfig) -> Self {
        Self::new(db, config.token_codec()).with_ttls(config.access_ttl, config.refresh_ttl)
    }

    pub fn with_ttls(mut self, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        self.access_ttl = access_ttl;
        self.refresh_ttl = refresh_ttl;
        self
    }

    /// Lower bcrypt cost, used by tests.
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    pub fn hash_password(&self, password: &str) -> CoreResult<String> {
        if password.trim().is_empty() {
            return Err(CoreError::validation("Password cannot be empty"));
        }
        hash(password, self.hash_cost)
            .map_err(|e| CoreError::internal("Failed to hash password").with_source(e))
    }

    fn verify_password(password: &str, password_hash: &str) -> bool {
        if password_hash.is_empty() {
            return false;
        }
        match verify(password, password_hash) {
            Ok(matches) => matches,
            Err(e) => {
                warn!("Stored password hash could not be verified: {}", e);
                false
            }
        }
    }

    pub async fn login(&self, name: &str, password: &str) -> CoreResult<LoginResult> {
        let invalid = || CoreError::unauthorized("Invalid name or password");

        let user = users::Entity::find()
            .filter(users::Column::Name.eq(name.trim()))
            .one(&self.db)
            .await?
            .ok_or_else(invalid)?;

        if !user.is_active || !Self::verify_password(password, &user.password_hash) {
            debug!(user_id = user.id, "Login rejected");
            return Err(invalid());
        }

        let mut active: users::ActiveModel = user.into();
        active = active.set_last_login();
        let user = active.update(&self.db).await?;

        let tokens = self.issue_tokens(&user)?;
        info!(user_id = user.id, role = %user.role, "User logged in");

        Ok(LoginResult { tokens, user })
    }

    pub async fn refresh(&self, refresh_token: &str) -> CoreResult<TokenPair> {
        let claims = self.verify(refresh_token)?;
        if claims.token_type != TokenType::Refresh {
            return Err(CoreError::unauthorized("Not a refresh token"));
        }

        let user = users::Entity::find_by_id(claims.user_id)
            .one(&self.db)
            .await?
            .filter(|user| user.is_active)
            .ok_or_else(|| CoreError::unauthorized("User is unknown or inactive"))?;

        self.issue_tokens(&user)
    }

    /// Verify an access token and return its claims.
    pub fn parse_token(&self, token: &str) -> CoreResult<Claims> {
        let claims = self.verify(token)?;
        if claims.token_type != TokenType::Access {
            return Err(CoreError::unauthorized("Not an access token"));
        }
        Ok(claims)
    }

    pub fn authenticate(&self, token: &str) -> CoreResult<Actor> {
        Actor::from_claims(&self.parse_token(token)?)
    }

    pub async fn change_password(
        &self,
        user_id: i32,
        old_password: &str,
        new_password: &str,
    ) -> CoreResult<()> {
        let new_hash = self.hash_password(new_password)?;
        let user = self.find_user(user_id).await?;

        if !Self::verify_password(old_password, &user.password_hash) {
            return Err(CoreError::unauthorized("Current password is incorrect"));
        }

        self.store_hash(user, new_hash).await
    }

    /// Administrative reset; does not require the old password.
    pub async fn set_initial_password(&self, user_id: i32, new_password: &str) -> CoreResult<()> {
        let new_hash = self.hash_password(new_password)?;
        let user = self.find_user(user_id).await?;

        if !user.is_active {
            return Err(CoreError::forbidden(format!("User {} is inactive", user_id)));
        }

        self.store_hash(user, new_hash).await
    }

    async fn find_user(&self, user_id: i32) -> CoreResult<users::Model> {
        users::Entity::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| CoreError::not_found("User", user_id.to_string()))
    }

    async fn store_hash(&self, user: users::Model, password_hash: String) -> CoreResult<()> {
        let user_id = user.id;
        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(password_hash);
        active.set_updated_at().update(&self.db).await?;
        info!(user_id, "Password updated");
        Ok(())
    }

    fn verify(&self, token: &str) -> CoreResult<Claims> {
        self.codec
            .verify(token, Utc::now())
            .map_err(|e| match e {
                TokenError::Expired => CoreError::unauthorized("Token has expired"),
                other => CoreError::unauthorized("Invalid token").with_source(other),
            })
    }

    fn issue_tokens(&self, user: &users::Model) -> CoreResult<TokenPair> {
        let now = Utc::now();
        let access_expires_at = now + self.access_ttl;
        let refresh_expires_at = now + self.refresh_ttl;

        let claims = |token_type, expires_at: DateTime<Utc>| Claims {
            user_id: user.id,
            name: user.name.clone(),
            role: user.role.clone(),
            is_active: user.is_active,
            issued_at: now.timestamp(),
            expires_at: expires_at.timestamp(),
            token_type,
        };

        let sign = |claims: Claims| {
            self.codec
                .sign(&claims)
                .map_err(|e| CoreError::internal("Failed to sign token").with_source(e))
        };

        Ok(TokenPair {
            access_token: sign(claims(TokenType::Access, access_expires_at))?,
            refresh_token: sign(claims(TokenType::Refresh, refresh_expires_at))?,
            access_expires_at,
            refresh_expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entities::UserRole;
    use crate::database::test_utils::setup_test_db;
    use crate::errors::CoreErrorKind;

    async fn service_with_user(active: bool) -> (AuthService, users::Model) {
        let db = setup_test_db().await;
        let service = AuthService::new(db.clone(), TokenCodec::new("test-secret")).with_hash_cost(4);

        let mut user = users::ActiveModel::new("zhao", UserRole::Worker);
        user.is_active = Set(active);
        let user = user.insert(&db).await.unwrap();

        (service, user)
    }

    #[tokio::test]
    async fn test_login_requires_password() {
        let (service, _) = service_with_user(true).await;
        let err = service.login("zhao", "").await.unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn test_login_and_parse() {
        let (service, user) = service_with_user(true).await;
        service.set_initial_password(user.id, "pw-123").await.unwrap();

        let result = service.login("zhao", "pw-123").await.unwrap();
        assert!(result.user.last_login_at.is_some());

        let claims = service.parse_token(&result.tokens.access_token).unwrap();
        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.role, "worker");

        let err = service.parse_token(&result.tokens.refresh_token).unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user() {
        let (service, user) = service_with_user(true).await;
        service.set_initial_password(user.id, "right").await.unwrap();

        for (name, password) in [("zhao", "wrong"), ("nobody", "right")] {
            let err = service.login(name, password).await.unwrap_err();
            assert_eq!(err.kind(), CoreErrorKind::Unauthorized);
        }
    }

    #[tokio::test]
    async fn test_inactive_user_cannot_get_password() {
        let (service, user) = service_with_user(false).await;
        let err = service.set_initial_password(user.id, "pw").await.unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_change_password() {
        let (service, user) = service_with_user(true).await;
        service.set_initial_password(user.id, "first").await.unwrap();

        let err = service
            .change_password(user.id, "wrong", "second")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::Unauthorized);

        let err = service
            .change_password(user.id, "first", "   ")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::Validation);

        service
            .change_password(user.id, "first", "second")
            .await
            .unwrap();
        assert!(service.login("zhao", "second").await.is_ok());
        assert!(service.login("zhao", "first").await.is_err());
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let (service, user) = service_with_user(true).await;
        service.set_initial_password(user.id, "pw").await.unwrap();
        let tokens = service.login("zhao", "pw").await.unwrap().tokens;

        let err = service.refresh(&tokens.access_token).await.unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::Unauthorized);

        let fresh = service.refresh(&tokens.refresh_token).await.unwrap();
        assert!(service.authenticate(&fresh.access_token).is_ok());
    }
}
