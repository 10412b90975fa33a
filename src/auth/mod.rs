pub mod permissions;
pub mod token;

use crate::database::entities::{users, UserRole};
use crate::errors::{CoreError, CoreResult};

pub use permissions::RolePermissions;
pub use token::{Claims, TokenCodec, TokenType};

/// The verified principal on whose behalf an operation runs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Actor {
    pub user_id: i32,
    pub name: String,
    role: UserRole,
    is_active: bool,
}

impl Actor {
    pub fn new(user_id: i32, name: impl Into<String>, role: UserRole) -> Self {
        Self {
            user_id,
            name: name.into(),
            role,
            is_active: true,
        }
    }

    /// Build an actor from verified token claims. Claims with a role this
    /// build does not know are rejected as an invalid credential.
    pub fn from_claims(claims: &Claims) -> CoreResult<Self> {
        let role = claims
            .role
            .parse::<UserRole>()
            .map_err(|_| CoreError::unauthorized("Token carries an unknown role"))?;

        Ok(Self {
            user_id: claims.user_id,
            name: claims.name.clone(),
            role,
            is_active: claims.is_active,
        })
    }

    pub fn from_user(user: &users::Model) -> CoreResult<Self> {
        let role = user.role.parse::<UserRole>()?;
        Ok(Self {
            user_id: user.id,
            name: user.name.clone(),
            role,
            is_active: user.is_active,
        })
    }

    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    pub fn role(&self) -> UserRole {
        self.role
    }

    pub fn has_role(&self, role: UserRole) -> bool {
        self.role == role
    }

    pub fn is_supervisor(&self) -> bool {
        self.role.is_supervisor()
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }
}

pub trait Authorizer: Send + Sync {
    fn authorize(&self, actor: &Actor, permission: &str) -> CoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_actor_from_claims() {
        let now = Utc::now().timestamp();
        let claims = Claims {
            user_id: 9,
            name: "li".to_string(),
            role: "worker".to_string(),
            is_active: true,
            issued_at: now,
            expires_at: now + 60,
            token_type: TokenType::Access,
        };

        let actor = Actor::from_claims(&claims).expect("valid claims");
        assert_eq!(actor.user_id, 9);
        assert!(actor.has_role(UserRole::Worker));
        assert!(!actor.is_supervisor());
        assert!(actor.is_active());
    }

    #[test]
    fn test_actor_rejects_unknown_role() {
        let now = Utc::now().timestamp();
        let claims = Claims {
            user_id: 1,
            name: "x".to_string(),
            role: "owner".to_string(),
            is_active: true,
            issued_at: now,
            expires_at: now + 60,
            token_type: TokenType::Access,
        };

        let err = Actor::from_claims(&claims).expect_err("unknown role");
        assert_eq!(err.kind(), crate::errors::CoreErrorKind::Unauthorized);
    }
}
