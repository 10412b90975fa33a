use std::fmt;
use std::str::FromStr;

use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    /// Empty until an initial password has been set
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String, // "admin", "manager", "pattern_maker", "worker"
    pub is_active: bool,
    pub user_group: Option<String>,
    pub note: Option<String>,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
    pub last_login_at: Option<ChronoDateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub fn new(name: impl Into<String>, role: UserRole) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: ActiveValue::NotSet,
            name: Set(name.into()),
            password_hash: Set(String::new()),
            role: Set(role.to_string()),
            is_active: Set(true),
            user_group: Set(None),
            note: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            last_login_at: ActiveValue::NotSet,
        }
    }

    pub fn set_updated_at(mut self) -> Self {
        self.updated_at = Set(chrono::Utc::now());
        self
    }

    pub fn set_last_login(mut self) -> Self {
        self.last_login_at = Set(Some(chrono::Utc::now()));
        self
    }
}

impl Model {
    pub fn has_password(&self) -> bool {
        !self.password_hash.is_empty()
    }

    pub fn role(&self) -> Option<UserRole> {
        self.role.parse().ok()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Manager,
    PatternMaker,
    Worker,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Manager => "manager",
            UserRole::PatternMaker => "pattern_maker",
            UserRole::Worker => "worker",
        }
    }

    /// Admin and manager bypass every permission check
    pub fn is_supervisor(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Manager)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "manager" => Ok(UserRole::Manager),
            "pattern_maker" => Ok(UserRole::PatternMaker),
            "worker" => Ok(UserRole::Worker),
            other => Err(CoreError::validation(format!("Invalid role: {}", other))),
        }
    }
}
