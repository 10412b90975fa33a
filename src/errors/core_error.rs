use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;

use sea_orm::{DbErr, RuntimeErr, SqlErr, SqlxError};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CoreErrorKind {
    NotFound,
    Validation,
    Conflict,
    Forbidden,
    Unauthorized,
    Unavailable,
    Internal,
}

#[derive(Debug)]
pub struct CoreError {
    kind: CoreErrorKind,
    message: String,
    fields: Option<BTreeMap<String, String>>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl CoreError {
    pub fn new(kind: CoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            fields: None,
            source: None,
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        let entity = entity.into();
        let id = id.into();
        let message = format!("{} {} not found", entity, id);

        let mut fields = BTreeMap::new();
        fields.insert("entity".to_string(), entity);
        fields.insert("id".to_string(), id);

        Self {
            kind: CoreErrorKind::NotFound,
            message,
            fields: Some(fields),
            source: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Validation, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Conflict, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Forbidden, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Unauthorized, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Unavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Internal, message)
    }

    /// Lifecycle-stage violation carrying the stage the entity is currently in,
    /// so callers can decide whether a retry after a state change makes sense.
    pub fn invalid_stage(message: impl Into<String>, current_status: impl Into<String>) -> Self {
        Self::conflict(message).with_field("current_status", current_status)
    }

    pub fn with_fields(mut self, fields: BTreeMap<String, String>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> CoreErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn fields(&self) -> Option<&BTreeMap<String, String>> {
        self.fields.as_ref()
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .as_ref()
            .and_then(|fields| fields.get(key))
            .map(String::as_str)
    }

    /// Get HTTP status code for this error
    pub fn http_status_code(&self) -> u16 {
        match self.kind {
            CoreErrorKind::Validation => 400,
            CoreErrorKind::Unauthorized => 401,
            CoreErrorKind::Forbidden => 403,
            CoreErrorKind::NotFound => 404,
            CoreErrorKind::Conflict => 409,
            CoreErrorKind::Unavailable => 503,
            CoreErrorKind::Internal => 500,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self.kind {
            CoreErrorKind::Validation => "VALIDATION_ERROR",
            CoreErrorKind::Unauthorized => "UNAUTHORIZED",
            CoreErrorKind::Forbidden => "FORBIDDEN",
            CoreErrorKind::NotFound => "NOT_FOUND",
            CoreErrorKind::Conflict => "CONFLICT",
            CoreErrorKind::Unavailable => "UNAVAILABLE",
            CoreErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl StdError for CoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<DbErr> for CoreError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                return CoreError::conflict(format!("Unique constraint violated: {}", detail))
                    .with_source(err);
            }
            Some(SqlErr::ForeignKeyConstraintViolation(detail)) => {
                return CoreError::conflict(format!("Foreign key constraint violated: {}", detail))
                    .with_source(err);
            }
            _ => {}
        }

        if is_lock_contention(&err) {
            return CoreError::unavailable("Storage is busy, retry the request").with_source(err);
        }

        match err {
            DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => {
                CoreError::unavailable("Storage is unavailable").with_source(err)
            }
            DbErr::RecordNotFound(ref what) => {
                CoreError::new(CoreErrorKind::NotFound, what.clone()).with_source(err)
            }
            _ => CoreError::internal(format!("Database error: {}", err)).with_source(err),
        }
    }
}

/// SQLITE_BUSY (5) or SQLITE_LOCKED (6), extended codes included.
fn is_lock_contention(err: &DbErr) -> bool {
    let runtime = match err {
        DbErr::Exec(runtime) | DbErr::Query(runtime) | DbErr::Conn(runtime) => runtime,
        _ => return false,
    };
    match runtime {
        RuntimeErr::SqlxError(SqlxError::Database(db_err)) => db_err
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .map_or(false, |code| matches!(code & 0xff, 5 | 6)),
        _ => false,
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        CoreError::internal("Unhandled error").with_source(AnyhowSource(err))
    }
}

/// `anyhow::Error` does not implement `std::error::Error`; wrap it so it can
/// sit in the source chain.
#[derive(Debug)]
struct AnyhowSource(anyhow::Error);

impl fmt::Display for AnyhowSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl StdError for AnyhowSource {}
