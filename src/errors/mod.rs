//! Error taxonomy shared by every cutline component.
//!
//! All workflow, audit and identity operations return [`CoreError`]. The
//! [`CoreErrorKind`] decides how a caller (usually a web layer) should react:
//!
//! - **Validation**: malformed or missing input (400)
//! - **Unauthorized**: absent, invalid or expired credential (401)
//! - **Forbidden**: valid credential but insufficient role, ownership or quota (403)
//! - **NotFound**: referenced entity is absent (404)
//! - **Conflict**: unique-constraint or lifecycle-stage violation (409)
//! - **Unavailable** / **Internal**: storage failures (503 / 500)
//!
//! # Examples
//!
//! ```rust
//! use cutline::errors::{CoreError, CoreErrorKind};
//!
//! let err = CoreError::conflict("Plan 4 is in_progress; layouts can only be created while pending");
//! assert_eq!(err.kind(), CoreErrorKind::Conflict);
//! assert_eq!(err.http_status_code(), 409);
//! ```

pub mod core_error;

pub use core_error::{CoreError, CoreErrorKind};

/// Result type alias used across services and the application context
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_result_alias() {
        let result: CoreResult<i32> = Err(CoreError::not_found("Task", "42"));
        assert!(result.is_err());
    }
}
