//! Role to permission table.
//!
//! Permissions are `module:action` strings. An entry `module:*` grants every
//! action of that module. Admin and manager are supervisor roles and satisfy
//! every permission without a table lookup.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Deserialize;

use super::{Actor, Authorizer};
use crate::config::ConfigError;
use crate::errors::{CoreError, CoreResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RolePermissions {
    roles: BTreeMap<String, BTreeSet<String>>,
}

#[derive(Debug, Deserialize)]
struct PermissionsFile {
    roles: BTreeMap<String, Vec<String>>,
}

impl Default for RolePermissions {
    fn default() -> Self {
        Self::from_entries([
            (
                "worker",
                vec![
                    "log:create",
                    "log:update",
                    "log:void",
                    "task:read",
                    "plan:read",
                    "layout:read",
                ],
            ),
            (
                "pattern_maker",
                vec!["plan:*", "layout:*", "layout_ratios:*", "task:*"],
            ),
        ])
    }
}

impl RolePermissions {
    pub fn from_entries<R, P>(entries: impl IntoIterator<Item = (R, Vec<P>)>) -> Self
    where
        R: AsRef<str>,
        P: AsRef<str>,
    {
        let roles = entries
            .into_iter()
            .map(|(role, perms)| {
                let perms = perms
                    .iter()
                    .map(|p| normalize(p.as_ref()))
                    .filter(|p| !p.is_empty())
                    .collect();
                (normalize(role.as_ref()), perms)
            })
            .collect();

        Self { roles }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let file: PermissionsFile = serde_yaml::from_str(yaml)?;
        Ok(Self::from_entries(file.roles))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn permissions_for(&self, role: &str) -> Option<&BTreeSet<String>> {
        self.roles.get(&normalize(role))
    }

    pub fn has_permission(&self, role: &str, required: &str) -> bool {
        let role = normalize(role);
        if role == "admin" || role == "manager" {
            return true;
        }

        let required = normalize(required);
        if required.is_empty() {
            return false;
        }

        let Some(allowed) = self.roles.get(&role) else {
            return false;
        };

        let required_module = required
            .split_once(':')
            .map(|(module, _)| module)
            .unwrap_or(required.as_str());

        allowed.iter().any(|entry| {
            if *entry == required {
                return true;
            }
            matches!(entry.split_once(':'), Some((module, "*")) if module == required_module)
        })
    }

    pub fn check(&self, role: &str, required: &str) -> CoreResult<()> {
        if self.has_permission(role, required) {
            Ok(())
        } else {
            Err(CoreError::forbidden(format!(
                "Role '{}' lacks permission '{}'",
                role, required
            ))
            .with_field("permission", required))
        }
    }
}

impl Authorizer for RolePermissions {
    fn authorize(&self, actor: &Actor, permission: &str) -> CoreResult<()> {
        self.check(actor.role().as_str(), permission)
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CoreErrorKind;

    #[test]
    fn test_supervisors_bypass_table() {
        let perms = RolePermissions::from_entries(Vec::<(&str, Vec<&str>)>::new());
        assert!(perms.has_permission("admin", "order:delete"));
        assert!(perms.has_permission("Manager", "anything:at_all"));
    }

    #[test]
    fn test_worker_defaults() {
        let perms = RolePermissions::default();
        assert!(perms.has_permission("worker", "log:create"));
        assert!(perms.has_permission("worker", "log:void"));
        assert!(perms.has_permission("worker", "task:read"));
        assert!(!perms.has_permission("worker", "task:create"));
        assert!(!perms.has_permission("worker", "plan:publish"));
    }

    #[test]
    fn test_module_wildcard() {
        let perms = RolePermissions::default();
        assert!(perms.has_permission("pattern_maker", "plan:publish"));
        assert!(perms.has_permission("pattern_maker", "layout_ratios:update"));
        assert!(perms.has_permission("pattern_maker", "TASK:Delete"));
        assert!(!perms.has_permission("pattern_maker", "log:create"));
        // "layout:*" must not leak into "layout_ratios"
        let narrow = RolePermissions::from_entries([("cutter", vec!["layout:*"])]);
        assert!(!narrow.has_permission("cutter", "layout_ratios:update"));
    }

    #[test]
    fn test_unknown_role_and_empty_permission() {
        let perms = RolePermissions::default();
        assert!(!perms.has_permission("visitor", "task:read"));
        assert!(!perms.has_permission("worker", ""));

        let err = perms.check("visitor", "task:read").expect_err("forbidden");
        assert_eq!(err.kind(), CoreErrorKind::Forbidden);
        assert_eq!(err.field("permission"), Some("task:read"));
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
roles:
  Worker:
    - log:create
  qa:
    - "task:*"
"#;
        let perms = RolePermissions::from_yaml_str(yaml).expect("valid yaml");
        assert!(perms.has_permission("worker", "log:create"));
        assert!(!perms.has_permission("worker", "log:void"));
        assert!(perms.has_permission("qa", "task:read"));
    }

    #[test]
    fn test_from_yaml_rejects_garbage() {
        assert!(RolePermissions::from_yaml_str("roles: 12").is_err());
    }
}
