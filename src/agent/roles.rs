//! Role templates and capability enforcement (§3 RoleTemplate, §4.9
//! "Role enforcement").
//!
//! Templates are loaded once at startup from a repository-local JSON
//! file and are effectively immutable afterward (§5 "Shared-resource
//! policy").

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A named capability set an agent is bound to.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoleTemplate {
    pub name: String,
    pub description: String,
    pub allowed_operations: HashSet<String>,
    pub forbidden_operations: HashSet<String>,
    pub example_tasks: Vec<String>,
}

impl RoleTemplate {
    /// §3 invariant: allowed ∩ forbidden = ∅; allowed is non-empty.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.allowed_operations.is_empty() {
            return Err(CoreError::InvalidParameter {
                field: "allowed_operations".to_owned(),
                provided_value: "[]".to_owned(),
                reason: format!("role '{}' has no allowed operations", self.name),
            });
        }
        let overlap: Vec<&str> = self
            .allowed_operations
            .intersection(&self.forbidden_operations)
            .map(String::as_str)
            .collect();
        if !overlap.is_empty() {
            return Err(CoreError::InvalidParameter {
                field: "forbidden_operations".to_owned(),
                provided_value: overlap.join(", "),
                reason: format!(
                    "role '{}' lists operations as both allowed and forbidden",
                    self.name
                ),
            });
        }
        Ok(())
    }

    /// §4.9: `operation ∈ allowed \ forbidden`.
    #[must_use]
    pub fn can_execute(&self, operation: &str) -> bool {
        self.allowed_operations.contains(operation) && !self.forbidden_operations.contains(operation)
    }
}

/// The set of known roles, keyed by name.
#[derive(Default)]
pub struct RoleRegistry {
    roles: std::collections::HashMap<String, RoleTemplate>,
}

impl RoleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// §6 "Role template source": tolerate the file being absent, return
    /// an empty registry in that case rather than failing startup.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "role template file absent; starting with no predefined roles");
                return Ok(Self::new());
            }
            Err(err) => return Err(CoreError::Io(err)),
        };
        let templates: Vec<RoleTemplate> =
            serde_json::from_str(&contents).map_err(|err| CoreError::Corrupt {
                context: path.display().to_string(),
                detail: err.to_string(),
            })?;
        let mut registry = Self::new();
        for template in templates {
            registry.insert(template)?;
        }
        Ok(registry)
    }

    /// Register a single template, rejecting one that violates §3's
    /// allowed/forbidden invariant.
    pub fn insert(&mut self, template: RoleTemplate) -> Result<(), CoreError> {
        template.validate()?;
        self.roles.insert(template.name.clone(), template);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RoleTemplate> {
        self.roles.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.roles.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(name: &str, allowed: &[&str], forbidden: &[&str]) -> RoleTemplate {
        RoleTemplate {
            name: name.to_owned(),
            description: "test role".to_owned(),
            allowed_operations: allowed.iter().map(|s| (*s).to_owned()).collect(),
            forbidden_operations: forbidden.iter().map(|s| (*s).to_owned()).collect(),
            example_tasks: vec![],
        }
    }

    #[test]
    fn can_execute_respects_allowed_and_forbidden() {
        let role = template("drafter", &["entity.create.point", "entity.create.line"], &["solid.boolean"]);
        assert!(role.can_execute("entity.create.point"));
        assert!(!role.can_execute("solid.boolean"));
        assert!(!role.can_execute("entity.create.arc"));
    }

    #[test]
    fn overlapping_allowed_and_forbidden_is_rejected() {
        let role = template("bad", &["solid.extrude"], &["solid.extrude"]);
        assert!(role.validate().is_err());
    }

    #[test]
    fn empty_allowed_is_rejected() {
        let role = template("empty", &[], &[]);
        assert!(role.validate().is_err());
    }

    #[test]
    fn missing_role_file_yields_empty_registry() {
        let registry = RoleRegistry::load(Path::new("/nonexistent/roles.json")).unwrap();
        assert!(!registry.contains("drafter"));
    }

    #[test]
    fn registry_loads_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roles.json");
        std::fs::write(
            &path,
            r#"[{"name":"drafter","description":"d","allowed_operations":["entity.create.point"],"forbidden_operations":[],"example_tasks":["sketch a point"]}]"#,
        )
        .unwrap();
        let registry = RoleRegistry::load(&path).unwrap();
        assert!(registry.contains("drafter"));
        assert!(registry.get("drafter").unwrap().can_execute("entity.create.point"));
    }
}
