//! Permission and role model, and the declarative catalog that seeds it.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use registrar_core::validation::validate_description;
use registrar_core::{PermissionId, RoleId, ValidationError, validate_identifier};
use serde::{Deserialize, Serialize};

use super::AuthError;

/// Catalog shipped with the binary, used when no catalog file is configured.
const DEFAULT_CATALOG: &str = include_str!("../catalog/default.json5");

/// Natural key of a permission: `resource:action`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PermissionKey {
    /// Resource the permission applies to, e.g. `grades`.
    pub resource: String,
    /// Action on the resource, e.g. `edit`.
    pub action: String,
}

impl PermissionKey {
    /// Build a validated key from its parts.
    ///
    /// # Errors
    ///
    /// Returns error if either part is not a valid identifier.
    pub fn new(resource: &str, action: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            resource: validate_identifier("resource", resource)?,
            action: validate_identifier("action", action)?,
        })
    }

    /// Whether this key names the given resource and action.
    #[must_use]
    pub fn matches(&self, resource: &str, action: &str) -> bool {
        self.resource == resource && self.action == action
    }
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.action)
    }
}

impl FromStr for PermissionKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (resource, action) = s
            .split_once(':')
            .ok_or_else(|| ValidationError::InvalidPermissionKey(s.to_string()))?;

        Self::new(resource, action)
            .map_err(|_| ValidationError::InvalidPermissionKey(s.to_string()))
    }
}

/// A persisted (resource, action) capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Unique permission ID.
    pub id: PermissionId,
    /// Natural key.
    #[serde(flatten)]
    pub key: PermissionKey,
    /// Human-readable description.
    pub description: String,
    /// When the permission was created.
    pub created_at: DateTime<Utc>,
    /// When the permission was last changed.
    pub updated_at: DateTime<Utc>,
}

impl Permission {
    /// Create a new permission with a fresh ID.
    #[must_use]
    pub fn new(key: PermissionKey, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: PermissionId::generate(),
            key,
            description: description.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A named bundle of permissions.
///
/// `permission_ids` is an owned snapshot: replacing it never touches any
/// other role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Unique role ID.
    pub id: RoleId,
    /// Natural key.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Granted permissions.
    pub permission_ids: BTreeSet<PermissionId>,
    /// Whether the role is part of the built-in system set.
    pub is_system_role: bool,
    /// When the role was created.
    pub created_at: DateTime<Utc>,
    /// When the role was last changed.
    pub updated_at: DateTime<Utc>,
}

impl Role {
    /// Create a new role with a fresh ID.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        permission_ids: BTreeSet<PermissionId>,
        is_system_role: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: RoleId::generate(),
            name: name.into(),
            description: description.into(),
            permission_ids,
            is_system_role,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Raw catalog file contents, before validation.
///
/// Every field defaults so a sloppy document still parses and each problem
/// is reported by [`Catalog::from_document`] instead of a serde error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDocument {
    /// Permission entries.
    #[serde(default)]
    pub permissions: Vec<RawPermission>,
    /// Role entries.
    #[serde(default)]
    pub roles: Vec<RawRole>,
}

/// Unvalidated permission entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPermission {
    /// Resource name.
    #[serde(default)]
    pub resource: String,
    /// Action name.
    #[serde(default)]
    pub action: String,
    /// Description.
    #[serde(default)]
    pub description: String,
}

/// Unvalidated role entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRole {
    /// Role name.
    #[serde(default)]
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Ordered `resource:action` keys.
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Whether this is a built-in system role.
    #[serde(default)]
    pub system: bool,
}

impl CatalogDocument {
    /// Parse a JSON5 catalog document.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the text is not valid JSON5.
    pub fn from_json5(text: &str) -> Result<Self, AuthError> {
        json5::from_str(text).map_err(|e| {
            AuthError::Validation(ValidationError::Catalog {
                issues: vec![format!("unparseable catalog: {e}")],
            })
        })
    }
}

/// A validated permission declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionDecl {
    /// Natural key.
    pub key: PermissionKey,
    /// Description.
    pub description: String,
}

/// A validated role declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDecl {
    /// Role name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Permissions, in declaration order.
    pub permissions: Vec<PermissionKey>,
    /// Whether this is a built-in system role.
    pub system: bool,
}

/// A validated, ordered catalog ready for reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    permissions: Vec<PermissionDecl>,
    roles: Vec<RoleDecl>,
}

impl Catalog {
    /// The built-in catalog.
    ///
    /// # Errors
    ///
    /// Returns error only if the embedded document is itself invalid.
    pub fn builtin() -> Result<Self, AuthError> {
        Self::from_json5(DEFAULT_CATALOG)
    }

    /// Parse and validate a JSON5 catalog.
    ///
    /// # Errors
    ///
    /// Returns a validation error listing every rejected entry.
    pub fn from_json5(text: &str) -> Result<Self, AuthError> {
        Self::from_document(CatalogDocument::from_json5(text)?)
    }

    /// Load and validate a catalog file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or fails validation.
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AuthError::Config(format!("Cannot read catalog {}: {e}", path.display()))
        })?;
        Self::from_json5(&text)
    }

    /// Validate a raw document.
    ///
    /// Nothing is accepted unless everything is: a single bad entry rejects
    /// the whole catalog, with one issue per problem found.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Catalog` describing all problems.
    pub fn from_document(document: CatalogDocument) -> Result<Self, AuthError> {
        let mut issues = Vec::new();
        let mut permissions = Vec::with_capacity(document.permissions.len());
        let mut seen_keys = HashSet::new();

        for (index, raw) in document.permissions.into_iter().enumerate() {
            let key = match PermissionKey::new(&raw.resource, &raw.action) {
                Ok(key) => key,
                Err(e) => {
                    issues.push(format!("permissions[{index}]: {e}"));
                    continue;
                }
            };

            let description = match validate_description(&raw.description) {
                Ok(d) => d,
                Err(e) => {
                    issues.push(format!("permissions[{index}] ({key}): {e}"));
                    continue;
                }
            };

            if !seen_keys.insert(key.clone()) {
                issues.push(format!("permissions[{index}]: duplicate permission '{key}'"));
                continue;
            }

            permissions.push(PermissionDecl { key, description });
        }

        let mut roles = Vec::with_capacity(document.roles.len());
        let mut seen_names = HashSet::new();

        for (index, raw) in document.roles.into_iter().enumerate() {
            let name = match validate_identifier("role name", &raw.name) {
                Ok(name) => name,
                Err(e) => {
                    issues.push(format!("roles[{index}]: {e}"));
                    continue;
                }
            };

            if !seen_names.insert(name.clone()) {
                issues.push(format!("roles[{index}]: duplicate role '{name}'"));
                continue;
            }

            let description = match validate_description(&raw.description) {
                Ok(d) => d,
                Err(e) => {
                    issues.push(format!("roles[{index}] ({name}): {e}"));
                    continue;
                }
            };

            let mut keys = Vec::with_capacity(raw.permissions.len());
            let mut role_keys = HashSet::new();
            let mut role_ok = true;
            for raw_key in &raw.permissions {
                match raw_key.parse::<PermissionKey>() {
                    Ok(key) => {
                        // Repeated keys collapse; the grant set is a set.
                        if role_keys.insert(key.clone()) {
                            keys.push(key);
                        }
                    }
                    Err(e) => {
                        issues.push(format!("roles[{index}] ({name}): {e}"));
                        role_ok = false;
                    }
                }
            }

            if role_ok {
                roles.push(RoleDecl {
                    name,
                    description,
                    permissions: keys,
                    system: raw.system,
                });
            }
        }

        if issues.is_empty() {
            Ok(Self { permissions, roles })
        } else {
            Err(AuthError::Validation(ValidationError::Catalog { issues }))
        }
    }

    /// Declared permissions, in order.
    #[must_use]
    pub fn permissions(&self) -> &[PermissionDecl] {
        &self.permissions
    }

    /// Declared roles, in order.
    #[must_use]
    pub fn roles(&self) -> &[RoleDecl] {
        &self.roles
    }

    /// Whether a role of this name is declared.
    #[must_use]
    pub fn declares_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issues(err: AuthError) -> Vec<String> {
        match err {
            AuthError::Validation(ValidationError::Catalog { issues }) => issues,
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_permission_key_parse() {
        let key: PermissionKey = "grades:edit".parse().unwrap();
        assert_eq!(key.resource, "grades");
        assert_eq!(key.action, "edit");
        assert_eq!(key.to_string(), "grades:edit");
        assert!(key.matches("grades", "edit"));
        assert!(!key.matches("grades", "view"));

        assert!("grades".parse::<PermissionKey>().is_err());
        assert!("grades:".parse::<PermissionKey>().is_err());
        assert!("a:b:c".parse::<PermissionKey>().is_err());
    }

    #[test]
    fn test_parse_catalog() {
        let catalog = Catalog::from_json5(
            r#"{
                permissions: [
                    { resource: "grades", action: "edit", description: "Edit grades" },
                    { resource: "grades", action: "view", description: "View grades" },
                ],
                roles: [
                    { name: "registrar", description: "Records office",
                      permissions: ["grades:edit", "grades:view", "grades:view"] },
                ],
            }"#,
        )
        .unwrap();

        assert_eq!(catalog.permissions().len(), 2);
        assert_eq!(catalog.roles().len(), 1);
        assert_eq!(catalog.roles()[0].permissions.len(), 2);
        assert!(!catalog.roles()[0].system);
        assert!(catalog.declares_role("registrar"));
    }

    #[test]
    fn test_rejects_every_malformed_entry() {
        let err = Catalog::from_json5(
            r#"{
                permissions: [
                    { resource: "grades", action: "edit" },
                    { resource: "grades", action: "edit" },
                    { resource: "", action: "view" },
                    { action: "view" },
                ],
                roles: [
                    { name: "Teacher", permissions: [] },
                    { name: "registrar", permissions: ["grades-edit"] },
                    { name: "viewer", permissions: [] },
                    { name: "viewer", permissions: [] },
                ],
            }"#,
        )
        .unwrap_err();

        let issues = issues(err);
        assert_eq!(issues.len(), 6, "{issues:?}");
        assert!(issues.iter().any(|i| i.contains("duplicate permission 'grades:edit'")));
        assert!(issues.iter().any(|i| i.contains("grades-edit")));
        assert!(issues.iter().any(|i| i.contains("duplicate role 'viewer'")));
    }

    #[test]
    fn test_unparseable_document() {
        let err = Catalog::from_json5("{ permissions: [").unwrap_err();
        assert_eq!(issues(err).len(), 1);
    }

    #[test]
    fn test_builtin_catalog_is_valid() {
        let catalog = Catalog::builtin().unwrap();
        assert!(!catalog.permissions().is_empty());
        assert!(catalog.declares_role("super_admin"));

        // Every role key refers to a declared permission.
        let declared: HashSet<_> = catalog.permissions().iter().map(|p| &p.key).collect();
        for role in catalog.roles() {
            for key in &role.permissions {
                assert!(declared.contains(key), "{} references {key}", role.name);
            }
        }
    }

    #[test]
    fn test_permission_serializes_flat() {
        let permission = Permission::new(PermissionKey::new("grades", "edit").unwrap(), "Edit");
        let value = serde_json::to_value(&permission).unwrap();
        assert_eq!(value["resource"], "grades");
        assert_eq!(value["action"], "edit");
    }
}
