//! Catalog reconciliation and fallback admin provisioning.
//!
//! A run walks the declared permissions, then the declared roles, then
//! makes sure the fallback administrative account exists. Every entity is
//! matched by natural key, so running the same catalog twice changes
//! nothing the second time.
//!
//! Failures on a single entry are recorded in the report and the run moves
//! on. A store that cannot be reached aborts the run with
//! [`AuthError::Persistence`].

use std::collections::BTreeSet;

use chrono::Utc;
use registrar_core::{AuthConfig, normalize_email};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::AuthError;
use super::catalog::{Catalog, Permission, PermissionDecl, Role, RoleDecl};
use super::credentials::{CredentialService, generate_password};
use super::store::{RbacStore, StoreError};
use super::users::{NewUser, PersonalInfo, User};

/// Length of the generated temporary admin password.
const TEMP_PASSWORD_LENGTH: usize = 20;

/// The administrative account bootstrap guarantees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackAdmin {
    /// Login email.
    pub email: String,
    /// Role assigned on creation.
    pub role: String,
    /// Display name.
    pub name: String,
}

impl FallbackAdmin {
    /// Describe a fallback admin.
    #[must_use]
    pub fn new(
        email: impl Into<String>,
        role: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            role: role.into(),
            name: name.into(),
        }
    }

    /// Take the fallback admin from auth configuration.
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            &config.fallback_admin_email,
            &config.fallback_admin_role,
            &config.fallback_admin_name,
        )
    }
}

/// A permission entry that could not be reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionFailure {
    /// `resource:action` of the entry.
    pub permission: String,
    /// What went wrong.
    pub error: String,
}

/// A role entry that could not be reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleFailure {
    /// Role name.
    pub role: String,
    /// What went wrong.
    pub error: String,
}

/// Counts and failures for one kind of entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionReport<F> {
    /// Entities created.
    pub created: usize,
    /// Entities changed.
    pub updated: usize,
    /// Entries that failed.
    pub errors: Vec<F>,
}

impl<F> Default for SectionReport<F> {
    fn default() -> Self {
        Self {
            created: 0,
            updated: 0,
            errors: Vec::new(),
        }
    }
}

impl<F> SectionReport<F> {
    /// Whether the run changed nothing and hit no errors in this section.
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.errors.is_empty()
    }
}

/// What happened to the fallback admin account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdminOutcome {
    /// The account was created with a temporary password that must be
    /// rotated at first sign-in.
    #[serde(rename_all = "camelCase")]
    Created {
        /// Login email.
        email: String,
        /// ID of the new account.
        user_id: String,
        /// Temporary password, shown once.
        temporary_password: String,
    },
    /// An account with this email already exists and was left untouched.
    AlreadyPresent {
        /// Login email.
        email: String,
    },
    /// The account could not be created.
    Failed {
        /// Login email as configured.
        email: String,
        /// What went wrong.
        error: String,
    },
}

impl AdminOutcome {
    /// The temporary password, if the account was just created.
    #[must_use]
    pub fn temporary_password(&self) -> Option<&str> {
        match self {
            Self::Created {
                temporary_password, ..
            } => Some(temporary_password),
            _ => None,
        }
    }
}

/// Result of a bootstrap run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapReport {
    /// Who started the run.
    pub initiated_by: String,
    /// Permission reconciliation.
    pub permissions: SectionReport<PermissionFailure>,
    /// Role reconciliation.
    pub roles: SectionReport<RoleFailure>,
    /// Fallback admin provisioning.
    pub admin: AdminOutcome,
}

impl BootstrapReport {
    /// Whether any entry failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.permissions.errors.is_empty()
            || !self.roles.errors.is_empty()
            || matches!(self.admin, AdminOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Created,
    Updated,
    Unchanged,
}

impl<F> SectionReport<F> {
    fn record(&mut self, change: Change) {
        match change {
            Change::Created => self.created += 1,
            Change::Updated => self.updated += 1,
            Change::Unchanged => {}
        }
    }
}

fn fatal(err: &StoreError) -> AuthError {
    AuthError::Persistence(err.to_string())
}

/// Reconciles a catalog into a store.
pub struct Bootstrapper<'a, S: RbacStore + ?Sized> {
    store: &'a S,
    credentials: &'a CredentialService,
    admin: &'a FallbackAdmin,
}

impl<'a, S: RbacStore + ?Sized> Bootstrapper<'a, S> {
    /// Create a bootstrapper over a store.
    #[must_use]
    pub const fn new(
        store: &'a S,
        credentials: &'a CredentialService,
        admin: &'a FallbackAdmin,
    ) -> Self {
        Self {
            store,
            credentials,
            admin,
        }
    }

    /// Run a full reconciliation.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Persistence`] if the store is unreachable at any
    /// point. Per-entry failures are reported, not returned.
    pub fn run(&self, catalog: &Catalog, initiator: &str) -> Result<BootstrapReport, AuthError> {
        let span = tracing::info_span!("initialize_rbac", initiator);
        let _enter = span.enter();

        self.store.ping().map_err(|e| {
            warn!(error = %e, "Store health check failed, aborting bootstrap");
            AuthError::Persistence(e.to_string())
        })?;

        let permissions = self.reconcile_permissions(catalog.permissions())?;
        let roles = self.reconcile_roles(catalog.roles())?;
        let admin = self.ensure_admin(catalog)?;

        info!(
            permissions_created = permissions.created,
            permissions_updated = permissions.updated,
            permission_errors = permissions.errors.len(),
            roles_created = roles.created,
            roles_updated = roles.updated,
            role_errors = roles.errors.len(),
            "RBAC bootstrap complete"
        );

        Ok(BootstrapReport {
            initiated_by: initiator.to_string(),
            permissions,
            roles,
            admin,
        })
    }

    fn reconcile_permissions(
        &self,
        declarations: &[PermissionDecl],
    ) -> Result<SectionReport<PermissionFailure>, AuthError> {
        let mut section = SectionReport::default();

        for decl in declarations {
            match self.upsert_permission(decl) {
                Ok(change) => section.record(change),
                Err(e) if e.is_fatal() => return Err(fatal(&e)),
                Err(e) => {
                    warn!(permission = %decl.key, error = %e, "Failed to reconcile permission");
                    section.errors.push(PermissionFailure {
                        permission: decl.key.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(section)
    }

    fn upsert_permission(&self, decl: &PermissionDecl) -> Result<Change, StoreError> {
        match self.store.find_permission(&decl.key)? {
            None => {
                let permission = Permission::new(decl.key.clone(), decl.description.clone());
                self.store.insert_permission(&permission)?;
                info!(permission = %decl.key, id = %permission.id, "Permission created");
                Ok(Change::Created)
            }
            Some(existing) if existing.description == decl.description => {
                debug!(permission = %decl.key, "Permission unchanged");
                Ok(Change::Unchanged)
            }
            Some(mut existing) => {
                existing.description.clone_from(&decl.description);
                existing.updated_at = Utc::now();
                self.store.update_permission(&existing)?;
                info!(permission = %decl.key, "Permission updated");
                Ok(Change::Updated)
            }
        }
    }

    fn reconcile_roles(
        &self,
        declarations: &[RoleDecl],
    ) -> Result<SectionReport<RoleFailure>, AuthError> {
        let mut section = SectionReport::default();

        for decl in declarations {
            match self.upsert_role(decl) {
                Ok(change) => section.record(change),
                Err(e) if e.is_fatal() => return Err(fatal(&e)),
                Err(e) => {
                    warn!(role = %decl.name, error = %e, "Failed to reconcile role");
                    section.errors.push(RoleFailure {
                        role: decl.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(section)
    }

    fn upsert_role(&self, decl: &RoleDecl) -> Result<Change, StoreError> {
        let mut permission_ids = BTreeSet::new();
        let mut unresolved = Vec::new();

        for key in &decl.permissions {
            match self.store.find_permission(key)? {
                Some(permission) => {
                    permission_ids.insert(permission.id);
                }
                None => unresolved.push(key.to_string()),
            }
        }

        if !unresolved.is_empty() {
            return Err(StoreError::NotFound(format!(
                "unknown permission(s): {}",
                unresolved.join(", ")
            )));
        }

        match self.store.find_role(&decl.name)? {
            None => {
                let role = Role::new(
                    decl.name.clone(),
                    decl.description.clone(),
                    permission_ids,
                    decl.system,
                );
                self.store.insert_role(&role)?;
                info!(
                    role = %role.name,
                    id = %role.id,
                    permissions = role.permission_ids.len(),
                    "Role created"
                );
                Ok(Change::Created)
            }
            Some(existing)
                if existing.permission_ids == permission_ids
                    && existing.description == decl.description
                    && existing.is_system_role == decl.system =>
            {
                debug!(role = %decl.name, "Role unchanged");
                Ok(Change::Unchanged)
            }
            Some(mut existing) => {
                existing.permission_ids = permission_ids;
                existing.description.clone_from(&decl.description);
                existing.is_system_role = decl.system;
                existing.updated_at = Utc::now();
                self.store.update_role(&existing)?;
                info!(
                    role = %existing.name,
                    permissions = existing.permission_ids.len(),
                    "Role updated"
                );
                Ok(Change::Updated)
            }
        }
    }

    fn ensure_admin(&self, catalog: &Catalog) -> Result<AdminOutcome, AuthError> {
        let email = match normalize_email(&self.admin.email) {
            Ok(email) => email,
            Err(e) => {
                warn!(error = %e, "Fallback admin email is invalid");
                return Ok(AdminOutcome::Failed {
                    email: self.admin.email.clone(),
                    error: e.to_string(),
                });
            }
        };

        if !catalog.declares_role(&self.admin.role) {
            warn!(
                role = %self.admin.role,
                "Fallback admin role is not declared in the catalog; the account will be denied everything"
            );
        }

        match self.store.find_user_by_email(&email) {
            Ok(Some(_)) => {
                debug!(email = %email, "Fallback admin already present");
                return Ok(AdminOutcome::AlreadyPresent { email });
            }
            Ok(None) => {}
            Err(e) if e.is_fatal() => return Err(fatal(&e)),
            Err(e) => return Ok(AdminOutcome::Failed { email, error: e.to_string() }),
        }

        let password = generate_password(TEMP_PASSWORD_LENGTH);
        let new = NewUser::new(
            email.clone(),
            self.admin.role.clone(),
            PersonalInfo::from_display_name(&self.admin.name),
        )
        .with_rotation_required();

        let user = match User::create(new, &password, self.credentials) {
            Ok(user) => user,
            Err(e) => {
                warn!(email = %email, error = %e, "Failed to build fallback admin");
                return Ok(AdminOutcome::Failed { email, error: e.to_string() });
            }
        };

        match self.store.insert_user(&user) {
            Ok(()) => {
                info!(
                    email = %email,
                    user_id = %user.id,
                    role = %user.role,
                    "Fallback admin created; password must be rotated at first sign-in"
                );
                Ok(AdminOutcome::Created {
                    email,
                    user_id: user.id.to_string(),
                    temporary_password: password,
                })
            }
            // Another run created it between the lookup and the insert.
            Err(StoreError::Conflict(_)) => Ok(AdminOutcome::AlreadyPresent { email }),
            Err(e) if e.is_fatal() => Err(fatal(&e)),
            Err(e) => {
                warn!(email = %email, error = %e, "Failed to store fallback admin");
                Ok(AdminOutcome::Failed { email, error: e.to_string() })
            }
        }
    }
}

/// Reconcile `catalog` into `store` and make sure the fallback admin exists.
///
/// Equivalent to [`Bootstrapper::run`].
///
/// # Errors
///
/// Returns [`AuthError::Persistence`] if the store is unreachable.
pub fn initialize_rbac<S: RbacStore + ?Sized>(
    store: &S,
    catalog: &Catalog,
    credentials: &CredentialService,
    admin: &FallbackAdmin,
    initiator: &str,
) -> Result<BootstrapReport, AuthError> {
    Bootstrapper::new(store, credentials, admin).run(catalog, initiator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PermissionKey;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;
    use registrar_core::{PermissionId, UserId};

    fn credentials() -> CredentialService {
        CredentialService::new(1, 1024, 1).unwrap()
    }

    fn admin() -> FallbackAdmin {
        FallbackAdmin::new("Admin@School.edu", "registrar", "System Administrator")
    }

    fn scenario_a() -> Catalog {
        Catalog::from_json5(
            r#"{
                permissions: [
                    { resource: "grades", action: "edit", description: "Edit grades" },
                    { resource: "grades", action: "view", description: "View grades" },
                ],
                roles: [
                    { name: "registrar", description: "Records office",
                      permissions: ["grades:edit", "grades:view"] },
                ],
            }"#,
        )
        .unwrap()
    }

    fn counts<F>(created: usize, updated: usize) -> SectionReport<F> {
        SectionReport {
            created,
            updated,
            errors: Vec::new(),
        }
    }

    /// Store wrapper that fails chosen operations.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        corrupt_permission: Option<PermissionKey>,
        racing_permission: Option<PermissionKey>,
        racing_role: Option<String>,
        unavailable_on_role_insert: bool,
    }

    impl RbacStore for FlakyStore {
        fn ping(&self) -> Result<(), StoreError> {
            self.inner.ping()
        }
        fn find_permission(&self, key: &PermissionKey) -> Result<Option<Permission>, StoreError> {
            self.inner.find_permission(key)
        }
        fn get_permission(&self, id: &PermissionId) -> Result<Option<Permission>, StoreError> {
            self.inner.get_permission(id)
        }
        fn insert_permission(&self, permission: &Permission) -> Result<(), StoreError> {
            if self.corrupt_permission.as_ref() == Some(&permission.key) {
                return Err(StoreError::Corrupt("bad page".to_string()));
            }
            if self.racing_permission.as_ref() == Some(&permission.key) {
                // Another run claimed the key between lookup and insert.
                self.inner.insert_permission(&Permission::new(
                    permission.key.clone(),
                    permission.description.clone(),
                ))?;
            }
            self.inner.insert_permission(permission)
        }
        fn update_permission(&self, permission: &Permission) -> Result<(), StoreError> {
            self.inner.update_permission(permission)
        }
        fn list_permissions(&self) -> Result<Vec<Permission>, StoreError> {
            self.inner.list_permissions()
        }
        fn find_role(&self, name: &str) -> Result<Option<Role>, StoreError> {
            self.inner.find_role(name)
        }
        fn insert_role(&self, role: &Role) -> Result<(), StoreError> {
            if self.unavailable_on_role_insert {
                return Err(StoreError::Unavailable("connection reset".to_string()));
            }
            if self.racing_role.as_deref() == Some(role.name.as_str()) {
                self.inner.insert_role(&Role::new(
                    role.name.clone(),
                    role.description.clone(),
                    role.permission_ids.clone(),
                    role.is_system_role,
                ))?;
            }
            self.inner.insert_role(role)
        }
        fn update_role(&self, role: &Role) -> Result<(), StoreError> {
            self.inner.update_role(role)
        }
        fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
            self.inner.list_roles()
        }
        fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
            self.inner.find_user_by_email(email)
        }
        fn get_user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
            self.inner.get_user(id)
        }
        fn insert_user(&self, user: &User) -> Result<(), StoreError> {
            self.inner.insert_user(user)
        }
        fn update_user(&self, user: &User) -> Result<(), StoreError> {
            self.inner.update_user(user)
        }
        fn list_users(&self) -> Result<Vec<User>, StoreError> {
            self.inner.list_users()
        }
        fn next_sequence(&self, scope: &str) -> Result<u64, StoreError> {
            self.inner.next_sequence(scope)
        }
    }

    #[test]
    fn test_scenario_a_and_idempotence() {
        let store = MemoryStore::new();
        let creds = credentials();
        let admin = admin();
        let catalog = scenario_a();

        let first = initialize_rbac(&store, &catalog, &creds, &admin, "deploy").unwrap();
        assert_eq!(first.initiated_by, "deploy");
        assert_eq!(first.permissions, counts(2, 0));
        assert_eq!(first.roles, counts(1, 0));
        assert!(first.admin.temporary_password().is_some());

        assert!(!first.permissions.is_quiet());

        let second = initialize_rbac(&store, &catalog, &creds, &admin, "deploy").unwrap();
        assert_eq!(second.permissions, counts(0, 0));
        assert_eq!(second.roles, counts(0, 0));
        assert!(second.permissions.is_quiet());
        assert!(second.roles.is_quiet());
        assert_eq!(
            second.admin,
            AdminOutcome::AlreadyPresent {
                email: "admin@school.edu".to_string()
            }
        );
        assert!(!second.has_errors());

        assert_eq!(store.list_permissions().unwrap().len(), 2);
        assert_eq!(store.list_roles().unwrap().len(), 1);
        assert_eq!(store.list_users().unwrap().len(), 1);
    }

    #[test]
    fn test_fallback_admin_requires_rotation() {
        let store = MemoryStore::new();
        let creds = credentials();
        let report =
            initialize_rbac(&store, &scenario_a(), &creds, &admin(), "deploy").unwrap();

        let password = report.admin.temporary_password().unwrap().to_string();
        let user = store.find_user_by_email("admin@school.edu").unwrap().unwrap();
        assert!(user.must_rotate_password);
        assert_eq!(user.role, "registrar");
        assert_eq!(user.personal_info.full_name(), "System Administrator");
        assert!(user.verify_password(&password, &creds));
    }

    #[test]
    fn test_existing_admin_untouched() {
        let store = MemoryStore::new();
        let creds = credentials();
        let existing = User::create(
            NewUser::new("admin@school.edu", "teacher", PersonalInfo::default()),
            "their-own-password",
            &creds,
        )
        .unwrap();
        store.insert_user(&existing).unwrap();

        let report =
            initialize_rbac(&store, &scenario_a(), &creds, &admin(), "deploy").unwrap();
        assert!(matches!(report.admin, AdminOutcome::AlreadyPresent { .. }));

        let user = store.find_user_by_email("admin@school.edu").unwrap().unwrap();
        assert_eq!(user, existing);
    }

    #[test]
    fn test_description_change_is_update() {
        let store = MemoryStore::new();
        let creds = credentials();
        initialize_rbac(&store, &scenario_a(), &creds, &admin(), "deploy").unwrap();

        let changed = Catalog::from_json5(
            r#"{
                permissions: [
                    { resource: "grades", action: "edit", description: "Enter and edit grades" },
                    { resource: "grades", action: "view", description: "View grades" },
                ],
                roles: [
                    { name: "registrar", description: "Records office", system: true,
                      permissions: ["grades:edit", "grades:view"] },
                ],
            }"#,
        )
        .unwrap();

        let report = initialize_rbac(&store, &changed, &creds, &admin(), "deploy").unwrap();
        assert_eq!(report.permissions, counts(0, 1));
        assert_eq!(report.roles, counts(0, 1));

        let key = PermissionKey::new("grades", "edit").unwrap();
        assert_eq!(
            store.find_permission(&key).unwrap().unwrap().description,
            "Enter and edit grades"
        );
        assert!(store.find_role("registrar").unwrap().unwrap().is_system_role);
    }

    #[test]
    fn test_role_set_is_fully_replaced() {
        let store = MemoryStore::new();
        let creds = credentials();
        initialize_rbac(&store, &scenario_a(), &creds, &admin(), "deploy").unwrap();

        let narrowed = Catalog::from_json5(
            r#"{
                permissions: [
                    { resource: "grades", action: "edit", description: "Edit grades" },
                    { resource: "grades", action: "view", description: "View grades" },
                ],
                roles: [
                    { name: "registrar", description: "Records office",
                      permissions: ["grades:view"] },
                ],
            }"#,
        )
        .unwrap();

        let report = initialize_rbac(&store, &narrowed, &creds, &admin(), "deploy").unwrap();
        assert_eq!(report.roles, counts(0, 1));

        let view = store
            .find_permission(&PermissionKey::new("grades", "view").unwrap())
            .unwrap()
            .unwrap();
        let role = store.find_role("registrar").unwrap().unwrap();
        assert_eq!(role.permission_ids, BTreeSet::from([view.id]));
    }

    #[test]
    fn test_unresolved_permission_skips_role() {
        let store = MemoryStore::new();
        let creds = credentials();
        let catalog = Catalog::from_json5(
            r#"{
                permissions: [
                    { resource: "grades", action: "view", description: "View grades" },
                ],
                roles: [
                    { name: "teacher", permissions: ["grades:view", "attendance:record"] },
                    { name: "student", permissions: ["grades:view"] },
                ],
            }"#,
        )
        .unwrap();

        let report = initialize_rbac(&store, &catalog, &creds, &admin(), "deploy").unwrap();
        assert_eq!(report.roles.created, 1);
        assert_eq!(report.roles.errors.len(), 1);
        assert_eq!(report.roles.errors[0].role, "teacher");
        assert!(report.roles.errors[0].error.contains("attendance:record"));
        assert!(store.find_role("teacher").unwrap().is_none());
        assert!(store.find_role("student").unwrap().is_some());
    }

    #[test]
    fn test_item_failure_is_isolated() {
        let store = FlakyStore {
            corrupt_permission: Some(PermissionKey::new("grades", "edit").unwrap()),
            ..FlakyStore::default()
        };
        let creds = credentials();

        let report =
            initialize_rbac(&store, &scenario_a(), &creds, &admin(), "deploy").unwrap();

        assert_eq!(report.permissions.created, 1);
        assert_eq!(report.permissions.errors.len(), 1);
        assert_eq!(report.permissions.errors[0].permission, "grades:edit");

        // The role depends on the failed permission, so it is skipped too.
        assert_eq!(report.roles.created, 0);
        assert_eq!(report.roles.errors.len(), 1);

        // The admin is still provisioned.
        assert!(matches!(report.admin, AdminOutcome::Created { .. }));
        assert!(report.has_errors());
    }

    #[test]
    fn test_concurrent_insert_conflict_is_reported() {
        let store = FlakyStore {
            racing_permission: Some(PermissionKey::new("grades", "view").unwrap()),
            racing_role: Some("registrar".to_string()),
            ..FlakyStore::default()
        };
        let creds = credentials();

        let report =
            initialize_rbac(&store, &scenario_a(), &creds, &admin(), "deploy").unwrap();

        assert_eq!(report.permissions.created, 1);
        assert_eq!(report.permissions.errors.len(), 1);
        assert_eq!(report.permissions.errors[0].permission, "grades:view");
        assert!(report.permissions.errors[0].error.starts_with("Conflict"));

        assert_eq!(report.roles.created, 0);
        assert_eq!(report.roles.errors.len(), 1);
        assert_eq!(report.roles.errors[0].role, "registrar");
        assert!(report.roles.errors[0].error.starts_with("Conflict"));
        assert!(!report.roles.is_quiet());

        // The run carried on past both conflicts.
        assert!(matches!(report.admin, AdminOutcome::Created { .. }));
        assert!(report.has_errors());

        // The winning writer's records are the ones that persist.
        assert_eq!(store.list_permissions().unwrap().len(), 2);
        assert!(store.find_role("registrar").unwrap().is_some());
    }

    #[test]
    fn test_unreachable_store_aborts() {
        let store = MemoryStore::new();
        store.set_offline(true);

        let err = initialize_rbac(&store, &scenario_a(), &credentials(), &admin(), "deploy")
            .unwrap_err();
        assert!(matches!(err, AuthError::Persistence(_)));
    }

    #[test]
    fn test_store_failure_mid_run_aborts() {
        let store = FlakyStore {
            unavailable_on_role_insert: true,
            ..FlakyStore::default()
        };

        let err = initialize_rbac(&store, &scenario_a(), &credentials(), &admin(), "deploy")
            .unwrap_err();
        assert!(matches!(err, AuthError::Persistence(_)));
        assert!(store.list_users().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_admin_email_reported() {
        let store = MemoryStore::new();
        let bad = FallbackAdmin::new("not-an-email", "registrar", "Admin");

        let report =
            initialize_rbac(&store, &scenario_a(), &credentials(), &bad, "deploy").unwrap();
        assert!(matches!(report.admin, AdminOutcome::Failed { .. }));
        assert_eq!(report.permissions.created, 2);
    }

    #[test]
    fn test_builtin_catalog_seeds_cleanly() {
        let store = MemoryStore::new();
        let catalog = Catalog::builtin().unwrap();
        let admin = FallbackAdmin::new("admin@school.edu", "super_admin", "Administrator");

        let report = initialize_rbac(&store, &catalog, &credentials(), &admin, "test").unwrap();
        assert_eq!(report.permissions.created, catalog.permissions().len());
        assert_eq!(report.roles.created, catalog.roles().len());
        assert!(!report.has_errors());
    }

    #[test]
    fn test_report_serialization() {
        let report = BootstrapReport {
            initiated_by: "ops".to_string(),
            permissions: counts(2, 0),
            roles: counts(1, 0),
            admin: AdminOutcome::AlreadyPresent {
                email: "a@b.edu".to_string(),
            },
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["initiatedBy"], "ops");
        assert_eq!(value["permissions"]["created"], 2);
        assert_eq!(value["admin"]["status"], "already_present");
    }
}
