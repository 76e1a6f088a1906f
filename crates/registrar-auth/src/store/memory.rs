//! In-memory store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use registrar_core::{PermissionId, UserId};

use super::{RbacStore, StoreError};
use crate::catalog::{Permission, PermissionKey, Role};
use crate::users::User;

#[derive(Debug, Default)]
struct State {
    permissions: HashMap<PermissionId, Permission>,
    roles: HashMap<String, Role>,
    users: HashMap<UserId, User>,
    sequences: HashMap<String, u64>,
}

/// Store that keeps everything in process memory.
///
/// Useful for tests and dry runs. It can be switched offline to exercise
/// the paths taken when a real store is unreachable.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    offline: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store is offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.check_online()?;
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.check_online()?;
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }
}

impl RbacStore for MemoryStore {
    fn ping(&self) -> Result<(), StoreError> {
        self.read().map(|_| ())
    }

    fn find_permission(&self, key: &PermissionKey) -> Result<Option<Permission>, StoreError> {
        Ok(self
            .read()?
            .permissions
            .values()
            .find(|p| &p.key == key)
            .cloned())
    }

    fn get_permission(&self, id: &PermissionId) -> Result<Option<Permission>, StoreError> {
        Ok(self.read()?.permissions.get(id).cloned())
    }

    fn insert_permission(&self, permission: &Permission) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if state.permissions.values().any(|p| p.key == permission.key) {
            return Err(StoreError::Conflict(format!(
                "permission '{}' already exists",
                permission.key
            )));
        }
        state
            .permissions
            .insert(permission.id.clone(), permission.clone());
        Ok(())
    }

    fn update_permission(&self, permission: &Permission) -> Result<(), StoreError> {
        let mut state = self.write()?;
        match state.permissions.get_mut(&permission.id) {
            Some(slot) => {
                *slot = permission.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(permission.id.to_string())),
        }
    }

    fn list_permissions(&self) -> Result<Vec<Permission>, StoreError> {
        Ok(self.read()?.permissions.values().cloned().collect())
    }

    fn find_role(&self, name: &str) -> Result<Option<Role>, StoreError> {
        Ok(self.read()?.roles.get(name).cloned())
    }

    fn insert_role(&self, role: &Role) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if state.roles.contains_key(&role.name) {
            return Err(StoreError::Conflict(format!(
                "role '{}' already exists",
                role.name
            )));
        }
        state.roles.insert(role.name.clone(), role.clone());
        Ok(())
    }

    fn update_role(&self, role: &Role) -> Result<(), StoreError> {
        let mut state = self.write()?;
        match state.roles.get_mut(&role.name) {
            Some(slot) if slot.id == role.id => {
                *slot = role.clone();
                Ok(())
            }
            _ => Err(StoreError::NotFound(role.id.to_string())),
        }
    }

    fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        Ok(self.read()?.roles.values().cloned().collect())
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    fn get_user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.users.get(id).cloned())
    }

    fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!(
                "email '{}' already exists",
                user.email
            )));
        }
        state.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if !state.users.contains_key(&user.id) {
            return Err(StoreError::NotFound(user.id.to_string()));
        }
        if state
            .users
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(StoreError::Conflict(format!(
                "email '{}' already exists",
                user.email
            )));
        }
        state.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.read()?.users.values().cloned().collect())
    }

    fn next_sequence(&self, scope: &str) -> Result<u64, StoreError> {
        let mut state = self.write()?;
        let counter = state.sequences.entry(scope.to_string()).or_insert(0);
        *counter = counter.saturating_add(1);
        Ok(*counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_permission_uniqueness() {
        let store = MemoryStore::new();
        let key = PermissionKey::new("grades", "edit").unwrap();
        store
            .insert_permission(&Permission::new(key.clone(), "a"))
            .unwrap();

        assert!(matches!(
            store.insert_permission(&Permission::new(key.clone(), "b")),
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(store.find_permission(&key).unwrap().unwrap().description, "a");
    }

    #[test]
    fn test_role_update_requires_existing() {
        let store = MemoryStore::new();
        let mut role = Role::new("teacher", "", BTreeSet::new(), false);
        assert!(matches!(store.update_role(&role), Err(StoreError::NotFound(_))));

        store.insert_role(&role).unwrap();
        role.description = "Teaching staff".to_string();
        store.update_role(&role).unwrap();
        assert_eq!(
            store.find_role("teacher").unwrap().unwrap().description,
            "Teaching staff"
        );
    }

    #[test]
    fn test_offline() {
        let store = MemoryStore::new();
        store.ping().unwrap();

        store.set_offline(true);
        let err = store.ping().unwrap_err();
        assert!(err.is_fatal());
        assert!(store.list_roles().is_err());

        store.set_offline(false);
        assert!(store.list_roles().unwrap().is_empty());
    }

    #[test]
    fn test_sequences() {
        let store = MemoryStore::new();
        assert_eq!(store.next_sequence("a").unwrap(), 1);
        assert_eq!(store.next_sequence("a").unwrap(), 2);
        assert_eq!(store.next_sequence("b").unwrap(), 1);
    }
}
