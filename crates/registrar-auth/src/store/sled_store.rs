//! Store backed by sled.
//!
//! Each record kind lives in its own tree. Records are keyed by ID; natural
//! keys are indexed in the same tree under an `idx:` prefix and claimed in
//! the same transaction as the record, so two writers can never both create
//! the same permission, role, or account.

use std::path::Path;

use registrar_core::{PermissionId, UserId};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult, TransactionError};

use super::{RbacStore, StoreError};
use crate::catalog::{Permission, PermissionKey, Role};
use crate::users::User;

const INDEX_PREFIX: &[u8] = b"idx:";

/// Why a transaction was aborted.
enum Abort {
    /// The named index entry is taken.
    Conflict(String),
    NotFound,
    Corrupt(String),
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Store backed by a sled database.
pub struct SledStore {
    db: sled::Db,
    permissions: sled::Tree,
    roles: sled::Tree,
    users: sled::Tree,
    sequences: sled::Tree,
}

impl SledStore {
    /// Open or create a store at the given directory.
    ///
    /// # Errors
    ///
    /// Returns error if database cannot be opened.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = sled::open(path.join("rbac")).map_err(|e| {
            StoreError::Unavailable(format!("Failed to open RBAC database: {e}"))
        })?;
        Self::with_db(db)
    }

    /// Create a store over an existing sled database.
    ///
    /// # Errors
    ///
    /// Returns error if the trees cannot be opened.
    pub fn with_db(db: sled::Db) -> Result<Self, StoreError> {
        Ok(Self {
            permissions: db.open_tree("permissions")?,
            roles: db.open_tree("roles")?,
            users: db.open_tree("users")?,
            sequences: db.open_tree("sequences")?,
            db,
        })
    }
}

fn permission_index(key: &PermissionKey) -> String {
    format!("idx:key:{}:{}", key.resource, key.action)
}

fn role_index(name: &str) -> String {
    format!("idx:name:{name}")
}

fn email_index(email: &str) -> String {
    format!("idx:email:{email}")
}

fn user_email_index(user: &User) -> String {
    email_index(&user.email)
}

fn read<T: DeserializeOwned>(tree: &sled::Tree, key: &[u8]) -> Result<Option<T>, StoreError> {
    match tree.get(key)? {
        Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
        None => Ok(None),
    }
}

fn read_indexed<T: DeserializeOwned>(
    tree: &sled::Tree,
    index_key: &str,
) -> Result<Option<T>, StoreError> {
    match tree.get(index_key.as_bytes())? {
        Some(id) => read(tree, &id),
        None => Ok(None),
    }
}

fn list<T: DeserializeOwned>(tree: &sled::Tree) -> Result<Vec<T>, StoreError> {
    let mut records = Vec::new();

    for entry in tree.iter() {
        let (key, value) = entry?;

        // Skip index entries
        if key.starts_with(INDEX_PREFIX) {
            continue;
        }

        records.push(serde_json::from_slice(&value)?);
    }

    Ok(records)
}

/// Claim `index_key` and write the record in one transaction.
fn insert_indexed<T: Serialize>(
    tree: &sled::Tree,
    index_key: &str,
    id: &str,
    record: &T,
) -> Result<(), StoreError> {
    let value = serde_json::to_vec(record)?;

    let result = tree.transaction(|tx| -> ConflictableTransactionResult<(), Abort> {
        if tx.get(index_key.as_bytes())?.is_some() {
            return Err(ConflictableTransactionError::Abort(Abort::Conflict(
                index_key.to_string(),
            )));
        }
        tx.insert(index_key.as_bytes(), id.as_bytes())?;
        tx.insert(id.as_bytes(), value.as_slice())?;
        Ok(())
    });

    finish(tree, result, id)
}

/// Overwrite an existing record in one transaction.
///
/// With `index_of`, the natural key of the stored record is read inside the
/// transaction; if it differs from the new record's, the old index entry is
/// released and the new one claimed atomically.
fn replace<T: Serialize + DeserializeOwned>(
    tree: &sled::Tree,
    id: &str,
    record: &T,
    index_of: Option<fn(&T) -> String>,
) -> Result<(), StoreError> {
    let value = serde_json::to_vec(record)?;

    let result = tree.transaction(|tx| -> ConflictableTransactionResult<(), Abort> {
        let Some(stored) = tx.get(id.as_bytes())? else {
            return Err(ConflictableTransactionError::Abort(Abort::NotFound));
        };

        if let Some(index_of) = index_of {
            let current: T = serde_json::from_slice(&stored).map_err(|e| {
                ConflictableTransactionError::Abort(Abort::Corrupt(e.to_string()))
            })?;
            let old_index = index_of(&current);
            let new_index = index_of(record);

            if old_index != new_index {
                if tx.get(new_index.as_bytes())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(Abort::Conflict(new_index)));
                }
                tx.remove(old_index.as_bytes())?;
                tx.insert(new_index.as_bytes(), id.as_bytes())?;
            }
        }

        tx.insert(id.as_bytes(), value.as_slice())?;
        Ok(())
    });

    finish(tree, result, id)
}

fn finish(
    tree: &sled::Tree,
    result: Result<(), TransactionError<Abort>>,
    id: &str,
) -> Result<(), StoreError> {
    match result {
        Ok(()) => {
            tree.flush()?;
            Ok(())
        }
        Err(TransactionError::Abort(Abort::Conflict(index_key))) => Err(StoreError::Conflict(
            format!("{} already exists", index_key.trim_start_matches("idx:")),
        )),
        Err(TransactionError::Abort(Abort::NotFound)) => Err(StoreError::NotFound(id.to_string())),
        Err(TransactionError::Abort(Abort::Corrupt(msg))) => Err(StoreError::Corrupt(msg)),
        Err(TransactionError::Storage(e)) => Err(e.into()),
    }
}

impl RbacStore for SledStore {
    fn ping(&self) -> Result<(), StoreError> {
        self.db.size_on_disk()?;
        Ok(())
    }

    fn find_permission(&self, key: &PermissionKey) -> Result<Option<Permission>, StoreError> {
        read_indexed(&self.permissions, &permission_index(key))
    }

    fn get_permission(&self, id: &PermissionId) -> Result<Option<Permission>, StoreError> {
        read(&self.permissions, id.as_str().as_bytes())
    }

    fn insert_permission(&self, permission: &Permission) -> Result<(), StoreError> {
        insert_indexed(
            &self.permissions,
            &permission_index(&permission.key),
            permission.id.as_str(),
            permission,
        )
    }

    fn update_permission(&self, permission: &Permission) -> Result<(), StoreError> {
        replace(&self.permissions, permission.id.as_str(), permission, None)
    }

    fn list_permissions(&self) -> Result<Vec<Permission>, StoreError> {
        list(&self.permissions)
    }

    fn find_role(&self, name: &str) -> Result<Option<Role>, StoreError> {
        read_indexed(&self.roles, &role_index(name))
    }

    fn insert_role(&self, role: &Role) -> Result<(), StoreError> {
        insert_indexed(&self.roles, &role_index(&role.name), role.id.as_str(), role)
    }

    fn update_role(&self, role: &Role) -> Result<(), StoreError> {
        replace(&self.roles, role.id.as_str(), role, None)
    }

    fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        list(&self.roles)
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        read_indexed(&self.users, &email_index(email))
    }

    fn get_user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        read(&self.users, id.as_str().as_bytes())
    }

    fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        insert_indexed(&self.users, &email_index(&user.email), user.id.as_str(), user)
    }

    fn update_user(&self, user: &User) -> Result<(), StoreError> {
        replace(
            &self.users,
            user.id.as_str(),
            user,
            Some(user_email_index as fn(&User) -> String),
        )
    }

    fn list_users(&self) -> Result<Vec<User>, StoreError> {
        list(&self.users)
    }

    fn next_sequence(&self, scope: &str) -> Result<u64, StoreError> {
        let value = self
            .sequences
            .update_and_fetch(scope.as_bytes(), |old| {
                let current = old
                    .and_then(|bytes| <[u8; 8]>::try_from(bytes).ok())
                    .map_or(0, u64::from_be_bytes);
                Some(current.saturating_add(1).to_be_bytes().to_vec())
            })?
            .ok_or_else(|| StoreError::Corrupt(format!("sequence '{scope}' vanished")))?;

        let bytes = <[u8; 8]>::try_from(value.as_ref())
            .map_err(|_| StoreError::Corrupt(format!("sequence '{scope}' is not a u64")))?;

        self.sequences.flush()?;
        Ok(u64::from_be_bytes(bytes))
    }
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("permissions", &self.permissions.len())
            .field("roles", &self.roles.len())
            .field("users", &self.users.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PermissionKey;
    use crate::credentials::CredentialService;
    use crate::users::{NewUser, PersonalInfo};
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn open() -> (TempDir, SledStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = SledStore::open(temp_dir.path()).unwrap();
        (temp_dir, store)
    }

    fn user(email: &str) -> User {
        let credentials = CredentialService::new(1, 1024, 1).unwrap();
        User::create(
            NewUser::new(email, "teacher", PersonalInfo::default()),
            "password123",
            &credentials,
        )
        .unwrap()
    }

    #[test]
    fn test_permission_roundtrip_and_uniqueness() {
        let (_dir, store) = open();
        store.ping().unwrap();

        let key = PermissionKey::new("grades", "edit").unwrap();
        let permission = Permission::new(key.clone(), "Edit grades");
        store.insert_permission(&permission).unwrap();

        assert_eq!(store.find_permission(&key).unwrap(), Some(permission.clone()));
        assert_eq!(
            store.get_permission(&permission.id).unwrap(),
            Some(permission.clone())
        );

        let duplicate = Permission::new(key, "Another");
        assert!(matches!(
            store.insert_permission(&duplicate),
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(store.list_permissions().unwrap().len(), 1);
    }

    #[test]
    fn test_update_permission() {
        let (_dir, store) = open();
        let key = PermissionKey::new("grades", "view").unwrap();
        let mut permission = Permission::new(key.clone(), "old");
        store.insert_permission(&permission).unwrap();

        permission.description = "new".to_string();
        store.update_permission(&permission).unwrap();
        assert_eq!(store.find_permission(&key).unwrap().unwrap().description, "new");

        let missing = Permission::new(PermissionKey::new("x", "y").unwrap(), "");
        assert!(matches!(
            store.update_permission(&missing),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_role_replacement() {
        let (_dir, store) = open();
        let a = PermissionId::new("perm_a");
        let b = PermissionId::new("perm_b");

        let mut role = Role::new("registrar", "", BTreeSet::from([a.clone()]), false);
        store.insert_role(&role).unwrap();

        role.permission_ids = BTreeSet::from([b.clone()]);
        store.update_role(&role).unwrap();

        let loaded = store.find_role("registrar").unwrap().unwrap();
        assert_eq!(loaded.permission_ids, BTreeSet::from([b]));

        let clash = Role::new("registrar", "", BTreeSet::new(), false);
        assert!(matches!(store.insert_role(&clash), Err(StoreError::Conflict(_))));
        assert_eq!(store.list_roles().unwrap().len(), 1);
    }

    #[test]
    fn test_users_by_email() {
        let (_dir, store) = open();
        let mut alice = user("alice@school.edu");
        store.insert_user(&alice).unwrap();

        assert!(matches!(
            store.insert_user(&user("alice@school.edu")),
            Err(StoreError::Conflict(_))
        ));

        let by_email = store.find_user_by_email("alice@school.edu").unwrap().unwrap();
        assert_eq!(by_email.id, alice.id);

        alice.email = "alice.k@school.edu".to_string();
        store.update_user(&alice).unwrap();
        assert!(store.find_user_by_email("alice@school.edu").unwrap().is_none());
        assert!(store.find_user_by_email("alice.k@school.edu").unwrap().is_some());

        let bob = user("bob@school.edu");
        store.insert_user(&bob).unwrap();
        let mut stolen = bob.clone();
        stolen.email = "alice.k@school.edu".to_string();
        assert!(matches!(store.update_user(&stolen), Err(StoreError::Conflict(_))));
        assert_eq!(store.list_users().unwrap().len(), 2);
    }

    #[test]
    fn test_email_change_from_stale_copy() {
        let (_dir, store) = open();
        let alice = user("alice@school.edu");
        store.insert_user(&alice).unwrap();

        let mut first = alice.clone();
        first.email = "alice.k@school.edu".to_string();
        store.update_user(&first).unwrap();

        // Still holds the original email; the stored one is what gets released.
        let mut stale = alice.clone();
        stale.email = "a.kim@school.edu".to_string();
        store.update_user(&stale).unwrap();

        assert!(store.find_user_by_email("alice@school.edu").unwrap().is_none());
        assert!(store.find_user_by_email("alice.k@school.edu").unwrap().is_none());
        assert_eq!(
            store.find_user_by_email("a.kim@school.edu").unwrap().unwrap().id,
            alice.id
        );
    }

    #[test]
    fn test_concurrent_email_changes_leave_one_index() {
        let (_dir, store) = open();
        let alice = user("alice@school.edu");
        store.insert_user(&alice).unwrap();

        std::thread::scope(|scope| {
            for writer in 0..2 {
                let store = &store;
                let alice = &alice;
                scope.spawn(move || {
                    for i in 0..20 {
                        let mut copy = alice.clone();
                        copy.email = format!("alice.{writer}.{i}@school.edu");
                        store.update_user(&copy).unwrap();
                    }
                });
            }
        });

        let stored = store.get_user(&alice.id).unwrap().unwrap();
        let indexes: Vec<_> = store
            .users
            .scan_prefix(b"idx:email:")
            .map(|entry| entry.unwrap().0)
            .collect();

        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].as_ref(), email_index(&stored.email).as_bytes());
    }

    #[test]
    fn test_sequences() {
        let (_dir, store) = open();
        assert_eq!(store.next_sequence("student:2024:CSE").unwrap(), 1);
        assert_eq!(store.next_sequence("student:2024:CSE").unwrap(), 2);
        assert_eq!(store.next_sequence("student:2024:MTH").unwrap(), 1);
    }

    #[test]
    fn test_data_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let key = PermissionKey::new("reports", "view").unwrap();

        {
            let store = SledStore::open(temp_dir.path()).unwrap();
            store.insert_permission(&Permission::new(key.clone(), "")).unwrap();
        }

        let store = SledStore::open(temp_dir.path()).unwrap();
        assert!(store.find_permission(&key).unwrap().is_some());
    }
}
