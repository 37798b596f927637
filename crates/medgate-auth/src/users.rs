//! Credential records and storage.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use medgate_core::normalize_identifier;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use super::{AuthError, password};

/// Role carried in issued tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Administrative access.
    Admin,
    /// Regular access.
    User,
}

impl Role {
    /// Check if this role has admin privileges.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "ADMIN"),
            Self::User => write!(f, "USER"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Self::Admin),
            "USER" => Ok(Self::User),
            _ => Err(AuthError::InvalidRequest(format!("Unknown role: {s}"))),
        }
    }
}

/// A stored login credential. Only the hash of the secret is kept.
#[derive(Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Normalized login identifier (email).
    pub identifier: String,
    /// Argon2id PHC hash of the secret.
    pub secret_hash: String,
    /// Role granted to tokens issued for this record.
    pub role: Role,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl CredentialRecord {
    /// Build a record, normalizing the identifier and hashing the secret.
    ///
    /// # Errors
    ///
    /// Returns error if the identifier is not a valid email, the secret is
    /// empty, or hashing fails.
    pub fn new(identifier: &str, secret: &str, role: Role) -> Result<Self, AuthError> {
        let identifier =
            normalize_identifier(identifier).map_err(|e| AuthError::InvalidRequest(e.to_string()))?;
        if secret.is_empty() {
            return Err(AuthError::InvalidRequest("Secret is empty".to_string()));
        }

        Ok(Self {
            identifier,
            secret_hash: password::hash(secret)?,
            role,
            created_at: Utc::now(),
        })
    }

    /// Verify a plaintext secret against this record's hash.
    #[must_use]
    pub fn verify_secret(&self, secret: &str) -> bool {
        password::verify(secret, &self.secret_hash)
    }
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("identifier", &self.identifier)
            .field("secret_hash", &"[REDACTED]")
            .field("role", &self.role)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Credential store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend could not be reached or failed an operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be decoded.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// A record with this identifier already exists.
    #[error("Record already exists: {0}")]
    Exists(String),
}

/// Lookup and insertion of credential records.
///
/// Identifiers passed in are already normalized.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Find the record for `identifier`, if any.
    async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<CredentialRecord>, StoreError>;

    /// Insert a new record. Fails with `StoreError::Exists` on duplicates.
    async fn insert(&self, record: CredentialRecord) -> Result<(), StoreError>;

    /// Whether the store holds no records.
    async fn is_empty(&self) -> Result<bool, StoreError>;
}

/// In-memory store, for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    records: RwLock<HashMap<String, CredentialRecord>>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<CredentialRecord>, StoreError> {
        Ok(self.records.read().await.get(identifier).cloned())
    }

    async fn insert(&self, record: CredentialRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.identifier) {
            return Err(StoreError::Exists(record.identifier));
        }
        records.insert(record.identifier.clone(), record);
        Ok(())
    }

    async fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.records.read().await.is_empty())
    }
}

/// Credential store backed by sled.
///
/// Clones share the same database handle.
#[derive(Clone)]
pub struct SledCredentialStore {
    db: sled::Db,
    tree: sled::Tree,
}

impl SledCredentialStore {
    /// Open or create a store in the given directory.
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = sled::open(path.join("credentials.db")).map_err(|e| {
            StoreError::Unavailable(format!("Failed to open credential database: {e}"))
        })?;

        Self::with_db(db)
    }

    /// Create a store on an existing sled database.
    ///
    /// # Errors
    ///
    /// Returns error if the tree cannot be opened.
    pub fn with_db(db: sled::Db) -> Result<Self, StoreError> {
        let tree = db
            .open_tree("credentials")
            .map_err(|e| StoreError::Unavailable(format!("Failed to open credentials tree: {e}")))?;

        Ok(Self { db, tree })
    }

    /// Get the underlying sled database.
    #[must_use]
    pub const fn db(&self) -> &sled::Db {
        &self.db
    }

    /// Count stored records.
    #[must_use]
    pub fn count(&self) -> usize {
        self.tree.len()
    }

    /// Create a new record.
    ///
    /// # Errors
    ///
    /// Returns error if the identifier exists or storage fails.
    pub fn create(&self, record: &CredentialRecord) -> Result<(), StoreError> {
        let value = serde_json::to_vec(record)
            .map_err(|e| StoreError::Corrupt(format!("Serialization error: {e}")))?;

        let previous = self
            .tree
            .compare_and_swap(
                record.identifier.as_bytes(),
                None as Option<&[u8]>,
                Some(value),
            )
            .map_err(|e| StoreError::Unavailable(format!("Insert error: {e}")))?;

        if previous.is_err() {
            return Err(StoreError::Exists(record.identifier.clone()));
        }

        self.tree
            .flush()
            .map_err(|e| StoreError::Unavailable(format!("Flush error: {e}")))?;

        Ok(())
    }

    /// Get a record by normalized identifier.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails or the record cannot be decoded.
    pub fn get(&self, identifier: &str) -> Result<Option<CredentialRecord>, StoreError> {
        match self.tree.get(identifier.as_bytes()) {
            Ok(Some(value)) => {
                let record = serde_json::from_slice(&value)
                    .map_err(|e| StoreError::Corrupt(format!("Deserialization error: {e}")))?;
                Ok(Some(record))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Unavailable(format!("Get error: {e}"))),
        }
    }

    /// Remove a record. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn remove(&self, identifier: &str) -> Result<bool, StoreError> {
        let removed = self
            .tree
            .remove(identifier.as_bytes())
            .map_err(|e| StoreError::Unavailable(format!("Delete error: {e}")))?
            .is_some();

        self.tree
            .flush()
            .map_err(|e| StoreError::Unavailable(format!("Flush error: {e}")))?;

        Ok(removed)
    }

    /// Run a store operation on the blocking pool.
    async fn run_blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Self) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| StoreError::Unavailable(format!("Store task failed: {e}")))?
    }

    /// List all records, ordered by identifier.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn list(&self) -> Result<Vec<CredentialRecord>, StoreError> {
        let mut records = Vec::new();

        for result in self.tree.iter() {
            let (_, value) =
                result.map_err(|e| StoreError::Unavailable(format!("Iter error: {e}")))?;
            let record = serde_json::from_slice(&value)
                .map_err(|e| StoreError::Corrupt(format!("Deserialization error: {e}")))?;
            records.push(record);
        }

        Ok(records)
    }
}

impl std::fmt::Debug for SledCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledCredentialStore")
            .field("records", &self.count())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CredentialStore for SledCredentialStore {
    async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<CredentialRecord>, StoreError> {
        let identifier = identifier.to_string();
        self.run_blocking(move |store| store.get(&identifier)).await
    }

    async fn insert(&self, record: CredentialRecord) -> Result<(), StoreError> {
        self.run_blocking(move |store| store.create(&record)).await
    }

    async fn is_empty(&self) -> Result<bool, StoreError> {
        self.run_blocking(|store| Ok(store.tree.is_empty())).await
    }
}
