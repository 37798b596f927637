//! Seeding the credential store on first start.

use super::AuthError;
use super::users::{CredentialRecord, CredentialStore, Role};

/// Environment variable naming the seed identifier.
pub const SEED_EMAIL_VAR: &str = "MEDGATE_SEED_EMAIL";
/// Environment variable holding the seed secret.
pub const SEED_PASSWORD_VAR: &str = "MEDGATE_SEED_PASSWORD";
/// Environment variable for the seed role (`ADMIN` or `USER`).
pub const SEED_ROLE_VAR: &str = "MEDGATE_SEED_ROLE";

/// Create a record from `MEDGATE_SEED_*` environment variables if the store
/// is empty.
///
/// Returns the identifier of the record created, if any.
///
/// # Errors
///
/// Returns error if the seed values are invalid or the store fails.
pub async fn seed_from_env(store: &dyn CredentialStore) -> Result<Option<String>, AuthError> {
    seed_from(|key| std::env::var(key).ok(), store).await
}

/// Same as [`seed_from_env`], reading variables through `lookup`.
///
/// # Errors
///
/// Returns error if the seed values are invalid or the store fails.
pub async fn seed_from<F>(lookup: F, store: &dyn CredentialStore) -> Result<Option<String>, AuthError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(email) = lookup(SEED_EMAIL_VAR).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let Some(password) = lookup(SEED_PASSWORD_VAR).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    // Only seed an empty store
    if !store.is_empty().await? {
        tracing::debug!("Credential store not empty, skipping seed");
        return Ok(None);
    }

    let role = match lookup(SEED_ROLE_VAR) {
        Some(r) if !r.is_empty() => r.parse::<Role>()?,
        _ => Role::User,
    };

    let record = tokio::task::spawn_blocking(move || CredentialRecord::new(&email, &password, role))
        .await
        .map_err(|e| AuthError::Internal(format!("Seeding task failed: {e}")))??;
    let identifier = record.identifier.clone();
    store.insert(record).await?;

    tracing::info!(identifier = %identifier, role = %role, "Seeded credential record from environment");

    Ok(Some(identifier))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::users::MemoryCredentialStore;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[tokio::test]
    async fn test_seed_creates_record() {
        let store = MemoryCredentialStore::new();
        let created = seed_from(
            env(&[
                (SEED_EMAIL_VAR, "Admin@Test.com"),
                (SEED_PASSWORD_VAR, "pw123"),
                (SEED_ROLE_VAR, "admin"),
            ]),
            &store,
        )
        .await
        .unwrap();

        assert_eq!(created.as_deref(), Some("admin@test.com"));
        let record = store
            .find_by_identifier("admin@test.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.role, Role::Admin);
        assert!(record.verify_secret("pw123"));
    }

    #[tokio::test]
    async fn test_seed_defaults_to_user_role() {
        let store = MemoryCredentialStore::new();
        seed_from(
            env(&[(SEED_EMAIL_VAR, "u@test.com"), (SEED_PASSWORD_VAR, "pw123")]),
            &store,
        )
        .await
        .unwrap();

        let record = store.find_by_identifier("u@test.com").await.unwrap().unwrap();
        assert_eq!(record.role, Role::User);
    }

    #[tokio::test]
    async fn test_seed_skipped_without_vars() {
        let store = MemoryCredentialStore::new();
        let created = seed_from(env(&[(SEED_EMAIL_VAR, "u@test.com")]), &store)
            .await
            .unwrap();
        assert!(created.is_none());
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_seed_skipped_when_store_populated() {
        let store = MemoryCredentialStore::new();
        store
            .insert(CredentialRecord::new("a@test.com", "pw", Role::Admin).unwrap())
            .await
            .unwrap();

        let created = seed_from(
            env(&[(SEED_EMAIL_VAR, "u@test.com"), (SEED_PASSWORD_VAR, "pw123")]),
            &store,
        )
        .await
        .unwrap();
        assert!(created.is_none());
    }

    #[tokio::test]
    async fn test_seed_rejects_unknown_role() {
        let store = MemoryCredentialStore::new();
        let result = seed_from(
            env(&[
                (SEED_EMAIL_VAR, "u@test.com"),
                (SEED_PASSWORD_VAR, "pw123"),
                (SEED_ROLE_VAR, "root"),
            ]),
            &store,
        )
        .await;
        assert!(matches!(result, Err(AuthError::InvalidRequest(_))));
    }
}
