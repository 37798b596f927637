//! Credential record management commands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use medgate_auth::{CredentialRecord, Role, SledCredentialStore};
use medgate_core::normalize_identifier;

use crate::ui;

/// Arguments for user commands.
pub struct UsersArgs {
    /// The action to perform.
    pub action: UsersAction,
    /// Credential database directory.
    pub data_dir: PathBuf,
}

/// User actions.
pub enum UsersAction {
    /// Add a record.
    Add {
        email: String,
        password: String,
        role: String,
    },
    /// List all records.
    List,
    /// Remove a record.
    Remove { email: String },
}

/// Run a user command against the sled credential store.
///
/// # Errors
///
/// Returns error if the store cannot be opened or the operation fails.
pub async fn run_users(args: UsersArgs) -> Result<()> {
    std::fs::create_dir_all(&args.data_dir)?;
    let store = SledCredentialStore::open(&args.data_dir)
        .with_context(|| format!("Failed to open credential store at {}", args.data_dir.display()))?;

    match args.action {
        UsersAction::Add {
            email,
            password,
            role,
        } => add_user(&store, &email, password, &role).await,
        UsersAction::List => list_users(&store),
        UsersAction::Remove { email } => remove_user(&store, &email),
    }
}

async fn add_user(
    store: &SledCredentialStore,
    email: &str,
    password: String,
    role: &str,
) -> Result<()> {
    let role: Role = role
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid role: {role}. Use: ADMIN or USER"))?;

    let email = email.to_string();
    let record = tokio::task::spawn_blocking(move || CredentialRecord::new(&email, &password, role))
        .await?
        .context("Failed to create record")?;

    store.create(&record).context("Failed to save record")?;

    ui::success(&format!(
        "Added '{}' with role {}",
        record.identifier, record.role
    ));

    Ok(())
}

fn list_users(store: &SledCredentialStore) -> Result<()> {
    let records = store.list().context("Failed to list records")?;

    if records.is_empty() {
        ui::info("No credential records.");
        ui::info("Run 'medgate users add --email <email> --password <password>' to add one.");
        return Ok(());
    }

    ui::info(&format!("Records ({}):", records.len()));
    println!();
    println!("{:<40} {:<8} {:<20}", "EMAIL", "ROLE", "CREATED");
    println!("{}", "-".repeat(68));

    for record in records {
        let created = record.created_at.format("%Y-%m-%d %H:%M:%S");
        println!(
            "{:<40} {:<8} {:<20}",
            record.identifier, record.role, created
        );
    }

    Ok(())
}

fn remove_user(store: &SledCredentialStore, email: &str) -> Result<()> {
    let identifier = normalize_identifier(email).context("Invalid email")?;

    if store.remove(&identifier).context("Failed to remove record")? {
        ui::success(&format!("Removed '{identifier}'"));
    } else {
        ui::warning(&format!("No record for '{identifier}'"));
    }

    Ok(())
}
