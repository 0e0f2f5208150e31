//! Inkwell Server - Setup Entry Point
//!
//! Commands:
//! - `init` (default): load configuration and apply the role table to a fresh
//!   in-memory store, printing the stored rows with their ids as JSON. Nothing
//!   outlives the process, so this is a dry run of the bootstrap.
//! - `roles`: print the effective role table without applying it. Needs only
//!   `ROLES_FILE`, not `SECRET_KEY`.

use anyhow::Result;
use serde_json::json;
use tracing::info;

use inkwell_server::config::{load_role_table, Config};
use inkwell_server::db::MemoryStore;
use inkwell_server::permissions::set_roles;

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkwell_server=info,inkwell=info".into()),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let command = std::env::args().nth(1).unwrap_or_else(|| "init".into());
    match command.as_str() {
        "init" => init(),
        "roles" => print_table(),
        other => anyhow::bail!("Unknown command '{other}' (expected 'init' or 'roles')"),
    }
}

fn init() -> Result<()> {
    let config = Config::from_env()?;
    let table = config.role_table()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        admin_email = config.admin_email.is_some(),
        token_expiry = config.token_expiry,
        "Bootstrapping roles"
    );

    let store = MemoryStore::new();
    let roles = set_roles(&store, &table)?;

    let rows: Vec<_> = roles
        .iter()
        .map(|role| {
            json!({
                "id": role.id,
                "name": role.name,
                "permissions": role.permissions.to_db(),
                "default": role.is_default,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&rows)?);

    info!(count = roles.len(), "Role bootstrap dry run complete");
    Ok(())
}

fn print_table() -> Result<()> {
    let table = load_role_table(Config::roles_file_from_env().as_deref())?;

    let roles: serde_json::Map<String, serde_json::Value> = table
        .roles()
        .iter()
        .map(|(name, perms)| (name.clone(), json!(perms.names())))
        .collect();
    let doc = json!({ "default": table.default_role(), "roles": roles });
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}
