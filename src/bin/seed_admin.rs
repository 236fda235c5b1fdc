use tracing_subscriber::EnvFilter;

use plantbased::auth::hash_password;
use plantbased::config::{AdminSeed, DatabaseConfig};
use plantbased::db::{AdminStore, PgConnector};
use plantbased::db_migrate::{MigrationTool, LATEST_SCHEMA_VERSION};

/// Creates the first admin account from `ADMIN_*` variables. Existing accounts are left alone.
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let database = DatabaseConfig::from_env()?;
    let seed = AdminSeed::from_env()?;
    let schema_dir = std::env::var("SCHEMA_DIR").unwrap_or_else(|_| "schema".to_string());

    let db = PgConnector::new(&database.url, database.max_connections).await?;
    MigrationTool::new(schema_dir.into())
        .migrate_to_version(db.pool(), LATEST_SCHEMA_VERSION)
        .await?;

    let password_hash = hash_password(&seed.password)?;
    if db
        .create_admin_if_absent(&seed.email, &password_hash, &seed.full_name)
        .await?
    {
        tracing::info!("Created admin account {}", seed.email);
    } else {
        tracing::info!("Admin account {} already exists, nothing to do", seed.email);
    }
    Ok(())
}
