use dotenvy::dotenv;
use sample_ledger::{
    api,
    config::{
        database,
        seed::{load_seed_config, seed_admin, seed_from_config},
        server::{ServerConfig, admin_credentials},
    },
    errors::Result,
};
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Server configuration
    let config = ServerConfig::from_env()
        .inspect_err(|e| error!("Failed to load configuration: {e}"))?;
    info!(env = ?config.app_env, "Configuration loaded");

    // 4. Database and schema
    let db = database::connect(&config.database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {e}"))?;
    database::create_tables(&db)
        .await
        .inspect(|()| info!("Database schema ready"))
        .inspect_err(|e| error!("Failed to create tables: {e}"))?;

    // 5. Seed roles and menus, then the first administrator
    if Path::new(&config.seed_config_path).exists() {
        let seed = load_seed_config(&config.seed_config_path)?;
        seed_from_config(&db, &seed)
            .await
            .inspect_err(|e| error!("Failed to apply seed data: {e}"))?;
    } else {
        warn!(path = %config.seed_config_path, "Seed file not found, skipping");
    }
    match admin_credentials() {
        Some((email, password)) => {
            seed_admin(&db, &email, &password).await?;
        }
        None => info!("ADMIN_EMAIL/ADMIN_PASSWORD not set, no administrator seeded"),
    }

    // 6. Serve
    api::serve(config, db).await
}
