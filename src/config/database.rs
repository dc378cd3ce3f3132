//! Database configuration module.
//!
//! This module handles the database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust
//! structs without hand-written DDL. `SQLite` is the default backend; a Postgres
//! URL works the same way.

use crate::entities::{
    Menu, Order, PiHantaran, PiShipment, Role, RoleMenu, Sample, TrackingSample, User,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Default database location when `DATABASE_URL` is not set.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/sample_ledger.sqlite?mode=rwc";

/// Establishes a connection to the database at `database_url`.
///
/// For file-backed `SQLite` URLs the parent directory is created first so a fresh
/// checkout can start without manual setup.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection> {
    if let Some(parent) = sqlite_parent_dir(database_url) {
        std::fs::create_dir_all(parent)?;
    }
    debug!("Connecting to database");
    let db = Database::connect(database_url).await?;
    info!("Database connection established");
    Ok(db)
}

/// Creates all tables that do not exist yet.
///
/// Tables are created parents first so foreign keys resolve on backends that check
/// them at creation time.
#[instrument(skip(db))]
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, Role).await?;
    create_table(db, &schema, User).await?;
    create_table(db, &schema, Menu).await?;
    create_table(db, &schema, RoleMenu).await?;
    create_table(db, &schema, Order).await?;
    create_table(db, &schema, Sample).await?;
    create_table(db, &schema, TrackingSample).await?;
    create_table(db, &schema, PiHantaran).await?;
    create_table(db, &schema, PiShipment).await?;

    info!("Database tables ensured");
    Ok(())
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Directory holding the database file of a `sqlite://` URL, if any.
fn sqlite_parent_dir(database_url: &str) -> Option<&Path> {
    let rest = database_url.strip_prefix("sqlite://")?;
    let file = rest.split('?').next()?;
    if file.is_empty() || file.contains(":memory:") {
        return None;
    }
    Path::new(file)
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
}
