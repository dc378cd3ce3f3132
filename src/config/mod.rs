/// Database connection and schema creation
pub mod database;

/// Role and menu seed data from config.toml
pub mod seed;

/// Server settings from environment variables
pub mod server;
