//! Draft database bootstrap.
//!
//! The intake workflow persists in-progress forms in a local `SQLite` file so
//! a draft survives process restarts. Table creation uses `SeaORM`'s
//! `Schema::create_table_from_entity`, keeping the schema in lockstep with the
//! entity definitions without hand-written SQL.

use crate::entities::Draft;
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};

/// Default location of the draft store when `DATABASE_URL` is unset.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/stockdesk.sqlite";

/// Gets the draft database URL from the `DATABASE_URL` environment variable,
/// falling back to the default local `SQLite` file.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the draft database.
///
/// # Errors
/// Returns an error if the connection cannot be opened.
pub async fn create_connection() -> Result<DatabaseConnection> {
    Database::connect(get_database_url())
        .await
        .map_err(Into::into)
}

/// Creates the draft table if the database is fresh.
///
/// # Errors
/// Returns an error if the schema statement fails to execute.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut draft_table = schema.create_table_from_entity(Draft);
    draft_table.if_not_exists();
    db.execute(builder.build(&draft_table)).await?;

    Ok(())
}
