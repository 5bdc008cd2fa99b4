//! Primary store accessor for the catalog
//!
//! Canonical entity records and live like aggregates, read by the propagation
//! consumers and the reorder service. Writes are limited to the entity
//! deactivation flag; feature rows and violation records are owned by the
//! services that produce them.

mod error;
mod memory;
mod models;
mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryCatalogStore;
pub use models::{EntityMessage, EntityRecord};
pub use store::{CatalogStore, PgCatalogStore, LIKE_PAGE_SIZE};

use sqlx::migrate::Migrator;
use sqlx::PgPool;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Apply the catalog schema migrations.
pub async fn run_migrations(pool: &PgPool) -> std::result::Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await?;
    tracing::info!("Catalog migrations applied");
    Ok(())
}
