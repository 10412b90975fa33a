use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;

use super::connection::establish_connection;

/// In-memory SQLite database with every migration applied.
pub async fn setup_test_db() -> DatabaseConnection {
    let db = establish_connection("sqlite::memory:")
        .await
        .expect("Failed to connect to test database");

    crate::database::migrations::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}
