use migration::Migrator;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use sea_orm_migration::MigratorTrait;

use crate::error::AppResult;

const FILE_PRAGMAS: &[&str] = &["PRAGMA journal_mode=WAL", "PRAGMA synchronous=NORMAL"];

pub async fn connect_and_migrate(database_url: &str) -> AppResult<DatabaseConnection> {
    let in_memory = database_url.contains(":memory:");

    let mut opts = ConnectOptions::new(database_url.to_string());
    opts.sqlx_logging(false);
    if in_memory {
        // every pooled connection would otherwise get its own empty database
        opts.max_connections(1).min_connections(1);
    }

    let db = Database::connect(opts).await?;

    if !in_memory {
        for pragma in FILE_PRAGMAS {
            db.execute(Statement::from_string(db.get_database_backend(), pragma.to_string()))
                .await?;
        }
    }

    Migrator::up(&db, None).await?;
    tracing::debug!("migrations applied");
    Ok(db)
}
