use crate::storage::entity::{
    kpi, kpi_comment, kpi_history, notification, objective, objective_kpi_link,
};
use log::info;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
    Statement,
};
use std::time::Duration;

pub async fn establish_connection(
    db_url: &str,
    max_connections: u32,
) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(db_url.to_owned());
    if is_memory_url(db_url) {
        // every pooled connection would get its own private in-memory database
        opt.max_connections(1).min_connections(1);
    } else {
        opt.max_connections(max_connections.max(1))
            .min_connections(1)
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(1800));
    }
    opt.connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;

    if db.get_database_backend() == sea_orm::DatabaseBackend::Sqlite {
        db.execute(Statement::from_string(
            sea_orm::DatabaseBackend::Sqlite,
            "PRAGMA journal_mode=WAL;".to_string(),
        ))
        .await?;
    }

    create_tables(&db).await?;

    info!("Database connection established and schema initialized.");

    Ok(db)
}

fn is_memory_url(db_url: &str) -> bool {
    db_url.contains(":memory:") || db_url.contains("mode=memory")
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);
    let stmt = builder.build(schema.create_table_from_entity(entity).if_not_exists());
    db.execute(stmt).await?;
    Ok(())
}

async fn create_tables(db: &DatabaseConnection) -> Result<(), DbErr> {
    create_table(db, objective::Entity).await?;
    create_table(db, kpi::Entity).await?;
    create_table(db, objective_kpi_link::Entity).await?;
    create_table(db, kpi_comment::Entity).await?;
    create_table(db, kpi_history::Entity).await?;
    create_table(db, notification::Entity).await?;

    let backend = db.get_database_backend();
    let indexes = [
        // one link per (objective, kpi) pair
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_objective_kpi_links_unique ON objective_kpi_links(objective_id, kpi_id);",
        "CREATE INDEX IF NOT EXISTS idx_objective_kpi_links_kpi ON objective_kpi_links(kpi_id);",
        "CREATE INDEX IF NOT EXISTS idx_objectives_parent ON objectives(parent_id);",
        "CREATE INDEX IF NOT EXISTS idx_kpis_owner_status ON kpis(owner_id, status);",
        "CREATE INDEX IF NOT EXISTS idx_kpi_comments_kpi ON kpi_comments(kpi_id);",
        "CREATE INDEX IF NOT EXISTS idx_kpi_history_kpi ON kpi_history(kpi_id);",
        "CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, is_read);",
    ];
    for sql in indexes {
        db.execute(Statement::from_string(backend, sql.to_string()))
            .await?;
    }

    Ok(())
}

#[cfg(test)]
pub async fn memory_db() -> DatabaseConnection {
    establish_connection("sqlite::memory:", 1)
        .await
        .expect("in-memory sqlite")
}
