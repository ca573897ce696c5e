pub use sea_orm_migration::prelude::*;

mod m20261001_000000_bootstrap;
mod m20261001_000001_create_enrich;
mod m20261001_000002_create_buckets;
mod m20261001_000003_create_analyzers;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000000_bootstrap::Migration),
            Box::new(m20261001_000001_create_enrich::Migration),
            Box::new(m20261001_000002_create_buckets::Migration),
            Box::new(m20261001_000003_create_analyzers::Migration),
        ]
    }
}

/// Keep `updated_at` current on every UPDATE of `table`
pub(crate) async fn add_touch_trigger(manager: &SchemaManager<'_>, table: &str) -> Result<(), DbErr> {
    manager
        .get_connection()
        .execute_unprepared(&format!(
            "CREATE TRIGGER {table}_touch_updated_at \
             BEFORE UPDATE ON {table} \
             FOR EACH ROW EXECUTE FUNCTION util.touch_updated_at()"
        ))
        .await?;
    Ok(())
}

pub(crate) async fn drop_touch_trigger(manager: &SchemaManager<'_>, table: &str) -> Result<(), DbErr> {
    manager
        .get_connection()
        .execute_unprepared(&format!(
            "DROP TRIGGER IF EXISTS {table}_touch_updated_at ON {table}"
        ))
        .await?;
    Ok(())
}
