use async_trait::async_trait;
use database::pagination::{Connection, PageColumns, PageRequest, paginate_select};
use ordered_relation::{RelationError, RelationTable};
use ordered_relation::postgres::{detach_member_in, lock_owner, owners_of_in};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait,
};

use crate::entity::analyzer;
use crate::error::{AnalyzerError, AnalyzerResult};
use crate::models::{Analyzer, AnalyzerFilter, AnalyzerInput, Filter, FilterInput, FilterKind};
use crate::repository::AnalyzerRepository;

/// `analyzer_token_filter` join table
pub const ANALYZER_TOKEN_FILTER_TABLE: RelationTable = RelationTable {
    table: "analyzer_token_filter",
    owner_column: "analyzer_id",
    member_column: "token_filter_id",
    owner_table: "analyzer",
    member_table: "token_filter",
};

/// `analyzer_char_filter` join table
pub const ANALYZER_CHAR_FILTER_TABLE: RelationTable = RelationTable {
    table: "analyzer_char_filter",
    owner_column: "analyzer_id",
    member_column: "char_filter_id",
    owner_table: "analyzer",
    member_table: "char_filter",
};

pub fn relation_table(kind: FilterKind) -> RelationTable {
    match kind {
        FilterKind::Token => ANALYZER_TOKEN_FILTER_TABLE,
        FilterKind::Char => ANALYZER_CHAR_FILTER_TABLE,
    }
}

/// Runs `$body` with `$table` bound to the entity module of `$kind`
macro_rules! with_filter_table {
    ($kind:expr, $table:ident => $body:expr) => {
        match $kind {
            FilterKind::Token => {
                use crate::entity::token_filter as $table;
                $body
            }
            FilterKind::Char => {
                use crate::entity::char_filter as $table;
                $body
            }
        }
    };
}

fn analyzer_columns() -> PageColumns<analyzer::Column> {
    use analyzer::Column;
    PageColumns {
        id: Column::Id,
        search: vec![Column::Name, Column::AnalyzerType, Column::Description],
        sort: vec![
            ("id", Column::Id),
            ("name", Column::Name),
            ("type", Column::AnalyzerType),
            ("created_at", Column::CreatedAt),
            ("updated_at", Column::UpdatedAt),
        ],
    }
}

/// Page columns of a filter table; both kinds share the column set
macro_rules! filter_columns {
    ($table:ident) => {
        PageColumns {
            id: $table::Column::Id,
            search: vec![$table::Column::Name, $table::Column::Description],
            sort: vec![
                ("id", $table::Column::Id),
                ("name", $table::Column::Name),
                ("created_at", $table::Column::CreatedAt),
                ("updated_at", $table::Column::UpdatedAt),
            ],
        }
    };
}

pub struct PgAnalyzerRepository {
    db: DatabaseConnection,
}

impl PgAnalyzerRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AnalyzerRepository for PgAnalyzerRepository {
    async fn create_analyzer(&self, input: AnalyzerInput) -> AnalyzerResult<Analyzer> {
        let active_model: analyzer::ActiveModel = input.into();
        let model = active_model.insert(&self.db).await?;

        tracing::info!(analyzer_id = model.id, "Created analyzer");
        Ok(model.into())
    }

    async fn get_analyzer(&self, id: i64) -> AnalyzerResult<Option<Analyzer>> {
        let model = analyzer::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Into::into))
    }

    async fn list_analyzers(&self, page: &PageRequest) -> AnalyzerResult<Connection<Analyzer>> {
        let select = analyzer::Entity::find();
        Ok(paginate_select(&self.db, select, &analyzer_columns(), page).await?)
    }

    async fn unbound_analyzers(
        &self,
        kind: FilterKind,
        filter_id: i64,
        page: &PageRequest,
    ) -> AnalyzerResult<Connection<Analyzer>> {
        let select = analyzer::Entity::find().filter(
            analyzer::Column::Id.not_in_subquery(relation_table(kind).owners_of_query(filter_id)),
        );
        Ok(paginate_select(&self.db, select, &analyzer_columns(), page).await?)
    }

    async fn update_analyzer(&self, id: i64, input: AnalyzerInput) -> AnalyzerResult<Analyzer> {
        let txn = self.db.begin().await?;
        lock_owner(&txn, &ANALYZER_TOKEN_FILTER_TABLE, id)
            .await
            .map_err(|e| AnalyzerError::from_relation(FilterKind::Token, e))?;

        let mut active_model: analyzer::ActiveModel = input.into();
        active_model.id = Set(id);
        let model = active_model.update(&txn).await?;
        txn.commit().await?;

        tracing::info!(analyzer_id = id, "Updated analyzer");
        Ok(model.into())
    }

    async fn delete_analyzer(&self, id: i64) -> AnalyzerResult<Analyzer> {
        let txn = self.db.begin().await?;
        let model = analyzer::Entity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(AnalyzerError::AnalyzerNotFound(id))?;

        // both join tables cascade
        analyzer::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        tracing::info!(analyzer_id = id, "Deleted analyzer");
        Ok(model.into())
    }

    async fn create_filter(&self, kind: FilterKind, input: FilterInput) -> AnalyzerResult<Filter> {
        let filter: Filter = with_filter_table!(kind, table => {
            let active_model: table::ActiveModel = input.into();
            active_model.insert(&self.db).await?.into()
        });

        tracing::info!(filter_id = filter.id, %kind, "Created filter");
        Ok(filter)
    }

    async fn get_filter(&self, kind: FilterKind, id: i64) -> AnalyzerResult<Option<Filter>> {
        let filter: Option<Filter> = with_filter_table!(kind, table => {
            table::Entity::find_by_id(id).one(&self.db).await?.map(Filter::from)
        });
        Ok(filter)
    }

    async fn list_filters(
        &self,
        kind: FilterKind,
        page: &PageRequest,
    ) -> AnalyzerResult<Connection<Filter>> {
        let filters: Connection<Filter> = with_filter_table!(kind, table => {
            let select = table::Entity::find();
            paginate_select(&self.db, select, &filter_columns!(table), page).await?
        });
        Ok(filters)
    }

    async fn unbound_filters(
        &self,
        kind: FilterKind,
        analyzer_id: i64,
        page: &PageRequest,
    ) -> AnalyzerResult<Connection<AnalyzerFilter>> {
        let bound = relation_table(kind).members_of_query(analyzer_id);
        let filters: Connection<AnalyzerFilter> = with_filter_table!(kind, table => {
            let select = table::Entity::find().filter(table::Column::Id.not_in_subquery(bound));
            paginate_select(&self.db, select, &filter_columns!(table), page).await?
        });
        Ok(filters)
    }

    async fn get_filters(&self, kind: FilterKind, ids: Vec<i64>) -> AnalyzerResult<Vec<Filter>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let filters: Vec<Filter> = with_filter_table!(kind, table => {
            table::Entity::find()
                .filter(table::Column::Id.is_in(ids))
                .order_by_asc(table::Column::Id)
                .all(&self.db)
                .await?
                .into_iter()
                .map(Filter::from)
                .collect()
        });
        Ok(filters)
    }

    async fn update_filter(
        &self,
        kind: FilterKind,
        id: i64,
        input: FilterInput,
    ) -> AnalyzerResult<Filter> {
        let txn = self.db.begin().await?;
        let filter: Filter = with_filter_table!(kind, table => {
            table::Entity::find_by_id(id)
                .lock_exclusive()
                .one(&txn)
                .await?
                .ok_or(AnalyzerError::FilterNotFound { kind, id })?;

            let mut active_model: table::ActiveModel = input.into();
            active_model.id = Set(id);
            active_model.update(&txn).await?.into()
        });
        txn.commit().await?;

        tracing::info!(filter_id = id, %kind, "Updated filter");
        Ok(filter)
    }

    async fn delete_filter(
        &self,
        kind: FilterKind,
        id: i64,
        detach: bool,
    ) -> AnalyzerResult<(Filter, Vec<i64>)> {
        let relation = relation_table(kind);
        let lift = |e: RelationError| AnalyzerError::from_relation(kind, e);

        let txn = self.db.begin().await?;
        let filter: Filter = with_filter_table!(kind, table => {
            table::Entity::find_by_id(id)
                .lock_exclusive()
                .one(&txn)
                .await?
                .ok_or(AnalyzerError::FilterNotFound { kind, id })?
                .into()
        });

        let analyzers = owners_of_in(&txn, &relation, id).await.map_err(lift)?;
        if !analyzers.is_empty() {
            if !detach {
                return Err(AnalyzerError::FilterInUse {
                    kind,
                    filter_id: id,
                    analyzers: analyzers.len(),
                });
            }
            detach_member_in(&txn, &relation, id).await.map_err(lift)?;
        }

        with_filter_table!(kind, table => {
            table::Entity::delete_by_id(id).exec(&txn).await?;
        });
        txn.commit().await?;

        tracing::info!(filter_id = id, %kind, detached = analyzers.len(), "Deleted filter");
        Ok((filter, analyzers))
    }
}
