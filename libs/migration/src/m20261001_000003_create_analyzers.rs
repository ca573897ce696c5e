use sea_orm_migration::{prelude::*, schema::*};

use crate::{add_touch_trigger, drop_touch_trigger};

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Columns shared by analyzers and both filter kinds
fn definition_table(table: impl IntoIden) -> TableCreateStatement {
    Table::create()
        .table(table)
        .if_not_exists()
        .col(
            ColumnDef::new(Definition::Id)
                .big_integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(string(Definition::Name))
        .col(text_null(Definition::Description))
        .col(text_null(Definition::JsonConfig))
        .col(timestamp_with_time_zone(Definition::CreatedAt).default(Expr::current_timestamp()))
        .col(timestamp_with_time_zone(Definition::UpdatedAt).default(Expr::current_timestamp()))
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                definition_table(Analyzer::Table)
                    .col(string(Analyzer::Type).default("custom"))
                    .to_owned(),
            )
            .await?;

        manager.create_table(definition_table(TokenFilter::Table)).await?;
        manager.create_table(definition_table(CharFilter::Table)).await?;

        manager
            .create_table(
                Table::create()
                    .table(AnalyzerTokenFilter::Table)
                    .if_not_exists()
                    .col(big_integer(AnalyzerTokenFilter::AnalyzerId))
                    .col(big_integer(AnalyzerTokenFilter::TokenFilterId))
                    .col(double(AnalyzerTokenFilter::Weight).default(0.0))
                    .primary_key(
                        Index::create()
                            .col(AnalyzerTokenFilter::AnalyzerId)
                            .col(AnalyzerTokenFilter::TokenFilterId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_analyzer_token_filter_analyzer_id")
                            .from(AnalyzerTokenFilter::Table, AnalyzerTokenFilter::AnalyzerId)
                            .to(Analyzer::Table, Definition::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_analyzer_token_filter_token_filter_id")
                            .from(AnalyzerTokenFilter::Table, AnalyzerTokenFilter::TokenFilterId)
                            .to(TokenFilter::Table, Definition::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AnalyzerCharFilter::Table)
                    .if_not_exists()
                    .col(big_integer(AnalyzerCharFilter::AnalyzerId))
                    .col(big_integer(AnalyzerCharFilter::CharFilterId))
                    .col(double(AnalyzerCharFilter::Weight).default(0.0))
                    .primary_key(
                        Index::create()
                            .col(AnalyzerCharFilter::AnalyzerId)
                            .col(AnalyzerCharFilter::CharFilterId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_analyzer_char_filter_analyzer_id")
                            .from(AnalyzerCharFilter::Table, AnalyzerCharFilter::AnalyzerId)
                            .to(Analyzer::Table, Definition::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_analyzer_char_filter_char_filter_id")
                            .from(AnalyzerCharFilter::Table, AnalyzerCharFilter::CharFilterId)
                            .to(CharFilter::Table, Definition::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_analyzer_token_filter_token_filter_id")
                    .table(AnalyzerTokenFilter::Table)
                    .col(AnalyzerTokenFilter::TokenFilterId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_analyzer_char_filter_char_filter_id")
                    .table(AnalyzerCharFilter::Table)
                    .col(AnalyzerCharFilter::CharFilterId)
                    .to_owned(),
            )
            .await?;

        for table in ["analyzer", "token_filter", "char_filter"] {
            add_touch_trigger(manager, table).await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in ["char_filter", "token_filter", "analyzer"] {
            drop_touch_trigger(manager, table).await?;
        }

        manager
            .drop_table(Table::drop().table(AnalyzerCharFilter::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(AnalyzerTokenFilter::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(CharFilter::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(TokenFilter::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Analyzer::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Definition {
    Id,
    Name,
    Description,
    JsonConfig,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Analyzer {
    Table,
    Type,
}

#[derive(DeriveIden)]
enum TokenFilter {
    Table,
}

#[derive(DeriveIden)]
enum CharFilter {
    Table,
}

#[derive(DeriveIden)]
enum AnalyzerTokenFilter {
    Table,
    AnalyzerId,
    TokenFilterId,
    Weight,
}

#[derive(DeriveIden)]
enum AnalyzerCharFilter {
    Table,
    AnalyzerId,
    CharFilterId,
    Weight,
}
