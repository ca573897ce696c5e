use sea_orm_migration::sea_query::extension::postgres::Type;
use sea_orm_migration::{prelude::*, schema::*};

use crate::{add_touch_trigger, drop_touch_trigger};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(RetrieveType::Enum)
                    .values([
                        RetrieveType::Match,
                        RetrieveType::Text,
                        RetrieveType::Knn,
                        RetrieveType::Hybrid,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Bucket::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Bucket::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(string(Bucket::Name))
                    .col(text_null(Bucket::Description))
                    .col(
                        ColumnDef::new(Bucket::RetrieveType)
                            .enumeration(
                                RetrieveType::Enum,
                                [
                                    RetrieveType::Match,
                                    RetrieveType::Text,
                                    RetrieveType::Knn,
                                    RetrieveType::Hybrid,
                                ],
                            )
                            .not_null()
                            .default("text"),
                    )
                    .col(boolean(Bucket::RefreshOnSuggestionCategory).default(false))
                    .col(boolean(Bucket::RefreshOnTab).default(false))
                    .col(boolean(Bucket::RefreshOnDate).default(false))
                    .col(boolean(Bucket::RefreshOnQuery).default(false))
                    .col(
                        timestamp_with_time_zone(Bucket::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Bucket::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SuggestionCategory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SuggestionCategory::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(string(SuggestionCategory::Name))
                    .col(text_null(SuggestionCategory::Description))
                    .col(double(SuggestionCategory::Priority).default(0.0))
                    .col(boolean(SuggestionCategory::MultiSelect).default(false))
                    .col(
                        timestamp_with_time_zone(SuggestionCategory::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(SuggestionCategory::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BucketSuggestionCategory::Table)
                    .if_not_exists()
                    .col(big_integer(BucketSuggestionCategory::BucketId))
                    .col(big_integer(BucketSuggestionCategory::SuggestionCategoryId))
                    .col(double(BucketSuggestionCategory::Weight).default(0.0))
                    .primary_key(
                        Index::create()
                            .col(BucketSuggestionCategory::BucketId)
                            .col(BucketSuggestionCategory::SuggestionCategoryId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_bucket_suggestion_category_bucket_id")
                            .from(
                                BucketSuggestionCategory::Table,
                                BucketSuggestionCategory::BucketId,
                            )
                            .to(Bucket::Table, Bucket::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_bucket_suggestion_category_category_id")
                            .from(
                                BucketSuggestionCategory::Table,
                                BucketSuggestionCategory::SuggestionCategoryId,
                            )
                            .to(SuggestionCategory::Table, SuggestionCategory::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_bucket_suggestion_category_category_id")
                    .table(BucketSuggestionCategory::Table)
                    .col(BucketSuggestionCategory::SuggestionCategoryId)
                    .to_owned(),
            )
            .await?;

        add_touch_trigger(manager, "bucket").await?;
        add_touch_trigger(manager, "suggestion_category").await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        drop_touch_trigger(manager, "suggestion_category").await?;
        drop_touch_trigger(manager, "bucket").await?;

        manager
            .drop_table(Table::drop().table(BucketSuggestionCategory::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(SuggestionCategory::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Bucket::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(RetrieveType::Enum).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Bucket {
    Table,
    Id,
    Name,
    Description,
    RetrieveType,
    RefreshOnSuggestionCategory,
    RefreshOnTab,
    RefreshOnDate,
    RefreshOnQuery,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum SuggestionCategory {
    Table,
    Id,
    Name,
    Description,
    Priority,
    MultiSelect,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum BucketSuggestionCategory {
    Table,
    BucketId,
    SuggestionCategoryId,
    Weight,
}

#[derive(DeriveIden)]
enum RetrieveType {
    #[sea_orm(iden = "retrieve_type")]
    Enum,
    #[sea_orm(iden = "match")]
    Match,
    #[sea_orm(iden = "text")]
    Text,
    #[sea_orm(iden = "knn")]
    Knn,
    #[sea_orm(iden = "hybrid")]
    Hybrid,
}
