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
                    .as_enum(EnrichItemType::Enum)
                    .values([
                        EnrichItemType::HttpAsync,
                        EnrichItemType::HttpSync,
                        EnrichItemType::GroovyScript,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_type(
                Type::create()
                    .as_enum(BehaviorMergeType::Enum)
                    .values([BehaviorMergeType::Merge, BehaviorMergeType::Replace])
                    .to_owned(),
            )
            .await?;

        manager
            .create_type(
                Type::create()
                    .as_enum(BehaviorOnError::Enum)
                    .values([
                        BehaviorOnError::Skip,
                        BehaviorOnError::Fail,
                        BehaviorOnError::Reject,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EnrichItem::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EnrichItem::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(string(EnrichItem::Name))
                    .col(text_null(EnrichItem::Description))
                    .col(
                        ColumnDef::new(EnrichItem::Type)
                            .enumeration(
                                EnrichItemType::Enum,
                                [
                                    EnrichItemType::HttpAsync,
                                    EnrichItemType::HttpSync,
                                    EnrichItemType::GroovyScript,
                                ],
                            )
                            .not_null()
                            .default("http_sync"),
                    )
                    .col(string_null(EnrichItem::ServiceName))
                    .col(text_null(EnrichItem::Script))
                    .col(text_null(EnrichItem::JsonConfig))
                    .col(string_null(EnrichItem::JsonPath))
                    .col(
                        ColumnDef::new(EnrichItem::BehaviorMergeType)
                            .enumeration(
                                BehaviorMergeType::Enum,
                                [BehaviorMergeType::Merge, BehaviorMergeType::Replace],
                            )
                            .not_null()
                            .default("merge"),
                    )
                    .col(big_integer(EnrichItem::RequestTimeout).default(5000))
                    .col(
                        ColumnDef::new(EnrichItem::BehaviorOnError)
                            .enumeration(
                                BehaviorOnError::Enum,
                                [
                                    BehaviorOnError::Skip,
                                    BehaviorOnError::Fail,
                                    BehaviorOnError::Reject,
                                ],
                            )
                            .not_null()
                            .default("skip"),
                    )
                    .col(
                        timestamp_with_time_zone(EnrichItem::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(EnrichItem::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EnrichPipeline::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EnrichPipeline::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(string(EnrichPipeline::Name))
                    .col(text_null(EnrichPipeline::Description))
                    .col(
                        timestamp_with_time_zone(EnrichPipeline::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(EnrichPipeline::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Pipeline owns its rows; an item still in use cannot be deleted
        manager
            .create_table(
                Table::create()
                    .table(EnrichPipelineItem::Table)
                    .if_not_exists()
                    .col(big_integer(EnrichPipelineItem::EnrichPipelineId))
                    .col(big_integer(EnrichPipelineItem::EnrichItemId))
                    .col(double(EnrichPipelineItem::Weight).default(0.0))
                    .primary_key(
                        Index::create()
                            .col(EnrichPipelineItem::EnrichPipelineId)
                            .col(EnrichPipelineItem::EnrichItemId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_enrich_pipeline_item_pipeline_id")
                            .from(EnrichPipelineItem::Table, EnrichPipelineItem::EnrichPipelineId)
                            .to(EnrichPipeline::Table, EnrichPipeline::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_enrich_pipeline_item_item_id")
                            .from(EnrichPipelineItem::Table, EnrichPipelineItem::EnrichItemId)
                            .to(EnrichItem::Table, EnrichItem::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_enrich_pipeline_item_item_id")
                    .table(EnrichPipelineItem::Table)
                    .col(EnrichPipelineItem::EnrichItemId)
                    .to_owned(),
            )
            .await?;

        add_touch_trigger(manager, "enrich_item").await?;
        add_touch_trigger(manager, "enrich_pipeline").await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        drop_touch_trigger(manager, "enrich_pipeline").await?;
        drop_touch_trigger(manager, "enrich_item").await?;

        manager
            .drop_table(Table::drop().table(EnrichPipelineItem::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(EnrichPipeline::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(EnrichItem::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(BehaviorOnError::Enum).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(BehaviorMergeType::Enum).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(EnrichItemType::Enum).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum EnrichItem {
    Table,
    Id,
    Name,
    Description,
    Type,
    ServiceName,
    Script,
    JsonConfig,
    JsonPath,
    BehaviorMergeType,
    RequestTimeout,
    BehaviorOnError,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum EnrichPipeline {
    Table,
    Id,
    Name,
    Description,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum EnrichPipelineItem {
    Table,
    EnrichPipelineId,
    EnrichItemId,
    Weight,
}

#[derive(DeriveIden)]
enum EnrichItemType {
    #[sea_orm(iden = "enrich_item_type")]
    Enum,
    #[sea_orm(iden = "http_async")]
    HttpAsync,
    #[sea_orm(iden = "http_sync")]
    HttpSync,
    #[sea_orm(iden = "groovy_script")]
    GroovyScript,
}

#[derive(DeriveIden)]
enum BehaviorMergeType {
    #[sea_orm(iden = "behavior_merge_type")]
    Enum,
    #[sea_orm(iden = "merge")]
    Merge,
    #[sea_orm(iden = "replace")]
    Replace,
}

#[derive(DeriveIden)]
enum BehaviorOnError {
    #[sea_orm(iden = "behavior_on_error")]
    Enum,
    #[sea_orm(iden = "skip")]
    Skip,
    #[sea_orm(iden = "fail")]
    Fail,
    #[sea_orm(iden = "reject")]
    Reject,
}
