use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use database::pagination::{PageQueryError, PaginationError};
use ordered_relation::RelationError;
use sea_orm::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("Enrich item {0} not found")]
    ItemNotFound(i64),

    #[error("Enrich pipeline {0} not found")]
    PipelineNotFound(i64),

    #[error("Enrich item {item_id} is already part of pipeline {pipeline_id}")]
    AlreadyBound { pipeline_id: i64, item_id: i64 },

    #[error("Enrich item {item_id} is not part of pipeline {pipeline_id}")]
    NotBound { pipeline_id: i64, item_id: i64 },

    #[error("Enrich item {item_id} is used by {pipelines} pipeline(s)")]
    ItemInUse { item_id: i64, pipelines: usize },

    #[error("Weight for enrich item {0} must be a finite number")]
    InvalidWeight(i64),

    #[error(transparent)]
    Pagination(#[from] PaginationError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type EnrichResult<T> = Result<T, EnrichError>;

impl From<RelationError> for EnrichError {
    fn from(err: RelationError) -> Self {
        match err {
            RelationError::OwnerNotFound(id) => EnrichError::PipelineNotFound(id),
            RelationError::MemberNotFound(id) => EnrichError::ItemNotFound(id),
            RelationError::AlreadyExists { owner_id, member_id } => EnrichError::AlreadyBound {
                pipeline_id: owner_id,
                item_id: member_id,
            },
            RelationError::NotFound { owner_id, member_id } => EnrichError::NotBound {
                pipeline_id: owner_id,
                item_id: member_id,
            },
            RelationError::InvalidWeight(id) => EnrichError::InvalidWeight(id),
            RelationError::Internal(msg) => EnrichError::Internal(msg),
        }
    }
}

impl From<DbErr> for EnrichError {
    fn from(err: DbErr) -> Self {
        EnrichError::Internal(format!("Database error: {}", err))
    }
}

impl From<PageQueryError> for EnrichError {
    fn from(err: PageQueryError) -> Self {
        match err {
            PageQueryError::Pagination(err) => EnrichError::Pagination(err),
            PageQueryError::Database(err) => err.into(),
        }
    }
}

impl From<EnrichError> for AppError {
    fn from(err: EnrichError) -> Self {
        match err {
            EnrichError::ItemNotFound(_)
            | EnrichError::PipelineNotFound(_)
            | EnrichError::NotBound { .. } => AppError::NotFound(err.to_string()),
            EnrichError::AlreadyBound { .. } | EnrichError::ItemInUse { .. } => {
                AppError::Conflict(err.to_string())
            }
            EnrichError::InvalidWeight(_) | EnrichError::Pagination(_) => {
                AppError::BadRequest(err.to_string())
            }
            EnrichError::Internal(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for EnrichError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}
