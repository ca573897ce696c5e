use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use database::pagination::{PageQueryError, PaginationError};
use ordered_relation::RelationError;
use sea_orm::DbErr;
use thiserror::Error;

use crate::models::FilterKind;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("Analyzer {0} not found")]
    AnalyzerNotFound(i64),

    #[error("{} {id} not found", .kind.label())]
    FilterNotFound { kind: FilterKind, id: i64 },

    #[error("{} {filter_id} is already part of analyzer {analyzer_id}", .kind.label())]
    AlreadyBound {
        kind: FilterKind,
        analyzer_id: i64,
        filter_id: i64,
    },

    #[error("{} {filter_id} is not part of analyzer {analyzer_id}", .kind.label())]
    NotBound {
        kind: FilterKind,
        analyzer_id: i64,
        filter_id: i64,
    },

    #[error("{} {filter_id} is used by {analyzers} analyzer(s)", .kind.label())]
    FilterInUse {
        kind: FilterKind,
        filter_id: i64,
        analyzers: usize,
    },

    #[error("Weight for filter {0} must be a finite number")]
    InvalidWeight(i64),

    #[error(transparent)]
    Pagination(#[from] PaginationError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AnalyzerResult<T> = Result<T, AnalyzerError>;

impl AnalyzerError {
    /// Lift a relation error raised by the `kind` filter set
    pub fn from_relation(kind: FilterKind, err: RelationError) -> Self {
        match err {
            RelationError::OwnerNotFound(id) => AnalyzerError::AnalyzerNotFound(id),
            RelationError::MemberNotFound(id) => AnalyzerError::FilterNotFound { kind, id },
            RelationError::AlreadyExists { owner_id, member_id } => AnalyzerError::AlreadyBound {
                kind,
                analyzer_id: owner_id,
                filter_id: member_id,
            },
            RelationError::NotFound { owner_id, member_id } => AnalyzerError::NotBound {
                kind,
                analyzer_id: owner_id,
                filter_id: member_id,
            },
            RelationError::InvalidWeight(id) => AnalyzerError::InvalidWeight(id),
            RelationError::Internal(msg) => AnalyzerError::Internal(msg),
        }
    }
}

impl From<DbErr> for AnalyzerError {
    fn from(err: DbErr) -> Self {
        AnalyzerError::Internal(format!("Database error: {}", err))
    }
}

impl From<PageQueryError> for AnalyzerError {
    fn from(err: PageQueryError) -> Self {
        match err {
            PageQueryError::Pagination(err) => AnalyzerError::Pagination(err),
            PageQueryError::Database(err) => err.into(),
        }
    }
}

impl From<AnalyzerError> for AppError {
    fn from(err: AnalyzerError) -> Self {
        match err {
            AnalyzerError::AnalyzerNotFound(_)
            | AnalyzerError::FilterNotFound { .. }
            | AnalyzerError::NotBound { .. } => AppError::NotFound(err.to_string()),
            AnalyzerError::AlreadyBound { .. } | AnalyzerError::FilterInUse { .. } => {
                AppError::Conflict(err.to_string())
            }
            AnalyzerError::InvalidWeight(_) | AnalyzerError::Pagination(_) => {
                AppError::BadRequest(err.to_string())
            }
            AnalyzerError::Internal(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for AnalyzerError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}
