use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use database::pagination::{PageQueryError, PaginationError};
use ordered_relation::RelationError;
use sea_orm::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BucketError {
    #[error("Bucket {0} not found")]
    BucketNotFound(i64),

    #[error("Suggestion category {0} not found")]
    CategoryNotFound(i64),

    #[error("Suggestion category {category_id} is already part of bucket {bucket_id}")]
    AlreadyBound { bucket_id: i64, category_id: i64 },

    #[error("Suggestion category {category_id} is not part of bucket {bucket_id}")]
    NotBound { bucket_id: i64, category_id: i64 },

    #[error("Suggestion category {category_id} is used by {buckets} bucket(s)")]
    CategoryInUse { category_id: i64, buckets: usize },

    #[error("Weight for suggestion category {0} must be a finite number")]
    InvalidWeight(i64),

    #[error(transparent)]
    Pagination(#[from] PaginationError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type BucketResult<T> = Result<T, BucketError>;

impl From<RelationError> for BucketError {
    fn from(err: RelationError) -> Self {
        match err {
            RelationError::OwnerNotFound(id) => BucketError::BucketNotFound(id),
            RelationError::MemberNotFound(id) => BucketError::CategoryNotFound(id),
            RelationError::AlreadyExists { owner_id, member_id } => BucketError::AlreadyBound {
                bucket_id: owner_id,
                category_id: member_id,
            },
            RelationError::NotFound { owner_id, member_id } => BucketError::NotBound {
                bucket_id: owner_id,
                category_id: member_id,
            },
            RelationError::InvalidWeight(id) => BucketError::InvalidWeight(id),
            RelationError::Internal(msg) => BucketError::Internal(msg),
        }
    }
}

impl From<DbErr> for BucketError {
    fn from(err: DbErr) -> Self {
        BucketError::Internal(format!("Database error: {}", err))
    }
}

impl From<PageQueryError> for BucketError {
    fn from(err: PageQueryError) -> Self {
        match err {
            PageQueryError::Pagination(err) => BucketError::Pagination(err),
            PageQueryError::Database(err) => err.into(),
        }
    }
}

impl From<BucketError> for AppError {
    fn from(err: BucketError) -> Self {
        match err {
            BucketError::BucketNotFound(_)
            | BucketError::CategoryNotFound(_)
            | BucketError::NotBound { .. } => AppError::NotFound(err.to_string()),
            BucketError::AlreadyBound { .. } | BucketError::CategoryInUse { .. } => {
                AppError::Conflict(err.to_string())
            }
            BucketError::InvalidWeight(_) | BucketError::Pagination(_) => {
                AppError::BadRequest(err.to_string())
            }
            BucketError::Internal(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for BucketError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_missing_member_is_a_missing_category() {
        let err: BucketError = RelationError::MemberNotFound(8).into();
        assert_eq!(err.to_string(), "Suggestion category 8 not found");
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_in_use_is_a_conflict() {
        let err = BucketError::CategoryInUse {
            category_id: 1,
            buckets: 3,
        };
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }
}
