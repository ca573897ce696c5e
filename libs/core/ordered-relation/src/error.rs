use sea_orm::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelationError {
    #[error("Owner {0} not found")]
    OwnerNotFound(i64),

    #[error("Member {0} not found")]
    MemberNotFound(i64),

    #[error("Member {member_id} is already bound to owner {owner_id}")]
    AlreadyExists { owner_id: i64, member_id: i64 },

    #[error("Member {member_id} is not bound to owner {owner_id}")]
    NotFound { owner_id: i64, member_id: i64 },

    #[error("Weight for member {0} must be a finite number")]
    InvalidWeight(i64),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type RelationResult<T> = Result<T, RelationError>;

impl From<DbErr> for RelationError {
    fn from(err: DbErr) -> Self {
        RelationError::Internal(format!("Database error: {}", err))
    }
}

impl RelationError {
    /// True for the not-found family, which callers report instead of retrying
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RelationError::OwnerNotFound(_)
                | RelationError::MemberNotFound(_)
                | RelationError::NotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_family() {
        assert!(RelationError::OwnerNotFound(1).is_not_found());
        assert!(RelationError::MemberNotFound(1).is_not_found());
        assert!(
            RelationError::NotFound {
                owner_id: 1,
                member_id: 2
            }
            .is_not_found()
        );
        assert!(
            !RelationError::AlreadyExists {
                owner_id: 1,
                member_id: 2
            }
            .is_not_found()
        );
    }

    #[test]
    fn test_db_error_collapses_to_internal() {
        let err: RelationError = DbErr::Custom("connection reset".to_string()).into();
        assert!(matches!(err, RelationError::Internal(ref msg) if msg.contains("connection reset")));
    }
}
