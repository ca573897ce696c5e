use async_trait::async_trait;

use crate::error::RelationResult;
use crate::model::{MemberWeight, Membership, Placement};

/// Manager for one owner/member association table.
///
/// Every mutation is atomic and returns the owner's full member set in
/// traversal order. Reads on an unknown owner return an empty set.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait OrderedRelation: Send + Sync {
    /// Bind `member_id` to `owner_id` at the head or tail
    async fn add_member(
        &self,
        owner_id: i64,
        member_id: i64,
        placement: Placement,
    ) -> RelationResult<Vec<Membership>>;

    /// Unbind `member_id` from `owner_id`
    async fn remove_member(&self, owner_id: i64, member_id: i64) -> RelationResult<Vec<Membership>>;

    /// Assign weights 0, 1, 2, ... following `member_ids`
    async fn reorder(&self, owner_id: i64, member_ids: Vec<i64>) -> RelationResult<Vec<Membership>>;

    /// Replace the owner's member set with `members`
    async fn replace_set(
        &self,
        owner_id: i64,
        members: Vec<MemberWeight>,
        partial: bool,
    ) -> RelationResult<Vec<Membership>>;

    /// Current members in traversal order
    async fn members(&self, owner_id: i64) -> RelationResult<Vec<Membership>>;

    async fn first_member(&self, owner_id: i64) -> RelationResult<Option<Membership>>;

    /// Member following `member_id` in traversal order
    async fn next_member(&self, owner_id: i64, member_id: i64)
    -> RelationResult<Option<Membership>>;

    /// Owners that currently contain `member_id`
    async fn owners_of(&self, member_id: i64) -> RelationResult<Vec<i64>>;

    /// Remove `member_id` from every owner, returning the affected owners
    async fn detach_member(&self, member_id: i64) -> RelationResult<Vec<i64>>;

    /// Remove every member of `owner_id`
    async fn clear(&self, owner_id: i64) -> RelationResult<Vec<Membership>> {
        self.replace_set(owner_id, Vec::new(), false).await
    }
}
