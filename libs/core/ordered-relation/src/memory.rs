use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{RelationError, RelationResult};
use crate::manager::OrderedRelation;
use crate::model::{MemberWeight, Membership, Placement};
use crate::weights;

#[derive(Debug, Default)]
struct RelationState {
    owners: HashSet<i64>,
    members: HashSet<i64>,
    weights: HashMap<i64, BTreeMap<i64, f64>>,
}

impl RelationState {
    fn sorted(&self, owner_id: i64) -> Vec<Membership> {
        let mut memberships: Vec<Membership> = self
            .weights
            .get(&owner_id)
            .map(|set| {
                set.iter()
                    .map(|(member_id, weight)| Membership {
                        owner_id,
                        member_id: *member_id,
                        weight: *weight,
                    })
                    .collect()
            })
            .unwrap_or_default();
        weights::sort_memberships(&mut memberships);
        memberships
    }

    fn require_owner(&self, owner_id: i64) -> RelationResult<()> {
        if self.owners.contains(&owner_id) {
            Ok(())
        } else {
            Err(RelationError::OwnerNotFound(owner_id))
        }
    }

    fn require_member(&self, member_id: i64) -> RelationResult<()> {
        if self.members.contains(&member_id) {
            Ok(())
        } else {
            Err(RelationError::MemberNotFound(member_id))
        }
    }
}

/// In-memory implementation of OrderedRelation (for development/testing).
///
/// Owners and members must be registered before they can be bound; the
/// domain repositories do this as they create and delete entities. A single
/// write lock serialises all mutations.
#[derive(Debug, Default, Clone)]
pub struct InMemoryOrderedRelation {
    state: Arc<RwLock<RelationState>>,
}

impl InMemoryOrderedRelation {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_owner(&self, owner_id: i64) {
        self.state.write().await.owners.insert(owner_id);
    }

    pub async fn register_member(&self, member_id: i64) {
        self.state.write().await.members.insert(member_id);
    }

    /// Forget an owner and cascade to its memberships
    pub async fn unregister_owner(&self, owner_id: i64) {
        let mut state = self.state.write().await;
        state.owners.remove(&owner_id);
        state.weights.remove(&owner_id);
    }

    /// Forget a member, returning the owners it was detached from.
    ///
    /// When the member is still bound and `detach` is false nothing changes
    /// and the binding owners come back as `Err`. The check and the removal
    /// happen under one write lock.
    pub async fn unregister_member(&self, member_id: i64, detach: bool) -> Result<Vec<i64>, Vec<i64>> {
        let mut state = self.state.write().await;
        let mut owners: Vec<i64> = state
            .weights
            .iter()
            .filter(|(_, set)| set.contains_key(&member_id))
            .map(|(owner_id, _)| *owner_id)
            .collect();
        owners.sort_unstable();

        if !owners.is_empty() && !detach {
            return Err(owners);
        }

        state.members.remove(&member_id);
        for set in state.weights.values_mut() {
            set.remove(&member_id);
        }
        Ok(owners)
    }

    pub async fn has_member(&self, member_id: i64) -> bool {
        self.state.read().await.members.contains(&member_id)
    }
}

#[async_trait]
impl OrderedRelation for InMemoryOrderedRelation {
    async fn add_member(
        &self,
        owner_id: i64,
        member_id: i64,
        placement: Placement,
    ) -> RelationResult<Vec<Membership>> {
        let mut state = self.state.write().await;
        state.require_owner(owner_id)?;
        state.require_member(member_id)?;

        let set = state.weights.entry(owner_id).or_default();
        if set.contains_key(&member_id) {
            return Err(RelationError::AlreadyExists {
                owner_id,
                member_id,
            });
        }

        let current: Vec<f64> = set.values().copied().collect();
        let weight = weights::next_weight(&current, placement);
        set.insert(member_id, weight);

        tracing::info!(owner_id, member_id, weight, %placement, "Added member");
        Ok(state.sorted(owner_id))
    }

    async fn remove_member(&self, owner_id: i64, member_id: i64) -> RelationResult<Vec<Membership>> {
        let mut state = self.state.write().await;
        state.require_owner(owner_id)?;

        let removed = state
            .weights
            .get_mut(&owner_id)
            .and_then(|set| set.remove(&member_id));
        if removed.is_none() {
            return Err(RelationError::NotFound {
                owner_id,
                member_id,
            });
        }

        tracing::info!(owner_id, member_id, "Removed member");
        Ok(state.sorted(owner_id))
    }

    async fn reorder(&self, owner_id: i64, member_ids: Vec<i64>) -> RelationResult<Vec<Membership>> {
        let mut state = self.state.write().await;
        state.require_owner(owner_id)?;

        if let Some(set) = state.weights.get_mut(&owner_id) {
            let current: Vec<i64> = set.keys().copied().collect();
            for (member_id, weight) in weights::plan_reorder(&current, &member_ids) {
                set.insert(member_id, weight);
            }
        }

        tracing::info!(owner_id, requested = member_ids.len(), "Reordered members");
        Ok(state.sorted(owner_id))
    }

    async fn replace_set(
        &self,
        owner_id: i64,
        members: Vec<MemberWeight>,
        partial: bool,
    ) -> RelationResult<Vec<Membership>> {
        let mut state = self.state.write().await;
        state.require_owner(owner_id)?;
        for mw in &members {
            state.require_member(mw.member_id)?;
        }

        let current: Vec<i64> = state
            .weights
            .get(&owner_id)
            .map(|set| set.keys().copied().collect())
            .unwrap_or_default();
        let plan = weights::plan_replace(&current, &members, partial)?;

        if !plan.is_noop() {
            let set = state.weights.entry(owner_id).or_default();
            for member_id in &plan.remove {
                set.remove(member_id);
            }
            for mw in &plan.upsert {
                set.insert(mw.member_id, mw.weight);
            }
            tracing::info!(
                owner_id,
                removed = plan.remove.len(),
                upserted = plan.upsert.len(),
                partial,
                "Replaced member set"
            );
        }

        Ok(state.sorted(owner_id))
    }

    async fn members(&self, owner_id: i64) -> RelationResult<Vec<Membership>> {
        Ok(self.state.read().await.sorted(owner_id))
    }

    async fn first_member(&self, owner_id: i64) -> RelationResult<Option<Membership>> {
        Ok(self.state.read().await.sorted(owner_id).into_iter().next())
    }

    async fn next_member(
        &self,
        owner_id: i64,
        member_id: i64,
    ) -> RelationResult<Option<Membership>> {
        let sorted = self.state.read().await.sorted(owner_id);
        Ok(weights::next_after(&sorted, member_id))
    }

    async fn owners_of(&self, member_id: i64) -> RelationResult<Vec<i64>> {
        let state = self.state.read().await;
        let mut owners: Vec<i64> = state
            .weights
            .iter()
            .filter(|(_, set)| set.contains_key(&member_id))
            .map(|(owner_id, _)| *owner_id)
            .collect();
        owners.sort_unstable();
        Ok(owners)
    }

    async fn detach_member(&self, member_id: i64) -> RelationResult<Vec<i64>> {
        let mut state = self.state.write().await;
        let mut affected: Vec<i64> = state
            .weights
            .iter_mut()
            .filter_map(|(owner_id, set)| set.remove(&member_id).map(|_| *owner_id))
            .collect();
        affected.sort_unstable();

        tracing::info!(member_id, owners = affected.len(), "Detached member");
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn relation_with(owner_id: i64, members: &[i64]) -> InMemoryOrderedRelation {
        let relation = InMemoryOrderedRelation::new();
        relation.register_owner(owner_id).await;
        for member_id in members {
            relation.register_member(*member_id).await;
        }
        relation
    }

    fn ids(memberships: &[Membership]) -> Vec<i64> {
        memberships.iter().map(|m| m.member_id).collect()
    }

    #[tokio::test]
    async fn test_tail_inserts_keep_call_order() {
        let relation = relation_with(1, &[10, 20, 30]).await;
        for member_id in [20, 10, 30] {
            relation.add_member(1, member_id, Placement::Tail).await.unwrap();
        }

        let members = relation.members(1).await.unwrap();
        assert_eq!(ids(&members), vec![20, 10, 30]);
        assert!(members.windows(2).all(|w| w[0].weight < w[1].weight));
    }

    #[tokio::test]
    async fn test_head_inserts_reverse_call_order() {
        let relation = relation_with(1, &[10, 20, 30]).await;
        for member_id in [10, 20, 30] {
            relation.add_member(1, member_id, Placement::Head).await.unwrap();
        }

        let members = relation.members(1).await.unwrap();
        assert_eq!(ids(&members), vec![30, 20, 10]);
    }

    #[tokio::test]
    async fn test_add_existing_pair_is_rejected() {
        let relation = relation_with(1, &[10]).await;
        relation.add_member(1, 10, Placement::Tail).await.unwrap();

        let err = relation.add_member(1, 10, Placement::Head).await.unwrap_err();
        assert!(matches!(err, RelationError::AlreadyExists { owner_id: 1, member_id: 10 }));
        assert_eq!(relation.members(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_requires_owner_and_member() {
        let relation = relation_with(1, &[10]).await;

        let err = relation.add_member(2, 10, Placement::Tail).await.unwrap_err();
        assert!(matches!(err, RelationError::OwnerNotFound(2)));

        let err = relation.add_member(1, 99, Placement::Tail).await.unwrap_err();
        assert!(matches!(err, RelationError::MemberNotFound(99)));
    }

    #[tokio::test]
    async fn test_remove_missing_pair() {
        let relation = relation_with(1, &[10, 20]).await;
        relation.add_member(1, 10, Placement::Tail).await.unwrap();

        let err = relation.remove_member(1, 20).await.unwrap_err();
        assert!(matches!(err, RelationError::NotFound { owner_id: 1, member_id: 20 }));
        assert_eq!(ids(&relation.members(1).await.unwrap()), vec![10]);
    }

    #[tokio::test]
    async fn test_reorder_assigns_indices() {
        let relation = relation_with(1, &[1, 2, 3]).await;
        for member_id in [1, 2, 3] {
            relation.add_member(1, member_id, Placement::Tail).await.unwrap();
        }

        let members = relation.reorder(1, vec![3, 1, 2]).await.unwrap();
        assert_eq!(ids(&members), vec![3, 1, 2]);
        let weights: Vec<f64> = members.iter().map(|m| m.weight).collect();
        assert_eq!(weights, vec![0.0, 1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_reorder_repeated_id_moves_to_last_position() {
        let relation = relation_with(1, &[1, 2]).await;
        relation.add_member(1, 1, Placement::Tail).await.unwrap();
        relation.add_member(1, 2, Placement::Tail).await.unwrap();

        let members = relation.reorder(1, vec![1, 2, 1]).await.unwrap();
        assert_eq!(ids(&members), vec![2, 1]);
        let weights: Vec<f64> = members.iter().map(|m| m.weight).collect();
        assert_eq!(weights, vec![1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_reorder_unknown_owner() {
        let relation = InMemoryOrderedRelation::new();
        let err = relation.reorder(5, vec![1]).await.unwrap_err();
        assert!(matches!(err, RelationError::OwnerNotFound(5)));
    }

    #[tokio::test]
    async fn test_replace_set_with_empty_input() {
        let relation = relation_with(1, &[10, 20]).await;
        relation
            .replace_set(1, vec![MemberWeight::new(10, 0.0), MemberWeight::new(20, 1.0)], false)
            .await
            .unwrap();

        let untouched = relation.replace_set(1, vec![], true).await.unwrap();
        assert_eq!(untouched.len(), 2);

        let cleared = relation.replace_set(1, vec![], false).await.unwrap();
        assert!(cleared.is_empty());
    }

    #[tokio::test]
    async fn test_replace_set_unknown_member_changes_nothing() {
        let relation = relation_with(1, &[10]).await;
        relation.add_member(1, 10, Placement::Tail).await.unwrap();

        let err = relation
            .replace_set(1, vec![MemberWeight::new(77, 0.0)], false)
            .await
            .unwrap_err();
        assert!(matches!(err, RelationError::MemberNotFound(77)));
        assert_eq!(ids(&relation.members(1).await.unwrap()), vec![10]);
    }

    #[tokio::test]
    async fn test_owner_cascade_leaves_empty_set() {
        let relation = relation_with(1, &[10]).await;
        relation.add_member(1, 10, Placement::Tail).await.unwrap();

        relation.unregister_owner(1).await;

        assert!(relation.members(1).await.unwrap().is_empty());
        assert!(relation.owners_of(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_detach_member_from_every_owner() {
        let relation = relation_with(1, &[10, 20]).await;
        relation.register_owner(2).await;
        relation.add_member(1, 10, Placement::Tail).await.unwrap();
        relation.add_member(2, 10, Placement::Tail).await.unwrap();
        relation.add_member(2, 20, Placement::Tail).await.unwrap();

        assert_eq!(relation.owners_of(10).await.unwrap(), vec![1, 2]);
        assert_eq!(relation.detach_member(10).await.unwrap(), vec![1, 2]);
        assert!(relation.owners_of(10).await.unwrap().is_empty());
        assert_eq!(ids(&relation.members(2).await.unwrap()), vec![20]);
    }

    #[tokio::test]
    async fn test_first_and_next_member() {
        let relation = relation_with(1, &[10, 20]).await;
        assert!(relation.first_member(1).await.unwrap().is_none());

        relation.add_member(1, 10, Placement::Tail).await.unwrap();
        relation.add_member(1, 20, Placement::Head).await.unwrap();

        assert_eq!(relation.first_member(1).await.unwrap().map(|m| m.member_id), Some(20));
        assert_eq!(relation.next_member(1, 20).await.unwrap().map(|m| m.member_id), Some(10));
        assert!(relation.next_member(1, 10).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let relation = relation_with(1, &[10, 20]).await;
        relation.add_member(1, 10, Placement::Tail).await.unwrap();
        relation.add_member(1, 20, Placement::Tail).await.unwrap();

        assert!(relation.clear(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unregister_bound_member_without_detach() {
        let relation = relation_with(1, &[10]).await;
        relation.register_owner(2).await;
        relation.add_member(1, 10, Placement::Tail).await.unwrap();
        relation.add_member(2, 10, Placement::Tail).await.unwrap();

        assert_eq!(relation.unregister_member(10, false).await, Err(vec![1, 2]));
        assert!(relation.has_member(10).await);
        assert_eq!(relation.owners_of(10).await.unwrap(), vec![1, 2]);

        assert_eq!(relation.unregister_member(10, true).await, Ok(vec![1, 2]));
        assert!(!relation.has_member(10).await);
        assert!(relation.members(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unregister_races_with_add_member() {
        let relation = relation_with(1, &[10]).await;

        let adder = relation.clone();
        let add = tokio::spawn(async move { adder.add_member(1, 10, Placement::Tail).await });
        let unregistered = relation.unregister_member(10, false).await;
        let added = add.await.unwrap();

        match unregistered {
            // add won: the bound member is kept
            Err(owners) => {
                assert_eq!(owners, vec![1]);
                assert!(added.is_ok());
                assert_eq!(ids(&relation.members(1).await.unwrap()), vec![10]);
            }
            // unregister won: the add finds no member
            Ok(owners) => {
                assert!(owners.is_empty());
                assert!(matches!(added, Err(RelationError::MemberNotFound(10))));
                assert!(relation.members(1).await.unwrap().is_empty());
            }
        }
    }
}
