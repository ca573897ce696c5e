//! Pure weight planning shared by every backend.
//!
//! Backends load the owner's current memberships, ask these functions what to
//! change, then apply the plan inside their own transaction.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::error::{RelationError, RelationResult};
use crate::model::{MemberWeight, Membership, Placement};

/// Weight for a member inserted at `placement`.
///
/// Tail inserts get `max + 1`, head inserts get `min - 1`. An owner without
/// members uses 0.0 as both bounds.
pub fn next_weight(current: &[f64], placement: Placement) -> f64 {
    match placement {
        Placement::Tail => current.iter().copied().reduce(f64::max).unwrap_or(0.0) + 1.0,
        Placement::Head => current.iter().copied().reduce(f64::min).unwrap_or(0.0) - 1.0,
    }
}

/// Traversal order: ascending weight, then ascending member id.
pub fn traversal_order(a: &Membership, b: &Membership) -> Ordering {
    a.weight
        .total_cmp(&b.weight)
        .then_with(|| a.member_id.cmp(&b.member_id))
}

pub fn sort_memberships(memberships: &mut [Membership]) {
    memberships.sort_by(traversal_order);
}

/// Member that follows `member_id` in traversal order, if any.
pub fn next_after(sorted: &[Membership], member_id: i64) -> Option<Membership> {
    let position = sorted.iter().position(|m| m.member_id == member_id)?;
    sorted.get(position + 1).copied()
}

/// New weights for a reorder request.
///
/// Every occurrence of a current member consumes the next index, so a repeated
/// id ends up at its last position. Ids that are not current members are
/// skipped without consuming an index. The plan lists each member once, in
/// ascending new weight.
pub fn plan_reorder(current_members: &[i64], requested: &[i64]) -> Vec<(i64, f64)> {
    let members: HashSet<i64> = current_members.iter().copied().collect();
    let mut assigned: HashMap<i64, f64> = HashMap::new();

    for (index, id) in requested
        .iter()
        .copied()
        .filter(|id| members.contains(id))
        .enumerate()
    {
        assigned.insert(id, index as f64);
    }

    let mut plan: Vec<(i64, f64)> = assigned.into_iter().collect();
    plan.sort_by(|a, b| a.1.total_cmp(&b.1));
    plan
}

/// Changes needed to turn the current member set into the requested one
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplacePlan {
    pub remove: Vec<i64>,
    pub upsert: Vec<MemberWeight>,
}

impl ReplacePlan {
    pub fn is_noop(&self) -> bool {
        self.remove.is_empty() && self.upsert.is_empty()
    }
}

/// Plan a replace-set.
///
/// An empty request leaves a partial update untouched and clears the owner on
/// a full update. Otherwise members missing from the request are removed and
/// every requested pair is upserted; for a repeated member id the last weight
/// wins.
pub fn plan_replace(
    current_members: &[i64],
    desired: &[MemberWeight],
    partial: bool,
) -> RelationResult<ReplacePlan> {
    if let Some(bad) = desired.iter().find(|mw| !mw.weight.is_finite()) {
        return Err(RelationError::InvalidWeight(bad.member_id));
    }

    if desired.is_empty() {
        if partial {
            return Ok(ReplacePlan::default());
        }
        return Ok(ReplacePlan {
            remove: current_members.to_vec(),
            upsert: Vec::new(),
        });
    }

    let mut order = Vec::with_capacity(desired.len());
    let mut weights: HashMap<i64, f64> = HashMap::with_capacity(desired.len());
    for mw in desired {
        if weights.insert(mw.member_id, mw.weight).is_none() {
            order.push(mw.member_id);
        }
    }

    let remove = current_members
        .iter()
        .copied()
        .filter(|id| !weights.contains_key(id))
        .collect();

    let upsert = order
        .into_iter()
        .filter_map(|id| weights.get(&id).map(|w| MemberWeight::new(id, *w)))
        .collect();

    Ok(ReplacePlan { remove, upsert })
}
