use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// One (owner, member) association and its sort weight
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Membership {
    pub owner_id: i64,
    pub member_id: i64,
    pub weight: f64,
}

/// A member id with the weight it should carry, as used by replace-set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MemberWeight {
    pub member_id: i64,
    pub weight: f64,
}

impl MemberWeight {
    pub fn new(member_id: i64, weight: f64) -> Self {
        Self { member_id, weight }
    }
}

/// Where a newly added member lands in traversal order
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Placement {
    Head,
    #[default]
    Tail,
}

impl Placement {
    pub fn from_tail(tail: bool) -> Self {
        if tail { Placement::Tail } else { Placement::Head }
    }
}
