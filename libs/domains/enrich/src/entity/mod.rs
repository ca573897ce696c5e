//! Sea-ORM entities for the enrich tables.
//!
//! `enrich_pipeline_item` has no entity; memberships go through
//! `ordered_relation::postgres`.

pub mod enrich_item;
pub mod enrich_pipeline;
