//! Sea-ORM entities for the analyzer tables.
//!
//! Token and char filters share one shape but live in separate tables; the
//! `analyzer_token_filter` and `analyzer_char_filter` join tables go through
//! `ordered_relation::postgres`.

pub mod analyzer;
pub mod char_filter;
pub mod token_filter;
