//! Test support for the datasource crates.
//!
//! - [`TestDatabase`] (feature `postgres`): throwaway PostgreSQL container
//!   with every migration applied
//! - [`TestDataBuilder`]: names scoped to one test, so tests sharing a
//!   database never collide on unique columns
//! - [`assertions`]: ordering checks for member sets
//!
//! ```rust,no_run
//! use test_utils::{TestDataBuilder, TestDatabase};
//!
//! #[tokio::test]
//! async fn pipeline_roundtrip() {
//!     let db = TestDatabase::new().await;
//!     let data = TestDataBuilder::from_test_name("pipeline_roundtrip");
//!
//!     let pipeline_id = db.insert_named("enrich_pipeline", &data.name("pipeline", "main")).await;
//! }
//! ```

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::TestDatabase;

use std::hash::{DefaultHasher, Hash, Hasher};

/// Deterministic entity names derived from a test-specific scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestDataBuilder {
    scope: u64,
}

impl TestDataBuilder {
    pub fn new(scope: u64) -> Self {
        Self { scope }
    }

    /// Scope derived from the test name
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let a = TestDataBuilder::from_test_name("test_add_member");
    /// assert_eq!(a, TestDataBuilder::from_test_name("test_add_member"));
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// `test-{kind}-{scope}-{label}`
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let name = TestDataBuilder::new(7).name("bucket", "web");
    /// assert_eq!(name, "test-bucket-7-web");
    /// ```
    pub fn name(&self, kind: &str, label: &str) -> String {
        format!("test-{}-{}-{}", kind, self.scope, label)
    }

    /// `count` names of one kind, labelled `0..count`
    pub fn names(&self, kind: &str, count: usize) -> Vec<String> {
        (0..count).map(|i| self.name(kind, &i.to_string())).collect()
    }
}

pub mod assertions {
    pub fn assert_some<T>(value: Option<T>, context: &str) -> T {
        value.unwrap_or_else(|| panic!("{}: expected Some, got None", context))
    }

    pub fn assert_id_order(actual: &[i64], expected: &[i64], context: &str) {
        assert_eq!(
            actual, expected,
            "{}: expected order {:?}, got {:?}",
            context, expected, actual
        );
    }

    /// `(member_id, weight)` pairs are in traversal order: weight ascending,
    /// equal weights by member id ascending
    pub fn assert_traversal_order(pairs: &[(i64, f64)], context: &str) {
        for window in pairs.windows(2) {
            let ((a_id, a_weight), (b_id, b_weight)) = (window[0], window[1]);
            let ordered = a_weight < b_weight || (a_weight == b_weight && a_id < b_id);
            assert!(
                ordered,
                "{}: ({}, {}) listed before ({}, {}) in {:?}",
                context, a_id, a_weight, b_id, b_weight, pairs
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::assertions::*;
    use super::*;

    #[test]
    fn test_same_test_name_same_names() {
        let a = TestDataBuilder::from_test_name("replace_categories");
        let b = TestDataBuilder::from_test_name("replace_categories");
        assert_eq!(a.name("bucket", "web"), b.name("bucket", "web"));
        assert_ne!(
            a.name("bucket", "web"),
            TestDataBuilder::from_test_name("other").name("bucket", "web")
        );
    }

    #[test]
    fn test_names() {
        let names = TestDataBuilder::new(3).names("token_filter", 3);
        assert_eq!(
            names,
            vec![
                "test-token_filter-3-0",
                "test-token_filter-3-1",
                "test-token_filter-3-2"
            ]
        );
    }

    #[test]
    fn test_traversal_order_accepts_id_tie_break() {
        assert_traversal_order(&[(3, 0.0), (1, 1.0), (2, 1.0)], "scenario");
        assert_traversal_order(&[], "empty");
    }

    #[test]
    #[should_panic(expected = "tie")]
    fn test_traversal_order_rejects_wrong_tie_break() {
        assert_traversal_order(&[(2, 1.0), (1, 1.0)], "tie");
    }
}
