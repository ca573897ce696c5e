//! Relay-style cursor pagination.
//!
//! List endpoints accept a [`PageRequest`] (`after`, `before`, `first`,
//! `last`, `search_text`, `sort`) and answer with a [`Connection`] of edges.
//! Table listings go through `paginate_select`, which turns the request
//! into one SQL page. [`paginate`] applies the same contract to rows already
//! in memory: membership lists and the in-memory repositories.
//!
//! ```
//! use database::pagination::{paginate, PageRequest, Pageable, SortValue};
//!
//! struct Row { id: i64, name: String }
//!
//! impl Pageable for Row {
//!     fn cursor_id(&self) -> i64 { self.id }
//!     fn search_fields(&self) -> Vec<&str> { vec![self.name.as_str()] }
//!     fn sort_fields() -> &'static [&'static str] { &["id", "name"] }
//!     fn sort_value(&self, field: &str) -> SortValue {
//!         match field {
//!             "name" => SortValue::from(self.name.as_str()),
//!             _ => SortValue::Int(self.id),
//!         }
//!     }
//! }
//!
//! let rows = vec![Row { id: 1, name: "b".into() }, Row { id: 2, name: "a".into() }];
//! let request = PageRequest { sort: Some("name:asc".into()), ..Default::default() };
//! let page = paginate(rows, &request).unwrap();
//! assert_eq!(page.edges[0].node.id, 2);
//! ```

mod connection;
mod cursor;
mod request;
#[cfg(feature = "postgres")]
mod select;

pub use connection::{Connection, Edge, PageInfo, Pageable, SortValue, paginate};
pub use cursor::Cursor;
pub use request::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, PageRequest, SortBy, SortDirection};
#[cfg(feature = "postgres")]
pub use select::{PageColumns, PageQueryError, paginate_select};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Cannot sort by '{0}'")]
    UnknownSortField(String),

    #[error("Invalid sort direction '{0}', expected 'asc' or 'desc'")]
    InvalidSortDirection(String),

    #[error("Page size {0} exceeds the maximum of {MAX_PAGE_SIZE}")]
    PageSizeTooLarge(u32),
}
