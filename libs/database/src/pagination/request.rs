use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};

use super::PaginationError;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 200;

/// Query parameters accepted by every list endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct PageRequest {
    /// Return nodes after this cursor
    pub after: Option<String>,
    /// Return nodes before this cursor
    pub before: Option<String>,
    /// Take at most this many nodes from the start of the window
    pub first: Option<u32>,
    /// Take at most this many nodes from the end of the window
    pub last: Option<u32>,
    /// Case-insensitive substring matched against the searchable fields
    pub search_text: Option<String>,
    /// Comma-separated `field:asc|desc` list, e.g. `name:asc,updated_at:desc`
    pub sort: Option<String>,
}

impl PageRequest {
    pub fn first(count: u32) -> Self {
        Self {
            first: Some(count),
            ..Self::default()
        }
    }

    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.after = Some(cursor.into());
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search_text = Some(text.into());
        self
    }

    pub fn sorted_by(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn sort_by(&self) -> Result<Vec<SortBy>, PaginationError> {
        self.sort
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(SortBy::from_str)
                    .collect()
            })
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    /// Search text trimmed and lowercased, `None` when blank
    pub fn normalized_search(&self) -> Option<String> {
        self.search_text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_lowercase)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SortBy {
    pub field: String,
    pub direction: SortDirection,
}

impl FromStr for SortBy {
    type Err = PaginationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (field, direction) = match raw.split_once(':') {
            Some((field, direction)) => (field.trim(), direction.trim()),
            None => (raw.trim(), "asc"),
        };

        let direction = match direction.to_ascii_lowercase().as_str() {
            "asc" => SortDirection::Asc,
            "desc" => SortDirection::Desc,
            _ => return Err(PaginationError::InvalidSortDirection(direction.to_string())),
        };

        Ok(SortBy {
            field: field.to_string(),
            direction,
        })
    }
}
