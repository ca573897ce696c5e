use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use utoipa::ToSchema;

use super::cursor::Cursor;
use super::request::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, PageRequest, SortBy, SortDirection};
use super::PaginationError;

/// Comparable value of one sortable field
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Time(DateTime<Utc>),
}

impl SortValue {
    fn compare(&self, other: &SortValue) -> Ordering {
        use SortValue::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Null, _) => Ordering::Less,
            (_, Null) => Ordering::Greater,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Text(a), Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)),
            (Time(a), Time(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl From<&str> for SortValue {
    fn from(value: &str) -> Self {
        SortValue::Text(value.to_string())
    }
}

impl From<Option<&str>> for SortValue {
    fn from(value: Option<&str>) -> Self {
        value.map(SortValue::from).unwrap_or(SortValue::Null)
    }
}

impl From<DateTime<Utc>> for SortValue {
    fn from(value: DateTime<Utc>) -> Self {
        SortValue::Time(value)
    }
}

/// A node that can be listed through a [`Connection`]
pub trait Pageable {
    /// Id encoded into the node's cursor; unique within a connection
    fn cursor_id(&self) -> i64;

    /// Values matched by `search_text`
    fn search_fields(&self) -> Vec<&str>;

    /// Field names accepted in `sort`
    fn sort_fields() -> &'static [&'static str];

    fn sort_value(&self, field: &str) -> SortValue;
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Edge<T> {
    pub cursor: String,
    pub node: T,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Connection<T> {
    pub edges: Vec<Edge<T>>,
    pub page_info: PageInfo,
    /// Nodes matching the search, before cursor slicing
    pub total_count: usize,
}

impl<T> Connection<T> {
    pub fn nodes(&self) -> impl Iterator<Item = &T> {
        self.edges.iter().map(|edge| &edge.node)
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Connection<U> {
        Connection {
            edges: self
                .edges
                .into_iter()
                .map(|edge| Edge {
                    cursor: edge.cursor,
                    node: f(edge.node),
                })
                .collect(),
            page_info: self.page_info,
            total_count: self.total_count,
        }
    }
}

fn compare_nodes<T: Pageable>(a: &T, b: &T, sort: &[SortBy]) -> Ordering {
    sort.iter()
        .map(|spec| {
            let ordering = a.sort_value(&spec.field).compare(&b.sort_value(&spec.field));
            match spec.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or_else(|| a.cursor_id().cmp(&b.cursor_id()))
}

fn position<T: Pageable>(nodes: &[T], raw: &str) -> Result<usize, PaginationError> {
    let cursor = Cursor::decode(raw)?;
    nodes
        .iter()
        .position(|node| node.cursor_id() == cursor.0)
        .ok_or_else(|| PaginationError::InvalidCursor(raw.to_string()))
}

/// Sort specs of `request`, checked against `T`'s sortable fields, after
/// rejecting page sizes over the limit
pub(super) fn validate<T: Pageable>(request: &PageRequest) -> Result<Vec<SortBy>, PaginationError> {
    let sort = request.sort_by()?;
    if let Some(unknown) = sort
        .iter()
        .find(|spec| !T::sort_fields().contains(&spec.field.as_str()))
    {
        return Err(PaginationError::UnknownSortField(unknown.field.clone()));
    }
    for size in [request.first, request.last].into_iter().flatten() {
        if size > MAX_PAGE_SIZE {
            return Err(PaginationError::PageSizeTooLarge(size));
        }
    }
    Ok(sort)
}

/// `first`, defaulted when neither `first` nor `last` is given
pub(super) fn effective_first(request: &PageRequest) -> Option<u32> {
    match (request.first, request.last) {
        (None, None) => Some(DEFAULT_PAGE_SIZE),
        (first, _) => first,
    }
}

pub(super) fn connection<T: Pageable>(
    nodes: Vec<T>,
    has_previous_page: bool,
    has_next_page: bool,
    total_count: usize,
) -> Connection<T> {
    let edges: Vec<Edge<T>> = nodes
        .into_iter()
        .map(|node| Edge {
            cursor: Cursor(node.cursor_id()).encode(),
            node,
        })
        .collect();

    let page_info = PageInfo {
        has_next_page,
        has_previous_page,
        start_cursor: edges.first().map(|edge| edge.cursor.clone()),
        end_cursor: edges.last().map(|edge| edge.cursor.clone()),
    };

    Connection {
        edges,
        page_info,
        total_count,
    }
}

/// Build a connection from every candidate node.
///
/// Without `sort` the incoming order is kept, so callers pass nodes in their
/// natural order (by id, or traversal order for memberships). With `sort`
/// the node id is always the final tie-break.
pub fn paginate<T: Pageable>(
    nodes: Vec<T>,
    request: &PageRequest,
) -> Result<Connection<T>, PaginationError> {
    let sort = validate::<T>(request)?;

    let mut nodes: Vec<T> = match request.normalized_search() {
        Some(needle) => nodes
            .into_iter()
            .filter(|node| {
                node.search_fields()
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
            })
            .collect(),
        None => nodes,
    };
    if !sort.is_empty() {
        nodes.sort_by(|a, b| compare_nodes(a, b, &sort));
    }
    let total_count = nodes.len();

    let mut start = match request.after.as_deref() {
        Some(raw) => position(&nodes, raw)? + 1,
        None => 0,
    };
    let mut end = match request.before.as_deref() {
        Some(raw) => position(&nodes, raw)?,
        None => nodes.len(),
    };
    end = end.max(start);

    if let Some(first) = effective_first(request) {
        end = end.min(start + first as usize);
    }
    if let Some(last) = request.last {
        start = start.max(end.saturating_sub(last as usize));
    }

    let has_previous_page = start > 0;
    let has_next_page = end < nodes.len();

    let page: Vec<T> = nodes.into_iter().skip(start).take(end - start).collect();
    Ok(connection(page, has_previous_page, has_next_page, total_count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Row {
        id: i64,
        name: &'static str,
        weight: f64,
    }

    impl Pageable for Row {
        fn cursor_id(&self) -> i64 {
            self.id
        }

        fn search_fields(&self) -> Vec<&str> {
            vec![self.name]
        }

        fn sort_fields() -> &'static [&'static str] {
            &["id", "name", "weight"]
        }

        fn sort_value(&self, field: &str) -> SortValue {
            match field {
                "name" => SortValue::from(self.name),
                "weight" => SortValue::Float(self.weight),
                _ => SortValue::Int(self.id),
            }
        }
    }

    fn rows() -> Vec<Row> {
        vec![
            Row { id: 1, name: "tokenizer", weight: 2.0 },
            Row { id: 2, name: "Lowercase", weight: 0.0 },
            Row { id: 3, name: "stemmer", weight: 1.0 },
            Row { id: 4, name: "lowercase-ascii", weight: 1.0 },
            Row { id: 5, name: "synonyms", weight: 3.0 },
        ]
    }

    fn ids<T: Pageable>(connection: &Connection<T>) -> Vec<i64> {
        connection.nodes().map(|n| n.cursor_id()).collect()
    }

    #[test]
    fn test_forward_paging_with_cursor() {
        let page = paginate(rows(), &PageRequest::first(2)).unwrap();
        assert_eq!(ids(&page), vec![1, 2]);
        assert!(page.page_info.has_next_page);
        assert!(!page.page_info.has_previous_page);
        assert_eq!(page.total_count, 5);

        let cursor = page.page_info.end_cursor.clone().unwrap();
        let next = paginate(rows(), &PageRequest::first(2).after(cursor)).unwrap();
        assert_eq!(ids(&next), vec![3, 4]);
        assert!(next.page_info.has_previous_page);
    }

    #[test]
    fn test_backward_paging() {
        let before = Cursor(5).encode();
        let request = PageRequest {
            before: Some(before),
            last: Some(2),
            ..Default::default()
        };
        let page = paginate(rows(), &request).unwrap();
        assert_eq!(ids(&page), vec![3, 4]);
        assert!(page.page_info.has_previous_page);
        assert!(page.page_info.has_next_page);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let page = paginate(rows(), &PageRequest::default().search("LOWER")).unwrap();
        assert_eq!(ids(&page), vec![2, 4]);
        assert_eq!(page.total_count, 2);
    }

    #[test]
    fn test_sort_with_id_tie_break() {
        let page = paginate(rows(), &PageRequest::default().sorted_by("weight:asc")).unwrap();
        assert_eq!(ids(&page), vec![2, 3, 4, 1, 5]);

        let page = paginate(rows(), &PageRequest::default().sorted_by("name:desc")).unwrap();
        assert_eq!(ids(&page), vec![1, 5, 3, 4, 2]);
    }

    #[test]
    fn test_rejections() {
        let err = paginate(rows(), &PageRequest::default().sorted_by("color")).unwrap_err();
        assert_eq!(err, PaginationError::UnknownSortField("color".into()));

        let err = paginate(rows(), &PageRequest::first(500)).unwrap_err();
        assert_eq!(err, PaginationError::PageSizeTooLarge(500));

        let err = paginate(rows(), &PageRequest::first(1).after(Cursor(99).encode())).unwrap_err();
        assert!(matches!(err, PaginationError::InvalidCursor(_)));
    }

    #[test]
    fn test_empty_connection() {
        let page = paginate(Vec::<Row>::new(), &PageRequest::default()).unwrap();
        assert!(page.edges.is_empty());
        assert_eq!(page.page_info, PageInfo::default());
    }

    #[test]
    fn test_map_keeps_cursors() {
        let page = paginate(rows(), &PageRequest::first(1)).unwrap();
        let cursor = page.edges[0].cursor.clone();
        let mapped = page.map(|row| row.name.to_uppercase());
        assert_eq!(mapped.edges[0].node, "TOKENIZER");
        assert_eq!(mapped.edges[0].cursor, cursor);
    }
}
