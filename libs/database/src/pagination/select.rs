//! Cursor pagination pushed into a SeaORM `Select`.
//!
//! Search, ordering and the cursor window become SQL; at most one page plus
//! one look-ahead row is fetched. Cursors still carry only the node id: the
//! cursor row is looked up to get the values of the sort columns, and the
//! window is a keyset condition over `(sort columns…, id)`.

use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, ExprTrait, ModelTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Value,
};
use thiserror::Error;

use super::connection::{Connection, Pageable, connection, effective_first, validate};
use super::cursor::Cursor;
use super::request::{DEFAULT_PAGE_SIZE, PageRequest, SortDirection};
use super::PaginationError;

#[derive(Debug, Error)]
pub enum PageQueryError {
    #[error(transparent)]
    Pagination(#[from] PaginationError),

    #[error(transparent)]
    Database(#[from] DbErr),
}

/// How a node type maps onto the columns of its table
#[derive(Debug, Clone)]
pub struct PageColumns<C> {
    pub id: C,
    /// Matched case-insensitively by `search_text`
    pub search: Vec<C>,
    /// Sort field name → column. Sort fields without a column are constant
    /// for the rows of this table and fall through to the id tie-break.
    pub sort: Vec<(&'static str, C)>,
}

type Key<C> = (C, SortDirection);

fn escape_like(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn search_condition<C: ColumnTrait>(columns: &[C], needle: &str) -> Condition {
    let pattern = format!("%{}%", escape_like(needle));
    columns.iter().fold(Condition::any(), |any, column| {
        any.add(Expr::expr(Func::lower(Expr::col(*column))).like(pattern.as_str()))
    })
}

/// Rows strictly past `values` in key order (`forward`) or strictly before
/// them.
fn keyset<C: ColumnTrait>(keys: &[Key<C>], values: &[Value], forward: bool) -> Condition {
    let mut any = Condition::any();
    for (i, (column, direction)) in keys.iter().enumerate() {
        let mut all = Condition::all();
        for ((prev, _), value) in keys[..i].iter().zip(values) {
            all = all.add(prev.eq(value.clone()));
        }
        let value = values[i].clone();
        let past = match (direction, forward) {
            (SortDirection::Asc, true) | (SortDirection::Desc, false) => column.gt(value),
            _ => column.lt(value),
        };
        any = any.add(all.add(past));
    }
    any
}

fn ordered<E: EntityTrait>(
    mut select: Select<E>,
    keys: &[Key<E::Column>],
    reverse: bool,
) -> Select<E> {
    for (column, direction) in keys {
        let order = match (direction, reverse) {
            (SortDirection::Asc, false) | (SortDirection::Desc, true) => Order::Asc,
            _ => Order::Desc,
        };
        select = select.order_by(*column, order);
    }
    select
}

async fn cursor_values<E, C>(
    db: &C,
    select: &Select<E>,
    id: E::Column,
    keys: &[Key<E::Column>],
    raw: &str,
) -> Result<Vec<Value>, PageQueryError>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    let cursor = Cursor::decode(raw)?;
    let model = select
        .clone()
        .filter(id.eq(cursor.0))
        .one(db)
        .await?
        .ok_or_else(|| PaginationError::InvalidCursor(raw.to_string()))?;
    Ok(keys.iter().map(|(column, _)| model.get(*column)).collect())
}

/// Run one page of `select` as a relay connection.
///
/// Same contract as [`paginate`](super::paginate): sort specs are checked
/// against `T`, the id is the final tie-break, and a cursor that is not in
/// the searched set is rejected. Text columns sort by the database
/// collation.
pub async fn paginate_select<T, E, C>(
    db: &C,
    select: Select<E>,
    columns: &PageColumns<E::Column>,
    request: &PageRequest,
) -> Result<Connection<T>, PageQueryError>
where
    T: Pageable + From<E::Model>,
    E: EntityTrait,
    E::Model: Sync,
    C: ConnectionTrait,
{
    let sort = validate::<T>(request)?;
    let keys: Vec<Key<E::Column>> = sort
        .iter()
        .filter_map(|spec| {
            columns
                .sort
                .iter()
                .find(|(field, _)| *field == spec.field)
                .map(|(_, column)| (*column, spec.direction))
        })
        .chain(std::iter::once((columns.id, SortDirection::Asc)))
        .collect();

    let searched = match request.normalized_search() {
        Some(needle) => select.filter(search_condition(&columns.search, &needle)),
        None => select,
    };
    let total_count = searched.clone().count(db).await? as usize;

    let mut window = searched.clone();
    if let Some(raw) = request.after.as_deref() {
        let values = cursor_values(db, &searched, columns.id, &keys, raw).await?;
        window = window.filter(keyset(&keys, &values, true));
    }
    if let Some(raw) = request.before.as_deref() {
        let values = cursor_values(db, &searched, columns.id, &keys, raw).await?;
        window = window.filter(keyset(&keys, &values, false));
    }

    let (rows, has_previous_page, has_next_page) = match effective_first(request) {
        Some(first) => {
            let first = first as usize;
            let mut rows = ordered(window, &keys, false)
                .limit(first as u64 + 1)
                .all(db)
                .await?;
            let has_next_page = rows.len() > first || request.before.is_some();
            rows.truncate(first);

            let mut has_previous_page = request.after.is_some();
            if let Some(last) = request.last {
                let skip = rows.len().saturating_sub(last as usize);
                if skip > 0 {
                    rows.drain(..skip);
                    has_previous_page = true;
                }
            }
            (rows, has_previous_page, has_next_page)
        }
        None => {
            let last = request.last.unwrap_or(DEFAULT_PAGE_SIZE) as usize;
            let mut rows = ordered(window, &keys, true)
                .limit(last as u64 + 1)
                .all(db)
                .await?;
            let has_previous_page = rows.len() > last || request.after.is_some();
            rows.truncate(last);
            rows.reverse();
            (rows, has_previous_page, request.before.is_some())
        }
    };

    let nodes = rows.into_iter().map(T::from).collect();
    Ok(connection(nodes, has_previous_page, has_next_page, total_count))
}
