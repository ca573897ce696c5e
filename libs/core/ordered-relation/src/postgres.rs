//! PostgreSQL backend.
//!
//! Each trait call runs in its own transaction and locks the owner row with
//! `SELECT ... FOR UPDATE`, so writers on the same owner are serialised. The
//! `*_in` functions take any [`ConnectionTrait`] so a domain repository can
//! run them inside a transaction it already holds (for example when an owner
//! is created together with its members).

use async_trait::async_trait;
use sea_orm::sea_query::{Alias, Expr, ExprTrait, Query, SelectStatement};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbBackend, FromQueryResult, Statement, TransactionTrait,
    Value,
};

use crate::error::{RelationError, RelationResult};
use crate::manager::OrderedRelation;
use crate::model::{MemberWeight, Membership, Placement};
use crate::weights;

/// Names of a join table and the tables its two foreign keys point at.
///
/// All identifiers are compile-time constants; values are always bound as
/// statement parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationTable {
    pub table: &'static str,
    pub owner_column: &'static str,
    pub member_column: &'static str,
    pub owner_table: &'static str,
    pub member_table: &'static str,
}

impl RelationTable {
    /// `SELECT owner_column FROM table WHERE member_column = member_id`
    pub fn owners_of_query(&self, member_id: i64) -> SelectStatement {
        Query::select()
            .column(Alias::new(self.owner_column))
            .from(Alias::new(self.table))
            .and_where(Expr::col(Alias::new(self.member_column)).eq(member_id))
            .to_owned()
    }

    /// `SELECT member_column FROM table WHERE owner_column = owner_id`
    pub fn members_of_query(&self, owner_id: i64) -> SelectStatement {
        Query::select()
            .column(Alias::new(self.member_column))
            .from(Alias::new(self.table))
            .and_where(Expr::col(Alias::new(self.owner_column)).eq(owner_id))
            .to_owned()
    }
}

#[derive(Debug, FromQueryResult)]
struct MembershipRow {
    owner_id: i64,
    member_id: i64,
    weight: f64,
}

impl From<MembershipRow> for Membership {
    fn from(row: MembershipRow) -> Self {
        Membership {
            owner_id: row.owner_id,
            member_id: row.member_id,
            weight: row.weight,
        }
    }
}

#[derive(Debug, FromQueryResult)]
struct IdRow {
    id: i64,
}

fn statement(sql: String, values: Vec<Value>) -> Statement {
    Statement::from_sql_and_values(DbBackend::Postgres, sql, values)
}

/// Lock the owner row for the rest of the transaction
pub async fn lock_owner<C: ConnectionTrait>(
    conn: &C,
    table: &RelationTable,
    owner_id: i64,
) -> RelationResult<()> {
    let sql = format!("SELECT id FROM {} WHERE id = $1 FOR UPDATE", table.owner_table);
    IdRow::find_by_statement(statement(sql, vec![owner_id.into()]))
        .one(conn)
        .await?
        .map(|_| ())
        .ok_or(RelationError::OwnerNotFound(owner_id))
}

pub async fn ensure_member<C: ConnectionTrait>(
    conn: &C,
    table: &RelationTable,
    member_id: i64,
) -> RelationResult<()> {
    let sql = format!("SELECT id FROM {} WHERE id = $1", table.member_table);
    IdRow::find_by_statement(statement(sql, vec![member_id.into()]))
        .one(conn)
        .await?
        .map(|_| ())
        .ok_or(RelationError::MemberNotFound(member_id))
}

/// Memberships of `owner_id` in traversal order
pub async fn load<C: ConnectionTrait>(
    conn: &C,
    table: &RelationTable,
    owner_id: i64,
) -> RelationResult<Vec<Membership>> {
    let sql = format!(
        "SELECT {owner} AS owner_id, {member} AS member_id, weight FROM {table} \
         WHERE {owner} = $1 ORDER BY weight ASC, {member} ASC",
        owner = table.owner_column,
        member = table.member_column,
        table = table.table,
    );
    let rows = MembershipRow::find_by_statement(statement(sql, vec![owner_id.into()]))
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

async fn upsert<C: ConnectionTrait>(
    conn: &C,
    table: &RelationTable,
    owner_id: i64,
    member: MemberWeight,
) -> RelationResult<()> {
    let sql = format!(
        "INSERT INTO {table} ({owner}, {member}, weight) VALUES ($1, $2, $3) \
         ON CONFLICT ({owner}, {member}) DO UPDATE SET weight = EXCLUDED.weight",
        owner = table.owner_column,
        member = table.member_column,
        table = table.table,
    );
    conn.execute_raw(statement(
        sql,
        vec![owner_id.into(), member.member_id.into(), member.weight.into()],
    ))
    .await?;
    Ok(())
}

async fn delete_pair<C: ConnectionTrait>(
    conn: &C,
    table: &RelationTable,
    owner_id: i64,
    member_id: i64,
) -> RelationResult<u64> {
    let sql = format!(
        "DELETE FROM {} WHERE {} = $1 AND {} = $2",
        table.table, table.owner_column, table.member_column
    );
    let result = conn
        .execute_raw(statement(sql, vec![owner_id.into(), member_id.into()]))
        .await?;
    Ok(result.rows_affected())
}

pub async fn add_member_in<C: ConnectionTrait>(
    conn: &C,
    table: &RelationTable,
    owner_id: i64,
    member_id: i64,
    placement: Placement,
) -> RelationResult<Vec<Membership>> {
    lock_owner(conn, table, owner_id).await?;
    ensure_member(conn, table, member_id).await?;

    let current = load(conn, table, owner_id).await?;
    if current.iter().any(|m| m.member_id == member_id) {
        return Err(RelationError::AlreadyExists {
            owner_id,
            member_id,
        });
    }

    let existing: Vec<f64> = current.iter().map(|m| m.weight).collect();
    let weight = weights::next_weight(&existing, placement);
    upsert(conn, table, owner_id, MemberWeight::new(member_id, weight)).await?;

    tracing::info!(table = table.table, owner_id, member_id, weight, %placement, "Added member");
    load(conn, table, owner_id).await
}

pub async fn remove_member_in<C: ConnectionTrait>(
    conn: &C,
    table: &RelationTable,
    owner_id: i64,
    member_id: i64,
) -> RelationResult<Vec<Membership>> {
    lock_owner(conn, table, owner_id).await?;

    if delete_pair(conn, table, owner_id, member_id).await? == 0 {
        return Err(RelationError::NotFound {
            owner_id,
            member_id,
        });
    }

    tracing::info!(table = table.table, owner_id, member_id, "Removed member");
    load(conn, table, owner_id).await
}

pub async fn reorder_in<C: ConnectionTrait>(
    conn: &C,
    table: &RelationTable,
    owner_id: i64,
    member_ids: &[i64],
) -> RelationResult<Vec<Membership>> {
    lock_owner(conn, table, owner_id).await?;

    let current: Vec<i64> = load(conn, table, owner_id)
        .await?
        .into_iter()
        .map(|m| m.member_id)
        .collect();

    for (member_id, weight) in weights::plan_reorder(&current, member_ids) {
        upsert(conn, table, owner_id, MemberWeight::new(member_id, weight)).await?;
    }

    tracing::info!(table = table.table, owner_id, requested = member_ids.len(), "Reordered members");
    load(conn, table, owner_id).await
}

pub async fn replace_set_in<C: ConnectionTrait>(
    conn: &C,
    table: &RelationTable,
    owner_id: i64,
    members: &[MemberWeight],
    partial: bool,
) -> RelationResult<Vec<Membership>> {
    lock_owner(conn, table, owner_id).await?;
    for mw in members {
        ensure_member(conn, table, mw.member_id).await?;
    }

    let current: Vec<i64> = load(conn, table, owner_id)
        .await?
        .into_iter()
        .map(|m| m.member_id)
        .collect();
    let plan = weights::plan_replace(&current, members, partial)?;

    for member_id in &plan.remove {
        delete_pair(conn, table, owner_id, *member_id).await?;
    }
    for mw in &plan.upsert {
        upsert(conn, table, owner_id, *mw).await?;
    }

    if !plan.is_noop() {
        tracing::info!(
            table = table.table,
            owner_id,
            removed = plan.remove.len(),
            upserted = plan.upsert.len(),
            partial,
            "Replaced member set"
        );
    }
    load(conn, table, owner_id).await
}

/// Remove `member_id` from every owner, returning the affected owner ids
pub async fn detach_member_in<C: ConnectionTrait>(
    conn: &C,
    table: &RelationTable,
    member_id: i64,
) -> RelationResult<Vec<i64>> {
    let sql = format!(
        "DELETE FROM {table} WHERE {member} = $1 RETURNING {owner} AS id",
        table = table.table,
        member = table.member_column,
        owner = table.owner_column,
    );
    let mut owners: Vec<i64> = IdRow::find_by_statement(statement(sql, vec![member_id.into()]))
        .all(conn)
        .await?
        .into_iter()
        .map(|row| row.id)
        .collect();
    owners.sort_unstable();

    tracing::info!(table = table.table, member_id, owners = owners.len(), "Detached member");
    Ok(owners)
}

pub async fn owners_of_in<C: ConnectionTrait>(
    conn: &C,
    table: &RelationTable,
    member_id: i64,
) -> RelationResult<Vec<i64>> {
    let sql = format!(
        "SELECT {owner} AS id FROM {table} WHERE {member} = $1 ORDER BY {owner} ASC",
        owner = table.owner_column,
        member = table.member_column,
        table = table.table,
    );
    let rows = IdRow::find_by_statement(statement(sql, vec![member_id.into()]))
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(|row| row.id).collect())
}

/// PostgreSQL implementation of OrderedRelation
#[derive(Debug, Clone)]
pub struct PgOrderedRelation {
    db: DatabaseConnection,
    table: RelationTable,
}

impl PgOrderedRelation {
    pub fn new(db: DatabaseConnection, table: RelationTable) -> Self {
        Self { db, table }
    }

    pub fn table(&self) -> &RelationTable {
        &self.table
    }
}

#[async_trait]
impl OrderedRelation for PgOrderedRelation {
    async fn add_member(
        &self,
        owner_id: i64,
        member_id: i64,
        placement: Placement,
    ) -> RelationResult<Vec<Membership>> {
        let txn = self.db.begin().await?;
        let members = add_member_in(&txn, &self.table, owner_id, member_id, placement).await?;
        txn.commit().await?;
        Ok(members)
    }

    async fn remove_member(&self, owner_id: i64, member_id: i64) -> RelationResult<Vec<Membership>> {
        let txn = self.db.begin().await?;
        let members = remove_member_in(&txn, &self.table, owner_id, member_id).await?;
        txn.commit().await?;
        Ok(members)
    }

    async fn reorder(&self, owner_id: i64, member_ids: Vec<i64>) -> RelationResult<Vec<Membership>> {
        let txn = self.db.begin().await?;
        let members = reorder_in(&txn, &self.table, owner_id, &member_ids).await?;
        txn.commit().await?;
        Ok(members)
    }

    async fn replace_set(
        &self,
        owner_id: i64,
        members: Vec<MemberWeight>,
        partial: bool,
    ) -> RelationResult<Vec<Membership>> {
        let txn = self.db.begin().await?;
        let result = replace_set_in(&txn, &self.table, owner_id, &members, partial).await?;
        txn.commit().await?;
        Ok(result)
    }

    async fn members(&self, owner_id: i64) -> RelationResult<Vec<Membership>> {
        load(&self.db, &self.table, owner_id).await
    }

    async fn first_member(&self, owner_id: i64) -> RelationResult<Option<Membership>> {
        Ok(load(&self.db, &self.table, owner_id).await?.into_iter().next())
    }

    async fn next_member(
        &self,
        owner_id: i64,
        member_id: i64,
    ) -> RelationResult<Option<Membership>> {
        let sorted = load(&self.db, &self.table, owner_id).await?;
        Ok(weights::next_after(&sorted, member_id))
    }

    async fn owners_of(&self, member_id: i64) -> RelationResult<Vec<i64>> {
        owners_of_in(&self.db, &self.table, member_id).await
    }

    async fn detach_member(&self, member_id: i64) -> RelationResult<Vec<i64>> {
        let txn = self.db.begin().await?;
        let owners = detach_member_in(&txn, &self.table, member_id).await?;
        txn.commit().await?;
        Ok(owners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::sea_query::PostgresQueryBuilder;

    const TABLE: RelationTable = RelationTable {
        table: "analyzer_token_filter",
        owner_column: "analyzer_id",
        member_column: "token_filter_id",
        owner_table: "analyzer",
        member_table: "token_filter",
    };

    #[test]
    fn test_membership_subqueries() {
        assert_eq!(
            TABLE.owners_of_query(7).to_string(PostgresQueryBuilder),
            r#"SELECT "analyzer_id" FROM "analyzer_token_filter" WHERE "token_filter_id" = 7"#
        );
        assert_eq!(
            TABLE.members_of_query(3).to_string(PostgresQueryBuilder),
            r#"SELECT "token_filter_id" FROM "analyzer_token_filter" WHERE "analyzer_id" = 3"#
        );
    }
}
