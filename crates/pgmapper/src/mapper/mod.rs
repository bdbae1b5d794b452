//! The mapper: one table's builder, execution, lifecycle and relation surface.
//!
//! A [`Mapper`] pairs a [`QueryState`] with the model's column map and a
//! borrowed [`Connection`]. Builder methods mutate the state and return
//! `&mut Self`, so chains read left to right:
//!
//! ```ignore
//! let rows = Article::query(&conn)
//!     .all()
//!     .where_([("status", "=", "published")])
//!     .order_by("created_at", "DESC")
//!     .limit(10)
//!     .get_all()
//!     .await?;
//! ```
//!
//! Use one mapper per logical chain; a mapper is not meant to be shared
//! between tasks.

mod exec;
mod lifecycle;
mod relations;

use crate::client::Connection;
use crate::error::OrmResult;
use crate::model::{Model, ModelMeta, TableRef, model_meta};
use crate::qb::{Condition, QueryState};
use crate::value::Value;
use indexmap::IndexMap;
use std::sync::Arc;

/// Query builder and executor for one model's table.
pub struct Mapper<'c, C: Connection> {
    conn: &'c C,
    meta: Arc<ModelMeta>,
    state: QueryState,
    columns: IndexMap<String, Value>,
    last_insert_id: Option<Value>,
}

impl<'c, C: Connection> Mapper<'c, C> {
    /// Mapper for model `M`, with its cached relations and scopes.
    pub fn new<M: Model>(conn: &'c C) -> Self {
        Self::with_meta(conn, model_meta::<M>())
    }

    /// Mapper for a table that has no model type (no relations or scopes).
    pub fn for_table(conn: &'c C, table: TableRef) -> Self {
        Self::with_meta(conn, Arc::new(ModelMeta::bare(table)))
    }

    fn with_meta(conn: &'c C, meta: Arc<ModelMeta>) -> Self {
        let state = meta.table.query_state();
        Self {
            conn,
            meta,
            state,
            columns: IndexMap::new(),
            last_insert_id: None,
        }
    }

    pub fn connection(&self) -> &'c C {
        self.conn
    }

    pub fn table(&self) -> &TableRef {
        &self.meta.table
    }

    pub fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut QueryState {
        &mut self.state
    }

    /// The statement the current chain would execute.
    pub fn to_sql(&self) -> OrmResult<String> {
        self.state.to_sql()
    }

    /// Key returned by the last [`insert`](Self::insert) through this mapper.
    pub fn last_insert_id(&self) -> Option<&Value> {
        self.last_insert_id.as_ref()
    }

    // ==================== columns ====================

    /// Set one column of the row this mapper writes.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.columns.insert(column.into(), value.into());
        self
    }

    /// Set several columns at once.
    pub fn fill<I, K, V>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (column, value) in values {
            self.columns.insert(column.into(), value.into());
        }
        self
    }

    pub fn columns(&self) -> &IndexMap<String, Value> {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Value> {
        self.columns.get(name)
    }

    /// Drop every column value.
    pub fn clear_columns(&mut self) -> &mut Self {
        self.columns.clear();
        self
    }

    // ==================== builder ====================

    pub fn all(&mut self) -> &mut Self {
        self.state.all();
        self
    }

    pub fn select<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.select(columns);
        self
    }

    pub fn select_aggregate<I, S>(&mut self, columns: I, function: &str, argument: &str) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.select_aggregate(columns, function, argument);
        self
    }

    pub fn where_<I, T>(&mut self, conditions: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Condition>,
    {
        self.state.where_(conditions);
        self
    }

    pub fn having<I, T>(&mut self, conditions: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Condition>,
    {
        self.state.having(conditions);
        self
    }

    pub fn where_in<I, V>(&mut self, column: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.state.where_in(column, values);
        self
    }

    pub fn where_not_in<I, V>(&mut self, column: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.state.where_not_in(column, values);
        self
    }

    pub fn where_between(
        &mut self,
        column: &str,
        start: impl Into<Value>,
        end: impl Into<Value>,
    ) -> &mut Self {
        self.state.where_between(column, start, end);
        self
    }

    pub fn where_null(&mut self, column: &str) -> &mut Self {
        self.state.where_null(column);
        self
    }

    pub fn where_not_null(&mut self, column: &str) -> &mut Self {
        self.state.where_not_null(column);
        self
    }

    pub fn join(&mut self, table: &str, first: &str, operator: &str, second: &str) -> &mut Self {
        self.state.join(table, first, operator, second);
        self
    }

    pub fn left_join(&mut self, table: &str, first: &str, operator: &str, second: &str) -> &mut Self {
        self.state.left_join(table, first, operator, second);
        self
    }

    pub fn right_join(&mut self, table: &str, first: &str, operator: &str, second: &str) -> &mut Self {
        self.state.right_join(table, first, operator, second);
        self
    }

    pub fn order_by(&mut self, column: &str, direction: &str) -> &mut Self {
        self.state.order_by(column, direction);
        self
    }

    pub fn group_by(&mut self, column: &str) -> &mut Self {
        self.state.group_by(column);
        self
    }

    pub fn limit(&mut self, n: u64) -> &mut Self {
        self.state.limit(n);
        self
    }

    pub fn offset(&mut self, n: u64) -> &mut Self {
        self.state.offset(n);
        self
    }

    pub fn distinct(&mut self) -> &mut Self {
        self.state.distinct();
        self
    }

    /// Include soft-deleted rows in reads.
    pub fn with_trashed(&mut self) -> &mut Self {
        self.state.with_trashed();
        self
    }

    /// Read only soft-deleted rows.
    pub fn only_trashed(&mut self) -> &mut Self {
        self.state.only_trashed();
        self
    }

    /// Eager load `relations` onto every fetched record.
    pub fn with<I, S>(&mut self, relations: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.with(relations);
        self
    }

    /// Run the scope registered as `name`.
    ///
    /// An unknown name fails the chain when it executes.
    pub fn apply_scope(&mut self, name: &str, args: &[Value]) -> &mut Self {
        match self.meta.scopes.get(name) {
            Some(scope) => scope(&mut self.state, args),
            None => {
                let message = format!("unknown scope '{name}' on {}", self.meta.table.table);
                self.state.fail(message);
            }
        }
        self
    }

    // ==================== transactions ====================

    pub async fn begin_transaction(&self) -> OrmResult<()> {
        self.conn.begin().await
    }

    pub async fn commit(&self) -> OrmResult<()> {
        self.conn.commit().await
    }

    pub async fn rollback(&self) -> OrmResult<()> {
        self.conn.rollback().await
    }
}
