//! Execution surface: running the built chain.

use super::Mapper;
use crate::client::Connection;
use crate::error::{OrmError, OrmResult};
use crate::qb::{QueryState, Rendered, rewrite_named};
use crate::value::{Record, Value};
use indexmap::IndexMap;

pub(crate) async fn fetch<C: Connection>(conn: &C, rendered: &Rendered) -> OrmResult<Vec<Record>> {
    conn.query(&rendered.sql, &rendered.params).await
}

pub(crate) async fn fetch_state<C: Connection>(conn: &C, state: &QueryState) -> OrmResult<Vec<Record>> {
    fetch(conn, &state.render()?).await
}

impl<C: Connection> Mapper<'_, C> {
    /// The first row of the chain's result, with eager relations loaded.
    pub async fn get(&mut self) -> OrmResult<Option<Record>> {
        let rows = fetch_state(self.conn, &self.state).await?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };
        let mut page = vec![row];
        self.eager_load(&mut page).await?;
        Ok(page.pop())
    }

    /// Every row of the chain's result, with eager relations loaded.
    pub async fn get_all(&mut self) -> OrmResult<Vec<Record>> {
        let mut rows = fetch_state(self.conn, &self.state).await?;
        self.eager_load(&mut rows).await?;
        Ok(rows)
    }

    /// `limit(1).get()`.
    pub async fn first(&mut self) -> OrmResult<Option<Record>> {
        self.state.limit(1);
        self.get().await
    }

    /// Run a statement that returns no rows (a pending update or a delete).
    pub async fn execute(&mut self) -> OrmResult<bool> {
        let rendered = self.state.render()?;
        self.conn.execute(&rendered.sql, &rendered.params).await?;
        self.state.finish_update();
        Ok(true)
    }

    /// Number of rows the chain matches; 0 when the backend returns no row.
    pub async fn count(&mut self) -> OrmResult<i64> {
        let rows = fetch(self.conn, &self.state.render_count()?).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("aggregate"))
            .and_then(Value::as_i64)
            .unwrap_or(0))
    }

    pub async fn exists(&mut self) -> OrmResult<bool> {
        Ok(self.count().await? > 0)
    }

    /// The values of `column` across every matching row, in order.
    pub async fn pluck(&mut self, column: &str) -> OrmResult<Vec<Value>> {
        let rows = fetch(self.conn, &self.state.render_pluck(column)?).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                row.into_columns()
                    .into_iter()
                    .next()
                    .map(|(_, value)| value)
                    .unwrap_or_default()
            })
            .collect())
    }

    /// Walk the chain's result in pages of `size` rows.
    ///
    /// `f` sees every non-empty page; paging stops at the first page shorter
    /// than `size`. Order the chain by a stable key, or rows written between
    /// pages can be skipped or repeated.
    pub async fn chunk<F>(&mut self, size: u64, mut f: F) -> OrmResult<()>
    where
        F: FnMut(Vec<Record>),
    {
        if size == 0 {
            return Err(OrmError::validation("chunk size must be greater than zero"));
        }
        let mut page = 0u64;
        loop {
            let mut state = self.state.clone();
            state.limit(size).offset(page * size);
            let mut rows = fetch_state(self.conn, &state).await?;
            let len = rows.len() as u64;
            if len == 0 {
                break;
            }
            self.eager_load(&mut rows).await?;
            f(rows);
            if len < size {
                break;
            }
            page += 1;
        }
        Ok(())
    }

    /// Run literal SQL with `:name` placeholders bound from `params`.
    ///
    /// No soft-delete filtering or eager loading applies.
    pub async fn raw<I, K, V>(&self, sql: &str, params: I) -> OrmResult<Vec<Record>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let bindings: IndexMap<String, Value> = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        fetch(self.conn, &rewrite_named(sql, &bindings)?).await
    }

    /// The row whose primary key is `id`; its columns become this mapper's columns.
    pub async fn find(&mut self, id: impl Into<Value>) -> OrmResult<Option<Record>> {
        let primary_key = self.meta.table.primary_key;
        self.state.all().where_([(primary_key, "=", id.into())]);
        let row = self.get().await?;
        if let Some(row) = &row {
            self.columns = row.columns().clone();
        }
        Ok(row)
    }
}
