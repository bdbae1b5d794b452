//! Relation loading and pivot-table maintenance.

use super::Mapper;
use super::exec::fetch_state;
use crate::client::Connection;
use crate::error::{OrmError, OrmResult};
use crate::qb::{QueryState, render_insert};
use crate::relation::Relation;
use crate::value::{Record, Related, Value};
use indexmap::IndexMap;

/// Fetch the rows `relation` points at from `record`.
///
/// One query per call; eager loading calls this once per record and relation.
async fn load<C: Connection>(conn: &C, relation: &Relation, record: &Record) -> OrmResult<Related> {
    match relation {
        Relation::HasOne {
            related,
            foreign_key,
            local_key,
        } => {
            let mut q = related.query_state();
            q.where_([(foreign_key.as_str(), "=", record.value(local_key))])
                .limit(1);
            let row = fetch_state(conn, &q).await?.into_iter().next();
            Ok(Related::One(row.map(Box::new)))
        }
        Relation::HasMany {
            related,
            foreign_key,
            local_key,
        } => {
            let mut q = related.query_state();
            q.where_([(foreign_key.as_str(), "=", record.value(local_key))]);
            Ok(Related::Many(fetch_state(conn, &q).await?))
        }
        Relation::BelongsTo {
            related,
            foreign_key,
            owner_key,
        } => {
            let mut q = related.query_state();
            q.where_([(owner_key.as_str(), "=", record.value(foreign_key))])
                .limit(1);
            let row = fetch_state(conn, &q).await?.into_iter().next();
            Ok(Related::One(row.map(Box::new)))
        }
        Relation::BelongsToMany {
            related,
            pivot,
            foreign_pivot_key,
            related_pivot_key,
            parent_key,
            related_key,
        } => {
            let mut q = related.query_state();
            q.select([format!("{}.*", related.table)])
                .join(
                    pivot,
                    &format!("{}.{related_key}", related.table),
                    "=",
                    &format!("{pivot}.{related_pivot_key}"),
                )
                .where_([(
                    format!("{pivot}.{foreign_pivot_key}"),
                    "=",
                    record.value(parent_key),
                )]);
            Ok(Related::Many(fetch_state(conn, &q).await?))
        }
    }
}

/// Pivot table and its two key columns.
struct PivotKeys<'a> {
    table: &'a str,
    foreign: &'a str,
    related: &'a str,
}

impl<C: Connection> Mapper<'_, C> {
    fn relation(&self, name: &str) -> OrmResult<&Relation> {
        self.meta
            .relations
            .get(name)
            .ok_or_else(|| OrmError::unknown_relation(self.meta.table.table, name))
    }

    fn pivot(&self, name: &str) -> OrmResult<PivotKeys<'_>> {
        match self.relation(name)? {
            Relation::BelongsToMany {
                pivot,
                foreign_pivot_key,
                related_pivot_key,
                ..
            } => Ok(PivotKeys {
                table: pivot,
                foreign: foreign_pivot_key,
                related: related_pivot_key,
            }),
            other => Err(OrmError::validation(format!(
                "relation '{name}' on {} is {}, not belongs_to_many",
                self.meta.table.table,
                other.kind()
            ))),
        }
    }

    /// Load relation `name` for `record` and attach it under that name.
    pub async fn load_relation(&self, name: &str, record: &mut Record) -> OrmResult<()> {
        let relation = self.relation(name)?;
        let related = load(self.conn, relation, record).await?;
        record.set_relation(name, related);
        Ok(())
    }

    /// Load every relation marked with [`with`](Self::with) onto `rows`.
    pub(crate) async fn eager_load(&self, rows: &mut [Record]) -> OrmResult<()> {
        if self.state.eager().is_empty() || rows.is_empty() {
            return Ok(());
        }
        for name in self.state.eager() {
            let relation = self.relation(name)?;
            for row in rows.iter_mut() {
                let related = load(self.conn, relation, row).await?;
                row.set_relation(name.as_str(), related);
            }
        }
        Ok(())
    }

    /// Insert one pivot row linking `id` to `related_id`, plus any extra pivot columns.
    pub async fn attach<I, K, V>(
        &self,
        id: impl Into<Value>,
        related_id: impl Into<Value>,
        relation: &str,
        pivot_data: I,
    ) -> OrmResult<bool>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let keys = self.pivot(relation)?;
        let mut columns = IndexMap::new();
        columns.insert(keys.foreign.to_string(), id.into());
        columns.insert(keys.related.to_string(), related_id.into());
        for (column, value) in pivot_data {
            columns.insert(column.into(), value.into());
        }
        let rendered = render_insert(keys.table, &columns, None);
        self.conn.execute(&rendered.sql, &rendered.params).await?;
        Ok(true)
    }

    /// Delete pivot rows for `id`: only the one linking `related_id` when given, else all.
    ///
    /// Returns the number of pivot rows removed.
    pub async fn detach(
        &self,
        id: impl Into<Value>,
        relation: &str,
        related_id: Option<Value>,
    ) -> OrmResult<u64> {
        let keys = self.pivot(relation)?;
        let mut q = QueryState::new(keys.table, false);
        q.begin_delete().where_([(keys.foreign, "=", id.into())]);
        if let Some(related_id) = related_id {
            q.where_([(keys.related, "=", related_id)]);
        }
        let rendered = q.render()?;
        self.conn.execute(&rendered.sql, &rendered.params).await
    }

    /// Make the pivot rows for `id` exactly `related_ids`.
    ///
    /// Detaches everything, then attaches each id, in one transaction.
    pub async fn sync<I, V>(&self, id: impl Into<Value>, related_ids: I, relation: &str) -> OrmResult<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let id = id.into();
        let related_ids: Vec<Value> = related_ids.into_iter().map(Into::into).collect();
        // fail before opening a transaction
        self.pivot(relation)?;

        crate::transaction!(self.conn, {
            self.detach(id.clone(), relation, None).await?;
            for related_id in related_ids {
                self.attach(id.clone(), related_id, relation, Vec::<(String, Value)>::new())
                    .await?;
            }
            Ok::<(), OrmError>(())
        })
    }
}
