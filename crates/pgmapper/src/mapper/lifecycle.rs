//! Lifecycle policy: timestamps and soft deletes over insert, update and delete.

use super::Mapper;
use crate::client::Connection;
use crate::error::OrmResult;
use crate::qb::{Condition, render_insert};
use crate::value::Value;
use indexmap::IndexMap;

pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";
pub const DELETED_AT: &str = "deleted_at";

impl<C: Connection> Mapper<'_, C> {
    fn stamp(&mut self, column: &str, now: &Value) {
        if !self.columns.contains_key(column) {
            self.columns.insert(column.to_string(), now.clone());
        }
    }

    /// Insert the mapper's columns as a new row.
    ///
    /// With timestamps on, `created_at` and `updated_at` are set unless
    /// already present. The returned key is kept for
    /// [`last_insert_id`](Self::last_insert_id).
    pub async fn insert(&mut self) -> OrmResult<bool> {
        if self.meta.table.timestamps {
            let now = Value::now();
            self.stamp(CREATED_AT, &now);
            self.stamp(UPDATED_AT, &now);
        }
        let rendered = render_insert(
            self.meta.table.table,
            &self.columns,
            Some(self.meta.table.primary_key),
        );
        self.last_insert_id = self.conn.insert(&rendered.sql, &rendered.params).await?;
        Ok(true)
    }

    /// Prepare `UPDATE table SET <columns>`.
    ///
    /// Nothing runs until the chain continues with `where_(...)` and
    /// `execute()`; the `where_` call binds the SET values.
    pub fn update(&mut self) -> &mut Self {
        if self.meta.table.timestamps {
            self.stamp(UPDATED_AT, &Value::now());
        }
        self.state.begin_update(self.columns.clone());
        self
    }

    fn soft_update(&mut self, deleted_at: Value) -> &mut Self {
        let mut values = IndexMap::new();
        values.insert(DELETED_AT.to_string(), deleted_at.clone());
        self.columns.insert(DELETED_AT.to_string(), deleted_at);
        if self.meta.table.timestamps {
            let now = Value::now();
            values.insert(UPDATED_AT.to_string(), now.clone());
            self.columns.insert(UPDATED_AT.to_string(), now);
        }
        self.state.begin_update(values);
        self
    }

    /// Prepare a delete; chain `where_(...)` and `execute()`.
    ///
    /// Soft-deleting models set `deleted_at` instead of removing rows.
    pub fn delete(&mut self) -> &mut Self {
        if self.meta.table.soft_deletes {
            return self.soft_update(Value::now());
        }
        self.state.begin_delete();
        self
    }

    /// Prepare a literal `DELETE`, even on soft-deleting models.
    pub fn force_delete(&mut self) -> &mut Self {
        self.state.begin_delete();
        self
    }

    /// Prepare clearing `deleted_at`; chain `where_(...)` and `execute()`.
    pub fn restore(&mut self) -> &mut Self {
        self.soft_update(Value::Null)
    }

    /// Insert every record inside one transaction.
    ///
    /// Returns `false` for empty input, and `false` after rolling back when
    /// any insert fails. The mapper's own columns are left as they were.
    pub async fn insert_many<I, R, K, V>(&mut self, records: I) -> OrmResult<bool>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let records: Vec<IndexMap<String, Value>> = records
            .into_iter()
            .map(|r| r.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
            .collect();
        if records.is_empty() {
            return Ok(false);
        }

        let saved = std::mem::take(&mut self.columns);
        let result = self.insert_each(records).await;
        self.columns = saved;
        result
    }

    async fn insert_each(&mut self, records: Vec<IndexMap<String, Value>>) -> OrmResult<bool> {
        self.conn.begin().await?;
        for columns in records {
            self.columns = columns;
            if let Err(error) = self.insert().await {
                tracing::warn!(
                    target: "pgmapper.sql",
                    table = self.meta.table.table,
                    error = %error,
                    "insert_many failed, rolling back"
                );
                if let Err(rollback_error) = self.conn.rollback().await {
                    tracing::warn!(target: "pgmapper.sql", error = %rollback_error, "rollback failed");
                }
                return Ok(false);
            }
        }
        if let Err(error) = self.conn.commit().await {
            tracing::warn!(target: "pgmapper.sql", error = %error, "insert_many commit failed");
            return Ok(false);
        }
        Ok(true)
    }

    /// Update the row matching `attributes` with `values`, or insert both when none matches.
    pub async fn update_or_create<A, B, K1, V1, K2, V2>(
        &mut self,
        attributes: A,
        values: B,
    ) -> OrmResult<bool>
    where
        A: IntoIterator<Item = (K1, V1)>,
        B: IntoIterator<Item = (K2, V2)>,
        K1: Into<String>,
        V1: Into<Value>,
        K2: Into<String>,
        V2: Into<Value>,
    {
        let attributes: Vec<(String, Value)> = attributes
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let matching = || {
            attributes
                .iter()
                .map(|(column, value)| Condition::new(column.as_str(), "=", value))
        };

        self.state.all().where_(matching());
        let existing = self.get().await?;

        self.fill(attributes.iter().map(|(k, v)| (k.as_str(), v)));
        self.fill(values);

        if existing.is_some() {
            self.update().where_(matching()).execute().await
        } else {
            self.insert().await
        }
    }
}
