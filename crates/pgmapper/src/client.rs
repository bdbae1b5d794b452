//! Connection adapter: the single backend handle every mapper executes through.

use crate::config::ConnectConfig;
use crate::error::{OrmError, OrmResult};
use crate::logging::SqlLogger;
use crate::transaction::TransactionDepth;
use crate::value::{Record, Value, decode_row};
use std::future::Future;
use std::sync::Mutex;
use std::time::Instant;
use tokio_postgres::NoTls;
use tokio_postgres::types::ToSql;

/// The interface a mapper needs from the relational backend.
///
/// Statements arrive fully rendered with `$1, $2, ...` placeholders, and rows
/// come back already decoded into [`Record`]s. Implementations own one
/// session, so transactions opened with [`Connection::begin`] cover every
/// statement issued through the same handle until commit or rollback.
pub trait Connection: Send + Sync {
    /// Execute a statement and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = OrmResult<Vec<Record>>> + Send;

    /// Execute a statement that returns no rows; returns the affected row count.
    fn execute(&self, sql: &str, params: &[Value]) -> impl Future<Output = OrmResult<u64>> + Send;

    /// Execute an `INSERT ... RETURNING <key>` and remember the returned key.
    ///
    /// The default implementation runs [`Connection::query`] and reads the first
    /// column of the first row; it does not record the key, so implementations
    /// that support [`Connection::last_insert_id`] should override it.
    fn insert(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = OrmResult<Option<Value>>> + Send {
        async move {
            let rows = self.query(sql, params).await?;
            Ok(rows
                .into_iter()
                .next()
                .and_then(|row| row.columns().get_index(0).map(|(_, v)| v.clone())))
        }
    }

    /// Key returned by the most recent [`Connection::insert`] on this handle.
    fn last_insert_id(&self) -> Option<Value> {
        None
    }

    /// Open a transaction (or a savepoint when one is already open).
    fn begin(&self) -> impl Future<Output = OrmResult<()>> + Send;

    /// Commit the innermost open transaction level.
    fn commit(&self) -> impl Future<Output = OrmResult<()>> + Send;

    /// Roll back the innermost open transaction level.
    fn rollback(&self) -> impl Future<Output = OrmResult<()>> + Send;
}

/// A [`Connection`] backed by one `tokio_postgres::Client`.
pub struct PgConnection {
    client: tokio_postgres::Client,
    tx: TransactionDepth,
    last_insert_id: Mutex<Option<Value>>,
    logger: SqlLogger,
}

impl PgConnection {
    /// Open a connection and spawn its driver task on the current tokio runtime.
    pub async fn connect(config: &ConnectConfig) -> OrmResult<Self> {
        let pg = config.to_pg_config()?;
        let (client, connection) = pg
            .connect(NoTls)
            .await
            .map_err(|e| OrmError::Connection(e.to_string()))?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(target: "pgmapper.sql", error = %e, "connection terminated");
            }
        });
        tracing::debug!(target: "pgmapper.sql", dbname = ?pg.get_dbname(), "connected");
        Ok(Self::from_client(client))
    }

    /// Wrap an already-connected client.
    pub fn from_client(client: tokio_postgres::Client) -> Self {
        Self {
            client,
            tx: TransactionDepth::new(),
            last_insert_id: Mutex::new(None),
            logger: SqlLogger::default(),
        }
    }

    /// Replace the statement logger.
    pub fn with_logger(mut self, logger: SqlLogger) -> Self {
        self.logger = logger;
        self
    }

    /// The underlying driver client.
    pub fn client(&self) -> &tokio_postgres::Client {
        &self.client
    }

    /// Whether a transaction is open on this connection.
    pub fn in_transaction(&self) -> bool {
        self.tx.in_transaction()
    }

    fn log_result<T>(
        &self,
        sql: &str,
        params: &[Value],
        started: Instant,
        result: &OrmResult<T>,
        rows: impl FnOnce(&T) -> u64,
    ) {
        match result {
            Ok(value) => self
                .logger
                .statement(sql, params.len(), started.elapsed(), rows(value)),
            Err(error) => self.logger.failure(sql, params.len(), error),
        }
    }

    async fn batch(&self, sql: &str) -> OrmResult<()> {
        let started = Instant::now();
        let result = self
            .client
            .batch_execute(sql)
            .await
            .map_err(OrmError::from_db_error);
        self.log_result(sql, &[], started, &result, |_| 0);
        result
    }
}

fn param_refs(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

impl Connection for PgConnection {
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Record>> {
        let started = Instant::now();
        let refs = param_refs(params);
        let result = match self.client.query(sql, &refs).await {
            Ok(rows) => rows.iter().map(decode_row).collect::<OrmResult<Vec<_>>>(),
            Err(e) => Err(OrmError::from_db_error(e)),
        };
        self.log_result(sql, params, started, &result, |rows| rows.len() as u64);
        result
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        let started = Instant::now();
        let refs = param_refs(params);
        let result = self
            .client
            .execute(sql, &refs)
            .await
            .map_err(OrmError::from_db_error);
        self.log_result(sql, params, started, &result, |n| *n);
        result
    }

    async fn insert(&self, sql: &str, params: &[Value]) -> OrmResult<Option<Value>> {
        let rows = self.query(sql, params).await?;
        let id = rows
            .into_iter()
            .next()
            .and_then(|row| row.columns().get_index(0).map(|(_, v)| v.clone()));
        if let Some(id) = &id {
            *self
                .last_insert_id
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(id.clone());
        }
        Ok(id)
    }

    fn last_insert_id(&self) -> Option<Value> {
        self.last_insert_id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    async fn begin(&self) -> OrmResult<()> {
        self.batch(&self.tx.begin_sql()).await?;
        self.tx.entered();
        Ok(())
    }

    async fn commit(&self) -> OrmResult<()> {
        let sql = self.tx.commit_sql()?;
        let result = self.batch(&sql).await;
        self.tx.exited();
        result
    }

    async fn rollback(&self) -> OrmResult<()> {
        let sql = self.tx.rollback_sql()?;
        let result = self.batch(&sql).await;
        self.tx.exited();
        result
    }
}

// Lets mappers and helpers borrow a connection they were handed by reference.
impl<C: Connection> Connection for &C {
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = OrmResult<Vec<Record>>> + Send {
        (*self).query(sql, params)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> impl Future<Output = OrmResult<u64>> + Send {
        (*self).execute(sql, params)
    }

    fn insert(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = OrmResult<Option<Value>>> + Send {
        (*self).insert(sql, params)
    }

    fn last_insert_id(&self) -> Option<Value> {
        (*self).last_insert_id()
    }

    fn begin(&self) -> impl Future<Output = OrmResult<()>> + Send {
        (*self).begin()
    }

    fn commit(&self) -> impl Future<Output = OrmResult<()>> + Send {
        (*self).commit()
    }

    fn rollback(&self) -> impl Future<Output = OrmResult<()>> + Send {
        (*self).rollback()
    }
}
