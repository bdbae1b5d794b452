//! Transaction helpers: the [`transaction!`] macro and nesting bookkeeping.
//!
//! A [`Connection`](crate::Connection) keeps one transaction open at a time on
//! its single backend session. Nested `begin()` calls become savepoints, so a
//! helper that opens its own transaction (like `insert_many`) composes with a
//! caller's outer transaction instead of committing it early.
//!
//! # Example
//!
//! ```ignore
//! pgmapper::transaction!(&conn, {
//!     Article::query(&conn).set("title", "a").insert().await?;
//!     Article::query(&conn).set("title", "b").insert().await?;
//!     Ok::<(), OrmError>(())
//! })?;
//! ```

use crate::error::{OrmError, OrmResult};
use std::sync::atomic::{AtomicU32, Ordering};

/// Runs the given block inside a transaction on a [`Connection`](crate::Connection).
///
/// - Begins via `Connection::begin`.
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)`.
///
/// The block must evaluate to `pgmapper::OrmResult<T>`.
#[macro_export]
macro_rules! transaction {
    ($conn:expr, $body:block) => {{
        let __pgmapper_conn = $conn;
        $crate::Connection::begin(__pgmapper_conn).await?;

        let __pgmapper_tx_body_result = async { $body }.await;
        match __pgmapper_tx_body_result {
            Ok(value) => {
                $crate::Connection::commit(__pgmapper_conn).await?;
                Ok(value)
            }
            Err(error) => match $crate::Connection::rollback(__pgmapper_conn).await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::OrmError::Transaction(format!(
                    "{error} (rollback failed: {rollback_err})"
                ))),
            },
        }
    }};
}

/// Open-transaction depth for one backend session.
///
/// Depth 0 means autocommit. The outermost level uses `BEGIN`/`COMMIT`/`ROLLBACK`;
/// every deeper level uses a savepoint named after its depth.
#[derive(Debug, Default)]
pub struct TransactionDepth {
    depth: AtomicU32,
}

impl TransactionDepth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> u32 {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn in_transaction(&self) -> bool {
        self.depth() > 0
    }

    /// Statement that opens the next level.
    pub fn begin_sql(&self) -> String {
        match self.depth() {
            0 => "BEGIN".to_string(),
            depth => format!("SAVEPOINT {}", savepoint_name(depth)),
        }
    }

    /// Statement that commits the innermost open level.
    pub fn commit_sql(&self) -> OrmResult<String> {
        match self.depth() {
            0 => Err(OrmError::Transaction(
                "commit called with no open transaction".to_string(),
            )),
            1 => Ok("COMMIT".to_string()),
            depth => Ok(format!("RELEASE SAVEPOINT {}", savepoint_name(depth - 1))),
        }
    }

    /// Statement that rolls back the innermost open level.
    pub fn rollback_sql(&self) -> OrmResult<String> {
        match self.depth() {
            0 => Err(OrmError::Transaction(
                "rollback called with no open transaction".to_string(),
            )),
            1 => Ok("ROLLBACK".to_string()),
            depth => Ok(format!("ROLLBACK TO SAVEPOINT {}", savepoint_name(depth - 1))),
        }
    }

    /// Record that the statement from [`begin_sql`](Self::begin_sql) succeeded.
    pub fn entered(&self) {
        self.depth.fetch_add(1, Ordering::SeqCst);
    }

    /// Record that the innermost level was committed or rolled back.
    pub fn exited(&self) {
        let _ = self
            .depth
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |d| d.checked_sub(1));
    }
}

fn savepoint_name(level: u32) -> String {
    format!("pgmapper_sp_{level}")
}
