//! `tracing` output for executed statements.

use crate::error::OrmError;
use std::time::Duration;
use tracing::Level;

/// Truncate a string to at most `max_bytes`, respecting UTF-8 char boundaries.
pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

/// Statement category, derived from the leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Transaction,
    Other,
}

impl StatementKind {
    pub fn from_sql(sql: &str) -> Self {
        let head = sql.trim_start();
        let keyword = |kw: &str| {
            head.get(0..kw.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(kw))
        };
        if keyword("SELECT") || keyword("WITH") {
            Self::Select
        } else if keyword("INSERT") {
            Self::Insert
        } else if keyword("UPDATE") {
            Self::Update
        } else if keyword("DELETE") {
            Self::Delete
        } else if keyword("BEGIN")
            || keyword("COMMIT")
            || keyword("ROLLBACK")
            || keyword("SAVEPOINT")
            || keyword("RELEASE")
        {
            Self::Transaction
        } else {
            Self::Other
        }
    }
}

/// Emits one `tracing` event per executed statement under the `pgmapper.sql` target.
///
/// Successful statements are logged at [`SqlLogger::level`]; backend failures
/// always at `WARN`.
#[derive(Debug, Clone)]
pub struct SqlLogger {
    /// Tracing event level for successful statements.
    pub level: Level,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for SqlLogger {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_sql_length: Some(200),
        }
    }
}

impl SqlLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the tracing event level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set maximum SQL length to display.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    fn truncate_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }

    pub(crate) fn statement(&self, sql: &str, param_count: usize, elapsed: Duration, rows: u64) {
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let sql = self.truncate_sql(sql);
        let kind = StatementKind::from_sql(&sql);
        emit_at_level!(
            self.level,
            target: "pgmapper.sql",
            kind = ?kind,
            param_count,
            rows,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            sql = %sql,
        );
    }

    pub(crate) fn failure(&self, sql: &str, param_count: usize, error: &OrmError) {
        tracing::warn!(
            target: "pgmapper.sql",
            param_count,
            sql = %self.truncate_sql(sql),
            error = %error,
            "statement failed"
        );
    }
}
