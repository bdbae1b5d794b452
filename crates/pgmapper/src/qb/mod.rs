//! Structured query state for the builder surface.
//!
//! [`QueryState`] records clauses and named bindings as the chain is built and
//! renders them once, at execution time, into a statement with `$n`
//! placeholders:
//!
//! ```ignore
//! use pgmapper::qb::QueryState;
//!
//! let mut q = QueryState::new("articles", false);
//! q.all()
//!     .where_([("status", "=", "published")])
//!     .where_in("category_id", [1, 2])
//!     .order_by("created_at", "DESC")
//!     .limit(10);
//!
//! assert_eq!(
//!     q.to_sql()?,
//!     "SELECT * FROM articles WHERE status = $1 AND category_id IN ($2, $3) \
//!      ORDER BY created_at DESC LIMIT 10"
//! );
//! ```

mod condition;
mod render;
mod state;

pub use condition::Condition;
pub use render::Rendered;
pub use state::{QueryState, Trashed, render_insert};

pub(crate) use render::rewrite_named;

#[cfg(test)]
mod tests;
