//! # pgmapper
//!
//! A fluent query builder and lightweight table mapper for PostgreSQL.
//!
//! ## Features
//!
//! - **Fluent chains**: `all().where_(...).order_by(...).limit(...)`, rendered to
//!   `$n`-parameterized SQL only when the chain executes
//! - **Dynamic rows**: results come back as ordered [`Record`]s of [`Value`]s
//! - **Lifecycle policy**: `created_at` / `updated_at` stamping and soft deletes
//! - **Relations**: has-one, has-many, belongs-to and many-to-many, loaded lazily
//!   or eagerly, with pivot-table `attach` / `detach` / `sync`
//! - **Scopes**: named, reusable query modifiers registered per model
//! - **Statement logging**: every statement is traced under `pgmapper.sql`
//!
//! Column names, operators and conjunctions are written into statements as
//! given; only values are bound as parameters. Never build them from user input.
//!
//! ## Example
//!
//! ```ignore
//! use pgmapper::{ConnectConfig, Model, PgConnection, RelationRegistry};
//!
//! #[derive(Model)]
//! #[orm(table = "articles", soft_deletes, relations = Article::relations_of)]
//! struct Article;
//!
//! impl Article {
//!     fn relations_of(r: &mut RelationRegistry) {
//!         r.belongs_to::<User>("author", "user_id", "id");
//!     }
//! }
//!
//! let conn = PgConnection::connect(&ConnectConfig::from_env()?).await?;
//!
//! // SELECT
//! let rows = Article::query(&conn)
//!     .all()
//!     .where_([("status", "=", "published")])
//!     .with(["author"])
//!     .get_all()
//!     .await?;
//!
//! // INSERT
//! let mut article = Article::query(&conn);
//! article.set("title", "Hello").set("status", "draft");
//! article.insert().await?;
//!
//! // UPDATE
//! Article::query(&conn)
//!     .set("status", "published")
//!     .update()
//!     .where_([("id", "=", 1)])
//!     .execute()
//!     .await?;
//!
//! // DELETE (sets deleted_at)
//! Article::query(&conn)
//!     .delete()
//!     .where_([("id", "=", 1)])
//!     .execute()
//!     .await?;
//! ```

// Lets `#[derive(Model)]` output (which names `::pgmapper`) compile inside this crate.
extern crate self as pgmapper;

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod mapper;
pub mod model;
pub mod qb;
pub mod relation;
pub mod transaction;
pub mod value;

pub use client::{Connection, PgConnection};
pub use config::ConnectConfig;
pub use error::{OrmError, OrmResult};
pub use logging::{SqlLogger, StatementKind};
pub use mapper::Mapper;
pub use model::{Model, ModelMeta, Scope, ScopeRegistry, TableRef, model_meta};
pub use qb::{Condition, QueryState, Rendered, Trashed};
pub use relation::{Relation, RelationRegistry, pivot_table_name};
pub use value::{Record, Related, Value};

#[cfg(feature = "derive")]
pub use pgmapper_derive::Model;
