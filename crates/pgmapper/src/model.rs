//! The model declaration contract and its per-type metadata cache.

use crate::client::Connection;
use crate::mapper::Mapper;
use crate::qb::QueryState;
use crate::relation::RelationRegistry;
use crate::value::Value;
use indexmap::IndexMap;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// A table the mapper can query.
///
/// Implement it by hand or with `#[derive(Model)]`:
///
/// ```ignore
/// struct Article;
///
/// impl Model for Article {
///     const TABLE: &'static str = "articles";
///     const SOFT_DELETES: bool = true;
///
///     fn scopes(s: &mut ScopeRegistry) {
///         s.register("published", |q, _| {
///             q.where_([("status", "=", "published")]);
///         });
///     }
/// }
///
/// let rows = Article::query(&conn).all().get_all().await?;
/// ```
pub trait Model: Send + Sync + 'static {
    /// Table name.
    const TABLE: &'static str;

    /// Primary key column.
    const PRIMARY_KEY: &'static str = "id";

    /// Stamp `created_at` / `updated_at` on writes.
    const TIMESTAMPS: bool = true;

    /// Delete by setting `deleted_at` and hide such rows from reads.
    const SOFT_DELETES: bool = false;

    /// Declare relations. Runs once per model type.
    fn relations(_relations: &mut RelationRegistry) {}

    /// Register named scopes. Runs once per model type.
    fn scopes(_scopes: &mut ScopeRegistry) {}

    /// A fresh mapper for this table.
    fn query<C: Connection>(conn: &C) -> Mapper<'_, C>
    where
        Self: Sized,
    {
        Mapper::new::<Self>(conn)
    }
}

/// Table-level facts about a model, usable without its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRef {
    pub table: &'static str,
    pub primary_key: &'static str,
    pub timestamps: bool,
    pub soft_deletes: bool,
}

impl TableRef {
    pub fn of<M: Model>() -> Self {
        Self {
            table: M::TABLE,
            primary_key: M::PRIMARY_KEY,
            timestamps: M::TIMESTAMPS,
            soft_deletes: M::SOFT_DELETES,
        }
    }

    /// Fresh query state for this table.
    pub fn query_state(&self) -> QueryState {
        QueryState::new(self.table, self.soft_deletes)
    }
}

/// A reusable query modifier, called with the chain's state and the caller's arguments.
pub type Scope = Arc<dyn Fn(&mut QueryState, &[Value]) + Send + Sync>;

/// Named scopes of one model.
#[derive(Clone, Default)]
pub struct ScopeRegistry {
    scopes: IndexMap<String, Scope>,
}

impl fmt::Debug for ScopeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.scopes.keys()).finish()
    }
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `scope` under `name`, replacing any earlier one.
    pub fn register<F>(&mut self, name: &str, scope: F) -> &mut Self
    where
        F: Fn(&mut QueryState, &[Value]) + Send + Sync + 'static,
    {
        self.scopes.insert(name.to_string(), Arc::new(scope));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Scope> {
        self.scopes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.scopes.contains_key(name)
    }
}

/// Everything a mapper needs to know about a model type.
#[derive(Debug)]
pub struct ModelMeta {
    pub table: TableRef,
    pub relations: RelationRegistry,
    pub scopes: ScopeRegistry,
}

impl ModelMeta {
    fn build<M: Model>() -> Self {
        let table = TableRef::of::<M>();
        let mut relations = RelationRegistry::new(table);
        M::relations(&mut relations);
        let mut scopes = ScopeRegistry::new();
        M::scopes(&mut scopes);
        Self {
            table,
            relations,
            scopes,
        }
    }

    /// Metadata for a table with no relations or scopes.
    pub(crate) fn bare(table: TableRef) -> Self {
        Self {
            table,
            relations: RelationRegistry::new(table),
            scopes: ScopeRegistry::new(),
        }
    }
}

type MetaCache = RwLock<HashMap<TypeId, Arc<ModelMeta>>>;

fn meta_cache() -> &'static MetaCache {
    static CACHE: OnceLock<MetaCache> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Cached metadata for `M`, built on first use.
pub fn model_meta<M: Model>() -> Arc<ModelMeta> {
    let key = TypeId::of::<M>();
    if let Some(meta) = meta_cache()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
    {
        return Arc::clone(meta);
    }

    // Built outside the lock: declarations may look up other models.
    let built = Arc::new(ModelMeta::build::<M>());
    let mut cache = meta_cache()
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    Arc::clone(cache.entry(key).or_insert(built))
}
