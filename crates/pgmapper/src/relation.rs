//! Relationship declarations.
//!
//! Each model declares its relations once, in [`Model::relations`]; the
//! resulting [`RelationRegistry`] is cached per model type and consulted by
//! the relation loaders and the pivot-table helpers.
//!
//! ```ignore
//! impl Model for Post {
//!     const TABLE: &'static str = "posts";
//!
//!     fn relations(r: &mut RelationRegistry) {
//!         r.belongs_to::<User>("author", "user_id", "id")
//!             .has_many::<Comment>("comments", "post_id", "id")
//!             .belongs_to_many::<Tag>("tags", None, "post_id", "tag_id");
//!     }
//! }
//! ```

use crate::model::{Model, TableRef};
use indexmap::IndexMap;

/// One declared relation and the keys it joins on.
#[derive(Debug, Clone, PartialEq)]
pub enum Relation {
    /// `related.foreign_key = parent.local_key`, first match.
    HasOne {
        related: TableRef,
        foreign_key: String,
        local_key: String,
    },
    /// `related.foreign_key = parent.local_key`, all matches.
    HasMany {
        related: TableRef,
        foreign_key: String,
        local_key: String,
    },
    /// `related.owner_key = parent.foreign_key`.
    BelongsTo {
        related: TableRef,
        foreign_key: String,
        owner_key: String,
    },
    /// Many-to-many through `pivot`.
    BelongsToMany {
        related: TableRef,
        pivot: String,
        /// Pivot column holding the parent's key
        foreign_pivot_key: String,
        /// Pivot column holding the related row's key
        related_pivot_key: String,
        /// Parent column referenced by `foreign_pivot_key`
        parent_key: String,
        /// Related column referenced by `related_pivot_key`
        related_key: String,
    },
}

impl Relation {
    pub fn related(&self) -> &TableRef {
        match self {
            Relation::HasOne { related, .. }
            | Relation::HasMany { related, .. }
            | Relation::BelongsTo { related, .. }
            | Relation::BelongsToMany { related, .. } => related,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Relation::HasOne { .. } => "has_one",
            Relation::HasMany { .. } => "has_many",
            Relation::BelongsTo { .. } => "belongs_to",
            Relation::BelongsToMany { .. } => "belongs_to_many",
        }
    }
}

/// Default pivot table for two tables: both names in lexicographic order, joined by `_`.
///
/// Symmetric, so either side of a many-to-many pair resolves to the same table.
pub fn pivot_table_name(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}_{b}")
    } else {
        format!("{b}_{a}")
    }
}

/// Relations declared by one model, by name.
///
/// When a name is declared twice the first declaration wins.
#[derive(Debug, Clone)]
pub struct RelationRegistry {
    owner: TableRef,
    relations: IndexMap<String, Relation>,
}

impl RelationRegistry {
    pub(crate) fn new(owner: TableRef) -> Self {
        Self {
            owner,
            relations: IndexMap::new(),
        }
    }

    fn register(&mut self, name: &str, relation: Relation) -> &mut Self {
        self.relations.entry(name.to_string()).or_insert(relation);
        self
    }

    pub fn has_one<R: Model>(&mut self, name: &str, foreign_key: &str, local_key: &str) -> &mut Self {
        self.register(
            name,
            Relation::HasOne {
                related: TableRef::of::<R>(),
                foreign_key: foreign_key.to_string(),
                local_key: local_key.to_string(),
            },
        )
    }

    pub fn has_many<R: Model>(&mut self, name: &str, foreign_key: &str, local_key: &str) -> &mut Self {
        self.register(
            name,
            Relation::HasMany {
                related: TableRef::of::<R>(),
                foreign_key: foreign_key.to_string(),
                local_key: local_key.to_string(),
            },
        )
    }

    pub fn belongs_to<R: Model>(&mut self, name: &str, foreign_key: &str, owner_key: &str) -> &mut Self {
        self.register(
            name,
            Relation::BelongsTo {
                related: TableRef::of::<R>(),
                foreign_key: foreign_key.to_string(),
                owner_key: owner_key.to_string(),
            },
        )
    }

    /// Declare a many-to-many relation through `pivot`, or through
    /// [`pivot_table_name`] of both tables when `None`.
    ///
    /// The pivot columns reference the parent's and the related model's primary keys.
    pub fn belongs_to_many<R: Model>(
        &mut self,
        name: &str,
        pivot: Option<&str>,
        foreign_pivot_key: &str,
        related_pivot_key: &str,
    ) -> &mut Self {
        let related = TableRef::of::<R>();
        let pivot = pivot
            .map(str::to_string)
            .unwrap_or_else(|| pivot_table_name(self.owner.table, related.table));
        let relation = Relation::BelongsToMany {
            pivot,
            foreign_pivot_key: foreign_pivot_key.to_string(),
            related_pivot_key: related_pivot_key.to_string(),
            parent_key: self.owner.primary_key.to_string(),
            related_key: related.primary_key.to_string(),
            related,
        };
        self.register(name, relation)
    }

    pub fn get(&self, name: &str) -> Option<&Relation> {
        self.relations.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.relations.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}
