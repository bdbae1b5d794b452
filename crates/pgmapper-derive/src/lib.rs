//! Derive macros for pgmapper
//!
//! Provides `#[derive(Model)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attrs;
mod model;

/// Derive the `pgmapper::Model` declaration for a type.
///
/// # Example
///
/// ```ignore
/// use pgmapper::{Model, RelationRegistry};
///
/// #[derive(Model)]
/// #[orm(table = "posts", soft_deletes, relations = Post::declare_relations)]
/// struct Post;
///
/// impl Post {
///     fn declare_relations(r: &mut RelationRegistry) {
///         r.belongs_to::<User>("author", "user_id", "id");
///     }
/// }
/// ```
///
/// # Attributes
///
/// - `#[orm(table = "name")]` - Table name (default: the struct name in snake_case)
/// - `#[orm(primary_key = "column")]` - Primary key column (default: `id`)
/// - `#[orm(timestamps = false)]` - Disable `created_at` / `updated_at` stamping
/// - `#[orm(soft_deletes)]` - Delete by setting `deleted_at`
/// - `#[orm(relations = path)]` - `fn(&mut RelationRegistry)` declaring relations
/// - `#[orm(scopes = path)]` - `fn(&mut ScopeRegistry)` registering scopes
#[proc_macro_derive(Model, attributes(orm))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    model::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
