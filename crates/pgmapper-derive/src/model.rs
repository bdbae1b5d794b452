//! Model derive macro implementation

use crate::attrs::parse_model_attrs;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Result};

pub(crate) fn expand(input: DeriveInput) -> Result<TokenStream> {
    let attrs = parse_model_attrs(&input)?;
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let table = attrs.table_name(&input);
    if table.is_empty() {
        return Err(syn::Error::new_spanned(
            &input,
            "Model requires a non-empty #[orm(table = \"table_name\")]",
        ));
    }

    let primary_key = attrs.primary_key.as_ref().map(|pk| {
        quote! { const PRIMARY_KEY: &'static str = #pk; }
    });
    let timestamps = attrs.timestamps.map(|on| {
        quote! { const TIMESTAMPS: bool = #on; }
    });
    let soft_deletes = attrs.soft_deletes.map(|on| {
        quote! { const SOFT_DELETES: bool = #on; }
    });
    let relations = attrs.relations.as_ref().map(|path| {
        quote! {
            fn relations(relations: &mut ::pgmapper::RelationRegistry) {
                #path(relations)
            }
        }
    });
    let scopes = attrs.scopes.as_ref().map(|path| {
        quote! {
            fn scopes(scopes: &mut ::pgmapper::ScopeRegistry) {
                #path(scopes)
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::pgmapper::Model for #name #ty_generics #where_clause {
            const TABLE: &'static str = #table;
            #primary_key
            #timestamps
            #soft_deletes
            #relations
            #scopes
        }
    })
}
