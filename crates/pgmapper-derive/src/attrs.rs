//! Struct-level `#[orm(...)]` attribute parsing.

use heck::ToSnakeCase;
use syn::parse::{Parse, ParseStream};
use syn::{DeriveInput, Result, Token};

/// Options collected from every `#[orm(...)]` on the struct.
#[derive(Default)]
pub(crate) struct ModelAttrs {
    pub table: Option<String>,
    pub primary_key: Option<String>,
    pub timestamps: Option<bool>,
    pub soft_deletes: Option<bool>,
    pub relations: Option<syn::Path>,
    pub scopes: Option<syn::Path>,
}

impl ModelAttrs {
    fn merge(&mut self, other: ModelAttrs) {
        self.table = other.table.or(self.table.take());
        self.primary_key = other.primary_key.or(self.primary_key.take());
        self.timestamps = other.timestamps.or(self.timestamps.take());
        self.soft_deletes = other.soft_deletes.or(self.soft_deletes.take());
        self.relations = other.relations.or(self.relations.take());
        self.scopes = other.scopes.or(self.scopes.take());
    }

    /// Table name, defaulting to the struct name in snake_case.
    pub fn table_name(&self, input: &DeriveInput) -> String {
        self.table
            .clone()
            .unwrap_or_else(|| input.ident.to_string().to_snake_case())
    }
}

/// `flag` or `flag = true|false`.
fn parse_flag(input: ParseStream) -> Result<bool> {
    if input.peek(Token![=]) {
        let _: Token![=] = input.parse()?;
        let value: syn::LitBool = input.parse()?;
        Ok(value.value)
    } else {
        Ok(true)
    }
}

impl Parse for ModelAttrs {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut attrs = ModelAttrs::default();

        while !input.is_empty() {
            let ident: syn::Ident = input.parse()?;
            match ident.to_string().as_str() {
                "table" => {
                    let _: Token![=] = input.parse()?;
                    attrs.table = Some(input.parse::<syn::LitStr>()?.value());
                }
                "primary_key" => {
                    let _: Token![=] = input.parse()?;
                    attrs.primary_key = Some(input.parse::<syn::LitStr>()?.value());
                }
                "timestamps" => attrs.timestamps = Some(parse_flag(input)?),
                "soft_deletes" => attrs.soft_deletes = Some(parse_flag(input)?),
                "relations" => {
                    let _: Token![=] = input.parse()?;
                    attrs.relations = Some(input.parse()?);
                }
                "scopes" => {
                    let _: Token![=] = input.parse()?;
                    attrs.scopes = Some(input.parse()?);
                }
                other => {
                    return Err(syn::Error::new(
                        ident.span(),
                        format!("unknown orm attribute `{other}`"),
                    ));
                }
            }

            if input.peek(Token![,]) {
                let _: Token![,] = input.parse()?;
            } else {
                break;
            }
        }

        if !input.is_empty() {
            return Err(input.error("expected `,` between orm attributes"));
        }
        Ok(attrs)
    }
}

/// Parse every struct-level `#[orm(...)]` attribute; later values win.
pub(crate) fn parse_model_attrs(input: &DeriveInput) -> Result<ModelAttrs> {
    let mut attrs = ModelAttrs::default();
    for attr in &input.attrs {
        if attr.path().is_ident("orm") {
            attrs.merge(attr.parse_args::<ModelAttrs>()?);
        }
    }
    Ok(attrs)
}
