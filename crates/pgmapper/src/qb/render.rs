//! Turning named bindings into `$n` placeholders.

use crate::error::{OrmError, OrmResult};
use crate::value::Value;
use indexmap::IndexMap;

/// A statement ready for the backend: SQL with `$1, $2, ...` and the values in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Assigns positional numbers to named bindings in order of first reference.
///
/// A name referenced twice reuses its number; a binding that is never
/// referenced is not sent.
pub(crate) struct Params<'a> {
    bindings: &'a IndexMap<String, Value>,
    numbers: IndexMap<String, usize>,
    values: Vec<Value>,
}

impl<'a> Params<'a> {
    pub fn new(bindings: &'a IndexMap<String, Value>) -> Self {
        Self {
            bindings,
            numbers: IndexMap::new(),
            values: Vec::new(),
        }
    }

    /// `$n` for the named binding.
    pub fn placeholder(&mut self, name: &str) -> OrmResult<String> {
        if let Some(n) = self.numbers.get(name) {
            return Ok(format!("${n}"));
        }
        let value = self
            .bindings
            .get(name)
            .ok_or_else(|| OrmError::binding_mismatch(name))?;
        self.values.push(value.clone());
        let n = self.values.len();
        self.numbers.insert(name.to_string(), n);
        Ok(format!("${n}"))
    }

    pub fn finish(self, sql: String) -> Rendered {
        Rendered {
            sql,
            params: self.values,
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Rewrite `:name` placeholders in literal SQL to `$n`.
///
/// `::type` casts and anything inside single-quoted literals or double-quoted
/// identifiers are left alone.
pub(crate) fn rewrite_named(sql: &str, bindings: &IndexMap<String, Value>) -> OrmResult<Rendered> {
    let mut params = Params::new(bindings);
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                out.push(c);
            }
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                out.push_str("::");
            }
            ':' if chars.peek().copied().is_some_and(is_ident_start) => {
                let mut name = String::new();
                while let Some(&n) = chars.peek() {
                    if !is_ident_char(n) {
                        break;
                    }
                    name.push(n);
                    chars.next();
                }
                out.push_str(&params.placeholder(&name)?);
            }
            _ => out.push(c),
        }
    }
    Ok(params.finish(out))
}
