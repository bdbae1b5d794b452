//! Condition lists and the clause nodes they become.

use crate::error::OrmResult;
use crate::qb::render::Params;
use crate::value::Value;

/// One entry of a `where_` / `having` list: `(column, operator, value, [conjunction])`.
///
/// Column, operator and conjunction are written into the statement verbatim;
/// only the value is sent as a bound parameter. Never build them from
/// untrusted input.
///
/// Tuples convert directly:
///
/// ```ignore
/// mapper.where_([("status", "=", "published")]);
/// mapper.where_([
///     Condition::from(("views", ">", 100)).or(),
///     Condition::from(("featured", "=", true)),
/// ]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub operator: String,
    pub value: Value,
    /// Keyword joining this condition to the next one (`AND` when absent).
    pub conjunction: Option<String>,
}

impl Condition {
    pub fn new(
        column: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            column: column.into(),
            operator: operator.into(),
            value: value.into(),
            conjunction: None,
        }
    }

    /// Set the keyword joining this condition to the next one.
    pub fn conjunction(mut self, keyword: impl Into<String>) -> Self {
        self.conjunction = Some(keyword.into());
        self
    }

    pub fn and(self) -> Self {
        self.conjunction("AND")
    }

    pub fn or(self) -> Self {
        self.conjunction("OR")
    }
}

impl<C, O, V> From<(C, O, V)> for Condition
where
    C: Into<String>,
    O: Into<String>,
    V: Into<Value>,
{
    fn from((column, operator, value): (C, O, V)) -> Self {
        Condition::new(column, operator, value)
    }
}

impl<C, O, V, J> From<(C, O, V, J)> for Condition
where
    C: Into<String>,
    O: Into<String>,
    V: Into<Value>,
    J: Into<String>,
{
    fn from((column, operator, value, conjunction): (C, O, V, J)) -> Self {
        Condition::new(column, operator, value).conjunction(conjunction)
    }
}

/// A single boolean test inside WHERE or HAVING, referring to bindings by name.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Predicate {
    Compare {
        column: String,
        operator: String,
        placeholder: String,
    },
    In {
        column: String,
        placeholders: Vec<String>,
        negated: bool,
    },
    Between {
        column: String,
        start: String,
        end: String,
    },
    Null {
        column: String,
        negated: bool,
    },
}

impl Predicate {
    fn render(&self, out: &mut String, params: &mut Params<'_>) -> OrmResult<()> {
        match self {
            Predicate::Compare {
                column,
                operator,
                placeholder,
            } => {
                out.push_str(column);
                out.push(' ');
                out.push_str(operator);
                out.push(' ');
                out.push_str(&params.placeholder(placeholder)?);
            }
            Predicate::In {
                column,
                placeholders,
                negated,
            } => {
                out.push_str(column);
                out.push_str(if *negated { " NOT IN (" } else { " IN (" });
                for (i, name) in placeholders.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&params.placeholder(name)?);
                }
                out.push(')');
            }
            Predicate::Between { column, start, end } => {
                out.push_str(column);
                out.push_str(" BETWEEN ");
                out.push_str(&params.placeholder(start)?);
                out.push_str(" AND ");
                out.push_str(&params.placeholder(end)?);
            }
            Predicate::Null { column, negated } => {
                out.push_str(column);
                out.push_str(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
        }
        Ok(())
    }
}

/// A predicate plus the keyword that joins it to the following clause.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Clause {
    pub predicate: Predicate,
    pub conjunction: Option<String>,
}

impl Clause {
    pub fn new(predicate: Predicate) -> Self {
        Self {
            predicate,
            conjunction: None,
        }
    }
}

/// Render a clause list; a conjunction on the final clause has nothing to join and is dropped.
pub(crate) fn render_clauses(clauses: &[Clause], params: &mut Params<'_>) -> OrmResult<String> {
    let mut out = String::new();
    for (i, clause) in clauses.iter().enumerate() {
        if i > 0 {
            let keyword = clauses[i - 1].conjunction.as_deref().unwrap_or("AND");
            out.push(' ');
            out.push_str(keyword);
            out.push(' ');
        }
        clause.predicate.render(&mut out, params)?;
    }
    Ok(out)
}
