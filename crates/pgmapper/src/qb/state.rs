//! The per-chain query accumulator.

use crate::error::{OrmError, OrmResult};
use crate::qb::condition::{Clause, Condition, Predicate, render_clauses};
use crate::qb::render::{Params, Rendered};
use crate::value::Value;
use indexmap::IndexMap;

/// Which rows a soft-deleting table exposes to reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trashed {
    /// Only rows whose `deleted_at` is null.
    #[default]
    Exclude,
    /// Every row.
    Include,
    /// Only rows whose `deleted_at` is set.
    Only,
}

#[derive(Debug, Clone, PartialEq)]
enum Verb {
    Select,
    Update,
    Delete,
}

/// Structured query state for one table.
///
/// Builder calls only record clauses and named bindings; the SQL text is
/// produced by [`render`](Self::render) when the chain executes. `all()`,
/// `select()`, `begin_update()` and `begin_delete()` start a new chain.
///
/// Trashed mode and the eager-load list survive those resets, so
/// `with_trashed().all()` and `all().with_trashed()` mean the same thing.
#[derive(Debug, Clone)]
pub struct QueryState {
    /// Table name
    table: String,
    /// Whether reads filter on `deleted_at`
    soft_deletes: bool,
    verb: Verb,
    /// Projection, accumulated across `select` calls
    selected_columns: Vec<String>,
    /// Aggregate expression appended to the projection
    aggregate: Option<String>,
    distinct: bool,
    /// Rendered JOIN clauses
    joins: Vec<String>,
    wheres: Vec<Clause>,
    group_by: Vec<String>,
    havings: Vec<Clause>,
    /// Rendered ORDER BY items
    order_by: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
    /// Placeholder name -> value
    bindings: IndexMap<String, Value>,
    /// Suffix for the next generated placeholder name
    next_binding: usize,
    /// SET columns of a pending update
    update_columns: Vec<String>,
    /// Values the next `where_` binds as `UP_<column>`
    update_values: IndexMap<String, Value>,
    update_pending: bool,
    trashed: Trashed,
    /// Relations to eager load
    eager: Vec<String>,
    /// First deferred build error
    build_error: Option<String>,
}

impl QueryState {
    /// Create state for `table`. The default chain is `SELECT * FROM table`.
    pub fn new(table: impl Into<String>, soft_deletes: bool) -> Self {
        Self {
            table: table.into(),
            soft_deletes,
            verb: Verb::Select,
            selected_columns: Vec::new(),
            aggregate: None,
            distinct: false,
            joins: Vec::new(),
            wheres: Vec::new(),
            group_by: Vec::new(),
            havings: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            bindings: IndexMap::new(),
            next_binding: 0,
            update_columns: Vec::new(),
            update_values: IndexMap::new(),
            update_pending: false,
            trashed: Trashed::default(),
            eager: Vec::new(),
            build_error: None,
        }
    }

    fn reset_chain(&mut self) {
        self.verb = Verb::Select;
        self.aggregate = None;
        self.distinct = false;
        self.joins.clear();
        self.wheres.clear();
        self.group_by.clear();
        self.havings.clear();
        self.order_by.clear();
        self.limit = None;
        self.offset = None;
        self.bindings.clear();
        self.next_binding = 0;
        self.update_columns.clear();
        self.update_values.clear();
        self.update_pending = false;
        self.build_error = None;
    }

    /// Record a build error; the first one wins and is reported at execution.
    pub fn fail(&mut self, message: impl Into<String>) -> &mut Self {
        if self.build_error.is_none() {
            self.build_error = Some(message.into());
        }
        self
    }

    // ==================== accessors ====================

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn soft_deletes(&self) -> bool {
        self.soft_deletes
    }

    pub fn selected_columns(&self) -> &[String] {
        &self.selected_columns
    }

    pub fn bindings(&self) -> &IndexMap<String, Value> {
        &self.bindings
    }

    pub fn trashed(&self) -> Trashed {
        self.trashed
    }

    pub fn eager(&self) -> &[String] {
        &self.eager
    }

    pub fn is_update_pending(&self) -> bool {
        self.update_pending
    }

    pub fn is_select(&self) -> bool {
        self.verb == Verb::Select
    }

    pub fn build_error(&self) -> Option<&str> {
        self.build_error.as_deref()
    }

    // ==================== projection ====================

    /// `SELECT * FROM table`: starts a new chain and clears the projection.
    pub fn all(&mut self) -> &mut Self {
        self.reset_chain();
        self.selected_columns.clear();
        self
    }

    /// Start a new chain selecting `columns`.
    ///
    /// Columns accumulate across `select` calls on the same state, so
    /// `select(["a"])` followed by `select(["b"])` projects `a, b`.
    pub fn select<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reset_chain();
        self.selected_columns
            .extend(columns.into_iter().map(Into::into));
        self
    }

    /// `select` plus an aggregate expression `function(argument)` after the columns.
    pub fn select_aggregate<I, S>(&mut self, columns: I, function: &str, argument: &str) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select(columns);
        self.aggregate = Some(format!("{function}({argument})"));
        self
    }

    /// `SELECT DISTINCT`.
    pub fn distinct(&mut self) -> &mut Self {
        self.distinct = true;
        self
    }

    // ==================== WHERE / HAVING ====================

    /// Bind `value` under a fresh name derived from `stem`.
    ///
    /// Every clause gets its own placeholder, so two clauses on the same
    /// column never share a value.
    fn bind(&mut self, stem: &str, value: Value) -> String {
        let name = format!("{stem}_{}", self.next_binding);
        self.next_binding += 1;
        self.bindings.insert(name.clone(), value);
        name
    }

    fn bind_conditions<I, C>(&mut self, conditions: I) -> Vec<Clause>
    where
        I: IntoIterator<Item = C>,
        C: Into<Condition>,
    {
        conditions
            .into_iter()
            .map(|c| {
                let c = c.into();
                let placeholder = self.bind(&c.column, c.value);
                Clause {
                    predicate: Predicate::Compare {
                        placeholder,
                        column: c.column,
                        operator: c.operator,
                    },
                    conjunction: c.conjunction,
                }
            })
            .collect()
    }

    /// Append `(column, operator, value, [conjunction])` conditions to WHERE.
    ///
    /// Each value gets its own placeholder. When an update is pending, the
    /// SET values are bound as `UP_<column>` too.
    pub fn where_<I, C>(&mut self, conditions: I) -> &mut Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Condition>,
    {
        let clauses = self.bind_conditions(conditions);
        self.wheres.extend(clauses);
        if self.update_pending {
            for (column, value) in &self.update_values {
                self.bindings
                    .insert(update_placeholder(column), value.clone());
            }
        }
        self
    }

    /// Append conditions to HAVING.
    pub fn having<I, C>(&mut self, conditions: I) -> &mut Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Condition>,
    {
        let clauses = self.bind_conditions(conditions);
        self.havings.extend(clauses);
        self
    }

    fn where_list(&mut self, column: &str, values: Vec<Value>, negated: bool) -> &mut Self {
        if values.is_empty() {
            return self;
        }
        let placeholders = values
            .into_iter()
            .map(|value| self.bind(column, value))
            .collect();
        self.wheres.push(Clause::new(Predicate::In {
            column: column.to_string(),
            placeholders,
            negated,
        }));
        self
    }

    /// `column IN (...)`; an empty list adds nothing.
    pub fn where_in<I, V>(&mut self, column: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.where_list(column, values, false)
    }

    /// `column NOT IN (...)`; an empty list adds nothing.
    pub fn where_not_in<I, V>(&mut self, column: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.where_list(column, values, true)
    }

    /// `column BETWEEN start AND end`.
    pub fn where_between(
        &mut self,
        column: &str,
        start: impl Into<Value>,
        end: impl Into<Value>,
    ) -> &mut Self {
        let start_name = self.bind(&format!("{column}_start"), start.into());
        let end_name = self.bind(&format!("{column}_end"), end.into());
        self.wheres.push(Clause::new(Predicate::Between {
            column: column.to_string(),
            start: start_name,
            end: end_name,
        }));
        self
    }

    pub fn where_null(&mut self, column: &str) -> &mut Self {
        self.wheres.push(Clause::new(Predicate::Null {
            column: column.to_string(),
            negated: false,
        }));
        self
    }

    pub fn where_not_null(&mut self, column: &str) -> &mut Self {
        self.wheres.push(Clause::new(Predicate::Null {
            column: column.to_string(),
            negated: true,
        }));
        self
    }

    // ==================== JOIN ====================

    fn push_join(&mut self, kind: &str, table: &str, first: &str, operator: &str, second: &str) -> &mut Self {
        self.joins
            .push(format!("{kind} JOIN {table} ON {first} {operator} {second}"));
        self
    }

    /// `INNER JOIN table ON first operator second`.
    pub fn join(&mut self, table: &str, first: &str, operator: &str, second: &str) -> &mut Self {
        self.push_join("INNER", table, first, operator, second)
    }

    pub fn left_join(&mut self, table: &str, first: &str, operator: &str, second: &str) -> &mut Self {
        self.push_join("LEFT", table, first, operator, second)
    }

    pub fn right_join(&mut self, table: &str, first: &str, operator: &str, second: &str) -> &mut Self {
        self.push_join("RIGHT", table, first, operator, second)
    }

    // ==================== ordering / grouping / paging ====================

    /// `ORDER BY column direction`; direction is written as given.
    pub fn order_by(&mut self, column: &str, direction: &str) -> &mut Self {
        self.order_by.push(format!("{column} {direction}"));
        self
    }

    pub fn group_by(&mut self, column: &str) -> &mut Self {
        self.group_by.push(column.to_string());
        self
    }

    pub fn limit(&mut self, n: u64) -> &mut Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(&mut self, n: u64) -> &mut Self {
        self.offset = Some(n);
        self
    }

    // ==================== modifiers ====================

    pub fn with_trashed(&mut self) -> &mut Self {
        self.trashed = Trashed::Include;
        self
    }

    pub fn only_trashed(&mut self) -> &mut Self {
        self.trashed = Trashed::Only;
        self
    }

    /// Mark relations for eager loading after the fetch.
    pub fn with<I, S>(&mut self, relations: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in relations {
            let name = name.into();
            if !self.eager.contains(&name) {
                self.eager.push(name);
            }
        }
        self
    }

    // ==================== write chains ====================

    /// Start `UPDATE table SET ...` for `values`.
    ///
    /// The SET values are not bound yet: the next [`where_`](Self::where_)
    /// binds them as `UP_<column>` together with its own conditions.
    pub fn begin_update(&mut self, values: IndexMap<String, Value>) -> &mut Self {
        self.reset_chain();
        self.verb = Verb::Update;
        if values.is_empty() {
            self.fail(format!("update on {} has no columns to set", self.table));
        }
        self.update_columns = values.keys().cloned().collect();
        self.update_values = values;
        self.update_pending = true;
        self
    }

    /// Start `DELETE FROM table`.
    pub fn begin_delete(&mut self) -> &mut Self {
        self.reset_chain();
        self.verb = Verb::Delete;
        self
    }

    /// Clear the pending-update flag once the statement has run.
    pub fn finish_update(&mut self) {
        self.update_pending = false;
    }

    // ==================== rendering ====================

    fn check(&self) -> OrmResult<()> {
        match &self.build_error {
            Some(message) => Err(OrmError::Validation(message.clone())),
            None => Ok(()),
        }
    }

    fn projection(&self) -> String {
        let columns = self.selected_columns.join(", ");
        match (&self.aggregate, columns.is_empty()) {
            (None, true) => "*".to_string(),
            (None, false) => columns,
            (Some(agg), true) => agg.clone(),
            (Some(agg), false) => format!("{columns}, {agg}"),
        }
    }

    fn trash_filter(&self) -> Option<String> {
        match self.trashed {
            Trashed::Exclude if self.soft_deletes => Some(format!("{}.deleted_at IS NULL", self.table)),
            Trashed::Only => Some(format!("{}.deleted_at IS NOT NULL", self.table)),
            _ => None,
        }
    }

    fn push_where(&self, sql: &mut String, params: &mut Params<'_>, filtered: bool) -> OrmResult<()> {
        let user = if self.wheres.is_empty() {
            None
        } else {
            Some(render_clauses(&self.wheres, params)?)
        };
        let filter = if filtered { self.trash_filter() } else { None };
        let clause = match (user, filter) {
            (None, None) => return Ok(()),
            (Some(user), None) => user,
            (None, Some(filter)) => filter,
            (Some(user), Some(filter)) if self.wheres.len() > 1 => format!("({user}) AND {filter}"),
            (Some(user), Some(filter)) => format!("{user} AND {filter}"),
        };
        sql.push_str(" WHERE ");
        sql.push_str(&clause);
        Ok(())
    }

    /// SELECT ... FROM ... JOIN ... WHERE ... GROUP BY ... HAVING ...
    fn push_select_body(
        &self,
        sql: &mut String,
        params: &mut Params<'_>,
        projection: &str,
    ) -> OrmResult<()> {
        sql.push_str("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(projection);
        sql.push_str(" FROM ");
        sql.push_str(&self.table);
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }
        self.push_where(sql, params, true)?;
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }
        if !self.havings.is_empty() {
            sql.push_str(" HAVING ");
            sql.push_str(&render_clauses(&self.havings, params)?);
        }
        Ok(())
    }

    fn push_paging(&self, sql: &mut String) {
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
    }

    fn render_select_with(&self, projection: &str) -> OrmResult<Rendered> {
        self.check()?;
        let mut params = Params::new(&self.bindings);
        let mut sql = String::new();
        self.push_select_body(&mut sql, &mut params, projection)?;
        self.push_paging(&mut sql);
        Ok(params.finish(sql))
    }

    /// Render the statement this chain would execute.
    pub fn render(&self) -> OrmResult<Rendered> {
        match self.verb {
            Verb::Select => self.render_select_with(&self.projection()),
            Verb::Update => self.render_update(),
            Verb::Delete => self.render_delete(),
        }
    }

    /// The SQL text of [`render`](Self::render).
    pub fn to_sql(&self) -> OrmResult<String> {
        self.render().map(|r| r.sql)
    }

    /// `SELECT COUNT(*) AS aggregate` over the same rows.
    ///
    /// Ordering and paging are dropped. DISTINCT, GROUP BY and paged chains
    /// count the rows of the full select wrapped in a subquery.
    pub fn render_count(&self) -> OrmResult<Rendered> {
        self.check()?;
        let mut params = Params::new(&self.bindings);
        let mut sql = String::new();
        let wrap = self.distinct
            || !self.group_by.is_empty()
            || self.limit.is_some()
            || self.offset.is_some();
        if wrap {
            sql.push_str("SELECT COUNT(*) AS aggregate FROM (");
            self.push_select_body(&mut sql, &mut params, &self.projection())?;
            self.push_paging(&mut sql);
            sql.push_str(") AS counted");
        } else {
            self.push_select_body(&mut sql, &mut params, "COUNT(*) AS aggregate")?;
        }
        Ok(params.finish(sql))
    }

    /// The select with `column` as its only projection.
    pub fn render_pluck(&self, column: &str) -> OrmResult<Rendered> {
        self.render_select_with(column)
    }

    fn render_update(&self) -> OrmResult<Rendered> {
        self.check()?;
        let mut params = Params::new(&self.bindings);
        let mut sql = format!("UPDATE {} SET ", self.table);
        for (i, column) in self.update_columns.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(column);
            sql.push_str(" = ");
            sql.push_str(&params.placeholder(&update_placeholder(column))?);
        }
        self.push_where(&mut sql, &mut params, false)?;
        Ok(params.finish(sql))
    }

    fn render_delete(&self) -> OrmResult<Rendered> {
        self.check()?;
        let mut params = Params::new(&self.bindings);
        let mut sql = format!("DELETE FROM {}", self.table);
        self.push_where(&mut sql, &mut params, false)?;
        Ok(params.finish(sql))
    }
}

fn update_placeholder(column: &str) -> String {
    format!("UP_{column}")
}

/// `INSERT INTO table (a, b) VALUES ($1, $2) [RETURNING key]`.
pub fn render_insert(
    table: &str,
    columns: &IndexMap<String, Value>,
    returning: Option<&str>,
) -> Rendered {
    let mut sql = format!("INSERT INTO {table}");
    if columns.is_empty() {
        sql.push_str(" DEFAULT VALUES");
    } else {
        let names: Vec<&str> = columns.keys().map(String::as_str).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${i}")).collect();
        sql.push_str(&format!(
            " ({}) VALUES ({})",
            names.join(", "),
            placeholders.join(", ")
        ));
    }
    if let Some(key) = returning {
        sql.push_str(" RETURNING ");
        sql.push_str(key);
    }
    Rendered {
        sql,
        params: columns.values().cloned().collect(),
    }
}
