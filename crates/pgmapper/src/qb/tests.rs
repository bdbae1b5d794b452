use crate::error::OrmError;
use crate::qb::{Condition, QueryState, render_insert, rewrite_named};
use crate::value::Value;
use indexmap::IndexMap;

fn articles() -> QueryState {
    QueryState::new("articles", false)
}

fn soft_articles() -> QueryState {
    QueryState::new("articles", true)
}

#[test]
fn test_default_state_selects_everything() {
    assert_eq!(articles().to_sql().unwrap(), "SELECT * FROM articles");
}

#[test]
fn test_where_renders_conditions_in_order() {
    let mut q = articles();
    q.all()
        .where_([("status", "=", Value::from("published")), ("views", ">", Value::from(100))]);
    let r = q.render().unwrap();
    assert_eq!(r.sql, "SELECT * FROM articles WHERE status = $1 AND views > $2");
    assert_eq!(r.params, vec![Value::from("published"), Value::Int(100)]);
}

#[test]
fn test_where_binds_one_placeholder_per_condition() {
    let mut q = articles();
    q.all().where_([
        ("status", "=", Value::from("published")),
        ("views", ">", Value::from(10)),
        ("author_id", "=", Value::from(3)),
    ]);
    assert_eq!(q.bindings().len(), 3);
}

#[test]
fn test_custom_conjunction_and_trailing_conjunction_dropped() {
    let mut q = articles();
    q.all().where_([
        Condition::from(("status", "=", "draft")).or(),
        Condition::from(("featured", "=", true)).and(),
    ]);
    assert_eq!(
        q.to_sql().unwrap(),
        "SELECT * FROM articles WHERE status = $1 OR featured = $2"
    );

    let mut q = articles();
    q.all().where_([("status", "=", "draft", "OR")]);
    assert_eq!(q.to_sql().unwrap(), "SELECT * FROM articles WHERE status = $1");
}

#[test]
fn test_where_family_shares_one_where_clause() {
    let mut q = articles();
    q.all()
        .where_([("status", "=", "published")])
        .where_in("id", [1, 2])
        .where_between("views", 10, 20)
        .where_null("archived_at")
        .where_not_null("published_at");
    let r = q.render().unwrap();
    assert_eq!(
        r.sql,
        "SELECT * FROM articles WHERE status = $1 AND id IN ($2, $3) \
         AND views BETWEEN $4 AND $5 AND archived_at IS NULL AND published_at IS NOT NULL"
    );
    assert_eq!(r.params.len(), 5);
    let names: Vec<&str> = q.bindings().keys().map(String::as_str).collect();
    assert_eq!(
        names,
        vec!["status_0", "id_1", "id_2", "views_start_3", "views_end_4"]
    );
}

#[test]
fn test_where_in_empty_is_noop() {
    let mut q = articles();
    q.all().where_([("status", "=", "published")]);
    let before_sql = q.to_sql().unwrap();
    let before_bindings = q.bindings().clone();

    q.where_in("id", Vec::<i64>::new())
        .where_not_in("id", Vec::<i64>::new());

    assert_eq!(q.to_sql().unwrap(), before_sql);
    assert_eq!(q.bindings(), &before_bindings);
}

#[test]
fn test_clauses_on_same_column_keep_their_own_values() {
    let mut q = articles();
    q.all()
        .where_in("status", ["a", "b"])
        .where_not_in("status", ["c"]);
    let r = q.render().unwrap();
    assert_eq!(
        r.sql,
        "SELECT * FROM articles WHERE status IN ($1, $2) AND status NOT IN ($3)"
    );
    assert_eq!(
        r.params,
        vec![Value::from("a"), Value::from("b"), Value::from("c")]
    );

    let mut q = articles();
    q.all().where_([("age", ">=", 18), ("age", "<=", 65)]);
    let r = q.render().unwrap();
    assert_eq!(r.sql, "SELECT * FROM articles WHERE age >= $1 AND age <= $2");
    assert_eq!(r.params, vec![Value::Int(18), Value::Int(65)]);
}

#[test]
fn test_where_not_in() {
    let mut q = articles();
    q.all().where_not_in("category_id", [4, 5, 6]);
    assert_eq!(
        q.to_sql().unwrap(),
        "SELECT * FROM articles WHERE category_id NOT IN ($1, $2, $3)"
    );
}

#[test]
fn test_select_accumulates_columns_across_calls() {
    let mut q = articles();
    q.select(["id", "title"]);
    assert_eq!(q.to_sql().unwrap(), "SELECT id, title FROM articles");
    q.select(["views"]);
    assert_eq!(q.to_sql().unwrap(), "SELECT id, title, views FROM articles");
    q.all();
    assert_eq!(q.to_sql().unwrap(), "SELECT * FROM articles");
}

#[test]
fn test_select_resets_clauses() {
    let mut q = articles();
    q.all().where_([("id", "=", 1)]).limit(3);
    q.select(["title"]);
    assert_eq!(q.to_sql().unwrap(), "SELECT title FROM articles");
    assert!(q.bindings().is_empty());
}

#[test]
fn test_select_aggregate() {
    let mut q = articles();
    q.select_aggregate(["author_id"], "SUM", "views")
        .group_by("author_id")
        .having([("SUM(views)", ">", 100)]);
    assert_eq!(
        q.to_sql().unwrap(),
        "SELECT author_id, SUM(views) FROM articles GROUP BY author_id HAVING SUM(views) > $1"
    );

    let mut q = articles();
    q.select_aggregate(Vec::<String>::new(), "MAX", "views");
    assert_eq!(q.to_sql().unwrap(), "SELECT MAX(views) FROM articles");
}

#[test]
fn test_joins_distinct_order_limit_offset() {
    let mut q = articles();
    q.select(["articles.title", "users.name"])
        .join("users", "users.id", "=", "articles.user_id")
        .left_join("categories", "categories.id", "=", "articles.category_id")
        .distinct()
        .order_by("articles.created_at", "DESC")
        .limit(10)
        .offset(20);
    assert_eq!(
        q.to_sql().unwrap(),
        "SELECT DISTINCT articles.title, users.name FROM articles \
         INNER JOIN users ON users.id = articles.user_id \
         LEFT JOIN categories ON categories.id = articles.category_id \
         ORDER BY articles.created_at DESC LIMIT 10 OFFSET 20"
    );
}

#[test]
fn test_right_join() {
    let mut q = articles();
    q.all().right_join("users", "users.id", "=", "articles.user_id");
    assert_eq!(
        q.to_sql().unwrap(),
        "SELECT * FROM articles RIGHT JOIN users ON users.id = articles.user_id"
    );
}

#[test]
fn test_soft_delete_filter() {
    let mut q = soft_articles();
    assert_eq!(
        q.to_sql().unwrap(),
        "SELECT * FROM articles WHERE articles.deleted_at IS NULL"
    );

    q.all().where_([("status", "=", "draft")]);
    assert_eq!(
        q.to_sql().unwrap(),
        "SELECT * FROM articles WHERE status = $1 AND articles.deleted_at IS NULL"
    );

    q.all()
        .where_([Condition::from(("status", "=", "draft")).or(), ("views", ">", 5).into()]);
    assert_eq!(
        q.to_sql().unwrap(),
        "SELECT * FROM articles WHERE (status = $1 OR views > $2) AND articles.deleted_at IS NULL"
    );
}

#[test]
fn test_trashed_modes_survive_chain_reset() {
    let mut q = soft_articles();
    q.with_trashed().all();
    assert_eq!(q.to_sql().unwrap(), "SELECT * FROM articles");

    let mut q = soft_articles();
    q.only_trashed().all();
    assert_eq!(
        q.to_sql().unwrap(),
        "SELECT * FROM articles WHERE articles.deleted_at IS NOT NULL"
    );
}

#[test]
fn test_count_drops_ordering_and_paging() {
    let mut q = soft_articles();
    q.all().where_([("status", "=", "published")]).order_by("id", "ASC");
    assert_eq!(
        q.render_count().unwrap().sql,
        "SELECT COUNT(*) AS aggregate FROM articles WHERE status = $1 AND articles.deleted_at IS NULL"
    );
}

#[test]
fn test_count_wraps_distinct_and_paged_chains() {
    let mut q = articles();
    q.select(["author_id"]).distinct();
    assert_eq!(
        q.render_count().unwrap().sql,
        "SELECT COUNT(*) AS aggregate FROM (SELECT DISTINCT author_id FROM articles) AS counted"
    );

    let mut q = articles();
    q.all().limit(5);
    assert_eq!(
        q.render_count().unwrap().sql,
        "SELECT COUNT(*) AS aggregate FROM (SELECT * FROM articles LIMIT 5) AS counted"
    );
}

#[test]
fn test_pluck_projects_one_column() {
    let mut q = articles();
    q.all().where_([("status", "=", "published")]).order_by("id", "ASC");
    assert_eq!(
        q.render_pluck("title").unwrap().sql,
        "SELECT title FROM articles WHERE status = $1 ORDER BY id ASC"
    );
}

#[test]
fn test_update_binds_set_values_on_where() {
    let mut values = IndexMap::new();
    values.insert("title".to_string(), Value::from("New"));
    values.insert("views".to_string(), Value::from(7));

    let mut q = soft_articles();
    q.begin_update(values);
    assert!(q.is_update_pending());
    q.where_([("id", "=", 1)]);

    // one WHERE binding plus one UP_ binding per column
    assert_eq!(q.bindings().len(), 3);
    let r = q.render().unwrap();
    assert_eq!(r.sql, "UPDATE articles SET title = $1, views = $2 WHERE id = $3");
    assert_eq!(
        r.params,
        vec![Value::from("New"), Value::Int(7), Value::Int(1)]
    );
}

#[test]
fn test_update_without_where_is_binding_mismatch() {
    let mut values = IndexMap::new();
    values.insert("title".to_string(), Value::from("New"));
    let mut q = articles();
    q.begin_update(values);
    let err = q.render().unwrap_err();
    assert!(err.is_binding_mismatch());
}

#[test]
fn test_update_with_no_columns_is_validation_error() {
    let mut q = articles();
    q.begin_update(IndexMap::new()).where_([("id", "=", 1)]);
    assert!(matches!(q.render(), Err(OrmError::Validation(_))));
}

#[test]
fn test_delete_is_literal_and_unfiltered() {
    let mut q = soft_articles();
    q.begin_delete();
    assert_eq!(q.to_sql().unwrap(), "DELETE FROM articles");
    q.where_([("id", "=", 9)]);
    assert_eq!(q.to_sql().unwrap(), "DELETE FROM articles WHERE id = $1");
}

#[test]
fn test_build_error_surfaces_at_render() {
    let mut q = articles();
    q.all().fail("first").fail("second");
    match q.render() {
        Err(OrmError::Validation(message)) => assert_eq!(message, "first"),
        other => panic!("expected validation error, got {other:?}"),
    }
    q.all();
    assert!(q.render().is_ok());
}

#[test]
fn test_eager_list_is_deduplicated_and_survives_reset() {
    let mut q = articles();
    q.with(["author", "tags"]).with(["tags"]).all();
    assert_eq!(q.eager(), &["author".to_string(), "tags".to_string()]);
}

#[test]
fn test_insert_rendering_is_stable() {
    let mut columns = IndexMap::new();
    columns.insert("title".to_string(), Value::from("Hello"));
    columns.insert("views".to_string(), Value::from(0));

    let first = render_insert("articles", &columns, Some("id"));
    let second = render_insert("articles", &columns, Some("id"));
    assert_eq!(
        first.sql,
        "INSERT INTO articles (title, views) VALUES ($1, $2) RETURNING id"
    );
    assert_eq!(first, second);
}

#[test]
fn test_insert_without_columns_uses_defaults() {
    let r = render_insert("articles", &IndexMap::new(), None);
    assert_eq!(r.sql, "INSERT INTO articles DEFAULT VALUES");
    assert!(r.params.is_empty());
}

#[test]
fn test_raw_rewrites_named_placeholders() {
    let mut params = IndexMap::new();
    params.insert("date".to_string(), Value::from("2024-01-01"));
    params.insert("status".to_string(), Value::from("published"));
    params.insert("unused".to_string(), Value::from(1));

    let r = rewrite_named(
        "SELECT * FROM articles WHERE created_at > :date::timestamptz \
         AND status = :status AND note <> ':date' AND updated_at > :date",
        &params,
    )
    .unwrap();
    assert_eq!(
        r.sql,
        "SELECT * FROM articles WHERE created_at > $1::timestamptz \
         AND status = $2 AND note <> ':date' AND updated_at > $1"
    );
    assert_eq!(
        r.params,
        vec![Value::from("2024-01-01"), Value::from("published")]
    );
}

#[test]
fn test_raw_unknown_placeholder_is_binding_mismatch() {
    let err = rewrite_named("SELECT :missing", &IndexMap::new()).unwrap_err();
    assert!(matches!(
        err,
        OrmError::BindingMismatch { ref placeholder } if placeholder == "missing"
    ));
}
