//! Relationship graph against a real PostgreSQL.
//!
//! Skipped unless `DATABASE_URL` is set.

use pgmapper::{
    ConnectConfig, Connection, Model, OrmResult, PgConnection, RelationRegistry, Value,
};

async fn connect(test: &str) -> OrmResult<Option<PgConnection>> {
    let _ = dotenvy::dotenv();
    let config = match ConnectConfig::from_env() {
        Ok(config) => config,
        Err(_) => {
            eprintln!("DATABASE_URL is not set; skipping {test}");
            return Ok(None);
        }
    };
    Ok(Some(PgConnection::connect(&config).await?))
}

struct User;

impl Model for User {
    const TABLE: &'static str = "users";
    const TIMESTAMPS: bool = false;

    fn relations(r: &mut RelationRegistry) {
        r.has_many::<Post>("posts", "user_id", "id");
    }
}

struct Post;

impl Model for Post {
    const TABLE: &'static str = "posts";
    const TIMESTAMPS: bool = false;

    fn relations(r: &mut RelationRegistry) {
        r.belongs_to::<User>("author", "user_id", "id")
            .belongs_to_many::<Tag>("tags", Some("post_tag"), "post_id", "tag_id");
    }
}

struct Tag;

impl Model for Tag {
    const TABLE: &'static str = "tags";
    const TIMESTAMPS: bool = false;
}

async fn create_tables(conn: &PgConnection) -> OrmResult<()> {
    for ddl in [
        "CREATE TEMPORARY TABLE users (id BIGSERIAL PRIMARY KEY, name TEXT NOT NULL)",
        "CREATE TEMPORARY TABLE posts (id BIGSERIAL PRIMARY KEY, user_id BIGINT NOT NULL, title TEXT NOT NULL)",
        "CREATE TEMPORARY TABLE tags (id BIGSERIAL PRIMARY KEY, name TEXT NOT NULL)",
        "CREATE TEMPORARY TABLE post_tag (post_id BIGINT NOT NULL, tag_id BIGINT NOT NULL, PRIMARY KEY (post_id, tag_id))",
    ] {
        conn.execute(ddl, &[]).await?;
    }
    Ok(())
}

async fn insert<M: Model>(conn: &PgConnection, column: &str, value: Value) -> OrmResult<Value> {
    let mut mapper = M::query(conn);
    mapper.set(column, value);
    mapper.insert().await?;
    Ok(mapper.last_insert_id().cloned().unwrap_or_default())
}

async fn pivot_tag_ids(conn: &PgConnection, post: &Value) -> OrmResult<Vec<Value>> {
    let rows = Post::query(conn)
        .raw(
            "SELECT tag_id FROM post_tag WHERE post_id = :post ORDER BY tag_id",
            [("post", post.clone())],
        )
        .await?;
    Ok(rows.iter().map(|r| r.value("tag_id")).collect())
}

#[tokio::test]
async fn sync_leaves_exactly_the_given_ids() -> OrmResult<()> {
    let Some(conn) = connect("sync_leaves_exactly_the_given_ids").await? else {
        return Ok(());
    };
    create_tables(&conn).await?;

    let user = insert::<User>(&conn, "name", "ann".into()).await?;
    let mut post = Post::query(&conn);
    post.set("user_id", user).set("title", "hello");
    post.insert().await?;
    let post = post.last_insert_id().cloned().unwrap_or_default();

    let mut tags = Vec::new();
    for name in ["rust", "sql", "orm", "old"] {
        tags.push(insert::<Tag>(&conn, "name", name.into()).await?);
    }

    let posts = Post::query(&conn);
    posts
        .attach(post.clone(), tags[3].clone(), "tags", Vec::<(String, Value)>::new())
        .await?;
    posts
        .sync(post.clone(), tags[..3].to_vec(), "tags")
        .await?;
    assert_eq!(pivot_tag_ids(&conn, &post).await?, tags[..3].to_vec());

    assert_eq!(
        posts.detach(post.clone(), "tags", Some(tags[0].clone())).await?,
        1
    );
    assert_eq!(posts.detach(post.clone(), "tags", None).await?, 2);
    assert!(pivot_tag_ids(&conn, &post).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn eager_and_lazy_loading() -> OrmResult<()> {
    let Some(conn) = connect("eager_and_lazy_loading").await? else {
        return Ok(());
    };
    create_tables(&conn).await?;

    let ann = insert::<User>(&conn, "name", "ann".into()).await?;
    let bob = insert::<User>(&conn, "name", "bob".into()).await?;
    for (user, title) in [(&ann, "one"), (&ann, "two"), (&bob, "three")] {
        let mut post = Post::query(&conn);
        post.set("user_id", user.clone()).set("title", title);
        post.insert().await?;
    }
    let tag = insert::<Tag>(&conn, "name", "rust".into()).await?;
    Post::query(&conn)
        .attach(Value::Int(1), tag.clone(), "tags", Vec::<(String, Value)>::new())
        .await?;

    let posts = Post::query(&conn)
        .with(["author", "tags"])
        .all()
        .order_by("id", "ASC")
        .get_all()
        .await?;
    assert_eq!(posts.len(), 3);
    for post in &posts {
        let author = post
            .relation("author")
            .and_then(|r| r.as_one())
            .expect("author loaded");
        assert_eq!(author.value("id"), post.value("user_id"));
    }
    assert_eq!(posts[0].relation("tags").map(|r| r.as_many().len()), Some(1));
    assert_eq!(posts[1].relation("tags").map(|r| r.as_many().len()), Some(0));

    let mut user = User::query(&conn)
        .find(ann.clone())
        .await?
        .expect("user exists");
    User::query(&conn).load_relation("posts", &mut user).await?;
    assert_eq!(user.relation("posts").map(|r| r.as_many().len()), Some(2));
    Ok(())
}
