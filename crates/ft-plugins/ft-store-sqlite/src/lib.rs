//! # ft-store-sqlite Implementation
//!
//! Maps the forum's document model onto SQLite. Each post is one row holding
//! its JSON document plus the columns listings filter and sort on; a side
//! table lists every id on each post's path so "path contains" is a join.
//!
//! A batch runs inside one transaction. SQLite serializes writers, so two
//! inserts under the same ancestor cannot lose an increment; a writer that
//! finds the database locked gets `StoreError::Conflict` and may retry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ft_core::error::{StoreError, StoreResult};
use ft_core::models::Post;
use ft_core::traits::{
    stamp_created, CursorValue, Direction, Filter, OrderField, PostQuery, PostStore, Write, WriteBatch,
};
use log::{debug, info};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::str::FromStr;
use std::time::Duration;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS posts (
        id          TEXT PRIMARY KEY,
        parent      TEXT NOT NULL,
        idx         INTEGER NOT NULL,
        create_time INTEGER NOT NULL,
        bump_time   INTEGER NOT NULL,
        deleted     INTEGER NOT NULL DEFAULT 0,
        doc         TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS posts_by_parent ON posts (parent, deleted)",
    "CREATE TABLE IF NOT EXISTS post_paths (
        ancestor TEXT NOT NULL,
        post_id  TEXT NOT NULL,
        PRIMARY KEY (ancestor, post_id)
    )",
    "CREATE TABLE IF NOT EXISTS clock (
        id   INTEGER PRIMARY KEY CHECK (id = 0),
        last INTEGER NOT NULL
    )",
    "INSERT OR IGNORE INTO clock (id, last) VALUES (0, 0)",
];

pub struct SqlitePostStore {
    pool: SqlitePool,
}

impl SqlitePostStore {
    /// Opens (creating if needed) the database at `url` and applies the schema.
    ///
    /// An in-memory URL gets a single connection, since every SQLite
    /// connection would otherwise see its own empty database.
    pub async fn new(url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(backend)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        let max_connections = if url.contains(":memory:") { 1 } else { 8 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(backend)?;
        let store = Self::from_pool(pool).await?;
        info!("opened sqlite post store at {}", url);
        Ok(store)
    }

    /// Wraps an existing pool and applies the schema.
    pub async fn from_pool(pool: SqlitePool) -> StoreResult<Self> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await.map_err(backend)?;
        }
        Ok(Self { pool })
    }

    /// Hands out the next server timestamp, strictly after the last one.
    async fn tick(tx: &mut Transaction<'static, Sqlite>) -> StoreResult<DateTime<Utc>> {
        let last: i64 = sqlx::query_scalar("SELECT last FROM clock WHERE id = 0")
            .fetch_one(&mut **tx)
            .await
            .map_err(backend)?;
        let now = to_nanos(Utc::now()).max(last.saturating_add(1));
        sqlx::query("UPDATE clock SET last = ? WHERE id = 0")
            .bind(now)
            .execute(&mut **tx)
            .await
            .map_err(backend)?;
        Ok(DateTime::from_timestamp_nanos(now))
    }

    async fn load(tx: &mut Transaction<'static, Sqlite>, id: &str) -> StoreResult<Option<Post>> {
        let doc: Option<String> = sqlx::query_scalar("SELECT doc FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(backend)?;
        doc.map(|doc| decode(id, &doc)).transpose()
    }

    async fn create(tx: &mut Transaction<'static, Sqlite>, mut post: Post, now: DateTime<Utc>) -> StoreResult<()> {
        let id = post.id().to_string();
        let taken: Option<i64> = sqlx::query_scalar("SELECT 1 FROM posts WHERE id = ?")
            .bind(&id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(backend)?;
        if taken.is_some() {
            return Err(StoreError::AlreadyExists(id));
        }

        stamp_created(&mut post, now);
        sqlx::query(
            "INSERT INTO posts (id, parent, idx, create_time, bump_time, deleted, doc) VALUES (?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(&id)
        .bind(&post.parent)
        .bind(post.index)
        .bind(to_nanos(now))
        .bind(to_nanos(now))
        .bind(encode(&post)?)
        .execute(&mut **tx)
        .await
        .map_err(backend)?;

        for ancestor in &post.path {
            sqlx::query("INSERT OR IGNORE INTO post_paths (ancestor, post_id) VALUES (?, ?)")
                .bind(ancestor)
                .bind(&id)
                .execute(&mut **tx)
                .await
                .map_err(backend)?;
        }
        Ok(())
    }

    async fn save(tx: &mut Transaction<'static, Sqlite>, post: &Post) -> StoreResult<()> {
        sqlx::query("UPDATE posts SET bump_time = ?, deleted = ?, doc = ? WHERE id = ?")
            .bind(to_nanos(post.bump_time()))
            .bind(post.is_deleted())
            .bind(encode(post)?)
            .bind(post.id())
            .execute(&mut **tx)
            .await
            .map_err(backend)?;
        Ok(())
    }
}

#[async_trait]
impl PostStore for SqlitePostStore {
    async fn get(&self, id: &str) -> StoreResult<Option<Post>> {
        let doc: Option<String> = sqlx::query_scalar("SELECT doc FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        doc.map(|doc| decode(id, &doc)).transpose()
    }

    /// Applies the batch in one transaction. Dropping `tx` on any error
    /// rolls everything back.
    ///
    /// The transaction takes the write lock up front, so concurrent writers
    /// queue on `busy_timeout` instead of failing a shared-to-write upgrade.
    async fn commit(&self, batch: WriteBatch) -> StoreResult<DateTime<Utc>> {
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await.map_err(backend)?;
        let now = Self::tick(&mut tx).await?;

        for write in batch.writes {
            match write {
                Write::Create(post) => Self::create(&mut tx, post, now).await?,
                Write::Update { id, updates } => {
                    let mut post = Self::load(&mut tx, &id)
                        .await?
                        .ok_or_else(|| StoreError::NotFound(id.clone()))?;
                    for update in &updates {
                        update.apply(&mut post, now);
                    }
                    Self::save(&mut tx, &post).await?;
                }
            }
        }

        tx.commit().await.map_err(backend)?;
        debug!("sqlite commit at {}", now);
        Ok(now)
    }

    async fn query(&self, query: &PostQuery) -> StoreResult<Vec<Post>> {
        let column = match query.order_by {
            OrderField::CreateTime => "p.create_time",
            OrderField::BumpTime => "p.bump_time",
            OrderField::Index => "p.idx",
        };
        let (cmp, dir) = match query.direction {
            Direction::Ascending => (">", "ASC"),
            Direction::Descending => ("<", "DESC"),
        };
        let selection = match query.filter {
            Filter::Parent(_) => "FROM posts p WHERE p.parent = ?",
            Filter::PathContains(_) => {
                "FROM posts p JOIN post_paths a ON a.post_id = p.id WHERE a.ancestor = ?"
            }
        };
        let start = query.start_after.map(|value| match value {
            CursorValue::Time(t) => to_nanos(t),
            CursorValue::Index(i) => i,
        });
        let bound = match start {
            Some(_) => format!("AND {column} {cmp} ?"),
            None => String::new(),
        };
        let sql = format!(
            "SELECT p.id, p.doc {selection} AND p.deleted = 0 {bound} \
             ORDER BY {column} {dir}, p.id {dir} LIMIT ?"
        );
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);

        let mut statement = sqlx::query_as::<_, (String, String)>(&sql).bind(query.filter.target());
        if let Some(start) = start {
            statement = statement.bind(start);
        }
        let rows: Vec<(String, String)> = statement
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        rows.iter().map(|(id, doc)| decode(id, doc)).collect()
    }
}

/// Nanoseconds since the epoch, clamped at the ends of the i64 range.
fn to_nanos(t: DateTime<Utc>) -> i64 {
    t.timestamp_nanos_opt()
        .unwrap_or(if t.timestamp() < 0 { i64::MIN } else { i64::MAX })
}

fn encode(post: &Post) -> StoreResult<String> {
    serde_json::to_string(post).map_err(|e| StoreError::Backend(format!("encode {}: {}", post.id(), e)))
}

fn decode(id: &str, doc: &str) -> StoreResult<Post> {
    serde_json::from_str(doc).map_err(|e| StoreError::Decode {
        id: id.to_string(),
        reason: e.to_string(),
    })
}

/// Lock contention becomes a retryable conflict; everything else is a backend failure.
fn backend(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        let primary = db.code().and_then(|c| c.parse::<i32>().ok()).map(|c| c & 0xff);
        // SQLITE_BUSY, SQLITE_LOCKED
        if matches!(primary, Some(5) | Some(6)) {
            return StoreError::Conflict(db.message().to_string());
        }
    }
    StoreError::Backend(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ft_core::{Author, Cursor, Forum, ForumError, ForumSettings, PostTree};
    use std::sync::Arc;

    async fn store() -> Arc<SqlitePostStore> {
        Arc::new(SqlitePostStore::new("sqlite::memory:").await.unwrap())
    }

    fn path(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_insert_propagates_to_ancestors() {
        let tree = PostTree::new(store().await, ForumSettings::default());
        tree.insert(Post::candidate(path(&["s"]), "Section", "", Author::new("mhc")))
            .await
            .unwrap();
        tree.insert(Post::candidate(path(&["s", "t"]), "Thread", "body", Author::new("mhc")))
            .await
            .unwrap();
        tree.insert(Post::candidate(path(&["s", "t", "r"]), "Re: Thread", "reply", Author::new("ella")))
            .await
            .unwrap();

        let s = tree.get_post("s").await.unwrap();
        assert_eq!(s.child_count, 1);
        assert_eq!(s.descendant_count, 2);
        let t = tree.get_post("t").await.unwrap();
        assert_eq!(t.child_count, 1);
        assert_eq!(t.descendant_count, 1);

        let r = tree.get_post("r").await.unwrap();
        assert_eq!(r.parent, "t");
        assert_eq!(s.bump.unwrap().time, r.create_time.unwrap());
        assert_eq!(t.bump.unwrap().author, Author::new("ella"));
    }

    #[tokio::test]
    async fn test_failed_insert_rolls_back() {
        let tree = PostTree::new(store().await, ForumSettings::default());
        tree.insert(Post::candidate(path(&["s"]), "Section", "", Author::new("mhc")))
            .await
            .unwrap();

        let err = tree
            .insert(Post::candidate(path(&["s", "ghost", "x"]), "h", "b", Author::new("mhc")))
            .await
            .unwrap_err();
        assert!(matches!(err, ForumError::NotFound(_)));
        assert_eq!(tree.get_post("s").await.unwrap().descendant_count, 0);
        assert!(matches!(tree.get_post("x").await, Err(ForumError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_collision_does_not_overwrite() {
        let tree = PostTree::new(store().await, ForumSettings::default());
        tree.insert(Post::candidate(path(&["s"]), "first", "", Author::new("mhc")))
            .await
            .unwrap();
        let err = tree
            .insert(Post::candidate(path(&["s"]), "second", "", Author::new("mhc")))
            .await
            .unwrap_err();
        assert!(matches!(err, ForumError::StorageTransactionFailure { .. }));
        assert_eq!(tree.get_post("s").await.unwrap().header, "first");
    }

    #[tokio::test]
    async fn test_listing_orders_and_pages() {
        let forum = Forum::new(store().await, ForumSettings::default());
        let s = forum
            .create_section("Announcements", "Important stuff", 100, Author::new("mhc"))
            .await
            .unwrap();
        let t1 = forum.create_thread(&s[0], "one", "b", Author::new("mhc")).await.unwrap();
        let t2 = forum.create_thread(&s[0], "two", "b", Author::new("mhc")).await.unwrap();
        let t3 = forum.create_thread(&s[0], "three", "b", Author::new("mhc")).await.unwrap();

        let page = forum.get_threads(&s[0], None, 2).await.unwrap();
        let first: Vec<&str> = page.posts.iter().map(Post::id).collect();
        assert_eq!(first, vec![t3[1].as_str(), t2[1].as_str()]);
        let rest = forum.get_threads(&s[0], page.next, 2).await.unwrap();
        assert_eq!(rest.posts.len(), 1);
        assert_eq!(rest.posts[0].id(), t1[1]);
        assert!(rest.next.is_none());

        forum.create_reply(&t1, "one", "bump", Author::new("ella")).await.unwrap();
        let page = forum.get_threads(&s[0], None, 10).await.unwrap();
        assert_eq!(page.posts[0].id(), t1[1]);

        let tree = forum.get_replies(&t1[1], None, 10).await.unwrap();
        assert_eq!(tree.posts.len(), 2);
        assert_eq!(tree.posts[0].id(), t1[1]);
    }

    #[tokio::test]
    async fn test_delete_and_edit() {
        let tree = PostTree::new(store().await, ForumSettings::default());
        tree.insert(Post::candidate(path(&["r"]), "root", "", Author::new("mhc")))
            .await
            .unwrap();
        tree.insert(Post::candidate(path(&["r", "t"]), "thread", "", Author::new("mhc")))
            .await
            .unwrap();

        tree.edit_post("t", None, Some("edited".into())).await.unwrap();
        tree.delete_post("t", Author::new("mod"), "spam").await.unwrap();

        let t = tree.get_post("t").await.unwrap();
        assert_eq!(t.body, "edited");
        assert_eq!(t.deleted.unwrap().why, "spam");
        let children = tree
            .get_children("r", Cursor::create_time_ascending(), 10)
            .await
            .unwrap();
        assert!(children.posts.is_empty());
    }

    #[tokio::test]
    async fn test_sections_by_index() {
        let forum = Forum::new(store().await, ForumSettings::default());
        forum.create_section("B", "", 200, Author::new("mhc")).await.unwrap();
        forum.create_section("A", "", 100, Author::new("mhc")).await.unwrap();
        let heads: Vec<String> = forum
            .get_sections()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.header)
            .collect();
        assert_eq!(heads, vec!["A", "B"]);
    }

    /// A database file under the temp dir, removed with its journals on drop.
    struct TempDb(std::path::PathBuf);

    impl TempDb {
        fn new() -> Self {
            Self(std::env::temp_dir().join(format!("forum-tree-{}.db", ft_core::uniq())))
        }

        fn url(&self) -> String {
            format!("sqlite:{}", self.0.display())
        }
    }

    impl Drop for TempDb {
        fn drop(&mut self) {
            for suffix in ["", "-journal", "-wal", "-shm"] {
                let _ = std::fs::remove_file(format!("{}{}", self.0.display(), suffix));
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_writers_on_a_file_database() {
        let db = TempDb::new();
        let store = Arc::new(SqlitePostStore::new(&db.url()).await.unwrap());
        let tree = PostTree::new(store, ForumSettings::default());
        tree.insert(Post::candidate(path(&["s"]), "Section", "", Author::new("mhc")))
            .await
            .unwrap();
        tree.insert(Post::candidate(path(&["s", "t"]), "Thread", "", Author::new("mhc")))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for k in 0..48 {
            let tree = tree.clone();
            handles.push(tokio::spawn(async move {
                let id = format!("r{k}");
                tree.insert(Post::candidate(path(&["s", "t", id.as_str()]), "Re: Thread", "", Author::new("ella")))
                    .await
                    .map(|_| ())
            }));
        }
        for _ in 0..16 {
            let tree = tree.clone();
            handles.push(tokio::spawn(async move {
                tree.delete_post("s", Author::new("mod"), "cleanup").await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let t = tree.get_post("t").await.unwrap();
        assert_eq!(t.child_count, 48);
        assert_eq!(t.descendant_count, 48);
        let s = tree.get_post("s").await.unwrap();
        assert_eq!(s.descendant_count, 49);
        assert!(s.is_deleted());
    }

    #[tokio::test]
    async fn test_first_bump_page_ignores_reader_clock() {
        let db = TempDb::new();
        let store = Arc::new(SqlitePostStore::new(&db.url()).await.unwrap());
        let forum = Forum::new(store.clone(), ForumSettings::default());
        let s = forum.create_section("S", "", 1, Author::new("mhc")).await.unwrap();

        // Another writer whose clock runs five seconds ahead.
        let ahead = to_nanos(Utc::now()) + 5_000_000_000;
        sqlx::query("UPDATE clock SET last = ? WHERE id = 0")
            .bind(ahead)
            .execute(&store.pool)
            .await
            .unwrap();
        let t = forum.create_thread(&s[0], "ahead", "b", Author::new("mhc")).await.unwrap();

        let threads = forum.get_threads(&s[0], None, 10).await.unwrap();
        assert_eq!(threads.posts.len(), 1);
        assert_eq!(threads.posts[0].id(), t[1]);
        let tree = forum
            .get_replies(&t[1], Some(Cursor::bump_time_descending()), 10)
            .await
            .unwrap();
        assert_eq!(tree.posts.len(), 1);
    }

    #[tokio::test]
    async fn test_equal_indices_order_by_id() {
        let tree = PostTree::new(store().await, ForumSettings::default());
        for id in ["b", "a", "c"] {
            tree.insert(Post::candidate(path(&[id]), id, "", Author::new("mhc")).with_index(7))
                .await
                .unwrap();
        }
        let page = tree.get_children("", Cursor::index_ascending(), 10).await.unwrap();
        let ids: Vec<&str> = page.posts.iter().map(Post::id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_extreme_times_clamp() {
        assert_eq!(to_nanos(DateTime::<Utc>::MIN_UTC), i64::MIN);
        assert_eq!(to_nanos(DateTime::<Utc>::MAX_UTC), i64::MAX);
    }
}
