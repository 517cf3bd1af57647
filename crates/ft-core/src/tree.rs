//! # Post Tree
//!
//! Writes and reads against one [`PostStore`] handle:
//!
//! * `insert` places a post and, in the same commit, bumps every ancestor
//!   on its path and counts it as a child of its immediate parent.
//! * `get_children` / `get_tree` page through direct children or a whole
//!   subtree under any [`Cursor`] ordering.
//! * `delete_post` / `edit_post` patch a single document.

use crate::config::ForumSettings;
use crate::cursor::Cursor;
use crate::error::{ForumError, Result, StoreError};
use crate::models::{parent_of, Author, Post, PostId};
use crate::traits::{FieldUpdate, Filter, PostQuery, PostStore, WriteBatch};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// One page of a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub posts: Vec<Post>,
    /// Present when the page came back full. The next page may still be
    /// empty if the total happened to be a multiple of the page size.
    pub next: Option<Cursor>,
}

#[derive(Clone)]
pub struct PostTree {
    store: Arc<dyn PostStore>,
    settings: ForumSettings,
}

impl PostTree {
    pub fn new(store: Arc<dyn PostStore>, settings: ForumSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &ForumSettings {
        &self.settings
    }

    /// Inserts `candidate` and propagates counters and bump to its ancestors.
    ///
    /// Paths longer than `max_depth` are truncated: the leaf id takes the
    /// last permitted slot and the ancestors in between are dropped from
    /// the recorded path. Returns the path as recorded.
    pub async fn insert(&self, mut candidate: Post) -> Result<Vec<PostId>> {
        validate_candidate(&candidate)?;

        let max_depth = self.settings.max_depth.max(1);
        let depth = candidate.path.len();
        if depth > max_depth {
            candidate.path.swap(max_depth - 1, depth - 1);
            candidate.path.truncate(max_depth);
            debug!(
                "insert: truncated path of {} from depth {} to {}",
                candidate.id(),
                depth,
                max_depth
            );
        }
        candidate.parent = parent_of(&candidate.path);

        let path = candidate.path.clone();
        let id = candidate.id().to_string();
        let batch = propagation_batch(candidate);

        let at = self.commit_with_retry("insert", &id, batch).await?;
        debug!("insert: committed {} at depth {} ({})", id, path.len(), at);
        Ok(path)
    }

    /// Commits `batch`, retrying write conflicts up to `commit_retries` times
    /// with a doubling backoff. Any other store error ends the attempt.
    async fn commit_with_retry(&self, op: &'static str, target: &str, batch: WriteBatch) -> Result<DateTime<Utc>> {
        let mut attempt = 0;
        loop {
            match self.store.commit(batch.clone()).await {
                Ok(at) => return Ok(at),
                Err(StoreError::Conflict(reason)) if attempt < self.settings.commit_retries => {
                    attempt += 1;
                    let delay = retry_delay(attempt);
                    warn!("{}: conflict on {} ({}), retry {} in {:?}", op, target, reason, attempt, delay);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(ForumError::commit(op, target, e)),
            }
        }
    }

    /// Fetches a single post, including soft-deleted ones.
    pub async fn get_post(&self, id: &str) -> Result<Post> {
        self.store
            .get(id)
            .await
            .map_err(|e| ForumError::query("get_post", id, e))?
            .ok_or_else(|| ForumError::NotFound(id.to_string()))
    }

    /// Non-deleted posts whose parent is `parent`.
    pub async fn get_children(&self, parent: &str, cursor: Cursor, n: usize) -> Result<Page> {
        self.page("get_children", Filter::Parent(parent.to_string()), cursor, n)
            .await
    }

    /// `root` and every non-deleted post below it.
    pub async fn get_tree(&self, root: &str, cursor: Cursor, n: usize) -> Result<Page> {
        self.page("get_tree", Filter::PathContains(root.to_string()), cursor, n)
            .await
    }

    async fn page(&self, op: &'static str, filter: Filter, cursor: Cursor, n: usize) -> Result<Page> {
        if n == 0 {
            return Err(ForumError::InvalidArgument(format!("{op}: page size must be positive")));
        }
        let query = PostQuery {
            filter,
            order_by: cursor.field(),
            direction: cursor.direction(),
            start_after: cursor.start_value(),
            limit: n,
        };
        let posts = self
            .store
            .query(&query)
            .await
            .map_err(|e| ForumError::query(op, query.filter.target(), e))?;
        debug!("{}: {} posts under {}", op, posts.len(), query.filter.target());

        let next = match posts.last() {
            Some(last) if posts.len() == n => Some(cursor.advance(last)),
            _ => None,
        };
        Ok(Page { posts, next })
    }

    /// Marks a post deleted. Counters, ancestors and descendants are left
    /// alone; deleting twice overwrites the marker.
    pub async fn delete_post(&self, id: &str, who: Author, why: &str) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.update(id, vec![FieldUpdate::MarkDeleted { who, why: why.to_string() }]);
        self.commit_with_retry("delete_post", id, batch).await?;
        debug!("delete_post: {} marked deleted", id);
        Ok(())
    }

    /// Replaces header and/or body and stamps the edit time. The bump is
    /// not touched.
    pub async fn edit_post(&self, id: &str, header: Option<String>, body: Option<String>) -> Result<()> {
        if header.is_none() && body.is_none() {
            return Err(ForumError::InvalidArgument(format!(
                "edit_post: nothing to change on {id}"
            )));
        }
        let mut updates = Vec::with_capacity(3);
        if let Some(header) = header {
            updates.push(FieldUpdate::SetHeader(header));
        }
        if let Some(body) = body {
            updates.push(FieldUpdate::SetBody(body));
        }
        updates.push(FieldUpdate::TouchEditTime);

        let mut batch = WriteBatch::new();
        batch.update(id, updates);
        self.commit_with_retry("edit_post", id, batch).await?;
        Ok(())
    }
}

/// Backoff before retry `attempt` (1-based): 10ms doubling, capped at
/// 640ms, plus up to half again of jitter.
fn retry_delay(attempt: u32) -> Duration {
    let base = 10u64 << attempt.saturating_sub(1).min(6);
    let jitter = rand::rng().random_range(0..=base / 2);
    Duration::from_millis(base + jitter)
}

fn validate_candidate(post: &Post) -> Result<()> {
    if post.path.is_empty() {
        return Err(ForumError::InvalidArgument("insert: empty path".into()));
    }
    if post.path.iter().any(|id| id.is_empty()) {
        return Err(ForumError::InvalidArgument(format!(
            "insert: empty identifier in path {:?}",
            post.path
        )));
    }
    if post.author.id.is_empty() {
        return Err(ForumError::InvalidArgument("insert: missing author".into()));
    }
    if post.child_count != 0 || post.descendant_count != 0 || post.bump.is_some() || post.deleted.is_some() {
        return Err(ForumError::InvalidArgument(format!(
            "insert: {} is not a fresh candidate",
            post.id()
        )));
    }
    Ok(())
}

/// Builds the single commit for an insert: one update per ancestor, the
/// child count only on the immediate parent, and the leaf creation.
fn propagation_batch(post: Post) -> WriteBatch {
    let mut batch = WriteBatch::new();
    let ancestors = post.ancestors();
    for (k, ancestor) in ancestors.iter().enumerate() {
        let mut updates = vec![
            FieldUpdate::IncrementDescendantCount(1),
            FieldUpdate::SetBump {
                id: post.id().to_string(),
                author: post.author.clone(),
                head: post.header.clone(),
            },
        ];
        if k + 1 == ancestors.len() {
            updates.push(FieldUpdate::IncrementChildCount(1));
        }
        batch.update(ancestor.clone(), updates);
    }
    batch.create(post);
    batch
}
