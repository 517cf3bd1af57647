//! # Core Traits (Ports)
//!
//! A storage plugin must implement [`PostStore`] to back the forum tree.
//! The write and query vocabulary below is everything the engine needs from
//! a document store: atomic batches with server timestamps, equality and
//! "path contains" filters, ordering on one field, and start-after paging.

use crate::error::StoreResult;
use crate::models::{Author, Bump, DeleteInfo, Post, PostId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Data persistence contract for forum posts.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Fetches one post, deleted or not.
    async fn get(&self, id: &str) -> StoreResult<Option<Post>>;

    /// Applies every write in the batch or none of them. Returns the server
    /// timestamp stamped into the batch.
    async fn commit(&self, batch: WriteBatch) -> StoreResult<DateTime<Utc>>;

    /// Runs a filtered, ordered, bounded listing. Deleted posts never match.
    async fn query(&self, query: &PostQuery) -> StoreResult<Vec<Post>>;
}

/// One document write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Create a new document; fails if the id is taken.
    Create(Post),
    /// Patch an existing document; fails if it is missing.
    Update { id: PostId, updates: Vec<FieldUpdate> },
}

impl Write {
    pub fn target(&self) -> &str {
        match self {
            Write::Create(post) => post.id(),
            Write::Update { id, .. } => id,
        }
    }
}

/// A single field mutation. Anything time-valued takes the commit timestamp.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    IncrementChildCount(u64),
    IncrementDescendantCount(u64),
    SetBump { id: PostId, author: Author, head: String },
    SetHeader(String),
    SetBody(String),
    TouchEditTime,
    MarkDeleted { who: Author, why: String },
}

impl FieldUpdate {
    /// Applies this mutation to an in-memory copy of a document.
    pub fn apply(&self, post: &mut Post, now: DateTime<Utc>) {
        match self {
            FieldUpdate::IncrementChildCount(n) => post.child_count += n,
            FieldUpdate::IncrementDescendantCount(n) => post.descendant_count += n,
            FieldUpdate::SetBump { id, author, head } => {
                post.bump = Some(Bump {
                    id: id.clone(),
                    author: author.clone(),
                    head: head.clone(),
                    time: now,
                })
            }
            FieldUpdate::SetHeader(header) => post.header = header.clone(),
            FieldUpdate::SetBody(body) => post.body = body.clone(),
            FieldUpdate::TouchEditTime => post.edit_time = Some(now),
            FieldUpdate::MarkDeleted { who, why } => {
                post.deleted = Some(DeleteInfo {
                    who: who.clone(),
                    why: why.clone(),
                    when: now,
                })
            }
        }
    }
}

/// Writes committed together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    pub writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, post: Post) -> &mut Self {
        self.writes.push(Write::Create(post));
        self
    }

    pub fn update(&mut self, id: impl Into<PostId>, updates: Vec<FieldUpdate>) -> &mut Self {
        self.writes.push(Write::Update { id: id.into(), updates });
        self
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Stamps a freshly created document with the commit time. A new post's
/// bump points at itself so it sorts by its own creation under bump order.
pub fn stamp_created(post: &mut Post, now: DateTime<Utc>) {
    post.create_time = Some(now);
    post.edit_time = Some(now);
    post.bump = Some(Bump {
        id: post.id().to_string(),
        author: post.author.clone(),
        head: post.header.clone(),
        time: now,
    });
}

/// Which posts a listing selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Direct children: `parent == id`.
    Parent(PostId),
    /// The post itself and every descendant: `path` contains `id`.
    PathContains(PostId),
}

impl Filter {
    pub fn target(&self) -> &str {
        match self {
            Filter::Parent(id) | Filter::PathContains(id) => id,
        }
    }
}

/// Field a listing is ordered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderField {
    CreateTime,
    BumpTime,
    Index,
}

impl OrderField {
    /// The value of this field on a post.
    pub fn value_of(&self, post: &Post) -> CursorValue {
        match self {
            OrderField::CreateTime => {
                CursorValue::Time(post.create_time.unwrap_or(DateTime::<Utc>::MIN_UTC))
            }
            OrderField::BumpTime => CursorValue::Time(post.bump_time()),
            OrderField::Index => CursorValue::Index(post.index),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Ascending,
    Descending,
}

/// A position on an ordered field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CursorValue {
    Time(DateTime<Utc>),
    Index(i64),
}

/// A complete listing request.
#[derive(Debug, Clone, PartialEq)]
pub struct PostQuery {
    pub filter: Filter,
    pub order_by: OrderField,
    pub direction: Direction,
    /// Only values strictly after this one (in `direction`) are returned.
    /// `None` starts at the head of the ordering with no bound at all.
    pub start_after: Option<CursorValue>,
    pub limit: usize,
}

impl PostQuery {
    /// Whether a post is selected, ignoring order and limit.
    pub fn matches(&self, post: &Post) -> bool {
        if post.is_deleted() {
            return false;
        }
        let selected = match &self.filter {
            Filter::Parent(id) => post.parent == *id,
            Filter::PathContains(id) => post.path.iter().any(|p| p == id),
        };
        selected && self.is_after_start(post)
    }

    fn is_after_start(&self, post: &Post) -> bool {
        let Some(start) = self.start_after else {
            return true;
        };
        let value = self.order_by.value_of(post);
        match self.direction {
            Direction::Ascending => value > start,
            Direction::Descending => value < start,
        }
    }

    /// Orders two matching posts by the listing's field and direction,
    /// ties broken by id in the same direction.
    pub fn compare(&self, a: &Post, b: &Post) -> Ordering {
        let ord = self
            .order_by
            .value_of(a)
            .cmp(&self.order_by.value_of(b))
            .then_with(|| a.id().cmp(b.id()));
        match self.direction {
            Direction::Ascending => ord,
            Direction::Descending => ord.reverse(),
        }
    }
}
