//! # ft-store-memory
//!
//! In-process implementation of `PostStore`.
//! Every commit runs under one write lock, so a batch is applied as a whole
//! and concurrent commits are serialized. Server timestamps are strictly
//! increasing, which keeps creation order total even for back-to-back writes.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use ft_core::error::{StoreError, StoreResult};
use ft_core::models::{Post, PostId};
use ft_core::traits::{stamp_created, PostQuery, PostStore, Write, WriteBatch};
use log::debug;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tokio::sync::RwLock;

struct State {
    posts: HashMap<PostId, Post>,
    /// Last timestamp handed out.
    clock: DateTime<Utc>,
}

pub struct MemoryPostStore {
    state: RwLock<State>,
}

impl Default for MemoryPostStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPostStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                posts: HashMap::new(),
                clock: DateTime::<Utc>::MIN_UTC,
            }),
        }
    }

    /// Number of stored documents, deleted ones included.
    pub async fn len(&self) -> usize {
        self.state.read().await.posts.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn next_stamp(last: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > last {
        now
    } else {
        last + Duration::nanoseconds(1)
    }
}

#[async_trait]
impl PostStore for MemoryPostStore {
    async fn get(&self, id: &str) -> StoreResult<Option<Post>> {
        Ok(self.state.read().await.posts.get(id).cloned())
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<DateTime<Utc>> {
        let mut state = self.state.write().await;
        let now = next_stamp(state.clock);

        // Stage touched documents; nothing reaches `posts` unless every write succeeds.
        let mut staged: HashMap<PostId, Post> = HashMap::with_capacity(batch.len());
        for write in batch.writes {
            match write {
                Write::Create(mut post) => {
                    let id = post.id().to_string();
                    if state.posts.contains_key(&id) || staged.contains_key(&id) {
                        return Err(StoreError::AlreadyExists(id));
                    }
                    stamp_created(&mut post, now);
                    staged.insert(id, post);
                }
                Write::Update { id, updates } => {
                    let doc = match staged.entry(id.clone()) {
                        Entry::Occupied(e) => e.into_mut(),
                        Entry::Vacant(e) => {
                            let current = state
                                .posts
                                .get(&id)
                                .cloned()
                                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
                            e.insert(current)
                        }
                    };
                    for update in &updates {
                        update.apply(doc, now);
                    }
                }
            }
        }

        debug!("memory commit: {} documents at {}", staged.len(), now);
        state.posts.extend(staged);
        state.clock = now;
        Ok(now)
    }

    async fn query(&self, query: &PostQuery) -> StoreResult<Vec<Post>> {
        let state = self.state.read().await;
        let mut posts: Vec<Post> = state
            .posts
            .values()
            .filter(|p| query.matches(p))
            .cloned()
            .collect();
        posts.sort_by(|a, b| query.compare(a, b));
        posts.truncate(query.limit);
        Ok(posts)
    }
}
