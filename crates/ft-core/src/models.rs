//! # Domain Models
//!
//! The forum is a single tree of posts. Sections, threads and replies are
//! the same record at different depths; only the length of `path` differs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier of a post (see [`crate::uniq`]).
pub type PostId = String;

/// Parent value recorded on top-level sections.
pub const ROOT_PARENT: &str = "";

/// A reference to an identity owned by some external system.
///
/// Only the identifier is authoritative. The display name is a convenience
/// copy taken at write time and is never refreshed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Author {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), name: None }
    }

    pub fn with_name(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: Some(name.into()) }
    }

    /// Name to show, falling back to the identifier.
    pub fn display(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Most recent structural activity somewhere in a subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bump {
    /// The post whose insertion caused this bump.
    pub id: PostId,
    pub author: Author,
    pub head: String,
    pub time: DateTime<Utc>,
}

/// Soft-delete marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteInfo {
    pub who: Author,
    pub why: String,
    pub when: DateTime<Utc>,
}

/// Where a post sits in the forum, derived from its depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostKind {
    Section,
    Thread,
    Reply,
}

impl PostKind {
    pub fn label(self) -> &'static str {
        match self {
            PostKind::Section => "section",
            PostKind::Thread => "thread",
            PostKind::Reply => "reply",
        }
    }
}

/// The fundamental unit of the forum tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Ancestry from the root section down to this post, inclusive.
    pub path: Vec<PostId>,
    /// Second-to-last element of `path`, or [`ROOT_PARENT`] at depth 1.
    #[serde(default)]
    pub parent: PostId,
    /// Manual ordering of top-level sections.
    #[serde(default)]
    pub index: i64,
    pub header: String,
    pub body: String,
    pub author: Author,
    #[serde(default)]
    pub child_count: u64,
    #[serde(default)]
    pub descendant_count: u64,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bump: Option<Bump>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<DeleteInfo>,
    /// Assigned by the store when the post is committed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    /// Assigned by the store on creation and on header/body edits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_time: Option<DateTime<Utc>>,
}

impl Post {
    /// Builds an insertion candidate: counters zero, no bump, no marker,
    /// timestamps left for the store to assign.
    pub fn candidate(
        path: Vec<PostId>,
        header: impl Into<String>,
        body: impl Into<String>,
        author: Author,
    ) -> Self {
        Self {
            path,
            parent: PostId::new(),
            index: 0,
            header: header.into(),
            body: body.into(),
            author,
            child_count: 0,
            descendant_count: 0,
            view_count: 0,
            bump: None,
            deleted: None,
            create_time: None,
            edit_time: None,
        }
    }

    pub fn with_index(mut self, index: i64) -> Self {
        self.index = index;
        self
    }

    /// The post's own identifier, i.e. the last element of its path.
    pub fn id(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or_default()
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn kind(&self) -> PostKind {
        match self.depth() {
            0 | 1 => PostKind::Section,
            2 => PostKind::Thread,
            _ => PostKind::Reply,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.is_some()
    }

    /// Time used for bump ordering. A post that was never bumped sorts as
    /// if it had just been touched.
    pub fn bump_time(&self) -> DateTime<Utc> {
        self.bump.as_ref().map(|b| b.time).unwrap_or_else(Utc::now)
    }

    /// Ids of every ancestor, root first, excluding the post itself.
    pub fn ancestors(&self) -> &[PostId] {
        match self.path.split_last() {
            Some((_, rest)) => rest,
            None => &[],
        }
    }
}

/// Parent of the post at the end of `path`.
pub fn parent_of(path: &[PostId]) -> PostId {
    if path.len() < 2 {
        ROOT_PARENT.to_string()
    } else {
        path[path.len() - 2].clone()
    }
}
