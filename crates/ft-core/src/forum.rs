//! # Forum
//!
//! Section / thread / reply operations expressed on top of [`PostTree`].
//! Sections sit at depth 1, threads at depth 2, replies anywhere below.

use crate::config::ForumSettings;
use crate::cursor::Cursor;
use crate::error::{ForumError, Result};
use crate::models::{Author, Post, PostId, ROOT_PARENT};
use crate::traits::PostStore;
use crate::tree::{Page, PostTree};
use crate::uniq::uniq;
use log::info;
use std::sync::Arc;

/// Prefix added to a reply's subject.
pub const REPLY_PREFIX: &str = "Re: ";

#[derive(Clone)]
pub struct Forum {
    tree: PostTree,
}

impl Forum {
    pub fn new(store: Arc<dyn PostStore>, settings: ForumSettings) -> Self {
        Self { tree: PostTree::new(store, settings) }
    }

    /// The underlying tree engine.
    pub fn tree(&self) -> &PostTree {
        &self.tree
    }

    pub async fn create_section(
        &self,
        subject: &str,
        description: &str,
        index: i64,
        author: Author,
    ) -> Result<Vec<PostId>> {
        let post = Post::candidate(vec![uniq()], subject, description, author).with_index(index);
        let path = self.tree.insert(post).await?;
        info!("created section {:?} at index {}", path, index);
        Ok(path)
    }

    /// Every live section, lowest index first.
    pub async fn get_sections(&self) -> Result<Vec<Post>> {
        let n = self.tree.settings().sections_page;
        let page = self
            .tree
            .get_children(ROOT_PARENT, Cursor::index_ascending(), n)
            .await?;
        Ok(page.posts)
    }

    pub async fn create_thread(
        &self,
        section: &str,
        subject: &str,
        body: &str,
        author: Author,
    ) -> Result<Vec<PostId>> {
        if section.is_empty() {
            return Err(ForumError::InvalidArgument("create_thread: missing section".into()));
        }
        let post = Post::candidate(vec![section.to_string(), uniq()], subject, body, author);
        self.tree.insert(post).await
    }

    /// Threads of a section, most recently bumped first unless the caller
    /// resumes with its own cursor.
    pub async fn get_threads(&self, section: &str, cursor: Option<Cursor>, n: usize) -> Result<Page> {
        let cursor = cursor.unwrap_or_else(Cursor::bump_time_descending);
        self.tree.get_children(section, cursor, n).await
    }

    /// First page of a section's threads in bump order.
    pub async fn list_threads(&self, section: &str) -> Result<Vec<Post>> {
        let n = self.tree.settings().threads_page;
        Ok(self.get_threads(section, None, n).await?.posts)
    }

    /// Replies to the post at the end of `parent`.
    pub async fn create_reply(
        &self,
        parent: &[PostId],
        subject: &str,
        body: &str,
        author: Author,
    ) -> Result<Vec<PostId>> {
        if parent.is_empty() {
            return Err(ForumError::InvalidArgument("create_reply: empty parent path".into()));
        }
        let mut path = parent.to_vec();
        path.push(uniq());
        let post = Post::candidate(path, format!("{REPLY_PREFIX}{subject}"), body, author);
        self.tree.insert(post).await
    }

    /// A thread and all replies below it, oldest first by default.
    pub async fn get_replies(&self, thread: &str, cursor: Option<Cursor>, n: usize) -> Result<Page> {
        let cursor = cursor.unwrap_or_else(Cursor::create_time_ascending);
        self.tree.get_tree(thread, cursor, n).await
    }

    pub async fn get_post(&self, id: &str) -> Result<Post> {
        self.tree.get_post(id).await
    }

    pub async fn delete_section(&self, section: &str, who: Author, reason: &str) -> Result<()> {
        self.tree.delete_post(section, who, reason).await
    }

    pub async fn delete_thread(&self, thread: &str, who: Author, reason: &str) -> Result<()> {
        self.tree.delete_post(thread, who, reason).await
    }

    pub async fn update_thread(&self, thread: &str, subject: Option<String>, body: Option<String>) -> Result<()> {
        self.tree.edit_post(thread, subject, body).await
    }

    pub async fn update_section(&self, _section: &str, _subject: Option<String>, _body: Option<String>) -> Result<()> {
        Err(ForumError::NotSupported("update_section"))
    }

    /// Flat reply listing independent of the tree query.
    pub async fn list_replies(&self, _thread: &str) -> Result<Vec<Post>> {
        Err(ForumError::NotSupported("list_replies"))
    }

    /// Stages a reply that is not yet visible in the tree.
    pub async fn create_draft_reply(&self, _parent: &[PostId], _body: &str, _author: Author) -> Result<PostId> {
        Err(ForumError::NotSupported("create_draft_reply"))
    }

    /// Publishes a staged reply.
    pub async fn install_reply(&self, _author: &str, _draft: &str) -> Result<()> {
        Err(ForumError::NotSupported("install_reply"))
    }

    pub async fn update_reply(&self, _reply: &str, _body: &str) -> Result<()> {
        Err(ForumError::NotSupported("update_reply"))
    }

    pub async fn delete_reply(&self, _reply: &str, _who: Author, _reason: &str) -> Result<()> {
        Err(ForumError::NotSupported("delete_reply"))
    }
}
