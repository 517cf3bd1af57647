//! # Cursors
//!
//! A cursor names an ordering and a resume position. It is a plain value:
//! nothing about a listing is remembered between calls, so a client can keep
//! a cursor across restarts and hand it back later.

use crate::error::{ForumError, Result};
use crate::models::Post;
use crate::traits::{CursorValue, Direction, OrderField};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "order", rename_all = "snake_case")]
pub enum Cursor {
    /// Oldest first. Used for reply trees.
    CreateTimeAscending { after: Option<DateTime<Utc>> },
    /// Most recently active first. Used for thread listings.
    BumpTimeDescending { after: Option<DateTime<Utc>> },
    /// Manual index, lowest first. Used for top-level sections.
    IndexAscending { after: Option<i64> },
}

impl Cursor {
    pub fn create_time_ascending() -> Self {
        Cursor::CreateTimeAscending { after: None }
    }

    pub fn bump_time_descending() -> Self {
        Cursor::BumpTimeDescending { after: None }
    }

    pub fn index_ascending() -> Self {
        Cursor::IndexAscending { after: None }
    }

    pub fn field(&self) -> OrderField {
        match self {
            Cursor::CreateTimeAscending { .. } => OrderField::CreateTime,
            Cursor::BumpTimeDescending { .. } => OrderField::BumpTime,
            Cursor::IndexAscending { .. } => OrderField::Index,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Cursor::CreateTimeAscending { .. } | Cursor::IndexAscending { .. } => {
                Direction::Ascending
            }
            Cursor::BumpTimeDescending { .. } => Direction::Descending,
        }
    }

    /// The value a page starts strictly after, or `None` for a first page,
    /// which starts at the head of the ordering without a bound. Bump order
    /// in particular must not cap a first page at the reader's clock, since
    /// commit times come from the store's clock.
    pub fn start_value(&self) -> Option<CursorValue> {
        match *self {
            Cursor::CreateTimeAscending { after } | Cursor::BumpTimeDescending { after } => {
                after.map(CursorValue::Time)
            }
            Cursor::IndexAscending { after } => after.map(CursorValue::Index),
        }
    }

    /// Cursor for the page following one that ended with `last`.
    pub fn advance(&self, last: &Post) -> Cursor {
        match self.field().value_of(last) {
            CursorValue::Time(t) => match self {
                Cursor::BumpTimeDescending { .. } => Cursor::BumpTimeDescending { after: Some(t) },
                _ => Cursor::CreateTimeAscending { after: Some(t) },
            },
            CursorValue::Index(i) => Cursor::IndexAscending { after: Some(i) },
        }
    }

    /// Renders the cursor as a URL-safe token.
    pub fn encode(&self) -> String {
        // Serializing a plain enum of timestamps and integers cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Parses a token produced by [`Cursor::encode`].
    pub fn decode(token: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|e| ForumError::InvalidArgument(format!("malformed cursor token: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ForumError::InvalidArgument(format!("malformed cursor token: {e}")))
    }
}
