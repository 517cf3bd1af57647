//! Process settings: defaults, then `forum-tree.toml`, then an explicit
//! `--config` file, then `FORUM_*` environment variables.

use config::{Config, ConfigError, Environment, File};
use ft_core::ForumSettings;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// `sqlite:<file>` / `sqlite::memory:` or `memory`.
    pub database_url: String,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
    pub forum: ForumSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite:forum_tree.db".to_string(),
            log_level: "info".to_string(),
            forum: ForumSettings::default(),
        }
    }
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(File::with_name("forum-tree").required(false));
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder
            .add_source(
                Environment::with_prefix("FORUM")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
