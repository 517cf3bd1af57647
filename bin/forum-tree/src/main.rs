//! # forum-tree Binary
//!
//! The entry point that assembles the application based on compile-time features.

mod cli;
mod commands;
mod populate;
mod settings;

use anyhow::Context;
use clap::Parser;
use ft_core::{Forum, PostStore};
use std::sync::Arc;

// Feature-gated imports: each store plugin is compiled in on demand
#[cfg(feature = "store-sqlite")]
use ft_store_sqlite::SqlitePostStore;

#[cfg(feature = "store-memory")]
use ft_store_memory::MemoryPostStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = cli::Cli::parse();

    let mut settings = settings::Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    if let Some(url) = &cli.database_url {
        settings.database_url = url.clone();
    }
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(settings.log_level.as_str()));

    // 1. Initialize the store implementation, 2. hand it to the forum
    let store = open_store(&settings.database_url).await?;
    let forum = Forum::new(store, settings.forum.clone());

    log::debug!("using store {}", settings.database_url);
    commands::run(&forum, cli.command).await
}

async fn open_store(url: &str) -> anyhow::Result<Arc<dyn PostStore>> {
    if let Some(store) = open_sqlite(url).await? {
        return Ok(store);
    }
    if let Some(store) = open_memory(url) {
        return Ok(store);
    }
    anyhow::bail!("no store compiled in for database_url {url:?}")
}

#[cfg(feature = "store-sqlite")]
async fn open_sqlite(url: &str) -> anyhow::Result<Option<Arc<dyn PostStore>>> {
    if !url.starts_with("sqlite:") {
        return Ok(None);
    }
    let store = SqlitePostStore::new(url)
        .await
        .with_context(|| format!("failed to open {url}"))?;
    Ok(Some(Arc::new(store)))
}

#[cfg(not(feature = "store-sqlite"))]
async fn open_sqlite(_url: &str) -> anyhow::Result<Option<Arc<dyn PostStore>>> {
    Ok(None)
}

#[cfg(feature = "store-memory")]
fn open_memory(url: &str) -> Option<Arc<dyn PostStore>> {
    (url == "memory").then(|| Arc::new(MemoryPostStore::new()) as Arc<dyn PostStore>)
}

#[cfg(not(feature = "store-memory"))]
fn open_memory(_url: &str) -> Option<Arc<dyn PostStore>> {
    None
}
