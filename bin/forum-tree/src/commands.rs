//! Dispatches parsed commands onto the forum.

use crate::cli::{split_path, Command, PageArgs, ReplyCommand, SectionCommand, ThreadCommand};
use crate::populate;
use anyhow::Context;
use ft_core::{Cursor, Forum, Page, Post};

pub async fn run(forum: &Forum, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Section(cmd) => section(forum, cmd).await,
        Command::Thread(cmd) => thread(forum, cmd).await,
        Command::Reply(cmd) => reply(forum, cmd).await,
        Command::Tree { id, page } => {
            let cursor = resume(&page)?.unwrap_or_else(Cursor::create_time_ascending);
            let listing = forum.tree().get_tree(&id, cursor, page.limit).await?;
            print_posts(&listing.posts)?;
            print_next(&listing);
            Ok(())
        }
        Command::Post { id } => {
            let post = forum.get_post(&id).await?;
            println!("{}", serde_json::to_string_pretty(&post)?);
            Ok(())
        }
        Command::Populate(args) => populate::run(forum, args.threads, args.replies).await,
    }
}

async fn section(forum: &Forum, cmd: SectionCommand) -> anyhow::Result<()> {
    match cmd {
        SectionCommand::Create { title, description, index, who } => {
            let path = forum
                .create_section(&title, &description, index, who.author())
                .await
                .context("failed to create section")?;
            println!("{}", path.join("/"));
        }
        SectionCommand::List => {
            for post in forum.get_sections().await? {
                println!("{}", summary(&post));
            }
        }
        SectionCommand::Update { id, title, description } => {
            forum.update_section(&id, title, description).await?;
        }
        SectionCommand::Delete { id, reason, who } => {
            forum.delete_section(&id, who.author(), &reason).await?;
        }
    }
    Ok(())
}

async fn thread(forum: &Forum, cmd: ThreadCommand) -> anyhow::Result<()> {
    match cmd {
        ThreadCommand::Create { section, subject, body, who } => {
            let path = forum
                .create_thread(&section, &subject, &body, who.author())
                .await
                .context("failed to create thread")?;
            println!("{}", path.join("/"));
        }
        ThreadCommand::List { section, page } => {
            let cursor = resume(&page)?;
            let listing = forum.get_threads(&section, cursor, page.limit).await?;
            for post in &listing.posts {
                println!("{}", summary(post));
            }
            print_next(&listing);
        }
        ThreadCommand::Update { id, subject, body } => {
            forum.update_thread(&id, subject, body).await?;
        }
        ThreadCommand::Delete { id, reason, who } => {
            forum.delete_thread(&id, who.author(), &reason).await?;
        }
    }
    Ok(())
}

async fn reply(forum: &Forum, cmd: ReplyCommand) -> anyhow::Result<()> {
    match cmd {
        ReplyCommand::Create { path, subject, body, who } => {
            let path = forum
                .create_reply(&split_path(&path), &subject, &body, who.author())
                .await
                .context("create reply failed")?;
            println!("{}", path.join("/"));
        }
        ReplyCommand::List { thread, flat: true, .. } => {
            print_posts(&forum.list_replies(&thread).await?)?;
        }
        ReplyCommand::List { thread, page, .. } => {
            let cursor = resume(&page)?;
            let listing = forum.get_replies(&thread, cursor, page.limit).await?;
            print_posts(&listing.posts)?;
            print_next(&listing);
        }
        ReplyCommand::Update { id, body } => forum.update_reply(&id, &body).await?,
        ReplyCommand::Delete { id, reason, who } => {
            forum.delete_reply(&id, who.author(), &reason).await?
        }
        ReplyCommand::Draft { path, body, who } => {
            let id = forum
                .create_draft_reply(&split_path(&path), &body, who.author())
                .await?;
            println!("{id}");
        }
        ReplyCommand::Install { uid, draft } => forum.install_reply(&uid, &draft).await?,
    }
    Ok(())
}

fn resume(page: &PageArgs) -> anyhow::Result<Option<Cursor>> {
    page.cursor
        .as_deref()
        .map(Cursor::decode)
        .transpose()
        .context("bad --cursor")
}

/// One listing line: kind, path, counters, header and author.
fn summary(post: &Post) -> String {
    format!(
        "{:<7} {} [{} replies] {} ({})",
        post.kind().label(),
        post.path.join("/"),
        post.descendant_count,
        post.header,
        post.author.display()
    )
}

fn print_posts(posts: &[Post]) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(posts)?);
    Ok(())
}

fn print_next(page: &Page) {
    if let Some(next) = &page.next {
        eprintln!("next: {}", next.encode());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ft_core::{Author, ForumError, ForumSettings, MockPostStore};
    use std::sync::Arc;

    fn forum(store: MockPostStore) -> Forum {
        Forum::new(Arc::new(store), ForumSettings::default())
    }

    #[test]
    fn summary_names_kind_and_author() {
        let post = Post::candidate(vec!["s".into(), "t".into()], "Hello", "", Author::with_name("u1", "Ella"));
        assert_eq!(summary(&post), "thread  s/t [0 replies] Hello (Ella)");
    }

    #[tokio::test]
    async fn flat_reply_listing_is_not_supported() {
        let mut store = MockPostStore::new();
        store.expect_query().never();
        let command = Command::Reply(ReplyCommand::List {
            thread: "t".into(),
            flat: true,
            page: PageArgs { limit: 20, cursor: None },
        });

        let err = run(&forum(store), command).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ForumError>(),
            Some(ForumError::NotSupported(_))
        ));
    }

    #[tokio::test]
    async fn bad_cursor_is_rejected_before_the_store() {
        let mut store = MockPostStore::new();
        store.expect_query().never();
        let command = Command::Thread(ThreadCommand::List {
            section: "s".into(),
            page: PageArgs { limit: 5, cursor: Some("%%%".into()) },
        });

        assert!(run(&forum(store), command).await.is_err());
    }

    #[tokio::test]
    async fn thread_listing_reads_one_page_in_bump_order() {
        let mut store = MockPostStore::new();
        store
            .expect_query()
            .times(1)
            .withf(|q| q.limit == 3 && q.start_after.is_none() && q.order_by == ft_core::OrderField::BumpTime)
            .returning(|_| Ok(Vec::new()));
        let command = Command::Thread(ThreadCommand::List {
            section: "s".into(),
            page: PageArgs { limit: 3, cursor: None },
        });

        run(&forum(store), command).await.unwrap();
    }
}
