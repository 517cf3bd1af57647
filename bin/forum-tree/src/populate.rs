//! Random test data: three sections, a batch of threads in two of them,
//! and replies scattered over threads and earlier replies.

use anyhow::Context;
use fake::faker::lorem::en::Words;
use fake::Fake;
use ft_core::{Author, Forum, PostId};
use log::info;
use rand::Rng;
use std::collections::HashMap;

fn users() -> Vec<Author> {
    vec![
        Author::with_name("L3XOloruA4P02vJmTKdBkQiklub2", "Test1 Fugalist"),
        Author::with_name("abcdefghijklmnopqrstuvwxyz12", "Test2 Fugalist"),
    ]
}

fn admin() -> Author {
    Author::with_name("VRf7soDS0BQ6praLnktgJfD5CVa2", "Michael Coffin")
}

fn lorem(words: usize) -> String {
    let words: Vec<String> = Words(words..words + 1).fake();
    words.join(" ")
}

fn pick<T: Clone>(items: &[T]) -> T {
    items[rand::rng().random_range(0..items.len())].clone()
}

pub async fn run(forum: &Forum, threads: usize, replies: usize) -> anyhow::Result<()> {
    forum
        .create_section("Announcements", "Public announcements", 100, admin())
        .await
        .context("failed to create section")?;
    let libraries = forum
        .create_section("Synchron Libraries", "VSL Synchron Libraries", 200, admin())
        .await
        .context("failed to create section")?;
    let general = forum
        .create_section("General Discussion", "General discussion", 300, admin())
        .await
        .context("failed to create section")?;
    let sections = [libraries, general];
    let users = users();

    let mut subjects: HashMap<PostId, String> = HashMap::new();
    let mut targets: Vec<Vec<PostId>> = Vec::with_capacity(threads + replies);
    for _ in 0..threads {
        let section = pick(&sections);
        let subject = lorem(4);
        let path = forum
            .create_thread(&section[0], &subject, &lorem(400), pick(&users))
            .await
            .context("failed to create thread")?;
        subjects.insert(path[1].clone(), subject);
        targets.push(path);
    }

    if targets.is_empty() {
        return Ok(());
    }
    for _ in 0..replies {
        let parent = pick(&targets);
        let subject = subjects.get(&parent[1]).cloned().unwrap_or_default();
        let path = forum
            .create_reply(&parent, &subject, &lorem(20), pick(&users))
            .await
            .context("failed to create reply")?;
        targets.push(path);
    }

    info!("populated 3 sections, {} threads, {} replies", threads, replies);
    Ok(())
}
