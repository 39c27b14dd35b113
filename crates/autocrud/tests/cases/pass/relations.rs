// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Mutually referencing and self-referencing relations.

use autocrud::{Cardinality, Entity};

#[derive(Entity)]
pub struct Author {
    #[id]
    pub id: i64,
    pub name: String,
    #[relation(local = "id", remote = "author_id")]
    pub posts: Vec<Post>,
}

#[derive(Entity)]
pub struct Post {
    #[id]
    pub id: i64,
    pub author_id: i64,
    #[relation(one, lazy, local = "author_id", remote = "id")]
    pub author: Option<Author>,
}

#[derive(Entity)]
pub struct Node {
    #[id]
    pub id: i64,
    pub parent_id: Option<i64>,
    #[relation(local = "parent_id", remote = "id")]
    pub parent: Option<Box<Node>>,
}

fn main() {
    let author = Author::descriptor();
    let (_, posts) = author.relation_fields().next().unwrap();
    assert_eq!(posts.cardinality, Cardinality::Many);
    assert_eq!(posts.target().name(), "Post");

    let post = Post::descriptor();
    let (_, back) = post.relation_fields().next().unwrap();
    assert!(back.lazy);
    assert_eq!(back.target().name(), "Author");

    assert!(Node::descriptor().validate().is_ok());
}
