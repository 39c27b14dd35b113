// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Derived entities served over HTTP end to end.

use std::sync::Arc;

use autocrud::{Entity, MemoryStorage, Resource, SchemaRegistry};
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode}
};
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

#[derive(Entity)]
pub struct Widget {
    #[id]
    #[auto]
    pub id: i64,
    pub name: String,
    #[auto]
    pub created_at: DateTime<Utc>,
}

#[derive(Entity)]
pub struct Author {
    #[id]
    #[auto]
    pub id: i64,
    pub name: String,
    #[relation(local = "id", remote = "author_id")]
    pub posts: Vec<Post>,
}

#[derive(Entity)]
pub struct Post {
    #[id]
    #[auto]
    pub id: i64,
    pub author_id: i64,
    pub title: String,
    pub rating: Option<i64>,
}

fn app() -> Router {
    let registry = SchemaRegistry::default();
    let storage = Arc::new(MemoryStorage::new());
    let mut router = Router::new();
    for routes in [
        Resource::new("/widgets", Widget::descriptor()).session(storage.clone()),
        Resource::new("/authors", Author::descriptor()).session(storage.clone()),
        Resource::new("/posts", Post::descriptor()).session(storage.clone()),
    ] {
        router = router.merge(routes.build(&registry).unwrap().into_router());
    }
    router
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty())
    }
    .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn widget_scenario() {
    let app = app();

    let (status, body) = send(&app, "POST", "/widgets", Some(json!({"name": "a"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({"id": 1}));

    let (status, body) = send(&app, "GET", "/widgets?page=1&size=10", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"], json!(1));
    assert_eq!(body["size"], json!(10));
    assert_eq!(body["total_pages"], json!(1));
    let row = &body["page_data"][0];
    assert_eq!(row["id"], json!(1));
    assert_eq!(row["name"], json!("a"));
    let created_at = row["created_at"].as_str().unwrap();
    assert!(created_at.parse::<DateTime<Utc>>().is_ok());

    let (status, _) = send(&app, "PUT", "/widgets/1", Some(json!({"name": "b"}))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, "GET", "/widgets/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], json!(1));
    assert_eq!(body["name"], json!("b"));

    let (status, _) = send(&app, "DELETE", "/widgets/1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", "/widgets/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn detail_embeds_related_rows() {
    let app = app();
    let (status, _) = send(&app, "POST", "/authors", Some(json!({"name": "ann"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    for title in ["first", "second"] {
        let (status, _) = send(
            &app,
            "POST",
            "/posts",
            Some(json!({"author_id": 1, "title": title}))
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(&app, "GET", "/authors/1", None).await;
    assert_eq!(status, StatusCode::OK);
    let posts = body["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 2);
    assert!(posts.iter().all(|post| post["author_id"] == json!(1)));

    let (_, list) = send(&app, "GET", "/authors", None).await;
    assert!(list["page_data"][0].get("posts").is_none());
}

#[tokio::test]
async fn list_filters_and_orders() {
    let app = app();
    let seeds = [
        json!({"author_id": 1, "title": "a", "rating": 3}),
        json!({"author_id": 1, "title": "b"}),
        json!({"author_id": 2, "title": "c", "rating": 5}),
    ];
    for post in seeds {
        send(&app, "POST", "/posts", Some(post)).await;
    }

    let (_, body) = send(&app, "GET", "/posts?author_id=1", None).await;
    assert_eq!(body["page_data"].as_array().map(Vec::len), Some(2));

    let (_, body) = send(&app, "GET", "/posts?rating=&allow_none=rating", None).await;
    assert_eq!(body["page_data"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["page_data"][0]["title"], json!("b"));

    let (_, body) = send(&app, "GET", "/posts?order_by=title&order_direction=desc", None).await;
    let titles: Vec<_> = body["page_data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|post| post["title"].clone())
        .collect();
    assert_eq!(titles, [json!("c"), json!("b"), json!("a")]);

    let (_, body) = send(&app, "GET", "/posts?size=2&page=2", None).await;
    assert_eq!(body["total_pages"], json!(2));
    assert_eq!(body["page_data"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn create_requires_declared_columns() {
    let app = app();
    let (status, _) = send(&app, "POST", "/posts", Some(json!({"title": "x"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
