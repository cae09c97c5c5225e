#![allow(dead_code)]

use reldoc::{backend::StoreBuilder, engine::QueryEngine, memory::InMemoryStore};
use serde_json::json;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A small blog: posts written by users, who work for companies, tagged with tags.
///
/// There is deliberately no `authors` or `categories` collection.
pub async fn blog() -> QueryEngine<InMemoryStore> {
    init_tracing();

    let store = InMemoryStore::builder()
        .with_json(
            "users",
            vec![
                json!({
                    "id": "u1",
                    "name": "Ada",
                    "role": "admin",
                    "email": "ada@example.com",
                    "company_id": "c1",
                }),
                json!({
                    "id": "u2",
                    "name": "Bob",
                    "role": "user",
                    "email": "bob@example.com",
                    "company_id": "c2",
                }),
                json!({"id": "u3", "name": "Cy", "role": "editor"}),
            ],
        )
        .with_json(
            "companies",
            vec![
                json!({"id": "c1", "name": "Acme"}),
                json!({"id": "c2", "name": "Globex"}),
            ],
        )
        .with_json(
            "tags",
            vec![
                json!({"id": "t1", "name": "rust"}),
                json!({"id": "t2", "name": "async"}),
            ],
        )
        .with_json(
            "posts",
            vec![
                json!({
                    "id": "p1",
                    "title": "Learning Rust",
                    "author_id": "u1",
                    "views": 150,
                    "tag_ids": ["t1", "t2"],
                    "status": "published",
                }),
                json!({
                    "id": "p2",
                    "title": "Async Patterns",
                    "author_id": "u2",
                    "views": 50,
                    "tag_ids": ["t2"],
                    "status": "draft",
                }),
                json!({
                    "id": "p3",
                    "title": "Rusty Nails",
                    "author_id": "u3",
                    "views": 300,
                    "status": "published",
                    "category_id": "k9",
                }),
                json!({"id": "p4", "title": "Untitled", "views": 0, "status": "archived"}),
            ],
        )
        .build()
        .await
        .unwrap();

    tracing::debug!("seeded blog fixture");

    QueryEngine::new(store)
}
