mod common;

use reldoc::{
    backend::StoreBuilder,
    config::EngineConfig,
    engine::QueryEngine,
    error::{EngineError, QueryWarning},
    memory::InMemoryStore,
    query::SortOrder,
    request::QueryRequest,
};
use serde_json::json;
use std::collections::BTreeSet;

use common::blog;

fn author_fallback() -> QueryWarning {
    QueryWarning::RelationshipResolutionAmbiguous {
        field: "author_id".to_string(),
        missing: "authors".to_string(),
        fallback: "users".to_string(),
    }
}

// ── Posts and users ──

#[tokio::test]
async fn posts_and_users_walkthrough() {
    common::init_tracing();

    let store = InMemoryStore::builder()
        .with_json(
            "posts",
            vec![
                json!({"id": "p1", "author_id": "u1", "views": 150}),
                json!({"id": "p2", "author_id": "u2", "views": 50}),
            ],
        )
        .with_json(
            "users",
            vec![
                json!({"id": "u1", "role": "admin"}),
                json!({"id": "u2", "role": "user"}),
            ],
        )
        .build()
        .await
        .unwrap();
    let engine = QueryEngine::new(store);

    let popular = engine.query_params("posts", [("views_gte", "100")]).await.unwrap();
    assert_eq!(popular.ids(), vec!["p1"]);
    assert!(popular.warnings.is_empty());

    let by_admins = engine.query_params("posts", [("author.role", "admin")]).await.unwrap();
    assert_eq!(by_admins.ids(), vec!["p1"]);
    assert_eq!(by_admins.warnings, vec![author_fallback()]);

    let populated = engine
        .query_params("posts", [("id", "p1"), ("populate", "author")])
        .await
        .unwrap();
    assert_eq!(populated.data[0].data["author"]["id"], json!("u1"));
    assert_eq!(populated.data[0].data["author"]["role"], json!("admin"));
}

// ── Boolean structure ──

#[tokio::test]
async fn and_clauses_all_hold() {
    let engine = blog().await;

    let result = engine
        .query_params("posts", [("status", "published"), ("views_lt", "200")])
        .await
        .unwrap();

    assert_eq!(result.ids(), vec!["p1"]);
}

#[tokio::test]
async fn anonymous_or_group_needs_one_member() {
    let engine = blog().await;

    let result = engine
        .query_params("posts", [("[or]status", "draft"), ("[or]views_gte", "200")])
        .await
        .unwrap();

    assert_eq!(result.ids(), vec!["p2", "p3"]);
}

#[tokio::test]
async fn or_group_is_anded_with_plain_clauses() {
    let engine = blog().await;

    let result = engine
        .query_params(
            "posts",
            [("title_icontains", "rust"), ("[or]status", "draft"), ("[or]views_gte", "200")],
        )
        .await
        .unwrap();

    assert_eq!(result.ids(), vec!["p3"]);
}

#[tokio::test]
async fn named_or_groups_are_anded_together() {
    let engine = blog().await;

    let result = engine
        .query_params(
            "posts",
            [
                ("[or:state]status", "draft"),
                ("[or:state]status", "archived"),
                ("[or:reach]views_lt", "10"),
                ("[or:reach]title_startswith", "Un"),
            ],
        )
        .await
        .unwrap();

    assert_eq!(result.ids(), vec!["p4"]);
}

#[tokio::test]
async fn no_filters_returns_everything() {
    let engine = blog().await;

    let result = engine
        .query_params("posts", Vec::<(&str, &str)>::new())
        .await
        .unwrap();

    assert_eq!(result.ids(), vec!["p1", "p2", "p3", "p4"]);
    assert_eq!(result.total, Some(4));
    assert!(!result.has_more);
}

// ── Relationship filters ──

#[tokio::test]
async fn relationship_filter_agrees_with_populated_data() {
    let engine = blog().await;

    let filtered = engine.query_params("posts", [("author.role", "admin")]).await.unwrap();
    let populated = engine.query_params("posts", [("populate", "author")]).await.unwrap();

    let expected = populated
        .data
        .iter()
        .filter(|post| {
            post.data
                .get("author")
                .is_some_and(|author| author["role"] == json!("admin"))
        })
        .map(|post| post.id.as_str())
        .collect::<Vec<_>>();

    assert_eq!(filtered.ids(), expected);
}

#[tokio::test]
async fn relationship_filter_with_operator() {
    let engine = blog().await;

    let result = engine
        .query_params("posts", [("author.email_endswith", "@example.com")])
        .await
        .unwrap();

    assert_eq!(result.ids(), vec!["p1", "p2"]);
    assert_eq!(result.warnings, vec![author_fallback()]);
}

#[tokio::test]
async fn relationship_filter_without_matches_is_empty() {
    let engine = blog().await;

    let result = engine.query_params("posts", [("author.role", "nobody")]).await.unwrap();

    assert!(result.data.is_empty());
    assert_eq!(result.total, Some(0));
}

#[tokio::test]
async fn many_relationship_filters_overlap() {
    let engine = blog().await;

    let rust = engine.query_params("posts", [("tags.name", "rust")]).await.unwrap();
    assert_eq!(rust.ids(), vec!["p1"]);
    assert!(rust.warnings.is_empty());

    let either = engine.query_params("posts", [("tags.name_in", "rust,async")]).await.unwrap();
    assert_eq!(either.ids(), vec!["p1", "p2"]);
}

#[tokio::test]
async fn existence_filters_test_the_foreign_key() {
    let engine = blog().await;

    let orphans = engine.query_params("posts", [("author._isnull", "true")]).await.unwrap();
    assert_eq!(orphans.ids(), vec!["p4"]);

    let authored = engine.query_params("posts", [("author._isnull", "false")]).await.unwrap();
    assert_eq!(authored.ids(), vec!["p1", "p2", "p3"]);
}

#[tokio::test]
async fn deep_filters_are_rejected_by_default() {
    let engine = blog().await;

    let err = engine
        .query_params("posts", [("author.company.name", "Acme")])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::UnsupportedFilterDepth { ref path, depth: 2, max: 1 }
            if path == "author.company.name"
    ));
    assert!(err.is_client_error());
}

#[tokio::test]
async fn deep_filters_follow_the_configured_depth() {
    let store = blog().await.store().clone();
    let engine = QueryEngine::with_config(store, EngineConfig::default().with_max_filter_depth(2));

    let result = engine
        .query_params("posts", [("author.company.name", "Acme")])
        .await
        .unwrap();

    assert_eq!(result.ids(), vec!["p1"]);
}

#[tokio::test]
async fn numeric_bounds_ignore_numeric_looking_strings() {
    let store = InMemoryStore::builder()
        .with_json(
            "items",
            vec![
                json!({"id": "a", "views": "99"}),
                json!({"id": "b", "views": 150}),
            ],
        )
        .build()
        .await
        .unwrap();
    let engine = QueryEngine::new(store);
    let filters = json!({"views_gte": 100});

    let result = engine
        .db_query("items", filters.as_object().unwrap())
        .await
        .unwrap();

    assert_eq!(result.ids(), vec!["b"]);
}

// ── Sorting and pagination ──

#[tokio::test]
async fn sorts_descending_with_a_dash() {
    let engine = blog().await;

    let result = engine.query_params("posts", [("sort", "-views")]).await.unwrap();

    assert_eq!(result.ids(), vec!["p3", "p1", "p2", "p4"]);
}

#[tokio::test]
async fn pages_partition_the_result() {
    let engine = blog().await;
    let mut seen = Vec::new();

    for page in ["1", "2", "3"] {
        let result = engine
            .query_params("posts", [("sort", "title"), ("limit", "2"), ("page", page)])
            .await
            .unwrap();

        assert_eq!(result.total, Some(4));
        assert_eq!(result.limit, 2);
        assert_eq!(result.has_more, page == "1");
        seen.extend(result.ids().into_iter().map(str::to_string));
    }

    assert_eq!(seen, vec!["p2", "p1", "p3", "p4"]);
}

#[tokio::test]
async fn limit_is_clamped_and_count_can_be_skipped() {
    let store = blog().await.store().clone();
    let engine = QueryEngine::with_config(store, EngineConfig::default().with_max_limit(3));

    let result = engine
        .query_params("posts", [("limit", "100"), ("count", "false")])
        .await
        .unwrap();

    assert_eq!(result.limit, 3);
    assert_eq!(result.data.len(), 3);
    assert_eq!(result.total, None);
    assert!(result.has_more);
}

#[tokio::test]
async fn repeated_queries_agree() {
    let engine = blog().await;
    let params = [("author.role_in", "admin,user"), ("sort", "-views"), ("populate", "author")];

    let first = engine.query_params("posts", params).await.unwrap();
    let second = engine.query_params("posts", params).await.unwrap();

    assert_eq!(first.ids(), vec!["p1", "p2"]);
    assert_eq!(first.ids(), second.ids());
    assert_eq!(first.total, second.total);
    assert_eq!(first.warnings, second.warnings);
}

// ── Request surfaces ──

#[tokio::test]
async fn typed_json_filters() {
    let engine = blog().await;
    let filters = json!({"views_gte": 100, "tag_ids_overlaps": ["t2"], "limit": 10});

    let result = engine
        .db_query("posts", filters.as_object().unwrap())
        .await
        .unwrap();

    assert_eq!(result.ids(), vec!["p1"]);
    assert_eq!(result.limit, 10);
}

#[tokio::test]
async fn built_requests_through_a_collection_handle() {
    let engine = blog().await;
    let posts = engine.collection("posts");

    let request = posts
        .request()
        .populate("author")
        .unwrap()
        .sort("views", SortOrder::Asc)
        .limit(2)
        .build();
    let result = posts.query(request).await.unwrap();

    assert_eq!(result.ids(), vec!["p4", "p2"]);
    assert_eq!(result.data[1].data["author"]["name"], json!("Bob"));
}

#[tokio::test]
async fn select_keeps_chosen_and_populated_fields() {
    let engine = blog().await;

    let result = engine
        .query_params("posts", [("select", "title"), ("populate", "author")])
        .await
        .unwrap();

    let keys = |index: usize| {
        result.data[index]
            .data
            .keys()
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
    };

    assert_eq!(keys(0), BTreeSet::from(["author", "title"]));
    assert_eq!(keys(3), BTreeSet::from(["title"]));
}

#[tokio::test]
async fn serialized_result_is_flat() {
    let engine = blog().await;

    let result = engine
        .query(QueryRequest::builder("posts").limit(1).build())
        .await;
    let value = serde_json::to_value(result.unwrap()).unwrap();

    assert_eq!(value["data"][0]["id"], json!("p1"));
    assert_eq!(value["data"][0]["title"], json!("Learning Rust"));
    assert_eq!(value["total"], json!(4));
    assert_eq!(value["has_more"], json!(true));
    assert!(value.get("warnings").is_none());
}
