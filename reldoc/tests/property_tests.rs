//! Property tests over generated blogs.
//!
//! Every case seeds a fresh in-memory store and checks the engine against a naive
//! evaluation of the same data:
//! - AND clauses and OR groups follow `AND(all) ∧ ⋀ OR(group)`.
//! - A relationship filter selects exactly the posts whose populated relation matches.
//! - Pages of any size concatenate to the unpaged result.

use proptest::prelude::*;
use reldoc::{backend::StoreBuilder, engine::QueryEngine, memory::InMemoryStore, page::QueryResult};
use serde_json::json;
use std::future::Future;

const STATUSES: [&str; 3] = ["draft", "published", "archived"];
const ROLES: [&str; 3] = ["admin", "user", "editor"];

#[derive(Clone, Debug)]
struct Post {
    status: &'static str,
    views: u32,
    author: Option<usize>,
}

#[derive(Clone, Debug)]
enum Clause {
    Status(&'static str),
    ViewsGte(u32),
    ViewsLt(u32),
}

impl Clause {
    fn param(&self) -> (String, String) {
        match self {
            Clause::Status(status) => ("status".to_string(), status.to_string()),
            Clause::ViewsGte(views) => ("views_gte".to_string(), views.to_string()),
            Clause::ViewsLt(views) => ("views_lt".to_string(), views.to_string()),
        }
    }

    fn holds(&self, post: &Post) -> bool {
        match self {
            Clause::Status(status) => post.status == *status,
            Clause::ViewsGte(views) => post.views >= *views,
            Clause::ViewsLt(views) => post.views < *views,
        }
    }
}

// =============================================================================
// STRATEGIES
// =============================================================================

fn status_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(STATUSES.to_vec())
}

fn role_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(ROLES.to_vec())
}

/// Authors index into the user list; indexes past its end leave dangling ids.
fn post_strategy() -> impl Strategy<Value = Post> {
    (status_strategy(), 0u32..100, prop::option::of(0usize..6))
        .prop_map(|(status, views, author)| Post { status, views, author })
}

fn clause_strategy() -> impl Strategy<Value = Clause> {
    prop_oneof![
        status_strategy().prop_map(Clause::Status),
        (0u32..100).prop_map(Clause::ViewsGte),
        (0u32..100).prop_map(Clause::ViewsLt),
    ]
}

// =============================================================================
// HELPERS
// =============================================================================

fn post_id(index: usize) -> String {
    format!("p{index:02}")
}

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

async fn seed(roles: &[&str], posts: &[Post]) -> QueryEngine<InMemoryStore> {
    let users = roles
        .iter()
        .enumerate()
        .map(|(index, role)| json!({"id": format!("u{index}"), "role": role}))
        .collect();
    let posts = posts
        .iter()
        .enumerate()
        .map(|(index, post)| {
            let mut value = json!({
                "id": post_id(index),
                "status": post.status,
                "views": post.views,
            });
            if let Some(author) = post.author {
                value["author_id"] = json!(format!("u{author}"));
            }
            value
        })
        .collect();

    let store = InMemoryStore::builder()
        .with_json("users", users)
        .with_json("posts", posts)
        .build()
        .await
        .unwrap();

    QueryEngine::new(store)
}

async fn run(
    engine: &QueryEngine<InMemoryStore>,
    mut params: Vec<(String, String)>,
) -> QueryResult {
    if !params.iter().any(|(key, _)| key == "limit") {
        params.push(("limit".to_string(), "100".to_string()));
    }

    engine.query_params("posts", params).await.unwrap()
}

fn owned_ids(result: &QueryResult) -> Vec<String> {
    result.ids().into_iter().map(str::to_string).collect()
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn and_clauses_and_or_groups_follow_the_formula(
        posts in prop::collection::vec(post_strategy(), 1..12),
        and in prop::collection::vec(clause_strategy(), 0..3),
        groups in prop::collection::vec(prop::collection::vec(clause_strategy(), 1..3), 0..3),
    ) {
        let mut params = and.iter().map(Clause::param).collect::<Vec<_>>();
        for (index, group) in groups.iter().enumerate() {
            params.extend(group.iter().map(|clause| {
                let (key, value) = clause.param();
                (format!("[or:g{index}]{key}"), value)
            }));
        }

        let expected = posts
            .iter()
            .enumerate()
            .filter(|(_, post)| {
                and.iter().all(|clause| clause.holds(post))
                    && groups.iter().all(|group| group.iter().any(|clause| clause.holds(post)))
            })
            .map(|(index, _)| post_id(index))
            .collect::<Vec<_>>();

        let actual = block_on(async {
            let engine = seed(&["admin"], &posts).await;
            owned_ids(&run(&engine, params).await)
        });

        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn relationship_filter_matches_populate_then_filter(
        roles in prop::collection::vec(role_strategy(), 1..5),
        posts in prop::collection::vec(post_strategy(), 1..12),
        role in role_strategy(),
    ) {
        let (filtered, expected) = block_on(async {
            let engine = seed(&roles, &posts).await;

            let filtered = run(&engine, vec![("author.role".to_string(), role.to_string())]).await;
            let populated =
                run(&engine, vec![("populate".to_string(), "author".to_string())]).await;
            let expected = populated
                .data
                .iter()
                .filter(|post| {
                    post.data
                        .get("author")
                        .is_some_and(|author| author["role"] == json!(role))
                })
                .map(|post| post.id.clone())
                .collect::<Vec<_>>();

            (owned_ids(&filtered), expected)
        });

        prop_assert_eq!(filtered, expected);
    }

    #[test]
    fn pages_partition_the_full_result(
        posts in prop::collection::vec(post_strategy(), 1..12),
        size in 1usize..6,
    ) {
        let (full, pages) = block_on(async {
            let engine = seed(&["admin"], &posts).await;
            let sort = ("sort".to_string(), "-views".to_string());

            let full = owned_ids(&run(&engine, vec![sort.clone()]).await);
            let mut pages = Vec::new();

            for page in 1..=posts.len() + 1 {
                let result = run(
                    &engine,
                    vec![
                        sort.clone(),
                        ("limit".to_string(), size.to_string()),
                        ("page".to_string(), page.to_string()),
                    ],
                )
                .await;
                let has_more = result.has_more;

                pages.push((owned_ids(&result), result.total));
                if !has_more {
                    break;
                }
            }

            (full, pages)
        });

        for (ids, total) in &pages {
            prop_assert!(ids.len() <= size);
            prop_assert_eq!(*total, Some(posts.len()));
        }

        let seen = pages.into_iter().flat_map(|(ids, _)| ids).collect::<Vec<_>>();
        prop_assert_eq!(seen, full);
    }
}
