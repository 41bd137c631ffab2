//! End-to-end tests of the HTTP routes over the in-memory store and a
//! temporary cover directory.

use api_lib::adapters::storage::LocalObjectStorage;
use api_lib::config::Config;
use api_lib::web::{self, state::AppState};
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use folktale_core::domain::Story;
use folktale_core::memory::InMemoryStore;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

fn story(id: i64, title: &str, region: &str, tags: &[&str]) -> Story {
    Story {
        id,
        title: title.to_string(),
        text: format!("Once upon a time, {}.", title.to_lowercase()),
        region: Some(region.to_string()),
        category: Some("folktale".to_string()),
        slug: Some(format!("tale-{}", id)),
        cover_image: None,
        author: None,
        language: Some("en".to_string()),
        source: None,
        source_url: None,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        created_at: Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
    }
}

fn config(storage_root: &Path) -> Config {
    let root = storage_root.display().to_string();
    Config::from_lookup(move |key| match key {
        "DATABASE_URL" => Some("postgres://unused".to_string()),
        "STORAGE_ROOT" => Some(root.clone()),
        "FEED_PAGE_SIZE" => Some("3".to_string()),
        _ => None,
    })
    .unwrap()
}

struct TestApp {
    router: Router,
    store: Arc<InMemoryStore>,
    dir: TempDir,
}

fn app(stories: Vec<Story>) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(config(dir.path()));
    let store = Arc::new(InMemoryStore::with_stories(stories));
    let storage = Arc::new(LocalObjectStorage::new(
        config.storage_root.clone(),
        config.public_base_url.clone(),
    ));
    let state = Arc::new(AppState {
        stories: store.clone(),
        favorites: store.clone(),
        accounts: store.clone(),
        storage,
        config,
    });
    TestApp {
        router: web::router(state).unwrap(),
        store,
        dir,
    }
}

fn seeded() -> TestApp {
    app(vec![
        story(1, "The Tortoise and the Hare", "africa", &["Animals", "Fable"]),
        story(2, "Anansi and the Pot of Wisdom", "africa", &["Trickster"]),
        story(3, "The Crane Wife", "asia", &["Animals"]),
        story(4, "Baba Yaga", "europe", &[]),
        story(5, "The Rainbow Serpent", "oceania", &["Myth"]),
    ])
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = send(router, Request::get(uri).body(Body::empty()).unwrap()).await;
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, value)
}

fn titles(page: &Value) -> Vec<String> {
    page["stories"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["title"].as_str().unwrap().to_string())
        .collect()
}

async fn signup(router: &Router, email: &str) -> String {
    let request = Request::post("/auth/signup")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "email": email, "password": "s3cret-pass" }).to_string(),
        ))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

fn with_cookie(method: &str, uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn stories_are_paged_newest_first() {
    let app = seeded();

    let (status, first) = get_json(&app.router, "/stories").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        titles(&first),
        vec!["The Rainbow Serpent", "Baba Yaga", "The Crane Wife"]
    );
    assert_eq!(first["has_more"], json!(true));

    let (_, second) = get_json(&app.router, "/stories?page=1").await;
    assert_eq!(
        titles(&second),
        vec!["Anansi and the Pot of Wisdom", "The Tortoise and the Hare"]
    );
    assert_eq!(second["has_more"], json!(false));
    assert_eq!(second["page"], json!(1));
}

#[tokio::test]
async fn filters_combine_and_resolve_display_names() {
    let app = seeded();

    let (status, page) = get_json(&app.router, "/stories?region=AFR&q=wisdom").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&page), vec!["Anansi and the Pot of Wisdom"]);
    assert_eq!(page["stories"][0]["region_name"], json!("Africa"));
    assert_eq!(page["stories"][0]["cover_image_url"], json!("/images/fallback/pics (3).jpeg"));

    let (status, _) = get_json(&app.router, "/stories?sort=sideways").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stories_filter_by_tag() {
    let app = seeded();

    let (status, page) = get_json(&app.router, "/stories?tag=animals").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&page), vec!["The Crane Wife", "The Tortoise and the Hare"]);
    assert_eq!(page["stories"][1]["tags"], json!(["Animals", "Fable"]));

    let (_, page) = get_json(&app.router, "/stories?tag=animals&region=asia").await;
    assert_eq!(titles(&page), vec!["The Crane Wife"]);

    let (_, page) = get_json(&app.router, "/stories?tag=anim").await;
    assert!(titles(&page).is_empty());
}

#[tokio::test]
async fn page_numbers_beyond_any_offset_are_rejected() {
    let app = seeded();

    let uri = format!("/stories?page={}", usize::MAX);
    let (status, _) = get_json(&app.router, &uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, page) = get_json(&app.router, "/stories?page=1000").await;
    assert_eq!(status, StatusCode::OK);
    assert!(titles(&page).is_empty());
    assert_eq!(page["has_more"], json!(false));
}

#[tokio::test]
async fn single_story_lookups() {
    let app = seeded();

    let (status, by_id) = get_json(&app.router, "/stories/3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_id["title"], json!("The Crane Wife"));

    let (status, by_slug) = get_json(&app.router, "/stories/slug/tale-4").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_slug["id"], json!(4));

    let (status, _) = get_json(&app.router, "/stories/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn random_story_needs_at_least_one_story() {
    let empty = app(Vec::new());
    let (status, _) = get_json(&empty.router, "/stories/random").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let app = seeded();
    let (status, story) = get_json(&app.router, "/stories/random").await;
    assert_eq!(status, StatusCode::OK);
    assert!((1..=5).contains(&story["id"].as_i64().unwrap()));
}

#[tokio::test]
async fn store_failures_are_reported_without_details() {
    let app = seeded();
    app.store.set_available(false);

    let (status, body) = send(&app.router, Request::get("/stories").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(String::from_utf8(body).unwrap(), "Could not load stories");
}

#[tokio::test]
async fn favorites_require_a_session() {
    let app = seeded();

    let (status, _) = get_json(&app.router, "/favorites/ids").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app.router, with_cookie("PUT", "/favorites/1", "session=forged")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.store.favorites_count(), 0);
}

#[tokio::test]
async fn signed_in_users_manage_their_favorites() {
    let app = seeded();
    let cookie = signup(&app.router, "reader@tales.example").await;

    let (status, _) = send(&app.router, with_cookie("PUT", "/favorites/2", &cookie)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    // Adding twice is still a success.
    let (status, _) = send(&app.router, with_cookie("PUT", "/favorites/2", &cookie)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app.router, with_cookie("PUT", "/favorites/4", &cookie)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app.router, with_cookie("PUT", "/favorites/99", &cookie)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app.router, with_cookie("GET", "/favorites/ids", &cookie)).await;
    let ids: Vec<i64> = serde_json::from_slice(&body).unwrap();
    assert_eq!(ids, vec![2, 4]);

    let (status, _) = send(&app.router, with_cookie("DELETE", "/favorites/2", &cookie)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(&app.router, with_cookie("GET", "/favorites", &cookie)).await;
    let favorites: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(favorites.as_array().unwrap().len(), 1);
    assert_eq!(favorites[0]["title"], json!("Baba Yaga"));

    let (_, body) = send(&app.router, with_cookie("GET", "/auth/me", &cookie)).await;
    let me: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(me["email"], json!("reader@tales.example"));
}

#[tokio::test]
async fn duplicate_signup_is_a_conflict() {
    let app = seeded();
    signup(&app.router, "twice@tales.example").await;

    let request = Request::post("/auth/signup")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "email": "twice@tales.example", "password": "another-pass" }).to_string(),
        ))
        .unwrap();
    let (status, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = seeded();
    let cookie = signup(&app.router, "leaving@tales.example").await;

    let (status, _) = send(&app.router, with_cookie("POST", "/auth/logout", &cookie)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app.router, with_cookie("GET", "/auth/me", &cookie)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

const BOUNDARY: &str = "folktale-boundary";

fn multipart_body(fields: &[(&str, &str)], cover: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, data)) = cover {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"cover_image\"; filename=\"{}\"\r\nContent-Type: image/png\r\n\r\n",
                BOUNDARY, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn submit(body: Vec<u8>) -> Request<Body> {
    Request::post("/stories")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn submitted_stories_store_their_cover() {
    let app = seeded();
    let body = multipart_body(
        &[
            ("title", "  The Magic Mortar "),
            ("text", "A mortar that grinds salt forever."),
            ("region", "asia"),
            ("author", ""),
            ("tags", "Magic, sea ,magic"),
        ],
        Some(("mortar.png", b"\x89PNG")),
    );

    let (status, body) = send(&app.router, submit(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    let created: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(created["id"], json!(6));
    assert_eq!(created["title"], json!("The Magic Mortar"));
    assert_eq!(created["author"], Value::Null);
    assert_eq!(created["tags"], json!(["Magic", "sea"]));

    let cover_url = created["cover_image"].as_str().unwrap();
    assert!(cover_url.starts_with("http://localhost:3000/covers/"));
    assert!(cover_url.ends_with("-mortar.png"));
    let file_name = cover_url.rsplit('/').next().unwrap();
    let stored = std::fs::read(app.dir.path().join("covers").join(file_name)).unwrap();
    assert_eq!(stored, b"\x89PNG");

    // The new story leads the feed.
    let (_, first) = get_json(&app.router, "/stories").await;
    assert_eq!(titles(&first)[0], "The Magic Mortar");
}

#[tokio::test]
async fn submissions_without_text_are_rejected_before_upload() {
    let app = seeded();
    let body = multipart_body(
        &[("title", "Untold"), ("text", "   ")],
        Some(("untold.png", b"png")),
    );

    let (status, _) = send(&app.router, submit(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!app.dir.path().join("covers").exists());
}

#[tokio::test]
async fn catalog_lists_regions_and_categories() {
    let app = seeded();

    let (status, regions) = get_json(&app.router, "/regions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(regions, json!(["africa", "asia", "europe", "oceania"]));

    let (status, markers) = get_json(&app.router, "/regions/map").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(markers.as_array().unwrap().len(), 6);

    let (status, _) = get_json(&app.router, "/categories").await;
    assert_eq!(status, StatusCode::OK);
}
