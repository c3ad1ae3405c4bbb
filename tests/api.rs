mod support;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::json;
use time::macros::datetime;
use vitrine::application::repos::GuestbookRepo;
use vitrine_api_types::CommentRecord;

use support::{SESSION_TOKEN, TestAppBuilder, body_json};

const CRAWLER_AGENT: &str = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

fn post_guestbook(message: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::post("/api/guestbook")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", "203.0.113.9");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(json!({ "message": message }).to_string()))
        .expect("request")
}

#[tokio::test]
async fn guestbook_write_requires_sign_in() {
    let app = TestAppBuilder::default().build();

    let response = app.send(post_guestbook("hello", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "unauthorized");

    let response = app.send(post_guestbook("hello", Some("stale-token"))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app.guestbook_repo.list_recent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn guestbook_rejects_empty_and_oversized_messages() {
    let app = TestAppBuilder::default().build();

    for message in [String::new(), "a".repeat(601)] {
        let response = app.send(post_guestbook(&message, Some(SESSION_TOKEN))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "invalid_input");
        assert_eq!(body["error"]["issues"][0]["field"], "message");
    }
    assert!(app.guestbook_repo.list_recent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn guestbook_rejects_malformed_json() {
    let app = TestAppBuilder::default().build();
    let request = Request::post("/api/guestbook")
        .header(header::AUTHORIZATION, format!("Bearer {SESSION_TOKEN}"))
        .body(Body::from("{\"msg\":"))
        .expect("request");

    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn guestbook_accepts_message_at_length_limit() {
    let app = TestAppBuilder::default().build();
    let message = "é".repeat(600);

    let response = app.send(post_guestbook(&message, Some(SESSION_TOKEN))).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["message"], message.as_str());
    assert_eq!(body["userName"], "Ada Lovelace");
    assert_eq!(body["userImage"], "https://cdn.example/ada.png");
    let id = body["id"].as_str().expect("id is a string");
    assert_eq!(id.len(), 16);
    assert_ne!(id, "1");

    let listed = body_json(app.get("/api/guestbook").await).await;
    let entries = listed.as_array().expect("array");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["id"], id);
    assert!(entries[0].get("userEmail").is_none());
}

#[tokio::test]
async fn guestbook_lists_newest_first() {
    let app = TestAppBuilder::default().build();
    for message in ["first", "second"] {
        let response = app.send(post_guestbook(message, Some(SESSION_TOKEN))).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let listed = body_json(app.get("/api/guestbook").await).await;
    let messages: Vec<&str> = listed
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|entry| entry["message"].as_str())
        .collect();
    assert_eq!(messages, vec!["second", "first"]);
}

#[tokio::test]
async fn crawler_receives_synthetic_entry() {
    let app = TestAppBuilder::default().build();
    let request = Request::post("/api/guestbook")
        .header(header::USER_AGENT, CRAWLER_AGENT)
        .body(Body::from(r#"{"message":"indexed"}"#))
        .expect("request");

    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["id"], "0");
    assert_eq!(body["message"], "indexed");
    assert!(app.guestbook_repo.list_recent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn guestbook_write_limit_returns_retry_after() {
    let app = TestAppBuilder::default().write_limit(2).build();
    for message in ["one", "two"] {
        let response = app.send(post_guestbook(message, Some(SESSION_TOKEN))).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app.send(post_guestbook("three", Some(SESSION_TOKEN))).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .expect("retry-after header");
    assert!((1..=60).contains(&retry_after));
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "rate_limited");
    assert_eq!(app.guestbook_repo.list_recent(10).await.unwrap().len(), 2);
}

#[tokio::test]
async fn comments_are_listed_oldest_first_per_post() {
    let comment = |id: &str, post_id: &str, created_at| CommentRecord {
        id: id.to_string(),
        post_id: post_id.to_string(),
        author_name: "Reader".into(),
        author_image: None,
        body: format!("comment {id}"),
        created_at,
    };
    let app = TestAppBuilder::default()
        .comments(vec![
            comment("c2", "post-a", datetime!(2024-03-02 10:00 UTC)),
            comment("c1", "post-a", datetime!(2024-03-01 10:00 UTC)),
            comment("c3", "post-b", datetime!(2024-03-01 09:00 UTC)),
        ])
        .build();

    let response = app.get("/api/comments/post-a").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let ids: Vec<&str> = body
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|comment| comment["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["c1", "c2"]);
    assert_eq!(body[0]["postId"], "post-a");
    assert_eq!(body[0]["createdAt"], "2024-03-01T10:00:00Z");

    let empty = body_json(app.get("/api/comments/unknown").await).await;
    assert_eq!(empty, json!([]));
}

#[tokio::test]
async fn responses_carry_request_id() {
    let app = TestAppBuilder::default().build();
    let response = app.get("/api/guestbook").await;
    assert!(response.headers().contains_key("x-request-id"));
}
