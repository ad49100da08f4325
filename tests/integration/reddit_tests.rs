//! Reddit client tests against a mock API server

use article_relay::config::RedditConfig;
use article_relay::pipeline::{ItemSource, Publisher, ReplyHandle};
use article_relay::reddit::{RedditClient, RedditPublisher, SubredditSource};
use article_relay::RelayError;
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn reddit_config(base: &str) -> RedditConfig {
    RedditConfig {
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        username: "relay_bot".to_string(),
        password: "hunter2".to_string(),
        user_agent: "article-relay-test/1.0".to_string(),
        subreddits: vec!["worldnews".to_string(), "science".to_string()],
        distinguishable: vec![],
        banned_domains: vec![],
        api_base: base.to_string(),
        auth_base: base.to_string(),
    }
}

async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .and(body_string_contains("grant_type=password"))
        .and(body_string_contains("username=relay_bot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-123",
            "token_type": "bearer",
            "expires_in": 3600,
            "scope": "*"
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn link(id: &str, subreddit: &str, url: &str) -> Value {
    json!({
        "kind": "t3",
        "data": {
            "id": id,
            "name": format!("t3_{}", id),
            "subreddit": subreddit,
            "url": url,
            "is_self": false,
            "created_utc": 1_700_000_000.0
        }
    })
}

fn listing(children: Vec<Value>) -> Value {
    json!({ "kind": "Listing", "data": { "children": children, "after": null } })
}

fn created(name: &str) -> Value {
    json!({ "json": { "errors": [], "data": { "things": [
        { "kind": "t1", "data": { "name": name } }
    ] } } })
}

fn client_for(server: &MockServer) -> Arc<RedditClient> {
    Arc::new(RedditClient::new(&reddit_config(&server.uri())).expect("Failed to build client"))
}

#[tokio::test]
async fn test_source_polls_new_links_oldest_first() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/r/worldnews+science/new"))
        .and(query_param("limit", "100"))
        .and(header("authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(vec![
            link("c", "science", "https://journal.example.org/c"),
            json!({ "kind": "t3", "data": {
                "id": "b", "name": "t3_b", "subreddit": "worldnews",
                "url": "https://www.reddit.com/r/worldnews/comments/b",
                "is_self": true, "created_utc": 1_700_000_000.0
            } }),
            link("a", "worldnews", "https://news.example.com/a"),
        ])))
        .mount(&server)
        .await;

    let source = SubredditSource::new(
        client_for(&server),
        &["worldnews".to_string(), "science".to_string()],
        false,
    );

    let first = source.poll().await.unwrap();
    let ids: Vec<_> = first.iter().map(|c| c.external_id.as_str()).collect();
    assert_eq!(ids, vec!["t3_a", "t3_c"]);
    assert_eq!(first[0].origin, "worldnews");

    // Same listing again: nothing new, and the token is reused
    assert!(source.poll().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_source_skips_existing_on_first_poll() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/r/worldnews+science/new"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(listing(vec![link("a", "worldnews", "https://news.example.com/a")])),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/r/worldnews+science/new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(vec![
            link("b", "science", "https://journal.example.org/b"),
            link("a", "worldnews", "https://news.example.com/a"),
        ])))
        .mount(&server)
        .await;

    let source = SubredditSource::new(
        client_for(&server),
        &["worldnews".to_string(), "science".to_string()],
        true,
    );

    assert!(source.poll().await.unwrap().is_empty());
    let second = source.poll().await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].external_id, "t3_b");
}

#[tokio::test]
async fn test_rejected_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": "invalid_grant" })))
        .mount(&server)
        .await;

    let source = SubredditSource::new(client_for(&server), &["worldnews".to_string()], false);
    let result = source.poll().await;
    assert!(matches!(result, Err(RelayError::Reddit(_))));
}

#[tokio::test]
async fn test_publisher_posts_chain_and_pins() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/api/comment"))
        .and(body_string_contains("thing_id=t3_abc"))
        .and(body_string_contains("api_type=json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(created("t1_first")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/comment"))
        .and(body_string_contains("thing_id=t1_first"))
        .respond_with(ResponseTemplate::new(200).set_body_json(created("t1_second")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/distinguish"))
        .and(body_string_contains("id=t1_first"))
        .and(body_string_contains("how=yes"))
        .and(body_string_contains("sticky=true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "json": { "errors": [] } })))
        .expect(1)
        .mount(&server)
        .await;

    let publisher = RedditPublisher::new(client_for(&server));

    let first = publisher.post_reply("t3_abc", "part one").await.unwrap();
    assert_eq!(first, ReplyHandle("t1_first".to_string()));
    publisher.highlight(&first).await.unwrap();
    let second = publisher.reply_to_reply(&first, "part two").await.unwrap();
    assert_eq!(second.0, "t1_second");
}

#[tokio::test]
async fn test_publisher_surfaces_api_errors() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/api/comment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "json": { "errors": [
            ["RATELIMIT", "you are doing that too much", "ratelimit"]
        ] } })))
        .mount(&server)
        .await;

    let publisher = RedditPublisher::new(client_for(&server));
    match publisher.post_reply("t3_abc", "text").await {
        Err(RelayError::Reddit(message)) => assert!(message.contains("RATELIMIT")),
        other => panic!("expected Reddit error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_is_http_error() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/api/comment"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let publisher = RedditPublisher::new(client_for(&server));
    let result = publisher.post_reply("t3_abc", "text").await;
    assert!(matches!(result, Err(RelayError::Http { status: 503, .. })));
}
