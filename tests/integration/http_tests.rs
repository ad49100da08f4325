//! Page fetcher tests against a mock server

use article_relay::config::FetchConfig;
use article_relay::http::HttpFetcher;
use article_relay::pipeline::PageFetcher;
use article_relay::RelayError;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher() -> HttpFetcher {
    let config = FetchConfig {
        timeout_secs: 2,
        ..FetchConfig::default()
    };
    HttpFetcher::new(&config).expect("Failed to build fetcher")
}

#[tokio::test]
async fn test_fetch_returns_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/story"))
        .and(header_exists("user-agent"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body><p>Hello</p></body></html>")
                .insert_header("content-type", "text/html"),
        )
        .mount(&server)
        .await;

    let body = fetcher()
        .fetch(&format!("{}/story", server.uri()))
        .await
        .unwrap();
    assert!(body.contains("<p>Hello</p>"));
}

#[tokio::test]
async fn test_fetch_not_found_is_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let url = format!("{}/missing", server.uri());
    match fetcher().fetch(&url).await {
        Err(RelayError::Http { url: failed, status }) => {
            assert_eq!(status, 404);
            assert_eq!(failed, url);
        }
        other => panic!("expected HTTP error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(std::time::Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let result = fetcher().fetch(&format!("{}/slow", server.uri())).await;
    assert!(matches!(result, Err(RelayError::Timeout { .. })));
}
