#![allow(dead_code)]

use std::sync::Arc;

use url2md_engine::ReqwestFetcher;
use url2md_server::{AppContext, ServerConfig, Transport};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ARTICLE_PAGE: &str = r#"<!doctype html>
<html>
<head><title>Rust Ownership Explained | Example Site</title></head>
<body>
  <nav><a href="/">Home</a> <a href="/about">About</a></nav>
  <article>
    <h1>Rust Ownership Explained</h1>
    <p>Every value in Rust has a single owner, and when that owner goes out of scope the value is dropped.
       Moving a value transfers ownership, so the previous binding can no longer be used. Read
       <a href="/guide">the guide</a> for a longer walk through the rules, with examples for each case.</p>
    <p><img src="/images/diagram.png" alt="Ownership diagram"></p>
    <p>Borrowing lets code use a value without taking ownership of it. Shared borrows allow many readers
       at once, while a mutable borrow grants exclusive access for as long as it lives. The compiler checks
       these rules before the program runs, so whole classes of memory errors never reach production code.</p>
  </article>
  <footer><a href="/privacy">Privacy</a></footer>
</body>
</html>"#;

/// Mock site serving `/article` and a 404 for `/missing`.
pub async fn article_site() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(ARTICLE_PAGE, "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    server
}

pub fn context() -> AppContext {
    context_with(&ServerConfig::default())
}

pub fn context_with(config: &ServerConfig) -> AppContext {
    url2md_logging::initialize_for_tests();
    AppContext::with_fetcher(config, Transport::Http, Arc::new(ReqwestFetcher::default()))
}
