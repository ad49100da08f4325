//! Integration tests for article-relay
//!
//! Store-level tests run against on-disk SQLite files in temp directories;
//! HTTP collaborators are exercised against wiremock servers.

mod http_tests;
mod pipeline_tests;
mod queue_tests;
mod reddit_tests;
