//! staffcrawl - employee directory crawl and profile extraction.
//!
//! Signs in to a JavaScript-heavy staff directory, scrolls its listing to
//! collect every profile link, reads each profile with ordered selector
//! strategies and writes one JSON record per person as soon as it is
//! complete.

pub mod auth;
pub mod browser;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod debug_capture;
pub mod discovery;
pub mod error;
pub mod extract;
pub mod images;
pub mod merge;
pub mod models;
pub mod orchestrator;
pub mod persist;
pub mod retry;
pub mod storage;

pub use error::CrawlError;
pub use orchestrator::{CrawlEvent, CrawlOrchestrator, CrawlState, CrawlSummary};
