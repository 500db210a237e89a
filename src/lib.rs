//! Skyhive: Bluesky Follow-Graph Crawler
//!
//! Walks the following lists of Bluesky accounts through the web app, queues every
//! account it finds in a status store (the hive), then collects profiles and posts
//! for queued accounts, writing them to a file-based staging area.

pub mod browser;
pub mod config;
pub mod error;
pub mod extract;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod resolver;
pub mod session;
pub mod staging;
pub mod store;
pub mod tooling;
pub mod types;
