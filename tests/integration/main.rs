//! Integration tests for the crawl pipeline, the status store and the CLI

mod pipeline_stages;
mod store_properties;
