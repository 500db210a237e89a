//! Browser automation boundary
//!
//! The pipeline only sees `BrowserSession` (one per run) and `Page` (one per unit of
//! work). `chromium` drives a real Chrome over CDP; tests script their own pages.

pub mod chromium;
pub mod pattern;
pub mod scroll;

pub use chromium::ChromiumSession;
pub use pattern::UrlPattern;
pub use scroll::{scroll_until_stable, ScrollPolicy};

use crate::error::BrowserError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

pub const SCROLL_TO_BOTTOM_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight)";
pub const DOCUMENT_HEIGHT_SCRIPT: &str = "document.body.scrollHeight";

/// When a navigation counts as finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitUntil {
    /// The load event fired
    Load,
    /// Load fired and no request has been in flight for a short quiet window
    #[default]
    NetworkIdle,
}

/// Text and requested attributes of one rendered element
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementSnapshot {
    pub text: Option<String>,
    pub attributes: HashMap<String, String>,
}

impl ElementSnapshot {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Called with the URL and parsed JSON body of every response matching a route.
pub type ResponseHandler = Arc<dyn Fn(&str, Value) + Send + Sync>;

#[async_trait]
pub trait Page: Send + Sync {
    async fn goto(&self, url: &str, wait: WaitUntil) -> Result<(), BrowserError>;

    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError>;

    /// All elements matching `selector`, with their inner text and the named attributes.
    async fn query_all(
        &self,
        selector: &str,
        attributes: &[&str],
    ) -> Result<Vec<ElementSnapshot>, BrowserError>;

    /// Deliver JSON bodies of responses whose URL matches `pattern` to `handler`.
    /// Must be installed before the navigation that triggers the requests.
    async fn intercept(
        &self,
        pattern: UrlPattern,
        handler: ResponseHandler,
    ) -> Result<(), BrowserError>;

    async fn clear_intercepts(&self) -> Result<(), BrowserError>;

    async fn close(&self) -> Result<(), BrowserError>;

    async fn scroll_to_bottom(&self) -> Result<(), BrowserError> {
        self.evaluate(SCROLL_TO_BOTTOM_SCRIPT).await.map(|_| ())
    }

    async fn document_height(&self) -> Result<u64, BrowserError> {
        let value = self.evaluate(DOCUMENT_HEIGHT_SCRIPT).await?;
        value
            .as_u64()
            .or_else(|| value.as_f64().map(|h| h.max(0.0) as u64))
            .ok_or_else(|| {
                BrowserError::Evaluation(format!("document height is not a number: {}", value))
            })
    }
}

/// One browser execution context shared by every page of a run
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn Page>, BrowserError>;

    /// Write cookies and other session state to `path`.
    async fn persist_state(&self, path: &Path) -> Result<(), BrowserError>;

    async fn close(&self) -> Result<(), BrowserError>;
}
