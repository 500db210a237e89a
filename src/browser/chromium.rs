//! Chrome DevTools Protocol driver built on `chromiumoxide`.
//!
//! Interception is passive: every page listens to network events, and the JSON body of
//! any response matching an installed route is read once loading finishes and handed
//! to the route's handler. The same event stream feeds the in-flight request set used
//! for `WaitUntil::NetworkIdle`.

use super::{BrowserSession, ElementSnapshot, Page, ResponseHandler, UrlPattern, WaitUntil};
use crate::error::BrowserError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent, EventResponseReceived,
    GetResponseBodyParams, RequestId,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page as CdpPage;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// No request in flight for this long counts as network idle
const IDLE_WINDOW: Duration = Duration::from_millis(500);
const IDLE_POLL: Duration = Duration::from_millis(100);

type Routes = Arc<Mutex<Vec<(UrlPattern, ResponseHandler)>>>;

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub navigation_timeout: Duration,
}

pub struct ChromiumSession {
    browser: tokio::sync::Mutex<Browser>,
    handler: Mutex<Option<JoinHandle<()>>>,
    navigation_timeout: Duration,
}

impl ChromiumSession {
    pub async fn launch(options: &LaunchOptions) -> Result<Self, BrowserError> {
        let mut builder = BrowserConfig::builder().request_timeout(options.navigation_timeout);
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &options.executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        // The CDP connection only makes progress while its handler is polled
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "Browser handler error");
                }
            }
        });

        info!(headless = options.headless, "Browser session started");
        Ok(Self {
            browser: tokio::sync::Mutex::new(browser),
            handler: Mutex::new(Some(handler_task)),
            navigation_timeout: options.navigation_timeout,
        })
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn new_page(&self) -> Result<Box<dyn Page>, BrowserError> {
        let page = {
            let browser = self.browser.lock().await;
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| BrowserError::Page(e.to_string()))?
        };
        let page = ChromiumPage::attach(page, self.navigation_timeout).await?;
        Ok(Box::new(page))
    }

    async fn persist_state(&self, path: &Path) -> Result<(), BrowserError> {
        let state_err = |reason: String| BrowserError::SessionState {
            path: path.to_path_buf(),
            reason,
        };

        let cookies = {
            let browser = self.browser.lock().await;
            browser
                .get_cookies()
                .await
                .map_err(|e| state_err(e.to_string()))?
        };
        let json = serde_json::to_vec_pretty(&cookies).map_err(|e| state_err(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| state_err(e.to_string()))?;
        }
        std::fs::write(path, json).map_err(|e| state_err(e.to_string()))?;

        info!(path = %path.display(), cookies = cookies.len(), "Saved session state");
        Ok(())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let mut browser = self.browser.lock().await;
        browser
            .close()
            .await
            .map_err(|e| BrowserError::Page(e.to_string()))?;
        if let Err(e) = browser.wait().await {
            debug!(error = %e, "Browser process did not exit cleanly");
        }
        if let Some(handle) = self.handler.lock().take() {
            handle.abort();
        }
        info!("Browser session closed");
        Ok(())
    }
}

#[derive(Default)]
struct NetworkState {
    inflight: HashSet<String>,
    last_change: Option<Instant>,
}

impl NetworkState {
    fn begin(&mut self, request_id: &str) {
        self.inflight.insert(request_id.to_string());
        self.last_change = Some(Instant::now());
    }

    fn end(&mut self, request_id: &str) {
        if self.inflight.remove(request_id) {
            self.last_change = Some(Instant::now());
        }
    }

    /// How long the page has had no request in flight, if it has none now.
    fn quiet_for(&self) -> Option<Duration> {
        if !self.inflight.is_empty() {
            return None;
        }
        Some(self.last_change.map_or(Duration::MAX, |at| at.elapsed()))
    }
}

pub struct ChromiumPage {
    page: CdpPage,
    routes: Routes,
    network: Arc<Mutex<NetworkState>>,
    listener: JoinHandle<()>,
    navigation_timeout: Duration,
}

impl ChromiumPage {
    async fn attach(page: CdpPage, navigation_timeout: Duration) -> Result<Self, BrowserError> {
        let listen_err = |e: CdpError| BrowserError::Interception(e.to_string());
        // Subscribe before any navigation so no response slips past the routes
        let mut sent = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(listen_err)?;
        let mut received = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(listen_err)?;
        let mut finished = page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(listen_err)?;
        let mut failed = page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(listen_err)?;

        let routes: Routes = Arc::new(Mutex::new(Vec::new()));
        let network = Arc::new(Mutex::new(NetworkState::default()));

        let listener_page = page.clone();
        let listener_routes = Arc::clone(&routes);
        let listener_network = Arc::clone(&network);
        let listener = tokio::spawn(async move {
            // request id -> url of responses matched by a route, waiting for their body
            let mut matched: HashMap<String, String> = HashMap::new();
            loop {
                tokio::select! {
                    Some(event) = sent.next() => {
                        listener_network.lock().begin(event.request_id.inner());
                    }
                    Some(event) = received.next() => {
                        let url = &event.response.url;
                        let wanted = listener_routes
                            .lock()
                            .iter()
                            .any(|(pattern, _)| pattern.matches(url));
                        if wanted {
                            matched.insert(event.request_id.inner().clone(), url.clone());
                        }
                    }
                    Some(event) = finished.next() => {
                        if let Some(url) = matched.remove(event.request_id.inner()) {
                            deliver(&listener_page, &listener_routes, event.request_id.clone(), &url)
                                .await;
                        }
                        listener_network.lock().end(event.request_id.inner());
                    }
                    Some(event) = failed.next() => {
                        matched.remove(event.request_id.inner());
                        listener_network.lock().end(event.request_id.inner());
                    }
                    else => break,
                }
            }
        });

        Ok(Self {
            page,
            routes,
            network,
            listener,
            navigation_timeout,
        })
    }

    async fn wait_for_network_idle(&self) {
        let deadline = Instant::now() + self.navigation_timeout;
        loop {
            let quiet = self.network.lock().quiet_for();
            if quiet.is_some_and(|q| q >= IDLE_WINDOW) {
                return;
            }
            if Instant::now() >= deadline {
                debug!("Network never went idle before the navigation timeout");
                return;
            }
            tokio::time::sleep(IDLE_POLL).await;
        }
    }
}

async fn deliver(page: &CdpPage, routes: &Routes, request_id: RequestId, url: &str) {
    let body = match page.execute(GetResponseBodyParams::new(request_id)).await {
        Ok(response) => response.result,
        Err(e) => {
            warn!(url, error = %e, "Failed to read intercepted response body");
            return;
        }
    };
    if body.base64_encoded {
        debug!(url, "Skipping binary response body");
        return;
    }
    let json: Value = match serde_json::from_str(&body.body) {
        Ok(json) => json,
        Err(e) => {
            warn!(url, error = %e, "Intercepted response is not JSON");
            return;
        }
    };

    let handlers: Vec<ResponseHandler> = routes
        .lock()
        .iter()
        .filter(|(pattern, _)| pattern.matches(url))
        .map(|(_, handler)| Arc::clone(handler))
        .collect();
    for handler in handlers {
        handler(url, json.clone());
    }
}

#[async_trait]
impl Page for ChromiumPage {
    async fn goto(&self, url: &str, wait: WaitUntil) -> Result<(), BrowserError> {
        match tokio::time::timeout(self.navigation_timeout, self.page.goto(url)).await {
            Err(_) => {
                return Err(BrowserError::Navigation {
                    url: url.to_string(),
                    reason: format!("timed out after {:?}", self.navigation_timeout),
                })
            }
            Ok(Err(e)) => {
                return Err(BrowserError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
            Ok(Ok(_)) => {}
        }
        if wait == WaitUntil::NetworkIdle {
            self.wait_for_network_idle().await;
        }
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Evaluation(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn query_all(
        &self,
        selector: &str,
        attributes: &[&str],
    ) -> Result<Vec<ElementSnapshot>, BrowserError> {
        let query_err = |e: CdpError| BrowserError::Query {
            selector: selector.to_string(),
            reason: e.to_string(),
        };
        let elements = self.page.find_elements(selector).await.map_err(query_err)?;

        let mut snapshots = Vec::with_capacity(elements.len());
        for element in elements {
            let text = element.inner_text().await.map_err(query_err)?;
            let mut values = HashMap::new();
            for name in attributes {
                if let Some(value) = element.attribute(*name).await.map_err(query_err)? {
                    values.insert(name.to_string(), value);
                }
            }
            snapshots.push(ElementSnapshot {
                text,
                attributes: values,
            });
        }
        Ok(snapshots)
    }

    async fn intercept(
        &self,
        pattern: UrlPattern,
        handler: ResponseHandler,
    ) -> Result<(), BrowserError> {
        debug!(pattern = %pattern, "Installing response route");
        self.routes.lock().push((pattern, handler));
        Ok(())
    }

    async fn clear_intercepts(&self) -> Result<(), BrowserError> {
        self.routes.lock().clear();
        Ok(())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.listener.abort();
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| BrowserError::Page(e.to_string()))
    }
}

impl Drop for ChromiumPage {
    fn drop(&mut self) {
        self.listener.abort();
    }
}
