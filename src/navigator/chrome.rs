use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{ContextHandle, Element, NavigationError, Navigator};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Headless Chromium over CDP. Each context is a separate tab.
pub struct ChromeNavigator {
    browser: Browser,
    handler: JoinHandle<()>,
    pages: HashMap<u64, Page>,
    current: u64,
    next_id: u64,
    page_load_timeout: Duration,
}

impl ChromeNavigator {
    pub async fn launch(headless: bool, page_load_timeout: Duration) -> Result<Self> {
        let mut builder = BrowserConfig::builder().request_timeout(page_load_timeout);
        if !headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Invalid browser config: {}", e))?;

        let (browser, mut events) = Browser::launch(config)
            .await
            .context("Failed to launch Chromium")?;
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let first = browser
            .new_page("about:blank")
            .await
            .context("Failed to open initial tab")?;

        let mut pages = HashMap::new();
        pages.insert(0, first);
        Ok(Self {
            browser,
            handler,
            pages,
            current: 0,
            next_id: 1,
            page_load_timeout,
        })
    }

    /// Close every tab and the browser process.
    pub async fn shutdown(mut self) {
        for (_, page) in self.pages.drain() {
            if let Err(e) = page.close().await {
                debug!("Tab close failed during shutdown: {}", e);
            }
        }
        if let Err(e) = self.browser.close().await {
            warn!("Browser close failed: {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
    }

    fn page(&self) -> Result<&Page, NavigationError> {
        self.pages
            .get(&self.current)
            .ok_or(NavigationError::UnknownContext(ContextHandle(self.current)))
    }
}

async fn snapshot(el: &chromiumoxide::Element) -> Result<Element, NavigationError> {
    let text = el
        .inner_text()
        .await
        .map_err(|e| NavigationError::Protocol(e.to_string()))?
        .unwrap_or_default();
    // CDP returns attributes as a flat [name, value, name, value, ...] list.
    let flat = el
        .attributes()
        .await
        .map_err(|e| NavigationError::Protocol(e.to_string()))?;
    let attributes = flat
        .chunks(2)
        .filter_map(|pair| match pair {
            [k, v] => Some((k.clone(), v.clone())),
            _ => None,
        })
        .collect();
    Ok(Element::new(text.trim(), attributes))
}

#[async_trait]
impl Navigator for ChromeNavigator {
    async fn navigate(&mut self, url: &str) -> Result<(), NavigationError> {
        let timeout = self.page_load_timeout;
        let page = self.page()?;
        match tokio::time::timeout(timeout, page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(NavigationError::Load {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(NavigationError::Timeout {
                target: url.to_string(),
                timeout,
            }),
        }
    }

    async fn wait_for_element(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Element, NavigationError> {
        let page = self.page()?;
        let started = Instant::now();
        loop {
            // An empty match keeps polling; a CDP failure does not.
            let found = page
                .find_elements(selector)
                .await
                .map_err(|e| NavigationError::Protocol(e.to_string()))?;
            if let Some(el) = found.first() {
                return snapshot(el).await;
            }
            if started.elapsed() >= timeout {
                return Err(NavigationError::Timeout {
                    target: selector.to_string(),
                    timeout,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn find_all(&mut self, selector: &str) -> Result<Vec<Element>, NavigationError> {
        let page = self.page()?;
        let found = page
            .find_elements(selector)
            .await
            .map_err(|e| NavigationError::Protocol(e.to_string()))?;
        let mut out = Vec::with_capacity(found.len());
        for el in &found {
            out.push(snapshot(el).await?);
        }
        Ok(out)
    }

    fn current_context(&self) -> ContextHandle {
        ContextHandle(self.current)
    }

    async fn open_context(&mut self, url: &str) -> Result<ContextHandle, NavigationError> {
        // The tab is registered before loading so a failed load can still be closed.
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| NavigationError::Protocol(e.to_string()))?;
        let id = self.next_id;
        self.next_id += 1;
        let previous = self.current;
        self.pages.insert(id, page);
        self.current = id;

        let timeout = self.page_load_timeout;
        let err = {
            let page = self.page()?;
            match tokio::time::timeout(timeout, page.goto(url)).await {
                Ok(Ok(_)) => return Ok(ContextHandle(id)),
                Ok(Err(e)) => NavigationError::Load {
                    url: url.to_string(),
                    reason: e.to_string(),
                },
                Err(_) => NavigationError::Timeout {
                    target: url.to_string(),
                    timeout,
                },
            }
        };

        self.current = previous;
        if let Some(page) = self.pages.remove(&id) {
            if let Err(e) = page.close().await {
                warn!("Failed to close tab for {}: {}", url, e);
            }
        }
        Err(err)
    }

    async fn close_context(&mut self) -> Result<(), NavigationError> {
        let page = self
            .pages
            .remove(&self.current)
            .ok_or(NavigationError::UnknownContext(ContextHandle(self.current)))?;
        page.close()
            .await
            .map_err(|e| NavigationError::Protocol(e.to_string()))
    }

    async fn switch_context(&mut self, handle: ContextHandle) -> Result<(), NavigationError> {
        if !self.pages.contains_key(&handle.0) {
            return Err(NavigationError::UnknownContext(handle));
        }
        self.current = handle.0;
        Ok(())
    }
}
