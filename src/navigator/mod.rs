pub mod chrome;

use std::time::Duration;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum NavigationError {
    #[error("timed out after {timeout:?} waiting for {target}")]
    Timeout { target: String, timeout: Duration },
    #[error("failed to load {url}: {reason}")]
    Load { url: String, reason: String },
    #[error("browser protocol error: {0}")]
    Protocol(String),
    #[error("no browsing context {0:?}")]
    UnknownContext(ContextHandle),
}

impl NavigationError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, NavigationError::Timeout { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextHandle(pub u64);

/// Snapshot of a DOM element: visible text plus attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    text: String,
    attributes: Vec<(String, String)>,
}

impl Element {
    pub fn new(text: impl Into<String>, attributes: Vec<(String, String)>) -> Self {
        Self {
            text: text.into(),
            attributes,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Browser-automation surface the crawler drives. All queries run in the current context.
#[async_trait]
pub trait Navigator: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), NavigationError>;

    /// Wait until `selector` is present, or fail with `NavigationError::Timeout`.
    async fn wait_for_element(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Element, NavigationError>;

    async fn find_all(&mut self, selector: &str) -> Result<Vec<Element>, NavigationError>;

    fn current_context(&self) -> ContextHandle;

    /// Open `url` in a fresh isolated context and make it current.
    async fn open_context(&mut self, url: &str) -> Result<ContextHandle, NavigationError>;

    /// Close the current context. Call `switch_context` before issuing further queries.
    async fn close_context(&mut self) -> Result<(), NavigationError>;

    async fn switch_context(&mut self, handle: ContextHandle) -> Result<(), NavigationError>;
}
