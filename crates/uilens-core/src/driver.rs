//! Browser driver abstraction.
//!
//! Discovery and the runtime components never talk to a browser directly;
//! they drive this trait. The `webdriver` cargo feature provides a
//! fantoccini-backed implementation, and tests use an in-memory fake.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Browser-side failures, narrowed by kind so callers can tell transient
/// conditions (worth skipping or retrying) from real errors.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Element handle went stale between enumeration and use.
    #[error("stale element: {0}")]
    StaleElement(String),
    /// No element matched the locator.
    #[error("element not found: {0}")]
    NotFound(String),
    /// Operation did not complete in time.
    #[error("timed out: {0}")]
    Timeout(String),
    /// Page load or URL change failed.
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("driver error: {0}")]
    Other(String),
}

impl DriverError {
    /// Transient errors are expected during crawling (the DOM re-renders
    /// under us) and are skipped per element rather than aborting a page.
    pub fn is_transient(&self) -> bool {
        matches!(self, DriverError::StaleElement(_) | DriverError::Timeout(_))
    }
}

/// Element lookup strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum By {
    Id,
    Name,
    XPath,
    Css,
    ClassName,
    TagName,
    LinkText,
    PartialLinkText,
}

impl By {
    /// Parse the strategy names used in generated artifacts.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "id" => Some(By::Id),
            "name" => Some(By::Name),
            "xpath" => Some(By::XPath),
            "css" | "css_selector" => Some(By::Css),
            "class_name" => Some(By::ClassName),
            "tag_name" => Some(By::TagName),
            "link_text" => Some(By::LinkText),
            "partial_link_text" => Some(By::PartialLinkText),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            By::Id => "id",
            By::Name => "name",
            By::XPath => "xpath",
            By::Css => "css",
            By::ClassName => "class_name",
            By::TagName => "tag_name",
            By::LinkText => "link_text",
            By::PartialLinkText => "partial_link_text",
        }
    }
}

/// A lookup strategy plus its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub by: By,
    pub value: String,
}

impl Locator {
    pub fn new(by: By, value: impl Into<String>) -> Self {
        Self {
            by,
            value: value.into(),
        }
    }

    pub fn css(value: impl Into<String>) -> Self {
        Self::new(By::Css, value)
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.by.as_str(), self.value)
    }
}

/// Snapshot of one DOM element taken during enumeration.
#[derive(Debug, Clone, Default)]
pub struct ElementInfo {
    pub tag: String,
    pub text: String,
    /// Stable CSS selector for re-finding the element: `#id` when the
    /// element has an id, `.firstClass` when it has classes, else the tag.
    pub selector: String,
    pub displayed: bool,
    pub attrs: BTreeMap<String, String>,
}

impl ElementInfo {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }
}

/// Derive the stable CSS selector for an element from its id, classes,
/// and tag.
pub fn derive_selector(tag: &str, id: Option<&str>, classes: Option<&str>) -> String {
    if let Some(id) = id {
        if !id.is_empty() {
            return format!("#{id}");
        }
    }
    if let Some(classes) = classes {
        if let Some(first) = classes.split_whitespace().next() {
            return format!(".{first}");
        }
    }
    tag.to_string()
}

/// Asynchronous browser session used by discovery and the runtime
/// components. Implementations must keep actions strictly sequential.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Navigate to a URL and wait for the page to settle.
    async fn goto(&self, url: &str) -> Result<(), DriverError>;

    async fn current_url(&self) -> Result<String, DriverError>;

    async fn title(&self) -> Result<String, DriverError>;

    /// Enumerate all elements matching the locator as snapshots.
    async fn find_all(&self, locator: &Locator) -> Result<Vec<ElementInfo>, DriverError>;

    /// Wait up to `timeout` for an element matching the locator to appear,
    /// returning its snapshot. Times out with [`DriverError::Timeout`].
    async fn wait_for(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<ElementInfo, DriverError>;

    /// Click the first element matching the locator.
    async fn click(&self, locator: &Locator) -> Result<(), DriverError>;

    /// Clear the first matching input and type `text` into it.
    async fn send_keys(&self, locator: &Locator, text: &str) -> Result<(), DriverError>;

    /// Submit the form containing the first matching element.
    async fn submit(&self, locator: &Locator) -> Result<(), DriverError>;

    /// PNG-encoded screenshot of the current viewport.
    async fn screenshot(&self) -> Result<Vec<u8>, DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by_parses_artifact_names() {
        assert_eq!(By::parse("id"), Some(By::Id));
        assert_eq!(By::parse("css"), Some(By::Css));
        assert_eq!(By::parse("css_selector"), Some(By::Css));
        assert_eq!(By::parse("partial_link_text"), Some(By::PartialLinkText));
        assert_eq!(By::parse("bogus"), None);
    }

    #[test]
    fn transient_errors() {
        assert!(DriverError::StaleElement("x".into()).is_transient());
        assert!(DriverError::Timeout("x".into()).is_transient());
        assert!(!DriverError::NotFound("x".into()).is_transient());
        assert!(!DriverError::Navigation("x".into()).is_transient());
    }

    #[test]
    fn selector_derivation_priority() {
        assert_eq!(derive_selector("button", Some("save"), Some("btn")), "#save");
        assert_eq!(derive_selector("button", Some(""), Some("btn primary")), ".btn");
        assert_eq!(derive_selector("button", None, None), "button");
    }
}
