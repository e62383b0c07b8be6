//! WebDriver-backed [`BrowserDriver`] built on fantoccini.
//!
//! Talks to a running WebDriver endpoint (geckodriver, chromedriver). Each
//! element enumeration takes full snapshots so callers never hold live
//! element handles across navigations.

use std::time::Duration;

use fantoccini::elements::Element;
use fantoccini::error::{CmdError, NewSessionError};
use fantoccini::{Client, ClientBuilder};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::driver::{derive_selector, BrowserDriver, By, DriverError, ElementInfo, Locator};

/// Attributes captured on every element snapshot. Discovery reads these to
/// annotate graph nodes; anything absent on the element is simply skipped.
const SNAPSHOT_ATTRS: &[&str] = &[
    "id",
    "class",
    "name",
    "type",
    "href",
    "title",
    "placeholder",
    "aria-label",
    "role",
    "value",
    "action",
    "autocomplete",
    "onclick",
    "data-action",
    "data-target",
    "data-toggle",
    "data-dismiss",
    "data-bs-target",
    "data-bs-toggle",
];

/// Headless capability document for the given browser family.
pub fn headless_capabilities(browser: &str) -> Map<String, Value> {
    let mut caps = Map::new();
    match browser {
        "chrome" | "chromium" => {
            caps.insert(
                "goog:chromeOptions".to_string(),
                json!({ "args": ["--headless=new", "--disable-gpu", "--window-size=1920,1080"] }),
            );
        }
        _ => {
            caps.insert(
                "moz:firefoxOptions".to_string(),
                json!({ "args": ["-headless", "--width=1920", "--height=1080"] }),
            );
        }
    }
    caps
}

/// Owned form of a fantoccini locator. fantoccini's `Locator` borrows its
/// selector string, so strategies that need a rewritten selector (name,
/// class, tag) build one here first.
enum Strategy {
    Css(String),
    XPath(String),
    Id(String),
    LinkText(String),
}

impl Strategy {
    fn from_locator(locator: &Locator) -> Self {
        let value = locator.value.clone();
        match locator.by {
            By::Css => Strategy::Css(value),
            By::XPath => Strategy::XPath(value),
            By::Id => Strategy::Id(value),
            By::LinkText => Strategy::LinkText(value),
            By::Name => Strategy::Css(format!("[name=\"{value}\"]")),
            By::ClassName => Strategy::Css(format!(".{value}")),
            By::TagName => Strategy::Css(value),
            By::PartialLinkText => {
                Strategy::XPath(format!("//a[contains(normalize-space(.), \"{value}\")]"))
            }
        }
    }

    fn as_fantoccini(&self) -> fantoccini::Locator<'_> {
        match self {
            Strategy::Css(css) => fantoccini::Locator::Css(css),
            Strategy::XPath(xpath) => fantoccini::Locator::XPath(xpath),
            Strategy::Id(id) => fantoccini::Locator::Id(id),
            Strategy::LinkText(text) => fantoccini::Locator::LinkText(text),
        }
    }
}

fn map_cmd_error(err: CmdError, context: &str) -> DriverError {
    if err.is_no_such_element() {
        return DriverError::NotFound(format!("{context}: {err}"));
    }
    match &err {
        CmdError::WaitTimeout => DriverError::Timeout(context.to_string()),
        _ => {
            let text = err.to_string();
            if text.contains("stale") {
                DriverError::StaleElement(format!("{context}: {text}"))
            } else if text.contains("timeout") || text.contains("timed out") {
                DriverError::Timeout(format!("{context}: {text}"))
            } else {
                DriverError::Other(format!("{context}: {text}"))
            }
        }
    }
}

/// A live WebDriver session.
pub struct WebDriverSession {
    client: Client,
}

impl WebDriverSession {
    /// Connect to a WebDriver endpoint such as `http://localhost:4444`.
    pub async fn connect(
        webdriver_url: &str,
        capabilities: Map<String, Value>,
    ) -> Result<Self, DriverError> {
        let client = ClientBuilder::native()
            .capabilities(capabilities)
            .connect(webdriver_url)
            .await
            .map_err(|err: NewSessionError| {
                DriverError::Other(format!("webdriver session to {webdriver_url} failed: {err}"))
            })?;
        debug!(webdriver_url, "webdriver session established");
        Ok(Self { client })
    }

    /// End the session and close the browser window.
    pub async fn close(self) -> Result<(), DriverError> {
        self.client
            .close()
            .await
            .map_err(|err| map_cmd_error(err, "close session"))
    }

    async fn find_one(&self, locator: &Locator) -> Result<Element, DriverError> {
        let strategy = Strategy::from_locator(locator);
        self.client
            .find(strategy.as_fantoccini())
            .await
            .map_err(|err| map_cmd_error(err, &locator.to_string()))
    }

    async fn snapshot(&self, element: &Element, context: &str) -> Result<ElementInfo, DriverError> {
        let tag = element
            .tag_name()
            .await
            .map_err(|err| map_cmd_error(err, context))?
            .to_ascii_lowercase();
        let text = element
            .text()
            .await
            .map_err(|err| map_cmd_error(err, context))?;
        let displayed = element
            .is_displayed()
            .await
            .map_err(|err| map_cmd_error(err, context))?;

        let mut info = ElementInfo {
            tag: tag.clone(),
            text,
            selector: String::new(),
            displayed,
            attrs: Default::default(),
        };
        for name in SNAPSHOT_ATTRS {
            if let Some(value) = element
                .attr(name)
                .await
                .map_err(|err| map_cmd_error(err, context))?
            {
                info.attrs.insert((*name).to_string(), value);
            }
        }

        // Selects and tables carry their inner structure as synthesized
        // attributes so snapshots stay flat.
        if tag == "select" {
            let options = self.inner_texts(element, "option", context).await?;
            info.attrs.insert("options".to_string(), options.join("\n"));
        } else if tag == "table" {
            let headers = self.inner_texts(element, "th", context).await?;
            info.attrs.insert("headers".to_string(), headers.join("\n"));
        }

        info.selector = derive_selector(
            &info.tag,
            info.attrs.get("id").map(String::as_str),
            info.attrs.get("class").map(String::as_str),
        );
        Ok(info)
    }

    async fn inner_texts(
        &self,
        element: &Element,
        css: &str,
        context: &str,
    ) -> Result<Vec<String>, DriverError> {
        let children = element
            .find_all(fantoccini::Locator::Css(css))
            .await
            .map_err(|err| map_cmd_error(err, context))?;
        let mut texts = Vec::with_capacity(children.len());
        for child in &children {
            let text = child
                .text()
                .await
                .map_err(|err| map_cmd_error(err, context))?;
            texts.push(text);
        }
        Ok(texts)
    }
}

#[async_trait::async_trait]
impl BrowserDriver for WebDriverSession {
    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        self.client
            .goto(url)
            .await
            .map_err(|err| DriverError::Navigation(format!("goto {url}: {err}")))
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        let url = self
            .client
            .current_url()
            .await
            .map_err(|err| map_cmd_error(err, "current_url"))?;
        Ok(url.to_string())
    }

    async fn title(&self) -> Result<String, DriverError> {
        self.client
            .title()
            .await
            .map_err(|err| map_cmd_error(err, "title"))
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<ElementInfo>, DriverError> {
        let context = locator.to_string();
        let strategy = Strategy::from_locator(locator);
        let elements = self
            .client
            .find_all(strategy.as_fantoccini())
            .await
            .map_err(|err| map_cmd_error(err, &context))?;
        let mut snapshots = Vec::with_capacity(elements.len());
        for element in &elements {
            match self.snapshot(element, &context).await {
                Ok(info) => snapshots.push(info),
                // The DOM can re-render mid enumeration; skip what vanished.
                Err(err) if err.is_transient() => {
                    debug!(locator = %context, error = %err, "skipping stale element");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(snapshots)
    }

    async fn wait_for(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<ElementInfo, DriverError> {
        let context = locator.to_string();
        let strategy = Strategy::from_locator(locator);
        let element = self
            .client
            .wait()
            .at_most(timeout)
            .for_element(strategy.as_fantoccini())
            .await
            .map_err(|err| map_cmd_error(err, &context))?;
        self.snapshot(&element, &context).await
    }

    async fn click(&self, locator: &Locator) -> Result<(), DriverError> {
        let element = self.find_one(locator).await?;
        element
            .click()
            .await
            .map_err(|err| map_cmd_error(err, &locator.to_string()))
    }

    async fn send_keys(&self, locator: &Locator, text: &str) -> Result<(), DriverError> {
        let element = self.find_one(locator).await?;
        element
            .clear()
            .await
            .map_err(|err| map_cmd_error(err, &locator.to_string()))?;
        element
            .send_keys(text)
            .await
            .map_err(|err| map_cmd_error(err, &locator.to_string()))
    }

    async fn submit(&self, locator: &Locator) -> Result<(), DriverError> {
        let element = self.find_one(locator).await?;
        let enter = char::from(fantoccini::key::Key::Enter).to_string();
        element
            .send_keys(&enter)
            .await
            .map_err(|err| map_cmd_error(err, &locator.to_string()))
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        self.client
            .screenshot()
            .await
            .map_err(|err| map_cmd_error(err, "screenshot"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locator_strategies_rewrite_to_native_forms() {
        let by_name = Strategy::from_locator(&Locator::new(By::Name, "username"));
        assert!(matches!(by_name, Strategy::Css(css) if css == "[name=\"username\"]"));

        let by_class = Strategy::from_locator(&Locator::new(By::ClassName, "btn-primary"));
        assert!(matches!(by_class, Strategy::Css(css) if css == ".btn-primary"));

        let partial = Strategy::from_locator(&Locator::new(By::PartialLinkText, "Devices"));
        assert!(matches!(partial, Strategy::XPath(xpath) if xpath.contains("Devices")));

        let by_id = Strategy::from_locator(&Locator::new(By::Id, "main"));
        assert!(matches!(by_id, Strategy::Id(id) if id == "main"));
    }

    #[test]
    fn headless_capabilities_cover_both_families() {
        let firefox = headless_capabilities("firefox");
        assert!(firefox.contains_key("moz:firefoxOptions"));
        let chrome = headless_capabilities("chrome");
        assert!(chrome.contains_key("goog:chromeOptions"));
    }
}
