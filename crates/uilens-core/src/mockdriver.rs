//! Scripted in-memory driver for tests. Pages are registered up front with
//! the element snapshots each locator should return and the effect each
//! click should have.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::driver::{derive_selector, BrowserDriver, DriverError, ElementInfo, Locator};

#[derive(Debug, Clone)]
pub(crate) enum ClickEffect {
    /// Click navigates to another registered page.
    Navigate(String),
    /// Click opens the page's modal layer.
    OpenModal,
    /// Click does nothing observable.
    Noop,
    /// Click fails with a stale-element error.
    Stale,
}

#[derive(Debug, Default)]
pub(crate) struct FakePage {
    pub title: String,
    /// Locator value -> element snapshots returned by find_all.
    elements: HashMap<String, Vec<ElementInfo>>,
    /// Locator value -> elements visible only while the modal layer is open.
    modal_elements: HashMap<String, Vec<ElementInfo>>,
    /// Locator value -> click effect.
    clicks: HashMap<String, ClickEffect>,
    screenshot: Vec<u8>,
}

impl FakePage {
    pub fn elements(&mut self, locator_value: &str, elements: Vec<ElementInfo>) -> &mut Self {
        self.elements.insert(locator_value.to_string(), elements);
        self
    }

    pub fn modal_elements(
        &mut self,
        locator_value: &str,
        elements: Vec<ElementInfo>,
    ) -> &mut Self {
        self.modal_elements
            .insert(locator_value.to_string(), elements);
        self
    }

    pub fn on_click(&mut self, locator_value: &str, effect: ClickEffect) -> &mut Self {
        self.clicks.insert(locator_value.to_string(), effect);
        self
    }

    pub fn screenshot(&mut self, bytes: Vec<u8>) -> &mut Self {
        self.screenshot = bytes;
        self
    }
}

/// Build an element snapshot the way the real driver would report it.
pub(crate) fn element(
    tag: &str,
    text: &str,
    id: Option<&str>,
    extra_attrs: &[(&str, &str)],
) -> ElementInfo {
    let mut attrs: BTreeMap<String, String> = extra_attrs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    if let Some(id) = id {
        attrs.insert("id".to_string(), id.to_string());
    }
    let selector = derive_selector(tag, id, attrs.get("class").map(String::as_str));
    ElementInfo {
        tag: tag.to_string(),
        text: text.to_string(),
        selector,
        displayed: true,
        attrs,
    }
}

#[derive(Debug, Default)]
pub(crate) struct MockSite {
    pages: HashMap<String, FakePage>,
}

impl MockSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(&mut self, url: &str, title: &str) -> &mut FakePage {
        let page = self.pages.entry(url.to_string()).or_default();
        page.title = title.to_string();
        page
    }
}

#[derive(Debug)]
struct DriverState {
    current: String,
    modal_open: bool,
    clicked: Vec<String>,
    typed: Vec<(String, String)>,
    visited: Vec<String>,
}

/// Scripted driver over a [`MockSite`].
#[derive(Debug)]
pub(crate) struct MockDriver {
    site: MockSite,
    state: Mutex<DriverState>,
}

impl MockDriver {
    pub fn new(site: MockSite, start_url: &str) -> Self {
        Self {
            site,
            state: Mutex::new(DriverState {
                current: start_url.to_string(),
                modal_open: false,
                clicked: Vec::new(),
                typed: Vec::new(),
                visited: vec![start_url.to_string()],
            }),
        }
    }

    pub fn clicked(&self) -> Vec<String> {
        self.state.lock().unwrap().clicked.clone()
    }

    pub fn typed(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().typed.clone()
    }

    pub fn visited(&self) -> Vec<String> {
        self.state.lock().unwrap().visited.clone()
    }

    fn page(&self, url: &str) -> Result<&FakePage, DriverError> {
        self.site
            .pages
            .get(url)
            .ok_or_else(|| DriverError::Navigation(format!("no such page: {url}")))
    }
}

#[async_trait]
impl BrowserDriver for MockDriver {
    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        self.page(url)?;
        let mut state = self.state.lock().unwrap();
        state.current = url.to_string();
        state.modal_open = false;
        state.visited.push(url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.state.lock().unwrap().current.clone())
    }

    async fn title(&self) -> Result<String, DriverError> {
        let current = self.state.lock().unwrap().current.clone();
        Ok(self.page(&current)?.title.clone())
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<ElementInfo>, DriverError> {
        let (current, modal_open) = {
            let state = self.state.lock().unwrap();
            (state.current.clone(), state.modal_open)
        };
        let page = self.page(&current)?;
        let mut found = page.elements.get(&locator.value).cloned().unwrap_or_default();
        if modal_open {
            if let Some(extra) = page.modal_elements.get(&locator.value) {
                found.extend(extra.iter().cloned());
            }
        }
        Ok(found)
    }

    async fn wait_for(
        &self,
        locator: &Locator,
        _timeout: Duration,
    ) -> Result<ElementInfo, DriverError> {
        // The scripted site never becomes ready later, so the wait either
        // resolves immediately or times out.
        self.find_all(locator)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DriverError::Timeout(locator.to_string()))
    }

    async fn click(&self, locator: &Locator) -> Result<(), DriverError> {
        let current = self.state.lock().unwrap().current.clone();
        let effect = self
            .page(&current)?
            .clicks
            .get(&locator.value)
            .cloned()
            .ok_or_else(|| DriverError::NotFound(locator.to_string()))?;

        let mut state = self.state.lock().unwrap();
        state.clicked.push(locator.value.clone());
        match effect {
            ClickEffect::Navigate(url) => {
                state.current = url.clone();
                state.modal_open = false;
                state.visited.push(url);
                Ok(())
            }
            ClickEffect::OpenModal => {
                state.modal_open = true;
                Ok(())
            }
            ClickEffect::Noop => Ok(()),
            ClickEffect::Stale => Err(DriverError::StaleElement(locator.to_string())),
        }
    }

    async fn send_keys(&self, locator: &Locator, text: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.typed.push((locator.value.clone(), text.to_string()));
        Ok(())
    }

    async fn submit(&self, locator: &Locator) -> Result<(), DriverError> {
        // Submitting behaves like clicking in the scripted site.
        self.click(locator).await
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        let current = self.state.lock().unwrap().current.clone();
        Ok(self.page(&current)?.screenshot.clone())
    }
}
