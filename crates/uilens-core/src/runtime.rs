//! Runtime page-object layer over a discovered ui-map.
//!
//! Loads the ui-map document once and exposes friendly lookups: pages by
//! name, elements by name per page, recorded transitions, and a weighted
//! keyword search for elements whose exact name a test does not know.
//! Driving the browser happens through [`BrowserDriver`].

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::driver::{BrowserDriver, By, ElementInfo, Locator};
use crate::graph::{EdgeType, NodeType, UiGraph};
use crate::navigation::{NavigationPath, NavigationStep};
use crate::selectors::selector_strategy;
use crate::urls;

/// Lookup failures. These are never retried: the caller asked for
/// something the ui-map does not contain.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Page '{page}' not found. Available pages: {}", available.join(", "))]
    PageNotFound { page: String, available: Vec<String> },
    #[error("Element '{element}' not found on page '{page}'. Available elements: {}", available.join(", "))]
    ElementNotFound {
        page: String,
        element: String,
        available: Vec<String>,
    },
    #[error("No {element_type} found matching {keywords:?} on page '{page}'")]
    NoElementMatch {
        page: String,
        element_type: String,
        keywords: Vec<String>,
    },
}

/// Additive scores for keyword matching in
/// [`BaseGuiComponent::find_element_by_function`].
#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    pub data_action: u32,
    pub text_exact: u32,
    pub text_partial: u32,
    pub id_substring: u32,
    pub title: u32,
    pub aria_label: u32,
    pub placeholder: u32,
    pub class: u32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            data_action: 100,
            text_exact: 50,
            text_partial: 25,
            id_substring: 30,
            title: 20,
            aria_label: 20,
            placeholder: 15,
            class: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageRecord {
    pub name: String,
    pub url: String,
    pub page_type: String,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct ElementRecord {
    /// Graph node id, used to key transitions.
    pub node_id: String,
    pub name: String,
    pub element_type: String,
    pub locator: Locator,
    pub attrs: serde_json::Map<String, Value>,
}

impl ElementRecord {
    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(Value::as_str)
    }
}

/// One entry of the navigation history: the page the component moved to
/// and the action that moved it there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub to: String,
    pub via: String,
}

/// Page-object component backed by a ui-map document.
#[derive(Debug)]
pub struct BaseGuiComponent {
    pages: HashMap<String, PageRecord>,
    page_order: Vec<String>,
    /// page name -> element name -> record; element insertion order kept
    /// separately so keyword-search ties break on first-seen.
    elements: HashMap<String, Vec<ElementRecord>>,
    /// (page url, element node id) -> target page url.
    transitions: HashMap<(String, String), String>,
    /// Named step sequences loaded from a navigation artifact.
    navigation_paths: HashMap<String, NavigationPath>,
    current_page: Option<String>,
    history: Vec<HistoryEntry>,
    weights: ScoreWeights,
}

impl BaseGuiComponent {
    /// Build the lookup maps from a ui-map document.
    pub fn from_ui_map(document: &Value) -> Result<Self> {
        let graph_data = document
            .get("graph")
            .ok_or_else(|| anyhow!("input is not a ui-map document: missing 'graph' key"))?;
        let graph = UiGraph::from_node_link(graph_data)?;
        Ok(Self::from_graph(&graph))
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let document: Value =
            serde_json::from_str(raw).context("ui-map document is not valid JSON")?;
        Self::from_ui_map(&document)
    }

    pub fn from_graph(graph: &UiGraph) -> Self {
        let mut component = Self {
            pages: HashMap::new(),
            page_order: Vec::new(),
            elements: HashMap::new(),
            transitions: HashMap::new(),
            navigation_paths: HashMap::new(),
            current_page: None,
            history: Vec::new(),
            weights: ScoreWeights::default(),
        };
        component.build_page_maps(graph);
        component.build_element_maps(graph);
        component.build_transition_map(graph);
        component
    }

    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Name pages by their classified type; when two pages would share a
    /// name, both fall back to their full routing path so neither shadows
    /// the other.
    fn build_page_maps(&mut self, graph: &UiGraph) {
        let pages = graph.nodes_of_type(NodeType::Page);
        let mut preliminary: Vec<(String, &crate::graph::UiNode)> = pages
            .iter()
            .map(|page| {
                let page_type = page
                    .attrs
                    .get("page_type")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                (urls::friendly_page_name(&page.id, page_type), *page)
            })
            .collect();

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for (name, _) in &preliminary {
            *counts.entry(name.as_str()).or_insert(0) += 1;
        }
        let collisions: Vec<String> = counts
            .iter()
            .filter(|(_, &count)| count > 1)
            .map(|(name, _)| name.to_string())
            .collect();

        for (name, page) in &mut preliminary {
            if collisions.contains(name) {
                let disambiguated = urls::path_page_name(&page.id);
                debug!(page = %page.id, old = %name, new = %disambiguated, "page name collision, using routing path");
                *name = disambiguated;
            }
        }

        for (name, page) in preliminary {
            let record = PageRecord {
                name: name.clone(),
                url: page.id.clone(),
                page_type: page
                    .attrs
                    .get("page_type")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
                title: page
                    .attrs
                    .get("title")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
            };
            if !self.pages.contains_key(&name) {
                self.page_order.push(name.clone());
            }
            self.pages.insert(name, record);
        }
    }

    fn build_element_maps(&mut self, graph: &UiGraph) {
        let url_to_name: HashMap<&str, &str> = self
            .pages
            .values()
            .map(|record| (record.url.as_str(), record.name.as_str()))
            .collect();

        for edge in graph.edges() {
            if !matches!(edge.edge_type, EdgeType::OnPage) {
                continue;
            }
            let page_name = match url_to_name.get(edge.target.as_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };
            let element = match graph.node(&edge.source) {
                Some(node) => node,
                None => continue,
            };

            let element_type = element
                .attrs
                .get("element_type")
                .and_then(Value::as_str)
                .unwrap_or("element")
                .to_string();
            let css = element
                .attrs
                .get("selector")
                .and_then(Value::as_str)
                .unwrap_or("");
            let (by, value) = selector_strategy(css);
            let by = By::parse(by).unwrap_or(By::Css);

            let name = element_display_name(element, &element_type);
            self.elements
                .entry(page_name)
                .or_default()
                .push(ElementRecord {
                    node_id: element.id.clone(),
                    name,
                    element_type,
                    locator: Locator::new(by, value),
                    attrs: element.attrs.clone(),
                });
        }
    }

    fn build_transition_map(&mut self, graph: &UiGraph) {
        // Element containment tells us the source page of each trigger.
        let mut element_page: HashMap<&str, &str> = HashMap::new();
        for edge in graph.edges() {
            if edge.edge_type == EdgeType::OnPage {
                element_page.insert(edge.source.as_str(), edge.target.as_str());
            }
        }
        for edge in graph.edges() {
            if edge.edge_type != EdgeType::NavigatesTo {
                continue;
            }
            if let Some(&page_url) = element_page.get(edge.source.as_str()) {
                self.transitions.insert(
                    (page_url.to_string(), edge.source.clone()),
                    edge.target.clone(),
                );
            }
        }
    }

    pub fn page_names(&self) -> &[String] {
        &self.page_order
    }

    pub fn page(&self, name: &str) -> Result<&PageRecord, LookupError> {
        self.pages.get(name).ok_or_else(|| LookupError::PageNotFound {
            page: name.to_string(),
            available: self.page_order.clone(),
        })
    }

    pub fn page_url(&self, name: &str) -> Result<&str, LookupError> {
        self.page(name).map(|record| record.url.as_str())
    }

    /// Explicitly record which page the browser is on and which action
    /// took it there.
    pub fn set_state(&mut self, page_name: &str, via: &str) -> Result<(), LookupError> {
        self.page(page_name)?;
        self.current_page = Some(page_name.to_string());
        self.history.push(HistoryEntry {
            to: page_name.to_string(),
            via: via.to_string(),
        });
        Ok(())
    }

    pub fn get_state(&self) -> Option<&str> {
        self.current_page.as_deref()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Recorded transition target for clicking `element_name` on a page.
    pub fn transition_target(&self, page_name: &str, element_name: &str) -> Option<&str> {
        let page = self.pages.get(page_name)?;
        let element = self
            .elements
            .get(page_name)?
            .iter()
            .find(|e| e.name == element_name)?;
        self.transitions
            .get(&(page.url.clone(), element.node_id.clone()))
            .map(String::as_str)
    }

    pub fn elements_on_page(&self, page_name: &str) -> Result<&[ElementRecord], LookupError> {
        self.page(page_name)?;
        Ok(self
            .elements
            .get(page_name)
            .map(Vec::as_slice)
            .unwrap_or(&[]))
    }

    /// Resolve a named element on a page from the loaded ui-map.
    pub fn element_record(
        &self,
        page_name: &str,
        element_name: &str,
    ) -> Result<&ElementRecord, LookupError> {
        let elements = self.elements_on_page(page_name)?;
        elements
            .iter()
            .find(|e| e.name == element_name)
            .ok_or_else(|| LookupError::ElementNotFound {
                page: page_name.to_string(),
                element: element_name.to_string(),
                available: elements.iter().map(|e| e.name.clone()).collect(),
            })
    }

    /// Resolve a named element and wait up to `timeout` for it to be
    /// present in the live page. Unknown page or element names fail
    /// immediately; a known element that never appears times out.
    pub async fn find_element<D: BrowserDriver>(
        &self,
        driver: &D,
        page_name: &str,
        element_name: &str,
        timeout: Duration,
    ) -> Result<ElementInfo> {
        let record = self.element_record(page_name, element_name)?;
        let info = driver.wait_for(&record.locator, timeout).await.with_context(|| {
            format!("element '{element_name}' on page '{page_name}' did not appear")
        })?;
        Ok(info)
    }

    /// Weighted keyword search over a page's elements of one type.
    ///
    /// Scores are additive across keywords and attributes; the highest
    /// total wins and ties keep the first-discovered element. A zero total
    /// falls back to `fallback_name` when given, otherwise the lookup
    /// fails.
    pub fn find_element_by_function(
        &self,
        page_name: &str,
        element_type: &str,
        keywords: &[&str],
        fallback_name: Option<&str>,
    ) -> Result<&ElementRecord, LookupError> {
        let elements = self.elements_on_page(page_name)?;

        let mut best: Option<(&ElementRecord, u32)> = None;
        for element in elements.iter().filter(|e| e.element_type == element_type) {
            let score: u32 = keywords
                .iter()
                .map(|keyword| self.score_element(element, &keyword.to_lowercase()))
                .sum();
            if score > 0 && best.map(|(_, s)| score > s).unwrap_or(true) {
                best = Some((element, score));
            }
        }

        if let Some((element, score)) = best {
            debug!(page = page_name, element = %element.name, score, "keyword match");
            return Ok(element);
        }
        if let Some(fallback) = fallback_name {
            return self.element_record(page_name, fallback);
        }
        Err(LookupError::NoElementMatch {
            page: page_name.to_string(),
            element_type: element_type.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        })
    }

    fn score_element(&self, element: &ElementRecord, keyword: &str) -> u32 {
        let weights = &self.weights;
        let mut score = 0u32;

        if let Some(action) = element.attr("data_action") {
            let action = action.to_lowercase();
            if action == keyword
                || action.split(['.', '-', '_']).any(|segment| segment == keyword)
                || action.contains(keyword)
            {
                score += weights.data_action;
            }
        }
        if let Some(text) = element.attr("text") {
            let text = text.to_lowercase();
            if text == keyword {
                score += weights.text_exact;
            } else if text.contains(keyword) {
                score += weights.text_partial;
            }
        }
        for id_key in ["button_id", "input_id", "select_id", "link_id"] {
            if let Some(id) = element.attr(id_key) {
                if id.to_lowercase().contains(keyword) {
                    score += weights.id_substring;
                    break;
                }
            }
        }
        if contains_keyword(element.attr("title"), keyword) {
            score += weights.title;
        }
        if contains_keyword(element.attr("aria_label"), keyword) {
            score += weights.aria_label;
        }
        if contains_keyword(element.attr("placeholder"), keyword) {
            score += weights.placeholder;
        }
        for class_key in ["button_class", "link_class"] {
            if contains_keyword(element.attr(class_key), keyword) {
                score += weights.class;
                break;
            }
        }
        score
    }

    /// Load a generated navigation artifact (the YAML emitted by
    /// [`crate::navigation::paths_to_yaml`]) so its paths can be run by
    /// name. Returns how many paths are loaded afterwards.
    pub fn load_navigation_paths(&mut self, raw_yaml: &str) -> Result<usize> {
        let document: Value =
            serde_yaml::from_str(raw_yaml).context("navigation artifact is not valid YAML")?;
        let paths = document
            .get("paths")
            .and_then(Value::as_object)
            .ok_or_else(|| anyhow!("input is not a navigation artifact: missing 'paths' key"))?;
        for (name, raw) in paths {
            let path: NavigationPath = serde_json::from_value(raw.clone())
                .with_context(|| format!("malformed navigation path '{name}'"))?;
            self.navigation_paths.insert(name.clone(), path);
        }
        Ok(self.navigation_paths.len())
    }

    /// Execute a named path from the loaded navigation artifact.
    /// `variables` fill `{name}` placeholders in locator values, typed
    /// text, and URLs.
    pub async fn navigate_path<D: BrowserDriver>(
        &mut self,
        driver: &D,
        path_name: &str,
        variables: &HashMap<String, String>,
    ) -> Result<()> {
        let path = self
            .navigation_paths
            .get(path_name)
            .cloned()
            .ok_or_else(|| {
                let mut loaded: Vec<&str> =
                    self.navigation_paths.keys().map(String::as_str).collect();
                loaded.sort_unstable();
                anyhow!(
                    "navigation path '{path_name}' not found. Loaded paths: {}",
                    loaded.join(", ")
                )
            })?;
        self.execute_steps(driver, &path.steps, variables).await
    }

    /// Execute a step sequence against the driver.
    pub async fn execute_steps<D: BrowserDriver>(
        &mut self,
        driver: &D,
        steps: &[NavigationStep],
        variables: &HashMap<String, String>,
    ) -> Result<()> {
        for step in steps {
            match step.action.as_str() {
                "click" | "open_modal" => {
                    let locator = step_locator(step, variables)?;
                    driver.click(&locator).await?;
                }
                "type" => {
                    let locator = step_locator(step, variables)?;
                    let template = step
                        .value
                        .as_ref()
                        .ok_or_else(|| anyhow!("type step is missing a value"))?;
                    let text = substitute(template, variables)?;
                    driver.send_keys(&locator, &text).await?;
                }
                "wait" => {
                    let seconds = match &step.value {
                        Some(raw) => raw.parse::<f64>().with_context(|| {
                            format!("wait step value '{raw}' is not a number of seconds")
                        })?,
                        None => 1.0,
                    };
                    tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
                }
                "navigate" => {
                    let url = step
                        .url
                        .as_ref()
                        .ok_or_else(|| anyhow!("navigate step is missing a url"))?;
                    driver.goto(&substitute(url, variables)?).await?;
                }
                other => bail!("unknown action '{other}' in navigation step"),
            }
        }
        Ok(())
    }

    /// Check the browser is on the named page: the URL must match and the
    /// page's probe element (a button when one exists, else an input) must
    /// be present.
    pub async fn verify_page<D: BrowserDriver>(
        &self,
        driver: &D,
        page_name: &str,
    ) -> Result<bool> {
        let record = self.page(page_name)?;
        let current = driver.current_url().await?;
        if !urls_match(&current, &record.url) {
            return Ok(false);
        }

        let elements = self.elements_on_page(page_name)?;
        let probe = elements
            .iter()
            .find(|e| e.element_type == "button")
            .or_else(|| elements.iter().find(|e| e.element_type == "input"));
        match probe {
            Some(element) => {
                let found = driver.find_all(&element.locator).await?;
                Ok(!found.is_empty())
            }
            None => Ok(true),
        }
    }

    /// Click a named element on a page.
    pub async fn click_element<D: BrowserDriver>(
        &self,
        driver: &D,
        page_name: &str,
        element_name: &str,
    ) -> Result<()> {
        let element = self.element_record(page_name, element_name)?;
        driver.click(&element.locator).await?;
        Ok(())
    }

    /// Type into a named input on a page.
    pub async fn fill_element<D: BrowserDriver>(
        &self,
        driver: &D,
        page_name: &str,
        element_name: &str,
        text: &str,
    ) -> Result<()> {
        let element = self.element_record(page_name, element_name)?;
        driver.send_keys(&element.locator, text).await?;
        Ok(())
    }
}

fn contains_keyword(value: Option<&str>, keyword: &str) -> bool {
    value
        .map(|v| v.to_lowercase().contains(keyword))
        .unwrap_or(false)
}

/// Element display name priority: text, name attribute, title,
/// placeholder, then `{type}_{id}`, matching the names the selector
/// artifact gives the same elements.
fn element_display_name(element: &crate::graph::UiNode, element_type: &str) -> String {
    let attr = |key: &str| {
        element
            .attrs
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    for key in ["text", "name", "title", "placeholder"] {
        if let Some(value) = attr(key) {
            return urls::sanitize_name(value);
        }
    }
    for id_key in ["button_id", "input_id", "select_id", "link_id", "table_id"] {
        if let Some(id) = attr(id_key) {
            return format!("{element_type}_{}", urls::sanitize_name(id));
        }
    }
    urls::sanitize_name(&element.id)
}

/// Resolve a step's locator into a driver [`Locator`], filling `{name}`
/// placeholders in its value.
fn step_locator(step: &NavigationStep, variables: &HashMap<String, String>) -> Result<Locator> {
    let locator = step
        .locator
        .as_ref()
        .ok_or_else(|| anyhow!("step '{}' is missing a locator", step.action))?;
    let by = By::parse(&locator.by)
        .ok_or_else(|| anyhow!("unknown locator strategy '{}'", locator.by))?;
    let value = substitute(&locator.value, variables)?;
    Ok(Locator::new(by, value))
}

fn substitute(template: &str, variables: &HashMap<String, String>) -> Result<String> {
    let mut out = template.to_string();
    for (key, value) in variables {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    if out.contains('{') && out.contains('}') {
        bail!("unresolved template variable in '{out}'");
    }
    Ok(out)
}

fn urls_match(current: &str, expected: &str) -> bool {
    let current = current.trim_end_matches('/');
    let expected = expected.trim_end_matches('/');
    current == expected || current.ends_with(expected) || expected.ends_with(current)
}
