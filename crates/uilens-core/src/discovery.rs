//! Breadth-first UI discovery over a live browser session.
//!
//! Starting from a base URL (after an optional login flow), the tool visits
//! pages level by level, records pages, forms, and interactive elements into
//! a [`UiGraph`], follows internal links, and optionally probes safe buttons
//! for modals. The result is a single ui-map JSON document: the node-link
//! graph plus detected URL patterns and summary statistics.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use url::Url;

use crate::driver::{BrowserDriver, DriverError, ElementInfo, Locator};
use crate::graph::UiGraph;
use crate::patterns::{PageSample, UrlPatternDetector};
use crate::urls;

pub(crate) const BUTTON_SELECTOR: &str =
    "button, input[type='submit'], input[type='button']";
pub(crate) const INPUT_SELECTOR: &str = "input, select, textarea";
pub(crate) const LINK_SELECTOR: &str = "a[href]";
pub(crate) const FORM_SELECTOR: &str = "form";
pub(crate) const TABLE_SELECTOR: &str = "table";
pub(crate) const MODAL_SELECTOR: &str = ".modal.show, .modal.in, [role='dialog']";

const USERNAME_SELECTOR: &str =
    "input[name='username'], input[type='text'], input[type='email']";
const PASSWORD_SELECTOR: &str = "input[type='password']";
const LOGIN_SUBMIT_SELECTOR: &str = "button[type='submit'], input[type='submit'], button";

const DEFAULT_SAFE_BUTTONS: [&str; 7] = ["New", "Add", "Edit", "View", "Show", "Cancel", "Close"];

/// Crawl configuration. Defaults mirror the CLI defaults.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub base_url: Url,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Login form location; defaults to the base URL.
    pub login_url: Option<String>,
    pub perform_login: bool,
    /// When false the login page itself is excluded from the crawl.
    pub crawl_login_page: bool,
    pub detect_patterns: bool,
    /// Click whitelisted buttons to find modals.
    pub discover_interactions: bool,
    /// Stop crawling a URL family once enough samples were seen.
    pub skip_pattern_duplicates: bool,
    /// Button texts considered safe to click during interaction discovery.
    pub safe_buttons: Vec<String>,
    pub pattern_sample_size: usize,
    pub max_depth: usize,
    pub max_pages: usize,
    /// Settle delay after navigations and clicks.
    pub settle: Duration,
}

impl DiscoveryConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            username: None,
            password: None,
            login_url: None,
            perform_login: true,
            crawl_login_page: true,
            detect_patterns: true,
            discover_interactions: false,
            skip_pattern_duplicates: false,
            safe_buttons: DEFAULT_SAFE_BUTTONS.iter().map(|s| s.to_string()).collect(),
            pattern_sample_size: 3,
            max_depth: 3,
            max_pages: 1000,
            settle: Duration::from_millis(500),
        }
    }
}

/// BFS crawler producing the ui-map document.
pub struct UiDiscoveryTool<D> {
    config: DiscoveryConfig,
    driver: D,
}

struct CrawlOutcome {
    links: Vec<String>,
    sample: PageSample,
    /// Flat summary of the page for the document's `pages` list.
    page: Value,
    /// Outbound link entries for the document's `navigation_graph`.
    nav_links: Vec<Value>,
}

impl<D: BrowserDriver> UiDiscoveryTool<D> {
    pub fn new(config: DiscoveryConfig, driver: D) -> Self {
        Self { config, driver }
    }

    /// Run the full discovery and return the ui-map JSON document.
    pub async fn run(mut self) -> Result<Value> {
        if self.config.perform_login {
            self.login().await?;
        }

        let mut graph = UiGraph::new();
        let mut samples: Vec<PageSample> = Vec::new();
        let mut pages: Vec<Value> = Vec::new();
        let mut navigation_graph: Map<String, Value> = Map::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut structure_counts: HashMap<String, usize> = HashMap::new();
        let mut skipped_by_pattern = 0usize;
        let mut pages_visited = 0usize;
        let mut deepest_level = 0usize;

        if !self.config.crawl_login_page {
            if let Some(login_url) = self.config.login_url.clone() {
                visited.insert(urls::normalize_url(&self.config.base_url, &login_url));
            }
        }

        let start = urls::normalize_url(&self.config.base_url, self.config.base_url.as_str());
        let mut frontier: VecDeque<(String, usize)> = VecDeque::new();
        frontier.push_back((start, 0));

        while let Some((url, depth)) = frontier.pop_front() {
            if visited.contains(&url) || depth > self.config.max_depth {
                continue;
            }
            if pages_visited >= self.config.max_pages {
                warn!(limit = self.config.max_pages, "page limit reached, stopping crawl");
                break;
            }

            let structure = urls::url_structure(&url);
            if self.config.skip_pattern_duplicates
                && structure_counts.get(&structure).copied().unwrap_or(0)
                    >= self.config.pattern_sample_size
            {
                debug!(%url, %structure, "skipping page matching an already-sampled pattern");
                visited.insert(url);
                skipped_by_pattern += 1;
                continue;
            }

            visited.insert(url.clone());
            match self.crawl_page(&url, depth, &mut graph).await {
                Ok(outcome) => {
                    pages_visited += 1;
                    deepest_level = deepest_level.max(depth);
                    *structure_counts.entry(structure).or_insert(0) += 1;
                    let key = nav_key(&url, &navigation_graph);
                    navigation_graph.insert(
                        key,
                        json!({ "url": url, "links": outcome.nav_links }),
                    );
                    pages.push(outcome.page);
                    samples.push(outcome.sample);
                    for link in outcome.links {
                        if !visited.contains(&link) {
                            frontier.push_back((link, depth + 1));
                        }
                    }
                }
                Err(err) => {
                    warn!(%url, error = %err, "failed to crawl page");
                }
            }
        }

        let url_patterns = if self.config.detect_patterns {
            UrlPatternDetector::new(self.config.pattern_sample_size)
                .detect_patterns(&samples)
        } else {
            Vec::new()
        };

        let mut statistics = graph.statistics();
        statistics.insert("pages_visited".to_string(), json!(pages_visited));
        statistics.insert(
            "pages_skipped_by_pattern".to_string(),
            json!(skipped_by_pattern),
        );

        info!(
            pages = pages_visited,
            patterns = url_patterns.len(),
            "discovery finished"
        );

        Ok(json!({
            "base_url": self.config.base_url.as_str(),
            "discovery_method": "bfs",
            "levels_explored": deepest_level + 1,
            "pages": pages,
            "graph": graph.export_node_link(),
            "navigation_graph": navigation_graph,
            "url_patterns": url_patterns,
            "statistics": statistics,
        }))
    }

    /// Log in through the configured login form. Missing form elements or a
    /// URL that never leaves the login page are fatal.
    async fn login(&mut self) -> Result<()> {
        let login_url = self
            .config
            .login_url
            .clone()
            .unwrap_or_else(|| self.config.base_url.as_str().to_string());
        let username = self
            .config
            .username
            .clone()
            .context("login requested but no username configured")?;
        let password = self
            .config
            .password
            .clone()
            .context("login requested but no password configured")?;

        info!(url = %login_url, "logging in");
        self.driver
            .goto(&login_url)
            .await
            .with_context(|| format!("failed to open login page {login_url}"))?;
        tokio::time::sleep(self.config.settle).await;

        let username_field = self
            .first_element(USERNAME_SELECTOR)
            .await?
            .context("login page has no username field")?;
        let password_field = self
            .first_element(PASSWORD_SELECTOR)
            .await?
            .context("login page has no password field")?;
        let submit = self
            .first_element(LOGIN_SUBMIT_SELECTOR)
            .await?
            .context("login page has no submit button")?;

        self.driver
            .send_keys(&Locator::css(&username_field.selector), &username)
            .await?;
        self.driver
            .send_keys(&Locator::css(&password_field.selector), &password)
            .await?;
        self.driver.click(&Locator::css(&submit.selector)).await?;
        tokio::time::sleep(self.config.settle).await;

        let after = self.driver.current_url().await?;
        let after_norm = urls::normalize_url(&self.config.base_url, &after);
        let login_norm = urls::normalize_url(&self.config.base_url, &login_url);
        if after_norm == login_norm {
            bail!("login failed: still on login page {login_url}");
        }
        Ok(())
    }

    async fn first_element(&self, selector: &str) -> Result<Option<ElementInfo>, DriverError> {
        let found = self.driver.find_all(&Locator::css(selector)).await?;
        Ok(found.into_iter().next())
    }

    async fn crawl_page(
        &mut self,
        url: &str,
        depth: usize,
        graph: &mut UiGraph,
    ) -> Result<CrawlOutcome> {
        self.driver.goto(url).await?;
        tokio::time::sleep(self.config.settle).await;

        let title = self.driver.title().await.unwrap_or_default();
        let page_type = urls::classify_page(url);
        debug!(%url, depth, page_type, "crawling page");

        let mut page_attrs = Map::new();
        page_attrs.insert("title".to_string(), json!(title));
        page_attrs.insert("page_type".to_string(), json!(page_type));
        page_attrs.insert("depth".to_string(), json!(depth));
        let page_id = graph.add_page(url, page_attrs);

        // Forms first: elements claimed by a form keep only their IN_FORM
        // containment and are skipped by the page-level passes.
        let mut claimed: HashSet<String> = HashSet::new();
        self.discover_forms(&page_id, graph, &mut claimed).await?;

        let mut sample = PageSample {
            url: url.to_string(),
            title,
            page_type: page_type.to_string(),
            ..Default::default()
        };

        let mut safe_buttons: Vec<(String, ElementInfo)> = Vec::new();
        for button in self.driver.find_all(&Locator::css(BUTTON_SELECTOR)).await? {
            if claimed.contains(&button.selector) {
                continue;
            }
            let text = button.text.trim().to_string();
            if !text.is_empty() {
                sample.button_texts.push(text.clone());
            }
            let elem_id = graph.add_element(&page_id, "button", button_attrs(&button));
            if self.is_safe_button(&text) {
                safe_buttons.push((elem_id, button));
            }
        }

        for input in self.driver.find_all(&Locator::css(INPUT_SELECTOR)).await? {
            if claimed.contains(&input.selector) {
                continue;
            }
            if let Some(name) = input.attr("name") {
                sample.input_names.push(name.to_string());
            }
            let element_type = if input.tag == "select" { "select" } else { "input" };
            graph.add_element(&page_id, element_type, input_attrs(&input));
        }

        for table in self.driver.find_all(&Locator::css(TABLE_SELECTOR)).await? {
            graph.add_element(&page_id, "table", table_attrs(&table));
        }

        let (links, nav_links) = self.discover_links(&page_id, graph).await?;

        if self.config.discover_interactions {
            self.discover_interactions(&page_id, graph, &safe_buttons)
                .await;
        }

        let page = json!({
            "url": url,
            "title": sample.title.clone(),
            "page_type": page_type,
            "depth": depth,
            "buttons": sample.button_texts.clone(),
            "inputs": sample.input_names.clone(),
        });
        Ok(CrawlOutcome {
            links,
            sample,
            page,
            nav_links,
        })
    }

    async fn discover_forms(
        &mut self,
        page_id: &str,
        graph: &mut UiGraph,
        claimed: &mut HashSet<String>,
    ) -> Result<(), DriverError> {
        for form in self.driver.find_all(&Locator::css(FORM_SELECTOR)).await? {
            let mut attrs = Map::new();
            copy_attr(&mut attrs, &form, "id", "form_id");
            copy_attr(&mut attrs, &form, "action", "action");
            let form_id = graph.add_form(page_id, attrs);

            // Scoped enumeration needs a stable anchor; id-less forms keep
            // their node but their children stay page-level.
            let anchor = match form.attr("id") {
                Some(id) if !id.is_empty() => format!("#{id}"),
                _ => continue,
            };

            for input in self
                .driver
                .find_all(&Locator::css(&format!("{anchor} input, {anchor} select, {anchor} textarea")))
                .await?
            {
                claimed.insert(input.selector.clone());
                let element_type = if input.tag == "select" { "select" } else { "input" };
                graph.add_element(&form_id, element_type, input_attrs(&input));
            }
            for button in self
                .driver
                .find_all(&Locator::css(&format!("{anchor} button")))
                .await?
            {
                claimed.insert(button.selector.clone());
                graph.add_element(&form_id, "button", button_attrs(&button));
            }
        }
        Ok(())
    }

    /// Returns the URLs to crawl next and the flat link entries for the
    /// page's `navigation_graph` section. Logout links are recorded but
    /// never followed.
    async fn discover_links(
        &mut self,
        page_id: &str,
        graph: &mut UiGraph,
    ) -> Result<(Vec<String>, Vec<Value>), DriverError> {
        let mut targets = Vec::new();
        let mut entries = Vec::new();
        for link in self.driver.find_all(&Locator::css(LINK_SELECTOR)).await? {
            let href = match link.attr("href") {
                Some(href) => href.to_string(),
                None => continue,
            };
            if !urls::is_internal_link(&self.config.base_url, &href) {
                continue;
            }

            let target = urls::normalize_url(&self.config.base_url, &href);
            let elem_id = graph.add_element(page_id, "link", link_attrs(&link));
            graph.add_page(&target, Map::new());

            let mut edge_attrs = Map::new();
            let text = link.text.trim();
            if !text.is_empty() {
                edge_attrs.insert("text".to_string(), json!(text));
            }
            let query_params = urls::parse_query_string(&href);
            if !query_params.is_empty() {
                edge_attrs.insert("query_params".to_string(), json!(query_params));
                if let Some(pattern) = urls::extract_query_pattern(&href) {
                    edge_attrs.insert("query_pattern".to_string(), json!(pattern));
                }
            }
            graph.add_navigation_link(page_id, &target, Some(&elem_id), edge_attrs);
            entries.push(json!({
                "text": text,
                "target": target,
                "selector": link.selector,
            }));

            if urls::fragment_path(&href).to_lowercase().contains("logout") {
                continue;
            }
            targets.push(target);
        }
        Ok((targets, entries))
    }

    fn is_safe_button(&self, text: &str) -> bool {
        self.config
            .safe_buttons
            .iter()
            .any(|safe| safe.eq_ignore_ascii_case(text))
    }

    /// Click whitelisted buttons looking for modals. The page is re-opened
    /// after every probe so a click can never leak state into the next one.
    async fn discover_interactions(
        &mut self,
        page_id: &str,
        graph: &mut UiGraph,
        safe_buttons: &[(String, ElementInfo)],
    ) {
        for (elem_id, button) in safe_buttons {
            let probe = self.probe_button(page_id, graph, elem_id, button).await;
            if let Err(err) = probe {
                if err.is_transient() {
                    debug!(button = %button.selector, error = %err, "transient error probing button");
                } else {
                    warn!(button = %button.selector, error = %err, "error probing button");
                }
            }
            if let Err(err) = self.driver.goto(page_id).await {
                warn!(%page_id, error = %err, "failed to restore page after probe");
                return;
            }
            tokio::time::sleep(self.config.settle).await;
        }
    }

    async fn probe_button(
        &mut self,
        page_id: &str,
        graph: &mut UiGraph,
        elem_id: &str,
        button: &ElementInfo,
    ) -> Result<(), DriverError> {
        self.driver.click(&Locator::css(&button.selector)).await?;
        tokio::time::sleep(self.config.settle).await;

        let modals = self.driver.find_all(&Locator::css(MODAL_SELECTOR)).await?;
        let modal = match modals.into_iter().find(|m| m.displayed) {
            Some(modal) => modal,
            None => return Ok(()),
        };

        let title = modal
            .text
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        let mut attrs = Map::new();
        attrs.insert("title".to_string(), json!(title));
        copy_attr(&mut attrs, &modal, "id", "modal_id");
        let modal_node = graph.add_modal(page_id, attrs);
        graph.add_modal_trigger(elem_id, &modal_node, Map::new());
        debug!(modal = %modal_node, trigger = %button.selector, "modal discovered");

        for inner in self
            .driver
            .find_all(&Locator::css(&modal_scoped("button")))
            .await?
        {
            graph.add_element(&modal_node, "button", button_attrs(&inner));
        }
        for inner in self
            .driver
            .find_all(&Locator::css(&modal_scoped("input, select, textarea")))
            .await?
        {
            let element_type = if inner.tag == "select" { "select" } else { "input" };
            graph.add_element(&modal_node, element_type, input_attrs(&inner));
        }
        Ok(())
    }
}

/// Key for a page's `navigation_graph` entry: its classified type, or a
/// path-derived name when two pages classify the same.
fn nav_key(url: &str, navigation_graph: &Map<String, Value>) -> String {
    let key = urls::classify_page(url).to_string();
    if !navigation_graph.contains_key(&key) {
        return key;
    }
    urls::sanitize_name(&urls::fragment_path(url))
}

/// Expand an inner selector to every modal container variant.
pub(crate) fn modal_scoped(inner: &str) -> String {
    inner
        .split(',')
        .map(str::trim)
        .flat_map(|part| {
            [".modal.show", ".modal.in", "[role='dialog']"]
                .iter()
                .map(move |container| format!("{container} {part}"))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn copy_attr(attrs: &mut Map<String, Value>, info: &ElementInfo, from: &str, to: &str) {
    if let Some(value) = info.attr(from) {
        if !value.is_empty() {
            attrs.insert(to.to_string(), json!(value));
        }
    }
}

fn base_attrs(info: &ElementInfo) -> Map<String, Value> {
    let mut attrs = Map::new();
    let text = info.text.trim();
    if !text.is_empty() {
        attrs.insert("text".to_string(), json!(text));
    }
    attrs.insert("selector".to_string(), json!(info.selector));
    attrs.insert("visibility_observed".to_string(), json!(info.displayed));
    copy_attr(&mut attrs, info, "title", "title");
    copy_attr(&mut attrs, info, "aria-label", "aria_label");
    copy_attr(&mut attrs, info, "role", "role");
    attrs
}

fn button_attrs(info: &ElementInfo) -> Map<String, Value> {
    let mut attrs = base_attrs(info);
    copy_attr(&mut attrs, info, "id", "button_id");
    copy_attr(&mut attrs, info, "class", "button_class");
    copy_attr(&mut attrs, info, "type", "button_type");
    copy_attr(&mut attrs, info, "data-action", "data_action");
    copy_attr(&mut attrs, info, "data-target", "data_target");
    copy_attr(&mut attrs, info, "data-toggle", "data_toggle");
    copy_attr(&mut attrs, info, "data-dismiss", "data_dismiss");
    if let Some(onclick) = info.attr("onclick") {
        let hint: String = onclick.chars().take(80).collect();
        attrs.insert("onclick_hint".to_string(), json!(hint));
    }
    attrs
}

fn input_attrs(info: &ElementInfo) -> Map<String, Value> {
    let mut attrs = base_attrs(info);
    if info.tag == "select" {
        copy_attr(&mut attrs, info, "id", "select_id");
        if let Some(options) = info.attr("options") {
            let options: Vec<&str> = options.lines().filter(|o| !o.is_empty()).collect();
            attrs.insert("options".to_string(), json!(options));
        }
    } else {
        copy_attr(&mut attrs, info, "id", "input_id");
        copy_attr(&mut attrs, info, "type", "input_type");
    }
    copy_attr(&mut attrs, info, "name", "name");
    copy_attr(&mut attrs, info, "placeholder", "placeholder");
    copy_attr(&mut attrs, info, "autocomplete", "autocomplete");
    copy_attr(&mut attrs, info, "value", "value");
    attrs
}

fn link_attrs(info: &ElementInfo) -> Map<String, Value> {
    let mut attrs = base_attrs(info);
    copy_attr(&mut attrs, info, "id", "link_id");
    copy_attr(&mut attrs, info, "class", "link_class");
    copy_attr(&mut attrs, info, "href", "href");
    attrs
}

fn table_attrs(info: &ElementInfo) -> Map<String, Value> {
    let mut attrs = base_attrs(info);
    copy_attr(&mut attrs, info, "id", "table_id");
    if let Some(headers) = info.attr("headers") {
        let headers: Vec<&str> = headers.lines().filter(|h| !h.is_empty()).collect();
        attrs.insert("headers".to_string(), json!(headers));
    }
    attrs
}
