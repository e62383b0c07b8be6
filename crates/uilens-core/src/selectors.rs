//! Selector artifact generation.
//!
//! Consumes a ui-map document and emits a YAML file of named element
//! selectors grouped per page, with nested modal and form sections. The
//! output is meant to be committed next to test suites and loaded by the
//! runtime components.

use anyhow::{anyhow, Result};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::graph::{UiGraph, UiNode};
use crate::urls;

/// Attribute keys copied verbatim onto each selector entry. Everything
/// else recorded during discovery stays in the graph only.
const METADATA_KEYS: [&str; 21] = [
    "text",
    "title",
    "aria_label",
    "data_action",
    "data_target",
    "onclick_hint",
    "role",
    "data_toggle",
    "data_dismiss",
    "placeholder",
    "value",
    "autocomplete",
    "button_id",
    "button_class",
    "button_type",
    "input_id",
    "input_type",
    "name",
    "select_id",
    "link_id",
    "link_class",
];

const MAX_LINKS_PER_PAGE: usize = 10;

#[derive(Debug)]
pub struct SelectorGenerator {
    graph: UiGraph,
}

impl SelectorGenerator {
    /// Build from a ui-map document. The document must carry a `graph` key
    /// holding node-link data; anything else is a format error.
    pub fn from_ui_map(document: &Value) -> Result<Self> {
        let graph_data = document
            .get("graph")
            .ok_or_else(|| anyhow!("input is not a ui-map document: missing 'graph' key"))?;
        let graph = UiGraph::from_node_link(graph_data)?;
        Ok(Self { graph })
    }

    pub fn from_graph(graph: UiGraph) -> Self {
        Self { graph }
    }

    /// Generate the selector tree as JSON. Keys are sorted, so the output
    /// is deterministic for a given graph.
    pub fn generate(&self) -> Value {
        let mut pages = Map::new();
        for page in self.graph.pages() {
            let page_type = page
                .attrs
                .get("page_type")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            let key = urls::friendly_page_name(&page.id, page_type);
            if pages.contains_key(&key) {
                debug!(page = %page.id, %key, "page key collision, keeping last");
            }
            pages.insert(key, self.page_section(page));
        }
        json!({ "pages": pages })
    }

    /// Generate the YAML artifact with its file header.
    pub fn to_yaml(&self) -> Result<String> {
        let body = serde_yaml::to_string(&self.generate())?;
        Ok(format!(
            "# Element selectors generated from UI discovery\n\
             # Grouped per page; modal and form elements are nested under\n\
             # their container. Regenerate instead of editing by hand.\n{body}"
        ))
    }

    fn page_section(&self, page: &UiNode) -> Value {
        let mut section = Map::new();
        section.insert("url".to_string(), json!(page.id));

        let elements = self.graph.elements_in(&page.id);
        insert_nonempty(&mut section, "buttons", self.group(&elements, &["button"], "button"));
        insert_nonempty(
            &mut section,
            "inputs",
            self.group(&elements, &["input", "select"], "input"),
        );
        insert_nonempty(&mut section, "links", self.link_group(&elements));
        insert_nonempty(&mut section, "tables", self.table_group(&elements));

        let mut modals = Map::new();
        for modal in self.graph.modals_for_page(&page.id) {
            let title = modal.attrs.get("title").and_then(Value::as_str).unwrap_or("");
            let key = urls::sanitize_name(title);
            if modals.contains_key(&key) {
                debug!(modal = %modal.id, %key, "modal key collision, keeping last");
            }
            modals.insert(key, self.modal_section(modal));
        }
        insert_nonempty(&mut section, "modals", modals);

        let mut forms = Map::new();
        for form in self.graph.forms_in(&page.id) {
            forms.insert(form.id.clone(), self.form_section(form));
        }
        insert_nonempty(&mut section, "forms", forms);

        Value::Object(section)
    }

    fn modal_section(&self, modal: &UiNode) -> Value {
        let mut section = Map::new();

        let container = match modal.attrs.get("modal_id").and_then(Value::as_str) {
            Some(id) => json!({ "by": "id", "selector": id }),
            None => json!({ "by": "css_selector", "selector": ".modal" }),
        };
        section.insert("container".to_string(), container);
        if let Some(title) = modal.attrs.get("title").and_then(Value::as_str) {
            section.insert("title".to_string(), json!(title));
        }

        let elements = self.graph.elements_in(&modal.id);
        insert_nonempty(&mut section, "buttons", self.group(&elements, &["button"], "button"));
        insert_nonempty(&mut section, "inputs", self.group(&elements, &["input"], "input"));

        let mut selects = Map::new();
        let mut counter = 0usize;
        for element in elements.iter().filter(|e| element_type(e) == "select") {
            counter += 1;
            let mut entry = selector_entry(element);
            if let Some(options) = element.attrs.get("options") {
                if let Value::Object(map) = &mut entry {
                    map.insert("options".to_string(), options.clone());
                }
            }
            selects.insert(element_name(element, "select", counter), entry);
        }
        insert_nonempty(&mut section, "selects", selects);

        Value::Object(section)
    }

    fn form_section(&self, form: &UiNode) -> Value {
        let mut section = Map::new();
        if let Some(id) = form.attrs.get("form_id").and_then(Value::as_str) {
            section.insert("form_id".to_string(), json!(id));
        }
        let elements = self.graph.elements_in(&form.id);
        insert_nonempty(
            &mut section,
            "inputs",
            self.group(&elements, &["input", "select"], "input"),
        );
        insert_nonempty(&mut section, "buttons", self.group(&elements, &["button"], "button"));
        Value::Object(section)
    }

    fn group(&self, elements: &[&UiNode], types: &[&str], prefix: &str) -> Map<String, Value> {
        let mut group = Map::new();
        let mut counter = 0usize;
        for element in elements.iter().filter(|e| types.contains(&element_type(e))) {
            counter += 1;
            let name = element_name(element, prefix, counter);
            if group.contains_key(&name) {
                debug!(element = %element.id, %name, "selector name collision, keeping last");
            }
            group.insert(name, selector_entry(element));
        }
        group
    }

    fn link_group(&self, elements: &[&UiNode]) -> Map<String, Value> {
        let mut group = Map::new();
        let mut counter = 0usize;
        for element in elements.iter().filter(|e| element_type(e) == "link") {
            if group.len() >= MAX_LINKS_PER_PAGE {
                break;
            }
            let text = element
                .attrs
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or("")
                .trim();
            // Session-ending and anonymous links make useless artifacts.
            if text.is_empty() || text.eq_ignore_ascii_case("log out") {
                continue;
            }
            counter += 1;
            let name = element_name(element, "link", counter);
            if group.contains_key(&name) {
                debug!(element = %element.id, %name, "selector name collision, keeping last");
            }
            group.insert(name, selector_entry(element));
        }
        group
    }

    fn table_group(&self, elements: &[&UiNode]) -> Map<String, Value> {
        let mut group = Map::new();
        let mut counter = 0usize;
        for element in elements.iter().filter(|e| element_type(e) == "table") {
            counter += 1;
            let mut entry = selector_entry(element);
            if let Some(headers) = element.attrs.get("headers") {
                if let Value::Object(map) = &mut entry {
                    map.insert("headers".to_string(), headers.clone());
                }
            }
            group.insert(element_name(element, "table", counter), entry);
        }
        group
    }
}

fn element_type<'a>(element: &'a UiNode) -> &'a str {
    element
        .attrs
        .get("element_type")
        .and_then(Value::as_str)
        .unwrap_or("element")
}

/// Pick the key for an element: display text, then name, title,
/// placeholder, id, element type, finally a positional fallback.
fn element_name(element: &UiNode, prefix: &str, index: usize) -> String {
    let attr = |key: &str| {
        element
            .attrs
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(text) = attr("text") {
        return urls::sanitize_name(text);
    }
    if let Some(name) = attr("name") {
        return urls::sanitize_name(name);
    }
    if let Some(title) = attr("title") {
        return urls::sanitize_name(title);
    }
    if let Some(placeholder) = attr("placeholder") {
        return urls::sanitize_name(placeholder);
    }
    for id_key in ["button_id", "input_id", "select_id", "link_id", "table_id"] {
        if let Some(id) = attr(id_key) {
            return urls::sanitize_name(id);
        }
    }
    for type_key in ["button_type", "input_type"] {
        if let Some(kind) = attr(type_key) {
            if !matches!(kind, "button" | "text" | "submit") {
                return urls::sanitize_name(kind);
            }
        }
    }
    format!("{prefix}_{index}")
}

/// Split a stored CSS selector into a lookup strategy and value: `#id`
/// becomes an id lookup, `//...` an XPath, anything else stays CSS.
pub(crate) fn selector_strategy(css: &str) -> (&'static str, String) {
    if let Some(id) = css.strip_prefix('#') {
        ("id", id.to_string())
    } else if css.starts_with("//") || css.starts_with("(//") {
        ("xpath", css.to_string())
    } else {
        ("css_selector", css.to_string())
    }
}

/// Convert the stored CSS selector into a `{by, selector}` entry and
/// copy the allow-listed metadata next to it.
fn selector_entry(element: &UiNode) -> Value {
    let css = element
        .attrs
        .get("selector")
        .and_then(Value::as_str)
        .unwrap_or("");

    let (by, selector) = selector_strategy(css);

    let mut entry = Map::new();
    entry.insert("by".to_string(), json!(by));
    entry.insert("selector".to_string(), json!(selector));
    for key in METADATA_KEYS {
        if let Some(value) = element.attrs.get(key) {
            entry.insert(key.to_string(), value.clone());
        }
    }
    Value::Object(entry)
}

fn insert_nonempty(section: &mut Map<String, Value>, key: &str, group: Map<String, Value>) {
    if !group.is_empty() {
        section.insert(key.to_string(), Value::Object(group));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    fn sample_graph() -> UiGraph {
        let mut graph = UiGraph::new();
        let page = graph.add_page(
            "http://h/#!/devices",
            attrs(&[("page_type", "device_list"), ("title", "Devices")]),
        );
        graph.add_element(
            &page,
            "button",
            attrs(&[
                ("text", "Reboot"),
                ("selector", "#btn-reboot"),
                ("button_id", "btn-reboot"),
                ("data_action", "device.reboot"),
            ]),
        );
        graph.add_element(
            &page,
            "input",
            attrs(&[
                ("selector", ".search-box"),
                ("name", "search"),
                ("placeholder", "Search devices"),
            ]),
        );
        graph.add_element(
            &page,
            "link",
            attrs(&[("text", "Overview"), ("selector", "a"), ("href", "#!/overview")]),
        );
        graph.add_element(
            &page,
            "link",
            attrs(&[("text", "Log out"), ("selector", "a"), ("href", "/logout")]),
        );
        graph
    }

    #[test]
    fn missing_graph_key_is_an_error() {
        let err = SelectorGenerator::from_ui_map(&json!({"nodes": []})).unwrap_err();
        assert!(err.to_string().contains("'graph'"));
    }

    #[test]
    fn pages_keyed_by_page_type() {
        let generator = SelectorGenerator::from_graph(sample_graph());
        let tree = generator.generate();
        let page = &tree["pages"]["device_list_page"];
        assert_eq!(page["url"], "http://h/#!/devices");
        assert!(page.get("buttons").is_some());
    }

    #[test]
    fn css_id_selectors_become_by_id() {
        let generator = SelectorGenerator::from_graph(sample_graph());
        let tree = generator.generate();
        let reboot = &tree["pages"]["device_list_page"]["buttons"]["reboot"];
        assert_eq!(reboot["by"], "id");
        assert_eq!(reboot["selector"], "btn-reboot");
        assert_eq!(reboot["data_action"], "device.reboot");
        // The raw discovery selector is not copied as metadata.
        assert!(reboot.get("visibility_observed").is_none());
    }

    #[test]
    fn xpath_and_css_selectors_keep_their_strategy() {
        let mut graph = UiGraph::new();
        let page = graph.add_page("http://h/#!/a", attrs(&[("page_type", "admin")]));
        graph.add_element(
            &page,
            "button",
            attrs(&[("text", "One"), ("selector", "//button[1]")]),
        );
        graph.add_element(&page, "button", attrs(&[("text", "Two"), ("selector", ".btn")]));

        let tree = SelectorGenerator::from_graph(graph).generate();
        let buttons = &tree["pages"]["admin_page"]["buttons"];
        assert_eq!(buttons["one"]["by"], "xpath");
        assert_eq!(buttons["two"]["by"], "css_selector");
        assert_eq!(buttons["two"]["selector"], ".btn");
    }

    #[test]
    fn input_named_by_priority_chain() {
        let generator = SelectorGenerator::from_graph(sample_graph());
        let tree = generator.generate();
        // No text, so the name attribute wins.
        assert!(tree["pages"]["device_list_page"]["inputs"]
            .get("search")
            .is_some());
    }

    #[test]
    fn links_filtered_and_capped() {
        let mut graph = UiGraph::new();
        let page = graph.add_page("http://h/#!/a", attrs(&[("page_type", "admin")]));
        for i in 0..15 {
            graph.add_element(
                &page,
                "link",
                attrs(&[
                    ("text", &format!("Link {i}") as &str),
                    ("selector", "a"),
                ]),
            );
        }
        graph.add_element(&page, "link", attrs(&[("selector", "a")]));

        let tree = SelectorGenerator::from_graph(graph).generate();
        let links = tree["pages"]["admin_page"]["links"].as_object().unwrap();
        assert_eq!(links.len(), 10);

        let generator = SelectorGenerator::from_graph(sample_graph());
        let tree = generator.generate();
        let links = tree["pages"]["device_list_page"]["links"].as_object().unwrap();
        assert!(links.get("log_out").is_none());
        assert!(links.get("overview").is_some());
    }

    #[test]
    fn modal_section_has_container_and_nested_elements() {
        let mut graph = sample_graph();
        let modal = graph.add_modal(
            "http://h/#!/devices",
            attrs(&[("title", "Add Device"), ("modal_id", "add-modal")]),
        );
        graph.add_element(
            &modal,
            "select",
            {
                let mut a = attrs(&[("selector", "#proto"), ("select_id", "proto")]);
                a.insert("options".to_string(), json!(["HTTP", "HTTPS"]));
                a
            },
        );
        graph.add_element(
            &modal,
            "button",
            attrs(&[("text", "Save"), ("selector", "#save")]),
        );

        let tree = SelectorGenerator::from_graph(graph).generate();
        let section = &tree["pages"]["device_list_page"]["modals"]["add_device"];
        assert_eq!(section["container"]["by"], "id");
        assert_eq!(section["container"]["selector"], "add-modal");
        assert_eq!(section["selects"]["proto"]["options"], json!(["HTTP", "HTTPS"]));
        assert_eq!(section["buttons"]["save"]["by"], "id");
    }

    #[test]
    fn form_section_nested_under_page() {
        let mut graph = sample_graph();
        let form = graph.add_form("http://h/#!/devices", attrs(&[("form_id", "filter-form")]));
        graph.add_element(
            &form,
            "input",
            attrs(&[("selector", "#f"), ("name", "filter")]),
        );

        let tree = SelectorGenerator::from_graph(graph).generate();
        let section = &tree["pages"]["device_list_page"]["forms"]["form_1"];
        assert_eq!(section["form_id"], "filter-form");
        assert!(section["inputs"].get("filter").is_some());
    }

    #[test]
    fn yaml_output_carries_header() {
        let generator = SelectorGenerator::from_graph(sample_graph());
        let yaml = generator.to_yaml().unwrap();
        assert!(yaml.starts_with("# Element selectors"));
        assert!(yaml.contains("device_list_page"));
        let parsed: Value = serde_yaml::from_str(&yaml).unwrap();
        assert!(parsed["pages"].is_object());
    }
}
