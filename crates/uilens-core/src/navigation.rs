//! Navigation path generation.
//!
//! Turns page-to-page routes in the discovered graph into executable step
//! lists: which element to click on each page, how to locate it, and which
//! preconditions the transition carries. Paths are emitted as a YAML
//! artifact for test suites.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::graph::{EdgeType, UiGraph};
use crate::selectors::selector_strategy;
use crate::urls;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepLocator {
    pub by: String,
    pub value: String,
}

/// One executable step of a navigation path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NavigationStep {
    /// `click`, `open_modal`, `type`, `wait`, or `navigate`.
    pub action: String,
    /// Display text (or id) of the element to act on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<StepLocator>,
    /// Text typed by `type` steps (may contain `{var}` placeholders);
    /// `wait` steps read it as a number of seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Title of the modal a `open_modal` step opens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modal: Option<String>,
    /// Direct target for `navigate` steps with no known trigger element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_authentication: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_role: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_input: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationPath {
    pub name: String,
    pub description: String,
    pub from: String,
    pub to: String,
    pub steps: Vec<NavigationStep>,
}

#[derive(Debug)]
pub struct NavigationGenerator {
    graph: UiGraph,
}

impl NavigationGenerator {
    /// Build from a ui-map document; the `graph` key is mandatory.
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

    /// Resolve a page reference to a node id: exact match first, then a
    /// URL ending with the reference, then any URL containing it.
    pub fn resolve_page(&self, reference: &str) -> Option<String> {
        if self.graph.contains_node(reference) {
            return Some(reference.to_string());
        }
        let pages = self.graph.pages();
        if let Some(page) = pages.iter().find(|p| p.id.ends_with(reference)) {
            return Some(page.id.clone());
        }
        pages
            .iter()
            .find(|p| p.id.contains(reference))
            .map(|p| p.id.clone())
    }

    /// Shortest path between two page references as executable steps.
    pub fn generate_path(&self, from_ref: &str, to_ref: &str) -> Result<NavigationPath> {
        let from = self
            .resolve_page(from_ref)
            .ok_or_else(|| anyhow!("page '{from_ref}' not found in graph"))?;
        let to = self
            .resolve_page(to_ref)
            .ok_or_else(|| anyhow!("page '{to_ref}' not found in graph"))?;

        let node_path = self.graph.find_shortest_path(&from, &to);
        if node_path.is_empty() {
            return Err(anyhow!("no path from '{from}' to '{to}'"));
        }

        Ok(NavigationPath {
            name: self.path_name(&from, &to),
            description: format!("Navigate from {} to {}", self.page_name(&from), self.page_name(&to)),
            from: from.clone(),
            to: to.clone(),
            steps: self.convert_path_to_steps(&node_path),
        })
    }

    /// All simple paths between two references, shortest first, capped at
    /// `max_paths` with at most `max_length` hops each.
    pub fn generate_all_paths(
        &self,
        from_ref: &str,
        to_ref: &str,
        max_paths: usize,
        max_length: usize,
    ) -> Result<Vec<NavigationPath>> {
        let from = self
            .resolve_page(from_ref)
            .ok_or_else(|| anyhow!("page '{from_ref}' not found in graph"))?;
        let to = self
            .resolve_page(to_ref)
            .ok_or_else(|| anyhow!("page '{to_ref}' not found in graph"))?;

        let mut node_paths = self.graph.find_all_paths(&from, &to, max_length);
        node_paths.sort_by_key(Vec::len);

        let base_name = self.path_name(&from, &to);
        let paths = node_paths
            .into_iter()
            .take(max_paths)
            .enumerate()
            .map(|(index, node_path)| {
                let name = if index == 0 {
                    base_name.clone()
                } else {
                    format!("{base_name}_v{}", index + 1)
                };
                NavigationPath {
                    name,
                    description: format!(
                        "Navigate from {} to {} ({} hops)",
                        self.page_name(&from),
                        self.page_name(&to),
                        node_path.len().saturating_sub(1)
                    ),
                    from: from.clone(),
                    to: to.clone(),
                    steps: self.convert_path_to_steps(&node_path),
                }
            })
            .collect();
        Ok(paths)
    }

    /// Shortest path from the home page to every other page. Pages the
    /// home page cannot reach are skipped.
    pub fn generate_common_paths(&self) -> Vec<NavigationPath> {
        let pages = self.graph.pages();
        let home = match self.detect_home_page() {
            Some(home) => home,
            None => return Vec::new(),
        };

        let mut paths = Vec::new();
        for page in pages {
            if page.id == home {
                continue;
            }
            let node_path = self.graph.find_shortest_path(&home, &page.id);
            if node_path.is_empty() {
                debug!(target_page = %page.id, "unreachable from home, skipping");
                continue;
            }
            paths.push(NavigationPath {
                name: self.path_name(&home, &page.id),
                description: format!(
                    "Navigate from {} to {}",
                    self.page_name(&home),
                    self.page_name(&page.id)
                ),
                from: home.clone(),
                to: page.id.clone(),
                steps: self.convert_path_to_steps(&node_path),
            });
        }
        paths
    }

    /// Home is the page whose URL mentions overview/home/index; when none
    /// does, the first discovered page stands in.
    fn detect_home_page(&self) -> Option<String> {
        let pages = self.graph.pages();
        pages
            .iter()
            .find(|page| {
                let lowered = page.id.to_lowercase();
                ["overview", "home", "index"]
                    .iter()
                    .any(|marker| lowered.contains(marker))
            })
            .or_else(|| pages.first())
            .map(|page| page.id.clone())
    }

    fn convert_path_to_steps(&self, node_path: &[String]) -> Vec<NavigationStep> {
        let mut steps = Vec::new();
        for pair in node_path.windows(2) {
            steps.push(self.step_for_hop(&pair[0], &pair[1]));
        }
        steps
    }

    fn step_for_hop(&self, from: &str, to: &str) -> NavigationStep {
        let edge = self
            .graph
            .navigation_edges_from(from)
            .into_iter()
            .find(|edge| edge.target == to);
        let edge_attrs = edge.map(|e| e.attrs.clone()).unwrap_or_default();

        let element_id = edge_attrs
            .get("via_element")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| self.find_trigger_element(from, to));

        let mut step = match element_id.as_deref().and_then(|id| self.graph.node(id)) {
            Some(element) => {
                let css = element
                    .attrs
                    .get("selector")
                    .and_then(Value::as_str)
                    .unwrap_or("");
                let (by, value) = selector_strategy(css);
                let display = element
                    .attrs
                    .get("text")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| element.id.clone());

                let modal_title = self.opened_modal_title(&element.id);
                NavigationStep {
                    action: if modal_title.is_some() {
                        "open_modal".to_string()
                    } else {
                        "click".to_string()
                    },
                    element: Some(display),
                    locator: Some(StepLocator {
                        by: by.to_string(),
                        value,
                    }),
                    modal: modal_title,
                    ..Default::default()
                }
            }
            // No recorded trigger: fall back to direct navigation.
            None => NavigationStep {
                action: "navigate".to_string(),
                url: Some(to.to_string()),
                ..Default::default()
            },
        };

        step.condition = edge_attrs.get("condition").cloned();
        step.requires_authentication = edge_attrs.get("requires_authentication").cloned();
        step.requires_role = edge_attrs.get("requires_role").cloned();
        step.requires_input = edge_attrs.get("requires_input").cloned();
        step
    }

    /// Element on `from` known to navigate to `to`.
    fn find_trigger_element(&self, from: &str, to: &str) -> Option<String> {
        let on_page: Vec<_> = self.graph.elements_in(from);
        self.graph
            .edges()
            .iter()
            .filter(|edge| edge.edge_type == EdgeType::NavigatesTo && edge.target == to)
            .find(|edge| on_page.iter().any(|element| element.id == edge.source))
            .map(|edge| edge.source.clone())
    }

    fn opened_modal_title(&self, element_id: &str) -> Option<String> {
        self.graph
            .edges()
            .iter()
            .find(|edge| edge.edge_type == EdgeType::OpensModal && edge.source == element_id)
            .and_then(|edge| self.graph.node(&edge.target))
            .and_then(|modal| modal.attrs.get("title").and_then(Value::as_str))
            .map(str::to_string)
    }

    fn page_name(&self, page_id: &str) -> String {
        let page_type = self
            .graph
            .node(page_id)
            .and_then(|node| node.attrs.get("page_type"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        urls::friendly_page_name(page_id, page_type)
    }

    fn path_name(&self, from: &str, to: &str) -> String {
        format!("path_{}_to_{}", self.page_name(from), self.page_name(to))
    }
}

/// Emit the YAML artifact for a set of paths.
pub fn paths_to_yaml(paths: &[NavigationPath]) -> Result<String> {
    let mut entries = Map::new();
    for path in paths {
        let mut key = path.name.clone();
        let mut version = 1usize;
        while entries.contains_key(&key) {
            version += 1;
            key = format!("{}_v{version}", path.name);
        }
        entries.insert(key, serde_json::to_value(path)?);
    }
    let body = serde_yaml::to_string(&serde_json::json!({ "paths": entries }))?;
    Ok(format!(
        "# Navigation paths generated from UI discovery\n\
         # Each path is an ordered list of executable steps.\n\
         # Regenerate instead of editing by hand.\n{body}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(pairs: &[(&str, &str)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    fn sample_graph() -> UiGraph {
        let mut graph = UiGraph::new();
        let home = graph.add_page("http://h/#!/overview", attrs(&[("page_type", "home")]));
        let devices = graph.add_page(
            "http://h/#!/devices",
            attrs(&[("page_type", "device_list")]),
        );
        let admin = graph.add_page("http://h/#!/admin", attrs(&[("page_type", "admin")]));

        let devices_link = graph.add_element(
            &home,
            "link",
            attrs(&[("text", "Devices"), ("selector", "#nav-devices")]),
        );
        graph.add_navigation_link(&home, &devices, Some(&devices_link), attrs(&[("text", "Devices")]));

        let admin_link = graph.add_element(
            &devices,
            "link",
            attrs(&[("text", "Admin"), ("selector", ".nav-admin")]),
        );
        graph.add_navigation_link(&devices, &admin, Some(&admin_link), Map::new());

        graph
    }

    #[test]
    fn missing_graph_key_is_an_error() {
        let err = NavigationGenerator::from_ui_map(&json!({"paths": {}})).unwrap_err();
        assert!(err.to_string().contains("'graph'"));
    }

    #[test]
    fn page_reference_resolution_order() {
        let generator = NavigationGenerator::from_graph(sample_graph());
        assert_eq!(
            generator.resolve_page("http://h/#!/devices").unwrap(),
            "http://h/#!/devices"
        );
        assert_eq!(
            generator.resolve_page("#!/devices").unwrap(),
            "http://h/#!/devices"
        );
        assert_eq!(
            generator.resolve_page("admin").unwrap(),
            "http://h/#!/admin"
        );
        assert!(generator.resolve_page("nonexistent").is_none());
    }

    #[test]
    fn shortest_path_becomes_click_steps() {
        let generator = NavigationGenerator::from_graph(sample_graph());
        let path = generator.generate_path("overview", "admin").unwrap();

        assert_eq!(path.name, "path_home_page_to_admin_page");
        assert_eq!(path.steps.len(), 2);
        let first = &path.steps[0];
        assert_eq!(first.action, "click");
        assert_eq!(first.element.as_deref(), Some("Devices"));
        assert_eq!(
            first.locator,
            Some(StepLocator {
                by: "id".to_string(),
                value: "nav-devices".to_string()
            })
        );
        let second = &path.steps[1];
        assert_eq!(second.locator.as_ref().unwrap().by, "css_selector");
        assert_eq!(second.locator.as_ref().unwrap().value, ".nav-admin");
    }

    #[test]
    fn unknown_page_reference_errors() {
        let generator = NavigationGenerator::from_graph(sample_graph());
        let err = generator.generate_path("overview", "nonexistent").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn unreachable_target_errors() {
        let generator = NavigationGenerator::from_graph(sample_graph());
        let err = generator.generate_path("admin", "overview").unwrap_err();
        assert!(err.to_string().contains("no path"));
    }

    #[test]
    fn hop_without_trigger_falls_back_to_navigate() {
        let mut graph = sample_graph();
        let admin = "http://h/#!/admin".to_string();
        let config = graph.add_page("http://h/#!/config", attrs(&[("page_type", "config")]));
        graph.add_navigation_link(&admin, &config, None, Map::new());

        let generator = NavigationGenerator::from_graph(graph);
        let path = generator.generate_path("admin", "config").unwrap();
        assert_eq!(path.steps.len(), 1);
        assert_eq!(path.steps[0].action, "navigate");
        assert_eq!(path.steps[0].url.as_deref(), Some("http://h/#!/config"));
    }

    #[test]
    fn modal_triggers_become_open_modal_steps() {
        let mut graph = UiGraph::new();
        let page = graph.add_page("http://h/#!/devices", attrs(&[("page_type", "device_list")]));
        let target = graph.add_page("http://h/#!/devices/new", attrs(&[("page_type", "unknown")]));
        let button = graph.add_element(
            &page,
            "button",
            attrs(&[("text", "Add"), ("selector", "#add")]),
        );
        let modal = graph.add_modal(&page, attrs(&[("title", "Add Device")]));
        graph.add_modal_trigger(&button, &modal, Map::new());
        graph.add_navigation_link(&page, &target, Some(&button), Map::new());

        let generator = NavigationGenerator::from_graph(graph);
        let path = generator.generate_path("devices", "devices/new").unwrap();
        assert_eq!(path.steps[0].action, "open_modal");
        assert_eq!(path.steps[0].modal.as_deref(), Some("Add Device"));
    }

    #[test]
    fn conditions_copied_from_edges() {
        let mut graph = sample_graph();
        let admin = "http://h/#!/admin".to_string();
        let users = graph.add_page("http://h/#!/users", attrs(&[("page_type", "users")]));
        let mut edge_attrs = Map::new();
        edge_attrs.insert("requires_authentication".to_string(), json!(true));
        edge_attrs.insert("requires_role".to_string(), json!("admin"));
        graph.add_navigation_link(&admin, &users, None, edge_attrs);

        let generator = NavigationGenerator::from_graph(graph);
        let path = generator.generate_path("admin", "users").unwrap();
        assert_eq!(path.steps[0].requires_authentication, Some(json!(true)));
        assert_eq!(path.steps[0].requires_role, Some(json!("admin")));
    }

    #[test]
    fn all_paths_capped_and_versioned() {
        let mut graph = sample_graph();
        // Second, longer route from overview to admin via a side page.
        let home = "http://h/#!/overview".to_string();
        let admin = "http://h/#!/admin".to_string();
        let side = graph.add_page("http://h/#!/tasks", attrs(&[("page_type", "tasks")]));
        graph.add_navigation_link(&home, &side, None, Map::new());
        graph.add_navigation_link(&side, &admin, None, Map::new());

        let generator = NavigationGenerator::from_graph(graph);
        let paths = generator
            .generate_all_paths("overview", "admin", 5, 10)
            .unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].name, "path_home_page_to_admin_page");
        assert_eq!(paths[1].name, "path_home_page_to_admin_page_v2");
        assert!(paths[0].steps.len() <= paths[1].steps.len());

        let capped = generator.generate_all_paths("overview", "admin", 1, 10).unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[test]
    fn common_paths_start_at_home_and_skip_unreachable() {
        let mut graph = sample_graph();
        graph.add_page("http://h/#!/island", attrs(&[("page_type", "unknown")]));

        let generator = NavigationGenerator::from_graph(graph);
        let paths = generator.generate_common_paths();
        let names: Vec<&str> = paths.iter().map(|p| p.name.as_str()).collect();
        assert!(names.contains(&"path_home_page_to_device_list_page"));
        assert!(names.contains(&"path_home_page_to_admin_page"));
        assert!(!names.iter().any(|n| n.contains("island")));
        assert!(paths.iter().all(|p| p.from == "http://h/#!/overview"));
    }

    #[test]
    fn yaml_output_carries_header_and_paths() {
        let generator = NavigationGenerator::from_graph(sample_graph());
        let paths = generator.generate_common_paths();
        let yaml = paths_to_yaml(&paths).unwrap();
        assert!(yaml.starts_with("# Navigation paths"));
        let parsed: Value = serde_yaml::from_str(&yaml).unwrap();
        assert!(parsed["paths"]["path_home_page_to_device_list_page"]["steps"].is_array());
    }
}
