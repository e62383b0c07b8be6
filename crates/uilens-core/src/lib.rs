//! # uilens-core
//!
//! Core library for mapping web UIs into navigable graphs.
//!
//! This library provides:
//! - Breadth-first UI discovery over a browser driver
//! - A typed UI graph (pages, modals, forms, elements) with node-link JSON,
//!   GraphML, and GEXF export
//! - URL pattern detection to collapse parameterized detail pages
//! - Selector-map and navigation-path YAML generation
//! - Runtime page/element lookup with keyword scoring
//! - A state machine over UI states with fingerprint matching
//!
//! ## Features
//!
//! - `default`: graph construction, generators, and runtime lookup
//! - `webdriver`: fantoccini-backed browser driver
//! - `visual`: screenshot pixel-diff / SSIM comparison
//!
//! ## Example
//!
//! ```no_run
//! use uilens_core::{NavigationGenerator, SelectorGenerator, UiGraph};
//!
//! # fn example(ui_map: serde_json::Value) -> anyhow::Result<()> {
//! let graph = UiGraph::from_node_link(&ui_map["graph"])?;
//! let selector_yaml = SelectorGenerator::from_graph(graph.clone()).to_yaml()?;
//! let paths = NavigationGenerator::from_graph(graph).generate_common_paths();
//! # Ok(())
//! # }
//! ```

pub mod discovery;
pub mod driver;
pub mod fsm;
pub mod graph;
pub mod matching;
pub mod navigation;
pub mod patterns;
pub mod runtime;
pub mod selectors;
pub mod urls;

#[cfg(feature = "visual")]
pub mod visual;

#[cfg(feature = "webdriver")]
pub mod webdriver;

#[cfg(test)]
pub(crate) mod mockdriver;

// Re-export commonly used types
pub use driver::{BrowserDriver, By, DriverError, ElementInfo, Locator};
pub use graph::{EdgeType, NodeType, UiEdge, UiGraph, UiNode};

pub use discovery::{DiscoveryConfig, UiDiscoveryTool};
pub use fsm::{FsmGuiComponent, StateTransition, UiState};
pub use matching::{Fingerprint, MatchResult, MatchWeights, StateComparer};
pub use navigation::{paths_to_yaml, NavigationGenerator, NavigationPath, NavigationStep};
pub use patterns::{UrlPattern, UrlPatternDetector};
pub use runtime::{BaseGuiComponent, HistoryEntry, LookupError};
pub use selectors::SelectorGenerator;

#[cfg(feature = "webdriver")]
pub use webdriver::{headless_capabilities, WebDriverSession};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    #[test]
    fn graph_roundtrips_through_node_link_json() {
        let mut graph = UiGraph::new();
        let mut attrs = Map::new();
        attrs.insert("title".to_string(), json!("Overview"));
        graph.add_page("http://h/#!/overview", attrs);
        graph.add_page("http://h/#!/devices", Map::new());
        graph.add_navigation_link(
            "http://h/#!/overview",
            "http://h/#!/devices",
            None,
            Map::new(),
        );

        let exported = graph.export_node_link();
        let restored = UiGraph::from_node_link(&exported).unwrap();
        assert_eq!(restored.node_count(), graph.node_count());
        assert_eq!(restored.edge_count(), graph.edge_count());
    }

    #[test]
    fn generators_accept_a_discovery_document() {
        let ui_map = json!({
            "base_url": "http://h",
            "graph": {
                "directed": true,
                "multigraph": false,
                "graph": {},
                "nodes": [
                    {"id": "http://h/#!/overview", "node_type": "page",
                     "title": "Overview", "page_type": "home", "url": "http://h/#!/overview"},
                ],
                "links": [],
            },
        });
        let yaml = SelectorGenerator::from_ui_map(&ui_map).unwrap().to_yaml();
        assert!(yaml.is_ok());
    }
}
