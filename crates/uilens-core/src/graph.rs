//! Typed directed graph of a web UI.
//!
//! Nodes are pages, modals, forms, and interactive elements; edges carry a
//! relationship type plus free-form JSON metadata. The graph serializes to
//! the node-link JSON layout consumed by the selector and navigation
//! generators, and exports one-way to GraphML and GEXF for graph viewers.

use std::collections::{HashMap, HashSet, VecDeque};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Kind of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Page,
    Modal,
    Form,
    Element,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Page => "page",
            NodeType::Modal => "modal",
            NodeType::Form => "form",
            NodeType::Element => "element",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "page" => Some(NodeType::Page),
            "modal" => Some(NodeType::Modal),
            "form" => Some(NodeType::Form),
            "element" => Some(NodeType::Element),
            _ => None,
        }
    }
}

/// Relationship carried by a graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    /// Element sits directly on a page.
    OnPage,
    /// Element sits inside a modal dialog.
    InModal,
    /// Element sits inside a form.
    InForm,
    /// Modal overlays its parent page.
    Overlays,
    /// Form is contained in a page or modal.
    ContainedIn,
    /// Clicking an element lands on a page.
    NavigatesTo,
    /// Page-to-page navigation mapping.
    MapsTo,
    /// Clicking an element opens a modal.
    OpensModal,
    /// Transition requires a precondition on another node.
    Requires,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::OnPage => "ON_PAGE",
            EdgeType::InModal => "IN_MODAL",
            EdgeType::InForm => "IN_FORM",
            EdgeType::Overlays => "OVERLAYS",
            EdgeType::ContainedIn => "CONTAINED_IN",
            EdgeType::NavigatesTo => "NAVIGATES_TO",
            EdgeType::MapsTo => "MAPS_TO",
            EdgeType::OpensModal => "OPENS_MODAL",
            EdgeType::Requires => "REQUIRES",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ON_PAGE" => Some(EdgeType::OnPage),
            "IN_MODAL" => Some(EdgeType::InModal),
            "IN_FORM" => Some(EdgeType::InForm),
            "OVERLAYS" => Some(EdgeType::Overlays),
            "CONTAINED_IN" => Some(EdgeType::ContainedIn),
            "NAVIGATES_TO" => Some(EdgeType::NavigatesTo),
            "MAPS_TO" => Some(EdgeType::MapsTo),
            "OPENS_MODAL" => Some(EdgeType::OpensModal),
            "REQUIRES" => Some(EdgeType::Requires),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UiNode {
    pub id: String,
    pub node_type: NodeType,
    pub attrs: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct UiEdge {
    pub source: String,
    pub target: String,
    pub edge_type: EdgeType,
    pub attrs: Map<String, Value>,
}

/// Directed multigraph of the discovered UI.
#[derive(Debug, Clone, Default)]
pub struct UiGraph {
    nodes: HashMap<String, UiNode>,
    // Insertion order, so exports and traversals are deterministic.
    order: Vec<String>,
    edges: Vec<UiEdge>,
    counters: HashMap<String, u64>,
}

impl UiGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self, prefix: &str) -> String {
        let counter = self.counters.entry(prefix.to_string()).or_insert(0);
        *counter += 1;
        format!("{prefix}_{counter}")
    }

    fn insert_node(&mut self, node: UiNode) {
        if !self.nodes.contains_key(&node.id) {
            self.order.push(node.id.clone());
        }
        self.nodes.insert(node.id.clone(), node);
    }

    /// Add a page node keyed by its normalized URL. Re-adding an existing
    /// page merges the new attributes into the old node instead of
    /// duplicating it.
    pub fn add_page(&mut self, url: &str, attrs: Map<String, Value>) -> String {
        if let Some(existing) = self.nodes.get_mut(url) {
            existing.attrs.extend(attrs);
        } else {
            self.insert_node(UiNode {
                id: url.to_string(),
                node_type: NodeType::Page,
                attrs,
            });
        }
        url.to_string()
    }

    /// Add a modal node overlaying `parent_id`. Returns the generated
    /// `modal_N` id.
    pub fn add_modal(&mut self, parent_id: &str, attrs: Map<String, Value>) -> String {
        let id = self.next_id("modal");
        self.insert_node(UiNode {
            id: id.clone(),
            node_type: NodeType::Modal,
            attrs,
        });
        self.add_edge(&id, parent_id, EdgeType::Overlays, Map::new());
        id
    }

    /// Add a form node contained in a page or modal. Returns the generated
    /// `form_N` id.
    pub fn add_form(&mut self, container_id: &str, attrs: Map<String, Value>) -> String {
        let id = self.next_id("form");
        self.insert_node(UiNode {
            id: id.clone(),
            node_type: NodeType::Form,
            attrs,
        });
        self.add_edge(&id, container_id, EdgeType::ContainedIn, Map::new());
        id
    }

    /// Add an interactive element inside a container. The containment edge
    /// type follows the container id: `modal_*` containers yield IN_MODAL,
    /// `form_*` yield IN_FORM, anything else yields ON_PAGE.
    pub fn add_element(
        &mut self,
        container_id: &str,
        element_type: &str,
        mut attrs: Map<String, Value>,
    ) -> String {
        let id = self.next_id(&format!("elem_{element_type}"));
        attrs.insert(
            "element_type".to_string(),
            Value::String(element_type.to_string()),
        );
        self.insert_node(UiNode {
            id: id.clone(),
            node_type: NodeType::Element,
            attrs,
        });

        let edge_type = if container_id.starts_with("modal_") {
            EdgeType::InModal
        } else if container_id.starts_with("form_") {
            EdgeType::InForm
        } else {
            EdgeType::OnPage
        };
        self.add_edge(&id, container_id, edge_type, Map::new());
        id
    }

    /// Record a page-to-page navigation. Always adds a MAPS_TO edge between
    /// the pages (carrying the triggering element id and any extra
    /// metadata); when `via_element` is known, also adds a NAVIGATES_TO edge
    /// from that element to the target page.
    pub fn add_navigation_link(
        &mut self,
        from_page: &str,
        to_page: &str,
        via_element: Option<&str>,
        attrs: Map<String, Value>,
    ) {
        if let Some(element_id) = via_element {
            self.add_edge(element_id, to_page, EdgeType::NavigatesTo, attrs.clone());
        }

        let mut maps_attrs = attrs;
        if let Some(element_id) = via_element {
            maps_attrs.insert(
                "via_element".to_string(),
                Value::String(element_id.to_string()),
            );
        }
        self.add_edge(from_page, to_page, EdgeType::MapsTo, maps_attrs);
    }

    /// Record that clicking `element_id` opens `modal_id`.
    pub fn add_modal_trigger(
        &mut self,
        element_id: &str,
        modal_id: &str,
        attrs: Map<String, Value>,
    ) {
        self.add_edge(element_id, modal_id, EdgeType::OpensModal, attrs);
    }

    /// Record a precondition edge. Defaults to the `is_populated` condition
    /// when none is given.
    pub fn add_requirement(&mut self, from: &str, to: &str, condition: Option<&str>) {
        let mut attrs = Map::new();
        attrs.insert(
            "condition".to_string(),
            Value::String(condition.unwrap_or("is_populated").to_string()),
        );
        self.add_edge(from, to, EdgeType::Requires, attrs);
    }

    pub fn add_edge(
        &mut self,
        source: &str,
        target: &str,
        edge_type: EdgeType,
        attrs: Map<String, Value>,
    ) {
        self.edges.push(UiEdge {
            source: source.to_string(),
            target: target.to_string(),
            edge_type,
            attrs,
        });
    }

    pub fn node(&self, id: &str) -> Option<&UiNode> {
        self.nodes.get(id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> &[UiEdge] {
        &self.edges
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &UiNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn pages(&self) -> Vec<&UiNode> {
        self.nodes_of_type(NodeType::Page)
    }

    pub fn nodes_of_type(&self, node_type: NodeType) -> Vec<&UiNode> {
        self.nodes()
            .filter(|node| node.node_type == node_type)
            .collect()
    }

    /// Elements contained (directly) in a page, modal, or form.
    pub fn elements_in(&self, container_id: &str) -> Vec<&UiNode> {
        self.edges
            .iter()
            .filter(|edge| {
                edge.target == container_id
                    && matches!(
                        edge.edge_type,
                        EdgeType::OnPage | EdgeType::InModal | EdgeType::InForm
                    )
            })
            .filter_map(|edge| self.nodes.get(&edge.source))
            .collect()
    }

    /// Modals overlaying a page.
    pub fn modals_for_page(&self, page_id: &str) -> Vec<&UiNode> {
        self.edges
            .iter()
            .filter(|edge| edge.target == page_id && edge.edge_type == EdgeType::Overlays)
            .filter_map(|edge| self.nodes.get(&edge.source))
            .collect()
    }

    /// Forms contained in a page or modal.
    pub fn forms_in(&self, container_id: &str) -> Vec<&UiNode> {
        self.edges
            .iter()
            .filter(|edge| edge.target == container_id && edge.edge_type == EdgeType::ContainedIn)
            .filter_map(|edge| self.nodes.get(&edge.source))
            .collect()
    }

    /// Outgoing MAPS_TO edges from a page.
    pub fn navigation_edges_from(&self, page_id: &str) -> Vec<&UiEdge> {
        self.edges
            .iter()
            .filter(|edge| edge.source == page_id && edge.edge_type == EdgeType::MapsTo)
            .collect()
    }

    fn adjacency(&self) -> HashMap<&str, Vec<&str>> {
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &self.edges {
            adjacency
                .entry(edge.source.as_str())
                .or_default()
                .push(edge.target.as_str());
        }
        adjacency
    }

    /// Shortest directed path between two nodes by BFS. Returns an empty
    /// vector when either endpoint is missing or no path exists.
    pub fn find_shortest_path(&self, from: &str, to: &str) -> Vec<String> {
        if !self.nodes.contains_key(from) || !self.nodes.contains_key(to) {
            return Vec::new();
        }
        if from == to {
            return vec![from.to_string()];
        }

        let adjacency = self.adjacency();
        let mut predecessor: HashMap<&str, &str> = HashMap::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        visited.insert(from);
        queue.push_back(from);

        while let Some(current) = queue.pop_front() {
            if let Some(neighbors) = adjacency.get(current) {
                for &next in neighbors {
                    if visited.insert(next) {
                        predecessor.insert(next, current);
                        if next == to {
                            let mut path = vec![to.to_string()];
                            let mut cursor = to;
                            while let Some(&prev) = predecessor.get(cursor) {
                                path.push(prev.to_string());
                                cursor = prev;
                            }
                            path.reverse();
                            return path;
                        }
                        queue.push_back(next);
                    }
                }
            }
        }
        Vec::new()
    }

    /// All simple directed paths between two nodes with at most
    /// `max_length` edges. Returns an empty vector when either endpoint is
    /// missing or no path exists.
    pub fn find_all_paths(&self, from: &str, to: &str, max_length: usize) -> Vec<Vec<String>> {
        if !self.nodes.contains_key(from) || !self.nodes.contains_key(to) {
            return Vec::new();
        }

        let adjacency = self.adjacency();
        let mut paths = Vec::new();
        let mut stack: Vec<String> = vec![from.to_string()];
        let mut on_path: HashSet<String> = HashSet::new();
        on_path.insert(from.to_string());
        self.collect_paths(&adjacency, to, max_length, &mut stack, &mut on_path, &mut paths);
        paths
    }

    fn collect_paths(
        &self,
        adjacency: &HashMap<&str, Vec<&str>>,
        to: &str,
        max_length: usize,
        stack: &mut Vec<String>,
        on_path: &mut HashSet<String>,
        paths: &mut Vec<Vec<String>>,
    ) {
        let current = stack
            .last()
            .map(String::as_str)
            .unwrap_or_default()
            .to_string();
        if current == to {
            paths.push(stack.clone());
            return;
        }
        if stack.len() > max_length {
            return;
        }
        if let Some(neighbors) = adjacency.get(current.as_str()) {
            for &next in neighbors {
                if on_path.contains(next) {
                    continue;
                }
                stack.push(next.to_string());
                on_path.insert(next.to_string());
                self.collect_paths(adjacency, to, max_length, stack, on_path, paths);
                on_path.remove(next);
                stack.pop();
            }
        }
    }

    /// Elements with no containment edge to any page, modal, or form.
    pub fn orphaned_elements(&self) -> Vec<String> {
        let contained: HashSet<&str> = self
            .edges
            .iter()
            .filter(|edge| {
                matches!(
                    edge.edge_type,
                    EdgeType::OnPage | EdgeType::InModal | EdgeType::InForm
                )
            })
            .map(|edge| edge.source.as_str())
            .collect();
        self.nodes()
            .filter(|node| node.node_type == NodeType::Element && !contained.contains(node.id.as_str()))
            .map(|node| node.id.clone())
            .collect()
    }

    /// Pages with no outgoing navigation mapping.
    pub fn dead_end_pages(&self) -> Vec<String> {
        let sources: HashSet<&str> = self
            .edges
            .iter()
            .filter(|edge| edge.edge_type == EdgeType::MapsTo)
            .map(|edge| edge.source.as_str())
            .collect();
        self.nodes()
            .filter(|node| node.node_type == NodeType::Page && !sources.contains(node.id.as_str()))
            .map(|node| node.id.clone())
            .collect()
    }

    /// Modals no element is known to open.
    pub fn modals_without_triggers(&self) -> Vec<String> {
        let triggered: HashSet<&str> = self
            .edges
            .iter()
            .filter(|edge| edge.edge_type == EdgeType::OpensModal)
            .map(|edge| edge.target.as_str())
            .collect();
        self.nodes()
            .filter(|node| node.node_type == NodeType::Modal && !triggered.contains(node.id.as_str()))
            .map(|node| node.id.clone())
            .collect()
    }

    /// Forms with no submit-looking element. An element counts as a submit
    /// when its button_type is "submit" or its text mentions submit/login.
    pub fn forms_without_submits(&self) -> Vec<String> {
        self.nodes()
            .filter(|node| node.node_type == NodeType::Form)
            .filter(|form| {
                !self
                    .elements_in(&form.id)
                    .iter()
                    .any(|element| is_submit_element(element))
            })
            .map(|form| form.id.clone())
            .collect()
    }

    fn is_weakly_connected(&self) -> bool {
        if self.nodes.is_empty() {
            return true;
        }
        let mut undirected: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &self.edges {
            undirected
                .entry(edge.source.as_str())
                .or_default()
                .push(edge.target.as_str());
            undirected
                .entry(edge.target.as_str())
                .or_default()
                .push(edge.source.as_str());
        }
        let start = &self.order[0];
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        visited.insert(start.as_str());
        queue.push_back(start.as_str());
        while let Some(current) = queue.pop_front() {
            if let Some(neighbors) = undirected.get(current) {
                for &next in neighbors {
                    if visited.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }
        visited.len() == self.nodes.len()
    }

    /// Summary statistics and quality indicators.
    pub fn statistics(&self) -> Map<String, Value> {
        let page_count = self.nodes_of_type(NodeType::Page).len();
        let modal_count = self.nodes_of_type(NodeType::Modal).len();
        let form_count = self.nodes_of_type(NodeType::Form).len();
        let element_count = self.nodes_of_type(NodeType::Element).len();

        let on_page_elements = self
            .edges
            .iter()
            .filter(|edge| edge.edge_type == EdgeType::OnPage)
            .count();
        let avg_elements_per_page = if page_count > 0 {
            on_page_elements as f64 / page_count as f64
        } else {
            0.0
        };

        let mut stats = Map::new();
        stats.insert("total_nodes".to_string(), json!(self.nodes.len()));
        stats.insert("total_edges".to_string(), json!(self.edges.len()));
        stats.insert("page_count".to_string(), json!(page_count));
        stats.insert("modal_count".to_string(), json!(modal_count));
        stats.insert("form_count".to_string(), json!(form_count));
        stats.insert("element_count".to_string(), json!(element_count));
        stats.insert(
            "avg_elements_per_page".to_string(),
            json!(avg_elements_per_page),
        );
        stats.insert(
            "orphaned_elements".to_string(),
            json!(self.orphaned_elements().len()),
        );
        stats.insert(
            "dead_end_pages".to_string(),
            json!(self.dead_end_pages().len()),
        );
        stats.insert(
            "modals_without_triggers".to_string(),
            json!(self.modals_without_triggers().len()),
        );
        stats.insert(
            "forms_without_submits".to_string(),
            json!(self.forms_without_submits().len()),
        );
        stats.insert(
            "is_weakly_connected".to_string(),
            json!(self.is_weakly_connected()),
        );
        stats
    }

    /// Serialize to node-link JSON: `{directed, multigraph, graph, nodes,
    /// links}` with node/edge attributes flattened into each entry. The
    /// document describes a plain directed graph: parallel edges with the
    /// same source, target, and edge type collapse into one link (the
    /// first recorded one keeps its metadata).
    pub fn export_node_link(&self) -> Value {
        let nodes: Vec<Value> = self
            .nodes()
            .map(|node| {
                let mut entry = node.attrs.clone();
                entry.insert("id".to_string(), Value::String(node.id.clone()));
                entry.insert(
                    "node_type".to_string(),
                    Value::String(node.node_type.as_str().to_string()),
                );
                Value::Object(entry)
            })
            .collect();

        let mut seen: HashSet<(&str, &str, &str)> = HashSet::new();
        let links: Vec<Value> = self
            .edges
            .iter()
            .filter(|edge| {
                seen.insert((
                    edge.source.as_str(),
                    edge.target.as_str(),
                    edge.edge_type.as_str(),
                ))
            })
            .map(|edge| {
                let mut entry = edge.attrs.clone();
                entry.insert("source".to_string(), Value::String(edge.source.clone()));
                entry.insert("target".to_string(), Value::String(edge.target.clone()));
                entry.insert(
                    "edge_type".to_string(),
                    Value::String(edge.edge_type.as_str().to_string()),
                );
                Value::Object(entry)
            })
            .collect();

        json!({
            "directed": true,
            "multigraph": false,
            "graph": {},
            "nodes": nodes,
            "links": links,
        })
    }

    /// Rebuild a graph from node-link JSON. Id counters are restored from
    /// the highest numeric suffix seen per generated-id prefix, so new
    /// nodes added afterwards never collide with imported ones.
    pub fn from_node_link(data: &Value) -> Result<Self> {
        let nodes = data
            .get("nodes")
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow!("node-link data missing 'nodes' array"))?;
        let links = data
            .get("links")
            .or_else(|| data.get("edges"))
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow!("node-link data missing 'links' array"))?;

        let mut graph = UiGraph::new();
        for raw in nodes {
            let obj = raw
                .as_object()
                .ok_or_else(|| anyhow!("node entry is not an object"))?;
            let id = obj
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("node entry missing 'id'"))?
                .to_string();
            let node_type = obj
                .get("node_type")
                .and_then(Value::as_str)
                .and_then(NodeType::parse)
                .unwrap_or(NodeType::Element);
            let mut attrs = obj.clone();
            attrs.remove("id");
            attrs.remove("node_type");
            graph.insert_node(UiNode {
                id,
                node_type,
                attrs,
            });
        }

        for raw in links {
            let obj = raw
                .as_object()
                .ok_or_else(|| anyhow!("link entry is not an object"))?;
            let source = obj
                .get("source")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("link entry missing 'source'"))?
                .to_string();
            let target = obj
                .get("target")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("link entry missing 'target'"))?
                .to_string();
            let edge_type = obj
                .get("edge_type")
                .and_then(Value::as_str)
                .and_then(EdgeType::parse)
                .ok_or_else(|| anyhow!("link entry missing or unknown 'edge_type'"))?;
            let mut attrs = obj.clone();
            attrs.remove("source");
            attrs.remove("target");
            attrs.remove("edge_type");
            attrs.remove("key");
            graph.edges.push(UiEdge {
                source,
                target,
                edge_type,
                attrs,
            });
        }

        graph.restore_counters();
        Ok(graph)
    }

    fn restore_counters(&mut self) {
        for id in &self.order {
            if let Some((prefix, suffix)) = id.rsplit_once('_') {
                if let Ok(number) = suffix.parse::<u64>() {
                    if prefix == "modal" || prefix == "form" || prefix.starts_with("elem_") {
                        let counter = self.counters.entry(prefix.to_string()).or_insert(0);
                        if number > *counter {
                            *counter = number;
                        }
                    }
                }
            }
        }
    }

    /// One-way GraphML export for graph viewers.
    pub fn to_graphml(&self) -> String {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str("<graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\">\n");
        out.push_str(
            "  <key id=\"d0\" for=\"node\" attr.name=\"node_type\" attr.type=\"string\"/>\n",
        );
        out.push_str(
            "  <key id=\"d1\" for=\"edge\" attr.name=\"edge_type\" attr.type=\"string\"/>\n",
        );
        out.push_str("  <graph id=\"ui\" edgedefault=\"directed\">\n");
        for node in self.nodes() {
            out.push_str(&format!(
                "    <node id=\"{}\">\n      <data key=\"d0\">{}</data>\n    </node>\n",
                escape_xml(&node.id),
                node.node_type.as_str()
            ));
        }
        for (index, edge) in self.edges.iter().enumerate() {
            out.push_str(&format!(
                "    <edge id=\"e{index}\" source=\"{}\" target=\"{}\">\n      <data key=\"d1\">{}</data>\n    </edge>\n",
                escape_xml(&edge.source),
                escape_xml(&edge.target),
                edge.edge_type.as_str()
            ));
        }
        out.push_str("  </graph>\n</graphml>\n");
        out
    }

    /// One-way GEXF export for graph viewers.
    pub fn to_gexf(&self) -> String {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str("<gexf xmlns=\"http://gexf.net/1.3\" version=\"1.3\">\n");
        out.push_str("  <graph defaultedgetype=\"directed\">\n");
        out.push_str("    <nodes>\n");
        for node in self.nodes() {
            let label = node
                .attrs
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or(node.node_type.as_str());
            out.push_str(&format!(
                "      <node id=\"{}\" label=\"{}\"/>\n",
                escape_xml(&node.id),
                escape_xml(label)
            ));
        }
        out.push_str("    </nodes>\n    <edges>\n");
        for (index, edge) in self.edges.iter().enumerate() {
            out.push_str(&format!(
                "      <edge id=\"{index}\" source=\"{}\" target=\"{}\" label=\"{}\"/>\n",
                escape_xml(&edge.source),
                escape_xml(&edge.target),
                edge.edge_type.as_str()
            ));
        }
        out.push_str("    </edges>\n  </graph>\n</gexf>\n");
        out
    }
}

fn is_submit_element(element: &UiNode) -> bool {
    if element
        .attrs
        .get("button_type")
        .and_then(Value::as_str)
        .map(|t| t.eq_ignore_ascii_case("submit"))
        .unwrap_or(false)
    {
        return true;
    }
    element
        .attrs
        .get("text")
        .and_then(Value::as_str)
        .map(|text| {
            let text = text.to_lowercase();
            text.contains("submit") || text.contains("login")
        })
        .unwrap_or(false)
}

fn escape_xml(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
