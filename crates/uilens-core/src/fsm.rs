//! Finite-state-machine GUI component.
//!
//! Loads a state graph (states with fingerprints, transitions with
//! executable actions), verifies and detects states by fingerprint match,
//! navigates between states along BFS paths, and tracks coverage for
//! exploratory walks.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use url::Url;

use crate::discovery::{BUTTON_SELECTOR, INPUT_SELECTOR, LINK_SELECTOR};
use crate::driver::{BrowserDriver, By, DriverError, Locator};
use crate::matching::{Fingerprint, StateComparer};
use crate::navigation::StepLocator;

const HEADING_SELECTOR: &str = "h1, h2, h3";
const DEFAULT_MATCH_THRESHOLD: f64 = 0.80;

/// One node of the state graph. Accepts both the graph-export spelling
/// (`name`) and the crawler-export spelling (`state_id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiState {
    #[serde(alias = "state_id")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_type: Option<String>,
    #[serde(default)]
    pub fingerprint: Fingerprint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_logic: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub element_descriptors: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// One executable edge of the state graph. The crawler export spells the
/// endpoints `from_state_id`/`to_state_id` and the action `action_type`;
/// both spellings load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_id: Option<String>,
    #[serde(alias = "source", alias = "from_state_id")]
    pub from: String,
    #[serde(alias = "target", alias = "to_state_id")]
    pub to: String,
    /// `click`, `navigate`, or `submit`.
    #[serde(alias = "action_type")]
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<StepLocator>,
    /// Candidate locators in preference order, consulted when `locator`
    /// is absent.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trigger_locators: Vec<StepLocator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_rate: Option<f64>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Result of a recorded navigation attempt. Failure is data, not an
/// error: the record says how far execution got.
#[derive(Debug, Clone, Serialize)]
pub struct PathRecord {
    pub success: bool,
    /// State names along the planned path, start included.
    pub path: Vec<String>,
    /// Human-readable description of each executed step.
    pub completed_steps: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectivityReport {
    /// States with no outgoing transition.
    pub dead_ends: Vec<String>,
    /// States no transition leads to, the entry state excepted.
    pub unreachable: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoverageReport {
    pub visited_states: usize,
    pub total_states: usize,
    pub executed_transitions: usize,
    pub total_transitions: usize,
    pub state_coverage: f64,
    pub transition_coverage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WalkReport {
    pub steps_taken: usize,
    pub coverage: CoverageReport,
    pub errors: Vec<String>,
}

/// State-machine component over a browser driver.
#[derive(Debug)]
pub struct FsmGuiComponent {
    base_url: Url,
    states: HashMap<String, UiState>,
    state_order: Vec<String>,
    transitions: Vec<StateTransition>,
    comparer: StateComparer,
    threshold: f64,
    settle: Duration,
    visited_states: HashSet<String>,
    executed_transitions: HashSet<usize>,
}

impl FsmGuiComponent {
    /// Load a state graph document. Accepts `states`/`nodes` and
    /// `transitions`/`edges` key spellings; entries tagged with a
    /// different node or edge type are ignored. Fragment-relative state
    /// URLs are resolved against `base_url`.
    pub fn from_state_graph(document: &Value, base_url: Url) -> Result<Self> {
        let raw_states = document
            .get("states")
            .or_else(|| document.get("nodes"))
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow!("state graph is missing a 'states' or 'nodes' array"))?;
        let raw_transitions = document
            .get("transitions")
            .or_else(|| document.get("edges"))
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow!("state graph is missing a 'transitions' or 'edges' array"))?;

        let mut states = HashMap::new();
        let mut state_order = Vec::new();
        for raw in raw_states {
            if let Some(kind) = raw.get("node_type").and_then(Value::as_str) {
                if kind != "state" {
                    continue;
                }
            }
            let mut state: UiState = serde_json::from_value(raw.clone())
                .context("malformed state entry in state graph")?;
            state.url = state.url.map(|url| resolve_state_url(&base_url, &url));
            if state.fingerprint.url.is_none() {
                state.fingerprint.url = state.url.clone();
            }
            if !states.contains_key(&state.name) {
                state_order.push(state.name.clone());
            }
            states.insert(state.name.clone(), state);
        }
        if states.is_empty() {
            bail!("state graph contains no states");
        }

        let mut transitions = Vec::new();
        for raw in raw_transitions {
            if let Some(kind) = raw.get("edge_type").and_then(Value::as_str) {
                if kind != "transition" {
                    continue;
                }
            }
            let mut transition: StateTransition = serde_json::from_value(raw.clone())
                .context("malformed transition entry in state graph")?;
            transition.url = transition.url.map(|url| resolve_state_url(&base_url, &url));
            if !states.contains_key(&transition.from) || !states.contains_key(&transition.to) {
                warn!(from = %transition.from, to = %transition.to, "transition references unknown state, ignoring");
                continue;
            }
            transitions.push(transition);
        }

        Ok(Self {
            base_url,
            states,
            state_order,
            transitions,
            comparer: StateComparer::default(),
            threshold: DEFAULT_MATCH_THRESHOLD,
            settle: Duration::from_millis(500),
            visited_states: HashSet::new(),
            executed_transitions: HashSet::new(),
        })
    }

    pub fn from_json_str(raw: &str, base_url: Url) -> Result<Self> {
        let document: Value =
            serde_json::from_str(raw).context("state graph is not valid JSON")?;
        Self::from_state_graph(&document, base_url)
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn state_names(&self) -> &[String] {
        &self.state_order
    }

    pub fn state(&self, name: &str) -> Result<&UiState> {
        self.states
            .get(name)
            .ok_or_else(|| anyhow!("state '{name}' not found in graph"))
    }

    pub fn get_state_metadata(&self, name: &str) -> Result<&Map<String, Value>> {
        Ok(&self.state(name)?.metadata)
    }

    pub fn get_transition_metadata(&self, from: &str, to: &str) -> Option<&Map<String, Value>> {
        self.transitions
            .iter()
            .find(|t| t.from == from && t.to == to)
            .map(|t| &t.metadata)
    }

    /// Outgoing transitions of a state.
    pub fn get_available_transitions(&self, from: &str) -> Vec<&StateTransition> {
        self.transitions.iter().filter(|t| t.from == from).collect()
    }

    /// Capture a fingerprint of the page the driver currently shows.
    pub async fn capture_fingerprint<D: BrowserDriver>(
        &self,
        driver: &D,
    ) -> Result<Fingerprint, DriverError> {
        let mut fingerprint = Fingerprint {
            url: Some(crate::urls::normalize_url(&self.base_url, &driver.current_url().await?)),
            ..Default::default()
        };

        let title = driver.title().await?;
        push_tokens(&mut fingerprint.semantic, &title);

        for heading in driver.find_all(&Locator::css(HEADING_SELECTOR)).await? {
            push_tokens(&mut fingerprint.semantic, &heading.text);
            push_tokens(&mut fingerprint.content, &heading.text);
            fingerprint.structural.push(heading.tag.clone());
        }

        let interactive = [
            driver.find_all(&Locator::css(BUTTON_SELECTOR)).await?,
            driver.find_all(&Locator::css(INPUT_SELECTOR)).await?,
            driver.find_all(&Locator::css(LINK_SELECTOR)).await?,
        ];
        for group in interactive {
            for element in group {
                fingerprint.structural.push(element.tag.clone());
                push_tokens(&mut fingerprint.content, &element.text);
                for key in ["id", "name", "data-action"] {
                    if let Some(value) = element.attr(key) {
                        if !value.is_empty() {
                            fingerprint.functional.push(value.to_lowercase());
                        }
                    }
                }
                if let Some(classes) = element.attr("class") {
                    for class in classes.split_whitespace() {
                        fingerprint.style.push(class.to_lowercase());
                    }
                }
            }
        }

        dedup_sorted(&mut fingerprint.semantic);
        dedup_sorted(&mut fingerprint.functional);
        dedup_sorted(&mut fingerprint.structural);
        dedup_sorted(&mut fingerprint.content);
        dedup_sorted(&mut fingerprint.style);
        Ok(fingerprint)
    }

    /// Whether the live page matches the named state's fingerprint.
    pub async fn verify_state<D: BrowserDriver>(
        &self,
        driver: &D,
        state_name: &str,
    ) -> Result<bool> {
        let state = self.state(state_name)?;
        let actual = self.capture_fingerprint(driver).await?;
        let result = self
            .comparer
            .compare(&state.fingerprint, &actual, self.threshold);
        debug!(state = state_name, similarity = result.similarity, "state verification");
        Ok(result.matched)
    }

    /// Best-matching state for the live page, if any clears the threshold.
    pub async fn detect_current_state<D: BrowserDriver>(
        &self,
        driver: &D,
    ) -> Result<Option<String>> {
        let actual = self.capture_fingerprint(driver).await?;
        let mut best: Option<(&str, f64)> = None;
        for name in &self.state_order {
            let state = &self.states[name];
            if state.fingerprint.is_empty() {
                continue;
            }
            let similarity = self.comparer.similarity(&state.fingerprint, &actual);
            if best.map(|(_, s)| similarity > s).unwrap_or(true) {
                best = Some((name, similarity));
            }
        }
        Ok(best
            .filter(|(_, similarity)| *similarity >= self.threshold)
            .map(|(name, _)| name.to_string()))
    }

    /// Drive the browser from the current state to `target`, executing at
    /// most `max_steps` transitions. Fails fast: the first failing step
    /// ends the attempt and the record says how far it got.
    pub async fn navigate_to_state<D: BrowserDriver>(
        &mut self,
        driver: &D,
        target: &str,
        max_steps: usize,
    ) -> Result<PathRecord> {
        self.state(target)?;
        let current = match self.detect_current_state(driver).await? {
            Some(current) => current,
            None => {
                return Ok(PathRecord {
                    success: false,
                    path: Vec::new(),
                    completed_steps: Vec::new(),
                    error: Some("current state could not be detected".to_string()),
                })
            }
        };
        self.visited_states.insert(current.clone());

        if current == target {
            return Ok(PathRecord {
                success: true,
                path: vec![current],
                completed_steps: Vec::new(),
                error: None,
            });
        }

        let plan = match self.find_state_path(&current, target, max_steps) {
            Some(plan) => plan,
            None => {
                return Ok(PathRecord {
                    success: false,
                    path: vec![current.clone()],
                    completed_steps: Vec::new(),
                    error: Some(format!(
                        "no path from '{current}' to '{target}' within {max_steps} steps"
                    )),
                })
            }
        };

        let mut path = vec![current];
        let mut completed = Vec::new();
        for index in &plan {
            let transition = self.transitions[*index].clone();
            let step = format!(
                "{} -> {} via {}",
                transition.from, transition.to, transition.action
            );
            if let Err(err) = self.execute_transition(driver, &transition).await {
                return Ok(PathRecord {
                    success: false,
                    path,
                    completed_steps: completed,
                    error: Some(format!("step '{step}' failed: {err}")),
                });
            }
            self.executed_transitions.insert(*index);
            self.visited_states.insert(transition.to.clone());
            path.push(transition.to.clone());
            completed.push(step);
        }

        // Trust but verify: the plan only holds if the page agrees.
        let state = &self.states[target];
        if !state.fingerprint.is_empty() {
            let actual = self.capture_fingerprint(driver).await?;
            if !self
                .comparer
                .is_match(&state.fingerprint, &actual, self.threshold)
            {
                return Ok(PathRecord {
                    success: false,
                    path,
                    completed_steps: completed,
                    error: Some(format!("arrived but state '{target}' did not verify")),
                });
            }
        }

        info!(target, steps = completed.len(), "state navigation complete");
        Ok(PathRecord {
            success: true,
            path,
            completed_steps: completed,
            error: None,
        })
    }

    /// BFS over transitions; returns transition indices from -> to.
    fn find_state_path(&self, from: &str, to: &str, max_steps: usize) -> Option<Vec<usize>> {
        let mut predecessor: HashMap<&str, (usize, &str)> = HashMap::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<(&str, usize)> = VecDeque::new();
        visited.insert(from);
        queue.push_back((from, 0));

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_steps {
                continue;
            }
            for (index, transition) in self.transitions.iter().enumerate() {
                if transition.from != current {
                    continue;
                }
                let next = transition.to.as_str();
                if !visited.insert(next) {
                    continue;
                }
                predecessor.insert(next, (index, current));
                if next == to {
                    let mut plan = Vec::new();
                    let mut cursor = to;
                    while let Some(&(edge, prev)) = predecessor.get(cursor) {
                        plan.push(edge);
                        cursor = prev;
                    }
                    plan.reverse();
                    return Some(plan);
                }
                queue.push_back((next, depth + 1));
            }
        }
        None
    }

    async fn execute_transition<D: BrowserDriver>(
        &self,
        driver: &D,
        transition: &StateTransition,
    ) -> Result<()> {
        match transition.action.as_str() {
            "click" | "open_modal" => {
                let locator = locator_of(transition)?;
                driver.click(&locator).await?;
            }
            "navigate" => {
                let url = transition
                    .url
                    .clone()
                    .or_else(|| self.states.get(&transition.to).and_then(|s| s.url.clone()))
                    .ok_or_else(|| {
                        anyhow!(
                            "navigate transition '{}' -> '{}' has no target URL",
                            transition.from,
                            transition.to
                        )
                    })?;
                driver.goto(&url).await?;
            }
            "submit" => {
                let locator = locator_of(transition)?;
                driver.submit(&locator).await?;
            }
            other => bail!(
                "unknown transition action '{other}' ('{}' -> '{}')",
                transition.from,
                transition.to
            ),
        }
        tokio::time::sleep(self.settle).await;
        Ok(())
    }

    /// Take `num_steps` random transitions from the current state,
    /// stopping early once `coverage_target` (fraction of states visited)
    /// is reached. Failed steps are recorded and the walk continues from
    /// wherever the browser ended up.
    pub async fn execute_random_walk<D: BrowserDriver>(
        &mut self,
        driver: &D,
        num_steps: usize,
        coverage_target: f64,
        seed: u64,
    ) -> Result<WalkReport> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut errors = Vec::new();
        let mut steps_taken = 0usize;

        let mut current = match self.detect_current_state(driver).await? {
            Some(state) => state,
            None => self.state_order[0].clone(),
        };
        self.visited_states.insert(current.clone());

        for _ in 0..num_steps {
            if self.calculate_path_coverage().state_coverage >= coverage_target {
                break;
            }
            let candidates: Vec<usize> = self
                .transitions
                .iter()
                .enumerate()
                .filter(|(_, t)| t.from == current)
                .map(|(index, _)| index)
                .collect();
            if candidates.is_empty() {
                debug!(state = %current, "random walk hit a dead end");
                break;
            }
            let index = candidates[rng.gen_range(0..candidates.len())];
            let transition = self.transitions[index].clone();
            steps_taken += 1;
            match self.execute_transition(driver, &transition).await {
                Ok(()) => {
                    self.executed_transitions.insert(index);
                    self.visited_states.insert(transition.to.clone());
                    current = transition.to;
                }
                Err(err) => {
                    errors.push(format!(
                        "{} -> {}: {err}",
                        transition.from, transition.to
                    ));
                    // Re-detect where the failed step left us.
                    if let Some(detected) = self.detect_current_state(driver).await? {
                        current = detected;
                    }
                }
            }
        }

        Ok(WalkReport {
            steps_taken,
            coverage: self.calculate_path_coverage(),
            errors,
        })
    }

    pub fn calculate_path_coverage(&self) -> CoverageReport {
        let total_states = self.states.len();
        let total_transitions = self.transitions.len();
        let visited_states = self.visited_states.len();
        let executed_transitions = self.executed_transitions.len();
        CoverageReport {
            visited_states,
            total_states,
            executed_transitions,
            total_transitions,
            state_coverage: ratio(visited_states, total_states),
            transition_coverage: ratio(executed_transitions, total_transitions),
        }
    }

    /// Structural sanity check of the state graph.
    pub fn validate_graph_connectivity(&self) -> ConnectivityReport {
        let sources: HashSet<&str> = self.transitions.iter().map(|t| t.from.as_str()).collect();
        let targets: HashSet<&str> = self.transitions.iter().map(|t| t.to.as_str()).collect();
        let entry = self.state_order.first().map(String::as_str);

        let dead_ends = self
            .state_order
            .iter()
            .filter(|name| !sources.contains(name.as_str()))
            .cloned()
            .collect();
        let unreachable = self
            .state_order
            .iter()
            .filter(|name| Some(name.as_str()) != entry && !targets.contains(name.as_str()))
            .cloned()
            .collect();
        ConnectivityReport {
            dead_ends,
            unreachable,
        }
    }

    /// Save a reference screenshot for a state as `<dir>/<state>.png`.
    pub async fn capture_state_screenshot<D: BrowserDriver>(
        &self,
        driver: &D,
        state_name: &str,
        reference_dir: &Path,
    ) -> Result<PathBuf> {
        self.state(state_name)?;
        let bytes = driver.screenshot().await?;
        std::fs::create_dir_all(reference_dir)
            .with_context(|| format!("cannot create {}", reference_dir.display()))?;
        let path = reference_dir.join(format!("{state_name}.png"));
        std::fs::write(&path, bytes).with_context(|| format!("cannot write {}", path.display()))?;
        Ok(path)
    }

    /// Compare the live page against the stored reference screenshot for a
    /// state. A visual mismatch is reported in the result, never as an
    /// error; only infrastructure problems (no reference, bad image data)
    /// surface in the result's error field.
    #[cfg(feature = "visual")]
    pub async fn compare_screenshot_with_reference<D: BrowserDriver>(
        &self,
        driver: &D,
        state_name: &str,
        reference_dir: &Path,
        method: crate::visual::CompareMethod,
        threshold: f64,
    ) -> Result<crate::visual::VisualComparison> {
        use crate::visual::{compare_png, CompareMethod};

        let state = self.state(state_name)?;
        let reference_path = reference_dir.join(format!("{state_name}.png"));
        let reference = match std::fs::read(&reference_path) {
            Ok(bytes) => bytes,
            Err(err) => {
                return Ok(crate::visual::VisualComparison::failed(format!(
                    "no reference screenshot at {}: {err}",
                    reference_path.display()
                )))
            }
        };
        let actual = driver.screenshot().await?;

        // Form-heavy states compare better structurally than pixel-exact.
        let method = match method {
            CompareMethod::Auto => {
                let has_form = state
                    .metadata
                    .get("has_form")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if has_form {
                    CompareMethod::Ssim
                } else {
                    CompareMethod::PixelDiff
                }
            }
            chosen => chosen,
        };

        let diff_path = reference_dir.join(format!("{state_name}.diff.png"));
        Ok(compare_png(&reference, &actual, method, threshold, Some(&diff_path)))
    }
}

fn locator_of(transition: &StateTransition) -> Result<Locator> {
    let step_locator = transition
        .locator
        .as_ref()
        .or_else(|| transition.trigger_locators.first())
        .ok_or_else(|| {
            anyhow!(
                "transition '{}' -> '{}' has no locator",
                transition.from,
                transition.to
            )
        })?;
    let by = By::parse(&step_locator.by)
        .ok_or_else(|| anyhow!("unknown locator strategy '{}'", step_locator.by))?;
    Ok(Locator::new(by, step_locator.value.clone()))
}

fn resolve_state_url(base_url: &Url, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        crate::urls::normalize_url(base_url, url)
    }
}

fn push_tokens(tokens: &mut Vec<String>, text: &str) {
    for token in text.split_whitespace() {
        let token = token.to_lowercase();
        if token.len() > 1 {
            tokens.push(token);
        }
    }
}

fn dedup_sorted(tokens: &mut Vec<String>) {
    tokens.sort();
    tokens.dedup();
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
