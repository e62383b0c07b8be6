//! Fingerprint-based state matching.
//!
//! A UI state is described by token sets along five dimensions. Comparing
//! an expected fingerprint (from the state graph) against one captured from
//! the live page yields a weighted similarity in `[0, 1]`; semantic tokens
//! dominate the score, cosmetic ones barely matter, so a restyled page
//! still matches its state while a different page does not.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Token sets describing one UI state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Fingerprint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Landmarks: headings, page title, navigation labels.
    #[serde(default)]
    pub semantic: Vec<String>,
    /// Interactive surface: button/input/link identities and actions.
    #[serde(default)]
    pub functional: Vec<String>,
    /// DOM shape: tag names of notable containers.
    #[serde(default)]
    pub structural: Vec<String>,
    /// Visible text tokens.
    #[serde(default)]
    pub content: Vec<String>,
    /// Class-name tokens.
    #[serde(default)]
    pub style: Vec<String>,
}

impl Fingerprint {
    pub fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.semantic.is_empty()
            && self.functional.is_empty()
            && self.structural.is_empty()
            && self.content.is_empty()
            && self.style.is_empty()
    }
}

/// Relative weight of each fingerprint dimension.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MatchWeights {
    pub semantic: f64,
    pub functional: f64,
    pub structural: f64,
    pub content: f64,
    pub style: f64,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            semantic: 0.60,
            functional: 0.25,
            structural: 0.10,
            content: 0.04,
            style: 0.01,
        }
    }
}

/// Outcome of one comparison. A mismatch is a result, not an error.
#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    pub matched: bool,
    pub similarity: f64,
    pub threshold: f64,
    pub dimension_scores: BTreeMap<String, f64>,
}

/// Compares fingerprints with configurable weights.
#[derive(Debug, Clone, Default)]
pub struct StateComparer {
    weights: MatchWeights,
}

impl StateComparer {
    pub fn new(weights: MatchWeights) -> Self {
        Self { weights }
    }

    /// Weighted similarity between an expected and an actual fingerprint.
    ///
    /// Dimensions the expected fingerprint leaves empty are excluded and
    /// the remaining weights renormalized, so sparse state descriptions
    /// are not penalized for what they never claimed.
    pub fn similarity(&self, expected: &Fingerprint, actual: &Fingerprint) -> f64 {
        self.compare(expected, actual, 0.0).similarity
    }

    pub fn is_match(&self, expected: &Fingerprint, actual: &Fingerprint, threshold: f64) -> bool {
        self.compare(expected, actual, threshold).matched
    }

    pub fn compare(
        &self,
        expected: &Fingerprint,
        actual: &Fingerprint,
        threshold: f64,
    ) -> MatchResult {
        let mut dimension_scores = BTreeMap::new();
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;

        let semantic_score = self.semantic_score(expected, actual, &mut weight_total);
        if let Some(score) = semantic_score {
            dimension_scores.insert("semantic".to_string(), score);
            weighted_sum += score * self.weights.semantic;
        }

        let token_dims = [
            ("functional", &expected.functional, &actual.functional, self.weights.functional),
            ("structural", &expected.structural, &actual.structural, self.weights.structural),
            ("content", &expected.content, &actual.content, self.weights.content),
            ("style", &expected.style, &actual.style, self.weights.style),
        ];
        for (name, expected_tokens, actual_tokens, weight) in token_dims {
            if expected_tokens.is_empty() {
                continue;
            }
            let score = jaccard(expected_tokens, actual_tokens);
            dimension_scores.insert(name.to_string(), score);
            weighted_sum += score * weight;
            weight_total += weight;
        }

        let similarity = if weight_total > 0.0 {
            weighted_sum / weight_total
        } else {
            0.0
        };
        MatchResult {
            matched: similarity >= threshold,
            similarity,
            threshold,
            dimension_scores,
        }
    }

    /// The semantic dimension blends token overlap with a URL check when
    /// the expected state pins a URL: exact match scores 1, a prefix
    /// relationship (detail page under a list URL) scores 0.5.
    fn semantic_score(
        &self,
        expected: &Fingerprint,
        actual: &Fingerprint,
        weight_total: &mut f64,
    ) -> Option<f64> {
        let token_score = if expected.semantic.is_empty() {
            None
        } else {
            Some(jaccard(&expected.semantic, &actual.semantic))
        };
        let url_score = match (&expected.url, &actual.url) {
            (Some(expected_url), Some(actual_url)) => Some(url_similarity(expected_url, actual_url)),
            (Some(_), None) => Some(0.0),
            (None, _) => None,
        };

        let score = match (token_score, url_score) {
            (Some(tokens), Some(url)) => Some((tokens + url) / 2.0),
            (Some(tokens), None) => Some(tokens),
            (None, Some(url)) => Some(url),
            (None, None) => None,
        };
        if score.is_some() {
            *weight_total += self.weights.semantic;
        }
        score
    }
}

fn url_similarity(expected: &str, actual: &str) -> f64 {
    let expected = expected.trim_end_matches('/');
    let actual = actual.trim_end_matches('/');
    if expected == actual {
        1.0
    } else if actual.starts_with(expected) || expected.starts_with(actual) {
        0.5
    } else {
        0.0
    }
}

fn jaccard(left: &[String], right: &[String]) -> f64 {
    let left: BTreeSet<&str> = left.iter().map(|s| s.as_str()).collect();
    let right: BTreeSet<&str> = right.iter().map(|s| s.as_str()).collect();
    if left.is_empty() && right.is_empty() {
        return 1.0;
    }
    let intersection = left.intersection(&right).count() as f64;
    let union = left.union(&right).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}
