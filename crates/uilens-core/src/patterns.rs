//! Detection of parameterized URL patterns among crawled pages.
//!
//! Detail pages like `#!/devices/ABC123` and `#!/devices/DEF456` differ only
//! in their last path segment. Grouping crawled URLs by everything except
//! that segment finds these families, infers a parameter name, and records
//! the UI structure the family shares.

use serde::{Deserialize, Serialize};

use crate::urls;

/// Minimal view of a crawled page handed to the detector.
#[derive(Debug, Clone, Default)]
pub struct PageSample {
    pub url: String,
    pub title: String,
    pub page_type: String,
    pub button_texts: Vec<String>,
    pub input_names: Vec<String>,
}

/// A family of URLs that differ only in one parameterized segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlPattern {
    /// Template like `#!/devices/{device_id}`.
    pub pattern: String,
    pub parameter_name: String,
    pub count: usize,
    pub example_urls: Vec<String>,
    pub description: String,
    pub common_structure: CommonStructure,
}

/// UI structure shared by every page in a pattern group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommonStructure {
    pub title_pattern: String,
    pub page_type: String,
    pub common_buttons: Vec<String>,
    pub common_inputs: Vec<String>,
}

/// Groups URLs by all path segments except the last and reports groups
/// large enough to be a real pattern.
#[derive(Debug, Clone)]
pub struct UrlPatternDetector {
    min_pattern_count: usize,
}

impl Default for UrlPatternDetector {
    fn default() -> Self {
        Self::new(3)
    }
}

impl UrlPatternDetector {
    pub fn new(min_pattern_count: usize) -> Self {
        Self { min_pattern_count }
    }

    pub fn detect_patterns(&self, pages: &[PageSample]) -> Vec<UrlPattern> {
        // Group by the static prefix, keeping first-seen group order.
        let mut group_order: Vec<String> = Vec::new();
        let mut groups: std::collections::HashMap<String, Vec<&PageSample>> =
            std::collections::HashMap::new();

        for page in pages {
            let path = urls::fragment_path(&page.url);
            let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
            if segments.len() < 2 {
                continue;
            }
            let prefix = segments[..segments.len() - 1].join("/");
            if !groups.contains_key(&prefix) {
                group_order.push(prefix.clone());
            }
            groups.entry(prefix).or_default().push(page);
        }

        let mut patterns = Vec::new();
        for prefix in group_order {
            let members = &groups[&prefix];
            if members.len() < self.min_pattern_count {
                continue;
            }

            let parameter_name = infer_parameter_name(&prefix);
            let pattern = format!("#!/{prefix}/{{{parameter_name}}}");
            let example_urls: Vec<String> = members
                .iter()
                .take(5)
                .map(|page| page.url.clone())
                .collect();
            let last_segment = prefix.rsplit('/').next().unwrap_or(&prefix);
            let description = format!("{} detail page", capitalize(last_segment));

            patterns.push(UrlPattern {
                pattern,
                parameter_name,
                count: members.len(),
                example_urls,
                description,
                common_structure: common_structure(members),
            });
        }
        patterns
    }
}

/// Parameter name from the static prefix: known entity keywords map to
/// `<keyword>_id`, anything else falls back to `<last_segment>_id`.
fn infer_parameter_name(prefix: &str) -> String {
    const ENTITY_KEYWORDS: [&str; 5] = ["device", "user", "preset", "provision", "file"];
    let lowered = prefix.to_lowercase();
    for keyword in ENTITY_KEYWORDS {
        if lowered.contains(keyword) {
            return format!("{keyword}_id");
        }
    }
    let last = prefix.rsplit('/').next().unwrap_or(prefix);
    format!("{}_id", urls::sanitize_name(last))
}

fn common_structure(members: &[&PageSample]) -> CommonStructure {
    let first = match members.first() {
        Some(first) => first,
        None => return CommonStructure::default(),
    };

    let common_buttons = shared_items(members, |page| &page.button_texts);
    let common_inputs = shared_items(members, |page| &page.input_names);

    CommonStructure {
        title_pattern: first.title.clone(),
        page_type: first.page_type.clone(),
        common_buttons,
        common_inputs,
    }
}

/// Items (by display text) present on every page of the group, capped at 5.
fn shared_items<'a>(
    members: &'a [&PageSample],
    extract: impl Fn(&'a PageSample) -> &'a Vec<String>,
) -> Vec<String> {
    let first = match members.first() {
        Some(first) => extract(first),
        None => return Vec::new(),
    };
    first
        .iter()
        .filter(|item| {
            members[1..]
                .iter()
                .all(|page| extract(page).contains(item))
        })
        .take(5)
        .cloned()
        .collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device_page(id: &str, buttons: &[&str]) -> PageSample {
        PageSample {
            url: format!("http://h/#!/devices/{id}"),
            title: format!("Device {id}"),
            page_type: "device_details".to_string(),
            button_texts: buttons.iter().map(|s| s.to_string()).collect(),
            input_names: vec!["search".to_string()],
        }
    }

    #[test]
    fn groups_detail_pages_into_a_pattern() {
        let pages = vec![
            device_page("A1", &["Reboot", "Delete"]),
            device_page("B2", &["Reboot", "Delete"]),
            device_page("C3", &["Reboot", "Delete", "Push File"]),
        ];
        let patterns = UrlPatternDetector::default().detect_patterns(&pages);
        assert_eq!(patterns.len(), 1);
        let pattern = &patterns[0];
        assert_eq!(pattern.pattern, "#!/devices/{device_id}");
        assert_eq!(pattern.parameter_name, "device_id");
        assert_eq!(pattern.count, 3);
        assert_eq!(pattern.example_urls.len(), 3);
        assert_eq!(pattern.description, "Devices detail page");
    }

    #[test]
    fn small_groups_are_not_patterns() {
        let pages = vec![device_page("A1", &[]), device_page("B2", &[])];
        let patterns = UrlPatternDetector::default().detect_patterns(&pages);
        assert!(patterns.is_empty());
        let patterns = UrlPatternDetector::new(2).detect_patterns(&pages);
        assert_eq!(patterns.len(), 1);
    }

    #[test]
    fn single_segment_urls_are_ignored() {
        let pages = vec![
            PageSample {
                url: "http://h/#!/overview".to_string(),
                ..Default::default()
            };
            4
        ];
        assert!(UrlPatternDetector::default().detect_patterns(&pages).is_empty());
    }

    #[test]
    fn common_structure_keeps_shared_elements_only() {
        let pages = vec![
            device_page("A1", &["Reboot", "Delete", "Only Here"]),
            device_page("B2", &["Reboot", "Delete"]),
            device_page("C3", &["Delete", "Reboot"]),
        ];
        let patterns = UrlPatternDetector::default().detect_patterns(&pages);
        let structure = &patterns[0].common_structure;
        assert_eq!(structure.common_buttons, vec!["Reboot", "Delete"]);
        assert_eq!(structure.common_inputs, vec!["search"]);
        assert_eq!(structure.page_type, "device_details");
    }

    #[test]
    fn example_urls_capped_at_five() {
        let pages: Vec<PageSample> = (0..8).map(|i| device_page(&format!("D{i}"), &[])).collect();
        let patterns = UrlPatternDetector::default().detect_patterns(&pages);
        assert_eq!(patterns[0].count, 8);
        assert_eq!(patterns[0].example_urls.len(), 5);
    }

    #[test]
    fn unknown_entities_fall_back_to_segment_name() {
        let pages: Vec<PageSample> = (0..3)
            .map(|i| PageSample {
                url: format!("http://h/#!/widgets/{i}"),
                ..Default::default()
            })
            .collect();
        let patterns = UrlPatternDetector::default().detect_patterns(&pages);
        assert_eq!(patterns[0].parameter_name, "widgets_id");
        assert_eq!(patterns[0].pattern, "#!/widgets/{widgets_id}");
    }
}
