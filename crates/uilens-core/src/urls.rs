//! URL normalization, classification, and naming helpers.
//!
//! Single-page applications route through hash fragments (`#!/devices/ID`),
//! so every helper here looks at the fragment first and falls back to the
//! path. Query parameters never affect identity or classification: they are
//! stripped during normalization and preserved separately as edge metadata.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use url::{Position, Url};

/// Normalize a URL for crawl identity.
///
/// Resolves relative references against `base`, strips query parameters
/// (both standard and fragment-embedded), and trims trailing slashes from
/// the path. The result is the canonical key used for visited-set tracking
/// and as the page node id in the graph.
pub fn normalize_url(base: &Url, input: &str) -> String {
    let parsed = match Url::parse(input) {
        Ok(url) => url,
        Err(_) => match base.join(input) {
            Ok(url) => url,
            Err(_) => return input.to_string(),
        },
    };

    let origin = &parsed[..Position::BeforePath];

    let mut path = parsed.path().trim_end_matches('/').to_string();
    if path.is_empty() {
        path = "/".to_string();
    }

    let fragment = parsed
        .fragment()
        .map(|f| f.split('?').next().unwrap_or("").to_string())
        .unwrap_or_default();

    if fragment.is_empty() {
        format!("{origin}{path}")
    } else {
        format!("{origin}{path}#{fragment}")
    }
}

/// Extract the routing path of a URL: the hash fragment if present,
/// otherwise the path. Leading `!` and any query suffix are stripped.
pub fn fragment_path(input: &str) -> String {
    let (path, _) = split_route(input);
    path
}

fn split_route(input: &str) -> (String, Option<String>) {
    let (raw, standard_query) = match Url::parse(input) {
        Ok(parsed) => {
            let fragment = parsed.fragment().unwrap_or("");
            if fragment.is_empty() {
                (
                    parsed.path().to_string(),
                    parsed.query().map(str::to_string),
                )
            } else {
                (fragment.to_string(), None)
            }
        }
        Err(_) => (input.to_string(), None),
    };

    let raw = raw.strip_prefix('!').unwrap_or(&raw).to_string();
    match raw.split_once('?') {
        Some((path, query)) => (path.to_string(), Some(query.to_string())),
        None => (raw, standard_query),
    }
}

/// Parse query parameters from a URL, looking in both the standard query
/// string and the fragment (`#!/devices?filter=X`). Values are
/// percent-decoded; on duplicate keys the first value wins.
pub fn parse_query_string(input: &str) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    let (_, query) = split_route(input);
    if let Some(query) = query {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            params
                .entry(key.into_owned())
                .or_insert_with(|| value.into_owned());
        }
    }
    params
}

/// Extract a query-string pattern like `?filter={filter}&sort={sort}`
/// (keys sorted alphabetically). Returns `None` when the URL carries no
/// query parameters.
pub fn extract_query_pattern(input: &str) -> Option<String> {
    let params = parse_query_string(input);
    if params.is_empty() {
        return None;
    }
    let parts: Vec<String> = params.keys().map(|k| format!("{k}={{{k}}}")).collect();
    Some(format!("?{}", parts.join("&")))
}

/// Structural key for pattern-based crawl skipping.
///
/// URLs with a query string share a key when their path and query keys
/// match (`/devices?filter={filter}`); query-less URLs with two or more
/// path segments share all segments except the last (`devices`); single
/// segment paths stand alone (`/overview`).
pub fn url_structure(input: &str) -> String {
    let (path, query) = split_route(input);

    if let Some(query) = query {
        let mut keys: Vec<String> = url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, _)| k.into_owned())
            .collect();
        keys.sort();
        keys.dedup();
        let parts: Vec<String> = keys.iter().map(|k| format!("{k}={{{k}}}")).collect();
        return format!("{path}?{}", parts.join("&"));
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() >= 2 {
        segments[..segments.len() - 1].join("/")
    } else {
        path
    }
}

/// Classify a page by its routing path. Purely structural: query
/// parameters are stripped before matching, so `#!/devices?filter=X`
/// classifies identically to `#!/devices`.
pub fn classify_page(input: &str) -> &'static str {
    let path = fragment_path(input).to_lowercase();

    if path.contains("/login") {
        "login"
    } else if path.contains("/devices/") && path.split('/').count() > 2 {
        "device_details"
    } else if path.contains("/devices") {
        "device_list"
    } else if path.contains("/tasks") {
        "tasks"
    } else if path.contains("/files") {
        "files"
    } else if path.contains("/faults") {
        "faults"
    } else if path.contains("/presets") {
        "presets"
    } else if path.contains("/provisions") {
        "provisions"
    } else if path.contains("/config") {
        "config"
    } else if path.contains("/users") {
        "users"
    } else if path.contains("/admin") {
        "admin"
    } else if path == "/" || path.contains("/overview") {
        "home"
    } else {
        "unknown"
    }
}

/// Whether a link target stays inside the crawled application.
///
/// Rejects script/mailto pseudo-links, bare in-page anchors, direct file
/// downloads, and URLs pointing at a different host.
pub fn is_internal_link(base: &Url, href: &str) -> bool {
    if href.is_empty() || href.starts_with("javascript:") || href.starts_with("mailto:") {
        return false;
    }
    if href.starts_with('#') && !href.contains('/') {
        return false;
    }
    const DOWNLOAD_EXTENSIONS: [&str; 5] = [".csv", ".json", ".xml", ".pdf", ".zip"];
    if DOWNLOAD_EXTENSIONS.iter().any(|ext| href.ends_with(ext)) {
        return false;
    }

    match Url::parse(href) {
        Ok(parsed) => parsed.host_str() == base.host_str(),
        // Relative references resolve against the base and stay internal.
        Err(_) => true,
    }
}

/// Convert arbitrary text into a safe snake_case key.
pub fn sanitize_name(name: &str) -> String {
    static RE_STRIP: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"[^\w\s-]").expect("invalid strip regex"));
    static RE_SEPARATOR: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"[\s-]+").expect("invalid separator regex"));

    let stripped = RE_STRIP.replace_all(name, "");
    let joined = RE_SEPARATOR.replace_all(&stripped, "_");
    let cleaned = joined.to_lowercase();
    let cleaned = cleaned.trim_matches('_');

    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Derive a friendly page name from a URL and its classified type.
///
/// Known page types map directly (`device_list` → `device_list_page`);
/// unknown pages fall back to the full routing path so two distinct URLs
/// never share a name by accident (`admin/presets` → `admin_presets_page`).
pub fn friendly_page_name(url: &str, page_type: &str) -> String {
    if !page_type.is_empty() && page_type != "unknown" {
        return format!("{page_type}_page");
    }
    let path = fragment_path(url);
    let name = sanitize_name(&path.replace('/', "_"));
    if name == "unnamed" {
        "unknown_page".to_string()
    } else {
        format!("{name}_page")
    }
}

/// Page name derived from the routing path alone, ignoring the page type.
/// Used to disambiguate when two URLs classify to the same type.
pub fn path_page_name(url: &str) -> String {
    let path = fragment_path(url);
    let name = sanitize_name(&path.replace('/', "_"));
    if name == "unnamed" {
        "unknown_page".to_string()
    } else {
        format!("{name}_page")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://127.0.0.1:3000").unwrap()
    }

    #[test]
    fn normalize_strips_standard_query() {
        assert_eq!(
            normalize_url(&base(), "http://example.com/page?param1=a&param2=b"),
            "http://example.com/page"
        );
    }

    #[test]
    fn normalize_strips_fragment_query() {
        assert_eq!(
            normalize_url(
                &base(),
                "http://127.0.0.1:3000/#!/devices?filter=Events.Inform%20%3E%20NOW()"
            ),
            "http://127.0.0.1:3000/#!/devices"
        );
    }

    #[test]
    fn normalize_keeps_plain_fragment_url() {
        assert_eq!(
            normalize_url(&base(), "http://127.0.0.1:3000/#!/devices"),
            "http://127.0.0.1:3000/#!/devices"
        );
    }

    #[test]
    fn normalize_trims_trailing_slash() {
        assert_eq!(
            normalize_url(&base(), "http://example.com/page/"),
            "http://example.com/page"
        );
    }

    #[test]
    fn normalize_keeps_root_slash() {
        assert_eq!(
            normalize_url(&base(), "http://example.com/"),
            "http://example.com/"
        );
    }

    #[test]
    fn normalize_resolves_relative_href() {
        assert_eq!(
            normalize_url(&base(), "#!/admin/presets"),
            "http://127.0.0.1:3000/#!/admin/presets"
        );
    }

    #[test]
    fn parse_query_standard_url() {
        let params = parse_query_string("http://example.com/page?param1=value1&param2=value2");
        assert_eq!(params.get("param1").unwrap(), "value1");
        assert_eq!(params.get("param2").unwrap(), "value2");
    }

    #[test]
    fn parse_query_fragment_decodes_values() {
        let params = parse_query_string(
            "http://127.0.0.1:3000/#!/devices?filter=Events.Inform%20%3E%20NOW()",
        );
        assert!(params.get("filter").unwrap().contains("Events.Inform > NOW()"));
    }

    #[test]
    fn parse_query_empty() {
        assert!(parse_query_string("http://example.com/page").is_empty());
    }

    #[test]
    fn query_pattern_sorts_keys() {
        assert_eq!(
            extract_query_pattern("http://127.0.0.1:3000/#!/devices?filter=X&sort=name&limit=10")
                .unwrap(),
            "?filter={filter}&limit={limit}&sort={sort}"
        );
    }

    #[test]
    fn query_pattern_none_without_query() {
        assert_eq!(
            extract_query_pattern("http://127.0.0.1:3000/#!/devices"),
            None
        );
    }

    #[test]
    fn structure_groups_detail_pages() {
        let s1 = url_structure("http://127.0.0.1:3000/#!/devices/ABC123");
        let s2 = url_structure("http://127.0.0.1:3000/#!/devices/DEF456");
        assert_eq!(s1, s2);
        assert_eq!(s1, "devices");
    }

    #[test]
    fn structure_single_segment_is_full_path() {
        assert_eq!(
            url_structure("http://127.0.0.1:3000/#!/overview"),
            "/overview"
        );
    }

    #[test]
    fn structure_query_based_pattern() {
        let s1 = url_structure("http://127.0.0.1:3000/#!/devices?filter=A");
        let s2 = url_structure("http://127.0.0.1:3000/#!/devices?filter=B&filter=C");
        assert_eq!(s1, "/devices?filter={filter}");
        assert_eq!(s1, s2);
    }

    #[test]
    fn structure_multiple_query_params() {
        assert_eq!(
            url_structure("http://127.0.0.1:3000/#!/devices?filter=A&sort=name"),
            "/devices?filter={filter}&sort={sort}"
        );
    }

    #[test]
    fn structure_distinguishes_pages() {
        assert_ne!(
            url_structure("http://127.0.0.1:3000/#!/devices?filter=X"),
            url_structure("http://127.0.0.1:3000/#!/faults?filter=X")
        );
    }

    #[test]
    fn classify_is_query_invariant() {
        assert_eq!(classify_page("http://h/#!/devices"), "device_list");
        assert_eq!(classify_page("http://h/#!/devices?filter=X"), "device_list");
        assert_eq!(
            classify_page("http://h/#!/devices?filter=Y&sort=z"),
            "device_list"
        );
    }

    #[test]
    fn classify_routing_table() {
        assert_eq!(classify_page("http://h/#!/login"), "login");
        assert_eq!(classify_page("http://h/#!/devices/ABC123"), "device_details");
        assert_eq!(classify_page("http://h/#!/admin/presets"), "presets");
        assert_eq!(classify_page("http://h/#!/overview"), "home");
        assert_eq!(classify_page("http://h/"), "home");
        assert_eq!(classify_page("http://h/#!/something-else"), "unknown");
    }

    #[test]
    fn internal_link_rules() {
        let base = base();
        assert!(is_internal_link(&base, "#!/devices"));
        assert!(is_internal_link(&base, "http://127.0.0.1:3000/#!/faults"));
        assert!(!is_internal_link(&base, "javascript:void(0)"));
        assert!(!is_internal_link(&base, "mailto:a@b.c"));
        assert!(!is_internal_link(&base, "#top"));
        assert!(!is_internal_link(&base, "/export/data.csv"));
        assert!(!is_internal_link(&base, "http://other-host/#!/devices"));
    }

    #[test]
    fn sanitize_names() {
        assert_eq!(sanitize_name("Log out"), "log_out");
        assert_eq!(sanitize_name("Add Device!"), "add_device");
        assert_eq!(sanitize_name("  --  "), "unnamed");
        assert_eq!(sanitize_name("btn-save-config"), "btn_save_config");
    }

    #[test]
    fn friendly_names() {
        assert_eq!(
            friendly_page_name("http://h/#!/devices", "device_list"),
            "device_list_page"
        );
        assert_eq!(
            friendly_page_name("http://h/#!/admin/presets", "unknown"),
            "admin_presets_page"
        );
        assert_eq!(path_page_name("http://h/#!/admin/presets"), "admin_presets_page");
    }
}
