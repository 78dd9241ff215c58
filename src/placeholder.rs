use reqwest::Url;

/// Substrings that mark a config value as an unfilled template
pub const PLACEHOLDER_MARKERS: &[&str] = &["YOUR_", "REPLACE_"];

/// True when the value is empty or still carries a template marker
pub fn is_placeholder(value: &str) -> bool {
    if value.trim().is_empty() {
        return true;
    }
    PLACEHOLDER_MARKERS.iter().any(|marker| value.contains(marker))
}

/// Strip a single trailing slash so paths can be appended with `/`
pub fn normalize_url(value: &str) -> String {
    let trimmed = value.trim();
    trimmed.strip_suffix('/').unwrap_or(trimmed).to_string()
}

/// Serialize a URL whose query was built with `query_pairs_mut`, with spaces
/// as `%20` instead of `+`. A literal `+` is already encoded as `%2B`.
pub fn to_uri_string(url: &Url) -> String {
    match url.query() {
        Some(query) if query.contains('+') => {
            let mut url = url.clone();
            url.set_query(Some(&query.replace('+', "%20")));
            url.to_string()
        }
        _ => url.to_string(),
    }
}
