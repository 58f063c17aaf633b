//! Turning address-bar input into a destination and a display title.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::registry::NEW_TAB_TITLE;

static URL_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(https?://|www\.|\.)").expect("valid url prefix regex"));
static URL_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(com|org|net|ru|xyz)$").expect("valid url suffix regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Url(String),
    Search(String),
}

impl Destination {
    pub fn url(&self) -> &str {
        match self {
            Destination::Url(u) | Destination::Search(u) => u,
        }
    }
}

pub fn looks_like_url(input: &str) -> bool {
    URL_PREFIX.is_match(input) || URL_SUFFIX.is_match(input)
}

/// Classify raw input: URL-like text gets an `https://` scheme if it has none,
/// everything else becomes a query against `search_endpoint`.
pub fn classify_input(input: &str, search_endpoint: &str) -> Destination {
    let input = input.trim();
    if looks_like_url(input) {
        if input.starts_with("http") {
            Destination::Url(input.to_string())
        } else {
            Destination::Url(format!("https://{}", input))
        }
    } else {
        Destination::Search(format!("{}{}", search_endpoint, urlencoding::encode(input)))
    }
}

/// Hostname for full URLs, the raw text otherwise, "New Tab" when a URL won't parse.
pub fn domain_title(target: &str) -> String {
    if !target.starts_with("http") {
        return target.to_string();
    }
    Url::parse(target)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| NEW_TAB_TITLE.to_string())
}

/// Whether a new tab should load `target` directly instead of the blank page.
pub fn is_loadable(target: &str) -> bool {
    target.starts_with("http") || target.starts_with("about:")
}

/// `<origin>/favicon.ico` for a loaded page URL.
pub fn fallback_favicon(page_url: &str) -> Option<String> {
    let url = Url::parse(page_url).ok()?;
    let origin = url.origin();
    if !origin.is_tuple() {
        return None;
    }
    Some(format!("{}/favicon.ico", origin.ascii_serialization()))
}
