use reqwest::{Client, Proxy};
use std::time::Duration;
use tracing::{info, warn};

/// Build the shared reqwest client for a provider.
///
/// With `proxy` unset reqwest falls back to `HTTPS_PROXY`/`HTTP_PROXY`.
pub fn build_http_client(proxy: Option<&str>, api_base: &str, timeout: Duration) -> Client {
    let mut builder = Client::builder().timeout(timeout);

    if let Some(proxy_url) = proxy.filter(|p| !p.is_empty()) {
        match Proxy::all(proxy_url) {
            Ok(p) => {
                info!(proxy = %proxy_url, api_base = %api_base, "Provider using proxy");
                builder = builder.proxy(p);
            }
            Err(e) => {
                warn!(error = %e, proxy = %proxy_url, "Invalid proxy URL, falling back to direct connect");
            }
        }
    }

    builder.build().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to build HTTP client, using default");
        Client::new()
    })
}

/// Find the largest byte index <= `max_bytes` that is a valid char boundary.
pub(crate) fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> usize {
    if max_bytes >= s.len() {
        return s.len();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}
