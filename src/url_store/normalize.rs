//! URL normalization (§4.2). Applied on every ingestion so the same logical
//! URL always maps to the same store key, however it was spelled.

use once_cell::sync::Lazy;
use std::collections::HashSet;
use url::Url;

/// Query parameters stripped because they only affect attribution/tracking,
/// never the resource identified.
static TRACKING_PARAM_PREFIXES: &[&str] = &["utm_"];
static TRACKING_PARAMS_EXACT: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["fbclid", "gclid", "msclkid", "mc_eid", "mc_cid", "ref", "ref_src"]
        .into_iter()
        .collect()
});

/// Normalize a URL to its canonical store key. Returns `None` for strings
/// that do not parse as an absolute URL — invalid URLs are simply not
/// stored (§4.2).
pub fn normalize_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;

    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }

    // Lowercase scheme/host.
    let host = url.host_str()?.to_ascii_lowercase();
    url.set_host(Some(&host)).ok()?;

    // Strip default ports.
    let default_port = match url.scheme() {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    };
    if url.port() == default_port {
        url.set_port(None).ok()?;
    }

    // Remove fragment.
    url.set_fragment(None);

    // Remove tracking query params, keep the rest in stable order.
    let kept_pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept_pairs.is_empty() {
        url.set_query(None);
    } else {
        let query = kept_pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        url.set_query(Some(&query));
    }

    // Collapse duplicate slashes in the path, decode unreserved percent
    // escapes via Url's own normalization, then trim a trailing slash
    // unless the path is exactly "/".
    let collapsed = collapse_duplicate_slashes(url.path());
    let trimmed = if collapsed.len() > 1 && collapsed.ends_with('/') {
        collapsed.trim_end_matches('/').to_string()
    } else {
        collapsed
    };
    url.set_path(&trimmed);

    Some(url.to_string())
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAM_PREFIXES
        .iter()
        .any(|prefix| key.starts_with(prefix))
        || TRACKING_PARAMS_EXACT.contains(key)
}

fn collapse_duplicate_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_was_slash = false;
    for c in path.chars() {
        if c == '/' {
            if prev_was_slash {
                continue;
            }
            prev_was_slash = true;
        } else {
            prev_was_slash = false;
        }
        out.push(c);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Extract the (already-lowercased) hostname from a normalized URL.
pub fn hostname_of(normalized_url: &str) -> Option<String> {
    Url::parse(normalized_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_host_strips_default_port_fragment_and_tracking_params() {
        let a = normalize_url("HTTP://Example.com:80/a/?utm_source=x#frag").unwrap();
        let b = normalize_url("http://example.com/a/").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "http://example.com/a");
    }

    #[test]
    fn keeps_trailing_slash_for_root_path() {
        let normalized = normalize_url("https://example.com").unwrap();
        assert_eq!(normalized, "https://example.com/");
    }

    #[test]
    fn collapses_duplicate_slashes() {
        let normalized = normalize_url("https://example.com/a//b///c").unwrap();
        assert_eq!(normalized, "https://example.com/a/b/c");
    }

    #[test]
    fn keeps_non_tracking_query_params() {
        let normalized = normalize_url("https://example.com/search?q=rust&utm_campaign=x").unwrap();
        assert_eq!(normalized, "https://example.com/search?q=rust");
    }

    #[test]
    fn rejects_non_http_schemes_and_garbage() {
        assert!(normalize_url("not a url").is_none());
        assert!(normalize_url("ftp://example.com/file").is_none());
        assert!(normalize_url("mailto:a@b.com").is_none());
    }

    #[test]
    fn hostname_of_extracts_lowercased_host() {
        let normalized = normalize_url("https://Example.COM/a").unwrap();
        assert_eq!(hostname_of(&normalized).unwrap(), "example.com");
    }
}
