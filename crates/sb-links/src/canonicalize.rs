//! URL canonicalization: the same logical URL should hash to the same
//! cache key and crawl-queue document id regardless of how it was typed
//! or which tracking parameters a sharer's client tacked on.

use url::Url;

use crate::error::LinkError;

const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "dclid", "yclid", "gbraid", "wbraid", "mc_cid", "mc_eid", "igshid", "_ga",
    "_gl",
];

fn is_tracking_param(name: &str) -> bool {
    name.starts_with("utm_") || TRACKING_PARAMS.contains(&name)
}

/// Canonicalize a URL: lowercase scheme/host, strip the default port for
/// that scheme, drop the fragment, remove tracking query parameters,
/// and drop a trailing slash from multi-segment paths.
///
/// # Errors
/// Returns [`LinkError::InvalidUrl`] if `raw` doesn't parse as a URL.
pub fn canonicalize_url(raw: &str) -> Result<String, LinkError> {
    let mut url = Url::parse(raw).map_err(|_| LinkError::InvalidUrl(raw.to_owned()))?;

    url.set_fragment(None);

    let default_port = match url.scheme() {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    };
    if url.port() == default_port {
        let _ = url.set_port(None);
    }

    let filtered: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| !is_tracking_param(name))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    if filtered.is_empty() {
        url.set_query(None);
    } else {
        let query = filtered
            .iter()
            .map(|(name, value)| {
                if value.is_empty() {
                    name.clone()
                } else {
                    format!("{name}={value}")
                }
            })
            .collect::<Vec<_>>()
            .join("&");
        url.set_query(Some(&query));
    }

    let path = url.path().to_owned();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    Ok(url.as_str().to_owned())
}

/// The registrable host, lowercased, for domain allow/deny matching.
///
/// # Errors
/// Returns [`LinkError::InvalidUrl`] if `raw` doesn't parse as a URL or
/// has no host component.
pub fn extract_domain(raw: &str) -> Result<String, LinkError> {
    let url = Url::parse(raw).map_err(|_| LinkError::InvalidUrl(raw.to_owned()))?;
    url.host_str()
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| LinkError::InvalidUrl(raw.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_default_ports() {
        assert_eq!(
            canonicalize_url("https://Example.com:443/path").unwrap(),
            "https://example.com/path"
        );
        assert_eq!(
            canonicalize_url("http://example.com:80/path").unwrap(),
            "http://example.com/path"
        );
    }

    #[test]
    fn keeps_non_default_ports() {
        assert_eq!(
            canonicalize_url("https://example.com:8443/path").unwrap(),
            "https://example.com:8443/path"
        );
    }

    #[test]
    fn drops_fragment_and_tracking_params() {
        let canonical =
            canonicalize_url("https://example.com/a?utm_source=tg&fbclid=xyz&id=7#section")
                .unwrap();
        assert_eq!(canonical, "https://example.com/a?id=7");
    }

    #[test]
    fn drops_query_entirely_when_only_tracking_params() {
        assert_eq!(
            canonicalize_url("https://example.com/a?utm_source=tg&gclid=xyz").unwrap(),
            "https://example.com/a"
        );
    }

    #[test]
    fn removes_trailing_slash_from_multi_segment_paths() {
        assert_eq!(
            canonicalize_url("https://example.com/a/b/").unwrap(),
            "https://example.com/a/b"
        );
    }

    #[test]
    fn preserves_pathless_root() {
        assert_eq!(canonicalize_url("https://example.com").unwrap(), "https://example.com/");
    }

    #[test]
    fn is_idempotent() {
        let once = canonicalize_url("https://Example.com:443/a/b/?utm_source=x&id=1#frag").unwrap();
        let twice = canonicalize_url(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn preserves_scheme() {
        assert!(canonicalize_url("http://example.com/a").unwrap().starts_with("http://"));
        assert!(canonicalize_url("https://example.com/a").unwrap().starts_with("https://"));
    }
}
