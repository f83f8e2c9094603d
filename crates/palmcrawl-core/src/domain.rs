//! Reputable-domain allow-list and url canonicalization.
//!
//! Both link admission and the quality gate's source check go through
//! [`AllowList`], so a page can only be stored if it could also have been
//! discovered.

use url::Url;

/// Allow-list of reputable hosts.
///
/// A host matches when it equals an allow-listed domain or is a subdomain of
/// one (`www.nature.com` matches `nature.com`, `notnature.com` does not).
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    domains: Vec<String>,
}

impl AllowList {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut domains: Vec<String> = domains
            .into_iter()
            .map(|d| d.as_ref().trim().trim_end_matches('.').to_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        domains.sort();
        domains.dedup();
        Self { domains }
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Check a bare host name against the list.
    pub fn contains_host(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_lowercase();
        self.domains.iter().any(|domain| {
            host == *domain
                || (host.len() > domain.len()
                    && host.ends_with(domain.as_str())
                    && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
        })
    }

    /// Check the host of a url; unparsable urls are never allowed.
    pub fn allows_url(&self, url: &str) -> bool {
        host_of(url).is_some_and(|host| self.contains_host(&host))
    }
}

/// Lowercased host of an absolute url.
pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed.host_str().map(|h| h.to_lowercase())
}

/// Canonicalize an absolute http(s) url and strip its fragment.
///
/// Returns `None` for unparsable urls and other schemes.
pub fn canonicalize(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    parsed.set_fragment(None);
    Some(parsed.into())
}

/// Resolve an `href` against the page it was found on.
///
/// Drops `mailto:`, `javascript:` and other non-http(s) targets as well as
/// the fragment.
pub fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let mut joined = base.join(href).ok()?;
    if !matches!(joined.scheme(), "http" | "https") {
        return None;
    }
    joined.set_fragment(None);
    Some(joined.into())
}
