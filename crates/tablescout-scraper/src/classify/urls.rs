//! URL canonicalization for listing links and images.

use reqwest::Url;

/// How image URLs on the site's CDN are rewritten.
#[derive(Debug, Clone, Default)]
pub(crate) struct ImageRule {
    pub(crate) cdn_host_suffix: Option<String>,
    /// Contains `{asset_id}`.
    pub(crate) canonical_template: Option<String>,
    pub(crate) default_extension: String,
}

/// Resize paths carry the asset id as a bare numeric segment; shorter
/// numbers are size or version markers.
const MIN_ASSET_ID_DIGITS: usize = 4;

/// Canonicalize a link found in page data.
///
/// - absolute `http(s)` URLs pass through (fragment removed),
/// - protocol-relative `//host/...` gets `https:`,
/// - site-root-relative `/path` gets `origin`,
/// - anything else (`javascript:`, bare words, `mailto:`) is rejected.
pub(crate) fn normalize_url(raw: &str, origin: &str) -> Option<String> {
    let raw = raw.trim();
    let absolute = if raw.starts_with("https://") || raw.starts_with("http://") {
        raw.to_string()
    } else if let Some(rest) = raw.strip_prefix("//") {
        format!("https://{rest}")
    } else if raw.starts_with('/') {
        format!("{}{raw}", origin.trim_end_matches('/'))
    } else {
        return None;
    };

    let mut url = Url::parse(&absolute).ok()?;
    url.host_str()?;
    url.set_fragment(None);
    Some(url.to_string())
}

/// Canonicalize an image URL.
///
/// CDN resize URLs are rewritten to the canonical large variant keyed by
/// their numeric asset id. Other images get the default extension when
/// their last path segment has none.
pub(crate) fn normalize_image_url(raw: &str, origin: &str, rule: &ImageRule) -> Option<String> {
    let mut url = Url::parse(&normalize_url(raw, origin)?).ok()?;

    if let (Some(suffix), Some(template)) = (&rule.cdn_host_suffix, &rule.canonical_template) {
        let on_cdn = url
            .host_str()
            .is_some_and(|host| host == suffix || host.ends_with(&format!(".{suffix}")));
        if on_cdn {
            if let Some(asset_id) = cdn_asset_id(&url) {
                return Some(template.replace("{asset_id}", &asset_id));
            }
        }
    }

    let last_segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("")
        .to_string();
    if !last_segment.is_empty() && !last_segment.contains('.') {
        let path = format!("{}.{}", url.path(), rule.default_extension);
        url.set_path(&path);
    }
    Some(url.to_string())
}

/// The last purely numeric path segment (extension ignored) long enough to
/// be an asset id.
fn cdn_asset_id(url: &Url) -> Option<String> {
    url.path_segments()?
        .rev()
        .map(|segment| segment.split('.').next().unwrap_or(segment))
        .find(|stem| stem.len() >= MIN_ASSET_ID_DIGITS && stem.bytes().all(|b| b.is_ascii_digit()))
        .map(str::to_string)
}
