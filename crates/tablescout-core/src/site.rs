//! Per-site extraction profile.
//!
//! The profile carries everything site-specific the engine needs: the
//! origin used to absolutize relative links, the hydration namespaces and
//! nested paths to search first, the RPC path markers that make an outbound
//! call eligible for template capture, and the image CDN rewrite rule.
//! Fields missing from a YAML profile fall back to the built-in defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    /// Scheme + host, no trailing slash (e.g. `https://www.opentable.com`).
    pub origin: String,
    pub search_path: String,
    /// Global hydration objects captured from the rendered page.
    pub hydration_namespaces: Vec<String>,
    /// Dot paths, relative to a namespace root, searched for listing arrays.
    pub state_paths: Vec<String>,
    /// Dot paths searched inside intercepted or replayed API response bodies.
    pub response_paths: Vec<String>,
    /// Sibling fields of a listing array that report the source's total.
    pub total_count_fields: Vec<String>,
    /// URL path fragments identifying RPC-style calls worth templating.
    pub rpc_path_markers: Vec<String>,
    /// Path template for synthesizing a profile URL from an identity.
    /// Must contain `{id}`.
    pub profile_url_template: Option<String>,
    /// Host suffix of the image CDN whose resize paths get canonicalized.
    pub image_cdn_host_suffix: Option<String>,
    /// Canonical large-size image URL. Must contain `{asset_id}`.
    pub image_canonical_template: Option<String>,
    /// Extension appended to image paths that have none.
    pub default_image_extension: String,
}

impl Default for SiteProfile {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect();
        Self {
            origin: "https://www.opentable.com".to_string(),
            search_path: "/s".to_string(),
            hydration_namespaces: strings(&[
                "__INITIAL_STATE__",
                "__APOLLO_STATE__",
                "__NEXT_DATA__",
                "__PRELOADED_STATE__",
            ]),
            state_paths: strings(&[
                "lolzViewAll.searchResults.restaurants",
                "search.results",
                "search.restaurants",
                "searchResults.restaurants",
                "data.search.results",
                "availability.restaurants",
                "discovery.restaurants",
                "props.pageProps.searchResults.restaurants",
            ]),
            response_paths: strings(&[
                "data.search.results",
                "data.search.restaurants",
                "data.restaurantSearch.restaurants",
                "data.availability.restaurants",
                "data.restaurantsAvailability",
                "data.restaurants",
                "results",
                "restaurants",
            ]),
            total_count_fields: strings(&[
                "totalRestaurantCount",
                "totalResults",
                "totalCount",
                "total",
                "resultCount",
            ]),
            rpc_path_markers: strings(&["/dapi/fe/gql", "/graphql", "/gql"]),
            profile_url_template: Some("/r/{id}".to_string()),
            image_cdn_host_suffix: Some("otstatic.com".to_string()),
            image_canonical_template: Some(
                "https://resizer.otstatic.com/v2/photos/xlarge/1/{asset_id}.jpg".to_string(),
            ),
            default_image_extension: "jpg".to_string(),
        }
    }
}

impl SiteProfile {
    /// Absolute search page URL without query parameters.
    #[must_use]
    pub fn search_base_url(&self) -> String {
        format!("{}{}", self.origin.trim_end_matches('/'), self.search_path)
    }
}

/// Load and validate a site profile from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_site_profile(path: &Path) -> Result<SiteProfile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ProfileFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_site_profile(&content)
}

/// Parse and validate a site profile from YAML text.
///
/// # Errors
///
/// Returns `ConfigError` if the text cannot be parsed or fails validation.
pub fn parse_site_profile(content: &str) -> Result<SiteProfile, ConfigError> {
    let profile: SiteProfile = serde_yaml::from_str(content)?;
    validate_site_profile(&profile)?;
    Ok(profile)
}

fn validate_site_profile(profile: &SiteProfile) -> Result<(), ConfigError> {
    let origin = profile.origin.trim();
    if !(origin.starts_with("https://") || origin.starts_with("http://")) {
        return Err(ConfigError::Validation(format!(
            "site origin \"{origin}\" must be an absolute http(s) URL"
        )));
    }
    if origin.trim_end_matches('/').matches('/').count() > 2 {
        return Err(ConfigError::Validation(format!(
            "site origin \"{origin}\" must not contain a path"
        )));
    }

    if !profile.search_path.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "search_path \"{}\" must start with '/'",
            profile.search_path
        )));
    }

    if profile.state_paths.is_empty() && profile.response_paths.is_empty() {
        return Err(ConfigError::Validation(
            "at least one state_path or response_path is required".to_string(),
        ));
    }

    if let Some(template) = &profile.profile_url_template {
        if !template.contains("{id}") {
            return Err(ConfigError::Validation(format!(
                "profile_url_template \"{template}\" is missing the {{id}} placeholder"
            )));
        }
    }

    if let Some(template) = &profile.image_canonical_template {
        if !template.contains("{asset_id}") {
            return Err(ConfigError::Validation(format!(
                "image_canonical_template \"{template}\" is missing the {{asset_id}} placeholder"
            )));
        }
    }

    if profile.default_image_extension.trim().is_empty()
        || profile.default_image_extension.contains('.')
    {
        return Err(ConfigError::Validation(
            "default_image_extension must be a bare extension such as \"jpg\"".to_string(),
        ));
    }

    Ok(())
}
