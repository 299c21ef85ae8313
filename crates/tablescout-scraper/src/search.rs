//! Initial search page URL.

use reqwest::Url;
use tablescout_core::{SearchQuery, SiteProfile};

use crate::error::ScraperError;

/// The URL the rendering collaborator should open for `query`.
///
/// An explicit `start_url` wins. Otherwise the site's search page is used
/// with `dateTime`, `covers` and `term` parameters.
///
/// # Errors
///
/// Returns [`ScraperError::InvalidProfile`] when the profile's search URL
/// does not parse, or [`ScraperError::InvalidTemplateUrl`] when the start
/// URL does not.
pub fn search_url(profile: &SiteProfile, query: &SearchQuery) -> Result<String, ScraperError> {
    if let Some(start) = &query.start_url {
        let url = Url::parse(start).map_err(|e| ScraperError::InvalidTemplateUrl {
            url: start.clone(),
            reason: e.to_string(),
        })?;
        return Ok(url.to_string());
    }

    let base = profile.search_base_url();
    let mut url = Url::parse(&base).map_err(|e| ScraperError::InvalidProfile {
        reason: format!("search url \"{base}\" is invalid: {e}"),
    })?;
    {
        let mut params = url.query_pairs_mut();
        if let Some(date_time) = query.date_time_param() {
            params.append_pair("dateTime", &date_time);
        }
        params.append_pair("covers", &query.party_size.to_string());
        if let Some(location) = &query.location {
            params.append_pair("term", location);
        }
    }
    Ok(url.to_string())
}
