//! URL origin and host helpers for request headers and log fields.

/// Scheme+host(+port) origin of `url`.
///
/// Given `"https://www.opentable.com/dapi/fe/gql?x=1"`, returns
/// `"https://www.opentable.com"`. Unparseable input falls back to the first
/// three `/`-separated parts.
#[must_use]
pub fn extract_origin(url: &str) -> String {
    reqwest::Url::parse(url).map_or_else(
        |e| {
            tracing::warn!(url, error = %e, "could not parse url; splitting for origin");
            url.trim_end_matches('/')
                .splitn(4, '/')
                .take(3)
                .collect::<Vec<_>>()
                .join("/")
        },
        |u| u.origin().ascii_serialization(),
    )
}

/// Hostname of `url` for log fields; the whole string if it does not parse.
pub(crate) fn extract_host(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_else(|| url.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_drops_path_and_query() {
        assert_eq!(
            extract_origin("https://www.opentable.com/dapi/fe/gql?optype=query"),
            "https://www.opentable.com"
        );
    }

    #[test]
    fn origin_keeps_non_default_port() {
        assert_eq!(extract_origin("http://127.0.0.1:8080/graphql"), "http://127.0.0.1:8080");
    }

    #[test]
    fn origin_falls_back_to_split() {
        assert_eq!(extract_origin("no-scheme/a/b/c"), "no-scheme/a/b");
    }

    #[test]
    fn host_falls_back_to_input() {
        assert_eq!(extract_host("https://www.opentable.com/s"), "www.opentable.com");
        assert_eq!(extract_host("garbage"), "garbage");
    }
}
