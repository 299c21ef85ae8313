use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    #[error("no pagination field could be set for page {page}")]
    NoPaginationField { page: u32 },

    #[error("invalid template URL \"{url}\": {reason}")]
    InvalidTemplateUrl { url: String, reason: String },

    #[error("invalid site profile: {reason}")]
    InvalidProfile { reason: String },
}
