use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Runtime settings for a scrape run, read from `TABLESCOUT_*` env vars.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    /// YAML site profile; the built-in profile is used when `None`.
    pub site_profile_path: Option<PathBuf>,
    pub request_timeout_secs: u64,
    /// How long to wait for the rendering collaborator's content-ready signal.
    pub content_ready_timeout_secs: u64,
    /// Fixed user agent. When `None` the HTTP client rotates browser UAs.
    pub user_agent: Option<String>,
    pub inter_request_delay_ms: u64,
    /// Page size assumed when the captured template carries no size field.
    pub default_page_size: usize,
    /// Consecutive zero-new pages tolerated before pagination stops.
    pub stall_threshold: u32,
    pub max_scrolls: u32,
    pub dom_fallback_enabled: bool,
    pub max_concurrent_queries: usize,
}
