use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a variable is present but cannot be parsed.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files. Useful for testing
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if a variable is present but cannot be parsed.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Every variable is optional; this function only fails on values that are
/// present but malformed.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        let raw = or_default(var, default);
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(invalid(var, format!("expected a boolean, got \"{raw}\""))),
        }
    };

    let env = parse_environment(&or_default("TABLESCOUT_ENV", "development"))?;
    let log_level = or_default("TABLESCOUT_LOG_LEVEL", "info");
    let site_profile_path = lookup("TABLESCOUT_SITE_PROFILE_PATH")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from);

    let request_timeout_secs = parse_u64("TABLESCOUT_REQUEST_TIMEOUT_SECS", "30")?;
    let content_ready_timeout_secs = parse_u64("TABLESCOUT_CONTENT_READY_TIMEOUT_SECS", "30")?;
    let user_agent = lookup("TABLESCOUT_USER_AGENT")
        .ok()
        .filter(|s| !s.trim().is_empty());
    let inter_request_delay_ms = parse_u64("TABLESCOUT_INTER_REQUEST_DELAY_MS", "250")?;

    let default_page_size = parse_usize("TABLESCOUT_DEFAULT_PAGE_SIZE", "50")?;
    if default_page_size == 0 {
        return Err(invalid(
            "TABLESCOUT_DEFAULT_PAGE_SIZE",
            "must be greater than zero".to_string(),
        ));
    }

    let stall_threshold = parse_u32("TABLESCOUT_STALL_THRESHOLD", "2")?;
    if stall_threshold == 0 {
        return Err(invalid(
            "TABLESCOUT_STALL_THRESHOLD",
            "must be greater than zero".to_string(),
        ));
    }

    let max_scrolls = parse_u32("TABLESCOUT_MAX_SCROLLS", "20")?;
    let dom_fallback_enabled = parse_bool("TABLESCOUT_DOM_FALLBACK", "false")?;
    let max_concurrent_queries = parse_usize("TABLESCOUT_MAX_CONCURRENT_QUERIES", "1")?;

    Ok(AppConfig {
        env,
        log_level,
        site_profile_path,
        request_timeout_secs,
        content_ready_timeout_secs,
        user_agent,
        inter_request_delay_ms,
        default_page_size,
        stall_threshold,
        max_scrolls,
        dom_fallback_enabled,
        max_concurrent_queries,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "TABLESCOUT_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
