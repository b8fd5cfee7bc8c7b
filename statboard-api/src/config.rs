//! API Configuration Module
//!
//! CORS, request limits, pagination bounds, registry cache TTL and the
//! optional ingest token. Loaded from environment variables with defaults
//! suitable for local development.

use secrecy::SecretString;
use statboard_core::{PageLimits, DEFAULT_MAX_BATCH_LEN};
use std::time::Duration;

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    // ========================================================================
    // CORS Configuration
    // ========================================================================
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    // ========================================================================
    // Request Limits
    // ========================================================================
    /// Per-request timeout. The only cancellation signal for ingest.
    pub request_timeout: Duration,

    /// Largest accepted request body in bytes.
    pub max_body_bytes: usize,

    /// Largest accepted number of entries in one ingest batch.
    pub max_batch_len: usize,

    /// Leaderboard page size bounds.
    pub page_limits: PageLimits,

    // ========================================================================
    // Registry Cache
    // ========================================================================
    /// Age after which the table router reloads the column registry.
    /// Zero disables age-based reloads.
    pub registry_ttl: Duration,

    // ========================================================================
    // Ingest Authentication
    // ========================================================================
    /// Bearer token required on write routes. `None` leaves them open.
    pub ingest_token: Option<SecretString>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            cors_max_age_secs: 86400,
            request_timeout: Duration::from_secs(30),
            max_body_bytes: 2 * 1024 * 1024,
            max_batch_len: DEFAULT_MAX_BATCH_LEN,
            page_limits: PageLimits::default(),
            registry_ttl: Duration::from_secs(300),
            ingest_token: None,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `STATBOARD_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `STATBOARD_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `STATBOARD_REQUEST_TIMEOUT_SECS`: Request timeout (default: 30)
    /// - `STATBOARD_MAX_BODY_BYTES`: Body size limit (default: 2 MiB)
    /// - `STATBOARD_MAX_BATCH_LEN`: Entries per ingest batch (default: 1000)
    /// - `STATBOARD_DEFAULT_PAGE_SIZE`: Leaderboard page size (default: 10)
    /// - `STATBOARD_MAX_PAGE_SIZE`: Leaderboard page size cap (default: 100)
    /// - `STATBOARD_REGISTRY_TTL_SECS`: Column registry cache TTL (default: 300)
    /// - `STATBOARD_INGEST_TOKEN`: Bearer token for write routes (default: unset)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cors_origins = std::env::var("STATBOARD_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let default_page_size = env_parse(
            "STATBOARD_DEFAULT_PAGE_SIZE",
            defaults.page_limits.default_page_size,
        );
        let max_page_size = env_parse("STATBOARD_MAX_PAGE_SIZE", defaults.page_limits.max_page_size);

        let ingest_token = std::env::var("STATBOARD_INGEST_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .map(SecretString::from);

        Self {
            cors_origins,
            cors_max_age_secs: env_parse("STATBOARD_CORS_MAX_AGE_SECS", defaults.cors_max_age_secs),
            request_timeout: Duration::from_secs(env_parse(
                "STATBOARD_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )),
            max_body_bytes: env_parse("STATBOARD_MAX_BODY_BYTES", defaults.max_body_bytes),
            max_batch_len: env_parse("STATBOARD_MAX_BATCH_LEN", defaults.max_batch_len),
            page_limits: PageLimits {
                default_page_size: default_page_size.clamp(1, max_page_size.max(1)),
                max_page_size: max_page_size.max(1),
            },
            registry_ttl: Duration::from_secs(env_parse(
                "STATBOARD_REGISTRY_TTL_SECS",
                defaults.registry_ttl.as_secs(),
            )),
            ingest_token,
        }
    }

    /// Check if running in production mode (strict CORS).
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            // Wildcard subdomains: *.example.com
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain.ends_with(&format!(".{}", pattern))
                        || origin_domain == pattern;
                }
            }
            false
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

// ============================================================================
// BIND ADDRESS
// ============================================================================

/// Listen address from `STATBOARD_API_BIND` and `PORT` / `STATBOARD_API_PORT`.
pub fn bind_address() -> String {
    let host = std::env::var("STATBOARD_API_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORT")
        .or_else(|_| std::env::var("STATBOARD_API_PORT"))
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(3000);
    format!("{}:{}", host, port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert!(config.cors_origins.is_empty());
        assert_eq!(config.max_batch_len, 1000);
        assert_eq!(config.page_limits.default_page_size, 10);
        assert_eq!(config.page_limits.max_page_size, 100);
        assert_eq!(config.registry_ttl, Duration::from_secs(300));
        assert!(config.ingest_token.is_none());
    }

    #[test]
    fn test_is_production() {
        let mut config = ApiConfig::default();
        assert!(!config.is_production());

        config.cors_origins = vec!["https://stats.example.com".to_string()];
        assert!(config.is_production());
    }

    #[test]
    fn test_origin_allowed_dev_mode() {
        let config = ApiConfig::default();
        assert!(config.is_origin_allowed("https://anything.com"));
        assert!(config.is_origin_allowed("http://localhost:3000"));
    }

    #[test]
    fn test_origin_allowed_production() {
        let config = ApiConfig {
            cors_origins: vec![
                "https://example.com".to_string(),
                "*.example.com".to_string(),
            ],
            ..Default::default()
        };

        assert!(config.is_origin_allowed("https://example.com"));
        assert!(config.is_origin_allowed("https://stats.example.com"));
        assert!(!config.is_origin_allowed("https://evilexample.com"));
        assert!(!config.is_origin_allowed("https://other.org"));
    }
}
