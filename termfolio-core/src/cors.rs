//! Origin allow-listing
//!
//! Request origins are checked against a static list of exact origins plus
//! regex patterns (wildcard-subdomain rules for preview deployments). A
//! request without an Origin header is same-origin and always allowed; the
//! allow-origin response header is only ever set for a matched cross-origin
//! request, never for anything else.

use regex::Regex;

use crate::config::CorsConfig;
use crate::error::{Error, Result};

/// Methods advertised on CORS responses.
pub const ALLOW_METHODS: &str = "GET, POST, OPTIONS";

/// Request headers advertised on CORS responses.
pub const ALLOW_HEADERS: &str = "Content-Type";

/// Preflight cache lifetime, in seconds.
pub const MAX_AGE: &str = "86400";

/// Compiled origin allow-list.
pub struct OriginPolicy {
    exact: Vec<String>,
    patterns: Vec<Regex>,
}

impl OriginPolicy {
    pub fn new(exact: Vec<String>, patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p)
                    .map_err(|e| Error::Config(format!("invalid origin pattern {:?}: {}", p, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { exact, patterns })
    }

    pub fn from_config(config: &CorsConfig) -> Result<Self> {
        Self::new(config.allowed_origins.clone(), &config.origin_patterns)
    }

    /// Whether a request carrying this Origin header may be served with CORS
    /// headers. `None` means same-origin.
    pub fn is_allowed(&self, origin: Option<&str>) -> bool {
        let Some(origin) = origin else {
            return true;
        };
        self.exact.iter().any(|o| o == origin)
            || self.patterns.iter().any(|p| p.is_match(origin))
    }

    /// The value for `Access-Control-Allow-Origin`, or None when the header
    /// must not be set (same-origin request or disallowed origin).
    pub fn allow_origin<'a>(&self, origin: Option<&'a str>) -> Option<&'a str> {
        origin.filter(|o| self.is_allowed(Some(o)))
    }
}
