//! Sliding-window rate limiting over the Upstash Redis REST API
//!
//! Each admission runs one pipelined command batch against the shared store:
//! prune the window, record the request, count the window, refresh the TTL.
//! Any transport or shape error fails open — the request is admitted and the
//! failure is logged — because availability beats strictness for this
//! endpoint.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::json;

use crate::config::RateLimitConfig;
use crate::error::{Error, Result};
use crate::types::RateDecision;

use super::RateLimitBackend;

/// One command result in an Upstash pipeline response.
#[derive(Debug, Deserialize)]
struct PipelineResult {
    #[serde(default)]
    result: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
}

/// Shared-store sliding-window limiter.
pub struct UpstashRateLimiter {
    http_client: reqwest::Client,
    base_url: String,
    prefix: String,
    max_requests: u32,
    window: Duration,
}

impl UpstashRateLimiter {
    /// Create a limiter from configuration.
    ///
    /// Returns an error if the Upstash credentials are missing or malformed.
    pub fn new(config: &RateLimitConfig) -> Result<Self> {
        let base_url = config
            .upstash_url
            .clone()
            .ok_or_else(|| Error::Config("rate_limit.upstash_url is required".to_string()))?
            .trim_end_matches('/')
            .to_string();

        let token = config
            .upstash_token
            .clone()
            .ok_or_else(|| Error::Config("rate_limit.upstash_token is required".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth_value = format!("Bearer {}", token);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value)
                .map_err(|e| Error::Config(format!("invalid upstash_token: {}", e)))?,
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
            prefix: config.redis_prefix.clone(),
            max_requests: config.max_requests,
            window: Duration::from_secs(config.window_secs),
        })
    }

    /// Run the sliding-window pipeline and return the request count inside
    /// the current window, this request included.
    async fn window_count(&self, client_id: &str) -> Result<u64> {
        let key = format!("{}:ip:{}", self.prefix, client_id);
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        let window_ms = self.window.as_millis() as u64;
        let window_start = now_ms.saturating_sub(window_ms);
        // Member must be unique per request so parallel hits all count
        let member = format!("{}-{}", now_ms, uuid::Uuid::new_v4());

        let pipeline = json!([
            ["ZREMRANGEBYSCORE", key, "0", window_start.to_string()],
            ["ZADD", key, now_ms.to_string(), member],
            ["ZCARD", key],
            ["PEXPIRE", key, window_ms.to_string()],
        ]);

        let url = format!("{}/pipeline", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .json(&pipeline)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("upstash request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "unknown".to_string());
            return Err(Error::Provider(format!(
                "upstash error ({}): {}",
                status, body
            )));
        }

        let results: Vec<PipelineResult> = response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("upstash response malformed: {}", e)))?;

        if let Some(err) = results.iter().find_map(|r| r.error.as_deref()) {
            return Err(Error::Provider(format!("upstash command error: {}", err)));
        }

        // ZCARD is the third command in the batch
        results
            .get(2)
            .and_then(|r| r.result.as_u64())
            .ok_or_else(|| Error::Provider("upstash response missing ZCARD".to_string()))
    }
}

#[async_trait]
impl RateLimitBackend for UpstashRateLimiter {
    async fn admit(&self, client_id: &str) -> RateDecision {
        let window_secs = self.window.as_secs();

        match self.window_count(client_id).await {
            Ok(count) => {
                let allowed = count <= self.max_requests as u64;
                if !allowed {
                    tracing::info!(client_id, count, "Rate limit exceeded (shared store)");
                }
                RateDecision {
                    allowed,
                    limit: self.max_requests,
                    remaining: (self.max_requests as u64).saturating_sub(count) as u32,
                    retry_after_secs: window_secs,
                }
            }
            Err(e) => {
                // Fail open: admit the request, keep the detail in the log
                tracing::warn!(error = %e, client_id, "Rate limit check failed, admitting");
                RateDecision {
                    allowed: true,
                    limit: self.max_requests,
                    remaining: self.max_requests,
                    retry_after_secs: window_secs,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared_config() -> RateLimitConfig {
        RateLimitConfig {
            upstash_url: Some("https://example.upstash.io/".to_string()),
            upstash_token: Some("token".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_requires_credentials() {
        assert!(UpstashRateLimiter::new(&RateLimitConfig::default()).is_err());
        assert!(UpstashRateLimiter::new(&shared_config()).is_ok());
    }

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let limiter = UpstashRateLimiter::new(&shared_config()).unwrap();
        assert_eq!(limiter.base_url, "https://example.upstash.io");
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_open() {
        let config = RateLimitConfig {
            // Reserved TEST-NET address: the request can never succeed
            upstash_url: Some("http://192.0.2.1:1".to_string()),
            upstash_token: Some("token".to_string()),
            ..Default::default()
        };
        let limiter = UpstashRateLimiter::new(&config).unwrap();

        let d = limiter.admit("1.2.3.4").await;
        assert!(d.allowed);
        assert_eq!(d.remaining, config.max_requests);
    }

    #[test]
    fn test_pipeline_result_parses_errors() {
        let raw = r#"[{"result":1},{"error":"WRONGTYPE"}]"#;
        let results: Vec<PipelineResult> = serde_json::from_str(raw).unwrap();
        assert!(results[0].error.is_none());
        assert_eq!(results[1].error.as_deref(), Some("WRONGTYPE"));
    }
}
