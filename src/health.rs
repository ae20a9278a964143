//! Bounded-retry health checks.
//!
//! Used as the pipeline's pre-flight and post-deploy checks and as the
//! scheduler's heartbeat. Delay between attempts is fixed.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::HealthConfig;
use crate::error::{OrchestratorError, Result};

/// A single probe of a URL. Returns the HTTP status on success; any
/// non-success status or transport problem is an error.
pub trait HealthProbe: Send + Sync {
    fn probe(&self, url: &str, timeout: Duration) -> impl Future<Output = Result<u16>> + Send;
}

/// HTTP `GET` probe.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    /// `(header, token)` for access-gated preview deployments.
    bypass: Option<(String, String)>,
}

impl HttpProbe {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("campaign-orchestrator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                OrchestratorError::Configuration(format!("failed to build HTTP client: {}", e))
            })?;
        Ok(Self {
            client,
            bypass: None,
        })
    }

    /// Probe configured from `[health]`, with the bypass credential when set.
    pub fn from_config(config: &HealthConfig) -> Result<Self> {
        let probe = Self::new()?;
        Ok(match config.bypass_token() {
            Some(token) => probe.with_bypass(config.bypass_header.clone(), token),
            None => probe,
        })
    }

    pub fn with_bypass(mut self, header: impl Into<String>, token: impl Into<String>) -> Self {
        self.bypass = Some((header.into(), token.into()));
        self
    }
}

impl HealthProbe for HttpProbe {
    async fn probe(&self, url: &str, timeout: Duration) -> Result<u16> {
        let mut request = self.client.get(url).timeout(timeout);
        if let Some((header, token)) = &self.bypass {
            request = request.header(header.as_str(), token.as_str());
        }

        match request.send().await {
            Ok(resp) if resp.status().is_success() => Ok(resp.status().as_u16()),
            Ok(resp) => Err(OrchestratorError::TransientNetwork(format!(
                "{} returned HTTP {}",
                url,
                resp.status().as_u16()
            ))),
            Err(err) if err.is_timeout() => Err(OrchestratorError::TransientNetwork(format!(
                "{} timed out after {}ms",
                url,
                timeout.as_millis()
            ))),
            Err(err) if err.is_builder() => Err(OrchestratorError::Configuration(format!(
                "invalid health check URL {}: {}",
                url, err
            ))),
            Err(err) => Err(OrchestratorError::TransientNetwork(format!(
                "{} unreachable: {}",
                url, err
            ))),
        }
    }
}

/// Result of a successful health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub url: String,
    pub status: u16,
    pub attempts: u32,
}

/// Retry policy around a [`HealthProbe`].
#[derive(Debug, Clone)]
pub struct HealthVerifier<P: HealthProbe> {
    probe: P,
    max_attempts: u32,
    delay: Duration,
    timeout: Duration,
}

impl<P: HealthProbe> HealthVerifier<P> {
    pub fn new(probe: P, max_attempts: u32, delay: Duration, timeout: Duration) -> Self {
        Self {
            probe,
            max_attempts: max_attempts.max(1),
            delay,
            timeout,
        }
    }

    pub fn from_config(probe: P, config: &HealthConfig) -> Self {
        Self::new(probe, config.max_attempts, config.delay(), config.timeout())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Check `url` with the configured policy.
    pub async fn verify(&self, url: &str) -> Result<HealthReport> {
        self.verify_with(url, self.max_attempts, self.delay, self.timeout)
            .await
    }

    /// Check `url` with an explicit policy.
    ///
    /// Up to `max_attempts` sequential probes, `delay` apart. Retryable
    /// failures are retried; anything else fails immediately. Exhaustion
    /// yields a step failure carrying the last error.
    pub async fn verify_with(
        &self,
        url: &str,
        max_attempts: u32,
        delay: Duration,
        timeout: Duration,
    ) -> Result<HealthReport> {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(url, attempt, max_attempts, "health check attempt");

            match self.probe.probe(url, timeout).await {
                Ok(status) => {
                    info!(url, status, attempt, "health check passed");
                    return Ok(HealthReport {
                        url: url.to_string(),
                        status,
                        attempts: attempt,
                    });
                }
                Err(e) if e.is_recoverable() && attempt < max_attempts => {
                    warn!(url, attempt, error = %e, "health check failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_recoverable() => {
                    return Err(OrchestratorError::step(
                        "health check",
                        format!(
                            "{} unhealthy after {} attempts: {}",
                            url, attempt, e
                        ),
                    ));
                }
                Err(e) => return Err(e),
            }
        }
    }
}
