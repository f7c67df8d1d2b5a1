//! Release-channel lookup.
//!
//! Each channel publishes the build number it currently points at as a plain
//! integer body at the configured `channel_url`. The stable build is always
//! resolved since it is the fallback target for failed updates.

use crate::config::{LauncherConfig, ReleaseChannel};
use crate::constants::REQUEST_TIMEOUT;
use crate::core::LauncherError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

/// Resolves a release channel to its current build number.
#[async_trait]
pub trait ReleaseChannels: Send + Sync {
    /// Build number `channel` currently points at.
    async fn latest(&self, channel: ReleaseChannel) -> Result<u32>;
}

/// [`ReleaseChannels`] fetching plain-text build numbers over HTTP.
#[derive(Debug, Clone)]
pub struct HttpReleaseChannels {
    client: reqwest::Client,
    config: LauncherConfig,
}

impl HttpReleaseChannels {
    /// Channel resolver for the origin in `config`.
    pub fn new(config: LauncherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            config,
        })
    }
}

#[async_trait]
impl ReleaseChannels for HttpReleaseChannels {
    async fn latest(&self, channel: ReleaseChannel) -> Result<u32> {
        let url = self.config.channel_url(channel);
        debug!("Resolving {} channel from {}", channel, url);

        let operation = format!("resolve {channel} channel");
        let network = |reason: String| LauncherError::NetworkFailure {
            operation: operation.clone(),
            reason,
        };

        let response = self.client.get(&url).send().await.map_err(|e| network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(network(format!("HTTP {status} from {url}")).into());
        }
        let body = response.text().await.map_err(|e| network(e.to_string()))?;

        let build = parse_build_number(channel, &body)?;
        debug!("{} channel is at build {}", channel, build);
        Ok(build)
    }
}

/// Parse a channel response body into a build number.
pub fn parse_build_number(channel: ReleaseChannel, body: &str) -> Result<u32, LauncherError> {
    let trimmed = body.trim();
    trimmed.parse().map_err(|_| LauncherError::InvalidChannelResponse {
        channel: channel.to_string(),
        body: trimmed.chars().take(64).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_build_number() {
        assert_eq!(parse_build_number(ReleaseChannel::Stable, "42\n").unwrap(), 42);
        assert_eq!(parse_build_number(ReleaseChannel::Dev, "  7 ").unwrap(), 7);
    }

    #[test]
    fn test_parse_build_number_rejects_garbage() {
        let err = parse_build_number(ReleaseChannel::Dev, "<html>oops</html>").unwrap_err();
        assert!(matches!(
            err,
            LauncherError::InvalidChannelResponse { ref channel, .. } if channel == "dev"
        ));
        assert!(parse_build_number(ReleaseChannel::Stable, "-1").is_err());
        assert!(parse_build_number(ReleaseChannel::Stable, "").is_err());
    }
}
