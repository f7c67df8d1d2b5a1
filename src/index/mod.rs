//! Patch discovery against the origin's bucket listing.
//!
//! Patches are stored on the origin as `<destination>/<source>.patch`. To find
//! every build that can be patched directly to `destination`, the index is
//! queried with `?prefix=<destination>/` and returns an S3-style XML listing:
//!
//! ```xml
//! <ListBucketResult>
//!   <Contents><Key>13/9.patch</Key>...</Contents>
//!   <Contents><Key>13/12.patch</Key>...</Contents>
//! </ListBucketResult>
//! ```
//!
//! which yields the source set `{9, 12}`. Results are never cached; every
//! resolution step issues a fresh query.

use crate::config::LauncherConfig;
use crate::constants::REQUEST_TIMEOUT;
use crate::core::LauncherError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::{debug, trace};

static PATCH_KEY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?:^|/)(\d+)/(\d+)\.patch$").ok());

/// Source of patch availability information.
///
/// The planner only needs one question answered: which builds have a patch
/// that produces `destination`. Implementations must not cache.
#[async_trait]
pub trait PatchIndex: Send + Sync {
    /// Source versions with a patch to `destination`.
    ///
    /// An empty listing is an empty set, not an error.
    async fn list_sources(&self, destination: u32) -> Result<BTreeSet<u32>>;
}

/// [`PatchIndex`] backed by the origin's HTTP bucket listing.
#[derive(Debug, Clone)]
pub struct HttpPatchIndex {
    client: reqwest::Client,
    config: LauncherConfig,
}

impl HttpPatchIndex {
    /// Index client for the listing endpoint configured in `config`.
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
impl PatchIndex for HttpPatchIndex {
    async fn list_sources(&self, destination: u32) -> Result<BTreeSet<u32>> {
        let url = self.config.index_query_url(destination);
        debug!("Listing patches to {} from {}", destination, url);

        let operation = format!("list patches to build {destination}");
        let response =
            self.client.get(&url).send().await.map_err(|e| LauncherError::NetworkFailure {
                operation: operation.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::NetworkFailure {
                operation,
                reason: format!("HTTP {status} from {url}"),
            }
            .into());
        }

        let body = response.text().await.map_err(|e| LauncherError::NetworkFailure {
            operation: operation.clone(),
            reason: e.to_string(),
        })?;

        let sources = parse_listing(&body, destination).map_err(|reason| LauncherError::NetworkFailure {
            operation,
            reason,
        })?;
        debug!("Build {} has patches from {:?}", destination, sources);
        Ok(sources)
    }
}

/// Extract patch sources for `destination` from an XML bucket listing.
///
/// Only `<Key>` elements inside `<Contents>` are considered. Keys that do not
/// look like `<destination>/<source>.patch`, or that name a different
/// destination, are skipped.
///
/// # Errors
///
/// Returns the parser message if the document is not well-formed XML.
pub fn parse_listing(xml: &str, destination: u32) -> Result<BTreeSet<u32>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut sources = BTreeSet::new();
    let mut in_contents = false;
    let mut in_key = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"Contents" => in_contents = true,
                b"Key" if in_contents => in_key = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"Contents" => in_contents = false,
                b"Key" => in_key = false,
                _ => {}
            },
            Ok(Event::Text(text)) if in_key => {
                let key = text.unescape().map_err(|e| e.to_string())?;
                match source_from_key(&key, destination) {
                    Some(source) => {
                        sources.insert(source);
                    }
                    None => trace!("Skipping listing key '{}'", key),
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(format!("malformed listing at byte {}: {e}", reader.error_position()));
            }
        }
    }

    Ok(sources)
}

fn source_from_key(key: &str, destination: u32) -> Option<u32> {
    let captures = PATCH_KEY.as_ref()?.captures(key.trim())?;
    let dest: u32 = captures[1].parse().ok()?;
    let source: u32 = captures[2].parse().ok()?;
    (dest == destination).then_some(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(keys: &[&str]) -> String {
        let contents: String = keys
            .iter()
            .map(|k| format!("<Contents><Key>{k}</Key><Size>1024</Size></Contents>"))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>builds</Name><Prefix>13/</Prefix>{contents}
</ListBucketResult>"#
        )
    }

    #[test]
    fn test_parse_listing_extracts_sources() {
        let xml = listing(&["13/9.patch", "13/12.patch"]);
        assert_eq!(parse_listing(&xml, 13).unwrap(), BTreeSet::from([9, 12]));
    }

    #[test]
    fn test_parse_listing_empty() {
        let xml = listing(&[]);
        assert!(parse_listing(&xml, 13).unwrap().is_empty());
    }

    #[test]
    fn test_parse_listing_skips_malformed_keys() {
        let xml = listing(&[
            "13/12.patch",
            "13/Linux.tar.gz",
            "13/abc.patch",
            "13/11.patch.bak",
            "14/10.patch",
            "13/99999999999.patch",
        ]);
        assert_eq!(parse_listing(&xml, 13).unwrap(), BTreeSet::from([12]));
    }

    #[test]
    fn test_parse_listing_accepts_nested_prefix() {
        let xml = listing(&["nix/13/10.patch"]);
        assert_eq!(parse_listing(&xml, 13).unwrap(), BTreeSet::from([10]));
    }

    #[test]
    fn test_parse_listing_ignores_keys_outside_contents() {
        let xml = r"<ListBucketResult><Key>13/1.patch</Key><Contents><Key>13/2.patch</Key></Contents></ListBucketResult>";
        assert_eq!(parse_listing(xml, 13).unwrap(), BTreeSet::from([2]));
    }

    #[test]
    fn test_parse_listing_rejects_broken_xml() {
        assert!(parse_listing("<ListBucketResult><Contents></Key>", 13).is_err());
    }
}
