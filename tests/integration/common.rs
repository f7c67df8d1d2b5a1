//! Mock origin and fixtures shared by the integration tests.

use patchlaunch::config::LauncherConfig;
use patchlaunch::test_utils::{ArchiveBuilder, FixtureEntry, bucket_listing};
use tempfile::tempdir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A distribution origin served under `/builds` of a mock server.
pub struct TestOrigin {
    pub server: MockServer,
}

impl TestOrigin {
    /// Start an origin whose patch listings are empty unless set otherwise.
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let empty: [&str; 0] = [];
        Mock::given(method("GET"))
            .and(path("/builds"))
            .respond_with(ResponseTemplate::new(200).set_body_string(bucket_listing(&empty)))
            .with_priority(10)
            .mount(&server)
            .await;
        Self { server }
    }

    pub fn url(&self) -> String {
        format!("{}/builds", self.server.uri())
    }

    pub fn config(&self) -> LauncherConfig {
        LauncherConfig::new(self.url())
    }

    pub async fn channel(&self, channel: &str, build: u32) {
        Mock::given(method("GET"))
            .and(path(format!("/builds/channels/{channel}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!("{build}\n")))
            .mount(&self.server)
            .await;
    }

    pub async fn package(&self, build: u32, archive: Vec<u8>) {
        Mock::given(method("GET"))
            .and(path(format!("/builds/{build}/Linux.tar.gz")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
            .mount(&self.server)
            .await;
    }

    /// Serve the full package of `build` as a server error.
    pub async fn broken_package(&self, build: u32) {
        Mock::given(method("GET"))
            .and(path(format!("/builds/{build}/Linux.tar.gz")))
            .respond_with(ResponseTemplate::new(500))
            .mount(&self.server)
            .await;
    }

    pub async fn patch(&self, source: u32, destination: u32, archive: Vec<u8>) {
        Mock::given(method("GET"))
            .and(path(format!("/builds/{destination}/{source}.patch")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
            .mount(&self.server)
            .await;
    }

    /// Publish patches into `destination` from each of `sources`.
    pub async fn listing(&self, destination: u32, sources: &[u32]) {
        let keys: Vec<String> = sources.iter().map(|s| format!("{destination}/{s}.patch")).collect();
        Mock::given(method("GET"))
            .and(path("/builds"))
            .and(query_param("prefix", format!("{destination}/")))
            .respond_with(ResponseTemplate::new(200).set_body_string(bucket_listing(&keys)))
            .mount(&self.server)
            .await;
    }

    /// Number of requests received for `url_path`.
    pub async fn hits(&self, url_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == url_path)
            .count()
    }
}

/// Contents of `app/data.txt` in `build`.
pub fn data(build: u32) -> Vec<u8> {
    format!("level data for build {build}\n").repeat(40).into_bytes()
}

/// Full package of `build`: an executable and a data file under `app/`.
pub fn package(build: u32) -> Vec<u8> {
    tar_gz(
        ArchiveBuilder::new()
            .entry(FixtureEntry::dir("app"))
            .entry(FixtureEntry::file("app/app", b"#!/bin/sh\nexit 0\n").mode(0o755))
            .entry(FixtureEntry::file("app/data.txt", &data(build))),
    )
}

/// Patch turning `app/data.txt` of `source` into that of `destination`.
pub fn data_patch(source: u32, destination: u32) -> ArchiveBuilder {
    ArchiveBuilder::new().entry(FixtureEntry::bsdiff("data.txt", &data(source), &data(destination)))
}

pub fn tar_gz(builder: ArchiveBuilder) -> Vec<u8> {
    let dir = tempdir().unwrap();
    let path = builder.write_tar_gz(&dir.path().join("archive.tar.gz")).unwrap();
    std::fs::read(path).unwrap()
}

pub fn zip(builder: ArchiveBuilder) -> Vec<u8> {
    let dir = tempdir().unwrap();
    let path = builder.write_zip(&dir.path().join("archive.zip")).unwrap();
    std::fs::read(path).unwrap()
}
