//! Integration test suite for patchlaunch
//!
//! End-to-end tests running the update session and the CLI against a mock
//! distribution origin (`wiremock`) serving real zip / tar.gz archives built
//! by `patchlaunch::test_utils::fixtures`.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **common**: Mock origin and package fixtures shared by all tests
//! - **session_flow**: Full installs, patch chains, fallback and resume
//! - **cli**: The `patchlaunch` binary (`status`, `plan`, `run --skip-update`)

mod cli;
mod common;
mod session_flow;
