//! Shared test utilities for the Fintrack workspace
//!
//! This crate provides a mock sync stream server and wire-format event
//! fixtures for testing without a real backend.
//!
//! # Mock Services
//!
//! - [`MockStreamServer`] - Mock NDJSON sync stream endpoint
//! - [`SyncEventFixture`] - Builders for sync event frames
//!
//! # Example
//!
//! ```rust,ignore
//! use fintrack_test_utils::{MockStreamServer, SyncEventFixture};
//!
//! #[tokio::test]
//! async fn test_with_mocks() {
//!     let server = MockStreamServer::start().await;
//!     server.mock_session(&[SyncEventFixture::account_completed("a1")]).await;
//!
//!     // Use server.stream_url() to configure the transport
//! }
//! ```

mod fixtures;
mod stream;

pub use fixtures::SyncEventFixture;
pub use stream::{ndjson, MockStreamServer, STREAM_PATH};
