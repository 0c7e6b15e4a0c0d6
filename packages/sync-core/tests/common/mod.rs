//! Common test utilities for sync core integration tests
//!
//! This module provides shared test infrastructure: the scripted transport,
//! recording collaborators and polling helpers for asynchronous assertions.

#![allow(unused_imports)]
#![allow(dead_code)]

pub mod mocks;

pub use mocks::*;

use std::time::Duration;

use fintrack_sync::{ConnectionState, StreamHandle};

/// Polls before [`eventually`] gives up (two minutes of clock time)
const MAX_POLLS: usize = 12_000;

/// Wait until `condition` holds, yielding to the stream driver between polls
pub async fn eventually(description: &str, mut condition: impl FnMut() -> bool) {
    for _ in 0..MAX_POLLS {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never held: {}", description);
}

/// Wait until the stream's connection state satisfies `predicate`
pub async fn wait_for_state(
    handle: &StreamHandle,
    predicate: impl FnMut(&ConnectionState) -> bool,
) -> ConnectionState {
    let mut states = handle.watch_state();
    let state = tokio::time::timeout(Duration::from_secs(120), states.wait_for(predicate))
        .await
        .expect("timed out waiting for connection state")
        .expect("stream driver dropped its state");
    state.clone()
}

/// Serialize a fixture frame as one wire line
pub fn line(frame: serde_json::Value) -> String {
    frame.to_string()
}

pub fn lines(frames: Vec<serde_json::Value>) -> Vec<String> {
    frames.into_iter().map(line).collect()
}

pub const ENDPOINT: &str = "https://sync.test/api/sync/stream";
