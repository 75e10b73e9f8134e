//! Coordination Service Access
//!
//! The automaton talks to a ZooKeeper-compatible service through the
//! `Session` and `Connector` traits. The production implementation is
//! the wire-protocol client in [`client`]; [`memory`] provides an
//! in-process namespace with the same session and ephemeral-node
//! semantics for the test suite and local development.

pub mod client;
pub mod memory;
mod wire;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

pub use client::ZkConnector;
pub use memory::{MemoryCluster, MemorySession};

/// Node creation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// Node outlives the creating session
    Persistent,
    /// Node is removed when the creating session ends
    Ephemeral,
}

/// An open session to the coordination service.
///
/// A session is exclusively owned by one automaton state at a time and
/// handed over by move; it is never shared.
#[async_trait]
pub trait Session: Send + Sync {
    /// Create a node at `path` with the given payload. Fails with
    /// [`Error::NodeExists`](crate::Error::NodeExists) if present and
    /// [`Error::NoNode`](crate::Error::NoNode) if the parent is missing.
    async fn create(&self, path: &str, data: &[u8], mode: CreateMode) -> Result<()>;

    /// Delete the node at `path`. A `version` of -1 matches any version.
    async fn delete(&self, path: &str, version: i32) -> Result<()>;

    /// List the names of the direct children of `path`, sorted.
    async fn children(&self, path: &str) -> Result<Vec<String>>;

    /// Close the session, releasing every ephemeral node it owns.
    /// Idempotent; closing a closed session is a no-op.
    async fn close(&mut self);
}

/// Factory for coordination sessions
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a session against one of the given endpoints.
    async fn connect(
        &self,
        endpoints: &[String],
        session_timeout: Duration,
    ) -> Result<Box<dyn Session>>;
}
