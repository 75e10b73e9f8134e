//! In-Process Coordination Service
//!
//! A single-process namespace with the session and ephemeral-node
//! semantics the automaton relies on: ephemerals vanish when their
//! owning session closes or expires, create fails on an existing path,
//! and a missing parent is rejected. Used by the test suite and for
//! running a node locally without a ZooKeeper ensemble.
//!
//! The cluster handle doubles as a fault injector: availability can be
//! toggled and sessions expired, and every connection attempt is
//! recorded with its (virtual) timestamp for schedule assertions.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{Connector, CreateMode, Session};
use crate::error::{Error, Result};

struct Node {
    #[allow(dead_code)]
    data: Vec<u8>,
    /// Owning session id for ephemeral nodes
    owner: Option<u64>,
}

#[derive(Default)]
struct Namespace {
    nodes: BTreeMap<String, Node>,
    sessions: HashSet<u64>,
    next_session_id: u64,
    unavailable: bool,
    connect_log: Vec<tokio::time::Instant>,
}

impl Namespace {
    fn remove_owned_by(&mut self, session_id: u64) {
        self.nodes.retain(|_, node| node.owner != Some(session_id));
    }
}

/// Handle to an in-process coordination namespace
#[derive(Clone, Default)]
pub struct MemoryCluster {
    inner: Arc<Mutex<Namespace>>,
}

impl MemoryCluster {
    /// Create an empty namespace
    pub fn new() -> Self {
        Self::default()
    }

    /// Make connects fail with NoServer and live-session operations fail
    /// with ConnectionClosed until re-enabled
    pub fn set_available(&self, available: bool) {
        self.inner.lock().unwrap().unavailable = !available;
    }

    /// Expire every open session, dropping the ephemerals they own
    pub fn expire_all_sessions(&self) {
        let mut ns = self.inner.lock().unwrap();
        let ids: Vec<u64> = ns.sessions.drain().collect();
        for id in ids {
            ns.remove_owned_by(id);
        }
    }

    /// Timestamps of every connection attempt seen so far
    pub fn connect_attempts(&self) -> Vec<tokio::time::Instant> {
        self.inner.lock().unwrap().connect_log.clone()
    }

    /// Check whether a node exists
    pub fn node_exists(&self, path: &str) -> bool {
        self.inner.lock().unwrap().nodes.contains_key(path)
    }

    /// Direct children of a path, sorted (empty if the path is absent)
    pub fn children_of(&self, path: &str) -> Vec<String> {
        let ns = self.inner.lock().unwrap();
        direct_children(&ns.nodes, path)
    }
}

fn validate_path(path: &str) -> Result<()> {
    if !path.starts_with('/') || path.len() < 2 || path.ends_with('/') {
        return Err(Error::Protocol(format!("invalid path {path:?}")));
    }
    Ok(())
}

/// Parent path, with `""` standing for the root
fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "",
        Some(idx) => &path[..idx],
    }
}

fn direct_children(nodes: &BTreeMap<String, Node>, path: &str) -> Vec<String> {
    let prefix = format!("{path}/");
    nodes
        .range(prefix.clone()..)
        .take_while(|(key, _)| key.starts_with(&prefix))
        .filter(|(key, _)| !key[prefix.len()..].contains('/'))
        .map(|(key, _)| key[prefix.len()..].to_string())
        .collect()
}

#[async_trait]
impl Connector for MemoryCluster {
    async fn connect(
        &self,
        _endpoints: &[String],
        _session_timeout: Duration,
    ) -> Result<Box<dyn Session>> {
        let mut ns = self.inner.lock().unwrap();
        ns.connect_log.push(tokio::time::Instant::now());
        if ns.unavailable {
            return Err(Error::NoServer);
        }
        ns.next_session_id += 1;
        let id = ns.next_session_id;
        ns.sessions.insert(id);
        drop(ns);
        Ok(Box::new(MemorySession {
            id,
            cluster: self.clone(),
            closed: false,
        }))
    }
}

/// A session on the in-process namespace
pub struct MemorySession {
    id: u64,
    cluster: MemoryCluster,
    closed: bool,
}

impl MemorySession {
    fn check_live(&self, ns: &Namespace) -> Result<()> {
        if ns.unavailable || self.closed {
            return Err(Error::ConnectionClosed);
        }
        if !ns.sessions.contains(&self.id) {
            return Err(Error::SessionExpired);
        }
        Ok(())
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn create(&self, path: &str, data: &[u8], mode: CreateMode) -> Result<()> {
        validate_path(path)?;
        let mut ns = self.cluster.inner.lock().unwrap();
        self.check_live(&ns)?;

        let parent = parent_of(path);
        if !parent.is_empty() && !ns.nodes.contains_key(parent) {
            return Err(Error::NoNode(parent.to_string()));
        }
        if ns.nodes.contains_key(path) {
            return Err(Error::NodeExists(path.to_string()));
        }

        let owner = match mode {
            CreateMode::Persistent => None,
            CreateMode::Ephemeral => Some(self.id),
        };
        ns.nodes.insert(
            path.to_string(),
            Node {
                data: data.to_vec(),
                owner,
            },
        );
        Ok(())
    }

    async fn delete(&self, path: &str, _version: i32) -> Result<()> {
        validate_path(path)?;
        let mut ns = self.cluster.inner.lock().unwrap();
        self.check_live(&ns)?;
        if ns.nodes.remove(path).is_none() {
            return Err(Error::NoNode(path.to_string()));
        }
        Ok(())
    }

    async fn children(&self, path: &str) -> Result<Vec<String>> {
        validate_path(path)?;
        let ns = self.cluster.inner.lock().unwrap();
        self.check_live(&ns)?;
        if !ns.nodes.contains_key(path) {
            return Err(Error::NoNode(path.to_string()));
        }
        Ok(direct_children(&ns.nodes, path))
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut ns = self.cluster.inner.lock().unwrap();
        ns.sessions.remove(&self.id);
        ns.remove_owned_by(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open(cluster: &MemoryCluster) -> Box<dyn Session> {
        cluster
            .connect(&[], Duration::from_millis(300))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_ephemeral_released_on_close() {
        let cluster = MemoryCluster::new();
        let mut session = open(&cluster).await;

        session
            .create("/election", &[], CreateMode::Ephemeral)
            .await
            .unwrap();
        assert!(cluster.node_exists("/election"));

        session.close().await;
        assert!(!cluster.node_exists("/election"));
        // Idempotent
        session.close().await;
    }

    #[tokio::test]
    async fn test_marker_is_mutually_exclusive() {
        let cluster = MemoryCluster::new();
        let mut first = open(&cluster).await;
        let second = open(&cluster).await;

        first
            .create("/election", &[], CreateMode::Ephemeral)
            .await
            .unwrap();
        let contested = second.create("/election", &[], CreateMode::Ephemeral).await;
        assert!(matches!(contested, Err(Error::NodeExists(_))));

        // Releasing the first session frees the marker for the second
        first.close().await;
        second
            .create("/election", &[], CreateMode::Ephemeral)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_persistent_nodes_survive_close() {
        let cluster = MemoryCluster::new();
        let mut session = open(&cluster).await;
        session
            .create("/data", &[], CreateMode::Persistent)
            .await
            .unwrap();
        session.close().await;
        assert!(cluster.node_exists("/data"));
    }

    #[tokio::test]
    async fn test_missing_parent_rejected() {
        let cluster = MemoryCluster::new();
        let session = open(&cluster).await;
        let result = session.create("/data/0", &[], CreateMode::Persistent).await;
        assert!(matches!(result, Err(Error::NoNode(p)) if p == "/data"));
    }

    #[tokio::test]
    async fn test_children_are_direct_and_sorted() {
        let cluster = MemoryCluster::new();
        let session = open(&cluster).await;
        session
            .create("/data", &[], CreateMode::Persistent)
            .await
            .unwrap();
        for name in ["2", "0", "1"] {
            session
                .create(&format!("/data/{name}"), &[], CreateMode::Persistent)
                .await
                .unwrap();
        }
        session
            .create("/data/1/nested", &[], CreateMode::Persistent)
            .await
            .unwrap();

        let children = session.children("/data").await.unwrap();
        assert_eq!(children, vec!["0", "1", "2"]);
        assert!(matches!(
            session.children("/missing").await,
            Err(Error::NoNode(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected() {
        let cluster = MemoryCluster::new();
        let session = open(&cluster).await;
        session
            .create("/election", &[], CreateMode::Ephemeral)
            .await
            .unwrap();

        cluster.expire_all_sessions();
        assert!(!cluster.node_exists("/election"));
        let result = session.create("/election", &[], CreateMode::Ephemeral).await;
        assert!(matches!(result, Err(Error::SessionExpired)));
    }

    #[tokio::test]
    async fn test_unavailable_cluster() {
        let cluster = MemoryCluster::new();
        let session = open(&cluster).await;

        cluster.set_available(false);
        assert!(matches!(
            cluster.connect(&[], Duration::from_millis(300)).await.err(),
            Some(Error::NoServer)
        ));
        assert!(matches!(
            session.children("/whatever").await,
            Err(Error::ConnectionClosed)
        ));
        assert_eq!(cluster.connect_attempts().len(), 2);
    }
}
