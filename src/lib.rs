//! zkelect - ZooKeeper-Backed Leader Election Node
//!
//! A long-running process that competes for leadership of a fleet of
//! cooperating nodes through a ZooKeeper-compatible coordination
//! service. Exactly one node at a time holds an ephemeral election
//! marker and performs the leader-only duty (a bounded rotating set of
//! data files in the coordination namespace); every other node keeps
//! polling for the marker to become free.
//!
//! # Architecture
//!
//! The election logic is a five-state automaton (connect, attempt,
//! lead, failover, stop) driven by a sequential runner. Coordination
//! disruptions are classified: a dropped connection, expired session or
//! unreachable ensemble enters a bounded quick-then-escalating retry
//! phase; anything else terminates the node. Leadership release is
//! delegated entirely to the coordination service: when the session
//! ends, so does the ephemeral marker.
//!
//! # Features
//!
//! - Hand-rolled ZooKeeper wire-protocol client with keep-alive pings
//! - Bounded failover with quick and escalating retry phases
//! - Ring-buffer rotation of leader data slots with capacity enforcement
//! - Reconciliation of data directories left by prior leaders
//! - HTTP endpoint exposing transition metrics
//! - In-process coordination backend for tests and local development

pub mod automaton;
pub mod clock;
pub mod config;
pub mod coordination;
pub mod error;
pub mod metrics;

pub use config::Config;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::automaton::{Ctx, Runner, Shutdown, State};
    pub use crate::clock::{Clock, TokioClock};
    pub use crate::config::Config;
    pub use crate::coordination::{Connector, CreateMode, MemoryCluster, Session, ZkConnector};
    pub use crate::error::{Error, Result};
    pub use crate::metrics::{Metrics, MetricsServer};
}
