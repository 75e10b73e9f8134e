//! Leader Election Automaton
//!
//! The election logic is a closed five-state machine. Each state is a
//! self-contained transition function: `run` consumes the state and
//! produces the next one, or nothing when the automaton is done. The
//! coordination session is owned by exactly one state at a time and
//! handed over by move, so no locking is ever needed around it.

mod attempt;
mod connect;
mod failover;
mod lead;
pub mod runner;
mod stop;

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

pub use attempt::Attempt;
pub use connect::Connect;
pub use failover::FailOver;
pub use lead::Lead;
pub use runner::Runner;
pub use stop::Stop;

use crate::clock::Clock;
use crate::config::Config;
use crate::coordination::{Connector, Session};
use crate::error::{Error, Result};

/// Dependencies shared by every state
pub struct Ctx {
    /// Immutable node configuration
    pub config: Arc<Config>,
    /// Tick and delay source
    pub clock: Arc<dyn Clock>,
    /// Coordination session factory
    pub connector: Arc<dyn Connector>,
    /// Cooperative shutdown signal
    pub shutdown: Shutdown,
}

/// Process-wide cancellation token carrying a textual cause.
///
/// Checked at every suspension point; once triggered, the running state
/// finishes its current step and routes to Stop.
#[derive(Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
    cause: Arc<Mutex<Option<String>>>,
}

impl Shutdown {
    /// Create an untriggered shutdown signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger the shutdown. The first caller's cause wins.
    pub fn trigger(&self, cause: impl Into<String>) {
        {
            let mut slot = self.cause.lock().unwrap();
            if slot.is_none() {
                *slot = Some(cause.into());
            }
        }
        self.token.cancel();
    }

    /// Wait until the shutdown is triggered
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Check whether the shutdown has been triggered
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The cancellation cause as an error
    pub fn cause(&self) -> Error {
        let cause = self
            .cause
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| "shutdown requested".to_string());
        Error::Cancelled(cause)
    }
}

/// The closed set of automaton states
pub enum State {
    Connect(Connect),
    Attempt(Attempt),
    Lead(Lead),
    FailOver(FailOver),
    Stop(Stop),
}

impl State {
    /// The initial state of a fresh automaton
    pub fn initial() -> State {
        State::Connect(Connect)
    }

    /// Stable state name, used in logs and reporting
    pub fn name(&self) -> &'static str {
        match self {
            State::Connect(_) => "connect",
            State::Attempt(_) => "attempt",
            State::Lead(_) => "lead",
            State::FailOver(_) => "failover",
            State::Stop(_) => "stop",
        }
    }

    /// Stable numeric ordinal, exported as a metric gauge
    pub fn ordinal(&self) -> u8 {
        match self {
            State::Connect(_) => 0,
            State::Attempt(_) => 1,
            State::Lead(_) => 2,
            State::FailOver(_) => 3,
            State::Stop(_) => 4,
        }
    }

    /// Produce the same state holding the given session.
    ///
    /// Used by failover on successful reconnection; a pure construction
    /// rather than a mutation of a shared object. States that do not
    /// hold a session are returned unchanged.
    pub fn adopt_session(self, session: Box<dyn Session>) -> State {
        match self {
            State::Attempt(state) => State::Attempt(state.with_session(session)),
            State::Lead(state) => State::Lead(state.with_session(session)),
            other => other,
        }
    }

    /// Run this state to completion, returning the next state or `None`
    /// when the automaton terminates. The carried terminal error, if
    /// any, is surfaced through the `Result`.
    pub async fn run(self, ctx: &Ctx) -> Result<Option<State>> {
        match self {
            State::Connect(state) => state.run(ctx).await,
            State::Attempt(state) => state.run(ctx).await,
            State::Lead(state) => state.run(ctx).await,
            State::FailOver(state) => state.run(ctx).await,
            State::Stop(state) => state.run(ctx).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinals_are_stable() {
        assert_eq!(State::initial().ordinal(), 0);
        assert_eq!(State::initial().name(), "connect");
        assert_eq!(State::Attempt(Attempt::new(None)).ordinal(), 1);
        assert_eq!(State::Lead(Lead::new(None)).ordinal(), 2);
        assert_eq!(
            State::Stop(Stop::new(None, None, "attempt")).ordinal(),
            4
        );
    }

    #[test]
    fn test_shutdown_first_cause_wins() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_cancelled());
        shutdown.trigger("shut down by signal");
        shutdown.trigger("second cause");
        assert!(shutdown.is_cancelled());
        match shutdown.cause() {
            Error::Cancelled(cause) => assert_eq!(cause, "shut down by signal"),
            other => panic!("unexpected cause: {other}"),
        }
    }
}
