//! Attempt State (ordinal 1)
//!
//! Polls at a fixed interval trying to create the ephemeral election
//! marker. An existing marker means another process leads; that is the
//! expected steady state for every non-leader, not an error.

use super::{Ctx, FailOver, Lead, State, Stop};
use crate::coordination::{CreateMode, Session};
use crate::error::{Error, Result};

/// Contender state: try to acquire the election marker
pub struct Attempt {
    session: Option<Box<dyn Session>>,
}

impl Attempt {
    pub fn new(session: Option<Box<dyn Session>>) -> Self {
        Self { session }
    }

    pub(super) fn with_session(mut self, session: Box<dyn Session>) -> Self {
        self.session = Some(session);
        self
    }

    pub(super) async fn run(mut self, ctx: &Ctx) -> Result<Option<State>> {
        let session = self
            .session
            .take()
            .ok_or_else(|| Error::Internal("attempt state entered without a session".into()))?;

        let marker_path = ctx.config.election.marker_path.as_str();
        let mut poll = ctx.clock.ticker(ctx.config.attempt_interval());

        loop {
            tokio::select! {
                Some(_) = poll.tick() => {
                    match session.create(marker_path, &[], CreateMode::Ephemeral).await {
                        Ok(()) => {
                            tracing::info!(path = marker_path, "election marker created, taking leadership");
                            return Ok(Some(State::Lead(Lead::new(Some(session)))));
                        }
                        Err(Error::NodeExists(_)) => {
                            tracing::debug!("another process holds leadership, still polling");
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "election marker create failed");
                            return Ok(Some(State::FailOver(FailOver::new(
                                e,
                                Some(session),
                                State::Attempt(Attempt::new(None)),
                            ))));
                        }
                    }
                }
                _ = ctx.shutdown.cancelled() => {
                    return Ok(Some(State::Stop(Stop::new(
                        Some(session),
                        Some(ctx.shutdown.cause()),
                        "attempt",
                    ))));
                }
            }
        }
    }
}
