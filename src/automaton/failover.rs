//! FailOver State (ordinal 3)
//!
//! The retry engine entered on recoverable coordination disruption.
//! Three timers run concurrently: a fixed quick-retry ticker that
//! absorbs brief blips, a one-shot marking the end of the quick phase
//! (after which each failed attempt re-arms with a delay that grows by
//! one slow step), and an overall deadline that bounds how long the
//! node stays degraded before conceding.

use std::time::Duration;

use super::{Ctx, State, Stop};
use crate::error::{Error, Result};
use crate::coordination::Session;

/// Reconnection state: bounded retry, then resume or give up
pub struct FailOver {
    error: Error,
    session: Option<Box<dyn Session>>,
    resume: Box<State>,
}

impl FailOver {
    pub fn new(error: Error, session: Option<Box<dyn Session>>, resume: State) -> Self {
        Self {
            error,
            session,
            resume: Box::new(resume),
        }
    }

    pub(super) async fn run(mut self, ctx: &Ctx) -> Result<Option<State>> {
        // Anything that a fresh session cannot heal is fatal; report it
        // through Stop without a single reconnection attempt.
        if !self.error.is_recoverable() {
            tracing::error!(
                error = %self.error,
                resume = self.resume.name(),
                "unrecoverable coordination error"
            );
            return Ok(Some(State::Stop(Stop::new(
                self.session,
                Some(self.error),
                self.resume.name(),
            ))));
        }

        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
        tracing::warn!(
            error = %self.error,
            resume = self.resume.name(),
            "coordination disrupted, retrying connection"
        );

        let config = &ctx.config;
        let quick_interval = config.quick_retry_interval();
        let mut retry = ctx.clock.ticker(quick_interval);
        let mut quick_phase_end = ctx
            .clock
            .timer(config.dead_leader_timeout().saturating_sub(quick_interval));
        let mut deadline = ctx.clock.timer(config.max_failover_duration());

        // None while in the quick phase; afterwards the accumulated
        // one-shot retry delay.
        let mut slow_delay: Option<Duration> = None;

        loop {
            tokio::select! {
                Some(_) = retry.tick() => {
                    match ctx
                        .connector
                        .connect(&config.coordination.endpoints, config.session_timeout())
                        .await
                    {
                        Ok(session) => {
                            tracing::info!(resume = self.resume.name(), "reconnected, resuming");
                            return Ok(Some((*self.resume).adopt_session(session)));
                        }
                        Err(e) => {
                            tracing::debug!(error = %e, "reconnection attempt failed");
                            if let Some(delay) = slow_delay.as_mut() {
                                *delay += config.slow_retry_step();
                                retry = ctx.clock.timer(*delay);
                            }
                        }
                    }
                }
                Some(_) = quick_phase_end.tick(), if slow_delay.is_none() => {
                    tracing::debug!("quick retry phase over, escalating delays");
                    slow_delay = Some(Duration::ZERO);
                }
                Some(_) = deadline.tick() => {
                    tracing::error!(
                        resume = self.resume.name(),
                        "failover deadline reached, giving up"
                    );
                    return Ok(Some(State::Stop(Stop::new(
                        None,
                        Some(self.error),
                        self.resume.name(),
                    ))));
                }
                _ = ctx.shutdown.cancelled() => {
                    return Ok(Some(State::Stop(Stop::new(
                        None,
                        Some(ctx.shutdown.cause()),
                        self.resume.name(),
                    ))));
                }
            }
        }
    }
}
