//! Connect State (ordinal 0)
//!
//! Opens the initial coordination session. Performs no retries of its
//! own; a failed connect is handed to failover, which owns the whole
//! retry policy, with a sessionless attempt state to resume into.

use super::{Attempt, Ctx, FailOver, State};
use crate::error::Result;

/// Initial state: establish a coordination session
pub struct Connect;

impl Connect {
    pub(super) async fn run(self, ctx: &Ctx) -> Result<Option<State>> {
        match ctx
            .connector
            .connect(&ctx.config.coordination.endpoints, ctx.config.session_timeout())
            .await
        {
            Ok(session) => Ok(Some(State::Attempt(Attempt::new(Some(session))))),
            Err(e) => {
                tracing::error!(error = %e, "failed to open coordination session");
                Ok(Some(State::FailOver(FailOver::new(
                    e,
                    None,
                    State::Attempt(Attempt::new(None)),
                ))))
            }
        }
    }
}
