//! Stop State (ordinal 4, terminal)
//!
//! Closes the held session (releasing any ephemeral nodes with it) and
//! ends the automaton, surfacing the carried cause. Closing is
//! idempotent: a missing or already-closed session is a no-op.

use super::{Ctx, State};
use crate::coordination::Session;
use crate::error::{Error, Result};

/// Terminal state: release resources and report the cause
pub struct Stop {
    session: Option<Box<dyn Session>>,
    cause: Option<Error>,
    last_state: &'static str,
}

impl Stop {
    pub fn new(
        session: Option<Box<dyn Session>>,
        cause: Option<Error>,
        last_state: &'static str,
    ) -> Self {
        Self {
            session,
            cause,
            last_state,
        }
    }

    pub(super) async fn run(mut self, _ctx: &Ctx) -> Result<Option<State>> {
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }

        match self.cause {
            Some(cause) => {
                tracing::info!(last_state = self.last_state, cause = %cause, "automaton stopped");
                Err(cause)
            }
            None => {
                tracing::info!(last_state = self.last_state, "automaton stopped");
                Ok(None)
            }
        }
    }
}
