//! Automaton Runner
//!
//! Drives the state machine: run the current state, replace it with the
//! returned successor, report every transition to the metrics
//! collector. Terminates when a state returns no successor or a carried
//! terminal error.

use std::sync::Arc;

use super::{Ctx, State};
use crate::error::Result;
use crate::metrics::Metrics;

/// Sequential state-machine driver
pub struct Runner {
    metrics: Arc<Metrics>,
}

impl Runner {
    /// Create a runner reporting to the given metrics collector
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    /// Run the automaton from `initial` until it terminates.
    ///
    /// The returned error is the cause carried out of the terminal
    /// state; a graceful end yields `Ok(())`.
    pub async fn run(&self, ctx: &Ctx, initial: State) -> Result<()> {
        let mut next = Some(initial);
        while let Some(state) = next {
            tracing::info!(
                state = state.name(),
                ordinal = state.ordinal(),
                "entering state"
            );
            self.metrics.record_transition(state.ordinal());
            next = state.run(ctx).await?;
        }
        tracing::info!("no next state, automaton finished");
        Ok(())
    }
}
