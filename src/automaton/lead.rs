//! Lead State (ordinal 2)
//!
//! Leader-exclusive work: a strict round-robin ring of numbered data
//! slots under the leader data directory, one write per tick, evicting
//! the oldest slot once the ring is full. A well-formed directory left
//! by a previous leader is continued from where it stopped; anything
//! else is treated as written under a different configuration and
//! purged.
//!
//! After a failover this state is resumed directly, without recreating
//! the election marker the old session released. The marker stays
//! absent until this process's leadership ends; contenders can then
//! claim it. Intentionally preserved behavior.

use super::{Ctx, FailOver, State, Stop};
use crate::coordination::{CreateMode, Session};
use crate::error::{Error, Result};

/// Leader state: rotate data slots until disrupted or cancelled
pub struct Lead {
    session: Option<Box<dyn Session>>,
}

impl Lead {
    pub fn new(session: Option<Box<dyn Session>>) -> Self {
        Self { session }
    }

    pub(super) fn with_session(mut self, session: Box<dyn Session>) -> Self {
        self.session = Some(session);
        self
    }

    /// A directory is well-formed when its children are exactly the
    /// contiguous slot names `0..count` for some count within capacity.
    fn is_well_formed(children: &[String], capacity: usize) -> bool {
        if children.len() > capacity {
            return false;
        }
        let mut indices = Vec::with_capacity(children.len());
        for name in children {
            match name.parse::<usize>() {
                Ok(idx) => indices.push(idx),
                Err(_) => return false,
            }
        }
        indices.sort_unstable();
        indices.iter().copied().eq(0..children.len())
    }

    /// Inspect a pre-existing data directory. Returns the rotation index
    /// to continue from, purging the directory when it was written under
    /// a different configuration.
    async fn reconcile_data_dir(session: &dyn Session, ctx: &Ctx) -> Result<usize> {
        let data_path = ctx.config.leader.data_path.as_str();
        let children = session.children(data_path).await?;

        if Self::is_well_formed(&children, ctx.config.leader.storage_capacity) {
            tracing::debug!(
                count = children.len(),
                "continuing previous leader's rotation"
            );
            return Ok(children.len());
        }

        tracing::debug!(
            count = children.len(),
            "data directory written under different configuration, purging"
        );
        for name in &children {
            session.delete(&format!("{data_path}/{name}"), -1).await?;
        }
        Ok(0)
    }

    /// Ensure the data directory exists and derive the starting index.
    async fn prepare_data_dir(session: &dyn Session, ctx: &Ctx) -> Result<usize> {
        let data_path = ctx.config.leader.data_path.as_str();
        match session.create(data_path, &[], CreateMode::Persistent).await {
            Ok(()) => Ok(0),
            Err(Error::NodeExists(_)) => Self::reconcile_data_dir(session, ctx).await,
            Err(e) => Err(e),
        }
    }

    pub(super) async fn run(mut self, ctx: &Ctx) -> Result<Option<State>> {
        let session = self
            .session
            .take()
            .ok_or_else(|| Error::Internal("lead state entered without a session".into()))?;

        let data_path = ctx.config.leader.data_path.as_str();
        let capacity = ctx.config.leader.storage_capacity;
        let mut tick = ctx.clock.ticker(ctx.config.write_interval());

        let mut fi = match Self::prepare_data_dir(&*session, ctx).await {
            Ok(start) => start,
            Err(e) => {
                tracing::error!(error = %e, "failed to prepare leader data directory");
                return Ok(Some(State::FailOver(FailOver::new(
                    e,
                    Some(session),
                    State::Lead(Lead::new(None)),
                ))));
            }
        };

        loop {
            tokio::select! {
                Some(_) = tick.tick() => {
                    let slot = format!("{data_path}/{}", fi % capacity);
                    // Evict the oldest slot before overwriting it. The
                    // delete-then-create order is load-bearing: a failed
                    // create leaves the slot absent until the next
                    // successful cycle.
                    if fi >= capacity {
                        if let Err(e) = session.delete(&slot, -1).await {
                            tracing::error!(error = %e, slot, "failed to evict data slot");
                            return Ok(Some(State::FailOver(FailOver::new(
                                e,
                                Some(session),
                                State::Lead(Lead::new(None)),
                            ))));
                        }
                    }
                    if let Err(e) = session.create(&slot, &[], CreateMode::Persistent).await {
                        tracing::error!(error = %e, slot, "failed to write data slot");
                        return Ok(Some(State::FailOver(FailOver::new(
                            e,
                            Some(session),
                            State::Lead(Lead::new(None)),
                        ))));
                    }
                    tracing::debug!(slot, "leader wrote data slot");
                    fi += 1;
                }
                _ = ctx.shutdown.cancelled() => {
                    return Ok(Some(State::Stop(Stop::new(
                        Some(session),
                        Some(ctx.shutdown.cause()),
                        "lead",
                    ))));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_well_formed_directories() {
        assert!(Lead::is_well_formed(&[], 5));
        assert!(Lead::is_well_formed(&names(&["0"]), 5));
        assert!(Lead::is_well_formed(&names(&["0", "1", "2"]), 5));
        // Order as listed does not matter, only the set
        assert!(Lead::is_well_formed(&names(&["2", "0", "1"]), 5));
        assert!(Lead::is_well_formed(&names(&["0", "1", "2", "3", "4"]), 5));
    }

    #[test]
    fn test_foreign_directories_detected() {
        // Over capacity
        assert!(!Lead::is_well_formed(
            &names(&["0", "1", "2", "3", "4", "5"]),
            5
        ));
        // Gap in the slot sequence
        assert!(!Lead::is_well_formed(&names(&["0", "2"]), 5));
        // Not starting at zero
        assert!(!Lead::is_well_formed(&names(&["1", "2"]), 5));
        // Non-numeric child
        assert!(!Lead::is_well_formed(&names(&["0", "stale"]), 5));
        // Duplicate index cannot happen in a namespace, but reject anyway
        assert!(!Lead::is_well_formed(&names(&["0", "0"]), 5));
    }
}
