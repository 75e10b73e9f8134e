//! Injected Clock Capability
//!
//! States never reach for the runtime's timers directly; they receive a
//! `Clock` and ask it for recurring ticks or one-shot delays. Both kinds
//! are delivered through the same `TickStream` handle so a state can
//! swap a ticker for a timer mid-loop (the failover backoff does this),
//! and dropping the handle cancels the underlying timer.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Source of recurring ticks and one-shot delay signals
pub trait Clock: Send + Sync {
    /// A recurring tick at a fixed period. The first tick fires one full
    /// period after the call.
    fn ticker(&self, period: Duration) -> TickStream;

    /// A single tick after the given delay.
    fn timer(&self, delay: Duration) -> TickStream;
}

/// Handle to a running ticker or timer.
///
/// The producing task is aborted when the stream is dropped.
pub struct TickStream {
    rx: mpsc::Receiver<()>,
    task: JoinHandle<()>,
}

impl TickStream {
    /// Wait for the next tick. Returns `None` once the source is
    /// exhausted (a one-shot that already fired).
    pub async fn tick(&mut self) -> Option<()> {
        self.rx.recv().await
    }
}

impl Drop for TickStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Clock backed by the tokio runtime timers
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn ticker(&self, period: Duration) -> TickStream {
        let (tx, rx) = mpsc::channel(1);
        let task = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(()).await.is_err() {
                    break;
                }
            }
        });
        TickStream { rx, task }
    }

    fn timer(&self, delay: Duration) -> TickStream {
        let (tx, rx) = mpsc::channel(1);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(()).await;
        });
        TickStream { rx, task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ticker_fires_at_period() {
        let clock = TokioClock;
        let start = tokio::time::Instant::now();
        let mut ticks = clock.ticker(Duration::from_millis(100));

        ticks.tick().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(100));
        ticks.tick().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_once() {
        let clock = TokioClock;
        let start = tokio::time::Instant::now();
        let mut timer = clock.timer(Duration::from_millis(250));

        assert_eq!(timer.tick().await, Some(()));
        assert_eq!(start.elapsed(), Duration::from_millis(250));
        // Exhausted after the single shot
        assert_eq!(timer.tick().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_ticker() {
        let clock = TokioClock;
        let ticks = clock.ticker(Duration::from_millis(10));
        drop(ticks);
        // Nothing to assert beyond not hanging; the task was aborted.
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
