//! Position fast path
//!
//! Playback position changes far more often than anything else a source
//! reports, so it bypasses the event path: the source writes its position into
//! a [`PositionCell`] and a [`PositionPump`] samples it on an interval.
//!
//! The pump is split into a producer task that reads the source and a
//! consumer task that delivers to the dispatcher, joined by a single-slot
//! `watch` channel. A slow consumer therefore only ever sees the newest
//! position; intermediate samples are overwritten, never queued.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

/// Anything the pump can sample a position (milliseconds) from
pub trait PositionSource: Send + Sync + 'static {
    /// Current position, or `None` when no consistent value is available
    /// (the tick is then skipped)
    fn read_position(&self) -> Option<i64>;
}

impl<F> PositionSource for F
where
    F: Fn() -> Option<i64> + Send + Sync + 'static,
{
    fn read_position(&self) -> Option<i64> {
        self()
    }
}

/// Lock-free single-value position slot shared between a source and its pump
#[derive(Debug)]
pub struct PositionCell {
    value: AtomicI64,
}

/// Marker for "never written"
const UNSET: i64 = i64::MIN;

impl PositionCell {
    pub fn new() -> Self {
        Self {
            value: AtomicI64::new(UNSET),
        }
    }

    /// Publish the current position
    pub fn write(&self, position: i64) {
        self.value.store(position.max(0), Ordering::Release);
    }

    /// Latest published position, `None` until the first write
    pub fn read(&self) -> Option<i64> {
        match self.value.load(Ordering::Acquire) {
            UNSET => None,
            position => Some(position.max(0)),
        }
    }
}

impl Default for PositionCell {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionSource for PositionCell {
    fn read_position(&self) -> Option<i64> {
        self.read()
    }
}

/// Running producer/consumer pair for one source
///
/// Dropping the pump aborts both tasks.
pub struct PositionPump {
    producer: JoinHandle<()>,
    consumer: JoinHandle<()>,
    interval: Duration,
}

impl PositionPump {
    /// Start sampling `source` every `interval`
    ///
    /// # Arguments
    /// * `runtime` - Runtime the two tasks are spawned on
    /// * `source` - Position source; a `None` read skips the tick
    /// * `interval` - Sampling period (the caller applies any lower bound)
    /// * `on_sample` - Called by the producer with every sampled value
    /// * `on_deliver` - Called by the consumer with the newest value
    pub fn spawn<S, R, D>(
        runtime: &Handle,
        source: Arc<S>,
        interval: Duration,
        on_sample: R,
        on_deliver: D,
    ) -> Self
    where
        S: PositionSource + ?Sized,
        R: Fn(i64) + Send + 'static,
        D: Fn(i64) + Send + 'static,
    {
        let (tx, mut rx) = watch::channel::<Option<i64>>(None);

        let producer = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(position) = source.read_position() else {
                    trace!("Position unavailable, skipping tick");
                    continue;
                };
                let position = position.max(0);
                on_sample(position);
                if tx.send(Some(position)).is_err() {
                    break;
                }
            }
        });

        let consumer = runtime.spawn(async move {
            while rx.changed().await.is_ok() {
                let latest = *rx.borrow_and_update();
                if let Some(position) = latest {
                    on_deliver(position);
                }
            }
        });

        debug!("Position pump started ({}ms)", interval.as_millis());
        Self {
            producer,
            consumer,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Stop both tasks
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for PositionPump {
    fn drop(&mut self) {
        self.producer.abort();
        self.consumer.abort();
        debug!("Position pump stopped");
    }
}
