//! Progress sampling and progress subscriptions.

use std::time::Duration;

use reelswarm_events::{Event, EventBus, TelemetrySnapshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Clamp a raw engine ratio into `[0, 1]`; NaN becomes `0`.
#[must_use]
pub fn clamp_ratio(raw: f64) -> f64 {
    if raw.is_nan() { 0.0 } else { raw.clamp(0.0, 1.0) }
}

/// Rate limiter for progress snapshots.
///
/// Publishes at most one snapshot per interval. The first snapshot of a session
/// and forced snapshots (the final one on completion) always pass.
#[derive(Debug)]
pub struct SessionTelemetryEmitter {
    interval: Duration,
    last_emit: Option<Instant>,
}

impl SessionTelemetryEmitter {
    /// Emitter allowing one snapshot per `interval`.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
        }
    }

    /// Whether a snapshot taken at `now` should be published.
    pub fn admit(&mut self, now: Instant, force: bool) -> bool {
        let due = self
            .last_emit
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval);
        if due || force {
            self.last_emit = Some(now);
            return true;
        }
        false
    }

    /// Forget the previous emission so the next session starts fresh.
    pub const fn reset(&mut self) {
        self.last_emit = None;
    }
}

/// Handle to an `on_progress` callback task.
///
/// Delivery stops when the handle is dropped or [`cancel`](Self::cancel)led.
#[derive(Debug)]
pub struct ProgressSubscription {
    task: JoinHandle<()>,
}

impl ProgressSubscription {
    /// Stop delivering snapshots.
    pub fn cancel(self) {
        drop(self);
    }

    /// Whether the callback task is still running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for ProgressSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Invoke `callback` with every progress snapshot published on `events`.
pub(crate) fn subscribe_progress<F>(events: &EventBus, mut callback: F) -> ProgressSubscription
where
    F: FnMut(TelemetrySnapshot) + Send + 'static,
{
    let mut stream = events.subscribe(None);
    let task = tokio::spawn(async move {
        while let Some(envelope) = stream.next().await {
            if let Event::Progress { snapshot, .. } = envelope.event {
                callback(snapshot);
            }
        }
    });
    ProgressSubscription { task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    #[test]
    fn ratio_is_clamped() {
        assert_eq!(clamp_ratio(f64::NAN), 0.0);
        assert_eq!(clamp_ratio(-0.4), 0.0);
        assert_eq!(clamp_ratio(1.7), 1.0);
        assert_eq!(clamp_ratio(f64::INFINITY), 1.0);
        assert!((clamp_ratio(0.25) - 0.25).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn emitter_coalesces_within_interval() {
        let mut emitter = SessionTelemetryEmitter::new(Duration::from_millis(250));
        let start = Instant::now();
        assert!(emitter.admit(start, false));
        assert!(!emitter.admit(start + Duration::from_millis(100), false));
        assert!(emitter.admit(start + Duration::from_millis(120), true));
        assert!(!emitter.admit(start + Duration::from_millis(300), false));
        assert!(emitter.admit(start + Duration::from_millis(370), false));

        emitter.reset();
        assert!(emitter.admit(start + Duration::from_millis(371), false));
    }

    #[tokio::test]
    async fn subscription_delivers_until_cancelled() {
        let bus = EventBus::with_capacity(16);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = subscribe_progress(&bus, move |snapshot| {
            if let Ok(mut seen) = sink.lock() {
                seen.push(snapshot.progress_ratio);
            }
        });

        let session_id = Uuid::new_v4();
        bus.publish(Event::StateChanged {
            session_id,
            state: reelswarm_events::SessionState::Resolving,
            message: None,
        });
        bus.publish(Event::Progress {
            session_id,
            snapshot: TelemetrySnapshot {
                progress_ratio: 0.5,
                download_rate: 10,
                upload_rate: 1,
            },
        });

        for _ in 0..50 {
            if seen.lock().map(|seen| seen.len()).unwrap_or_default() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(*seen.lock().expect("lock"), vec![0.5]);

        assert!(subscription.is_active());
        subscription.cancel();
        for _ in 0..50 {
            if bus.subscriber_count() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(bus.subscriber_count(), 0);
    }
}
