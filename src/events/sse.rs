//! Server-sent-events framing of a run's progress.
//!
//! A stream follows one run and yields ready-to-write frames:
//!
//! | run event       | frames                 |
//! |-----------------|------------------------|
//! | `run.progress`  | `progress`             |
//! | `run.completed` | `completed`, `end`     |
//! | `run.failed`    | `failed`, `end`        |
//!
//! Other events are not forwarded. While the run is quiet a comment frame
//! keeps intermediaries from closing the connection.

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use super::{EventName, RunEvent, RunSubscription};
use crate::Result;

/// Keep-alive comment frame.
pub const KEEP_ALIVE_FRAME: &str = ":\n\n";

/// Default keep-alive period.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Encode one `event:`/`data:` frame with a JSON payload.
///
/// # Errors
///
/// Returns [`crate::Error::Serialization`] if `data` cannot be encoded.
pub fn frame<T: Serialize + ?Sized>(event: &str, data: &T) -> Result<String> {
    let data = serde_json::to_string(data)?;
    Ok(format!("event: {event}\ndata: {data}\n\n"))
}

/// SSE frame source for one run.
#[derive(Debug)]
pub struct SseStream {
    subscription: RunSubscription,
    keep_alive: Interval,
    pending: VecDeque<String>,
    finished: bool,
}

impl SseStream {
    /// Stream over `subscription` with the default 15 s keep-alive.
    #[must_use]
    pub fn new(subscription: RunSubscription) -> Self {
        Self::with_keep_alive(subscription, DEFAULT_KEEP_ALIVE)
    }

    /// Stream over `subscription` with a custom keep-alive period.
    #[must_use]
    pub fn with_keep_alive(subscription: RunSubscription, period: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        let mut keep_alive = time::interval_at(Instant::now() + period, period);
        keep_alive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            subscription,
            keep_alive,
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// Next frame to write, or `None` after `end` (or once events stop
    /// arriving for good).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Serialization`] if an event cannot be encoded.
    pub async fn next_frame(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(Some(frame));
            }
            if self.finished {
                return Ok(None);
            }

            let received = tokio::select! {
                event = self.subscription.recv() => Some(event),
                _ = self.keep_alive.tick() => None,
            };
            match received {
                Some(Some(event)) => self.enqueue(&event)?,
                Some(None) => self.finished = true,
                None => return Ok(Some(KEEP_ALIVE_FRAME.to_string())),
            }
        }
    }

    fn enqueue(&mut self, event: &RunEvent) -> Result<()> {
        let name = match event.name {
            EventName::RunProgress => "progress",
            EventName::RunCompleted => "completed",
            EventName::RunFailed => "failed",
            _ => return Ok(()),
        };
        self.pending.push_back(frame(name, event)?);
        if event.name.is_terminal() {
            self.pending.push_back(frame("end", &serde_json::json!({}))?);
            self.finished = true;
        }
        // A forwarded event resets the quiet period.
        self.keep_alive.reset();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Broadcaster, ChannelBroadcaster};

    #[test]
    fn test_frame_format() {
        let frame = frame("end", &serde_json::json!({})).unwrap();
        assert_eq!(frame, "event: end\ndata: {}\n\n");
    }

    #[tokio::test]
    async fn test_completed_run_frames() {
        let events = ChannelBroadcaster::new(16);
        let mut stream = SseStream::new(events.subscribe_run("run-1"));

        events.publish(RunEvent::started("run-1", "exp-1"));
        events.publish(RunEvent::progress("run-1", "exp-1", 1, 1));
        events.publish(RunEvent::completed("run-1", "exp-1"));

        let progress = stream.next_frame().await.unwrap().unwrap();
        assert!(progress.starts_with("event: progress\ndata: {"));
        assert!(progress.contains("\"run_id\":\"run-1\""));

        let completed = stream.next_frame().await.unwrap().unwrap();
        assert!(completed.starts_with("event: completed\n"));

        let end = stream.next_frame().await.unwrap().unwrap();
        assert_eq!(end, "event: end\ndata: {}\n\n");

        assert!(stream.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_run_frames() {
        let events = ChannelBroadcaster::new(16);
        let mut stream = SseStream::new(events.subscribe_run("run-1"));

        events.publish(RunEvent::failed("run-1", "exp-1", "provider down"));

        let failed = stream.next_frame().await.unwrap().unwrap();
        assert!(failed.starts_with("event: failed\n"));
        assert!(failed.contains("provider down"));
        assert!(stream
            .next_frame()
            .await
            .unwrap()
            .unwrap()
            .starts_with("event: end\n"));
        assert!(stream.next_frame().await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_alive_while_quiet() {
        let events = ChannelBroadcaster::new(16);
        let mut stream =
            SseStream::with_keep_alive(events.subscribe_run("run-1"), Duration::from_secs(15));

        let frame = stream.next_frame().await.unwrap().unwrap();
        assert_eq!(frame, KEEP_ALIVE_FRAME);
    }
}
