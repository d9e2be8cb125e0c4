//! `tokio::sync::broadcast` backed broadcaster.

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{trace, warn};

use super::{Broadcaster, RunEvent};

/// Default number of events buffered per subscriber before it lags.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out broadcaster: any number of subscribers, lossy, no replay.
///
/// Subscribers that fall more than `capacity` events behind skip the oldest
/// ones. Events published while nobody listens are dropped.
#[derive(Debug, Clone)]
pub struct ChannelBroadcaster {
    tx: broadcast::Sender<RunEvent>,
}

impl ChannelBroadcaster {
    /// Create a broadcaster buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Receive every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.tx.subscribe()
    }

    /// Receive the events of a single run published from now on.
    #[must_use]
    pub fn subscribe_run(&self, run_id: impl Into<String>) -> RunSubscription {
        RunSubscription::new(self.tx.subscribe(), run_id)
    }

    /// Current number of subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn publish(&self, event: RunEvent) {
        if let Err(broadcast::error::SendError(event)) = self.tx.send(event) {
            trace!(event = %event.name, run_id = %event.run_id, "no subscribers");
        }
    }
}

/// Subscription filtered to one run.
#[derive(Debug)]
pub struct RunSubscription {
    run_id: String,
    rx: broadcast::Receiver<RunEvent>,
}

impl RunSubscription {
    /// Filter an existing receiver down to one run.
    ///
    /// Subscribing before the run exists and filtering once its ID is known
    /// guarantees no event of the run is missed.
    #[must_use]
    pub fn new(rx: broadcast::Receiver<RunEvent>, run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            rx,
        }
    }

    /// Run this subscription follows.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Next event of the run, or `None` once the broadcaster is gone.
    ///
    /// Lagging skips the lost events with a warning.
    pub async fn recv(&mut self) -> Option<RunEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.run_id == self.run_id => return Some(event),
                Ok(_) => {}
                Err(RecvError::Closed) => return None,
                Err(RecvError::Lagged(n)) => {
                    warn!(run_id = %self.run_id, skipped = n, "event subscriber lagged, some events dropped");
                }
            }
        }
    }
}
