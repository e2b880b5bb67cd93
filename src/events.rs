// SessionEvents: tokio broadcast channel for status and lifecycle events
// Single Responsibility: fan-out of session events to presentation layers
//
// The tick loop is the only publisher. Subscribers (a UI, the CLI, tests)
// each get an independent receiver; slow subscribers lag and lose the oldest
// events rather than blocking the tick.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::calibration::CalibrateResult;
use crate::session::Mode;

/// Buffered events per subscriber before lagging
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Which dataset a persistence event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataKind {
    Calibration,
    Training,
    Test,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// User-facing status line changed
    Status(String),
    ModeChanged(Mode),
    /// Confident prediction on the live stream
    Prediction { label: u32, name: String },
    CalibrationFitted { process: usize, result: CalibrateResult },
    SampleAdded { label: u32, index: usize },
    SampleRemoved { label: u32, index: usize },
    TrainingStarted { generation: u64, num_samples: usize },
    TrainingFinished { generation: u64, success: bool },
    Saved(DataKind),
    Loaded(DataKind),
}

/// Broadcast sender plus subscription handle
#[derive(Clone)]
pub struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Subscribe to all events published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Publish an event; silently dropped when nobody is subscribed
    pub fn publish(&self, event: SessionEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain every event currently buffered for `receiver`
pub fn drain(receiver: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                log::warn!("Session event subscriber lagged, skipped {} events", skipped);
            }
            Err(_) => break,
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let events = SessionEvents::new();
        assert_eq!(events.subscriber_count(), 0);
        events.publish(SessionEvent::Status("idle".to_string()));
    }

    #[test]
    fn test_each_subscriber_receives_events() {
        let events = SessionEvents::new();
        let mut a = events.subscribe();
        let mut b = events.subscribe();

        events.publish(SessionEvent::ModeChanged(Mode::Training));
        events.publish(SessionEvent::Saved(DataKind::Test));

        assert_eq!(drain(&mut a).len(), 2);
        assert_eq!(
            drain(&mut b),
            vec![
                SessionEvent::ModeChanged(Mode::Training),
                SessionEvent::Saved(DataKind::Test)
            ]
        );
        assert!(drain(&mut a).is_empty());
    }
}
