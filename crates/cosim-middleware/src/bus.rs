//! Topic-partitioned publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Telemetry`] | Ego state mirrored into the traffic simulator after each sync |
//! | [`Topic::Commands`] | Lane-change / acceleration commands and physics pose targets |
//! | [`Topic::Faults`] | Simulator call failures and deadline overruns |

use cosim_types::{BridgeError, Event};
use tokio::sync::broadcast;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
pub const DEFAULT_CAPACITY: usize = 256;

/// Routing topics on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Mirrored ego state, one event per successful sync.
    Telemetry,
    /// Inbound work for the ego adapter.
    Commands,
    /// Authority faults and timeouts.
    Faults,
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    telemetry: broadcast::Sender<Event>,
    commands: broadcast::Sender<Event>,
    faults: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently.
    pub fn new(capacity: usize) -> Self {
        let (telemetry, _) = broadcast::channel(capacity);
        let (commands, _) = broadcast::channel(capacity);
        let (faults, _) = broadcast::channel(capacity);
        Self {
            telemetry,
            commands,
            faults,
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the event, or
    /// [`BridgeError::Channel`] when nobody is listening on the topic.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, BridgeError> {
        self.topic_sender(topic)
            .send(event)
            .map_err(|_| BridgeError::Channel(format!("No subscribers for topic {topic:?}")))
    }

    /// Subscribe to a specific [`Topic`] channel.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Number of live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topic_sender(topic).receiver_count()
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Telemetry => &self.telemetry,
            Topic::Commands => &self.commands,
            Topic::Faults => &self.faults,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.  The caller decides whether to
    ///   continue or abort.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Non-blocking variant of [`recv`][Self::recv].
    pub fn try_recv(&mut self) -> Result<Event, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosim_types::{EventPayload, VehicleCommand};

    fn make_event(source: &str) -> Event {
        Event::new(source, EventPayload::Command(VehicleCommand::new(1, -100.0)))
    }

    #[test]
    fn publish_without_subscribers_returns_channel_error() {
        let bus = EventBus::default();
        let result = bus.publish_to(Topic::Telemetry, make_event("test"));
        assert!(matches!(result, Err(BridgeError::Channel(_))));
    }

    #[tokio::test]
    async fn topic_multiple_subscribers_receive_same_event() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut subscriber1 = bus.subscribe_to(Topic::Commands);
        let mut subscriber2 = bus.subscribe_to(Topic::Commands);

        let event = make_event("ingest");
        assert_eq!(bus.publish_to(Topic::Commands, event.clone())?, 2);

        assert_eq!(subscriber1.recv().await?.id, event.id);
        assert_eq!(subscriber2.recv().await?.id, event.id);
        Ok(())
    }

    #[tokio::test]
    async fn topic_subscriber_does_not_receive_other_topic_events() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut faults = bus.subscribe_to(Topic::Faults);
        let _commands = bus.subscribe_to(Topic::Commands);

        bus.publish_to(Topic::Commands, make_event("ingest"))?;

        let result =
            tokio::time::timeout(std::time::Duration::from_millis(50), faults.recv()).await;
        assert!(result.is_err(), "Faults subscriber must not receive a Commands event");
        assert_eq!(faults.topic(), Topic::Faults);
        Ok(())
    }

    #[test]
    fn try_recv_is_empty_until_published() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Topic::Commands);
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
        bus.publish_to(Topic::Commands, make_event("ingest")).unwrap();
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn topic_channel_lag_on_slow_subscriber() {
        let bus = EventBus::new(16);
        let mut slow = bus.subscribe_to(Topic::Telemetry);
        for _ in 0..1_000 {
            let _ = bus.publish_to(Topic::Telemetry, make_event("flood"));
        }
        let result = slow.recv().await;
        assert!(
            matches!(result, Err(broadcast::error::RecvError::Lagged(_))),
            "expected Lagged error, got: {result:?}"
        );
    }

    #[test]
    fn subscriber_count_tracks_receivers() {
        let bus = EventBus::default();
        assert_eq!(bus.subscriber_count(Topic::Faults), 0);
        let rx = bus.subscribe_to(Topic::Faults);
        assert_eq!(bus.subscriber_count(Topic::Faults), 1);
        drop(rx);
        assert_eq!(bus.subscriber_count(Topic::Faults), 0);
    }
}
