//! Broadcast stream of every message the bot observes.
//!
//! Correlation attempts subscribe to the bus to watch for the next message in
//! a channel. Dropping a [`ChannelWatch`] unsubscribes it.
//!
//! Gateway events are dispatched on separate tasks, so a fast reply can reach the bus
//! before the message it answers. The bus keeps a short history, and a new watch replays
//! anything in its channel that is newer than its trigger. Message IDs are snowflakes,
//! so a larger ID is a later message.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, instrument, warn};

use crate::base::types::ChatMessage;

/// Default number of messages buffered per subscriber.
const DEFAULT_CAPACITY: usize = 1024;

/// Number of recent messages kept for replay into new watches.
const HISTORY_CAPACITY: usize = 64;

/// Message bus shared by the event handler and correlation attempts.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct MessageBus {
    sender: broadcast::Sender<ChatMessage>,
    history: Arc<Mutex<VecDeque<ChatMessage>>>,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl MessageBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);

        Self {
            sender,
            history: Arc::new(Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY))),
        }
    }

    /// Publish a message to every live watch.
    pub fn publish(&self, message: ChatMessage) {
        // Recording and sending happen under the same lock as `watch`, so every message is
        // either replayed into a watch or received by it, never both.
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());

        if history.len() == HISTORY_CAPACITY {
            history.pop_front();
        }
        history.push_back(message.clone());

        // No subscribers is the common case between human messages.
        let _ = self.sender.send(message);
    }

    /// Start watching the channel the trigger was posted in.
    ///
    /// Messages already published in that channel with a larger ID than the trigger are
    /// replayed first, in ID order.
    pub fn watch(&self, trigger: &ChatMessage) -> ChannelWatch {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());

        let mut backlog: Vec<ChatMessage> = history.iter().filter(|m| m.channel_id == trigger.channel_id && m.id > trigger.id).cloned().collect();
        backlog.sort_by_key(|m| m.id);

        ChannelWatch {
            receiver: self.sender.subscribe(),
            backlog: backlog.into(),
            channel_id: trigger.channel_id,
            trigger_id: trigger.id,
        }
    }

    /// Number of live watches.
    pub fn watcher_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Which watcher fired first for a channel watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextMessage {
    /// The next message in the channel came from a bot.
    Bot(ChatMessage),
    /// The next message in the channel came from a human.
    Human(ChatMessage),
    /// Nothing arrived before the timeout (or the bus closed).
    Nothing,
}

impl NextMessage {
    /// The correlated bot reply, if the bot watcher won.
    pub fn into_bot_reply(self) -> Option<ChatMessage> {
        match self {
            NextMessage::Bot(message) => Some(message),
            _ => None,
        }
    }
}

/// A subscription scoped to one channel, on behalf of one triggering message.
pub struct ChannelWatch {
    receiver: broadcast::Receiver<ChatMessage>,
    backlog: VecDeque<ChatMessage>,
    channel_id: u64,
    trigger_id: u64,
}

impl ChannelWatch {
    /// Race the "next bot message" watcher against the "next human message" watcher.
    ///
    /// Both watchers observe the same ordered stream, so the first message in the
    /// channel that satisfies either predicate decides the race. The watch is consumed
    /// and its subscription dropped when this returns, whichever way it resolves.
    #[instrument(skip(self), fields(channel_id = self.channel_id, trigger_id = self.trigger_id))]
    pub async fn race(mut self, timeout: Duration) -> NextMessage {
        let bot = |m: &ChatMessage| m.author_is_bot;
        let human = |m: &ChatMessage| !m.author_is_bot;

        let race = async {
            loop {
                if let Some(message) = self.backlog.pop_front() {
                    if bot(&message) {
                        return NextMessage::Bot(message);
                    }

                    if human(&message) {
                        return NextMessage::Human(message);
                    }

                    continue;
                }

                let message = match self.receiver.recv().await {
                    Ok(message) => message,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Channel watch lagged behind by {} messages.", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => return NextMessage::Nothing,
                };

                if message.channel_id != self.channel_id || message.id == self.trigger_id {
                    continue;
                }

                if bot(&message) {
                    return NextMessage::Bot(message);
                }

                if human(&message) {
                    return NextMessage::Human(message);
                }
            }
        };

        match tokio::time::timeout(timeout, race).await {
            Ok(next) => next,
            Err(_) => {
                debug!("No message arrived in the channel before the timeout.");
                NextMessage::Nothing
            }
        }
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: u64, channel_id: u64, author_is_bot: bool) -> ChatMessage {
        ChatMessage {
            id,
            channel_id,
            guild_name: Some("Guild".to_string()),
            author_id: if author_is_bot { 99 } else { 7 },
            author_is_bot,
            content: format!("message {id}"),
            embeds: vec![],
            jump_url: String::new(),
        }
    }

    #[tokio::test]
    async fn bot_reply_wins() {
        let bus = MessageBus::default();
        let trigger = message(1, 10, false);
        let watch = bus.watch(&trigger);

        bus.publish(trigger);
        bus.publish(message(2, 10, true));

        assert_eq!(watch.race(Duration::from_secs(1)).await, NextMessage::Bot(message(2, 10, true)));
    }

    #[tokio::test]
    async fn human_reply_wins() {
        let bus = MessageBus::default();
        let trigger = message(1, 10, false);
        let watch = bus.watch(&trigger);

        bus.publish(trigger);
        bus.publish(message(2, 10, false));
        bus.publish(message(3, 10, true));

        assert_eq!(watch.race(Duration::from_secs(1)).await, NextMessage::Human(message(2, 10, false)));
    }

    #[tokio::test]
    async fn other_channels_are_ignored() {
        let bus = MessageBus::default();
        let trigger = message(1, 10, false);
        let watch = bus.watch(&trigger);

        bus.publish(trigger);
        bus.publish(message(2, 11, false));
        bus.publish(message(3, 10, true));

        assert_eq!(watch.race(Duration::from_secs(1)).await, NextMessage::Bot(message(3, 10, true)));
    }

    #[tokio::test]
    async fn timeout_yields_nothing_and_unsubscribes() {
        let bus = MessageBus::default();
        let trigger = message(1, 10, false);
        let watch = bus.watch(&trigger);

        assert_eq!(bus.watcher_count(), 1);
        assert_eq!(watch.race(Duration::from_millis(20)).await, NextMessage::Nothing);
        assert_eq!(bus.watcher_count(), 0);
    }

    #[tokio::test]
    async fn lagging_watch_still_resolves() {
        let bus = MessageBus::new(1);
        let trigger = message(1, 10, false);
        let watch = bus.watch(&trigger);

        bus.publish(trigger);
        bus.publish(message(2, 11, false));
        bus.publish(message(3, 10, true));

        assert_eq!(watch.race(Duration::from_secs(1)).await, NextMessage::Bot(message(3, 10, true)));
    }

    #[tokio::test]
    async fn reply_published_before_the_watch_is_replayed() {
        let bus = MessageBus::default();
        let trigger = message(5, 10, false);

        bus.publish(message(4, 10, true));
        bus.publish(message(6, 11, false));
        bus.publish(message(7, 10, true));

        let watch = bus.watch(&trigger);
        bus.publish(trigger);

        assert_eq!(watch.race(Duration::from_secs(1)).await, NextMessage::Bot(message(7, 10, true)));
    }

    #[tokio::test]
    async fn replay_keeps_id_order() {
        let bus = MessageBus::default();
        let trigger = message(5, 10, false);

        bus.publish(message(8, 10, true));
        bus.publish(message(6, 10, false));

        let watch = bus.watch(&trigger);

        assert_eq!(watch.race(Duration::from_secs(1)).await, NextMessage::Human(message(6, 10, false)));
    }
}
