//! Correlates a user's tracked command with the reply another bot gives to it.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, instrument};

use crate::{
    base::{
        config::Config,
        types::{ChatMessage, Res, Void},
    },
    service::{chat::ChatClient, db::DbClient},
};

use super::{
    bus::{ChannelWatch, MessageBus},
    notifier,
};

/// Timing and presentation knobs for correlation attempts.
#[derive(Debug, Clone)]
pub struct CorrelationSettings {
    /// Minimum time an attempt takes, measured from when its race starts.
    pub settle_delay: Duration,
    /// Upper bound on how long the race waits for the next channel message.
    pub reply_timeout: Duration,
    /// Thumbnail attached to alerts.
    pub thumbnail_url: Option<String>,
}

impl From<&Config> for CorrelationSettings {
    fn from(config: &Config) -> Self {
        Self {
            settle_delay: config.settle_delay(),
            reply_timeout: config.reply_timeout(),
            thumbnail_url: config.alert_thumbnail_url.clone(),
        }
    }
}

/// The outcome of one correlation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correlation {
    pub message: ChatMessage,
    pub command: String,
    pub reply: ChatMessage,
}

/// Watches channel activity on behalf of users' tracked commands.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Correlator {
    db: DbClient,
    chat: ChatClient,
    bus: MessageBus,
    settings: CorrelationSettings,
}

impl Correlator {
    pub fn new(db: DbClient, chat: ChatClient, bus: MessageBus, settings: CorrelationSettings) -> Self {
        Self { db, chat, bus, settings }
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Entry point for every message seen in a channel.
    ///
    /// Bot messages are only published, so they can be picked up as replies. Human
    /// messages additionally start a correlation attempt on a spawned task, whose
    /// handle is returned.
    #[instrument(skip_all, fields(message_id = message.id, channel_id = message.channel_id))]
    pub fn handle_message(&self, message: ChatMessage) -> Option<JoinHandle<()>> {
        if message.author_is_bot {
            self.bus.publish(message);
            return None;
        }

        // Subscribe before publishing, so nothing that follows the trigger is missed.
        let watch = self.bus.watch(&message);
        self.bus.publish(message.clone());

        let correlator = self.clone();

        let handle = tokio::spawn(
            async move {
                // Process the event.
                let result = correlator.handle_message_internal(message, watch).await;

                // Log any errors.
                if let Err(err) = &result {
                    error!("Error while handling: {}", err);
                }
            }
            .in_current_span(),
        );

        Some(handle)
    }

    #[instrument(skip_all)]
    async fn handle_message_internal(&self, message: ChatMessage, watch: ChannelWatch) -> Void {
        let Some(correlation) = self.correlate(message, watch).await? else {
            return Ok(());
        };

        notifier::notify(&self.chat, &correlation.message, &correlation.command, &correlation.reply, self.settings.thumbnail_url.as_deref()).await;

        Ok(())
    }

    /// Run one correlation attempt for a human message.
    ///
    /// The command lookup, the race for the next channel message and the settle delay
    /// all run concurrently. The race is dropped, and its subscription with it, before
    /// this returns.
    #[instrument(skip_all)]
    pub async fn correlate(&self, message: ChatMessage, watch: ChannelWatch) -> Res<Option<Correlation>> {
        let settle = tokio::time::sleep(self.settings.settle_delay);
        let race = watch.race(self.settings.reply_timeout);

        let (command, next, ()) = tokio::join!(self.match_command(&message), race, settle);

        let Some(command) = command? else {
            debug!("Message is not a tracked command.");
            return Ok(None);
        };

        let Some(reply) = next.into_bot_reply() else {
            debug!("No bot replied to `{}`.", command);
            return Ok(None);
        };

        info!("Correlated `{}` with reply `{}`.", command, reply.id);

        Ok(Some(Correlation { message, command, reply }))
    }

    /// Find the enabled command the message starts with, if any.
    async fn match_command(&self, message: &ChatMessage) -> Res<Option<String>> {
        let Some(token) = message.leading_token() else {
            return Ok(None);
        };

        let commands = self.db.list_enabled_commands(message.author_id).await?;

        Ok(match_token(token, &commands).map(str::to_string))
    }
}

/// Exact, case-sensitive comparison of the leading token against the user's commands.
fn match_token<'a>(token: &str, commands: &'a [String]) -> Option<&'a str> {
    commands.iter().map(String::as_str).find(|command| *command == token)
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    fn commands(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn token_matches_exactly() {
        let commands = commands(&["$wa", "!roll"]);

        assert_eq!(match_token("!roll", &commands), Some("!roll"));
        assert_eq!(match_token("!rol", &commands), None);
        assert_eq!(match_token("!rolls", &commands), None);
    }

    #[test]
    fn token_match_is_case_sensitive() {
        let commands = commands(&["$wa"]);

        assert_eq!(match_token("$WA", &commands), None);
    }

    #[test]
    fn no_commands_never_match() {
        assert_eq!(match_token("$wa", &[]), None);
    }
}
