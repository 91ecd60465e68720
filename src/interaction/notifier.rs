//! Builds and delivers command alerts.

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::{
    base::types::{ChatMessage, Notification, NotificationField},
    service::chat::ChatClient,
};

/// Number of characters of a reply kept in an alert.
pub const REPLY_PREVIEW_CHARS: usize = 80;

/// Content shown when the reply is a rich embed.
pub const EMBED_REPLY_TEXT: &str = "The bot sent an embed.";

/// Longest value Discord accepts for an embed field.
pub const FIELD_VALUE_CHARS: usize = 1024;

/// Shown in place of a field that would otherwise be empty (e.g., an attachment-only reply).
pub const EMPTY_FIELD_TEXT: &str = "*No text.*";

pub const ALERT_TITLE: &str = "Command Alert";
pub const ALERT_COLOR: u32 = 0x000000;

/// Pick the "Bot's Reply" value for a correlated reply.
pub fn reply_content(reply: &ChatMessage) -> String {
    if reply.has_rich_embed() {
        return EMBED_REPLY_TEXT.to_string();
    }

    if !reply.embeds.is_empty() {
        let link_name: String = reply.content.chars().take(REPLY_PREVIEW_CHARS).collect();
        return format!("[{}...]({})", link_name, reply.content);
    }

    truncate(&reply.content, REPLY_PREVIEW_CHARS)
}

/// Keep the first `max` characters, marking the cut with an ellipsis.
fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

/// Make a value acceptable as an embed field: never empty, never over the limit.
fn field_value(value: String) -> String {
    if value.trim().is_empty() {
        return EMPTY_FIELD_TEXT.to_string();
    }

    match value.char_indices().nth(FIELD_VALUE_CHARS - 3) {
        Some((end, _)) if value.chars().count() > FIELD_VALUE_CHARS => format!("{}...", &value[..end]),
        _ => value,
    }
}

/// Build the alert for a tracked command and its correlated reply.
pub fn build_alert(message: &ChatMessage, command: &str, reply: &ChatMessage, thumbnail_url: Option<&str>) -> Notification {
    let guild = message.guild_name.as_deref().unwrap_or("a direct message");

    Notification {
        title: ALERT_TITLE.to_string(),
        description: format!("You just used `{}` in {}", command, guild),
        color: ALERT_COLOR,
        thumbnail_url: thumbnail_url.map(str::to_string),
        fields: vec![
            NotificationField {
                name: "Message".to_string(),
                value: field_value(message.content.clone()),
                inline: false,
            },
            NotificationField {
                name: "Bot's Reply".to_string(),
                value: field_value(reply_content(reply)),
                inline: false,
            },
            NotificationField {
                name: "Conversation".to_string(),
                value: format!("[Jump to message!]({})", message.jump_url),
                inline: false,
            },
        ],
        timestamp: Utc::now(),
    }
}

/// Send the alert to the author of the original message.
///
/// Delivery failures (e.g., the user does not accept DMs) are logged and swallowed.
#[instrument(skip_all, fields(user_id = message.author_id, command = command))]
pub async fn notify(chat: &ChatClient, message: &ChatMessage, command: &str, reply: &ChatMessage, thumbnail_url: Option<&str>) {
    let alert = build_alert(message, command, reply, thumbnail_url);

    match chat.send_direct_notification(message.author_id, &alert).await {
        Ok(()) => info!("Sent command alert."),
        Err(err) => warn!("Failed to deliver command alert: {}", err),
    }
}

// Tests.
