//! Common types shared across the dm-bot.

use chrono::{DateTime, Utc};

/// The error type used throughout the crate.
pub type Err = anyhow::Error;
/// A result with the crate's error type.
pub type Res<T> = Result<T, Err>;
/// A result with no value.
pub type Void = Res<()>;

/// The kind of an embed attached to a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbedKind {
    /// A structured, platform-rendered embed (title / description / fields).
    Rich,
    /// Anything else the platform generates (link previews, images, videos, ...).
    Other(String),
}

/// Platform-neutral view of a message seen in a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Message ID.
    pub id: u64,
    /// Channel the message was posted in.
    pub channel_id: u64,
    /// Guild name, when known.
    pub guild_name: Option<String>,
    /// Author's user ID.
    pub author_id: u64,
    /// Whether the author is a bot.
    pub author_is_bot: bool,
    /// Text body.
    pub content: String,
    /// Kinds of the attached embeds, in order.
    pub embeds: Vec<EmbedKind>,
    /// Link back to the message.
    pub jump_url: String,
}

impl ChatMessage {
    /// The first whitespace-delimited token of the message, if any.
    pub fn leading_token(&self) -> Option<&str> {
        self.content.split_whitespace().next()
    }

    /// Whether any attached embed is a rich embed.
    pub fn has_rich_embed(&self) -> bool {
        self.embeds.iter().any(|e| *e == EmbedKind::Rich)
    }
}

/// A single field of a [`Notification`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationField {
    /// Field label.
    pub name: String,
    /// Field content.
    pub value: String,
    /// Whether the field may share a row with its neighbours.
    pub inline: bool,
}

/// Platform-neutral rich payload delivered to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Title line.
    pub title: String,
    /// Body text under the title.
    pub description: String,
    /// Accent color as `0xRRGGBB`.
    pub color: u32,
    /// Optional thumbnail image.
    pub thumbnail_url: Option<String>,
    /// Ordered fields.
    pub fields: Vec<NotificationField>,
    /// When the notification was built.
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// Look up a field value by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.value.as_str())
    }
}
