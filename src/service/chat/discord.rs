//! Discord integration for dm-bot.
//!
//! This module provides functionality for interacting with Discord:
//! - Receiving messages and prefix commands over the gateway
//! - Dispatching messages to the correlator and commands to the registry
//! - Sending command alerts by direct message
//!
//! It implements the `GenericChatClient` trait on top of serenity, with poise as
//! the command front end.

use std::sync::Arc;

use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use tracing::{error, info, instrument, warn};

use crate::{
    base::{
        config::Config,
        types::{ChatMessage, EmbedKind, Notification, Res, Void},
    },
    interaction::{
        bus::MessageBus,
        correlator::{CorrelationSettings, Correlator},
        registry,
    },
    service::db::DbClient,
};

use super::{ChatClient, GenericChatClient};

// Type aliases.

type Error = anyhow::Error;
type Context<'a> = poise::Context<'a, BotState, Error>;

// Extra methods on `ChatClient` applied by the discord implementation.

impl ChatClient {
    /// Creates a new Discord chat client.
    pub async fn discord(config: &Config, db: DbClient) -> Res<Self> {
        let client = DiscordChatClient::new(config, db).await?;
        Ok(Self { inner: Arc::new(client) })
    }
}

impl From<DiscordChatClient> for ChatClient {
    fn from(client: DiscordChatClient) -> Self {
        Self { inner: Arc::new(client) }
    }
}

// Structs.

/// User state for the poise framework.
struct BotState {
    db: DbClient,
    correlator: Correlator,
    guild_name: String,
    command_prefix: String,
}

/// Discord client implementation.
#[derive(Clone)]
struct DiscordChatClient {
    pub token: String,
    pub http: Arc<serenity::Http>,
    pub db: DbClient,
    pub config: Config,
}

impl DiscordChatClient {
    /// Create a new Discord chat client.
    #[instrument(name = "DiscordChatClient::new", skip_all)]
    pub async fn new(config: &Config, db: DbClient) -> Res<Self> {
        let token = config.discord_token.clone();
        let http = Arc::new(serenity::Http::new(&token));

        // Validate the token by fetching the bot's own user.

        let bot_user = http.get_current_user().await?;

        info!("Discord bot user ID: {}", bot_user.id);

        Ok(Self {
            token,
            http,
            db,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl GenericChatClient for DiscordChatClient {
    async fn start(&self) -> Void {
        // Initialize the state shared with commands and event handlers.

        let correlator = Correlator::new(self.db.clone(), ChatClient::from(self.clone()), MessageBus::default(), CorrelationSettings::from(&self.config));

        let state = BotState {
            db: self.db.clone(),
            correlator,
            guild_name: self.config.guild_name.clone(),
            command_prefix: self.config.command_prefix.clone(),
        };

        // Initialize the framework: commands, error handling, and event dispatch.

        let framework = poise::Framework::builder()
            .options(poise::FrameworkOptions {
                commands: vec![list_commands(), dm_add(), dm_remove(), help()],
                prefix_options: poise::PrefixFrameworkOptions {
                    prefix: Some(self.config.command_prefix.clone()),
                    ..Default::default()
                },
                on_error: |error| Box::pin(on_error(error)),
                event_handler: |ctx, event, framework, state| Box::pin(handle_event(ctx, event, framework, state)),
                ..Default::default()
            })
            .setup(move |ctx, ready, _framework| {
                Box::pin(async move {
                    handle_ready(ctx, ready, &state).await;
                    Ok(state)
                })
            })
            .build();

        let intents = serenity::GatewayIntents::GUILDS | serenity::GatewayIntents::GUILD_MESSAGES | serenity::GatewayIntents::DIRECT_MESSAGES | serenity::GatewayIntents::MESSAGE_CONTENT;

        let mut client = serenity::ClientBuilder::new(&self.token, intents).framework(framework).await?;

        // Connect to the gateway and run until the connection ends.
        client.start().await?;

        Ok(())
    }

    #[instrument(skip(self, notification))]
    async fn send_direct_notification(&self, user_id: u64, notification: &Notification) -> Void {
        let message = serenity::CreateMessage::new().embed(to_embed(notification)?);

        serenity::UserId::new(user_id)
            .direct_message(self.http.as_ref(), message)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send direct message: {}", e))?;

        Ok(())
    }
}

// Conversions.

/// Convert a serenity message into the platform-neutral view.
fn to_chat_message(message: &serenity::Message, guild_name: Option<String>) -> ChatMessage {
    let guild_segment = message.guild_id.map(|id| id.get().to_string()).unwrap_or_else(|| "@me".to_string());

    let embeds = message
        .embeds
        .iter()
        .map(|embed| match embed.kind.as_deref() {
            Some("rich") => EmbedKind::Rich,
            Some(kind) => EmbedKind::Other(kind.to_string()),
            None => EmbedKind::Other("unknown".to_string()),
        })
        .collect();

    ChatMessage {
        id: message.id.get(),
        channel_id: message.channel_id.get(),
        guild_name,
        author_id: message.author.id.get(),
        author_is_bot: message.author.bot,
        content: message.content.clone(),
        embeds,
        jump_url: format!("https://discord.com/channels/{}/{}/{}", guild_segment, message.channel_id.get(), message.id.get()),
    }
}

/// Convert a notification into a Discord embed.
fn to_embed(notification: &Notification) -> Res<serenity::CreateEmbed> {
    let timestamp = serenity::Timestamp::from_unix_timestamp(notification.timestamp.timestamp())?;

    let mut embed = serenity::CreateEmbed::new()
        .title(&notification.title)
        .description(&notification.description)
        .color(notification.color)
        .timestamp(timestamp);

    if let Some(url) = &notification.thumbnail_url {
        embed = embed.thumbnail(url);
    }

    for field in &notification.fields {
        embed = embed.field(&field.name, &field.value, field.inline);
    }

    Ok(embed)
}

// Framework hooks.

/// Runs once the gateway reports the bot as ready.
#[instrument(skip_all)]
async fn handle_ready(ctx: &serenity::Context, ready: &serenity::Ready, state: &BotState) {
    ctx.set_activity(Some(serenity::ActivityData::listening(format!("{}help", state.command_prefix))));

    match ctx.http.get_guilds(None, None).await {
        Ok(guilds) => match guilds.iter().find(|g| g.name == state.guild_name) {
            Some(guild) => info!("{} is connected to the following guild: name: {}, id: {}", ready.user.name, guild.name, guild.id),
            None => warn!("{} is not a member of the configured guild `{}`.", ready.user.name, state.guild_name),
        },
        Err(err) => warn!("Failed to list guilds: {}", err),
    }
}

/// Dispatches gateway events to their handlers.
async fn handle_event(ctx: &serenity::Context, event: &serenity::FullEvent, _framework: poise::FrameworkContext<'_, BotState, Error>, state: &BotState) -> Void {
    if let serenity::FullEvent::Message { new_message } = event {
        let guild_name = new_message.guild_id.and_then(|id| id.name(&ctx.cache));
        state.correlator.handle_message(to_chat_message(new_message, guild_name));
    }

    Ok(())
}

/// Handles framework errors without ever crashing the bot.
async fn on_error(error: poise::FrameworkError<'_, BotState, Error>) {
    match error {
        poise::FrameworkError::UnknownCommand { .. } => {}
        poise::FrameworkError::ArgumentParse { ctx, .. } => {
            let usage = format!("Usage: `{}{} <command>`", ctx.prefix(), ctx.command().name);
            if let Err(err) = ctx.say(usage).await {
                warn!("Failed to send usage reply: {}", err);
            }
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Error while handling `{}`: {}", ctx.command().name, error);
        }
        other => warn!("Unhandled framework error: {}", other),
    }
}

// Commands.

/// See a list of commands for the user.
#[poise::command(prefix_command)]
async fn list_commands(ctx: Context<'_>) -> Result<(), Error> {
    let author = ctx.author();
    let commands = registry::list_commands(&ctx.data().db, author.id.get()).await?;
    let display_name = author.global_name.as_deref().unwrap_or(&author.name);

    let embed = serenity::CreateEmbed::new().title(format!("{}'s Commands", display_name)).description(commands).color(0x000000);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    Ok(())
}

/// Add command to monitor
#[poise::command(prefix_command)]
async fn dm_add(ctx: Context<'_>, #[rest] command: String) -> Result<(), Error> {
    let outcome = registry::add_command(&ctx.data().db, ctx.author().id.get(), &command).await?;

    ctx.say(outcome.to_string()).await?;

    Ok(())
}

/// Remove monitored command
#[poise::command(prefix_command)]
async fn dm_remove(ctx: Context<'_>, #[rest] command: String) -> Result<(), Error> {
    let outcome = registry::remove_command(&ctx.data().db, ctx.author().id.get(), &command).await?;

    ctx.say(outcome.to_string()).await?;

    Ok(())
}

/// Show this help menu.
#[poise::command(prefix_command, hide_in_help)]
async fn help(ctx: Context<'_>, #[rest] command: Option<String>) -> Result<(), Error> {
    poise::builtins::help(ctx, command.as_deref(), poise::builtins::HelpConfiguration::default()).await?;

    Ok(())
}

// Tests.

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::base::types::NotificationField;

    #[test]
    fn notification_converts_to_embed() {
        let notification = Notification {
            title: "Command Alert".to_string(),
            description: "You just used `$wa` in Guild".to_string(),
            color: 0,
            thumbnail_url: Some("https://example.com/t.png".to_string()),
            fields: vec![NotificationField {
                name: "Message".to_string(),
                value: "$wa".to_string(),
                inline: false,
            }],
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        };

        assert!(to_embed(&notification).is_ok());
    }
}
