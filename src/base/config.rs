//! Load configuration via `config` crate with env-override support.

use std::{ops::Deref, sync::Arc, time::Duration};

use serde::Deserialize;

use super::types::{Res, Void};

/// Default prefix for the bot's own commands.
fn default_command_prefix() -> String {
    ">".to_string()
}

/// Default database endpoint (an on-disk SurrealKV store next to the binary).
fn default_db_endpoint() -> String {
    "surrealkv://dm_bot.db".to_string()
}

/// Default settle delay applied to every correlation attempt.
fn default_settle_delay_ms() -> u64 {
    500
}

/// Default upper bound on how long a correlation attempt waits for the next message.
fn default_reply_timeout_ms() -> u64 {
    10_000
}

/// Default thumbnail shown on command alerts.
fn default_alert_thumbnail_url() -> Option<String> {
    Some("https://raw.githubusercontent.com/yaboiwierdal/dm_bot/main/images/circle-cropped(4).png".to_string())
}

/// Configuration for the dm-bot application.
#[derive(Debug, Clone)]
pub struct Config {
    /// The shared configuration values.
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// The configuration values behind a [`Config`].
#[derive(Debug, Deserialize, Clone)]
pub struct ConfigInner {
    /// Discord bot token (`DM_BOT_DISCORD_TOKEN`).
    pub discord_token: String,
    /// Name of the guild the bot is expected to serve (`DM_BOT_GUILD_NAME`).
    pub guild_name: String,
    /// Prefix for the bot's own commands (`DM_BOT_COMMAND_PREFIX`).
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Database endpoint URL (`DM_BOT_DB_ENDPOINT`).
    ///
    /// Accepts anything SurrealDB's `any` engine does, e.g. `mem://`,
    /// `surrealkv://path/to/db` or `ws://host:port`.
    #[serde(default = "default_db_endpoint")]
    pub db_endpoint: String,
    /// Database username for remote endpoints (`DM_BOT_DB_USERNAME`).
    #[serde(default)]
    pub db_username: Option<String>,
    /// Database password for remote endpoints (`DM_BOT_DB_PASSWORD`).
    #[serde(default)]
    pub db_password: Option<String>,
    /// Settle delay in milliseconds applied after a human message (`DM_BOT_SETTLE_DELAY_MS`).
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// How long to wait for the next channel message before giving up (`DM_BOT_REPLY_TIMEOUT_MS`).
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,
    /// Thumbnail URL for command alerts (`DM_BOT_ALERT_THUMBNAIL_URL`).
    #[serde(default = "default_alert_thumbnail_url")]
    pub alert_thumbnail_url: Option<String>,
}

impl ConfigInner {
    /// Build a configuration with defaults for everything but the required values.
    pub fn new(discord_token: impl Into<String>, guild_name: impl Into<String>) -> Self {
        Self {
            discord_token: discord_token.into(),
            guild_name: guild_name.into(),
            command_prefix: default_command_prefix(),
            db_endpoint: default_db_endpoint(),
            db_username: None,
            db_password: None,
            settle_delay_ms: default_settle_delay_ms(),
            reply_timeout_ms: default_reply_timeout_ms(),
            alert_thumbnail_url: default_alert_thumbnail_url(),
        }
    }

    /// The settle delay as a [`Duration`].
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// The reply timeout as a [`Duration`].
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    /// Check the loaded values for consistency.
    pub fn validate(&self) -> Void {
        if self.discord_token.trim().is_empty() {
            return Err(anyhow::anyhow!("Discord token must not be empty."));
        }

        if self.guild_name.trim().is_empty() {
            return Err(anyhow::anyhow!("Guild name must not be empty."));
        }

        if self.command_prefix.is_empty() {
            return Err(anyhow::anyhow!("Command prefix must not be empty."));
        }

        if self.reply_timeout_ms == 0 {
            return Err(anyhow::anyhow!("Reply timeout must be greater than zero."));
        }

        if self.settle_delay_ms > self.reply_timeout_ms {
            return Err(anyhow::anyhow!("Settle delay must not exceed the reply timeout."));
        }

        Ok(())
    }
}

impl From<ConfigInner> for Config {
    fn from(inner: ConfigInner) -> Self {
        Self { inner: Arc::new(inner) }
    }
}

impl Config {
    /// Load the configuration from the environment and an optional TOML file, then validate it.
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let mut cfg = config::Config::builder().add_source(config::Environment::default().prefix("DM_BOT"));

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        let result = Config {
            inner: Arc::new(cfg.build()?.try_deserialize()?),
        };

        result.validate()?;

        Ok(result)
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ConfigInner::new("token", "My Guild");

        assert!(config.validate().is_ok());
        assert_eq!(config.command_prefix, ">");
        assert_eq!(config.settle_delay(), Duration::from_millis(500));
    }

    #[test]
    fn empty_token_is_rejected() {
        let config = ConfigInner::new("  ", "My Guild");

        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_guild_is_rejected() {
        let config = ConfigInner::new("token", "");

        assert!(config.validate().is_err());
    }

    #[test]
    fn settle_delay_must_fit_in_timeout() {
        let mut config = ConfigInner::new("token", "My Guild");
        config.settle_delay_ms = 2_000;
        config.reply_timeout_ms = 1_000;

        assert!(config.validate().is_err());
    }

    #[test]
    fn file_overrides_are_applied() {
        let dir = std::env::temp_dir().join(format!("dm-bot-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "discord_token = \"abc\"\nguild_name = \"Guild\"\nreply_timeout_ms = 2000\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config.discord_token, "abc");
        assert_eq!(config.guild_name, "Guild");
        assert_eq!(config.reply_timeout(), Duration::from_millis(2_000));
        assert_eq!(config.db_endpoint, "surrealkv://dm_bot.db");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
