//! SurrealDB implementation for dm-bot data storage.

use std::sync::Arc;

use async_trait::async_trait;
use surrealdb::{
    Surreal,
    engine::any::{self, Any},
    opt::auth::Root,
};
use tracing::{info, instrument};

use crate::base::{
    config::Config,
    types::{Res, Void},
};

use super::{DbClient, GenericDbClient, TrackedCommand};

// Extra methods on `DbClient` applied by the surreal implementation.

impl DbClient {
    /// Creates a new SurrealDB client from the configured endpoint.
    pub async fn surreal(config: &Config) -> Res<Self> {
        let client = SurrealDbClient::new(&config.db_endpoint, config.db_username.as_deref(), config.db_password.as_deref()).await?;
        Ok(Self::new(Arc::new(client)))
    }

    /// Creates a new in-memory SurrealDB client.
    pub async fn surreal_memory() -> Res<Self> {
        let client = SurrealDbClient::new("mem://", None, None).await?;
        Ok(Self::new(Arc::new(client)))
    }
}

// Structs.

/// SurrealDB client implementation.
#[derive(Clone)]
pub struct SurrealDbClient {
    db: Surreal<Any>,
}

impl SurrealDbClient {
    /// Connect to the endpoint, sign in if credentials are given, and define the schema.
    #[instrument(name = "SurrealDbClient::new", skip(username, password))]
    pub async fn new(endpoint: &str, username: Option<&str>, password: Option<&str>) -> Res<Self> {
        let db = any::connect(endpoint).await?;

        // Authenticate with the database if the endpoint needs it.

        if let (Some(username), Some(password)) = (username, password) {
            db.signin(Root { username, password }).await?;
        }

        db.use_ns("dm").use_db("bot").await?;

        // Define schemas.

        db.query("DEFINE TABLE IF NOT EXISTS user_command SCHEMAFULL;")
            .query("DEFINE FIELD IF NOT EXISTS user_id ON user_command TYPE int;")
            .query("DEFINE FIELD IF NOT EXISTS command ON user_command TYPE string;")
            .query("DEFINE FIELD IF NOT EXISTS enabled ON user_command TYPE bool;")
            .query("DEFINE INDEX IF NOT EXISTS user_command_lookup ON user_command FIELDS user_id, command;")
            .await?
            .check()?;

        info!("Database initialized successfully.");

        Ok(Self { db })
    }
}

#[async_trait]
impl GenericDbClient for SurrealDbClient {
    #[instrument(skip(self))]
    async fn get_command(&self, user_id: u64, command: &str) -> Res<Option<TrackedCommand>> {
        let mut response = self
            .db
            .query("SELECT user_id, command, enabled FROM user_command WHERE user_id = $user_id AND command = $command LIMIT 1;")
            .bind(("user_id", user_id))
            .bind(("command", command.to_string()))
            .await?;

        let rows: Vec<TrackedCommand> = response.take(0)?;

        Ok(rows.into_iter().next())
    }

    #[instrument(skip(self))]
    async fn insert_command(&self, user_id: u64, command: &str) -> Void {
        if self.get_command(user_id, command).await?.is_some() {
            return Err(anyhow::anyhow!("Command `{}` is already tracked for user `{}`.", command, user_id));
        }

        self.db
            .query("CREATE user_command SET user_id = $user_id, command = $command, enabled = true;")
            .bind(("user_id", user_id))
            .bind(("command", command.to_string()))
            .await?
            .check()?;

        info!("Tracking `{}` for user `{}`.", command, user_id);

        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_command_enabled(&self, user_id: u64, command: &str, enabled: bool) -> Void {
        self.db
            .query("UPDATE user_command SET enabled = $enabled WHERE user_id = $user_id AND command = $command;")
            .bind(("enabled", enabled))
            .bind(("user_id", user_id))
            .bind(("command", command.to_string()))
            .await?
            .check()?;

        info!("Set `{}` for user `{}` to enabled = {}.", command, user_id, enabled);

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_enabled_commands(&self, user_id: u64) -> Res<Vec<String>> {
        let mut response = self
            .db
            .query("SELECT VALUE command FROM user_command WHERE user_id = $user_id AND enabled = true;")
            .bind(("user_id", user_id))
            .await?;

        let commands: Vec<String> = response.take(0)?;

        Ok(commands)
    }
}

// Tests.
