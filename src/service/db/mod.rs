use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::base::types::{Res, Void};

pub mod surreal;

// Traits.

/// Generic database client trait that clients must implement.
///
/// This trait defines the core functionality for storing and retrieving
/// the commands a user has asked to be notified about. Implementing this
/// trait allows different database backends to be used with the dm-bot.
///
/// Every mutating call is durable by the time it returns.
#[async_trait]
pub trait GenericDbClient: Send + Sync + 'static {
    /// Gets the tracked command for the user, if one exists (enabled or not).
    async fn get_command(&self, user_id: u64, command: &str) -> Res<Option<TrackedCommand>>;

    /// Inserts a new, enabled tracked command.
    ///
    /// Fails with a conflict error if the user already has a row for this command;
    /// callers are expected to look it up first.
    async fn insert_command(&self, user_id: u64, command: &str) -> Void;

    /// Sets the enabled flag on an existing tracked command.
    async fn set_command_enabled(&self, user_id: u64, command: &str, enabled: bool) -> Void;

    /// Lists the enabled command strings for the user.
    ///
    /// The order is for display only.
    async fn list_enabled_commands(&self, user_id: u64) -> Res<Vec<String>>;
}

/// Database client for dm-bot.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct DbClient {
    /// The database client instance.
    pub inner: Arc<dyn GenericDbClient>,
}

impl Deref for DbClient {
    type Target = dyn GenericDbClient;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl DbClient {
    pub fn new(inner: Arc<dyn GenericDbClient>) -> Self {
        Self { inner }
    }
}

// Data types.

/// One user's interest in one command string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedCommand {
    /// The user who owns this command.
    pub user_id: u64,
    /// The verbatim leading token the user types.
    pub command: String,
    /// Whether notifications are currently on.
    pub enabled: bool,
}
