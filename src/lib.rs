//! Library root for `dm-bot`.
//!
//! Dm-bot is a Discord assistant for people who drive other bots with commands:
//! - Users register the commands they send to other bots
//! - The bot watches the channel for the reply to each registered command
//! - A summary of the reply is delivered to the user by direct message
//!
//! The bot integrates with Discord for chat and SurrealDB for storage.
//! The architecture is built around extensible traits that allow for
//! different implementations of each service.

#[deny(missing_docs)]
pub mod base;
pub mod interaction;
pub mod runtime;
pub mod service;

use base::{config::Config, types::Void};
use tracing::info;

/// Public async entry for the binary crate.
///
/// Sets up necessary services and starts the dm-bot runtime:
/// - Creates the runtime context with database and chat clients
/// - Starts the main event loop for processing messages
pub async fn start(config: Config) -> Void {
    info!("Starting dm-bot ...");

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config).await?;

    // Start the runtime.
    runtime.start().await?;

    Ok(())
}
