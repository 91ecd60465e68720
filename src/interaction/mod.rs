//! Event handling and user interactions for dm-bot.
//!
//! This module provides functionality for handling chat and message events:
//! - Managing the commands each user wants to be notified about
//! - Watching channels for the replies other bots give to those commands
//! - Delivering alerts about those replies by direct message

pub mod bus;
pub mod correlator;
pub mod notifier;
pub mod registry;
