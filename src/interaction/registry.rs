//! Add, remove, and list the commands a user wants to be notified about.

use std::fmt;

use tracing::{info, instrument};

use crate::{base::types::Res, service::db::DbClient};

/// Reply shown when a user has no enabled commands.
pub const NO_COMMANDS_TEXT: &str = "You don't have any commands set.";

/// The result of an add or remove request.
///
/// The `Display` implementation is the reply shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryOutcome {
    /// A new tracked command was created.
    Added(String),
    /// A disabled tracked command was turned back on.
    ToggledOn(String),
    /// An enabled tracked command was turned off.
    ToggledOff(String),
    /// Add on a command that is already enabled.
    AlreadyEnabled,
    /// Remove on a command that is already disabled.
    AlreadyDisabled,
    /// Remove on a command the user never added.
    NotTracked,
    /// The command text was empty.
    MissingCommand,
}

impl fmt::Display for RegistryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryOutcome::Added(command) => write!(f, "You will now be notified everytime you use `{}`.", command),
            RegistryOutcome::ToggledOn(command) => write!(f, "Notifications for `{}` toggled on.", command),
            RegistryOutcome::ToggledOff(command) => write!(f, "Notifications for `{}` toggled off.", command),
            RegistryOutcome::AlreadyEnabled => write!(f, "You already have that command enabled."),
            RegistryOutcome::AlreadyDisabled => write!(f, "You already have that command toggled off."),
            RegistryOutcome::NotTracked => write!(f, "That command is not toggled on."),
            RegistryOutcome::MissingCommand => write!(f, "Please tell me which command you mean."),
        }
    }
}

/// Start (or resume) monitoring a command for the user.
#[instrument(skip(db))]
pub async fn add_command(db: &DbClient, user_id: u64, command: &str) -> Res<RegistryOutcome> {
    let command = command.trim();

    if command.is_empty() {
        return Ok(RegistryOutcome::MissingCommand);
    }

    let outcome = match db.get_command(user_id, command).await? {
        Some(existing) if existing.enabled => RegistryOutcome::AlreadyEnabled,
        Some(_) => {
            db.set_command_enabled(user_id, command, true).await?;
            RegistryOutcome::ToggledOn(command.to_string())
        }
        None => {
            db.insert_command(user_id, command).await?;
            RegistryOutcome::Added(command.to_string())
        }
    };

    info!("Add request resolved: {:?}", outcome);

    Ok(outcome)
}

/// Stop monitoring a command for the user.
#[instrument(skip(db))]
pub async fn remove_command(db: &DbClient, user_id: u64, command: &str) -> Res<RegistryOutcome> {
    let command = command.trim();

    if command.is_empty() {
        return Ok(RegistryOutcome::MissingCommand);
    }

    let outcome = match db.get_command(user_id, command).await? {
        None => RegistryOutcome::NotTracked,
        Some(existing) if !existing.enabled => RegistryOutcome::AlreadyDisabled,
        Some(_) => {
            db.set_command_enabled(user_id, command, false).await?;
            RegistryOutcome::ToggledOff(command.to_string())
        }
    };

    info!("Remove request resolved: {:?}", outcome);

    Ok(outcome)
}

/// Render the user's enabled commands, one per line.
#[instrument(skip(db))]
pub async fn list_commands(db: &DbClient, user_id: u64) -> Res<String> {
    let commands = db.list_enabled_commands(user_id).await?;

    Ok(render_command_list(&commands))
}

/// Format a command list for display, or the empty-list sentinel.
pub fn render_command_list(commands: &[String]) -> String {
    if commands.is_empty() {
        return NO_COMMANDS_TEXT.to_string();
    }

    commands.join("\n")
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_uses_sentinel() {
        assert_eq!(render_command_list(&[]), NO_COMMANDS_TEXT);
    }

    #[test]
    fn list_is_one_per_line() {
        let commands = vec!["$wa".to_string(), "!roll".to_string()];

        assert_eq!(render_command_list(&commands), "$wa\n!roll");
    }

    #[test]
    fn outcomes_render_as_replies() {
        assert_eq!(RegistryOutcome::Added("$wa".into()).to_string(), "You will now be notified everytime you use `$wa`.");
        assert_eq!(RegistryOutcome::NotTracked.to_string(), "That command is not toggled on.");
    }
}
