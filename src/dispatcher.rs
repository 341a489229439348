use error_stack::{Report, ResultExt};
use log::{debug, error};
use thiserror::Error;

use crate::command_payload::GroupCommand;
use crate::csv_decoder::DecodeError;
use crate::config_store::{ConfigStore, LoadOutcome};
use crate::group::{GroupId, Level, CHANNEL_COUNT};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Group configuration could not be loaded")]
    LoadFailed,

    #[error("Storage operation failed")]
    Store,
}

pub type Result<T> = std::result::Result<T, Report<DispatchError>>;

/// Result of handling one command line
#[derive(Debug, PartialEq, Eq)]
pub struct CommandOutcome {
    pub reply: String,
    /// The in-memory groups were changed
    pub changed: bool,
}

fn set_channels(store: &mut ConfigStore, group: GroupId, channels: &[Level; CHANNEL_COUNT]) -> Result<Option<String>> {
    store.groups_mut().get_mut(group).channels = *channels;
    store.save().change_context(DispatchError::Store)?;
    Ok(None)
}

fn update_group(store: &mut ConfigStore, group: GroupId, nickname: &str, intensity: Level, channels: &[Level; CHANNEL_COUNT]) -> Result<Option<String>> {
    let target = store.groups_mut().get_mut(group);

    target.label = nickname.to_owned();
    target.intensity = intensity;
    target.channels = *channels;

    store.save().change_context(DispatchError::Store)?;
    Ok(None)
}

fn reload(store: &mut ConfigStore) -> Result<Option<String>> {
    match store.load() {
        LoadOutcome::Loaded => Ok(None),
        LoadOutcome::Initialized => Ok(Some("Initialized".to_owned())),
        LoadOutcome::Failed => Err(Report::new(DispatchError::LoadFailed)),
    }
}

/// Execute a decoded command, returning the reply text if the command has one
pub fn execute(store: &mut ConfigStore, command: &GroupCommand) -> Result<Option<String>> {
    match command {
        GroupCommand::Query { group } => Ok(Some(store.groups().get(*group).to_string())),
        GroupCommand::SetChannels { group, channels } => set_channels(store, *group, channels),
        GroupCommand::Update { group, nickname, intensity, channels } => update_group(store, *group, nickname, *intensity, channels),
        GroupCommand::Dump => store.dump().map(Some).change_context(DispatchError::Store),
        GroupCommand::Delete => store.delete().map(|_| None).change_context(DispatchError::Store),
        GroupCommand::Reload => reload(store),
        GroupCommand::Reset => store.initialize().map(|_| None).change_context(DispatchError::Store),
    }
}

/// Decode and execute one command line. Failures are logged and turned into an error reply.
pub fn handle_line(store: &mut ConfigStore, line: &str) -> CommandOutcome {
    let command = match line.parse::<GroupCommand>() {
        Ok(command) => command,
        Err(e) => {
            error!("Invalid command '{}': {:?}", line.trim(), e);

            let reply = match e.frames().find_map(|frame| frame.downcast_ref::<DecodeError>()) {
                Some(reason) => format!("ERROR: {}", reason),
                None => format!("ERROR: {}", e),
            };
            return CommandOutcome { reply, changed: false };
        }
    };

    debug!("Got command {:?}", command);

    match execute(store, &command) {
        Ok(reply) => CommandOutcome {
            reply: reply.unwrap_or_else(|| "OK".to_owned()),
            changed: command.is_mutating(),
        },
        Err(e) => {
            error!("Command {:?} completed with error {:?}", command, e);
            CommandOutcome {
                reply: format!("ERROR: {}", e),
                // A failed save or reload may still have replaced the groups
                changed: command.is_mutating(),
            }
        }
    }
}
