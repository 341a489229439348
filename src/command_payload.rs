use std::str::FromStr;

use error_stack::{Report, ResultExt};
use thiserror::Error;

use crate::csv_decoder::{self, DecodeError, CHANNEL_START_POSITION};
use crate::group::{GroupId, Level, CHANNEL_COUNT};

// Where each value is located in a command line
const OPERATION_CODE_POSITION: usize = 0;
const GROUP_POSITION: usize = 1;
const NICKNAME_POSITION: usize = 2;
const INTENSITY_POSITION: usize = 3;

/// Command line: op_code,group_id,nickname,intensity,ch_0,...,ch_{N-1}
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupCommand {
    Query { group: GroupId },
    SetChannels { group: GroupId, channels: [Level; CHANNEL_COUNT] },
    Update { group: GroupId, nickname: String, intensity: Level, channels: [Level; CHANNEL_COUNT] },
    Dump,
    Delete,
    Reload,
    Reset,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown operation code {0}")]
    OperationCode(u8),

    #[error("Malformed command")]
    Malformed,

    #[error("In context of '{0}'")]
    Context(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperationCode {
    Query,
    SetChannels,
    Update,
    Dump,
    Delete,
    Reload,
    Reset,
}

impl TryFrom<u8> for OperationCode {
    type Error = CommandError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(OperationCode::Query),
            1 => Ok(OperationCode::SetChannels),
            2 => Ok(OperationCode::Update),
            3 => Ok(OperationCode::Dump),
            4 => Ok(OperationCode::Delete),
            5 => Ok(OperationCode::Reload),
            6 => Ok(OperationCode::Reset),
            _ => Err(CommandError::OperationCode(code)),
        }
    }
}

impl GroupCommand {
    fn group(line: &str) -> Result<GroupId, Report<DecodeError>> {
        let id: usize = csv_decoder::extract_number(line, GROUP_POSITION)?;

        GroupId::new(id).map_err(|e| Report::new(DecodeError::InvalidGroup(e.to_string())))
    }

    fn decode(operation_code: OperationCode, line: &str) -> Result<GroupCommand, Report<DecodeError>> {
        Ok(match operation_code {
            OperationCode::Query => GroupCommand::Query { group: GroupCommand::group(line)? },
            OperationCode::Update => GroupCommand::Update {
                group: GroupCommand::group(line)?,
                nickname: csv_decoder::extract_label(line, NICKNAME_POSITION)?,
                intensity: csv_decoder::extract_number(line, INTENSITY_POSITION)?,
                channels: csv_decoder::decode_channels(line, CHANNEL_START_POSITION)?,
            },
            OperationCode::SetChannels => GroupCommand::SetChannels {
                group: GroupCommand::group(line)?,
                channels: csv_decoder::decode_channels(line, CHANNEL_START_POSITION)?,
            },
            OperationCode::Dump => GroupCommand::Dump,
            OperationCode::Delete => GroupCommand::Delete,
            OperationCode::Reload => GroupCommand::Reload,
            OperationCode::Reset => GroupCommand::Reset,
        })
    }

    pub fn is_mutating(&self) -> bool {
        matches!(self, GroupCommand::Update { .. } | GroupCommand::SetChannels { .. } | GroupCommand::Reload | GroupCommand::Reset)
    }
}

impl FromStr for GroupCommand {
    type Err = Report<CommandError>;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let into_context = || CommandError::Context(format!("Decoding command '{line}'"));

        if line.is_empty() {
            return Err(Report::new(CommandError::Empty));
        }

        let operation_code: u8 = csv_decoder::extract_number(line, OPERATION_CODE_POSITION)
            .change_context(CommandError::Malformed)
            .change_context_lazy(into_context)?;
        let operation_code = OperationCode::try_from(operation_code).change_context_lazy(into_context)?;

        GroupCommand::decode(operation_code, line)
            .change_context(CommandError::Malformed)
            .change_context_lazy(into_context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel_run(values: &[Level]) -> String {
        values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
    }

    #[test]
    fn test_update_command() {
        let mut channels = [0; CHANNEL_COUNT];
        channels[0] = 10;
        channels[1] = 20;
        channels[2] = 30;

        let line = format!("2,3,Stage Left,50,{}", channel_run(&channels));
        let command: GroupCommand = line.parse().unwrap();

        assert_eq!(command, GroupCommand::Update {
            group: GroupId::new(3).unwrap(),
            nickname: "Stage Left".to_owned(),
            intensity: 50,
            channels,
        });
        assert!(command.is_mutating());
    }

    #[test]
    fn test_set_channels_command() {
        let channels = [7; CHANNEL_COUNT];
        let line = format!("1,9,,,{}\r\n", channel_run(&channels));

        match line.parse::<GroupCommand>().unwrap() {
            GroupCommand::SetChannels { group, channels: decoded } => {
                assert_eq!(group.index(), 9);
                assert_eq!(decoded, channels);
            }
            command => panic!("Unexpected command {:?}", command),
        }
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!("0,4".parse::<GroupCommand>().unwrap(), GroupCommand::Query { group: GroupId::new(4).unwrap() });
        assert_eq!("3".parse::<GroupCommand>().unwrap(), GroupCommand::Dump);
        assert_eq!("4,".parse::<GroupCommand>().unwrap(), GroupCommand::Delete);
        assert_eq!("5".parse::<GroupCommand>().unwrap(), GroupCommand::Reload);
        assert_eq!("6".parse::<GroupCommand>().unwrap(), GroupCommand::Reset);
        assert!(!GroupCommand::Dump.is_mutating());
    }

    #[test]
    fn test_malformed_commands() {
        assert!(matches!("".parse::<GroupCommand>().unwrap_err().current_context(), CommandError::Empty));
        assert!(matches!("9,1".parse::<GroupCommand>().unwrap_err().current_context(), CommandError::Context(_)));

        let e = "0,12".parse::<GroupCommand>().unwrap_err();
        assert!(e.contains::<CommandError>());
        assert!(e.frames().any(|f| matches!(f.downcast_ref::<DecodeError>(), Some(DecodeError::InvalidGroup(_)))));

        let e = "2,3,Hall,50,1,2".parse::<GroupCommand>().unwrap_err();
        assert!(e.frames().any(|f| matches!(f.downcast_ref::<DecodeError>(), Some(DecodeError::MissingChannel(2)))));

        let e = format!("2,3,Hall,5 0,{}", channel_run(&[0; CHANNEL_COUNT])).parse::<GroupCommand>().unwrap_err();
        assert!(e.frames().any(|f| matches!(f.downcast_ref::<DecodeError>(), Some(DecodeError::InvalidCharacter { field: 3, .. }))));

        let e = format!("1,3,X,50,{},77", channel_run(&[0; CHANNEL_COUNT])).parse::<GroupCommand>().unwrap_err();
        assert!(e.frames().any(|f| matches!(f.downcast_ref::<DecodeError>(), Some(DecodeError::ExtraChannels(_)))));
    }
}
