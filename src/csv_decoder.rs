use std::str::FromStr;

use error_stack::Report;
use log::trace;
use thiserror::Error;

use crate::group::{Level, CHANNEL_COUNT};

pub const DELIMITER: char = ',';

/// Maximum number of characters in a single field
pub const FIELD_CAPACITY: usize = 32;

/// Maximum number of digits in a channel value
pub const CHANNEL_TOKEN_CAPACITY: usize = 3;

/// Field index of the first channel value in a command line
pub const CHANNEL_START_POSITION: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Field {0} is missing")]
    MissingField(usize),

    #[error("Field {field} is longer than {capacity} characters", capacity = FIELD_CAPACITY)]
    FieldTooLong { field: usize },

    #[error("Unexpected character '{character}' in field {field}")]
    InvalidCharacter { field: usize, character: char },

    #[error("Field {field} ('{token}') is not a valid number")]
    InvalidNumber { field: usize, token: String },

    #[error("Value for channel {0} is missing")]
    MissingChannel(usize),

    #[error("Value '{token}' for channel {channel} is longer than {capacity} digits", capacity = CHANNEL_TOKEN_CAPACITY)]
    ChannelTooLong { channel: usize, token: String },

    #[error("Value '{token}' for channel {channel} is not a number")]
    InvalidChannel { channel: usize, token: String },

    #[error("Unexpected '{0}' after the last channel")]
    ExtraChannels(String),

    #[error("{0}")]
    InvalidGroup(String),

    #[error("In context of '{0}'")]
    Context(String),
}

pub type Result<T> = std::result::Result<T, Report<DecodeError>>;

// Byte offset of the first character of field `index`, None if the line has too few delimiters
fn field_start(line: &str, index: usize) -> Option<usize> {
    if index == 0 {
        Some(0)
    } else {
        line.match_indices(DELIMITER).nth(index - 1).map(|(position, _)| position + 1)
    }
}

/// Return the alphanumeric token in comma delimited field `index`.
///
/// A line with fewer than `index` delimiters yields an empty token. The token must
/// be terminated by a delimiter or by the end of the line.
pub fn extract_field(line: &str, index: usize) -> Result<String> {
    let Some(start) = field_start(line, index) else {
        trace!("extract_field: line has no field {}", index);
        return Ok(String::new());
    };

    let rest = &line[start..];
    let token_length = rest.find(|c: char| !c.is_ascii_alphanumeric()).unwrap_or(rest.len());

    if token_length > FIELD_CAPACITY {
        return Err(DecodeError::FieldTooLong { field: index }.into());
    }

    match rest[token_length..].chars().next() {
        None | Some(DELIMITER) => Ok(rest[..token_length].to_owned()),
        Some(character) => Err(DecodeError::InvalidCharacter { field: index, character }.into()),
    }
}

/// Return the free text in field `index` (everything up to the next delimiter)
pub fn extract_label(line: &str, index: usize) -> Result<String> {
    let Some(start) = field_start(line, index) else {
        return Ok(String::new());
    };

    let rest = &line[start..];
    let label = rest.split(DELIMITER).next().unwrap_or_default();

    if label.chars().count() > FIELD_CAPACITY {
        Err(DecodeError::FieldTooLong { field: index }.into())
    } else {
        Ok(label.to_owned())
    }
}

/// Parse field `index` as a number. An empty field is reported as missing.
pub fn extract_number<T: FromStr>(line: &str, index: usize) -> Result<T> {
    let token = extract_field(line, index)?;

    if token.is_empty() {
        return Err(DecodeError::MissingField(index).into());
    }

    token.parse().map_err(|_| DecodeError::InvalidNumber { field: index, token }.into())
}

fn channel_value(channel: usize, token: &[u8]) -> Result<Level> {
    let as_text = || String::from_utf8_lossy(token).into_owned();

    if token.is_empty() {
        return Err(DecodeError::MissingChannel(channel).into());
    }
    if token.len() > CHANNEL_TOKEN_CAPACITY {
        return Err(DecodeError::ChannelTooLong { channel, token: as_text() }.into());
    }
    if !token.iter().all(u8::is_ascii_digit) {
        return Err(DecodeError::InvalidChannel { channel, token: as_text() }.into());
    }

    Ok(token.iter().fold(0, |value, digit| value * 10 + Level::from(digit - b'0')))
}

/// Decode the CHANNEL_COUNT channel values that start at field `start_field`.
///
/// Values are separated by a single non-alphanumeric character. The last channel may be
/// followed by one delimiter and nothing else.
pub fn decode_channels(line: &str, start_field: usize) -> Result<[Level; CHANNEL_COUNT]> {
    let start = field_start(line, start_field).ok_or(DecodeError::MissingField(start_field))?;
    let bytes = &line.as_bytes()[start..];
    let mut cursor = 0;
    let mut channels = [0; CHANNEL_COUNT];

    for (channel, value) in channels.iter_mut().enumerate() {
        // field_start already points past the delimiter in front of channel 0
        if channel > 0 && cursor < bytes.len() && !bytes[cursor].is_ascii_alphanumeric() {
            cursor += 1;
        }

        let token_start = cursor;
        while cursor < bytes.len() && bytes[cursor].is_ascii_alphanumeric() {
            cursor += 1;
        }

        *value = channel_value(channel, &bytes[token_start..cursor])?;
    }

    let rest = &bytes[cursor..];
    let rest = rest.strip_prefix(&[DELIMITER as u8]).unwrap_or(rest);

    if !rest.is_empty() {
        return Err(DecodeError::ExtraChannels(String::from_utf8_lossy(rest).into_owned()).into());
    }

    Ok(channels)
}
