use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::group::{Group, GroupConfig, GroupId, Level, CHANNEL_COUNT};

/// Persisted form of a group. Every value is stored as a text token.
#[derive(Debug, Serialize, Deserialize)]
pub struct GroupPayload {
    pub id: String,
    #[serde(default)]
    pub nickname: String,
    pub intensity: String,
    pub channel: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GroupConfigPayload {
    pub group: Vec<GroupPayload>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Group {group}: '{token}' is not a valid {field}")]
    InvalidToken { group: usize, field: &'static str, token: String },

    #[error("Group {group} has {count} channels (expected {expected})", expected = CHANNEL_COUNT)]
    ChannelCount { group: usize, count: usize },

    #[error("{0}")]
    Group(#[from] crate::group::GroupIdError),
}

impl From<&Group> for GroupPayload {
    fn from(group: &Group) -> Self {
        GroupPayload {
            id: group.id().to_string(),
            nickname: group.label.clone(),
            intensity: group.intensity.to_string(),
            channel: group.channels.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl From<&GroupConfig> for GroupConfigPayload {
    fn from(config: &GroupConfig) -> Self {
        GroupConfigPayload {
            group: config.iter().map(GroupPayload::from).collect(),
        }
    }
}

impl GroupPayload {
    fn parse_level(slot: usize, field: &'static str, token: &str) -> Result<Level, PayloadError> {
        token.trim().parse().map_err(|_| PayloadError::InvalidToken { group: slot, field, token: token.to_owned() })
    }

    fn into_group(self, slot: usize) -> Result<Group, PayloadError> {
        let id: usize = self.id.trim().parse()
            .map_err(|_| PayloadError::InvalidToken { group: slot, field: "id", token: self.id.clone() })?;

        if self.channel.len() != CHANNEL_COUNT {
            return Err(PayloadError::ChannelCount { group: slot, count: self.channel.len() });
        }

        let mut group = Group::new(GroupId::new(id)?);

        group.label = self.nickname;
        group.intensity = GroupPayload::parse_level(slot, "intensity", &self.intensity)?;
        for (channel, token) in group.channels.iter_mut().zip(self.channel.iter()) {
            *channel = GroupPayload::parse_level(slot, "channel value", token)?;
        }

        Ok(group)
    }
}

impl TryFrom<GroupConfigPayload> for GroupConfig {
    type Error = PayloadError;

    fn try_from(payload: GroupConfigPayload) -> Result<Self, Self::Error> {
        let groups = payload.group.into_iter()
            .enumerate()
            .map(|(slot, group)| group.into_group(slot))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(GroupConfig::try_from_groups(groups)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::GROUP_COUNT;

    fn payload_json(config: &GroupConfig) -> String {
        serde_json::to_string(&GroupConfigPayload::from(config)).unwrap()
    }

    #[test]
    fn test_payload_tokens_are_text() {
        let mut config = GroupConfig::new();
        let id = GroupId::new(2).unwrap();
        config.get_mut(id).label = "Bar".to_owned();
        config.get_mut(id).intensity = 80;
        config.get_mut(id).channels[4] = 12;

        let value: serde_json::Value = serde_json::from_str(&payload_json(&config)).unwrap();
        let group = &value["group"][2];

        assert_eq!(value["group"].as_array().unwrap().len(), GROUP_COUNT);
        assert_eq!(group["id"], "2");
        assert_eq!(group["nickname"], "Bar");
        assert_eq!(group["intensity"], "80");
        assert_eq!(group["channel"][4], "12");
        assert_eq!(group["channel"].as_array().unwrap().len(), CHANNEL_COUNT);
    }

    #[test]
    fn test_parse_payload() {
        let mut config = GroupConfig::new();
        config.get_mut(GroupId::new(9).unwrap()).channels[31] = 512;

        let payload: GroupConfigPayload = serde_json::from_str(&payload_json(&config)).unwrap();

        assert_eq!(GroupConfig::try_from(payload).unwrap(), config);
    }

    #[test]
    fn test_parse_payload_missing_nickname() {
        let channels = vec!["0"; CHANNEL_COUNT];
        let json = serde_json::json!({
            "group": (0..GROUP_COUNT).map(|i| serde_json::json!({
                "id": i.to_string(),
                "intensity": "0",
                "channel": channels,
            })).collect::<Vec<_>>()
        });

        let payload: GroupConfigPayload = serde_json::from_value(json).unwrap();
        assert_eq!(GroupConfig::try_from(payload).unwrap(), GroupConfig::new());
    }

    #[test]
    fn test_parse_payload_rejects_bad_token() {
        let mut payload = GroupConfigPayload::from(&GroupConfig::new());
        payload.group[1].intensity = "bright".to_owned();

        assert_eq!(
            GroupConfig::try_from(payload).unwrap_err(),
            PayloadError::InvalidToken { group: 1, field: "intensity", token: "bright".to_owned() }
        );
    }

    #[test]
    fn test_parse_payload_rejects_short_channel_list() {
        let mut payload = GroupConfigPayload::from(&GroupConfig::new());
        payload.group[0].channel.pop();

        assert_eq!(
            GroupConfig::try_from(payload).unwrap_err(),
            PayloadError::ChannelCount { group: 0, count: CHANNEL_COUNT - 1 }
        );
    }

    #[test]
    fn test_parse_payload_rejects_misplaced_group() {
        let mut payload = GroupConfigPayload::from(&GroupConfig::new());
        payload.group.swap(0, 1);

        assert!(matches!(GroupConfig::try_from(payload).unwrap_err(), PayloadError::Group(_)));
    }
}
