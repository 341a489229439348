use std::fmt;
use std::str::FromStr;

use error_stack::{Report, ResultExt};
use thiserror::Error;

use crate::csv_decoder::{self, DecodeError};

pub const GROUP_COUNT: usize = 10;
pub const CHANNEL_COUNT: usize = 32;

/// Intensity of a group or of a single channel
pub type Level = u16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GroupIdError {
    #[error("Invalid group id {0} (valid ids are 0-{max})", max = GROUP_COUNT - 1)]
    OutOfRange(usize),

    #[error("Group in slot {slot} has id {id}")]
    SlotMismatch { slot: usize, id: usize },

    #[error("Expected {count} groups, got {0}", count = GROUP_COUNT)]
    GroupCount(usize),
}

/// Index of a group, always within 0..GROUP_COUNT
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(u8);

impl GroupId {
    pub fn new(id: usize) -> Result<GroupId, GroupIdError> {
        if id < GROUP_COUNT {
            Ok(GroupId(id as u8))
        } else {
            Err(GroupIdError::OutOfRange(id))
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn all() -> impl Iterator<Item = GroupId> {
        (0..GROUP_COUNT as u8).map(GroupId)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    id: GroupId,
    pub label: String,
    pub intensity: Level,
    pub channels: [Level; CHANNEL_COUNT],
}

impl Group {
    /// A dark group: empty label, intensity and all channels at zero
    pub fn new(id: GroupId) -> Group {
        Group {
            id,
            label: String::new(),
            intensity: 0,
            channels: [0; CHANNEL_COUNT],
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }
}

// Record layout is id,label,intensity,ch_0,...,ch_{N-1},
impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.id, self.label, self.intensity)?;

        for channel in self.channels.iter() {
            write!(f, ",{}", channel)?;
        }

        write!(f, ",")
    }
}

impl FromStr for Group {
    type Err = Report<DecodeError>;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        const ID_POSITION: usize = 0;
        const LABEL_POSITION: usize = 1;
        const INTENSITY_POSITION: usize = 2;
        const CHANNEL_START_POSITION: usize = 3;

        let into_context = || DecodeError::Context(format!("Decoding group record '{line}'"));

        let id = csv_decoder::extract_number::<usize>(line, ID_POSITION).change_context_lazy(into_context)?;
        let id = GroupId::new(id)
            .map_err(|e| DecodeError::InvalidGroup(e.to_string()))
            .change_context_lazy(into_context)?;

        Ok(Group {
            id,
            label: csv_decoder::extract_field(line, LABEL_POSITION).change_context_lazy(into_context)?,
            intensity: csv_decoder::extract_number(line, INTENSITY_POSITION).change_context_lazy(into_context)?,
            channels: csv_decoder::decode_channels(line, CHANNEL_START_POSITION).change_context_lazy(into_context)?,
        })
    }
}

/// The full group collection. Slot `i` always holds the group with id `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupConfig {
    groups: Vec<Group>,
}

impl GroupConfig {
    pub fn new() -> GroupConfig {
        GroupConfig {
            groups: GroupId::all().map(Group::new).collect(),
        }
    }

    pub fn try_from_groups(groups: Vec<Group>) -> Result<GroupConfig, GroupIdError> {
        if groups.len() != GROUP_COUNT {
            return Err(GroupIdError::GroupCount(groups.len()));
        }

        if let Some((slot, group)) = groups.iter().enumerate().find(|(slot, group)| group.id.index() != *slot) {
            return Err(GroupIdError::SlotMismatch { slot, id: group.id.index() });
        }

        Ok(GroupConfig { groups })
    }

    pub fn get(&self, id: GroupId) -> &Group {
        &self.groups[id.index()]
    }

    pub fn get_mut(&mut self, id: GroupId) -> &mut Group {
        &mut self.groups[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter()
    }
}

impl Default for GroupConfig {
    fn default() -> Self {
        GroupConfig::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage_group() -> Group {
        let mut group = Group::new(GroupId::new(3).unwrap());

        group.label = "StageLeft".to_owned();
        group.intensity = 50;
        for (i, channel) in group.channels.iter_mut().enumerate() {
            *channel = (i * 7) as Level;
        }
        group
    }

    #[test]
    fn test_group_id_bounds() {
        assert!(GroupId::new(GROUP_COUNT - 1).is_ok());
        assert_eq!(GroupId::new(GROUP_COUNT), Err(GroupIdError::OutOfRange(GROUP_COUNT)));
        assert_eq!(GroupId::all().count(), GROUP_COUNT);
    }

    #[test]
    fn test_new_group_is_dark() {
        let group = Group::new(GroupId::new(7).unwrap());

        assert_eq!(group.id().index(), 7);
        assert_eq!(group.intensity, 0);
        assert!(group.label.is_empty());
        assert!(group.channels.iter().all(|c| *c == 0));
    }

    #[test]
    fn test_stringify_group() {
        let mut group = Group::new(GroupId::new(1).unwrap());
        group.label = "Hall".to_owned();
        group.intensity = 20;
        group.channels[0] = 255;

        let text = group.to_string();

        assert!(text.starts_with("1,Hall,20,255,0,"));
        assert!(text.ends_with(",0,"));
        assert_eq!(text.matches(',').count(), 3 + CHANNEL_COUNT);
    }

    #[test]
    fn test_stringify_round_trip() {
        let group = stage_group();
        let decoded: Group = group.to_string().parse().unwrap();

        assert_eq!(decoded, group);
    }

    #[test]
    fn test_default_group_round_trip() {
        for id in GroupId::all() {
            let group = Group::new(id);
            assert_eq!(group.to_string().parse::<Group>().unwrap(), group);
        }
    }

    #[test]
    fn test_decode_rejects_out_of_range_id() {
        let mut text = stage_group().to_string();
        text.replace_range(0..1, "42");

        let e = text.parse::<Group>().unwrap_err();
        assert!(matches!(e.current_context(), DecodeError::Context(_)));
    }

    #[test]
    fn test_new_config_has_positional_ids() {
        let config = GroupConfig::new();

        for (slot, group) in config.iter().enumerate() {
            assert_eq!(group.id().index(), slot);
        }
    }

    #[test]
    fn test_try_from_groups_validates_slots() {
        let mut groups: Vec<Group> = GroupId::all().map(Group::new).collect();
        groups.swap(2, 5);
        assert_eq!(GroupConfig::try_from_groups(groups), Err(GroupIdError::SlotMismatch { slot: 2, id: 5 }));

        let groups: Vec<Group> = GroupId::all().take(4).map(Group::new).collect();
        assert_eq!(GroupConfig::try_from_groups(groups), Err(GroupIdError::GroupCount(4)));

        let groups: Vec<Group> = GroupId::all().map(Group::new).collect();
        assert_eq!(GroupConfig::try_from_groups(groups).unwrap(), GroupConfig::new());
    }

    #[test]
    fn test_get_mut_keeps_id() {
        let mut config = GroupConfig::new();
        let id = GroupId::new(4).unwrap();

        config.get_mut(id).intensity = 99;

        assert_eq!(config.get(id).intensity, 99);
        assert_eq!(config.get(id).id(), id);
    }
}
