use std::io::{self, Read, Write};

use error_stack::{Report, ResultExt};
use log::{error, info, warn};
use thiserror::Error;

use crate::config_payload::GroupConfigPayload;
use crate::group::{GroupConfig, GROUP_COUNT};
use crate::storage::{Storage, StorageError};

#[derive(Debug, Error)]
pub enum ConfigStoreError {
    #[error("Invalid group configuration document '{0}'")]
    Parse(String),

    #[error("Failed to serialize group configuration")]
    Serialize,

    #[error("Writing '{0}' produced no output")]
    EmptyWrite(String),

    #[error("In context of '{0}'")]
    Context(String),
}

pub type Result<T> = std::result::Result<T, Report<ConfigStoreError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Groups were read from the stored document
    Loaded,
    /// No document was found, default groups were created and written
    Initialized,
    /// The document could not be read, the previous groups are kept
    Failed,
}

struct CountingWriter<W: Write> {
    inner: W,
    written: usize,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let count = self.inner.write(buf)?;

        self.written += count;
        Ok(count)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Owns the group collection and keeps it in sync with its stored document
pub struct ConfigStore {
    storage: Box<dyn Storage>,
    resource: String,
    groups: GroupConfig,
}

impl ConfigStore {
    pub fn new(storage: Box<dyn Storage>, resource: &str) -> ConfigStore {
        ConfigStore {
            storage,
            resource: resource.to_owned(),
            groups: GroupConfig::new(),
        }
    }

    pub fn groups(&self) -> &GroupConfig {
        &self.groups
    }

    pub fn groups_mut(&mut self) -> &mut GroupConfig {
        &mut self.groups
    }

    fn is_absent(report: &Report<ConfigStoreError>) -> bool {
        report.frames().any(|frame| matches!(frame.downcast_ref::<StorageError>(), Some(StorageError::NotFound(_))))
    }

    fn read_document(&mut self) -> Result<GroupConfig> {
        let into_context = || ConfigStoreError::Context(format!("Reading group configuration from {}", self.resource));
        let reader = self.storage.open_read(&self.resource).change_context_lazy(into_context)?;

        let payload: GroupConfigPayload = serde_json::from_reader(reader)
            .change_context_lazy(|| ConfigStoreError::Parse(self.resource.clone()))?;

        GroupConfig::try_from(payload).change_context_lazy(|| ConfigStoreError::Parse(self.resource.clone()))
    }

    /// Replace the groups with the stored document.
    ///
    /// A missing document is replaced by default groups, which are written back. Any other
    /// failure is logged and leaves the current groups untouched.
    #[tracing::instrument(skip(self), fields(resource = %self.resource))]
    pub fn load(&mut self) -> LoadOutcome {
        info!("Reading group configuration from {}", self.resource);

        let (document, outcome) = match self.read_document() {
            Err(e) if ConfigStore::is_absent(&e) => {
                warn!("{} not found, writing default group configuration", self.resource);

                if let Err(e) = self.initialize() {
                    error!("Failed to write default group configuration: {:?}", e);
                }

                (self.read_document(), LoadOutcome::Initialized)
            }
            document => (document, LoadOutcome::Loaded),
        };

        match document {
            Ok(groups) => {
                self.groups = groups;
                outcome
            }
            Err(e) => {
                error!("Failed to load group configuration: {:?}", e);
                LoadOutcome::Failed
            }
        }
    }

    /// Reset every group to its default and write the result
    pub fn initialize(&mut self) -> Result<()> {
        info!("Creating {} default groups", GROUP_COUNT);
        self.groups = GroupConfig::new();
        self.save()
    }

    #[tracing::instrument(skip(self), fields(resource = %self.resource))]
    pub fn save(&mut self) -> Result<()> {
        let into_context = || ConfigStoreError::Context(format!("Writing group configuration to {}", self.resource));
        let payload = GroupConfigPayload::from(&self.groups);

        info!("Writing group configuration to {}", self.resource);

        let mut writer = CountingWriter {
            inner: self.storage.open_write(&self.resource).change_context_lazy(into_context)?,
            written: 0,
        };

        serde_json::to_writer_pretty(&mut writer, &payload)
            .change_context(ConfigStoreError::Serialize)
            .change_context_lazy(into_context)?;
        writer.flush()
            .map_err(StorageError::from)
            .change_context_lazy(into_context)?;

        if writer.written == 0 {
            return Err(Report::new(ConfigStoreError::EmptyWrite(self.resource.clone())));
        }

        info!("Group configuration written ({} bytes)", writer.written);
        Ok(())
    }

    pub fn delete(&mut self) -> Result<()> {
        info!("Deleting {}", self.resource);

        self.storage.remove(&self.resource)
            .change_context_lazy(|| ConfigStoreError::Context(format!("Deleting {}", self.resource)))?;

        info!("{} deleted", self.resource);
        Ok(())
    }

    /// Log the raw stored document line by line and return it
    pub fn dump(&mut self) -> Result<String> {
        let into_context = || ConfigStoreError::Context(format!("Dumping {}", self.resource));
        let mut content = Vec::new();

        self.storage.open_read(&self.resource)
            .change_context_lazy(into_context)?
            .read_to_end(&mut content)
            .map_err(StorageError::from)
            .change_context_lazy(into_context)?;

        let content = String::from_utf8_lossy(&content).into_owned();
        for line in content.lines() {
            info!("{}: {}", self.resource, line);
        }

        Ok(content)
    }
}
