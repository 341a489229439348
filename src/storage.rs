use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use error_stack::{Report, ResultExt};
use log::{debug, trace};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Resource '{0}' not found")]
    NotFound(String),

    #[error("I/O error: {0}")]
    IoError(
        #[from]
        #[source]
        io::Error,
    ),

    #[error("In context of '{0}'")]
    Context(String),
}

pub type Result<T> = std::result::Result<T, Report<StorageError>>;

/// Byte oriented store of named resources. Closing a stream is dropping it.
pub trait Storage {
    fn exists(&self, name: &str) -> bool;
    fn open_read(&mut self, name: &str) -> Result<Box<dyn Read + '_>>;
    /// Open `name` for writing, truncating any previous content
    fn open_write(&mut self, name: &str) -> Result<Box<dyn Write + '_>>;
    fn remove(&mut self, name: &str) -> Result<()>;
}

/// Resources are files under a root directory
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn try_new(root: &Path) -> Result<Box<dyn Storage>> {
        let into_context = || StorageError::Context(format!("Creating storage directory {}", root.display()));

        fs::create_dir_all(root).map_err(StorageError::from).change_context_lazy(into_context)?;
        debug!("File storage at {}", root.display());

        Ok(Box::new(FileStorage { root: root.to_path_buf() }))
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn map_io_error(name: &str, e: io::Error) -> Report<StorageError> {
        if e.kind() == io::ErrorKind::NotFound {
            Report::new(StorageError::NotFound(name.to_owned()))
        } else {
            Report::new(StorageError::from(e)).change_context(StorageError::Context(format!("Accessing {name}")))
        }
    }
}

impl Storage for FileStorage {
    fn exists(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    fn open_read(&mut self, name: &str) -> Result<Box<dyn Read + '_>> {
        trace!("Open {} for reading", name);
        let file = File::open(self.path(name)).map_err(|e| FileStorage::map_io_error(name, e))?;

        Ok(Box::new(BufReader::new(file)))
    }

    fn open_write(&mut self, name: &str) -> Result<Box<dyn Write + '_>> {
        trace!("Open {} for writing", name);
        let file = File::create(self.path(name)).map_err(|e| FileStorage::map_io_error(name, e))?;

        Ok(Box::new(BufWriter::new(file)))
    }

    fn remove(&mut self, name: &str) -> Result<()> {
        trace!("Remove {}", name);
        fs::remove_file(self.path(name)).map_err(|e| FileStorage::map_io_error(name, e))
    }
}

/// Keeps resources in memory (used for emulation)
#[derive(Debug, Default)]
pub struct MemoryStorage {
    resources: HashMap<String, Vec<u8>>,
}

impl MemoryStorage {
    pub fn try_new() -> Result<Box<dyn Storage>> {
        Ok(Box::new(MemoryStorage::default()))
    }
}

impl Storage for MemoryStorage {
    fn exists(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    fn open_read(&mut self, name: &str) -> Result<Box<dyn Read + '_>> {
        match self.resources.get(name) {
            Some(content) => Ok(Box::new(content.as_slice())),
            None => Err(Report::new(StorageError::NotFound(name.to_owned()))),
        }
    }

    fn open_write(&mut self, name: &str) -> Result<Box<dyn Write + '_>> {
        let content = self.resources.entry(name.to_owned()).or_default();

        content.clear();
        Ok(Box::new(content))
    }

    fn remove(&mut self, name: &str) -> Result<()> {
        match self.resources.remove(name) {
            Some(_) => Ok(()),
            None => Err(Report::new(StorageError::NotFound(name.to_owned()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_resource(storage: &mut dyn Storage, name: &str, content: &str) {
        let mut writer = storage.open_write(name).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
        writer.flush().unwrap();
    }

    fn read_resource(storage: &mut dyn Storage, name: &str) -> String {
        let mut content = String::new();
        storage.open_read(name).unwrap().read_to_string(&mut content).unwrap();
        content
    }

    fn check_storage(storage: &mut dyn Storage) {
        assert!(!storage.exists("groups.json"));
        assert!(matches!(storage.open_read("groups.json").err().unwrap().current_context(), StorageError::NotFound(_)));

        write_resource(storage, "groups.json", "first version");
        write_resource(storage, "groups.json", "second");

        assert!(storage.exists("groups.json"));
        assert_eq!(read_resource(storage, "groups.json"), "second");

        storage.remove("groups.json").unwrap();
        assert!(!storage.exists("groups.json"));
        assert!(matches!(storage.remove("groups.json").unwrap_err().current_context(), StorageError::NotFound(_)));
    }

    #[test]
    fn test_memory_storage() {
        let mut storage = MemoryStorage::try_new().unwrap();

        check_storage(storage.as_mut());
    }

    #[test]
    fn test_file_storage() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::try_new(&dir.path().join("config")).unwrap();

        check_storage(storage.as_mut());
    }
}
