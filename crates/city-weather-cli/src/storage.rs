use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

/// Key under which the selected city id is persisted.
pub const SELECTED_CITY_KEY: &str = "selectedCityId";

const PREFERENCES_FILE: &str = "preferences.json";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage error: {0}")]
    Other(String),
}

impl From<io::Error> for StorageError {
    fn from(error: io::Error) -> Self {
        let message = error.to_string();
        match error.kind() {
            io::ErrorKind::StorageFull => StorageError::QuotaExceeded(message),
            io::ErrorKind::PermissionDenied | io::ErrorKind::ReadOnlyFilesystem => {
                StorageError::Unavailable(message)
            }
            _ => StorageError::Other(message),
        }
    }
}

/// String key-value store backing the persisted selection.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

pub fn preferences_path(data_dir: &Path) -> PathBuf {
    data_dir.join("city-weather").join(PREFERENCES_FILE)
}

/// JSON object file holding every key, rewritten atomically on `set`.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(preferences_path(data_dir))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_payload(&self) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(payload) => Ok(Some(payload)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn parse_entries(&self, payload: &str) -> Result<BTreeMap<String, String>, StorageError> {
        serde_json::from_str(payload).map_err(|error| {
            StorageError::Other(format!(
                "unreadable preferences at {}: {error}",
                self.path.display()
            ))
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.read_payload()? {
            Some(payload) => Ok(self.parse_entries(&payload)?.remove(key)),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        // Read failures propagate; only an unparsable payload is replaced.
        let mut entries = match self.read_payload()? {
            Some(payload) => self.parse_entries(&payload).unwrap_or_else(|error| {
                debug!(%error, "replacing unreadable preferences file");
                BTreeMap::new()
            }),
            None => BTreeMap::new(),
        };
        entries.insert(key.to_string(), value.to_string());

        let payload = serde_json::to_vec_pretty(&entries)
            .map_err(|error| StorageError::Other(error.to_string()))?;
        write_atomic(&self.path, &payload)?;
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "preferences path must have a parent directory",
        )
    })?;
    fs::create_dir_all(parent)?;

    let tmp_path = path.with_extension(format!("{}.tmp", std::process::id()));
    fs::write(&tmp_path, bytes)?;
    if let Err(error) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }
    Ok(())
}

/// In-process store. `failing` builds one that rejects every call, which
/// stands in for disabled or full storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<BTreeMap<String, String>>,
    failure: Option<StorageError>,
}

impl MemoryStore {
    pub fn failing(error: StorageError) -> Self {
        Self {
            entries: RefCell::default(),
            failure: Some(error),
        }
    }

    fn check(&self) -> Result<(), StorageError> {
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check()?;
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check()?;
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Fault-tolerant accessor for the selected city id.
///
/// Storage failures never escape: they are logged as warnings and read
/// as "nothing saved".
pub struct CityPreference<'a> {
    store: &'a dyn KeyValueStore,
}

impl<'a> CityPreference<'a> {
    pub fn new(store: &'a dyn KeyValueStore) -> Self {
        Self { store }
    }

    pub fn save(&self, city_id: &str) -> bool {
        match self.store.set(SELECTED_CITY_KEY, city_id) {
            Ok(()) => {
                debug!(city_id, "saved city selection");
                true
            }
            Err(StorageError::QuotaExceeded(detail)) => {
                warn!(%detail, "storage quota exceeded, unable to save city selection");
                false
            }
            Err(StorageError::Unavailable(detail)) => {
                warn!(%detail, "storage unavailable, city selection not saved");
                false
            }
            Err(StorageError::Other(detail)) => {
                warn!(%detail, "failed to save city selection");
                false
            }
        }
    }

    pub fn load(&self) -> Option<String> {
        match self.store.get(SELECTED_CITY_KEY) {
            Ok(value) => value,
            Err(StorageError::Unavailable(detail)) => {
                warn!(%detail, "storage unavailable, ignoring saved city selection");
                None
            }
            Err(error) => {
                warn!(%error, "failed to load city selection");
                None
            }
        }
    }
}

impl std::fmt::Debug for CityPreference<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CityPreference").finish_non_exhaustive()
    }
}
