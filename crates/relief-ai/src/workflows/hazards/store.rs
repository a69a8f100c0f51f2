use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::EscalationRecord;

/// Key-value store of last-seen escalation state, keyed by external event id.
pub trait EscalationStore: Send + Sync {
    fn get(&self, event_id: &str) -> Result<Option<EscalationRecord>, StoreError>;
    fn put(&self, event_id: &str, record: EscalationRecord) -> Result<(), StoreError>;

    /// Apply a whole poll's updates. Implementations either apply all of them or none.
    fn put_all(&self, updates: Vec<(String, EscalationRecord)>) -> Result<(), StoreError> {
        for (event_id, record) in updates {
            self.put(&event_id, record)?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("escalation store io failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("escalation store at {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("escalation store unavailable: {0}")]
    Unavailable(String),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryEscalationStore {
    records: Arc<Mutex<HashMap<String, EscalationRecord>>>,
}

impl InMemoryEscalationStore {
    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EscalationStore for InMemoryEscalationStore {
    fn get(&self, event_id: &str) -> Result<Option<EscalationRecord>, StoreError> {
        Ok(lock(&self.records).get(event_id).cloned())
    }

    fn put(&self, event_id: &str, record: EscalationRecord) -> Result<(), StoreError> {
        lock(&self.records).insert(event_id.to_string(), record);
        Ok(())
    }

    fn put_all(&self, updates: Vec<(String, EscalationRecord)>) -> Result<(), StoreError> {
        lock(&self.records).extend(updates);
        Ok(())
    }
}

/// JSON document on disk holding every record; rewritten through a temp file and rename.
#[derive(Debug)]
pub struct JsonFileEscalationStore {
    path: PathBuf,
    records: Mutex<BTreeMap<String, EscalationRecord>>,
}

impl JsonFileEscalationStore {
    /// Load existing state. A missing file starts empty; an unreadable one is an error so it
    /// is never silently overwritten.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let records = match std::fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, records: &BTreeMap<String, EscalationRecord>) -> Result<(), StoreError> {
        let io_error = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        let payload = serde_json::to_vec_pretty(records).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);

        let mut file = std::fs::File::create(&staging).map_err(io_error)?;
        file.write_all(&payload).map_err(io_error)?;
        file.sync_all().map_err(io_error)?;
        std::fs::rename(&staging, &self.path).map_err(io_error)
    }
}

impl EscalationStore for JsonFileEscalationStore {
    fn get(&self, event_id: &str) -> Result<Option<EscalationRecord>, StoreError> {
        Ok(lock(&self.records).get(event_id).cloned())
    }

    fn put(&self, event_id: &str, record: EscalationRecord) -> Result<(), StoreError> {
        self.put_all(vec![(event_id.to_string(), record)])
    }

    fn put_all(&self, updates: Vec<(String, EscalationRecord)>) -> Result<(), StoreError> {
        let mut guard = lock(&self.records);
        let mut next = guard.clone();
        next.extend(updates);
        self.persist(&next)?;
        *guard = next;
        Ok(())
    }
}
