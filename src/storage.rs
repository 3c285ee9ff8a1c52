use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use zeroize::Zeroizing;

use crate::crypto::{self, CryptoError};
use crate::models::DayLog;

/// Storage key the day log lives under unless configured otherwise.
pub const DEFAULT_NAMESPACE: &str = "lunacal-data";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),
    #[error("stored document is sealed; set a passphrase to open it")]
    NeedsPassphrase,
    #[error("stored day log could not be opened; refusing to overwrite it")]
    Locked,
}

/// A flat key-value store holding whole documents.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Move an unreadable value under a fresh key so it is neither parsed
    /// again nor overwritten. Returns where it went, or `None` when there
    /// was nothing to move. Earlier set-aside copies are never replaced.
    fn set_aside(&self, key: &str) -> Result<Option<String>, StorageError>;
}

/// One file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(self.path_for(key)?) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)?;
        // Write next to the target and rename so a crash never leaves half a document.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)?) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn set_aside(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let stamp = chrono::Local::now().format("%Y%m%d%H%M%S");
        let base = format!("{key}.json.corrupt-{stamp}");
        let mut name = base.clone();
        let mut n = 1;
        while self.dir.join(&name).exists() {
            n += 1;
            name = format!("{base}-{n}");
        }
        fs::rename(&path, self.dir.join(&name))?;
        Ok(Some(name))
    }
}

/// In-memory store, mainly for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RefCell<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.values.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.values.borrow_mut().remove(key);
        Ok(())
    }

    fn set_aside(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut values = self.values.borrow_mut();
        let Some(bytes) = values.remove(key) else {
            return Ok(None);
        };
        let name = (1..)
            .map(|n| format!("{key}.corrupt-{n}"))
            .find(|name| !values.contains_key(name))
            .unwrap_or_else(|| format!("{key}.corrupt"));
        values.insert(name.clone(), bytes);
        Ok(Some(name))
    }
}

/// Wraps another store and encrypts every value with a passphrase.
///
/// Plain documents written before a passphrase was set are passed through on
/// read and sealed on the next write.
pub struct SealedStore<S> {
    inner: S,
    passphrase: Zeroizing<String>,
}

impl<S: KeyValueStore> SealedStore<S> {
    pub fn new(inner: S, passphrase: String) -> Self {
        Self {
            inner,
            passphrase: Zeroizing::new(passphrase),
        }
    }
}

impl<S: KeyValueStore> KeyValueStore for SealedStore<S> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match self.inner.get(key)? {
            Some(bytes) if crypto::is_sealed(&bytes) => {
                let opened = crypto::open(&self.passphrase, &bytes)?;
                Ok(Some(opened.to_vec()))
            }
            Some(plain) => {
                tracing::info!(key, "document is not sealed yet; it will be sealed on next save");
                Ok(Some(plain))
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let sealed = crypto::seal(&self.passphrase, value)?;
        self.inner.set(key, &sealed)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key)
    }

    fn set_aside(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.set_aside(key)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }

    fn set_aside(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).set_aside(key)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &S {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }

    fn set_aside(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).set_aside(key)
    }
}

/// How the stored day log came through [`open_log`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Loaded,
    Missing,
    /// The document was malformed and now lives under the given key.
    SetAside(String),
    /// The document exists but could not be opened (wrong or missing
    /// passphrase, unknown format, read error). It is left in place and
    /// must not be overwritten.
    Locked,
}

impl LoadStatus {
    /// Whether saving over the namespace is safe.
    pub fn is_writable(&self) -> bool {
        !matches!(self, LoadStatus::Locked)
    }
}

fn try_load(store: &impl KeyValueStore, namespace: &str) -> Result<Option<DayLog>, StorageError> {
    let Some(bytes) = store.get(namespace)? else {
        return Ok(None);
    };
    if crypto::is_sealed(&bytes) {
        return Err(StorageError::NeedsPassphrase);
    }
    let mut log: DayLog = serde_json::from_slice(&bytes)?;
    log.prune();
    Ok(Some(log))
}

/// Load the day log, never failing. Malformed documents are set aside and
/// yield an empty log; documents that merely cannot be opened are left where
/// they are and reported as [`LoadStatus::Locked`].
pub fn open_log(store: &impl KeyValueStore, namespace: &str) -> (DayLog, LoadStatus) {
    match try_load(store, namespace) {
        Ok(Some(log)) => {
            tracing::debug!(namespace, days = log.len(), "loaded day log");
            (log, LoadStatus::Loaded)
        }
        Ok(None) => (DayLog::new(), LoadStatus::Missing),
        Err(e @ (StorageError::Serialization(_) | StorageError::Crypto(CryptoError::Truncated))) => {
            tracing::warn!(namespace, error = %e, "day log is malformed, starting empty");
            match store.set_aside(namespace) {
                Ok(Some(aside)) => {
                    tracing::warn!(namespace, aside = %aside, "malformed day log set aside");
                    (DayLog::new(), LoadStatus::SetAside(aside))
                }
                Ok(None) => (DayLog::new(), LoadStatus::Missing),
                Err(e) => {
                    tracing::error!(namespace, error = %e, "failed to set aside malformed day log");
                    (DayLog::new(), LoadStatus::Locked)
                }
            }
        }
        Err(e) => {
            tracing::warn!(namespace, error = %e, "could not open day log, leaving it untouched");
            (DayLog::new(), LoadStatus::Locked)
        }
    }
}

/// Load the day log, discarding how it was loaded. See [`open_log`].
pub fn load_log(store: &impl KeyValueStore, namespace: &str) -> DayLog {
    open_log(store, namespace).0
}

/// Write the whole day log back as one JSON document.
pub fn save_log(
    store: &impl KeyValueStore,
    namespace: &str,
    log: &DayLog,
) -> Result<(), StorageError> {
    let json = serde_json::to_vec(log)?;
    store.set(namespace, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FlowLevel, Mood};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sample_log() -> DayLog {
        let mut log = DayLog::new();
        log.upsert(d("2024-01-01"), |r| {
            r.period = true;
            r.flow = Some(FlowLevel::Heavy);
        });
        log.upsert(d("2024-01-15"), |r| {
            r.mood = Some(Mood::Calm);
            r.notes = Some("slept well".into());
        });
        log
    }

    #[test]
    fn missing_document_loads_empty() {
        let store = MemoryStore::new();
        assert!(load_log(&store, DEFAULT_NAMESPACE).is_empty());
    }

    #[test]
    fn saved_log_loads_back_equal() {
        let store = MemoryStore::new();
        let log = sample_log();
        save_log(&store, DEFAULT_NAMESPACE, &log).unwrap();
        assert_eq!(load_log(&store, DEFAULT_NAMESPACE), log);
    }

    #[test]
    fn corrupt_document_is_set_aside() {
        let store = MemoryStore::new();
        store.set(DEFAULT_NAMESPACE, b"{not json").unwrap();

        let (log, status) = open_log(&store, DEFAULT_NAMESPACE);
        assert!(log.is_empty());
        assert_eq!(status, LoadStatus::SetAside("lunacal-data.corrupt-1".into()));
        assert!(status.is_writable());
        assert!(store.get(DEFAULT_NAMESPACE).unwrap().is_none());
        assert_eq!(
            store.get("lunacal-data.corrupt-1").unwrap().as_deref(),
            Some(&b"{not json"[..])
        );
    }

    #[test]
    fn set_aside_never_replaces_an_earlier_copy() {
        let store = MemoryStore::new();
        store.set(DEFAULT_NAMESPACE, b"first").unwrap();
        load_log(&store, DEFAULT_NAMESPACE);
        store.set(DEFAULT_NAMESPACE, b"second").unwrap();
        load_log(&store, DEFAULT_NAMESPACE);

        assert_eq!(store.get("lunacal-data.corrupt-1").unwrap().as_deref(), Some(&b"first"[..]));
        assert_eq!(store.get("lunacal-data.corrupt-2").unwrap().as_deref(), Some(&b"second"[..]));
    }

    #[test]
    fn empty_records_in_document_are_pruned() {
        let store = MemoryStore::new();
        store
            .set(
                DEFAULT_NAMESPACE,
                br#"{"2024-01-01":{},"2024-01-02":{"period":true,"notes":""}}"#,
            )
            .unwrap();
        let log = load_log(&store, DEFAULT_NAMESPACE);
        assert_eq!(log.len(), 1);
        assert!(log.is_period(d("2024-01-02")));
        assert_eq!(log.get(d("2024-01-02")).unwrap().notes, None);
    }

    #[test]
    fn file_store_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path().join("data"));
        let log = sample_log();

        save_log(&store, DEFAULT_NAMESPACE, &log).unwrap();
        assert!(temp.path().join("data/lunacal-data.json").exists());
        assert_eq!(load_log(&store, DEFAULT_NAMESPACE), log);

        store.remove(DEFAULT_NAMESPACE).unwrap();
        assert!(load_log(&store, DEFAULT_NAMESPACE).is_empty());
        store.remove(DEFAULT_NAMESPACE).unwrap();
    }

    #[test]
    fn file_store_keeps_corrupt_bytes() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path());
        fs::write(temp.path().join("lunacal-data.json"), "[1, 2").unwrap();

        let (log, status) = open_log(&store, DEFAULT_NAMESPACE);
        assert!(log.is_empty());
        let LoadStatus::SetAside(first) = status else {
            panic!("expected the document to be set aside, got {status:?}");
        };
        assert!(first.starts_with("lunacal-data.json.corrupt-"));
        assert_eq!(fs::read_to_string(temp.path().join(&first)).unwrap(), "[1, 2");

        // a second bad document in the same second must not clobber the first
        fs::write(temp.path().join("lunacal-data.json"), "{{").unwrap();
        let (_, status) = open_log(&store, DEFAULT_NAMESPACE);
        let LoadStatus::SetAside(second) = status else {
            panic!("expected the document to be set aside, got {status:?}");
        };
        assert_ne!(first, second);
        assert_eq!(fs::read_to_string(temp.path().join(&first)).unwrap(), "[1, 2");
        assert_eq!(fs::read_to_string(temp.path().join(&second)).unwrap(), "{{");
    }

    #[test]
    fn file_store_rejects_path_like_keys() {
        let store = FileStore::new("/tmp/unused");
        assert!(matches!(
            store.get("../escape"),
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[test]
    fn sealed_store_encrypts_values() {
        let store = SealedStore::new(MemoryStore::new(), "hunter2".to_string());
        let log = sample_log();
        save_log(&store, DEFAULT_NAMESPACE, &log).unwrap();

        let raw = store.inner.get(DEFAULT_NAMESPACE).unwrap().unwrap();
        assert!(serde_json::from_slice::<DayLog>(&raw).is_err());
        assert_eq!(load_log(&store, DEFAULT_NAMESPACE), log);
    }

    #[test]
    fn wrong_passphrase_leaves_document_in_place() {
        let inner = MemoryStore::new();
        let sealed = crypto::seal("right", br#"{"2024-01-01":{"period":true}}"#).unwrap();
        inner.set(DEFAULT_NAMESPACE, &sealed).unwrap();

        let store = SealedStore::new(&inner, "wrong".to_string());
        let (log, status) = open_log(&store, DEFAULT_NAMESPACE);
        assert!(log.is_empty());
        assert_eq!(status, LoadStatus::Locked);
        assert!(!status.is_writable());
        assert_eq!(inner.get(DEFAULT_NAMESPACE).unwrap(), Some(sealed));
        assert!(inner.get("lunacal-data.corrupt-1").unwrap().is_none());
    }

    #[test]
    fn right_then_wrong_then_right_passphrase_keeps_log() {
        let inner = MemoryStore::new();
        let log = sample_log();
        save_log(&SealedStore::new(&inner, "right".to_string()), DEFAULT_NAMESPACE, &log).unwrap();

        let (_, status) = open_log(&SealedStore::new(&inner, "wrong".to_string()), DEFAULT_NAMESPACE);
        assert_eq!(status, LoadStatus::Locked);

        let (reopened, status) =
            open_log(&SealedStore::new(&inner, "right".to_string()), DEFAULT_NAMESPACE);
        assert_eq!(status, LoadStatus::Loaded);
        assert_eq!(reopened, log);
    }

    #[test]
    fn sealed_document_without_passphrase_is_locked() {
        let store = MemoryStore::new();
        save_log(&SealedStore::new(&store, "right".to_string()), DEFAULT_NAMESPACE, &sample_log())
            .unwrap();

        let (log, status) = open_log(&store, DEFAULT_NAMESPACE);
        assert!(log.is_empty());
        assert_eq!(status, LoadStatus::Locked);
        assert!(store.get(DEFAULT_NAMESPACE).unwrap().is_some());
    }

    #[test]
    fn plain_document_is_sealed_on_next_save() {
        let inner = MemoryStore::new();
        let log = sample_log();
        save_log(&inner, DEFAULT_NAMESPACE, &log).unwrap();

        let store = SealedStore::new(&inner, "hunter2".to_string());
        let (loaded, status) = open_log(&store, DEFAULT_NAMESPACE);
        assert_eq!(status, LoadStatus::Loaded);
        assert_eq!(loaded, log);

        save_log(&store, DEFAULT_NAMESPACE, &loaded).unwrap();
        assert!(crypto::is_sealed(&inner.get(DEFAULT_NAMESPACE).unwrap().unwrap()));
    }
}
