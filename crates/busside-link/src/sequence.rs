use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, trace};

use crate::error::{LinkError, Result};

/// Counter value written to a fresh (absent or truncated) store.
pub const INITIAL_SEQUENCE: u32 = 2;

/// Default location of the persisted counter.
pub const DEFAULT_SEQUENCE_PATH: &str = "/tmp/busside.seq";

const STORED_LEN: usize = 4;

/// Durable home of the sequence counter.
pub trait SequenceStore {
    /// Read the stored value. `None` means the store is absent or holds fewer
    /// than four bytes.
    fn load(&mut self) -> io::Result<Option<u32>>;

    /// Persist `value`. Must be durable when this returns.
    fn store(&mut self, value: u32) -> io::Result<()>;
}

/// Counter persisted as four little-endian bytes in a small file.
///
/// Updates go to a sibling `<name>.tmp` file that is synced and then renamed
/// over the counter file, so a failed or interrupted update leaves the
/// previous value in place.
#[derive(Debug, Clone)]
pub struct FileSequenceStore {
    path: PathBuf,
}

impl FileSequenceStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Default for FileSequenceStore {
    fn default() -> Self {
        Self::new(DEFAULT_SEQUENCE_PATH)
    }
}

impl SequenceStore for FileSequenceStore {
    fn load(&mut self) -> io::Result<Option<u32>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(decode_value(&bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn store(&mut self, value: u32) -> io::Result<()> {
        let temp = self.temp_path();
        let result = write_synced(&temp, &value.to_le_bytes())
            .and_then(|()| fs::rename(&temp, &self.path));
        if result.is_err() {
            let _ = fs::remove_file(&temp);
        }
        result
    }
}

/// In-memory store. Clones share the same cell, so dropping a counter and
/// opening a new one on a clone behaves like a process restart.
#[derive(Debug, Clone, Default)]
pub struct MemorySequenceStore {
    inner: Arc<Mutex<MemoryCell>>,
}

#[derive(Debug, Default)]
struct MemoryCell {
    bytes: Vec<u8>,
    unavailable: bool,
    writes: usize,
}

impl MemorySequenceStore {
    /// Empty store, as on first use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding `value`.
    pub fn with_value(value: u32) -> Self {
        Self::with_bytes(&value.to_le_bytes())
    }

    /// Store holding raw (possibly truncated) contents.
    pub fn with_bytes(bytes: &[u8]) -> Self {
        let store = Self::default();
        store.cell().bytes = bytes.to_vec();
        store
    }

    /// Currently stored value, if a full one is present.
    pub fn value(&self) -> Option<u32> {
        decode_value(&self.cell().bytes)
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> usize {
        self.cell().writes
    }

    /// Make every load and store fail, as if the backing medium vanished.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.cell().unavailable = unavailable;
    }

    fn cell(&self) -> MutexGuard<'_, MemoryCell> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SequenceStore for MemorySequenceStore {
    fn load(&mut self) -> io::Result<Option<u32>> {
        let cell = self.cell();
        if cell.unavailable {
            return Err(io::Error::other("sequence store unavailable"));
        }
        Ok(decode_value(&cell.bytes))
    }

    fn store(&mut self, value: u32) -> io::Result<()> {
        let mut cell = self.cell();
        if cell.unavailable {
            return Err(io::Error::other("sequence store unavailable"));
        }
        cell.bytes = value.to_le_bytes().to_vec();
        cell.writes += 1;
        Ok(())
    }
}

/// Strictly increasing sequence numbers that survive restarts.
///
/// Each number is persisted as used before it is handed out, so a crash
/// between allocation and transmission can skip a number but never repeat one.
#[derive(Debug)]
pub struct SequenceCounter<S> {
    store: S,
    next: u32,
}

impl<S: SequenceStore> SequenceCounter<S> {
    /// Load the counter, initializing the store to [`INITIAL_SEQUENCE`] on
    /// first use.
    pub fn open(mut store: S) -> Result<Self> {
        let next = match store.load().map_err(LinkError::StoreUnavailable)? {
            Some(value) => value,
            None => {
                store.store(INITIAL_SEQUENCE).map_err(LinkError::StoreUnavailable)?;
                debug!(value = INITIAL_SEQUENCE, "sequence store initialized");
                INITIAL_SEQUENCE
            }
        };
        Ok(Self { store, next })
    }

    /// Hand out the current number and durably advance the counter by one.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<u32> {
        let current = self.next;
        let advanced = current.checked_add(1).ok_or(LinkError::SequenceExhausted)?;
        self.store.store(advanced).map_err(LinkError::StoreUnavailable)?;
        self.next = advanced;
        trace!(sequence = current, "sequence allocated");
        Ok(current)
    }

    /// The number the next call to [`next`](Self::next) will return.
    pub fn peek(&self) -> u32 {
        self.next
    }

    /// Borrow the backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consume the counter and return the backing store.
    pub fn into_store(self) -> S {
        self.store
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_data()
}

fn decode_value(bytes: &[u8]) -> Option<u32> {
    bytes
        .get(..STORED_LEN)
        .and_then(|word| word.try_into().ok())
        .map(u32::from_le_bytes)
}
