//! A read-only store backed by a zip archive.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use std::sync::Mutex;

use itertools::Itertools;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::archive::ArchiveError;
use crate::storage::{
    Bytes, ListableStorageTraits, MaybeBytes, ReadableStorageTraits, StorageError, StoreKey,
    StoreKeys, StorePrefix,
};

/// A read-only store backed by a zip archive.
///
/// Each [`get`](ReadableStorageTraits::get) performs a single targeted read of one entry; the
/// archive is never extracted eagerly. The store is safely shared between concurrent readers,
/// serialised on an internal lock over the archive cursor.
pub struct ZipStore<R: Read + Seek> {
    zip_archive: Mutex<ZipArchive<R>>,
}

impl ZipStore<BufReader<File>> {
    /// Open the zip archive at `path`.
    ///
    /// # Errors
    /// Returns [`ArchiveError::Corrupt`] if the archive's central directory is unreadable, or
    /// [`ArchiveError::IOError`] if the file cannot be read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl ZipStore<Cursor<Bytes>> {
    /// Open a zip archive held in memory.
    ///
    /// # Errors
    /// Returns [`ArchiveError::Corrupt`] if the archive's central directory is unreadable.
    pub fn from_bytes(bytes: Bytes) -> Result<Self, ArchiveError> {
        Self::new(Cursor::new(bytes))
    }
}

impl<R: Read + Seek> ZipStore<R> {
    /// Create a store over any readable, seekable zip archive.
    ///
    /// # Errors
    /// Returns [`ArchiveError::Corrupt`] if the archive's central directory is unreadable.
    pub fn new(reader: R) -> Result<Self, ArchiveError> {
        // A container whose central directory cannot be read is corrupt, even when the zip
        // crate surfaces the failure as an IO error such as an unexpected EOF.
        let zip_archive = ZipArchive::new(reader)
            .map_err(|err| ArchiveError::Corrupt(err.to_string()))?;
        Ok(Self {
            zip_archive: Mutex::new(zip_archive),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ZipArchive<R>>, StorageError> {
        self.zip_archive
            .lock()
            .map_err(|_| StorageError::from("zip archive lock poisoned"))
    }
}

fn zip_error_to_storage_error(err: ZipError) -> StorageError {
    match err {
        ZipError::Io(err) => StorageError::IOError(err),
        err => StorageError::Other(err.to_string()),
    }
}

impl<R: Read + Seek + Send> ReadableStorageTraits for ZipStore<R> {
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        let mut zip_archive = self.lock()?;
        let mut file = match zip_archive.by_name(key.as_str()) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(err) => return Err(zip_error_to_storage_error(err)),
        };
        let mut bytes = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
        file.read_to_end(&mut bytes)?;
        Ok(Some(bytes.into()))
    }

    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        let mut zip_archive = self.lock()?;
        let size = match zip_archive.by_name(key.as_str()) {
            Ok(file) => Some(file.size()),
            Err(ZipError::FileNotFound) => None,
            Err(err) => return Err(zip_error_to_storage_error(err)),
        };
        Ok(size)
    }
}

impl<R: Read + Seek + Send> ListableStorageTraits for ZipStore<R> {
    fn list(&self) -> Result<StoreKeys, StorageError> {
        Ok(self
            .lock()?
            .file_names()
            .filter_map(|name| StoreKey::try_from(name).ok())
            .sorted()
            .collect())
    }

    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        Ok(self
            .lock()?
            .file_names()
            .filter(|name| name.starts_with(prefix.as_str()))
            .filter_map(|name| StoreKey::try_from(name).ok())
            .sorted()
            .collect())
    }
}
