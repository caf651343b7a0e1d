//! Packaging a store into a zip archive.
//!
//! [`pack`] serialises every entry of a store into a zip archive with one file per store
//! key. Entries are written without zip-level compression, so readers can seek directly to a
//! chunk and chunk payloads keep their codec encoding untouched. Archives are canonical:
//! entries appear in lexicographic key order with a fixed timestamp, so packing equal stores
//! produces byte-identical archives.
//!
//! A packed archive is read back through [`ZipStore`](crate::storage::ZipStore).

use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::storage::{Bytes, ReadableListableStorageTraits, StorageError};

/// An archive error.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The archive structure is invalid, such as an unreadable central directory.
    #[error("corrupt archive: {0}")]
    Corrupt(String),
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// An error reading the source store.
    #[error(transparent)]
    StorageError(#[from] StorageError),
}

impl From<ZipError> for ArchiveError {
    fn from(err: ZipError) -> Self {
        match err {
            ZipError::Io(err) => Self::IOError(err),
            err => Self::Corrupt(err.to_string()),
        }
    }
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(zip::DateTime::default())
        .large_file(true)
}

/// Write every entry of `store` to `writer` as a zip archive, returning the writer.
///
/// Entries are stored uncompressed in lexicographic key order with a fixed timestamp.
///
/// # Errors
/// Returns an [`ArchiveError`] if the store cannot be read or the archive cannot be written.
pub fn write_store<TStorage, W>(store: &TStorage, writer: W) -> Result<W, ArchiveError>
where
    TStorage: ReadableListableStorageTraits + ?Sized,
    W: Write + Seek,
{
    let mut zip_writer = ZipWriter::new(writer);
    for key in store.list()? {
        let Some(bytes) = store.get(&key)? else {
            // The entry was erased between list and get.
            continue;
        };
        zip_writer.start_file(key.as_str(), entry_options())?;
        zip_writer.write_all(&bytes)?;
    }
    Ok(zip_writer.finish()?)
}

/// Pack `store` into a zip archive at `path`.
///
/// The archive is written to a temporary sibling file, synced, and atomically renamed over
/// `path`, so a crash mid-write never leaves a partial archive at the destination. On
/// failure the temporary file is removed and `path` is untouched.
///
/// # Errors
/// Returns an [`ArchiveError`] if the store cannot be read or the archive cannot be written.
pub fn pack<TStorage>(store: &TStorage, path: impl AsRef<Path>) -> Result<(), ArchiveError>
where
    TStorage: ReadableListableStorageTraits + ?Sized,
{
    let path = path.as_ref();
    let mut tmp_os = path.as_os_str().to_owned();
    tmp_os.push(".tmp");
    let tmp_path = PathBuf::from(tmp_os);

    let result = pack_to_file(store, &tmp_path);
    match result {
        Ok(()) => {
            std::fs::rename(&tmp_path, path)?;
            Ok(())
        }
        Err(err) => {
            let _ = std::fs::remove_file(&tmp_path);
            Err(err)
        }
    }
}

fn pack_to_file<TStorage>(store: &TStorage, path: &Path) -> Result<(), ArchiveError>
where
    TStorage: ReadableListableStorageTraits + ?Sized,
{
    let file = File::create(path)?;
    let writer = write_store(store, BufWriter::new(file))?;
    let file = writer
        .into_inner()
        .map_err(|err| ArchiveError::IOError(err.into_error()))?;
    file.sync_all()?;
    Ok(())
}

/// Pack `store` into an in-memory zip archive.
///
/// # Errors
/// Returns an [`ArchiveError`] if the store cannot be read or the archive cannot be written.
pub fn pack_to_bytes<TStorage>(store: &TStorage) -> Result<Bytes, ArchiveError>
where
    TStorage: ReadableListableStorageTraits + ?Sized,
{
    let writer = write_store(store, Cursor::new(Vec::new()))?;
    Ok(writer.into_inner().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{
        ListableStorageTraits, MemoryStore, ReadableStorageTraits, StoreKey,
        WritableStorageTraits, ZipStore,
    };

    fn example_store() -> MemoryStore {
        let store = MemoryStore::new();
        for (key, value) in [
            ("foo/.zarray", "{}"),
            ("foo/0.0", "chunk00"),
            (".zgroup", "{\n    \"zarr_format\": 2\n}"),
            ("foo/1.0", "chunk10"),
        ] {
            store
                .set(&StoreKey::new(key).unwrap(), value.as_bytes().to_vec().into())
                .unwrap();
        }
        store
    }

    #[test]
    fn pack_and_read_back() {
        let store = example_store();
        let bytes = pack_to_bytes(&store).unwrap();
        let zip_store = ZipStore::from_bytes(bytes).unwrap();
        assert_eq!(zip_store.list().unwrap(), store.list().unwrap());
        for key in store.list().unwrap() {
            assert_eq!(zip_store.get(&key).unwrap(), store.get(&key).unwrap());
        }
    }

    #[test]
    fn zip_store_reports_entry_sizes() {
        let bytes = pack_to_bytes(&example_store()).unwrap();
        let zip_store = ZipStore::from_bytes(bytes).unwrap();
        let key = StoreKey::new("foo/0.0").unwrap();
        assert_eq!(
            zip_store.size_key(&key).unwrap(),
            Some("chunk00".len() as u64)
        );
        let missing = StoreKey::new("foo/9.9").unwrap();
        assert_eq!(zip_store.size_key(&missing).unwrap(), None);
    }

    #[test]
    fn pack_is_deterministic() {
        let bytes_a = pack_to_bytes(&example_store()).unwrap();
        let bytes_b = pack_to_bytes(&example_store()).unwrap();
        assert_eq!(bytes_a, bytes_b);
    }

    #[test]
    fn entries_are_stored_uncompressed() {
        let bytes = pack_to_bytes(&example_store()).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
        for index in 0..archive.len() {
            let entry = archive.by_index(index).unwrap();
            assert_eq!(entry.compression(), CompressionMethod::Stored);
            assert_eq!(entry.size(), entry.compressed_size());
        }
    }

    #[test]
    fn truncated_archive_is_corrupt() {
        let bytes = pack_to_bytes(&example_store()).unwrap();
        let truncated = bytes.slice(0..bytes.len() / 2);
        assert!(matches!(
            ZipStore::from_bytes(truncated),
            Err(ArchiveError::Corrupt(_))
        ));
    }

    #[test]
    fn pack_to_path_is_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hierarchy.zarr.zip");
        pack(&example_store(), &path).unwrap();
        assert!(path.is_file());
        // No temporary file remains.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        let zip_store = ZipStore::open(&path).unwrap();
        assert_eq!(zip_store.list().unwrap().len(), 4);
    }
}
