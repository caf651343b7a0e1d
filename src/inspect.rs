//! Metadata-only inspection of a packed archive.
//!
//! [`inspect`] opens an archive, classifies every entry by its reserved descriptor name,
//! decodes group and array descriptors, and assembles a [`HierarchyReport`] keyed by
//! hierarchy path. Chunk payloads are never read or decoded, only counted from the key
//! listing, so inspection stays cheap for archives holding gigabytes of chunk data.
//!
//! Inspection is resilient per path: a descriptor that fails to decode is reported as a
//! [`NodeInfo::Malformed`] entry for that path without hiding the rest of the hierarchy.
//! Only container level failures, such as an unreadable central directory, abort the whole
//! inspection.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use thiserror::Error;

use crate::archive::ArchiveError;
use crate::array::ChunkKeyEncoding;
use crate::metadata::{attributes_from_bytes, ArrayMetadata, Attributes, GroupMetadata};
use crate::node::NodePath;
use crate::storage::{
    Bytes, ListableStorageTraits, ReadableStorageTraits, StorageError, ZipStore,
};

/// An inspection error.
///
/// Per-path descriptor failures are folded into the report instead; only failures of the
/// archive or store as a whole surface here.
#[derive(Debug, Error)]
pub enum InspectError {
    /// The archive could not be opened.
    #[error(transparent)]
    ArchiveError(#[from] ArchiveError),
    /// The store could not be read.
    #[error(transparent)]
    StorageError(#[from] StorageError),
}

/// What a hierarchy path was classified as.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeInfo {
    /// A group.
    Group,
    /// An array.
    Array {
        /// The decoded array descriptor.
        metadata: ArrayMetadata,
        /// How many chunk entries are present in the store.
        ///
        /// Absent chunks read as the fill value, so this may be less than the chunk count
        /// of the grid.
        chunks_stored: u64,
    },
    /// A path whose descriptors are invalid.
    Malformed {
        /// Why the path could not be decoded.
        reason: String,
    },
}

/// The report for one hierarchy path.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeReport {
    /// The hierarchy path.
    pub path: NodePath,
    /// The classification of the path.
    pub info: NodeInfo,
    /// The decoded attributes of the path, if an attribute descriptor is present.
    pub attributes: Option<Attributes>,
}

/// The report of an inspected hierarchy, one entry per path in lexicographic order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HierarchyReport {
    nodes: Vec<NodeReport>,
}

impl HierarchyReport {
    /// All node reports in lexicographic path order.
    #[must_use]
    pub fn nodes(&self) -> &[NodeReport] {
        &self.nodes
    }

    /// The report at `path`, if any.
    #[must_use]
    pub fn get(&self, path: &NodePath) -> Option<&NodeReport> {
        self.nodes.iter().find(|node| &node.path == path)
    }

    /// The reports of every well-formed array.
    pub fn arrays(&self) -> impl Iterator<Item = &NodeReport> {
        self.nodes
            .iter()
            .filter(|node| matches!(node.info, NodeInfo::Array { .. }))
    }

    /// The reports of every malformed path.
    pub fn malformed(&self) -> impl Iterator<Item = &NodeReport> {
        self.nodes
            .iter()
            .filter(|node| matches!(node.info, NodeInfo::Malformed { .. }))
    }
}

impl fmt::Display for HierarchyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            write!(f, "{}", node.path)?;
            match &node.info {
                NodeInfo::Group => write!(f, " (group)")?,
                NodeInfo::Array {
                    metadata,
                    chunks_stored,
                } => {
                    let compressor = metadata
                        .compressor
                        .as_ref()
                        .map_or("none", |compressor| compressor.id());
                    write!(
                        f,
                        " (array) shape {:?} chunks {:?} dtype {} compressor {compressor} [{chunks_stored} chunks stored]",
                        metadata.shape, metadata.chunks, metadata.dtype
                    )?;
                }
                NodeInfo::Malformed { reason } => write!(f, " (malformed: {reason})")?,
            }
            if let Some(attributes) = &node.attributes {
                write!(f, " attributes: {} keys", attributes.len())?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct NodeEntry {
    group: Option<Bytes>,
    array: Option<Bytes>,
    attributes: Option<Bytes>,
    data_names: Vec<String>,
}

/// Inspect the zip archive at `path`.
///
/// # Errors
/// Returns [`ArchiveError::Corrupt`] via [`InspectError::ArchiveError`] if the container is
/// structurally invalid.
pub fn inspect_path(path: impl AsRef<Path>) -> Result<HierarchyReport, InspectError> {
    let store = ZipStore::open(path)?;
    inspect_store(&store)
}

/// Inspect an in-memory zip archive.
///
/// # Errors
/// Returns [`ArchiveError::Corrupt`] via [`InspectError::ArchiveError`] if the container is
/// structurally invalid.
pub fn inspect(bytes: Bytes) -> Result<HierarchyReport, InspectError> {
    let store = ZipStore::from_bytes(bytes)?;
    inspect_store(&store)
}

/// Inspect any readable, listable store.
///
/// # Errors
/// Returns [`InspectError::StorageError`] if the store cannot be enumerated or read.
pub fn inspect_store<TStorage>(store: &TStorage) -> Result<HierarchyReport, InspectError>
where
    TStorage: ReadableStorageTraits + ListableStorageTraits + ?Sized,
{
    let mut entries: BTreeMap<NodePath, NodeEntry> = BTreeMap::new();
    for key in store.list()? {
        let path = NodePath::from(&key);
        let entry = entries.entry(path).or_default();
        match key.name() {
            ".zgroup" => entry.group = store.get(&key)?,
            ".zarray" => entry.array = store.get(&key)?,
            ".zattrs" => entry.attributes = store.get(&key)?,
            name => entry.data_names.push(name.to_string()),
        }
    }

    // Every valid hierarchy carries a descriptor at its root.
    let root = NodePath::root();
    if !entries
        .get(&root)
        .is_some_and(|entry| entry.group.is_some() || entry.array.is_some())
    {
        entries.entry(root).or_default();
    }

    let mut nodes = Vec::with_capacity(entries.len());
    for (path, entry) in entries {
        if let Some(node) = report_node(&path, entry) {
            nodes.push(node);
        }
    }
    Ok(HierarchyReport { nodes })
}

fn report_node(path: &NodePath, entry: NodeEntry) -> Option<NodeReport> {
    let info = classify(path, &entry);
    if info.is_none() && entry.attributes.is_none() {
        // Paths holding only chunk data belong to an ancestor array, not the tree.
        return None;
    }
    let (attributes, info) = match &entry.attributes {
        Some(bytes) => match attributes_from_bytes(bytes) {
            Ok(attributes) => (Some(attributes), info),
            Err(err) => (
                None,
                Some(NodeInfo::Malformed {
                    reason: format!("invalid attribute descriptor: {err}"),
                }),
            ),
        },
        None => (None, info),
    };
    let info = info.unwrap_or_else(|| NodeInfo::Malformed {
        reason: "attribute descriptor without a group or array descriptor".to_string(),
    });
    Some(NodeReport {
        path: path.clone(),
        info,
        attributes,
    })
}

/// Classify the descriptors at a path, or [`None`] if the path holds no descriptor.
fn classify(path: &NodePath, entry: &NodeEntry) -> Option<NodeInfo> {
    match (&entry.group, &entry.array) {
        (Some(_), Some(_)) => Some(NodeInfo::Malformed {
            reason: "both group and array descriptors present".to_string(),
        }),
        (Some(group), None) => Some(match GroupMetadata::from_bytes(group) {
            Ok(_) => NodeInfo::Group,
            Err(err) => NodeInfo::Malformed {
                reason: format!("invalid group descriptor: {err}"),
            },
        }),
        (None, Some(array)) => Some(match ArrayMetadata::from_bytes(array) {
            Ok(metadata) => {
                let chunks_stored = count_chunks(&metadata, &entry.data_names);
                NodeInfo::Array {
                    metadata,
                    chunks_stored,
                }
            }
            Err(err) => NodeInfo::Malformed {
                reason: format!("invalid array descriptor: {err}"),
            },
        }),
        (None, None) if path.is_root() => Some(NodeInfo::Malformed {
            reason: "missing root descriptor".to_string(),
        }),
        (None, None) => None,
    }
}

fn count_chunks(metadata: &ArrayMetadata, data_names: &[String]) -> u64 {
    let encoding = ChunkKeyEncoding::new(metadata.dimension_separator);
    data_names
        .iter()
        .filter(|name| {
            encoding
                .decode(name)
                .is_some_and(|indices| indices.len() == metadata.shape.len().max(1))
        })
        .count() as u64
}
