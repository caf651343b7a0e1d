//! Conversion of a dataset into a chunked archive.
//!
//! [`convert`] reads variables out of a [`Dataset`], chunks them on a regular grid, and
//! packages the result as a zip archive: one array per variable under the hierarchy root,
//! with a `.zgroup` descriptor at the root and an `_ARRAY_DIMENSIONS` attribute naming each
//! array's dimensions. Chunks whose region is uniformly equal to the fill value are elided,
//! so defaulted regions of the source cost nothing in the archive.
//!
//! The whole hierarchy is staged in a [`MemoryStore`] and only packed once every chunk has
//! been written, so a failed conversion never leaves partial output at the destination.

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;

use crate::archive::{self, ArchiveError};
use crate::array::{ChunkGrid, ChunkKeyEncoding, ChunkShape, DataType, FillValue};
use crate::codec::{CodecError, Compressor};
use crate::dataset::{Dataset, DatasetError, VariableInfo};
use crate::metadata::{
    attributes_to_bytes, ArrayMetadata, Attributes, FillValueMetadata, GroupMetadata,
    MetadataError,
};
use crate::node::{NodePath, NodePathError};
use crate::storage::{
    data_key, meta_key_array, meta_key_attributes, meta_key_group, Bytes, MemoryStore,
    StorageError, WritableStorageTraits,
};

/// The reserved attribute naming the dimensions of an array, outermost first.
pub const ARRAY_DIMENSIONS_ATTRIBUTE: &str = "_ARRAY_DIMENSIONS";

/// A conversion error.
///
/// Any failure below the conversion, in the dataset, the codec, the staging store, or the
/// packager, aborts the whole conversion with no output written.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The variable selection matched no variable of the dataset.
    #[error("no variable of the dataset matches the selection")]
    NoMatchingVariable,
    /// The variable selection matched several equally ranked candidates.
    #[error("ambiguous variable selection, candidates: {}", _0.join(", "))]
    AmbiguousVariable(Vec<String>),
    /// An error reading the source dataset.
    #[error(transparent)]
    DatasetError(#[from] DatasetError),
    /// An invalid descriptor produced during conversion.
    #[error(transparent)]
    MetadataError(#[from] MetadataError),
    /// A chunk failed to encode.
    #[error(transparent)]
    CodecError(#[from] CodecError),
    /// An error writing the staging store.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// An invalid hierarchy path derived from a variable name.
    #[error(transparent)]
    NodePathError(#[from] NodePathError),
    /// An error packaging the archive.
    #[error(transparent)]
    ArchiveError(#[from] ArchiveError),
}

/// The policy selecting which variables of a dataset to convert.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum VariableSelector {
    /// Convert every variable of the dataset.
    #[default]
    All,
    /// Convert the variable with this exact name.
    Name(String),
    /// Convert the variable with this name if defined, otherwise fall back to the single
    /// variable of the given rank.
    ///
    /// The fallback is deterministic: if several variables of that rank exist, selection
    /// fails with [`ConvertError::AmbiguousVariable`] rather than picking one arbitrarily.
    NameOrRank {
        /// The preferred variable name.
        name: String,
        /// The rank used for the fallback search.
        rank: usize,
    },
}

/// The options of a conversion.
#[derive(Debug, Default)]
pub struct ConvertOptions {
    /// The requested chunk extent per dimension name.
    ///
    /// A dimension absent from the map is not split: its chunk extent is its full extent.
    /// Names that match no dimension of a variable are ignored for that variable. Extents
    /// larger than the dimension are clamped to it.
    pub chunk_map: BTreeMap<String, u64>,
    /// Which variables to convert.
    pub selector: VariableSelector,
    /// The compressor applied to every chunk.
    pub compressor: Compressor,
    /// The fill value written to array descriptors and used for sparse chunk elision.
    ///
    /// [`None`] selects a per data type default: `NaN` for floats, `0` otherwise.
    pub fill_value: Option<FillValueMetadata>,
    /// Attributes attached to the hierarchy root, merged over the dataset attributes.
    pub attributes: Attributes,
}

impl ConvertOptions {
    /// Create options converting every variable unsplit and uncompressed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a chunk extent for the dimension named `dimension`.
    #[must_use]
    pub fn with_chunk(mut self, dimension: impl Into<String>, extent: u64) -> Self {
        self.chunk_map.insert(dimension.into(), extent);
        self
    }

    /// Set the variable selection policy.
    #[must_use]
    pub fn with_selector(mut self, selector: VariableSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Set the chunk compressor.
    #[must_use]
    pub fn with_compressor(mut self, compressor: Compressor) -> Self {
        self.compressor = compressor;
        self
    }

    /// Set the fill value.
    #[must_use]
    pub fn with_fill_value(mut self, fill_value: FillValueMetadata) -> Self {
        self.fill_value = Some(fill_value);
        self
    }

    fn fill_value_for(&self, data_type: DataType) -> FillValueMetadata {
        self.fill_value.clone().unwrap_or_else(|| {
            if data_type.is_float() {
                FillValueMetadata::NaN
            } else {
                FillValueMetadata::default()
            }
        })
    }
}

/// Select the variables of `dataset` to convert according to `selector`.
///
/// Variables are returned in the dataset's definition order.
///
/// # Errors
/// Returns [`ConvertError::NoMatchingVariable`] if nothing matches, or
/// [`ConvertError::AmbiguousVariable`] if a rank fallback has several candidates.
pub fn select_variables<TDataset: Dataset + ?Sized>(
    dataset: &TDataset,
    selector: &VariableSelector,
) -> Result<Vec<String>, ConvertError> {
    let variables = dataset.variables();
    match selector {
        VariableSelector::All => {
            if variables.is_empty() {
                Err(ConvertError::NoMatchingVariable)
            } else {
                Ok(variables)
            }
        }
        VariableSelector::Name(name) => {
            if variables.iter().any(|variable| variable == name) {
                Ok(vec![name.clone()])
            } else {
                Err(ConvertError::NoMatchingVariable)
            }
        }
        VariableSelector::NameOrRank { name, rank } => {
            if variables.iter().any(|variable| variable == name) {
                return Ok(vec![name.clone()]);
            }
            let candidates: Vec<String> = variables
                .into_iter()
                .filter(|variable| {
                    dataset
                        .variable(variable)
                        .is_some_and(|info| info.rank() == *rank)
                })
                .collect();
            match candidates.len() {
                0 => Err(ConvertError::NoMatchingVariable),
                1 => Ok(candidates),
                _ => Err(ConvertError::AmbiguousVariable(candidates)),
            }
        }
    }
}

/// Convert `dataset` into a staged hierarchy in a new [`MemoryStore`].
///
/// # Errors
/// Returns a [`ConvertError`] on any failure; the returned store is only produced whole.
pub fn convert_to_store<TDataset: Dataset + ?Sized>(
    dataset: &TDataset,
    options: &ConvertOptions,
) -> Result<MemoryStore, ConvertError> {
    let store = MemoryStore::new();
    let root = NodePath::root();

    store.set(
        &meta_key_group(&root),
        GroupMetadata::default().to_bytes()?.into(),
    )?;
    let mut root_attributes = dataset.attributes();
    root_attributes.extend(options.attributes.clone());
    if !root_attributes.is_empty() {
        store.set(
            &meta_key_attributes(&root),
            attributes_to_bytes(&root_attributes)?.into(),
        )?;
    }

    for name in select_variables(dataset, &options.selector)? {
        let info = dataset
            .variable(&name)
            .ok_or_else(|| DatasetError::VariableNotFound(name.clone()))?;
        convert_variable(dataset, &store, &name, &info, options)?;
    }
    Ok(store)
}

/// Convert `dataset` into a zip archive at `path`.
///
/// The archive is written through [`archive::pack`]: it only appears at `path` once fully
/// produced, and a failed conversion leaves any pre-existing file at `path` untouched.
///
/// # Errors
/// Returns a [`ConvertError`] on any failure.
pub fn convert<TDataset: Dataset + ?Sized>(
    dataset: &TDataset,
    options: &ConvertOptions,
    path: impl AsRef<Path>,
) -> Result<(), ConvertError> {
    let store = convert_to_store(dataset, options)?;
    archive::pack(&store, path)?;
    Ok(())
}

/// Convert `dataset` into an in-memory zip archive.
///
/// # Errors
/// Returns a [`ConvertError`] on any failure.
pub fn convert_to_bytes<TDataset: Dataset + ?Sized>(
    dataset: &TDataset,
    options: &ConvertOptions,
) -> Result<Bytes, ConvertError> {
    let store = convert_to_store(dataset, options)?;
    Ok(archive::pack_to_bytes(&store)?)
}

fn convert_variable<TDataset: Dataset + ?Sized>(
    dataset: &TDataset,
    store: &MemoryStore,
    name: &str,
    info: &VariableInfo,
    options: &ConvertOptions,
) -> Result<(), ConvertError> {
    let path = NodePath::new(&format!("/{name}"))?;
    let chunk_shape = chunk_shape_for(info, &options.chunk_map);
    let grid = ChunkGrid::new(info.shape.clone(), chunk_shape.clone())?;

    let fill_value_metadata = options.fill_value_for(info.data_type);
    let fill_value =
        FillValue::from_metadata(&fill_value_metadata, info.data_type, info.endianness)?;

    let metadata = ArrayMetadata::new(
        info.shape.clone(),
        chunk_shape.clone(),
        info.data_type.to_typestr(info.endianness),
        fill_value_metadata,
        options.compressor.to_metadata()?,
    );
    store.set(&meta_key_array(&path), metadata.to_bytes()?.into())?;

    let mut attributes = info.attributes.clone();
    attributes.insert(
        ARRAY_DIMENSIONS_ATTRIBUTE.to_string(),
        serde_json::Value::from(info.dimensions.clone()),
    );
    store.set(
        &meta_key_attributes(&path),
        attributes_to_bytes(&attributes)?.into(),
    )?;

    let key_encoding = ChunkKeyEncoding::default();
    let element_size = info.data_type.size();
    for chunk_indices in grid.chunks() {
        // chunk_origin and chunk_extents are Some for every index the grid yields.
        let Some(origin) = grid.chunk_origin(&chunk_indices) else {
            continue;
        };
        let Some(extents) = grid.chunk_extents(&chunk_indices) else {
            continue;
        };
        let block = dataset.read_block(name, &origin, &extents)?;
        if let Some(fill_value) = &fill_value {
            if fill_value.equals_all(&block) {
                // Sparse elision: readers fall back to the fill value for absent chunks.
                continue;
            }
        }
        let chunk = pad_block(block, &extents, &chunk_shape, element_size, fill_value.as_ref());
        let encoded = options.compressor.encode(chunk)?;
        store.set(
            &data_key(&path, &key_encoding.encode(&chunk_indices)),
            encoded.into(),
        )?;
    }
    Ok(())
}

/// Build the chunk shape of a variable from the requested per-dimension extents.
///
/// Every dimension of the variable gets an entry: unrequested dimensions keep their full
/// extent, requested extents are clamped to the dimension, and zero sized dimensions get a
/// chunk extent of one.
fn chunk_shape_for(info: &VariableInfo, chunk_map: &BTreeMap<String, u64>) -> ChunkShape {
    info.dimensions
        .iter()
        .zip(&info.shape)
        .map(|(dimension, &extent)| {
            let requested = chunk_map.get(dimension).copied().unwrap_or(extent);
            if extent == 0 {
                1
            } else {
                requested.clamp(1, extent)
            }
        })
        .collect()
}

/// Embed a clipped edge block into a full shape chunk, padding with the fill value.
#[allow(clippy::cast_possible_truncation)]
fn pad_block(
    block: Vec<u8>,
    extents: &[u64],
    chunk_shape: &[u64],
    element_size: usize,
    fill_value: Option<&FillValue>,
) -> Vec<u8> {
    if extents == chunk_shape {
        return block;
    }
    let chunk_elements: u64 = chunk_shape.iter().product();
    let chunk_len = chunk_elements as usize * element_size;
    let mut chunk = match fill_value {
        Some(fill_value) => fill_value
            .as_bytes()
            .iter()
            .copied()
            .cycle()
            .take(chunk_len)
            .collect(),
        None => vec![0u8; chunk_len],
    };

    let rank = chunk_shape.len();
    if rank == 0 || extents.iter().any(|&extent| extent == 0) {
        return chunk;
    }

    // Row-major element strides of the full chunk.
    let mut strides = vec![1u64; rank];
    for axis in (0..rank - 1).rev() {
        strides[axis] = strides[axis + 1] * chunk_shape[axis + 1];
    }

    let run = extents[rank - 1] as usize * element_size;
    let mut index = vec![0u64; rank - 1];
    let mut src = 0usize;
    loop {
        let offset: u64 = index
            .iter()
            .zip(&strides)
            .map(|(&index, &stride)| index * stride)
            .sum();
        let dst = offset as usize * element_size;
        chunk[dst..dst + run].copy_from_slice(&block[src..src + run]);
        src += run;

        let mut axis = rank - 1;
        loop {
            if axis == 0 {
                return chunk;
            }
            axis -= 1;
            index[axis] += 1;
            if index[axis] < extents[axis] {
                break;
            }
            index[axis] = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::Endianness;
    use crate::dataset::InMemoryDataset;

    fn dataset_with_ranks() -> InMemoryDataset {
        let mut dataset = InMemoryDataset::new();
        dataset.add_dimension("t", 2).add_dimension("x", 3);
        dataset
            .add_variable("t", ["t"], DataType::UInt8, Endianness::native(), vec![0; 2])
            .unwrap();
        dataset
            .add_variable(
                "a",
                ["t", "x"],
                DataType::UInt8,
                Endianness::native(),
                vec![1; 6],
            )
            .unwrap();
        dataset
            .add_variable(
                "b",
                ["t", "x"],
                DataType::UInt8,
                Endianness::native(),
                vec![2; 6],
            )
            .unwrap();
        dataset
    }

    #[test]
    fn select_by_name() {
        let dataset = dataset_with_ranks();
        assert_eq!(
            select_variables(&dataset, &VariableSelector::Name("a".to_string())).unwrap(),
            vec!["a".to_string()]
        );
        assert!(matches!(
            select_variables(&dataset, &VariableSelector::Name("z".to_string())),
            Err(ConvertError::NoMatchingVariable)
        ));
    }

    #[test]
    fn select_by_rank_fallback() {
        let dataset = dataset_with_ranks();
        // The preferred name wins when present.
        let selector = VariableSelector::NameOrRank {
            name: "b".to_string(),
            rank: 2,
        };
        assert_eq!(
            select_variables(&dataset, &selector).unwrap(),
            vec!["b".to_string()]
        );
        // A unique candidate of the rank is selected.
        let selector = VariableSelector::NameOrRank {
            name: "missing".to_string(),
            rank: 1,
        };
        assert_eq!(
            select_variables(&dataset, &selector).unwrap(),
            vec!["t".to_string()]
        );
        // Two candidates of equal rank are ambiguous.
        let selector = VariableSelector::NameOrRank {
            name: "missing".to_string(),
            rank: 2,
        };
        assert!(matches!(
            select_variables(&dataset, &selector),
            Err(ConvertError::AmbiguousVariable(candidates)) if candidates == ["a", "b"]
        ));
    }

    #[test]
    fn chunk_shape_defaults_and_clamping() {
        let dataset = dataset_with_ranks();
        let info = dataset.variable("a").unwrap();
        // Unrequested dimensions keep their full extent.
        let mut chunk_map = BTreeMap::new();
        chunk_map.insert("t".to_string(), 1);
        assert_eq!(chunk_shape_for(&info, &chunk_map), vec![1, 3]);
        // Oversized requests are clamped, unknown names ignored.
        chunk_map.insert("x".to_string(), 100);
        chunk_map.insert("unknown".to_string(), 7);
        assert_eq!(chunk_shape_for(&info, &chunk_map), vec![1, 3]);
    }

    #[test]
    fn pad_block_edge_chunk() {
        // A 2x2 block embedded in a 2x3 chunk of u8, fill 9.
        let fill_value = FillValue::new(vec![9]);
        let chunk = pad_block(vec![1, 2, 3, 4], &[2, 2], &[2, 3], 1, Some(&fill_value));
        assert_eq!(chunk, vec![1, 2, 9, 3, 4, 9]);
    }

    #[test]
    fn pad_block_full_chunk_is_identity() {
        let block = vec![1u8, 2, 3, 4];
        assert_eq!(pad_block(block.clone(), &[2, 2], &[2, 2], 1, None), block);
    }
}
