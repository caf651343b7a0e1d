//! N-dimensional array building blocks.
//!
//! This module holds the pieces an array descriptor is interpreted through: the supported
//! element [`DataType`]s and their typestr encoding, the [`FillValue`] byte representation,
//! the regular [`ChunkGrid`] that partitions an array shape, and the [`ChunkKeyEncoding`]
//! that maps chunk grid indices to store keys.

mod chunk_grid;
mod chunk_key_encoding;
mod data_type;
mod fill_value;

pub use chunk_grid::ChunkGrid;
pub use chunk_key_encoding::ChunkKeyEncoding;
pub use data_type::{DataType, Endianness};
pub use fill_value::FillValue;

/// The shape of an array.
pub type ArrayShape = Vec<u64>;

/// The shape of a chunk. All extents are positive.
pub type ChunkShape = Vec<u64>;

/// The indices of a chunk in the chunk grid of an array.
pub type ChunkIndices = Vec<u64>;
