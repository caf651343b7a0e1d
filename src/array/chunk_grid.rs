//! The regular chunk grid of an array.

use crate::metadata::MetadataError;

use super::{ArrayShape, ChunkIndices, ChunkShape};

/// A regular chunk grid: the partition of an array shape into equally sized chunks.
///
/// Every chunk has the same shape. Chunks on the upper boundary of the array may extend
/// beyond it, in which case the portion inside the array is given by
/// [`chunk_extents`](ChunkGrid::chunk_extents).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChunkGrid {
    array_shape: ArrayShape,
    chunk_shape: ChunkShape,
}

impl ChunkGrid {
    /// Create a chunk grid from an array shape and a chunk shape.
    ///
    /// # Errors
    /// Returns [`MetadataError::SchemaViolation`] if the shapes differ in rank or a chunk
    /// extent is zero or exceeds a nonzero array extent.
    pub fn new(array_shape: ArrayShape, chunk_shape: ChunkShape) -> Result<Self, MetadataError> {
        let violation = |reason: String| MetadataError::SchemaViolation {
            field: "chunks",
            reason,
        };
        if array_shape.len() != chunk_shape.len() {
            return Err(violation(format!(
                "chunk shape rank {} does not match array shape rank {}",
                chunk_shape.len(),
                array_shape.len()
            )));
        }
        for (&chunk, &extent) in chunk_shape.iter().zip(&array_shape) {
            if chunk == 0 {
                return Err(violation("chunk extents must be positive".to_string()));
            }
            if extent > 0 && chunk > extent {
                return Err(violation(format!(
                    "chunk extent {chunk} exceeds array extent {extent}"
                )));
            }
        }
        Ok(Self {
            array_shape,
            chunk_shape,
        })
    }

    /// The shape of the array.
    #[must_use]
    pub fn array_shape(&self) -> &ArrayShape {
        &self.array_shape
    }

    /// The shape of every chunk.
    #[must_use]
    pub fn chunk_shape(&self) -> &ChunkShape {
        &self.chunk_shape
    }

    /// The dimensionality of the grid.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.array_shape.len()
    }

    /// The number of chunks per dimension, the ceiling of the array extent divided by the
    /// chunk extent.
    #[must_use]
    pub fn grid_shape(&self) -> Vec<u64> {
        self.array_shape
            .iter()
            .zip(&self.chunk_shape)
            .map(|(&extent, &chunk)| extent.div_ceil(chunk))
            .collect()
    }

    /// The total number of chunks in the grid.
    #[must_use]
    pub fn num_chunks(&self) -> u64 {
        self.grid_shape().iter().product()
    }

    /// The number of elements in a full chunk.
    #[must_use]
    pub fn chunk_elements(&self) -> u64 {
        self.chunk_shape.iter().product()
    }

    /// The origin of the chunk at `chunk_indices` in array coordinates.
    ///
    /// Returns [`None`] if the indices have the wrong rank or are outside the grid.
    #[must_use]
    pub fn chunk_origin(&self, chunk_indices: &[u64]) -> Option<Vec<u64>> {
        if chunk_indices.len() != self.dimensionality()
            || chunk_indices
                .iter()
                .zip(self.grid_shape())
                .any(|(&index, extent)| index >= extent)
        {
            return None;
        }
        Some(
            chunk_indices
                .iter()
                .zip(&self.chunk_shape)
                .map(|(&index, &chunk)| index * chunk)
                .collect(),
        )
    }

    /// The extents of the chunk at `chunk_indices` clipped to the array bounds.
    ///
    /// Interior chunks return the full chunk shape; chunks on the upper boundary return the
    /// smaller region inside the array. Returns [`None`] if the indices have the wrong rank
    /// or are outside the grid.
    #[must_use]
    pub fn chunk_extents(&self, chunk_indices: &[u64]) -> Option<Vec<u64>> {
        let origin = self.chunk_origin(chunk_indices)?;
        Some(
            origin
                .iter()
                .zip(&self.chunk_shape)
                .zip(&self.array_shape)
                .map(|((&origin, &chunk), &extent)| chunk.min(extent - origin))
                .collect(),
        )
    }

    /// Iterate the indices of every chunk in the grid in row-major order.
    #[must_use]
    pub fn chunks(&self) -> ChunkIndicesIterator {
        let grid_shape = self.grid_shape();
        let next = if grid_shape.iter().any(|&extent| extent == 0) {
            None
        } else {
            Some(vec![0; grid_shape.len()])
        };
        ChunkIndicesIterator { grid_shape, next }
    }
}

/// An iterator over the chunk indices of a [`ChunkGrid`] in row-major order.
///
/// The last dimension varies fastest.
pub struct ChunkIndicesIterator {
    grid_shape: Vec<u64>,
    next: Option<ChunkIndices>,
}

impl Iterator for ChunkIndicesIterator {
    type Item = ChunkIndices;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        let mut next = current.clone();
        for axis in (0..next.len()).rev() {
            next[axis] += 1;
            if next[axis] < self.grid_shape[axis] {
                self.next = Some(next);
                break;
            }
            next[axis] = 0;
        }
        Some(current)
    }
}
