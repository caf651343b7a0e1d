//! Source datasets for conversion.
//!
//! A [`Dataset`] is the source side of a conversion: named dimensions with integer extents,
//! a listing of variables, and a block read operation returning raw element bytes in
//! row-major layout. [`InMemoryDataset`] is a complete implementation over owned buffers,
//! used as a conversion source for synthetic data and in tests.

use thiserror::Error;

use crate::array::{ArrayShape, DataType, Endianness};
use crate::metadata::Attributes;

/// A dataset error.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The named dimension is not defined.
    #[error("dimension {0} is not defined")]
    DimensionNotFound(String),
    /// The named variable is not defined.
    #[error("variable {0} is not defined")]
    VariableNotFound(String),
    /// A block read outside the bounds of a variable.
    #[error("block origin {origin:?} shape {shape:?} out of bounds for variable {variable}")]
    BlockOutOfBounds {
        /// The variable read from.
        variable: String,
        /// The block origin.
        origin: Vec<u64>,
        /// The block shape.
        shape: Vec<u64>,
    },
    /// A variable definition whose buffer does not match its shape and data type.
    #[error("variable {variable} has {actual} bytes, expected {expected}")]
    BufferSizeMismatch {
        /// The variable defined.
        variable: String,
        /// The expected buffer size in bytes.
        expected: u64,
        /// The actual buffer size in bytes.
        actual: u64,
    },
}

/// A named dimension with an integer extent.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Dimension {
    /// The dimension name.
    pub name: String,
    /// The number of elements along the dimension.
    pub size: u64,
}

/// The description of one variable of a dataset.
#[derive(Clone, Debug, PartialEq)]
pub struct VariableInfo {
    /// The element data type.
    pub data_type: DataType,
    /// The byte order of the element bytes returned by block reads.
    pub endianness: Endianness,
    /// The dimension names of the variable, one per axis, outermost first.
    pub dimensions: Vec<String>,
    /// The shape of the variable, the extents of its dimensions.
    pub shape: ArrayShape,
    /// The attributes of the variable.
    pub attributes: Attributes,
}

impl VariableInfo {
    /// The rank (number of dimensions) of the variable.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.dimensions.len()
    }
}

/// A source dataset.
pub trait Dataset {
    /// The dimensions of the dataset in definition order.
    fn dimensions(&self) -> Vec<Dimension>;

    /// The dataset-level attributes. Defaults to an empty map.
    fn attributes(&self) -> Attributes {
        Attributes::default()
    }

    /// The variable names of the dataset in definition order.
    fn variables(&self) -> Vec<String>;

    /// The description of the variable named `name`, or [`None`] if it is not defined.
    fn variable(&self, name: &str) -> Option<VariableInfo>;

    /// Read a rectangular block of the variable named `variable`.
    ///
    /// Returns element bytes in row-major layout, the last dimension varying fastest. The
    /// block is `shape` elements starting at `origin` in variable coordinates; both must
    /// have one entry per variable dimension.
    ///
    /// # Errors
    /// Returns [`DatasetError::VariableNotFound`] if the variable is not defined, or
    /// [`DatasetError::BlockOutOfBounds`] if the block extends outside the variable.
    fn read_block(
        &self,
        variable: &str,
        origin: &[u64],
        shape: &[u64],
    ) -> Result<Vec<u8>, DatasetError>;
}

struct InMemoryVariable {
    name: String,
    data_type: DataType,
    endianness: Endianness,
    dimensions: Vec<String>,
    attributes: Attributes,
    bytes: Vec<u8>,
}

/// A dataset held entirely in memory.
#[derive(Default)]
pub struct InMemoryDataset {
    dimensions: Vec<Dimension>,
    variables: Vec<InMemoryVariable>,
    attributes: Attributes,
}

impl InMemoryDataset {
    /// Create an empty dataset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a dimension. A repeated name replaces the previous extent.
    pub fn add_dimension(&mut self, name: impl Into<String>, size: u64) -> &mut Self {
        let name = name.into();
        if let Some(dimension) = self
            .dimensions
            .iter_mut()
            .find(|dimension| dimension.name == name)
        {
            dimension.size = size;
        } else {
            self.dimensions.push(Dimension { name, size });
        }
        self
    }

    /// Define a variable over previously defined dimensions.
    ///
    /// `bytes` holds the variable elements in row-major layout with the byte order
    /// `endianness`.
    ///
    /// # Errors
    /// Returns [`DatasetError::DimensionNotFound`] if a dimension name is undefined, or
    /// [`DatasetError::BufferSizeMismatch`] if `bytes` does not hold exactly one element per
    /// position of the variable.
    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        dimensions: impl IntoIterator<Item = impl Into<String>>,
        data_type: DataType,
        endianness: Endianness,
        bytes: Vec<u8>,
    ) -> Result<&mut Self, DatasetError> {
        let name = name.into();
        let dimensions: Vec<String> = dimensions.into_iter().map(Into::into).collect();
        let mut num_elements = 1u64;
        for dimension in &dimensions {
            let size = self
                .dimension_size(dimension)
                .ok_or_else(|| DatasetError::DimensionNotFound(dimension.clone()))?;
            num_elements = num_elements.saturating_mul(size);
        }
        let expected = num_elements.saturating_mul(data_type.size() as u64);
        if bytes.len() as u64 != expected {
            return Err(DatasetError::BufferSizeMismatch {
                variable: name,
                expected,
                actual: bytes.len() as u64,
            });
        }
        self.variables.retain(|variable| variable.name != name);
        self.variables.push(InMemoryVariable {
            name,
            data_type,
            endianness,
            dimensions,
            attributes: Attributes::default(),
            bytes,
        });
        Ok(self)
    }

    /// Set the attributes of the variable named `name`.
    ///
    /// # Errors
    /// Returns [`DatasetError::VariableNotFound`] if the variable is not defined.
    pub fn set_variable_attributes(
        &mut self,
        name: &str,
        attributes: Attributes,
    ) -> Result<&mut Self, DatasetError> {
        let variable = self
            .variables
            .iter_mut()
            .find(|variable| variable.name == name)
            .ok_or_else(|| DatasetError::VariableNotFound(name.to_string()))?;
        variable.attributes = attributes;
        Ok(self)
    }

    /// Mutable access to the dataset-level attributes.
    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    fn dimension_size(&self, name: &str) -> Option<u64> {
        self.dimensions
            .iter()
            .find(|dimension| dimension.name == name)
            .map(|dimension| dimension.size)
    }

    fn find(&self, name: &str) -> Option<&InMemoryVariable> {
        self.variables.iter().find(|variable| variable.name == name)
    }

    fn variable_shape(&self, variable: &InMemoryVariable) -> ArrayShape {
        variable
            .dimensions
            .iter()
            .map(|dimension| self.dimension_size(dimension).unwrap_or(0))
            .collect()
    }
}

impl Dataset for InMemoryDataset {
    fn dimensions(&self) -> Vec<Dimension> {
        self.dimensions.clone()
    }

    fn attributes(&self) -> Attributes {
        self.attributes.clone()
    }

    fn variables(&self) -> Vec<String> {
        self.variables
            .iter()
            .map(|variable| variable.name.clone())
            .collect()
    }

    fn variable(&self, name: &str) -> Option<VariableInfo> {
        let variable = self.find(name)?;
        Some(VariableInfo {
            data_type: variable.data_type,
            endianness: variable.endianness,
            dimensions: variable.dimensions.clone(),
            shape: self.variable_shape(variable),
            attributes: variable.attributes.clone(),
        })
    }

    #[allow(clippy::cast_possible_truncation)]
    fn read_block(
        &self,
        variable: &str,
        origin: &[u64],
        shape: &[u64],
    ) -> Result<Vec<u8>, DatasetError> {
        let var = self
            .find(variable)
            .ok_or_else(|| DatasetError::VariableNotFound(variable.to_string()))?;
        let var_shape = self.variable_shape(var);
        let rank = var_shape.len();
        let out_of_bounds = || DatasetError::BlockOutOfBounds {
            variable: variable.to_string(),
            origin: origin.to_vec(),
            shape: shape.to_vec(),
        };
        if origin.len() != rank || shape.len() != rank {
            return Err(out_of_bounds());
        }
        for axis in 0..rank {
            let end = origin[axis].checked_add(shape[axis]).ok_or_else(out_of_bounds)?;
            if end > var_shape[axis] {
                return Err(out_of_bounds());
            }
        }

        let element_size = var.data_type.size() as u64;
        if rank == 0 {
            return Ok(var.bytes.clone());
        }
        if shape.iter().any(|&extent| extent == 0) {
            return Ok(Vec::new());
        }

        // Row-major element strides of the variable.
        let mut strides = vec![1u64; rank];
        for axis in (0..rank - 1).rev() {
            strides[axis] = strides[axis + 1] * var_shape[axis + 1];
        }

        // Copy the block one contiguous innermost run at a time. All offsets computed here
        // lie inside var.bytes, whose length already fits in usize.
        let run = (shape[rank - 1] * element_size) as usize;
        let num_elements: u64 = shape.iter().product();
        let mut block = Vec::with_capacity((num_elements * element_size) as usize);
        let mut index = origin[..rank - 1].to_vec();
        loop {
            let offset: u64 = index
                .iter()
                .zip(&strides)
                .map(|(&index, &stride)| index * stride)
                .sum::<u64>()
                + origin[rank - 1];
            let start = (offset * element_size) as usize;
            block.extend_from_slice(&var.bytes[start..start + run]);

            // Advance the outer indices, innermost of them fastest.
            let mut axis = rank - 1;
            loop {
                if axis == 0 {
                    return Ok(block);
                }
                axis -= 1;
                index[axis] += 1;
                if index[axis] < origin[axis] + shape[axis] {
                    break;
                }
                index[axis] = origin[axis];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_dataset() -> InMemoryDataset {
        // A 2x3 int16 variable holding [[0, 1, 2], [3, 4, 5]].
        let bytes: Vec<u8> = (0i16..6)
            .flat_map(|value| value.to_le_bytes())
            .collect();
        let mut dataset = InMemoryDataset::new();
        dataset.add_dimension("y", 2).add_dimension("x", 3);
        dataset
            .add_variable("values", ["y", "x"], DataType::Int16, Endianness::Little, bytes)
            .unwrap();
        dataset
    }

    #[test]
    fn variable_info() {
        let dataset = example_dataset();
        assert_eq!(dataset.variables(), vec!["values".to_string()]);
        let info = dataset.variable("values").unwrap();
        assert_eq!(info.shape, vec![2, 3]);
        assert_eq!(info.rank(), 2);
        assert_eq!(info.data_type, DataType::Int16);
        assert!(dataset.variable("missing").is_none());
    }

    #[test]
    fn read_block_interior() {
        let dataset = example_dataset();
        // The 2x2 block at origin (0, 1): [[1, 2], [4, 5]].
        let block = dataset.read_block("values", &[0, 1], &[2, 2]).unwrap();
        let expected: Vec<u8> = [1i16, 2, 4, 5]
            .iter()
            .flat_map(|value| value.to_le_bytes())
            .collect();
        assert_eq!(block, expected);
    }

    #[test]
    fn read_block_whole() {
        let dataset = example_dataset();
        let block = dataset.read_block("values", &[0, 0], &[2, 3]).unwrap();
        assert_eq!(block.len(), 12);
    }

    #[test]
    fn read_block_out_of_bounds() {
        let dataset = example_dataset();
        assert!(matches!(
            dataset.read_block("values", &[0, 2], &[1, 2]),
            Err(DatasetError::BlockOutOfBounds { .. })
        ));
        assert!(matches!(
            dataset.read_block("values", &[0], &[1]),
            Err(DatasetError::BlockOutOfBounds { .. })
        ));
        assert!(matches!(
            dataset.read_block("missing", &[0, 0], &[1, 1]),
            Err(DatasetError::VariableNotFound(_))
        ));
    }

    #[test]
    fn add_variable_validation() {
        let mut dataset = InMemoryDataset::new();
        dataset.add_dimension("x", 3);
        assert!(matches!(
            dataset.add_variable(
                "bad_dim",
                ["t"],
                DataType::UInt8,
                Endianness::native(),
                vec![0; 3]
            ),
            Err(DatasetError::DimensionNotFound(_))
        ));
        assert!(matches!(
            dataset.add_variable(
                "bad_len",
                ["x"],
                DataType::UInt16,
                Endianness::native(),
                vec![0; 3]
            ),
            Err(DatasetError::BufferSizeMismatch { .. })
        ));
    }
}
