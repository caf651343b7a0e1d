//! The byte representation of array fill values.

use crate::metadata::{FillValueMetadata, MetadataError};

use super::{DataType, Endianness};

/// The fill value of an array, as the encoded bytes of a single element.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FillValue(Vec<u8>);

impl FillValue {
    /// Create a fill value from its element bytes.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The element bytes of the fill value.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The size of the fill value in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.0.len()
    }

    /// Interpret a fill value descriptor as the bytes of a `data_type` element with
    /// `endianness`.
    ///
    /// Returns [`None`] for a null fill value descriptor.
    ///
    /// # Errors
    /// Returns [`MetadataError::SchemaViolation`] if the fill value is incompatible with the
    /// data type, such as a non-finite fill for an integer or an out of range integer.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_metadata(
        metadata: &FillValueMetadata,
        data_type: DataType,
        endianness: Endianness,
    ) -> Result<Option<Self>, MetadataError> {
        let invalid = |reason: String| MetadataError::SchemaViolation {
            field: "fill_value",
            reason,
        };
        let number = match metadata {
            FillValueMetadata::Null => return Ok(None),
            FillValueMetadata::NaN | FillValueMetadata::Infinity | FillValueMetadata::NegInfinity => {
                let float = match metadata {
                    FillValueMetadata::NaN => f64::NAN,
                    FillValueMetadata::Infinity => f64::INFINITY,
                    _ => f64::NEG_INFINITY,
                };
                return match data_type {
                    DataType::Float32 => Ok(Some(Self::from_float32(float as f32, endianness))),
                    DataType::Float64 => Ok(Some(Self::from_float64(float, endianness))),
                    _ => Err(invalid(format!(
                        "non-finite fill value for data type {data_type}"
                    ))),
                };
            }
            FillValueMetadata::Number(number) => number,
        };

        let out_of_range =
            || invalid(format!("fill value {number} out of range for {data_type}"));
        let as_signed = |bits: u32| -> Result<i64, MetadataError> {
            let int = number.as_i64().ok_or_else(out_of_range)?;
            if bits == 64 {
                return Ok(int);
            }
            let min = -(1i64 << (bits - 1));
            let max = (1i64 << (bits - 1)) - 1;
            if (min..=max).contains(&int) {
                Ok(int)
            } else {
                Err(out_of_range())
            }
        };
        let as_unsigned = |bits: u32| -> Result<u64, MetadataError> {
            let int = number.as_u64().ok_or_else(out_of_range)?;
            if bits == 64 || int < (1u64 << bits) {
                Ok(int)
            } else {
                Err(out_of_range())
            }
        };

        let bytes = match data_type {
            DataType::Int8 => Self::encode((as_signed(8)? as i8).to_le_bytes(), endianness),
            DataType::Int16 => Self::encode((as_signed(16)? as i16).to_le_bytes(), endianness),
            DataType::Int32 => Self::encode((as_signed(32)? as i32).to_le_bytes(), endianness),
            DataType::Int64 => Self::encode(as_signed(64)?.to_le_bytes(), endianness),
            DataType::UInt8 => Self::encode((as_unsigned(8)? as u8).to_le_bytes(), endianness),
            DataType::UInt16 => Self::encode((as_unsigned(16)? as u16).to_le_bytes(), endianness),
            DataType::UInt32 => Self::encode((as_unsigned(32)? as u32).to_le_bytes(), endianness),
            DataType::UInt64 => Self::encode(as_unsigned(64)?.to_le_bytes(), endianness),
            DataType::Float32 => {
                let float = number.as_f64().ok_or_else(out_of_range)?;
                return Ok(Some(Self::from_float32(float as f32, endianness)));
            }
            DataType::Float64 => {
                let float = number.as_f64().ok_or_else(out_of_range)?;
                return Ok(Some(Self::from_float64(float, endianness)));
            }
        };
        Ok(Some(bytes))
    }

    fn from_float32(value: f32, endianness: Endianness) -> Self {
        Self::encode(value.to_le_bytes(), endianness)
    }

    fn from_float64(value: f64, endianness: Endianness) -> Self {
        Self::encode(value.to_le_bytes(), endianness)
    }

    fn encode<const N: usize>(le_bytes: [u8; N], endianness: Endianness) -> Self {
        let mut bytes = le_bytes;
        if matches!(endianness, Endianness::Big) {
            bytes.reverse();
        }
        Self(bytes.to_vec())
    }

    /// Indicates if the element bytes in `bytes` are all equal to the fill value.
    ///
    /// Returns `false` if `bytes` is not a whole multiple of the fill value size. Note that
    /// the comparison is bytewise, so a NaN fill value only matches the identical NaN bit
    /// pattern.
    #[must_use]
    pub fn equals_all(&self, bytes: &[u8]) -> bool {
        if self.0.is_empty() || bytes.len() % self.0.len() != 0 {
            return false;
        }
        bytes
            .chunks_exact(self.0.len())
            .all(|element| element == self.0.as_slice())
    }
}
