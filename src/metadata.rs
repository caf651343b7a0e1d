//! Group, array, and attribute descriptors.
//!
//! Descriptors are small JSON documents stored beside chunk data:
//! - [`GroupMetadata`] (`.zgroup`) marks a hierarchy path as a group,
//! - [`ArrayMetadata`] (`.zarray`) describes one N-dimensional array, and
//! - [`Attributes`] (`.zattrs`) is an arbitrary user attribute map.
//!
//! Encoding is canonical: equal descriptors always encode to byte-identical JSON (stable key
//! order, four space indentation), which keeps packaged archives reproducible. Decoding
//! ignores unknown fields for forward compatibility and validates the semantic invariants of
//! the format; violations surface as [`MetadataError::SchemaViolation`] naming the offending
//! field.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::array::{ArrayShape, ChunkShape, DataType, Endianness};

/// An arbitrary user attribute map attached to a group or an array.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// A metadata error.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// An error parsing or serialising a descriptor.
    #[error("error parsing metadata: {0}")]
    InvalidJson(#[from] serde_json::Error),
    /// A descriptor violates a format invariant.
    #[error("schema violation in field {field}: {reason}")]
    SchemaViolation {
        /// The offending descriptor field.
        field: &'static str,
        /// Why the field is invalid.
        reason: String,
    },
}

impl MetadataError {
    fn schema_violation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::SchemaViolation {
            field,
            reason: reason.into(),
        }
    }
}

/// Serialise a descriptor to its canonical byte encoding.
fn to_canonical_json<T: Serialize>(value: &T) -> Result<Vec<u8>, MetadataError> {
    let mut bytes = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut bytes, formatter);
    value.serialize(&mut serializer)?;
    Ok(bytes)
}

/// Group metadata (`.zgroup`).
///
/// The presence of this descriptor at a hierarchy path is what marks that path as a group.
/// ```json
/// {
///     "zarr_format": 2
/// }
/// ```
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug, Default, Display)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct GroupMetadata {
    /// An integer defining the version of the storage specification. Must be `2`.
    pub zarr_format: monostate::MustBe!(2u64),
}

impl GroupMetadata {
    /// Serialise to the canonical byte encoding.
    ///
    /// # Errors
    /// Returns [`MetadataError::InvalidJson`] on a serialisation failure.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MetadataError> {
        to_canonical_json(self)
    }

    /// Parse from `bytes`.
    ///
    /// # Errors
    /// Returns [`MetadataError::InvalidJson`] if the payload is not a valid group descriptor.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MetadataError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Array metadata (`.zarray`).
///
/// An example JSON document:
/// ```json
/// {
///     "chunks": [
///         1,
///         512,
///         512
///     ],
///     "compressor": {
///         "id": "zlib",
///         "level": 1
///     },
///     "dtype": "<f4",
///     "fill_value": "NaN",
///     "filters": null,
///     "order": "C",
///     "shape": [
///         4,
///         1000,
///         1000
///     ],
///     "zarr_format": 2
/// }
/// ```
/// Fields are declared in their canonical (alphabetical) serialisation order.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Display)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct ArrayMetadata {
    /// A list of integers defining the length of each dimension of a chunk of the array.
    pub chunks: ChunkShape,
    /// The primary compression codec applied to every chunk, or null for none.
    pub compressor: Option<CodecMetadata>,
    /// Either `.` or `/`, the separator placed between the dimensions of a chunk key.
    #[serde(
        default = "chunk_key_separator_default",
        skip_serializing_if = "ChunkKeySeparator::is_dot"
    )]
    pub dimension_separator: ChunkKeySeparator,
    /// The data type of the array as a NumPy typestr, e.g. `"<f4"`.
    pub dtype: String,
    /// A scalar value used for uninitialised portions of the array, or null for none.
    pub fill_value: FillValueMetadata,
    /// A list of filter codec configurations, or null if no filters are to be applied.
    #[serde(default)]
    pub filters: Option<Vec<CodecMetadata>>,
    /// Either `C` or `F`, defining the layout of bytes within each chunk of the array.
    pub order: Order,
    /// An array of integers providing the length of each dimension of the array.
    pub shape: ArrayShape,
    /// An integer defining the version of the storage specification. Must be `2`.
    pub zarr_format: monostate::MustBe!(2u64),
}

const fn chunk_key_separator_default() -> ChunkKeySeparator {
    ChunkKeySeparator::Dot
}

impl ArrayMetadata {
    /// Create array metadata with row-major order, no filters, and the `.` separator.
    #[must_use]
    pub fn new(
        shape: ArrayShape,
        chunks: ChunkShape,
        dtype: String,
        fill_value: FillValueMetadata,
        compressor: Option<CodecMetadata>,
    ) -> Self {
        Self {
            chunks,
            compressor,
            dimension_separator: ChunkKeySeparator::Dot,
            dtype,
            fill_value,
            filters: None,
            order: Order::C,
            shape,
            zarr_format: monostate::MustBe!(2u64),
        }
    }

    /// Serialise to the canonical byte encoding.
    ///
    /// # Errors
    /// Returns [`MetadataError::InvalidJson`] on a serialisation failure.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MetadataError> {
        to_canonical_json(self)
    }

    /// Parse from `bytes` and validate.
    ///
    /// Unknown fields are ignored. Structural failures (wrong types, negative integers in
    /// `shape` or `chunks`) surface as [`MetadataError::InvalidJson`]; semantic invariant
    /// failures surface as [`MetadataError::SchemaViolation`].
    ///
    /// # Errors
    /// Returns a [`MetadataError`] if the payload is not a valid array descriptor.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MetadataError> {
        let metadata: Self = serde_json::from_slice(bytes)?;
        metadata.validate()?;
        Ok(metadata)
    }

    /// Validate the descriptor against the format invariants.
    ///
    /// # Errors
    /// Returns [`MetadataError::SchemaViolation`] naming the offending field.
    pub fn validate(&self) -> Result<(), MetadataError> {
        if self.chunks.len() != self.shape.len() {
            return Err(MetadataError::schema_violation(
                "chunks",
                format!(
                    "length {} does not match shape length {}",
                    self.chunks.len(),
                    self.shape.len()
                ),
            ));
        }
        for (&chunk, &extent) in self.chunks.iter().zip(&self.shape) {
            if chunk == 0 {
                return Err(MetadataError::schema_violation(
                    "chunks",
                    "chunk extents must be positive",
                ));
            }
            if extent > 0 && chunk > extent {
                return Err(MetadataError::schema_violation(
                    "chunks",
                    format!("chunk extent {chunk} exceeds array extent {extent}"),
                ));
            }
        }
        let (data_type, _) = self.data_type()?;
        if matches!(
            self.fill_value,
            FillValueMetadata::NaN | FillValueMetadata::Infinity | FillValueMetadata::NegInfinity
        ) && !data_type.is_float()
        {
            return Err(MetadataError::schema_violation(
                "fill_value",
                format!("non-finite fill value for data type {}", self.dtype),
            ));
        }
        Ok(())
    }

    /// The parsed data type and endianness of the `dtype` typestr.
    ///
    /// # Errors
    /// Returns [`MetadataError::SchemaViolation`] if the data type is unsupported.
    pub fn data_type(&self) -> Result<(DataType, Endianness), MetadataError> {
        DataType::from_typestr(&self.dtype).ok_or_else(|| {
            MetadataError::schema_violation(
                "dtype",
                format!("unsupported data type {}", self.dtype),
            )
        })
    }
}

/// Codec metadata: an `id` and a flattened configuration.
///
/// For example:
/// ```json
/// {
///     "id": "zlib",
///     "level": 1
/// }
/// ```
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Display)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct CodecMetadata {
    id: String,
    #[serde(flatten)]
    configuration: Attributes,
}

impl CodecMetadata {
    /// Create codec metadata with an empty configuration.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            configuration: Attributes::default(),
        }
    }

    /// Create codec metadata from a serialisable configuration.
    ///
    /// # Errors
    /// Returns [`MetadataError::InvalidJson`] if `configuration` does not serialise to a JSON
    /// object.
    pub fn new_with_serializable_configuration<T: Serialize>(
        id: impl Into<String>,
        configuration: &T,
    ) -> Result<Self, MetadataError> {
        match serde_json::to_value(configuration)? {
            serde_json::Value::Object(configuration) => Ok(Self {
                id: id.into(),
                configuration,
            }),
            _ => Err(MetadataError::schema_violation(
                "compressor",
                "codec configuration must be a JSON object",
            )),
        }
    }

    /// Return the codec id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Return the configuration, which includes all fields excluding the `id`.
    #[must_use]
    pub fn configuration(&self) -> &Attributes {
        &self.configuration
    }

    /// Convert the configuration to a typed configuration.
    ///
    /// # Errors
    /// Returns a [`serde_json::Error`] if the configuration cannot be converted.
    pub fn to_typed_configuration<T: serde::de::DeserializeOwned>(
        &self,
    ) -> Result<T, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(self.configuration.clone()))
    }
}

/// A scalar value used for uninitialised portions of an array, or null if no fill value is to
/// be used.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum FillValueMetadata {
    /// No fill value.
    Null,
    /// NaN (not-a-number).
    NaN,
    /// Positive infinity.
    Infinity,
    /// Negative infinity.
    NegInfinity,
    /// A number.
    Number(serde_json::Number),
}

impl Default for FillValueMetadata {
    /// Zero.
    fn default() -> Self {
        Self::Number(serde_json::Number::from(0))
    }
}

impl<'de> serde::Deserialize<'de> for FillValueMetadata {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum FillValueMetadataType {
            String(String),
            Number(serde_json::Number),
            Null,
        }
        let fill_value = FillValueMetadataType::deserialize(d)?;
        match fill_value {
            FillValueMetadataType::String(string) => match string.as_str() {
                "NaN" => Ok(Self::NaN),
                "Infinity" => Ok(Self::Infinity),
                "-Infinity" => Ok(Self::NegInfinity),
                _ => Err(serde::de::Error::custom("unsupported fill value")),
            },
            FillValueMetadataType::Number(number) => Ok(Self::Number(number)),
            FillValueMetadataType::Null => Ok(Self::Null),
        }
    }
}

impl Serialize for FillValueMetadata {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::NaN => serializer.serialize_str("NaN"),
            Self::Infinity => serializer.serialize_str("Infinity"),
            Self::NegInfinity => serializer.serialize_str("-Infinity"),
            Self::Number(number) => number.serialize(serializer),
        }
    }
}

/// The layout of bytes within each chunk of the array.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum Order {
    /// Row-major order. The last dimension varies fastest.
    C,
    /// Column-major order. The first dimension varies fastest.
    F,
}

/// The separator placed between the dimension indices of a chunk key.
#[derive(Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Debug, Display)]
pub enum ChunkKeySeparator {
    /// The dot separator.
    #[serde(rename = ".")]
    #[display(".")]
    Dot,
    /// The slash separator.
    #[serde(rename = "/")]
    #[display("/")]
    Slash,
}

impl ChunkKeySeparator {
    /// Indicates if this is the default `.` separator.
    #[must_use]
    pub fn is_dot(&self) -> bool {
        matches!(self, Self::Dot)
    }
}

/// Parse an attribute map (`.zattrs`) from `bytes`.
///
/// Any JSON object is accepted.
///
/// # Errors
/// Returns [`MetadataError::InvalidJson`] if the payload is not a JSON object.
pub fn attributes_from_bytes(bytes: &[u8]) -> Result<Attributes, MetadataError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Serialise an attribute map to its canonical byte encoding.
///
/// # Errors
/// Returns [`MetadataError::InvalidJson`] on a serialisation failure.
pub fn attributes_to_bytes(attributes: &Attributes) -> Result<Vec<u8>, MetadataError> {
    to_canonical_json(attributes)
}
