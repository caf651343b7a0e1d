//! Chunk compression codecs.
//!
//! A [`Compressor`] transforms the raw bytes of a chunk before they are written to a store
//! and reverses the transformation on read. Compressors are constructed from the
//! `compressor` field of an array descriptor; a descriptor naming a codec this crate was not
//! built with surfaces as [`CodecError::Unavailable`] carrying the codec id.

#[cfg(feature = "zlib")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metadata::{CodecMetadata, MetadataError};

/// A codec error.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The descriptor names a codec that is not available.
    #[error("codec {0} is not available")]
    Unavailable(String),
    /// An invalid codec configuration.
    #[error("invalid configuration for codec {codec}: {err}")]
    InvalidConfiguration {
        /// The codec id.
        codec: String,
        /// The underlying configuration error.
        err: String,
    },
    /// An IO error during encoding or decoding.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

/// The compressor applied to every chunk of an array.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Compressor {
    /// No compression. Chunk bytes pass through unchanged.
    None,
    /// The `zlib` codec.
    #[cfg(feature = "zlib")]
    Zlib(ZlibCodec),
}

impl Default for Compressor {
    /// No compression.
    fn default() -> Self {
        Self::None
    }
}

impl Compressor {
    /// Create a compressor from the `compressor` field of an array descriptor.
    ///
    /// A null field means no compression.
    ///
    /// # Errors
    /// Returns [`CodecError::Unavailable`] if the codec id is not supported, or
    /// [`CodecError::InvalidConfiguration`] if its configuration is invalid.
    pub fn from_metadata(metadata: Option<&CodecMetadata>) -> Result<Self, CodecError> {
        let Some(metadata) = metadata else {
            return Ok(Self::None);
        };
        match metadata.id() {
            #[cfg(feature = "zlib")]
            "zlib" => Ok(Self::Zlib(ZlibCodec::new_with_configuration(
                &metadata.to_typed_configuration().map_err(|err| {
                    CodecError::InvalidConfiguration {
                        codec: "zlib".to_string(),
                        err: err.to_string(),
                    }
                })?,
            )?)),
            id => Err(CodecError::Unavailable(id.to_string())),
        }
    }

    /// The descriptor representation of the compressor.
    ///
    /// # Errors
    /// Returns [`MetadataError::InvalidJson`] if the configuration does not serialise.
    pub fn to_metadata(&self) -> Result<Option<CodecMetadata>, MetadataError> {
        match self {
            Self::None => Ok(None),
            #[cfg(feature = "zlib")]
            Self::Zlib(codec) => Ok(Some(CodecMetadata::new_with_serializable_configuration(
                "zlib",
                &codec.configuration(),
            )?)),
        }
    }

    /// Encode chunk bytes.
    ///
    /// # Errors
    /// Returns a [`CodecError`] if encoding fails.
    pub fn encode(&self, decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        match self {
            Self::None => Ok(decoded_value),
            #[cfg(feature = "zlib")]
            Self::Zlib(codec) => codec.encode(&decoded_value),
        }
    }

    /// Decode chunk bytes.
    ///
    /// # Errors
    /// Returns a [`CodecError`] if the bytes are not a valid encoding.
    pub fn decode(&self, encoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        match self {
            Self::None => Ok(encoded_value),
            #[cfg(feature = "zlib")]
            Self::Zlib(codec) => codec.decode(&encoded_value),
        }
    }
}

/// The configuration of the `zlib` codec.
#[cfg(feature = "zlib")]
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq)]
pub struct ZlibCodecConfiguration {
    /// The compression level, an integer from 0 (no compression) to 9 (best compression).
    pub level: u32,
}

/// The `zlib` codec: DEFLATE compression with a zlib header and checksum.
#[cfg(feature = "zlib")]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ZlibCodec {
    compression: flate2::Compression,
}

#[cfg(feature = "zlib")]
impl Default for ZlibCodec {
    /// Compression level 1.
    fn default() -> Self {
        Self {
            compression: flate2::Compression::new(1),
        }
    }
}

#[cfg(feature = "zlib")]
impl ZlibCodec {
    /// Create a `zlib` codec with the given compression level.
    ///
    /// # Errors
    /// Returns [`CodecError::InvalidConfiguration`] if `level` exceeds 9.
    pub fn new(level: u32) -> Result<Self, CodecError> {
        if level > 9 {
            return Err(CodecError::InvalidConfiguration {
                codec: "zlib".to_string(),
                err: format!("compression level {level} exceeds 9"),
            });
        }
        Ok(Self {
            compression: flate2::Compression::new(level),
        })
    }

    /// Create a `zlib` codec from a configuration.
    ///
    /// # Errors
    /// Returns [`CodecError::InvalidConfiguration`] if the level is invalid.
    pub fn new_with_configuration(
        configuration: &ZlibCodecConfiguration,
    ) -> Result<Self, CodecError> {
        Self::new(configuration.level)
    }

    /// The configuration of the codec.
    #[must_use]
    pub fn configuration(&self) -> ZlibCodecConfiguration {
        ZlibCodecConfiguration {
            level: self.compression.level(),
        }
    }

    fn encode(&self, decoded_value: &[u8]) -> Result<Vec<u8>, CodecError> {
        use std::io::Read;
        let mut encoder = flate2::bufread::ZlibEncoder::new(decoded_value, self.compression);
        let mut encoded_value = Vec::with_capacity(decoded_value.len() / 2);
        encoder.read_to_end(&mut encoded_value)?;
        Ok(encoded_value)
    }

    fn decode(&self, encoded_value: &[u8]) -> Result<Vec<u8>, CodecError> {
        use std::io::Read;
        let mut decoder = flate2::bufread::ZlibDecoder::new(encoded_value);
        let mut decoded_value = Vec::new();
        decoder.read_to_end(&mut decoded_value)?;
        Ok(decoded_value)
    }
}
