//! A rust library for packaging multidimensional chunked arrays, with [Zarr V2](https://zarr-specs.readthedocs.io/en/latest/v2/v2.0.html) metadata, into zip archives.
//!
//! A hierarchy of groups and arrays is described by small JSON descriptors (`.zgroup`,
//! `.zarray`, `.zattrs`) stored beside chunk data in a flat key-value [`storage`] layer.
//! Arrays are split on a regular chunk grid; each chunk is an independently encoded store
//! entry addressed by its grid indices, and chunks whose region equals the array fill value
//! are elided entirely. A hierarchy is packaged with the [`archive`] module into a zip file
//! whose entries are stored without zip-level compression, so archives are seekable per
//! chunk and byte-reproducible.
//!
//! ## Example
//! ```rust,ignore
//! use zarrzip::array::{DataType, Endianness};
//! use zarrzip::convert::{convert, ConvertOptions};
//! use zarrzip::dataset::InMemoryDataset;
//!
//! let mut dataset = InMemoryDataset::new();
//! dataset.add_dimension("time", 4).add_dimension("height", 1000).add_dimension("width", 1000);
//! dataset.add_variable(
//!     "illumination",
//!     ["time", "height", "width"],
//!     DataType::Float32,
//!     Endianness::Little,
//!     samples,
//! )?;
//!
//! let options = ConvertOptions::new()
//!     .with_chunk("time", 1)
//!     .with_chunk("height", 512)
//!     .with_chunk("width", 512);
//! convert(&dataset, &options, "illumination.zarr.zip")?;
//!
//! let report = zarrzip::inspect::inspect_path("illumination.zarr.zip")?;
//! println!("{report}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Crate Features
//! #### Default
//!  - `zlib`: the `zlib` chunk compressor.
//!
//! ## Licence
//! `zarrzip` is licensed under either of
//!  - the Apache License, Version 2.0 or <http://www.apache.org/licenses/LICENSE-2.0> or
//!  - the MIT license or <http://opensource.org/licenses/MIT>, at your option.

#![warn(unused_variables)]
#![warn(dead_code)]
#![deny(missing_docs)]
// #![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![deny(clippy::missing_panics_doc)]

pub mod archive;
pub mod array;
pub mod codec;
pub mod convert;
pub mod dataset;
pub mod inspect;
pub mod metadata;
pub mod node;
pub mod storage;
