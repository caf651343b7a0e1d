#![allow(missing_docs)]

use zarrzip::array::{ChunkKeyEncoding, DataType, Endianness};
use zarrzip::codec::{Compressor, ZlibCodec};
use zarrzip::convert::{
    convert, convert_to_bytes, convert_to_store, ConvertError, ConvertOptions, VariableSelector,
};
use zarrzip::dataset::{Dataset, DatasetError, Dimension, InMemoryDataset, VariableInfo};
use zarrzip::inspect::{inspect, NodeInfo};
use zarrzip::metadata::{ArrayMetadata, FillValueMetadata};
use zarrzip::node::NodePath;
use zarrzip::storage::{ListableStorageTraits, ReadableStorageTraits, StoreKey, ZipStore};

fn float_bytes(values: impl IntoIterator<Item = f32>) -> Vec<u8> {
    values
        .into_iter()
        .flat_map(|value| value.to_le_bytes())
        .collect()
}

fn synthetic_dataset() -> InMemoryDataset {
    // A (4, 1000, 1000) float32 variable with every element finite.
    let mut dataset = InMemoryDataset::new();
    dataset
        .add_dimension("time", 4)
        .add_dimension("height", 1000)
        .add_dimension("width", 1000);
    let values = (0..4u32 * 1000 * 1000).map(|index| (index % 1013) as f32);
    dataset
        .add_variable(
            "illumination",
            ["time", "height", "width"],
            DataType::Float32,
            Endianness::Little,
            float_bytes(values),
        )
        .unwrap();
    dataset
}

#[test]
fn end_to_end_conversion() {
    let dataset = synthetic_dataset();
    let options = ConvertOptions::new()
        .with_chunk("time", 1)
        .with_chunk("height", 512)
        .with_chunk("width", 512)
        .with_compressor(Compressor::Zlib(ZlibCodec::default()));
    let bytes = convert_to_bytes(&dataset, &options).unwrap();

    let store = ZipStore::from_bytes(bytes.clone()).unwrap();
    let path = NodePath::new("/illumination").unwrap();
    let metadata_bytes = store
        .get(&zarrzip::storage::meta_key_array(&path))
        .unwrap()
        .unwrap();
    let metadata = ArrayMetadata::from_bytes(&metadata_bytes).unwrap();
    assert_eq!(metadata.shape, vec![4, 1000, 1000]);
    assert_eq!(metadata.chunks, vec![1, 512, 512]);
    assert_eq!(metadata.dtype, "<f4");
    assert_eq!(metadata.fill_value, FillValueMetadata::NaN);
    assert_eq!(metadata.compressor.as_ref().unwrap().id(), "zlib");

    // A (4, 2, 2) grid, every chunk present.
    let chunk_keys: Vec<StoreKey> = store
        .list()
        .unwrap()
        .into_iter()
        .filter(|key| !key.name().starts_with(".z"))
        .collect();
    assert_eq!(chunk_keys.len(), 16);

    let report = inspect(bytes).unwrap();
    assert_eq!(report.get(&NodePath::root()).unwrap().info, NodeInfo::Group);
    match &report.get(&path).unwrap().info {
        NodeInfo::Array { chunks_stored, .. } => assert_eq!(*chunks_stored, 16),
        info => panic!("expected an array, got {info:?}"),
    }
}

#[test]
fn array_dimensions_attribute() {
    let dataset = synthetic_dataset();
    let bytes = convert_to_bytes(&dataset, &ConvertOptions::new()).unwrap();
    let report = inspect(bytes).unwrap();
    let node = report.get(&NodePath::new("/illumination").unwrap()).unwrap();
    let attributes = node.attributes.as_ref().unwrap();
    assert_eq!(
        attributes.get("_ARRAY_DIMENSIONS").unwrap(),
        &serde_json::json!(["time", "height", "width"])
    );
}

#[test]
fn sparse_chunks_are_elided() {
    // A 4x4 float32 variable whose lower right 2x2 quadrant is entirely NaN.
    let mut dataset = InMemoryDataset::new();
    dataset.add_dimension("y", 4).add_dimension("x", 4);
    let values = (0..16).map(|index| {
        if index % 4 >= 2 && index / 4 >= 2 {
            f32::NAN
        } else {
            index as f32
        }
    });
    dataset
        .add_variable(
            "values",
            ["y", "x"],
            DataType::Float32,
            Endianness::Little,
            float_bytes(values),
        )
        .unwrap();

    let options = ConvertOptions::new().with_chunk("y", 2).with_chunk("x", 2);
    let bytes = convert_to_bytes(&dataset, &options).unwrap();
    let store = ZipStore::from_bytes(bytes).unwrap();

    let present = StoreKey::new("values/0.0").unwrap();
    assert!(store.get(&present).unwrap().is_some());
    let elided = StoreKey::new("values/1.1").unwrap();
    assert!(store.get(&elided).unwrap().is_none());
}

#[test]
fn edge_chunks_are_padded_with_the_fill_value() {
    // A length 5 int32 variable chunked by 2: the last chunk holds [5, 0].
    let mut dataset = InMemoryDataset::new();
    dataset.add_dimension("x", 5);
    let values: Vec<u8> = (1i32..=5).flat_map(|value| value.to_le_bytes()).collect();
    dataset
        .add_variable("counts", ["x"], DataType::Int32, Endianness::Little, values)
        .unwrap();

    let options = ConvertOptions::new().with_chunk("x", 2);
    let store = convert_to_store(&dataset, &options).unwrap();
    let chunk = store
        .get(&StoreKey::new("counts/2").unwrap())
        .unwrap()
        .unwrap();
    let expected: Vec<u8> = [5i32, 0].iter().flat_map(|value| value.to_le_bytes()).collect();
    assert_eq!(chunk.as_ref(), expected);
}

#[test]
fn compressed_chunks_round_trip() {
    let mut dataset = InMemoryDataset::new();
    dataset.add_dimension("x", 100);
    let values: Vec<u8> = (0u64..100)
        .flat_map(|value| value.to_le_bytes())
        .collect();
    dataset
        .add_variable(
            "sequence",
            ["x"],
            DataType::UInt64,
            Endianness::Little,
            values.clone(),
        )
        .unwrap();

    let compressor = Compressor::Zlib(ZlibCodec::new(6).unwrap());
    let options = ConvertOptions::new().with_compressor(compressor.clone());
    let bytes = convert_to_bytes(&dataset, &options).unwrap();
    let store = ZipStore::from_bytes(bytes).unwrap();
    let encoded = store
        .get(&StoreKey::new("sequence/0").unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(compressor.decode(encoded.to_vec()).unwrap(), values);
}

#[test]
fn addressing_bijection_over_grid() {
    let encoding = ChunkKeyEncoding::default();
    for i in 0..3u64 {
        for j in 0..3u64 {
            let key = encoding.encode(&[i, j]);
            assert_eq!(encoding.decode(key.as_str()), Some(vec![i, j]));
        }
    }
}

#[test]
fn conversion_failure_writes_nothing() {
    struct FailingDataset;
    impl Dataset for FailingDataset {
        fn dimensions(&self) -> Vec<Dimension> {
            vec![Dimension {
                name: "x".to_string(),
                size: 4,
            }]
        }
        fn variables(&self) -> Vec<String> {
            vec!["broken".to_string()]
        }
        fn variable(&self, name: &str) -> Option<VariableInfo> {
            (name == "broken").then(|| VariableInfo {
                data_type: DataType::UInt8,
                endianness: Endianness::native(),
                dimensions: vec!["x".to_string()],
                shape: vec![4],
                attributes: zarrzip::metadata::Attributes::default(),
            })
        }
        fn read_block(
            &self,
            variable: &str,
            origin: &[u64],
            shape: &[u64],
        ) -> Result<Vec<u8>, DatasetError> {
            Err(DatasetError::BlockOutOfBounds {
                variable: variable.to_string(),
                origin: origin.to_vec(),
                shape: shape.to_vec(),
            })
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("broken.zarr.zip");
    std::fs::write(&destination, b"pre-existing").unwrap();

    let result = convert(&FailingDataset, &ConvertOptions::new(), &destination);
    assert!(matches!(result, Err(ConvertError::DatasetError(_))));
    // The pre-existing destination is untouched and no temporary remains.
    assert_eq!(std::fs::read(&destination).unwrap(), b"pre-existing");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn selector_converts_a_single_variable() {
    let mut dataset = InMemoryDataset::new();
    dataset.add_dimension("x", 2);
    for name in ["first", "second"] {
        dataset
            .add_variable(name, ["x"], DataType::UInt8, Endianness::native(), vec![1, 2])
            .unwrap();
    }
    let options = ConvertOptions::new()
        .with_selector(VariableSelector::Name("second".to_string()))
        .with_fill_value(FillValueMetadata::Number(serde_json::Number::from(0)));
    let store = convert_to_store(&dataset, &options).unwrap();
    assert!(store
        .get(&StoreKey::new("second/.zarray").unwrap())
        .unwrap()
        .is_some());
    assert!(store
        .get(&StoreKey::new("first/.zarray").unwrap())
        .unwrap()
        .is_none());
}
