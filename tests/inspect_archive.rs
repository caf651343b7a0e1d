#![allow(missing_docs)]

use zarrzip::archive::{pack_to_bytes, ArchiveError};
use zarrzip::inspect::{inspect, InspectError, NodeInfo};
use zarrzip::node::NodePath;
use zarrzip::storage::{MemoryStore, StoreKey, WritableStorageTraits};

fn set(store: &MemoryStore, key: &str, value: &str) {
    store
        .set(
            &StoreKey::new(key).unwrap(),
            value.as_bytes().to_vec().into(),
        )
        .unwrap();
}

fn example_archive() -> zarrzip::storage::Bytes {
    let store = MemoryStore::new();
    set(&store, ".zgroup", "{\n    \"zarr_format\": 2\n}");
    // One malformed array (negative shape entry) beside one valid array.
    set(
        &store,
        "malformed/.zarray",
        r#"{"chunks": [2], "compressor": null, "dtype": "<f4", "fill_value": null,
            "filters": null, "order": "C", "shape": [-4], "zarr_format": 2}"#,
    );
    set(
        &store,
        "valid/.zarray",
        r#"{"chunks": [2, 2], "compressor": null, "dtype": "<i4", "fill_value": 0,
            "filters": null, "order": "C", "shape": [4, 4], "zarr_format": 2}"#,
    );
    set(&store, "valid/0.0", "0000000000000000");
    pack_to_bytes(&store).unwrap()
}

#[test]
fn inspection_is_resilient_per_path() {
    let report = inspect(example_archive()).unwrap();
    assert_eq!(report.nodes().len(), 3);
    assert!(matches!(
        report
            .get(&NodePath::new("/malformed").unwrap())
            .unwrap()
            .info,
        NodeInfo::Malformed { .. }
    ));
    match &report.get(&NodePath::new("/valid").unwrap()).unwrap().info {
        NodeInfo::Array {
            metadata,
            chunks_stored,
        } => {
            assert_eq!(metadata.shape, vec![4, 4]);
            assert_eq!(*chunks_stored, 1);
        }
        info => panic!("expected an array, got {info:?}"),
    }
}

#[test]
fn truncated_archive_is_corrupt() {
    let bytes = example_archive();
    let truncated = bytes.slice(0..bytes.len() - 10);
    assert!(matches!(
        inspect(truncated),
        Err(InspectError::ArchiveError(ArchiveError::Corrupt(_)))
    ));
}

#[test]
fn malformed_root_descriptor() {
    let store = MemoryStore::new();
    set(&store, ".zgroup", r#"{"zarr_format": 3}"#);
    let report = inspect(pack_to_bytes(&store).unwrap()).unwrap();
    assert!(matches!(
        report.get(&NodePath::root()).unwrap().info,
        NodeInfo::Malformed { .. }
    ));
}
