//! The encoding of chunk grid indices as store keys.

use itertools::Itertools;

use crate::metadata::ChunkKeySeparator;
use crate::storage::StoreKey;

use super::ChunkIndices;

/// The chunk key encoding of an array: chunk grid indices rendered as decimal integers
/// joined by a separator.
///
/// With the default `.` separator, the chunk at indices `[0, 2, 1]` has the key `0.2.1`.
/// [`encode`](ChunkKeyEncoding::encode) and [`decode`](ChunkKeyEncoding::decode) are exact
/// inverses over valid inputs: a key only decodes if re-encoding its indices reproduces it
/// byte for byte, so keys with leading zeros, signs, or empty components are rejected.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChunkKeyEncoding {
    separator: ChunkKeySeparator,
}

impl Default for ChunkKeyEncoding {
    /// The `.` separator.
    fn default() -> Self {
        Self::new(ChunkKeySeparator::Dot)
    }
}

impl ChunkKeyEncoding {
    /// Create a chunk key encoding with `separator`.
    #[must_use]
    pub const fn new(separator: ChunkKeySeparator) -> Self {
        Self { separator }
    }

    /// The separator placed between dimension indices.
    #[must_use]
    pub const fn separator(&self) -> ChunkKeySeparator {
        self.separator
    }

    /// Encode chunk indices as a store key.
    ///
    /// Zero dimensional arrays have a single chunk with the key `0`.
    #[must_use]
    pub fn encode(&self, chunk_indices: &[u64]) -> StoreKey {
        let key = if chunk_indices.is_empty() {
            "0".to_string()
        } else {
            chunk_indices
                .iter()
                .map(ToString::to_string)
                .join(&self.separator.to_string())
        };
        // Decimal integers joined by a separator are always a valid key.
        unsafe { StoreKey::new_unchecked(key) }
    }

    /// Decode a chunk key into chunk indices.
    ///
    /// Returns [`None`] if `key` is not a canonical chunk key, i.e. if re-encoding the
    /// decoded indices would not reproduce `key` exactly.
    #[must_use]
    pub fn decode(&self, key: &str) -> Option<ChunkIndices> {
        key.split(match self.separator {
            ChunkKeySeparator::Dot => '.',
            ChunkKeySeparator::Slash => '/',
        })
        .map(|component| {
            // Reject non-canonical renderings such as "01", "+1", or "".
            component
                .parse::<u64>()
                .ok()
                .filter(|index| index.to_string() == component)
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_dot() {
        let encoding = ChunkKeyEncoding::default();
        assert_eq!(encoding.encode(&[0, 2, 1]).as_str(), "0.2.1");
        assert_eq!(encoding.encode(&[10]).as_str(), "10");
        assert_eq!(encoding.encode(&[]).as_str(), "0");
    }

    #[test]
    fn encode_slash() {
        let encoding = ChunkKeyEncoding::new(ChunkKeySeparator::Slash);
        assert_eq!(encoding.encode(&[1, 0]).as_str(), "1/0");
    }

    #[test]
    fn decode_round_trip() {
        let encoding = ChunkKeyEncoding::default();
        for indices in [vec![0], vec![0, 2, 1], vec![u64::MAX, 0]] {
            let key = encoding.encode(&indices);
            assert_eq!(encoding.decode(key.as_str()), Some(indices));
        }
    }

    #[test]
    fn decode_rejects_non_canonical() {
        let encoding = ChunkKeyEncoding::default();
        assert_eq!(encoding.decode("0.01"), None);
        assert_eq!(encoding.decode("+1"), None);
        assert_eq!(encoding.decode("1."), None);
        assert_eq!(encoding.decode(".1"), None);
        assert_eq!(encoding.decode("1..2"), None);
        assert_eq!(encoding.decode("a.b"), None);
        assert_eq!(encoding.decode(""), None);
        // 2^64, one past the largest representable index.
        assert_eq!(encoding.decode("18446744073709551616"), None);
    }
}
