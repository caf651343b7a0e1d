//! Array data types and their typestr encoding.

use derive_more::Display;

/// The endianness of a multi-byte data type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Endianness {
    /// Least significant byte first.
    Little,
    /// Most significant byte first.
    Big,
}

impl Endianness {
    /// Indicates if the endianness matches the target.
    #[must_use]
    pub fn is_native(self) -> bool {
        match self {
            Self::Little => cfg!(target_endian = "little"),
            Self::Big => cfg!(target_endian = "big"),
        }
    }

    /// The native endianness of the target.
    #[must_use]
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }
}

/// The data type of an array element.
///
/// Data types are encoded in array descriptors as NumPy typestrs such as `"<f4"`: a byte
/// order character (`<` little, `>` big, or `|` for single-byte types), a kind character
/// (`i` signed, `u` unsigned, `f` float), and the element size in bytes.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum DataType {
    /// A signed 8-bit integer.
    #[display("int8")]
    Int8,
    /// A signed 16-bit integer.
    #[display("int16")]
    Int16,
    /// A signed 32-bit integer.
    #[display("int32")]
    Int32,
    /// A signed 64-bit integer.
    #[display("int64")]
    Int64,
    /// An unsigned 8-bit integer.
    #[display("uint8")]
    UInt8,
    /// An unsigned 16-bit integer.
    #[display("uint16")]
    UInt16,
    /// An unsigned 32-bit integer.
    #[display("uint32")]
    UInt32,
    /// An unsigned 64-bit integer.
    #[display("uint64")]
    UInt64,
    /// An IEEE 754 single precision float.
    #[display("float32")]
    Float32,
    /// An IEEE 754 double precision float.
    #[display("float64")]
    Float64,
}

impl DataType {
    /// The size of an element in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    /// Indicates if this is a floating point data type.
    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// Parse a NumPy typestr, such as `"<f4"` or `"|u1"`.
    ///
    /// Returns [`None`] if the typestr does not name a supported data type. The `|` byte
    /// order is only accepted for single-byte types, and multi-byte types require an
    /// explicit `<` or `>`.
    #[must_use]
    pub fn from_typestr(typestr: &str) -> Option<(Self, Endianness)> {
        let mut chars = typestr.chars();
        let order = chars.next()?;
        let kind = chars.next()?;
        let size = chars.as_str();
        let data_type = match (kind, size) {
            ('i', "1") => Self::Int8,
            ('i', "2") => Self::Int16,
            ('i', "4") => Self::Int32,
            ('i', "8") => Self::Int64,
            ('u', "1") => Self::UInt8,
            ('u', "2") => Self::UInt16,
            ('u', "4") => Self::UInt32,
            ('u', "8") => Self::UInt64,
            ('f', "4") => Self::Float32,
            ('f', "8") => Self::Float64,
            _ => return None,
        };
        let endianness = match order {
            '<' => Endianness::Little,
            '>' => Endianness::Big,
            '|' if data_type.size() == 1 => Endianness::native(),
            _ => return None,
        };
        Some((data_type, endianness))
    }

    /// The NumPy typestr of the data type with `endianness`.
    ///
    /// Single-byte types use the `|` byte order.
    #[must_use]
    pub fn to_typestr(self, endianness: Endianness) -> String {
        let order = if self.size() == 1 {
            '|'
        } else {
            match endianness {
                Endianness::Little => '<',
                Endianness::Big => '>',
            }
        };
        let kind = match self {
            Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64 => 'i',
            Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64 => 'u',
            Self::Float32 | Self::Float64 => 'f',
        };
        format!("{order}{kind}{}", self.size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typestr_parse() {
        assert_eq!(
            DataType::from_typestr("<f4"),
            Some((DataType::Float32, Endianness::Little))
        );
        assert_eq!(
            DataType::from_typestr(">i8"),
            Some((DataType::Int64, Endianness::Big))
        );
        assert_eq!(
            DataType::from_typestr("|u1").map(|(data_type, _)| data_type),
            Some(DataType::UInt8)
        );
        assert_eq!(DataType::from_typestr("|i4"), None);
        assert_eq!(DataType::from_typestr("<f2"), None);
        assert_eq!(DataType::from_typestr("f4"), None);
        assert_eq!(DataType::from_typestr(""), None);
    }

    #[test]
    fn typestr_render() {
        assert_eq!(DataType::Float32.to_typestr(Endianness::Little), "<f4");
        assert_eq!(DataType::UInt16.to_typestr(Endianness::Big), ">u2");
        assert_eq!(DataType::Int8.to_typestr(Endianness::Big), "|i1");
        for typestr in ["<i2", ">u4", "<f8", "|u1"] {
            let (data_type, endianness) = DataType::from_typestr(typestr).unwrap();
            assert_eq!(data_type.to_typestr(endianness), typestr);
        }
    }
}
