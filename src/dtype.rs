//! Element types of arrays and the rules for promoting between them.

use std::fmt;

/// Enum specifying the kind of the elements in an array.
///
/// Complex types store each value as two consecutive real elements, so arrays
/// of these types always have an even item size. Any other numeric type with
/// an item size greater than one is a compound (packed) type, eg. RGB pixels.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Complex64,
    Complex128,
    /// Opaque values which have no numeric interpretation.
    Object,
}

impl DataType {
    /// Return true if elements of this type can be read as numbers.
    pub fn is_numeric(self) -> bool {
        self != DataType::Object
    }

    pub fn is_bool(self) -> bool {
        self == DataType::Bool
    }

    /// Return true for signed integer types. Booleans are not included.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    pub fn is_complex(self) -> bool {
        matches!(self, DataType::Complex64 | DataType::Complex128)
    }

    /// Return the number of storage elements used by a single value of this
    /// type, before any compounding.
    pub fn elements_per_value(self) -> usize {
        if self.is_complex() {
            2
        } else {
            1
        }
    }

    /// Return the type of the real component of a complex type, or `self`
    /// for other types.
    pub fn real_type(self) -> DataType {
        match self {
            DataType::Complex64 => DataType::Float32,
            DataType::Complex128 => DataType::Float64,
            other => other,
        }
    }

    /// Position in the promotion order. Object sorts last so that it absorbs
    /// everything else.
    fn rank(self) -> u8 {
        match self {
            DataType::Bool => 0,
            DataType::Int8 => 1,
            DataType::Int16 => 2,
            DataType::Int32 => 3,
            DataType::Int64 => 4,
            DataType::Float32 => 5,
            DataType::Float64 => 6,
            DataType::Complex64 => 7,
            DataType::Complex128 => 8,
            DataType::Object => 9,
        }
    }
}

/// Return the type that can represent values of both `a` and `b`.
///
/// The result is the more general of the two types, except that 32-bit
/// floats are widened to 64 bits when combined with 32 or 64-bit integers
/// (which `f32` cannot represent exactly), and similarly for 64-bit complex
/// numbers combined with 64-bit floats or wide integers.
pub fn promote(a: DataType, b: DataType) -> DataType {
    let (lo, hi) = if a.rank() <= b.rank() { (a, b) } else { (b, a) };
    match (lo, hi) {
        (DataType::Int32 | DataType::Int64, DataType::Float32) => DataType::Float64,
        (DataType::Int32 | DataType::Int64 | DataType::Float64, DataType::Complex64) => {
            DataType::Complex128
        }
        _ => hi,
    }
}

impl fmt::Display for DataType {
    /// Format this type in the style of the corresponding Rust type (eg.
    /// "i32" for `DataType::Int32`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                DataType::Bool => "bool",
                DataType::Int8 => "i8",
                DataType::Int16 => "i16",
                DataType::Int32 => "i32",
                DataType::Int64 => "i64",
                DataType::Float32 => "f32",
                DataType::Float64 => "f64",
                DataType::Complex64 => "c64",
                DataType::Complex128 => "c128",
                DataType::Object => "object",
            }
        )
    }
}

impl std::str::FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<DataType, String> {
        let dtype = match s {
            "bool" => DataType::Bool,
            "i8" => DataType::Int8,
            "i16" => DataType::Int16,
            "i32" => DataType::Int32,
            "i64" => DataType::Int64,
            "f32" => DataType::Float32,
            "f64" => DataType::Float64,
            "c64" => DataType::Complex64,
            "c128" => DataType::Complex128,
            "object" => DataType::Object,
            _ => return Err(format!("unknown data type \"{}\"", s)),
        };
        Ok(dtype)
    }
}
