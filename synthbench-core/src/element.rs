//! Element Types
//!
//! The closed set of numeric element types a benchmark can be instantiated with.
//! Every per-type property (name in generated code, configuration code, value range,
//! storage width, reduction used by the value generator) lives in one table, `TypeInfo`,
//! consulted everywhere instead of being re-derived per call site.

use crate::ConfigurationError;
use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric element type of the containers in a generated program.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Archive,
    RkyvSerialize,
    RkyvDeserialize,
    Serialize,
    Deserialize,
)]
#[archive(check_bytes)]
#[archive_attr(derive(Debug, PartialEq, Eq))]
pub enum ElementType {
    /// unsigned 8-bit
    #[serde(rename = "ubyte")]
    UByte,
    /// signed 8-bit
    #[serde(rename = "byte")]
    Byte,
    /// unsigned 16-bit
    #[serde(rename = "uint16")]
    UInt16,
    /// signed 16-bit
    #[serde(rename = "int16")]
    Int16,
    /// unsigned 32-bit
    #[serde(rename = "uint32")]
    UInt32,
    /// signed 32-bit
    #[serde(rename = "int32")]
    Int32,
    /// 32-bit float
    #[serde(rename = "float32")]
    Float32,
}

/// How a value expression reduces its linear combination into the type's range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reduction {
    /// `(lin % modulus) + shift`
    Modulo {
        /// Modulus applied to the linear combination
        modulus: i64,
        /// Added after the modulus (negative for signed types)
        shift: i64,
    },
    /// Unreduced; the conversion to the element type wraps.
    Wrap,
    /// `lin * factor * sign(i0)` in single precision.
    Scaled {
        /// Scale applied to the linear combination
        factor: f32,
    },
}

/// Static description of one element type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypeInfo {
    /// Type name used in configuration output and generated code
    pub name: &'static str,
    /// Configuration type code (`8u`, `32f`, ...)
    pub code: &'static str,
    /// Smallest representable value
    pub min: f64,
    /// Largest representable value
    pub max: f64,
    /// Storage width in bytes
    pub width: usize,
    /// Whether negative values are representable
    pub signed: bool,
    /// Reduction used by the value generator
    pub reduction: Reduction,
}

const UBYTE: TypeInfo = TypeInfo {
    name: "ubyte",
    code: "8u",
    min: 0.0,
    max: u8::MAX as f64,
    width: 1,
    signed: false,
    reduction: Reduction::Modulo {
        modulus: 256,
        shift: 0,
    },
};

const BYTE: TypeInfo = TypeInfo {
    name: "byte",
    code: "8s",
    min: i8::MIN as f64,
    max: i8::MAX as f64,
    width: 1,
    signed: true,
    reduction: Reduction::Modulo {
        modulus: 256,
        shift: -128,
    },
};

const UINT16: TypeInfo = TypeInfo {
    name: "uint16",
    code: "16u",
    min: 0.0,
    max: u16::MAX as f64,
    width: 2,
    signed: false,
    reduction: Reduction::Modulo {
        modulus: 65535,
        shift: 0,
    },
};

const INT16: TypeInfo = TypeInfo {
    name: "int16",
    code: "16s",
    min: i16::MIN as f64,
    max: i16::MAX as f64,
    width: 2,
    signed: true,
    reduction: Reduction::Modulo {
        modulus: 65535,
        shift: -32768,
    },
};

const UINT32: TypeInfo = TypeInfo {
    name: "uint32",
    code: "32u",
    min: 0.0,
    max: u32::MAX as f64,
    width: 4,
    signed: false,
    reduction: Reduction::Wrap,
};

const INT32: TypeInfo = TypeInfo {
    name: "int32",
    code: "32s",
    min: i32::MIN as f64,
    max: i32::MAX as f64,
    width: 4,
    signed: true,
    reduction: Reduction::Wrap,
};

const FLOAT32: TypeInfo = TypeInfo {
    name: "float32",
    code: "32f",
    min: f32::MIN as f64,
    max: f32::MAX as f64,
    width: 4,
    signed: true,
    reduction: Reduction::Scaled { factor: 1.23512e-4 },
};

impl ElementType {
    /// All element types, in type-code table order
    pub const ALL: [ElementType; 7] = [
        ElementType::UByte,
        ElementType::Byte,
        ElementType::UInt16,
        ElementType::Int16,
        ElementType::UInt32,
        ElementType::Int32,
        ElementType::Float32,
    ];

    /// The table entry for this type
    pub fn info(self) -> &'static TypeInfo {
        match self {
            ElementType::UByte => &UBYTE,
            ElementType::Byte => &BYTE,
            ElementType::UInt16 => &UINT16,
            ElementType::Int16 => &INT16,
            ElementType::UInt32 => &UINT32,
            ElementType::Int32 => &INT32,
            ElementType::Float32 => &FLOAT32,
        }
    }

    /// Type name (`ubyte`, `int16`, `float32`, ...)
    pub fn name(self) -> &'static str {
        self.info().name
    }

    /// Whether this is an integer type
    pub fn is_integer(self) -> bool {
        !matches!(self, ElementType::Float32)
    }

    /// Look up a type by its name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decode a concatenation of type codes, greedily from left to right.
///
/// Repeated codes collapse to a single entry; declaration order is kept.
/// An unrecognized code anywhere in the string is an error.
pub fn decode_type_codes(codes: &str) -> Result<Vec<ElementType>, ConfigurationError> {
    if codes.is_empty() {
        return Err(ConfigurationError::UnknownTypeCode(codes.to_string()));
    }

    let mut types = Vec::new();
    let mut rest = codes;
    while !rest.is_empty() {
        let ty = ElementType::ALL
            .into_iter()
            .find(|t| rest.starts_with(t.info().code))
            .ok_or_else(|| ConfigurationError::UnknownTypeCode(codes.to_string()))?;
        rest = &rest[ty.info().code.len()..];
        if !types.contains(&ty) {
            types.push(ty);
        }
    }
    Ok(types)
}
