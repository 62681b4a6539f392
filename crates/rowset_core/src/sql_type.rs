use serde::{Deserialize, Serialize};

/// SQL type of a result column, keyed by its JDBC type code.
///
/// Only the codes the engine treats differently get their own variant;
/// anything else is carried through as `Other(code)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    Char,
    VarChar,
    LongVarChar,
    NChar,
    NVarChar,
    LongNVarChar,
    Clob,
    NClob,
    Blob,
    Binary,
    VarBinary,
    LongVarBinary,
    Date,
    Time,
    Timestamp,
    Boolean,
    Bit,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Float,
    Double,
    Numeric,
    Decimal,
    Null,
    Other(i32),
}

impl SqlType {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Char,
            12 => Self::VarChar,
            -1 => Self::LongVarChar,
            -15 => Self::NChar,
            -9 => Self::NVarChar,
            -16 => Self::LongNVarChar,
            2005 => Self::Clob,
            2011 => Self::NClob,
            2004 => Self::Blob,
            -2 => Self::Binary,
            -3 => Self::VarBinary,
            -4 => Self::LongVarBinary,
            91 => Self::Date,
            92 => Self::Time,
            93 => Self::Timestamp,
            16 => Self::Boolean,
            -7 => Self::Bit,
            -6 => Self::TinyInt,
            5 => Self::SmallInt,
            4 => Self::Integer,
            -5 => Self::BigInt,
            7 => Self::Real,
            6 => Self::Float,
            8 => Self::Double,
            2 => Self::Numeric,
            3 => Self::Decimal,
            0 => Self::Null,
            other => Self::Other(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Char => 1,
            Self::VarChar => 12,
            Self::LongVarChar => -1,
            Self::NChar => -15,
            Self::NVarChar => -9,
            Self::LongNVarChar => -16,
            Self::Clob => 2005,
            Self::NClob => 2011,
            Self::Blob => 2004,
            Self::Binary => -2,
            Self::VarBinary => -3,
            Self::LongVarBinary => -4,
            Self::Date => 91,
            Self::Time => 92,
            Self::Timestamp => 93,
            Self::Boolean => 16,
            Self::Bit => -7,
            Self::TinyInt => -6,
            Self::SmallInt => 5,
            Self::Integer => 4,
            Self::BigInt => -5,
            Self::Real => 7,
            Self::Float => 6,
            Self::Double => 8,
            Self::Numeric => 2,
            Self::Decimal => 3,
            Self::Null => 0,
            Self::Other(code) => code,
        }
    }

    /// Plain character columns. Delimited export wraps these in double quotes.
    pub fn is_character(self) -> bool {
        matches!(self, Self::Char | Self::VarChar | Self::LongVarChar)
    }

    /// Types whose SQL literal must be single-quoted.
    pub fn needs_quoted_literal(self) -> bool {
        matches!(
            self,
            Self::Char
                | Self::VarChar
                | Self::LongVarChar
                | Self::NChar
                | Self::NVarChar
                | Self::LongNVarChar
                | Self::Clob
                | Self::Date
                | Self::Time
                | Self::Timestamp
        )
    }

    /// Out-of-line payloads fetched on demand.
    pub fn is_lob(self) -> bool {
        matches!(
            self,
            Self::Blob
                | Self::Clob
                | Self::NClob
                | Self::Binary
                | Self::VarBinary
                | Self::LongVarBinary
        )
    }
}

impl From<i32> for SqlType {
    fn from(code: i32) -> Self {
        Self::from_code(code)
    }
}
