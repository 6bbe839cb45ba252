use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Column types the store understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int,
    BigInt,
    Text,
    Blob,
    TimeUuid,
    /// `map<text, text>`; entries are individually addressable and expirable.
    TextMap,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int => "int",
            Self::BigInt => "bigint",
            Self::Text => "text",
            Self::Blob => "blob",
            Self::TimeUuid => "timeuuid",
            Self::TextMap => "map<text, text>",
        };
        f.write_str(name)
    }
}

/// A bound parameter or a returned cell.
///
/// Values are totally ordered so they can serve directly as partition and
/// clustering keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    Null,
    Int(i32),
    BigInt(i64),
    Text(String),
    Blob(Bytes),
    TimeUuid(Uuid),
    Map(BTreeMap<String, String>),
}

impl Value {
    /// The column type this value belongs to, `None` for `Null`.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Self::Null => None,
            Self::Int(_) => Some(ColumnType::Int),
            Self::BigInt(_) => Some(ColumnType::BigInt),
            Self::Text(_) => Some(ColumnType::Text),
            Self::Blob(_) => Some(ColumnType::Blob),
            Self::TimeUuid(_) => Some(ColumnType::TimeUuid),
            Self::Map(_) => Some(ColumnType::TextMap),
        }
    }

    /// Whether the value may be stored in a column of type `ty`.
    pub fn fits(&self, ty: ColumnType) -> bool {
        self.column_type().map_or(true, |own| own == ty)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short type label for error messages.
    pub fn type_name(&self) -> String {
        self.column_type()
            .map_or_else(|| "null".to_string(), |t| t.to_string())
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::BigInt(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Self::Blob(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(Bytes::from(v))
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Self::TimeUuid(v)
    }
}

impl From<BTreeMap<String, String>> for Value {
    fn from(v: BTreeMap<String, String>) -> Self {
        Self::Map(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_fits_every_column() {
        for ty in [ColumnType::Int, ColumnType::Text, ColumnType::TextMap] {
            assert!(Value::Null.fits(ty));
        }
        assert!(Value::from(3).fits(ColumnType::Int));
        assert!(!Value::from(3).fits(ColumnType::BigInt));
        assert!(!Value::from("x").fits(ColumnType::Blob));
    }

    #[test]
    fn ordering_is_usable_as_clustering_key() {
        assert!(Value::Int(1) < Value::Int(2));
        assert!(Value::from("a") < Value::from("b"));
        let lo = Uuid::from_u128(1);
        let hi = Uuid::from_u128(2);
        assert!(Value::from(lo) < Value::from(hi));
    }

    #[test]
    fn option_conversion() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some("v")), Value::Text("v".into()));
        assert_eq!(ColumnType::TextMap.to_string(), "map<text, text>");
    }
}
