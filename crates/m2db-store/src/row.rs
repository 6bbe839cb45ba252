use std::collections::BTreeMap;

use bytes::Bytes;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::value::{ColumnType, Value};

/// One result row: selected column names paired with their values.
///
/// Typed accessors return `Ok(None)` for a missing column or a null cell and
/// `Err(TypeMismatch)` when the cell holds a different type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Row {
    cells: Vec<(String, Value)>,
}

macro_rules! typed_getter {
    ($name:ident, $variant:ident, $ty:ty, $col_ty:expr) => {
        pub fn $name(&self, column: &str) -> StoreResult<Option<$ty>> {
            match self.get(column) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::$variant(v)) => Ok(Some(v.clone())),
                Some(other) => Err(StoreError::TypeMismatch {
                    column: column.to_string(),
                    expected: $col_ty,
                    actual: other.type_name(),
                }),
            }
        }
    };
}

impl Row {
    pub fn new(cells: Vec<(String, Value)>) -> Self {
        Self { cells }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    typed_getter!(int, Int, i32, ColumnType::Int);
    typed_getter!(bigint, BigInt, i64, ColumnType::BigInt);
    typed_getter!(text, Text, String, ColumnType::Text);
    typed_getter!(blob, Blob, Bytes, ColumnType::Blob);
    typed_getter!(uuid, TimeUuid, Uuid, ColumnType::TimeUuid);
    typed_getter!(map, Map, BTreeMap<String, String>, ColumnType::TextMap);
}

/// Rows returned by one execution, in result order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Rows(Vec<Row>);

impl Rows {
    pub fn new(rows: Vec<Row>) -> Self {
        Self(rows)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&Row> {
        self.0.first()
    }

    /// Take the first row, discarding the rest.
    pub fn into_first(self) -> Option<Row> {
        self.0.into_iter().next()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.0.iter()
    }
}

impl IntoIterator for Rows {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Rows {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
