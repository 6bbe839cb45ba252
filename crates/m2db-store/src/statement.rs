//! Statement AST.
//!
//! Statements render themselves as CQL through `Display`; the rendered text
//! is also the prepared-statement cache key. Bind markers (`?`) are
//! positional in rendering order, which is the order [`Statement::bind_count`]
//! and the backends consume bound values in.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::ColumnType;

/// Clustering or result order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl Order {
    pub fn reversed(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        })
    }
}

/// Table layout: columns, partition key, clustering key and its order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<(String, ColumnType)>,
    pub partition_key: Vec<String>,
    pub clustering_key: Vec<String>,
    pub clustering_order: Order,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            partition_key: Vec::new(),
            clustering_key: Vec::new(),
            clustering_order: Order::Asc,
        }
    }

    pub fn column(mut self, name: impl Into<String>, ty: ColumnType) -> Self {
        self.columns.push((name.into(), ty));
        self
    }

    pub fn partition_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.partition_key = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn clustering_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clustering_key = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn clustering_order(mut self, order: Order) -> Self {
        self.clustering_order = order;
        self
    }

    pub fn column_type(&self, column: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, ty)| *ty)
    }

    pub fn is_partition_key(&self, column: &str) -> bool {
        self.partition_key.iter().any(|c| c == column)
    }

    pub fn is_clustering_key(&self, column: &str) -> bool {
        self.clustering_key.iter().any(|c| c == column)
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.is_partition_key(column) || self.is_clustering_key(column)
    }
}

impl fmt::Display for TableSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CREATE TABLE {} (", self.name)?;
        for (name, ty) in &self.columns {
            write!(f, "{name} {ty}, ")?;
        }
        write!(f, "PRIMARY KEY (({})", self.partition_key.join(", "))?;
        for c in &self.clustering_key {
            write!(f, ", {c}")?;
        }
        f.write_str("))")?;
        if let Some(first) = self.clustering_key.first() {
            if self.clustering_order == Order::Desc {
                write!(f, " WITH CLUSTERING ORDER BY ({first} DESC)")?;
            }
        }
        Ok(())
    }
}

/// Comparison operator in a `WHERE` clause.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eq => "=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        })
    }
}

/// `column <op> ?`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Filter {
    pub column: String,
    pub op: CmpOp,
}

fn write_where(f: &mut fmt::Formatter<'_>, filters: &[Filter]) -> fmt::Result {
    for (i, filter) in filters.iter().enumerate() {
        let kw = if i == 0 { " WHERE" } else { " AND" };
        write!(f, "{kw} {} {} ?", filter.column, filter.op)?;
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Select {
    pub table: String,
    /// Empty selects every column.
    pub columns: Vec<String>,
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Order)>,
    pub limit: Option<usize>,
}

impl Select {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(mut self, column: impl Into<String>, op: CmpOp) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            op,
        });
        self
    }

    pub fn where_eq(self, column: impl Into<String>) -> Self {
        self.filter(column, CmpOp::Eq)
    }

    pub fn order_by(mut self, column: impl Into<String>, order: Order) -> Self {
        self.order_by = Some((column.into(), order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cols = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };
        write!(f, "SELECT {cols} FROM {}", self.table)?;
        write_where(f, &self.filters)?;
        if let Some((column, order)) = &self.order_by {
            write!(f, " ORDER BY {column} {order}")?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {limit}")?;
        }
        Ok(())
    }
}

/// `INSERT INTO t (..) VALUES (..) [USING TTL ?]`: binds the column values
/// then, when `ttl` is set, the TTL in seconds.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Insert {
    pub table: String,
    pub columns: Vec<String>,
    pub ttl: bool,
}

impl Insert {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            ttl: false,
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_ttl(mut self) -> Self {
        self.ttl = true;
        self
    }
}

impl fmt::Display for Insert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let markers = vec!["?"; self.columns.len()].join(", ");
        write!(
            f,
            "INSERT INTO {} ({}) VALUES ({markers})",
            self.table,
            self.columns.join(", ")
        )?;
        if self.ttl {
            f.write_str(" USING TTL ?")?;
        }
        Ok(())
    }
}

/// One `SET` clause of an update.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Assignment {
    /// `col = ?`
    Set(String),
    /// `col[?] = ?`: a single map entry, key then value.
    MapPut(String),
}

/// `UPDATE t [USING TTL ?] SET .. WHERE ..`: binds the TTL first when set,
/// then assignment values in order, then the filter values.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Update {
    pub table: String,
    pub ttl: bool,
    pub assignments: Vec<Assignment>,
    pub filters: Vec<Filter>,
}

impl Update {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ttl: false,
            assignments: Vec::new(),
            filters: Vec::new(),
        }
    }

    pub fn set(mut self, column: impl Into<String>) -> Self {
        self.assignments.push(Assignment::Set(column.into()));
        self
    }

    pub fn put(mut self, column: impl Into<String>) -> Self {
        self.assignments.push(Assignment::MapPut(column.into()));
        self
    }

    pub fn where_eq(mut self, column: impl Into<String>) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            op: CmpOp::Eq,
        });
        self
    }

    pub fn with_ttl(mut self) -> Self {
        self.ttl = true;
        self
    }
}

impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UPDATE {}", self.table)?;
        if self.ttl {
            f.write_str(" USING TTL ?")?;
        }
        for (i, assignment) in self.assignments.iter().enumerate() {
            let kw = if i == 0 { " SET" } else { "," };
            match assignment {
                Assignment::Set(c) => write!(f, "{kw} {c} = ?")?,
                Assignment::MapPut(c) => write!(f, "{kw} {c}[?] = ?")?,
            }
        }
        write_where(f, &self.filters)
    }
}

/// What a `DELETE` removes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DeleteTarget {
    /// The row, or the whole partition when only the partition key is bound.
    Row,
    /// `DELETE col[?]`: a single map entry; the key is bound first.
    MapEntry(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Delete {
    pub table: String,
    pub target: DeleteTarget,
    pub filters: Vec<Filter>,
}

impl Delete {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            target: DeleteTarget::Row,
            filters: Vec::new(),
        }
    }

    pub fn map_entry(mut self, column: impl Into<String>) -> Self {
        self.target = DeleteTarget::MapEntry(column.into());
        self
    }

    pub fn where_eq(mut self, column: impl Into<String>) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            op: CmpOp::Eq,
        });
        self
    }
}

impl fmt::Display for Delete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            DeleteTarget::Row => write!(f, "DELETE FROM {}", self.table)?,
            DeleteTarget::MapEntry(c) => write!(f, "DELETE {c}[?] FROM {}", self.table)?,
        }
        write_where(f, &self.filters)
    }
}

/// Any statement the store accepts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Statement {
    CreateTable(TableSchema),
    CreateIndex { table: String, column: String },
    DropTable(String),
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
}

impl Statement {
    /// Table the statement operates on.
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable(schema) => &schema.name,
            Self::CreateIndex { table, .. } | Self::DropTable(table) => table,
            Self::Select(s) => &s.table,
            Self::Insert(s) => &s.table,
            Self::Update(s) => &s.table,
            Self::Delete(s) => &s.table,
        }
    }

    /// Schema changes are executed unprepared.
    pub fn is_ddl(&self) -> bool {
        matches!(
            self,
            Self::CreateTable(_) | Self::CreateIndex { .. } | Self::DropTable(_)
        )
    }

    pub fn is_write(&self) -> bool {
        matches!(self, Self::Insert(_) | Self::Update(_) | Self::Delete(_))
    }

    /// Number of `?` markers.
    pub fn bind_count(&self) -> usize {
        match self {
            Self::CreateTable(_) | Self::CreateIndex { .. } | Self::DropTable(_) => 0,
            Self::Select(s) => s.filters.len(),
            Self::Insert(s) => s.columns.len() + usize::from(s.ttl),
            Self::Update(s) => {
                let assigned: usize = s
                    .assignments
                    .iter()
                    .map(|a| match a {
                        Assignment::Set(_) => 1,
                        Assignment::MapPut(_) => 2,
                    })
                    .sum();
                usize::from(s.ttl) + assigned + s.filters.len()
            }
            Self::Delete(s) => {
                usize::from(matches!(s.target, DeleteTarget::MapEntry(_))) + s.filters.len()
            }
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateTable(schema) => schema.fmt(f),
            Self::CreateIndex { table, column } => write!(f, "CREATE INDEX ON {table} ({column})"),
            Self::DropTable(table) => write!(f, "DROP TABLE {table}"),
            Self::Select(s) => s.fmt(f),
            Self::Insert(s) => s.fmt(f),
            Self::Update(s) => s.fmt(f),
            Self::Delete(s) => s.fmt(f),
        }
    }
}

impl From<Select> for Statement {
    fn from(s: Select) -> Self {
        Self::Select(s)
    }
}

impl From<Insert> for Statement {
    fn from(s: Insert) -> Self {
        Self::Insert(s)
    }
}

impl From<Update> for Statement {
    fn from(s: Update) -> Self {
        Self::Update(s)
    }
}

impl From<Delete> for Statement {
    fn from(s: Delete) -> Self {
        Self::Delete(s)
    }
}

impl From<TableSchema> for Statement {
    fn from(s: TableSchema) -> Self {
        Self::CreateTable(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_create_table() {
        let schema = TableSchema::new("events")
            .column("series", ColumnType::Text)
            .column("period", ColumnType::Int)
            .column("time", ColumnType::TimeUuid)
            .column("data", ColumnType::Text)
            .partition_key(["series", "period"])
            .clustering_key(["time"])
            .clustering_order(Order::Desc);
        assert_eq!(
            schema.to_string(),
            "CREATE TABLE events (series text, period int, time timeuuid, data text, \
             PRIMARY KEY ((series, period), time)) WITH CLUSTERING ORDER BY (time DESC)"
        );
    }

    #[test]
    fn renders_select() {
        let s = Select::new("events")
            .columns(["time", "data"])
            .where_eq("series")
            .where_eq("period")
            .filter("time", CmpOp::Gt)
            .filter("time", CmpOp::Lt)
            .order_by("time", Order::Asc)
            .limit(10);
        assert_eq!(
            s.to_string(),
            "SELECT time, data FROM events WHERE series = ? AND period = ? AND time > ? \
             AND time < ? ORDER BY time ASC LIMIT 10"
        );
        assert_eq!(Statement::from(s).bind_count(), 4);
    }

    #[test]
    fn renders_writes_and_counts_markers() {
        let insert = Insert::new("kv").columns(["k", "v"]).with_ttl();
        assert_eq!(insert.to_string(), "INSERT INTO kv (k, v) VALUES (?, ?) USING TTL ?");
        assert_eq!(Statement::from(insert).bind_count(), 3);

        let update = Update::new("node").with_ttl().put("values").set("status").where_eq("path");
        assert_eq!(
            update.to_string(),
            "UPDATE node USING TTL ? SET values[?] = ?, status = ? WHERE path = ?"
        );
        assert_eq!(Statement::from(update).bind_count(), 5);

        let delete = Delete::new("node").map_entry("values").where_eq("path");
        assert_eq!(delete.to_string(), "DELETE values[?] FROM node WHERE path = ?");
        assert_eq!(Statement::from(delete).bind_count(), 2);
    }

    #[test]
    fn ddl_classification() {
        let idx = Statement::CreateIndex {
            table: "node".into(),
            column: "status".into(),
        };
        assert!(idx.is_ddl());
        assert_eq!(idx.to_string(), "CREATE INDEX ON node (status)");
        assert!(!Statement::from(Select::new("node")).is_ddl());
        assert!(Statement::from(Delete::new("node")).is_write());
    }
}
