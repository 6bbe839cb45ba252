use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, trace};

use crate::error::{StoreError, StoreResult};
use crate::prepared::{BoundStatement, PreparedStatement, StatementId};
use crate::row::{Row, Rows};
use crate::statement::{
    Assignment, CmpOp, Delete, DeleteTarget, Filter, Insert, Order, Select, Statement,
    TableSchema, Update,
};
use crate::traits::DataStore;
use crate::value::{ColumnType, Value};

/// Partition or clustering key: the key column values in declaration order.
type Key = Vec<Value>;

#[derive(Clone, Debug)]
struct Expiring<T> {
    value: T,
    /// Virtual-clock millisecond at which the cell stops being visible.
    expires_at: Option<i64>,
}

impl<T> Expiring<T> {
    fn live(&self, now: i64) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Clone, Debug)]
enum Cell {
    Scalar(Expiring<Value>),
    Map(BTreeMap<String, Expiring<String>>),
}

#[derive(Clone, Debug, Default)]
struct StoredRow {
    /// Set by `INSERT`; keeps a row visible even when it has no live cells.
    marker: bool,
    cells: HashMap<String, Cell>,
}

impl StoredRow {
    fn is_live(&self, now: i64) -> bool {
        self.marker
            || self.cells.values().any(|cell| match cell {
                Cell::Scalar(c) => c.live(now),
                Cell::Map(m) => m.values().any(|e| e.live(now)),
            })
    }

    fn read(&self, column: &str, now: i64) -> Value {
        match self.cells.get(column) {
            Some(Cell::Scalar(c)) if c.live(now) => c.value.clone(),
            Some(Cell::Map(m)) => {
                let live: BTreeMap<String, String> = m
                    .iter()
                    .filter(|(_, e)| e.live(now))
                    .map(|(k, e)| (k.clone(), e.value.clone()))
                    .collect();
                if live.is_empty() {
                    Value::Null
                } else {
                    Value::Map(live)
                }
            }
            _ => Value::Null,
        }
    }

    fn write(&mut self, column: &str, value: Value, expires_at: Option<i64>) {
        match value {
            Value::Null => {
                self.cells.remove(column);
            }
            Value::Map(entries) => {
                let cell = entries
                    .into_iter()
                    .map(|(k, v)| (k, Expiring { value: v, expires_at }))
                    .collect();
                self.cells.insert(column.to_string(), Cell::Map(cell));
            }
            scalar => {
                self.cells.insert(
                    column.to_string(),
                    Cell::Scalar(Expiring {
                        value: scalar,
                        expires_at,
                    }),
                );
            }
        }
    }

    fn put_entry(&mut self, column: &str, key: String, value: Option<String>, expires_at: Option<i64>) {
        let cell = self
            .cells
            .entry(column.to_string())
            .or_insert_with(|| Cell::Map(BTreeMap::new()));
        if let Cell::Scalar(_) = cell {
            *cell = Cell::Map(BTreeMap::new());
        }
        if let Cell::Map(entries) = cell {
            match value {
                Some(value) => {
                    entries.insert(key, Expiring { value, expires_at });
                }
                None => {
                    entries.remove(&key);
                }
            }
        }
    }
}

struct Table {
    schema: TableSchema,
    indexed: HashSet<String>,
    partitions: HashMap<Key, BTreeMap<Key, StoredRow>>,
}

impl Table {
    fn column_type(&self, column: &str) -> StoreResult<ColumnType> {
        self.schema
            .column_type(column)
            .ok_or_else(|| StoreError::UnknownColumn {
                table: self.schema.name.clone(),
                column: column.to_string(),
            })
    }

    fn check(&self, column: &str, value: &Value) -> StoreResult<()> {
        let expected = self.column_type(column)?;
        if value.fits(expected) {
            Ok(())
        } else {
            Err(StoreError::TypeMismatch {
                column: column.to_string(),
                expected,
                actual: value.type_name(),
            })
        }
    }

    /// Every column of a stored row, key columns first, in schema order.
    fn materialize(&self, pk: &Key, ck: &Key, row: &StoredRow, now: i64) -> Vec<(String, Value)> {
        self.schema
            .columns
            .iter()
            .map(|(name, _)| {
                let value = if let Some(i) = self.schema.partition_key.iter().position(|c| c == name) {
                    pk[i].clone()
                } else if let Some(i) = self.schema.clustering_key.iter().position(|c| c == name) {
                    ck[i].clone()
                } else {
                    row.read(name, now)
                };
                (name.clone(), value)
            })
            .collect()
    }

    fn remove_empty(&mut self, pk: &Key) {
        if self.partitions.get(pk).is_some_and(BTreeMap::is_empty) {
            self.partitions.remove(pk);
        }
    }
}

/// Positional cursor over bound values.
struct Binds<'a> {
    values: &'a [Value],
    pos: usize,
}

impl<'a> Binds<'a> {
    fn new(values: &'a [Value]) -> Self {
        Self { values, pos: 0 }
    }

    fn next(&mut self) -> StoreResult<Value> {
        let value = self.values.get(self.pos).cloned().ok_or(StoreError::BindCount {
            expected: self.pos + 1,
            actual: self.values.len(),
        })?;
        self.pos += 1;
        Ok(value)
    }

    fn filters(&mut self, table: &Table, filters: &'a [Filter]) -> StoreResult<Vec<(&'a Filter, Value)>> {
        filters
            .iter()
            .map(|f| {
                let v = self.next()?;
                table.check(&f.column, &v)?;
                Ok((f, v))
            })
            .collect()
    }

    fn ttl(&mut self, now: i64) -> StoreResult<Option<i64>> {
        match self.next()? {
            Value::Null | Value::Int(0) => Ok(None),
            Value::Int(secs) if secs > 0 => Ok(Some(now + i64::from(secs) * 1000)),
            Value::Int(secs) => Err(StoreError::InvalidQuery(format!("negative TTL {secs}"))),
            other => Err(StoreError::TypeMismatch {
                column: "[ttl]".into(),
                expected: ColumnType::Int,
                actual: other.type_name(),
            }),
        }
    }
}

/// Key built from equality filters, `None` if any key column is unbound.
fn exact_key(columns: &[String], bound: &[(&Filter, Value)]) -> Option<Key> {
    columns
        .iter()
        .map(|col| {
            bound
                .iter()
                .find(|(f, _)| &f.column == col && f.op == CmpOp::Eq)
                .map(|(_, v)| v.clone())
        })
        .collect()
}

fn satisfies(op: CmpOp, cell: &Value, bound: &Value) -> bool {
    if cell.is_null() {
        return false;
    }
    match op {
        CmpOp::Eq => cell == bound,
        CmpOp::Lt => cell < bound,
        CmpOp::Le => cell <= bound,
        CmpOp::Gt => cell > bound,
        CmpOp::Ge => cell >= bound,
    }
}

/// Writes must pin down the full primary key with equality filters.
fn full_key(table: &Table, bound: &[(&Filter, Value)]) -> StoreResult<(Key, Key)> {
    if let Some((f, _)) = bound
        .iter()
        .find(|(f, _)| f.op != CmpOp::Eq || !table.schema.is_primary_key(&f.column))
    {
        return Err(StoreError::InvalidQuery(format!(
            "writes restrict primary key columns by equality only, got {} {}",
            f.column, f.op
        )));
    }
    let pk = exact_key(&table.schema.partition_key, bound);
    let ck = exact_key(&table.schema.clustering_key, bound);
    match (pk, ck) {
        (Some(pk), Some(ck)) => Ok((pk, ck)),
        _ => Err(StoreError::InvalidQuery(format!(
            "missing primary key restriction on {}",
            table.schema.name
        ))),
    }
}

#[derive(Default)]
struct Inner {
    tables: HashMap<String, Table>,
    prepared: HashMap<StatementId, String>,
    next_id: u64,
    failing_writes: HashSet<String>,
}

impl Inner {
    fn table(&self, name: &str) -> StoreResult<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| StoreError::UnknownTable(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> StoreResult<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| StoreError::UnknownTable(name.to_string()))
    }

    fn check_prepared(&self, bound: &BoundStatement) -> StoreResult<()> {
        let prepared = bound.prepared();
        match self.prepared.get(&prepared.id()) {
            Some(cql) if cql == prepared.cql() => Ok(()),
            _ => Err(StoreError::UnknownStatement(prepared.id())),
        }
    }

    fn select(&self, s: &Select, values: &[Value], now: i64) -> StoreResult<Rows> {
        let table = self.table(&s.table)?;
        let bound = Binds::new(values).filters(table, &s.filters)?;
        let schema = &table.schema;

        let mut uses_index = false;
        for (f, _) in &bound {
            if schema.is_partition_key(&f.column) && f.op != CmpOp::Eq {
                return Err(StoreError::InvalidQuery(format!(
                    "partition key column {} only supports equality",
                    f.column
                )));
            }
            if !schema.is_primary_key(&f.column) {
                if f.op != CmpOp::Eq || !table.indexed.contains(&f.column) {
                    return Err(StoreError::InvalidQuery(format!(
                        "column {} is neither a key nor indexed",
                        f.column
                    )));
                }
                uses_index = true;
            }
        }

        let pk = exact_key(&schema.partition_key, &bound);
        let mut partitions: Vec<(&Key, &BTreeMap<Key, StoredRow>)> = match &pk {
            Some(pk) => table.partitions.get_key_value(pk).into_iter().collect(),
            None if bound.is_empty() || uses_index => table.partitions.iter().collect(),
            None => {
                return Err(StoreError::InvalidQuery(format!(
                    "select on {} needs the partition key or an indexed column",
                    schema.name
                )))
            }
        };
        partitions.sort_by(|a, b| a.0.cmp(b.0));

        let direction = match &s.order_by {
            None => schema.clustering_order,
            Some((column, order)) => {
                if pk.is_none() || schema.clustering_key.first() != Some(column) {
                    return Err(StoreError::InvalidQuery(format!(
                        "ORDER BY {column} needs a restricted partition and the first clustering column"
                    )));
                }
                *order
            }
        };

        let mut out = Vec::new();
        'scan: for (pk, rows) in partitions {
            let ordered: Box<dyn Iterator<Item = (&Key, &StoredRow)>> = match direction {
                Order::Asc => Box::new(rows.iter()),
                Order::Desc => Box::new(rows.iter().rev()),
            };
            for (ck, row) in ordered {
                if !row.is_live(now) {
                    continue;
                }
                let cells = table.materialize(pk, ck, row, now);
                let keep = bound.iter().all(|(f, v)| {
                    cells
                        .iter()
                        .find(|(name, _)| name == &f.column)
                        .is_some_and(|(_, cell)| satisfies(f.op, cell, v))
                });
                if !keep {
                    continue;
                }
                let projected = if s.columns.is_empty() {
                    cells
                } else {
                    s.columns
                        .iter()
                        .map(|c| {
                            let v = cells
                                .iter()
                                .find(|(name, _)| name == c)
                                .map_or(Value::Null, |(_, v)| v.clone());
                            (c.clone(), v)
                        })
                        .collect()
                };
                out.push(Row::new(projected));
                if s.limit.is_some_and(|limit| out.len() >= limit) {
                    break 'scan;
                }
            }
        }
        Ok(Rows::new(out))
    }

    fn insert(&mut self, s: &Insert, values: &[Value], now: i64) -> StoreResult<()> {
        let table = self.table_mut(&s.table)?;
        let mut binds = Binds::new(values);
        let mut assigned = Vec::with_capacity(s.columns.len());
        for column in &s.columns {
            let v = binds.next()?;
            table.check(column, &v)?;
            assigned.push((column.as_str(), v));
        }
        let expires_at = if s.ttl { binds.ttl(now)? } else { None };

        let key_of = |columns: &[String]| -> StoreResult<Key> {
            columns
                .iter()
                .map(|col| {
                    assigned
                        .iter()
                        .find(|(c, v)| *c == col && !v.is_null())
                        .map(|(_, v)| v.clone())
                        .ok_or_else(|| {
                            StoreError::InvalidQuery(format!("missing key column {col} in insert"))
                        })
                })
                .collect()
        };
        let pk = key_of(&table.schema.partition_key)?;
        let ck = key_of(&table.schema.clustering_key)?;

        let schema = table.schema.clone();
        let row = table.partitions.entry(pk).or_default().entry(ck).or_default();
        row.marker = true;
        for (column, v) in assigned {
            if !schema.is_primary_key(column) {
                row.write(column, v, expires_at);
            }
        }
        Ok(())
    }

    fn update(&mut self, s: &Update, values: &[Value], now: i64) -> StoreResult<()> {
        let table = self.table_mut(&s.table)?;
        let mut binds = Binds::new(values);
        let expires_at = if s.ttl { binds.ttl(now)? } else { None };

        enum Change {
            Set(String, Value),
            Put(String, String, Option<String>),
        }
        let mut changes = Vec::with_capacity(s.assignments.len());
        for assignment in &s.assignments {
            match assignment {
                Assignment::Set(column) => {
                    if table.schema.is_primary_key(column) {
                        return Err(StoreError::InvalidQuery(format!(
                            "cannot update primary key column {column}"
                        )));
                    }
                    let v = binds.next()?;
                    table.check(column, &v)?;
                    changes.push(Change::Set(column.clone(), v));
                }
                Assignment::MapPut(column) => {
                    let expected = table.column_type(column)?;
                    let (key, value) = (binds.next()?, binds.next()?);
                    let mismatch = |actual: &Value| StoreError::TypeMismatch {
                        column: column.clone(),
                        expected,
                        actual: actual.type_name(),
                    };
                    if expected != ColumnType::TextMap {
                        return Err(mismatch(&key));
                    }
                    let key = match key {
                        Value::Text(k) => k,
                        other => return Err(mismatch(&other)),
                    };
                    let value = match value {
                        Value::Text(v) => Some(v),
                        Value::Null => None,
                        other => return Err(mismatch(&other)),
                    };
                    changes.push(Change::Put(column.clone(), key, value));
                }
            }
        }
        let bound = binds.filters(table, &s.filters)?;
        let (pk, ck) = full_key(table, &bound)?;

        let row = table.partitions.entry(pk).or_default().entry(ck).or_default();
        for change in changes {
            match change {
                Change::Set(column, v) => row.write(&column, v, expires_at),
                Change::Put(column, key, value) => row.put_entry(&column, key, value, expires_at),
            }
        }
        Ok(())
    }

    fn delete(&mut self, s: &Delete, values: &[Value]) -> StoreResult<()> {
        let table = self.table_mut(&s.table)?;
        let mut binds = Binds::new(values);
        let entry_key = match &s.target {
            DeleteTarget::MapEntry(column) => match binds.next()? {
                Value::Text(k) => Some((column.clone(), k)),
                other => {
                    return Err(StoreError::TypeMismatch {
                        column: column.clone(),
                        expected: ColumnType::Text,
                        actual: other.type_name(),
                    })
                }
            },
            DeleteTarget::Row => None,
        };
        let bound = binds.filters(table, &s.filters)?;

        let clustering_bound = bound
            .iter()
            .any(|(f, _)| table.schema.is_clustering_key(&f.column));
        if !clustering_bound && entry_key.is_none() && !table.schema.clustering_key.is_empty() {
            // Partition delete.
            if let Some((f, _)) = bound
                .iter()
                .find(|(f, _)| f.op != CmpOp::Eq || !table.schema.is_partition_key(&f.column))
            {
                return Err(StoreError::InvalidQuery(format!(
                    "partition delete restricts partition key columns only, got {}",
                    f.column
                )));
            }
            let pk = exact_key(&table.schema.partition_key, &bound).ok_or_else(|| {
                StoreError::InvalidQuery(format!("missing partition key on {}", table.schema.name))
            })?;
            table.partitions.remove(&pk);
            return Ok(());
        }

        let (pk, ck) = full_key(table, &bound)?;
        if let Some(rows) = table.partitions.get_mut(&pk) {
            match entry_key {
                Some((column, key)) => {
                    if let Some(row) = rows.get_mut(&ck) {
                        row.put_entry(&column, key, None, None);
                    }
                }
                None => {
                    rows.remove(&ck);
                }
            }
        }
        table.remove_empty(&pk);
        Ok(())
    }

    fn create_table(&mut self, schema: &TableSchema) -> StoreResult<()> {
        if self.tables.contains_key(&schema.name) {
            return Err(StoreError::AlreadyExists(schema.name.clone()));
        }
        if schema.partition_key.is_empty() {
            return Err(StoreError::InvalidQuery(format!(
                "table {} has no partition key",
                schema.name
            )));
        }
        for key in schema.partition_key.iter().chain(&schema.clustering_key) {
            match schema.column_type(key) {
                None => {
                    return Err(StoreError::UnknownColumn {
                        table: schema.name.clone(),
                        column: key.clone(),
                    })
                }
                Some(ColumnType::TextMap) => {
                    return Err(StoreError::InvalidQuery(format!(
                        "collection column {key} cannot be part of the primary key"
                    )))
                }
                Some(_) => {}
            }
        }
        self.tables.insert(
            schema.name.clone(),
            Table {
                schema: schema.clone(),
                indexed: HashSet::new(),
                partitions: HashMap::new(),
            },
        );
        Ok(())
    }

    fn create_index(&mut self, table: &str, column: &str) -> StoreResult<()> {
        let t = self.table_mut(table)?;
        t.column_type(column)?;
        if t.schema.is_partition_key(column) {
            return Err(StoreError::InvalidQuery(format!(
                "cannot index partition key column {column}"
            )));
        }
        if !t.indexed.insert(column.to_string()) {
            return Err(StoreError::AlreadyExists(format!("index on {table}.{column}")));
        }
        Ok(())
    }

    fn validate(&self, statement: &Statement) -> StoreResult<()> {
        let table = self.table(statement.table())?;
        let mut columns: Vec<&str> = Vec::new();
        match statement {
            Statement::Select(s) => {
                columns.extend(s.columns.iter().map(String::as_str));
                columns.extend(s.filters.iter().map(|f| f.column.as_str()));
                columns.extend(s.order_by.iter().map(|(c, _)| c.as_str()));
            }
            Statement::Insert(s) => columns.extend(s.columns.iter().map(String::as_str)),
            Statement::Update(s) => {
                columns.extend(s.assignments.iter().map(|a| match a {
                    Assignment::Set(c) | Assignment::MapPut(c) => c.as_str(),
                }));
                columns.extend(s.filters.iter().map(|f| f.column.as_str()));
            }
            Statement::Delete(s) => {
                if let DeleteTarget::MapEntry(c) = &s.target {
                    columns.push(c);
                }
                columns.extend(s.filters.iter().map(|f| f.column.as_str()));
            }
            _ => {
                return Err(StoreError::InvalidQuery(
                    "schema changes are executed unprepared".into(),
                ))
            }
        }
        for column in columns {
            table.column_type(column)?;
        }
        Ok(())
    }
}

/// In-memory partitioned wide-column store.
///
/// Intended for tests and embedding. Models the access rules of a
/// Cassandra-style backend closely enough that code written against it
/// issues only partition-bounded queries: single-partition lookups and
/// clustering ranges, equality on secondarily indexed columns, per-cell
/// TTL, single map-entry writes and whole-partition deletes.
///
/// Expiry is judged against a virtual clock that tests can move forward
/// with [`advance_clock`](Self::advance_clock), and writes to a table can be
/// made to fail with [`fail_writes_to`](Self::fail_writes_to).
pub struct MemoryStore {
    inner: RwLock<Inner>,
    clock_offset_ms: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            clock_offset_ms: AtomicI64::new(0),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis() + self.clock_offset_ms.load(AtomicOrdering::SeqCst)
    }

    /// Move the virtual clock used for TTL expiry forward.
    pub fn advance_clock(&self, by: Duration) {
        let ms = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.clock_offset_ms.fetch_add(ms, AtomicOrdering::SeqCst);
    }

    /// Make every subsequent write to `table` fail with `Unavailable`.
    pub fn fail_writes_to(&self, table: &str) {
        self.write().failing_writes.insert(table.to_string());
    }

    pub fn restore_writes_to(&self, table: &str) {
        self.write().failing_writes.remove(table);
    }

    /// Number of live rows in `table` (0 for unknown tables).
    pub fn row_count(&self, table: &str) -> usize {
        let now = self.now_ms();
        let inner = self.read();
        inner.tables.get(table).map_or(0, |t| {
            t.partitions
                .values()
                .flat_map(BTreeMap::values)
                .filter(|row| row.is_live(now))
                .count()
        })
    }

    /// Number of partitions holding at least one stored row.
    pub fn partition_count(&self, table: &str) -> usize {
        self.read()
            .tables
            .get(table)
            .map_or(0, |t| t.partitions.values().filter(|p| !p.is_empty()).count())
    }

    /// Number of statements prepared so far.
    pub fn prepared_count(&self) -> usize {
        self.read().prepared.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.read();
        f.debug_struct("MemoryStore")
            .field("tables", &inner.tables.len())
            .field("prepared", &inner.prepared.len())
            .finish()
    }
}

impl DataStore for MemoryStore {
    fn prepare(&self, statement: &Statement) -> StoreResult<PreparedStatement> {
        let mut inner = self.write();
        inner.validate(statement)?;
        inner.next_id += 1;
        let id = StatementId(inner.next_id);
        let prepared = PreparedStatement::new(id, statement.clone());
        inner.prepared.insert(id, prepared.cql().to_string());
        debug!(id = %id, cql = prepared.cql(), "statement prepared");
        Ok(prepared)
    }

    fn execute(&self, bound: &BoundStatement) -> StoreResult<Rows> {
        let now = self.now_ms();
        let statement = bound.statement();
        trace!(
            cql = bound.prepared().cql(),
            consistency = ?bound.consistency(),
            "execute"
        );
        if let Statement::Select(s) = statement {
            let inner = self.read();
            inner.check_prepared(bound)?;
            return inner.select(s, bound.values(), now);
        }

        let mut inner = self.write();
        inner.check_prepared(bound)?;
        if inner.failing_writes.contains(statement.table()) {
            return Err(StoreError::Unavailable(statement.table().to_string()));
        }
        match statement {
            Statement::Insert(s) => inner.insert(s, bound.values(), now)?,
            Statement::Update(s) => inner.update(s, bound.values(), now)?,
            Statement::Delete(s) => inner.delete(s, bound.values())?,
            _ => {
                return Err(StoreError::InvalidQuery(
                    "schema changes are executed unprepared".into(),
                ))
            }
        }
        Ok(Rows::default())
    }

    fn execute_unprepared(&self, statement: &Statement) -> StoreResult<()> {
        let mut inner = self.write();
        match statement {
            Statement::CreateTable(schema) => inner.create_table(schema)?,
            Statement::CreateIndex { table, column } => inner.create_index(table, column)?,
            Statement::DropTable(table) => {
                inner
                    .tables
                    .remove(table)
                    .ok_or_else(|| StoreError::UnknownTable(table.clone()))?;
            }
            _ => {
                return Err(StoreError::InvalidQuery(
                    "data statements must be prepared".into(),
                ))
            }
        }
        debug!(ddl = %statement, "schema changed");
        Ok(())
    }

    fn table_exists(&self, table: &str) -> StoreResult<bool> {
        Ok(self.read().tables.contains_key(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---------------------------------------------------------------------
    // Fixtures
    // ---------------------------------------------------------------------

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .execute_unprepared(
                &TableSchema::new("events")
                    .column("series", ColumnType::Text)
                    .column("seq", ColumnType::Int)
                    .column("data", ColumnType::Text)
                    .column("tags", ColumnType::TextMap)
                    .partition_key(["series"])
                    .clustering_key(["seq"])
                    .clustering_order(Order::Desc)
                    .into(),
            )
            .unwrap();
        store
    }

    fn run(store: &MemoryStore, statement: impl Into<Statement>, values: Vec<Value>) -> StoreResult<Rows> {
        let prepared = store.prepare(&statement.into())?;
        store.execute(&prepared.bind(values)?)
    }

    fn insert(store: &MemoryStore, series: &str, seq: i32, data: &str) {
        run(
            store,
            Insert::new("events").columns(["series", "seq", "data"]),
            vec![series.into(), seq.into(), data.into()],
        )
        .unwrap();
    }

    fn seqs(rows: &Rows) -> Vec<i32> {
        rows.iter().map(|r| r.int("seq").unwrap().unwrap()).collect()
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    #[test]
    fn partition_lookup_uses_clustering_order() {
        let s = store();
        for seq in [2, 5, 1] {
            insert(&s, "a", seq, "x");
        }
        insert(&s, "b", 9, "y");
        let rows = run(&s, Select::new("events").where_eq("series"), vec!["a".into()]).unwrap();
        assert_eq!(seqs(&rows), [5, 2, 1]);
    }

    #[test]
    fn clustering_range_and_order_by() {
        let s = store();
        for seq in 1..=10 {
            insert(&s, "a", seq, "x");
        }
        let select = Select::new("events")
            .where_eq("series")
            .filter("seq", CmpOp::Gt)
            .filter("seq", CmpOp::Lt)
            .order_by("seq", Order::Asc)
            .limit(3);
        let rows = run(&s, select, vec!["a".into(), 3.into(), 9.into()]).unwrap();
        assert_eq!(seqs(&rows), [4, 5, 6]);
    }

    #[test]
    fn missing_partition_is_empty_not_error() {
        let s = store();
        let rows = run(&s, Select::new("events").where_eq("series"), vec!["nope".into()]).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn non_key_filter_requires_index() {
        let s = store();
        insert(&s, "a", 1, "hit");
        insert(&s, "b", 2, "miss");
        let select = Select::new("events").columns(["series"]).where_eq("data");
        assert!(matches!(
            run(&s, select.clone(), vec!["hit".into()]),
            Err(StoreError::InvalidQuery(_))
        ));
        s.execute_unprepared(&Statement::CreateIndex {
            table: "events".into(),
            column: "data".into(),
        })
        .unwrap();
        let rows = run(&s, select, vec!["hit".into()]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.first().unwrap().text("series").unwrap().as_deref(), Some("a"));
    }

    // ---------------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------------

    #[test]
    fn map_entries_are_individually_writable() {
        let s = store();
        insert(&s, "a", 1, "x");
        let put = Update::new("events").put("tags").where_eq("series").where_eq("seq");
        run(&s, put.clone(), vec!["k1".into(), "v1".into(), "a".into(), 1.into()]).unwrap();
        run(&s, put, vec!["k2".into(), "v2".into(), "a".into(), 1.into()]).unwrap();
        let del = Delete::new("events").map_entry("tags").where_eq("series").where_eq("seq");
        run(&s, del, vec!["k1".into(), "a".into(), 1.into()]).unwrap();

        let rows = run(&s, Select::new("events").columns(["tags"]).where_eq("series"), vec!["a".into()]).unwrap();
        let tags = rows.first().unwrap().map("tags").unwrap().unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get("k2").map(String::as_str), Some("v2"));
    }

    #[test]
    fn ttl_expires_cells_and_rows() {
        let s = store();
        let put = Update::new("events")
            .with_ttl()
            .put("tags")
            .where_eq("series")
            .where_eq("seq");
        run(&s, put, vec![10.into(), "k".into(), "v".into(), "a".into(), 1.into()]).unwrap();
        assert_eq!(s.row_count("events"), 1);
        s.advance_clock(Duration::from_secs(11));
        // Update-created rows carry no marker and vanish with their last cell.
        assert_eq!(s.row_count("events"), 0);
    }

    #[test]
    fn partition_and_row_deletes() {
        let s = store();
        for seq in 1..=3 {
            insert(&s, "a", seq, "x");
        }
        insert(&s, "b", 1, "y");
        run(&s, Delete::new("events").where_eq("series").where_eq("seq"), vec!["a".into(), 2.into()]).unwrap();
        assert_eq!(s.row_count("events"), 3);
        run(&s, Delete::new("events").where_eq("series"), vec!["a".into()]).unwrap();
        assert_eq!(s.row_count("events"), 1);
        assert_eq!(s.partition_count("events"), 1);
    }

    #[test]
    fn type_checks_bound_values() {
        let s = store();
        let err = run(
            &s,
            Insert::new("events").columns(["series", "seq"]),
            vec!["a".into(), "not-an-int".into()],
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::TypeMismatch { ref column, .. } if column == "seq"));
    }

    #[test]
    fn insert_requires_full_primary_key() {
        let s = store();
        let err = run(&s, Insert::new("events").columns(["series"]), vec!["a".into()]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidQuery(_)));
    }

    #[test]
    fn failing_writes_are_reported() {
        let s = store();
        s.fail_writes_to("events");
        let err = run(
            &s,
            Insert::new("events").columns(["series", "seq"]),
            vec!["a".into(), 1.into()],
        )
        .unwrap_err();
        assert_eq!(err, StoreError::Unavailable("events".into()));
        s.restore_writes_to("events");
        insert(&s, "a", 1, "x");
    }

    // ---------------------------------------------------------------------
    // Schema
    // ---------------------------------------------------------------------

    #[test]
    fn ddl_is_not_idempotent_by_itself() {
        let s = store();
        let again = TableSchema::new("events")
            .column("series", ColumnType::Text)
            .partition_key(["series"]);
        assert!(matches!(
            s.execute_unprepared(&again.into()),
            Err(StoreError::AlreadyExists(_))
        ));
        assert!(s.table_exists("events").unwrap());
        assert!(!s.table_exists("other").unwrap());
    }

    #[test]
    fn prepare_validates_references() {
        let s = store();
        assert!(matches!(
            s.prepare(&Select::new("nope").into()),
            Err(StoreError::UnknownTable(_))
        ));
        assert!(matches!(
            s.prepare(&Select::new("events").where_eq("bogus").into()),
            Err(StoreError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn foreign_statement_ids_are_rejected() {
        let a = store();
        let b = store();
        let prepared = a.prepare(&Select::new("events").where_eq("series").into()).unwrap();
        let bound = prepared.bind(vec!["x".into()]).unwrap();
        // Different store, never prepared there under that id and text.
        b.prepare(&Insert::new("events").columns(["series", "seq"]).into()).unwrap();
        assert!(matches!(b.execute(&bound), Err(StoreError::UnknownStatement(_))));
    }
}
