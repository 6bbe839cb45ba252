//! Time-series table layouts.

use m2db_store::{ColumnType, Order, TableDefinition, TableSchema};

/// Event rows: `(series, period)` partition, newest `time` first.
pub const EVENTS_TABLE: &str = "timeseries";

/// Period index: `series` partition, clustered by `period`.
pub const PERIOD_INDEX_TABLE: &str = "timeseries_index";

pub fn events_definition() -> TableDefinition {
    TableDefinition::new(EVENTS_TABLE).change(
        1,
        TableSchema::new(EVENTS_TABLE)
            .column("series", ColumnType::Text)
            .column("period", ColumnType::Int)
            .column("time", ColumnType::TimeUuid)
            .column("id", ColumnType::Text)
            .column("type", ColumnType::Text)
            .column("data", ColumnType::Text)
            .partition_key(["series", "period"])
            .clustering_key(["time"])
            .clustering_order(Order::Desc),
    )
}

pub fn period_index_definition() -> TableDefinition {
    TableDefinition::new(PERIOD_INDEX_TABLE).change(
        1,
        TableSchema::new(PERIOD_INDEX_TABLE)
            .column("series", ColumnType::Text)
            .column("period", ColumnType::Int)
            .partition_key(["series"])
            .clustering_key(["period"]),
    )
}

pub fn definitions() -> Vec<TableDefinition> {
    vec![events_definition(), period_index_definition()]
}
