//! Registry table layouts.

use m2db_store::{ColumnType, Statement, TableDefinition, TableSchema};

/// Node rows: `path` partition, `status` code, `values` property map.
pub const NODE_TABLE: &str = "registry_node";

/// Child index: `path` partition of the parent, clustered by child `name`.
pub const CHILDREN_TABLE: &str = "registry_node_children";

/// Block rows owned by nodes: `(path, block)` key, `data` blob.
pub const DATA_TABLE: &str = "registry_node_data";

pub fn node_definition() -> TableDefinition {
    TableDefinition::new(NODE_TABLE)
        .change(
            1,
            TableSchema::new(NODE_TABLE)
                .column("path", ColumnType::Text)
                .column("values", ColumnType::TextMap)
                .column("status", ColumnType::Int)
                .partition_key(["path"]),
        )
        .change(
            2,
            TableSchema::new(CHILDREN_TABLE)
                .column("path", ColumnType::Text)
                .column("name", ColumnType::Text)
                .partition_key(["path"])
                .clustering_key(["name"]),
        )
        .change(
            3,
            Statement::CreateIndex {
                table: NODE_TABLE.into(),
                column: "status".into(),
            },
        )
}

pub fn data_definition() -> TableDefinition {
    TableDefinition::new(DATA_TABLE).change(
        1,
        TableSchema::new(DATA_TABLE)
            .column("path", ColumnType::Text)
            .column("block", ColumnType::Int)
            .column("data", ColumnType::Blob)
            .partition_key(["path"])
            .clustering_key(["block"]),
    )
}

/// Every table the registry and the block rows it owns need, in order.
pub fn definitions() -> Vec<TableDefinition> {
    vec![node_definition(), data_definition()]
}
