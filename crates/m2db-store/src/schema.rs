//! Versioned, idempotent table provisioning.
//!
//! Each logical table carries an ordered list of additive changes tagged with
//! increasing versions. The last applied version is kept in the
//! `general_settings` table under `table_version_<name>`, so re-running
//! provisioning only executes what is new.

use tracing::{info, warn};

use crate::error::{StoreError, StoreResult};
use crate::session::Session;
use crate::statement::{Insert, Select, Statement, TableSchema};
use crate::value::ColumnType;

/// Name of the key/value settings table.
pub const GENERAL_SETTINGS_TABLE: &str = "general_settings";

/// One versioned schema change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableChange {
    pub version: i32,
    pub statement: Statement,
}

/// A logical table and the changes that build it up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableDefinition {
    pub name: String,
    pub changes: Vec<TableChange>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            changes: Vec::new(),
        }
    }

    pub fn change(mut self, version: i32, statement: impl Into<Statement>) -> Self {
        self.changes.push(TableChange {
            version,
            statement: statement.into(),
        });
        self
    }

    fn version_key(&self) -> String {
        format!("table_version_{}", self.name)
    }

    /// Apply every change newer than the recorded version and return the
    /// version now in effect.
    ///
    /// A missing table starts at version -1 regardless of what is recorded.
    /// `AlreadyExists` from a change is logged and treated as applied; any
    /// other failure stops provisioning and is returned after the versions
    /// applied so far are recorded.
    pub fn provision(&self, session: &Session) -> StoreResult<i32> {
        let settings = GeneralSettings::open(session)?;
        let mut version = if session.table_exists(&self.name)? {
            settings.get_i32(&self.version_key(), 0)?
        } else {
            -1
        };
        let start = version;

        let mut failure = None;
        for change in self.changes.iter().filter(|c| c.version > start) {
            match session.execute_unprepared(&change.statement) {
                Ok(()) => {
                    info!(table = %self.name, version = change.version, ddl = %change.statement, "schema change applied");
                }
                Err(StoreError::AlreadyExists(what)) => {
                    warn!(table = %self.name, version = change.version, %what, "schema change already present");
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
            version = change.version;
        }

        if version != start {
            settings.set(&self.version_key(), &version.to_string())?;
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(version),
        }
    }
}

/// Key/value settings stored in [`GENERAL_SETTINGS_TABLE`].
pub struct GeneralSettings<'a> {
    session: &'a Session,
}

impl<'a> GeneralSettings<'a> {
    /// Open the settings table, creating it on first use.
    pub fn open(session: &'a Session) -> StoreResult<Self> {
        if !session.table_exists(GENERAL_SETTINGS_TABLE)? {
            let schema = TableSchema::new(GENERAL_SETTINGS_TABLE)
                .column("name", ColumnType::Text)
                .column("value", ColumnType::Text)
                .partition_key(["name"]);
            match session.execute_unprepared(&schema.into()) {
                Ok(()) | Err(StoreError::AlreadyExists(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(Self { session })
    }

    pub fn get(&self, name: &str) -> StoreResult<Option<String>> {
        let select = Select::new(GENERAL_SETTINGS_TABLE)
            .columns(["value"])
            .where_eq("name");
        let rows = self.session.run(&select.into(), vec![name.into()])?;
        match rows.first() {
            Some(row) => row.text("value"),
            None => Ok(None),
        }
    }

    pub fn set(&self, name: &str, value: &str) -> StoreResult<()> {
        let insert = Insert::new(GENERAL_SETTINGS_TABLE).columns(["name", "value"]);
        self.session
            .run(&insert.into(), vec![name.into(), value.into()])
            .map(drop)
    }

    /// Integer setting; unparsable values fall back to `default`.
    pub fn get_i32(&self, name: &str, default: i32) -> StoreResult<i32> {
        Ok(self
            .get(name)?
            .and_then(|v| v.parse().ok())
            .unwrap_or(default))
    }
}

/// Provision several definitions in order.
pub fn provision_all(session: &Session, definitions: &[TableDefinition]) -> StoreResult<()> {
    for definition in definitions {
        definition.provision(session)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::memory::MemoryStore;
    use crate::session::SessionConfig;
    use crate::statement::Order;
    use crate::traits::DataStore;

    fn session() -> (Arc<MemoryStore>, Session) {
        let store = Arc::new(MemoryStore::new());
        let session = Session::new(store.clone(), SessionConfig::default());
        (store, session)
    }

    fn definition() -> TableDefinition {
        TableDefinition::new("things")
            .change(
                1,
                TableSchema::new("things")
                    .column("id", ColumnType::Text)
                    .column("seq", ColumnType::Int)
                    .column("state", ColumnType::Int)
                    .partition_key(["id"])
                    .clustering_key(["seq"])
                    .clustering_order(Order::Desc),
            )
            .change(
                2,
                Statement::CreateIndex {
                    table: "things".into(),
                    column: "state".into(),
                },
            )
    }

    #[test]
    fn applies_all_changes_once() {
        let (store, session) = session();
        assert_eq!(definition().provision(&session).unwrap(), 2);
        assert!(store.table_exists("things").unwrap());
        // Second run sees version 2 and does nothing.
        assert_eq!(definition().provision(&session).unwrap(), 2);
        let settings = GeneralSettings::open(&session).unwrap();
        assert_eq!(settings.get("table_version_things").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn applies_only_new_changes() {
        let (_, session) = session();
        let first = TableDefinition {
            name: "things".into(),
            changes: definition().changes[..1].to_vec(),
        };
        assert_eq!(first.provision(&session).unwrap(), 1);
        assert_eq!(definition().provision(&session).unwrap(), 2);
    }

    #[test]
    fn tolerates_existing_objects() {
        let (store, session) = session();
        // Table created out of band: version lookup defaults to 0, so change
        // 1 runs again and hits AlreadyExists.
        store
            .execute_unprepared(&definition().changes[0].statement)
            .unwrap();
        assert_eq!(definition().provision(&session).unwrap(), 2);
    }

    #[test]
    fn records_progress_before_failing() {
        let (_, session) = session();
        let broken = definition().change(
            3,
            Statement::CreateIndex {
                table: "things".into(),
                column: "nope".into(),
            },
        );
        assert!(matches!(
            broken.provision(&session),
            Err(StoreError::UnknownColumn { .. })
        ));
        let settings = GeneralSettings::open(&session).unwrap();
        assert_eq!(settings.get_i32("table_version_things", 0).unwrap(), 2);
    }

    #[test]
    fn settings_round_trip() {
        let (_, session) = session();
        let settings = GeneralSettings::open(&session).unwrap();
        assert_eq!(settings.get("missing").unwrap(), None);
        settings.set("answer", "42").unwrap();
        assert_eq!(settings.get_i32("answer", 0).unwrap(), 42);
        settings.set("answer", "forty-two").unwrap();
        assert_eq!(settings.get_i32("answer", 7).unwrap(), 7);
    }
}
