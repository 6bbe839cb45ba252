use std::fmt;
use std::sync::Arc;

use crate::consistency::Consistency;
use crate::error::{StoreError, StoreResult};
use crate::statement::Statement;
use crate::value::Value;

/// Backend-assigned handle of a prepared statement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatementId(pub u64);

impl fmt::Display for StatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A statement the backend has validated and assigned an id to.
///
/// Cheap to clone; the statement and its CQL text are shared.
#[derive(Clone, Debug)]
pub struct PreparedStatement {
    id: StatementId,
    statement: Arc<Statement>,
    cql: Arc<str>,
}

impl PreparedStatement {
    pub fn new(id: StatementId, statement: Statement) -> Self {
        let cql: Arc<str> = statement.to_string().into();
        Self {
            id,
            statement: Arc::new(statement),
            cql,
        }
    }

    pub fn id(&self) -> StatementId {
        self.id
    }

    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    pub fn cql(&self) -> &str {
        &self.cql
    }

    /// Bind positional values, checking the marker count.
    pub fn bind(&self, values: Vec<Value>) -> StoreResult<BoundStatement> {
        let expected = self.statement.bind_count();
        if values.len() != expected {
            return Err(StoreError::BindCount {
                expected,
                actual: values.len(),
            });
        }
        Ok(BoundStatement {
            prepared: self.clone(),
            values,
            consistency: None,
        })
    }
}

/// A prepared statement with its values, ready to execute.
#[derive(Clone, Debug)]
pub struct BoundStatement {
    prepared: PreparedStatement,
    values: Vec<Value>,
    consistency: Option<Consistency>,
}

impl BoundStatement {
    /// Override the session's default consistency for this execution.
    pub fn with_consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = Some(consistency);
        self
    }

    pub fn prepared(&self) -> &PreparedStatement {
        &self.prepared
    }

    pub fn statement(&self) -> &Statement {
        self.prepared.statement()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn consistency(&self) -> Option<Consistency> {
        self.consistency
    }

    /// Fill in a consistency level when none was chosen explicitly.
    pub fn or_consistency(mut self, fallback: Consistency) -> Self {
        self.consistency.get_or_insert(fallback);
        self
    }
}
