use std::sync::Arc;

use m2db_store::{provision_all, Select, Session};
use tracing::info;

use crate::error::RegistryResult;
use crate::node::{NodeStatus, RegistryNode};
use crate::path::NodePath;
use crate::schema::{definitions, NODE_TABLE};

/// Entry point to the registry: hands out node handles and runs
/// maintenance over the whole node table.
#[derive(Clone, Debug)]
pub struct Registry {
    session: Arc<Session>,
}

impl Registry {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Create or migrate the node, child-index and block tables.
    pub fn provision(&self) -> RegistryResult<()> {
        provision_all(&self.session, &definitions())?;
        Ok(())
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Handle on `path` (normalized). Does not touch the store.
    pub fn node(&self, path: &str) -> RegistryResult<RegistryNode> {
        Ok(RegistryNode::new(Arc::clone(&self.session), NodePath::parse(path)?))
    }

    pub fn root(&self) -> RegistryNode {
        RegistryNode::new(Arc::clone(&self.session), NodePath::root())
    }

    /// Handle on `path`, created along with its ancestors if needed.
    pub fn ensure_exists(&self, path: &str) -> RegistryResult<RegistryNode> {
        let node = self.node(path)?;
        node.ensure_exists()?;
        Ok(node)
    }

    /// Hard-delete every soft-deleted node. Returns how many were erased.
    ///
    /// Finds candidates through the secondary index on `status`, so it scans
    /// the whole table; run it out of band, not on a request path.
    pub fn cleanup(&self) -> RegistryResult<usize> {
        let select = Select::new(NODE_TABLE).columns(["path"]).where_eq("status");
        let rows = self
            .session
            .run(&select.into(), vec![NodeStatus::Deleted.code().into()])?;
        let mut erased = 0;
        for row in rows {
            let Some(path) = row.text("path")? else {
                continue;
            };
            let node = self.node(&path)?;
            // An earlier iteration may already have erased it as a descendant.
            if node.status()? == NodeStatus::Deleted {
                node.delete(true)?;
                erased += 1;
            }
        }
        info!(erased, "registry cleanup finished");
        Ok(erased)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use m2db_store::{DataStore, MemoryStore, SessionConfig};

    use super::*;

    pub(crate) fn registry() -> (Arc<MemoryStore>, Registry) {
        let store = Arc::new(MemoryStore::new());
        let session = Arc::new(Session::new(store.clone(), SessionConfig::default()));
        let registry = Registry::new(session);
        registry.provision().unwrap();
        (store, registry)
    }

    #[test]
    fn provision_is_idempotent() {
        let (store, reg) = registry();
        reg.provision().unwrap();
        for table in ["registry_node", "registry_node_children", "registry_node_data"] {
            assert!(store.table_exists(table).unwrap(), "{table}");
        }
    }

    #[test]
    fn cleanup_erases_soft_deleted_nodes() {
        let (_, reg) = registry();
        reg.ensure_exists("/keep").unwrap();
        let gone = reg.ensure_exists("/gone/child").unwrap();
        gone.set_property("k", "v").unwrap();
        reg.node("/gone").unwrap().delete(false).unwrap();

        assert!(reg.node("/gone/child").unwrap().existed().unwrap());
        assert_eq!(reg.cleanup().unwrap(), 2);
        let child = reg.node("/gone/child").unwrap();
        assert!(!child.existed().unwrap());
        assert_eq!(child.property("k").unwrap(), None);
        assert!(reg.node("/keep").unwrap().exists().unwrap());
        assert_eq!(reg.cleanup().unwrap(), 0);
    }

    #[test]
    fn root_has_no_parent() {
        let (_, reg) = registry();
        let root = reg.root();
        assert!(root.parent().is_none());
        root.ensure_exists().unwrap();
        assert!(root.exists().unwrap());
    }
}
