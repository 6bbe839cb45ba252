use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use m2db_store::{Delete, Insert, Rows, Select, Session, Statement, Update, Value};
use tracing::debug;
use uuid::Uuid;

use crate::error::{RegistryError, RegistryResult};
use crate::path::NodePath;
use crate::schema::{CHILDREN_TABLE, DATA_TABLE, NODE_TABLE};

/// Names starting with this marker are hidden from default enumeration.
pub const HIDDEN_PREFIX: char = '.';

/// Lifecycle state of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeStatus {
    /// Never created, or hard-deleted.
    Undefined,
    /// Soft-deleted; properties are retained.
    Deleted,
    Created,
}

impl NodeStatus {
    /// Wire code stored in the `status` column.
    pub fn code(self) -> i32 {
        match self {
            Self::Undefined => -1,
            Self::Deleted => 5,
            Self::Created => 100,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            5 => Self::Deleted,
            100 => Self::Created,
            _ => Self::Undefined,
        }
    }
}

#[derive(Clone, Debug, Default)]
struct NodeCache {
    status: Option<NodeStatus>,
    properties: Option<BTreeMap<String, String>>,
}

/// Handle on one registry path.
///
/// A handle is cheap and touches the store lazily. It caches the status and
/// properties it has loaded; every mutation made through the handle writes
/// the store first and then updates the cache. Clones share one cache;
/// changes made through independently obtained handles are not seen until
/// [`invalidate`](Self::invalidate).
pub struct RegistryNode {
    session: Arc<Session>,
    path: NodePath,
    cache: Arc<Mutex<NodeCache>>,
}

impl RegistryNode {
    pub fn new(session: Arc<Session>, path: NodePath) -> Self {
        Self {
            session,
            path,
            cache: Arc::new(Mutex::new(NodeCache::default())),
        }
    }

    fn at(&self, path: NodePath) -> Self {
        Self::new(Arc::clone(&self.session), path)
    }

    fn cache(&self) -> MutexGuard<'_, NodeCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run(&self, statement: Statement, values: Vec<Value>) -> RegistryResult<Rows> {
        Ok(self.session.run(&statement, values)?)
    }

    pub fn path(&self) -> &NodePath {
        &self.path
    }

    pub fn name(&self) -> &str {
        self.path.name()
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn parent(&self) -> Option<RegistryNode> {
        self.path.parent().map(|p| self.at(p))
    }

    pub fn child(&self, name: &str) -> RegistryResult<RegistryNode> {
        Ok(self.at(self.path.child(name)?))
    }

    /// Whether this node is hidden from default child enumeration.
    pub fn is_hidden(&self) -> bool {
        self.name().starts_with(HIDDEN_PREFIX)
    }

    /// Forget cached status and properties.
    pub fn invalidate(&self) {
        *self.cache() = NodeCache::default();
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    pub fn status(&self) -> RegistryResult<NodeStatus> {
        if let Some(status) = self.cache().status {
            return Ok(status);
        }
        let select = Select::new(NODE_TABLE).columns(["status"]).where_eq("path");
        let rows = self.run(select.into(), vec![self.path.as_str().into()])?;
        let code = match rows.first() {
            Some(row) => row.int("status")?,
            None => None,
        };
        let status = code.map_or(NodeStatus::Undefined, NodeStatus::from_code);
        self.cache().status = Some(status);
        Ok(status)
    }

    fn set_status(&self, status: NodeStatus) -> RegistryResult<()> {
        let update = Update::new(NODE_TABLE).set("status").where_eq("path");
        self.run(update.into(), vec![status.code().into(), self.path.as_str().into()])?;
        self.cache().status = Some(status);
        Ok(())
    }

    /// `status == Created`.
    pub fn exists(&self) -> RegistryResult<bool> {
        Ok(self.status()? == NodeStatus::Created)
    }

    /// `status != Undefined`: created at some point and not hard-deleted.
    pub fn existed(&self) -> RegistryResult<bool> {
        Ok(self.status()? != NodeStatus::Undefined)
    }

    pub fn deleted(&self) -> RegistryResult<bool> {
        Ok(self.status()? == NodeStatus::Deleted)
    }

    /// Create the node and any missing ancestors unless it already exists.
    pub fn ensure_exists(&self) -> RegistryResult<&Self> {
        if self.status()? != NodeStatus::Created {
            self.create()?;
        }
        Ok(self)
    }

    /// Mark the node created and register it with its parent, creating
    /// missing ancestors first so no created node ever has a missing parent.
    pub fn create(&self) -> RegistryResult<&Self> {
        let mut missing = Vec::new();
        let mut cursor = self.path.parent();
        while let Some(path) = cursor {
            let ancestor = self.at(path);
            if ancestor.status()? == NodeStatus::Created {
                break;
            }
            cursor = ancestor.path.parent();
            missing.push(ancestor);
        }
        for ancestor in missing.iter().rev() {
            ancestor.mark_created()?;
        }
        self.mark_created()?;
        debug!(path = %self.path, ancestors = missing.len(), "node created");
        Ok(self)
    }

    fn mark_created(&self) -> RegistryResult<()> {
        self.set_status(NodeStatus::Created)?;
        if let Some(parent) = self.path.parent() {
            let insert = Insert::new(CHILDREN_TABLE).columns(["path", "name"]);
            self.run(
                insert.into(),
                vec![parent.as_str().into(), self.name().into()],
            )?;
        }
        Ok(())
    }

    /// Delete the node and its whole subtree.
    ///
    /// A soft delete flips every node to `Deleted` and keeps properties; a
    /// hard delete erases node rows and the block rows they own. Either way
    /// each node leaves its parent's child index. The walk is iterative and
    /// descendants go before their ancestors, so a failure part-way leaves
    /// every remaining node still reachable.
    pub fn delete(&self, hard: bool) -> RegistryResult<()> {
        let mut order = Vec::new();
        let mut stack = vec![self.path.clone()];
        while let Some(path) = stack.pop() {
            for name in self.names_under(&path)? {
                stack.push(path.child(&name)?);
            }
            order.push(path);
        }
        for path in order.iter().skip(1).rev() {
            self.at(path.clone()).delete_one(hard)?;
        }
        self.delete_one(hard)?;
        debug!(path = %self.path, hard, nodes = order.len(), "subtree deleted");
        Ok(())
    }

    fn delete_one(&self, hard: bool) -> RegistryResult<()> {
        if hard {
            let path: Value = self.path.as_str().into();
            self.run(Delete::new(NODE_TABLE).where_eq("path").into(), vec![path.clone()])?;
            self.run(Delete::new(DATA_TABLE).where_eq("path").into(), vec![path])?;
            let mut cache = self.cache();
            cache.status = Some(NodeStatus::Undefined);
            cache.properties = Some(BTreeMap::new());
        } else {
            self.set_status(NodeStatus::Deleted)?;
        }
        if let Some(parent) = self.path.parent() {
            let delete = Delete::new(CHILDREN_TABLE).where_eq("path").where_eq("name");
            self.run(
                delete.into(),
                vec![parent.as_str().into(), self.name().into()],
            )?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Children
    // ---------------------------------------------------------------------

    fn names_under(&self, path: &NodePath) -> RegistryResult<Vec<String>> {
        let select = Select::new(CHILDREN_TABLE).columns(["name"]).where_eq("path");
        let rows = self.run(select.into(), vec![path.as_str().into()])?;
        let mut names = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(name) = row.text("name")? {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Names of created children, from the child index.
    pub fn child_names(&self, include_hidden: bool) -> RegistryResult<Vec<String>> {
        let mut names = self.names_under(&self.path)?;
        if !include_hidden {
            names.retain(|n| !n.starts_with(HIDDEN_PREFIX));
        }
        Ok(names)
    }

    pub fn children(&self, include_hidden: bool) -> RegistryResult<Vec<RegistryNode>> {
        self.child_names(include_hidden)?
            .iter()
            .map(|name| self.child(name))
            .collect()
    }

    /// Number of children, or of all descendants when `recursive`.
    pub fn child_count(&self, recursive: bool) -> RegistryResult<usize> {
        if !recursive {
            return Ok(self.names_under(&self.path)?.len());
        }
        let mut count = 0;
        let mut stack = vec![self.path.clone()];
        while let Some(path) = stack.pop() {
            for name in self.names_under(&path)? {
                count += 1;
                stack.push(path.child(&name)?);
            }
        }
        Ok(count)
    }

    // ---------------------------------------------------------------------
    // Properties
    // ---------------------------------------------------------------------

    fn with_properties<R>(&self, f: impl FnOnce(&BTreeMap<String, String>) -> R) -> RegistryResult<R> {
        {
            let cache = self.cache();
            if let Some(props) = &cache.properties {
                return Ok(f(props));
            }
        }
        let select = Select::new(NODE_TABLE).columns(["values"]).where_eq("path");
        let rows = self.run(select.into(), vec![self.path.as_str().into()])?;
        let loaded = match rows.first() {
            Some(row) => row.map("values")?.unwrap_or_default(),
            None => BTreeMap::new(),
        };
        let result = f(&loaded);
        self.cache().properties = Some(loaded);
        Ok(result)
    }

    /// All properties, loaded once per handle.
    pub fn properties(&self) -> RegistryResult<BTreeMap<String, String>> {
        self.with_properties(BTreeMap::clone)
    }

    pub fn property_names(&self) -> RegistryResult<Vec<String>> {
        self.with_properties(|p| p.keys().cloned().collect())
    }

    pub fn property(&self, name: &str) -> RegistryResult<Option<String>> {
        self.with_properties(|p| p.get(name).cloned())
    }

    pub fn get_property(&self, name: &str, default: &str) -> RegistryResult<String> {
        Ok(self.property(name)?.unwrap_or_else(|| default.to_string()))
    }

    pub fn set_property(&self, name: &str, value: &str) -> RegistryResult<()> {
        let update = Update::new(NODE_TABLE).put("values").where_eq("path");
        self.run(
            update.into(),
            vec![name.into(), value.into(), self.path.as_str().into()],
        )?;
        self.cache_put(name, value);
        Ok(())
    }

    /// Set a property that the store expires after `ttl` (whole seconds;
    /// zero means no expiry). The handle's cache keeps the value until
    /// invalidated.
    pub fn set_property_with_ttl(&self, name: &str, value: &str, ttl: Duration) -> RegistryResult<()> {
        let secs = i32::try_from(ttl.as_secs()).unwrap_or(i32::MAX);
        if secs == 0 {
            return self.set_property(name, value);
        }
        let update = Update::new(NODE_TABLE)
            .with_ttl()
            .put("values")
            .where_eq("path");
        self.run(
            update.into(),
            vec![secs.into(), name.into(), value.into(), self.path.as_str().into()],
        )?;
        self.cache_put(name, value);
        Ok(())
    }

    pub fn del_property(&self, name: &str) -> RegistryResult<()> {
        let delete = Delete::new(NODE_TABLE).map_entry("values").where_eq("path");
        self.run(delete.into(), vec![name.into(), self.path.as_str().into()])?;
        if let Some(props) = self.cache().properties.as_mut() {
            props.remove(name);
        }
        Ok(())
    }

    fn cache_put(&self, name: &str, value: &str) {
        if let Some(props) = self.cache().properties.as_mut() {
            props.insert(name.to_string(), value.to_string());
        }
    }

    fn parse_property<T: FromStr>(&self, name: &str, expected: &'static str) -> RegistryResult<Option<T>> {
        match self.property(name)? {
            None => Ok(None),
            Some(value) => match value.trim().parse() {
                Ok(parsed) => Ok(Some(parsed)),
                Err(_) => Err(RegistryError::InvalidProperty {
                    name: name.to_string(),
                    value,
                    expected,
                }),
            },
        }
    }

    pub fn get_i32(&self, name: &str, default: i32) -> RegistryResult<i32> {
        Ok(self.parse_property(name, "i32")?.unwrap_or(default))
    }

    pub fn get_i64(&self, name: &str, default: i64) -> RegistryResult<i64> {
        Ok(self.parse_property(name, "i64")?.unwrap_or(default))
    }

    pub fn get_f64(&self, name: &str, default: f64) -> RegistryResult<f64> {
        Ok(self.parse_property(name, "f64")?.unwrap_or(default))
    }

    /// Booleans are stored as `"1"` / `"0"`; any other stored text is false.
    pub fn get_bool(&self, name: &str, default: bool) -> RegistryResult<bool> {
        Ok(self.property(name)?.map_or(default, |v| v == "1"))
    }

    /// Dates are stored as epoch milliseconds; `0` reads as absent.
    pub fn get_date(&self, name: &str) -> RegistryResult<Option<DateTime<Utc>>> {
        let millis: i64 = self.parse_property(name, "epoch millisecond")?.unwrap_or(0);
        if millis == 0 {
            return Ok(None);
        }
        Ok(DateTime::from_timestamp_millis(millis))
    }

    pub fn get_uuid(&self, name: &str) -> RegistryResult<Option<Uuid>> {
        self.parse_property(name, "uuid")
    }

    pub fn set_i32(&self, name: &str, value: i32) -> RegistryResult<()> {
        self.set_property(name, &value.to_string())
    }

    pub fn set_i64(&self, name: &str, value: i64) -> RegistryResult<()> {
        self.set_property(name, &value.to_string())
    }

    pub fn set_f64(&self, name: &str, value: f64) -> RegistryResult<()> {
        self.set_property(name, &value.to_string())
    }

    pub fn set_bool(&self, name: &str, value: bool) -> RegistryResult<()> {
        self.set_property(name, if value { "1" } else { "0" })
    }

    pub fn set_date(&self, name: &str, value: DateTime<Utc>) -> RegistryResult<()> {
        self.set_i64(name, value.timestamp_millis())
    }

    pub fn set_uuid(&self, name: &str, value: Uuid) -> RegistryResult<()> {
        self.set_property(name, &value.to_string())
    }

    // ---------------------------------------------------------------------
    // Relocation
    // ---------------------------------------------------------------------

    /// Copy properties and the whole subtree to `dest`, creating it.
    pub fn copy_to(&self, dest: &RegistryNode) -> RegistryResult<()> {
        if dest.path.is_within(&self.path) {
            return Err(RegistryError::CopyIntoSelf {
                from: self.path.to_string(),
                to: dest.path.to_string(),
            });
        }
        let mut stack = Vec::new();
        for name in Self::copy_one(self, dest)? {
            stack.push((self.path.child(&name)?, dest.path.child(&name)?));
        }
        while let Some((src, dst)) = stack.pop() {
            let (src, dst) = (self.at(src), self.at(dst));
            for name in Self::copy_one(&src, &dst)? {
                stack.push((src.path.child(&name)?, dst.path.child(&name)?));
            }
        }
        debug!(from = %self.path, to = %dest.path, "subtree copied");
        Ok(())
    }

    fn copy_one(src: &RegistryNode, dst: &RegistryNode) -> RegistryResult<Vec<String>> {
        dst.ensure_exists()?;
        for (name, value) in src.properties()? {
            dst.set_property(&name, &value)?;
        }
        src.child_names(true)
    }

    /// Copy to `dest`, then delete this subtree.
    pub fn move_to(&self, dest: &RegistryNode, hard: bool) -> RegistryResult<()> {
        self.copy_to(dest)?;
        self.delete(hard)
    }
}

impl Clone for RegistryNode {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            path: self.path.clone(),
            cache: Arc::clone(&self.cache),
        }
    }
}

impl fmt::Debug for RegistryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryNode")
            .field("path", &self.path)
            .field("status", &self.cache().status)
            .finish()
    }
}

impl fmt::Display for RegistryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.path, f)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::registry::tests::registry;

    #[test]
    fn ensure_exists_creates_ancestors() {
        let (_, reg) = registry();
        let node = reg.node("/dev/abc/settings").unwrap();
        node.ensure_exists().unwrap();
        assert!(node.exists().unwrap());
        for path in ["/", "/dev/", "/dev/abc/"] {
            assert!(reg.node(path).unwrap().exists().unwrap(), "{path}");
        }
        assert_eq!(reg.node("/dev").unwrap().child_names(true).unwrap(), ["abc"]);
    }

    #[test]
    fn status_distinguishes_never_created_from_deleted() {
        let (_, reg) = registry();
        let node = reg.node("/a").unwrap();
        assert!(!node.exists().unwrap());
        assert!(!node.existed().unwrap());
        node.ensure_exists().unwrap();
        node.delete(false).unwrap();
        let fresh = reg.node("/a").unwrap();
        assert!(!fresh.exists().unwrap());
        assert!(fresh.existed().unwrap());
        assert!(fresh.deleted().unwrap());
    }

    #[test]
    fn soft_delete_preserves_properties() {
        let (_, reg) = registry();
        let node = reg.node("/a").unwrap();
        node.ensure_exists().unwrap();
        node.set_property("k", "v").unwrap();
        node.delete(false).unwrap();
        assert!(!node.exists().unwrap());

        let again = reg.node("/a").unwrap();
        again.ensure_exists().unwrap();
        assert!(again.exists().unwrap());
        assert_eq!(again.property("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn hard_delete_erases_subtree() {
        let (store, reg) = registry();
        let leaf = reg.node("/a/b/c").unwrap();
        leaf.ensure_exists().unwrap();
        leaf.set_property("k", "v").unwrap();
        reg.node("/a").unwrap().delete(true).unwrap();

        let leaf = reg.node("/a/b/c").unwrap();
        assert!(!leaf.existed().unwrap());
        assert_eq!(leaf.property("k").unwrap(), None);
        assert!(reg.node("/").unwrap().child_names(true).unwrap().is_empty());
        // Only the root row is left.
        assert_eq!(store.row_count(NODE_TABLE), 1);
    }

    #[test]
    fn child_index_tracks_created_children() {
        let (_, reg) = registry();
        let parent = reg.node("/p").unwrap();
        for name in ["x", "y", "z", ".hidden"] {
            parent.child(name).unwrap().ensure_exists().unwrap();
        }
        let all: BTreeSet<String> = parent.child_names(true).unwrap().into_iter().collect();
        assert_eq!(all.len(), 4);
        let visible: BTreeSet<String> = parent.child_names(false).unwrap().into_iter().collect();
        assert_eq!(visible, BTreeSet::from(["x", "y", "z"].map(String::from)));

        parent.child("y").unwrap().delete(false).unwrap();
        let visible: BTreeSet<String> = parent.child_names(false).unwrap().into_iter().collect();
        assert_eq!(visible, BTreeSet::from(["x", "z"].map(String::from)));
        assert_eq!(parent.child_count(false).unwrap(), 3);
    }

    #[test]
    fn recursive_child_count() {
        let (_, reg) = registry();
        for path in ["/r/a/1", "/r/a/2", "/r/b"] {
            reg.node(path).unwrap().ensure_exists().unwrap();
        }
        let root = reg.node("/r").unwrap();
        assert_eq!(root.child_count(false).unwrap(), 2);
        assert_eq!(root.child_count(true).unwrap(), 4);
    }

    #[test]
    fn property_round_trip_and_delete() {
        let (_, reg) = registry();
        let node = reg.node("/n").unwrap();
        node.ensure_exists().unwrap();
        node.set_property("name", "sensor").unwrap();
        assert_eq!(node.get_property("name", "?").unwrap(), "sensor");
        node.del_property("name").unwrap();
        assert_eq!(node.get_property("name", "?").unwrap(), "?");
        // A fresh handle reads from the store, not the cache.
        assert_eq!(reg.node("/n").unwrap().property("name").unwrap(), None);
    }

    #[test]
    fn clones_share_the_property_cache() {
        let (_, reg) = registry();
        let node = reg.node("/shared").unwrap();
        node.ensure_exists().unwrap();
        assert_eq!(node.property("k").unwrap(), None);
        let copy = node.clone();
        copy.set_property("k", "v").unwrap();
        assert_eq!(node.property("k").unwrap().as_deref(), Some("v"));

        // A separately obtained handle keeps its own cache until invalidated.
        let other = reg.node("/shared").unwrap();
        assert_eq!(other.property("k").unwrap().as_deref(), Some("v"));
        node.set_property("k", "w").unwrap();
        assert_eq!(copy.property("k").unwrap().as_deref(), Some("w"));
        assert_eq!(other.property("k").unwrap().as_deref(), Some("v"));
        other.invalidate();
        assert_eq!(other.property("k").unwrap().as_deref(), Some("w"));
    }

    #[test]
    fn typed_properties() {
        let (_, reg) = registry();
        let node = reg.node("/typed").unwrap();
        node.ensure_exists().unwrap();
        let when = DateTime::from_timestamp_millis(1_400_000_000_123).unwrap();
        let id = Uuid::from_u128(0x1234);
        node.set_i32("i", -7).unwrap();
        node.set_i64("l", 1 << 40).unwrap();
        node.set_bool("b", true).unwrap();
        node.set_f64("f", 2.5).unwrap();
        node.set_date("d", when).unwrap();
        node.set_uuid("u", id).unwrap();

        let node = reg.node("/typed").unwrap();
        assert_eq!(node.get_i32("i", 0).unwrap(), -7);
        assert_eq!(node.get_i64("l", 0).unwrap(), 1 << 40);
        assert!(node.get_bool("b", false).unwrap());
        assert!(node.get_bool("missing", true).unwrap());
        assert_eq!(node.get_f64("f", 0.0).unwrap(), 2.5);
        assert_eq!(node.get_date("d").unwrap(), Some(when));
        assert_eq!(node.get_uuid("u").unwrap(), Some(id));
        assert_eq!(node.property("b").unwrap().as_deref(), Some("1"));
        assert_eq!(node.get_date("missing").unwrap(), None);

        node.set_property("i", "seven").unwrap();
        assert!(matches!(
            node.get_i32("i", 0),
            Err(RegistryError::InvalidProperty { .. })
        ));
    }

    #[test]
    fn ttl_properties_expire_in_store() {
        let (store, reg) = registry();
        let node = reg.node("/ttl").unwrap();
        node.ensure_exists().unwrap();
        node.set_property_with_ttl("session", "abc", Duration::from_secs(30)).unwrap();
        node.set_property("keep", "yes").unwrap();
        assert_eq!(node.property("session").unwrap().as_deref(), Some("abc"));

        store.advance_clock(Duration::from_secs(31));
        let fresh = reg.node("/ttl").unwrap();
        assert_eq!(fresh.property("session").unwrap(), None);
        assert_eq!(fresh.property("keep").unwrap().as_deref(), Some("yes"));
        assert!(fresh.exists().unwrap());
    }

    #[test]
    fn copy_and_move() {
        let (_, reg) = registry();
        let src = reg.node("/src").unwrap();
        src.ensure_exists().unwrap();
        src.set_property("top", "1").unwrap();
        let deep = reg.node("/src/a/b").unwrap();
        deep.ensure_exists().unwrap();
        deep.set_property("leaf", "2").unwrap();

        let dst = reg.node("/dst").unwrap();
        src.copy_to(&dst).unwrap();
        assert_eq!(reg.node("/dst").unwrap().property("top").unwrap().as_deref(), Some("1"));
        let copied = reg.node("/dst/a/b").unwrap();
        assert!(copied.exists().unwrap());
        assert_eq!(copied.property("leaf").unwrap().as_deref(), Some("2"));
        assert!(src.exists().unwrap());

        let moved = reg.node("/moved").unwrap();
        src.move_to(&moved, false).unwrap();
        assert!(!reg.node("/src").unwrap().exists().unwrap());
        assert!(!reg.node("/src/a/b").unwrap().exists().unwrap());
        assert!(reg.node("/moved/a/b").unwrap().exists().unwrap());
    }

    #[test]
    fn copy_into_own_subtree_is_rejected() {
        let (_, reg) = registry();
        let src = reg.node("/a").unwrap();
        src.ensure_exists().unwrap();
        let inside = reg.node("/a/b").unwrap();
        assert!(matches!(
            src.copy_to(&inside),
            Err(RegistryError::CopyIntoSelf { .. })
        ));
    }

    #[test]
    fn store_failures_propagate() {
        let (store, reg) = registry();
        store.fail_writes_to(NODE_TABLE);
        let err = reg.node("/x").unwrap().ensure_exists().unwrap_err();
        assert!(matches!(err, RegistryError::Store(m2db_store::StoreError::Unavailable(_))));
    }
}
