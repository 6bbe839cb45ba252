//! Nested import/export of registry subtrees.
//!
//! Properties become leaves and children become nested branches. Every
//! value travels as a string: numbers, booleans and arrays imported from
//! JSON are stored as their JSON text and come back as strings. When a
//! property and a child share a name, the child wins on export.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, RegistryResult};
use crate::node::RegistryNode;

/// A subtree: names mapped to leaves or nested branches.
pub type Tree = BTreeMap<String, TreeValue>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeValue {
    Leaf(String),
    Branch(Tree),
}

impl RegistryNode {
    /// Export this node's properties and its whole subtree.
    pub fn to_tree(&self) -> RegistryResult<Tree> {
        let mut tree: Tree = self
            .properties()?
            .into_iter()
            .map(|(k, v)| (k, TreeValue::Leaf(v)))
            .collect();
        for child in self.children(true)? {
            let branch = child.to_tree()?;
            tree.insert(child.name().to_string(), TreeValue::Branch(branch));
        }
        Ok(tree)
    }

    /// Create this node and import `tree` into it, creating children as
    /// needed. Existing properties not named in `tree` are kept.
    pub fn from_tree(&self, tree: &Tree) -> RegistryResult<()> {
        self.ensure_exists()?;
        for (name, value) in tree {
            match value {
                TreeValue::Leaf(text) => self.set_property(name, text)?,
                TreeValue::Branch(branch) => self.child(name)?.from_tree(branch)?,
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> RegistryResult<serde_json::Value> {
        serde_json::to_value(self.to_tree()?)
            .map_err(|e| RegistryError::Serialization(e.to_string()))
    }

    /// Import a JSON object. Nested objects become children; strings are
    /// stored verbatim, `null` is skipped, and any other value is stored as
    /// its JSON text.
    pub fn load_json(&self, json: &serde_json::Value) -> RegistryResult<()> {
        let tree = json_to_tree(json)?;
        self.from_tree(&tree)
    }
}

fn json_to_tree(json: &serde_json::Value) -> RegistryResult<Tree> {
    use serde_json::Value as Json;

    let object = json.as_object().ok_or_else(|| {
        RegistryError::Serialization(format!("expected a JSON object, got {json}"))
    })?;
    let mut tree = Tree::new();
    for (name, value) in object {
        let entry = match value {
            Json::Null => continue,
            Json::Object(_) => TreeValue::Branch(json_to_tree(value)?),
            Json::String(s) => TreeValue::Leaf(s.clone()),
            other => TreeValue::Leaf(other.to_string()),
        };
        tree.insert(name.clone(), entry);
    }
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::registry::tests::registry;

    #[test]
    fn tree_round_trip() {
        let (_, reg) = registry();
        let mut settings = Tree::new();
        settings.insert("rate".into(), TreeValue::Leaf("60".into()));
        let mut tree = Tree::new();
        tree.insert("name".into(), TreeValue::Leaf("dev1".into()));
        tree.insert("settings".into(), TreeValue::Branch(settings));

        let node = reg.node("/device/dev1").unwrap();
        node.from_tree(&tree).unwrap();
        assert!(reg.node("/device/dev1/settings").unwrap().exists().unwrap());
        assert_eq!(reg.node("/device/dev1").unwrap().to_tree().unwrap(), tree);
    }

    #[test]
    fn json_values_become_strings() {
        let (_, reg) = registry();
        let node = reg.node("/j").unwrap();
        node.load_json(&json!({
            "n": 42,
            "flag": true,
            "list": [1, 2],
            "skip": null,
            "s": "text",
            "child": { "x": 1.5 }
        }))
        .unwrap();

        let exported = reg.node("/j").unwrap().to_json().unwrap();
        assert_eq!(
            exported,
            json!({
                "n": "42",
                "flag": "true",
                "list": "[1,2]",
                "s": "text",
                "child": { "x": "1.5" }
            })
        );
    }

    #[test]
    fn child_shadows_property_of_same_name() {
        let (_, reg) = registry();
        let node = reg.node("/shadow").unwrap();
        node.ensure_exists().unwrap();
        node.set_property("conf", "flat").unwrap();
        node.child("conf").unwrap().ensure_exists().unwrap();
        let tree = node.to_tree().unwrap();
        assert_eq!(tree.get("conf"), Some(&TreeValue::Branch(Tree::new())));
    }

    #[test]
    fn rejects_non_object_json() {
        let (_, reg) = registry();
        let err = reg.node("/bad").unwrap().load_json(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, RegistryError::Serialization(_)));
    }
}
