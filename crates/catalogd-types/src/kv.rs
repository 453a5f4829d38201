use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A node in the hierarchical key-value tree.
///
/// The tree mirrors a flat `key -> bytes` namespace into nested folders by
/// splitting each key on `/`. A path can resolve to either a [`KvNode::Folder`]
/// (an interior node with children) or a [`KvNode::Value`] (a leaf).
///
/// When a path is written where a value previously sat, the folder wins: the
/// value is discarded and replaced with an (initially empty) folder before
/// its children are inserted. A value can never shadow an existing folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KvNode {
    Folder(BTreeMap<String, KvNode>),
    Value(Vec<u8>),
}

impl KvNode {
    /// An empty folder, the natural root of a tree.
    pub fn empty_folder() -> Self {
        KvNode::Folder(BTreeMap::new())
    }

    /// Resolves a slash-separated path, starting from this node.
    ///
    /// Leading, trailing, and repeated slashes are ignored. Returns `None` if
    /// any intermediate segment is a value (values have no children) or the
    /// path is simply absent.
    pub fn get(&self, path: &str) -> Option<&KvNode> {
        let mut current = self;
        for segment in split_path(path) {
            match current {
                KvNode::Folder(children) => current = children.get(segment)?,
                KvNode::Value(_) => return None,
            }
        }
        Some(current)
    }

    /// Returns the children of this node, if it is a folder.
    pub fn as_folder(&self) -> Option<&BTreeMap<String, KvNode>> {
        match self {
            KvNode::Folder(children) => Some(children),
            KvNode::Value(_) => None,
        }
    }

    /// Returns the bytes of this node, if it is a value.
    pub fn as_value(&self) -> Option<&[u8]> {
        match self {
            KvNode::Value(bytes) => Some(bytes),
            KvNode::Folder(_) => None,
        }
    }

    /// Writes `entry` at `path`, creating intermediate folders as needed.
    ///
    /// Folder wins over value: any intermediate segment that previously held
    /// a value is replaced with a folder before recursing further.
    pub fn set(&mut self, path: &str, entry: KvNode) {
        let segments = split_path(path);
        if segments.is_empty() {
            *self = entry;
            return;
        }
        set_recursive(self, &segments, entry);
    }
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

fn set_recursive(node: &mut KvNode, segments: &[&str], entry: KvNode) {
    if !matches!(node, KvNode::Folder(_)) {
        *node = KvNode::empty_folder();
    }
    let KvNode::Folder(children) = node else {
        unreachable!("just normalized to a folder")
    };
    let (head, rest) = segments.split_first().expect("non-empty path");
    if rest.is_empty() {
        children.insert((*head).to_string(), entry);
    } else {
        let child = children
            .entry((*head).to_string())
            .or_insert_with(KvNode::empty_folder);
        set_recursive(child, rest, entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_resolves_nested_path() {
        let mut root = KvNode::empty_folder();
        root.set("gateway/routes/api", KvNode::Value(b"upstream".to_vec()));

        let resolved = root.get("gateway/routes/api").unwrap();
        assert_eq!(resolved.as_value(), Some(b"upstream".as_slice()));
    }

    #[test]
    fn get_ignores_leading_trailing_slashes() {
        let mut root = KvNode::empty_folder();
        root.set("a/b", KvNode::Value(vec![1]));
        assert!(root.get("/a/b/").is_some());
        assert!(root.get("//a//b//").is_some());
    }

    #[test]
    fn get_through_a_value_is_none() {
        let mut root = KvNode::empty_folder();
        root.set("a", KvNode::Value(vec![1]));
        assert!(root.get("a/b").is_none());
    }

    #[test]
    fn set_overwrites_value_with_folder() {
        let mut root = KvNode::empty_folder();
        root.set("a", KvNode::Value(vec![1]));
        root.set("a/b", KvNode::Value(vec![2]));

        assert!(matches!(root.get("a"), Some(KvNode::Folder(_))));
        assert_eq!(root.get("a/b").unwrap().as_value(), Some([2].as_slice()));
    }

    #[test]
    fn set_at_root_replaces_whole_tree() {
        let mut root = KvNode::empty_folder();
        root.set("a", KvNode::Value(vec![1]));
        root.set("", KvNode::empty_folder());
        assert!(root.get("a").is_none());
    }
}
