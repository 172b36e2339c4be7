//! In-memory document tree.
//!
//! Used to drive the watcher without a browser: every mutation notifies live
//! subscribers with the recounted element total, the way a page-side
//! `MutationObserver` would.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;

use crate::document::{Document, MutationFeed, MutationSender, mutation_channel};
use crate::error::{Result, WatchError};

pub type NodeId = usize;

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        tag: String,
        attributes: BTreeMap<String, String>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug)]
struct Tree {
    nodes: Vec<Option<Node>>,
    root: NodeId,
}

impl Tree {
    fn new(root_tag: &str) -> Self {
        let root = Node {
            kind: NodeKind::Element {
                tag: root_tag.to_string(),
                attributes: BTreeMap::new(),
            },
            parent: None,
            children: Vec::new(),
        };
        Self { nodes: vec![Some(root)], root: 0 }
    }

    fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id)
            .and_then(Option::as_ref)
            .ok_or_else(|| WatchError::document(format!("no node with id {}", id)))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id)
            .and_then(Option::as_mut)
            .ok_or_else(|| WatchError::document(format!("no node with id {}", id)))
    }

    fn append(&mut self, parent: NodeId, kind: NodeKind) -> Result<NodeId> {
        if !matches!(self.node(parent)?.kind, NodeKind::Element { .. }) {
            return Err(WatchError::document(format!("node {} cannot have children", parent)));
        }
        let id = self.nodes.len();
        self.nodes.push(Some(Node { kind, parent: Some(parent), children: Vec::new() }));
        self.node_mut(parent)?.children.push(id);
        Ok(id)
    }

    fn remove(&mut self, id: NodeId) -> Result<()> {
        let parent = self
            .node(id)?
            .parent
            .ok_or_else(|| WatchError::document("the root element cannot be removed"))?;
        self.node_mut(parent)?.children.retain(|child| *child != id);

        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.nodes.get_mut(next).and_then(Option::take) {
                pending.extend(node.children);
            }
        }
        Ok(())
    }

    fn count_elements(&self, id: NodeId) -> u64 {
        match self.nodes.get(id).and_then(Option::as_ref) {
            Some(Node { kind: NodeKind::Element { .. }, children, .. }) => {
                1 + children.iter().map(|child| self.count_elements(*child)).sum::<u64>()
            }
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MutationSupport {
    Available,
    Unavailable,
    Failing,
}

#[derive(Debug)]
pub struct MemoryDocument {
    tree: RwLock<Tree>,
    subscribers: Mutex<Vec<MutationSender>>,
    support: MutationSupport,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// `<html><head></head><body></body></html>`
    pub fn new() -> Self {
        let mut tree = Tree::new("html");
        let root = tree.root;
        for tag in ["head", "body"] {
            let kind = NodeKind::Element { tag: tag.to_string(), attributes: BTreeMap::new() };
            // root is an element, so appending cannot fail
            let _ = tree.append(root, kind);
        }
        Self {
            tree: RwLock::new(tree),
            subscribers: Mutex::new(Vec::new()),
            support: MutationSupport::Available,
        }
    }

    /// Document without change notifications; watchers poll it
    pub fn without_mutation_support() -> Self {
        Self { support: MutationSupport::Unavailable, ..Self::new() }
    }

    /// Document whose change subscription errors out
    pub fn with_failing_subscription() -> Self {
        Self { support: MutationSupport::Failing, ..Self::new() }
    }

    pub fn root(&self) -> NodeId {
        self.tree.read().root
    }

    pub fn body(&self) -> NodeId {
        let tree = self.tree.read();
        let root = tree.root;
        tree.node(root)
            .ok()
            .and_then(|node| {
                node.children.iter().copied().find(|child| {
                    matches!(
                        tree.node(*child).map(|n| &n.kind),
                        Ok(NodeKind::Element { tag, .. }) if tag == "body"
                    )
                })
            })
            .unwrap_or(root)
    }

    pub fn append_element(&self, parent: NodeId, tag: &str) -> Result<NodeId> {
        let kind = NodeKind::Element { tag: tag.to_string(), attributes: BTreeMap::new() };
        self.mutate(|tree| tree.append(parent, kind))
    }

    pub fn append_text(&self, parent: NodeId, text: &str) -> Result<NodeId> {
        self.mutate(|tree| tree.append(parent, NodeKind::Text(text.to_string())))
    }

    pub fn remove(&self, node: NodeId) -> Result<()> {
        self.mutate(|tree| tree.remove(node))
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<()> {
        self.mutate(|tree| match &mut tree.node_mut(node)?.kind {
            NodeKind::Element { attributes, .. } => {
                attributes.insert(name.to_string(), value.to_string());
                Ok(())
            }
            NodeKind::Text(_) => Err(WatchError::document(format!("node {} is a text node", node))),
        })
    }

    pub fn set_text(&self, node: NodeId, text: &str) -> Result<()> {
        self.mutate(|tree| match &mut tree.node_mut(node)?.kind {
            NodeKind::Text(content) => {
                *content = text.to_string();
                Ok(())
            }
            NodeKind::Element { .. } => Err(WatchError::document(format!("node {} is an element", node))),
        })
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        match &self.tree.read().node(node).ok()?.kind {
            NodeKind::Element { attributes, .. } => attributes.get(name).cloned(),
            NodeKind::Text(_) => None,
        }
    }

    pub fn tag(&self, node: NodeId) -> Option<String> {
        match &self.tree.read().node(node).ok()?.kind {
            NodeKind::Element { tag, .. } => Some(tag.clone()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn count_now(&self) -> u64 {
        let tree = self.tree.read();
        tree.count_elements(tree.root)
    }

    /// Live change subscriptions
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|sender| !sender.is_closed());
        subscribers.len()
    }

    fn mutate<T>(&self, apply: impl FnOnce(&mut Tree) -> Result<T>) -> Result<T> {
        let (value, count) = {
            let mut tree = self.tree.write();
            let value = apply(&mut tree)?;
            let root = tree.root;
            (value, tree.count_elements(root))
        };
        self.subscribers.lock().retain(|sender| sender.notify(count));
        Ok(value)
    }
}

#[async_trait]
impl Document for MemoryDocument {
    async fn element_count(&self) -> Result<u64> {
        Ok(self.count_now())
    }

    async fn subscribe(&self) -> Result<Option<MutationFeed>> {
        match self.support {
            MutationSupport::Unavailable => Ok(None),
            MutationSupport::Failing => Err(WatchError::document("change subscription rejected")),
            MutationSupport::Available => {
                let (sender, feed) = mutation_channel();
                self.subscribers.lock().push(sender);
                Ok(Some(feed))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{FeedPoll, MutationBatch};

    #[test]
    fn counts_elements_recursively_ignoring_text() {
        let doc = MemoryDocument::new();
        assert_eq!(doc.count_now(), 3);

        let body = doc.body();
        let list = doc.append_element(body, "ul").unwrap();
        for _ in 0..3 {
            let item = doc.append_element(list, "li").unwrap();
            doc.append_text(item, "entry").unwrap();
        }
        assert_eq!(doc.count_now(), 7);
    }

    #[test]
    fn counting_an_unchanged_tree_is_idempotent() {
        let doc = MemoryDocument::new();
        let div = doc.append_element(doc.body(), "div").unwrap();
        doc.append_element(div, "span").unwrap();
        assert_eq!(doc.count_now(), doc.count_now());
    }

    #[test]
    fn removing_a_node_drops_its_subtree() {
        let doc = MemoryDocument::new();
        let section = doc.append_element(doc.body(), "section").unwrap();
        let inner = doc.append_element(section, "p").unwrap();
        doc.append_element(inner, "em").unwrap();
        assert_eq!(doc.count_now(), 6);

        doc.remove(section).unwrap();
        assert_eq!(doc.count_now(), 3);
        assert!(doc.tag(inner).is_none());
        assert!(doc.remove(doc.root()).is_err());
    }

    #[test]
    fn rejects_invalid_targets() {
        let doc = MemoryDocument::new();
        let text = doc.append_text(doc.body(), "hello").unwrap();
        assert!(doc.append_element(text, "div").is_err());
        assert!(doc.set_attribute(text, "class", "x").is_err());
        assert!(doc.set_text(doc.body(), "x").is_err());
        assert!(doc.append_element(999, "div").is_err());
    }

    #[test]
    fn attributes_round_trip() {
        let doc = MemoryDocument::new();
        doc.set_attribute(doc.body(), "class", "loading").unwrap();
        assert_eq!(doc.attribute(doc.body(), "class").as_deref(), Some("loading"));
        assert_eq!(doc.tag(doc.body()).as_deref(), Some("body"));
    }

    #[tokio::test]
    async fn subscribers_receive_recounted_totals() {
        let doc = MemoryDocument::new();
        let mut feed = doc.subscribe().await.unwrap().unwrap();

        let div = doc.append_element(doc.body(), "div").unwrap();
        doc.set_attribute(div, "id", "main").unwrap();

        assert_eq!(feed.poll_batch(), FeedPoll::Batch(MutationBatch { element_count: 4 }));
        assert_eq!(feed.poll_batch(), FeedPoll::Batch(MutationBatch { element_count: 4 }));
        assert_eq!(feed.poll_batch(), FeedPoll::Empty);

        assert_eq!(doc.subscriber_count(), 1);
        drop(feed);
        assert_eq!(doc.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn subscription_capability_variants() {
        assert!(MemoryDocument::without_mutation_support().subscribe().await.unwrap().is_none());
        assert!(MemoryDocument::with_failing_subscription().subscribe().await.is_err());
    }
}
