//! Display-tree adapter and an in-memory host implementation.

use std::fmt::Write as _;

use indexmap::IndexMap;

use crate::error::NodeError;
use crate::vnode::{Event, EventHandler, Key, PropValue};
use crate::NodeId;

/// Mutable display tree supplied by the host platform.
///
/// Nodes are addressed by [`NodeId`]. `insert_child` expects a detached node;
/// reordering attached children goes through `move_child`.
pub trait Applier {
    fn create_element(&mut self, tag: &str) -> NodeId;
    fn create_text(&mut self, text: &str) -> NodeId;
    fn set_attribute(&mut self, node: NodeId, name: &str, value: &PropValue)
        -> Result<(), NodeError>;
    fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), NodeError>;
    fn add_listener(
        &mut self,
        node: NodeId,
        event: &str,
        handler: &EventHandler,
    ) -> Result<(), NodeError>;
    fn remove_listener(
        &mut self,
        node: NodeId,
        event: &str,
        handler: &EventHandler,
    ) -> Result<(), NodeError>;
    fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId)
        -> Result<(), NodeError>;
    /// Detaches and discards the child at `index`, returning its id.
    fn remove_child(&mut self, parent: NodeId, index: usize) -> Result<NodeId, NodeError>;
    /// Detaches the child at `index` but keeps it for a later `insert_child`.
    fn detach_child(&mut self, parent: NodeId, index: usize) -> Result<NodeId, NodeError>;
    /// Puts `child` at `index`, discarding the node it displaces.
    fn replace_child(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<NodeId, NodeError>;
    fn move_child(&mut self, parent: NodeId, from: usize, to: usize) -> Result<(), NodeError>;
    fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), NodeError>;
    fn child_count(&self, parent: NodeId) -> Result<usize, NodeError>;
    fn child_at(&self, parent: NodeId, index: usize) -> Result<Option<NodeId>, NodeError>;
    fn set_marker(&mut self, node: NodeId, key: &Key) -> Result<(), NodeError>;
    fn marker(&self, node: NodeId) -> Option<Key>;

    /// Frees a node that was built but never attached.
    fn release(&mut self, _node: NodeId) {}

    fn index_of(&self, parent: NodeId, child: NodeId) -> Result<Option<usize>, NodeError> {
        let count = self.child_count(parent)?;
        for index in 0..count {
            if self.child_at(parent, index)? == Some(child) {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Position of the child carrying the identity marker `key`.
    fn find_keyed(&self, parent: NodeId, key: &Key) -> Result<Option<usize>, NodeError> {
        let count = self.child_count(parent)?;
        for index in 0..count {
            if let Some(child) = self.child_at(parent, index)? {
                if self.marker(child).as_ref() == Some(key) {
                    return Ok(Some(index));
                }
            }
        }
        Ok(None)
    }
}

/// One display-tree mutation, as recorded by [`MemoryApplier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    CreateElement { node: NodeId, tag: String },
    CreateText { node: NodeId, text: String },
    SetAttribute { node: NodeId, name: String },
    RemoveAttribute { node: NodeId, name: String },
    AddListener { node: NodeId, event: String },
    RemoveListener { node: NodeId, event: String },
    InsertChild { parent: NodeId, index: usize, child: NodeId },
    RemoveChild { parent: NodeId, index: usize, child: NodeId },
    DetachChild { parent: NodeId, index: usize, child: NodeId },
    ReplaceChild { parent: NodeId, index: usize, child: NodeId },
    MoveChild { parent: NodeId, from: usize, to: usize },
    SetText { node: NodeId, text: String },
    SetMarker { node: NodeId, key: String },
}

impl Mutation {
    /// Whether the mutation changes content (attributes, listeners or text)
    /// rather than structure.
    pub fn is_content_update(&self) -> bool {
        matches!(
            self,
            Mutation::SetAttribute { .. }
                | Mutation::RemoveAttribute { .. }
                | Mutation::AddListener { .. }
                | Mutation::RemoveListener { .. }
                | Mutation::SetText { .. }
        )
    }
}

#[derive(Debug)]
enum HostKind {
    Element {
        tag: String,
        attributes: IndexMap<String, PropValue>,
        listeners: Vec<(String, EventHandler)>,
    },
    Text(String),
}

#[derive(Debug)]
struct HostNode {
    kind: HostKind,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    marker: Option<Key>,
}

impl HostNode {
    fn new(kind: HostKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
            parent: None,
            marker: None,
        }
    }
}

/// Arena-backed display tree that records every mutation.
#[derive(Default)]
pub struct MemoryApplier {
    nodes: Vec<Option<HostNode>>,
    mutations: Vec<Mutation>,
}

impl MemoryApplier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a detached container element without logging a mutation.
    pub fn create_root(&mut self, tag: &str) -> NodeId {
        self.alloc(HostNode::new(HostKind::Element {
            tag: tag.to_owned(),
            attributes: IndexMap::new(),
            listeners: Vec::new(),
        }))
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn take_mutations(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.mutations)
    }

    pub fn clear_mutations(&mut self) {
        self.mutations.clear();
    }

    pub fn contains(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id), Some(Some(_)))
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId], NodeError> {
        Ok(&self.node(id)?.children)
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, NodeError> {
        Ok(self.node(id)?.parent)
    }

    pub fn tag(&self, id: NodeId) -> Result<Option<&str>, NodeError> {
        Ok(match &self.node(id)?.kind {
            HostKind::Element { tag, .. } => Some(tag.as_str()),
            HostKind::Text(_) => None,
        })
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Result<Option<&PropValue>, NodeError> {
        Ok(match &self.node(id)?.kind {
            HostKind::Element { attributes, .. } => attributes.get(name),
            HostKind::Text(_) => None,
        })
    }

    pub fn listener_count(&self, id: NodeId, event: &str) -> Result<usize, NodeError> {
        Ok(match &self.node(id)?.kind {
            HostKind::Element { listeners, .. } => listeners
                .iter()
                .filter(|(name, _)| name == event)
                .count(),
            HostKind::Text(_) => 0,
        })
    }

    /// Concatenated text of the subtree rooted at `id`.
    pub fn text_content(&self, id: NodeId) -> Result<String, NodeError> {
        let mut out = String::new();
        self.collect_text(id, &mut out)?;
        Ok(out)
    }

    fn collect_text(&self, id: NodeId, out: &mut String) -> Result<(), NodeError> {
        let node = self.node(id)?;
        if let HostKind::Text(text) = &node.kind {
            out.push_str(text);
        }
        for child in &node.children {
            self.collect_text(*child, out)?;
        }
        Ok(())
    }

    /// Invokes every listener bound for `event` on `id` and returns how many ran.
    pub fn dispatch(&self, id: NodeId, event: &str) -> Result<usize, NodeError> {
        let handlers: Vec<EventHandler> = match &self.node(id)?.kind {
            HostKind::Element { listeners, .. } => listeners
                .iter()
                .filter(|(name, _)| name == event)
                .map(|(_, handler)| handler.clone())
                .collect(),
            HostKind::Text(_) => Vec::new(),
        };
        let payload = Event::new(event, id);
        for handler in &handlers {
            handler.call(&payload);
        }
        Ok(handlers.len())
    }

    /// Finds the first element in document order whose attribute `name`
    /// equals `value`.
    pub fn find_by_attribute(&self, root: NodeId, name: &str, value: &str) -> Option<NodeId> {
        let node = self.node(root).ok()?;
        if let HostKind::Element { attributes, .. } = &node.kind {
            if attributes.get(name).and_then(PropValue::as_str) == Some(value) {
                return Some(root);
            }
        }
        node.children
            .iter()
            .find_map(|child| self.find_by_attribute(*child, name, value))
    }

    /// Serialises the children of `id` as markup, e.g. `<ul><li>a</li></ul>`.
    ///
    /// Attribute values are written verbatim; this is a debugging view, not a
    /// server renderer.
    pub fn markup(&self, id: NodeId) -> Result<String, NodeError> {
        let mut out = String::new();
        for child in &self.node(id)?.children {
            self.write_markup(*child, &mut out)?;
        }
        Ok(out)
    }

    fn write_markup(&self, id: NodeId, out: &mut String) -> Result<(), NodeError> {
        let node = self.node(id)?;
        match &node.kind {
            HostKind::Text(text) => out.push_str(text),
            HostKind::Element {
                tag, attributes, ..
            } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    if let Some(value) = value.to_attribute_string() {
                        let _ = write!(out, " {name}=\"{value}\"");
                    }
                }
                out.push('>');
                for child in &node.children {
                    self.write_markup(*child, out)?;
                }
                let _ = write!(out, "</{tag}>");
            }
        }
        Ok(())
    }

    pub fn dump_tree(&self, root: Option<NodeId>) -> String {
        let mut output = String::new();
        if let Some(root_id) = root {
            self.dump_node(&mut output, root_id, 0);
        } else {
            output.push_str("(no root)\n");
        }
        output
    }

    fn dump_node(&self, output: &mut String, id: NodeId, depth: usize) {
        let indent = "  ".repeat(depth);
        match self.nodes.get(id) {
            Some(Some(node)) => {
                let marker = node
                    .marker
                    .as_ref()
                    .map(|key| format!(" key={key}"))
                    .unwrap_or_default();
                let _ = match &node.kind {
                    HostKind::Element { tag, .. } => {
                        writeln!(output, "{indent}[{id}] <{tag}>{marker}")
                    }
                    HostKind::Text(text) => writeln!(output, "{indent}[{id}] {text:?}"),
                };
                for child in &node.children {
                    self.dump_node(output, *child, depth + 1);
                }
            }
            _ => {
                let _ = writeln!(output, "{indent}[{id}] (missing)");
            }
        }
    }

    fn alloc(&mut self, node: HostNode) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Some(node));
        id
    }

    fn node(&self, id: NodeId) -> Result<&HostNode, NodeError> {
        self.nodes
            .get(id)
            .and_then(Option::as_ref)
            .ok_or(NodeError::Missing { id })
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut HostNode, NodeError> {
        self.nodes
            .get_mut(id)
            .and_then(Option::as_mut)
            .ok_or(NodeError::Missing { id })
    }

    fn element_mut(
        &mut self,
        id: NodeId,
        what: &'static str,
    ) -> Result<
        (
            &mut IndexMap<String, PropValue>,
            &mut Vec<(String, EventHandler)>,
        ),
        NodeError,
    > {
        match &mut self.node_mut(id)?.kind {
            HostKind::Element {
                attributes,
                listeners,
                ..
            } => Ok((attributes, listeners)),
            HostKind::Text(_) => Err(NodeError::NotAnElement { id, what }),
        }
    }

    fn check_index(&self, parent: NodeId, index: usize, inclusive: bool) -> Result<(), NodeError> {
        let len = self.node(parent)?.children.len();
        let in_bounds = if inclusive { index <= len } else { index < len };
        if in_bounds {
            Ok(())
        } else {
            Err(NodeError::IndexOutOfBounds { parent, index, len })
        }
    }

    /// Drops a detached subtree from the arena.
    fn free(&mut self, id: NodeId) {
        let children = match self.nodes.get_mut(id).and_then(Option::take) {
            Some(node) => node.children,
            None => return,
        };
        for child in children {
            self.free(child);
        }
    }
}

impl Applier for MemoryApplier {
    fn create_element(&mut self, tag: &str) -> NodeId {
        let id = self.create_root(tag);
        self.mutations.push(Mutation::CreateElement {
            node: id,
            tag: tag.to_owned(),
        });
        id
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        let id = self.alloc(HostNode::new(HostKind::Text(text.to_owned())));
        self.mutations.push(Mutation::CreateText {
            node: id,
            text: text.to_owned(),
        });
        id
    }

    fn set_attribute(
        &mut self,
        node: NodeId,
        name: &str,
        value: &PropValue,
    ) -> Result<(), NodeError> {
        let (attributes, _) = self.element_mut(node, "attributes")?;
        attributes.insert(name.to_owned(), value.clone());
        self.mutations.push(Mutation::SetAttribute {
            node,
            name: name.to_owned(),
        });
        Ok(())
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), NodeError> {
        let (attributes, _) = self.element_mut(node, "attributes")?;
        attributes.shift_remove(name);
        self.mutations.push(Mutation::RemoveAttribute {
            node,
            name: name.to_owned(),
        });
        Ok(())
    }

    fn add_listener(
        &mut self,
        node: NodeId,
        event: &str,
        handler: &EventHandler,
    ) -> Result<(), NodeError> {
        let (_, listeners) = self.element_mut(node, "listeners")?;
        listeners.push((event.to_owned(), handler.clone()));
        self.mutations.push(Mutation::AddListener {
            node,
            event: event.to_owned(),
        });
        Ok(())
    }

    fn remove_listener(
        &mut self,
        node: NodeId,
        event: &str,
        handler: &EventHandler,
    ) -> Result<(), NodeError> {
        let (_, listeners) = self.element_mut(node, "listeners")?;
        listeners.retain(|(name, bound)| !(name == event && bound == handler));
        self.mutations.push(Mutation::RemoveListener {
            node,
            event: event.to_owned(),
        });
        Ok(())
    }

    fn insert_child(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<(), NodeError> {
        self.check_index(parent, index, true)?;
        self.node_mut(child)?.parent = Some(parent);
        self.node_mut(parent)?.children.insert(index, child);
        self.mutations.push(Mutation::InsertChild {
            parent,
            index,
            child,
        });
        Ok(())
    }

    fn remove_child(&mut self, parent: NodeId, index: usize) -> Result<NodeId, NodeError> {
        self.check_index(parent, index, false)?;
        let child = self.node_mut(parent)?.children.remove(index);
        self.free(child);
        self.mutations.push(Mutation::RemoveChild {
            parent,
            index,
            child,
        });
        Ok(child)
    }

    fn detach_child(&mut self, parent: NodeId, index: usize) -> Result<NodeId, NodeError> {
        self.check_index(parent, index, false)?;
        let child = self.node_mut(parent)?.children.remove(index);
        self.node_mut(child)?.parent = None;
        self.mutations.push(Mutation::DetachChild {
            parent,
            index,
            child,
        });
        Ok(child)
    }

    fn replace_child(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<NodeId, NodeError> {
        self.check_index(parent, index, false)?;
        self.node_mut(child)?.parent = Some(parent);
        let previous = std::mem::replace(&mut self.node_mut(parent)?.children[index], child);
        self.free(previous);
        self.mutations.push(Mutation::ReplaceChild {
            parent,
            index,
            child,
        });
        Ok(previous)
    }

    fn move_child(&mut self, parent: NodeId, from: usize, to: usize) -> Result<(), NodeError> {
        self.check_index(parent, from, false)?;
        self.check_index(parent, to, false)?;
        let children = &mut self.node_mut(parent)?.children;
        let child = children.remove(from);
        children.insert(to, child);
        self.mutations.push(Mutation::MoveChild { parent, from, to });
        Ok(())
    }

    fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), NodeError> {
        match &mut self.node_mut(node)?.kind {
            HostKind::Text(current) => {
                current.clear();
                current.push_str(text);
            }
            HostKind::Element { .. } => return Err(NodeError::NotText { id: node }),
        }
        self.mutations.push(Mutation::SetText {
            node,
            text: text.to_owned(),
        });
        Ok(())
    }

    fn child_count(&self, parent: NodeId) -> Result<usize, NodeError> {
        Ok(self.node(parent)?.children.len())
    }

    fn child_at(&self, parent: NodeId, index: usize) -> Result<Option<NodeId>, NodeError> {
        Ok(self.node(parent)?.children.get(index).copied())
    }

    fn set_marker(&mut self, node: NodeId, key: &Key) -> Result<(), NodeError> {
        self.node_mut(node)?.marker = Some(key.clone());
        self.mutations.push(Mutation::SetMarker {
            node,
            key: key.to_string(),
        });
        Ok(())
    }

    fn marker(&self, node: NodeId) -> Option<Key> {
        self.node(node).ok().and_then(|node| node.marker.clone())
    }

    fn release(&mut self, node: NodeId) {
        let detached = matches!(self.node(node), Ok(HostNode { parent: None, .. }));
        if detached {
            self.free(node);
        }
    }
}

#[cfg(test)]
#[path = "tests/applier_tests.rs"]
mod tests;
