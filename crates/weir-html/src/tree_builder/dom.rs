//! The document the reference tree builder produces.
//!
//! An arena-based tree following the [DOM Living Standard](https://dom.spec.whatwg.org/):
//! nodes live in one vector and refer to each other by [`NodeId`].

use core::fmt::Write as _;

use serde::Serialize;

use crate::tokenizer::Attribute;

/// A type-safe index into a [`Document`].
///
/// [§ 4.4 Interface Node](https://dom.spec.whatwg.org/#interface-node)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NodeId(pub usize);

impl NodeId {
    /// The document (or fragment) node is always at index 0.
    pub const ROOT: Self = Self(0);
}

/// [§ 4.4 Interface Node](https://dom.spec.whatwg.org/#interface-node)
///
/// "Node is an abstract interface that is used by all nodes in a tree."
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    /// "Each node has an associated node type"
    pub node_type: NodeType,

    /// [§ 4.4](https://dom.spec.whatwg.org/#concept-tree-parent)
    /// "An object that participates in a tree has a parent, which is either
    /// null or an object."
    pub parent: Option<NodeId>,

    /// [§ 4.4](https://dom.spec.whatwg.org/#concept-tree-child)
    /// "A node has an associated list of children"
    pub children: Vec<NodeId>,
}

/// [§ 4.4 Interface Node](https://dom.spec.whatwg.org/#interface-node)
///
/// "Each node has an associated node type"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NodeType {
    /// [§ 4.5 Interface Document](https://dom.spec.whatwg.org/#interface-document)
    Document,
    /// [§ 4.7 Interface DocumentFragment](https://dom.spec.whatwg.org/#interface-documentfragment)
    DocumentFragment,
    /// [§ 4.6 Interface DocumentType](https://dom.spec.whatwg.org/#interface-documenttype)
    /// "Doctypes have an associated name"
    Doctype(String),
    /// [§ 4.9 Interface Element](https://dom.spec.whatwg.org/#interface-element)
    Element(ElementData),
    /// [§ 4.11 Interface Text](https://dom.spec.whatwg.org/#interface-text)
    Text(String),
    /// [§ 4.14 Interface Comment](https://dom.spec.whatwg.org/#interface-comment)
    Comment(String),
}

/// Element-specific data: the local name and the attribute list, in source
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementData {
    /// "An element's local name"
    pub tag_name: String,
    /// "An element has an associated attribute list"
    pub attributes: Vec<Attribute>,
}

impl ElementData {
    /// The value of the attribute named `name`.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    /// Whether the attribute named `name` is present.
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|attr| attr.name == name)
    }
}

/// Arena-based document tree.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    nodes: Vec<Node>,
    finished: bool,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    fn with_root(node_type: NodeType) -> Self {
        Self {
            nodes: vec![Node {
                node_type,
                parent: None,
                children: Vec::new(),
            }],
            finished: false,
        }
    }

    /// A tree holding only a Document node.
    #[must_use]
    pub fn new() -> Self {
        Self::with_root(NodeType::Document)
    }

    /// A tree holding only a `DocumentFragment` node.
    #[must_use]
    pub fn new_fragment() -> Self {
        Self::with_root(NodeType::DocumentFragment)
    }

    /// The root node.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Get a node by its ID.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// The children of `id`; empty for an unknown node.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.get(id) {
            Some(node) => &node.children,
            None => &[],
        }
    }

    /// The element data of `id`, if it is an element.
    #[must_use]
    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.get(id)?.node_type {
            NodeType::Element(data) => Some(data),
            _ => None,
        }
    }

    /// Number of nodes, the root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: the root is allocated on creation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// [§ 13.2.7 The end](https://html.spec.whatwg.org/multipage/parsing.html#the-end)
    ///
    /// Whether the parser reported that it finished.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    pub(crate) const fn mark_finished(&mut self) {
        self.finished = true;
    }

    /// [§ 4.2.2 Append](https://dom.spec.whatwg.org/#concept-node-append)
    ///
    /// Allocate a node and append it as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, node_type: NodeType) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            node_type,
            parent: Some(parent),
            children: Vec::new(),
        });
        if let Some(parent) = self.nodes.get_mut(parent.0) {
            parent.children.push(id);
        }
        id
    }

    /// [§ 13.2.6.1 Inserting a character](https://html.spec.whatwg.org/multipage/parsing.html#insert-a-character)
    ///
    /// "If there is a Text node immediately before the adjusted insertion
    /// location, then append data to that Text node's data. Otherwise,
    /// create a new Text node whose data is data".
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        if text.is_empty() {
            return;
        }
        let last = self.children(parent).last().copied();
        if let Some(last) = last
            && let Some(Node {
                node_type: NodeType::Text(existing),
                ..
            }) = self.nodes.get_mut(last.0)
        {
            existing.push_str(text);
            return;
        }
        let _ = self.append(parent, NodeType::Text(text.to_string()));
    }

    /// [§ 4.4](https://dom.spec.whatwg.org/#concept-child-text-content)
    ///
    /// "The child text content of a node node is the concatenation of the
    /// data of all the Text node children of node, in tree order."
    #[must_use]
    pub fn child_text_content(&self, id: NodeId) -> String {
        self.children(id)
            .iter()
            .filter_map(|child| match &self.get(*child)?.node_type {
                NodeType::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Every element named `tag_name`, in tree order.
    #[must_use]
    pub fn elements_by_tag_name(&self, tag_name: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            if self.element(id).is_some_and(|data| data.tag_name == tag_name) {
                found.push(id);
            }
            stack.extend(self.children(id).iter().rev());
        }
        found
    }
}

/// Render the subtree under `id`, one node per line, indented two spaces
/// per level. Text is shown with spaces as `·` so whitespace is visible.
#[must_use]
pub fn render_tree(document: &Document, id: NodeId) -> String {
    let mut out = String::new();
    render_node(document, id, 0, &mut out);
    out
}

fn render_node(document: &Document, id: NodeId, depth: usize, out: &mut String) {
    let Some(node) = document.get(id) else {
        return;
    };
    let indent = "  ".repeat(depth);
    let _ = match &node.node_type {
        NodeType::Document => writeln!(out, "{indent}#document"),
        NodeType::DocumentFragment => writeln!(out, "{indent}#document-fragment"),
        NodeType::Doctype(name) => writeln!(out, "{indent}<!DOCTYPE {name}>"),
        NodeType::Element(data) => {
            let attrs: String = data
                .attributes
                .iter()
                .map(|attr| format!(" {}=\"{}\"", attr.name, attr.value))
                .collect();
            writeln!(out, "{indent}<{}{attrs}>", data.tag_name)
        }
        NodeType::Text(text) => writeln!(
            out,
            "{indent}\"{}\"",
            text.replace(' ', "·").escape_debug()
        ),
        NodeType::Comment(data) => writeln!(out, "{indent}<!-- {data} -->"),
    };
    for child in &node.children {
        render_node(document, *child, depth + 1, out);
    }
}

/// Print the subtree under `id` to stdout.
pub fn print_tree(document: &Document, id: NodeId) {
    print!("{}", render_tree(document, id));
}
