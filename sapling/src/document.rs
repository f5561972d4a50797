//! Arena-based document: every node of a parsed tree lives in one
//! `indextree` arena, and relations between nodes are arena indices.
//!
//! The invisible document node is the parent of the root element (and of any
//! top-level comments or processing instructions). Nodes created by
//! [`Document::import`], [`Document::create_element`] or detached with
//! [`Document::remove`] stay in the arena as fragments until re-inserted.

use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use indextree::{Arena, NodeEdge};
use markup5ever::{LocalName, Namespace, Prefix, QualName};

use crate::error::MutationError;
use crate::node::NodeRef;

/// Slot in a document's arena. Never leaves the crate; callers get [`NodeId`].
pub(crate) type ArenaId = indextree::NodeId;

static NEXT_DOCUMENT: AtomicU64 = AtomicU64::new(1);

/// Distinguishes documents so an id from one is never resolved in another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct DocumentId(u64);

impl DocumentId {
    fn next() -> Self {
        DocumentId(NEXT_DOCUMENT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A node of one particular [`Document`].
///
/// Ids stay valid across edits. An id is unknown to every other document,
/// clones of its own document included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    doc: DocumentId,
    index: ArenaId,
}

/// Which grammar produced the document. Decides selector case sensitivity and
/// the default serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Xml,
    Html,
}

/// What goes in each arena slot
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Document root (invisible, parent of the root element)
    Document,
    /// Element with qualified name and attributes
    Element(ElementData),
    Text(String),
    Comment(String),
    ProcessingInstruction { target: String, data: String },
}

/// Element name and attributes.
#[derive(Debug, Clone)]
pub struct ElementData {
    pub name: QualName,

    /// Keyed by qualified attribute name (`xml:lang`, `xmlns:foo`).
    /// IndexMap keeps source order for serialization.
    pub attrs: IndexMap<String, String>,

    /// Namespaces of the prefixed attributes, by prefix. The XML parser
    /// consumes `xmlns` declarations, so this and `name.ns` are what the
    /// serializer declares from.
    pub attr_namespaces: Vec<(Prefix, Namespace)>,
}

impl ElementData {
    /// Create an element from a possibly prefixed name (`ns:tag`).
    pub fn new(name: &str, ns: Namespace) -> Self {
        ElementData {
            name: qualify(name, ns),
            attrs: IndexMap::new(),
            attr_namespaces: Vec::new(),
        }
    }

    pub fn local_name(&self) -> &str {
        &self.name.local
    }

    /// Tag name as written in markup, including the prefix.
    pub fn tag_name(&self) -> String {
        match &self.name.prefix {
            Some(prefix) => format!("{}:{}", &**prefix, &*self.name.local),
            None => self.name.local.to_string(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class))
    }
}

fn qualify(name: &str, ns: Namespace) -> QualName {
    match name.split_once(':') {
        Some((prefix, local)) => QualName::new(Some(Prefix::from(prefix)), ns, LocalName::from(local)),
        None => QualName::new(None, ns, LocalName::from(name)),
    }
}

/// A parsed XML or HTML document.
///
/// Cloning gives an independent document with its own identity: ids taken
/// from the original are unknown to the clone.
#[derive(Debug)]
pub struct Document {
    uid: DocumentId,
    pub(crate) arena: Arena<NodeKind>,
    pub(crate) document: ArenaId,
    pub(crate) kind: DocumentKind,
    /// Data of the `<?xml ...?>` declaration, without the delimiters
    pub(crate) declaration: Option<String>,
    pub(crate) doctype: Option<String>,
    pub(crate) parse_errors: Vec<String>,
}

impl Clone for Document {
    fn clone(&self) -> Self {
        Document {
            uid: DocumentId::next(),
            arena: self.arena.clone(),
            document: self.document,
            kind: self.kind,
            declaration: self.declaration.clone(),
            doctype: self.doctype.clone(),
            parse_errors: self.parse_errors.clone(),
        }
    }
}

impl Document {
    /// An empty document holding only the document node.
    pub(crate) fn empty(kind: DocumentKind) -> Self {
        let mut arena = Arena::new();
        let document = arena.new_node(NodeKind::Document);
        Document::from_parts(arena, document, kind)
    }

    pub(crate) fn from_parts(arena: Arena<NodeKind>, document: ArenaId, kind: DocumentKind) -> Self {
        Document {
            uid: DocumentId::next(),
            arena,
            document,
            kind,
            declaration: None,
            doctype: None,
            parse_errors: Vec::new(),
        }
    }

    /// The arena slot behind `id`, if `id` belongs to this document and the
    /// node is live.
    pub(crate) fn resolve(&self, id: NodeId) -> Option<ArenaId> {
        if id.doc != self.uid {
            return None;
        }
        self.arena
            .get(id.index)
            .is_some_and(|node| !node.is_removed())
            .then_some(id.index)
    }

    pub(crate) fn handle(&self, index: ArenaId) -> NodeId {
        NodeId {
            doc: self.uid,
            index,
        }
    }

    pub(crate) fn kind_at(&self, index: ArenaId) -> &NodeKind {
        self.arena[index].get()
    }

    pub(crate) fn element_at(&self, index: ArenaId) -> Option<&ElementData> {
        match self.kind_at(index) {
            NodeKind::Element(elem) => Some(elem),
            _ => None,
        }
    }

    pub(crate) fn is_element_at(&self, index: ArenaId) -> bool {
        matches!(self.kind_at(index), NodeKind::Element(_))
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// The invisible node every top-level node hangs from.
    pub fn document_node(&self) -> NodeId {
        self.handle(self.document)
    }

    /// Data of the XML declaration, e.g. `version="1.0"`.
    pub fn declaration(&self) -> Option<&str> {
        self.declaration.as_deref()
    }

    pub fn doctype(&self) -> Option<&str> {
        self.doctype.as_deref()
    }

    /// Diagnostics the parser recovered from.
    pub fn parse_errors(&self) -> &[String] {
        &self.parse_errors
    }

    /// Whether `id` addresses a live node of this document.
    pub fn contains(&self, id: NodeId) -> bool {
        self.resolve(id).is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeKind> {
        self.resolve(id).map(|index| self.kind_at(index))
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.element_at(self.resolve(id)?)
    }

    pub(crate) fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData, MutationError> {
        let index = self.resolve(id).ok_or(MutationError::UnknownNode)?;
        match self.arena[index].get_mut() {
            NodeKind::Element(elem) => Ok(elem),
            _ => Err(MutationError::NotAnElement),
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    /// Borrowed view of a node.
    pub fn node(&self, id: NodeId) -> Option<NodeRef<'_>> {
        self.contains(id).then(|| NodeRef::new(self, id))
    }

    pub(crate) fn root_index(&self) -> Option<ArenaId> {
        self.document
            .children(&self.arena)
            .find(|&index| self.is_element_at(index))
    }

    /// First element child of the document node.
    pub fn root_element(&self) -> Option<NodeId> {
        self.root_index().map(|index| self.handle(index))
    }

    pub fn root(&self) -> Option<NodeRef<'_>> {
        self.root_element().map(|id| NodeRef::new(self, id))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.arena[self.resolve(id)?].parent()?;
        Some(self.handle(parent))
    }

    /// Parent, if it is an element (the document node is not).
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|&p| self.is_element(p))
    }

    /// Children in order. Unknown ids have no children.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.resolve(id)
            .into_iter()
            .flat_map(move |index| index.children(&self.arena))
            .map(move |child| self.handle(child))
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id).filter(move |&child| self.is_element(child))
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        let prev = self.arena[self.resolve(id)?].previous_sibling()?;
        Some(self.handle(prev))
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let next = self.arena[self.resolve(id)?].next_sibling()?;
        Some(self.handle(next))
    }

    pub fn prev_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let prev = self
            .resolve(id)?
            .preceding_siblings(&self.arena)
            .skip(1)
            .find(|&sib| self.is_element_at(sib))?;
        Some(self.handle(prev))
    }

    pub fn next_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let next = self
            .resolve(id)?
            .following_siblings(&self.arena)
            .skip(1)
            .find(|&sib| self.is_element_at(sib))?;
        Some(self.handle(next))
    }

    /// Concatenated text of all descendant text nodes; the node's own text for
    /// text, comment and processing-instruction nodes.
    pub fn text_content(&self, id: NodeId) -> Option<String> {
        let index = self.resolve(id)?;
        let text = match self.kind_at(index) {
            NodeKind::Text(text) | NodeKind::Comment(text) => text.clone(),
            NodeKind::ProcessingInstruction { data, .. } => data.clone(),
            NodeKind::Document | NodeKind::Element(_) => index
                .descendants(&self.arena)
                .filter_map(|d| match self.kind_at(d) {
                    NodeKind::Text(text) => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
        };
        Some(text)
    }

    /// Copy a subtree of `source` into this document as a detached fragment.
    ///
    /// The source document is left untouched; insert the returned node with
    /// one of the mutation methods.
    pub fn import(&mut self, source: &Document, node: NodeId) -> Result<NodeId, MutationError> {
        let from = source.resolve(node).ok_or(MutationError::UnknownNode)?;
        if from == source.document {
            return Err(MutationError::DocumentNode);
        }

        let mut open: Vec<ArenaId> = Vec::new();
        let mut top = None;
        for edge in from.traverse(&source.arena) {
            match edge {
                NodeEdge::Start(index) => {
                    let copy = self.arena.new_node(source.kind_at(index).clone());
                    match open.last() {
                        Some(&parent) => parent.checked_append(copy, &mut self.arena)?,
                        None => top = Some(copy),
                    }
                    open.push(copy);
                }
                NodeEdge::End(_) => {
                    open.pop();
                }
            }
        }
        debug!("imported subtree {:?} as {:?}", from, top);
        top.map(|index| self.handle(index))
            .ok_or(MutationError::UnknownNode)
    }

    fn html_child(&self, parent: Option<NodeId>, tag: &str) -> Option<NodeId> {
        self.element_children(parent?).find(|&id| {
            self.element(id)
                .is_some_and(|elem| elem.local_name().eq_ignore_ascii_case(tag))
        })
    }

    /// The `<head>` element of an HTML document.
    pub fn head(&self) -> Option<NodeId> {
        self.html_child(self.root_element(), "head")
    }

    /// The `<body>` element of an HTML document.
    pub fn body(&self) -> Option<NodeId> {
        self.html_child(self.root_element(), "body")
    }

    /// Text of `<head><title>`.
    pub fn title(&self) -> Option<String> {
        let title = self.html_child(self.head(), "title")?;
        self.text_content(title)
    }
}
