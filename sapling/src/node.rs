//! Borrowed node handle.

use std::fmt;

use crate::document::{Document, NodeId, NodeKind};
use crate::error::SelectorError;
use crate::serialize::{SerializeOptions, Syntax, serialize_children, serialize_node};

/// A node together with the document it lives in.
///
/// Holding a `NodeRef` borrows the document, so it cannot outlive a mutation.
/// Keep the [`NodeId`] (via [`NodeRef::id`]) across edits instead.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    doc: &'a Document,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub(crate) fn new(doc: &'a Document, id: NodeId) -> Self {
        NodeRef { doc, id }
    }

    fn wrap(&self, id: Option<NodeId>) -> Option<NodeRef<'a>> {
        id.map(|id| NodeRef::new(self.doc, id))
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn document(&self) -> &'a Document {
        self.doc
    }

    pub fn kind(&self) -> Option<&'a NodeKind> {
        self.doc.get(self.id)
    }

    pub fn is_element(&self) -> bool {
        self.doc.is_element(self.id)
    }

    /// Tag name with prefix, `None` for non-elements.
    pub fn tag_name(&self) -> Option<String> {
        self.doc.element(self.id).map(|elem| elem.tag_name())
    }

    /// Concatenated text of the subtree.
    pub fn content(&self) -> String {
        self.doc.text_content(self.id).unwrap_or_default()
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.doc.element(self.id)?.attr(name)
    }

    /// Attributes in source order. Empty for non-elements.
    pub fn attrs(&self) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.doc
            .element(self.id)
            .into_iter()
            .flat_map(|elem| elem.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    pub fn class_name(&self) -> Option<&'a str> {
        self.attr("class")
    }

    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.wrap(self.doc.parent(self.id))
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let doc = self.doc;
        doc.children(self.id).map(move |id| NodeRef::new(doc, id))
    }

    pub fn element_children(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let doc = self.doc;
        doc.element_children(self.id)
            .map(move |id| NodeRef::new(doc, id))
    }

    pub fn prev_sibling(&self) -> Option<NodeRef<'a>> {
        self.wrap(self.doc.prev_sibling(self.id))
    }

    pub fn next_sibling(&self) -> Option<NodeRef<'a>> {
        self.wrap(self.doc.next_sibling(self.id))
    }

    pub fn prev_element_sibling(&self) -> Option<NodeRef<'a>> {
        self.wrap(self.doc.prev_element_sibling(self.id))
    }

    pub fn next_element_sibling(&self) -> Option<NodeRef<'a>> {
        self.wrap(self.doc.next_element_sibling(self.id))
    }

    /// Markup of this node and its subtree, in XML syntax.
    pub fn to_xml(&self) -> String {
        self.to_xml_with(&SerializeOptions::default())
    }

    pub fn to_xml_with(&self, opts: &SerializeOptions) -> String {
        serialize_node(self.doc, self.id, Syntax::Xml, opts).unwrap_or_default()
    }

    pub fn to_html(&self) -> String {
        serialize_node(self.doc, self.id, Syntax::Html, &SerializeOptions::default())
            .unwrap_or_default()
    }

    /// Markup of the children only.
    pub fn inner_xml(&self) -> String {
        serialize_children(self.doc, self.id, Syntax::Xml, &SerializeOptions::default())
            .unwrap_or_default()
    }

    pub fn inner_html(&self) -> String {
        serialize_children(self.doc, self.id, Syntax::Html, &SerializeOptions::default())
            .unwrap_or_default()
    }

    /// Descendants of this node matching `selector`, in document order.
    pub fn css(&self, selector: &str) -> Result<Vec<NodeRef<'a>>, SelectorError> {
        let found = self.doc.css_within(self.id, selector)?;
        Ok(found
            .into_iter()
            .map(|id| NodeRef::new(self.doc, id))
            .collect())
    }

    pub fn at_css(&self, selector: &str) -> Result<Option<NodeRef<'a>>, SelectorError> {
        let found = self.doc.at_css_within(self.id, selector)?;
        Ok(self.wrap(found))
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.doc, other.doc) && self.id == other.id
    }
}

impl Eq for NodeRef<'_> {}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(NodeKind::Element(elem)) => write!(f, "<{}> {:?}", elem.tag_name(), self.id),
            Some(NodeKind::Text(text)) => write!(f, "text {:?} {:?}", text, self.id),
            Some(NodeKind::Comment(_)) => write!(f, "comment {:?}", self.id),
            Some(NodeKind::ProcessingInstruction { target, .. }) => {
                write!(f, "<?{}> {:?}", target, self.id)
            }
            Some(NodeKind::Document) => write!(f, "document {:?}", self.id),
            None => write!(f, "removed {:?}", self.id),
        }
    }
}
