//! Structural edits on a [`Document`].
//!
//! Every edit validates first and then performs a single `indextree` call, so a
//! rejected edit leaves the tree as it was. Moving a node that already has a
//! parent detaches it in the same call that re-attaches it.

use markup5ever::Namespace;

use crate::document::{ArenaId, Document, DocumentKind, ElementData, NodeId, NodeKind};
use crate::error::MutationError;

const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

impl Document {
    /// Place `new` immediately before `target`.
    ///
    /// ```rust
    /// let mut doc = sapling::parse_xml("<r><a/><b/></r>").unwrap();
    /// let a = doc.at_css("a").unwrap().unwrap();
    /// let b = doc.at_css("b").unwrap().unwrap();
    /// doc.add_prev_sibling(a, b).unwrap();
    /// assert_eq!(doc.to_xml(), "<r><b/><a/></r>");
    /// ```
    pub fn add_prev_sibling(&mut self, target: NodeId, new: NodeId) -> Result<(), MutationError> {
        let (target, new) = self.sibling_check(target, new).map_err(|err| {
            debug!("add_prev_sibling({:?}, {:?}) rejected: {}", target, new, err);
            err
        })?;
        trace!("add_prev_sibling: {:?} before {:?}", new, target);
        target.checked_insert_before(new, &mut self.arena)?;
        Ok(())
    }

    /// Place `new` immediately after `target`.
    pub fn add_next_sibling(&mut self, target: NodeId, new: NodeId) -> Result<(), MutationError> {
        let (target, new) = self.sibling_check(target, new).map_err(|err| {
            debug!("add_next_sibling({:?}, {:?}) rejected: {}", target, new, err);
            err
        })?;
        trace!("add_next_sibling: {:?} after {:?}", new, target);
        target.checked_insert_after(new, &mut self.arena)?;
        Ok(())
    }

    /// Insert `new` at `index` among the children of `parent`. An index at or
    /// past the end appends.
    ///
    /// When `new` is already a child of `parent`, `index` counts the children
    /// left once `new` is taken out.
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        new: NodeId,
        index: usize,
    ) -> Result<(), MutationError> {
        self.insert_clamped(parent, new, index)
    }

    /// Append `new` as the last child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, new: NodeId) -> Result<(), MutationError> {
        self.insert_clamped(parent, new, usize::MAX)
    }

    /// Detach `node` and its subtree. The node stays usable and can be
    /// inserted again.
    pub fn remove(&mut self, node: NodeId) -> Result<(), MutationError> {
        let index = self.resolve(node).ok_or(MutationError::UnknownNode)?;
        if index == self.document {
            return Err(MutationError::DocumentNode);
        }
        if self.is_root_at(index) {
            return Err(MutationError::RootElement);
        }
        trace!("remove: {:?}", index);
        index.detach(&mut self.arena);
        Ok(())
    }

    /// Set an attribute, keeping its position if it already exists.
    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), MutationError> {
        let elem = self.element_mut(node)?;
        elem.attrs.insert(name.to_string(), value.to_string());
        Ok(())
    }

    /// Remove an attribute, returning its old value.
    pub fn remove_attr(&mut self, node: NodeId, name: &str) -> Result<Option<String>, MutationError> {
        let elem = self.element_mut(node)?;
        Ok(elem.attrs.shift_remove(name))
    }

    /// Rename an element. The namespace is kept; a `prefix:` in `name` sets
    /// the prefix.
    pub fn set_tag_name(&mut self, node: NodeId, name: &str) -> Result<(), MutationError> {
        let elem = self.element_mut(node)?;
        let ns = elem.name.ns.clone();
        elem.name = ElementData::new(name, ns).name;
        Ok(())
    }

    /// Replace all children of an element with a single text node. An empty
    /// string leaves the element empty.
    pub fn set_content(&mut self, node: NodeId, text: &str) -> Result<(), MutationError> {
        self.element_mut(node)?;
        let index = self.resolve(node).ok_or(MutationError::UnknownNode)?;
        let children: Vec<_> = index.children(&self.arena).collect();
        for child in children {
            child.remove_subtree(&mut self.arena);
        }
        if !text.is_empty() {
            let text = self.arena.new_node(NodeKind::Text(text.to_string()));
            index.checked_append(text, &mut self.arena)?;
        }
        trace!("set_content: {:?}", index);
        Ok(())
    }

    /// A new detached element. HTML documents put it in the XHTML namespace.
    pub fn create_element(&mut self, name: &str) -> NodeId {
        let ns = match self.kind {
            DocumentKind::Html => Namespace::from(XHTML_NS),
            DocumentKind::Xml => Namespace::from(""),
        };
        self.create_element_ns(name, ns)
    }

    /// A new detached element in `ns`. A `prefix:` in `name` is bound to
    /// `ns` when the element is written as XML.
    pub fn create_element_ns(&mut self, name: &str, ns: impl Into<Namespace>) -> NodeId {
        let index = self
            .arena
            .new_node(NodeKind::Element(ElementData::new(name, ns.into())));
        self.handle(index)
    }

    /// A new detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        let index = self.arena.new_node(NodeKind::Text(text.to_string()));
        self.handle(index)
    }

    /// A new detached comment. The text is kept as given; the serializer
    /// breaks up any `--` it contains.
    pub fn create_comment(&mut self, text: &str) -> NodeId {
        let index = self.arena.new_node(NodeKind::Comment(text.to_string()));
        self.handle(index)
    }

    /// The one path into `checked_append` / `checked_insert_before` for
    /// indexed insertion: pick the child that ends up after `new`, or append.
    fn insert_clamped(
        &mut self,
        parent: NodeId,
        new: NodeId,
        index: usize,
    ) -> Result<(), MutationError> {
        let (parent, new) = self.structure_check(parent, new).map_err(|err| {
            debug!("insert_child({:?}, {:?}, {}) rejected: {}", parent, new, index, err);
            err
        })?;

        let anchor = parent
            .children(&self.arena)
            .filter(|&child| child != new)
            .nth(index);
        match anchor {
            Some(anchor) => {
                trace!("insert_child: {:?} into {:?} at {}", new, parent, index);
                anchor.checked_insert_before(new, &mut self.arena)?;
            }
            None => {
                trace!("insert_child: {:?} appended to {:?}", new, parent);
                parent.checked_append(new, &mut self.arena)?;
            }
        }
        Ok(())
    }

    fn sibling_check(&self, target: NodeId, new: NodeId) -> Result<(ArenaId, ArenaId), MutationError> {
        let target_index = self.resolve(target).ok_or(MutationError::UnknownNode)?;
        if target == new {
            return Err(MutationError::SelfReference);
        }
        let parent = self.arena[target_index]
            .parent()
            .ok_or(MutationError::NoParent)?;
        let (_, new) = self.structure_check(self.handle(parent), new)?;
        Ok((target_index, new))
    }

    /// Whether `new` may become a child of `parent`. Both ids come back as
    /// arena slots of this document.
    fn structure_check(&self, parent: NodeId, new: NodeId) -> Result<(ArenaId, ArenaId), MutationError> {
        let (Some(parent), Some(new)) = (self.resolve(parent), self.resolve(new)) else {
            return Err(MutationError::UnknownNode);
        };
        match self.kind_at(new) {
            NodeKind::Document => return Err(MutationError::DocumentNode),
            NodeKind::Element(_) if self.is_root_at(new) => {
                return Err(MutationError::RootElement);
            }
            _ => {}
        }
        if parent == new {
            return Err(MutationError::SelfReference);
        }
        if parent.ancestors(&self.arena).any(|ancestor| ancestor == new) {
            return Err(MutationError::Cycle);
        }
        match self.kind_at(parent) {
            NodeKind::Element(_) => Ok((parent, new)),
            // top level holds the root element plus comments and PIs
            NodeKind::Document => match self.kind_at(new) {
                NodeKind::Comment(_) | NodeKind::ProcessingInstruction { .. } => Ok((parent, new)),
                _ => Err(MutationError::RootElement),
            },
            _ => Err(MutationError::NotAnElement),
        }
    }

    fn is_root_at(&self, index: ArenaId) -> bool {
        self.arena[index].parent() == Some(self.document) && self.is_element_at(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse_html, parse_xml};

    const XML: &str = "<all_item><item><title>item0</title></item><item><title>item1</title></item></all_item>";

    fn items(doc: &Document) -> (NodeId, NodeId) {
        let found = doc.css("item").unwrap();
        (found[0], found[1])
    }

    #[test]
    fn test_add_prev_sibling_moves_node() {
        let mut doc = parse_xml(XML).unwrap();
        let (item0, item1) = items(&doc);
        doc.add_prev_sibling(item0, item1).unwrap();
        assert_eq!(
            doc.to_xml(),
            "<all_item><item><title>item1</title></item><item><title>item0</title></item></all_item>"
        );
        assert_eq!(doc.children(doc.root_element().unwrap()).count(), 2);
    }

    #[test]
    fn test_add_next_sibling_moves_node() {
        let mut doc = parse_xml(XML).unwrap();
        let (item0, item1) = items(&doc);
        doc.add_next_sibling(item1, item0).unwrap();
        assert_eq!(doc.next_element_sibling(item1), Some(item0));
        assert_eq!(doc.prev_element_sibling(item1), None);
    }

    #[test]
    fn test_insert_child_index_counts_after_detach() {
        let mut doc = parse_xml("<r><a/><b/><c/></r>").unwrap();
        let root = doc.root_element().unwrap();
        let a = doc.at_css("a").unwrap().unwrap();
        doc.insert_child(root, a, 1).unwrap();
        assert_eq!(doc.to_xml(), "<r><b/><a/><c/></r>");
        doc.insert_child(root, a, 2).unwrap();
        assert_eq!(doc.to_xml(), "<r><b/><c/><a/></r>");
    }

    #[test]
    fn test_insert_child_past_end_appends() {
        let mut doc = parse_xml("<r><a/><b/></r>").unwrap();
        let root = doc.root_element().unwrap();
        let new = doc.create_element("z");
        doc.insert_child(root, new, 100).unwrap();
        assert_eq!(doc.to_xml(), "<r><a/><b/><z/></r>");

        let first = doc.create_element("y");
        doc.insert_child(root, first, 0).unwrap();
        assert_eq!(doc.to_xml(), "<r><y/><a/><b/><z/></r>");
    }

    #[test]
    fn test_add_child_appends() {
        let mut doc = parse_xml("<r><a/></r>").unwrap();
        let a = doc.at_css("a").unwrap().unwrap();
        let text = doc.create_text("hi");
        doc.add_child(a, text).unwrap();
        assert_eq!(doc.to_xml(), "<r><a>hi</a></r>");
    }

    #[test]
    fn test_rejected_edits_leave_tree_unchanged() {
        let mut doc = parse_xml("<r><a><b/></a></r>").unwrap();
        let before = doc.to_xml();
        let root = doc.root_element().unwrap();
        let a = doc.at_css("a").unwrap().unwrap();
        let b = doc.at_css("b").unwrap().unwrap();
        let stray = doc.create_element("x");

        assert!(matches!(
            doc.add_prev_sibling(root, stray),
            Err(MutationError::RootElement)
        ));
        assert!(matches!(
            doc.add_next_sibling(a, a),
            Err(MutationError::SelfReference)
        ));
        assert!(matches!(doc.add_child(b, a), Err(MutationError::Cycle)));
        assert!(matches!(doc.add_child(a, a), Err(MutationError::SelfReference)));
        assert!(matches!(doc.add_child(a, root), Err(MutationError::RootElement)));
        assert!(matches!(
            doc.add_child(a, doc.document_node()),
            Err(MutationError::DocumentNode)
        ));
        assert!(matches!(
            doc.add_prev_sibling(stray, b),
            Err(MutationError::NoParent)
        ));
        assert_eq!(doc.to_xml(), before);
    }

    #[test]
    fn test_text_parent_is_not_an_element() {
        let mut doc = parse_xml("<r>text</r>").unwrap();
        let root = doc.root_element().unwrap();
        let text = doc.children(root).next().unwrap();
        let new = doc.create_element("x");
        assert!(matches!(
            doc.insert_child(text, new, 0),
            Err(MutationError::NotAnElement)
        ));
    }

    #[test]
    fn test_comment_allowed_at_top_level() {
        let mut doc = parse_xml("<r/>").unwrap();
        let root = doc.root_element().unwrap();
        let comment = doc.create_comment("top");
        doc.add_prev_sibling(root, comment).unwrap();
        assert_eq!(doc.to_xml(), "<!--top--><r/>");
    }

    #[test]
    fn test_unknown_node() {
        let mut doc = parse_xml("<r/>").unwrap();
        let mut other = parse_xml("<a><b/><c/><d/></a>").unwrap();
        let foreign = other.create_element("far");
        let root = doc.root_element().unwrap();
        assert!(matches!(
            doc.add_child(root, foreign),
            Err(MutationError::UnknownNode)
        ));
    }

    #[test]
    fn test_foreign_ids_within_arena_range_are_rejected() {
        let mut doc = parse_xml("<r><a/><b/></r>").unwrap();
        let other = parse_xml("<r><a/><b/></r>").unwrap();
        let before = doc.to_xml();
        let root = doc.root_element().unwrap();
        let b = doc.at_css("b").unwrap().unwrap();
        // slots that exist in both arenas
        let other_a = other.at_css("a").unwrap().unwrap();
        let other_b = other.at_css("b").unwrap().unwrap();

        for result in [
            doc.add_child(root, other_a),
            doc.insert_child(root, other_a, 0),
            doc.add_prev_sibling(b, other_a),
            doc.add_next_sibling(other_b, b),
            doc.remove(other_a),
            doc.set_attr(other_a, "x", "1"),
            doc.set_content(other_a, "x"),
        ] {
            assert!(matches!(result, Err(MutationError::UnknownNode)));
        }
        assert_eq!(doc.to_xml(), before);
    }

    #[test]
    fn test_remove_and_reinsert() {
        let mut doc = parse_xml("<r><a/><b/></r>").unwrap();
        let root = doc.root_element().unwrap();
        let a = doc.at_css("a").unwrap().unwrap();
        doc.remove(a).unwrap();
        assert_eq!(doc.to_xml(), "<r><b/></r>");
        assert_eq!(doc.parent(a), None);
        // detached twice is fine
        doc.remove(a).unwrap();
        doc.add_child(root, a).unwrap();
        assert_eq!(doc.to_xml(), "<r><b/><a/></r>");

        assert!(matches!(doc.remove(root), Err(MutationError::RootElement)));
        assert!(matches!(
            doc.remove(doc.document_node()),
            Err(MutationError::DocumentNode)
        ));
    }

    #[test]
    fn test_attribute_edits() {
        let mut doc = parse_xml(r#"<r a="1" b="2"/>"#).unwrap();
        let root = doc.root_element().unwrap();
        doc.set_attr(root, "a", "x").unwrap();
        doc.set_attr(root, "c", "3").unwrap();
        assert_eq!(doc.to_xml(), r#"<r a="x" b="2" c="3"/>"#);
        assert_eq!(doc.remove_attr(root, "b").unwrap().as_deref(), Some("2"));
        assert_eq!(doc.remove_attr(root, "b").unwrap(), None);
        assert_eq!(doc.to_xml(), r#"<r a="x" c="3"/>"#);
    }

    #[test]
    fn test_set_tag_name_and_content() {
        let mut doc = parse_xml("<r><a>old<b/></a></r>").unwrap();
        let a = doc.at_css("a").unwrap().unwrap();
        doc.set_tag_name(a, "renamed").unwrap();
        doc.set_content(a, "new & improved").unwrap();
        assert_eq!(doc.to_xml(), "<r><renamed>new &amp; improved</renamed></r>");
        doc.set_content(a, "").unwrap();
        assert_eq!(doc.to_xml(), "<r><renamed/></r>");

        let text = doc.create_text("t");
        assert!(matches!(
            doc.set_content(text, "x"),
            Err(MutationError::NotAnElement)
        ));
    }

    #[test]
    fn test_create_element_in_html_namespace() {
        let mut doc = parse_html("<p>hi</p>").unwrap();
        let div = doc.create_element("div");
        assert_eq!(&*doc.element(div).unwrap().name.ns, XHTML_NS);
        let body = doc.body().unwrap();
        doc.add_child(body, div).unwrap();
        assert_eq!(doc.css("body > div").unwrap(), vec![div]);
    }
}
