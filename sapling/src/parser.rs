//! XML and HTML parsing through markup5ever's `TreeSink`.
//!
//! xml5ever and html5ever drive the same sink, which builds the arena
//! directly. Both tree builders recover from malformed input; the
//! diagnostics they report are kept on the resulting [`Document`].

use std::borrow::Cow;
use std::cell::RefCell;

use html5ever::tree_builder::{ElemName, ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{Attribute, LocalName, Namespace, QualName};
use indexmap::IndexMap;
use indextree::Arena;
use tendril::{StrTendril, TendrilSink};

use crate::document::{ArenaId, Document, DocumentKind, ElementData, NodeKind};
use crate::encoding;
use crate::error::ParseError;

/// Parser configuration.
#[derive(Clone, Debug)]
pub struct ParseOptions {
    /// Encoding label (`"utf-8"`, `"Shift_JIS"`, ...) used by the byte entry
    /// points. Overrides any BOM or in-document declaration.
    pub encoding: Option<String>,
    /// Keep comment nodes in the tree (default: true)
    pub keep_comments: bool,
    /// Keep processing instructions other than the XML declaration (default: true)
    pub keep_processing_instructions: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            encoding: None,
            keep_comments: true,
            keep_processing_instructions: true,
        }
    }
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode byte input with the given encoding label.
    pub fn encoding(mut self, label: impl Into<String>) -> Self {
        self.encoding = Some(label.into());
        self
    }

    /// Drop comments while parsing.
    pub fn strip_comments(mut self) -> Self {
        self.keep_comments = false;
        self
    }

    /// Drop processing instructions while parsing.
    pub fn strip_processing_instructions(mut self) -> Self {
        self.keep_processing_instructions = false;
        self
    }
}

/// Parse an XML string.
///
/// ```rust
/// let doc = sapling::parse_xml("<?xml version=\"1.0\"?><list><item/></list>").unwrap();
/// let root = doc.root().unwrap();
/// assert_eq!(root.tag_name().as_deref(), Some("list"));
/// ```
pub fn parse_xml(xml: &str) -> Result<Document, ParseError> {
    parse_xml_with(xml, &ParseOptions::default())
}

pub fn parse_xml_with(xml: &str, options: &ParseOptions) -> Result<Document, ParseError> {
    if xml.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    let sink = ArenaSink::new(DocumentKind::Xml, options);
    let doc = xml5ever::driver::parse_document(sink, Default::default()).one(StrTendril::from(xml));
    finish(doc)
}

/// Decode and parse XML bytes. The encoding comes from
/// [`ParseOptions::encoding`], then a BOM, then the declaration's
/// `encoding` pseudo-attribute, then UTF-8.
pub fn parse_xml_bytes(bytes: &[u8], options: &ParseOptions) -> Result<Document, ParseError> {
    let text = encoding::decode(bytes, options.encoding.as_deref(), DocumentKind::Xml)?;
    parse_xml_with(&text, options)
}

/// Parse an HTML string with full HTML5 error recovery.
///
/// `<html>`, `<head>` and `<body>` are synthesised when missing.
pub fn parse_html(html: &str) -> Result<Document, ParseError> {
    parse_html_with(html, &ParseOptions::default())
}

pub fn parse_html_with(html: &str, options: &ParseOptions) -> Result<Document, ParseError> {
    if html.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    let sink = ArenaSink::new(DocumentKind::Html, options);
    let doc = html5ever::parse_document(sink, Default::default()).one(StrTendril::from(html));
    finish(doc)
}

/// Decode and parse HTML bytes, honouring `<meta charset>` when no
/// encoding is given.
pub fn parse_html_bytes(bytes: &[u8], options: &ParseOptions) -> Result<Document, ParseError> {
    let text = encoding::decode(bytes, options.encoding.as_deref(), DocumentKind::Html)?;
    parse_html_with(&text, options)
}

fn finish(doc: Document) -> Result<Document, ParseError> {
    if doc.root_element().is_none() {
        return Err(ParseError::NoRootElement);
    }
    debug!(
        "parsed {:?} document: {} nodes, {} recovered errors",
        doc.kind,
        doc.arena.count(),
        doc.parse_errors.len()
    );
    Ok(doc)
}

/// Owned element name wrapper
#[derive(Debug, Clone)]
struct OwnedElemName(QualName);

impl ElemName for OwnedElemName {
    fn ns(&self) -> &Namespace {
        &self.0.ns
    }

    fn local_name(&self) -> &LocalName {
        &self.0.local
    }
}

/// TreeSink implementation building the arena
struct ArenaSink {
    /// Wrapped in RefCell: the sink API only hands out `&self`
    arena: RefCell<Arena<NodeKind>>,
    document: ArenaId,
    kind: DocumentKind,
    doctype: RefCell<Option<String>>,
    errors: RefCell<Vec<String>>,
    keep_comments: bool,
    keep_processing_instructions: bool,
}

impl ArenaSink {
    fn new(kind: DocumentKind, options: &ParseOptions) -> Self {
        let doc = Document::empty(kind);
        ArenaSink {
            arena: RefCell::new(doc.arena),
            document: doc.document,
            kind,
            doctype: RefCell::new(None),
            errors: RefCell::new(Vec::new()),
            keep_comments: options.keep_comments,
            keep_processing_instructions: options.keep_processing_instructions,
        }
    }

    /// Comments and PIs the options ask to drop are created but never attached.
    fn is_dropped(&self, arena: &Arena<NodeKind>, node: ArenaId) -> bool {
        match arena[node].get() {
            NodeKind::Comment(_) => !self.keep_comments,
            NodeKind::ProcessingInstruction { target, .. } => {
                !self.keep_processing_instructions && !is_xml_declaration(target)
            }
            _ => false,
        }
    }

    fn text_node(arena: &mut Arena<NodeKind>, text: &str) -> ArenaId {
        arena.new_node(NodeKind::Text(text.to_string()))
    }
}

fn is_xml_declaration(target: &str) -> bool {
    target.eq_ignore_ascii_case("xml")
}

impl TreeSink for ArenaSink {
    type Handle = ArenaId;
    type Output = Document;
    type ElemName<'a>
        = OwnedElemName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        let mut arena = self.arena.into_inner();

        // The XML declaration arrives as a processing instruction on the
        // document node; it is document metadata, not a tree node.
        let mut declaration = None;
        if self.kind == DocumentKind::Xml {
            let decl = self.document.children(&arena).find(|&id| {
                matches!(arena[id].get(), NodeKind::ProcessingInstruction { target, .. } if is_xml_declaration(target))
            });
            if let Some(decl) = decl {
                if let NodeKind::ProcessingInstruction { data, .. } = arena[decl].get() {
                    declaration = Some(data.clone());
                }
                decl.detach(&mut arena);
            }
        }

        let mut doc = Document::from_parts(arena, self.document, self.kind);
        doc.declaration = declaration;
        doc.doctype = self.doctype.into_inner();
        doc.parse_errors = self.errors.into_inner();
        doc
    }

    fn parse_error(&self, msg: Cow<'static, str>) {
        trace!("recovered parse error: {}", msg);
        self.errors.borrow_mut().push(msg.into_owned());
    }

    fn get_document(&self) -> Self::Handle {
        self.document
    }

    fn set_quirks_mode(&self, _mode: QuirksMode) {}

    fn same_node(&self, a: &Self::Handle, b: &Self::Handle) -> bool {
        a == b
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> OwnedElemName {
        let arena = self.arena.borrow();
        match arena[*target].get() {
            NodeKind::Element(elem) => OwnedElemName(elem.name.clone()),
            // Not an element - return placeholder
            _ => OwnedElemName(QualName::new(
                None,
                Namespace::from(""),
                LocalName::from(""),
            )),
        }
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Attribute>,
        _flags: ElementFlags,
    ) -> Self::Handle {
        // First occurrence of a repeated attribute wins
        let mut attr_map = IndexMap::with_capacity(attrs.len());
        let mut attr_namespaces = Vec::new();
        for attr in attrs {
            let key = match &attr.name.prefix {
                Some(prefix) => {
                    // xml5ever resolves the prefix and drops the declaration
                    if !attr.name.ns.is_empty()
                        && !attr_namespaces.iter().any(|(p, _)| p == prefix)
                    {
                        attr_namespaces.push((prefix.clone(), attr.name.ns.clone()));
                    }
                    format!("{}:{}", &**prefix, &*attr.name.local)
                }
                None => attr.name.local.to_string(),
            };
            attr_map.entry(key).or_insert_with(|| attr.value.to_string());
        }

        self.arena
            .borrow_mut()
            .new_node(NodeKind::Element(ElementData {
                name,
                attrs: attr_map,
                attr_namespaces,
            }))
    }

    fn create_comment(&self, text: StrTendril) -> Self::Handle {
        self.arena
            .borrow_mut()
            .new_node(NodeKind::Comment(text.to_string()))
    }

    fn create_pi(&self, target: StrTendril, data: StrTendril) -> Self::Handle {
        self.arena
            .borrow_mut()
            .new_node(NodeKind::ProcessingInstruction {
                target: target.to_string(),
                data: data.to_string(),
            })
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        let mut arena = self.arena.borrow_mut();
        match child {
            NodeOrText::AppendNode(node) => {
                if !self.is_dropped(&arena, node) {
                    parent.append(node, &mut arena);
                }
            }
            NodeOrText::AppendText(text) => {
                // No text outside the root element
                if *parent == self.document {
                    return;
                }
                // Tree builders deliver text in pieces; merge into the previous text node
                let last_child = arena[*parent].last_child();
                if let Some(last_child) = last_child
                    && let NodeKind::Text(existing) = arena[last_child].get_mut()
                {
                    existing.push_str(&text);
                    return;
                }
                let text_node = Self::text_node(&mut arena, &text);
                parent.append(text_node, &mut arena);
            }
        }
    }

    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        let mut arena = self.arena.borrow_mut();
        match new_node {
            NodeOrText::AppendNode(node) => {
                if !self.is_dropped(&arena, node) {
                    sibling.insert_before(node, &mut arena);
                }
            }
            NodeOrText::AppendText(text) => {
                let prev = arena[*sibling].previous_sibling();
                if let Some(prev) = prev
                    && let NodeKind::Text(existing) = arena[prev].get_mut()
                {
                    existing.push_str(&text);
                    return;
                }
                let text_node = Self::text_node(&mut arena, &text);
                sibling.insert_before(text_node, &mut arena);
            }
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        let has_parent = self.arena.borrow()[*element].parent().is_some();
        if has_parent {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
        *self.doctype.borrow_mut() = Some(name.to_string());
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        // <template> contents stay inline
        *target
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Attribute>) {
        let mut arena = self.arena.borrow_mut();
        if let NodeKind::Element(elem) = arena[*target].get_mut() {
            for attr in attrs {
                let key = attr.name.local.to_string();
                elem.attrs
                    .entry(key)
                    .or_insert_with(|| attr.value.to_string());
            }
        }
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        target.detach(&mut self.arena.borrow_mut());
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let mut arena = self.arena.borrow_mut();
        let children: Vec<ArenaId> = node.children(&arena).collect();
        for child in children {
            new_parent.append(child, &mut arena);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::NodeKind;

    #[test]
    fn test_parse_simple_xml() {
        let doc = parse_xml("<all_item><item><title>item0</title></item></all_item>").unwrap();
        let root = doc.root_element().unwrap();
        assert_eq!(doc.element(root).unwrap().tag_name(), "all_item");

        let item = doc.children(root).next().unwrap();
        let title = doc.children(item).next().unwrap();
        let text = doc.children(title).next().unwrap();
        match doc.get(text) {
            Some(NodeKind::Text(t)) => assert_eq!(t, "item0"),
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn test_xml_declaration_is_not_a_node() {
        let doc = parse_xml("<?xml version=\"1.0\"?><root/>").unwrap();
        assert_eq!(doc.declaration(), Some("version=\"1.0\""));
        assert_eq!(doc.children(doc.document_node()).count(), 1);
    }

    #[test]
    fn test_xml_keeps_case() {
        let doc = parse_xml("<Root><Child/></Root>").unwrap();
        let root = doc.root_element().unwrap();
        assert_eq!(doc.element(root).unwrap().tag_name(), "Root");
    }

    #[test]
    fn test_xml_attributes_in_order() {
        let doc = parse_xml(r#"<r b="2" a="1" c="3"/>"#).unwrap();
        let root = doc.element(doc.root_element().unwrap()).unwrap();
        let keys: Vec<_> = root.attrs.keys().map(String::as_str).collect();
        assert_eq!(keys, ["b", "a", "c"]);
    }

    #[test]
    fn test_xml_text_is_merged() {
        let doc = parse_xml("<r>a &amp; b</r>").unwrap();
        let root = doc.root_element().unwrap();
        assert_eq!(doc.children(root).count(), 1);
        assert_eq!(doc.text_content(root).as_deref(), Some("a & b"));
    }

    #[test]
    fn test_strip_comments() {
        let options = ParseOptions::new().strip_comments();
        let doc = parse_xml_with("<r><!-- gone --><a/></r>", &options).unwrap();
        let root = doc.root_element().unwrap();
        assert_eq!(doc.children(root).count(), 1);
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert_eq!(parse_xml("").unwrap_err(), ParseError::Empty);
        assert_eq!(parse_xml("  \n ").unwrap_err(), ParseError::Empty);
        assert_eq!(parse_html("").unwrap_err(), ParseError::Empty);
    }

    #[test]
    fn test_xml_without_root_is_an_error() {
        assert_eq!(
            parse_xml("<!-- only a comment -->").unwrap_err(),
            ParseError::NoRootElement
        );
    }

    #[test]
    fn test_parse_html_synthesises_structure() {
        let doc = parse_html("<title>Hi</title><p>Hello</p>").unwrap();
        assert!(doc.head().is_some());
        let body = doc.body().unwrap();
        assert_eq!(doc.title().as_deref(), Some("Hi"));
        let p = doc.element_children(body).next().unwrap();
        assert_eq!(doc.element(p).unwrap().local_name(), "p");
    }

    #[test]
    fn test_parse_html_doctype() {
        let doc = parse_html("<!DOCTYPE html><html><body></body></html>").unwrap();
        assert_eq!(doc.doctype(), Some("html"));
    }

    #[test]
    fn test_html_recovers_and_records_errors() {
        let doc = parse_html("<div><span>unclosed</div>").unwrap();
        assert!(!doc.parse_errors().is_empty());
        let body = doc.body().unwrap();
        assert_eq!(doc.text_content(body).as_deref(), Some("unclosed"));
    }
}
