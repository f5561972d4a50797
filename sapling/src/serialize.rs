//! Markup serializer for arena documents.
//!
//! Two syntaxes share one tree walk:
//!
//! - XML: childless elements are written `<tag/>`, names keep their prefix,
//!   and `xmlns` declarations are written wherever an element or attribute
//!   namespace is not yet in scope
//! - HTML: void elements never get end tags, raw text elements (script,
//!   style) are not escaped, foreign (SVG/MathML) childless elements use
//!   self-closing syntax
//!
//! In both, text escapes `&`, `<`, `>` and carriage returns; attribute values
//! additionally escape `"` and whitespace control characters and are always
//! double-quoted. Comment and processing-instruction content is adjusted so
//! it cannot close early.

use std::fmt::Write;
use std::sync::LazyLock;

use regex::Regex;

use crate::document::{ArenaId, Document, DocumentKind, ElementData, NodeId, NodeKind};

/// Options for serialization.
#[derive(Clone, Debug)]
pub struct SerializeOptions {
    /// Whether to pretty-print with indentation (default: false for minified output)
    pub pretty: bool,
    /// Indentation string for pretty-printing (default: "  ")
    pub indent: String,
    /// Whether to sort attributes alphabetically (default: false, source order)
    pub sort_attributes: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            pretty: false,
            indent: "  ".to_string(),
            sort_attributes: false,
        }
    }
}

impl SerializeOptions {
    /// Create new default options (minified output).
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable pretty-printing with default indentation.
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    /// Set a custom indentation string (implies pretty-printing).
    pub fn with_indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = indent.into();
        self.pretty = true;
        self
    }

    pub fn sort_attributes(mut self) -> Self {
        self.sort_attributes = true;
        self
    }
}

/// Which markup rules to write with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    Xml,
    Html,
}

impl From<DocumentKind> for Syntax {
    fn from(kind: DocumentKind) -> Self {
        match kind {
            DocumentKind::Xml => Syntax::Xml,
            DocumentKind::Html => Syntax::Html,
        }
    }
}

/// Serialize `node` and its subtree. `None` if the node is not part of `doc`.
///
/// Serializing the document node writes the XML declaration (XML) or the
/// doctype, followed by every top-level node.
pub fn serialize_node(
    doc: &Document,
    node: NodeId,
    syntax: Syntax,
    opts: &SerializeOptions,
) -> Option<String> {
    let node = doc.resolve(node)?;
    let mut out = String::new();
    let mut ser = Serializer::new(doc, &mut out, syntax, opts);
    ser.write_node(node, opts.pretty);
    Some(out)
}

/// Serialize only the children of `node`.
pub fn serialize_children(
    doc: &Document,
    node: NodeId,
    syntax: Syntax,
    opts: &SerializeOptions,
) -> Option<String> {
    let node = doc.resolve(node)?;
    let mut out = String::new();
    let mut ser = Serializer::new(doc, &mut out, syntax, opts);
    let block = opts.pretty && !ser.has_text_child(node);
    for child in node.children(&doc.arena) {
        ser.write_node(child, block);
    }
    Some(out)
}

/// HTML5 void elements - these never have end tags.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Raw text elements - content is not escaped.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "xmp", "iframe", "noembed", "noframes"];

const HTML_NS: &str = "http://www.w3.org/1999/xhtml";

/// Bound to the `xml` prefix without a declaration.
const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// The declaration's `encoding` pseudo-attribute. Output is a Rust string, so
/// it is rewritten to UTF-8.
#[allow(clippy::expect_used)]
static DECL_ENCODING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\bencoding\s*=\s*)(?:"[^"]*"|'[^']*')"#).expect("valid regex")
});

fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.iter().any(|void| tag.eq_ignore_ascii_case(void))
}

fn is_raw_text_element(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.iter().any(|raw| tag.eq_ignore_ascii_case(raw))
}

/// Namespace bindings visible at the current element. `None` is the default
/// namespace.
struct NamespaceScope {
    bindings: Vec<(Option<String>, String)>,
}

impl NamespaceScope {
    fn new() -> Self {
        NamespaceScope {
            bindings: vec![
                (None, String::new()),
                (Some("xml".to_string()), XML_NS.to_string()),
            ],
        }
    }

    fn lookup(&self, prefix: Option<&str>) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .find(|(p, _)| p.as_deref() == prefix)
            .map(|(_, ns)| ns.as_str())
    }

    fn bind(&mut self, prefix: Option<&str>, ns: &str) {
        self.bindings.push((prefix.map(str::to_string), ns.to_string()));
    }

    /// Declarations `elem` needs beyond what is in scope and what it declares
    /// itself. Binds them and the element's own `xmlns` attributes.
    fn enter(&mut self, elem: &ElementData) -> Vec<(Option<String>, String)> {
        for (name, value) in &elem.attrs {
            if name == "xmlns" {
                self.bind(None, value);
            } else if let Some(prefix) = name.strip_prefix("xmlns:") {
                self.bind(Some(prefix), value);
            }
        }

        let mut needed = Vec::new();
        let element_ns = (elem.name.prefix.as_deref(), &*elem.name.ns);
        let attr_ns = elem
            .attr_namespaces
            .iter()
            .map(|(prefix, ns)| (Some(&**prefix), &**ns));
        for (prefix, ns) in std::iter::once(element_ns).chain(attr_ns) {
            // a prefix cannot be bound to no namespace
            if prefix == Some("xmlns") || (prefix.is_some() && ns.is_empty()) {
                continue;
            }
            if self.lookup(prefix) != Some(ns) {
                self.bind(prefix, ns);
                needed.push((prefix.map(str::to_string), ns.to_string()));
            }
        }
        needed
    }
}

struct Serializer<'a, W: Write> {
    doc: &'a Document,
    out: &'a mut W,
    syntax: Syntax,
    options: &'a SerializeOptions,
    depth: usize,
    scope: NamespaceScope,
}

impl<'a, W: Write> Serializer<'a, W> {
    fn new(doc: &'a Document, out: &'a mut W, syntax: Syntax, options: &'a SerializeOptions) -> Self {
        Self {
            doc,
            out,
            syntax,
            options,
            depth: 0,
            scope: NamespaceScope::new(),
        }
    }

    fn write_indent(&mut self) {
        for _ in 0..self.depth {
            let _ = write!(self.out, "{}", self.options.indent);
        }
    }

    fn has_text_child(&self, id: ArenaId) -> bool {
        id.children(&self.doc.arena)
            .any(|child| matches!(self.doc.kind_at(child), NodeKind::Text(_)))
    }

    fn write_text_escaped(&mut self, text: &str) {
        for c in text.chars() {
            let _ = match c {
                '&' => self.out.write_str("&amp;"),
                '<' => self.out.write_str("&lt;"),
                '>' => self.out.write_str("&gt;"),
                // parsers normalize a literal CR away
                '\r' => self.out.write_str("&#13;"),
                _ => self.out.write_char(c),
            };
        }
    }

    fn write_attr_value_escaped(&mut self, text: &str) {
        for c in text.chars() {
            let _ = match c {
                '&' => self.out.write_str("&amp;"),
                '<' => self.out.write_str("&lt;"),
                '>' => self.out.write_str("&gt;"),
                '"' => self.out.write_str("&quot;"),
                // attribute value normalization turns these into spaces
                '\r' => self.out.write_str("&#13;"),
                '\n' => self.out.write_str("&#10;"),
                '\t' => self.out.write_str("&#9;"),
                _ => self.out.write_char(c),
            };
        }
    }

    /// `--` may not appear inside a comment, nor `-` right before `-->`.
    fn write_comment(&mut self, text: &str) {
        let _ = self.out.write_str("<!--");
        let mut prev = None;
        for c in text.chars() {
            if c == '-' && prev == Some('-') {
                let _ = self.out.write_char(' ');
            }
            let _ = self.out.write_char(c);
            prev = Some(c);
        }
        if prev == Some('-') {
            let _ = self.out.write_char(' ');
        }
        let _ = self.out.write_str("-->");
    }

    fn write_pi(&mut self, target: &str, data: &str) {
        if data.is_empty() {
            let _ = write!(self.out, "<?{}?>", target);
        } else {
            let _ = write!(self.out, "<?{} {}?>", target, data.replace("?>", "? >"));
        }
    }

    fn write_attrs(&mut self, elem: &ElementData) {
        let mut attrs: Vec<_> = elem.attrs.iter().collect();
        if self.options.sort_attributes {
            attrs.sort_by_key(|(name, _)| *name);
        }
        for (name, value) in attrs {
            let _ = write!(self.out, " {}=\"", name);
            self.write_attr_value_escaped(value);
            let _ = self.out.write_char('"');
        }
    }

    fn write_namespace_declarations(&mut self, declarations: &[(Option<String>, String)]) {
        for (prefix, ns) in declarations {
            match prefix {
                Some(prefix) => {
                    let _ = write!(self.out, " xmlns:{}=\"", prefix);
                }
                None => {
                    let _ = self.out.write_str(" xmlns=\"");
                }
            }
            self.write_attr_value_escaped(ns);
            let _ = self.out.write_char('"');
        }
    }

    /// `block`: the node sits on its own indented line.
    fn write_node(&mut self, id: ArenaId, block: bool) {
        let doc = self.doc;
        match doc.kind_at(id) {
            NodeKind::Document => self.write_document(id),
            NodeKind::Element(elem) => self.write_element(id, elem, block),
            NodeKind::Text(text) => self.write_text_escaped(text),
            NodeKind::Comment(text) => {
                if block {
                    self.write_indent();
                }
                self.write_comment(text);
                if block {
                    let _ = writeln!(self.out);
                }
            }
            NodeKind::ProcessingInstruction { target, data } => {
                if block {
                    self.write_indent();
                }
                self.write_pi(target, data);
                if block {
                    let _ = writeln!(self.out);
                }
            }
        }
    }

    fn write_document(&mut self, id: ArenaId) {
        if self.syntax == Syntax::Xml
            && let Some(declaration) = self.doc.declaration()
        {
            let declaration = DECL_ENCODING_RE.replace(declaration, "${1}\"UTF-8\"");
            let _ = writeln!(self.out, "<?xml {}?>", declaration);
        }
        if let Some(doctype) = self.doc.doctype() {
            let _ = write!(self.out, "<!DOCTYPE {}>", doctype);
            if self.options.pretty {
                let _ = writeln!(self.out);
            }
        }
        let doc = self.doc;
        for child in id.children(&doc.arena) {
            self.write_node(child, self.options.pretty);
        }
    }

    fn write_element(&mut self, id: ArenaId, elem: &ElementData, block: bool) {
        let tag = match self.syntax {
            Syntax::Xml => elem.tag_name(),
            Syntax::Html => elem.local_name().to_string(),
        };
        let html = self.syntax == Syntax::Html;
        let doc = self.doc;
        let scope_len = self.scope.bindings.len();

        if block {
            self.write_indent();
        }
        let _ = write!(self.out, "<{}", tag);
        if !html {
            let declarations = self.scope.enter(elem);
            self.write_namespace_declarations(&declarations);
        }
        self.write_attrs(elem);

        let has_children = id.children(&doc.arena).next().is_some();
        if html && is_void_element(&tag) {
            let _ = self.out.write_char('>');
        } else if !has_children && (!html || &*elem.name.ns != HTML_NS) {
            let _ = self.out.write_str("/>");
        } else if !has_children {
            let _ = write!(self.out, "></{}>", tag);
        } else if html && is_raw_text_element(&tag) {
            let _ = self.out.write_char('>');
            for child in id.children(&doc.arena) {
                if let NodeKind::Text(text) = doc.kind_at(child) {
                    let _ = self.out.write_str(text);
                }
            }
            let _ = write!(self.out, "</{}>", tag);
        } else if block && !self.has_text_child(id) {
            // Block content: one child per line
            let _ = writeln!(self.out, ">");
            self.depth += 1;
            for child in id.children(&doc.arena) {
                self.write_node(child, true);
            }
            self.depth -= 1;
            self.write_indent();
            let _ = write!(self.out, "</{}>", tag);
        } else {
            let _ = self.out.write_char('>');
            for child in id.children(&doc.arena) {
                self.write_node(child, false);
            }
            let _ = write!(self.out, "</{}>", tag);
        }
        self.scope.bindings.truncate(scope_len);

        if block {
            let _ = writeln!(self.out);
        }
    }
}

impl Document {
    /// Serialize the whole document as XML with default options.
    ///
    /// ```rust
    /// let doc = sapling::parse_xml("<?xml version=\"1.0\"?><r><a/></r>").unwrap();
    /// assert_eq!(doc.to_xml(), "<?xml version=\"1.0\"?>\n<r><a/></r>");
    /// ```
    pub fn to_xml(&self) -> String {
        self.to_xml_with(&SerializeOptions::default())
    }

    pub fn to_xml_with(&self, opts: &SerializeOptions) -> String {
        serialize_node(self, self.document_node(), Syntax::Xml, opts).unwrap_or_default()
    }

    /// Serialize the whole document as HTML with default options.
    pub fn to_html(&self) -> String {
        self.to_html_with(&SerializeOptions::default())
    }

    pub fn to_html_with(&self, opts: &SerializeOptions) -> String {
        serialize_node(self, self.document_node(), Syntax::Html, opts).unwrap_or_default()
    }

    /// Serialize using the syntax the document was parsed with.
    pub fn to_markup(&self) -> String {
        serialize_node(
            self,
            self.document_node(),
            Syntax::from(self.kind),
            &SerializeOptions::default(),
        )
        .unwrap_or_default()
    }
}
