//! CSS selectors, parsed and matched by the `selectors` crate.
//!
//! Everything the crate implements without a browser is available: type,
//! universal, id, class and attribute selectors (with the `i` flag), all four
//! combinators, `:not()`, and the structural pseudo-classes (`:root`,
//! `:empty`, `:first-child`, `:nth-child(an+b)`, `:nth-of-type()`, ...).
//!
//! Type selectors are case-sensitive in XML documents and match HTML elements
//! of HTML documents case-insensitively.

use std::fmt;
use std::str::FromStr;

use cssparser::{BasicParseErrorKind, ParseErrorKind, ParserInput, SourceLocation, ToCss};
use markup5ever::{LocalName, Namespace};
use precomputed_hash::PrecomputedHash;
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::matching::{
    self, ElementSelectorFlags, IgnoreNthChildForInvalidation, MatchingContext, MatchingMode,
    NeedsSelectorFlags, QuirksMode,
};
use selectors::parser::{self, SelectorParseErrorKind};
use selectors::{NthIndexCache, OpaqueElement};
use smallvec::SmallVec;

use crate::document::{ArenaId, Document, DocumentKind, ElementData, NodeId, NodeKind};
use crate::error::{SelectorError, SelectorErrorKind};

const HTML_NS: &str = "http://www.w3.org/1999/xhtml";

/// Parenthesised arguments (`:not(`, `:nth-child(`) may nest this deep.
const MAX_NESTING: usize = 32;

/// A parsed, comma separated selector list.
#[derive(Debug, Clone)]
pub struct SelectorList {
    selectors: SmallVec<[parser::Selector<Simple>; 1]>,
}

impl SelectorList {
    /// Parse a selector list.
    ///
    /// ```rust
    /// use sapling::SelectorList;
    ///
    /// assert!(SelectorList::parse("list > item:first-child, #main").is_ok());
    /// assert!(SelectorList::parse("item >").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        if input.trim().is_empty() {
            return Err(SelectorError {
                position: 0,
                kind: SelectorErrorKind::Empty,
            });
        }
        check_nesting(input)?;

        let mut parser_input = ParserInput::new(input);
        let mut css = cssparser::Parser::new(&mut parser_input);
        parser::SelectorList::parse(&SelectorParser, &mut css, parser::ParseRelative::No)
            .map(|list| SelectorList { selectors: list.0 })
            .map_err(|err| {
                let err = selector_error(input, err);
                debug!("selector {:?} rejected: {}", input, err);
                err
            })
    }

    /// Whether the element `id` of `doc` matches any selector of the list.
    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        doc.resolve(id)
            .is_some_and(|index| self.matches_index(doc, index))
    }

    pub(crate) fn matches_index(&self, doc: &Document, index: ArenaId) -> bool {
        if !doc.is_element_at(index) {
            return false;
        }
        let element = ElementRef { doc, index };
        let mut nth_index_cache = NthIndexCache::default();
        let mut context = MatchingContext::new(
            MatchingMode::Normal,
            None,
            &mut nth_index_cache,
            QuirksMode::NoQuirks,
            NeedsSelectorFlags::No,
            IgnoreNthChildForInvalidation::No,
        );
        self.selectors
            .iter()
            .any(|selector| matching::matches_selector(selector, 0, None, &element, &mut context))
    }
}

impl FromStr for SelectorList {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SelectorList::parse(s)
    }
}

/// Rejects inputs whose parentheses nest past [`MAX_NESTING`] before the
/// recursive parser sees them.
fn check_nesting(input: &str) -> Result<(), SelectorError> {
    let mut depth = 0usize;
    let mut quote = None;
    for (position, c) in input.char_indices() {
        match (quote, c) {
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => {
                depth += 1;
                if depth > MAX_NESTING {
                    return Err(SelectorError {
                        position,
                        kind: SelectorErrorKind::TooDeep(MAX_NESTING),
                    });
                }
            }
            (None, ')') => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Ok(())
}

fn selector_error(
    input: &str,
    err: cssparser::ParseError<'_, SelectorParseErrorKind<'_>>,
) -> SelectorError {
    let kind = match err.kind {
        ParseErrorKind::Basic(BasicParseErrorKind::EndOfInput) => SelectorErrorKind::UnexpectedEnd,
        ParseErrorKind::Basic(BasicParseErrorKind::UnexpectedToken(token)) => {
            SelectorErrorKind::UnexpectedToken(token.to_css_string())
        }
        ParseErrorKind::Basic(other) => SelectorErrorKind::Invalid(format!("{other:?}")),
        ParseErrorKind::Custom(SelectorParseErrorKind::EmptySelector) => SelectorErrorKind::Empty,
        ParseErrorKind::Custom(SelectorParseErrorKind::DanglingCombinator) => {
            SelectorErrorKind::DanglingCombinator
        }
        ParseErrorKind::Custom(SelectorParseErrorKind::UnsupportedPseudoClassOrElement(name)) => {
            SelectorErrorKind::UnsupportedPseudo(name.to_string())
        }
        ParseErrorKind::Custom(other) => SelectorErrorKind::Invalid(format!("{other:?}")),
    };
    SelectorError {
        position: byte_offset(input, err.location),
        kind,
    }
}

/// cssparser reports 0-based lines and 1-based columns.
fn byte_offset(input: &str, location: SourceLocation) -> usize {
    let line_start: usize = input
        .split_inclusive('\n')
        .take(location.line as usize)
        .map(str::len)
        .sum();
    (line_start + (location.column as usize).saturating_sub(1)).min(input.len())
}

struct SelectorParser;

impl<'i> parser::Parser<'i> for SelectorParser {
    type Impl = Simple;
    type Error = SelectorParseErrorKind<'i>;

    fn parse_is_and_where(&self) -> bool {
        true
    }
}

/// Selector types for documents without styling state: no hover, no
/// pseudo-elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Simple;

impl parser::SelectorImpl for Simple {
    type AttrValue = CssString;
    type Identifier = CssLocalName;
    type LocalName = CssLocalName;
    type NamespacePrefix = CssLocalName;
    type NamespaceUrl = Namespace;
    type BorrowedNamespaceUrl = Namespace;
    type BorrowedLocalName = CssLocalName;
    type NonTSPseudoClass = NonTSPseudoClass;
    type PseudoElement = PseudoElement;
    type ExtraMatchingData<'a> = ();
}

/// Attribute value in a selector.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct CssString(String);

impl From<&str> for CssString {
    fn from(value: &str) -> Self {
        CssString(value.to_string())
    }
}

impl AsRef<str> for CssString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl ToCss for CssString {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        cssparser::serialize_string(&self.0, dest)
    }
}

/// Names and identifiers in a selector, interned like element names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct CssLocalName(LocalName);

impl From<&str> for CssLocalName {
    fn from(value: &str) -> Self {
        CssLocalName(LocalName::from(value))
    }
}

impl ToCss for CssLocalName {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        dest.write_str(&self.0)
    }
}

impl PrecomputedHash for CssLocalName {
    fn precomputed_hash(&self) -> u32 {
        self.0.precomputed_hash()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NonTSPseudoClass {}

impl parser::NonTSPseudoClass for NonTSPseudoClass {
    type Impl = Simple;

    fn is_active_or_hover(&self) -> bool {
        match *self {}
    }

    fn is_user_action_state(&self) -> bool {
        match *self {}
    }
}

impl ToCss for NonTSPseudoClass {
    fn to_css<W: fmt::Write>(&self, _dest: &mut W) -> fmt::Result {
        match *self {}
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PseudoElement {}

impl parser::PseudoElement for PseudoElement {
    type Impl = Simple;
}

impl ToCss for PseudoElement {
    fn to_css<W: fmt::Write>(&self, _dest: &mut W) -> fmt::Result {
        match *self {}
    }
}

/// An element of a document, as the matcher sees it.
#[derive(Clone, Copy)]
struct ElementRef<'a> {
    doc: &'a Document,
    index: ArenaId,
}

impl<'a> ElementRef<'a> {
    fn data(&self) -> Option<&'a ElementData> {
        self.doc.element_at(self.index)
    }

    fn wrap(&self, index: ArenaId) -> Option<Self> {
        self.doc.is_element_at(index).then_some(ElementRef {
            doc: self.doc,
            index,
        })
    }
}

impl fmt::Debug for ElementRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.data() {
            Some(elem) => write!(f, "<{}> {:?}", elem.tag_name(), self.index),
            None => write!(f, "{:?}", self.index),
        }
    }
}

impl selectors::Element for ElementRef<'_> {
    type Impl = Simple;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(&self.doc.arena[self.index])
    }

    fn parent_element(&self) -> Option<Self> {
        self.doc.arena[self.index]
            .parent()
            .and_then(|parent| self.wrap(parent))
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        self.index
            .preceding_siblings(&self.doc.arena)
            .skip(1)
            .find_map(|sibling| self.wrap(sibling))
    }

    fn next_sibling_element(&self) -> Option<Self> {
        self.index
            .following_siblings(&self.doc.arena)
            .skip(1)
            .find_map(|sibling| self.wrap(sibling))
    }

    fn first_element_child(&self) -> Option<Self> {
        self.index
            .children(&self.doc.arena)
            .find_map(|child| self.wrap(child))
    }

    fn is_html_element_in_html_document(&self) -> bool {
        self.doc.kind == DocumentKind::Html
            && self.data().is_some_and(|elem| &*elem.name.ns == HTML_NS)
    }

    fn has_local_name(&self, name: &CssLocalName) -> bool {
        self.data().is_some_and(|elem| elem.name.local == name.0)
    }

    fn has_namespace(&self, ns: &Namespace) -> bool {
        self.data().is_some_and(|elem| &elem.name.ns == ns)
    }

    fn is_same_type(&self, other: &Self) -> bool {
        match (self.data(), other.data()) {
            (Some(a), Some(b)) => a.name == b.name,
            _ => false,
        }
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&Namespace>,
        local_name: &CssLocalName,
        operation: &AttrSelectorOperation<&CssString>,
    ) -> bool {
        let Some(elem) = self.data() else {
            return false;
        };
        let wanted = &*local_name.0;
        elem.attrs.iter().any(|(key, value)| {
            // attributes are keyed by their qualified name
            let name_matches = match ns {
                NamespaceConstraint::Any => {
                    key.as_str() == wanted
                        || key.rsplit_once(':').is_some_and(|(_, local)| local == wanted)
                }
                NamespaceConstraint::Specific(ns) => ns.is_empty() && key.as_str() == wanted,
            };
            name_matches && operation.eval_str(value)
        })
    }

    fn match_non_ts_pseudo_class(
        &self,
        pc: &NonTSPseudoClass,
        _context: &mut MatchingContext<'_, Simple>,
    ) -> bool {
        match *pc {}
    }

    fn match_pseudo_element(
        &self,
        pe: &PseudoElement,
        _context: &mut MatchingContext<'_, Simple>,
    ) -> bool {
        match *pe {}
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        false
    }

    fn is_html_slot_element(&self) -> bool {
        false
    }

    fn has_id(&self, id: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.data()
            .and_then(ElementData::id)
            .is_some_and(|value| case_sensitivity.eq(value.as_bytes(), id.0.as_bytes()))
    }

    fn has_class(&self, name: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.data()
            .and_then(|elem| elem.attr("class"))
            .is_some_and(|classes| {
                classes
                    .split_ascii_whitespace()
                    .any(|class| case_sensitivity.eq(class.as_bytes(), name.0.as_bytes()))
            })
    }

    fn imported_part(&self, _name: &CssLocalName) -> Option<CssLocalName> {
        None
    }

    fn is_part(&self, _name: &CssLocalName) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        !self
            .index
            .children(&self.doc.arena)
            .any(|child| match self.doc.kind_at(child) {
                NodeKind::Element(_) => true,
                NodeKind::Text(text) => !text.is_empty(),
                _ => false,
            })
    }

    fn is_root(&self) -> bool {
        self.doc.arena[self.index].parent() == Some(self.doc.document)
    }
}
