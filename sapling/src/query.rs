//! CSS queries over a document.
//!
//! Results are element ids in document order. Nothing is cached, so a query
//! issued after a mutation sees the mutated tree.

use crate::document::{Document, NodeId};
use crate::error::SelectorError;
use crate::selector::SelectorList;

impl Document {
    /// All elements of the document matching `selector`.
    ///
    /// ```rust
    /// let doc = sapling::parse_xml("<list><item/><item/></list>").unwrap();
    /// assert_eq!(doc.css("item").unwrap().len(), 2);
    /// ```
    pub fn css(&self, selector: &str) -> Result<Vec<NodeId>, SelectorError> {
        self.css_within(self.document_node(), selector)
    }

    /// First element of the document matching `selector`.
    pub fn at_css(&self, selector: &str) -> Result<Option<NodeId>, SelectorError> {
        self.at_css_within(self.document_node(), selector)
    }

    /// Descendants of `scope` (excluding `scope`) matching `selector`.
    /// Combinators may still look at ancestors outside the scope.
    pub fn css_within(&self, scope: NodeId, selector: &str) -> Result<Vec<NodeId>, SelectorError> {
        let list = SelectorList::parse(selector)?;
        Ok(self.select(scope, &list).collect())
    }

    pub fn at_css_within(
        &self,
        scope: NodeId,
        selector: &str,
    ) -> Result<Option<NodeId>, SelectorError> {
        let list = SelectorList::parse(selector)?;
        Ok(self.select(scope, &list).next())
    }

    /// Lazily match a pre-parsed selector list under `scope`.
    pub fn select<'a>(
        &'a self,
        scope: NodeId,
        list: &'a SelectorList,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.resolve(scope)
            .into_iter()
            .flat_map(move |scope| scope.descendants(&self.arena).skip(1))
            .filter(move |&index| list.matches_index(self, index))
            .map(move |index| self.handle(index))
    }
}
