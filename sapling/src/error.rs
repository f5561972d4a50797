//! Error types for parsing, tree mutation and selector queries.

use thiserror::Error;

/// Result alias using the crate-wide [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Any error produced by this crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Mutation(#[from] MutationError),

    #[error(transparent)]
    Selector(#[from] SelectorError),
}

/// Markup could not be turned into a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("input is empty")]
    Empty,

    #[error("document has no root element")]
    NoRootElement,

    #[error("unknown encoding label: {0}")]
    UnknownEncoding(String),
}

/// A structural edit was rejected. The tree is unchanged when one of these is returned.
#[derive(Debug, Error)]
pub enum MutationError {
    #[error("node does not belong to this document")]
    UnknownNode,

    #[error("the document node cannot be detached or copied")]
    DocumentNode,

    #[error("node has no parent")]
    NoParent,

    #[error("operation would detach or duplicate the root element")]
    RootElement,

    #[error("node cannot be inserted relative to itself")]
    SelfReference,

    #[error("node cannot be inserted inside its own subtree")]
    Cycle,

    #[error("node is not an element")]
    NotAnElement,

    #[error("tree error: {0}")]
    Tree(#[from] indextree::NodeError),
}

/// A CSS selector failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid selector at byte {position}: {kind}")]
pub struct SelectorError {
    pub position: usize,
    pub kind: SelectorErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorErrorKind {
    #[error("empty selector")]
    Empty,

    #[error("unexpected end of input")]
    UnexpectedEnd,

    #[error("unexpected token {0}")]
    UnexpectedToken(String),

    #[error("unsupported pseudo-class or pseudo-element :{0}")]
    UnsupportedPseudo(String),

    #[error("dangling combinator")]
    DanglingCombinator,

    #[error("selector nests deeper than {0} levels")]
    TooDeep(usize),

    #[error("{0}")]
    Invalid(String),
}
