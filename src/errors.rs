//! Error types with diagnostic codes using miette
//!
//! Every error here is fatal to the current run: the pipeline never
//! produces partial output.

use miette::Diagnostic;
use thiserror::Error;

use crate::types::WHITESPACE_BLOCK;

/// Errors surfaced by the build / layout / emit pipeline.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("input text is empty")]
    #[diagnostic(code(treedown::parse::empty_input))]
    EmptyInput,

    #[error("open and close brackets do not match")]
    #[diagnostic(
        code(treedown::parse::unbalanced_brackets),
        help("escape literal brackets with a backslash: \\[ \\]")
    )]
    UnbalancedBrackets,

    #[error("inside the brackets is empty")]
    #[diagnostic(code(treedown::parse::empty_bracket_body))]
    EmptyBracketBody,

    #[error("input has more than one top-level bracket pair")]
    #[diagnostic(
        code(treedown::parse::multiple_roots),
        help("wrap everything in a single outermost bracket pair")
    )]
    MultipleRoots,

    #[error("label contains an invalid string: {label}")]
    #[diagnostic(code(treedown::markup::syntax))]
    MarkupSyntax { label: String },

    #[error("path {tag} has only one end")]
    #[diagnostic(
        code(treedown::path::dangling_end),
        help("every +N tag must appear in exactly two labels")
    )]
    DanglingPathEnd { tag: String },

    #[error("path {tag} has more than two ends")]
    #[diagnostic(code(treedown::path::too_many_ends))]
    TooManyPathEnds { tag: String },
}

impl Error {
    /// Markup failure for one label. Padding glyphs are shown back to the
    /// user in their source form.
    pub(crate) fn markup_syntax(label: &str) -> Error {
        Error::MarkupSyntax {
            label: label.replace(WHITESPACE_BLOCK, "<>"),
        }
    }
}
