use thiserror::Error;

use crate::blocks::BlockKind;
use crate::syntax::Span;

use super::diagnostics::{Diagnostic, DiagnosticCode};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("{line}:{col}: syntax error, {message}")]
    Syntax {
        line: usize,
        col: usize,
        message: String,
    },
    #[error("Unexpected `{found}` while parsing {context}")]
    UnexpectedRule { found: String, context: &'static str },
    #[error("Missing {0}")]
    Missing(&'static str),
    #[error("Invalid operator `{0}`")]
    InvalidOperator(String),
    #[error("Invalid escape sequence `\\{0}` in string literal")]
    InvalidEscape(String),
}

/// Invariant violations inside the bridge itself. These abort the request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InternalError {
    #[error("Type id {0} has not been interned")]
    UnknownTypeId(usize),
    #[error("Ancestor chain of `{0}` is corrupted")]
    CorruptedAncestorChain(String),
    #[error("Scope stack underflow")]
    ScopeUnderflow,
    #[error("No shape is registered for `{0}` nodes")]
    MissingPattern(String),
    #[error("Statement does not fit its matched shape `{0}`")]
    ShapeMismatch(BlockKind),
}

impl InternalError {
    pub fn to_diagnostic(&self, span: Span) -> Diagnostic {
        Diagnostic::new(DiagnosticCode::Internal, span, self.to_string())
    }
}

#[derive(Error, Debug)]
pub enum DecompileError {
    #[error("Parsing failed: {0}")]
    Parse(#[from] ParseError),
    #[error("Internal error: {0}")]
    Internal(#[from] InternalError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmitError {
    #[error("Block `{0}` can't appear in this position")]
    UnexpectedBlock(BlockKind),
    #[error("Block `{block}` is missing field `{slot}`")]
    MissingField { block: BlockKind, slot: String },
    #[error("Unrepresentable block at statement {0} carries no source text")]
    MissingSource(usize),
    #[error("Embedded source text does not parse: {0}")]
    Source(#[from] ParseError),
}

/// Reason an expression (or statement) could not be turned into a block.
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    Shape(Diagnostic),
    Internal(InternalError),
}

impl From<InternalError> for Failure {
    fn from(value: InternalError) -> Self {
        Self::Internal(value)
    }
}

impl From<Diagnostic> for Failure {
    fn from(value: Diagnostic) -> Self {
        Self::Shape(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Severity;

    #[test]
    fn internal_errors_have_their_own_severity() {
        let diagnostic = InternalError::ScopeUnderflow.to_diagnostic(Span::default());
        assert_eq!(diagnostic.severity, Severity::Internal);
        assert_eq!(diagnostic.code, DiagnosticCode::Internal);
        assert!(diagnostic.is_error());
    }
}
