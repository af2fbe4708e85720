use crate::blocks::{BlockKind, BlockNode};
use crate::shape::{match_node, patterns_for, MatchCtx, Node, Verdict};
use crate::syntax::{Span, Stmt};
use crate::types::TypeEnv;
use crate::utils::{DecompileOptions, Diagnostic, Diagnostics, Failure, InternalError};
use crate::verifier::ExprTypes;

use super::Telemetry;

/// Per-request state shared by every statement and expression conversion.
pub struct DecompileCtx<'a> {
    pub env: &'a TypeEnv,
    pub types: &'a ExprTypes,
    pub options: DecompileOptions,
    verified: &'a Diagnostics,
    telemetry: &'a dyn Telemetry,
    diagnostics: Diagnostics,
}

impl<'a> DecompileCtx<'a> {
    pub fn new(
        env: &'a TypeEnv,
        types: &'a ExprTypes,
        verified: &'a Diagnostics,
        options: DecompileOptions,
        telemetry: &'a dyn Telemetry,
    ) -> Self {
        Self {
            env,
            types,
            options,
            verified,
            telemetry,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn match_ctx(&self) -> MatchCtx<'a> {
        MatchCtx {
            env: self.env,
            types: self.types,
        }
    }

    /// Block kind of the first pattern `node` satisfies.
    pub fn shape(&self, node: &Node<'_>) -> Result<BlockKind, Failure> {
        let patterns = patterns_for(node.kind(), &self.options);
        match match_node(&patterns, node, &self.match_ctx()) {
            Verdict::Matched(pattern) => Ok(pattern.block),
            Verdict::Rejected(diagnostic) => Err(Failure::Shape(diagnostic)),
            Verdict::NoPattern => Err(InternalError::MissingPattern(node.kind().to_string()).into()),
        }
    }

    /// Verifier errors raised inside `span` but outside every `excluded` span.
    pub fn owned_errors(&self, span: &Span, excluded: &[Span]) -> Vec<Diagnostic> {
        self.verified
            .errors_owned_by(span, excluded)
            .cloned()
            .collect()
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic)
    }

    pub fn emitted(&self, kind: BlockKind) {
        self.telemetry.block_emitted(kind)
    }

    /// Marker that keeps the position of a statement that has no block.
    pub fn unrepresentable(&self, stmt: &Stmt, diagnostics: &[Diagnostic]) -> BlockNode {
        self.telemetry.statement_rejected(diagnostics);
        let mut block = BlockNode::new(BlockKind::Unrepresentable);
        for (i, d) in diagnostics.iter().enumerate() {
            block = block
                .literal(format!("CODE{}", i), d.code.number().to_string())
                .literal(format!("MESSAGE{}", i), &d.message);
        }
        if self.options.fallback_blocks {
            block = block.literal("SOURCE", stmt.to_string().trim_end());
        }
        block
    }

    /// Diagnostics raised while building blocks.
    pub fn finish(self) -> Diagnostics {
        self.diagnostics
    }
}
