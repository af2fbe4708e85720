//! Canonical block shapes: which source constructs map onto which block, and the
//! ordered predicates a construct must satisfy to do so.

mod catalog;
mod matcher;
mod predicates;

use strum::{Display, IntoStaticStr};

use crate::blocks::BlockKind;
use crate::syntax::{Call, For, FunctionDecl, Span};
use crate::types::{Signature, TypeEnv};
use crate::utils::DiagnosticCode;
use crate::verifier::ExprTypes;

pub use catalog::{patterns_for, CATALOG};
pub use matcher::{match_node, Evaluation, Verdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Satisfied,
    Failed(Span),
    NotApplicable,
}

#[derive(Display, IntoStaticStr, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(serialize_all = "snake_case")]
pub enum NodeKind {
    ForLoop,
    CallbackCall,
    FunctionDefinition,
}

/// A source construct presented to the matcher.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    ForLoop {
        stmt: &'a For,
        span: Span,
    },
    /// A call whose last argument is an anonymous function. `callee` is the
    /// declared signature of the called function, if it is known.
    CallbackCall {
        call: &'a Call,
        callee: Option<&'a Signature>,
        span: Span,
    },
    FunctionDefinition {
        decl: &'a FunctionDecl,
        span: Span,
    },
}

impl Node<'_> {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::ForLoop { .. } => NodeKind::ForLoop,
            Self::CallbackCall { .. } => NodeKind::CallbackCall,
            Self::FunctionDefinition { .. } => NodeKind::FunctionDefinition,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::ForLoop { span, .. }
            | Self::CallbackCall { span, .. }
            | Self::FunctionDefinition { span, .. } => *span,
        }
    }
}

/// Read-only view of the verifier results that semantic predicates consult.
#[derive(Clone, Copy)]
pub struct MatchCtx<'a> {
    pub env: &'a TypeEnv,
    pub types: &'a ExprTypes,
}

pub type Check = fn(&Node<'_>, &MatchCtx<'_>) -> Outcome;

pub struct Predicate {
    pub name: &'static str,
    pub code: DiagnosticCode,
    pub message: &'static str,
    pub check: Check,
}

impl std::fmt::Debug for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.code)
    }
}

#[derive(Debug)]
pub struct ShapePattern {
    pub block: BlockKind,
    pub node: NodeKind,
    pub predicates: Vec<Predicate>,
}
