mod display;
mod expression;
mod parser;
mod statement;
mod top;

pub use expression::*;
pub use parser::{parse_expr_str, parse_program, parse_type_str};
pub use statement::*;
pub use top::*;

/// Byte range plus 1-based line/column of both ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

impl Span {
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Smallest span covering both.
    pub fn join(&self, other: &Span) -> Span {
        let (first, _) = if self.start <= other.start {
            (self, other)
        } else {
            (other, self)
        };
        let last = if self.end >= other.end { self } else { other };
        Span {
            start: first.start,
            end: last.end,
            start_line: first.start_line,
            start_col: first.start_col,
            end_line: last.end_line,
            end_col: last.end_col,
        }
    }
}

impl From<pest::Span<'_>> for Span {
    fn from(span: pest::Span<'_>) -> Self {
        let (start_line, start_col) = span.start_pos().line_col();
        let (end_line, end_col) = span.end_pos().line_col();
        Self {
            start: span.start(),
            end: span.end(),
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub items: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Named { name: String, args: Vec<TypeRef> },
    Array(Box<TypeRef>),
    Function { params: Vec<(String, TypeRef)>, ret: Box<TypeRef> },
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named {
            name: name.into(),
            args: vec![],
        }
    }

    pub fn is_generic(&self) -> bool {
        matches!(self, Self::Named { args, .. } if !args.is_empty())
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Named { name, .. } => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Option<TypeRef>,
    pub optional: bool,
    pub default: Option<Expr>,
    pub span: Span,
}
