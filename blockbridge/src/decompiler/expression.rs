use crate::blocks::{BlockKind, BlockNode};
use crate::syntax::*;
use crate::utils::{Diagnostic, DiagnosticCode, Failure, TryToBlock};

use super::DecompileCtx;

type BlockResult<T> = Result<T, Failure>;

fn shape_error(code: DiagnosticCode, span: Span, message: &str) -> Failure {
    Failure::Shape(Diagnostic::new(code, span, message))
}

pub(super) fn unsupported_statement(span: Span, message: &str) -> Failure {
    shape_error(DiagnosticCode::ExpressionStatementShape, span, message)
}

pub(super) fn this_outside_class(span: Span) -> Failure {
    shape_error(
        DiagnosticCode::ThisOutsideClass,
        span,
        "`this` and `super` can only be used inside a class",
    )
}

impl DecompileCtx<'_> {
    /// Fills `FUNC` for named functions, or `OBJECT` and `METHOD` for method calls.
    pub(super) fn callee(&mut self, block: BlockNode, callee: &Expr) -> BlockResult<BlockNode> {
        match &callee.unparen().kind {
            ExprKind::Ident(name) => Ok(block.literal("FUNC", name)),
            ExprKind::Member(member) => match callee.path() {
                Some(path) if self.env.function(&path).is_some() => Ok(block.literal("FUNC", path)),
                _ => Ok(block
                    .child("OBJECT", self.expr(&member.object)?)
                    .literal("METHOD", &member.property)),
            },
            ExprKind::This | ExprKind::Super => Err(this_outside_class(callee.span)),
            _ => Err(unsupported_statement(
                callee.span,
                "only named functions and methods can be called",
            )),
        }
    }

    pub(super) fn args(&mut self, mut block: BlockNode, args: &[Expr]) -> BlockResult<BlockNode> {
        for (i, arg) in args.iter().enumerate() {
            block = block.child(format!("ARG{}", i), self.expr(arg)?);
        }
        Ok(block)
    }

    fn binary(&mut self, kind: BlockKind, bin: &Binary, op: bool) -> BlockResult<BlockNode> {
        let mut block = BlockNode::new(kind);
        if op {
            block = block.literal("OP", bin.op.to_string());
        }
        Ok(block
            .child("A", self.expr(&bin.left)?)
            .child("B", self.expr(&bin.right)?))
    }

    fn is_string(&self, expr: &Expr) -> bool {
        self.types.get(&expr.span) == Some(self.env.table.string())
    }
}

impl TryToBlock for Expr {
    type Output = BlockNode;

    fn to_block(&self, ctx: &mut DecompileCtx<'_>) -> BlockResult<BlockNode> {
        let block = match &self.kind {
            ExprKind::Number(n) => BlockNode::new(BlockKind::MathNumber).literal("NUM", n),
            ExprKind::Str(s) => BlockNode::new(BlockKind::Text).literal("TEXT", s),
            ExprKind::Bool(b) => BlockNode::new(BlockKind::LogicBoolean).literal("BOOL", b.to_string()),
            ExprKind::Null => BlockNode::new(BlockKind::LogicNull),
            ExprKind::Ident(name) => BlockNode::new(BlockKind::VariablesGet).literal("VAR", name),
            ExprKind::This | ExprKind::Super => return Err(this_outside_class(self.span)),
            ExprKind::Array(elems) => {
                let mut block = BlockNode::new(BlockKind::ListsCreateWith);
                for (i, elem) in elems.iter().enumerate() {
                    block = block.child(format!("ADD{}", i), ctx.expr(elem)?);
                }
                block
            }
            ExprKind::Paren(inner) => return ctx.expr(inner),
            ExprKind::Unary(unary) => {
                let (kind, slot) = match unary.op {
                    UnaryOp::Not => (BlockKind::LogicNegate, "BOOL"),
                    UnaryOp::Minus => (BlockKind::MathNeg, "NUM"),
                };
                BlockNode::new(kind).child(slot, ctx.expr(&unary.operand)?)
            }
            ExprKind::Update(_) | ExprKind::Assign(_) => {
                return Err(shape_error(
                    DiagnosticCode::UpdateInExpression,
                    self.span,
                    "assignments and updates can't be used as values",
                ))
            }
            ExprKind::Binary(bin) if bin.op == BinaryOp::Add && ctx.is_string(self) => {
                ctx.binary(BlockKind::TextJoin, bin, false)?
            }
            ExprKind::Binary(bin) => {
                let kind = if bin.op.is_arithmetic() {
                    BlockKind::MathArithmetic
                } else if bin.op.is_logical() {
                    BlockKind::LogicOperation
                } else {
                    BlockKind::LogicCompare
                };
                ctx.binary(kind, bin, true)?
            }
            ExprKind::Call(call) => {
                let block = ctx.callee(BlockNode::new(BlockKind::CallExpression), &call.callee)?;
                ctx.args(block, &call.args)?
            }
            ExprKind::Member(member) => match member.object.path() {
                Some(path) if ctx.env.is_enum(&path) => BlockNode::new(BlockKind::EnumMember)
                    .literal("ENUM", path)
                    .literal("MEMBER", &member.property),
                _ => BlockNode::new(BlockKind::PropertyGet)
                    .child("OBJECT", ctx.expr(&member.object)?)
                    .literal("PROPERTY", &member.property),
            },
            ExprKind::Index(index) => BlockNode::new(BlockKind::ListsIndexGet)
                .child("LIST", ctx.expr(&index.object)?)
                .child("INDEX", ctx.expr(&index.index)?),
            ExprKind::New(new) => ctx.args(
                BlockNode::new(BlockKind::ObjectCreate).literal("CLASS", &new.class),
                &new.args,
            )?,
            ExprKind::Lambda(_) => {
                return Err(shape_error(
                    DiagnosticCode::LambdaOutsideCallback,
                    self.span,
                    "anonymous functions are only supported as the last argument of a call statement",
                ))
            }
            ExprKind::As(_) => {
                return Err(shape_error(
                    DiagnosticCode::TypeAssertionUnsupported,
                    self.span,
                    "type assertions have no block",
                ))
            }
        };
        Ok(block)
    }
}
