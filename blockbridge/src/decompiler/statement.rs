use tracing::trace;

use crate::blocks::{BlockKind, BlockNode};
use crate::shape::Node;
use crate::syntax::*;
use crate::utils::{Diagnostic, DiagnosticCode, Failure, InternalError, TryToBlock};
use crate::verifier::FOR_IN_UNSUPPORTED;

use super::expression::{this_outside_class, unsupported_statement};
use super::DecompileCtx;

type BlockResult<T> = Result<T, Failure>;

/// Conditions and branch bodies of an `if` / `else if` chain, plus the final
/// `else` body. `else { if (...) ... }` continues the chain.
fn if_chain(first: &If) -> (Vec<&If>, Option<&Stmt>) {
    let mut branches = vec![first];
    let mut current = first;
    loop {
        let next = match current.else_branch.as_deref() {
            None => return (branches, None),
            Some(stmt) => stmt,
        };
        let nested = match &next.kind {
            StmtKind::If(i) => Some(i),
            StmtKind::Block(stmts) => match stmts.as_slice() {
                [Stmt {
                    kind: StmtKind::If(i),
                    ..
                }] => Some(i),
                _ => None,
            },
            _ => None,
        };
        match nested {
            Some(i) => {
                branches.push(i);
                current = i;
            }
            None => return (branches, Some(next)),
        }
    }
}

/// Spans of the statements decompiled separately from `stmt`.
fn nested_spans(stmt: &Stmt) -> Vec<Span> {
    match &stmt.kind {
        StmtKind::If(i) => {
            let (branches, otherwise) = if_chain(i);
            branches
                .iter()
                .map(|b| b.then_branch.span)
                .chain(otherwise.map(|s| s.span))
                .collect()
        }
        _ => stmt.nested().iter().map(|s| s.span).collect(),
    }
}

fn params(mut block: BlockNode, prefix: &str, params: &[Param]) -> BlockNode {
    for (i, p) in params.iter().enumerate() {
        block = block.literal(format!("{}PARAM{}", prefix, i), &p.name);
        if let Some(ty) = &p.ty {
            block = block.literal(format!("{}TYPE{}", prefix, i), ty.to_string());
        }
        if p.optional {
            block = block.literal(format!("{}OPTIONAL{}", prefix, i), "true");
        }
    }
    block
}

impl DecompileCtx<'_> {
    /// Decompiles a statement list. A statement that can't be represented turns
    /// into an `unrepresentable` marker; its siblings are unaffected.
    pub fn stmts(&mut self, stmts: &[Stmt]) -> Result<Vec<BlockNode>, InternalError> {
        let mut blocks = Vec::with_capacity(stmts.len());
        let mut flow_ended = false;
        let mut warned = false;
        for stmt in stmts {
            if flow_ended && !warned {
                self.report(Diagnostic::new(
                    DiagnosticCode::UnreachableCode,
                    stmt.span,
                    "unreachable code",
                ));
                warned = true;
            }
            blocks.extend(self.stmt(stmt)?);
            flow_ended |= stmt.ends_flow();
        }
        Ok(blocks)
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<Vec<BlockNode>, InternalError> {
        let owned = self.owned_errors(&stmt.span, &nested_spans(stmt));
        if !owned.is_empty() {
            trace!(stmt = stmt.describe(), errors = owned.len(), "statement failed verification");
            return Ok(vec![self.unrepresentable(stmt, &owned)]);
        }
        match stmt.to_block(self) {
            Ok(blocks) => {
                for block in &blocks {
                    self.emitted(block.kind);
                }
                Ok(blocks)
            }
            Err(Failure::Shape(diagnostic)) => {
                let block = self.unrepresentable(stmt, std::slice::from_ref(&diagnostic));
                self.report(diagnostic);
                Ok(vec![block])
            }
            Err(Failure::Internal(err)) => Err(err),
        }
    }

    /// Statements under a loop or branch header.
    fn body(&mut self, stmt: &Stmt) -> Result<Vec<BlockNode>, InternalError> {
        match &stmt.kind {
            StmtKind::Block(stmts) => self.stmts(stmts),
            _ => self.stmts(std::slice::from_ref(stmt)),
        }
    }

    pub(super) fn expr(&mut self, expr: &Expr) -> BlockResult<BlockNode> {
        expr.to_block(self)
    }

    fn function(&mut self, func: &FunctionDecl, body: &[Stmt], span: Span) -> BlockResult<BlockNode> {
        self.shape(&Node::FunctionDefinition { decl: func, span })?;
        let mut block = params(
            BlockNode::new(BlockKind::FunctionDefinition).literal("NAME", &func.name),
            "",
            &func.params,
        );
        if let Some(ret) = &func.ret {
            block = block.literal("RETURNS", ret.to_string());
        }
        Ok(block.with_children(self.stmts(body)?))
    }

    fn declarator(&mut self, kind: DeclKind, d: &Declarator) -> BlockResult<BlockNode> {
        let mut block = BlockNode::new(BlockKind::VariablesSet)
            .literal("DECL", kind.to_string())
            .literal("VAR", &d.name);
        if let Some(ty) = &d.ty {
            block = block.literal("TYPE", ty.to_string());
        }
        if let Some(init) = &d.init {
            block = block.child("VALUE", self.expr(init)?);
        }
        Ok(block)
    }

    fn expression_statement(&mut self, expr: &Expr) -> BlockResult<BlockNode> {
        let inner = expr.unparen();
        match &inner.kind {
            ExprKind::Assign(assign) => {
                self.change(&assign.target, assign.op.to_string(), Some(&assign.value))
            }
            ExprKind::Update(update) => self.change(&update.target, update.op.to_string(), None),
            ExprKind::Call(call) => self.call_statement(call, inner.span),
            _ => Err(unsupported_statement(
                expr.span,
                "only assignments, updates and calls can be used as statements",
            )),
        }
    }

    /// Assignment, compound assignment or `++`/`--` on a variable, property or list slot.
    fn change(&mut self, target: &Expr, op: String, value: Option<&Expr>) -> BlockResult<BlockNode> {
        let block = match &target.unparen().kind {
            ExprKind::Ident(name) if op == "=" => {
                BlockNode::new(BlockKind::VariablesSet).literal("VAR", name)
            }
            ExprKind::Ident(name) => BlockNode::new(BlockKind::VariablesChange)
                .literal("VAR", name)
                .literal("OP", op),
            ExprKind::Member(member) => BlockNode::new(BlockKind::PropertySet)
                .child("OBJECT", self.expr(&member.object)?)
                .literal("PROPERTY", &member.property)
                .literal("OP", op),
            ExprKind::Index(index) => BlockNode::new(BlockKind::ListsSetIndex)
                .child("LIST", self.expr(&index.object)?)
                .child("INDEX", self.expr(&index.index)?)
                .literal("OP", op),
            ExprKind::This | ExprKind::Super => return Err(this_outside_class(target.span)),
            _ => {
                return Err(unsupported_statement(
                    target.span,
                    "only variables, properties and list items can be assigned",
                ))
            }
        };
        match value {
            Some(value) => Ok(block.child("VALUE", self.expr(value)?)),
            None => Ok(block),
        }
    }

    fn call_statement(&mut self, call: &Call, span: Span) -> BlockResult<BlockNode> {
        let callback = call.callback();
        if callback.is_some() {
            let types = self.types;
            self.shape(&Node::CallbackCall {
                call,
                callee: types.callee(&span),
                span,
            })?;
        }
        let mut block = self.callee(BlockNode::new(BlockKind::CallStatement), &call.callee)?;
        block = self.args(block, call.plain_args())?;
        if let Some(lambda) = callback {
            block = params(
                block.literal("HANDLER", lambda.style.to_string()),
                "HANDLER_",
                &lambda.params,
            );
            block = block.with_children(self.stmts(&lambda.body)?);
        }
        Ok(block)
    }

    fn if_statement(&mut self, first: &If) -> BlockResult<BlockNode> {
        let (branches, otherwise) = if_chain(first);
        let mut conds = Vec::with_capacity(branches.len());
        for branch in &branches {
            conds.push(self.expr(&branch.cond)?);
        }
        let mut children = Vec::with_capacity(branches.len() + 1);
        for (branch, cond) in branches.iter().zip(conds) {
            children.push(
                BlockNode::new(BlockKind::ControlsIfBranch)
                    .child("COND", cond)
                    .with_children(self.body(&branch.then_branch)?),
            );
        }
        if let Some(otherwise) = otherwise {
            children.push(BlockNode::new(BlockKind::ControlsElse).with_children(self.body(otherwise)?));
        }
        Ok(BlockNode::new(BlockKind::ControlsIf).with_children(children))
    }

    fn for_loop(&mut self, f: &For, span: Span) -> BlockResult<BlockNode> {
        let kind = self.shape(&Node::ForLoop { stmt: f, span })?;
        let mismatch = || Failure::Internal(InternalError::ShapeMismatch(kind));
        let (Some(ForInit::Decl(decl)), Some(cond), Some(update)) = (&f.init, &f.cond, &f.update)
        else {
            return Err(mismatch());
        };
        let declarator = decl.declarators.first().ok_or_else(mismatch)?;
        let ExprKind::Binary(bin) = &cond.unparen().kind else {
            return Err(mismatch());
        };
        let block = match kind {
            BlockKind::ControlsRepeat => BlockNode::new(kind)
                .literal("VAR", &declarator.name)
                .child("TIMES", self.expr(&bin.right)?),
            BlockKind::ControlsFor => {
                let from = declarator.init.as_ref().ok_or_else(mismatch)?;
                let block = BlockNode::new(kind)
                    .literal("VAR", &declarator.name)
                    .child("FROM", self.expr(from)?)
                    .literal("COMPARE", bin.op.to_string())
                    .child("TO", self.expr(&bin.right)?);
                match &update.unparen().kind {
                    ExprKind::Update(u) => block.literal("UPDATE", u.op.to_string()),
                    ExprKind::Assign(a) => match &a.value.unparen().kind {
                        ExprKind::Number(step) => block
                            .literal("UPDATE", a.op.to_string())
                            .literal("BY", step),
                        _ => return Err(mismatch()),
                    },
                    _ => return Err(mismatch()),
                }
            }
            _ => return Err(mismatch()),
        };
        Ok(block.with_children(self.body(&f.body)?))
    }
}

fn source_declaration(stmt: &Stmt) -> BlockNode {
    BlockNode::new(BlockKind::SourceDeclaration).literal("SOURCE", stmt.to_string().trim_end())
}

impl TryToBlock for Stmt {
    type Output = Vec<BlockNode>;

    fn to_block(&self, ctx: &mut DecompileCtx<'_>) -> BlockResult<Vec<BlockNode>> {
        let block = match &self.kind {
            StmtKind::Namespace(ns) => BlockNode::new(BlockKind::Namespace)
                .literal("NAME", &ns.name)
                .with_children(ctx.stmts(&ns.body)?),
            StmtKind::Class(_) | StmtKind::Interface(_) | StmtKind::Enum(_) => {
                source_declaration(self)
            }
            StmtKind::Function(func) => match &func.body {
                Some(body) if !func.declare => ctx.function(func, body, self.span)?,
                _ => source_declaration(self),
            },
            StmtKind::VarDecl(decl) => {
                return decl
                    .declarators
                    .iter()
                    .map(|d| ctx.declarator(decl.kind, d))
                    .collect()
            }
            StmtKind::Expr(expr) => ctx.expression_statement(expr)?,
            StmtKind::If(i) => ctx.if_statement(i)?,
            StmtKind::While(w) => {
                let cond = ctx.expr(&w.cond)?;
                BlockNode::new(BlockKind::ControlsWhile)
                    .child("COND", cond)
                    .with_children(ctx.body(&w.body)?)
            }
            StmtKind::For(f) => ctx.for_loop(f, self.span)?,
            StmtKind::ForOf(f) => {
                let list = ctx.expr(&f.iterable)?;
                BlockNode::new(BlockKind::ControlsForOf)
                    .literal("VAR", &f.name)
                    .child("LIST", list)
                    .with_children(ctx.body(&f.body)?)
            }
            StmtKind::ForIn(_) => {
                return Err(Failure::Shape(Diagnostic::new(
                    DiagnosticCode::ForInUnsupported,
                    self.span,
                    FOR_IN_UNSUPPORTED,
                )))
            }
            StmtKind::Return(value) => {
                let block = BlockNode::new(BlockKind::FunctionReturn);
                match value {
                    Some(value) => block.child("VALUE", ctx.expr(value)?),
                    None => block,
                }
            }
            StmtKind::Break => BlockNode::new(BlockKind::BreakKeyword),
            StmtKind::Continue => BlockNode::new(BlockKind::ContinueKeyword),
            StmtKind::Block(stmts) => return Ok(ctx.stmts(stmts)?),
        };
        Ok(vec![block])
    }
}
