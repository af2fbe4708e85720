use crate::syntax::*;

use super::{MatchCtx, Node, Outcome};

use Outcome::*;

fn for_loop<'a>(node: &Node<'a>) -> Option<(&'a For, Span)> {
    match node {
        Node::ForLoop { stmt, span } => Some((*stmt, *span)),
        _ => None,
    }
}

fn decl(f: &For) -> Option<&VarDecl> {
    match &f.init {
        Some(ForInit::Decl(decl)) => Some(decl),
        _ => None,
    }
}

/// The variable a loop declares in its initializer, if any.
fn loop_var(f: &For) -> Option<&str> {
    decl(f)?.declarators.first().map(|d| d.name.as_str())
}

fn init_span(f: &For, span: Span) -> Span {
    f.init_span.unwrap_or(span)
}

/// The loop condition when it is a comparison. Arithmetic and logical
/// binaries are not comparisons.
fn comparison(f: &For) -> Option<&Binary> {
    match &f.cond.as_ref()?.unparen().kind {
        ExprKind::Binary(bin) if bin.op.is_comparison() => Some(bin),
        _ => None,
    }
}

/// Target and literal step of `i++`, `i--`, `i += k` or `i -= k`.
enum Step<'a> {
    Update(&'a Update),
    Assign(&'a Assign),
}

fn step(f: &For) -> Option<Step<'_>> {
    match &f.update.as_ref()?.unparen().kind {
        ExprKind::Update(update) => Some(Step::Update(update)),
        ExprKind::Assign(assign)
            if matches!(assign.op, AssignOp::AddAssign | AssignOp::SubAssign) =>
        {
            Some(Step::Assign(assign))
        }
        _ => None,
    }
}

impl Step<'_> {
    fn target(&self) -> &Expr {
        match self {
            Self::Update(update) => &update.target,
            Self::Assign(assign) => &assign.target,
        }
    }
}

fn check(ok: bool, span: Span) -> Outcome {
    if ok {
        Satisfied
    } else {
        Failed(span)
    }
}

pub(super) fn init_present(node: &Node<'_>, _: &MatchCtx<'_>) -> Outcome {
    let Some((f, span)) = for_loop(node) else {
        return NotApplicable;
    };
    check(f.init.is_some(), span)
}

pub(super) fn init_declaration(node: &Node<'_>, _: &MatchCtx<'_>) -> Outcome {
    match for_loop(node) {
        Some((f, span)) => match &f.init {
            Some(ForInit::Decl(_)) => Satisfied,
            Some(ForInit::Expr(_)) => Failed(init_span(f, span)),
            None => NotApplicable,
        },
        None => NotApplicable,
    }
}

pub(super) fn init_single(node: &Node<'_>, _: &MatchCtx<'_>) -> Outcome {
    match for_loop(node) {
        Some((f, span)) => match decl(f) {
            Some(decl) => check(decl.declarators.len() == 1, init_span(f, span)),
            None => NotApplicable,
        },
        None => NotApplicable,
    }
}

pub(super) fn init_let(node: &Node<'_>, _: &MatchCtx<'_>) -> Outcome {
    match for_loop(node) {
        Some((f, span)) => match decl(f) {
            Some(decl) => check(decl.kind == DeclKind::Let, init_span(f, span)),
            None => NotApplicable,
        },
        None => NotApplicable,
    }
}

pub(super) fn init_numeric(node: &Node<'_>, ctx: &MatchCtx<'_>) -> Outcome {
    let Some((f, _)) = for_loop(node) else {
        return NotApplicable;
    };
    let Some(declarator) = decl(f).and_then(|d| d.declarators.first()) else {
        return NotApplicable;
    };
    let Some(init) = &declarator.init else {
        return Failed(declarator.span);
    };
    if let Some(ty) = &declarator.ty {
        return check(ty.name() == Some("number"), declarator.span);
    }
    let numeric = match ctx.types.get(&init.span) {
        Some(ty) => ty == ctx.env.table.number() || ctx.env.table.is_any(ty),
        None => init.is_number_literal(),
    };
    check(numeric, init.span)
}

pub(super) fn repeat_init_zero(node: &Node<'_>, _: &MatchCtx<'_>) -> Outcome {
    let Some((f, _)) = for_loop(node) else {
        return NotApplicable;
    };
    let Some(declarator) = decl(f).and_then(|d| d.declarators.first()) else {
        return NotApplicable;
    };
    let zero = matches!(
        declarator.init.as_ref().map(|e| &e.unparen().kind),
        Some(ExprKind::Number(n)) if n == "0"
    );
    check(zero, declarator.span)
}

pub(super) fn cond_present(node: &Node<'_>, _: &MatchCtx<'_>) -> Outcome {
    let Some((f, span)) = for_loop(node) else {
        return NotApplicable;
    };
    check(f.cond.is_some(), span)
}

pub(super) fn cond_comparison(node: &Node<'_>, _: &MatchCtx<'_>) -> Outcome {
    match for_loop(node).and_then(|(f, _)| f.cond.as_ref().map(|c| (f, c))) {
        Some((f, cond)) => check(comparison(f).is_some(), cond.span),
        None => NotApplicable,
    }
}

pub(super) fn cond_operator(node: &Node<'_>, _: &MatchCtx<'_>) -> Outcome {
    let Some((f, _)) = for_loop(node) else {
        return NotApplicable;
    };
    match (comparison(f), &f.cond) {
        (Some(bin), Some(cond)) => check(bin.op.is_ordering(), cond.span),
        _ => NotApplicable,
    }
}

pub(super) fn repeat_cond_less(node: &Node<'_>, _: &MatchCtx<'_>) -> Outcome {
    let Some((f, _)) = for_loop(node) else {
        return NotApplicable;
    };
    match (comparison(f), &f.cond) {
        (Some(bin), Some(cond)) => check(bin.op == BinaryOp::Less, cond.span),
        _ => NotApplicable,
    }
}

pub(super) fn cond_left_identifier(node: &Node<'_>, _: &MatchCtx<'_>) -> Outcome {
    match for_loop(node).and_then(|(f, _)| comparison(f)) {
        Some(bin) => check(bin.left.as_ident().is_some(), bin.left.span),
        None => NotApplicable,
    }
}

pub(super) fn cond_loop_variable(node: &Node<'_>, _: &MatchCtx<'_>) -> Outcome {
    let Some((f, _)) = for_loop(node) else {
        return NotApplicable;
    };
    match (loop_var(f), comparison(f)) {
        (Some(var), Some(bin)) => match bin.left.as_ident() {
            Some(left) => check(left == var, bin.left.span),
            None => NotApplicable,
        },
        _ => NotApplicable,
    }
}

pub(super) fn cond_bound_invariant(node: &Node<'_>, _: &MatchCtx<'_>) -> Outcome {
    let Some((f, _)) = for_loop(node) else {
        return NotApplicable;
    };
    match (loop_var(f), comparison(f)) {
        (Some(var), Some(bin)) => check(!bin.right.mentions(var), bin.right.span),
        _ => NotApplicable,
    }
}

pub(super) fn incr_present(node: &Node<'_>, _: &MatchCtx<'_>) -> Outcome {
    let Some((f, span)) = for_loop(node) else {
        return NotApplicable;
    };
    check(f.update.is_some(), span)
}

pub(super) fn incr_step(node: &Node<'_>, _: &MatchCtx<'_>) -> Outcome {
    match for_loop(node).and_then(|(f, _)| f.update.as_ref().map(|u| (f, u))) {
        Some((f, update)) => check(step(f).is_some(), update.span),
        None => NotApplicable,
    }
}

pub(super) fn incr_literal_step(node: &Node<'_>, _: &MatchCtx<'_>) -> Outcome {
    match for_loop(node).and_then(|(f, _)| step(f)) {
        Some(Step::Update(_)) => Satisfied,
        Some(Step::Assign(assign)) => check(assign.value.is_number_literal(), assign.value.span),
        None => NotApplicable,
    }
}

pub(super) fn repeat_incr_increment(node: &Node<'_>, _: &MatchCtx<'_>) -> Outcome {
    let Some((f, _)) = for_loop(node) else {
        return NotApplicable;
    };
    let Some(update) = &f.update else {
        return NotApplicable;
    };
    let increment = match step(f) {
        Some(Step::Update(u)) => u.op == UpdateOp::Increment,
        Some(Step::Assign(a)) => {
            a.op == AssignOp::AddAssign
                && matches!(&a.value.unparen().kind, ExprKind::Number(n) if n == "1")
        }
        None => false,
    };
    check(increment, update.span)
}

pub(super) fn incr_loop_variable(node: &Node<'_>, _: &MatchCtx<'_>) -> Outcome {
    let Some((f, _)) = for_loop(node) else {
        return NotApplicable;
    };
    match (loop_var(f), step(f)) {
        (Some(var), Some(step)) => {
            let target = step.target();
            check(target.as_ident() == Some(var), target.span)
        }
        _ => NotApplicable,
    }
}

pub(super) fn repeat_body_ignores_variable(node: &Node<'_>, _: &MatchCtx<'_>) -> Outcome {
    let Some((f, _)) = for_loop(node) else {
        return NotApplicable;
    };
    match loop_var(f) {
        Some(var) => check(!f.body.mentions(var), f.body.span),
        None => NotApplicable,
    }
}

fn callback_call<'a>(node: &Node<'a>) -> Option<(&'a Call, Option<&'a crate::types::Signature>, Span)> {
    match node {
        Node::CallbackCall { call, callee, span } => Some((*call, *callee, *span)),
        _ => None,
    }
}

/// A defaulted callee parameter positioned after the callback parameter.
pub(super) fn no_default_after_callback(node: &Node<'_>, _: &MatchCtx<'_>) -> Outcome {
    let Some((call, Some(sig), span)) = callback_call(node) else {
        return NotApplicable;
    };
    let callback = call.args.len().saturating_sub(1);
    check(
        !sig.params.iter().skip(callback + 1).any(|p| p.has_default),
        span,
    )
}

pub(super) fn callee_without_defaults(node: &Node<'_>, _: &MatchCtx<'_>) -> Outcome {
    let Some((_, Some(sig), span)) = callback_call(node) else {
        return NotApplicable;
    };
    check(!sig.params.iter().any(|p| p.has_default), span)
}

pub(super) fn callback_without_defaults(node: &Node<'_>, _: &MatchCtx<'_>) -> Outcome {
    let Some(lambda) = callback_call(node).and_then(|(call, _, _)| call.callback()) else {
        return NotApplicable;
    };
    match lambda.params.iter().find_map(|p| p.default.as_ref()) {
        Some(default) => Failed(default.span),
        None => Satisfied,
    }
}

pub(super) fn function_without_defaults(node: &Node<'_>, _: &MatchCtx<'_>) -> Outcome {
    let Node::FunctionDefinition { decl, .. } = node else {
        return NotApplicable;
    };
    match decl.params.iter().find_map(|p| p.default.as_ref()) {
        Some(default) => Failed(default.span),
        None => Satisfied,
    }
}
