use strum::{Display, EnumString, IntoStaticStr};

use super::{ClassDecl, EnumDecl, Expr, FunctionDecl, InterfaceDecl, Namespace, Span, TypeRef};

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Namespace(Namespace),
    Class(ClassDecl),
    Interface(InterfaceDecl),
    Enum(EnumDecl),
    Function(FunctionDecl),
    VarDecl(VarDecl),
    Expr(Expr),
    If(If),
    While(While),
    For(For),
    ForOf(ForEach),
    ForIn(ForEach),
    Return(Option<Expr>),
    Break,
    Continue,
    Block(Vec<Stmt>),
}

/// `//%` annotation comment. Opaque to verification and shape matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub text: String,
}

impl Attribute {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[derive(EnumString, Display, IntoStaticStr, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(serialize_all = "lowercase")]
pub enum DeclKind {
    Let,
    Const,
    Var,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub kind: DeclKind,
    pub declarators: Vec<Declarator>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    pub name: String,
    pub ty: Option<TypeRef>,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct If {
    pub cond: Expr,
    pub then_branch: Box<Stmt>,
    pub else_branch: Option<Box<Stmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct While {
    pub cond: Expr,
    pub body: Box<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
    Decl(VarDecl),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct For {
    pub init: Option<ForInit>,
    pub init_span: Option<Span>,
    pub cond: Option<Expr>,
    pub update: Option<Expr>,
    pub body: Box<Stmt>,
}

/// Shared shape of `for (let x of e)` and `for (let x in e)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForEach {
    pub kind: DeclKind,
    pub name: String,
    pub ty: Option<TypeRef>,
    pub iterable: Expr,
    pub body: Box<Stmt>,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self {
            kind,
            span,
            attributes: vec![],
        }
    }

    /// Statements nested directly below this one; they are decompiled (and fail) on
    /// their own, so the enclosing statement does not own their diagnostics.
    pub fn nested(&self) -> Vec<&Stmt> {
        match &self.kind {
            StmtKind::Namespace(ns) => ns.body.iter().collect(),
            StmtKind::Function(func) => func.body.iter().flatten().collect(),
            StmtKind::If(i) => {
                let mut nested = vec![i.then_branch.as_ref()];
                nested.extend(i.else_branch.as_deref());
                nested
            }
            StmtKind::While(w) => vec![w.body.as_ref()],
            StmtKind::For(f) => vec![f.body.as_ref()],
            StmtKind::ForOf(f) | StmtKind::ForIn(f) => vec![f.body.as_ref()],
            StmtKind::Block(stmts) => stmts.iter().collect(),
            StmtKind::Expr(expr) => match &expr.unparen().kind {
                super::ExprKind::Call(call) => call
                    .callback()
                    .map(|lambda| lambda.body.iter().collect())
                    .unwrap_or_default(),
                _ => vec![],
            },
            _ => vec![],
        }
    }

    pub fn ends_flow(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::Return(_) | StmtKind::Break | StmtKind::Continue
        )
    }

    pub fn mentions(&self, name: &str) -> bool {
        use StmtKind::*;
        match &self.kind {
            VarDecl(decl) => decl
                .declarators
                .iter()
                .any(|d| d.init.as_ref().is_some_and(|e| e.mentions(name))),
            Expr(expr) => expr.mentions(name),
            If(i) => {
                i.cond.mentions(name)
                    || i.then_branch.mentions(name)
                    || i.else_branch.as_ref().is_some_and(|s| s.mentions(name))
            }
            While(w) => w.cond.mentions(name) || w.body.mentions(name),
            For(f) => {
                let init = match &f.init {
                    Some(ForInit::Decl(decl)) => decl
                        .declarators
                        .iter()
                        .any(|d| d.init.as_ref().is_some_and(|e| e.mentions(name))),
                    Some(ForInit::Expr(e)) => e.mentions(name),
                    None => false,
                };
                init || f.cond.as_ref().is_some_and(|e| e.mentions(name))
                    || f.update.as_ref().is_some_and(|e| e.mentions(name))
                    || f.body.mentions(name)
            }
            ForOf(f) | ForIn(f) => f.iterable.mentions(name) || f.body.mentions(name),
            Return(value) => value.as_ref().is_some_and(|e| e.mentions(name)),
            Block(stmts) => stmts.iter().any(|s| s.mentions(name)),
            Function(func) => func.body.iter().flatten().any(|s| s.mentions(name)),
            Namespace(_) | Class(_) | Interface(_) | Enum(_) | Break | Continue => false,
        }
    }

    /// Human readable kind used in log events.
    pub fn describe(&self) -> &'static str {
        use StmtKind::*;
        match &self.kind {
            Namespace(_) => "namespace",
            Class(_) => "class",
            Interface(_) => "interface",
            Enum(_) => "enum",
            Function(_) => "function",
            VarDecl(_) => "variable declaration",
            Expr(_) => "expression statement",
            If(_) => "if statement",
            While(_) => "while loop",
            For(_) => "for loop",
            ForOf(_) => "for-of loop",
            ForIn(_) => "for-in loop",
            Return(_) => "return",
            Break => "break",
            Continue => "continue",
            Block(_) => "block",
        }
    }
}
