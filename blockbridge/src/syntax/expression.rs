use strum::{Display, EnumString, IntoStaticStr};

use super::{Param, Span, Stmt, TypeRef};

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Numeric literal, kept as written so that re-emitted text is stable.
    Number(String),
    Str(String),
    Bool(bool),
    Null,
    Ident(String),
    This,
    Super,
    Array(Vec<Expr>),
    Paren(Box<Expr>),
    Unary(Unary),
    Update(Update),
    Binary(Binary),
    Assign(Assign),
    Call(Call),
    Member(Member),
    Index(Index),
    New(New),
    Lambda(Lambda),
    As(As),
}

#[derive(EnumString, Display, IntoStaticStr, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    #[strum(serialize = "!")]
    Not,
    #[strum(serialize = "-")]
    Minus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Unary {
    pub op: UnaryOp,
    pub operand: Box<Expr>,
}

#[derive(EnumString, Display, IntoStaticStr, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateOp {
    #[strum(serialize = "++")]
    Increment,
    #[strum(serialize = "--")]
    Decrement,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub op: UpdateOp,
    pub prefix: bool,
    pub target: Box<Expr>,
}

#[derive(EnumString, Display, IntoStaticStr, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    #[strum(serialize = "||")]
    Or,
    #[strum(serialize = "&&")]
    And,
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    NotEq,
    #[strum(serialize = "===")]
    StrictEq,
    #[strum(serialize = "!==")]
    StrictNotEq,
    #[strum(serialize = "<")]
    Less,
    #[strum(serialize = "<=")]
    LessEq,
    #[strum(serialize = ">")]
    Greater,
    #[strum(serialize = ">=")]
    GreaterEq,
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Mod,
}

impl BinaryOp {
    /// Operators accepted as a counting-loop bound.
    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            Self::Less | Self::LessEq | Self::Greater | Self::GreaterEq
        )
    }

    pub fn is_comparison(&self) -> bool {
        self.is_ordering()
            || matches!(
                self,
                Self::Eq | Self::NotEq | Self::StrictEq | Self::StrictNotEq
            )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, Self::Or | Self::And)
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Mod
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binary {
    pub op: BinaryOp,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
}

#[derive(EnumString, Display, IntoStaticStr, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignOp {
    #[strum(serialize = "=")]
    Assign,
    #[strum(serialize = "+=")]
    AddAssign,
    #[strum(serialize = "-=")]
    SubAssign,
    #[strum(serialize = "*=")]
    MulAssign,
    #[strum(serialize = "/=")]
    DivAssign,
}

impl AssignOp {
    pub fn is_compound(&self) -> bool {
        !matches!(self, Self::Assign)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assign {
    pub op: AssignOp,
    pub target: Box<Expr>,
    pub value: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub callee: Box<Expr>,
    pub args: Vec<Expr>,
}

impl Call {
    /// The trailing anonymous function, if the call passes one.
    pub fn callback(&self) -> Option<&Lambda> {
        match self.args.last().map(|a| &a.unparen().kind) {
            Some(ExprKind::Lambda(lambda)) => Some(lambda),
            _ => None,
        }
    }

    /// Arguments in front of the trailing callback.
    pub fn plain_args(&self) -> &[Expr] {
        match self.callback() {
            Some(_) => &self.args[..self.args.len() - 1],
            None => &self.args,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub object: Box<Expr>,
    pub property: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    pub object: Box<Expr>,
    pub index: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct New {
    pub class: String,
    pub args: Vec<Expr>,
}

#[derive(EnumString, Display, IntoStaticStr, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(serialize_all = "snake_case")]
pub enum LambdaStyle {
    Arrow,
    Function,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub style: LambdaStyle,
    pub params: Vec<Param>,
    pub ret: Option<TypeRef>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct As {
    pub expr: Box<Expr>,
    pub ty: TypeRef,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Strips any number of redundant parentheses.
    pub fn unparen(&self) -> &Expr {
        match &self.kind {
            ExprKind::Paren(inner) => inner.unparen(),
            _ => self,
        }
    }

    pub fn as_ident(&self) -> Option<&str> {
        match &self.unparen().kind {
            ExprKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// Dotted path for chains of plain identifiers such as `basic.showNumber`.
    pub fn path(&self) -> Option<String> {
        match &self.unparen().kind {
            ExprKind::Ident(name) => Some(name.clone()),
            ExprKind::Member(member) => member
                .object
                .path()
                .map(|obj| format!("{}.{}", obj, member.property)),
            _ => None,
        }
    }

    /// Leftmost identifier of a member chain.
    pub fn root_ident(&self) -> Option<&str> {
        match &self.unparen().kind {
            ExprKind::Ident(name) => Some(name),
            ExprKind::Member(member) => member.object.root_ident(),
            _ => None,
        }
    }

    pub fn is_number_literal(&self) -> bool {
        matches!(self.unparen().kind, ExprKind::Number(_))
    }

    /// Whether `name` is referenced anywhere inside this expression.
    pub fn mentions(&self, name: &str) -> bool {
        use ExprKind::*;
        match &self.kind {
            Ident(ident) => ident == name,
            Number(_) | Str(_) | Bool(_) | Null | This | Super => false,
            Array(elems) => elems.iter().any(|e| e.mentions(name)),
            Paren(inner) => inner.mentions(name),
            Unary(unary) => unary.operand.mentions(name),
            Update(update) => update.target.mentions(name),
            Binary(bin) => bin.left.mentions(name) || bin.right.mentions(name),
            Assign(assign) => assign.target.mentions(name) || assign.value.mentions(name),
            Call(call) => call.callee.mentions(name) || call.args.iter().any(|a| a.mentions(name)),
            Member(member) => member.object.mentions(name),
            Index(index) => index.object.mentions(name) || index.index.mentions(name),
            New(new) => new.args.iter().any(|a| a.mentions(name)),
            Lambda(lambda) => {
                !lambda.params.iter().any(|p| p.name == name)
                    && lambda.body.iter().any(|s| s.mentions(name))
            }
            As(cast) => cast.expr.mentions(name),
        }
    }
}
