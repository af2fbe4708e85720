use super::{Attribute, Expr, Param, Span, Stmt, TypeRef};

#[derive(Debug, Clone, PartialEq)]
pub struct Namespace {
    pub name: String,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub declare: bool,
    pub params: Vec<Param>,
    pub ret: Option<TypeRef>,
    /// `None` for ambient signatures (`declare function f(): void;`).
    pub body: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub type_params: Vec<String>,
    /// Every type listed after `extends`; more than one is rejected by the verifier.
    pub extends: Vec<TypeRef>,
    pub implements: Vec<TypeRef>,
    pub members: Vec<ClassMember>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMember {
    pub kind: MemberKind,
    pub name: String,
    pub is_static: bool,
    pub span: Span,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberKind {
    Field {
        ty: Option<TypeRef>,
        optional: bool,
        init: Option<Expr>,
    },
    Method(MethodDecl),
    Getter(MethodDecl),
    Setter(MethodDecl),
    Constructor(MethodDecl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub params: Vec<Param>,
    pub ret: Option<TypeRef>,
    pub body: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDecl {
    pub name: String,
    pub type_params: Vec<String>,
    pub extends: Vec<TypeRef>,
    pub members: Vec<InterfaceMember>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceMember {
    pub name: String,
    pub optional: bool,
    pub kind: InterfaceMemberKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InterfaceMemberKind {
    Property(TypeRef),
    Method {
        params: Vec<Param>,
        ret: Option<TypeRef>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub members: Vec<EnumMember>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub name: String,
    pub value: Option<Expr>,
}
