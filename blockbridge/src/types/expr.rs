use crate::syntax::*;
use crate::utils::{ExprTypeResolution, InternalError};

use super::{
    MemberShape, ParamInfo, Primitive, Scope, Signature, TypeDescriptor, TypeEnv, TypeId,
};

impl ExprTypeResolution for Expr {
    fn resolve_expr_type(&self, env: &mut TypeEnv, scope: &Scope) -> Result<TypeId, InternalError> {
        let any = env.table.any();
        let ty = match &self.kind {
            ExprKind::Number(_) => env.table.number(),
            ExprKind::Str(_) => env.table.string(),
            ExprKind::Bool(_) => env.table.boolean(),
            ExprKind::Null => any,
            ExprKind::Ident(name) => match scope.lookup(name).or_else(|| env.global(name)) {
                Some(ty) => ty,
                None => match env.function(name).cloned() {
                    Some(sig) => sig.function_type(&mut env.table),
                    None => any,
                },
            },
            ExprKind::This => scope.this_class().unwrap_or(any),
            ExprKind::Super => match scope.this_class() {
                Some(class) => env.parent_of(class)?.unwrap_or(any),
                None => any,
            },
            ExprKind::Array(elems) => {
                let elem = match elems.first() {
                    Some(first) => first.resolve_expr_type(env, scope)?,
                    None => any,
                };
                env.table.array(elem)
            }
            ExprKind::Paren(inner) => inner.resolve_expr_type(env, scope)?,
            ExprKind::Unary(unary) => match unary.op {
                UnaryOp::Not => env.table.boolean(),
                UnaryOp::Minus => env.table.number(),
            },
            ExprKind::Update(_) => env.table.number(),
            ExprKind::Binary(bin) if bin.op == BinaryOp::Add => {
                let left = bin.left.resolve_expr_type(env, scope)?;
                let right = bin.right.resolve_expr_type(env, scope)?;
                let string = env.table.string();
                if left == string || right == string {
                    string
                } else if env.table.is_any(left) || env.table.is_any(right) {
                    any
                } else {
                    env.table.number()
                }
            }
            ExprKind::Binary(bin) if bin.op.is_arithmetic() => env.table.number(),
            ExprKind::Binary(_) => env.table.boolean(),
            ExprKind::Assign(assign) => assign.value.resolve_expr_type(env, scope)?,
            ExprKind::Call(call) => match env.callee_signature(&call.callee, scope)? {
                Some(sig) => sig.ret,
                None => any,
            },
            ExprKind::Member(member) => env.member_type(member, scope)?,
            ExprKind::Index(index) => {
                let object = index.object.resolve_expr_type(env, scope)?;
                match env.table.get(object)? {
                    TypeDescriptor::Array(elem) => *elem,
                    TypeDescriptor::Primitive(Primitive::String) => object,
                    _ => any,
                }
            }
            ExprKind::New(new) => env.type_named(&new.class).unwrap_or(any),
            ExprKind::Lambda(lambda) => {
                let sig = env.signature(&lambda.params, &lambda.ret, &[]);
                sig.function_type(&mut env.table)
            }
            ExprKind::As(cast) => env.resolve(&cast.ty),
        };
        Ok(ty)
    }
}

impl TypeEnv {
    /// Signature of a function-typed value. Parameter names are synthesized.
    pub fn function_signature(&self, ty: TypeId) -> Result<Option<Signature>, InternalError> {
        match self.table.get(ty)? {
            TypeDescriptor::Function { params, ret } => Ok(Some(Signature {
                params: params
                    .iter()
                    .enumerate()
                    .map(|(i, ty)| ParamInfo {
                        name: format!("arg{}", i),
                        ty: *ty,
                        optional: false,
                        has_default: false,
                    })
                    .collect(),
                ret: *ret,
            })),
            _ => Ok(None),
        }
    }

    /// Whether `expr` roots at a local variable rather than a program-level path.
    fn is_local(expr: &Expr, scope: &Scope) -> bool {
        expr.root_ident()
            .is_some_and(|root| scope.lookup(root).is_some())
    }

    pub fn member_type(&mut self, member: &Member, scope: &Scope) -> Result<TypeId, InternalError> {
        let any = self.table.any();
        if !Self::is_local(&member.object, scope) {
            if let Some(object) = member.object.path() {
                if self.is_enum(&object) {
                    return Ok(self.table.number());
                }
                let full = format!("{}.{}", object, member.property);
                if let Some(ty) = self.global(&full) {
                    return Ok(ty);
                }
                if let Some(sig) = self.function(&full).cloned() {
                    return Ok(sig.function_type(&mut self.table));
                }
                if let Some(class) = self.type_named(&object) {
                    if self.class(class)?.is_some() {
                        return Ok(self.find_property(class, &member.property)?.unwrap_or(any));
                    }
                }
            }
        }
        let object = member.object.resolve_expr_type(self, scope)?;
        let base = self.base_of(object)?;
        match self.table.get(base)? {
            TypeDescriptor::Class { .. } => {
                if let Some(ty) = self.find_property(base, &member.property)? {
                    return Ok(ty);
                }
                match self
                    .find_method(base, &member.property)?
                    .map(|(_, sig)| sig.clone())
                {
                    Some(sig) => Ok(sig.function_type(&mut self.table)),
                    None => Ok(any),
                }
            }
            TypeDescriptor::Interface { .. } => {
                let shape = self.interface(base)?.and_then(|info| {
                    info.members
                        .iter()
                        .find(|m| m.name == member.property)
                        .map(|m| m.shape.clone())
                });
                match shape {
                    Some(MemberShape::Property(ty)) => Ok(ty),
                    Some(MemberShape::Method(sig)) => Ok(sig.function_type(&mut self.table)),
                    None => Ok(any),
                }
            }
            TypeDescriptor::Array(_) | TypeDescriptor::Primitive(Primitive::String)
                if member.property == "length" =>
            {
                Ok(self.table.number())
            }
            _ => Ok(any),
        }
    }

    /// Declared signature of whatever `callee` calls, when it is known.
    pub fn callee_signature(
        &mut self,
        callee: &Expr,
        scope: &Scope,
    ) -> Result<Option<Signature>, InternalError> {
        match &callee.unparen().kind {
            ExprKind::Ident(name) => match scope.lookup(name) {
                Some(ty) => self.function_signature(ty),
                None => Ok(self.function(name).cloned()),
            },
            ExprKind::Super => match scope.this_class() {
                Some(class) => match self.parent_of(class)? {
                    Some(parent) => Ok(self.find_ctor(parent)?.cloned()),
                    None => Ok(None),
                },
                None => Ok(None),
            },
            ExprKind::Member(member) => {
                if !Self::is_local(&member.object, scope) {
                    if let Some(sig) = callee.path().and_then(|path| self.function(&path)) {
                        return Ok(Some(sig.clone()));
                    }
                }
                let object = member.object.resolve_expr_type(self, scope)?;
                if self.class(object)?.is_some() {
                    if let Some((_, sig)) = self.find_method(object, &member.property)? {
                        return Ok(Some(sig.clone()));
                    }
                }
                let ty = self.member_type(member, scope)?;
                self.function_signature(ty)
            }
            _ => {
                let ty = callee.resolve_expr_type(self, scope)?;
                self.function_signature(ty)
            }
        }
    }

    pub fn constructor_signature(&self, class: &str) -> Result<Option<Signature>, InternalError> {
        match self.type_named(class) {
            Some(id) if self.class(id)?.is_some() => Ok(self.find_ctor(id)?.cloned()),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{parse_expr_str, parse_program};

    const DECLS: &str = "
        namespace basic { export declare function showNumber(n: number): void; }
        enum Direction { Left, Right }
        class Sprite { x: number; say(text: string): string { return text; } }
        let hero: Sprite = new Sprite();
    ";

    fn type_of(source: &str, locals: &[(&str, TypeRef)]) -> String {
        let (mut env, _) = TypeEnv::build(&parse_program(DECLS).unwrap()).unwrap();
        let mut scope = Scope::new();
        for (name, ty) in locals {
            let ty = env.resolve(ty);
            scope.declare(*name, ty);
        }
        let ty = parse_expr_str(source)
            .unwrap()
            .resolve_expr_type(&mut env, &scope)
            .unwrap();
        env.table.display(ty)
    }

    #[test]
    fn literals_and_operators() {
        assert_eq!(type_of("1 + 2", &[]), "number");
        assert_eq!(type_of("\"a\" + 2", &[]), "string");
        assert_eq!(type_of("1 < 2 && true", &[]), "boolean");
        assert_eq!(type_of("[1, 2]", &[]), "number[]");
        assert_eq!(type_of("-x", &[]), "number");
    }

    #[test]
    fn program_level_paths() {
        assert_eq!(type_of("Direction.Left", &[]), "number");
        assert_eq!(type_of("basic.showNumber", &[]), "(number) => void");
        assert_eq!(type_of("basic.showNumber(1)", &[]), "void");
        assert_eq!(type_of("hero.x", &[]), "number");
        assert_eq!(type_of("hero.say(\"hi\")", &[]), "string");
        assert_eq!(type_of("new Sprite()", &[]), "Sprite");
    }

    #[test]
    fn locals_shadow_globals() {
        let local = [("hero", TypeRef::named("string"))];
        assert_eq!(type_of("hero.length", &local), "number");
        assert_eq!(type_of("hero[0]", &local), "string");
    }

    #[test]
    fn unknown_is_any() {
        assert_eq!(type_of("mystery.call(1)", &[]), "any");
    }
}
