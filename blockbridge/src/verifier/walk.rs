use crate::syntax::*;
use crate::types::{Accessors, Primitive, Signature, TypeDescriptor, TypeId};
use crate::utils::{DiagnosticCode, InternalError, Verify};

use super::{Verifier, FOR_IN_UNSUPPORTED};

/// How an expression is used by its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
    Callee,
}

impl Verify for Stmt {
    fn verify(&self, v: &mut Verifier<'_>) -> Result<(), InternalError> {
        match &self.kind {
            StmtKind::Namespace(ns) => {
                for stmt in &ns.body {
                    stmt.verify(v)?;
                }
            }
            StmtKind::Class(class) => {
                v.check_class(class, self.span)?;
                v.class_bodies(class, self.span)?;
            }
            StmtKind::Interface(_) | StmtKind::Enum(_) => {}
            StmtKind::Function(func) => {
                v.function_body(&func.params, &func.ret, func.body.as_deref(), &[])?
            }
            StmtKind::VarDecl(decl) => v.var_decl(decl)?,
            StmtKind::Expr(expr) => {
                v.expr(expr)?;
            }
            StmtKind::If(i) => {
                v.expr(&i.cond)?;
                i.then_branch.verify(v)?;
                if let Some(else_branch) = &i.else_branch {
                    else_branch.verify(v)?;
                }
            }
            StmtKind::While(w) => {
                v.expr(&w.cond)?;
                w.body.verify(v)?;
            }
            StmtKind::For(f) => {
                v.scope.push();
                match &f.init {
                    Some(ForInit::Decl(decl)) => v.var_decl(decl)?,
                    Some(ForInit::Expr(expr)) => {
                        v.expr(expr)?;
                    }
                    None => {}
                }
                if let Some(cond) = &f.cond {
                    v.expr(cond)?;
                }
                if let Some(update) = &f.update {
                    v.expr(update)?;
                }
                f.body.verify(v)?;
                v.scope.pop()?;
            }
            StmtKind::ForOf(f) => {
                let iterable = v.expr(&f.iterable)?;
                let elem = match v.env.table.get(v.env.base_of(iterable)?)? {
                    TypeDescriptor::Array(elem) => *elem,
                    TypeDescriptor::Primitive(Primitive::String) => iterable,
                    TypeDescriptor::Primitive(Primitive::Any) => iterable,
                    _ => {
                        let message = format!(
                            "`for ... of` only iterates arrays and strings, found `{}`",
                            v.env.table.display(iterable)
                        );
                        v.report(DiagnosticCode::ForOfUnsupportedType, f.iterable.span, message);
                        v.env.table.any()
                    }
                };
                v.each_body(f, elem, self.span)?;
            }
            StmtKind::ForIn(f) => {
                v.report(
                    DiagnosticCode::ForInUnsupported,
                    self.span,
                    FOR_IN_UNSUPPORTED,
                );
                v.expr(&f.iterable)?;
                let string = v.env.table.string();
                v.each_body(f, string, self.span)?;
            }
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    match v.scope.return_type() {
                        Some(ret) => v.value(value, ret)?,
                        None => {
                            v.expr(value)?;
                        }
                    }
                }
            }
            StmtKind::Break | StmtKind::Continue => {}
            StmtKind::Block(stmts) => {
                v.scope.push();
                for stmt in stmts {
                    stmt.verify(v)?;
                }
                v.scope.pop()?;
            }
        }
        Ok(())
    }
}

impl Verifier<'_> {
    /// Walks the member bodies of a class with `this` bound to it.
    pub(crate) fn class_bodies(&mut self, class: &ClassDecl, span: Span) -> Result<(), InternalError> {
        let this = self.env.declared_type(&span);
        let previous = self.scope.set_this_class(this);
        for member in &class.members {
            match &member.kind {
                MemberKind::Field { init: Some(init), .. } => {
                    self.expr(init)?;
                }
                MemberKind::Field { .. } => {}
                MemberKind::Method(m)
                | MemberKind::Getter(m)
                | MemberKind::Setter(m)
                | MemberKind::Constructor(m) => {
                    self.function_body(&m.params, &m.ret, m.body.as_deref(), &class.type_params)?
                }
            }
        }
        self.scope.set_this_class(previous);
        Ok(())
    }

    pub(crate) fn function_body(
        &mut self,
        params: &[Param],
        ret: &Option<TypeRef>,
        body: Option<&[Stmt]>,
        generics: &[String],
    ) -> Result<(), InternalError> {
        let Some(body) = body else {
            return Ok(());
        };
        let ret = match ret {
            Some(ty) => self.env.resolve_in(ty, generics),
            None => self.env.table.any(),
        };
        self.scope.enter_function(ret);
        self.params(params, generics, None)?;
        for stmt in body {
            stmt.verify(self)?;
        }
        self.scope.leave_function()
    }

    /// Declares parameters in the current frame and checks their default values.
    /// Unannotated parameters take their type from `contract` when one is given.
    fn params(
        &mut self,
        params: &[Param],
        generics: &[String],
        contract: Option<&Signature>,
    ) -> Result<Vec<TypeId>, InternalError> {
        let mut types = Vec::with_capacity(params.len());
        for (idx, param) in params.iter().enumerate() {
            let declared = match &param.ty {
                Some(ty) => Some(self.env.resolve_in(ty, generics)),
                None => contract.and_then(|sig| sig.params.get(idx)).map(|p| p.ty),
            };
            let ty = match (&param.default, declared) {
                (Some(default), Some(declared)) => {
                    self.value(default, declared)?;
                    declared
                }
                (Some(default), None) => self.expr(default)?,
                (None, Some(declared)) => declared,
                (None, None) => self.env.table.any(),
            };
            self.scope.declare(param.name.clone(), ty);
            types.push(ty);
        }
        Ok(types)
    }

    fn var_decl(&mut self, decl: &VarDecl) -> Result<(), InternalError> {
        for d in &decl.declarators {
            let declared = d.ty.as_ref().map(|ty| self.env.resolve(ty));
            let ty = match (declared, &d.init) {
                (Some(declared), Some(init)) => {
                    self.value(init, declared)?;
                    declared
                }
                (Some(declared), None) => declared,
                (None, Some(init)) => self.expr(init)?,
                (None, None) => self.env.table.any(),
            };
            self.scope.declare(d.name.clone(), ty);
        }
        Ok(())
    }

    /// An annotated loop variable receives each element through a cast.
    fn each_body(&mut self, each: &ForEach, elem: TypeId, span: Span) -> Result<(), InternalError> {
        self.scope.push();
        let ty = match &each.ty {
            Some(ty) => {
                let declared = self.env.resolve(ty);
                self.check_cast(elem, declared, span)?;
                declared
            }
            None => elem,
        };
        self.scope.declare(each.name.clone(), ty);
        each.body.verify(self)?;
        self.scope.pop()
    }

    /// Verifies `expr` as an rvalue and returns its type.
    pub(crate) fn expr(&mut self, expr: &Expr) -> Result<TypeId, InternalError> {
        self.walk(expr, Access::Read)
    }

    /// Verifies `expr` as a value flowing into `target` and checks the cast.
    /// Array literals are checked element by element against the target's
    /// element type.
    fn value(&mut self, expr: &Expr, target: TypeId) -> Result<(), InternalError> {
        let literal = expr.unparen();
        if let ExprKind::Array(elems) = &literal.kind {
            if let TypeDescriptor::Array(elem) = self.env.table.get(target)? {
                let elem = *elem;
                for item in elems {
                    self.value(item, elem)?;
                }
                self.type_of(literal)?;
                if literal.span != expr.span {
                    self.type_of(expr)?;
                }
                return Ok(());
            }
        }
        let ty = self.expr(expr)?;
        self.check_cast(ty, target, expr.span)
    }

    /// Without a declared element type every element must convert to the
    /// type of the first one.
    fn elements(&mut self, elems: &[Expr]) -> Result<(), InternalError> {
        let Some((first, rest)) = elems.split_first() else {
            return Ok(());
        };
        let elem = self.expr(first)?;
        for item in rest {
            self.value(item, elem)?;
        }
        Ok(())
    }

    fn walk(&mut self, expr: &Expr, access: Access) -> Result<TypeId, InternalError> {
        match &expr.kind {
            ExprKind::Number(_)
            | ExprKind::Str(_)
            | ExprKind::Bool(_)
            | ExprKind::Null
            | ExprKind::Ident(_)
            | ExprKind::This
            | ExprKind::Super => {}
            ExprKind::Array(elems) => self.elements(elems)?,
            ExprKind::Paren(inner) => {
                self.walk(inner, access)?;
            }
            ExprKind::Unary(unary) => {
                self.expr(&unary.operand)?;
            }
            ExprKind::Update(update) => {
                self.expr(&update.target)?;
            }
            ExprKind::Binary(bin) => {
                self.expr(&bin.left)?;
                self.expr(&bin.right)?;
            }
            ExprKind::Assign(assign) => {
                let access = if assign.op.is_compound() {
                    Access::Read
                } else {
                    Access::Write
                };
                let target = self.walk(&assign.target, access)?;
                if assign.op.is_compound() {
                    self.expr(&assign.value)?;
                } else {
                    self.value(&assign.value, target)?;
                }
            }
            ExprKind::Call(call) => {
                self.walk(&call.callee, Access::Callee)?;
                let sig = self.env.callee_signature(&call.callee, &self.scope)?;
                self.args(sig.as_ref(), &call.args)?;
                if let Some(sig) = sig {
                    self.types.record_callee(expr.span, sig);
                }
            }
            ExprKind::Member(member) => {
                let object = self.expr(&member.object)?;
                if access == Access::Read {
                    self.check_read(object, member, expr.span)?;
                }
            }
            ExprKind::Index(index) => {
                self.expr(&index.object)?;
                self.expr(&index.index)?;
            }
            ExprKind::New(new) => {
                let sig = self.env.constructor_signature(&new.class)?;
                self.args(sig.as_ref(), &new.args)?;
            }
            ExprKind::Lambda(lambda) => {
                let ty = self.lambda(lambda, None)?;
                self.types.record(expr.span, ty);
                return Ok(ty);
            }
            ExprKind::As(cast) => {
                let source = self.expr(&cast.expr)?;
                let target = self.env.resolve(&cast.ty);
                self.check_cast(source, target, expr.span)?;
            }
        }
        self.type_of(expr)
    }

    /// Checks every argument against the parameter it binds to.
    fn args(&mut self, sig: Option<&Signature>, args: &[Expr]) -> Result<(), InternalError> {
        for (idx, arg) in args.iter().enumerate() {
            let param = sig.and_then(|sig| sig.params.get(idx)).map(|p| p.ty);
            match (&arg.unparen().kind, param) {
                (ExprKind::Lambda(lambda), _) => {
                    let ty = self.lambda(lambda, param)?;
                    self.types.record(arg.unparen().span, ty);
                    if let Some(param) = param {
                        self.check_cast(ty, param, arg.span)?;
                    }
                }
                (_, Some(param)) => self.value(arg, param)?,
                (_, None) => {
                    self.expr(arg)?;
                }
            }
        }
        Ok(())
    }

    /// Walks an anonymous function. `contract` is the function type of the
    /// parameter it is passed to, if any.
    fn lambda(&mut self, lambda: &Lambda, contract: Option<TypeId>) -> Result<TypeId, InternalError> {
        let contract = match contract {
            Some(ty) => self.env.function_signature(ty)?,
            None => None,
        };
        let ret = match &lambda.ret {
            Some(ty) => Some(self.env.resolve(ty)),
            None => None,
        };
        self.scope.enter_function(ret.unwrap_or(self.env.table.any()));
        let params = self.params(&lambda.params, &[], contract.as_ref())?;
        for stmt in &lambda.body {
            stmt.verify(self)?;
        }
        self.scope.leave_function()?;
        let ret = ret
            .or(contract.map(|sig| sig.ret))
            .unwrap_or(self.env.table.any());
        Ok(self.env.table.function(params, ret))
    }

    /// Reads of a property that only has a setter are rejected at the use site.
    fn check_read(&mut self, object: TypeId, member: &Member, span: Span) -> Result<(), InternalError> {
        let base = self.env.base_of(object)?;
        if self.env.class(base)?.is_none() {
            return Ok(());
        }
        if self.env.accessors(base, &member.property)? == Accessors::SetterOnly {
            self.report(
                DiagnosticCode::AccessorIncomplete,
                span,
                format!(
                    "property `{}` has a setter but no getter and can't be read",
                    member.property
                ),
            );
        }
        Ok(())
    }
}
