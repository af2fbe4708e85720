use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument};

use crate::syntax::*;
use crate::utils::{DiagnosticCode, Diagnostics, InternalError};

use super::{Primitive, Supertype, TypeDescriptor, TypeId, TypeTable};

#[derive(Debug, Clone, PartialEq)]
pub struct ParamInfo {
    pub name: String,
    pub ty: TypeId,
    pub optional: bool,
    pub has_default: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub params: Vec<ParamInfo>,
    pub ret: TypeId,
}

impl Signature {
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn function_type(&self, table: &mut TypeTable) -> TypeId {
        table.function(self.params.iter().map(|p| p.ty).collect(), self.ret)
    }
}

#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub name: String,
    pub id: TypeId,
    pub fields: HashMap<String, TypeId>,
    pub methods: HashMap<String, Signature>,
    pub getters: HashMap<String, TypeId>,
    pub setters: HashMap<String, TypeId>,
    pub ctor: Option<Signature>,
    pub implements: Vec<TypeId>,
}

#[derive(Debug, Clone)]
pub enum MemberShape {
    Property(TypeId),
    Method(Signature),
}

#[derive(Debug, Clone)]
pub struct InterfaceMemberInfo {
    pub name: String,
    pub optional: bool,
    pub shape: MemberShape,
}

#[derive(Debug, Clone)]
pub struct InterfaceInfo {
    pub name: String,
    pub id: TypeId,
    pub members: Vec<InterfaceMemberInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accessors {
    None,
    Field,
    GetterOnly,
    SetterOnly,
    Both,
}

/// Program-wide declarations: the resolver the verifier and decompiler consult.
#[derive(Debug, Clone)]
pub struct TypeEnv {
    pub table: TypeTable,
    type_names: HashMap<String, TypeId>,
    declared: HashMap<Span, TypeId>,
    classes: HashMap<TypeId, ClassInfo>,
    interfaces: HashMap<TypeId, InterfaceInfo>,
    enums: HashSet<String>,
    namespaces: HashSet<String>,
    functions: HashMap<String, Signature>,
    globals: HashMap<String, TypeId>,
}

struct Decl<'p, T> {
    qualified: String,
    short: String,
    decl: &'p T,
    span: Span,
}

#[derive(Default)]
struct Decls<'p> {
    classes: Vec<Decl<'p, ClassDecl>>,
    interfaces: Vec<Decl<'p, InterfaceDecl>>,
    enums: Vec<(String, String)>,
    functions: Vec<Decl<'p, FunctionDecl>>,
    globals: Vec<(String, String, &'p Declarator)>,
    namespaces: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Pending,
    Active,
    Done(TypeId),
}

fn qualify(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_owned()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn collect<'p>(stmts: &'p [Stmt], prefix: &str, decls: &mut Decls<'p>) {
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Namespace(ns) => {
                let qualified = qualify(prefix, &ns.name);
                decls.namespaces.push(qualified.clone());
                collect(&ns.body, &qualified, decls);
            }
            StmtKind::Class(class) => decls.classes.push(Decl {
                qualified: qualify(prefix, &class.name),
                short: class.name.clone(),
                decl: class,
                span: stmt.span,
            }),
            StmtKind::Interface(iface) => decls.interfaces.push(Decl {
                qualified: qualify(prefix, &iface.name),
                short: iface.name.clone(),
                decl: iface,
                span: stmt.span,
            }),
            StmtKind::Enum(e) => decls
                .enums
                .push((qualify(prefix, &e.name), e.name.clone())),
            StmtKind::Function(func) => decls.functions.push(Decl {
                qualified: qualify(prefix, &func.name),
                short: func.name.clone(),
                decl: func,
                span: stmt.span,
            }),
            StmtKind::VarDecl(decl) => {
                for d in &decl.declarators {
                    decls
                        .globals
                        .push((qualify(prefix, &d.name), d.name.clone(), d));
                }
            }
            _ => {}
        }
    }
}

impl TypeEnv {
    pub fn empty() -> Self {
        Self {
            table: TypeTable::new(),
            type_names: HashMap::new(),
            declared: HashMap::new(),
            classes: HashMap::new(),
            interfaces: HashMap::new(),
            enums: HashSet::new(),
            namespaces: HashSet::new(),
            functions: HashMap::new(),
            globals: HashMap::new(),
        }
    }

    /// Interns every declared type of `program`. Inheritance cycles are reported and the
    /// closing edge is dropped so that ancestor chains stay finite.
    #[instrument(skip_all)]
    pub fn build(program: &Program) -> Result<(Self, Diagnostics), InternalError> {
        let mut env = Self::empty();
        let mut diagnostics = Diagnostics::new();
        let mut decls = Decls::default();
        collect(&program.items, "", &mut decls);

        for (qualified, short) in &decls.enums {
            env.enums.insert(qualified.clone());
            env.enums.insert(short.clone());
        }
        env.namespaces.extend(decls.namespaces.iter().cloned());

        let mut visits = vec![Visit::Pending; decls.interfaces.len()];
        for idx in 0..decls.interfaces.len() {
            env.intern_interface(idx, &decls, &mut visits, &mut diagnostics)?;
        }
        let mut visits = vec![Visit::Pending; decls.classes.len()];
        for idx in 0..decls.classes.len() {
            env.intern_class(idx, &decls, &mut visits, &mut diagnostics)?;
        }

        for iface in &decls.interfaces {
            env.fill_interface(iface)?;
        }
        for class in &decls.classes {
            env.fill_class(class)?;
        }
        for func in &decls.functions {
            let sig = env.signature(&func.decl.params, &func.decl.ret, &[]);
            env.functions.entry(func.short.clone()).or_insert(sig.clone());
            env.functions.insert(func.qualified.clone(), sig);
        }
        for (qualified, short, d) in &decls.globals {
            let ty = match &d.ty {
                Some(ty) => env.resolve(ty),
                None => env.literal_type(d.init.as_ref()),
            };
            env.globals.entry(short.clone()).or_insert(ty);
            env.globals.insert(qualified.clone(), ty);
        }
        debug!(
            classes = env.classes.len(),
            interfaces = env.interfaces.len(),
            functions = env.functions.len(),
            "type environment built"
        );
        Ok((env, diagnostics))
    }

    fn register_name(&mut self, qualified: &str, short: &str, id: TypeId, span: Span) {
        self.type_names.entry(short.to_owned()).or_insert(id);
        self.type_names.insert(qualified.to_owned(), id);
        self.declared.insert(span, id);
    }

    fn parent_class_index(&self, class: &ClassDecl, decls: &Decls<'_>) -> Option<usize> {
        let name = class.extends.first()?.name()?;
        decls
            .classes
            .iter()
            .position(|c| c.qualified == name)
            .or_else(|| decls.classes.iter().position(|c| c.short == name))
    }

    fn intern_class(
        &mut self,
        idx: usize,
        decls: &Decls<'_>,
        visits: &mut Vec<Visit>,
        diagnostics: &mut Diagnostics,
    ) -> Result<TypeId, InternalError> {
        if let Visit::Done(id) = visits[idx] {
            return Ok(id);
        }
        visits[idx] = Visit::Active;
        let class = &decls.classes[idx];
        let supertype = match self.parent_class_index(class.decl, decls) {
            Some(parent) if visits[parent] == Visit::Active => {
                diagnostics.report(
                    DiagnosticCode::InheritanceCycle,
                    class.span,
                    format!(
                        "class `{}` inherits from itself through `{}`",
                        class.short, decls.classes[parent].short
                    ),
                );
                Supertype::None
            }
            Some(parent) => Supertype::One(self.intern_class(parent, decls, visits, diagnostics)?),
            None => Supertype::None,
        };
        let id = self.table.class(&class.qualified, supertype)?;
        self.register_name(&class.qualified, &class.short, id, class.span);
        visits[idx] = Visit::Done(id);
        Ok(id)
    }

    fn intern_interface(
        &mut self,
        idx: usize,
        decls: &Decls<'_>,
        visits: &mut Vec<Visit>,
        diagnostics: &mut Diagnostics,
    ) -> Result<TypeId, InternalError> {
        if let Visit::Done(id) = visits[idx] {
            return Ok(id);
        }
        visits[idx] = Visit::Active;
        let iface = &decls.interfaces[idx];
        let mut supertypes = vec![];
        for ext in &iface.decl.extends {
            let Some(name) = ext.name() else { continue };
            let parent = decls
                .interfaces
                .iter()
                .position(|i| i.qualified == name)
                .or_else(|| decls.interfaces.iter().position(|i| i.short == name));
            match parent {
                Some(parent) if visits[parent] == Visit::Active => diagnostics.report(
                    DiagnosticCode::InheritanceCycle,
                    iface.span,
                    format!(
                        "interface `{}` extends itself through `{}`",
                        iface.short, decls.interfaces[parent].short
                    ),
                ),
                Some(parent) => {
                    supertypes.push(self.intern_interface(parent, decls, visits, diagnostics)?)
                }
                None => {}
            }
        }
        let id = self.table.interface(&iface.qualified, supertypes);
        self.register_name(&iface.qualified, &iface.short, id, iface.span);
        visits[idx] = Visit::Done(id);
        Ok(id)
    }

    fn fill_interface(&mut self, iface: &Decl<'_, InterfaceDecl>) -> Result<(), InternalError> {
        let id = self
            .declared
            .get(&iface.span)
            .copied()
            .ok_or(InternalError::UnknownTypeId(usize::MAX))?;
        let generics = iface.decl.type_params.clone();
        let members = iface
            .decl
            .members
            .iter()
            .map(|m| {
                let shape = match &m.kind {
                    InterfaceMemberKind::Property(ty) => {
                        MemberShape::Property(self.resolve_in(ty, &generics))
                    }
                    InterfaceMemberKind::Method { params, ret } => {
                        MemberShape::Method(self.signature(params, ret, &generics))
                    }
                };
                InterfaceMemberInfo {
                    name: m.name.clone(),
                    optional: m.optional,
                    shape,
                }
            })
            .collect();
        self.interfaces.insert(
            id,
            InterfaceInfo {
                name: iface.short.clone(),
                id,
                members,
            },
        );
        Ok(())
    }

    fn fill_class(&mut self, class: &Decl<'_, ClassDecl>) -> Result<(), InternalError> {
        let id = self
            .declared
            .get(&class.span)
            .copied()
            .ok_or(InternalError::UnknownTypeId(usize::MAX))?;
        let generics = class.decl.type_params.clone();
        let mut info = ClassInfo {
            name: class.short.clone(),
            id,
            fields: HashMap::new(),
            methods: HashMap::new(),
            getters: HashMap::new(),
            setters: HashMap::new(),
            ctor: None,
            implements: vec![],
        };
        for ty in &class.decl.implements {
            let resolved = self.resolve_in(ty, &generics);
            info.implements.push(resolved);
        }
        for member in &class.decl.members {
            match &member.kind {
                MemberKind::Field { ty, init, .. } => {
                    let ty = match ty {
                        Some(ty) => self.resolve_in(ty, &generics),
                        None => self.literal_type(init.as_ref()),
                    };
                    info.fields.insert(member.name.clone(), ty);
                }
                MemberKind::Method(m) => {
                    let sig = self.signature(&m.params, &m.ret, &generics);
                    info.methods.insert(member.name.clone(), sig);
                }
                MemberKind::Getter(m) => {
                    let ty = match &m.ret {
                        Some(ty) => self.resolve_in(ty, &generics),
                        None => self.table.any(),
                    };
                    info.getters.insert(member.name.clone(), ty);
                }
                MemberKind::Setter(m) => {
                    let ty = match m.params.first().and_then(|p| p.ty.as_ref()) {
                        Some(ty) => self.resolve_in(ty, &generics),
                        None => self.table.any(),
                    };
                    info.setters.insert(member.name.clone(), ty);
                }
                MemberKind::Constructor(m) => {
                    info.ctor = Some(self.signature(&m.params, &None, &generics));
                }
            }
        }
        self.classes.insert(id, info);
        Ok(())
    }

    /// Type of an unannotated declaration, inferred from a literal initializer only.
    fn literal_type(&mut self, init: Option<&Expr>) -> TypeId {
        match init.map(|e| &e.unparen().kind) {
            Some(ExprKind::Number(_)) => self.table.number(),
            Some(ExprKind::Unary(Unary {
                op: UnaryOp::Minus,
                operand,
            })) if operand.is_number_literal() => self.table.number(),
            Some(ExprKind::Str(_)) => self.table.string(),
            Some(ExprKind::Bool(_)) => self.table.boolean(),
            Some(ExprKind::New(new)) => self
                .type_names
                .get(&new.class)
                .copied()
                .unwrap_or(self.table.any()),
            _ => self.table.any(),
        }
    }

    pub fn signature(
        &mut self,
        params: &[Param],
        ret: &Option<TypeRef>,
        generics: &[String],
    ) -> Signature {
        let params = params
            .iter()
            .map(|p| ParamInfo {
                name: p.name.clone(),
                ty: match &p.ty {
                    Some(ty) => self.resolve_in(ty, generics),
                    None => self.table.any(),
                },
                optional: p.optional,
                has_default: p.default.is_some(),
            })
            .collect();
        let ret = match ret {
            Some(ty) => self.resolve_in(ty, generics),
            None => self.table.any(),
        };
        Signature { params, ret }
    }

    pub fn resolve(&mut self, ty: &TypeRef) -> TypeId {
        self.resolve_in(ty, &[])
    }

    pub fn resolve_in(&mut self, ty: &TypeRef, generics: &[String]) -> TypeId {
        match ty {
            TypeRef::Named { name, .. } if generics.contains(name) => self.table.any(),
            TypeRef::Named { name, args } => {
                if let Ok(prim) = name.parse::<Primitive>() {
                    return self.table.primitive(prim);
                }
                if name == "Array" && args.len() == 1 {
                    let elem = self.resolve_in(&args[0], generics);
                    return self.table.array(elem);
                }
                if self.enums.contains(name) {
                    return self.table.number();
                }
                match self.type_names.get(name).copied() {
                    Some(base) if args.is_empty() => base,
                    Some(base) => {
                        let args = args.iter().map(|a| self.resolve_in(a, generics)).collect();
                        self.table
                            .intern(TypeDescriptor::GenericInstance { base, args })
                    }
                    None => self.table.any(),
                }
            }
            TypeRef::Array(elem) => {
                let elem = self.resolve_in(elem, generics);
                self.table.array(elem)
            }
            TypeRef::Function { params, ret } => {
                let params = params
                    .iter()
                    .map(|(_, p)| self.resolve_in(p, generics))
                    .collect();
                let ret = self.resolve_in(ret, generics);
                self.table.function(params, ret)
            }
        }
    }

    pub fn type_named(&self, name: &str) -> Option<TypeId> {
        self.type_names.get(name).copied()
    }

    /// Type interned for the class or interface declared by the statement at `span`.
    pub fn declared_type(&self, span: &Span) -> Option<TypeId> {
        self.declared.get(span).copied()
    }

    pub fn is_enum(&self, name: &str) -> bool {
        self.enums.contains(name)
    }

    pub fn is_namespace(&self, name: &str) -> bool {
        self.namespaces.contains(name)
            || self.namespaces.iter().any(|ns| ns.ends_with(&format!(".{}", name)))
    }

    pub fn function(&self, path: &str) -> Option<&Signature> {
        self.functions.get(path)
    }

    pub fn global(&self, path: &str) -> Option<TypeId> {
        self.globals.get(path).copied()
    }

    /// Strips generic instantiation down to the declared class or interface.
    pub fn base_of(&self, id: TypeId) -> Result<TypeId, InternalError> {
        match self.table.get(id)? {
            TypeDescriptor::GenericInstance { base, .. } => Ok(*base),
            _ => Ok(id),
        }
    }

    pub fn class(&self, id: TypeId) -> Result<Option<&ClassInfo>, InternalError> {
        Ok(self.classes.get(&self.base_of(id)?))
    }

    pub fn interface(&self, id: TypeId) -> Result<Option<&InterfaceInfo>, InternalError> {
        Ok(self.interfaces.get(&self.base_of(id)?))
    }

    pub fn parent_of(&self, class: TypeId) -> Result<Option<TypeId>, InternalError> {
        match self.table.get(self.base_of(class)?)? {
            TypeDescriptor::Class { supertype, .. } => Ok(supertype.id()),
            _ => Ok(None),
        }
    }

    fn chain(&self, class: TypeId) -> Result<Vec<&ClassInfo>, InternalError> {
        Ok(self
            .table
            .ancestors(self.base_of(class)?)?
            .into_iter()
            .filter_map(|id| self.classes.get(&id))
            .collect())
    }

    /// Nearest method called `name` on `class` or its ancestors.
    pub fn find_method(
        &self,
        class: TypeId,
        name: &str,
    ) -> Result<Option<(&ClassInfo, &Signature)>, InternalError> {
        Ok(self
            .chain(class)?
            .into_iter()
            .find_map(|info| info.methods.get(name).map(|sig| (info, sig))))
    }

    pub fn find_ctor(&self, class: TypeId) -> Result<Option<&Signature>, InternalError> {
        Ok(self
            .chain(class)?
            .into_iter()
            .find_map(|info| info.ctor.as_ref()))
    }

    /// Readable type of property `name`: field, getter or (write-only) setter.
    pub fn find_property(&self, class: TypeId, name: &str) -> Result<Option<TypeId>, InternalError> {
        Ok(self.chain(class)?.into_iter().find_map(|info| {
            info.fields
                .get(name)
                .or_else(|| info.getters.get(name))
                .or_else(|| info.setters.get(name))
                .copied()
        }))
    }

    /// How property `name` is backed along the chain of `class`.
    pub fn accessors(&self, class: TypeId, name: &str) -> Result<Accessors, InternalError> {
        let chain = self.chain(class)?;
        if chain.iter().any(|info| info.fields.contains_key(name)) {
            return Ok(Accessors::Field);
        }
        let getter = chain.iter().any(|info| info.getters.contains_key(name));
        let setter = chain.iter().any(|info| info.setters.contains_key(name));
        Ok(match (getter, setter) {
            (true, true) => Accessors::Both,
            (true, false) => Accessors::GetterOnly,
            (false, true) => Accessors::SetterOnly,
            (false, false) => Accessors::None,
        })
    }

    /// Every member name visible on `id` together with its method arity, if a method.
    pub fn members(&self, id: TypeId) -> Result<HashMap<String, Option<usize>>, InternalError> {
        let mut members = HashMap::new();
        match self.table.get(self.base_of(id)?)? {
            TypeDescriptor::Class { .. } => {
                for info in self.chain(id)?.into_iter().rev() {
                    for name in info
                        .fields
                        .keys()
                        .chain(info.getters.keys())
                        .chain(info.setters.keys())
                    {
                        members.insert(name.clone(), None);
                    }
                    for (name, sig) in &info.methods {
                        members.insert(name.clone(), Some(sig.arity()));
                    }
                }
            }
            TypeDescriptor::Interface { .. } => {
                for iface in self.table.interface_ancestors(self.base_of(id)?)? {
                    let Some(info) = self.interfaces.get(&iface) else { continue };
                    for m in &info.members {
                        let arity = match &m.shape {
                            MemberShape::Property(_) => None,
                            MemberShape::Method(sig) => Some(sig.arity()),
                        };
                        members.entry(m.name.clone()).or_insert(arity);
                    }
                }
            }
            _ => {}
        }
        Ok(members)
    }

    /// Non-optional members an implementor of interface `id` must provide.
    pub fn required_members(
        &self,
        id: TypeId,
    ) -> Result<Vec<(String, Option<usize>)>, InternalError> {
        let mut required = vec![];
        for iface in self.table.interface_ancestors(self.base_of(id)?)? {
            let Some(info) = self.interfaces.get(&iface) else { continue };
            for m in info.members.iter().filter(|m| !m.optional) {
                let arity = match &m.shape {
                    MemberShape::Property(_) => None,
                    MemberShape::Method(sig) => Some(sig.arity()),
                };
                required.push((m.name.clone(), arity));
            }
        }
        Ok(required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_program;

    fn env(source: &str) -> (TypeEnv, Diagnostics) {
        TypeEnv::build(&parse_program(source).unwrap()).unwrap()
    }

    #[test]
    fn classes_and_members() {
        let (env, diags) = env("class A { x: number; foo(a: number): void {} }
             class B extends A { get y(): string { return \"\"; } }");
        assert!(diags.is_empty());
        let b = env.type_named("B").unwrap();
        let a = env.type_named("A").unwrap();
        assert_eq!(env.parent_of(b).unwrap(), Some(a));
        assert_eq!(env.find_property(b, "x").unwrap(), Some(env.table.number()));
        let (owner, sig) = env.find_method(b, "foo").unwrap().unwrap();
        assert_eq!(owner.name, "A");
        assert_eq!(sig.arity(), 1);
        assert_eq!(env.accessors(b, "y").unwrap(), Accessors::GetterOnly);
    }

    #[test]
    fn cycles_are_cut() {
        let (env, diags) = env("class A extends B {} class B extends A {}");
        assert_eq!(diags.codes(), [DiagnosticCode::InheritanceCycle]);
        let a = env.type_named("A").unwrap();
        assert!(env.table.ancestors(a).unwrap().len() <= 2);
    }

    #[test]
    fn self_extension_is_a_cycle() {
        let (_, diags) = env("class A extends A {}");
        assert_eq!(diags.codes(), [DiagnosticCode::InheritanceCycle]);
    }

    #[test]
    fn namespaced_declarations() {
        let (env, _) = env("namespace basic { export function showNumber(n: number): void {} }
             enum Button { A, B }");
        assert!(env.function("basic.showNumber").is_some());
        assert!(env.function("showNumber").is_some());
        assert!(env.is_namespace("basic"));
        assert!(env.is_enum("Button"));
    }

    #[test]
    fn type_refs_resolve() {
        let (mut env, _) = env("class Box<T> { value: T; } interface Shape { area(): number; }");
        let number = env.table.number();
        let arr = env.resolve(&TypeRef::Array(Box::new(TypeRef::named("number"))));
        assert_eq!(arr, env.table.array(number));
        let boxed = env.resolve(&TypeRef::Named {
            name: "Box".into(),
            args: vec![TypeRef::named("number")],
        });
        let box_id = env.type_named("Box").unwrap();
        assert_eq!(env.base_of(boxed).unwrap(), box_id);
        assert_eq!(env.find_property(boxed, "value").unwrap(), Some(env.table.any()));
        let unknown = env.resolve(&TypeRef::named("Sprite"));
        assert_eq!(unknown, env.table.any());
    }
}
