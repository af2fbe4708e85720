mod class;
mod walk;

use std::collections::HashMap;

use tracing::{debug, instrument};

use crate::syntax::{Expr, Program, Span};
use crate::types::{CastRequest, CastVerdict, Scope, Signature, TypeEnv, TypeId};
use crate::utils::{
    Diagnostic, DiagnosticCode, Diagnostics, ExprTypeResolution, InternalError, Verify,
};

pub(crate) const FOR_IN_UNSUPPORTED: &str =
    "`for ... in` loops are not supported, iterate with `for ... of` instead";

/// Resolved type of every expression the verifier visited, keyed by source span,
/// plus the declared signature behind every call it could resolve.
#[derive(Debug, Clone, Default)]
pub struct ExprTypes {
    types: HashMap<Span, TypeId>,
    callees: HashMap<Span, Signature>,
}

impl ExprTypes {
    pub fn get(&self, span: &Span) -> Option<TypeId> {
        self.types.get(span).copied()
    }

    /// Signature of the function called by the call expression at `span`.
    pub fn callee(&self, span: &Span) -> Option<&Signature> {
        self.callees.get(span)
    }

    pub(crate) fn record(&mut self, span: Span, ty: TypeId) {
        self.types.insert(span, ty);
    }

    pub(crate) fn record_callee(&mut self, span: Span, sig: Signature) {
        self.callees.insert(span, sig);
    }
}

pub struct Verified {
    pub diagnostics: Diagnostics,
    pub types: ExprTypes,
}

/// Walks a program once and reports every construct outside the sound subset.
pub struct Verifier<'e> {
    pub(crate) env: &'e mut TypeEnv,
    pub(crate) scope: Scope,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) types: ExprTypes,
}

impl<'e> Verifier<'e> {
    pub fn new(env: &'e mut TypeEnv) -> Self {
        Self {
            env,
            scope: Scope::new(),
            diagnostics: Diagnostics::new(),
            types: ExprTypes::default(),
        }
    }

    #[instrument(skip_all)]
    pub fn verify(mut self, program: &Program) -> Result<Verified, InternalError> {
        for item in &program.items {
            item.verify(&mut self)?;
        }
        debug!(count = self.diagnostics.len(), "verification finished");
        Ok(Verified {
            diagnostics: self.diagnostics,
            types: self.types,
        })
    }

    pub(crate) fn report(&mut self, code: DiagnosticCode, span: Span, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(code, span, message))
    }

    pub(crate) fn type_of(&mut self, expr: &Expr) -> Result<TypeId, InternalError> {
        let ty = expr.resolve_expr_type(self.env, &self.scope)?;
        self.types.record(expr.span, ty);
        Ok(ty)
    }

    /// Evaluates one cast request and reports it at `span` if it is rejected.
    pub(crate) fn check_cast(
        &mut self,
        source: TypeId,
        target: TypeId,
        span: Span,
    ) -> Result<(), InternalError> {
        let req = CastRequest::new(source, target);
        if let CastVerdict::Rejected(code) = self.env.check_cast(req)? {
            let message = self.env.cast_message(req, code);
            self.report(code, span, message);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_program;

    pub(crate) fn codes(source: &str) -> Vec<DiagnosticCode> {
        let program = parse_program(source).unwrap();
        let (mut env, mut diagnostics) = TypeEnv::build(&program).unwrap();
        diagnostics.extend(Verifier::new(&mut env).verify(&program).unwrap().diagnostics);
        diagnostics.sort();
        diagnostics.codes()
    }

    #[test]
    fn override_arity_scenario() {
        assert_eq!(
            codes("class A { foo(x: number) {} } class B extends A { foo() {} }"),
            [DiagnosticCode::OverrideArity]
        );
    }

    #[test]
    fn same_arity_different_types_is_fine() {
        assert!(codes("class A { foo(x: number) {} } class B extends A { foo(x: string) {} }")
            .is_empty());
    }

    #[test]
    fn unrelated_assignment_scenario() {
        assert_eq!(
            codes("class Base {} class Unrelated {} let v = new Base(); let z2: Unrelated = v;"),
            [DiagnosticCode::CastUnrelated]
        );
    }

    #[test]
    fn implicit_cast_sites() {
        let decls = "class Animal {} class Dog extends Animal { constructor(a: Animal) { super(); } }
                     function take(d: Dog): void {}";
        let cases = [
            ("let a: Animal = new Animal(); let d: Dog = a;", DiagnosticCode::CastDowncast),
            ("let a = new Animal(); take(a);", DiagnosticCode::CastDowncast),
            ("let n: number = \"x\";", DiagnosticCode::CastIncompatiblePrimitive),
            ("let d: Dog = null; d = 5;", DiagnosticCode::CastPrimitiveToObject),
            ("new Dog(3);", DiagnosticCode::CastPrimitiveToObject),
            ("function f(): number { return new Animal(); }", DiagnosticCode::CastObjectToPrimitive),
            ("function g(x: number = \"s\") {}", DiagnosticCode::CastIncompatiblePrimitive),
            ("let a = new Animal(); let x = a as Dog;", DiagnosticCode::CastDowncast),
        ];
        for (source, code) in cases {
            let found = codes(&format!("{}\n{}", decls, source));
            assert!(found.contains(&code), "{}: {:?}", source, found);
        }
    }

    #[test]
    fn array_elements_are_cast_sites() {
        let decls = "class Animal {} class Dog extends Animal {} class Cat extends Animal {}";
        let cases = [
            ("let d: Dog[] = [new Dog(), new Cat()];", vec![DiagnosticCode::CastUnrelated]),
            ("let xs: number[] = [1, \"a\"];", vec![DiagnosticCode::CastIncompatiblePrimitive]),
            ("let zs = [1, 2, \"c\"];", vec![DiagnosticCode::CastIncompatiblePrimitive]),
            ("let ns: number[][] = [[1], [\"b\"]];", vec![DiagnosticCode::CastIncompatiblePrimitive]),
            ("let pets: Animal[] = [new Dog(), new Cat()];", vec![]),
            ("function f(a: Animal[]) {}\nf([new Dog(), new Cat()]);", vec![]),
            ("let e: Dog[] = [];", vec![]),
        ];
        for (source, expected) in cases {
            assert_eq!(codes(&format!("{}\n{}", decls, source)), expected, "{}", source);
        }
    }

    #[test]
    fn property_assignment_is_a_cast_site() {
        assert_eq!(
            codes("class Box { n: number; } let b = new Box(); b.n = \"x\";"),
            [DiagnosticCode::CastIncompatiblePrimitive]
        );
    }

    #[test]
    fn field_initializers() {
        assert_eq!(
            codes("class A { x: number = 1; static y: number = 2; z: number; }"),
            [DiagnosticCode::FieldInit]
        );
    }

    #[test]
    fn generic_and_non_class_bases() {
        assert_eq!(
            codes("class Box<T> {} class IntBox extends Box<number> {}"),
            [DiagnosticCode::GenericExtends]
        );
        assert_eq!(
            codes("interface I {} class C extends I {}"),
            [DiagnosticCode::ExtendsNonClass]
        );
        assert_eq!(
            codes("class A {} class B {} class C extends A, B {}"),
            [DiagnosticCode::ExtendsMultiple]
        );
    }

    #[test]
    fn accessor_asymmetry() {
        let decls = "class T { set v(x: number) {} get r(): number { return 1; } }
                     let t = new T();";
        // declaration of a setter without getter
        assert_eq!(codes(decls), [DiagnosticCode::AccessorIncomplete]);
        // writes are fine, reads are not
        assert_eq!(
            codes(&format!("{}\nt.v = 1;", decls)),
            [DiagnosticCode::AccessorIncomplete]
        );
        for read in ["let y = t.v;", "t.v += 1;", "t.v++;"] {
            assert_eq!(
                codes(&format!("{}\n{}", decls, read)),
                [
                    DiagnosticCode::AccessorIncomplete,
                    DiagnosticCode::AccessorIncomplete
                ],
                "{}",
                read
            );
        }
        // a getter-only property reads fine
        assert_eq!(
            codes(&format!("{}\nlet q = t.r;", decls)),
            [DiagnosticCode::AccessorIncomplete]
        );
    }

    #[test]
    fn setter_with_inherited_getter() {
        assert!(codes(
            "class A { get v(): number { return 1; } }
             class B extends A { set v(x: number) {} }
             let b = new B(); let y = b.v;"
        )
        .is_empty());
    }

    #[test]
    fn iteration() {
        assert_eq!(
            codes("let o = 1; for (let k in o) {}"),
            [DiagnosticCode::ForInUnsupported]
        );
        assert!(codes("let xs = [1, 2]; for (let x of xs) {} for (let c of \"abc\") {}").is_empty());
        assert_eq!(
            codes("let n = 3; for (let x of n) {}"),
            [DiagnosticCode::ForOfUnsupportedType]
        );
        assert!(codes("for (let x of unknownThing) {}").is_empty());
    }

    #[test]
    fn annotated_loop_variables_are_cast_sites() {
        let decls = "class Animal {} class Dog extends Animal {}
                     let dogs = [new Dog()]; let animals = [new Animal()];";
        assert!(codes(&format!("{}\nfor (let a: Animal of dogs) {{}}", decls)).is_empty());
        assert_eq!(
            codes(&format!("{}\nfor (let d: Dog of animals) {{}}", decls)),
            [DiagnosticCode::CastDowncast]
        );
        assert_eq!(
            codes("let xs = [1, 2]; for (let x: string of xs) {}"),
            [DiagnosticCode::CastIncompatiblePrimitive]
        );
    }

    #[test]
    fn narrower_handler_is_permitted() {
        assert!(codes(
            "class Animal {} class Dog extends Animal {}
             declare function onEvent(handler: (a: Animal) => void): void;
             onEvent((d: Dog) => {});"
        )
        .is_empty());
    }

    #[test]
    fn wider_handler_arity_is_rejected() {
        assert_eq!(
            codes(
                "declare function onEvent(handler: (a: number) => void): void;
                 onEvent((a: number, b: number) => {});"
            ),
            [DiagnosticCode::CastUnrelated]
        );
    }
}
