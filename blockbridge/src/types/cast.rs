use crate::utils::{DiagnosticCode, InternalError};

use super::{TypeDescriptor, TypeEnv, TypeId};

/// A value of type `source` flowing into a slot of type `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CastRequest {
    pub source: TypeId,
    pub target: TypeId,
}

impl CastRequest {
    pub fn new(source: TypeId, target: TypeId) -> Self {
        Self { source, target }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastVerdict {
    Legal,
    Rejected(DiagnosticCode),
}

impl CastVerdict {
    pub fn is_legal(self) -> bool {
        matches!(self, Self::Legal)
    }
}

fn rule(code: DiagnosticCode) -> &'static str {
    match code {
        DiagnosticCode::CastDowncast => "downcast to a subclass",
        DiagnosticCode::CastUnrelated => "types are unrelated",
        DiagnosticCode::CastInterfaceToClass => "interface values can't be narrowed to a class",
        DiagnosticCode::CastPrimitiveToObject => "primitive value used as an object",
        DiagnosticCode::CastObjectToPrimitive => "object used as a primitive value",
        DiagnosticCode::CastIncompatiblePrimitive => "incompatible primitive types",
        _ => "cast rejected",
    }
}

impl TypeEnv {
    /// Decides a cast request. Only upcasts (including structural interface conformance),
    /// identity and numeric conversions are legal; `any` is compatible with everything.
    pub fn check_cast(&self, req: CastRequest) -> Result<CastVerdict, InternalError> {
        use CastVerdict::*;
        use DiagnosticCode::*;
        use TypeDescriptor as T;

        let CastRequest { source, target } = req;
        if source == target || self.table.is_any(source) || self.table.is_any(target) {
            return Ok(Legal);
        }
        let verdict = match (self.table.get(source)?, self.table.get(target)?) {
            (T::Primitive(a), T::Primitive(b)) if a.is_numeric() && b.is_numeric() => Legal,
            (T::Primitive(_), T::Primitive(_)) => Rejected(CastIncompatiblePrimitive),
            (T::Primitive(_), _) => Rejected(CastPrimitiveToObject),
            (_, T::Primitive(_)) => Rejected(CastObjectToPrimitive),
            (T::GenericInstance { base, .. }, _) => {
                return self.check_cast(CastRequest::new(*base, target))
            }
            (_, T::GenericInstance { base, .. }) => {
                return self.check_cast(CastRequest::new(source, *base))
            }
            (T::Class { .. }, T::Class { .. }) => {
                if self.table.is_subclass(source, target)? {
                    Legal
                } else if self.table.is_subclass(target, source)? {
                    Rejected(CastDowncast)
                } else {
                    Rejected(CastUnrelated)
                }
            }
            (T::Interface { .. }, T::Class { .. }) => Rejected(CastInterfaceToClass),
            (T::Class { .. }, T::Interface { .. }) => {
                if self.implements(source, target)? || self.conforms(source, target)? {
                    Legal
                } else {
                    Rejected(CastUnrelated)
                }
            }
            (T::Interface { .. }, T::Interface { .. }) => {
                if self.table.interface_ancestors(source)?.contains(&target)
                    || self.conforms(source, target)?
                {
                    Legal
                } else {
                    Rejected(CastUnrelated)
                }
            }
            (T::Array(a), T::Array(b)) => return self.check_cast(CastRequest::new(*a, *b)),
            // Parameter types are not compared: handlers may narrow their arguments.
            (T::Function { params: a, .. }, T::Function { params: b, .. }) => {
                if a.len() <= b.len() {
                    Legal
                } else {
                    Rejected(CastUnrelated)
                }
            }
            _ => Rejected(CastUnrelated),
        };
        Ok(verdict)
    }

    fn implements(&self, class: TypeId, iface: TypeId) -> Result<bool, InternalError> {
        for ancestor in self.table.ancestors(class)? {
            let Some(info) = self.class(ancestor)? else {
                continue;
            };
            for declared in &info.implements {
                let declared = self.base_of(*declared)?;
                if self.table.interface_ancestors(declared)?.contains(&iface) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Structural check: every required member of `iface` exists on `source`
    /// and methods accept no more parameters than the interface passes.
    fn conforms(&self, source: TypeId, iface: TypeId) -> Result<bool, InternalError> {
        let members = self.members(source)?;
        Ok(self
            .required_members(iface)?
            .iter()
            .all(|(name, arity)| match (members.get(name), arity) {
                (None, _) => false,
                (Some(Some(found)), Some(expected)) => found <= expected,
                (Some(None), Some(_)) => false,
                (Some(_), None) => true,
            }))
    }

    pub fn cast_message(&self, req: CastRequest, code: DiagnosticCode) -> String {
        format!(
            "cannot cast `{}` to `{}`: {}",
            self.table.display(req.source),
            self.table.display(req.target),
            rule(code)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{parse_program, TypeRef};
    use crate::types::TypeEnv;
    use DiagnosticCode::*;

    const HIERARCHY: &str = "
        interface Named { name: string; }
        interface Pet extends Named { play(): void; }
        interface Shaped { area(): number; }
        class Animal { name: string; }
        class Dog extends Animal implements Pet { play(): void {} }
        class Puppy extends Dog {}
        class Cat extends Animal {}
        class Rock {}
        class Circle { area(): number { return 0; } }
    ";

    fn env() -> TypeEnv {
        TypeEnv::build(&parse_program(HIERARCHY).unwrap()).unwrap().0
    }

    fn verdict(env: &mut TypeEnv, source: &TypeRef, target: &TypeRef) -> CastVerdict {
        let (source, target) = (env.resolve(source), env.resolve(target));
        env.check_cast(CastRequest::new(source, target)).unwrap()
    }

    fn t(name: &str) -> TypeRef {
        TypeRef::named(name)
    }

    fn arr(name: &str) -> TypeRef {
        TypeRef::Array(Box::new(t(name)))
    }

    fn func(arity: usize) -> TypeRef {
        TypeRef::Function {
            params: (0..arity).map(|i| (format!("p{}", i), t("Dog"))).collect(),
            ret: Box::new(t("void")),
        }
    }

    #[test]
    fn exhaustive_pairs() {
        use CastVerdict::*;
        let mut env = env();
        let cases = [
            // identity and upcasts
            (t("Dog"), t("Dog"), Legal),
            (t("Dog"), t("Animal"), Legal),
            (t("Puppy"), t("Animal"), Legal),
            (t("Dog"), t("Pet"), Legal),
            (t("Puppy"), t("Named"), Legal),
            (t("Pet"), t("Named"), Legal),
            (t("Animal"), t("Named"), Legal),
            (t("Circle"), t("Shaped"), Legal),
            // numeric primitives
            (t("number"), t("number"), Legal),
            // any
            (t("any"), t("Dog"), Legal),
            (t("Rock"), t("any"), Legal),
            (t("Sprite"), t("number"), Legal),
            // rejected classes
            (t("Animal"), t("Dog"), Rejected(CastDowncast)),
            (t("Animal"), t("Puppy"), Rejected(CastDowncast)),
            (t("Cat"), t("Dog"), Rejected(CastUnrelated)),
            (t("Rock"), t("Animal"), Rejected(CastUnrelated)),
            (t("Rock"), t("Named"), Rejected(CastUnrelated)),
            (t("Cat"), t("Pet"), Rejected(CastUnrelated)),
            (t("Named"), t("Pet"), Rejected(CastUnrelated)),
            (t("Pet"), t("Dog"), Rejected(CastInterfaceToClass)),
            (t("number"), t("Dog"), Rejected(CastPrimitiveToObject)),
            (t("string"), t("Named"), Rejected(CastPrimitiveToObject)),
            (t("Dog"), t("number"), Rejected(CastObjectToPrimitive)),
            (t("number"), t("string"), Rejected(CastIncompatiblePrimitive)),
            (t("boolean"), t("number"), Rejected(CastIncompatiblePrimitive)),
            // arrays are checked element-wise
            (arr("Dog"), arr("Animal"), Legal),
            (arr("Animal"), arr("Dog"), Rejected(CastDowncast)),
            (arr("number"), t("number"), Rejected(CastObjectToPrimitive)),
            (arr("Dog"), t("Dog"), Rejected(CastUnrelated)),
            // handlers
            (func(1), func(2), Legal),
            (func(2), func(1), Rejected(CastUnrelated)),
        ];
        for (source, target, expected) in cases {
            assert_eq!(
                verdict(&mut env, &source, &target),
                expected,
                "{} -> {}",
                source,
                target
            );
        }
    }

    #[test]
    fn narrower_handler_parameters_are_accepted() {
        let mut env = env();
        let narrow = TypeRef::Function {
            params: vec![("d".into(), t("Puppy"))],
            ret: Box::new(t("void")),
        };
        let contract = TypeRef::Function {
            params: vec![("a".into(), t("Animal"))],
            ret: Box::new(t("void")),
        };
        assert!(verdict(&mut env, &narrow, &contract).is_legal());
    }

    #[test]
    fn message_names_both_types_and_rule() {
        let mut env = env();
        let (animal, dog) = (env.resolve(&t("Animal")), env.resolve(&t("Dog")));
        let msg = env.cast_message(CastRequest::new(animal, dog), CastDowncast);
        assert_eq!(msg, "cannot cast `Animal` to `Dog`: downcast to a subclass");
    }
}
