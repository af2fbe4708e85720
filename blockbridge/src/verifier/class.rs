use crate::syntax::{ClassDecl, MemberKind, Span};
use crate::types::{Accessors, TypeDescriptor};
use crate::utils::{DiagnosticCode, InternalError};

use super::Verifier;

impl Verifier<'_> {
    /// Declaration-level checks of a class: base, fields, overrides and accessors.
    pub(crate) fn check_class(&mut self, class: &ClassDecl, span: Span) -> Result<(), InternalError> {
        self.check_base(class, span)?;
        for member in &class.members {
            if let MemberKind::Field {
                init: Some(_), ..
            } = &member.kind
            {
                if !member.is_static {
                    self.report(
                        DiagnosticCode::FieldInit,
                        member.span,
                        format!(
                            "field `{}` has an initializer, assign it in the constructor instead",
                            member.name
                        ),
                    );
                }
            }
        }

        let Some(id) = self.env.declared_type(&span) else {
            return Ok(());
        };
        let parent = self.env.parent_of(id)?;
        for member in &class.members {
            match &member.kind {
                MemberKind::Method(method) if !member.is_static => {
                    let Some(parent) = parent else { continue };
                    let Some((owner, sig)) = self.env.find_method(parent, &member.name)? else {
                        continue;
                    };
                    if sig.arity() != method.params.len() {
                        let message = format!(
                            "method `{}` takes {} parameter(s) but overrides `{}.{}` which takes {}",
                            member.name,
                            method.params.len(),
                            owner.name,
                            member.name,
                            sig.arity()
                        );
                        self.report(DiagnosticCode::OverrideArity, member.span, message);
                    }
                }
                MemberKind::Setter(_) => {
                    if self.env.accessors(id, &member.name)? == Accessors::SetterOnly {
                        self.report(
                            DiagnosticCode::AccessorIncomplete,
                            member.span,
                            format!("property `{}` has a setter but no getter", member.name),
                        );
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn check_base(&mut self, class: &ClassDecl, span: Span) -> Result<(), InternalError> {
        if class.extends.len() > 1 {
            self.report(
                DiagnosticCode::ExtendsMultiple,
                span,
                format!("class `{}` can extend at most one class", class.name),
            );
            return Ok(());
        }
        let Some(base) = class.extends.first() else {
            return Ok(());
        };
        if base.is_generic() {
            self.report(
                DiagnosticCode::GenericExtends,
                span,
                format!("class `{}` extends the generic instantiation `{}`", class.name, base),
            );
            return Ok(());
        }
        let resolved = self.env.resolve(base);
        let is_class = matches!(self.env.table.get(resolved)?, TypeDescriptor::Class { .. });
        if !is_class && !self.env.table.is_any(resolved) {
            self.report(
                DiagnosticCode::ExtendsNonClass,
                span,
                format!("class `{}` extends `{}` which is not a class", class.name, base),
            );
        }
        Ok(())
    }
}
