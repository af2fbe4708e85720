use std::fmt::{Display, Formatter};

use strum::{Display as StrumDisplay, EnumIter, EnumString, IntoStaticStr};

use crate::syntax::Span;

#[derive(StrumDisplay, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Internal,
}

/// Stable diagnostic codes. Numbers are part of the public surface and never reused.
#[derive(
    EnumString, IntoStaticStr, EnumIter, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[repr(u16)]
pub enum DiagnosticCode {
    CastDowncast = 1001,
    CastUnrelated = 1002,
    CastInterfaceToClass = 1003,
    CastPrimitiveToObject = 1004,
    CastObjectToPrimitive = 1005,
    CastIncompatiblePrimitive = 1006,

    FieldInit = 2001,
    GenericExtends = 2002,
    OverrideArity = 2003,
    AccessorIncomplete = 2004,
    ExtendsNonClass = 2005,
    InheritanceCycle = 2006,
    ExtendsMultiple = 2007,

    ForInUnsupported = 3001,
    ForOfUnsupportedType = 3002,

    LoopInitMissing = 4001,
    LoopInitNotDeclaration = 4002,
    LoopInitMultipleDeclarations = 4003,
    LoopInitNotLet = 4004,
    LoopInitNotNumeric = 4005,
    LoopCondMissing = 4006,
    LoopCondNotComparison = 4007,
    LoopCondOperatorUnsupported = 4008,
    LoopCondLeftNotIdentifier = 4009,
    LoopCondWrongIdentifier = 4010,
    LoopCondBoundNotInvariant = 4011,
    LoopIncrMissing = 4012,
    LoopIncrNotStep = 4013,
    LoopIncrNonLiteralStep = 4014,
    LoopIncrWrongVariable = 4015,
    RepeatInitNotZero = 4016,
    RepeatCondNotLess = 4017,
    RepeatIncrNotIncrement = 4018,
    RepeatBodyUsesVariable = 4019,

    DefaultParamUnsupported = 5001,
    DefaultAfterCallback = 5002,
    LambdaOutsideCallback = 5003,

    ExpressionStatementShape = 6001,
    TypeAssertionUnsupported = 6002,
    UpdateInExpression = 6003,
    ThisOutsideClass = 6004,

    UnreachableCode = 7001,

    Internal = 9001,
}

impl DiagnosticCode {
    pub fn number(self) -> u16 {
        self as u16
    }

    pub fn name(self) -> &'static str {
        self.into()
    }

    pub fn severity(self) -> Severity {
        match self {
            Self::UnreachableCode => Severity::Warning,
            Self::Internal => Severity::Internal,
            _ => Severity::Error,
        }
    }

    pub fn from_number(number: u16) -> Option<Self> {
        use strum::IntoEnumIterator;
        Self::iter().find(|c| c.number() == number)
    }
}

impl Display for DiagnosticCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.number(), self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub span: Span,
    pub message: String,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, span: Span, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: code.severity(),
            span,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity != Severity::Warning
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}[{}]: {} at {}:{}",
            self.severity, self.code, self.message, self.span.start_line, self.span.start_col
        )
    }
}

/// Append-only collection of diagnostics for a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic)
    }

    pub fn report(&mut self, code: DiagnosticCode, span: Span, message: impl Into<String>) {
        self.push(Diagnostic::new(code, span, message))
    }

    pub fn extend(&mut self, other: impl IntoIterator<Item = Diagnostic>) {
        self.0.extend(other)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| d.is_error())
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Errors whose span lies inside `outer` but outside every span in `excluded`.
    pub fn errors_owned_by<'a>(
        &'a self,
        outer: &'a Span,
        excluded: &'a [Span],
    ) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.errors().filter(move |d| {
            outer.contains(&d.span) && !excluded.iter().any(|e| e.contains(&d.span))
        })
    }

    pub fn codes(&self) -> Vec<DiagnosticCode> {
        self.0.iter().map(|d| d.code).collect()
    }

    /// Orders by source position, then by code. Stable for equal keys.
    pub fn sort(&mut self) {
        self.0.sort_by(|a, b| (a.span, a.code).cmp(&(b.span, b.code)));
    }

    pub fn dedup(&mut self) {
        self.0.dedup();
    }

    /// Human-readable report with the offending source line underlined.
    pub fn render(&self, source: &str) -> String {
        let lines = source.lines().collect::<Vec<_>>();
        let mut out = String::new();
        for d in &self.0 {
            out.push_str(&format!("{}[{}]: {}\n", d.severity, d.code, d.message));
            out.push_str(&format!("  --> {}:{}\n", d.span.start_line, d.span.start_col));
            if let Some(line) = lines.get(d.span.start_line.saturating_sub(1)) {
                let gutter = d.span.start_line.to_string();
                let width = if d.span.end_line == d.span.start_line {
                    d.span.end_col.saturating_sub(d.span.start_col).max(1)
                } else {
                    line.len().saturating_sub(d.span.start_col - 1).max(1)
                };
                out.push_str(&format!("{} |\n", " ".repeat(gutter.len())));
                out.push_str(&format!("{} | {}\n", gutter, line));
                out.push_str(&format!(
                    "{} | {}{}\n",
                    " ".repeat(gutter.len()),
                    " ".repeat(d.span.start_col.saturating_sub(1)),
                    "^".repeat(width)
                ));
            }
        }
        out
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<T: IntoIterator<Item = Diagnostic>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    fn span(line: usize, col: usize, start: usize) -> Span {
        Span {
            start,
            end: start + 3,
            start_line: line,
            start_col: col,
            end_line: line,
            end_col: col + 3,
        }
    }

    #[test]
    fn codes_are_unique_and_named() {
        let numbers = DiagnosticCode::iter()
            .map(DiagnosticCode::number)
            .collect::<HashSet<_>>();
        assert_eq!(numbers.len(), DiagnosticCode::iter().count());
        for code in DiagnosticCode::iter() {
            assert_eq!(DiagnosticCode::from_str(code.name()), Ok(code));
            assert_eq!(DiagnosticCode::from_number(code.number()), Some(code));
        }
    }

    #[test]
    fn fixed_numbers() {
        assert_eq!(DiagnosticCode::CastDowncast.number(), 1001);
        assert_eq!(DiagnosticCode::OverrideArity.number(), 2003);
        assert_eq!(DiagnosticCode::LoopCondWrongIdentifier.number(), 4010);
        assert_eq!(DiagnosticCode::Internal.number(), 9001);
        assert_eq!(DiagnosticCode::UnreachableCode.severity(), Severity::Warning);
    }

    #[test]
    fn sorted_by_position_then_code() {
        let mut diags = Diagnostics::new();
        diags.report(DiagnosticCode::FieldInit, span(2, 1, 20), "b");
        diags.report(DiagnosticCode::CastUnrelated, span(1, 5, 4), "a2");
        diags.report(DiagnosticCode::CastDowncast, span(1, 5, 4), "a1");
        diags.sort();
        assert_eq!(
            diags.codes(),
            [
                DiagnosticCode::CastDowncast,
                DiagnosticCode::CastUnrelated,
                DiagnosticCode::FieldInit
            ]
        );
    }

    #[test]
    fn render_underlines_span() {
        let mut diags = Diagnostics::new();
        diags.report(DiagnosticCode::CastUnrelated, span(1, 5, 4), "cannot cast");
        let report = diags.render("let abc = 1;");
        assert!(report.contains("error[1002/CastUnrelated]: cannot cast"));
        assert!(report.contains("  --> 1:5"));
        assert!(report.contains("1 | let abc = 1;"));
        assert!(report.contains("  |     ^^^"));
    }

    #[test]
    fn warnings_are_not_errors() {
        let mut diags = Diagnostics::new();
        diags.report(DiagnosticCode::UnreachableCode, span(1, 1, 0), "unreachable");
        assert!(!diags.has_errors());
        assert_eq!(diags.len(), 1);
    }
}
