use std::cmp::Reverse;

use tracing::{debug, trace};

use crate::utils::Diagnostic;

use super::{MatchCtx, Node, Outcome, ShapePattern};

/// Outcome of every predicate of one pattern against one node.
#[derive(Debug)]
pub struct Evaluation<'p> {
    pub pattern: &'p ShapePattern,
    pub outcomes: Vec<Outcome>,
}

impl<'p> Evaluation<'p> {
    pub fn evaluate(pattern: &'p ShapePattern, node: &Node<'_>, ctx: &MatchCtx<'_>) -> Self {
        let outcomes = pattern
            .predicates
            .iter()
            .map(|p| (p.check)(node, ctx))
            .collect();
        Self { pattern, outcomes }
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, Outcome::Failed(_)))
            .count()
    }

    pub fn satisfied(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, Outcome::Satisfied))
            .count()
    }

    pub fn matched(&self) -> bool {
        self.failed() == 0
    }

    /// First failed predicate in declaration order, as a diagnostic.
    pub fn first_failure(&self) -> Option<Diagnostic> {
        self.pattern
            .predicates
            .iter()
            .zip(&self.outcomes)
            .find_map(|(predicate, outcome)| match outcome {
                Outcome::Failed(span) => {
                    Some(Diagnostic::new(predicate.code, *span, predicate.message))
                }
                _ => None,
            })
    }
}

#[derive(Debug)]
pub enum Verdict<'p> {
    Matched(&'p ShapePattern),
    /// No pattern matched; the diagnostic explains the closest one.
    Rejected(Diagnostic),
    NoPattern,
}

/// Tries `patterns` in registration order. The first pattern whose predicates all
/// hold wins; otherwise the closest pattern (fewest failures, then most satisfied
/// predicates, then earliest registration) explains the rejection.
pub fn match_node<'p>(
    patterns: &[&'p ShapePattern],
    node: &Node<'_>,
    ctx: &MatchCtx<'_>,
) -> Verdict<'p> {
    let evaluations = patterns
        .iter()
        .map(|pattern| Evaluation::evaluate(pattern, node, ctx))
        .collect::<Vec<_>>();

    if let Some(eval) = evaluations.iter().find(|e| e.matched()) {
        debug!(node = %node.kind(), block = %eval.pattern.block, "shape matched");
        return Verdict::Matched(eval.pattern);
    }

    let closest = evaluations
        .iter()
        .enumerate()
        .min_by_key(|(idx, e)| (e.failed(), Reverse(e.satisfied()), *idx))
        .map(|(_, e)| e);
    match closest.and_then(Evaluation::first_failure) {
        Some(diagnostic) => {
            trace!(node = %node.kind(), code = %diagnostic.code, "shape rejected");
            Verdict::Rejected(diagnostic)
        }
        None => Verdict::NoPattern,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{patterns_for, NodeKind};
    use crate::syntax::{parse_program, StmtKind};
    use crate::types::TypeEnv;
    use crate::utils::{DecompileOptions, DiagnosticCode};
    use crate::verifier::Verifier;

    fn loop_verdict(source: &str, options: DecompileOptions) -> Option<Result<String, DiagnosticCode>> {
        let program = parse_program(source).unwrap();
        let (mut env, _) = TypeEnv::build(&program).unwrap();
        let verified = Verifier::new(&mut env).verify(&program).unwrap();
        let stmt = program
            .items
            .iter()
            .find(|s| matches!(s.kind, StmtKind::For(_)))?;
        let StmtKind::For(f) = &stmt.kind else {
            return None;
        };
        let node = Node::ForLoop {
            stmt: f,
            span: stmt.span,
        };
        let ctx = MatchCtx {
            env: &env,
            types: &verified.types,
        };
        match match_node(&patterns_for(NodeKind::ForLoop, &options), &node, &ctx) {
            Verdict::Matched(p) => Some(Ok(p.block.to_string())),
            Verdict::Rejected(d) => Some(Err(d.code)),
            Verdict::NoPattern => None,
        }
    }

    fn verdict(source: &str) -> Option<Result<String, DiagnosticCode>> {
        loop_verdict(source, DecompileOptions::default())
    }

    #[test]
    fn counting_loop_prefers_repeat() {
        assert_eq!(
            verdict("for (let i = 0; i < 4; i++) { basic.pause(1); }"),
            Some(Ok("controls_repeat".into()))
        );
        let options = DecompileOptions {
            repeat_blocks: false,
            ..Default::default()
        };
        assert_eq!(
            loop_verdict("for (let i = 0; i < 4; i++) { basic.pause(1); }", options),
            Some(Ok("controls_for".into()))
        );
    }

    #[test]
    fn counter_use_falls_back_to_for() {
        assert_eq!(
            verdict("for (let i = 0; i <= 10; i += 2) { basic.showNumber(i); }"),
            Some(Ok("controls_for".into()))
        );
    }

    #[test]
    fn wrong_identifier_is_the_only_failure() {
        assert_eq!(
            verdict("let y = 3; for (let x = 0; y <= 5; x++) {}"),
            Some(Err(DiagnosticCode::LoopCondWrongIdentifier))
        );
    }

    #[test]
    fn first_failure_follows_declaration_order() {
        // both the step and the update target are wrong
        assert_eq!(
            verdict("let j = 0; for (let i = 0; i < 5; j += i) {}"),
            Some(Err(DiagnosticCode::LoopIncrNonLiteralStep))
        );
    }

    #[test]
    fn each_clause_corruption_reports_its_own_code() {
        use DiagnosticCode::*;
        let cases = [
            ("for (; i < 5; i++) {}", LoopInitMissing),
            ("for (j = 0; j < 5; j++) {}", LoopInitNotDeclaration),
            ("for (let i = 0, k = 1; i < 5; i++) {}", LoopInitMultipleDeclarations),
            ("for (var i = 0; i < 5; i++) {}", LoopInitNotLet),
            ("for (let i = \"a\"; i < 5; i++) {}", LoopInitNotNumeric),
            ("for (let i = 0; ; i++) {}", LoopCondMissing),
            ("for (let i = 0; i + 5; i++) {}", LoopCondNotComparison),
            ("for (let i = 0; i && true; i++) {}", LoopCondNotComparison),
            ("for (let i = 0; i; i++) {}", LoopCondNotComparison),
            ("for (let i = 0; i != 5; i++) {}", LoopCondOperatorUnsupported),
            ("for (let i = 0; i + 1 < 5; i++) {}", LoopCondLeftNotIdentifier),
            ("for (let i = 0; j < 5; i++) {}", LoopCondWrongIdentifier),
            ("for (let i = 0; i < i + 5; i++) {}", LoopCondBoundNotInvariant),
            ("for (let i = 0; i < 5;) {}", LoopIncrMissing),
            ("for (let i = 0; i < 5; i = i + 1) {}", LoopIncrNotStep),
            ("for (let i = 0; i < 5; i += j) {}", LoopIncrNonLiteralStep),
            ("for (let i = 0; i < 5; j++) {}", LoopIncrWrongVariable),
        ];
        for (corrupted, code) in cases {
            let source = format!("let j = 0;\n{}", corrupted);
            assert_eq!(verdict(&source), Some(Err(code)), "{}", corrupted);
        }
    }

    #[test]
    fn clauses_are_judged_independently() {
        // a missing initializer does not hide the bad condition
        let program = parse_program("let i = 0; for (; i != 3; i++) {}").unwrap();
        let (mut env, _) = TypeEnv::build(&program).unwrap();
        let verified = Verifier::new(&mut env).verify(&program).unwrap();
        let StmtKind::For(f) = &program.items[1].kind else {
            panic!("expected a for loop");
        };
        let node = Node::ForLoop {
            stmt: f,
            span: program.items[1].span,
        };
        let ctx = MatchCtx {
            env: &env,
            types: &verified.types,
        };
        let patterns = patterns_for(NodeKind::ForLoop, &DecompileOptions::default());
        let eval = Evaluation::evaluate(patterns[1], &node, &ctx);
        let failed = patterns[1]
            .predicates
            .iter()
            .zip(&eval.outcomes)
            .filter(|(_, o)| matches!(o, Outcome::Failed(_)))
            .map(|(p, _)| p.code)
            .collect::<Vec<_>>();
        assert_eq!(
            failed,
            [
                DiagnosticCode::LoopInitMissing,
                DiagnosticCode::LoopCondOperatorUnsupported
            ]
        );
    }
}
