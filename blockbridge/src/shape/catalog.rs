use lazy_static::lazy_static;

use crate::blocks::BlockKind;
use crate::utils::{DecompileOptions, DiagnosticCode};

use super::predicates::*;
use super::{Check, NodeKind, Predicate, ShapePattern};

fn predicate(
    name: &'static str,
    code: DiagnosticCode,
    message: &'static str,
    check: Check,
) -> Predicate {
    Predicate {
        name,
        code,
        message,
        check,
    }
}

fn init_predicates(repeat: bool) -> Vec<Predicate> {
    use DiagnosticCode::*;
    let mut predicates = vec![
        predicate("init_present", LoopInitMissing, "loop has no initializer", init_present),
        predicate(
            "init_declaration",
            LoopInitNotDeclaration,
            "loop initializer must declare the loop variable",
            init_declaration,
        ),
        predicate(
            "init_single",
            LoopInitMultipleDeclarations,
            "loop initializer must declare exactly one variable",
            init_single,
        ),
        predicate("init_let", LoopInitNotLet, "loop variable must be declared with `let`", init_let),
        predicate(
            "init_numeric",
            LoopInitNotNumeric,
            "loop variable must start from a number",
            init_numeric,
        ),
    ];
    if repeat {
        predicates.push(predicate(
            "repeat_init_zero",
            RepeatInitNotZero,
            "counting loop must start from 0",
            repeat_init_zero,
        ));
    }
    predicates
}

fn cond_predicates(repeat: bool) -> Vec<Predicate> {
    use DiagnosticCode::*;
    let mut predicates = vec![
        predicate("cond_present", LoopCondMissing, "loop has no condition", cond_present),
        predicate(
            "cond_comparison",
            LoopCondNotComparison,
            "loop condition must be a comparison",
            cond_comparison,
        ),
        predicate(
            "cond_operator",
            LoopCondOperatorUnsupported,
            "loop condition must compare with <, <=, > or >=",
            cond_operator,
        ),
    ];
    if repeat {
        predicates.push(predicate(
            "repeat_cond_less",
            RepeatCondNotLess,
            "counting loop must compare with <",
            repeat_cond_less,
        ));
    }
    predicates.extend([
        predicate(
            "cond_left_identifier",
            LoopCondLeftNotIdentifier,
            "left side of the loop condition must be a variable",
            cond_left_identifier,
        ),
        predicate(
            "cond_loop_variable",
            LoopCondWrongIdentifier,
            "wrong identifier in conditional",
            cond_loop_variable,
        ),
        predicate(
            "cond_bound_invariant",
            LoopCondBoundNotInvariant,
            "loop bound must not depend on the loop variable",
            cond_bound_invariant,
        ),
    ]);
    predicates
}

fn incr_predicates(repeat: bool) -> Vec<Predicate> {
    use DiagnosticCode::*;
    let mut predicates = vec![
        predicate("incr_present", LoopIncrMissing, "loop has no increment", incr_present),
        predicate(
            "incr_step",
            LoopIncrNotStep,
            "loop increment must be ++, --, += or -=",
            incr_step,
        ),
        predicate(
            "incr_literal_step",
            LoopIncrNonLiteralStep,
            "loop step must be a number literal",
            incr_literal_step,
        ),
    ];
    if repeat {
        predicates.push(predicate(
            "repeat_incr_increment",
            RepeatIncrNotIncrement,
            "counting loop must count up by one",
            repeat_incr_increment,
        ));
    }
    predicates.push(predicate(
        "incr_loop_variable",
        LoopIncrWrongVariable,
        "loop increment must update the loop variable",
        incr_loop_variable,
    ));
    predicates
}

fn loop_pattern(repeat: bool) -> ShapePattern {
    let mut predicates = init_predicates(repeat);
    predicates.extend(cond_predicates(repeat));
    predicates.extend(incr_predicates(repeat));
    if repeat {
        predicates.push(predicate(
            "repeat_body_ignores_variable",
            DiagnosticCode::RepeatBodyUsesVariable,
            "counting loop body must not use the counter",
            repeat_body_ignores_variable,
        ));
    }
    ShapePattern {
        block: if repeat {
            BlockKind::ControlsRepeat
        } else {
            BlockKind::ControlsFor
        },
        node: NodeKind::ForLoop,
        predicates,
    }
}

lazy_static! {
    /// Every registered shape, in registration order.
    pub static ref CATALOG: Vec<ShapePattern> = vec![
        loop_pattern(true),
        loop_pattern(false),
        ShapePattern {
            block: BlockKind::CallStatement,
            node: NodeKind::CallbackCall,
            predicates: vec![
                predicate(
                    "no_default_after_callback",
                    DiagnosticCode::DefaultAfterCallback,
                    "called function has a default-valued parameter after its callback",
                    no_default_after_callback,
                ),
                predicate(
                    "callee_without_defaults",
                    DiagnosticCode::DefaultParamUnsupported,
                    "called function has default-valued parameters",
                    callee_without_defaults,
                ),
                predicate(
                    "callback_without_defaults",
                    DiagnosticCode::DefaultParamUnsupported,
                    "callback parameters can't have default values",
                    callback_without_defaults,
                ),
            ],
        },
        ShapePattern {
            block: BlockKind::FunctionDefinition,
            node: NodeKind::FunctionDefinition,
            predicates: vec![predicate(
                "function_without_defaults",
                DiagnosticCode::DefaultParamUnsupported,
                "function parameters can't have default values",
                function_without_defaults,
            )],
        },
    ];
}

/// Patterns registered for `node`, honouring the request options.
pub fn patterns_for(node: NodeKind, options: &DecompileOptions) -> Vec<&'static ShapePattern> {
    CATALOG
        .iter()
        .filter(|p| p.node == node)
        .filter(|p| options.repeat_blocks || p.block != BlockKind::ControlsRepeat)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_is_registered_before_for() {
        let loops = patterns_for(NodeKind::ForLoop, &DecompileOptions::default());
        assert_eq!(
            loops.iter().map(|p| p.block).collect::<Vec<_>>(),
            [BlockKind::ControlsRepeat, BlockKind::ControlsFor]
        );
        let options = DecompileOptions {
            repeat_blocks: false,
            ..Default::default()
        };
        assert_eq!(patterns_for(NodeKind::ForLoop, &options).len(), 1);
    }

    #[test]
    fn for_contract_order() {
        let codes = CATALOG[1]
            .predicates
            .iter()
            .map(|p| p.code.number())
            .collect::<Vec<_>>();
        assert_eq!(codes, (4001..=4015).collect::<Vec<_>>());
    }

    #[test]
    fn repeat_extends_for() {
        let repeat = CATALOG[0].predicates.iter().map(|p| p.name).collect::<Vec<_>>();
        for p in &CATALOG[1].predicates {
            assert!(repeat.contains(&p.name), "{}", p.name);
        }
    }
}
