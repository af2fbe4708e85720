//! Text to blocks. Verifies a parsed program, then rebuilds the canonical block
//! tree statement by statement. Statements outside the block subset become
//! `unrepresentable` markers; every failure surfaces as a diagnostic.

mod context;
mod expression;
mod statement;
mod telemetry;

use tracing::instrument;

use crate::blocks::{BlockKind, BlockNode};
use crate::syntax::{parse_program, Program};
use crate::types::TypeEnv;
use crate::utils::{DecompileError, DecompileOptions, Diagnostics, InternalError};
use crate::verifier::{Verified, Verifier};

pub use context::DecompileCtx;
pub use telemetry::{NoopTelemetry, Telemetry, TracingTelemetry};

#[derive(Debug, Clone)]
pub struct Decompiled {
    pub root: BlockNode,
    pub diagnostics: Diagnostics,
}

impl Decompiled {
    /// No error-severity diagnostics were raised.
    pub fn is_verified(&self) -> bool {
        !self.diagnostics.has_errors()
    }
}

pub struct Decompiler<'t> {
    options: DecompileOptions,
    telemetry: &'t dyn Telemetry,
}

impl<'t> Decompiler<'t> {
    pub fn new(options: DecompileOptions, telemetry: &'t dyn Telemetry) -> Self {
        Self { options, telemetry }
    }

    #[instrument(skip_all)]
    pub fn decompile(&self, program: &Program) -> Result<Decompiled, InternalError> {
        let (mut env, mut verified) = TypeEnv::build(program)?;
        let Verified { diagnostics, types } = Verifier::new(&mut env).verify(program)?;
        verified.extend(diagnostics);

        let mut ctx = DecompileCtx::new(&env, &types, &verified, self.options, self.telemetry);
        let children = ctx.stmts(&program.items)?;
        let raised = ctx.finish();

        let mut diagnostics = verified.into_iter().chain(raised).collect::<Diagnostics>();
        if self.options.ignore_warnings {
            diagnostics = diagnostics.into_iter().filter(|d| d.is_error()).collect();
        }
        diagnostics.sort();
        diagnostics.dedup();

        let root = BlockNode::new(BlockKind::Program).with_children(children);
        let errors = diagnostics.errors().count();
        self.telemetry.finished(
            root.descendants().len(),
            errors,
            diagnostics.len() - errors,
        );
        Ok(Decompiled { root, diagnostics })
    }

    pub fn decompile_str(&self, source: &str) -> Result<Decompiled, DecompileError> {
        let program = parse_program(source)?;
        Ok(self.decompile(&program)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::Field;
    use crate::utils::{DiagnosticCode, ToSource};

    fn decompile_with(source: &str, options: DecompileOptions) -> Decompiled {
        Decompiler::new(options, &NoopTelemetry)
            .decompile_str(source)
            .unwrap()
    }

    fn decompile(source: &str) -> Decompiled {
        decompile_with(source, DecompileOptions::default())
    }

    fn kinds(block: &BlockNode) -> Vec<BlockKind> {
        block.children.iter().map(|b| b.kind).collect()
    }

    fn round_trip(root: &BlockNode) -> String {
        root.to_source().unwrap().to_string()
    }

    #[test]
    fn failing_statement_is_isolated() {
        let out = decompile("let a = 1;\nlet y = 3;\nfor (let x = 0; y <= 5; x++) {}\nlet b = 2;");
        assert_eq!(
            kinds(&out.root),
            [
                BlockKind::VariablesSet,
                BlockKind::VariablesSet,
                BlockKind::Unrepresentable,
                BlockKind::VariablesSet
            ]
        );
        assert_eq!(out.diagnostics.codes(), [DiagnosticCode::LoopCondWrongIdentifier]);
        let marker = &out.root.children[2];
        assert_eq!(marker.literal_of("CODE0"), Some("4010"));
        assert_eq!(marker.literal_of("MESSAGE0"), Some("wrong identifier in conditional"));
        assert_eq!(marker.literal_of("SOURCE"), None);
    }

    #[test]
    fn verifier_errors_stay_with_their_statement() {
        let out = decompile(
            "class A {}\nclass Unrelated {}\nlet v = new A();\nlet z2: Unrelated = v;\nlet ok = 1;",
        );
        assert_eq!(out.diagnostics.codes(), [DiagnosticCode::CastUnrelated]);
        assert_eq!(
            kinds(&out.root),
            [
                BlockKind::SourceDeclaration,
                BlockKind::SourceDeclaration,
                BlockKind::VariablesSet,
                BlockKind::Unrepresentable,
                BlockKind::VariablesSet
            ]
        );
    }

    #[test]
    fn nested_failure_keeps_the_loop() {
        let out = decompile("while (true) {\n    let f = () => {};\n    break;\n}");
        assert_eq!(kinds(&out.root), [BlockKind::ControlsWhile]);
        assert_eq!(
            kinds(&out.root.children[0]),
            [BlockKind::Unrepresentable, BlockKind::BreakKeyword]
        );
        assert_eq!(out.diagnostics.codes(), [DiagnosticCode::LambdaOutsideCallback]);
    }

    #[test]
    fn fallback_blocks_carry_source() {
        let options = DecompileOptions {
            fallback_blocks: true,
            ..Default::default()
        };
        let out = decompile_with("let n = 1;\nfor (let k in [1]) {}\n", options);
        let marker = &out.root.children[1];
        assert_eq!(marker.kind, BlockKind::Unrepresentable);
        assert_eq!(marker.literal_of("CODE0"), Some("3001"));
        assert_eq!(marker.literal_of("SOURCE"), Some("for (let k in [1]) {}"));
        assert_eq!(out.diagnostics.codes(), [DiagnosticCode::ForInUnsupported]);
        assert_eq!(round_trip(&out.root), "let n = 1;\nfor (let k in [1]) {}\n");
    }

    #[test]
    fn unreachable_code_warns_once() {
        let source = "function f() {\n    return 1;\n    basic.pause(1);\n    basic.pause(2);\n}";
        let out = decompile(source);
        assert_eq!(out.diagnostics.codes(), [DiagnosticCode::UnreachableCode]);
        assert!(out.is_verified());
        assert_eq!(out.root.children[0].children.len(), 3);

        let options = DecompileOptions {
            ignore_warnings: true,
            ..Default::default()
        };
        assert!(decompile_with(source, options).diagnostics.is_empty());
    }

    #[test]
    fn callbacks_get_a_statement_slot() {
        let out = decompile("input.onEvent(1, (e: number) => {\n    basic.showNumber(e);\n});");
        let call = &out.root.children[0];
        assert_eq!(call.kind, BlockKind::CallStatement);
        assert_eq!(call.literal_of("HANDLER"), Some("arrow"));
        assert_eq!(call.literal_of("HANDLER_PARAM0"), Some("e"));
        assert_eq!(call.literal_of("HANDLER_TYPE0"), Some("number"));
        assert_eq!(call.literal_of("METHOD"), Some("onEvent"));
        assert_eq!(call.indexed("ARG").len(), 1);
        assert_eq!(kinds(call), [BlockKind::CallStatement]);
    }

    #[test]
    fn default_after_callback_is_specific() {
        let out = decompile(
            "declare function on(handler: () => void, times: number = 1): void;\non(() => {});",
        );
        assert_eq!(out.diagnostics.codes(), [DiagnosticCode::DefaultAfterCallback]);
    }

    #[test]
    fn callback_defaults_are_rejected() {
        let out = decompile(
            "declare function on(handler: (n: number) => void): void;\non((n = 2) => {});",
        );
        assert_eq!(out.diagnostics.codes(), [DiagnosticCode::DefaultParamUnsupported]);
    }

    #[test]
    fn expression_shapes() {
        let cases = [
            ("let a = 1;\na;", DiagnosticCode::ExpressionStatementShape),
            ("let a: any = 1;\nlet b = a as number;", DiagnosticCode::TypeAssertionUnsupported),
            ("let a = 1;\nlet b = a++;", DiagnosticCode::UpdateInExpression),
            ("this.x = 1;", DiagnosticCode::ThisOutsideClass),
        ];
        for (source, code) in cases {
            assert_eq!(decompile(source).diagnostics.codes(), [code], "{}", source);
        }
    }

    #[test]
    fn value_blocks() {
        let out = decompile(
            "enum Color { Red, Green }\nlet c = Color.Green;\nlet s = \"n: \" + 1;\nlet m = 2 + 3;\nlet l = [1, 2][0];",
        );
        let value = |i: usize| out.root.children[i].child_of("VALUE").unwrap();
        assert_eq!(value(1).kind, BlockKind::EnumMember);
        assert_eq!(value(1).literal_of("MEMBER"), Some("Green"));
        assert_eq!(value(2).kind, BlockKind::TextJoin);
        assert_eq!(value(3).kind, BlockKind::MathArithmetic);
        assert_eq!(value(3).literal_of("OP"), Some("+"));
        assert_eq!(value(4).kind, BlockKind::ListsIndexGet);
        assert!(matches!(
            value(4).field("LIST"),
            Some(Field::Child(BlockNode {
                kind: BlockKind::ListsCreateWith,
                ..
            }))
        ));
    }

    #[test]
    fn escaped_text_keeps_its_meaning() {
        let out = decompile("let s = \"\\u0041\\x62\\tc\";");
        let text = out.root.children[0].child_of("VALUE").unwrap();
        assert_eq!(text.literal_of("TEXT"), Some("Ab\tc"));
        assert_eq!(round_trip(&out.root), "let s = \"Ab\\tc\";\n");
    }

    #[test]
    fn if_chains_are_flat() {
        let out = decompile(
            "let a = 1;\nif (a < 1) {\n    a = 2;\n} else if (a < 2) a = 3; else {\n    if (a < 3) {} else {}\n}",
        );
        let chain = &out.root.children[1];
        assert_eq!(
            kinds(chain),
            [
                BlockKind::ControlsIfBranch,
                BlockKind::ControlsIfBranch,
                BlockKind::ControlsIfBranch,
                BlockKind::ControlsElse
            ]
        );
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn multiple_declarators_split() {
        let out = decompile("let a = 1, b: string = \"x\";");
        assert_eq!(kinds(&out.root), [BlockKind::VariablesSet, BlockKind::VariablesSet]);
        assert_eq!(out.root.children[1].literal_of("TYPE"), Some("string"));
    }

    #[test]
    fn round_trip_is_idempotent() {
        let source = r#"
namespace game {
    export function score(points: number, bonus?: number): number {
        return points * 2;
    }
}
enum Mode { Easy, Hard }
class Player {
    name: string;
    constructor(name: string) {
        this.name = name;
    }
}
let total = 0;
let names: string[] = ["a", "b"];
let mode = Mode.Hard;
for (let i = 0; i < 4; i++) {
    basic.pause(100);
}
for (let j = 10; j > 0; j -= 2) {
    total += j;
}
for (const n of names) {
    total++;
}
while (total < 100 && !false) {
    total = total + -1;
    if (total == 50) {
        break;
    } else if (total > 90) {
        continue;
    }
}
input.onEvent(1, function (e: number) {
    names[0] = "c" + e;
});
let p = new Player("x");
p.name = "y";
"#;
        let first = decompile(source);
        assert!(first.is_verified(), "{:?}", first.diagnostics);
        let text = round_trip(&first.root);
        let second = decompile(&text);
        assert_eq!(first.root, second.root);
        assert_eq!(round_trip(&second.root), text);
        assert_eq!(first.root.count(BlockKind::ControlsRepeat), 1);
        assert_eq!(first.root.count(BlockKind::ControlsFor), 1);
    }

    #[test]
    fn decompilation_is_deterministic() {
        let source = "let y = 1;\nfor (let x = 0; y <= 5; x++) {}\nlet q = () => {};";
        let a = decompile(source);
        let b = decompile(source);
        assert_eq!(a.root, b.root);
        assert_eq!(a.diagnostics, b.diagnostics);
    }
}
