use std::str::FromStr;

use anyhow::{anyhow, ensure, Result};

use crate::app::App;
use crate::cli;
use crate::decompiler::{Decompiler, NoopTelemetry};
use crate::utils::{DecompileOptions, DiagnosticCode, ToSource};

/// Codes listed in the `//! expect:` header of a failing example.
fn expected_codes(source: &str) -> Result<Vec<DiagnosticCode>> {
    let header = source
        .lines()
        .find_map(|line| line.trim().strip_prefix("//! expect:"))
        .ok_or_else(|| anyhow!("missing `//! expect:` header"))?;
    header
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| DiagnosticCode::from_str(name).map_err(|_| anyhow!("unknown code `{}`", name)))
        .collect()
}

fn check_pass(path: &str) -> Result<()> {
    let source = std::fs::read_to_string(path)?;
    let decompiler = Decompiler::new(DecompileOptions::default(), &NoopTelemetry);
    let first = decompiler.decompile_str(&source)?;
    ensure!(
        first.is_verified(),
        "unexpected diagnostics:\n{}",
        first.diagnostics.render(&source)
    );

    let text = first.root.to_source()?.to_string();
    let second = decompiler.decompile_str(&text)?;
    ensure!(first.root == second.root, "round trip changed the blocks of:\n{}", text);
    Ok(())
}

fn check_fail(path: &str) -> Result<()> {
    let source = std::fs::read_to_string(path)?;
    let expected = expected_codes(&source)?;
    let decompiled = Decompiler::new(DecompileOptions::default(), &NoopTelemetry)
        .decompile_str(&source)?;
    let found = decompiled.diagnostics.codes();
    ensure!(
        found == expected,
        "expected {:?}, found {:?}:\n{}",
        expected,
        found,
        decompiled.diagnostics.render(&source)
    );
    Ok(())
}

#[test]
fn check_command_fails_on_errors() {
    let app = App::new_check("let a = 1;\nlet b = a as string;".into(), false);
    assert!(app.run().is_err());
    let app = App::new_check("let a = 1;\nlet b = a;".into(), false);
    assert!(app.run().is_ok());
}

#[test]
fn round_trip_command_writes_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.ts");
    let options = cli::CliOptions {
        cmd: cli::Command::RoundTrip(cli::RoundTrip {
            input: "let   x=1;for(let i=0;i<3;i++){x+=i}".into(),
            output_path: Some(path.display().to_string()),
        }),
        ..Default::default()
    };
    App::new(options, false).run().unwrap();
    assert_eq!(
        std::fs::read_to_string(path).unwrap(),
        "let x = 1;\nfor (let i = 0; i < 3; i++) {\n    x += i;\n}\n"
    );
}

#[test]
fn decompile_command_writes_tree() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.blocks");
    let options = cli::CliOptions {
        cmd: cli::Command::Decompile(cli::Decompile {
            input: "while (true) { break; }".into(),
            output_path: Some(path.display().to_string()),
        }),
        ..Default::default()
    };
    App::new(options, false).run().unwrap();
    assert_eq!(
        std::fs::read_to_string(path).unwrap(),
        "program\n  controls_while(COND: logic_boolean(BOOL: \"true\"))\n    break_keyword\n"
    );
}

#[test]
fn expect_header_is_parsed() {
    let codes = expected_codes("//! expect: FieldInit, CastUnrelated\nlet a = 1;").unwrap();
    assert_eq!(codes, [DiagnosticCode::FieldInit, DiagnosticCode::CastUnrelated]);
    assert!(expected_codes("let a = 1;").is_err());
}

include!(concat!(env!("OUT_DIR"), "/generated_tests.rs"));
