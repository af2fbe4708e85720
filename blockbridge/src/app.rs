use std::{fs::File, io::Write};

use anyhow::{anyhow, Result};
use tracing::instrument;

use crate::cli::{self, CliOptions};
use crate::decompiler::{Decompiled, Decompiler, TracingTelemetry};
use crate::syntax::parse_program;
use crate::utils::ToSource;

macro_rules! run_step {
    ($self:ident, $name:literal, $stmts:block) => {{
        $self.print(&format!("{}...", $name));
        let ret = $stmts;
        $self.println("DONE");
        ret
    }};
}

pub struct App {
    pub options: CliOptions,
    pub print: bool,
}

impl Default for App {
    fn default() -> Self {
        Self {
            options: CliOptions::default(),
            print: true,
        }
    }
}

impl App {
    pub fn new_check(input: String, print: bool) -> Self {
        let options = CliOptions {
            cmd: cli::Command::Check(cli::Check { input }),
            ..Default::default()
        };
        Self { options, print }
    }

    pub fn new(options: CliOptions, print: bool) -> Self {
        Self { options, print }
    }

    fn print(&self, s: &str) {
        if self.print {
            eprint!("{}", s)
        }
    }

    fn println(&self, s: &str) {
        if self.print {
            eprintln!("{}", s)
        }
    }

    fn write_output(&self, contents: &str) -> Result<()> {
        match self.options.cmd.get_output_path() {
            Some(path) => {
                let mut file = File::create(path)
                    .map_err(|e| anyhow!(format!("Error: Could not open output file:\n{}", e)))?;
                file.write_all(contents.as_bytes())
                    .map_err(|e| anyhow!(format!("Error: Could not write to output file:\n{}", e)))
            }
            None => {
                print!("{}", contents);
                Ok(())
            }
        }
    }

    #[instrument(skip_all)]
    pub fn decompile(&self) -> Result<Decompiled> {
        let input = self.options.cmd.get_input();
        let program = run_step!(self, "Parsing", { parse_program(input) })?;
        let telemetry = TracingTelemetry;
        let decompiler = Decompiler::new((&self.options).into(), &telemetry);
        let decompiled = run_step!(self, "Decompiling", { decompiler.decompile(&program) })?;
        if !decompiled.diagnostics.is_empty() {
            self.print(&decompiled.diagnostics.render(input));
        }
        Ok(decompiled)
    }

    pub fn run(&self) -> Result<()> {
        let decompiled = self.decompile()?;
        match &self.options.cmd {
            cli::Command::Check(_) => {}
            cli::Command::Decompile(_) => self.write_output(&decompiled.root.to_string())?,
            cli::Command::RoundTrip(_) => {
                let text = run_step!(self, "Emitting", { decompiled.root.to_source() })?;
                self.write_output(&text.to_string())?;
            }
        }
        let errors = decompiled.diagnostics.errors().count();
        if self.options.cmd.is_check() && errors > 0 {
            return Err(anyhow!("Verification failed with {} error(s)", errors));
        }
        Ok(())
    }
}
