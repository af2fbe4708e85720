use clap::{Args, Parser, Subcommand};
use clap_stdin::{FileOrStdin, StdinError};

use crate::utils::DecompileOptions;

#[derive(Subcommand, Debug, Clone)]
pub enum ClapCommand {
    /// Decompiles the given program into its block tree
    Decompile(ClapDecompile),
    /// Verifies the given program and reports every diagnostic
    Check(ClapCheck),
    /// Decompiles the given program and emits the canonical text of its blocks
    RoundTrip(ClapRoundTrip),
}

#[derive(Debug, Clone)]
pub enum Command {
    Decompile(Decompile),
    Check(Check),
    RoundTrip(RoundTrip),
}

impl TryFrom<ClapCommand> for Command {
    type Error = StdinError;

    fn try_from(value: ClapCommand) -> Result<Self, Self::Error> {
        Ok(match value {
            ClapCommand::Decompile(d) => Self::Decompile(d.try_into()?),
            ClapCommand::Check(c) => Self::Check(c.try_into()?),
            ClapCommand::RoundTrip(r) => Self::RoundTrip(r.try_into()?),
        })
    }
}

impl Command {
    pub fn get_input(&self) -> &str {
        match self {
            Self::Decompile(d) => &d.input,
            Self::Check(c) => &c.input,
            Self::RoundTrip(r) => &r.input,
        }
    }

    pub fn get_output_path(&self) -> Option<&str> {
        match self {
            Self::Check(_) => None,
            Self::Decompile(Decompile { output_path, .. })
            | Self::RoundTrip(RoundTrip { output_path, .. }) => output_path.as_deref(),
        }
    }

    pub fn is_check(&self) -> bool {
        matches!(self, Self::Check(_))
    }
}

#[derive(Debug, Clone, Args)]
pub struct ClapDecompile {
    /// Path of the program to be decompiled
    input: FileOrStdin<String>,
    /// Destination path of the block tree, printed to stdout if omitted
    output_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Decompile {
    pub input: String,
    pub output_path: Option<String>,
}

impl TryFrom<ClapDecompile> for Decompile {
    type Error = StdinError;

    fn try_from(value: ClapDecompile) -> Result<Self, Self::Error> {
        Ok(Self {
            input: value.input.contents()?,
            output_path: value.output_path,
        })
    }
}

#[derive(Debug, Clone, Args)]
pub struct ClapCheck {
    /// Path of the program to be verified
    input: FileOrStdin<String>,
}

#[derive(Debug, Clone)]
pub struct Check {
    pub input: String,
}

impl TryFrom<ClapCheck> for Check {
    type Error = StdinError;

    fn try_from(value: ClapCheck) -> Result<Self, Self::Error> {
        Ok(Self {
            input: value.input.contents()?,
        })
    }
}

#[derive(Debug, Clone, Args)]
pub struct ClapRoundTrip {
    /// Path of the program to be round-tripped
    input: FileOrStdin<String>,
    /// Destination path of the emitted text, printed to stdout if omitted
    output_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RoundTrip {
    pub input: String,
    pub output_path: Option<String>,
}

impl TryFrom<ClapRoundTrip> for RoundTrip {
    type Error = StdinError;

    fn try_from(value: ClapRoundTrip) -> Result<Self, Self::Error> {
        Ok(Self {
            input: value.input.contents()?,
            output_path: value.output_path,
        })
    }
}

#[derive(Debug, Parser, Clone)]
#[command(version, about, rename_all = "kebab-case")]
pub struct ClapCliOptions {
    #[command(subcommand)]
    pub cmd: ClapCommand,

    #[arg(
        global = true,
        long,
        help = "Attach the source text of unrepresentable statements to their marker blocks"
    )]
    pub fallback_blocks: bool,

    #[arg(
        global = true,
        long,
        help = "Decompile counting loops to `controls_for` instead of `controls_repeat`"
    )]
    pub no_repeat: bool,

    #[arg(global = true, long, help = "Ignore warnings")]
    pub ignore_warnings: bool,

    #[arg(global = true, short, long, help = "Suppress progress output")]
    pub quiet: bool,
}

#[derive(Debug, Clone)]
pub struct CliOptions {
    pub cmd: Command,
    pub fallback_blocks: bool,
    pub repeat_blocks: bool,
    pub ignore_warnings: bool,
    pub quiet: bool,
}

impl TryFrom<ClapCliOptions> for CliOptions {
    type Error = StdinError;

    fn try_from(value: ClapCliOptions) -> Result<Self, Self::Error> {
        Ok(Self {
            cmd: value.cmd.try_into()?,
            fallback_blocks: value.fallback_blocks,
            repeat_blocks: !value.no_repeat,
            ignore_warnings: value.ignore_warnings,
            quiet: value.quiet,
        })
    }
}

impl Default for CliOptions {
    fn default() -> Self {
        let options = DecompileOptions::default();
        Self {
            cmd: Command::Check(Check { input: "".into() }),
            fallback_blocks: options.fallback_blocks,
            repeat_blocks: options.repeat_blocks,
            ignore_warnings: options.ignore_warnings,
            quiet: false,
        }
    }
}

impl From<&CliOptions> for DecompileOptions {
    fn from(value: &CliOptions) -> Self {
        Self {
            fallback_blocks: value.fallback_blocks,
            repeat_blocks: value.repeat_blocks,
            ignore_warnings: value.ignore_warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_onto_options() {
        let clap = ClapCliOptions::parse_from([
            "blockbridge",
            "decompile",
            "--no-repeat",
            "--fallback-blocks",
            "-",
            "out.txt",
        ]);
        assert!(clap.no_repeat);
        assert!(clap.fallback_blocks);
        assert!(!clap.ignore_warnings);
        assert!(matches!(
            &clap.cmd,
            ClapCommand::Decompile(ClapDecompile { output_path: Some(path), .. }) if path == "out.txt"
        ));
    }

    #[test]
    fn default_options_match_library_defaults() {
        let options = DecompileOptions::from(&CliOptions::default());
        let defaults = DecompileOptions::default();
        assert_eq!(options.fallback_blocks, defaults.fallback_blocks);
        assert_eq!(options.repeat_blocks, defaults.repeat_blocks);
        assert_eq!(options.ignore_warnings, defaults.ignore_warnings);
    }
}
