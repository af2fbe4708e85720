/// Knobs for a single decompilation request.
#[derive(Debug, Clone, Copy)]
pub struct DecompileOptions {
    /// Attach the canonical source text to `unrepresentable` blocks.
    pub fallback_blocks: bool,
    /// Prefer `controls_repeat` for counting loops whose body ignores the counter.
    pub repeat_blocks: bool,
    /// Drop warning-severity diagnostics from the result.
    pub ignore_warnings: bool,
}

impl Default for DecompileOptions {
    fn default() -> Self {
        Self {
            fallback_blocks: false,
            repeat_blocks: true,
            ignore_warnings: false,
        }
    }
}
