use tracing::{debug, info, warn};

use crate::blocks::BlockKind;
use crate::utils::Diagnostic;

/// Observer for decompilation progress. Injected so that the library never
/// reaches for global state on its own.
pub trait Telemetry {
    fn block_emitted(&self, kind: BlockKind);
    fn statement_rejected(&self, diagnostics: &[Diagnostic]);
    fn finished(&self, blocks: usize, errors: usize, warnings: usize);
}

/// Forwards every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn block_emitted(&self, kind: BlockKind) {
        debug!(block = %kind, "block emitted");
    }

    fn statement_rejected(&self, diagnostics: &[Diagnostic]) {
        for d in diagnostics {
            warn!(
                code = d.code.number(),
                line = d.span.start_line,
                col = d.span.start_col,
                "{}",
                d.message
            );
        }
    }

    fn finished(&self, blocks: usize, errors: usize, warnings: usize) {
        info!(blocks, errors, warnings, "decompilation finished");
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn block_emitted(&self, _: BlockKind) {}
    fn statement_rejected(&self, _: &[Diagnostic]) {}
    fn finished(&self, _: usize, _: usize, _: usize) {}
}
