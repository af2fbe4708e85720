use dashmap::DashMap;
use serde_json::json;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};

use tracing::{event, instrument, Level};

use blockbridge::decompiler::{Decompiler, NoopTelemetry};
use blockbridge::syntax::Span;
use blockbridge::utils::{
    DecompileError, DecompileOptions, Diagnostic as BridgeDiagnostic, InternalError, ParseError,
    Severity,
};

#[derive(Debug)]
struct Backend {
    client: Client,
    file_map: DashMap<String, String>,
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, _: InitializeParams) -> Result<InitializeResult> {
        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                ..ServerCapabilities::default()
            },
            ..Default::default()
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "server initialized!")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    #[instrument(skip_all)]
    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        event!(Level::DEBUG, "opened file");
        self.on_change(params.text_document.uri, params.text_document.text)
            .await;
    }

    #[instrument(skip_all)]
    async fn did_change(&self, mut params: DidChangeTextDocumentParams) {
        event!(Level::DEBUG, "changed file");
        let Some(change) = params.content_changes.pop() else {
            return;
        };
        self.on_change(params.text_document.uri, change.text).await;
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let text = match params.text {
            Some(text) => Some(text),
            None => self
                .file_map
                .get(params.text_document.uri.as_str())
                .map(|entry| entry.value().clone()),
        };
        if let Some(text) = text {
            self.on_change(params.text_document.uri, text).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        self.file_map.remove(params.text_document.uri.as_str());
        self.client
            .publish_diagnostics(params.text_document.uri, vec![], None)
            .await;
    }
}

impl Backend {
    async fn on_change(&self, uri: Url, text: String) {
        let diagnostics = check(&text);
        self.file_map.insert(uri.to_string(), text);
        self.client.publish_diagnostics(uri, diagnostics, None).await;
    }
}

/// Runs the bridge over `source` and converts its findings to LSP diagnostics.
fn check(source: &str) -> Vec<Diagnostic> {
    let decompiler = Decompiler::new(DecompileOptions::default(), &NoopTelemetry);
    match decompiler.decompile_str(source) {
        Ok(decompiled) => decompiled.diagnostics.iter().map(to_lsp).collect(),
        Err(DecompileError::Parse(ParseError::Syntax { line, col, message })) => {
            let start = Position::new(line.saturating_sub(1) as u32, col.saturating_sub(1) as u32);
            vec![plain(Range::new(start, start), message)]
        }
        Err(DecompileError::Parse(err)) => vec![plain(Range::default(), err.to_string())],
        Err(DecompileError::Internal(err)) => vec![internal(&err)],
    }
}

/// Internal failures abort the whole document and are reported at its start.
fn internal(err: &InternalError) -> Diagnostic {
    to_lsp(&err.to_diagnostic(Span::default()))
}

fn to_range(span: &Span) -> Range {
    let position = |line: usize, col: usize| {
        Position::new(line.saturating_sub(1) as u32, col.saturating_sub(1) as u32)
    };
    Range::new(
        position(span.start_line, span.start_col),
        position(span.end_line, span.end_col),
    )
}

fn to_lsp(diagnostic: &BridgeDiagnostic) -> Diagnostic {
    let severity = match diagnostic.severity {
        Severity::Warning => DiagnosticSeverity::WARNING,
        Severity::Error | Severity::Internal => DiagnosticSeverity::ERROR,
    };
    Diagnostic {
        range: to_range(&diagnostic.span),
        severity: Some(severity),
        code: Some(NumberOrString::Number(diagnostic.code.number() as i32)),
        source: Some("blockbridge".into()),
        message: diagnostic.message.clone(),
        data: Some(json!({ "name": diagnostic.code.name() })),
        ..Default::default()
    }
}

fn plain(range: Range, message: String) -> Diagnostic {
    Diagnostic {
        range,
        severity: Some(DiagnosticSeverity::ERROR),
        source: Some("blockbridge".into()),
        message,
        ..Default::default()
    }
}

#[tokio::main]
async fn main() {
    eprintln!("Starting blockbridge language server...");

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(|client| Backend {
        client,
        file_map: DashMap::new(),
    });
    Server::new(stdin, stdout, socket).serve(service).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_use_zero_based_ranges() {
        let found = check("let y = 3;\nfor (let x = 0; y <= 5; x++) {}");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].code, Some(NumberOrString::Number(4010)));
        assert_eq!(found[0].range.start.line, 1);
        assert_eq!(found[0].severity, Some(DiagnosticSeverity::ERROR));
        assert_eq!(
            found[0].data,
            Some(json!({ "name": "LoopCondWrongIdentifier" }))
        );
    }

    #[test]
    fn warnings_keep_their_severity() {
        let found = check("function f() {\n    return;\n    basic.pause(1);\n}");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, Some(DiagnosticSeverity::WARNING));
    }

    #[test]
    fn internal_failures_are_distinguishable() {
        let found = internal(&InternalError::ScopeUnderflow);
        assert_eq!(found.severity, Some(DiagnosticSeverity::ERROR));
        assert_eq!(found.code, Some(NumberOrString::Number(9001)));
        assert_eq!(found.data, Some(json!({ "name": "Internal" })));
        assert_eq!(found.range, Range::default());
    }

    #[test]
    fn syntax_errors_are_published() {
        let found = check("let = ;");
        assert_eq!(found.len(), 1);
        assert!(found[0].code.is_none());
    }
}
