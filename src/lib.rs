//! Compiler core for a declarative, macro-based GPU-resource configuration
//! language: lexer, parser, semantic analyzer, descriptor encoder, and
//! bytecode emitter. The runtime that executes the emitted module, the CLI
//! that drives file I/O, and WGSL shader compilation itself are all out of
//! scope — see each module's docs for the boundary it owns.

pub mod analyzer;
pub mod ast;
pub mod descriptor;
pub mod emitter;
pub mod error;
pub mod format;
pub mod lexer;
pub mod limits;
pub mod namespace;
pub mod parser;
pub mod source;
pub mod token;

pub use ast::Ast;
pub use error::{AnalysisError, AnalysisErrorKind, CompileError, ParseError};
pub use limits::Limits;

use tracing::instrument;

/// Runs the whole pipeline: parse, analyze, emit. Returns the finished
/// bytecode module, or a [`CompileError`] if parsing failed outright or
/// analysis produced any errors.
///
/// This is a convenience wrapper around [`parser::parse`], [`analyzer::analyze`]
/// and [`emitter::emit`] for callers that don't need the intermediate
/// [`Ast`]/[`analyzer::AnalysisResult`] values; a build driver that wants to
/// report analysis errors against source text should call the three stages
/// directly instead.
#[instrument(skip_all)]
pub fn compile(source_text: String, limits: Limits) -> Result<Vec<u8>, CompileError> {
    let ast = parser::parse(source_text, limits)?;
    let result = analyzer::analyze(&ast, &limits);
    if result.has_errors() {
        return Err(CompileError::Analysis(result.errors));
    }
    Ok(emitter::emit(&ast, &result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_rejects_analysis_errors() {
        let err = compile(r#"#buffer b { usage=[] }"#.to_string(), Limits::default()).unwrap_err();
        assert!(matches!(err, CompileError::Analysis(_)));
    }

    #[test]
    fn compile_succeeds_on_a_minimal_frame() {
        let module = compile(r#"#frame main { perform=[] }"#.to_string(), Limits::default()).unwrap();
        assert_eq!(&module[0..4], b"PNGB");
    }
}
