//! Error types.
//!
//! The lexer never fails. The parser surfaces the first structural error and
//! discards the partial AST. The analyzer collects errors across all seven
//! passes instead of aborting, so one run can report many problems.

use thiserror::Error;

/// Fatal structural error from the parser. Carries no source-location
/// pretty-printing (out of scope for this core) beyond the raw token index
/// where parsing gave up.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum ParseError {
    #[error("unexpected token at index {token}")]
    UnexpectedToken { token: u32 },
    #[error("expected '{expected}' at index {token}")]
    Expected { expected: &'static str, token: u32 },
    #[error("exceeded MAX_MACROS")]
    TooManyMacros,
    #[error("exceeded MAX_PROPERTIES")]
    TooManyProperties,
    #[error("exceeded MAX_NESTING_DEPTH")]
    NestingTooDeep,
    #[error("exceeded MAX_PARSE_ITERATIONS")]
    TooManyIterations,
}

/// The six collected analysis error kinds.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum AnalysisErrorKind {
    UndefinedReference,
    DuplicateDefinition,
    CircularDependency,
    InvalidReferenceNamespace,
    MissingRequiredProperty,
    TypeMismatch,
}

impl AnalysisErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisErrorKind::UndefinedReference => "undefined_reference",
            AnalysisErrorKind::DuplicateDefinition => "duplicate_definition",
            AnalysisErrorKind::CircularDependency => "circular_dependency",
            AnalysisErrorKind::InvalidReferenceNamespace => "invalid_reference_namespace",
            AnalysisErrorKind::MissingRequiredProperty => "missing_required_property",
            AnalysisErrorKind::TypeMismatch => "type_mismatch",
        }
    }
}

impl std::fmt::Display for AnalysisErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One collected analysis error: a kind, the AST node it anchors to, and a
/// short kind-tagged message (no source offsets — those belong to a
/// surrounding tool).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AnalysisError {
    pub kind: AnalysisErrorKind,
    pub node: u32,
    pub message: String,
}

impl AnalysisError {
    pub fn new(kind: AnalysisErrorKind, node: u32, message: impl Into<String>) -> AnalysisError {
        AnalysisError {
            kind,
            node,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (node {}): {}", self.kind, self.node, self.message)
    }
}

impl std::error::Error for AnalysisError {}

/// Top-level error a caller can get back from a full compile.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("analysis failed with {} error(s)", .0.len())]
    Analysis(Vec<AnalysisError>),
}
