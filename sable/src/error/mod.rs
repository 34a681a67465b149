//! Error types and reporting

use crate::ast::Span;
use crate::interp::RuntimeError;
use thiserror::Error;

/// Result type alias for compilation
pub type Result<T> = std::result::Result<T, CompileError>;

/// Compile-time error. Any of these is fatal to the compilation unit.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompileError {
    #[error("duplicate declaration of `{name}` at {span}")]
    DuplicateDeclaration { name: String, span: Span },

    #[error("undeclared identifier `{name}` at {span}{hint}")]
    UndeclaredIdentifier {
        name: String,
        hint: String,
        span: Span,
    },

    #[error("return is not allowed inside a finally block at {span}")]
    ReturnFromFinally { span: Span },

    #[error("invalid loop grouping at {span}: {message}")]
    InvalidLoopGrouping { message: String, span: Span },

    #[error("invalid contract at {span}: {message}")]
    InvalidContract { message: String, span: Span },

    #[error("invalid assignment target at {span}")]
    InvalidAssignment { span: Span },
}

impl CompileError {
    pub fn duplicate(name: impl Into<String>, span: Span) -> Self {
        Self::DuplicateDeclaration {
            name: name.into(),
            span,
        }
    }

    pub fn undeclared(name: impl Into<String>, hint: String, span: Span) -> Self {
        Self::UndeclaredIdentifier {
            name: name.into(),
            hint,
            span,
        }
    }

    pub fn return_from_finally(span: Span) -> Self {
        Self::ReturnFromFinally { span }
    }

    pub fn loop_grouping(message: impl Into<String>, span: Span) -> Self {
        Self::InvalidLoopGrouping {
            message: message.into(),
            span,
        }
    }

    pub fn invalid_contract(message: impl Into<String>, span: Span) -> Self {
        Self::InvalidContract {
            message: message.into(),
            span,
        }
    }

    pub fn invalid_assignment(span: Span) -> Self {
        Self::InvalidAssignment { span }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::DuplicateDeclaration { span, .. }
            | Self::UndeclaredIdentifier { span, .. }
            | Self::ReturnFromFinally { span }
            | Self::InvalidLoopGrouping { span, .. }
            | Self::InvalidContract { span, .. } => *span,
            Self::InvalidAssignment { span } => *span,
        }
    }

    /// Short label used as the diagnostic title
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateDeclaration { .. } => "DuplicateDeclaration",
            Self::UndeclaredIdentifier { .. } => "UndeclaredIdentifier",
            Self::ReturnFromFinally { .. } => "ReturnFromFinally",
            Self::InvalidLoopGrouping { .. } => "InvalidLoopGrouping",
            Self::InvalidContract { .. } => "InvalidContract",
            Self::InvalidAssignment { .. } => "InvalidAssignment",
        }
    }

    /// Message without the location suffix, for labels
    pub fn message(&self) -> String {
        match self {
            Self::DuplicateDeclaration { name, .. } => {
                format!("`{name}` is already declared in this scope")
            }
            Self::UndeclaredIdentifier { name, hint, .. } => {
                format!("`{name}` is not declared{hint}")
            }
            Self::ReturnFromFinally { .. } => "return inside finally".to_string(),
            Self::InvalidLoopGrouping { message, .. } => message.clone(),
            Self::InvalidContract { message, .. } => message.clone(),
            Self::InvalidAssignment { .. } => "only names, members and indexes can be assigned".to_string(),
        }
    }
}

/// Anything the host can get back from loading, compiling or running a program
#[derive(Debug, Error)]
pub enum SableError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("cannot load program: {0}")]
    Load(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Report a compile error with ariadne
pub fn report_error(filename: &str, source: &str, error: &CompileError) {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let span = error.span();
    let range = if span.is_empty() {
        span.start..span.start
    } else {
        span.start..span.end
    };

    let printed = Report::build(ReportKind::Error, (filename, range.clone()))
        .with_message(format!("{} error", error.kind()))
        .with_label(
            Label::new((filename, range))
                .with_message(error.message())
                .with_color(Color::Red),
        )
        .finish()
        .eprint((filename, Source::from(source)));

    if printed.is_err() {
        eprintln!("Error: {error}");
    }
}
