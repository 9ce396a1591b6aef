//! hmr-spec error handling - one error type for every stage.
//!
//! Parsing, compilation, command interpretation and the collaborators all
//! report through [`SpecError`]. The kind says what went wrong, the source
//! info says where (when a spec text is involved), and the diagnostic info
//! carries the code and an optional help message for `miette`.

use difference::{Changeset, Difference};
use miette::{Diagnostic, LabeledSpan, NamedSource, SourceSpan};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// SOURCE CONTEXT - Error reporting infrastructure
// ============================================================================

/// Source text an error can point into.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub name: String,
    pub content: String,
}

impl SourceContext {
    /// Create a source context from real spec content.
    pub fn from_file(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Convert to NamedSource for use with miette error reporting
    pub fn to_named_source(&self) -> Arc<NamedSource<String>> {
        Arc::new(NamedSource::new(self.name.clone(), self.content.clone()))
    }
}

/// The single error type.
#[derive(Debug, Clone)]
pub struct SpecError {
    /// What went wrong
    pub kind: ErrorKind,
    /// Where it happened
    pub source_info: SourceInfo,
    /// How to help
    pub diagnostic_info: DiagnosticInfo,
}

/// All error kinds, grouped by [`ErrorCategory`].
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    // Parse errors - spec notation
    MalformedDelimiter {
        line: String,
    },
    SubOutsideCondition {
        slot: usize,
    },
    SubInFileContent {
        path: String,
        slot: usize,
    },
    UnknownSub {
        slot: usize,
        available: usize,
    },
    DuplicateStepBlock {
        label: String,
    },
    TooManyHooks {
        label: String,
    },
    MissingTitle,
    UnexpectedToken {
        expected: String,
        found: String,
    },

    // Protocol errors - command sequencing
    InitAfterStart,
    ExpectAfterStart {
        label: String,
    },
    InvalidCommand {
        command: String,
        reason: String,
    },
    DuplicateHook {
        label: String,
        hook: String,
    },
    Aborted {
        reason: String,
    },
    UnexpectedReply {
        expected: String,
        actual: String,
    },

    // Collaborator failures
    Build {
        message: String,
    },
    Forwarding {
        path: String,
        reason: String,
    },
    Io {
        message: String,
    },

    // Expectation failures
    Assertion {
        label: String,
        step: usize,
        expected: String,
        actual: String,
    },
}

/// Where an error happened.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub source: Option<Arc<NamedSource<String>>>,
    pub primary_span: SourceSpan,
    pub phase: String,
}

/// Diagnostic enhancement data
#[derive(Debug, Clone)]
pub struct DiagnosticInfo {
    pub help: Option<String>,
    pub error_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Parse,
    Protocol,
    Build,
    Assertion,
    Forwarding,
    Io,
}

/// Context-aware error creation - each context knows how to create appropriate errors
pub trait ErrorReporting {
    /// Create an error with context-appropriate enhancements
    fn report(&self, kind: ErrorKind, span: SourceSpan) -> SpecError;

    fn malformed_delimiter(&self, line: &str, span: SourceSpan) -> SpecError {
        self.report(
            ErrorKind::MalformedDelimiter {
                line: line.trim().into(),
            },
            span,
        )
    }

    fn unexpected_token(&self, expected: &str, found: &str, span: SourceSpan) -> SpecError {
        self.report(
            ErrorKind::UnexpectedToken {
                expected: expected.into(),
                found: found.into(),
            },
            span,
        )
    }

    fn sub_outside_condition(&self, slot: usize, span: SourceSpan) -> SpecError {
        self.report(ErrorKind::SubOutsideCondition { slot }, span)
    }
}

impl ErrorKind {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MalformedDelimiter { .. }
            | Self::SubOutsideCondition { .. }
            | Self::SubInFileContent { .. }
            | Self::UnknownSub { .. }
            | Self::DuplicateStepBlock { .. }
            | Self::TooManyHooks { .. }
            | Self::MissingTitle
            | Self::UnexpectedToken { .. } => ErrorCategory::Parse,

            Self::InitAfterStart
            | Self::ExpectAfterStart { .. }
            | Self::InvalidCommand { .. }
            | Self::DuplicateHook { .. }
            | Self::Aborted { .. }
            | Self::UnexpectedReply { .. } => ErrorCategory::Protocol,

            Self::Build { .. } => ErrorCategory::Build,
            Self::Forwarding { .. } => ErrorCategory::Forwarding,
            Self::Io { .. } => ErrorCategory::Io,
            Self::Assertion { .. } => ErrorCategory::Assertion,
        }
    }

    /// Get error code suffix for diagnostic codes
    pub const fn code_suffix(&self) -> &'static str {
        match self {
            Self::MalformedDelimiter { .. } => "malformed_delimiter",
            Self::SubOutsideCondition { .. } => "sub_outside_condition",
            Self::SubInFileContent { .. } => "sub_in_file_content",
            Self::UnknownSub { .. } => "unknown_sub",
            Self::DuplicateStepBlock { .. } => "duplicate_step_block",
            Self::TooManyHooks { .. } => "too_many_hooks",
            Self::MissingTitle => "missing_title",
            Self::UnexpectedToken { .. } => "unexpected_token",
            Self::InitAfterStart => "init_after_start",
            Self::ExpectAfterStart { .. } => "expect_after_start",
            Self::InvalidCommand { .. } => "invalid_command",
            Self::DuplicateHook { .. } => "duplicate_hook",
            Self::Aborted { .. } => "aborted",
            Self::UnexpectedReply { .. } => "unexpected_reply",
            Self::Build { .. } => "build",
            Self::Forwarding { .. } => "forwarding",
            Self::Io { .. } => "io",
            Self::Assertion { .. } => "assertion",
        }
    }

    /// Whether the error ends the whole invocation. Build and forwarding
    /// errors can be handled by the procedure that caused them.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Parse | ErrorCategory::Protocol | ErrorCategory::Assertion
        )
    }
}

impl std::error::Error for SpecError {}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::MalformedDelimiter { line } => {
                write!(f, "Parse error: malformed delimiter '{}'", line)
            }
            ErrorKind::SubOutsideCondition { slot } => {
                write!(
                    f,
                    "Parse error: sub-procedure ${{{}}} must be inside a condition",
                    slot
                )
            }
            ErrorKind::SubInFileContent { path, slot } => {
                write!(
                    f,
                    "Parse error: sub-procedure ${{{}}} is not allowed in file '{}'",
                    slot, path
                )
            }
            ErrorKind::UnknownSub { slot, available } => {
                write!(
                    f,
                    "Parse error: sub-procedure ${{{}}} does not exist ({} supplied)",
                    slot, available
                )
            }
            ErrorKind::DuplicateStepBlock { label } => {
                write!(
                    f,
                    "Parse error: only a single condition block can have sub-procedure steps (label {})",
                    label
                )
            }
            ErrorKind::TooManyHooks { label } => {
                write!(
                    f,
                    "Parse error: only two root level hooks are allowed, before and after (label {})",
                    label
                )
            }
            ErrorKind::MissingTitle => {
                write!(f, "Parse error: missing '# <title>' line")
            }
            ErrorKind::UnexpectedToken { expected, found } => {
                write!(f, "Parse error: expected {}, found {}", expected, found)
            }
            ErrorKind::InitAfterStart => {
                write!(f, "Protocol error: init must happen before the first update")
            }
            ErrorKind::ExpectAfterStart { label } => {
                write!(
                    f,
                    "Protocol error: expectation for label {} declared after the test started",
                    label
                )
            }
            ErrorKind::InvalidCommand { command, reason } => {
                write!(f, "Protocol error: invalid '{}' command: {}", command, reason)
            }
            ErrorKind::DuplicateHook { label, hook } => {
                write!(
                    f,
                    "Protocol error: {} hook already registered for label {}",
                    hook, label
                )
            }
            ErrorKind::Aborted { reason } => {
                write!(f, "Protocol error: invocation aborted: {}", reason)
            }
            ErrorKind::UnexpectedReply { expected, actual } => {
                write!(f, "Protocol error: expected {} reply, got {}", expected, actual)
            }
            ErrorKind::Build { message } => write!(f, "Build error: {}", message),
            ErrorKind::Forwarding { path, reason } => {
                write!(f, "Forwarding error: page.{} {}", path, reason)
            }
            ErrorKind::Io { message } => write!(f, "I/O error: {}", message),
            ErrorKind::Assertion {
                label,
                step,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Assertion failed after update {} (step {}): expected {:?}, got {:?}",
                    label, step, expected, actual
                )
            }
        }
    }
}

impl Diagnostic for SpecError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(&self.diagnostic_info.error_code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.diagnostic_info
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        self.source_info.source.as_ref()?;
        let labels = vec![LabeledSpan::new_with_span(
            Some(self.primary_label()),
            self.source_info.primary_span,
        )];
        Some(Box::new(labels.into_iter()))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        self.source_info
            .source
            .as_deref()
            .map(|s| s as &dyn miette::SourceCode)
    }
}

impl SpecError {
    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Attach a help message.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.diagnostic_info.help = Some(help.into());
        self
    }

    fn primary_label(&self) -> String {
        match &self.kind {
            ErrorKind::MalformedDelimiter { .. } => "malformed delimiter".into(),
            ErrorKind::SubOutsideCondition { .. } => "outside any condition".into(),
            ErrorKind::SubInFileContent { .. } => "inside file content".into(),
            ErrorKind::UnknownSub { .. } => "unknown slot".into(),
            ErrorKind::DuplicateStepBlock { .. } => "second step block".into(),
            ErrorKind::TooManyHooks { .. } => "third hook".into(),
            ErrorKind::MissingTitle => "title expected here".into(),
            ErrorKind::UnexpectedToken { .. } => "unexpected token".into(),
            ErrorKind::Assertion { .. } => "assertion failed here".into(),
            _ => "here".into(),
        }
    }
}

/// General-purpose error creation context.
pub struct ReportContext {
    pub source: Option<SourceContext>,
    pub phase: String,
}

impl ReportContext {
    pub fn new(source: SourceContext, phase: impl Into<String>) -> Self {
        Self {
            source: Some(source),
            phase: phase.into(),
        }
    }

    /// A context for errors that have no spec text to point into.
    pub fn unsourced(phase: impl Into<String>) -> Self {
        Self {
            source: None,
            phase: phase.into(),
        }
    }
}

impl ErrorReporting for ReportContext {
    fn report(&self, kind: ErrorKind, span: SourceSpan) -> SpecError {
        let error_code = format!("hmr_spec::{}::{}", self.phase, kind.code_suffix());

        SpecError {
            kind,
            source_info: SourceInfo {
                source: self.source.as_ref().map(SourceContext::to_named_source),
                primary_span: span,
                phase: self.phase.clone(),
            },
            diagnostic_info: DiagnosticInfo {
                help: None,
                error_code,
            },
        }
    }
}

/// Build an error that is not tied to any spec text.
pub fn unsourced(phase: &str, kind: ErrorKind) -> SpecError {
    ReportContext::unsourced(phase).report(kind, unspanned())
}

/// Build an assertion error whose help shows a word diff of the two sides.
pub fn assertion_failure(label: &str, step: usize, expected: &str, actual: &str) -> SpecError {
    let diff = word_diff(expected, actual);
    unsourced(
        "expect",
        ErrorKind::Assertion {
            label: label.into(),
            step,
            expected: expected.into(),
            actual: actual.into(),
        },
    )
    .with_help(format!("diff (-expected +actual): {}", diff))
}

fn word_diff(expected: &str, actual: &str) -> String {
    let changeset = Changeset::new(expected, actual, " ");
    changeset
        .diffs
        .iter()
        .map(|d| match d {
            Difference::Same(x) => x.clone(),
            Difference::Add(x) => format!("[+{}]", x),
            Difference::Rem(x) => format!("[-{}]", x),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Placeholder span for errors not tied to a specific source location.
pub fn unspanned() -> SourceSpan {
    SourceSpan::from(0..0)
}

/// Converts an AST Span to a miette SourceSpan.
pub fn to_source_span(span: crate::syntax::Span) -> SourceSpan {
    SourceSpan::from(span.start..span.end)
}

// ============================================================================
// ERROR FORMATTING UTILITIES
// ============================================================================

/// Prints a SpecError with full miette diagnostics
pub fn print_error(error: SpecError) {
    use miette::Report;
    let report = Report::new(error);
    eprintln!("{report:?}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_follow_the_taxonomy() {
        assert_eq!(ErrorKind::MissingTitle.category(), ErrorCategory::Parse);
        assert_eq!(ErrorKind::InitAfterStart.category(), ErrorCategory::Protocol);
        assert_eq!(
            ErrorKind::Build {
                message: "x".into()
            }
            .category(),
            ErrorCategory::Build
        );
        assert!(!ErrorKind::Forwarding {
            path: "a".into(),
            reason: "b".into()
        }
        .is_fatal());
    }

    #[test]
    fn report_carries_source_and_code() {
        let ctx = ReportContext::new(SourceContext::from_file("t.hmr", "::0:x"), "parse");
        let err = ctx.malformed_delimiter("::0:x", SourceSpan::from(0..5));
        assert_eq!(
            err.diagnostic_info.error_code,
            "hmr_spec::parse::malformed_delimiter"
        );
        let output = format!("{:?}", miette::Report::new(err));
        assert!(output.contains("malformed delimiter"));
    }

    #[test]
    fn assertion_failure_has_diff_help() {
        let err = assertion_failure("0", 1, "<p>a b</p>", "<p>a c</p>");
        let help = err.diagnostic_info.help.clone().unwrap_or_default();
        assert!(help.contains("[-"));
        assert!(help.contains("[+"));
        assert_eq!(err.category(), ErrorCategory::Assertion);
    }
}
