//
// Copyright (c) The yangtool Contributors
//
// SPDX-License-Identifier: MIT
//

//! The diagnostic taxonomy shared by the schema builder and the XPath
//! evaluator.

use std::fmt;

/// A convenience wrapper around `Result` for [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// A 1-based position in some source text (YANG module or XPath expression).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Position {
    pub module: Option<String>,
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(module: Option<String>, line: u32, column: u32) -> Self {
        Self {
            module,
            line,
            column,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.module {
            Some(module) => write!(f, "{}:{}:{}", module, self.line, self.column),
            None => write!(f, "{}:{}", self.line, self.column),
        }
    }
}

/// Stable error-code identifiers at the API surface.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorCode {
    InvalidXpathExpr,
    InvalidInstanceId,
    MissingInstance,
    UnknownPrefix,
    UnknownVariable,
    WrongToken,
    WrongNumberOfArgs,
    WrongResultType,
    InternalMemory,
    InternalValue,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::InvalidXpathExpr => "invalid-xpath-expr",
            ErrorCode::InvalidInstanceId => "invalid-instance-id",
            ErrorCode::MissingInstance => "missing-instance",
            ErrorCode::UnknownPrefix => "unknown-prefix",
            ErrorCode::UnknownVariable => "unknown-variable",
            ErrorCode::WrongToken => "wrong-token",
            ErrorCode::WrongNumberOfArgs => "wrong-number-of-args",
            ErrorCode::WrongResultType => "wrong-result-type",
            ErrorCode::InternalMemory => "internal-memory",
            ErrorCode::InternalValue => "internal-value",
        };
        f.write_str(name)
    }
}

/// Warning kinds. Each is individually suppressible; a suppressed warning
/// increments a per-module counter instead of being reported.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum WarningKind {
    NoXpathParent,
    NoXpathChild,
    NoXpathDescendant,
    NoXpathAncestor,
    NoXpathNodes,
    EmptyXpathResult,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WarningKind::NoXpathParent => "no-xpath-parent",
            WarningKind::NoXpathChild => "no-xpath-child",
            WarningKind::NoXpathDescendant => "no-xpath-descendant",
            WarningKind::NoXpathAncestor => "no-xpath-ancestor",
            WarningKind::NoXpathNodes => "no-xpath-nodes",
            WarningKind::EmptyXpathResult => "empty-xpath-result",
        };
        f.write_str(name)
    }
}

/// The top-level error type returned by every fallible entry point.
///
/// Fatal-structural and instance/type errors all surface through this
/// enum; warnings do not (they go through [`crate::logging`] and
/// per-module counters instead).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{code}: {message}{}", pos.as_ref().map(|p| format!(" at {p}")).unwrap_or_default())]
    Fatal {
        code: ErrorCode,
        message: String,
        pos: Option<Position>,
    },

    #[error("instance error: {message}{}", pos.as_ref().map(|p| format!(" at {p}")).unwrap_or_default())]
    Instance {
        code: ErrorCode,
        message: String,
        pos: Option<Position>,
    },

    #[error("type error: {message}{}", pos.as_ref().map(|p| format!(" at {p}")).unwrap_or_default())]
    Type {
        message: String,
        pos: Option<Position>,
    },
}

impl Error {
    pub fn fatal(code: ErrorCode, message: impl Into<String>) -> Self {
        Error::Fatal {
            code,
            message: message.into(),
            pos: None,
        }
    }

    pub fn fatal_at(
        code: ErrorCode,
        message: impl Into<String>,
        pos: Position,
    ) -> Self {
        Error::Fatal {
            code,
            message: message.into(),
            pos: Some(pos),
        }
    }

    pub fn instance(code: ErrorCode, message: impl Into<String>) -> Self {
        Error::Instance {
            code,
            message: message.into(),
            pos: None,
        }
    }

    pub fn type_error(message: impl Into<String>, pos: Option<Position>) -> Self {
        Error::Type {
            message: message.into(),
            pos,
        }
    }

    /// Returns the stable error code, if this variant carries one.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Error::Fatal { code, .. } => Some(*code),
            Error::Instance { code, .. } => Some(*code),
            Error::Type { .. } => None,
        }
    }
}

/// A non-fatal diagnostic. Suppressible per [`WarningKind`]; when suppressed
/// the caller should route it to [`crate::module::Module::bump_warning`]
/// instead of emitting it.
#[derive(Clone, Debug)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
    pub pos: Option<Position>,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "warning ({}): {}", self.kind, self.message)?;
        if let Some(pos) = &self.pos {
            write!(f, " at {pos}")?;
        }
        Ok(())
    }
}

/// Per-module/per-engine counters for suppressed warnings, keyed by kind.
#[derive(Clone, Debug, Default)]
pub struct WarningCounters {
    counts: std::collections::HashMap<WarningKind, u32>,
    errors: u32,
}

impl WarningCounters {
    pub fn bump(&mut self, kind: WarningKind) {
        *self.counts.entry(kind).or_insert(0) += 1;
    }

    pub fn bump_error(&mut self) {
        self.errors += 1;
    }

    pub fn count(&self, kind: WarningKind) -> u32 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn error_count(&self) -> u32 {
        self.errors
    }
}

/// A filter deciding whether a given warning kind should be emitted
/// (through [`crate::logging`]) or silently counted.
pub trait WarningFilter {
    fn is_suppressed(&self, kind: WarningKind) -> bool;
}

/// The default filter: nothing is suppressed.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSuppression;

impl WarningFilter for NoSuppression {
    fn is_suppressed(&self, _kind: WarningKind) -> bool {
        false
    }
}

/// An explicit set of suppressed kinds, as a caller-configurable filter.
#[derive(Clone, Debug, Default)]
pub struct SuppressSet(std::collections::HashSet<WarningKind>);

impl SuppressSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn suppress(&mut self, kind: WarningKind) -> &mut Self {
        self.0.insert(kind);
        self
    }
}

impl WarningFilter for SuppressSet {
    fn is_suppressed(&self, kind: WarningKind) -> bool {
        self.0.contains(&kind)
    }
}
