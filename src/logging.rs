//
// Copyright (c) The yangtool Contributors
//
// SPDX-License-Identifier: MIT
//

//! Bridges diagnostics produced by the schema builder and the XPath
//! evaluator into the [`log`] crate, the way a NETCONF session layer would
//! surface them to an operator.

use crate::error::{Error, Warning};

/// A sink for diagnostics emitted while building a schema or evaluating an
/// XPath expression. Only one sink is active per [`crate::engine::Engine`].
pub trait DiagnosticSink: std::fmt::Debug {
    fn error(&self, err: &Error);
    fn warning(&self, warning: &Warning);
}

/// The default sink: logs through the `log` crate under the `yangtool`
/// target, errors at `Error` level and warnings at `Warn` level.
#[derive(Debug, Default)]
pub struct DefaultSink {
    _private: (),
}

impl DiagnosticSink for DefaultSink {
    fn error(&self, err: &Error) {
        log::error!(target: "yangtool", "{err}");
    }

    fn warning(&self, warning: &Warning) {
        log::warn!(target: "yangtool", "{warning}");
    }
}

/// A sink that records diagnostics instead of logging them, useful for
/// tests and for callers that want to present errors themselves (e.g. a
/// `show`/`save` front-end).
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub errors: std::cell::RefCell<Vec<String>>,
    pub warnings: std::cell::RefCell<Vec<String>>,
}

impl DiagnosticSink for CollectingSink {
    fn error(&self, err: &Error) {
        self.errors.borrow_mut().push(err.to_string());
    }

    fn warning(&self, warning: &Warning) {
        self.warnings.borrow_mut().push(warning.to_string());
    }
}
