//
// Copyright (c) The yangtool Contributors
//
// SPDX-License-Identifier: MIT
//

//! A reusable, re-seekable token stream.
//!
//! Both the generic YANG statement lexer ([`crate::stmt`]) and the XPath
//! lexer ([`crate::xpath::lexer`]) tokenize their source text up front into
//! a `Vec`, then hand it to a [`TokenChain`] for backtracking-free lookahead
//! by kind. Neither lexer auto-recovers: a malformed token is a fatal,
//! position-tagged error.

use crate::error::Position;

/// One lexical unit plus its source position.
#[derive(Clone, Debug, PartialEq)]
pub struct Spanned<T> {
    pub kind: T,
    pub pos: Position,
}

impl<T> Spanned<T> {
    pub fn new(kind: T, pos: Position) -> Self {
        Self { kind, pos }
    }
}

/// An ordered, re-seekable sequence of tokens owned by one chain.
///
/// The chain records a cursor for lookahead; `peek`/`peek2` never advance
/// it, `advance` consumes the current token, and `mark`/`rewind` provide
/// backtracking-free-by-construction save points (the cursor is just a
/// `usize`, so saving one is free).
#[derive(Clone, Debug)]
pub struct TokenChain<T> {
    tokens: Vec<Spanned<T>>,
    eof: Spanned<T>,
    cursor: usize,
}

impl<T: Clone> TokenChain<T> {
    pub fn new(tokens: Vec<Spanned<T>>, eof: T, eof_pos: Position) -> Self {
        Self {
            tokens,
            eof: Spanned::new(eof, eof_pos),
            cursor: 0,
        }
    }

    /// The token at the cursor, without consuming it.
    pub fn peek(&self) -> &Spanned<T> {
        self.tokens.get(self.cursor).unwrap_or(&self.eof)
    }

    /// The token one past the cursor, without consuming anything.
    pub fn peek2(&self) -> &Spanned<T> {
        self.tokens.get(self.cursor + 1).unwrap_or(&self.eof)
    }

    /// Consumes and returns the token at the cursor.
    pub fn advance(&mut self) -> Spanned<T> {
        let tok = self.peek().clone();
        if self.cursor < self.tokens.len() {
            self.cursor += 1;
        }
        tok
    }

    /// Returns the cursor so it can later be restored with [`Self::rewind`].
    pub fn mark(&self) -> usize {
        self.cursor
    }

    /// Restores a cursor previously returned by [`Self::mark`].
    pub fn rewind(&mut self, mark: usize) {
        self.cursor = mark;
    }

    /// Resets the chain back to its first token.
    pub fn reset_to_start(&mut self) {
        self.cursor = 0;
    }

    pub fn at_eof(&self) -> bool {
        self.cursor >= self.tokens.len()
    }

    pub fn current_source_position(&self) -> Position {
        self.peek().pos.clone()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
