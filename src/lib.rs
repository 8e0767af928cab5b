//
// Copyright (c) The yangtool Contributors
//
// SPDX-License-Identifier: MIT
//

//! A YANG-aware schema model, typed-value model, and XPath 1.0 evaluator:
//! load YANG modules into a [`schema::SchemaArena`], build instance data
//! into a [`value::ValueArena`], and evaluate `must`, `when`, `path`, and
//! ad hoc XPath expressions against either tree through one shared
//! evaluator in [`xpath::eval`].
//!
//! [`engine::Engine`] is the single entry point: it owns the type registry,
//! schema arena, and module table, and exposes the [`xpath::eval::NodeModel`]
//! implementations ([`engine::SchemaModel`], [`engine::ValueModel`]) the
//! evaluator runs over.

pub mod build;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod module;
pub mod schema;
pub mod stmt;
pub mod token;
pub mod types;
pub mod value;
pub mod xpath;

pub use engine::Engine;
pub use error::{Error, Result};
