//
// Copyright (c) The yangtool Contributors
//
// SPDX-License-Identifier: MIT
//

//! The instance-identifier sub-grammar validator: `/prefix:name` steps
//! only, `[prefix:key = literal]` / `[. = literal]` predicates, with
//! cardinality rules keyed by `require-instance`.

use crate::error::{Error, ErrorCode, Result};
use crate::xpath::ast::{Axis, BinOp, Expr, NodeTest};
use crate::xpath::eval::{eval_expr, EvalCtx, NodeModel, NodeSet, XValue};

/// The cardinality rule to enforce once an instance-identifier has been
/// evaluated against a value tree.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Cardinality {
    /// `require-instance true` on an `instance-identifier`: exactly one
    /// match.
    ExactlyOne,
    /// An unconstrained `instance-identifier` (`require-instance false`):
    /// zero or one match.
    AtMostOne,
    /// A `leafref` whose target has `require-instance true`: at least one
    /// match.
    AtLeastOne,
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::fatal(ErrorCode::InvalidInstanceId, msg.into())
}

/// Structurally validates that `expr` (already parsed by
/// [`crate::xpath::parser::parse`]) stays within the instance-identifier
/// sub-grammar. Any token or shape outside the strict subset is rejected
/// here rather than surfacing as a general XPath error.
pub fn validate_structure(expr: &Expr) -> Result<()> {
    let Expr::Path(path) = expr else {
        return Err(invalid("instance identifier must be a location path"));
    };
    if !path.absolute {
        return Err(invalid("instance identifier must be absolute"));
    }
    if path.steps.is_empty() {
        return Err(invalid("instance identifier must have at least one step"));
    }
    for step in &path.steps {
        if step.axis != Axis::Child {
            return Err(invalid("instance identifier steps must use the child axis"));
        }
        match &step.test {
            NodeTest::Name(Some(_), _) => {}
            _ => return Err(invalid("instance identifier steps must be prefixed QNames")),
        }
        for pred in &step.predicates {
            validate_predicate(pred)?;
        }
    }
    Ok(())
}

fn validate_predicate(expr: &Expr) -> Result<()> {
    let Expr::Binary {
        op: BinOp::Eq,
        lhs,
        rhs,
    } = expr
    else {
        return Err(invalid("instance identifier predicates must be an equality test"));
    };
    match rhs.as_ref() {
        Expr::Literal(_) | Expr::Number(_) => {}
        _ => return Err(invalid("instance identifier predicate right-hand side must be a literal")),
    }
    let Expr::Path(p) = lhs.as_ref() else {
        return Err(invalid(
            "instance identifier predicate left-hand side must be 'prefix:key' or '.'",
        ));
    };
    if p.absolute || p.steps.len() != 1 {
        return Err(invalid(
            "instance identifier predicate left-hand side must be a single relative step",
        ));
    }
    let step = &p.steps[0];
    if !step.predicates.is_empty() {
        return Err(invalid("instance identifier predicate key must not itself have predicates"));
    }
    match (step.axis, &step.test) {
        (Axis::Child, NodeTest::Name(Some(_), _)) => Ok(()),
        (Axis::SelfAxis, NodeTest::Node) => Ok(()),
        _ => Err(invalid(
            "instance identifier predicate left-hand side must be 'prefix:key' or '.'",
        )),
    }
}

/// Evaluates a validated instance-identifier expression and enforces the
/// cardinality rule for its `require-instance` context.
pub fn evaluate<M: NodeModel>(
    ctx: &EvalCtx<M>,
    expr: &Expr,
    cardinality: Cardinality,
) -> Result<NodeSet<M::Id>> {
    validate_structure(expr)?;
    let XValue::Nodes(ns) = eval_expr(ctx, expr)? else {
        return Err(invalid("instance identifier did not evaluate to a node-set"));
    };
    match (cardinality, ns.len()) {
        (Cardinality::ExactlyOne, 1) => Ok(ns),
        (Cardinality::ExactlyOne, _) => Err(Error::instance(
            ErrorCode::MissingInstance,
            format!("expected exactly one instance, found {}", ns.len()),
        )),
        (Cardinality::AtMostOne, 0 | 1) => Ok(ns),
        (Cardinality::AtMostOne, n) => Err(Error::instance(
            ErrorCode::MissingInstance,
            format!("expected at most one instance, found {n}"),
        )),
        (Cardinality::AtLeastOne, 0) => Err(Error::instance(
            ErrorCode::MissingInstance,
            "expected at least one instance, found none",
        )),
        (Cardinality::AtLeastOne, _) => Ok(ns),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NoSuppression, WarningCounters};
    use crate::logging::CollectingSink;
    use crate::xpath::eval::test_model::TestTree;
    use crate::xpath::parser::parse;
    use std::cell::RefCell;

    fn make_ctx<'a>(
        tree: &'a TestTree,
        warnings: &'a RefCell<WarningCounters>,
        filter: &'a NoSuppression,
        sink: &'a CollectingSink,
    ) -> EvalCtx<'a, TestTree> {
        EvalCtx {
            model: tree,
            context: 0,
            position: 1,
            last: 1,
            original_context: 0,
            variables: &|_| None,
            modules: None,
            resolve_prefix: &|p| Some(format!("urn:{p}")),
            schema_mode: false,
            warnings,
            filter,
            sink,
        }
    }

    fn list_tree() -> TestTree {
        let mut t = TestTree::default();
        let root = t.push("root", "urn:m", None, "");
        let a = t.push("a", "urn:m", Some(root), "");
        let l1 = t.push("list", "urn:m", Some(a), "");
        t.push("key", "urn:m", Some(l1), "k1");
        t.push("leaf", "urn:m", Some(l1), "v1");
        t
    }

    #[test]
    fn happy_path_matches_single_list_entry() {
        let tree = list_tree();
        let warnings = RefCell::new(WarningCounters::default());
        let filter = NoSuppression;
        let sink = CollectingSink::default();
        let ctx = make_ctx(&tree, &warnings, &filter, &sink);
        let expr = parse("/m:root/m:a/m:list[m:key = 'k1']/m:leaf", None).unwrap();
        let ns = evaluate(&ctx, &expr, Cardinality::ExactlyOne).unwrap();
        assert_eq!(ns.items.len(), 1);
        assert_eq!(tree.string_value(ns.items[0]), "v1");
    }

    #[test]
    fn zero_matches_with_exactly_one_reports_missing_instance() {
        let tree = list_tree();
        let warnings = RefCell::new(WarningCounters::default());
        let filter = NoSuppression;
        let sink = CollectingSink::default();
        let ctx = make_ctx(&tree, &warnings, &filter, &sink);
        let expr = parse("/m:root/m:a/m:list[m:key = 'missing']/m:leaf", None).unwrap();
        let err = evaluate(&ctx, &expr, Cardinality::ExactlyOne).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::MissingInstance));
    }

    #[test]
    fn rejects_relative_path() {
        let expr = parse("a/b", None).unwrap();
        assert!(validate_structure(&expr).is_err());
    }

    #[test]
    fn rejects_unprefixed_step() {
        let expr = parse("/a/b", None).unwrap();
        let err = validate_structure(&expr).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidInstanceId));
    }

    #[test]
    fn rejects_non_equality_predicate() {
        let expr = parse("/m:root/m:a[m:key > 1]", None).unwrap();
        assert!(validate_structure(&expr).is_err());
    }

    #[test]
    fn rejects_function_call_as_predicate_key() {
        let expr = parse("/m:root/m:a[count(m:b) = 1]", None).unwrap();
        assert!(validate_structure(&expr).is_err());
    }
}
