//
// Copyright (c) The yangtool Contributors
//
// SPDX-License-Identifier: MIT
//

//! The XPath 1.0 core function library plus the YANG extensions
//! (`current()`, `module-loaded()`, `feature-enabled()`).

use crate::error::{Error, ErrorCode, Result};
use crate::xpath::ast::Expr;
use crate::xpath::eval::{
    eval_expr, first_in_document_order, to_bool_value, to_number, to_xstring, EvalCtx, NodeModel, NodeSet, XValue,
};

fn arity_error(name: &str, got: usize, want: &str) -> Error {
    Error::fatal(
        ErrorCode::WrongNumberOfArgs,
        format!("{name}() takes {want} argument(s), got {got}"),
    )
}

fn check_arity(name: &str, got: usize, min: usize, max: usize) -> Result<()> {
    if got < min || got > max {
        let want = if min == max {
            format!("{min}")
        } else {
            format!("{min}..={max}")
        };
        return Err(arity_error(name, got, &want));
    }
    Ok(())
}

/// Dispatches a function call. Arity is checked here uniformly, as a
/// validate-time step: the parser accepts any call shape, and arity is
/// only known once the function name resolves, which happens here.
pub fn call<M: NodeModel>(ctx: &EvalCtx<M>, name: &str, args: &[Expr]) -> Result<XValue<M::Id>> {
    match name {
        "boolean" => {
            check_arity(name, args.len(), 1, 1)?;
            let v = eval_expr(ctx, &args[0])?;
            Ok(XValue::Bool(to_bool_value(&v)))
        }
        "not" => {
            check_arity(name, args.len(), 1, 1)?;
            let v = eval_expr(ctx, &args[0])?;
            Ok(XValue::Bool(!to_bool_value(&v)))
        }
        "true" => {
            check_arity(name, args.len(), 0, 0)?;
            Ok(XValue::Bool(true))
        }
        "false" => {
            check_arity(name, args.len(), 0, 0)?;
            Ok(XValue::Bool(false))
        }
        "lang" => {
            check_arity(name, args.len(), 1, 1)?;
            // No xml:lang modeling in either the schema or value tree, so
            // this always reports false rather than raising an error.
            Ok(XValue::Bool(false))
        }
        "number" => {
            check_arity(name, args.len(), 0, 1)?;
            let v = if args.is_empty() {
                XValue::Nodes(NodeSet {
                    items: vec![ctx.context],
                })
            } else {
                eval_expr(ctx, &args[0])?
            };
            Ok(XValue::Number(to_number(ctx, &v)))
        }
        "sum" => {
            check_arity(name, args.len(), 1, 1)?;
            let v = eval_expr(ctx, &args[0])?;
            let XValue::Nodes(ns) = v else {
                return Err(Error::fatal(ErrorCode::WrongResultType, "sum() requires a node-set argument"));
            };
            let total: f64 = ns
                .items
                .iter()
                .map(|&id| ctx.model.string_value(id).trim().parse::<f64>().unwrap_or(f64::NAN))
                .sum();
            Ok(XValue::Number(total))
        }
        "floor" => {
            check_arity(name, args.len(), 1, 1)?;
            let v = eval_expr(ctx, &args[0])?;
            Ok(XValue::Number(to_number(ctx, &v).floor()))
        }
        "ceiling" => {
            check_arity(name, args.len(), 1, 1)?;
            let v = eval_expr(ctx, &args[0])?;
            Ok(XValue::Number(to_number(ctx, &v).ceil()))
        }
        "round" => {
            check_arity(name, args.len(), 1, 1)?;
            let v = eval_expr(ctx, &args[0])?;
            let n = to_number(ctx, &v);
            // XPath round(): round half up (toward positive infinity for
            // the exact .5 case), not Rust's round-half-away-from-zero.
            Ok(XValue::Number(if n.is_nan() || n.is_infinite() {
                n
            } else {
                (n + 0.5).floor()
            }))
        }
        "string" => {
            check_arity(name, args.len(), 0, 1)?;
            let v = if args.is_empty() {
                XValue::Nodes(NodeSet {
                    items: vec![ctx.context],
                })
            } else {
                eval_expr(ctx, &args[0])?
            };
            Ok(XValue::Str(to_xstring(ctx, &v)))
        }
        "concat" => {
            if args.len() < 2 {
                return Err(arity_error(name, args.len(), "2+"));
            }
            let mut out = String::new();
            for a in args {
                let v = eval_expr(ctx, a)?;
                out.push_str(&to_xstring(ctx, &v));
            }
            Ok(XValue::Str(out))
        }
        "starts-with" => {
            check_arity(name, args.len(), 2, 2)?;
            let a = str_arg(ctx, args, 0)?;
            let b = str_arg(ctx, args, 1)?;
            Ok(XValue::Bool(a.starts_with(&b)))
        }
        "contains" => {
            check_arity(name, args.len(), 2, 2)?;
            let a = str_arg(ctx, args, 0)?;
            let b = str_arg(ctx, args, 1)?;
            Ok(XValue::Bool(a.contains(&b)))
        }
        "substring-before" => {
            check_arity(name, args.len(), 2, 2)?;
            let a = str_arg(ctx, args, 0)?;
            let b = str_arg(ctx, args, 1)?;
            let out = match a.find(&b) {
                Some(idx) if !b.is_empty() => a[..idx].to_string(),
                _ => String::new(),
            };
            Ok(XValue::Str(out))
        }
        "substring-after" => {
            check_arity(name, args.len(), 2, 2)?;
            let a = str_arg(ctx, args, 0)?;
            let b = str_arg(ctx, args, 1)?;
            let out = match a.find(&b) {
                Some(idx) if !b.is_empty() => a[idx + b.len()..].to_string(),
                _ => String::new(),
            };
            Ok(XValue::Str(out))
        }
        "substring" => {
            check_arity(name, args.len(), 2, 3)?;
            let s = str_arg(ctx, args, 0)?;
            let chars: Vec<char> = s.chars().collect();
            let start = to_number(ctx, &eval_expr(ctx, &args[1])?);
            let len = if args.len() == 3 {
                to_number(ctx, &eval_expr(ctx, &args[2])?)
            } else {
                f64::INFINITY
            };
            Ok(XValue::Str(xpath_substring(&chars, start, len)))
        }
        "string-length" => {
            check_arity(name, args.len(), 0, 1)?;
            let s = if args.is_empty() {
                ctx.model.string_value(ctx.context)
            } else {
                str_arg(ctx, args, 0)?
            };
            Ok(XValue::Number(s.chars().count() as f64))
        }
        "normalize-space" => {
            check_arity(name, args.len(), 0, 1)?;
            let s = if args.is_empty() {
                ctx.model.string_value(ctx.context)
            } else {
                str_arg(ctx, args, 0)?
            };
            Ok(XValue::Str(s.split_whitespace().collect::<Vec<_>>().join(" ")))
        }
        "translate" => {
            check_arity(name, args.len(), 3, 3)?;
            let s = str_arg(ctx, args, 0)?;
            let from: Vec<char> = str_arg(ctx, args, 1)?.chars().collect();
            let to: Vec<char> = str_arg(ctx, args, 2)?.chars().collect();
            let out: String = s
                .chars()
                .filter_map(|c| match from.iter().position(|&f| f == c) {
                    Some(idx) => to.get(idx).copied(),
                    None => Some(c),
                })
                .collect();
            Ok(XValue::Str(out))
        }
        "last" => {
            check_arity(name, args.len(), 0, 0)?;
            Ok(XValue::Number(ctx.last as f64))
        }
        "position" => {
            check_arity(name, args.len(), 0, 0)?;
            Ok(XValue::Number(ctx.position as f64))
        }
        "count" => {
            check_arity(name, args.len(), 1, 1)?;
            let v = eval_expr(ctx, &args[0])?;
            let XValue::Nodes(ns) = v else {
                return Err(Error::fatal(ErrorCode::WrongResultType, "count() requires a node-set argument"));
            };
            Ok(XValue::Number(ns.len() as f64))
        }
        "id" => {
            check_arity(name, args.len(), 1, 1)?;
            // No ID-typed attributes in either tree model.
            Ok(XValue::nodes(Vec::new()))
        }
        "local-name" => {
            check_arity(name, args.len(), 0, 1)?;
            Ok(XValue::Str(name_of(ctx, args, NameKind::Local)?))
        }
        "name" => {
            check_arity(name, args.len(), 0, 1)?;
            Ok(XValue::Str(name_of(ctx, args, NameKind::Qualified)?))
        }
        "namespace-uri" => {
            check_arity(name, args.len(), 0, 1)?;
            Ok(XValue::Str(name_of(ctx, args, NameKind::Namespace)?))
        }
        "current" => {
            check_arity(name, args.len(), 0, 0)?;
            Ok(XValue::nodes(vec![ctx.original_context]))
        }
        "module-loaded" => {
            check_arity(name, args.len(), 1, 2)?;
            let module_name = str_arg(ctx, args, 0)?;
            let revision = if args.len() == 2 { Some(str_arg(ctx, args, 1)?) } else { None };
            let loaded = ctx
                .modules
                .is_some_and(|modules| modules.find_by_name(&module_name, revision.as_deref()).is_some());
            Ok(XValue::Bool(loaded))
        }
        "feature-enabled" => {
            check_arity(name, args.len(), 2, 2)?;
            let module_name = str_arg(ctx, args, 0)?;
            let feature_name = str_arg(ctx, args, 1)?;
            let enabled = ctx.modules.is_some_and(|modules| {
                modules
                    .find_by_name(&module_name, None)
                    .is_some_and(|id| modules.get(id).feature_enabled(&feature_name))
            });
            Ok(XValue::Bool(enabled))
        }
        other => Err(Error::fatal(
            ErrorCode::InvalidXpathExpr,
            format!("unknown XPath function '{other}'"),
        )),
    }
}

fn str_arg<M: NodeModel>(ctx: &EvalCtx<M>, args: &[Expr], idx: usize) -> Result<String> {
    let v = eval_expr(ctx, &args[idx])?;
    Ok(to_xstring(ctx, &v))
}

enum NameKind {
    Local,
    Qualified,
    Namespace,
}

fn name_of<M: NodeModel>(ctx: &EvalCtx<M>, args: &[Expr], kind: NameKind) -> Result<String> {
    let id = if args.is_empty() {
        Some(ctx.context)
    } else {
        match eval_expr(ctx, &args[0])? {
            XValue::Nodes(ns) => first_in_document_order(ctx.model, &ns),
            _ => return Err(Error::fatal(ErrorCode::WrongResultType, "name functions require a node-set argument")),
        }
    };
    Ok(match id {
        None => String::new(),
        Some(id) => match kind {
            NameKind::Local => ctx.model.local_name(id),
            NameKind::Qualified => ctx.model.qualified_name(id),
            NameKind::Namespace => ctx.model.namespace_uri(id),
        },
    })
}

/// XPath 1.0 `substring()` boundary-clamping rules: fractional and
/// out-of-range bounds are rounded and clamped rather than rejected.
fn xpath_substring(chars: &[char], start: f64, len: f64) -> String {
    if start.is_nan() || len.is_nan() {
        return String::new();
    }
    let round = |n: f64| -> f64 {
        if n.is_infinite() {
            n
        } else {
            (n + 0.5).floor()
        }
    };
    let start_r = round(start);
    let end_r = if len.is_infinite() {
        f64::INFINITY
    } else {
        start_r + round(len)
    };
    let lo = start_r.max(1.0);
    let hi = end_r.min(chars.len() as f64 + 1.0);
    if hi <= lo || lo > chars.len() as f64 {
        return String::new();
    }
    let lo_idx = (lo - 1.0) as usize;
    let hi_idx = (hi - 1.0).max(0.0) as usize;
    chars[lo_idx..hi_idx.min(chars.len())].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NoSuppression, WarningCounters};
    use crate::logging::CollectingSink;
    use crate::xpath::eval::test_model::TestTree;
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
            resolve_prefix: &|_| None,
            schema_mode: false,
            warnings,
            filter,
            sink,
        }
    }

    #[test]
    fn substring_clamps_fractional_and_negative_bounds() {
        assert_eq!(xpath_substring(&"12345".chars().collect::<Vec<_>>(), 1.5, 2.6), "234");
        assert_eq!(xpath_substring(&"12345".chars().collect::<Vec<_>>(), 0.0, 3.0), "12");
        assert_eq!(xpath_substring(&"12345".chars().collect::<Vec<_>>(), -42.0, f64::INFINITY), "12345");
    }

    #[test]
    fn concat_requires_at_least_two_arguments() {
        let tree = TestTree::default();
        let warnings = RefCell::new(WarningCounters::default());
        let filter = NoSuppression;
        let sink = CollectingSink::default();
        let ctx = make_ctx(&tree, &warnings, &filter, &sink);
        let err = call(&ctx, "concat", &[Expr::Literal("a".into())]).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::WrongNumberOfArgs));
    }

    #[test]
    fn substring_wrong_arity_reports_wrong_number_of_args() {
        let tree = TestTree::default();
        let warnings = RefCell::new(WarningCounters::default());
        let filter = NoSuppression;
        let sink = CollectingSink::default();
        let ctx = make_ctx(&tree, &warnings, &filter, &sink);
        let err = call(&ctx, "substring", &[Expr::Literal("abc".into())]).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::WrongNumberOfArgs));
    }

    #[test]
    fn round_rounds_half_up() {
        let tree = TestTree::default();
        let warnings = RefCell::new(WarningCounters::default());
        let filter = NoSuppression;
        let sink = CollectingSink::default();
        let ctx = make_ctx(&tree, &warnings, &filter, &sink);
        let v = call(&ctx, "round", &[Expr::Number(2.5)]).unwrap();
        let XValue::Number(n) = v else { panic!("expected number") };
        assert_eq!(n, 3.0);
    }
}
