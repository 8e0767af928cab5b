//
// Copyright (c) The yangtool Contributors
//
// SPDX-License-Identifier: MIT
//

//! The two-mode XPath evaluator.
//!
//! The same expression-walking code runs against either a schema tree or a
//! value tree: both are exposed through the [`NodeModel`] trait, so the
//! evaluator is generic over `M: NodeModel` rather than branching on a mode
//! flag at every step.
//!
//! The parser expands `//` into an explicit `descendant-or-self::node()`
//! step rather than deferring it through a "descendant-axis-pending" flag
//! on result nodes, since that's already the standard XPath abbreviation,
//! so the evaluator always computes axes eagerly. Document-order and
//! dedup invariants are unaffected; only the performance characteristic
//! changes relative to a lazily-expanded walk.

use std::cell::RefCell;
use std::collections::HashSet;
use std::hash::Hash;

use crate::error::{Error, ErrorCode, Result, Warning, WarningCounters, WarningFilter, WarningKind};
use crate::logging::DiagnosticSink;
use crate::module::ModuleTable;
use crate::value::format_xpath_number;
use crate::xpath::ast::{Axis, BinOp, Expr, FilterTail, LocationPath, NodeTest, Step};
use crate::xpath::functions;

/// Abstracts node identity and navigation over either the schema tree or a
/// value tree, so [`eval_expr`] runs unchanged against both.
pub trait NodeModel {
    type Id: Copy + Eq + Hash + std::fmt::Debug;

    /// The top-level nodes of the document in declaration order — e.g. a
    /// module's `top_level` schema nodes, or a value arena's `roots()`.
    /// There is no single synthetic document node with its own identity;
    /// an absolute path's first step matches directly against this set,
    /// the way YANG datastore roots have no name of their own.
    fn top_level(&self) -> Vec<Self::Id>;
    fn parent(&self, id: Self::Id) -> Option<Self::Id>;
    /// Children in declaration/document order.
    fn children(&self, id: Self::Id) -> Vec<Self::Id>;
    /// This node's 0-based position among its siblings: among its
    /// parent's children if it has a parent, otherwise its position within
    /// [`NodeModel::top_level`].
    fn child_index(&self, id: Self::Id) -> usize;
    fn local_name(&self, id: Self::Id) -> String;
    fn namespace_uri(&self, id: Self::Id) -> String;
    fn qualified_name(&self, id: Self::Id) -> String;
    /// XPath `string(node)`.
    fn string_value(&self, id: Self::Id) -> String;

    /// Full preorder traversal of the whole forest, used to compute the
    /// `following`/`preceding` axes. Concrete models should override this
    /// with their own arena traversal; the default walks `children`
    /// recursively via [`NodeModel::preorder_from`] starting at each
    /// top-level node.
    fn preorder_all(&self) -> Vec<Self::Id> {
        let mut out = Vec::new();
        for top in self.top_level() {
            out.push(top);
            self.preorder_from(top, &mut out);
        }
        out
    }

    fn preorder_from(&self, id: Self::Id, out: &mut Vec<Self::Id>) {
        for c in self.children(id) {
            out.push(c);
            self.preorder_from(c, out);
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct NodeItem<Id> {
    pub id: Id,
}

#[derive(Clone, Debug, Default)]
pub struct NodeSet<Id> {
    pub items: Vec<Id>,
}

impl<Id: Copy + Eq> NodeSet<Id> {
    pub fn single(id: Id) -> Self {
        NodeSet { items: vec![id] }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Union, merging by identity.
    pub fn union(mut self, other: NodeSet<Id>) -> Self {
        for id in other.items {
            if !self.items.contains(&id) {
                self.items.push(id);
            }
        }
        self
    }
}

#[derive(Clone, Debug)]
pub enum XValue<Id> {
    Nodes(NodeSet<Id>),
    Number(f64),
    Str(String),
    Bool(bool),
}

impl<Id: Copy + Eq> XValue<Id> {
    pub fn nodes(items: Vec<Id>) -> Self {
        XValue::Nodes(NodeSet { items })
    }
}

/// Evaluation context threaded through [`eval_expr`]: the XPath parser
/// control block, minus a result cache (an allocation-reduction
/// optimization not implemented here).
pub struct EvalCtx<'a, M: NodeModel> {
    pub model: &'a M,
    pub context: M::Id,
    pub position: u32,
    pub last: u32,
    /// Snapshot of the context node-set at the start of evaluation, for
    /// `current()`.
    pub original_context: M::Id,
    pub variables: &'a dyn Fn(&str) -> Option<XValue<M::Id>>,
    pub modules: Option<&'a ModuleTable>,
    pub resolve_prefix: &'a dyn Fn(&str) -> Option<String>,
    pub schema_mode: bool,
    pub warnings: &'a RefCell<WarningCounters>,
    pub filter: &'a dyn WarningFilter,
    pub sink: &'a dyn DiagnosticSink,
}

impl<'a, M: NodeModel> Clone for EvalCtx<'a, M> {
    fn clone(&self) -> Self {
        EvalCtx {
            model: self.model,
            context: self.context,
            position: self.position,
            last: self.last,
            original_context: self.original_context,
            variables: self.variables,
            modules: self.modules,
            resolve_prefix: self.resolve_prefix,
            schema_mode: self.schema_mode,
            warnings: self.warnings,
            filter: self.filter,
            sink: self.sink,
        }
    }
}

impl<'a, M: NodeModel> EvalCtx<'a, M> {
    fn with_context(&self, context: M::Id, position: u32, last: u32) -> Self {
        let mut c = self.clone();
        c.context = context;
        c.position = position;
        c.last = last;
        c
    }

    fn emit_warning(&self, kind: WarningKind, message: impl Into<String>) {
        if self.filter.is_suppressed(kind) {
            self.warnings.borrow_mut().bump(kind);
        } else {
            self.sink.warning(&Warning {
                kind,
                message: message.into(),
                pos: None,
            });
        }
    }
}

fn ancestor_warning_kind(axis: Axis) -> Option<WarningKind> {
    match axis {
        Axis::Parent => Some(WarningKind::NoXpathParent),
        Axis::Ancestor | Axis::AncestorOrSelf => Some(WarningKind::NoXpathAncestor),
        Axis::Child => Some(WarningKind::NoXpathChild),
        Axis::Descendant | Axis::DescendantOrSelf => Some(WarningKind::NoXpathDescendant),
        _ => None,
    }
}

fn ancestors_of<M: NodeModel>(model: &M, id: M::Id) -> HashSet<M::Id> {
    let mut out = HashSet::new();
    let mut cur = model.parent(id);
    while let Some(a) = cur {
        out.insert(a);
        cur = model.parent(a);
    }
    out
}

fn subtree_size<M: NodeModel>(model: &M, id: M::Id) -> usize {
    1 + model
        .children(id)
        .into_iter()
        .map(|c| subtree_size(model, c))
        .sum::<usize>()
}

/// Computes one axis's candidate nodes in XPath "proximity order" — the
/// order `position()` numbers within.
fn compute_axis<M: NodeModel>(model: &M, node: M::Id, axis: Axis) -> Vec<M::Id> {
    match axis {
        Axis::Child => model.children(node),
        Axis::Descendant => {
            let mut out = Vec::new();
            for c in model.children(node) {
                out.push(c);
                out.extend(compute_axis(model, c, Axis::Descendant));
            }
            out
        }
        Axis::DescendantOrSelf => {
            let mut out = vec![node];
            out.extend(compute_axis(model, node, Axis::Descendant));
            out
        }
        Axis::Parent => model.parent(node).into_iter().collect(),
        Axis::Ancestor => {
            let mut out = Vec::new();
            let mut cur = model.parent(node);
            while let Some(a) = cur {
                out.push(a);
                cur = model.parent(a);
            }
            out
        }
        Axis::AncestorOrSelf => {
            let mut out = vec![node];
            out.extend(compute_axis(model, node, Axis::Ancestor));
            out
        }
        Axis::FollowingSibling => {
            let siblings = match model.parent(node) {
                Some(p) => model.children(p),
                None => model.top_level(),
            };
            let idx = model.child_index(node);
            siblings.into_iter().skip(idx + 1).collect()
        }
        Axis::PrecedingSibling => {
            let siblings = match model.parent(node) {
                Some(p) => model.children(p),
                None => model.top_level(),
            };
            let idx = model.child_index(node);
            siblings[..idx].iter().rev().copied().collect()
        }
        Axis::Following => {
            let order = model.preorder_all();
            let idx = match order.iter().position(|&n| n == node) {
                Some(i) => i,
                None => return Vec::new(),
            };
            let size = subtree_size(model, node);
            order.into_iter().skip(idx + size).collect()
        }
        Axis::Preceding => {
            let order = model.preorder_all();
            let idx = match order.iter().position(|&n| n == node) {
                Some(i) => i,
                None => return Vec::new(),
            };
            let ancestors = ancestors_of(model, node);
            order[..idx]
                .iter()
                .rev()
                .copied()
                .filter(|n| !ancestors.contains(n))
                .collect()
        }
        Axis::SelfAxis => vec![node],
        Axis::Attribute | Axis::Namespace => Vec::new(),
    }
}

/// `source` is the node the axis step was taken from, used to resolve the
/// default namespace of an unprefixed [`NodeTest::Name`]: unprefixed names
/// inherit the namespace of the context, not a fixed "null" namespace.
/// `None` when stepping from the synthetic document
/// root, which has no namespace of its own — an unprefixed test there
/// matches on local name alone.
fn matches_test<M: NodeModel>(
    ctx: &EvalCtx<M>,
    source: Option<M::Id>,
    cand: M::Id,
    test: &NodeTest,
) -> bool {
    match test {
        NodeTest::Node => true,
        NodeTest::Text | NodeTest::Comment | NodeTest::ProcessingInstruction(_) => false,
        NodeTest::Wildcard(None) => true,
        NodeTest::Wildcard(Some(prefix)) => {
            let want_ns = (ctx.resolve_prefix)(prefix);
            want_ns.as_deref() == Some(ctx.model.namespace_uri(cand).as_str())
        }
        NodeTest::Name(prefix, local) => {
            if ctx.model.local_name(cand) != *local {
                return false;
            }
            let want_ns = match prefix {
                Some(p) => (ctx.resolve_prefix)(p),
                None => source.map(|s| ctx.model.namespace_uri(s)),
            };
            match want_ns {
                Some(ns) => ns == ctx.model.namespace_uri(cand),
                None => true,
            }
        }
    }
}

/// Applies a step's node test and predicate chain to an already-computed
/// axis candidate list, shared by [`eval_step`] (real context node) and
/// [`eval_first_absolute_step`] (synthetic document root).
fn filter_step_candidates<M: NodeModel>(
    ctx: &EvalCtx<M>,
    source: Option<M::Id>,
    axis_nodes: Vec<M::Id>,
    step: &Step,
) -> Result<Vec<M::Id>> {
    let mut filtered: Vec<M::Id> = axis_nodes
        .into_iter()
        .filter(|&cand| matches_test(ctx, source, cand, &step.test))
        .collect();

    for pred in &step.predicates {
        let last = filtered.len() as u32;
        let mut next = Vec::new();
        for (i, &cand) in filtered.iter().enumerate() {
            let position = (i + 1) as u32;
            let pred_ctx = ctx.with_context(cand, position, last);
            let val = eval_expr(&pred_ctx, pred)?;
            let keep = match val {
                XValue::Number(n) => n == position as f64,
                other => to_bool_value(&other),
            };
            if keep {
                next.push(cand);
            }
        }
        filtered = next;
    }
    Ok(filtered)
}

pub(crate) fn to_bool_value<Id: Copy + Eq>(v: &XValue<Id>) -> bool {
    match v {
        XValue::Nodes(ns) => !ns.is_empty(),
        XValue::Number(n) => *n != 0.0 && !n.is_nan(),
        XValue::Str(s) => !s.is_empty(),
        XValue::Bool(b) => *b,
    }
}

pub fn to_number<Id: Copy + Eq, M: NodeModel<Id = Id>>(ctx: &EvalCtx<M>, v: &XValue<Id>) -> f64 {
    match v {
        XValue::Nodes(ns) => match first_in_document_order(ctx.model, ns) {
            Some(id) => parse_xpath_number(&ctx.model.string_value(id)),
            None => f64::NAN,
        },
        XValue::Number(n) => *n,
        XValue::Str(s) => parse_xpath_number(s),
        XValue::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
    }
}

fn parse_xpath_number(s: &str) -> f64 {
    s.trim().parse().unwrap_or(f64::NAN)
}

pub fn to_xstring<Id: Copy + Eq, M: NodeModel<Id = Id>>(ctx: &EvalCtx<M>, v: &XValue<Id>) -> String {
    match v {
        XValue::Nodes(ns) => match first_in_document_order(ctx.model, ns) {
            Some(id) => ctx.model.string_value(id),
            None => String::new(),
        },
        XValue::Number(n) => format_xpath_number(*n),
        XValue::Str(s) => s.clone(),
        XValue::Bool(b) => b.to_string(),
    }
}

fn document_order_key<M: NodeModel>(model: &M, id: M::Id) -> Vec<usize> {
    let mut key = vec![model.child_index(id)];
    let mut cur = model.parent(id);
    while let Some(p) = cur {
        key.push(model.child_index(p));
        cur = model.parent(p);
    }
    key.reverse();
    key
}

pub(crate) fn first_in_document_order<M: NodeModel>(model: &M, ns: &NodeSet<M::Id>) -> Option<M::Id> {
    ns.items
        .iter()
        .copied()
        .min_by_key(|&id| document_order_key(model, id))
}

fn sort_by_document_order<M: NodeModel>(model: &M, ids: &mut Vec<M::Id>) {
    ids.sort_by_key(|&id| document_order_key(model, id));
}

fn dedup_preserve_order<Id: Copy + Eq>(ids: Vec<Id>) -> Vec<Id> {
    let mut out: Vec<Id> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

/// Evaluates one location step against every node in `current`, returning a
/// deduped, document-ordered result.
fn eval_step<M: NodeModel>(ctx: &EvalCtx<M>, current: &[M::Id], step: &Step) -> Result<Vec<M::Id>> {
    let mut merged = Vec::new();
    for &node in current {
        let axis_nodes = compute_axis(ctx.model, node, step.axis);
        if ctx.schema_mode && axis_nodes.is_empty() {
            if let Some(kind) = ancestor_warning_kind(step.axis) {
                ctx.emit_warning(kind, format!("axis {:?} produced no nodes", step.axis));
            }
        }
        let filtered = filter_step_candidates(ctx, Some(node), axis_nodes, step)?;
        merged.extend(filtered);
    }
    let mut out = dedup_preserve_order(merged);
    sort_by_document_order(ctx.model, &mut out);
    Ok(out)
}

/// The axis candidates for a step taken directly from the synthetic
/// document root, whose only identity is its [`NodeModel::top_level`]
/// children. Axes that presuppose a real node (siblings, ancestors,
/// following/preceding) have no meaning here and produce an empty result.
fn compute_axis_from_top_level<M: NodeModel>(model: &M, top: &[M::Id], axis: Axis) -> Vec<M::Id> {
    match axis {
        Axis::Child => top.to_vec(),
        Axis::Descendant | Axis::DescendantOrSelf => {
            let mut out = Vec::new();
            for &t in top {
                out.push(t);
                out.extend(compute_axis(model, t, Axis::Descendant));
            }
            out
        }
        _ => Vec::new(),
    }
}

/// Evaluates the first step of an absolute location path, sourced from the
/// document's top-level nodes rather than the children of a real node.
fn eval_first_absolute_step<M: NodeModel>(ctx: &EvalCtx<M>, step: &Step) -> Result<Vec<M::Id>> {
    let top = ctx.model.top_level();
    let axis_nodes = compute_axis_from_top_level(ctx.model, &top, step.axis);
    if ctx.schema_mode && axis_nodes.is_empty() {
        if let Some(kind) = ancestor_warning_kind(step.axis) {
            ctx.emit_warning(kind, format!("axis {:?} produced no nodes from the document root", step.axis));
        }
    }
    let mut out = filter_step_candidates(ctx, None, axis_nodes, step)?;
    sort_by_document_order(ctx.model, &mut out);
    Ok(dedup_preserve_order(out))
}

fn eval_location_path<M: NodeModel>(ctx: &EvalCtx<M>, path: &LocationPath) -> Result<Vec<M::Id>> {
    if path.absolute {
        let Some((first, rest)) = path.steps.split_first() else {
            return Ok(Vec::new());
        };
        let mut current = eval_first_absolute_step(ctx, first)?;
        for step in rest {
            current = eval_step(ctx, &current, step)?;
        }
        Ok(current)
    } else {
        let mut current = vec![ctx.context];
        for step in &path.steps {
            current = eval_step(ctx, &current, step)?;
        }
        Ok(current)
    }
}

fn eval_relative_steps<M: NodeModel>(
    ctx: &EvalCtx<M>,
    start: Vec<M::Id>,
    steps: &[Step],
) -> Result<Vec<M::Id>> {
    let mut current = start;
    for step in steps {
        current = eval_step(ctx, &current, step)?;
    }
    Ok(current)
}

fn coerce_existential<M: NodeModel>(
    ctx: &EvalCtx<M>,
    op: BinOp,
    ns: &NodeSet<M::Id>,
    other: &XValue<M::Id>,
) -> bool {
    ns.items.iter().any(|&id| {
        let node_str = ctx.model.string_value(id);
        match other {
            XValue::Nodes(other_ns) => other_ns
                .items
                .iter()
                .any(|&oid| compare_scalars(op, &XValue::Str(node_str.clone()), &XValue::Str(ctx.model.string_value(oid)))),
            XValue::Number(n) => {
                compare_scalars(op, &XValue::Number(parse_xpath_number(&node_str)), &XValue::Number(*n))
            }
            XValue::Bool(b) => compare_scalars(op, &XValue::Bool(!node_str.is_empty()), &XValue::Bool(*b)),
            XValue::Str(s) => compare_scalars(op, &XValue::Str(node_str), &XValue::Str(s.clone())),
        }
    })
}

fn compare_scalars<Id>(op: BinOp, lhs: &XValue<Id>, rhs: &XValue<Id>) -> bool {
    match op {
        BinOp::Eq | BinOp::Ne => {
            let equal = match (lhs, rhs) {
                (XValue::Bool(a), _) | (_, XValue::Bool(a)) => {
                    let b = match (lhs, rhs) {
                        (XValue::Bool(_), other) => scalar_to_bool(other),
                        (other, XValue::Bool(_)) => scalar_to_bool(other),
                        _ => unreachable!(),
                    };
                    *a == b
                }
                (XValue::Number(_), _) | (_, XValue::Number(_)) => {
                    scalar_to_number(lhs) == scalar_to_number(rhs)
                }
                _ => scalar_to_string(lhs) == scalar_to_string(rhs),
            };
            if op == BinOp::Eq {
                equal
            } else {
                !equal
            }
        }
        BinOp::Lt => scalar_to_number(lhs) < scalar_to_number(rhs),
        BinOp::Gt => scalar_to_number(lhs) > scalar_to_number(rhs),
        BinOp::Le => scalar_to_number(lhs) <= scalar_to_number(rhs),
        BinOp::Ge => scalar_to_number(lhs) >= scalar_to_number(rhs),
        _ => false,
    }
}

fn scalar_to_bool<Id>(v: &XValue<Id>) -> bool {
    match v {
        XValue::Bool(b) => *b,
        XValue::Number(n) => *n != 0.0 && !n.is_nan(),
        XValue::Str(s) => !s.is_empty(),
        XValue::Nodes(ns) => !ns.is_empty(),
    }
}

fn scalar_to_number<Id>(v: &XValue<Id>) -> f64 {
    match v {
        XValue::Number(n) => *n,
        XValue::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        XValue::Str(s) => parse_xpath_number(s),
        XValue::Nodes(_) => f64::NAN,
    }
}

fn scalar_to_string<Id>(v: &XValue<Id>) -> String {
    match v {
        XValue::Str(s) => s.clone(),
        XValue::Number(n) => format_xpath_number(*n),
        XValue::Bool(b) => b.to_string(),
        XValue::Nodes(_) => String::new(),
    }
}

fn eval_binary<M: NodeModel>(
    ctx: &EvalCtx<M>,
    op: BinOp,
    lhs: &Expr,
    rhs: &Expr,
) -> Result<XValue<M::Id>> {
    match op {
        BinOp::Or => {
            let l = eval_expr(ctx, lhs)?;
            if to_bool_value(&l) {
                return Ok(XValue::Bool(true));
            }
            let r = eval_expr(ctx, rhs)?;
            Ok(XValue::Bool(to_bool_value(&r)))
        }
        BinOp::And => {
            let l = eval_expr(ctx, lhs)?;
            if !to_bool_value(&l) {
                return Ok(XValue::Bool(false));
            }
            let r = eval_expr(ctx, rhs)?;
            Ok(XValue::Bool(to_bool_value(&r)))
        }
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
            let l = eval_expr(ctx, lhs)?;
            let r = eval_expr(ctx, rhs)?;
            let result = match (&l, &r) {
                (XValue::Nodes(a), XValue::Nodes(b)) => a.items.iter().any(|&ai| {
                    b.items.iter().any(|&bi| {
                        compare_scalars(
                            op,
                            &XValue::Str(ctx.model.string_value(ai)),
                            &XValue::Str(ctx.model.string_value(bi)),
                        )
                    })
                }),
                (XValue::Nodes(ns), other) | (other, XValue::Nodes(ns)) => {
                    coerce_existential(ctx, op, ns, other)
                }
                _ => compare_scalars(op, &l, &r),
            };
            Ok(XValue::Bool(result))
        }
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
            let l = to_number(ctx, &eval_expr(ctx, lhs)?);
            let r = to_number(ctx, &eval_expr(ctx, rhs)?);
            let n = match op {
                BinOp::Add => l + r,
                BinOp::Sub => l - r,
                BinOp::Mul => l * r,
                BinOp::Div => l / r,
                // `mod` truncates toward zero, not IEEE `remainder`.
                BinOp::Mod => l - r * (l / r).trunc(),
                _ => unreachable!(),
            };
            Ok(XValue::Number(n))
        }
    }
}

/// Evaluates one XPath expression against `ctx`.
pub fn eval_expr<M: NodeModel>(ctx: &EvalCtx<M>, expr: &Expr) -> Result<XValue<M::Id>> {
    match expr {
        Expr::Binary { op, lhs, rhs } => eval_binary(ctx, *op, lhs, rhs),
        Expr::Negate(inner) => Ok(XValue::Number(-to_number(ctx, &eval_expr(ctx, inner)?))),
        Expr::Union(members) => {
            let mut acc: Option<Vec<M::Id>> = None;
            for m in members {
                let v = eval_expr(ctx, m)?;
                let nodes = match v {
                    XValue::Nodes(ns) => ns.items,
                    _ => {
                        return Err(Error::fatal(
                            ErrorCode::WrongResultType,
                            "union operand is not a node-set",
                        ))
                    }
                };
                acc = Some(match acc {
                    None => nodes,
                    Some(existing) => dedup_preserve_order(
                        existing.into_iter().chain(nodes).collect(),
                    ),
                });
            }
            let mut out = acc.unwrap_or_default();
            sort_by_document_order(ctx.model, &mut out);
            Ok(XValue::nodes(out))
        }
        Expr::Path(path) => Ok(XValue::nodes(eval_location_path(ctx, path)?)),
        Expr::Filter {
            primary,
            predicates,
            tail,
        } => {
            let primary_val = eval_expr(ctx, primary)?;
            let mut nodes = match primary_val {
                XValue::Nodes(ns) => ns.items,
                other if predicates.is_empty() && tail.is_none() => return Ok(other),
                _ => {
                    return Err(Error::fatal(
                        ErrorCode::WrongResultType,
                        "predicate applied to a non-node-set primary expression",
                    ))
                }
            };
            for pred in predicates {
                let last = nodes.len() as u32;
                let mut next = Vec::new();
                for (i, &cand) in nodes.iter().enumerate() {
                    let position = (i + 1) as u32;
                    let pred_ctx = ctx.with_context(cand, position, last);
                    let val = eval_expr(&pred_ctx, pred)?;
                    let keep = match val {
                        XValue::Number(n) => n == position as f64,
                        other => to_bool_value(&other),
                    };
                    if keep {
                        next.push(cand);
                    }
                }
                nodes = next;
            }
            if let Some(FilterTail { steps, .. }) = tail {
                nodes = eval_relative_steps(ctx, nodes, steps)?;
            }
            sort_by_document_order(ctx.model, &mut nodes);
            Ok(XValue::nodes(dedup_preserve_order(nodes)))
        }
        Expr::VarRef(prefix, name) => {
            if prefix.is_some() {
                return Err(Error::fatal(
                    ErrorCode::UnknownVariable,
                    format!("prefixed variable references are not supported: '{name}'"),
                ));
            }
            (ctx.variables)(name)
                .ok_or_else(|| Error::fatal(ErrorCode::UnknownVariable, format!("unknown variable '${name}'")))
        }
        Expr::Literal(s) => Ok(XValue::Str(s.clone())),
        Expr::Number(n) => Ok(XValue::Number(*n)),
        Expr::Call { name, args } => functions::call(ctx, name, args),
    }
}

#[cfg(test)]
pub(crate) mod test_model {
    use super::NodeModel;

    /// A tiny in-memory tree used only to exercise the evaluator's axis and
    /// step logic without constructing a full schema or value arena.
    #[derive(Debug)]
    pub struct TreeNode {
        pub name: String,
        pub ns: String,
        pub children: Vec<usize>,
        pub parent: Option<usize>,
        pub text: String,
    }

    #[derive(Debug, Default)]
    pub struct TestTree {
        pub nodes: Vec<TreeNode>,
    }

    impl TestTree {
        pub fn push(&mut self, name: &str, ns: &str, parent: Option<usize>, text: &str) -> usize {
            let id = self.nodes.len();
            self.nodes.push(TreeNode {
                name: name.to_string(),
                ns: ns.to_string(),
                children: Vec::new(),
                parent,
                text: text.to_string(),
            });
            if let Some(p) = parent {
                self.nodes[p].children.push(id);
            }
            id
        }
    }

    impl NodeModel for TestTree {
        type Id = usize;

        fn top_level(&self) -> Vec<usize> {
            (0..self.nodes.len()).filter(|&id| self.nodes[id].parent.is_none()).collect()
        }

        fn parent(&self, id: usize) -> Option<usize> {
            self.nodes[id].parent
        }

        fn children(&self, id: usize) -> Vec<usize> {
            self.nodes[id].children.clone()
        }

        fn child_index(&self, id: usize) -> usize {
            match self.nodes[id].parent {
                Some(p) => self.nodes[p].children.iter().position(|&c| c == id).unwrap(),
                None => self.top_level().iter().position(|&c| c == id).unwrap(),
            }
        }

        fn local_name(&self, id: usize) -> String {
            self.nodes[id].name.clone()
        }

        fn namespace_uri(&self, id: usize) -> String {
            self.nodes[id].ns.clone()
        }

        fn qualified_name(&self, id: usize) -> String {
            self.nodes[id].name.clone()
        }

        fn string_value(&self, id: usize) -> String {
            if self.nodes[id].children.is_empty() {
                self.nodes[id].text.clone()
            } else {
                self.nodes[id]
                    .children
                    .iter()
                    .map(|&c| self.string_value(c))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }

    }
}

#[cfg(test)]
mod tests {
    use super::test_model::TestTree;
    use super::*;
    use crate::error::{NoSuppression, WarningCounters};
    use crate::logging::CollectingSink;

    fn make_ctx<'a>(
        tree: &'a TestTree,
        context: usize,
        warnings: &'a RefCell<WarningCounters>,
        filter: &'a NoSuppression,
        sink: &'a CollectingSink,
    ) -> EvalCtx<'a, TestTree> {
        EvalCtx {
            model: tree,
            context,
            position: 1,
            last: 1,
            original_context: context,
            variables: &|_| None,
            modules: None,
            resolve_prefix: &|_| None,
            schema_mode: false,
            warnings,
            filter,
            sink,
        }
    }

    fn sample_tree() -> TestTree {
        let mut t = TestTree::default();
        let root = t.push("root", "urn:m", None, "");
        let a = t.push("a", "urn:m", Some(root), "");
        t.push("b", "urn:m", Some(a), "1");
        t.push("b", "urn:m", Some(a), "2");
        t.push("b", "urn:m", Some(a), "3");
        t
    }

    #[test]
    fn value_mode_predicate_equality_picks_middle_node() {
        let tree = sample_tree();
        let warnings = RefCell::new(WarningCounters::default());
        let filter = NoSuppression;
        let sink = CollectingSink::default();
        let ctx = make_ctx(&tree, 0, &warnings, &filter, &sink);
        let expr = crate::xpath::parser::parse("/root/a/b[. = 2]", None).unwrap();
        let result = eval_expr(&ctx, &expr).unwrap();
        let XValue::Nodes(ns) = result else { panic!("expected node-set") };
        assert_eq!(ns.items.len(), 1);
        assert_eq!(tree.string_value(ns.items[0]), "2");
    }

    #[test]
    fn union_deduplicates_and_preserves_document_order() {
        let tree = sample_tree();
        let warnings = RefCell::new(WarningCounters::default());
        let filter = NoSuppression;
        let sink = CollectingSink::default();
        let ctx = make_ctx(&tree, 0, &warnings, &filter, &sink);
        let expr = crate::xpath::parser::parse("/root/a/b | /root/a/b | //b", None).unwrap();
        let result = eval_expr(&ctx, &expr).unwrap();
        let XValue::Nodes(ns) = result else { panic!("expected node-set") };
        assert_eq!(ns.items.len(), 3);
        let texts: Vec<_> = ns.items.iter().map(|&id| tree.string_value(id)).collect();
        assert_eq!(texts, vec!["1", "2", "3"]);
    }

    #[test]
    fn mod_truncates_toward_zero() {
        let tree = sample_tree();
        let warnings = RefCell::new(WarningCounters::default());
        let filter = NoSuppression;
        let sink = CollectingSink::default();
        let ctx = make_ctx(&tree, 0, &warnings, &filter, &sink);
        let expr = crate::xpath::parser::parse("-7 mod 2", None).unwrap();
        let XValue::Number(n) = eval_expr(&ctx, &expr).unwrap() else { panic!("expected number") };
        assert_eq!(n, -1.0);
    }

    #[test]
    fn division_by_zero_yields_infinity_not_an_error() {
        let tree = sample_tree();
        let warnings = RefCell::new(WarningCounters::default());
        let filter = NoSuppression;
        let sink = CollectingSink::default();
        let ctx = make_ctx(&tree, 0, &warnings, &filter, &sink);
        let expr = crate::xpath::parser::parse("1 div 0", None).unwrap();
        let XValue::Number(n) = eval_expr(&ctx, &expr).unwrap() else { panic!("expected number") };
        assert!(n.is_infinite() && n > 0.0);
    }
}
