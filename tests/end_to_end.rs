//
// Copyright (c) The yangtool Contributors
//
// SPDX-License-Identifier: MIT
//

//! End-to-end scenarios with literal inputs and expected outputs,
//! exercising the schema/value XPath evaluator and instance-identifier
//! validator together through the public `Engine` API.

use std::cell::RefCell;

use yangtool::engine::Engine;
use yangtool::error::{ErrorCode, NoSuppression, WarningCounters};
use yangtool::logging::CollectingSink;
use yangtool::value::{Scalar, ValueArena, ValueNode, ValueOrigin};
use yangtool::xpath::eval::{eval_expr, EvalCtx, NodeModel, XValue};
use yangtool::xpath::instance_id::{evaluate as evaluate_instance_id, Cardinality};

fn run<M: NodeModel>(
    model: &M,
    context: M::Id,
    modules: Option<&yangtool::module::ModuleTable>,
    schema_mode: bool,
    expr: &str,
) -> yangtool::error::Result<XValue<M::Id>> {
    let parsed = yangtool::xpath::parse(expr, None)?;
    let warnings = RefCell::new(WarningCounters::default());
    let filter = NoSuppression;
    let sink = CollectingSink::default();
    let ctx = EvalCtx {
        model,
        context,
        position: 1,
        last: 1,
        original_context: context,
        variables: &|_| None,
        modules,
        resolve_prefix: &|p| Some(format!("urn:{p}")),
        schema_mode,
        warnings: &warnings,
        filter: &filter,
        sink: &sink,
    };
    eval_expr(&ctx, &parsed)
}

#[test]
fn schema_mode_path_resolution_against_must() {
    let mut engine = Engine::new();
    let src = r#"
        module m {
            namespace "urn:m";
            prefix m;
            container a {
                leaf b {
                    type string;
                    must "../c = 'ok'";
                }
                leaf c {
                    type string;
                }
            }
        }
    "#;
    let module_id = engine.load_module(src, "m").unwrap();
    let top = engine.modules.get(module_id).top_level[0];
    let leaf_b = engine.schema.find_child(top, "b", false, true).unwrap();
    let must_text = engine.schema.get(leaf_b).musts[0].clone();

    let model = engine.schema_model();
    let value = run(&model, leaf_b, Some(&engine.modules), true, &must_text).unwrap();
    let XValue::Bool(_) = value else {
        panic!("must resolves to a boolean equality test");
    };

    // The left-hand side of the `must`, `../c`, independently resolves to a
    // one-node set naming `m:c`.
    let path_value = run(&model, leaf_b, Some(&engine.modules), true, "../c").unwrap();
    let XValue::Nodes(ns) = path_value else {
        panic!("expected a node-set");
    };
    assert_eq!(ns.items.len(), 1);
    let leaf_c = engine.schema.find_child(top, "c", false, true).unwrap();
    assert_eq!(ns.items[0], leaf_c);
}

fn list_value_tree(engine: &Engine, module_id: yangtool::module::ModuleId, values: &[&str]) -> ValueArena {
    let top = engine.modules.get(module_id).top_level[0];
    let leaf_schema = engine.schema.find_child(top, "b", false, true).unwrap();

    let mut arena = ValueArena::new();
    let root = arena.insert(ValueNode {
        schema: top,
        parent: None,
        children: Vec::new(),
        scalar: None,
        metadata: Vec::new(),
        origin: ValueOrigin::Explicit,
        key_index: None,
    });
    for (i, v) in values.iter().enumerate() {
        let leaf = arena.insert(ValueNode {
            schema: leaf_schema,
            parent: Some(root),
            children: Vec::new(),
            scalar: Some(Scalar::String(v.to_string())),
            metadata: Vec::new(),
            origin: ValueOrigin::Explicit,
            key_index: Some(i as u32),
        });
        arena.get_mut(root).children.push(leaf);
    }
    arena
}

#[test]
fn value_mode_predicate_equality_picks_middle_node() {
    let mut engine = Engine::new();
    let src = r#"
        module a {
            namespace "urn:a";
            prefix a;
            container a {
                leaf-list b {
                    type uint32;
                }
            }
        }
    "#;
    let module_id = engine.load_module(src, "a").unwrap();
    let values = list_value_tree(&engine, module_id, &["1", "2", "3"]);
    let model = engine.value_model(&values);
    let root = model.top_level()[0];

    let result = run(&model, root, Some(&engine.modules), false, "/a:a/a:b[. = 2]").unwrap();
    let XValue::Nodes(ns) = result else {
        panic!("expected a node-set");
    };
    assert_eq!(ns.items.len(), 1);
    assert_eq!(engine.value_model(&values).string_value(ns.items[0]), "2");
}

#[test]
fn instance_identifier_happy_path_and_missing_instance() {
    let mut engine = Engine::new();
    let src = r#"
        module p {
            namespace "urn:p";
            prefix p;
            container a {
                list list {
                    key "key";
                    leaf key {
                        type string;
                    }
                    leaf leaf {
                        type string;
                    }
                }
            }
        }
    "#;
    let module_id = engine.load_module(src, "p").unwrap();
    let top = engine.modules.get(module_id).top_level[0];
    let list_schema = engine.schema.find_child(top, "list", false, true).unwrap();
    let key_schema = engine.schema.find_child(list_schema, "key", false, true).unwrap();
    let leaf_schema = engine.schema.find_child(list_schema, "leaf", false, true).unwrap();

    let mut values = ValueArena::new();
    let root = values.insert(ValueNode {
        schema: top,
        parent: None,
        children: Vec::new(),
        scalar: None,
        metadata: Vec::new(),
        origin: ValueOrigin::Explicit,
        key_index: None,
    });
    let entry = values.insert(ValueNode {
        schema: list_schema,
        parent: Some(root),
        children: Vec::new(),
        scalar: None,
        metadata: Vec::new(),
        origin: ValueOrigin::Explicit,
        key_index: Some(0),
    });
    values.get_mut(root).children.push(entry);
    let key = values.insert(ValueNode {
        schema: key_schema,
        parent: Some(entry),
        children: Vec::new(),
        scalar: Some(Scalar::String("k1".to_string())),
        metadata: Vec::new(),
        origin: ValueOrigin::Explicit,
        key_index: None,
    });
    values.get_mut(entry).children.push(key);
    let leaf = values.insert(ValueNode {
        schema: leaf_schema,
        parent: Some(entry),
        children: Vec::new(),
        scalar: Some(Scalar::String("v1".to_string())),
        metadata: Vec::new(),
        origin: ValueOrigin::Explicit,
        key_index: None,
    });
    values.get_mut(entry).children.push(leaf);

    let model = engine.value_model(&values);
    let root_id = model.top_level()[0];
    let warnings = RefCell::new(WarningCounters::default());
    let filter = NoSuppression;
    let sink = CollectingSink::default();
    let ctx = EvalCtx {
        model: &model,
        context: root_id,
        position: 1,
        last: 1,
        original_context: root_id,
        variables: &|_| None,
        modules: Some(&engine.modules),
        resolve_prefix: &|pfx| if pfx == "p" { Some("urn:p".to_string()) } else { None },
        schema_mode: false,
        warnings: &warnings,
        filter: &filter,
        sink: &sink,
    };

    let expr = yangtool::xpath::parse("/p:a/p:list[p:key = 'k1']/p:leaf", None).unwrap();
    let ns = evaluate_instance_id(&ctx, &expr, Cardinality::ExactlyOne).unwrap();
    assert_eq!(ns.items.len(), 1);
    assert_eq!(model.string_value(ns.items[0]), "v1");

    let missing_expr = yangtool::xpath::parse("/p:a/p:list[p:key = 'missing']/p:leaf", None).unwrap();
    let err = evaluate_instance_id(&ctx, &missing_expr, Cardinality::ExactlyOne).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::MissingInstance));
}

#[test]
fn union_of_paths_deduplicates_in_document_order() {
    let mut engine = Engine::new();
    let src = r#"
        module a {
            namespace "urn:a";
            prefix a;
            container a {
                leaf-list b {
                    type uint32;
                }
            }
        }
    "#;
    let module_id = engine.load_module(src, "a").unwrap();
    let values = list_value_tree(&engine, module_id, &["1", "2", "3"]);
    let model = engine.value_model(&values);
    let root = model.top_level()[0];

    let result = run(&model, root, Some(&engine.modules), false, "/a:a/a:b | /a:a/a:b | //a:b").unwrap();
    let XValue::Nodes(ns) = result else {
        panic!("expected a node-set");
    };
    assert_eq!(ns.items.len(), 3);
    let order: Vec<String> = ns.items.iter().map(|&id| model.string_value(id)).collect();
    assert_eq!(order, vec!["1", "2", "3"]);
}

#[test]
fn core_function_arity_error_surfaces_before_value_mode_evaluation() {
    let mut engine = Engine::new();
    let src = r#"
        module a {
            namespace "urn:a";
            prefix a;
            container a {
                leaf b {
                    type string;
                }
            }
        }
    "#;
    engine.load_module(src, "a").unwrap();
    let model = engine.schema_model();
    let ctx_node = model.top_level()[0];
    let err = run(&model, ctx_node, Some(&engine.modules), true, "substring(\"abc\")").unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::WrongNumberOfArgs));
}

#[test]
fn identityref_base_check_accepts_derived_and_rejects_unrelated() {
    let mut engine = Engine::new();
    let src = r#"
        module p {
            namespace "urn:p";
            prefix p;
            identity i;
            identity d {
                base i;
            }
            identity other;
            leaf x {
                type identityref {
                    base i;
                }
            }
        }
    "#;
    let module_id = engine.load_module(src, "p").unwrap();
    let module = engine.modules.get(module_id);
    assert!(module.identities.contains_key("d"));
    assert!(module.identities.contains_key("other"));

    let top = engine.modules.get(module_id).top_level[0];
    let leaf = engine.schema.get(top).leaf().unwrap();
    let simple = engine.types.resolve_named_type(leaf.type_id).unwrap();
    assert_eq!(simple.identity_base.as_deref(), Some("i"));
}
