use std::cell::RefCell;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use yangtool::engine::Engine;
use yangtool::error::{NoSuppression, WarningCounters};
use yangtool::logging::CollectingSink;
use yangtool::value::{Scalar, ValueArena, ValueNode, ValueOrigin};
use yangtool::xpath::eval::{eval_expr, EvalCtx, NodeModel, XValue};

static MODULE_SRC: &str = r#"
    module if-bench {
        namespace "urn:if-bench";
        prefix if;
        container interfaces {
            list interface {
                key "name";
                leaf name {
                    type string;
                }
                leaf enabled {
                    type boolean;
                }
            }
        }
    }
"#;

/// Builds an instance tree with `count` list entries under `interfaces`.
fn data_generate(engine: &Engine, count: u32) -> ValueArena {
    let module_id = engine.modules.find_by_name("if-bench", None).expect("module loaded");
    let top = engine.modules.get(module_id).top_level[0];
    let list = engine
        .schema
        .find_child(top, "interface", false, true)
        .expect("list schema present");
    let name_leaf = engine.schema.find_child(list, "name", false, true).expect("name leaf");
    let enabled_leaf = engine.schema.find_child(list, "enabled", false, true).expect("enabled leaf");

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

    for i in 0..count {
        let entry = values.insert(ValueNode {
            schema: list,
            parent: Some(root),
            children: Vec::new(),
            scalar: None,
            metadata: Vec::new(),
            origin: ValueOrigin::Explicit,
            key_index: Some(i),
        });
        values.get_mut(root).children.push(entry);

        let name = values.insert(ValueNode {
            schema: name_leaf,
            parent: Some(entry),
            children: Vec::new(),
            scalar: Some(Scalar::String(format!("eth{i}").into())),
            metadata: Vec::new(),
            origin: ValueOrigin::Explicit,
            key_index: None,
        });
        values.get_mut(entry).children.push(name);

        let enabled = values.insert(ValueNode {
            schema: enabled_leaf,
            parent: Some(entry),
            children: Vec::new(),
            scalar: Some(Scalar::Boolean(true)),
            metadata: Vec::new(),
            origin: ValueOrigin::Explicit,
            key_index: None,
        });
        values.get_mut(entry).children.push(enabled);
    }

    values
}

fn run_xpath(engine: &Engine, values: &ValueArena, expr: &yangtool::xpath::ast::Expr) -> XValue<yangtool::value::ValueId> {
    let model = engine.value_model(values);
    let context = model.top_level()[0];
    let warnings = RefCell::new(WarningCounters::default());
    let filter = NoSuppression;
    let sink = CollectingSink::default();
    let ctx = EvalCtx {
        model: &model,
        context,
        position: 1,
        last: 1,
        original_context: context,
        variables: &|_| None,
        modules: Some(&engine.modules),
        resolve_prefix: &|p| {
            engine
                .modules
                .iter()
                .find(|(_, m)| m.prefix == p)
                .map(|(_, m)| m.namespace.clone())
        },
        schema_mode: false,
        warnings: &warnings,
        filter: &filter,
        sink: &sink,
    };
    eval_expr(&ctx, expr).expect("expression evaluates")
}

fn criterion_benchmark(c: &mut Criterion) {
    let tree_sizes = [1 * 1024, 2 * 1024, 4 * 1024, 8 * 1024, 16 * 1024];

    let mut engine = Engine::new();
    engine.load_module(MODULE_SRC, "if-bench").expect("module builds");

    let count_expr = yangtool::xpath::parse("count(/if:interfaces/if:interface)", None).unwrap();
    let mut group = c.benchmark_group("eval_expr(count) / tree size");
    for size in &tree_sizes {
        let values = data_generate(&engine, *size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| run_xpath(&engine, &values, &count_expr));
        });
    }
    group.finish();

    let lookup_expr = yangtool::xpath::parse(
        "/if:interfaces/if:interface[if:name = 'eth0']/if:enabled",
        None,
    )
    .unwrap();
    let mut group = c.benchmark_group("eval_expr(keyed lookup) / tree size");
    for size in &tree_sizes {
        let values = data_generate(&engine, *size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| run_xpath(&engine, &values, &lookup_expr));
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
