//
// Copyright (c) The yangtool Contributors
//
// SPDX-License-Identifier: MIT
//

//! `yangtool`: a thin CLI over [`yangtool::engine::Engine`].
//! Subcommands: `load`, `show`, `validate`, `xpath`.

use std::cell::RefCell;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use yangtool::config::EngineConfig;
use yangtool::engine::Engine;
use yangtool::error::{NoSuppression, WarningCounters};
use yangtool::logging::{CollectingSink, DefaultSink};
use yangtool::schema::SchemaId;
use yangtool::xpath::eval::{eval_expr, EvalCtx, NodeModel};

#[derive(Parser)]
#[command(name = "yangtool", about = "Load, inspect, and query YANG schemas")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse and build a module, reporting its top-level node count.
    Load {
        file: PathBuf,
        #[arg(long = "search-dir")]
        search_dirs: Vec<PathBuf>,
    },
    /// Load a module and print its schema tree.
    Show {
        file: PathBuf,
        #[arg(long = "search-dir")]
        search_dirs: Vec<PathBuf>,
        #[arg(long = "feature", value_name = "MODULE:FEATURE")]
        features: Vec<String>,
    },
    /// Load a module and report every warning/error the builder produced.
    Validate {
        file: PathBuf,
        #[arg(long = "search-dir")]
        search_dirs: Vec<PathBuf>,
    },
    /// Load a module and evaluate an XPath expression in schema mode.
    Xpath {
        file: PathBuf,
        expr: String,
        #[arg(long = "search-dir")]
        search_dirs: Vec<PathBuf>,
    },
}

fn load_config(search_dirs: &[PathBuf]) -> EngineConfig {
    let mut cfg = EngineConfig::new();
    for dir in search_dirs {
        cfg = cfg.with_search_dir(dir.clone());
    }
    cfg.apply_env_overlay()
}

fn read_module(file: &PathBuf) -> anyhow::Result<(String, String)> {
    let src = std::fs::read_to_string(file)?;
    let stem = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("module")
        .to_string();
    Ok((src, stem))
}

fn parse_feature_toggle(spec: &str) -> Option<(String, String)> {
    spec.split_once(':').map(|(m, f)| (m.to_string(), f.to_string()))
}

fn print_tree(engine: &Engine, id: SchemaId, depth: usize) {
    let obj = engine.schema.get(id);
    if !obj.kind.is_data_node() {
        return;
    }
    println!("{}{:?} {}", "  ".repeat(depth), obj.kind, obj.name);
    for child in engine.schema.children(id) {
        print_tree(engine, child, depth + 1);
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Load { file, search_dirs } => {
            let _cfg = load_config(&search_dirs);
            let (src, hint) = read_module(&file)?;
            let mut engine = Engine::new();
            let module_id = engine.load_module(&src, &hint)?;
            let module = engine.modules.get(module_id);
            println!(
                "loaded '{}' (namespace {}, {} top-level nodes)",
                module.name,
                module.namespace,
                module.top_level.len()
            );
        }
        Command::Show { file, search_dirs, features } => {
            let _cfg = load_config(&search_dirs);
            let (src, hint) = read_module(&file)?;
            let mut engine = Engine::new();
            let module_id = engine.load_module(&src, &hint)?;
            let toggles: Vec<String> = features
                .iter()
                .filter_map(|f| parse_feature_toggle(f))
                .map(|(_, feature)| feature)
                .collect();
            engine.enable_features(module_id, &toggles);
            let top_level = engine.modules.get(module_id).top_level.clone();
            for id in top_level {
                print_tree(&engine, id, 0);
            }
        }
        Command::Validate { file, search_dirs } => {
            let _cfg = load_config(&search_dirs);
            let (src, hint) = read_module(&file)?;
            let sink = CollectingSink::default();
            let mut engine = Engine::new();
            match engine.load_module(&src, &hint) {
                Ok(module_id) => {
                    let module = engine.modules.get(module_id);
                    println!("module '{}' built with {} warnings", module.name, module.warnings.error_count());
                    for err in sink.errors.borrow().iter() {
                        println!("error: {err}");
                    }
                    for warn in sink.warnings.borrow().iter() {
                        println!("warning: {warn}");
                    }
                }
                Err(e) => {
                    eprintln!("error: {e}");
                    std::process::exit(1);
                }
            }
        }
        Command::Xpath { file, expr, search_dirs } => {
            let _cfg = load_config(&search_dirs);
            let (src, hint) = read_module(&file)?;
            let mut engine = Engine::new();
            engine.load_module(&src, &hint)?;

            let model = engine.schema_model();
            let top = model.top_level();
            let context = *top.first().ok_or_else(|| anyhow::anyhow!("module has no top-level nodes to evaluate against"))?;

            let parsed = yangtool::xpath::parse(&expr, None)?;
            let warnings = RefCell::new(WarningCounters::default());
            let filter = NoSuppression;
            let sink = DefaultSink::default();
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
                schema_mode: true,
                warnings: &warnings,
                filter: &filter,
                sink: &sink,
            };
            let value = eval_expr(&ctx, &parsed)?;
            match value {
                yangtool::xpath::eval::XValue::Nodes(ns) => {
                    println!("{} node(s):", ns.items.len());
                    for id in ns.items {
                        println!("  {}", model.qualified_name(id));
                    }
                }
                yangtool::xpath::eval::XValue::Number(n) => println!("{n}"),
                yangtool::xpath::eval::XValue::Str(s) => println!("{s}"),
                yangtool::xpath::eval::XValue::Bool(b) => println!("{b}"),
            }
        }
    }
    Ok(())
}
