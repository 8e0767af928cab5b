//
// Copyright (c) The yangtool Contributors
//
// SPDX-License-Identifier: MIT
//

//! The `Engine`: the single owner of every arena. Built-in type templates,
//! the schema tree, and the module table all live on one `Engine` value —
//! no process-globals. Also hosts the concrete [`NodeModel`] implementations
//! the XPath evaluator runs over: [`SchemaModel`] for schema-mode
//! (`must`/`when`/leafref paths resolved against the schema tree) and
//! [`ValueModel`] for value-mode (instance data evaluation).

use log::{info, warn};

use crate::build::{build_module_header, expand_module, resolve_schema_path, ModuleBuilder};
use crate::error::{Error, ErrorCode, Result};
use crate::module::{Module, ModuleId, ModuleTable};
use crate::schema::{SchemaArena, SchemaId};
use crate::stmt::parse_module_text;
use crate::types::TypeRegistry;
use crate::value::{ValueArena, ValueId};
use crate::xpath::eval::NodeModel;

/// Owns every arena for one running instance of the toolchain. There is
/// exactly one `Engine` per process invocation; nothing here is a
/// `static`/`lazy_static`.
pub struct Engine {
    pub types: TypeRegistry,
    pub schema: SchemaArena,
    pub modules: ModuleTable,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            types: TypeRegistry::new(),
            schema: SchemaArena::new(),
            modules: ModuleTable::new(),
        }
    }

    /// Parses and builds one module's schema (Parse, Resolve, Expand),
    /// then runs the Resolve/Expand step for this module before returning.
    ///
    /// Modules that `import`/`uses`/`augment` across module boundaries must
    /// be loaded in dependency order — the same constraint most YANG
    /// toolchains place on the caller, since there is no whole-engine
    /// fixed-point pass here.
    pub fn load_module(&mut self, src: &str, module_hint: &str) -> Result<ModuleId> {
        let stmt = parse_module_text(src, module_hint)?;
        let header = build_module_header(&stmt)?;
        let name = header.name.clone();
        let module_id = ModuleId(self.modules.len() as u32);
        self.modules.insert(header.clone())?;

        let (top_level, groupings, features, typedefs, identities, extensions, uses_sites, augment_sites) = {
            let mut builder = ModuleBuilder::new(&mut self.types, &mut self.schema, &self.modules, module_id, &header);
            builder.build_body(&stmt)?;
            (
                builder.top_level.clone(),
                builder.groupings.clone(),
                builder.features.clone(),
                builder.typedefs.clone(),
                builder.identities.clone(),
                builder.extensions.clone(),
                builder.uses_sites.clone(),
                builder.augment_sites.clone(),
            )
        };

        {
            let module = self.modules.get_mut(module_id);
            module.top_level = top_level;
            module.groupings = groupings;
            module.features = features;
            module.typedefs = typedefs;
            module.identities = identities;
            module.extensions = extensions;
        }

        expand_module(&mut self.schema, &self.modules, module_id, &uses_sites, &augment_sites)?;
        self.resolve_leafrefs(module_id)?;

        info!("loaded module '{name}' ({} top-level nodes)", self.modules.get(module_id).top_level.len());
        Ok(module_id)
    }

    /// Enables features named in `names` on an already-loaded module. The
    /// enabled-feature list is an overlay applied after loading, not part
    /// of the YANG text itself.
    pub fn enable_features(&mut self, module_id: ModuleId, names: &[String]) {
        let module = self.modules.get_mut(module_id);
        for name in names {
            if let Some(v) = module.features.get_mut(name) {
                *v = true;
            } else {
                warn!("feature '{name}' not declared in module '{}'", module.name);
            }
        }
    }

    fn resolve_leafrefs(&mut self, module_id: ModuleId) -> Result<()> {
        let mut leaf_ids = Vec::new();
        for &top in &self.modules.get(module_id).top_level {
            leaf_ids.extend(self.schema.traverse(top).filter(|&id| self.schema.get(id).leaf().is_some()));
        }
        for leaf_id in leaf_ids {
            let type_id = self.schema.get(leaf_id).leaf().unwrap().type_id;
            let base = self.types.base_kind_of(type_id)?;
            if base != crate::types::BaseKind::Leafref {
                continue;
            }
            let Some(path) = self.types.resolve_named_type(type_id)?.leafref_path.clone() else {
                continue;
            };
            let terminal = terminal_type_id(&self.types, type_id);
            let parent = self.schema.parent(leaf_id);
            match resolve_schema_path(&self.schema, &self.modules, module_id, parent, &path) {
                Ok(target) => {
                    if let crate::types::TypeDef::Simple(simple) = &mut self.types.get_mut(terminal).def {
                        simple.leafref_target = Some(target);
                    }
                }
                Err(e) => warn!("leafref at '{}' did not resolve: {e}", self.schema.get(leaf_id).name),
            }
        }
        Ok(())
    }

    pub fn schema_model(&self) -> SchemaModel<'_> {
        SchemaModel::new(&self.schema, &self.modules)
    }

    pub fn value_model<'a>(&'a self, values: &'a ValueArena) -> ValueModel<'a> {
        ValueModel {
            values,
            schema: &self.schema,
            modules: &self.modules,
        }
    }
}

/// Schema-mode [`NodeModel`]: nodes are [`SchemaId`]s, their namespace comes
/// from the owning module, and the top-level set is every implemented
/// module's `top_level`, concatenated in [`ModuleTable::iter`] order.
pub struct SchemaModel<'a> {
    schema: &'a SchemaArena,
    modules: &'a ModuleTable,
}

impl<'a> SchemaModel<'a> {
    pub fn new(schema: &'a SchemaArena, modules: &'a ModuleTable) -> Self {
        Self { schema, modules }
    }

    fn module_of(&self, id: SchemaId) -> &Module {
        self.modules.get(self.schema.get(id).module)
    }
}

impl<'a> NodeModel for SchemaModel<'a> {
    type Id = SchemaId;

    fn top_level(&self) -> Vec<SchemaId> {
        self.modules
            .iter()
            .filter(|(_, m)| m.implemented)
            .flat_map(|(_, m)| m.top_level.iter().copied())
            .filter(|&id| self.schema.get(id).kind.is_data_node())
            .collect()
    }

    fn parent(&self, id: SchemaId) -> Option<SchemaId> {
        self.schema.parent(id)
    }

    fn children(&self, id: SchemaId) -> Vec<SchemaId> {
        self.schema
            .children(id)
            .filter(|&c| self.schema.get(c).kind.is_data_node())
            .collect()
    }

    fn child_index(&self, id: SchemaId) -> usize {
        let siblings = match self.schema.parent(id) {
            Some(p) => self.children(p),
            None => self.top_level(),
        };
        siblings.iter().position(|&s| s == id).unwrap_or(0)
    }

    fn local_name(&self, id: SchemaId) -> String {
        self.schema.get(id).name.clone()
    }

    fn namespace_uri(&self, id: SchemaId) -> String {
        self.module_of(id).namespace.clone()
    }

    fn qualified_name(&self, id: SchemaId) -> String {
        format!("{}:{}", self.module_of(id).prefix, self.schema.get(id).name)
    }

    fn string_value(&self, id: SchemaId) -> String {
        // Schema-mode string-value is only meaningful for `default`/`must`
        // introspection tooling, not for evaluation proper; the node's own
        // name is the closest stable textual identity it has.
        self.schema.get(id).name.clone()
    }
}

/// Value-mode [`NodeModel`]: nodes are [`ValueId`]s. Names/namespaces are
/// resolved indirectly through the instance's back-pointer to its
/// [`SchemaId`], since a `ValueNode` carries no name of its own.
pub struct ValueModel<'a> {
    values: &'a ValueArena,
    schema: &'a SchemaArena,
    modules: &'a ModuleTable,
}

impl<'a> ValueModel<'a> {
    pub fn new(values: &'a ValueArena, schema: &'a SchemaArena, modules: &'a ModuleTable) -> Self {
        Self { values, schema, modules }
    }
}

impl<'a> NodeModel for ValueModel<'a> {
    type Id = ValueId;

    fn top_level(&self) -> Vec<ValueId> {
        self.values.roots().to_vec()
    }

    fn parent(&self, id: ValueId) -> Option<ValueId> {
        self.values.parent(id)
    }

    fn children(&self, id: ValueId) -> Vec<ValueId> {
        self.values.children(id).collect()
    }

    fn child_index(&self, id: ValueId) -> usize {
        let siblings: Vec<ValueId> = match self.values.parent(id) {
            Some(p) => self.values.children(p).collect(),
            None => self.values.roots().to_vec(),
        };
        siblings.iter().position(|&s| s == id).unwrap_or(0)
    }

    fn local_name(&self, id: ValueId) -> String {
        self.schema.get(self.values.get(id).schema).name.clone()
    }

    fn namespace_uri(&self, id: ValueId) -> String {
        let schema_id = self.values.get(id).schema;
        self.modules.get(self.schema.get(schema_id).module).namespace.clone()
    }

    fn qualified_name(&self, id: ValueId) -> String {
        let schema_id = self.values.get(id).schema;
        let module = self.modules.get(self.schema.get(schema_id).module);
        format!("{}:{}", module.prefix, self.schema.get(schema_id).name)
    }

    fn string_value(&self, id: ValueId) -> String {
        let node = self.values.get(id);
        if let Some(scalar) = &node.scalar {
            return scalar.to_xpath_string();
        }
        // Interior (container/list) nodes: XPath string-value is the
        // concatenation of all descendant text nodes, in document order.
        self.values
            .traverse(id)
            .filter_map(|d| self.values.get(d).scalar.as_ref())
            .map(|s| s.to_xpath_string())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Walks a type's named/reference chain down to the bottom [`TypeDef::Simple`]
/// entry, returning that entry's own [`TypeId`] (as opposed to
/// [`TypeRegistry::resolve_named_type`], which returns the `&SimpleType`
/// itself and discards which id it lives at — callers that need to mutate
/// the resolved entry in place need the id back).
fn terminal_type_id(types: &TypeRegistry, id: crate::types::TypeId) -> crate::types::TypeId {
    let mut cur = id;
    loop {
        match &types.get(cur).def {
            crate::types::TypeDef::Simple(_) => return cur,
            crate::types::TypeDef::Named(n) => cur = n.base,
            crate::types::TypeDef::Reference(r) => cur = *r,
        }
    }
}

/// Looks up a module by name and returns an error carrying the usual
/// diagnostic code instead of `Option::None`; used by the CLI and by
/// `module-loaded()`/`feature-enabled()`.
pub fn require_module(modules: &ModuleTable, name: &str, revision: Option<&str>) -> Result<ModuleId> {
    modules
        .find_by_name(name, revision)
        .ok_or_else(|| Error::fatal(ErrorCode::WrongToken, format!("module '{name}' not loaded")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_module_and_resolves_uses() {
        let mut engine = Engine::new();
        let src = r#"
            module m {
                namespace "urn:m";
                prefix m;
                grouping g {
                    leaf x {
                        type string;
                    }
                }
                container top {
                    uses g;
                }
            }
        "#;
        let module_id = engine.load_module(src, "m").unwrap();
        let module = engine.modules.get(module_id);
        assert_eq!(module.top_level.len(), 1);
        let top = module.top_level[0];
        assert_eq!(engine.schema.get(top).children.len(), 1);
    }

    #[test]
    fn schema_model_top_level_spans_implemented_modules() {
        let mut engine = Engine::new();
        engine
            .load_module(
                r#"module a { namespace "urn:a"; prefix a; container ca { } }"#,
                "a",
            )
            .unwrap();
        engine
            .load_module(
                r#"module b { namespace "urn:b"; prefix b; container cb { } }"#,
                "b",
            )
            .unwrap();
        let model = engine.schema_model();
        assert_eq!(model.top_level().len(), 2);
    }
}
