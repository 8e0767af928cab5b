//
// Copyright (c) The yangtool Contributors
//
// SPDX-License-Identifier: MIT
//

//! The schema builder: turns a parsed [`Stmt`] tree into
//! populated [`SchemaArena`]/[`Module`] contents through the three ordered
//! passes — Parse (this module's `ModuleBuilder`, preserves declaration
//! order), Resolve (named types, `uses`/`augment` targets, leafref paths),
//! Expand (clone `uses` descendants in place, graft `augment` clones onto
//! their resolved target).
//!
//! Resolve and Expand run together, module-by-module, once every statement
//! in the module has been turned into a schema object: `uses`/`augment`
//! targets may live in an already-loaded imported module, but never in one
//! loaded later, so [`crate::engine::Engine::load_module`] calls
//! [`expand_module`] right after parsing completes rather than deferring it
//! to a separate whole-engine pass.

use indexmap::IndexMap;

use crate::module::{ExtensionDef, Grouping, Identity, Import, Include, Module, ModuleId, ModuleTable};
use crate::schema::{
    AugmentPayload, AugmentState, ChoicePayload, ContainerPayload, LeafListPayload, LeafPayload, ListPayload,
    MetaAttr, RpcPayload, SchemaArena, SchemaFlags, SchemaId, SchemaNodeKind, SchemaObject, SchemaPayload,
    UniqueConstraint, UsesPayload, UsesState,
};
use crate::stmt::Stmt;
use crate::types::{BaseKind, EnumOrBit, NamedType, PatternChain, RangeList, SimpleType, TypeDef, TypeId, TypeRegistry};

use crate::error::{Error, ErrorCode, Result};

const DATA_KEYWORDS: &[&str] = &[
    "container",
    "leaf",
    "leaf-list",
    "list",
    "choice",
    "case",
    "anydata",
    "anyxml",
    "uses",
    "augment",
    "rpc",
    "action",
    "notification",
];

/// Parses a module/submodule's header statements (everything except the
/// data-definition/typedef/grouping/feature/identity/extension bodies) into
/// a fresh [`Module`].
pub fn build_module_header(stmt: &Stmt) -> Result<Module> {
    if stmt.keyword != "module" && stmt.keyword != "submodule" {
        return Err(Error::fatal_at(
            ErrorCode::WrongToken,
            format!("expected 'module' or 'submodule', found '{}'", stmt.keyword),
            stmt.pos.clone(),
        ));
    }
    let name = stmt.arg()?.to_string();
    let belongs_to = stmt.child("belongs-to").map(|s| s.arg().map(str::to_string)).transpose()?;
    let namespace = stmt
        .child("namespace")
        .map(|s| s.arg().map(str::to_string))
        .transpose()?
        .unwrap_or_default();
    let prefix = stmt
        .child("prefix")
        .or_else(|| stmt.child("belongs-to").and_then(|b| b.child("prefix")))
        .map(|s| s.arg().map(str::to_string))
        .transpose()?
        .unwrap_or_default();
    let mut module = Module::new(name, namespace, prefix);
    module.belongs_to = belongs_to;
    module.revision = stmt.child("revision").map(|s| s.arg().map(str::to_string)).transpose()?;

    for imp in stmt.children("import") {
        module.imports.push(Import {
            module: imp.arg()?.to_string(),
            prefix: imp
                .child("prefix")
                .map(|s| s.arg().map(str::to_string))
                .transpose()?
                .unwrap_or_default(),
            revision: imp
                .child("revision-date")
                .map(|s| s.arg().map(str::to_string))
                .transpose()?,
        });
    }
    for inc in stmt.children("include") {
        module.includes.push(Include {
            submodule: inc.arg()?.to_string(),
            revision: inc
                .child("revision-date")
                .map(|s| s.arg().map(str::to_string))
                .transpose()?,
        });
    }
    Ok(module)
}

/// Owns the in-progress registries for one module while its body is parsed.
/// The caller merges these back into the real [`Module`] once building
/// finishes (avoids borrowing the module table mutably and immutably at
/// once — imports are resolved by read-only lookups into `table` while the
/// module being built is itself reserved, but not yet populated, in it).
pub struct ModuleBuilder<'a> {
    pub types: &'a mut TypeRegistry,
    pub schema: &'a mut SchemaArena,
    pub table: &'a ModuleTable,
    pub module_id: ModuleId,
    pub module_name: String,
    pub module_prefix: String,
    pub imports: Vec<Import>,
    pub typedefs: IndexMap<String, TypeId>,
    pub groupings: IndexMap<String, Grouping>,
    pub identities: IndexMap<String, Identity>,
    pub features: IndexMap<String, bool>,
    pub extensions: IndexMap<String, ExtensionDef>,
    pub top_level: Vec<SchemaId>,
    pub uses_sites: Vec<SchemaId>,
    pub augment_sites: Vec<SchemaId>,
}

impl<'a> ModuleBuilder<'a> {
    pub fn new(
        types: &'a mut TypeRegistry,
        schema: &'a mut SchemaArena,
        table: &'a ModuleTable,
        module_id: ModuleId,
        module: &Module,
    ) -> Self {
        Self {
            types,
            schema,
            table,
            module_id,
            module_name: module.name.clone(),
            module_prefix: module.prefix.clone(),
            imports: module.imports.clone(),
            typedefs: IndexMap::new(),
            groupings: IndexMap::new(),
            identities: IndexMap::new(),
            features: IndexMap::new(),
            extensions: IndexMap::new(),
            top_level: Vec::new(),
            uses_sites: Vec::new(),
            augment_sites: Vec::new(),
        }
    }

    /// Walks the module/submodule body top to bottom (the "Parse" pass).
    pub fn build_body(&mut self, stmt: &Stmt) -> Result<()> {
        for feat in stmt.children("feature") {
            self.features.insert(feat.arg()?.to_string(), false);
        }
        for id in stmt.children("identity") {
            let bases = id
                .children("base")
                .map(|b| b.arg().map(str::to_string))
                .collect::<Result<Vec<_>>>()?;
            self.identities.insert(
                id.arg()?.to_string(),
                Identity {
                    name: id.arg()?.to_string(),
                    bases,
                },
            );
        }
        for ext in stmt.children("extension") {
            self.extensions.insert(
                ext.arg()?.to_string(),
                ExtensionDef {
                    name: ext.arg()?.to_string(),
                    argument: ext
                        .child("argument")
                        .map(|a| a.arg().map(str::to_string))
                        .transpose()?,
                    yin_element: ext
                        .child("argument")
                        .and_then(|a| a.child("yin-element"))
                        .and_then(|y| y.argument.as_deref())
                        .map(|v| v == "true")
                        .unwrap_or(false),
                },
            );
        }
        for td in stmt.children("typedef") {
            let type_id = self.build_typedef(td)?;
            self.typedefs.insert(td.arg()?.to_string(), type_id);
        }
        for grp in stmt.children("grouping") {
            let children = self.build_children(grp, None)?;
            self.groupings.insert(
                grp.arg()?.to_string(),
                Grouping {
                    name: grp.arg()?.to_string(),
                    children,
                },
            );
        }
        for def in stmt.substatements.iter().filter(|s| DATA_KEYWORDS.contains(&s.keyword.as_str())) {
            if let Some(id) = self.build_data_stmt(def, None, true)? {
                if self.schema.get(id).kind.is_data_node() {
                    self.top_level.push(id);
                }
            }
        }
        Ok(())
    }

    // ---- type building -------------------------------------------------

    fn build_typedef(&mut self, stmt: &Stmt) -> Result<TypeId> {
        let type_stmt = stmt
            .child("type")
            .ok_or_else(|| Error::fatal_at(ErrorCode::WrongToken, "typedef requires a 'type' substatement", stmt.pos.clone()))?;
        let base_id = self.build_type_stmt(type_stmt)?;
        let default = stmt.child("default").map(|s| s.arg().map(str::to_string)).transpose()?;
        let id = self.types.insert(
            Some(stmt.arg()?.to_string()),
            Some(self.module_id),
            TypeDef::Named(NamedType {
                base: base_id,
                override_range: None,
                override_length: None,
                override_patterns: None,
                override_default: default,
            }),
        );
        Ok(id)
    }

    fn build_type_stmt(&mut self, stmt: &Stmt) -> Result<TypeId> {
        let raw = stmt.arg()?;
        if let Some(base) = BaseKind::from_keyword(raw) {
            return self.build_simple_type(stmt, base);
        }
        self.resolve_named_type_ref(raw, &stmt.pos)
    }

    fn resolve_named_type_ref(&self, raw: &str, pos: &crate::error::Position) -> Result<TypeId> {
        let (prefix, local) = split_prefixed(raw);
        match prefix {
            None => self
                .typedefs
                .get(local)
                .copied()
                .ok_or_else(|| Error::fatal_at(ErrorCode::WrongToken, format!("unknown type '{raw}'"), pos.clone())),
            Some(p) if p == self.module_prefix => self
                .typedefs
                .get(local)
                .copied()
                .ok_or_else(|| Error::fatal_at(ErrorCode::WrongToken, format!("unknown type '{raw}'"), pos.clone())),
            Some(p) => {
                let imp = self
                    .imports
                    .iter()
                    .find(|i| i.prefix == p)
                    .ok_or_else(|| Error::fatal_at(ErrorCode::UnknownPrefix, format!("unknown prefix '{p}'"), pos.clone()))?;
                let mod_id = self
                    .table
                    .find_by_name(&imp.module, imp.revision.as_deref())
                    .ok_or_else(|| Error::fatal_at(ErrorCode::WrongToken, format!("imported module '{}' not loaded", imp.module), pos.clone()))?;
                self.table
                    .get(mod_id)
                    .typedefs
                    .get(local)
                    .copied()
                    .ok_or_else(|| Error::fatal_at(ErrorCode::WrongToken, format!("unknown type '{raw}'"), pos.clone()))
            }
        }
    }

    fn build_simple_type(&mut self, stmt: &Stmt, base: BaseKind) -> Result<TypeId> {
        let mut simple = SimpleType {
            base,
            range: None,
            length: None,
            patterns: PatternChain::default(),
            enum_values: Vec::new(),
            is_bits: false,
            fraction_digits: None,
            leafref_path: None,
            leafref_target: None,
            leafref_require_instance: true,
            identity_base: None,
            union_members: Vec::new(),
        };
        if let Some(r) = stmt.child("range") {
            simple.range = Some(RangeList::parse(r.arg()?, base)?);
        }
        if let Some(l) = stmt.child("length") {
            simple.length = Some(RangeList::parse(l.arg()?, BaseKind::String)?);
        }
        for p in stmt.children("pattern") {
            let inverted = p
                .child("modifier")
                .and_then(|m| m.argument.as_deref())
                .map(|v| v == "invert-match")
                .unwrap_or(false);
            simple.patterns.push(p.arg()?, inverted)?;
        }
        if base == BaseKind::Decimal64 {
            let digits = stmt
                .child("fraction-digits")
                .ok_or_else(|| Error::fatal_at(ErrorCode::WrongToken, "decimal64 requires 'fraction-digits'", stmt.pos.clone()))?;
            simple.fraction_digits = Some(digits.arg()?.parse().map_err(|_| {
                Error::fatal_at(ErrorCode::WrongToken, "invalid fraction-digits", stmt.pos.clone())
            })?);
        }
        if matches!(base, BaseKind::Enumeration) {
            for (i, e) in stmt.children("enum").enumerate() {
                let position = e
                    .child("value")
                    .map(|v| v.arg().map(str::to_string))
                    .transpose()?
                    .map(|v| v.parse::<i64>())
                    .transpose()
                    .map_err(|_| Error::fatal_at(ErrorCode::WrongToken, "invalid enum value", e.pos.clone()))?
                    .unwrap_or(i as i64);
                simple.enum_values.push(EnumOrBit {
                    name: e.arg()?.to_string(),
                    position,
                });
            }
        }
        if matches!(base, BaseKind::Bits) {
            simple.is_bits = true;
            for (i, b) in stmt.children("bit").enumerate() {
                let position = b
                    .child("position")
                    .map(|v| v.arg().map(str::to_string))
                    .transpose()?
                    .map(|v| v.parse::<i64>())
                    .transpose()
                    .map_err(|_| Error::fatal_at(ErrorCode::WrongToken, "invalid bit position", b.pos.clone()))?
                    .unwrap_or(i as i64);
                simple.enum_values.push(EnumOrBit {
                    name: b.arg()?.to_string(),
                    position,
                });
            }
        }
        if base == BaseKind::Leafref {
            let path = stmt
                .child("path")
                .ok_or_else(|| Error::fatal_at(ErrorCode::WrongToken, "leafref requires a 'path' substatement", stmt.pos.clone()))?;
            simple.leafref_path = Some(path.arg()?.to_string());
            simple.leafref_require_instance = stmt
                .child("require-instance")
                .and_then(|r| r.argument.as_deref())
                .map(|v| v == "true")
                .unwrap_or(true);
        }
        if base == BaseKind::IdentityRef {
            let b = stmt
                .child("base")
                .ok_or_else(|| Error::fatal_at(ErrorCode::WrongToken, "identityref requires a 'base' substatement", stmt.pos.clone()))?;
            simple.identity_base = Some(b.arg()?.to_string());
        }
        if base == BaseKind::Union {
            for member in stmt.children("type") {
                simple.union_members.push(self.build_type_stmt(member)?);
            }
            self.types.validate_union(&simple.union_members)?;
        }
        Ok(self.types.insert(None, Some(self.module_id), TypeDef::Simple(simple)))
    }

    // ---- data-definition tree -------------------------------------------

    fn build_children(&mut self, stmt: &Stmt, parent: Option<SchemaId>) -> Result<Vec<SchemaId>> {
        let mut out = Vec::new();
        for def in stmt.substatements.iter().filter(|s| DATA_KEYWORDS.contains(&s.keyword.as_str())) {
            if let Some(id) = self.build_data_stmt(def, parent, false)? {
                out.push(id);
            }
        }
        Ok(out)
    }

    fn common_fields(&self, stmt: &Stmt) -> Result<(Option<String>, Vec<String>, Vec<String>, Vec<MetaAttr>)> {
        let when = stmt.child("when").map(|s| s.arg().map(str::to_string)).transpose()?;
        let musts = stmt
            .children("must")
            .map(|s| s.arg().map(str::to_string))
            .collect::<Result<Vec<_>>>()?;
        let if_features = stmt
            .children("if-feature")
            .map(|s| s.arg().map(str::to_string))
            .collect::<Result<Vec<_>>>()?;
        let metadata = stmt
            .substatements
            .iter()
            .filter(|s| s.prefix.is_some())
            .map(|s| MetaAttr {
                name: s.keyword.clone(),
                value: s.argument.clone().unwrap_or_default(),
            })
            .collect();
        Ok((when, musts, if_features, metadata))
    }

    fn build_data_stmt(&mut self, stmt: &Stmt, parent: Option<SchemaId>, top_level: bool) -> Result<Option<SchemaId>> {
        let (when, musts, if_features, metadata) = self.common_fields(stmt)?;
        let parent_config = parent.map(|p| self.schema.get(p).is_config()).unwrap_or(true);
        let config = stmt
            .child("config")
            .and_then(|c| c.argument.as_deref())
            .map(|v| v == "true")
            .unwrap_or(parent_config);
        let mut flags = SchemaFlags::empty();
        flags.set(SchemaFlags::IS_CONFIG, config);
        flags.set(SchemaFlags::TOP_LEVEL, top_level);
        if stmt
            .child("mandatory")
            .and_then(|m| m.argument.as_deref())
            .map(|v| v == "true")
            .unwrap_or(false)
        {
            flags.insert(SchemaFlags::MANDATORY_SET);
        }

        let (kind, payload, name) = match stmt.keyword.as_str() {
            "container" => {
                let presence = stmt.child("presence").map(|s| s.arg().map(str::to_string)).transpose()?;
                flags.set(SchemaFlags::NP_CONTAINER, presence.is_none());
                (SchemaNodeKind::Container, SchemaPayload::Container(ContainerPayload { presence }), stmt.arg()?.to_string())
            }
            "leaf" => {
                let type_id = self.build_type_stmt(stmt.child("type").ok_or_else(|| {
                    Error::fatal_at(ErrorCode::WrongToken, "leaf requires a 'type' substatement", stmt.pos.clone())
                })?)?;
                let default = stmt.child("default").map(|s| s.arg().map(str::to_string)).transpose()?;
                let units = stmt.child("units").map(|s| s.arg().map(str::to_string)).transpose()?;
                (SchemaNodeKind::Leaf, SchemaPayload::Leaf(LeafPayload { type_id, default, units }), stmt.arg()?.to_string())
            }
            "leaf-list" => {
                let type_id = self.build_type_stmt(stmt.child("type").ok_or_else(|| {
                    Error::fatal_at(ErrorCode::WrongToken, "leaf-list requires a 'type' substatement", stmt.pos.clone())
                })?)?;
                let defaults = stmt
                    .children("default")
                    .map(|s| s.arg().map(str::to_string))
                    .collect::<Result<Vec<_>>>()?;
                let (min_elements, max_elements) = parse_cardinality(stmt)?;
                let user_ordered = is_user_ordered(stmt);
                (
                    SchemaNodeKind::LeafList,
                    SchemaPayload::LeafList(LeafListPayload { type_id, defaults, min_elements, max_elements, user_ordered }),
                    stmt.arg()?.to_string(),
                )
            }
            "list" => {
                let keys = stmt
                    .child("key")
                    .map(|k| k.arg().map(|a| a.split_whitespace().map(str::to_string).collect()))
                    .transpose()?
                    .unwrap_or_default();
                let unique = stmt
                    .children("unique")
                    .map(|u| u.arg().map(|a| UniqueConstraint { leafs: a.split_whitespace().map(str::to_string).collect() }))
                    .collect::<Result<Vec<_>>>()?;
                let (min_elements, max_elements) = parse_cardinality(stmt)?;
                let user_ordered = is_user_ordered(stmt);
                (
                    SchemaNodeKind::List,
                    SchemaPayload::List(ListPayload { keys, unique, min_elements, max_elements, user_ordered }),
                    stmt.arg()?.to_string(),
                )
            }
            "choice" => {
                let default_case = stmt.child("default").map(|s| s.arg().map(str::to_string)).transpose()?;
                (SchemaNodeKind::Choice, SchemaPayload::Choice(ChoicePayload { default_case }), stmt.arg()?.to_string())
            }
            "case" => (SchemaNodeKind::Case, SchemaPayload::Case, stmt.arg()?.to_string()),
            "anydata" | "anyxml" => (SchemaNodeKind::AnyData, SchemaPayload::AnyData, stmt.arg()?.to_string()),
            "rpc" => (SchemaNodeKind::Rpc, SchemaPayload::Rpc(RpcPayload { input: None, output: None }), stmt.arg()?.to_string()),
            "action" => (SchemaNodeKind::Action, SchemaPayload::Action(RpcPayload { input: None, output: None }), stmt.arg()?.to_string()),
            "notification" => (SchemaNodeKind::Notification, SchemaPayload::Notification, stmt.arg()?.to_string()),
            "uses" => {
                let (grouping_prefix, grouping_name) = split_prefixed_owned(stmt.arg()?);
                (
                    SchemaNodeKind::Uses,
                    SchemaPayload::Uses(UsesPayload { grouping_name, grouping_prefix, state: UsesState::Pending }),
                    stmt.arg()?.to_string(),
                )
            }
            "augment" => (
                SchemaNodeKind::Augment,
                SchemaPayload::Augment(AugmentPayload {
                    target_path: stmt.arg()?.to_string(),
                    resolved_target: None,
                    state: AugmentState::Pending,
                }),
                stmt.arg()?.to_string(),
            ),
            other => {
                return Err(Error::fatal_at(ErrorCode::WrongToken, format!("unsupported data-definition statement '{other}'"), stmt.pos.clone()))
            }
        };

        let id = self.schema.insert(SchemaObject {
            name,
            parent,
            children: Vec::new(),
            module: self.module_id,
            flags,
            when,
            if_features,
            musts,
            inherited_when: Vec::new(),
            inherited_if_features: Vec::new(),
            metadata,
            kind,
            payload,
            clone_source: None,
        });
        if let Some(p) = parent {
            self.schema.get_mut(p).children.push(id);
        }

        let children = match stmt.keyword.as_str() {
            "rpc" | "action" => {
                let mut kids = Vec::new();
                if let Some(input) = stmt.child("input") {
                    let in_id = self.schema.insert(blank_io(self.module_id, input, true));
                    self.schema.get_mut(in_id).children = self.build_children(input, Some(in_id))?;
                    self.schema.get_mut(id).children.push(in_id);
                    set_rpc_input(&mut self.schema.get_mut(id).payload, in_id);
                    kids.push(in_id);
                }
                if let Some(output) = stmt.child("output") {
                    let out_id = self.schema.insert(blank_io(self.module_id, output, false));
                    self.schema.get_mut(out_id).children = self.build_children(output, Some(out_id))?;
                    self.schema.get_mut(id).children.push(out_id);
                    set_rpc_output(&mut self.schema.get_mut(id).payload, out_id);
                    kids.push(out_id);
                }
                kids
            }
            "uses" => {
                self.uses_sites.push(id);
                Vec::new()
            }
            "augment" => {
                let kids = self.build_children(stmt, Some(id))?;
                self.augment_sites.push(id);
                kids
            }
            _ => self.build_children(stmt, Some(id))?,
        };
        if stmt.keyword != "rpc" && stmt.keyword != "action" {
            self.schema.get_mut(id).children = children;
        }
        self.schema.recompute_mandatory(id);
        if matches!(kind, SchemaNodeKind::List) {
            let mut key_ids = Vec::new();
            self.schema.walk_keys(id, |key_id| key_ids.push(key_id));
            for key_id in key_ids {
                self.schema.get_mut(key_id).flags.insert(SchemaFlags::KEY_LEAF);
            }
        }
        Ok(Some(id))
    }
}

fn blank_io(module: ModuleId, _stmt: &Stmt, is_input: bool) -> SchemaObject {
    SchemaObject {
        name: if is_input { "input".to_string() } else { "output".to_string() },
        parent: None,
        children: Vec::new(),
        module,
        flags: SchemaFlags::IS_CONFIG,
        when: None,
        if_features: Vec::new(),
        musts: Vec::new(),
        inherited_when: Vec::new(),
        inherited_if_features: Vec::new(),
        metadata: Vec::new(),
        kind: if is_input { SchemaNodeKind::Input } else { SchemaNodeKind::Output },
        payload: if is_input { SchemaPayload::Input } else { SchemaPayload::Output },
        clone_source: None,
    }
}

fn set_rpc_input(payload: &mut SchemaPayload, in_id: SchemaId) {
    match payload {
        SchemaPayload::Rpc(rpc) | SchemaPayload::Action(rpc) => rpc.input = Some(in_id),
        _ => {}
    }
}

fn set_rpc_output(payload: &mut SchemaPayload, out_id: SchemaId) {
    match payload {
        SchemaPayload::Rpc(rpc) | SchemaPayload::Action(rpc) => rpc.output = Some(out_id),
        _ => {}
    }
}

fn parse_cardinality(stmt: &Stmt) -> Result<(u32, Option<u32>)> {
    let min = stmt
        .child("min-elements")
        .map(|s| s.arg().map(str::to_string))
        .transpose()?
        .map(|v| v.parse::<u32>())
        .transpose()
        .map_err(|_| Error::fatal_at(ErrorCode::WrongToken, "invalid min-elements", stmt.pos.clone()))?
        .unwrap_or(0);
    let max = match stmt.child("max-elements").map(|s| s.arg()).transpose()? {
        Some("unbounded") | None => None,
        Some(v) => Some(v.parse::<u32>().map_err(|_| Error::fatal_at(ErrorCode::WrongToken, "invalid max-elements", stmt.pos.clone()))?),
    };
    Ok((min, max))
}

fn is_user_ordered(stmt: &Stmt) -> bool {
    stmt.child("ordered-by").and_then(|s| s.argument.as_deref()) == Some("user")
}

fn split_prefixed(raw: &str) -> (Option<&str>, &str) {
    match raw.split_once(':') {
        Some((p, l)) if !p.is_empty() => (Some(p), l),
        _ => (None, raw),
    }
}

fn split_prefixed_owned(raw: &str) -> (Option<String>, String) {
    let (p, l) = split_prefixed(raw);
    (p.map(str::to_string), l.to_string())
}

/// Expand pass: resolves and grafts every `uses`/`augment` site recorded
/// while this module's body was parsed.
pub fn expand_module(
    schema: &mut SchemaArena,
    table: &ModuleTable,
    module_id: ModuleId,
    uses_sites: &[SchemaId],
    augment_sites: &[SchemaId],
) -> Result<()> {
    for &uses_id in uses_sites {
        expand_uses(schema, table, module_id, uses_id)?;
    }
    for &aug_id in augment_sites {
        expand_augment(schema, table, module_id, aug_id)?;
    }
    Ok(())
}

fn lookup_grouping<'t>(
    table: &'t ModuleTable,
    module_id: ModuleId,
    prefix: &Option<String>,
    name: &str,
) -> Result<&'t Grouping> {
    let owning = match prefix {
        None => module_id,
        Some(p) if *p == table.get(module_id).prefix => module_id,
        Some(p) => {
            let imp = table
                .get(module_id)
                .imports
                .iter()
                .find(|i| i.prefix == *p)
                .ok_or_else(|| Error::fatal(ErrorCode::UnknownPrefix, format!("unknown prefix '{p}' in uses")))?;
            table
                .find_by_name(&imp.module, imp.revision.as_deref())
                .ok_or_else(|| Error::fatal(ErrorCode::WrongToken, format!("imported module '{}' not loaded", imp.module)))?
        }
    };
    table
        .get(owning)
        .groupings
        .get(name)
        .ok_or_else(|| Error::fatal(ErrorCode::WrongToken, format!("unknown grouping '{name}'")))
}

fn expand_uses(schema: &mut SchemaArena, table: &ModuleTable, module_id: ModuleId, uses_id: SchemaId) -> Result<()> {
    let (grouping_prefix, grouping_name) = match &schema.get(uses_id).payload {
        SchemaPayload::Uses(u) => (u.grouping_prefix.clone(), u.grouping_name.clone()),
        _ => return Ok(()),
    };
    let grouping = lookup_grouping(table, module_id, &grouping_prefix, &grouping_name)?;
    let template_children = grouping.children.clone();
    let parent = schema.get(uses_id).parent;

    let cloned: Vec<SchemaId> = template_children
        .into_iter()
        .map(|src| schema.clone_subtree(src, parent, SchemaFlags::CLONED_FROM_USES))
        .collect();

    if let Some(p) = parent {
        let siblings = &mut schema.get_mut(p).children;
        let pos = siblings.iter().position(|&c| c == uses_id).unwrap();
        siblings.splice(pos..pos + 1, cloned);
    }
    if let SchemaPayload::Uses(u) = &mut schema.get_mut(uses_id).payload {
        u.state = UsesState::Expanded;
    }
    schema.get_mut(uses_id).flags.insert(SchemaFlags::MARKED_FOR_DELETION);
    Ok(())
}

/// Resolves a `/prefix:a/prefix:b` style schema path (the subset legal for
/// `augment`/`leafref` targets — no predicates, every step a prefixed
/// QName) by walking [`SchemaArena::find_child`] from either the document's
/// module top-levels (absolute) or a starting node (relative, `..` steps
/// climb via `parent`).
pub fn resolve_schema_path(
    schema: &SchemaArena,
    table: &ModuleTable,
    module_id: ModuleId,
    start: Option<SchemaId>,
    path: &str,
) -> Result<SchemaId> {
    let absolute = path.starts_with('/');
    let mut steps = path.trim_start_matches('/').split('/').filter(|s| !s.is_empty());

    let mut current: Option<SchemaId> = if absolute { None } else { start };
    let mut first = true;
    for step in &mut steps {
        if step == ".." {
            current = current.and_then(|c| schema.parent(c));
            continue;
        }
        let (prefix, name) = split_prefixed(step);
        let owning = match prefix {
            Some(p) if p == table.get(module_id).prefix => module_id,
            Some(p) => {
                let imp = table
                    .get(module_id)
                    .imports
                    .iter()
                    .find(|i| i.prefix == p)
                    .ok_or_else(|| Error::fatal(ErrorCode::UnknownPrefix, format!("unknown prefix '{p}' in path")))?;
                table
                    .find_by_name(&imp.module, imp.revision.as_deref())
                    .ok_or_else(|| Error::fatal(ErrorCode::WrongToken, format!("imported module '{}' not loaded", imp.module)))?
            }
            None => module_id,
        };
        current = match current {
            None if first && absolute => table
                .get(owning)
                .top_level
                .iter()
                .copied()
                .find(|&id| schema.get(id).name == name),
            Some(c) => schema.find_child(c, name, false, false),
            None => None,
        };
        first = false;
        if current.is_none() {
            return Err(Error::fatal(ErrorCode::WrongToken, format!("path step '{step}' did not resolve")));
        }
    }
    current.ok_or_else(|| Error::fatal(ErrorCode::WrongToken, "empty schema path"))
}

fn expand_augment(schema: &mut SchemaArena, table: &ModuleTable, module_id: ModuleId, aug_id: SchemaId) -> Result<()> {
    let target_path = match &schema.get(aug_id).payload {
        SchemaPayload::Augment(a) => a.target_path.clone(),
        _ => return Ok(()),
    };
    let target = resolve_schema_path(schema, table, module_id, None, &target_path)?;
    let template_children = schema.get(aug_id).children.clone();
    let cloned: Vec<SchemaId> = template_children
        .into_iter()
        .map(|src| schema.clone_subtree(src, Some(target), SchemaFlags::CLONED_FROM_AUGMENT))
        .collect();
    schema.get_mut(target).children.extend(cloned);
    if let SchemaPayload::Augment(a) = &mut schema.get_mut(aug_id).payload {
        a.resolved_target = Some(target);
        a.state = AugmentState::Grafted;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stmt::parse_module_text;

    fn build(src: &str) -> (ModuleTable, ModuleId, SchemaArena, TypeRegistry) {
        let stmt = parse_module_text(src, "m").unwrap();
        let header = build_module_header(&stmt).unwrap();
        let mut table = ModuleTable::new();
        let module_id = ModuleId(table.len() as u32);
        table.insert(header.clone()).unwrap();
        let mut schema = SchemaArena::new();
        let mut types = TypeRegistry::new();
        let (top_level, groupings, features, typedefs, uses_sites, augment_sites) = {
            let mut builder = ModuleBuilder::new(&mut types, &mut schema, &table, module_id, &header);
            builder.build_body(&stmt).unwrap();
            (
                builder.top_level.clone(),
                builder.groupings.clone(),
                builder.features.clone(),
                builder.typedefs.clone(),
                builder.uses_sites.clone(),
                builder.augment_sites.clone(),
            )
        };
        {
            let m = table.get_mut(module_id);
            m.top_level = top_level;
            m.groupings = groupings;
            m.features = features;
            m.typedefs = typedefs;
        }
        expand_module(&mut schema, &table, module_id, &uses_sites, &augment_sites).unwrap();
        (table, module_id, schema, types)
    }

    #[test]
    fn builds_container_leaf_tree() {
        let src = r#"
            module m {
                namespace "urn:m";
                prefix m;
                container top {
                    leaf name {
                        type string;
                    }
                }
            }
        "#;
        let (table, module_id, schema, _types) = build(src);
        let top = table.get(module_id).top_level[0];
        assert_eq!(schema.get(top).name, "top");
        let leaf = schema.get(top).children[0];
        assert_eq!(schema.get(leaf).name, "name");
        assert!(matches!(schema.get(leaf).kind, SchemaNodeKind::Leaf));
    }

    #[test]
    fn uses_expands_grouping_children_in_place() {
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
        let (table, module_id, schema, _types) = build(src);
        let top = table.get(module_id).top_level[0];
        let children = &schema.get(top).children;
        assert_eq!(children.len(), 1);
        assert_eq!(schema.get(children[0]).name, "x");
    }

    #[test]
    fn augment_grafts_onto_target() {
        let src = r#"
            module m {
                namespace "urn:m";
                prefix m;
                container top { }
                augment "/m:top" {
                    leaf added {
                        type string;
                    }
                }
            }
        "#;
        let (table, module_id, schema, _types) = build(src);
        let top = table.get(module_id).top_level[0];
        assert_eq!(schema.get(top).children.len(), 1);
        assert_eq!(schema.get(schema.get(top).children[0]).name, "added");
    }

    #[test]
    fn list_keys_get_tagged() {
        let src = r#"
            module m {
                namespace "urn:m";
                prefix m;
                container top {
                    list entry {
                        key "id";
                        leaf id {
                            type string;
                        }
                        leaf value {
                            type string;
                        }
                    }
                }
            }
        "#;
        let (table, module_id, schema, _types) = build(src);
        let top = table.get(module_id).top_level[0];
        let list = schema.get(top).children[0];
        let id_leaf = schema.find_child(list, "id", false, true).unwrap();
        assert!(schema.get(id_leaf).flags.contains(SchemaFlags::KEY_LEAF));
    }
}
