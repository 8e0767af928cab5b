//
// Copyright (c) The yangtool Contributors
//
// SPDX-License-Identifier: MIT
//

//! The module table: name/revision and namespace lookup for loaded
//! modules, plus the session registry that shares its lookup shape.

use indexmap::IndexMap;

use crate::error::{Error, ErrorCode, Result, WarningCounters};
use crate::schema::SchemaId;
use crate::types::TypeId;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ModuleId(pub u32);

/// A `grouping` definition: its name plus the top-level schema ids that
/// form its template subtree (cloned wholesale on every `uses`).
#[derive(Clone, Debug)]
pub struct Grouping {
    pub name: String,
    pub children: Vec<SchemaId>,
}

/// An `identity` definition (for `identityref` base-chain checks).
#[derive(Clone, Debug)]
pub struct Identity {
    pub name: String,
    pub bases: Vec<String>,
}

/// An `extension` statement definition.
#[derive(Clone, Debug)]
pub struct ExtensionDef {
    pub name: String,
    pub argument: Option<String>,
    pub yin_element: bool,
}

#[derive(Clone, Debug)]
pub struct Import {
    pub module: String,
    pub prefix: String,
    pub revision: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Include {
    pub submodule: String,
    pub revision: Option<String>,
}

/// A YANG module or submodule.
#[derive(Clone, Debug)]
pub struct Module {
    pub name: String,
    pub revision: Option<String>,
    pub namespace: String,
    pub prefix: String,
    /// `Some(main_module)` for a submodule's `belongs-to`.
    pub belongs_to: Option<String>,
    pub imports: Vec<Import>,
    pub includes: Vec<Include>,
    pub features: IndexMap<String, bool>,
    pub extensions: IndexMap<String, ExtensionDef>,
    pub groupings: IndexMap<String, Grouping>,
    pub identities: IndexMap<String, Identity>,
    pub typedefs: IndexMap<String, TypeId>,
    pub top_level: Vec<SchemaId>,
    pub implemented: bool,
    pub warnings: WarningCounters,
    pub valid: bool,
}

impl Module {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            revision: None,
            namespace: namespace.into(),
            prefix: prefix.into(),
            belongs_to: None,
            imports: Vec::new(),
            includes: Vec::new(),
            features: IndexMap::new(),
            extensions: IndexMap::new(),
            groupings: IndexMap::new(),
            identities: IndexMap::new(),
            typedefs: IndexMap::new(),
            top_level: Vec::new(),
            implemented: true,
            warnings: WarningCounters::default(),
            valid: true,
        }
    }

    pub fn feature_enabled(&self, name: &str) -> bool {
        self.features.get(name).copied().unwrap_or(false)
    }

    pub fn bump_warning(&mut self, kind: crate::error::WarningKind) {
        self.warnings.bump(kind);
    }
}

/// A minimal session control block. The session table shares its lookup
/// shape with the schema registry, but the session manager itself (SSH/TLS
/// transport, `<copy-config>`/`<commit>` handling) lives outside this
/// crate.
#[derive(Clone, Debug)]
pub struct SessionControlBlock {
    pub id: u32,
    pub peer: String,
    pub open: bool,
}

/// The per-engine module table.
#[derive(Debug, Default)]
pub struct ModuleTable {
    modules: Vec<Module>,
    by_name_rev: IndexMap<(String, Option<String>), ModuleId>,
    by_namespace: IndexMap<String, ModuleId>,
    sessions: IndexMap<u32, SessionControlBlock>,
}

impl ModuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, module: Module) -> Result<ModuleId> {
        let key = (module.name.clone(), module.revision.clone());
        if self.by_name_rev.contains_key(&key) {
            return Err(Error::fatal(
                ErrorCode::InternalMemory,
                format!(
                    "module '{}' (revision {:?}) already loaded",
                    module.name, module.revision
                ),
            ));
        }
        let id = ModuleId(self.modules.len() as u32);
        self.by_name_rev.insert(key, id);
        self.by_namespace.insert(module.namespace.clone(), id);
        self.modules.push(module);
        Ok(id)
    }

    pub fn get(&self, id: ModuleId) -> &Module {
        &self.modules[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id.0 as usize]
    }

    pub fn find_by_name(&self, name: &str, revision: Option<&str>) -> Option<ModuleId> {
        match revision {
            Some(rev) => self
                .by_name_rev
                .get(&(name.to_string(), Some(rev.to_string())))
                .copied(),
            None => self
                .by_name_rev
                .iter()
                .filter(|((n, _), _)| n == name)
                .max_by_key(|((_, rev), _)| rev.clone())
                .map(|(_, id)| *id),
        }
    }

    pub fn find_by_namespace(&self, ns: &str) -> Option<ModuleId> {
        self.by_namespace.get(ns).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModuleId, &Module)> {
        self.modules
            .iter()
            .enumerate()
            .map(|(i, m)| (ModuleId(i as u32), m))
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn add_session(&mut self, id: u32, peer: impl Into<String>) -> Result<()> {
        if self.sessions.contains_key(&id) {
            return Err(Error::fatal(
                ErrorCode::InternalMemory,
                format!("session {id} already registered"),
            ));
        }
        self.sessions.insert(
            id,
            SessionControlBlock {
                id,
                peer: peer.into(),
                open: true,
            },
        );
        Ok(())
    }

    pub fn session(&self, id: u32) -> Option<&SessionControlBlock> {
        self.sessions.get(&id)
    }

    pub fn close_session(&mut self, id: u32) {
        if let Some(s) = self.sessions.get_mut(&id) {
            s.open = false;
        }
    }
}
