//
// Copyright (c) The yangtool Contributors
//
// SPDX-License-Identifier: MIT
//

//! The schema tree: object templates for every YANG data-definition
//! statement, addressed by arena index rather than raw pointer. Parent,
//! sibling, and clone-source links are all index back-references, so the
//! tree can hold cycles (an augment pointing back up the tree it augments)
//! without any unsafe aliasing.

use bitflags::bitflags;
use indexmap::IndexMap;

use crate::error::{Error, ErrorCode, Result};
use crate::module::ModuleId;
use crate::types::TypeId;

/// Opaque handle into a [`SchemaArena`]. Stands in for the parent,
/// clone-source, augment-target, and leafref-target back-pointers that the
/// original design expressed as raw pointers.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SchemaId(pub u32);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SchemaNodeKind {
    Container,
    Case,
    Choice,
    Leaf,
    LeafList,
    List,
    AnyData,
    Rpc,
    Input,
    Output,
    Action,
    Notification,
    /// A `uses` placeholder; replaced in-place by clones of its grouping's
    /// children once the Expand pass runs.
    Uses,
    /// An `augment` template; its children are grafted onto the resolved
    /// target and the node itself never appears in any data walk.
    Augment,
}

impl SchemaNodeKind {
    pub fn is_data_node(&self) -> bool {
        !matches!(self, SchemaNodeKind::Uses | SchemaNodeKind::Augment)
    }
}

bitflags! {
    /// The schema object's flags word.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct SchemaFlags: u32 {
        const IS_CONFIG            = 1 << 0;
        const MANDATORY_SET         = 1 << 1;
        const MANDATORY             = 1 << 2;
        const TOP_LEVEL             = 1 << 3;
        const CLONED_FROM_USES      = 1 << 4;
        const CLONED_FROM_AUGMENT   = 1 << 5;
        const MARKED_FOR_DELETION   = 1 << 6;
        const KEY_LEAF              = 1 << 7;
        const ABSTRACT              = 1 << 8;
        const HIDDEN                = 1 << 9;
        const PASSWORD              = 1 << 10;
        const XPATH_STRING          = 1 << 11;
        const SCHEMA_INSTANCE_STRING = 1 << 12;
        const SECURE                = 1 << 13;
        const VERY_SECURE           = 1 << 14;
        const BLOCK_CREATE          = 1 << 15;
        const BLOCK_UPDATE          = 1 << 16;
        const BLOCK_DELETE          = 1 << 17;
        const NP_CONTAINER          = 1 << 18;
        const USER_ORDERED          = 1 << 19;
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UsesState {
    Pending,
    Resolved,
    Expanded,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AugmentState {
    Pending,
    Resolved,
    Grafted,
}

#[derive(Clone, Debug)]
pub struct MetaAttr {
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug, Default)]
pub struct UniqueConstraint {
    pub leafs: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct LeafPayload {
    pub type_id: TypeId,
    pub default: Option<String>,
    pub units: Option<String>,
}

#[derive(Clone, Debug)]
pub struct LeafListPayload {
    pub type_id: TypeId,
    pub defaults: Vec<String>,
    pub min_elements: u32,
    pub max_elements: Option<u32>,
    pub user_ordered: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ListPayload {
    pub keys: Vec<String>,
    pub unique: Vec<UniqueConstraint>,
    pub min_elements: u32,
    pub max_elements: Option<u32>,
    pub user_ordered: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ContainerPayload {
    pub presence: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ChoicePayload {
    pub default_case: Option<String>,
}

#[derive(Clone, Debug)]
pub struct UsesPayload {
    pub grouping_name: String,
    pub grouping_prefix: Option<String>,
    pub state: UsesState,
}

#[derive(Clone, Debug)]
pub struct AugmentPayload {
    pub target_path: String,
    pub resolved_target: Option<SchemaId>,
    pub state: AugmentState,
}

#[derive(Clone, Debug)]
pub struct RpcPayload {
    pub input: Option<SchemaId>,
    pub output: Option<SchemaId>,
}

#[derive(Clone, Debug)]
pub enum SchemaPayload {
    Leaf(LeafPayload),
    LeafList(LeafListPayload),
    List(ListPayload),
    Container(ContainerPayload),
    Choice(ChoicePayload),
    Case,
    AnyData,
    Uses(UsesPayload),
    Augment(AugmentPayload),
    Rpc(RpcPayload),
    Input,
    Output,
    Action(RpcPayload),
    Notification,
}

/// One schema-definition-node instance, kept in a [`SchemaArena`].
#[derive(Clone, Debug)]
pub struct SchemaObject {
    pub name: String,
    pub parent: Option<SchemaId>,
    pub children: Vec<SchemaId>,
    pub module: ModuleId,
    pub flags: SchemaFlags,
    pub when: Option<String>,
    pub if_features: Vec<String>,
    pub musts: Vec<String>,
    /// `when`/`if-feature` pointers inherited from an enclosing `uses` or
    /// `augment`, stored as weak back-pointers to the original statement
    /// node rather than copied text.
    pub inherited_when: Vec<SchemaId>,
    pub inherited_if_features: Vec<SchemaId>,
    pub metadata: Vec<MetaAttr>,
    pub kind: SchemaNodeKind,
    pub payload: SchemaPayload,
    /// Weak back-pointer to the grouping/augment-template node this one was
    /// cloned from, kept for diagnostics only.
    pub clone_source: Option<SchemaId>,
}

impl SchemaObject {
    pub fn is_config(&self) -> bool {
        self.flags.contains(SchemaFlags::IS_CONFIG)
    }

    pub fn is_mandatory(&self) -> bool {
        self.flags.contains(SchemaFlags::MANDATORY)
    }

    pub fn is_np_container(&self) -> bool {
        matches!(self.kind, SchemaNodeKind::Container)
            && self.flags.contains(SchemaFlags::NP_CONTAINER)
    }

    pub fn leaf(&self) -> Option<&LeafPayload> {
        match &self.payload {
            SchemaPayload::Leaf(l) => Some(l),
            _ => None,
        }
    }

    pub fn leaf_list(&self) -> Option<&LeafListPayload> {
        match &self.payload {
            SchemaPayload::LeafList(l) => Some(l),
            _ => None,
        }
    }

    pub fn list(&self) -> Option<&ListPayload> {
        match &self.payload {
            SchemaPayload::List(l) => Some(l),
            _ => None,
        }
    }
}

/// The arena owning every [`SchemaObject`] across every loaded module.
#[derive(Debug, Default)]
pub struct SchemaArena {
    nodes: Vec<SchemaObject>,
}

impl SchemaArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, obj: SchemaObject) -> SchemaId {
        let id = SchemaId(self.nodes.len() as u32);
        self.nodes.push(obj);
        id
    }

    pub fn get(&self, id: SchemaId) -> &SchemaObject {
        &self.nodes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: SchemaId) -> &mut SchemaObject {
        &mut self.nodes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// `find_child` with several match modes: exact name, optionally
    /// case-insensitive, optionally via the `alt-name` appinfo extension,
    /// optionally restricted to data nodes.
    pub fn find_child(
        &self,
        parent: SchemaId,
        name: &str,
        case_insensitive: bool,
        data_only: bool,
    ) -> Option<SchemaId> {
        let matches = |n: &str| {
            if case_insensitive {
                n.eq_ignore_ascii_case(name)
            } else {
                n == name
            }
        };
        self.get(parent).children.iter().copied().find(|&id| {
            let obj = self.get(id);
            if data_only && !obj.kind.is_data_node() {
                return false;
            }
            if matches(&obj.name) {
                return true;
            }
            obj.metadata
                .iter()
                .any(|m| m.name == "alt-name" && matches(&m.value))
        })
    }

    pub fn children(&self, id: SchemaId) -> impl Iterator<Item = SchemaId> + '_ {
        self.get(id).children.iter().copied()
    }

    pub fn parent(&self, id: SchemaId) -> Option<SchemaId> {
        self.get(id).parent
    }

    /// Walks ancestors from `id` up to (excluding) the root.
    pub fn walk_ancestors(&self, id: SchemaId) -> Ancestors<'_> {
        Ancestors {
            arena: self,
            next: self.parent(id),
        }
    }

    pub fn walk_inclusive_ancestors(&self, id: SchemaId) -> Ancestors<'_> {
        Ancestors {
            arena: self,
            next: Some(id),
        }
    }

    /// Depth-first pre-order traversal of `id` and its descendants,
    /// skipping `uses`/`augment` marker nodes (never data nodes).
    pub fn traverse(&self, id: SchemaId) -> Traverse<'_> {
        Traverse {
            arena: self,
            stack: vec![id],
        }
    }

    /// Walks keys from a list node up to the root, invoking `f` once per
    /// key in declaration order.
    pub fn walk_keys(&self, list_id: SchemaId, mut f: impl FnMut(SchemaId)) {
        if let Some(list) = self.get(list_id).list() {
            for key_name in &list.keys {
                if let Some(key_id) =
                    self.find_child(list_id, key_name, false, true)
                {
                    f(key_id);
                }
            }
        }
    }

    /// Document-order "following" siblings-of-ancestors used by the XPath
    /// `following`/`preceding` axes: every node after `id` in the flattened
    /// pre-order traversal of the whole tree rooted at `root`.
    pub fn walk_following(&self, root: SchemaId, id: SchemaId) -> Vec<SchemaId> {
        let order: Vec<SchemaId> = self.traverse(root).collect();
        match order.iter().position(|&n| n == id) {
            Some(pos) => order[pos + 1..].to_vec(),
            None => Vec::new(),
        }
    }

    pub fn walk_preceding(&self, root: SchemaId, id: SchemaId) -> Vec<SchemaId> {
        let order: Vec<SchemaId> = self.traverse(root).collect();
        match order.iter().position(|&n| n == id) {
            Some(pos) => order[..pos].to_vec(),
            None => Vec::new(),
        }
    }

    pub fn next_sibling(&self, id: SchemaId) -> Option<SchemaId> {
        let parent = self.parent(id)?;
        let siblings = &self.get(parent).children;
        let pos = siblings.iter().position(|&n| n == id)?;
        siblings.get(pos + 1).copied()
    }

    pub fn prev_sibling(&self, id: SchemaId) -> Option<SchemaId> {
        let parent = self.parent(id)?;
        let siblings = &self.get(parent).children;
        let pos = siblings.iter().position(|&n| n == id)?;
        if pos == 0 {
            None
        } else {
            siblings.get(pos - 1).copied()
        }
    }

    /// Recomputes the `MANDATORY` flag: a child is mandatory if its own
    /// `mandatory true` is set, OR a list has
    /// `min-elements >= 1`, OR every case in a mandatory choice forces
    /// mandatory children; `when` downgrades mandatory to conditional.
    pub fn recompute_mandatory(&mut self, id: SchemaId) {
        let has_when = self.get(id).when.is_some();
        let computed = match &self.get(id).payload {
            SchemaPayload::List(l) => l.min_elements >= 1,
            SchemaPayload::LeafList(l) => l.min_elements >= 1,
            SchemaPayload::Choice(_) => {
                let children: Vec<SchemaId> = self.get(id).children.clone();
                !children.is_empty()
                    && children.iter().all(|&case_id| {
                        self.get(case_id).children.iter().any(|&c| self.get(c).is_mandatory())
                    })
            }
            _ => self.get(id).flags.contains(SchemaFlags::MANDATORY_SET),
        };
        let effective = computed && !has_when;
        let obj = self.get_mut(id);
        obj.flags.set(SchemaFlags::MANDATORY, effective);
    }

    /// Deep-clones the subtree rooted at `src` (inclusive), reparenting the
    /// root clone to `new_parent`, tagging every clone with `clone_flag`
    /// and a `clone_source` weak pointer to its original. Returns the new
    /// root's id.
    pub fn clone_subtree(
        &mut self,
        src: SchemaId,
        new_parent: Option<SchemaId>,
        clone_flag: SchemaFlags,
    ) -> SchemaId {
        let mut obj = self.get(src).clone();
        let original_children = std::mem::take(&mut obj.children);
        obj.parent = new_parent;
        obj.flags.insert(clone_flag);
        obj.clone_source = Some(src);
        let new_id = self.insert(obj);
        let cloned_children: Vec<SchemaId> = original_children
            .into_iter()
            .map(|child| self.clone_subtree(child, Some(new_id), clone_flag))
            .collect();
        self.get_mut(new_id).children = cloned_children;
        new_id
    }
}

pub struct Ancestors<'a> {
    arena: &'a SchemaArena,
    next: Option<SchemaId>,
}

impl Iterator for Ancestors<'_> {
    type Item = SchemaId;

    fn next(&mut self) -> Option<SchemaId> {
        let cur = self.next?;
        self.next = self.arena.parent(cur);
        Some(cur)
    }
}

pub struct Traverse<'a> {
    arena: &'a SchemaArena,
    stack: Vec<SchemaId>,
}

impl Iterator for Traverse<'_> {
    type Item = SchemaId;

    fn next(&mut self) -> Option<SchemaId> {
        let id = self.stack.pop()?;
        let children = &self.arena.get(id).children;
        for &child in children.iter().rev() {
            self.stack.push(child);
        }
        Some(id)
    }
}

/// Appinfo-style `alt-name` extension lookup helper (used by
/// [`SchemaArena::find_child`]).
pub fn alt_name_metadata(name: &str) -> MetaAttr {
    MetaAttr {
        name: "alt-name".to_string(),
        value: name.to_string(),
    }
}

/// Declaration-order registry of the groupings visible while building one
/// statement subtree (module-local groupings plus, eventually, imported
/// ones). Kept separate from [`crate::module::Module::groupings`] so the
/// builder can look up a grouping before its owning module is fully
/// registered.
#[derive(Debug, Default)]
pub struct GroupingScope {
    pub local: IndexMap<String, Vec<SchemaId>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleId;
    use crate::types::TypeRegistry;

    fn leaf(name: &str, module: ModuleId) -> SchemaObject {
        SchemaObject {
            name: name.to_string(),
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
            kind: SchemaNodeKind::Leaf,
            payload: SchemaPayload::Leaf(LeafPayload {
                type_id: TypeRegistry::builtin(crate::types::BaseKind::String),
                default: None,
                units: None,
            }),
            clone_source: None,
        }
    }

    #[test]
    fn find_child_exact_and_case_insensitive() {
        let mut arena = SchemaArena::new();
        let module = ModuleId(0);
        let parent_id = arena.insert(SchemaObject {
            children: Vec::new(),
            ..leaf("parent", module)
        });
        let child_id = arena.insert(leaf("Child", module));
        arena.get_mut(parent_id).children.push(child_id);

        assert_eq!(
            arena.find_child(parent_id, "Child", false, true),
            Some(child_id)
        );
        assert_eq!(arena.find_child(parent_id, "child", false, true), None);
        assert_eq!(
            arena.find_child(parent_id, "child", true, true),
            Some(child_id)
        );
    }

    #[test]
    fn clone_subtree_preserves_shape_and_tags_flag() {
        let mut arena = SchemaArena::new();
        let module = ModuleId(0);
        let root = arena.insert(leaf("grp-root", module));
        let child = arena.insert(leaf("grp-child", module));
        arena.get_mut(root).children.push(child);

        let clone_root =
            arena.clone_subtree(root, None, SchemaFlags::CLONED_FROM_USES);
        assert_ne!(clone_root, root);
        assert_eq!(arena.get(clone_root).clone_source, Some(root));
        assert!(arena.get(clone_root).flags.contains(SchemaFlags::CLONED_FROM_USES));
        assert_eq!(arena.get(clone_root).children.len(), 1);
        let clone_child = arena.get(clone_root).children[0];
        assert_eq!(arena.get(clone_child).clone_source, Some(child));
        assert_eq!(arena.get(clone_child).name, "grp-child");
    }

    #[test]
    fn mandatory_downgraded_by_when() {
        let mut arena = SchemaArena::new();
        let module = ModuleId(0);
        let mut obj = leaf("cond", module);
        obj.flags.insert(SchemaFlags::MANDATORY_SET);
        obj.when = Some("../foo = 'bar'".to_string());
        let id = arena.insert(obj);
        arena.recompute_mandatory(id);
        assert!(!arena.get(id).is_mandatory());
    }

    #[test]
    fn schema_error_reports_unresolved_reference() {
        let err = Error::fatal(ErrorCode::WrongToken, "unresolved leafref target");
        assert!(matches!(err, Error::Fatal { .. }));
    }
}
