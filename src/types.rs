//
// Copyright (c) The yangtool Contributors
//
// SPDX-License-Identifier: MIT
//

//! The type registry: built-in base types, derived-type definitions, and
//! restriction chains (range/length/pattern/enum/bits).

use regex::Regex;
use std::collections::HashSet;

use crate::error::{Error, ErrorCode, Result};
use crate::module::ModuleId;
use crate::schema::SchemaId;

/// Opaque handle into a [`TypeArena`]. Cheap to copy, stable for the
/// lifetime of the arena (types are never removed individually â€” only
/// whole modules are unloaded, and only when unreferenced).
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TypeId(pub u32);

/// The YANG built-in base kinds, plus the NCX-style `list-of-simple`
/// (`xsd:list`-shaped) extension used internally for space-separated
/// scalar lists.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BaseKind {
    Boolean,
    Empty,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Decimal64,
    Float64,
    Binary,
    String,
    Bits,
    Enumeration,
    IdentityRef,
    InstanceIdentifier,
    Leafref,
    Union,
    SimpleList,
}

impl BaseKind {
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            BaseKind::Int8
                | BaseKind::Int16
                | BaseKind::Int32
                | BaseKind::Int64
                | BaseKind::Uint8
                | BaseKind::Uint16
                | BaseKind::Uint32
                | BaseKind::Uint64
                | BaseKind::Decimal64
                | BaseKind::Float64
        )
    }

    pub fn from_keyword(kw: &str) -> Option<Self> {
        Some(match kw {
            "boolean" => BaseKind::Boolean,
            "empty" => BaseKind::Empty,
            "int8" => BaseKind::Int8,
            "int16" => BaseKind::Int16,
            "int32" => BaseKind::Int32,
            "int64" => BaseKind::Int64,
            "uint8" => BaseKind::Uint8,
            "uint16" => BaseKind::Uint16,
            "uint32" => BaseKind::Uint32,
            "uint64" => BaseKind::Uint64,
            "decimal64" => BaseKind::Decimal64,
            "float64" => BaseKind::Float64,
            "binary" => BaseKind::Binary,
            "string" => BaseKind::String,
            "bits" => BaseKind::Bits,
            "enumeration" => BaseKind::Enumeration,
            "identityref" => BaseKind::IdentityRef,
            "instance-identifier" => BaseKind::InstanceIdentifier,
            "leafref" => BaseKind::Leafref,
            "union" => BaseKind::Union,
            "slist" => BaseKind::SimpleList,
            _ => return None,
        })
    }

    fn int_bounds(&self) -> Option<(i64, i64)> {
        Some(match self {
            BaseKind::Int8 => (i8::MIN as i64, i8::MAX as i64),
            BaseKind::Int16 => (i16::MIN as i64, i16::MAX as i64),
            BaseKind::Int32 => (i32::MIN as i64, i32::MAX as i64),
            BaseKind::Int64 => (i64::MIN, i64::MAX),
            BaseKind::Uint8 => (0, u8::MAX as i64),
            BaseKind::Uint16 => (0, u16::MAX as i64),
            BaseKind::Uint32 => (0, u32::MAX as i64),
            // u64::MAX doesn't fit in i64; callers treat uint64 specially.
            BaseKind::Uint64 => (0, i64::MAX),
            _ => return None,
        })
    }
}

/// One endpoint of a range or length part.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Bound {
    Min,
    Max,
    Value(i64),
}

/// One `|`-separated part of a `range`/`length` restriction, already
/// normalized so `lower <= upper`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RangePart {
    pub lower: Bound,
    pub upper: Bound,
}

/// An ordered, non-overlapping chain of range/length parts. Parts always
/// appear in strictly ascending order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RangeList {
    pub parts: Vec<RangePart>,
}

impl RangeList {
    pub fn parse(text: &str, base: BaseKind) -> Result<Self> {
        let mut parts = Vec::new();
        for chunk in text.split('|') {
            let chunk = chunk.trim();
            let (lo, hi) = match chunk.split_once("..") {
                Some((l, h)) => (l.trim(), h.trim()),
                None => (chunk, chunk),
            };
            let lower = parse_bound(lo, base)?;
            let upper = parse_bound(hi, base)?;
            parts.push(RangePart { lower, upper });
        }
        let mut list = RangeList { parts };
        list.validate_order()?;
        if base != BaseKind::Float64 {
            list.normalize();
        }
        Ok(list)
    }

    fn validate_order(&self) -> Result<()> {
        for w in self.parts.windows(2) {
            if bound_value(w[0].upper) >= bound_value(w[1].lower) {
                return Err(Error::fatal(
                    ErrorCode::WrongToken,
                    "range/length parts must be strictly ascending",
                ));
            }
        }
        Ok(())
    }

    /// Merges adjacent integral parts: `1..4|5|6|7..9` becomes `1..9`.
    /// Never applied to `float64`.
    fn normalize(&mut self) {
        if self.parts.is_empty() {
            return;
        }
        let mut merged = vec![self.parts[0]];
        for part in &self.parts[1..] {
            let last = merged.last_mut().unwrap();
            let adjacent = match (last.upper, part.lower) {
                (Bound::Value(a), Bound::Value(b)) => b == a + 1,
                _ => false,
            };
            if adjacent {
                last.upper = part.upper;
            } else {
                merged.push(*part);
            }
        }
        self.parts = merged;
    }

    /// Returns the first explicit range in the chain (used by
    /// `collect_range` when walking a named-type chain).
    pub fn first(&self) -> Option<&RangePart> {
        self.parts.first()
    }

    pub fn contains(&self, value: i64) -> bool {
        self.parts.iter().any(|p| {
            let lo = match p.lower {
                Bound::Min => i64::MIN,
                Bound::Max => i64::MAX,
                Bound::Value(v) => v,
            };
            let hi = match p.upper {
                Bound::Min => i64::MIN,
                Bound::Max => i64::MAX,
                Bound::Value(v) => v,
            };
            value >= lo && value <= hi
        })
    }
}

fn bound_value(b: Bound) -> i64 {
    match b {
        Bound::Min => i64::MIN,
        Bound::Max => i64::MAX,
        Bound::Value(v) => v,
    }
}

fn parse_bound(text: &str, base: BaseKind) -> Result<Bound> {
    match text {
        "min" => Ok(Bound::Min),
        "max" => Ok(Bound::Max),
        _ => {
            let v: i64 = text.parse().map_err(|_| {
                Error::fatal(
                    ErrorCode::WrongToken,
                    format!("invalid range/length bound '{text}'"),
                )
            })?;
            if let Some((lo, hi)) = base.int_bounds() {
                if v < lo || v > hi {
                    return Err(Error::fatal(
                        ErrorCode::WrongToken,
                        format!("bound '{text}' out of range for {base:?}"),
                    ));
                }
            }
            Ok(Bound::Value(v))
        }
    }
}

/// A chain of compiled regular-expression patterns. `string` restrictions
/// AND all patterns at every level of the type chain; they never OR.
#[derive(Debug, Default)]
pub struct PatternChain {
    pub patterns: Vec<(Regex, bool)>, // (pattern, inverted via modifier "invert-match")
}

impl PatternChain {
    pub fn push(&mut self, text: &str, inverted: bool) -> Result<()> {
        let anchored = format!("^(?:{text})$");
        let re = Regex::new(&anchored).map_err(|e| {
            Error::fatal(
                ErrorCode::WrongToken,
                format!("invalid pattern '{text}': {e}"),
            )
        })?;
        self.patterns.push((re, inverted));
        Ok(())
    }

    pub fn matches_all(&self, value: &str) -> bool {
        self.patterns.iter().all(|(re, inverted)| {
            let is_match = re.is_match(value);
            is_match != *inverted
        })
    }
}

/// One member of an `enumeration` or `bits` value list. Bits share this
/// list shape with an `is_bits` flag on the owning [`SimpleType`].
#[derive(Clone, Debug, PartialEq)]
pub struct EnumOrBit {
    pub name: String,
    pub position: i64,
}

/// A fully-resolved, non-aliased simple type.
#[derive(Debug)]
pub struct SimpleType {
    pub base: BaseKind,
    pub range: Option<RangeList>,
    pub length: Option<RangeList>,
    pub patterns: PatternChain,
    pub enum_values: Vec<EnumOrBit>,
    pub is_bits: bool,
    /// `decimal64` fraction-digits, in `[1, 18]`; immutable once set.
    pub fraction_digits: Option<u8>,
    /// Unresolved until the schema builder's "Resolve" pass.
    pub leafref_path: Option<String>,
    pub leafref_target: Option<SchemaId>,
    pub leafref_require_instance: bool,
    pub identity_base: Option<String>,
    pub union_members: Vec<TypeId>,
}

impl SimpleType {
    fn new(base: BaseKind) -> Self {
        Self {
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
        }
    }
}

/// A named-type reference: points at another type template plus an
/// optional override with the additional restrictions introduced at this
/// site (a `type my-typedef { range "1..10"; }` re-restriction).
#[derive(Debug)]
pub struct NamedType {
    pub base: TypeId,
    pub override_range: Option<RangeList>,
    pub override_length: Option<RangeList>,
    pub override_patterns: Option<PatternChain>,
    pub override_default: Option<String>,
}

/// The three-way type-definition variant: a fully simple type, a named
/// reference to a typedef with optional local restriction overrides, or a
/// bare alias to another type entry.
#[derive(Debug)]
pub enum TypeDef {
    Simple(SimpleType),
    Named(NamedType),
    Reference(TypeId),
}

/// A typedef's declaration-site metadata (name + owning module), kept
/// alongside the [`TypeDef`] so the registry can do named lookup and cycle
/// detection.
#[derive(Debug)]
pub struct TypeEntry {
    pub name: Option<String>,
    pub module: Option<ModuleId>,
    pub def: TypeDef,
}

/// The engine-wide type registry. Holds the built-in templates (loaded
/// once at startup, one per base kind) plus every `typedef` discovered
/// while building schemas.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    entries: Vec<TypeEntry>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        let mut reg = TypeRegistry::default();
        for base in [
            BaseKind::Boolean,
            BaseKind::Empty,
            BaseKind::Int8,
            BaseKind::Int16,
            BaseKind::Int32,
            BaseKind::Int64,
            BaseKind::Uint8,
            BaseKind::Uint16,
            BaseKind::Uint32,
            BaseKind::Uint64,
            BaseKind::Decimal64,
            BaseKind::Float64,
            BaseKind::Binary,
            BaseKind::String,
            BaseKind::Bits,
            BaseKind::Enumeration,
            BaseKind::IdentityRef,
            BaseKind::InstanceIdentifier,
            BaseKind::Leafref,
            BaseKind::Union,
            BaseKind::SimpleList,
        ] {
            reg.entries.push(TypeEntry {
                name: None,
                module: None,
                def: TypeDef::Simple(SimpleType::new(base)),
            });
        }
        reg
    }

    pub fn builtin(base: BaseKind) -> TypeId {
        TypeId(base as u32)
    }

    pub fn insert(&mut self, name: Option<String>, module: Option<ModuleId>, def: TypeDef) -> TypeId {
        let id = TypeId(self.entries.len() as u32);
        self.entries.push(TypeEntry { name, module, def });
        id
    }

    pub fn get(&self, id: TypeId) -> &TypeEntry {
        &self.entries[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: TypeId) -> &mut TypeEntry {
        &mut self.entries[id.0 as usize]
    }

    /// Walks the named/reference chain, verifying no cycles, returning the
    /// bottom simple type's base kind.
    pub fn base_kind_of(&self, id: TypeId) -> Result<BaseKind> {
        let mut seen = HashSet::new();
        let mut cur = id;
        loop {
            if !seen.insert(cur) {
                return Err(Error::fatal(
                    ErrorCode::WrongToken,
                    "cyclic type definition",
                ));
            }
            match &self.get(cur).def {
                TypeDef::Simple(s) => return Ok(s.base),
                TypeDef::Named(n) => cur = n.base,
                TypeDef::Reference(r) => cur = *r,
            }
        }
    }

    /// Resolves a named type by id, erroring on unresolved cycles.
    pub fn resolve_named_type(&self, id: TypeId) -> Result<&SimpleType> {
        let mut seen = HashSet::new();
        let mut cur = id;
        loop {
            if !seen.insert(cur) {
                return Err(Error::fatal(
                    ErrorCode::WrongToken,
                    "cyclic type definition",
                ));
            }
            match &self.get(cur).def {
                TypeDef::Simple(s) => return Ok(s),
                TypeDef::Named(n) => cur = n.base,
                TypeDef::Reference(r) => cur = *r,
            }
        }
    }

    /// Follows the chain from `id`, returning the first explicit range
    /// restriction (an override wins over the base's own range).
    pub fn collect_range(&self, id: TypeId) -> Option<RangeList> {
        let mut cur = id;
        loop {
            match &self.get(cur).def {
                TypeDef::Simple(s) => return s.range.clone(),
                TypeDef::Reference(r) => cur = *r,
                TypeDef::Named(n) => {
                    if let Some(r) = &n.override_range {
                        return Some(r.clone());
                    }
                    cur = n.base;
                }
            }
        }
    }

    pub fn collect_length(&self, id: TypeId) -> Option<RangeList> {
        let mut cur = id;
        loop {
            match &self.get(cur).def {
                TypeDef::Simple(s) => return s.length.clone(),
                TypeDef::Reference(r) => cur = *r,
                TypeDef::Named(n) => {
                    if let Some(l) = &n.override_length {
                        return Some(l.clone());
                    }
                    cur = n.base;
                }
            }
        }
    }

    /// Iterates every pattern at every level of the chain (AND semantics:
    /// a string must satisfy every one of them).
    pub fn iterate_patterns(&self, id: TypeId) -> Vec<(Regex, bool)> {
        let mut out = Vec::new();
        let mut cur = id;
        loop {
            match &self.get(cur).def {
                TypeDef::Simple(s) => {
                    out.extend(s.patterns.patterns.iter().map(|(r, i)| (r.clone(), *i)));
                    break;
                }
                TypeDef::Reference(r) => cur = *r,
                TypeDef::Named(n) => {
                    if let Some(p) = &n.override_patterns {
                        out.extend(p.patterns.iter().map(|(r, i)| (r.clone(), *i)));
                    }
                    cur = n.base;
                }
            }
        }
        out
    }

    pub fn first_enum_or_bits(&self, id: TypeId) -> Vec<EnumOrBit> {
        let simple = self.resolve_named_type(id).ok();
        simple.map(|s| s.enum_values.clone()).unwrap_or_default()
    }

    pub fn fraction_digits_of(&self, id: TypeId) -> Option<u8> {
        self.resolve_named_type(id).ok().and_then(|s| s.fraction_digits)
    }

    /// Validates union member constraints: a union contains no member
    /// whose effective base is leafref or empty.
    pub fn validate_union(&self, members: &[TypeId]) -> Result<()> {
        for &m in members {
            let base = self.base_kind_of(m)?;
            if matches!(base, BaseKind::Leafref | BaseKind::Empty) {
                return Err(Error::fatal(
                    ErrorCode::WrongToken,
                    "union member's effective base cannot be leafref or empty",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_normalization_merges_adjacent_parts() {
        let list = RangeList::parse("1..4|5|6|7..9", BaseKind::Int32).unwrap();
        assert_eq!(list.parts.len(), 1);
        assert_eq!(list.parts[0].lower, Bound::Value(1));
        assert_eq!(list.parts[0].upper, Bound::Value(9));
    }

    #[test]
    fn range_normalization_skipped_for_float64() {
        let list = RangeList::parse("1..4|5", BaseKind::Float64).unwrap();
        assert_eq!(list.parts.len(), 2);
    }

    #[test]
    fn range_rejects_descending_parts() {
        assert!(RangeList::parse("5..9|1..4", BaseKind::Int32).is_err());
    }

    #[test]
    fn pattern_chain_ands_all_levels() {
        let mut chain = PatternChain::default();
        chain.push("[a-z]+", false).unwrap();
        chain.push("a.*", false).unwrap();
        assert!(chain.matches_all("abc"));
        assert!(!chain.matches_all("xyz"));
        assert!(!chain.matches_all("Abc"));
    }

    #[test]
    fn union_rejects_leafref_and_empty_members() {
        let mut reg = TypeRegistry::new();
        let leafref = TypeRegistry::builtin(BaseKind::Leafref);
        let string_t = TypeRegistry::builtin(BaseKind::String);
        assert!(reg.validate_union(&[string_t]).is_ok());
        assert!(reg.validate_union(&[leafref]).is_err());
        let _ = &mut reg;
    }
}
