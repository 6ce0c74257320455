//! Schema definitions parsed from a results file header.
//!
//! Definitions are templates: they describe what a time step contains but
//! carry no file offsets. Item group definitions from a `VARIABLES:`
//! section are interned extractor-wide like variables; inline definitions
//! are owned by their parent and never interned.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use super::variable::{VariableId, VariableStore};
use crate::frs::format::atoi;
use crate::util::{Handle, Interner};

/// Key of an item group: a non-negative integer id or a name.
///
/// Integer keys order before names.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupKey {
    Id(u32),
    Name(Arc<str>),
}

impl GroupKey {
    /// A token that is entirely a non-negative integer becomes an id.
    pub fn parse(token: &str, names: &mut Dictionary) -> Self {
        let t = token.trim();
        match t.parse::<i64>() {
            Ok(n) if (0..=i64::from(u32::MAX)).contains(&n) => Self::Id(n as u32),
            _ => Self::Name(names.intern(t)),
        }
    }

    pub fn user_id(&self) -> Option<u32> {
        match self {
            Self::Id(id) => Some(*id),
            Self::Name(_) => None,
        }
    }

    /// Text matched by path lookups.
    pub fn description(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// One child slot of a group definition.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldDef {
    Variable(VariableId),
    Group(GroupDefId),
    Inline(Box<ItemGroupDef>),
}

/// Item group template.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemGroupDef {
    pub key: GroupKey,
    pub fields: Vec<FieldDef>,
}

pub type GroupDefId = Handle<ItemGroupDef>;

/// Object group template from a `DATABLOCKS:` section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectGroupDef {
    pub type_name: Arc<str>,
    pub base_id: i32,
    pub user_id: i32,
    pub description: String,
    pub fields: Vec<FieldDef>,
}

impl ObjectGroupDef {
    /// Build from header fields `type;baseId;id;description;refs`; the
    /// reference fields are resolved by the caller. `None` if fewer than
    /// five fields are present.
    pub fn from_fields(fields: &[String], names: &mut Dictionary) -> Option<Self> {
        if fields.len() < 5 {
            return None;
        }
        Some(Self {
            type_name: names.intern(&fields[0]),
            base_id: atoi(&fields[1]),
            user_id: atoi(&fields[2]),
            description: fields[3].clone(),
            fields: Vec::new(),
        })
    }
}

/// A definition placed at the top of a file's per-step layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TopLevelDef {
    Variable(VariableId),
    Group(GroupDefId),
    Object(ObjectGroupDef),
}

/// Interned names shared by all files.
#[derive(Debug, Default)]
pub struct Dictionary {
    names: BTreeSet<Arc<str>>,
}

impl Dictionary {
    pub fn intern(&mut self, name: &str) -> Arc<str> {
        if let Some(existing) = self.names.get(name) {
            return existing.clone();
        }
        let name: Arc<str> = Arc::from(name);
        self.names.insert(name.clone());
        name
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Extractor-wide definition stores.
#[derive(Default)]
pub struct SchemaStore {
    pub variables: VariableStore,
    pub groups: Interner<ItemGroupDef>,
    pub names: Dictionary,
}

impl SchemaStore {
    pub fn new() -> Self {
        Self::default()
    }
}
