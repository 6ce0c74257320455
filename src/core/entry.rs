//! Live entry nodes of the merged result hierarchy.
//!
//! - [`VariableReference`] - leaf binding a shared [`Variable`](super::Variable)
//!   to byte offsets in one or more containers
//! - [`ItemGroup`] - composite keyed by integer id or name
//! - [`ObjectGroup`] - top-level composite describing one simulation object

use std::sync::Arc;

use smallvec::SmallVec;

use super::container::ContainerId;
use super::schema::GroupKey;
use super::variable::VariableId;
use crate::util::Handle;

/// Handle to an entry in an [`EntryTree`](super::EntryTree).
pub type EntryId = Handle<Entry>;

/// Where a variable's value lives in one container's time step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Binding {
    pub container: ContainerId,
    /// Byte offset within one time step
    pub offset: u64,
}

/// Leaf entry.
#[derive(Clone, Debug)]
pub struct VariableReference {
    pub variable: VariableId,
    /// One binding per file this occurrence was found in, in file-add order
    pub bindings: SmallVec<[Binding; 2]>,
}

impl VariableReference {
    pub fn binding(&self, container: ContainerId) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.container == container)
    }
}

#[derive(Clone, Debug)]
pub struct ItemGroup {
    pub key: GroupKey,
    pub fields: Vec<EntryId>,
}

#[derive(Clone, Debug)]
pub struct ObjectGroup {
    pub type_name: Arc<str>,
    pub base_id: i32,
    pub user_id: i32,
    pub description: String,
    pub fields: Vec<EntryId>,
}

impl ObjectGroup {
    /// Object groups without ids or description merge into the first
    /// object group of their type.
    pub fn is_prototype(&self) -> bool {
        self.base_id <= 0 && self.user_id <= 0 && self.description.is_empty()
    }
}

#[derive(Clone, Debug)]
pub enum Node {
    VarRef(VariableReference),
    ItemGroup(ItemGroup),
    ObjectGroup(ObjectGroup),
}

/// One slot of the entry arena.
#[derive(Clone, Debug)]
pub struct Entry {
    pub node: Node,
    pub(crate) owner: Option<EntryId>,
    pub(crate) global: bool,
}

impl Entry {
    pub fn new(node: Node, owner: Option<EntryId>) -> Self {
        Self { node, owner, global: false }
    }

    /// Type label: the object type for object groups.
    pub fn type_name(&self) -> &str {
        match &self.node {
            Node::VarRef(_) => "VariableReference",
            Node::ItemGroup(_) => "ItemGroup",
            Node::ObjectGroup(og) => &*og.type_name,
        }
    }

    pub fn has_data_fields(&self) -> bool {
        !matches!(self.node, Node::VarRef(_))
    }

    pub fn fields(&self) -> &[EntryId] {
        match &self.node {
            Node::VarRef(_) => &[],
            Node::ItemGroup(ig) => &ig.fields,
            Node::ObjectGroup(og) => &og.fields,
        }
    }

    pub(crate) fn fields_mut(&mut self) -> Option<&mut Vec<EntryId>> {
        match &mut self.node {
            Node::VarRef(_) => None,
            Node::ItemGroup(ig) => Some(&mut ig.fields),
            Node::ObjectGroup(og) => Some(&mut og.fields),
        }
    }

    pub fn as_var_ref(&self) -> Option<&VariableReference> {
        match &self.node {
            Node::VarRef(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_object_group(&self) -> Option<&ObjectGroup> {
        match &self.node {
            Node::ObjectGroup(og) => Some(og),
            _ => None,
        }
    }

    /// Numeric key used by the sorted merge path.
    pub fn user_id(&self) -> Option<u32> {
        match &self.node {
            Node::ItemGroup(ig) => ig.key.user_id(),
            Node::ObjectGroup(og) if og.user_id > 0 => Some(og.user_id as u32),
            _ => None,
        }
    }

    pub fn owner(&self) -> Option<EntryId> {
        self.owner
    }

    pub fn is_global(&self) -> bool {
        self.global
    }

    /// Kind order: variable references, item groups, object groups.
    pub(crate) fn rank(&self) -> u8 {
        match self.node {
            Node::VarRef(_) => 0,
            Node::ItemGroup(_) => 1,
            Node::ObjectGroup(_) => 2,
        }
    }
}
