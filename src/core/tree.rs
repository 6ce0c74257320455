//! Arena of live entries and the algorithms over it.
//!
//! Each opened file's schema is instantiated into the arena, assigning
//! byte offsets, then merged into the existing hierarchy. Removing files
//! drops their bindings and prunes emptied entries in one pass.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::io::{self, Write};

use super::container::ContainerId;
use super::entry::*;
use super::schema::{FieldDef, ItemGroupDef, ObjectGroupDef, SchemaStore, TopLevelDef};
use super::variable::VariableStore;
use crate::util::Pool;

/// Reads the values of one leaf at the current time position.
pub trait LeafReader<T> {
    /// Decode into `out`, returning the number of values written.
    fn read_leaf(&self, leaf: &VariableReference, out: &mut [T]) -> usize;
}

/// Arena holding every live entry of an extractor.
#[derive(Default)]
pub struct EntryTree {
    entries: Pool<Entry>,
}

impl EntryTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.entries.get(id)
    }

    #[inline]
    pub fn entry(&self, id: EntryId) -> &Entry {
        &self.entries[id]
    }

    pub fn fields(&self, id: EntryId) -> &[EntryId] {
        self.entries.get(id).map(Entry::fields).unwrap_or(&[])
    }

    pub fn owner(&self, id: EntryId) -> Option<EntryId> {
        self.entries.get(id).and_then(Entry::owner)
    }

    pub fn set_owner(&mut self, id: EntryId, owner: Option<EntryId>) {
        if let Some(e) = self.entries.get_mut(id) {
            e.owner = owner;
        }
    }

    /// Mark `id` and everything below it. Global entries survive
    /// [`remove_containers`](Self::remove_containers) even when empty.
    pub fn set_global(&mut self, id: EntryId, global: bool) {
        let Some(e) = self.entries.get_mut(id) else { return };
        e.global = global;
        for child in e.fields().to_vec() {
            self.set_global(child, global);
        }
    }

    pub fn is_global(&self, id: EntryId) -> bool {
        self.entries.get(id).is_some_and(Entry::is_global)
    }

    /// Text matched by path lookups.
    pub fn description(&self, id: EntryId, vars: &VariableStore) -> String {
        match self.entries.get(id).map(|e| &e.node) {
            Some(Node::VarRef(r)) => vars.get(r.variable).name.clone(),
            Some(Node::ItemGroup(ig)) => ig.key.description(),
            Some(Node::ObjectGroup(og)) => og.description.clone(),
            None => String::new(),
        }
    }

    /// True if no variable below `id` has any binding.
    pub fn is_empty_entry(&self, id: EntryId) -> bool {
        match self.entries.get(id).map(|e| &e.node) {
            Some(Node::VarRef(r)) => r.bindings.is_empty(),
            Some(_) => self.fields(id).iter().all(|&f| self.is_empty_entry(f)),
            None => true,
        }
    }

    /// Identity match used while merging: same variable, same item group
    /// key, or same object type and base id.
    pub fn compare(&self, a: EntryId, b: EntryId) -> bool {
        match (&self.entries[a].node, &self.entries[b].node) {
            (Node::VarRef(x), Node::VarRef(y)) => x.variable == y.variable,
            (Node::ItemGroup(x), Node::ItemGroup(y)) => x.key == y.key,
            (Node::ObjectGroup(x), Node::ObjectGroup(y)) => {
                x.type_name == y.type_name && x.base_id == y.base_id
            }
            _ => false,
        }
    }

    /// Total order over entries: by kind, then key, then fields recursively.
    pub fn cmp_entries(&self, a: EntryId, b: EntryId, vars: &VariableStore) -> Ordering {
        let (ea, eb) = (&self.entries[a], &self.entries[b]);
        let head = match (&ea.node, &eb.node) {
            (Node::VarRef(x), Node::VarRef(y)) => return vars.get(x.variable).cmp(vars.get(y.variable)),
            (Node::ItemGroup(x), Node::ItemGroup(y)) => x.key.cmp(&y.key),
            (Node::ObjectGroup(x), Node::ObjectGroup(y)) => (&x.type_name, x.base_id, x.user_id, &x.description)
                .cmp(&(&y.type_name, y.base_id, y.user_id, &y.description)),
            _ => return ea.rank().cmp(&eb.rank()),
        };
        head.then_with(|| {
            let (fa, fb) = (ea.fields(), eb.fields());
            fa.iter()
                .zip(fb)
                .map(|(&x, &y)| self.cmp_entries(x, y, vars))
                .find(|o| o.is_ne())
                .unwrap_or_else(|| fa.len().cmp(&fb.len()))
        })
    }

    pub fn less(&self, a: EntryId, b: EntryId, vars: &VariableStore) -> bool {
        self.cmp_entries(a, b, vars) == Ordering::Less
    }

    pub fn equal(&self, a: EntryId, b: EntryId, vars: &VariableStore) -> bool {
        self.cmp_entries(a, b, vars) == Ordering::Equal
    }

    /// Create the live entries of one top-level definition for `container`,
    /// advancing `bin_pos` past every leaf.
    pub fn instantiate(
        &mut self,
        def: &TopLevelDef,
        store: &SchemaStore,
        container: ContainerId,
        bin_pos: &mut u64,
    ) -> EntryId {
        match def {
            TopLevelDef::Variable(var) => {
                self.instantiate_field(&FieldDef::Variable(*var), store, container, None, bin_pos)
            }
            TopLevelDef::Group(group) => {
                self.instantiate_group(store.groups.get(*group), store, container, None, bin_pos)
            }
            TopLevelDef::Object(og) => self.instantiate_object(og, store, container, bin_pos),
        }
    }

    fn instantiate_object(
        &mut self,
        def: &ObjectGroupDef,
        store: &SchemaStore,
        container: ContainerId,
        bin_pos: &mut u64,
    ) -> EntryId {
        let id = self.entries.insert(Entry::new(
            Node::ObjectGroup(ObjectGroup {
                type_name: def.type_name.clone(),
                base_id: def.base_id,
                user_id: def.user_id,
                description: def.description.clone(),
                fields: Vec::new(),
            }),
            None,
        ));
        self.instantiate_children(id, &def.fields, store, container, bin_pos);
        id
    }

    fn instantiate_group(
        &mut self,
        def: &ItemGroupDef,
        store: &SchemaStore,
        container: ContainerId,
        owner: Option<EntryId>,
        bin_pos: &mut u64,
    ) -> EntryId {
        let node = Node::ItemGroup(ItemGroup { key: def.key.clone(), fields: Vec::new() });
        let id = self.entries.insert(Entry::new(node, owner));
        self.instantiate_children(id, &def.fields, store, container, bin_pos);
        id
    }

    fn instantiate_children(
        &mut self,
        id: EntryId,
        defs: &[FieldDef],
        store: &SchemaStore,
        container: ContainerId,
        bin_pos: &mut u64,
    ) {
        let children: Vec<EntryId> = defs
            .iter()
            .map(|f| self.instantiate_field(f, store, container, Some(id), bin_pos))
            .collect();
        if let Some(fields) = self.entries[id].fields_mut() {
            *fields = children;
        }
        if self.has_sorted_children(id) {
            self.sort_fields_by_user_id(id);
        }
    }

    fn instantiate_field(
        &mut self,
        field: &FieldDef,
        store: &SchemaStore,
        container: ContainerId,
        owner: Option<EntryId>,
        bin_pos: &mut u64,
    ) -> EntryId {
        match field {
            FieldDef::Variable(var) => {
                let mut bindings = smallvec::SmallVec::new();
                bindings.push(Binding { container, offset: *bin_pos });
                *bin_pos += store.variables.get(*var).byte_size();
                let node = Node::VarRef(VariableReference { variable: *var, bindings });
                self.entries.insert(Entry::new(node, owner))
            }
            FieldDef::Group(group) => {
                self.instantiate_group(store.groups.get(*group), store, container, owner, bin_pos)
            }
            FieldDef::Inline(def) => self.instantiate_group(def, store, container, owner, bin_pos),
        }
    }

    /// Item groups whose first child is an integer-keyed item group keep
    /// their children sorted by that id.
    fn has_sorted_children(&self, id: EntryId) -> bool {
        matches!(self.entries[id].node, Node::ItemGroup(_))
            && self.fields(id).first().is_some_and(|&f| {
                matches!(&self.entries[f].node, Node::ItemGroup(ig) if ig.key.user_id().is_some())
            })
    }

    pub fn sort_fields_by_user_id(&mut self, id: EntryId) {
        let mut fields = self.fields(id).to_vec();
        fields.sort_by_key(|&f| self.entries[f].user_id());
        if let Some(slot) = self.entries[id].fields_mut() {
            *slot = fields;
        }
    }

    /// Merge `from` into `into`. On success `from` is consumed: its
    /// matching children are merged recursively and freed, the others are
    /// moved over. Returns false, leaving both untouched, if the two
    /// entries cannot be merged.
    pub fn merge(&mut self, into: EntryId, from: EntryId) -> bool {
        if into == from {
            return false;
        }
        let same_variable = match (&self.entries[into].node, &self.entries[from].node) {
            (Node::VarRef(a), Node::VarRef(b)) => Some(a.variable == b.variable),
            (Node::ItemGroup(_), Node::ItemGroup(_)) | (Node::ObjectGroup(_), Node::ObjectGroup(_)) => None,
            _ => return false,
        };
        match same_variable {
            Some(false) => false,
            Some(true) => {
                if let Some(Entry { node: Node::VarRef(source), .. }) = self.entries.remove(from) {
                    if let Node::VarRef(target) = &mut self.entries[into].node {
                        target.bindings.extend(source.bindings);
                    }
                }
                true
            }
            None => {
                self.merge_fields(into, from);
                true
            }
        }
    }

    fn merge_fields(&mut self, into: EntryId, from: EntryId) {
        let source = self.entries[from].fields_mut().map(std::mem::take).unwrap_or_default();
        let sorted = self.has_sorted_children(into);
        let target_len = self.fields(into).len();

        let mut added = Vec::new();
        let mut cursor = 0;
        for field in source {
            if !sorted {
                cursor = 0;
            }
            let key = self.entries[field].user_id();
            let mut matched = None;
            while cursor < target_len {
                let candidate = self.fields(into)[cursor];
                if self.compare(candidate, field) {
                    matched = Some(candidate);
                    break;
                }
                if sorted {
                    if let (Some(have), Some(want)) = (self.entries[candidate].user_id(), key) {
                        if have > want {
                            break;
                        }
                    }
                }
                cursor += 1;
            }

            match matched {
                Some(target) if self.merge(target, field) => {}
                _ => {
                    self.set_owner(field, Some(into));
                    added.push(field);
                }
            }
        }

        let grew = !added.is_empty();
        if let Some(fields) = self.entries[into].fields_mut() {
            fields.extend(added);
        }
        if sorted && grew {
            self.sort_fields_by_user_id(into);
        }
        self.entries.remove(from);
    }

    /// Drop all bindings to `dead` containers below `id`, pruning children
    /// that become empty unless they are global.
    pub fn remove_containers(&mut self, id: EntryId, dead: &HashSet<ContainerId>) {
        if let Some(Node::VarRef(r)) = self.entries.get_mut(id).map(|e| &mut e.node) {
            r.bindings.retain(|b| !dead.contains(&b.container));
            return;
        }
        let children = self.fields(id).to_vec();

        for &child in &children {
            self.remove_containers(child, dead);
        }

        let (keep, prune): (Vec<_>, Vec<_>) = children
            .into_iter()
            .partition(|&c| self.is_global(c) || !self.is_empty_entry(c));
        for child in prune {
            self.free_subtree(child);
        }
        if let Some(fields) = self.entries[id].fields_mut() {
            *fields = keep;
        }
    }

    /// Free `id` and everything below it.
    pub fn free_subtree(&mut self, id: EntryId) {
        if let Some(entry) = self.entries.remove(id) {
            for &child in entry.fields() {
                self.free_subtree(child);
            }
        }
    }

    /// Read every leaf below `id` in field order into `buf` starting at
    /// `pos`. Returns the position after the last value written.
    pub fn read_pos_data<T, R: LeafReader<T>>(&self, id: EntryId, reader: &R, buf: &mut [T], pos: usize) -> usize {
        match self.entries.get(id).map(|e| &e.node) {
            Some(Node::VarRef(leaf)) => {
                let start = pos.min(buf.len());
                start + reader.read_leaf(leaf, &mut buf[start..])
            }
            Some(_) => self.fields(id).iter().fold(pos, |p, &f| self.read_pos_data(f, reader, buf, p)),
            None => pos,
        }
    }

    /// All leaves below `id`, in field order.
    pub fn leaves(&self, id: EntryId) -> Vec<EntryId> {
        let mut out = Vec::new();
        self.collect_leaves(id, &mut out);
        out
    }

    fn collect_leaves(&self, id: EntryId, out: &mut Vec<EntryId>) {
        match self.entries.get(id).map(|e| &e.node) {
            Some(Node::VarRef(_)) => out.push(id),
            Some(_) => {
                for &f in self.fields(id) {
                    self.collect_leaves(f, out);
                }
            }
            None => {}
        }
    }

    /// Write an indented outline of the subtree at `id`.
    pub fn dump(&self, id: EntryId, vars: &VariableStore, w: &mut impl Write, depth: usize) -> io::Result<()> {
        let Some(entry) = self.entries.get(id) else {
            return Ok(());
        };
        let indent = "  ".repeat(depth);
        match &entry.node {
            Node::VarRef(r) => {
                let files: Vec<String> =
                    r.bindings.iter().map(|b| format!("{:?}@{}", b.container, b.offset)).collect();
                writeln!(w, "{indent}<{}> {}", vars.get(r.variable), files.join(" "))?;
            }
            Node::ItemGroup(ig) => writeln!(w, "{indent}[{}]", ig.key)?,
            Node::ObjectGroup(og) => writeln!(
                w,
                "{indent}{{{} base={} id={} \"{}\"}}",
                og.type_name, og.base_id, og.user_id, og.description
            )?,
        }
        for &f in entry.fields() {
            self.dump(f, vars, w, depth + 1)?;
        }
        Ok(())
    }
}
