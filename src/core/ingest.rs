//! Per-file schema ingest.
//!
//! [`SchemaIngest`] maps the file-local integer ids of one header onto
//! extractor-wide interned definitions, resolves `<id>` / `[id]`
//! references and collects the top-level layout of a time step.
//! Unresolvable references are warnings: the offending field is dropped
//! and ingest continues.

use std::collections::HashMap;

use super::schema::*;
use super::variable::{Variable, VariableId};
use crate::frs::format::atoi;
use crate::frs::header::{EntryKind, RawEntry, Section};
use crate::frs::tokenizer::tokenize;

/// Ingest context for one file.
pub struct SchemaIngest<'a> {
    store: &'a mut SchemaStore,
    local_vars: HashMap<i32, VariableId>,
    local_groups: HashMap<i32, GroupDefId>,
    top_level: Vec<TopLevelDef>,
    warnings: Vec<String>,
}

/// Outcome of ingesting one header.
#[derive(Debug, Default)]
pub struct IngestedSchema {
    pub top_level: Vec<TopLevelDef>,
    pub warnings: Vec<String>,
}

impl<'a> SchemaIngest<'a> {
    pub fn new(store: &'a mut SchemaStore) -> Self {
        Self {
            store,
            local_vars: HashMap::new(),
            local_groups: HashMap::new(),
            top_level: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Ingest all entries in file order.
    pub fn ingest_all<'e>(mut self, entries: impl IntoIterator<Item = &'e RawEntry>) -> IngestedSchema {
        for entry in entries {
            self.ingest(entry);
        }
        self.finish()
    }

    pub fn finish(self) -> IngestedSchema {
        IngestedSchema { top_level: self.top_level, warnings: self.warnings }
    }

    /// Ingest one header entry.
    pub fn ingest(&mut self, entry: &RawEntry) {
        let in_layout = entry.section == Section::DataBlocks;
        match entry.kind {
            EntryKind::Variable => self.ingest_variable(&entry.fields, in_layout),
            EntryKind::ItemGroup => self.ingest_item_group(&entry.fields, in_layout),
            EntryKind::ObjectGroup if in_layout => self.ingest_object_group(&entry.fields),
            EntryKind::ObjectGroup => {
                self.warn(format!("object group {{{}}} outside DATABLOCKS ignored", entry.fields.join(";")))
            }
        }
    }

    fn ingest_variable(&mut self, fields: &[String], in_layout: bool) {
        if fields.len() == 1 && in_layout {
            let id = atoi(&fields[0]);
            match self.local_vars.get(&id) {
                Some(&var) => self.top_level.push(TopLevelDef::Variable(var)),
                None => self.warn(format!("reference to undefined variable <{id}>")),
            }
            return;
        }

        let Some((id, var)) = Variable::from_fields(fields) else {
            self.warn(format!("malformed variable <{}>", fields.join(";")));
            return;
        };
        if id <= 0 && !in_layout {
            self.warn(format!("variable \"{}\" defined without an id", var.name));
            return;
        }

        let (handle, _) = self.store.variables.intern(var);
        if id > 0 {
            self.local_vars.insert(id, handle);
            if in_layout {
                self.top_level.push(TopLevelDef::Variable(handle));
            }
        }
    }

    fn ingest_item_group(&mut self, fields: &[String], in_layout: bool) {
        if fields.len() == 1 && in_layout {
            let id = atoi(&fields[0]);
            match self.local_groups.get(&id) {
                Some(&group) => self.top_level.push(TopLevelDef::Group(group)),
                None => self.warn(format!("reference to undefined item group [{id}]")),
            }
            return;
        }

        let Some((id, def)) = self.item_group_def(fields) else {
            return;
        };
        if id <= 0 {
            if !in_layout {
                self.warn(format!("item group \"{}\" defined without an id", def.key));
            }
            return;
        }

        let (handle, _) = self.store.groups.intern(def);
        self.local_groups.insert(id, handle);
        if in_layout {
            self.top_level.push(TopLevelDef::Group(handle));
        }
    }

    fn ingest_object_group(&mut self, fields: &[String]) {
        let Some(mut og) = ObjectGroupDef::from_fields(fields, &mut self.store.names) else {
            self.warn(format!("malformed object group {{{}}}", fields.join(";")));
            return;
        };
        og.fields = self.resolve(&fields[4..].concat());
        self.top_level.push(TopLevelDef::Object(og));
    }

    /// Parse `id;key;references` into a definition. Warns and returns
    /// `None` if fewer than three fields are present.
    fn item_group_def(&mut self, fields: &[String]) -> Option<(i32, ItemGroupDef)> {
        if fields.len() < 3 {
            self.warn(format!("malformed item group [{}]", fields.join(";")));
            return None;
        }
        let key = GroupKey::parse(&fields[1], &mut self.store.names);
        let fields_def = self.resolve(&fields[2..].concat());
        Some((atoi(&fields[0]), ItemGroupDef { key, fields: fields_def }))
    }

    /// Resolve a reference string such as `<1><2>[3]<0;a;b;FLOAT;64;SCALAR>`
    /// into field definitions. Text between entries is skipped.
    pub fn resolve(&mut self, references: &str) -> Vec<FieldDef> {
        let bytes = references.as_bytes();
        let mut fields = Vec::new();
        let mut pos = 0;

        while pos < bytes.len() {
            let close = match bytes[pos] {
                b'<' => b'>',
                b'[' => b']',
                _ => {
                    pos += 1;
                    continue;
                }
            };
            let open = bytes[pos];
            let Some(tokens) = tokenize(&bytes[pos..], open, close, b';') else {
                self.warn(format!("unterminated reference in \"{references}\""));
                break;
            };
            pos += tokens.consumed;

            let field = if open == b'<' {
                self.resolve_variable(&tokens.fields)
            } else {
                self.resolve_item_group(&tokens.fields)
            };
            fields.extend(field);
        }

        fields
    }

    fn resolve_variable(&mut self, fields: &[String]) -> Option<FieldDef> {
        if fields.len() == 1 {
            let id = atoi(&fields[0]);
            let var = self.local_vars.get(&id).copied();
            if var.is_none() {
                self.warn(format!("reference to undefined variable <{id}>"));
            }
            return var.map(FieldDef::Variable);
        }
        match Variable::from_fields(fields) {
            Some((_, var)) => Some(FieldDef::Variable(self.store.variables.intern(var).0)),
            None => {
                self.warn(format!("malformed inline variable <{}>", fields.join(";")));
                None
            }
        }
    }

    fn resolve_item_group(&mut self, fields: &[String]) -> Option<FieldDef> {
        if fields.len() == 1 {
            let id = atoi(&fields[0]);
            let group = self.local_groups.get(&id).copied();
            if group.is_none() {
                self.warn(format!("reference to undefined item group [{id}]"));
            }
            return group.map(FieldDef::Group);
        }
        self.item_group_def(fields).map(|(_, def)| FieldDef::Inline(Box::new(def)))
    }

    fn warn(&mut self, message: String) {
        tracing::warn!("{message}");
        self.warnings.push(message);
    }
}
