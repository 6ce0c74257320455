//! Core schema and storage types.
//!
//! This module contains:
//! - [`Variable`] / [`VariableStore`] - Interned variable descriptors
//! - [`SchemaStore`] / [`SchemaIngest`] - Header definitions and per-file ingest
//! - [`EntryTree`] - Arena of live entries: instantiate, merge, order, prune
//! - [`ResultContainer`] / [`TimeIndex`] - Open files and their time steps

pub mod container;
pub mod entry;
pub mod ingest;
pub mod schema;
pub mod time_index;
pub mod tree;
pub mod variable;

pub use container::{ContainerId, ResultContainer, Sample};
pub use entry::{Binding, Entry, EntryId, ItemGroup, Node, ObjectGroup, VariableReference};
pub use ingest::{IngestedSchema, SchemaIngest};
pub use schema::{Dictionary, FieldDef, GroupDefId, GroupKey, ItemGroupDef, ObjectGroupDef, SchemaStore, TopLevelDef};
pub use time_index::{KeyStatus, TimeIndex};
pub use tree::{EntryTree, LeafReader};
pub use variable::{Variable, VariableId, VariableStore};
