//! Results database extractor.
//!
//! [`Extractor`] composes any number of results files into one merged
//! hierarchy of object groups, item groups and variable references, and
//! serves positioned reads across all of them.
//!
//! ## Example
//!
//! ```ignore
//! use frs_rdb::rdb::{Extractor, ResultDescription};
//!
//! let mut rdb = Extractor::new();
//! rdb.add_files(["run1.frs", "run1_restart.frs"]);
//! let entry = rdb
//!     .search(&ResultDescription::new("Triad").with_base_id(3).with_path("Position matrix"))
//!     .expect("triad position");
//! let op = rdb.read_operation(entry)?;
//!
//! rdb.reset_positioning();
//! loop {
//!     println!("{:?} {:?}", rdb.current_time(), op.evaluate(&rdb));
//!     if !rdb.increment() {
//!         break;
//!     }
//! }
//! ```

pub mod config;
pub mod description;
pub mod read_op;

pub use config::ExtractorConfig;
pub use description::{wildcard_match, ResultDescription};
pub use read_op::{ReadOpConstructor, ReadOpRegistry, ReadOperation, Value};

use std::collections::{BTreeMap, HashSet};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::*;
use crate::frs::format::{PHYSICAL_TIME, TIME_EPS, TIME_STEP_NUMBER};
use crate::util::{Error, Pool, Result};

/// Keys closer than this are treated as the found time when positioning.
const REPOSITION_EPS: f64 = 1e-12;

/// Merged, time positioned view over a set of results files.
pub struct Extractor {
    config: ExtractorConfig,
    registry: ReadOpRegistry,
    schema: SchemaStore,
    tree: EntryTree,
    containers: Pool<ResultContainer>,
    /// Open files in add order
    files: Vec<(PathBuf, ContainerId)>,
    /// Top-level variables and item groups by description
    top_level: BTreeMap<String, EntryId>,
    /// Object groups by base id
    object_groups: BTreeMap<i32, EntryId>,
    /// Object groups by type, in registration order
    object_types: BTreeMap<Arc<str>, Vec<EntryId>>,
    current_time: Option<f64>,
    lookup_misses: Mutex<BTreeMap<String, usize>>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    pub fn new() -> Self {
        Self::with_config(ExtractorConfig::default())
    }

    pub fn with_config(config: ExtractorConfig) -> Self {
        Self::with_registry(config, ReadOpRegistry::with_defaults())
    }

    pub fn with_registry(config: ExtractorConfig, registry: ReadOpRegistry) -> Self {
        Self {
            config,
            registry,
            schema: SchemaStore::new(),
            tree: EntryTree::new(),
            containers: Pool::new(),
            files: Vec::new(),
            top_level: BTreeMap::new(),
            object_groups: BTreeMap::new(),
            object_types: BTreeMap::new(),
            current_time: None,
            lookup_misses: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn registry(&self) -> &ReadOpRegistry {
        &self.registry
    }

    pub fn schema(&self) -> &SchemaStore {
        &self.schema
    }

    pub fn tree(&self) -> &EntryTree {
        &self.tree
    }

    // ==================== Files ====================

    /// Open `path` and merge its schema into the hierarchy. Adding a file
    /// that is already open returns its existing container.
    pub fn add_file(&mut self, path: impl AsRef<Path>) -> Result<ContainerId> {
        let path = path.as_ref();
        if let Some(id) = self.container_for(path) {
            return Ok(id);
        }

        let span = tracing::info_span!("add_file", path = %path.display());
        let _enter = span.enter();

        let (mut container, header) = ResultContainer::open(path, self.config.use_mmap)?;
        let schema = SchemaIngest::new(&mut self.schema).ingest_all(&header.entries);
        container.add_warnings(schema.warnings);
        container.set_pre_read(self.config.pre_read);
        let id = self.containers.insert(container);

        let mut step_size = 0;
        let roots: Vec<EntryId> = schema
            .top_level
            .iter()
            .map(|def| self.tree.instantiate(def, &self.schema, id, &mut step_size))
            .collect();

        let time_source = roots.iter().find_map(|&root| {
            let leaf = self.tree.entry(root).as_var_ref()?;
            let var = self.schema.variables.get(leaf.variable);
            (var.name == PHYSICAL_TIME).then(|| (leaf.bindings.first().map_or(0, |b| b.offset), var.clone()))
        });
        if time_source.is_none() {
            tracing::warn!("no \"{PHYSICAL_TIME}\" variable; file has no time steps");
        }
        let steps = self.containers[id].set_layout(step_size, time_source);

        for root in roots {
            self.register_top_level(root);
        }
        self.files.push((normalize(path), id));
        tracing::info!(steps, step_size, "added results file");

        self.reposition();
        Ok(id)
    }

    /// Add several files. A file that fails is reported and skipped; files
    /// already merged stay merged. Returns false if any file failed.
    pub fn add_files<P: AsRef<Path>>(&mut self, paths: impl IntoIterator<Item = P>) -> bool {
        let mut ok = true;
        for path in paths {
            let path = path.as_ref();
            match self.add_file(path) {
                Ok(_) => {}
                Err(Error::FileNotFound(p)) if !self.config.must_exist => {
                    tracing::warn!(path = %p.display(), "skipping missing results file");
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "failed to add results file");
                    ok = false;
                }
            }
        }
        ok
    }

    /// Close files, dropping their bindings and pruning what becomes empty.
    /// Returns the number of files removed.
    pub fn remove_files<P: AsRef<Path>>(&mut self, paths: impl IntoIterator<Item = P>) -> usize {
        let dead: HashSet<ContainerId> =
            paths.into_iter().filter_map(|p| self.container_for(p.as_ref())).collect();
        if dead.is_empty() {
            return 0;
        }

        self.collect_garbage(&dead);
        self.files.retain(|(_, id)| !dead.contains(id));
        for &id in &dead {
            if let Some(c) = self.containers.remove(id) {
                tracing::info!(path = %c.path().display(), "removed results file");
            }
        }

        if self.files.is_empty() {
            self.current_time = None;
        }
        self.reposition();
        dead.len()
    }

    /// Drop every binding to `dead` containers. Emptied entries are pruned
    /// in the same pass, as are emptied object groups; top-level variables
    /// and item groups stay registered even when empty.
    pub fn collect_garbage(&mut self, dead: &HashSet<ContainerId>) {
        for &root in self.top_level.values() {
            self.tree.remove_containers(root, dead);
        }

        let tree = &mut self.tree;
        for groups in self.object_types.values_mut() {
            for &og in groups.iter() {
                tree.remove_containers(og, dead);
            }
            let (keep, prune): (Vec<_>, Vec<_>) = groups.iter().copied().partition(|&og| !tree.is_empty_entry(og));
            for og in prune {
                tree.free_subtree(og);
            }
            *groups = keep;
        }
        self.object_types.retain(|_, groups| !groups.is_empty());
        self.rebuild_object_index();
    }

    /// Keep surviving base id owners; a base id whose owner was pruned
    /// passes to the next surviving group that carries it.
    fn rebuild_object_index(&mut self) {
        let alive: HashSet<EntryId> = self.object_types.values().flatten().copied().collect();
        self.object_groups.retain(|_, og| alive.contains(og));
        for &og in self.object_types.values().flatten() {
            let Some(base) = self.tree.get(og).and_then(Entry::as_object_group).map(|g| g.base_id) else {
                continue;
            };
            if base > 0 {
                self.object_groups.entry(base).or_insert(og);
            }
        }
    }

    fn register_top_level(&mut self, root: EntryId) {
        let Some(og) = self.tree.entry(root).as_object_group() else {
            let key = self.tree.description(root, &self.schema.variables);
            match self.top_level.get(&key) {
                Some(&existing) => {
                    if self.tree.merge(existing, root) {
                        // Fields moved over from the new file
                        self.tree.set_global(existing, true);
                    } else {
                        tracing::warn!(description = %key, "conflicting top-level definitions; keeping the first");
                        self.tree.free_subtree(root);
                    }
                }
                None => {
                    self.tree.set_global(root, true);
                    self.top_level.insert(key, root);
                }
            }
            return;
        };

        let (type_name, base_id, prototype) = (og.type_name.clone(), og.base_id, og.is_prototype());
        if base_id > 0 {
            if let Some(&existing) = self.object_groups.get(&base_id) {
                if self.tree.compare(existing, root) && self.tree.merge(existing, root) {
                    return;
                }
                tracing::warn!(base_id, "object groups of different types share a base id");
            } else {
                self.object_groups.insert(base_id, root);
            }
        } else if prototype {
            if let Some(&first) = self.object_types.get(&type_name).and_then(|v| v.first()) {
                if self.tree.merge(first, root) {
                    return;
                }
            }
        }
        self.object_types.entry(type_name).or_default().push(root);
    }

    /// Container of an open file.
    pub fn container_for(&self, path: &Path) -> Option<ContainerId> {
        let path = normalize(path);
        self.files.iter().find(|(p, _)| *p == path).map(|&(_, id)| id)
    }

    pub fn container(&self, id: ContainerId) -> Option<&ResultContainer> {
        self.containers.get(id)
    }

    /// Open containers in file-add order.
    pub fn containers(&self) -> impl Iterator<Item = (ContainerId, &ResultContainer)> + '_ {
        self.files.iter().filter_map(|&(_, id)| Some((id, self.containers.get(id)?)))
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Re-read file sizes and index appended time steps.
    pub fn refresh(&mut self) -> Result<usize> {
        let mut added = 0;
        for &(_, id) in &self.files {
            if let Some(c) = self.containers.get_mut(id) {
                added += c.refresh()?;
            }
        }
        if added > 0 {
            tracing::debug!(added, "new time steps");
            self.reposition();
        }
        Ok(added)
    }

    /// Turn whole-step read-ahead on or off for all open files and for
    /// files added later.
    pub fn set_pre_read(&mut self, enabled: bool) {
        self.config.pre_read = enabled;
        for &(_, id) in &self.files {
            if let Some(c) = self.containers.get_mut(id) {
                c.set_pre_read(enabled);
            }
        }
    }

    /// Buffer whole steps of the given open files only.
    pub fn enable_pre_read<P: AsRef<Path>>(&mut self, paths: impl IntoIterator<Item = P>) -> usize {
        let ids: Vec<ContainerId> = paths.into_iter().filter_map(|p| self.container_for(p.as_ref())).collect();
        for &id in &ids {
            self.containers[id].set_pre_read(true);
        }
        ids.len()
    }

    pub fn disable_pre_read(&mut self) {
        self.set_pre_read(false);
    }

    // ==================== Search ====================

    /// Find the entry a description addresses. Misses return `None` and
    /// are recorded in the lookup report.
    pub fn search(&self, descr: &ResultDescription) -> Option<EntryId> {
        let found = self.search_root(descr).and_then(|(root, path)| self.find_path(root, path));
        if found.is_none() {
            self.note_miss(format!("no result for {descr}"));
        }
        found
    }

    /// Shorthand for [`search`](Self::search).
    pub fn find(&self, og_type: &str, base_id: i32, path: &[&str]) -> Option<EntryId> {
        self.search(&ResultDescription::new(og_type).with_base_id(base_id).with_segments(path.iter().copied()))
    }

    fn search_root<'d>(&self, descr: &'d ResultDescription) -> Option<(EntryId, &'d [String])> {
        let path = descr.var_descr_path.as_slice();
        if descr.is_top_level() {
            let (first, rest) = path.split_first()?;
            return self.top_level.get(first).map(|&root| (root, rest));
        }

        let root = if descr.base_id > 0 {
            let og = *self.object_groups.get(&descr.base_id)?;
            if self.tree.entry(og).type_name() != descr.og_type {
                self.note_miss(format!(
                    "base id {} is a {}, not a {}",
                    descr.base_id,
                    self.tree.entry(og).type_name(),
                    descr.og_type
                ));
                return None;
            }
            og
        } else {
            let groups = self.object_types.get(descr.og_type.as_str())?;
            if descr.user_id > 0 {
                *groups.iter().find(|&&og| {
                    self.tree.entry(og).as_object_group().is_some_and(|g| g.user_id == descr.user_id)
                })?
            } else {
                *groups.first()?
            }
        };
        Some((root, path))
    }

    fn find_path(&self, mut current: EntryId, path: &[String]) -> Option<EntryId> {
        for segment in path {
            current = *self.tree.fields(current).iter().find(|&&f| {
                !self.tree.is_empty_entry(f) && self.tree.description(f, &self.schema.variables) == *segment
            })?;
        }
        Some(current)
    }

    /// All entries matching a description whose type and path segments may
    /// contain `*`. A base id of 0 matches every object group of the type.
    pub fn search_all(&self, descr: &ResultDescription) -> Vec<EntryId> {
        let mut roots: Vec<(EntryId, &[String])> = Vec::new();
        let path = descr.var_descr_path.as_slice();

        if descr.is_top_level() {
            if let Some((first, rest)) = path.split_first() {
                roots.extend(
                    self.top_level
                        .iter()
                        .filter(|&(name, &id)| wildcard_match(first, name) && !self.tree.is_empty_entry(id))
                        .map(|(_, &id)| (id, rest)),
                );
            }
        } else {
            for (type_name, groups) in &self.object_types {
                if !wildcard_match(&descr.og_type, type_name) {
                    continue;
                }
                for &og in groups {
                    let Some(g) = self.tree.entry(og).as_object_group() else { continue };
                    if (descr.base_id <= 0 || g.base_id == descr.base_id)
                        && (descr.user_id <= 0 || g.user_id == descr.user_id)
                    {
                        roots.push((og, path));
                    }
                }
            }
        }

        let mut found = Vec::new();
        for (root, rest) in roots {
            self.collect_matches(root, rest, &mut found);
        }
        if found.is_empty() {
            self.note_miss(format!("no result for {descr}"));
        }
        found
    }

    fn collect_matches(&self, current: EntryId, path: &[String], out: &mut Vec<EntryId>) {
        let Some((segment, rest)) = path.split_first() else {
            out.push(current);
            return;
        };
        for &f in self.tree.fields(current) {
            if !self.tree.is_empty_entry(f)
                && wildcard_match(segment, &self.tree.description(f, &self.schema.variables))
            {
                self.collect_matches(f, rest, out);
            }
        }
    }

    /// The top-level variable or item group with this description.
    pub fn top_level_entry(&self, description: &str) -> Option<EntryId> {
        self.top_level.get(description).copied()
    }

    pub fn object_group(&self, base_id: i32) -> Option<EntryId> {
        self.object_groups.get(&base_id).copied()
    }

    pub fn object_groups_of_type(&self, og_type: &str) -> &[EntryId] {
        self.object_types.get(og_type).map_or(&[], Vec::as_slice)
    }

    /// Description leading from the top of the hierarchy to `entry`.
    pub fn describe(&self, entry: EntryId) -> ResultDescription {
        let mut path = Vec::new();
        let mut current = entry;
        loop {
            let Some(e) = self.tree.get(current) else { break };
            if let Some(og) = e.as_object_group() {
                path.reverse();
                return ResultDescription::new(og.type_name.to_string())
                    .with_base_id(og.base_id)
                    .with_user_id(og.user_id)
                    .with_segments(path);
            }
            path.push(self.tree.description(current, &self.schema.variables));
            match e.owner() {
                Some(owner) => current = owner,
                None => break,
            }
        }
        path.reverse();
        ResultDescription::default().with_segments(path)
    }

    /// Distinct failed lookups with how often each occurred.
    pub fn lookup_report(&self) -> Vec<(String, usize)> {
        self.lookup_misses.lock().iter().map(|(m, &n)| (m.clone(), n)).collect()
    }

    pub fn clear_lookup_report(&self) {
        self.lookup_misses.lock().clear();
    }

    fn note_miss(&self, message: String) {
        let mut misses = self.lookup_misses.lock();
        if let Some(count) = misses.get_mut(&message) {
            *count += 1;
            return;
        }
        if self.config.log_lookup_misses {
            tracing::warn!("{message}");
        }
        misses.insert(message, 1);
    }

    // ==================== Positioning ====================

    /// Latch every container at the key nearest `time`, preferring keys
    /// at or before it. Returns the time actually found.
    pub fn position(&mut self, time: f64) -> Option<f64> {
        self.position_impl(time, false)
    }

    /// Like [`position`](Self::position), preferring keys at or after `time`.
    pub fn position_next_higher(&mut self, time: f64) -> Option<f64> {
        self.position_impl(time, true)
    }

    fn position_impl(&mut self, time: f64, next_higher: bool) -> Option<f64> {
        let outside = if next_higher { KeyStatus::AfterEnd } else { KeyStatus::BeforeStart };
        let mut best: Option<f64> = None;
        let mut fallback: Option<f64> = None;

        for &(_, id) in &self.files {
            let Some(c) = self.containers.get_mut(id) else { continue };
            let status = c.position_at_key(time, next_higher);
            let Some(key) = c.times().current_key() else { continue };
            let slot = if status == outside { &mut fallback } else { &mut best };
            if slot.map_or(true, |k| (key - time).abs() < (k - time).abs()) {
                *slot = Some(key);
            }
        }

        let found = best.or(fallback)?;
        if (found - time).abs() > REPOSITION_EPS {
            for &(_, id) in &self.files {
                if let Some(c) = self.containers.get_mut(id) {
                    c.position_at_key(found, next_higher);
                }
            }
        }
        self.current_time = Some(found);
        Some(found)
    }

    /// Position at the first time step of all files.
    pub fn reset_positioning(&mut self) -> Option<f64> {
        let first = self.first_time()?;
        self.position(first)
    }

    fn reposition(&mut self) {
        if let Some(time) = self.current_time.or_else(|| self.first_time()) {
            self.position(time);
        }
    }

    /// Advance every container holding time steps by one step. Returns
    /// false, changing nothing, if any of them is on its last step.
    pub fn increment(&mut self) -> bool {
        let active: Vec<ContainerId> = self
            .files
            .iter()
            .map(|&(_, id)| id)
            .filter(|&id| self.containers.get(id).is_some_and(ResultContainer::has_data))
            .collect();
        if active.is_empty() || active.iter().any(|&id| !self.containers[id].times().has_next()) {
            return false;
        }

        let mut time = f64::MAX;
        for &id in &active {
            let times = self.containers[id].times_mut();
            times.advance();
            time = time.min(times.current_key().unwrap_or(f64::MAX));
        }
        for &id in &active {
            self.containers[id].times_mut().set_wanted_key(time);
        }
        self.current_time = Some(time);
        true
    }

    /// Move to the nearest key after the current time in any file.
    pub fn step_to_next_time(&mut self) -> bool {
        let Some(current) = self.current_time else {
            return self.reset_positioning().is_some();
        };
        let next = self
            .containers()
            .filter_map(|(_, c)| c.times().next_key_after(current))
            .min_by(f64::total_cmp);
        match next {
            Some(time) => self.position_next_higher(time).is_some(),
            None => false,
        }
    }

    pub fn current_time(&self) -> Option<f64> {
        self.current_time
    }

    pub fn first_time(&self) -> Option<f64> {
        self.containers().filter_map(|(_, c)| c.times().first_key()).min_by(f64::total_cmp)
    }

    pub fn last_time(&self) -> Option<f64> {
        self.containers().filter_map(|(_, c)| c.times().last_key()).max_by(f64::total_cmp)
    }

    /// Sorted union of the time keys of all files.
    pub fn valid_keys(&self) -> Vec<f64> {
        let mut keys: Vec<f64> = self.containers().flat_map(|(_, c)| c.times().keys()).collect();
        keys.sort_by(f64::total_cmp);
        keys.dedup_by(|a, b| (*a - *b).abs() < TIME_EPS);
        keys
    }

    /// Solver step number at the current position, if the files carry one.
    pub fn current_step_number(&self) -> Option<i32> {
        let entry = self.top_level_entry(TIME_STEP_NUMBER)?;
        let mut step = [0i32];
        (self.get_single_time_step_ints(entry, &mut step) == 1).then_some(step[0])
    }

    // ==================== Reading ====================

    /// The container a leaf is read from at the current position: an
    /// exact key match from the most recently dated file, otherwise the
    /// container whose latched key is closest to the wanted time.
    pub fn nearest_container<'a>(&self, leaf: &'a VariableReference) -> Option<&'a Binding> {
        let positioned = leaf.bindings.iter().filter_map(|b| {
            let c = self.containers.get(b.container)?;
            c.times().current_key().map(|_| (b, c))
        });

        let mut exact: Option<(&Binding, u64)> = None;
        let mut nearest: Option<(&Binding, f64)> = None;
        for (binding, c) in positioned {
            if c.times().is_exact() {
                if exact.map_or(true, |(_, date)| c.date() > date) {
                    exact = Some((binding, c.date()));
                }
            } else {
                let distance = c.times().distance_from_pos_key().abs();
                if nearest.map_or(true, |(_, d)| distance < d) {
                    nearest = Some((binding, distance));
                }
            }
        }
        exact.map(|(b, _)| b).or(nearest.map(|(b, _)| b))
    }

    /// Read all values below `entry` at the current position. Returns the
    /// number of values written; fewer than `values.len()` signals a
    /// short read.
    pub fn get_single_time_step_data(&self, entry: EntryId, values: &mut [f64]) -> usize {
        self.tree.read_pos_data(entry, &PositionedReader { rdb: self }, values, 0)
    }

    /// Integer flavour of [`get_single_time_step_data`](Self::get_single_time_step_data).
    pub fn get_single_time_step_ints(&self, entry: EntryId, values: &mut [i32]) -> usize {
        self.tree.read_pos_data(entry, &PositionedReader { rdb: self }, values, 0)
    }

    /// Number of values a positioned read of `entry` produces.
    pub fn value_count(&self, entry: EntryId) -> usize {
        self.tree
            .leaves(entry)
            .iter()
            .filter_map(|&l| self.tree.entry(l).as_var_ref())
            .map(|r| self.schema.variables.get(r.variable).repeats())
            .sum()
    }

    /// True if some file holds `entry` at exactly the current time.
    pub fn has_data_for_current_key(&self, entry: EntryId) -> bool {
        self.tree.leaves(entry).iter().any(|&l| {
            self.tree.entry(l).as_var_ref().is_some_and(|r| {
                r.bindings
                    .iter()
                    .any(|b| self.containers.get(b.container).is_some_and(|c| c.times().is_exact()))
            })
        })
    }

    /// Typed decoder for a variable reference.
    pub fn read_operation(&self, entry: EntryId) -> Result<Box<dyn ReadOperation>> {
        let leaf = self
            .tree
            .get(entry)
            .and_then(Entry::as_var_ref)
            .ok_or_else(|| Error::NotAVariable(self.describe(entry).to_string()))?;
        self.registry.create(entry, self.schema.variables.get(leaf.variable))
    }

    pub fn variable(&self, entry: EntryId) -> Option<&Variable> {
        let leaf = self.tree.get(entry)?.as_var_ref()?;
        Some(self.schema.variables.get(leaf.variable))
    }

    // ==================== Output ====================

    /// Write the merged hierarchy as an indented outline.
    pub fn dump_hierarchy(&self, w: &mut impl Write) -> io::Result<()> {
        for &root in self.top_level.values() {
            self.tree.dump(root, &self.schema.variables, w, 0)?;
        }
        for groups in self.object_types.values() {
            for &og in groups {
                self.tree.dump(og, &self.schema.variables, w, 0)?;
            }
        }
        Ok(())
    }
}

/// Reads leaves from the nearest positioned container.
struct PositionedReader<'a> {
    rdb: &'a Extractor,
}

impl<T: Sample> LeafReader<T> for PositionedReader<'_> {
    fn read_leaf(&self, leaf: &VariableReference, out: &mut [T]) -> usize {
        let Some(binding) = self.rdb.nearest_container(leaf) else {
            return 0;
        };
        let Some(container) = self.rdb.containers.get(binding.container) else {
            return 0;
        };
        container.read_positioned(binding.offset, self.rdb.schema.variables.get(leaf.variable), out)
    }
}

fn normalize(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
