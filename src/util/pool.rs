//! Slab storage with typed handles, and content interning.
//!
//! [`Pool`] keeps nodes of one kind in fixed-size blocks that never move,
//! recycling removed slots through a singly linked free list. Nodes refer
//! to each other through [`Handle`]s, so the entry tree needs no owning
//! pointers or back-pointer bookkeeping.
//!
//! [`Interner`] deduplicates immutable descriptors by value: inserting a
//! value equal to an existing one returns the existing handle.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Number of slots allocated per block.
pub const BLOCK_SIZE: usize = 512;

/// Typed index into a [`Pool`] or [`Interner`].
///
/// A pool handle also carries the generation of its slot. Removing a value
/// bumps the generation, so a handle kept across a removal no longer
/// resolves, even after the slot is reused.
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Handle to the first generation of slot `index`.
    #[inline]
    pub const fn from_index(index: u32) -> Self {
        Self::new(index, 0)
    }

    #[inline]
    const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation, _marker: PhantomData }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.index as usize
    }

    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.index, self.generation).cmp(&(other.index, other.generation))
    }
}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.generation {
            0 => write!(f, "#{}", self.index),
            g => write!(f, "#{}v{}", self.index, g),
        }
    }
}

enum Slot<T> {
    Occupied { generation: u32, value: T },
    Free { generation: u32, next: Option<u32> },
}

impl<T> Slot<T> {
    fn value(&self, handle: Handle<T>) -> Option<&T> {
        match self {
            Slot::Occupied { generation, value } if *generation == handle.generation => Some(value),
            _ => None,
        }
    }

    fn value_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        match self {
            Slot::Occupied { generation, value } if *generation == handle.generation => Some(value),
            _ => None,
        }
    }
}

/// Block-allocated slab with a free list.
pub struct Pool<T> {
    blocks: Vec<Vec<Slot<T>>>,
    free_head: Option<u32>,
    len: usize,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Pool<T> {
    pub const fn new() -> Self {
        Self { blocks: Vec::new(), free_head: None, len: 0 }
    }

    /// Number of live values.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots allocated, live or free.
    pub fn capacity(&self) -> usize {
        self.blocks.len() * BLOCK_SIZE
    }

    /// Store a value, reusing a freed slot when one is available.
    pub fn insert(&mut self, value: T) -> Handle<T> {
        if let Some(index) = self.free_head {
            if let Some(slot) = self.slot_mut(index as usize) {
                if let Slot::Free { generation, next } = *slot {
                    *slot = Slot::Occupied { generation, value };
                    self.free_head = next;
                    self.len += 1;
                    return Handle::new(index, generation);
                }
            }
        }

        if self.blocks.last().map_or(true, |b| b.len() == BLOCK_SIZE) {
            self.blocks.push(Vec::with_capacity(BLOCK_SIZE));
        }
        let block_no = self.blocks.len() - 1;
        let block = &mut self.blocks[block_no];
        let index = block_no * BLOCK_SIZE + block.len();
        block.push(Slot::Occupied { generation: 0, value });
        self.len += 1;
        Handle::new(index as u32, 0)
    }

    /// Take a value out, returning its slot to the free list. Stale
    /// handles remove nothing.
    pub fn remove(&mut self, handle: Handle<T>) -> Option<T> {
        let free_head = self.free_head;
        let slot = self.slot_mut(handle.index())?;
        slot.value(handle)?;
        let freed = Slot::Free { generation: handle.generation.wrapping_add(1), next: free_head };
        let old = std::mem::replace(slot, freed);
        self.free_head = Some(handle.index);
        self.len -= 1;
        match old {
            Slot::Occupied { value, .. } => Some(value),
            Slot::Free { .. } => None,
        }
    }

    #[inline]
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.blocks.get(handle.index() / BLOCK_SIZE)?.get(handle.index() % BLOCK_SIZE)?.value(handle)
    }

    #[inline]
    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.slot_mut(handle.index())?.value_mut(handle)
    }

    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }

    /// Iterate over live values in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> + '_ {
        self.blocks.iter().enumerate().flat_map(|(b, block)| {
            block.iter().enumerate().filter_map(move |(i, slot)| match slot {
                Slot::Occupied { generation, value } => {
                    Some((Handle::new((b * BLOCK_SIZE + i) as u32, *generation), value))
                }
                Slot::Free { .. } => None,
            })
        })
    }

    /// Handles of all live values in slot order.
    pub fn handles(&self) -> Vec<Handle<T>> {
        self.iter().map(|(h, _)| h).collect()
    }

    fn slot_mut(&mut self, index: usize) -> Option<&mut Slot<T>> {
        self.blocks.get_mut(index / BLOCK_SIZE)?.get_mut(index % BLOCK_SIZE)
    }
}

impl<T> std::ops::Index<Handle<T>> for Pool<T> {
    type Output = T;

    fn index(&self, handle: Handle<T>) -> &T {
        match self.get(handle) {
            Some(value) => value,
            None => panic!("stale pool handle {handle:?}"),
        }
    }
}

impl<T> std::ops::IndexMut<Handle<T>> for Pool<T> {
    fn index_mut(&mut self, handle: Handle<T>) -> &mut T {
        match self.get_mut(handle) {
            Some(value) => value,
            None => panic!("stale pool handle {handle:?}"),
        }
    }
}

/// Value-deduplicating store. Handles stay valid for the interner's lifetime.
pub struct Interner<T: Ord + Clone> {
    values: Vec<T>,
    lookup: BTreeMap<T, Handle<T>>,
}

impl<T: Ord + Clone> Default for Interner<T> {
    fn default() -> Self {
        Self { values: Vec::new(), lookup: BTreeMap::new() }
    }
}

impl<T: Ord + Clone> Interner<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the handle of an equal value, storing `value` if none exists.
    /// The flag tells whether the value was newly stored.
    pub fn intern(&mut self, value: T) -> (Handle<T>, bool) {
        if let Some(&handle) = self.lookup.get(&value) {
            return (handle, false);
        }
        let handle = Handle::from_index(self.values.len() as u32);
        self.values.push(value.clone());
        self.lookup.insert(value, handle);
        (handle, true)
    }

    pub fn find(&self, value: &T) -> Option<Handle<T>> {
        self.lookup.get(value).copied()
    }

    #[inline]
    pub fn get(&self, handle: Handle<T>) -> &T {
        &self.values[handle.index()]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> + '_ {
        self.values.iter().enumerate().map(|(i, v)| (Handle::from_index(i as u32), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_remove_reuse() {
        let mut pool = Pool::new();
        let a = pool.insert("a");
        let b = pool.insert("b");
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.remove(a), Some("a"));
        assert_eq!(pool.remove(a), None);
        assert!(pool.get(a).is_none());

        // Freed slot comes back first, under a new generation
        let c = pool.insert("c");
        assert_eq!(c.index(), a.index());
        assert_ne!(c, a);
        assert_eq!(pool[c], "c");
        assert_eq!(pool[b], "b");
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_blocks_grow() {
        let mut pool = Pool::new();
        let handles: Vec<_> = (0..BLOCK_SIZE + 3).map(|i| pool.insert(i)).collect();
        assert_eq!(pool.capacity(), 2 * BLOCK_SIZE);
        assert_eq!(pool[handles[BLOCK_SIZE + 2]], BLOCK_SIZE + 2);
        assert_eq!(pool.iter().count(), BLOCK_SIZE + 3);
    }

    #[test]
    fn test_free_list_order() {
        let mut pool = Pool::new();
        let h: Vec<_> = (0..4).map(|i| pool.insert(i)).collect();
        pool.remove(h[1]);
        pool.remove(h[3]);
        assert_eq!(pool.insert(10).index(), h[3].index());
        assert_eq!(pool.insert(11).index(), h[1].index());
        assert_eq!(pool.insert(12).index(), 4);
    }

    #[test]
    fn test_stale_handle_after_reuse() {
        let mut pool = Pool::new();
        let old = pool.insert("og 3");
        pool.remove(old);
        let new = pool.insert("og 7");
        assert_eq!(new.generation(), old.generation() + 1);
        assert!(pool.get(old).is_none());
        assert!(!pool.contains(old));
        assert_eq!(pool.remove(old), None);
        assert_eq!(pool[new], "og 7");
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.handles(), vec![new]);
    }

    #[test]
    fn test_interner_dedup() {
        let mut names = Interner::new();
        let (a, new_a) = names.intern("Triad".to_string());
        let (b, new_b) = names.intern("Beam".to_string());
        let (c, new_c) = names.intern("Triad".to_string());
        assert!(new_a && new_b && !new_c);
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(names.len(), 2);
        assert_eq!(names.get(b), "Beam");
        assert_eq!(names.find(&"Beam".to_string()), Some(b));
    }
}
