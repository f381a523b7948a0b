//! Hash-indexed pool of reusable rows or columns with age-based eviction.
//!
//! The pool stores captured handles in a flat array. Each entry remembers
//! its array position so removal is a swap with the last entry. A hash index
//! over the structural key of the stored objects detects duplicates that are
//! distinct objects with equal content.
//!
//! Scanning is lazy: only entries not yet checked against the current LP are
//! examined. Entries that turn out useless grow older and are evicted once
//! their age exceeds the age limit.

use std::collections::HashMap;

use crate::error::{BnbError, BnbResult};
use crate::lp::{ArenaItem, Column, Handle, RefArena, Row};

/// Objects that can be stored in a [`Pool`].
pub trait PoolItem: ArenaItem {
    /// Name used in error messages.
    fn name(&self) -> &str;

    /// Whether the content may still change. Such objects cannot be pooled.
    fn is_modifiable(&self) -> bool;

    /// Hash of the structural key.
    fn structural_hash(&self) -> u64;

    /// Tolerant structural equality.
    fn structurally_eq(&self, other: &Self, eps: f64) -> bool;
}

impl PoolItem for Row {
    fn name(&self) -> &str {
        Row::name(self)
    }

    fn is_modifiable(&self) -> bool {
        Row::is_modifiable(self)
    }

    fn structural_hash(&self) -> u64 {
        Row::structural_hash(self)
    }

    fn structurally_eq(&self, other: &Self, eps: f64) -> bool {
        self.same_cut(other, eps)
    }
}

impl PoolItem for Column {
    fn name(&self) -> &str {
        Column::name(self)
    }

    fn is_modifiable(&self) -> bool {
        Column::is_modifiable(self)
    }

    fn structural_hash(&self) -> u64 {
        Column::structural_hash(self)
    }

    fn structurally_eq(&self, other: &Self, eps: f64) -> bool {
        self.same_column(other, eps)
    }
}

/// Hash and equality used to detect duplicate pool entries.
///
/// Two items that compare equal must hash equally.
pub trait KeyStrategy<T> {
    /// Hash of an item's key.
    fn key_hash(&self, item: &T) -> u64;

    /// Whether two items have the same key.
    fn key_eq(&self, a: &T, b: &T) -> bool;
}

/// Default key: structural content compared within a tolerance.
#[derive(Debug, Clone, Copy)]
pub struct StructuralKey {
    /// Tolerance of value comparisons.
    pub eps: f64,
}

impl Default for StructuralKey {
    fn default() -> Self {
        Self { eps: 1e-9 }
    }
}

impl<T: PoolItem> KeyStrategy<T> for StructuralKey {
    fn key_hash(&self, item: &T) -> u64 {
        item.structural_hash()
    }

    fn key_eq(&self, a: &T, b: &T) -> bool {
        a.structurally_eq(b, self.eps)
    }
}

/// A pooled object with its bookkeeping.
#[derive(Debug)]
pub struct PoolEntry<T: ArenaItem> {
    /// Captured handle.
    pub handle: Handle<T>,

    /// Consecutive scans in which the entry was found useless.
    pub age: usize,

    /// Last LP id the entry was checked against.
    pub processed_lp: Option<u64>,

    /// Position in the entry array.
    pub pos: usize,

    hash: u64,
}

/// Outcome of checking one entry during a scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    /// Already loaded in the LP; skipped without aging.
    InLp,

    /// Violated / improving, with a score handed to the output sink.
    Useful(f64),

    /// Not useful for the current LP; the entry ages.
    Useless,
}

/// Result of a separation or pricing scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeparationResult {
    /// Nothing was left to check against the current LP.
    NotRun,

    /// Entries were checked, none was useful.
    NotFound,

    /// At least one entry was handed out.
    Found,
}

/// Statistics of a pool.
#[derive(Debug, Default, Clone)]
pub struct PoolStats {
    /// Number of scans that checked at least one entry.
    pub calls: u64,

    /// Total number of entries handed out.
    pub found: u64,

    /// Total number of entry checks.
    pub checks: u64,

    /// Total number of entries evicted by aging.
    pub evicted: u64,

    /// Maximal number of entries stored at the same time.
    pub peak_size: usize,
}

/// Entries handed out by a scan, with their scores.
pub type FoundEntries<T> = Vec<(Handle<T>, f64)>;

/// Generic pool of captured handles.
pub struct Pool<T: ArenaItem, S = StructuralKey> {
    entries: Vec<PoolEntry<T>>,
    index: HashMap<u64, Vec<usize>>,
    strategy: S,
    age_limit: usize,

    /// Last LP id that was fully processed.
    processed_lp: Option<u64>,

    /// First entry not yet checked against `processed_lp`.
    first_unprocessed: usize,

    stats: PoolStats,
}

impl<T: PoolItem> Pool<T, StructuralKey> {
    /// Create a pool with the structural key.
    pub fn new(age_limit: usize, eps: f64) -> Self {
        Self::with_strategy(age_limit, StructuralKey { eps })
    }
}

impl<T: PoolItem, S: KeyStrategy<T>> Pool<T, S> {
    /// Create a pool with a custom key strategy.
    pub fn with_strategy(age_limit: usize, strategy: S) -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            strategy,
            age_limit,
            processed_lp: None,
            first_unprocessed: 0,
            stats: PoolStats::default(),
        }
    }

    /// Reserve space for `additional` entries.
    pub fn reserve(&mut self, additional: usize) -> BnbResult<()> {
        self.entries
            .try_reserve(additional)
            .map_err(|_| BnbError::OutOfMemory("pool entries"))
    }

    /// Position of the stored entry equal to `handle`'s object.
    fn find(&self, handle: Handle<T>, arena: &RefArena<T>) -> BnbResult<Option<usize>> {
        let item = arena.get(handle)?;
        let hash = self.strategy.key_hash(item);

        let Some(bucket) = self.index.get(&hash) else {
            return Ok(None);
        };
        for &pos in bucket {
            let stored = self.entries[pos].handle;
            if stored == handle || self.strategy.key_eq(arena.get(stored)?, item) {
                return Ok(Some(pos));
            }
        }
        Ok(None)
    }

    /// Check whether an equal object is stored.
    pub fn contains(&self, handle: Handle<T>, arena: &RefArena<T>) -> BnbResult<bool> {
        Ok(self.find(handle, arena)?.is_some())
    }

    /// Entry of the stored object equal to `handle`'s object.
    pub fn get_entry(&self, handle: Handle<T>, arena: &RefArena<T>) -> BnbResult<Option<&PoolEntry<T>>> {
        Ok(self.find(handle, arena)?.map(|pos| &self.entries[pos]))
    }

    /// Add the object unless an equal one is stored.
    ///
    /// Returns the canonical stored handle and whether it was a duplicate.
    pub fn add_if_new(&mut self, handle: Handle<T>, arena: &mut RefArena<T>) -> BnbResult<(Handle<T>, bool)> {
        if let Some(pos) = self.find(handle, arena)? {
            return Ok((self.entries[pos].handle, true));
        }
        self.add_unconditional(handle, arena)?;
        Ok((handle, false))
    }

    /// Add and capture the object without a duplicate check.
    pub fn add_unconditional(&mut self, handle: Handle<T>, arena: &mut RefArena<T>) -> BnbResult<()> {
        let item = arena.get(handle)?;
        if item.is_modifiable() {
            return Err(BnbError::ModifiableEntry(T::KIND));
        }
        let hash = self.strategy.key_hash(item);

        self.reserve(1)?;
        arena.capture(handle)?;

        let pos = self.entries.len();
        self.entries.push(PoolEntry {
            handle,
            age: 0,
            processed_lp: None,
            pos,
            hash,
        });
        self.index.entry(hash).or_default().push(pos);
        self.stats.peak_size = self.stats.peak_size.max(self.entries.len());

        Ok(())
    }

    /// Remove the stored object equal to `handle`'s object and release it.
    pub fn remove(&mut self, handle: Handle<T>, arena: &mut RefArena<T>) -> BnbResult<()> {
        match self.find(handle, arena)? {
            Some(pos) => self.remove_at(pos, arena),
            None => Err(BnbError::NotInPool(format!(
                "{} <{}>",
                T::KIND,
                arena.get(handle)?.name()
            ))),
        }
    }

    /// Swap-remove the entry at `pos`.
    fn remove_at(&mut self, pos: usize, arena: &mut RefArena<T>) -> BnbResult<()> {
        let removed = self.entries.swap_remove(pos);
        self.unindex(removed.hash, pos);

        if pos < self.entries.len() {
            let old_pos = self.entries.len();
            let moved = &mut self.entries[pos];
            moved.pos = pos;
            let (hash, processed) = (moved.hash, moved.processed_lp);

            if let Some(bucket) = self.index.get_mut(&hash) {
                if let Some(slot) = bucket.iter_mut().find(|p| **p == old_pos) {
                    *slot = pos;
                }
            }
            if processed != self.processed_lp {
                self.first_unprocessed = self.first_unprocessed.min(pos);
            }
        }
        self.first_unprocessed = self.first_unprocessed.min(self.entries.len());

        arena.release(removed.handle)?;
        Ok(())
    }

    fn unindex(&mut self, hash: u64, pos: usize) {
        if let Some(bucket) = self.index.get_mut(&hash) {
            bucket.retain(|&p| p != pos);
            if bucket.is_empty() {
                self.index.remove(&hash);
            }
        }
    }

    /// Check all entries not yet processed for `lp_id`.
    ///
    /// `check` decides per entry; useful entries are returned with their
    /// scores, useless ones age and are evicted beyond the age limit.
    pub fn scan<F>(
        &mut self,
        lp_id: u64,
        arena: &mut RefArena<T>,
        mut check: F,
    ) -> BnbResult<(SeparationResult, FoundEntries<T>)>
    where
        F: FnMut(Handle<T>, &T) -> Verdict,
    {
        if let Some(processed) = self.processed_lp {
            if lp_id < processed {
                return Err(BnbError::InvalidData(format!(
                    "LP id {} is older than processed LP {}",
                    lp_id, processed
                )));
            }
        }

        if self.processed_lp != Some(lp_id) {
            self.first_unprocessed = 0;
        }
        if self.first_unprocessed >= self.entries.len() {
            self.processed_lp = Some(lp_id);
            return Ok((SeparationResult::NotRun, Vec::new()));
        }

        self.stats.calls += 1;
        log::debug!(
            "scanning {} pool with {} entries from position {}",
            T::KIND,
            self.entries.len(),
            self.first_unprocessed
        );

        let mut found = Vec::new();
        let mut c = self.first_unprocessed;
        while c < self.entries.len() {
            if self.entries[c].processed_lp == Some(lp_id) {
                c += 1;
                continue;
            }
            self.entries[c].processed_lp = Some(lp_id);
            self.stats.checks += 1;

            let handle = self.entries[c].handle;
            let verdict = check(handle, arena.get(handle)?);
            match verdict {
                Verdict::InLp => c += 1,
                Verdict::Useful(score) => {
                    self.entries[c].age = 0;
                    found.push((handle, score));
                    c += 1;
                }
                Verdict::Useless => {
                    self.entries[c].age += 1;
                    if self.entries[c].age > self.age_limit {
                        log::trace!("evicting {:?} at age {}", handle, self.entries[c].age);
                        self.remove_at(c, arena)?;
                        self.stats.evicted += 1;
                        // the former last entry now sits at `c`
                    } else {
                        c += 1;
                    }
                }
            }
        }

        self.processed_lp = Some(lp_id);
        self.first_unprocessed = self.entries.len();
        self.stats.found += found.len() as u64;

        let result = if found.is_empty() {
            SeparationResult::NotFound
        } else {
            SeparationResult::Found
        };
        Ok((result, found))
    }

    /// Release every entry.
    pub fn clear(&mut self, arena: &mut RefArena<T>) -> BnbResult<()> {
        self.index.clear();
        self.first_unprocessed = 0;
        for entry in self.entries.drain(..) {
            arena.release(entry.handle)?;
        }
        Ok(())
    }

    /// Stored entries, in array order.
    pub fn entries(&self) -> &[PoolEntry<T>] {
        &self.entries
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Age limit.
    pub fn age_limit(&self) -> usize {
        self.age_limit
    }

    /// Pool statistics.
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena_with_rows(n: usize) -> (RefArena<Row>, Vec<Handle<Row>>) {
        let mut arena = RefArena::new();
        let handles = (0..n)
            .map(|j| arena.insert(Row::new(format!("r{}", j), n, vec![(j, 1.0)], 0.0, 1.0).unwrap()))
            .collect();
        (arena, handles)
    }

    /// Positions and index must agree after any sequence of removals.
    fn assert_consistent(pool: &Pool<Row>) {
        for (i, e) in pool.entries().iter().enumerate() {
            assert_eq!(e.pos, i);
            assert!(pool.index[&e.hash].contains(&i));
        }
        let indexed: usize = pool.index.values().map(Vec::len).sum();
        assert_eq!(indexed, pool.len());
    }

    #[test]
    fn test_swap_remove_updates_positions() {
        let (mut arena, rows) = arena_with_rows(4);
        let mut pool = Pool::new(5, 1e-9);
        for r in &rows {
            pool.add_unconditional(*r, &mut arena).unwrap();
        }

        pool.remove(rows[0], &mut arena).unwrap();
        assert_consistent(&pool);
        assert_eq!(pool.entries()[0].handle, rows[3]);

        pool.remove(rows[2], &mut arena).unwrap();
        assert_consistent(&pool);
        assert_eq!(pool.len(), 2);

        // Removed rows went back to the caller's single use
        assert_eq!(arena.nuses(rows[0]).unwrap(), 1);
        assert!(matches!(pool.remove(rows[0], &mut arena), Err(BnbError::NotInPool(_))));
    }

    #[test]
    fn test_modifiable_rejected() {
        let mut arena = RefArena::new();
        let row = Row::new("m", 2, vec![(0, 1.0)], 0.0, 1.0).unwrap().with_modifiable(true);
        let h = arena.insert(row);
        let mut pool = Pool::new(5, 1e-9);

        assert_eq!(
            pool.add_if_new(h, &mut arena),
            Err(BnbError::ModifiableEntry("row"))
        );
        assert_eq!(arena.nuses(h).unwrap(), 1);
    }

    #[test]
    fn test_scan_evicts_and_rechecks_moved_entry() {
        let (mut arena, rows) = arena_with_rows(3);
        let mut pool = Pool::new(0, 1e-9);
        for r in &rows {
            pool.add_unconditional(*r, &mut arena).unwrap();
        }

        // Every entry is useless and age limit 0 evicts on first failure
        let (result, found) = pool.scan(1, &mut arena, |_, _| Verdict::Useless).unwrap();
        assert_eq!(result, SeparationResult::NotFound);
        assert!(found.is_empty());
        assert!(pool.is_empty());
        assert_eq!(pool.stats().checks, 3);
        assert_eq!(pool.stats().evicted, 3);
    }

    struct ByName;

    impl KeyStrategy<Row> for ByName {
        fn key_hash(&self, item: &Row) -> u64 {
            item.name().len() as u64
        }

        fn key_eq(&self, a: &Row, b: &Row) -> bool {
            a.name() == b.name()
        }
    }

    #[test]
    fn test_custom_key_strategy() {
        let mut arena = RefArena::new();
        let a = arena.insert(Row::new("cut", 2, vec![(0, 1.0)], 0.0, 1.0).unwrap());
        let b = arena.insert(Row::new("cut", 2, vec![(1, 5.0)], 0.0, 9.0).unwrap());
        let mut pool = Pool::with_strategy(5, ByName);

        assert_eq!(pool.add_if_new(a, &mut arena).unwrap(), (a, false));
        assert_eq!(pool.add_if_new(b, &mut arena).unwrap(), (a, true));
        assert_eq!(pool.len(), 1);
    }
}
