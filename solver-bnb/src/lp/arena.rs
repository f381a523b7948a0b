//! Reference-counted slot arena.
//!
//! Rows, columns and LP states are shared between tree nodes, pools and the
//! live LP. None of them owns the storage: each holder captures a use, and
//! the slot is freed when the last use is released. Handles carry a
//! generation so that a handle to a freed slot is detected instead of
//! silently aliasing a reused one.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crate::error::{BnbError, BnbResult};

/// Objects that can live in a [`RefArena`].
pub trait ArenaItem {
    /// Kind name used in error messages.
    const KIND: &'static str;
}

/// Generation-checked handle into a [`RefArena`].
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    /// Slot index of this handle.
    pub fn index(&self) -> usize {
        self.index as usize
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

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T: ArenaItem> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}.{}", T::KIND, self.index, self.generation)
    }
}

struct Slot<T> {
    generation: u32,
    nuses: usize,
    value: Option<T>,
}

/// Slot arena with explicit use counts.
pub struct RefArena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T: ArenaItem> Default for RefArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ArenaItem> RefArena<T> {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Store a value. The caller holds the single initial use.
    pub fn insert(&mut self, value: T) -> Handle<T> {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.nuses = 1;
            slot.value = Some(value);
            return Handle::new(index, slot.generation);
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            nuses: 1,
            value: Some(value),
        });
        Handle::new(index, 0)
    }

    fn stale(handle: Handle<T>) -> BnbError {
        BnbError::StaleHandle {
            kind: T::KIND,
            index: handle.index(),
        }
    }

    fn slot_mut(&mut self, handle: Handle<T>) -> BnbResult<&mut Slot<T>> {
        match self.slots.get_mut(handle.index()) {
            Some(slot) if slot.generation == handle.generation && slot.value.is_some() => Ok(slot),
            _ => Err(Self::stale(handle)),
        }
    }

    /// Check whether the handle refers to a live object.
    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.slots
            .get(handle.index())
            .map_or(false, |s| s.generation == handle.generation && s.value.is_some())
    }

    /// Borrow the object behind a handle.
    pub fn get(&self, handle: Handle<T>) -> BnbResult<&T> {
        self.slots
            .get(handle.index())
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.value.as_ref())
            .ok_or_else(|| Self::stale(handle))
    }

    /// Mutably borrow the object behind a handle.
    pub fn get_mut(&mut self, handle: Handle<T>) -> BnbResult<&mut T> {
        let slot = self.slot_mut(handle)?;
        slot.value.as_mut().ok_or_else(|| Self::stale(handle))
    }

    /// Current number of uses.
    pub fn nuses(&self, handle: Handle<T>) -> BnbResult<usize> {
        self.slots
            .get(handle.index())
            .filter(|s| s.generation == handle.generation && s.value.is_some())
            .map(|s| s.nuses)
            .ok_or_else(|| Self::stale(handle))
    }

    /// Add a use.
    pub fn capture(&mut self, handle: Handle<T>) -> BnbResult<()> {
        self.slot_mut(handle)?.nuses += 1;
        Ok(())
    }

    /// Drop a use. Returns the object when this was the last one.
    pub fn release(&mut self, handle: Handle<T>) -> BnbResult<Option<T>> {
        let slot = self.slot_mut(handle)?;
        if slot.nuses == 0 {
            return Err(BnbError::RefCountUnderflow {
                kind: T::KIND,
                index: handle.index(),
            });
        }

        slot.nuses -= 1;
        if slot.nuses > 0 {
            return Ok(None);
        }

        let value = slot.value.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.live -= 1;
        Ok(value)
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Check if no object is alive.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Iterate over live objects.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.value
                .as_ref()
                .map(|v| (Handle::new(i as u32, s.generation), v))
        })
    }
}
