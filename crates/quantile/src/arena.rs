//! Caller-owned storage for the states of one aggregation.
//!
//! The host creates one [`AggregateArena`] per aggregation (typically per
//! query and worker) and refers to individual states through
//! [`StateHandle`]s. Every state lives until it is consumed by a combine or
//! a serialization, or until the whole arena is reset or dropped.
//!
//! A handle records the arena it came from and the generation of its slot,
//! so handles that outlive their state, or that are presented to another
//! arena, are detected instead of aliasing some other state.

use crate::{
    config::QuantileConfig,
    error::QuantileError,
    scalar::{Comparator, Scalar},
    state::QuantileState,
};
use std::{
    fmt::{self, Debug},
    hash::{Hash, Hasher},
    marker::PhantomData,
    sync::atomic::{AtomicU64, Ordering},
};
use tracing::debug;

static NEXT_ARENA_ID: AtomicU64 = AtomicU64::new(1);

fn next_arena_id() -> u64 {
    NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed)
}

/// Opaque reference to a state stored in an [`AggregateArena`] of values of
/// kind `T`.
pub struct StateHandle<T> {
    arena: u64,
    index: usize,
    generation: u32,
    _kind: PhantomData<fn() -> T>,
}

impl<T> StateHandle<T> {
    fn new(arena: u64, index: usize, generation: u32) -> Self {
        Self {
            arena,
            index,
            generation,
            _kind: PhantomData,
        }
    }
}

impl<T> Clone for StateHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for StateHandle<T> {}

impl<T> PartialEq for StateHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        (self.arena, self.index, self.generation) == (other.arena, other.index, other.generation)
    }
}

impl<T> Eq for StateHandle<T> {}

impl<T> Hash for StateHandle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.arena, self.index, self.generation).hash(state);
    }
}

impl<T> Debug for StateHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateHandle({}:{}@{})", self.arena, self.index, self.generation)
    }
}

struct Slot<T: Scalar, C> {
    generation: u32,
    state: Option<QuantileState<T, C>>,
}

/// Owns every state of one aggregation.
pub struct AggregateArena<T, C = <T as Scalar>::Order>
where
    T: Scalar,
{
    id: u64,
    config: QuantileConfig,
    order: C,
    slots: Vec<Slot<T, C>>,

    /// Indexes of empty slots.
    free: Vec<usize>,

    /// Number of slots whose generation is exhausted. They are never reused.
    retired: usize,
}

impl<T> AggregateArena<T>
where
    T: Scalar,
{
    /// Creates an arena with the default configuration.
    pub fn new() -> Self {
        Self::build(QuantileConfig::default(), T::Order::default())
    }

    /// Creates an arena with the given configuration.
    pub fn with_config(config: QuantileConfig) -> Result<Self, QuantileError> {
        Self::with_order(config, T::Order::default())
    }
}

impl<T> Default for AggregateArena<T>
where
    T: Scalar,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C> AggregateArena<T, C>
where
    T: Scalar,
    C: Comparator<T>,
{
    /// Creates an arena whose states order their values by `order`.
    pub fn with_order(config: QuantileConfig, order: C) -> Result<Self, QuantileError> {
        config.validate()?;
        Ok(Self::build(config, order))
    }

    fn build(config: QuantileConfig, order: C) -> Self {
        Self {
            id: next_arena_id(),
            config,
            order,
            slots: Vec::new(),
            free: Vec::new(),
            retired: 0,
        }
    }

    /// Configuration shared by the states of this arena.
    pub fn config(&self) -> &QuantileConfig {
        &self.config
    }

    /// Ordering shared by the states of this arena.
    pub fn order(&self) -> &C {
        &self.order
    }

    /// Number of live states.
    pub fn live(&self) -> usize {
        self.slots.len() - self.free.len() - self.retired
    }

    /// Stores `state` and returns a handle to it.
    pub fn insert(&mut self, state: QuantileState<T, C>) -> StateHandle<T> {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                debug_assert!(slot.state.is_none());
                slot.state = Some(state);
                StateHandle::new(self.id, index, slot.generation)
            }
            None => {
                let index = self.slots.len();
                self.slots.push(Slot {
                    generation: 0,
                    state: Some(state),
                });
                StateHandle::new(self.id, index, 0)
            }
        }
    }

    /// Returns true if `handle` refers to a live state of this arena.
    pub fn contains(&self, handle: StateHandle<T>) -> bool {
        self.get(handle).is_some()
    }

    /// The state `handle` refers to, if it is still live.
    pub fn get(&self, handle: StateHandle<T>) -> Option<&QuantileState<T, C>> {
        self.slot(handle)?.state.as_ref()
    }

    /// The state `handle` refers to, if it is still live.
    pub fn get_mut(&mut self, handle: StateHandle<T>) -> Option<&mut QuantileState<T, C>> {
        if handle.arena != self.id {
            return None;
        }
        let slot = self.slots.get_mut(handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.state.as_mut()
    }

    /// Takes the state `handle` refers to out of the arena, invalidating
    /// `handle`.
    ///
    /// A slot whose generation counter would wrap is retired, so no later
    /// handle can collide with `handle`.
    pub fn remove(&mut self, handle: StateHandle<T>) -> Option<QuantileState<T, C>> {
        if handle.arena != self.id {
            return None;
        }
        let slot = self.slots.get_mut(handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        let state = slot.state.take()?;
        match slot.generation.checked_add(1) {
            Some(generation) => {
                slot.generation = generation;
                self.free.push(handle.index);
            }
            None => {
                debug!(arena = self.id, slot = handle.index, "retiring quantile arena slot");
                self.retired += 1;
            }
        }
        Some(state)
    }

    /// Releases every state. All outstanding handles become invalid.
    pub fn reset(&mut self) {
        debug!(arena = self.id, live = self.live(), "resetting quantile arena");
        self.slots.clear();
        self.free.clear();
        self.retired = 0;
        self.id = next_arena_id();
    }

    fn slot(&self, handle: StateHandle<T>) -> Option<&Slot<T, C>> {
        if handle.arena != self.id {
            return None;
        }
        self.slots
            .get(handle.index)
            .filter(|slot| slot.generation == handle.generation)
    }

    /// Like [`Self::get_mut`], but reports a stale handle as misuse of
    /// `function`.
    pub(crate) fn resolve(
        &mut self,
        handle: StateHandle<T>,
        function: &'static str,
    ) -> Result<&mut QuantileState<T, C>, QuantileError> {
        self.get_mut(handle)
            .ok_or(QuantileError::ContextMisuse { function })
    }

    /// Like [`Self::remove`], but reports a stale handle as misuse of
    /// `function`.
    pub(crate) fn take(
        &mut self,
        handle: StateHandle<T>,
        function: &'static str,
    ) -> Result<QuantileState<T, C>, QuantileError> {
        self.remove(handle)
            .ok_or(QuantileError::ContextMisuse { function })
    }
}

impl<T, C> Drop for AggregateArena<T, C>
where
    T: Scalar,
{
    fn drop(&mut self) {
        let live = self.slots.len() - self.free.len() - self.retired;
        if live > 0 {
            debug!(arena = self.id, live, "releasing quantile arena");
        }
    }
}

impl<T, C> Debug for AggregateArena<T, C>
where
    T: Scalar,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateArena")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("slots", &self.slots.len())
            .field("free", &self.free.len())
            .field("retired", &self.retired)
            .finish()
    }
}
