//! Generic slot+generation handle table for host resource lifetimes.
//!
//! Sockets and windows are referred to inside the guest by typed handles,
//! never by the raw integers the host returns. Invalidated handles keep a
//! stale generation, so any later use is caught before it reaches the host.
//! Double-remove is a safe no-op.

use alloc::vec::Vec;
use core::fmt;
use core::marker::PhantomData;

/// Handle encoding: upper 32 bits = slot index, lower 32 bits = generation.
fn encode(slot: u32, generation: u32) -> u64 {
    (u64::from(slot) << 32) | u64::from(generation)
}

fn decode(raw: u64) -> (u32, u32) {
    ((raw >> 32) as u32, raw as u32)
}

/// Typed handle into a [`HandleTable<T>`].
pub struct Handle<T> {
    raw: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Rebuild a handle from its encoded form, e.g. out of a snapshot.
    pub fn from_raw(raw: u64) -> Self {
        Self { raw, _marker: PhantomData }
    }

    pub fn to_raw(self) -> u64 {
        self.raw
    }

    pub fn slot(self) -> u32 {
        decode(self.raw).0
    }

    pub fn generation(self) -> u32 {
        decode(self.raw).1
    }
}

// Manual impls: derives would demand `T: Clone` and friends.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for Handle<T> {}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}v{})", self.slot(), self.generation())
    }
}

struct Slot<T> {
    generation: u32,
    data: Option<T>,
}

/// A slot+generation table mapping typed handles to owned values.
///
/// Reuses slots via a free list. Generation counters increment on removal.
pub struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    live: usize,
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandleTable<T> {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            live: 0,
        }
    }

    /// Insert a value and return its handle.
    pub fn insert(&mut self, value: T) -> Handle<T> {
        self.live += 1;
        if let Some(slot_idx) = self.free_list.pop() {
            let slot = &mut self.slots[slot_idx as usize];
            slot.data = Some(value);
            Handle::from_raw(encode(slot_idx, slot.generation))
        } else {
            let slot_idx = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                data: Some(value),
            });
            Handle::from_raw(encode(slot_idx, 0))
        }
    }

    /// Value behind a handle, or `None` if the handle is stale.
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        let (slot_idx, generation) = decode(handle.raw);
        let slot = self.slots.get(slot_idx as usize)?;
        if slot.generation != generation {
            return None;
        }
        slot.data.as_ref()
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        let (slot_idx, generation) = decode(handle.raw);
        let slot = self.slots.get_mut(slot_idx as usize)?;
        if slot.generation != generation {
            return None;
        }
        slot.data.as_mut()
    }

    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }

    /// Remove the value behind a handle, returning it.
    ///
    /// A slot whose generation wraps back to zero is retired instead of
    /// recycled, so handles from its first epoch can never resolve again.
    pub fn remove(&mut self, handle: Handle<T>) -> Option<T> {
        let (slot_idx, generation) = decode(handle.raw);
        let slot = self.slots.get_mut(slot_idx as usize)?;
        if slot.generation != generation {
            return None;
        }
        let value = slot.data.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        if slot.generation != 0 {
            self.free_list.push(slot_idx);
        }
        self.live -= 1;
        Some(value)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Live entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(idx, slot)| {
            slot.data
                .as_ref()
                .map(|value| (Handle::from_raw(encode(idx as u32, slot.generation)), value))
        })
    }

    /// Remove every live entry, yielding them in slot order.
    pub fn drain(&mut self) -> Vec<(Handle<T>, T)> {
        let handles: Vec<Handle<T>> = self.iter().map(|(h, _)| h).collect();
        handles
            .into_iter()
            .filter_map(|h| self.remove(h).map(|value| (h, value)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_round_trip() {
        let mut table = HandleTable::new();
        let h = table.insert(42i32);
        assert_eq!(table.get(h), Some(&42));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn get_mut_modifies_value() {
        let mut table = HandleTable::new();
        let h = table.insert(10i32);
        *table.get_mut(h).unwrap() = 20;
        assert_eq!(table.get(h), Some(&20));
    }

    #[test]
    fn stale_generation_is_rejected() {
        let mut table = HandleTable::new();
        let h = table.insert(1i32);
        assert_eq!(table.remove(h), Some(1));
        assert_eq!(table.get(h), None);
        assert_eq!(table.get_mut(h), None);
        assert_eq!(table.remove(h), None);
        assert!(table.is_empty());
    }

    #[test]
    fn reused_slot_gets_new_generation() {
        let mut table = HandleTable::new();
        let h1 = table.insert(1i32);
        table.remove(h1);
        let h2 = table.insert(2i32);
        assert_eq!(h1.slot(), h2.slot());
        assert_ne!(h1.generation(), h2.generation());
        assert_eq!(table.get(h1), None);
        assert_eq!(table.get(h2), Some(&2));
    }

    #[test]
    fn wrapped_generation_retires_slot() {
        let mut table = HandleTable::new();
        let h = table.insert(0i32);
        table.slots[h.slot() as usize].generation = u32::MAX;
        let last = Handle::from_raw(encode(h.slot(), u32::MAX));
        assert_eq!(table.remove(last), Some(0));
        assert!(table.free_list.is_empty());
        let fresh = table.insert(5i32);
        assert_ne!(fresh.slot(), h.slot());
    }

    #[test]
    fn raw_round_trip_and_drain() {
        let mut table = HandleTable::new();
        let a = table.insert("a");
        let b = table.insert("b");
        assert_eq!(Handle::<&str>::from_raw(b.to_raw()), b);

        let drained = table.drain();
        assert_eq!(drained, [(a, "a"), (b, "b")]);
        assert!(table.is_empty());
        assert!(!table.contains(a));
    }
}
