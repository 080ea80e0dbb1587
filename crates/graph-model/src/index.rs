//! FullID-keyed index
//!
//! Two views over the same entries: a bucket table for O(1) lookup by
//! [`FullId`] and an insertion-ordered chain for enumeration. Entries live in
//! a slab; both views are updated together on insert and remove.

use crate::id::{FullId, HasFullId};

/// Number of client buckets (prime)
pub const CLIENT_BUCKETS: u64 = 37;
/// Number of sequence buckets per client bucket (prime)
pub const SEQ_BUCKETS: u64 = 1543;

fn bucket_of(id: FullId) -> usize {
    ((id.client.0 % CLIENT_BUCKETS) * SEQ_BUCKETS + (id.seq % SEQ_BUCKETS)) as usize
}

#[derive(Debug, Clone)]
struct Slot<T> {
    value: Option<T>,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Hash index of entities keyed by their [`FullId`]
#[derive(Debug, Clone)]
pub struct FullIdIndex<T> {
    /// Allocated on first insert
    buckets: Vec<Vec<(FullId, usize)>>,
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<T: HasFullId> FullIdIndex<T> {
    pub fn new() -> Self {
        Self {
            buckets: Vec::new(),
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn slot_of(&self, id: FullId) -> Option<usize> {
        self.buckets
            .get(bucket_of(id))?
            .iter()
            .find(|(key, _)| *key == id)
            .map(|(_, slot)| *slot)
    }

    pub fn contains(&self, id: FullId) -> bool {
        self.slot_of(id).is_some()
    }

    pub fn get(&self, id: FullId) -> Option<&T> {
        let slot = self.slot_of(id)?;
        self.slots[slot].value.as_ref()
    }

    pub fn get_mut(&mut self, id: FullId) -> Option<&mut T> {
        let slot = self.slot_of(id)?;
        self.slots[slot].value.as_mut()
    }

    /// Insert an entity at the end of the enumeration order.
    /// Hands the entity back if its id is already present.
    pub fn insert(&mut self, item: T) -> Result<(), T> {
        let id = item.full_id();
        if self.contains(id) {
            return Err(item);
        }
        if self.buckets.is_empty() {
            self.buckets = vec![Vec::new(); (CLIENT_BUCKETS * SEQ_BUCKETS) as usize];
        }

        let slot = Slot {
            value: Some(item),
            prev: self.tail,
            next: None,
        };
        let position = match self.free.pop() {
            Some(position) => {
                self.slots[position] = slot;
                position
            }
            None => {
                self.slots.push(slot);
                self.slots.len() - 1
            }
        };

        match self.tail {
            Some(tail) => self.slots[tail].next = Some(position),
            None => self.head = Some(position),
        }
        self.tail = Some(position);
        self.buckets[bucket_of(id)].push((id, position));
        self.len += 1;
        Ok(())
    }

    /// Remove an entity. Removing an absent id is a no-op.
    pub fn remove(&mut self, id: FullId) -> Option<T> {
        let bucket = self.buckets.get_mut(bucket_of(id))?;
        let at = bucket.iter().position(|(key, _)| *key == id)?;
        let (_, position) = bucket.swap_remove(at);

        let Slot { value, prev, next } = std::mem::replace(
            &mut self.slots[position],
            Slot {
                value: None,
                prev: None,
                next: None,
            },
        );
        match prev {
            Some(prev) => self.slots[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.slots[next].prev = prev,
            None => self.tail = prev,
        }
        self.free.push(position);
        self.len -= 1;
        value
    }

    /// Entities in insertion order
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            index: self,
            cursor: self.head,
            remaining: self.len,
        }
    }

    /// Ids in insertion order
    pub fn ids(&self) -> impl Iterator<Item = FullId> + '_ {
        self.iter().map(HasFullId::full_id)
    }

    /// Mutable access to every entity, in storage order (not insertion order)
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut().filter_map(|slot| slot.value.as_mut())
    }
}

impl<T: HasFullId> Default for FullIdIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Insertion-ordered iterator over a [`FullIdIndex`]
pub struct Iter<'a, T> {
    index: &'a FullIdIndex<T>,
    cursor: Option<usize>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let position = self.cursor?;
        let slot = &self.index.slots[position];
        self.cursor = slot.next;
        self.remaining -= 1;
        slot.value.as_ref()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<'a, T: HasFullId> IntoIterator for &'a FullIdIndex<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
