//! Append-only resource tables addressed by typed index handles.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Index of an entry in a [`ResourceTable<T>`].
///
/// Handles are never recycled: entries are only released with the table.
pub struct Handle<T> {
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Wrap a raw index. The result is only meaningful if the index is in range.
    pub const fn from_index(index: usize) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    /// Raw index into the table.
    pub const fn index(self) -> usize {
        self.index
    }
}

// Manual impls so `T` needs none of these traits.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.index)
    }
}

impl<T> fmt::Display for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index)
    }
}

/// Ordered, append-only sequence of resources.
#[derive(Debug)]
pub struct ResourceTable<T> {
    entries: Vec<T>,
}

impl<T> Default for ResourceTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResourceTable<T> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a resource and return its handle.
    pub fn push(&mut self, value: T) -> Handle<T> {
        self.entries.push(value);
        Handle::from_index(self.entries.len() - 1)
    }

    /// Whether `handle` refers to an entry of this table.
    pub fn contains(&self, handle: Handle<T>) -> bool {
        handle.index < self.entries.len()
    }

    /// Look up a resource.
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.entries.get(handle.index)
    }

    /// Look up a resource mutably.
    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.entries.get_mut(handle.index)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(handle, resource)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, value)| (Handle::from_index(index), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_returns_sequential_handles() {
        let mut table = ResourceTable::new();
        let a = table.push("a");
        let b = table.push("b");

        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(table.get(a), Some(&"a"));
        assert_eq!(table.get(b), Some(&"b"));
    }

    #[test]
    fn test_out_of_range_is_not_found() {
        let mut table = ResourceTable::new();
        table.push(1u32);

        let past_end = Handle::<u32>::from_index(1);
        assert!(!table.contains(past_end));
        assert!(table.get(past_end).is_none());
        assert!(table.get(Handle::from_index(usize::MAX)).is_none());
    }

    #[test]
    fn test_handles_stay_valid_as_table_grows() {
        let mut table = ResourceTable::new();
        let first = table.push(10);
        for i in 0..100 {
            table.push(i);
        }
        assert_eq!(table.get(first), Some(&10));
        assert_eq!(table.len(), 101);
    }

    #[test]
    fn test_iter_in_insertion_order() {
        let mut table = ResourceTable::new();
        table.push('x');
        table.push('y');

        let collected: Vec<_> = table.iter().map(|(h, v)| (h.index(), *v)).collect();
        assert_eq!(collected, vec![(0, 'x'), (1, 'y')]);
    }
}
