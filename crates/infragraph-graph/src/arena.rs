use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut, Range};

/// Typed handle into one generation's arena.
pub struct Ix<T> {
    raw: u32,
    _kind: PhantomData<fn() -> T>,
}

impl<T> Ix<T> {
    pub fn new(index: usize) -> Self {
        Self {
            raw: index as u32,
            _kind: PhantomData,
        }
    }

    pub fn index(self) -> usize {
        self.raw as usize
    }
}

impl<T> Clone for Ix<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Ix<T> {}

impl<T> PartialEq for Ix<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for Ix<T> {}

impl<T> PartialOrd for Ix<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Ix<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<T> Hash for Ix<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T> fmt::Debug for Ix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.raw)
    }
}

pub type IxIter<T> = std::iter::Map<Range<usize>, fn(usize) -> Ix<T>>;

/// Dense storage for one entity kind. Handles are only meaningful for the
/// generation that produced them.
pub struct Arena<T> {
    items: Vec<T>,
}

impl<T> Arena<T> {
    pub fn from_vec(items: Vec<T>) -> Self {
        Self { items }
    }

    pub fn push(&mut self, item: T) -> Ix<T> {
        self.items.push(item);
        Ix::new(self.items.len() - 1)
    }

    pub fn get(&self, ix: Ix<T>) -> Option<&T> {
        self.items.get(ix.index())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Handles in storage order. Does not borrow the arena.
    pub fn ids(&self) -> IxIter<T> {
        (0..self.items.len()).map(Ix::<T>::new as fn(usize) -> Ix<T>)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Ix<T>, &T)> {
        self.items.iter().enumerate().map(|(i, item)| (Ix::new(i), item))
    }

    pub fn values(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn values_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    /// Resolves a handle list to entity references.
    pub fn resolve<'a>(&'a self, ids: &'a [Ix<T>]) -> impl Iterator<Item = &'a T> + 'a {
        ids.iter().map(move |ix| &self.items[ix.index()])
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: fmt::Debug> fmt::Debug for Arena<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

impl<T> Index<Ix<T>> for Arena<T> {
    type Output = T;

    fn index(&self, ix: Ix<T>) -> &T {
        &self.items[ix.index()]
    }
}

impl<T> IndexMut<Ix<T>> for Arena<T> {
    fn index_mut(&mut self, ix: Ix<T>) -> &mut T {
        &mut self.items[ix.index()]
    }
}

/// Sorts and deduplicates a handle list in place.
///
/// Arenas are filled in their kind's canonical order, so handle order is
/// the display order.
pub fn canonicalize<T>(ids: &mut Vec<Ix<T>>) {
    ids.sort_unstable();
    ids.dedup();
}
