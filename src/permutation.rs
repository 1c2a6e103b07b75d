//! Index remap tables produced by structural list changes.

/// Maps every old index to its new index, or to `None` if the element at
/// that index was removed.
///
/// Surviving entries are pairwise distinct and lie below the new length.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Permutation(Vec<Option<usize>>);

impl Permutation {
    /// The permutation that moves nothing.
    pub fn identity(len: usize) -> Permutation {
        return Permutation((0..len).map(Some).collect());
    }

    /// Wrap a raw table.
    pub fn from_vec(table: Vec<Option<usize>>) -> Permutation {
        return Permutation(table);
    }

    /// Positional remap for a single splice on a list of `old_len` items:
    /// `removed` items starting at `index` are dropped and `added` items are
    /// inserted in their place.
    pub fn for_splice(old_len: usize, index: usize, removed: usize, added: usize) -> Permutation {
        debug_assert!(index + removed <= old_len);
        let mut table = Vec::with_capacity(old_len);
        table.extend((0..index).map(Some));
        table.extend(std::iter::repeat(None).take(removed));
        table.extend((index + removed..old_len).map(|old| Some(old - removed + added)));
        return Permutation(table);
    }

    /// Net remap of a reconciliation: each old key is looked up in the new
    /// sequence.
    pub fn from_keys<K>(old_keys: &[K], mut new_index_of: impl FnMut(&K) -> Option<usize>) -> Permutation {
        return Permutation(old_keys.iter().map(|key| new_index_of(key)).collect());
    }

    /// Length of the table, which is the length before the change.
    pub fn len(&self) -> usize {
        return self.0.len();
    }

    /// True if the list was empty before the change.
    pub fn is_empty(&self) -> bool {
        return self.0.is_empty();
    }

    /// New index of the element that was at `old`, if it survived.
    pub fn get(&self, old: usize) -> Option<usize> {
        return self.0.get(old).copied().flatten();
    }

    /// True if every element stayed where it was.
    pub fn is_identity(&self) -> bool {
        return self.0.iter().enumerate().all(|(old, new)| *new == Some(old));
    }

    /// Number of elements that did not survive.
    pub fn removed_count(&self) -> usize {
        return self.0.iter().filter(|new| new.is_none()).count();
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<usize>> + '_ {
        return self.0.iter().copied();
    }

    pub fn as_slice(&self) -> &[Option<usize>] {
        return &self.0;
    }

    /// The table with `-1` standing in for removed elements.
    pub fn to_signed(&self) -> Vec<isize> {
        return self.0.iter().map(|new| new.map_or(-1, |index| index as isize)).collect();
    }

    /// Check that surviving entries are distinct and below `new_len`.
    pub fn is_well_formed(&self, new_len: usize) -> bool {
        let mut seen = vec![false; new_len];
        for new in self.0.iter().flatten() {
            match seen.get_mut(*new) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
        return true;
    }
}
