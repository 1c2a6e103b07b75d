//! Minimal splice diffs between two keyed sequences.
//!
//! The diff works on keys only. Callers derive a key per item with an
//! identity function and map the resulting splices back to items.
//!
//! The algorithm:
//!
//! 1. Trim the shared prefix and suffix. UI lists are usually near-identical
//!    between reconciliations, so this often leaves nothing to do.
//! 2. Find a longest common subsequence of the remaining window. Keys are
//!    unique on each side, so this is the longest increasing run of old
//!    positions taken in new order. Windows with no shared key skip straight
//!    to a full replace.
//! 3. Coalesce the deletions and insertions between two kept keys into one
//!    splice record.
//!
//! Cost is O((n + m) log n) time and O(n + m) space for a window of n old
//! and m new keys.

use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::error::DiffError;
use crate::error::Side;

/// A single contiguous replace-in-place operation.
///
/// `index` is the position in the sequence as it is when this record is
/// applied. Records are applied in ascending order and each one assumes the
/// ones before it were already applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpliceRecord<T> {
    pub index: usize,
    pub removed: Vec<T>,
    pub added: Vec<T>,
}

impl<T> SpliceRecord<T> {
    /// Create a splice record.
    pub fn new(index: usize, removed: Vec<T>, added: Vec<T>) -> SpliceRecord<T> {
        return SpliceRecord { index, removed, added };
    }

    /// Number of items this record removes plus the number it inserts.
    pub fn cost(&self) -> usize {
        return self.removed.len() + self.added.len();
    }

    /// True if the record neither removes nor inserts anything.
    pub fn is_noop(&self) -> bool {
        return self.removed.is_empty() && self.added.is_empty();
    }

    /// Net change in length after applying this record.
    pub fn delta(&self) -> isize {
        return self.added.len() as isize - self.removed.len() as isize;
    }
}

/// Compute the minimal splices that turn `old` into `new`.
///
/// Keys must be unique within each sequence. A key present in both is
/// treated as the same element, possibly moved.
pub fn compute_splices<K>(old: &[K], new: &[K]) -> Result<Vec<SpliceRecord<K>>, DiffError>
where
    K: Eq + Hash + Clone,
{
    check_unique(old, Side::Old)?;
    check_unique(new, Side::New)?;
    return Ok(splices_unchecked(old, new));
}

/// Verify that no key occurs twice in `keys`.
pub fn check_unique<K: Eq + Hash>(keys: &[K], side: Side) -> Result<(), DiffError> {
    index_keys(keys, side)?;
    return Ok(());
}

/// Map every key to its position, failing on the first repeated key.
pub(crate) fn index_keys<K: Eq + Hash>(keys: &[K], side: Side) -> Result<FxHashMap<&K, usize>, DiffError> {
    let mut positions: FxHashMap<&K, usize> =
        FxHashMap::with_capacity_and_hasher(keys.len(), Default::default());
    for (position, key) in keys.iter().enumerate() {
        if let Some(&first) = positions.get(key) {
            return Err(DiffError::DuplicateIdentity { side, first, second: position });
        }
        positions.insert(key, position);
    }
    return Ok(positions);
}

/// Total number of removed plus inserted keys across `splices`.
pub fn edit_distance<T>(splices: &[SpliceRecord<T>]) -> usize {
    return splices.iter().map(SpliceRecord::cost).sum();
}

/// Apply `splices` in order to `seq`.
///
/// Panics if a record does not line up with `seq`, which can only happen if
/// the records were produced for a different sequence.
pub fn apply_splices<T: Clone>(seq: &mut Vec<T>, splices: &[SpliceRecord<T>]) {
    for splice in splices {
        let end = splice.index + splice.removed.len();
        seq.splice(splice.index..end, splice.added.iter().cloned());
    }
}

/// Diff without the uniqueness check. Callers must have validated both
/// sides already.
pub(crate) fn splices_unchecked<K: Eq + Hash + Clone>(old: &[K], new: &[K]) -> Vec<SpliceRecord<K>> {
    let prefix = shared_prefix(old, new);
    let suffix = shared_suffix(&old[prefix..], &new[prefix..]);
    let old_window = &old[prefix..old.len() - suffix];
    let new_window = &new[prefix..new.len() - suffix];

    if old_window.is_empty() && new_window.is_empty() {
        return Vec::new();
    }

    let kept = common_subsequence(old_window, new_window);

    // Nothing shared, or one side exhausted: the whole window is one replace.
    if kept.is_empty() {
        return vec![SpliceRecord::new(prefix, old_window.to_vec(), new_window.to_vec())];
    }

    return group_gaps(&kept, old_window, new_window, prefix);
}

fn shared_prefix<K: Eq>(old: &[K], new: &[K]) -> usize {
    return old.iter().zip(new).take_while(|(a, b)| a == b).count();
}

fn shared_suffix<K: Eq>(old: &[K], new: &[K]) -> usize {
    return old.iter().rev().zip(new.iter().rev()).take_while(|(a, b)| a == b).count();
}

/// Pairs `(old index, new index)` of a longest common subsequence, ascending
/// in both coordinates. Both sides must be free of repeated keys.
fn common_subsequence<K: Eq + Hash>(old: &[K], new: &[K]) -> Vec<(usize, usize)> {
    let positions: FxHashMap<&K, usize> = old.iter().enumerate().map(|(index, key)| (key, index)).collect();
    let pairs: Vec<(usize, usize)> = new
        .iter()
        .enumerate()
        .filter_map(|(new_index, key)| positions.get(key).map(|&old_index| (old_index, new_index)))
        .collect();

    // tails[l] is the pair ending the lowest-ending increasing run of length l + 1.
    let mut tails: Vec<usize> = Vec::new();
    let mut previous: Vec<Option<usize>> = Vec::with_capacity(pairs.len());
    for (at, &(old_index, _)) in pairs.iter().enumerate() {
        let len = tails.partition_point(|&tail| pairs[tail].0 < old_index);
        previous.push(if len > 0 { Some(tails[len - 1]) } else { None });
        if len == tails.len() {
            tails.push(at);
        } else {
            tails[len] = at;
        }
    }

    let mut chain = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(at) = cursor {
        chain.push(pairs[at]);
        cursor = previous[at];
    }
    chain.reverse();
    return chain;
}

/// Emit one splice for every gap around the kept pairs. `offset` is the
/// length of the trimmed prefix, so indices come out relative to the full
/// sequence.
fn group_gaps<K: Clone>(kept: &[(usize, usize)], old: &[K], new: &[K], offset: usize) -> Vec<SpliceRecord<K>> {
    let mut splices = Vec::new();
    let mut index = offset;
    let (mut old_pos, mut new_pos) = (0, 0);

    let ends = kept.iter().copied().chain(std::iter::once((old.len(), new.len())));
    for (old_end, new_end) in ends {
        let removed = &old[old_pos..old_end];
        let added = &new[new_pos..new_end];
        if !removed.is_empty() || !added.is_empty() {
            splices.push(SpliceRecord::new(index, removed.to_vec(), added.to_vec()));
        }
        // Step over the inserted keys and the kept key that closes the gap.
        index += added.len() + 1;
        old_pos = old_end + 1;
        new_pos = new_end + 1;
    }

    return splices;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splices(old: &[u32], new: &[u32]) -> Vec<SpliceRecord<u32>> {
        return compute_splices(old, new).unwrap();
    }

    fn roundtrip(old: &[u32], new: &[u32]) {
        let result = splices(old, new);
        let mut seq = old.to_vec();
        apply_splices(&mut seq, &result);
        assert_eq!(seq, new, "applying {:?} to {:?}", result, old);
    }

    #[test]
    fn identical_sequences_produce_no_splices() {
        assert!(splices(&[1, 2, 3], &[1, 2, 3]).is_empty());
        assert!(splices(&[], &[]).is_empty());
    }

    #[test]
    fn single_removal_in_the_middle() {
        assert_eq!(splices(&[1, 2, 3], &[1, 3]), vec![SpliceRecord::new(1, vec![2], vec![])]);
    }

    #[test]
    fn empty_old_is_one_insert() {
        assert_eq!(splices(&[], &[4, 5, 6]), vec![SpliceRecord::new(0, vec![], vec![4, 5, 6])]);
    }

    #[test]
    fn empty_new_is_one_removal() {
        assert_eq!(splices(&[4, 5, 6], &[]), vec![SpliceRecord::new(0, vec![4, 5, 6], vec![])]);
    }

    #[test]
    fn disjoint_sequences_are_one_full_replace() {
        assert_eq!(
            splices(&[1, 2, 3], &[7, 8]),
            vec![SpliceRecord::new(0, vec![1, 2, 3], vec![7, 8])]
        );
    }

    #[test]
    fn append_is_one_splice_at_the_end() {
        assert_eq!(splices(&[1, 2, 3], &[1, 2, 3, 4, 5]), vec![SpliceRecord::new(3, vec![], vec![4, 5])]);
    }

    #[test]
    fn replacement_between_kept_keys_coalesces() {
        assert_eq!(
            splices(&[1, 2, 3, 4], &[1, 9, 8, 4]),
            vec![SpliceRecord::new(1, vec![2, 3], vec![9, 8])]
        );
    }

    #[test]
    fn swap_keeps_one_and_moves_the_other() {
        // Key 1 stays, key 2 is re-inserted in front of it.
        assert_eq!(
            splices(&[1, 2], &[2, 1]),
            vec![SpliceRecord::new(0, vec![], vec![2]), SpliceRecord::new(2, vec![2], vec![])]
        );
        roundtrip(&[1, 2], &[2, 1]);
    }

    #[test]
    fn later_indices_account_for_earlier_splices() {
        let result = splices(&[1, 2, 3, 4, 5, 6], &[0, 1, 3, 4, 6, 7]);
        assert_eq!(
            result,
            vec![
                SpliceRecord::new(0, vec![], vec![0]),
                SpliceRecord::new(2, vec![2], vec![]),
                SpliceRecord::new(4, vec![5], vec![]),
                SpliceRecord::new(5, vec![], vec![7]),
            ]
        );
        roundtrip(&[1, 2, 3, 4, 5, 6], &[0, 1, 3, 4, 6, 7]);
    }

    #[test]
    fn edit_distance_is_minimal_for_reversal() {
        let old = [1, 2, 3, 4];
        let new = [4, 3, 2, 1];
        // The longest common subsequence of a reversal has length one.
        assert_eq!(edit_distance(&splices(&old, &new)), 6);
        roundtrip(&old, &new);
    }

    #[test]
    fn large_disjoint_window_is_one_replace() {
        let old: Vec<u32> = (0..5_000).collect();
        let new: Vec<u32> = (5_000..10_000).collect();
        let result = splices(&old, &new);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].index, 0);
        assert_eq!(edit_distance(&result), 10_000);
    }

    #[test]
    fn large_reversal_keeps_one_key() {
        let old: Vec<u32> = (0..5_000).collect();
        let new: Vec<u32> = old.iter().rev().copied().collect();
        let result = splices(&old, &new);
        assert_eq!(edit_distance(&result), 2 * 4_999);
        roundtrip(&old, &new);
    }

    #[test]
    fn common_subsequence_is_ascending_in_both_sides() {
        let kept = common_subsequence(&[1, 2, 3, 4, 5], &[2, 9, 4, 1, 5]);
        assert_eq!(kept, vec![(1, 0), (3, 2), (4, 4)]);
    }

    #[test]
    fn roundtrips_assorted_shapes() {
        roundtrip(&[1, 2, 3, 4, 5], &[5, 1, 2, 3, 4]);
        roundtrip(&[1, 2, 3, 4, 5], &[2, 3, 4, 5, 1]);
        roundtrip(&[1, 3, 5, 7], &[2, 3, 4, 7, 8]);
        roundtrip(&[10], &[20]);
        roundtrip(&[1, 2, 3], &[3]);
    }

    #[test]
    fn duplicate_old_key_is_rejected() {
        assert_eq!(
            compute_splices(&[1, 2, 1], &[1]),
            Err(DiffError::DuplicateIdentity { side: Side::Old, first: 0, second: 2 })
        );
    }

    #[test]
    fn duplicate_new_key_is_rejected() {
        assert_eq!(
            compute_splices(&[1], &[3, 3]),
            Err(DiffError::DuplicateIdentity { side: Side::New, first: 0, second: 1 })
        );
    }

    #[test]
    fn splice_record_accounting() {
        let record = SpliceRecord::new(2, vec!['a', 'b'], vec!['c']);
        assert_eq!(record.cost(), 3);
        assert_eq!(record.delta(), -1);
        assert!(!record.is_noop());
        assert!(SpliceRecord::<char>::new(0, vec![], vec![]).is_noop());
    }
}
