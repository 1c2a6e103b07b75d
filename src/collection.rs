use std::ops::Range;

use crate::error::ListError;

/// The fixed set of array-like capabilities a list surface exposes.
///
/// `ObservableList` implements it with change notification; `Vec` implements
/// it silently, which makes it a handy reference model in tests.
pub trait Collection {
    type Item;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        return self.len() == 0;
    }

    fn item_at(&self, index: usize) -> Option<&Self::Item>;

    /// Append `items`, returning the new length.
    fn push(&mut self, items: Vec<Self::Item>) -> usize;

    /// Remove up to `delete_count` items at `index` and insert `items` there.
    /// Returns the items actually removed.
    fn splice(
        &mut self,
        index: usize,
        delete_count: usize,
        items: Vec<Self::Item>,
    ) -> Result<Vec<Self::Item>, ListError>;

    /// Replace the item at `index`, returning the old one.
    fn replace_item(&mut self, index: usize, item: Self::Item) -> Result<Self::Item, ListError>;
}

/// Resolve a splice request against a list of `len` items.
///
/// `index` may equal `len` (insert at the end) but not exceed it. The delete
/// count is clamped to the available tail, like `Array.prototype.splice`.
pub(crate) fn splice_range(len: usize, index: usize, delete_count: usize) -> Result<Range<usize>, ListError> {
    if index > len {
        return Err(ListError::IndexOutOfRange { index, len });
    }
    let end = index + delete_count.min(len - index);
    return Ok(index..end);
}

/// Fail unless `index` addresses an existing item.
pub(crate) fn check_index(len: usize, index: usize) -> Result<(), ListError> {
    if index >= len {
        return Err(ListError::IndexOutOfRange { index, len });
    }
    return Ok(());
}

impl<T> Collection for Vec<T> {
    type Item = T;

    fn len(&self) -> usize {
        return Vec::len(self);
    }

    fn item_at(&self, index: usize) -> Option<&T> {
        return self.get(index);
    }

    fn push(&mut self, items: Vec<T>) -> usize {
        self.extend(items);
        return Vec::len(self);
    }

    fn splice(&mut self, index: usize, delete_count: usize, items: Vec<T>) -> Result<Vec<T>, ListError> {
        let range = splice_range(Vec::len(self), index, delete_count)?;
        return Ok(Vec::splice(self, range, items).collect());
    }

    fn replace_item(&mut self, index: usize, item: T) -> Result<T, ListError> {
        check_index(Vec::len(self), index)?;
        return Ok(std::mem::replace(&mut self[index], item));
    }
}
