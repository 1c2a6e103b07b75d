//! An ordered collection that reports every structural change.
//!
//! All notification is synchronous: by the time a mutating call returns,
//! every listener has seen the event, and the backing sequence already holds
//! the final state. Listeners receive the event payload together with a
//! read-only view of the items.
//!
//! Mutations take `&mut self`, so a listener cannot reach back into the list
//! it is being notified by. When the list is shared through [`SharedList`],
//! a reentrant mutation is refused by the `RefCell`.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::hash::Hash;
use std::rc::Rc;

use tracing::trace;
use tracing::warn;

use crate::collection::Collection;
use crate::collection::check_index;
use crate::collection::splice_range;
use crate::diff::SpliceRecord;
use crate::diff::index_keys;
use crate::diff::splices_unchecked;
use crate::error::ListError;
use crate::error::Side;
use crate::listeners::IdSource;
use crate::listeners::ListenerId;
use crate::listeners::Registry;
use crate::permutation::Permutation;

/// A list shared between a UI surface and the trackers bound to it.
pub type SharedList<T> = Rc<RefCell<ObservableList<T>>>;

type SpliceCallback<T> = dyn FnMut(&SpliceRecord<T>, &[T]);
type ChangeCallback<T> = dyn FnMut(usize, &[T]);
type PermutedCallback<T> = dyn FnMut(&Permutation, &[T]);

pub struct ObservableList<T> {
    items: Vec<T>,
    ids: IdSource,
    splice_listeners: Registry<SpliceCallback<T>>,
    change_listeners: Registry<ChangeCallback<T>>,
    permuted_listeners: Registry<PermutedCallback<T>>,
}

impl<T> ObservableList<T> {
    /// Create a list holding an initial snapshot.
    pub fn new(items: Vec<T>) -> ObservableList<T> {
        return ObservableList {
            items,
            ids: IdSource::default(),
            splice_listeners: Registry::new(),
            change_listeners: Registry::new(),
            permuted_listeners: Registry::new(),
        };
    }

    /// Wrap the list so trackers can hold a non-owning reference to it.
    pub fn into_shared(self) -> SharedList<T> {
        return Rc::new(RefCell::new(self));
    }

    pub fn len(&self) -> usize {
        return self.items.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.items.is_empty();
    }

    pub fn item_at(&self, index: usize) -> Option<&T> {
        return self.items.get(index);
    }

    /// The items in `start..end`, or `None` if the range is reversed or runs
    /// past the end.
    pub fn slice(&self, start: usize, end: usize) -> Option<&[T]> {
        return self.items.get(start..end);
    }

    pub fn as_slice(&self) -> &[T] {
        return &self.items;
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        return self.items.iter();
    }

    /// Position of the item whose identity is `key`.
    pub fn index_of_key<K: PartialEq>(&self, key: &K, identity: impl Fn(&T) -> K) -> Option<usize> {
        return self.items.iter().position(|item| identity(item) == *key);
    }

    /// The identity of every item, in order.
    pub fn keys<K>(&self, identity: impl Fn(&T) -> K) -> Vec<K> {
        return self.items.iter().map(identity).collect();
    }

    /// Subscribe to `splice` events.
    pub fn on_splice(&mut self, callback: impl FnMut(&SpliceRecord<T>, &[T]) + 'static) -> ListenerId {
        let id = self.ids.next();
        self.splice_listeners.add(id, Box::new(callback));
        return id;
    }

    /// Subscribe to `change` events.
    pub fn on_change(&mut self, callback: impl FnMut(usize, &[T]) + 'static) -> ListenerId {
        let id = self.ids.next();
        self.change_listeners.add(id, Box::new(callback));
        return id;
    }

    /// Subscribe to `permuted` events.
    pub fn on_permuted(&mut self, callback: impl FnMut(&Permutation, &[T]) + 'static) -> ListenerId {
        let id = self.ids.next();
        self.permuted_listeners.add(id, Box::new(callback));
        return id;
    }

    /// Unsubscribe a listener. Returns false if `id` was not registered.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let removed = self.splice_listeners.remove(id)
            || self.change_listeners.remove(id)
            || self.permuted_listeners.remove(id);
        if !removed {
            warn!(?id, "remove_listener: no such listener");
        }
        return removed;
    }

    pub fn listener_count(&self) -> usize {
        return self.splice_listeners.len() + self.change_listeners.len() + self.permuted_listeners.len();
    }

    /// Replace the value at `index` in place. Emits `change`, never
    /// `permuted`.
    pub fn replace_item(&mut self, index: usize, item: T) -> Result<T, ListError> {
        check_index(self.items.len(), index)?;
        let old = std::mem::replace(&mut self.items[index], item);
        self.emit_change(index);
        return Ok(old);
    }

    /// Report that the items at `indices` were mutated behind the list's
    /// back. Emits one `change` per distinct index, in ascending order.
    ///
    /// Every index is checked before anything is emitted.
    pub fn update_indexes(&mut self, indices: impl IntoIterator<Item = usize>) -> Result<(), ListError> {
        let mut indices: Vec<usize> = indices.into_iter().collect();
        indices.sort_unstable();
        indices.dedup();
        if let Some(&last) = indices.last() {
            check_index(self.items.len(), last)?;
        }
        for index in indices {
            self.emit_change(index);
        }
        return Ok(());
    }

    /// Stable sort. Emits a single `permuted` describing the reorder.
    pub fn sort_by(&mut self, mut compare: impl FnMut(&T, &T) -> Ordering) {
        let items = &self.items;
        let mut order: Vec<usize> = (0..items.len()).collect();
        order.sort_by(|&a, &b| compare(&items[a], &items[b]));

        let mut table = vec![None; order.len()];
        for (new, &old) in order.iter().enumerate() {
            table[old] = Some(new);
        }

        let mut slots: Vec<Option<T>> = std::mem::take(&mut self.items).into_iter().map(Some).collect();
        self.items = order.iter().filter_map(|&old| slots[old].take()).collect();

        let permutation = Permutation::from_vec(table);
        trace!(len = self.items.len(), identity = permutation.is_identity(), "sorted list");
        self.emit_permuted(&permutation);
    }

    fn emit_splice(&mut self, record: &SpliceRecord<T>) {
        for callback in self.splice_listeners.callbacks() {
            callback(record, &self.items);
        }
    }

    fn emit_change(&mut self, index: usize) {
        for callback in self.change_listeners.callbacks() {
            callback(index, &self.items);
        }
    }

    fn emit_permuted(&mut self, permutation: &Permutation) {
        debug_assert!(permutation.is_well_formed(self.items.len()));
        for callback in self.permuted_listeners.callbacks() {
            callback(permutation, &self.items);
        }
    }
}

impl<T: Clone> ObservableList<T> {
    /// Append `items`. Emits one `splice` at the old end and no `permuted`,
    /// since no existing item moves.
    pub fn push(&mut self, items: Vec<T>) -> usize {
        if items.is_empty() {
            return self.items.len();
        }
        let index = self.items.len();
        self.items.extend(items.iter().cloned());
        let record = SpliceRecord::new(index, Vec::new(), items);
        self.emit_splice(&record);
        return self.items.len();
    }

    /// Remove up to `delete_count` items at `index` and insert `items` in
    /// their place. The delete count is clamped to the end of the list; an
    /// `index` past the end is an error.
    ///
    /// Emits `permuted` with the positional shift, then one `splice` carrying
    /// the items actually removed.
    pub fn splice(&mut self, index: usize, delete_count: usize, items: Vec<T>) -> Result<Vec<T>, ListError> {
        let range = splice_range(self.items.len(), index, delete_count)?;
        if range.is_empty() && items.is_empty() {
            return Ok(Vec::new());
        }

        let old_len = self.items.len();
        let removed: Vec<T> = self.items.splice(range, items.iter().cloned()).collect();
        let permutation = Permutation::for_splice(old_len, index, removed.len(), items.len());
        self.emit_permuted(&permutation);

        let record = SpliceRecord::new(index, removed, items);
        self.emit_splice(&record);
        return Ok(record.removed);
    }

    /// Reconcile the list with `snapshot`.
    ///
    /// Items whose identity survives keep their existing instance; only the
    /// minimal set of splices is applied. Listeners see one `permuted` first,
    /// then the `splice` events left to right. Returns whether anything
    /// changed.
    ///
    /// A repeated identity in either the current items or the snapshot fails
    /// before the list is touched.
    pub fn apply_diff<K>(&mut self, snapshot: Vec<T>, identity: impl Fn(&T) -> K) -> Result<bool, ListError>
    where
        K: Eq + Hash + Clone,
    {
        return self.reconcile(snapshot, identity, None);
    }

    /// Like [`ObservableList::apply_diff`], but surviving items for which
    /// `changed(current, incoming)` holds are also replaced by the incoming
    /// value. One `change` per replaced index follows the `splice` events.
    pub fn apply_diff_with_updates<K>(
        &mut self,
        snapshot: Vec<T>,
        identity: impl Fn(&T) -> K,
        changed: impl Fn(&T, &T) -> bool,
    ) -> Result<bool, ListError>
    where
        K: Eq + Hash + Clone,
    {
        return self.reconcile(snapshot, identity, Some(&changed as &dyn Fn(&T, &T) -> bool));
    }

    fn reconcile<K>(
        &mut self,
        snapshot: Vec<T>,
        identity: impl Fn(&T) -> K,
        changed: Option<&dyn Fn(&T, &T) -> bool>,
    ) -> Result<bool, ListError>
    where
        K: Eq + Hash + Clone,
    {
        let old_keys: Vec<K> = self.items.iter().map(&identity).collect();
        let new_keys: Vec<K> = snapshot.iter().map(&identity).collect();
        index_keys(&old_keys, Side::Old)?;
        let new_positions = index_keys(&new_keys, Side::New)?;

        let splices = splices_unchecked(&old_keys, &new_keys);
        let permutation = Permutation::from_keys(&old_keys, |key| new_positions.get(key).copied());

        let old_len = self.items.len();
        let mut incoming: Vec<Option<T>> = snapshot.into_iter().map(Some).collect();
        let mut records = Vec::with_capacity(splices.len());
        for splice in &splices {
            let added_range = splice.index..splice.index + splice.added.len();
            let added: Vec<T> = added_range.filter_map(|at| incoming[at].take()).collect();
            debug_assert_eq!(added.len(), splice.added.len());

            let removed_range = splice.index..splice.index + splice.removed.len();
            let removed: Vec<T> = self.items.splice(removed_range, added.iter().cloned()).collect();
            records.push(SpliceRecord::new(splice.index, removed, added));
        }
        debug_assert_eq!(self.items.len(), incoming.len());

        // Whatever is left in `incoming` lines up with a surviving item.
        let mut updated = Vec::new();
        if let Some(changed) = changed {
            for (index, slot) in incoming.iter_mut().enumerate() {
                let Some(fresh) = slot.take() else { continue };
                if changed(&self.items[index], &fresh) {
                    self.items[index] = fresh;
                    updated.push(index);
                }
            }
        }

        trace!(
            old_len,
            new_len = self.items.len(),
            splices = records.len(),
            removed = permutation.removed_count(),
            updated = updated.len(),
            "applied diff"
        );

        self.emit_permuted(&permutation);
        for record in &records {
            self.emit_splice(record);
        }
        for index in &updated {
            self.emit_change(*index);
        }

        return Ok(!records.is_empty() || !updated.is_empty());
    }
}

impl<T> Default for ObservableList<T> {
    fn default() -> Self {
        return ObservableList::new(Vec::new());
    }
}

impl<T> FromIterator<T> for ObservableList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        return ObservableList::new(iter.into_iter().collect());
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ObservableList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return f
            .debug_struct("ObservableList")
            .field("items", &self.items)
            .field("listeners", &self.listener_count())
            .finish();
    }
}

impl<T: Clone> Collection for ObservableList<T> {
    type Item = T;

    fn len(&self) -> usize {
        return self.items.len();
    }

    fn item_at(&self, index: usize) -> Option<&T> {
        return self.items.get(index);
    }

    fn push(&mut self, items: Vec<T>) -> usize {
        return ObservableList::push(self, items);
    }

    fn splice(&mut self, index: usize, delete_count: usize, items: Vec<T>) -> Result<Vec<T>, ListError> {
        return ObservableList::splice(self, index, delete_count, items);
    }

    fn replace_item(&mut self, index: usize, item: T) -> Result<T, ListError> {
        return ObservableList::replace_item(self, index, item);
    }
}
