//! Key-based selection that follows a list through structural changes.
//!
//! A [`SelectionTracker`] stores keys, never raw indices, as the ground truth
//! of what is selected. Each key carries the index it was last seen at; the
//! tracker listens for `permuted` events on its list to move those indices
//! and to drop keys whose items were removed. `change` events drop a key
//! when the item at its index now has a different identity.
//!
//! Notifications are coalesced between [`SelectionTracker::begin_change`]
//! and [`SelectionTracker::end_change`]. A listener that changes the
//! selection while being notified has its own notification queued and
//! delivered once the current one completes.
//!
//! Selection listeners must not borrow the list. A list mutation that drops
//! selected keys notifies them while the list is still mutably borrowed by
//! the caller, so every notification carries the resolved indexes instead.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::hash::Hash;
use std::rc::Rc;
use std::rc::Weak;

use rustc_hash::FxHashMap;
use tracing::debug;
use tracing::warn;

use crate::error::SelectionError;
use crate::list::ObservableList;
use crate::list::SharedList;
use crate::listeners::IdSource;
use crate::listeners::ListenerId;
use crate::listeners::Registry;
use crate::permutation::Permutation;

/// How many keys may be selected at once.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectionMode {
    /// At most one key. Selecting another key replaces it.
    Single,
    #[default]
    Multiple,
}

/// Options for a [`SelectionTracker`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SelectionConfig {
    pub mode: SelectionMode,
}

impl SelectionConfig {
    pub fn with_mode(mut self, mode: SelectionMode) -> SelectionConfig {
        self.mode = mode;
        return self;
    }
}

/// Lifecycle of a tracker. Transitions are one-way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackerState {
    Attached,
    Detached,
}

/// Payload of a `selection-changed` notification.
///
/// `selected` is ordered by current index. `unselected` is ordered by the
/// index each key had when the outermost change began, that is at
/// [`SelectionTracker::begin_change`], before any list change made inside
/// the batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionDelta<K> {
    pub selected: Vec<K>,
    pub unselected: Vec<K>,
    /// Index of every selected item after the change, ascending.
    pub indexes: Vec<usize>,
}

impl<K> SelectionDelta<K> {
    pub fn is_empty(&self) -> bool {
        return self.selected.is_empty() && self.unselected.is_empty();
    }
}

/// A key with the index it was last seen at.
type Pinned<K> = Option<(K, usize)>;

fn key_of<K: Clone>(pinned: &Pinned<K>) -> Option<K> {
    return pinned.as_ref().map(|(key, _)| key.clone());
}

fn remap_pinned<K>(pinned: &mut Pinned<K>, permutation: &Permutation) {
    let moved = pinned.as_ref().and_then(|(_, index)| permutation.get(*index));
    match moved {
        Some(new) => {
            if let Some((_, index)) = pinned {
                *index = new;
            }
        }
        None => *pinned = None,
    }
}

/// The state at the start of the outermost open change.
struct Origin<K> {
    selected: FxHashMap<K, usize>,
    anchor: Option<K>,
    lead: Option<K>,
}

/// What changed over one outermost change. `None` means unchanged.
struct Notice<K> {
    delta: SelectionDelta<K>,
    anchor: Option<Option<K>>,
    lead: Option<Option<K>>,
}

struct Selection<K> {
    mode: SelectionMode,
    selected: FxHashMap<K, usize>,
    anchor: Pinned<K>,
    lead: Pinned<K>,
    depth: usize,
    origin: Option<Origin<K>>,
}

impl<K: Eq + Hash + Clone> Selection<K> {
    fn new(mode: SelectionMode) -> Selection<K> {
        return Selection {
            mode,
            selected: FxHashMap::default(),
            anchor: None,
            lead: None,
            depth: 0,
            origin: None,
        };
    }

    fn begin(&mut self) {
        if self.depth == 0 {
            self.origin = Some(Origin {
                selected: self.selected.clone(),
                anchor: key_of(&self.anchor),
                lead: key_of(&self.lead),
            });
        }
        self.depth += 1;
    }

    /// Close one level of change. At the outermost level, returns what
    /// differs from the state captured by the matching `begin`.
    fn end(&mut self) -> Option<Notice<K>> {
        if self.depth == 0 {
            return None;
        }
        self.depth -= 1;
        if self.depth > 0 {
            return None;
        }
        let origin = self.origin.take()?;

        let mut selected: Vec<(usize, K)> = self
            .selected
            .iter()
            .filter(|(key, _)| !origin.selected.contains_key(*key))
            .map(|(key, index)| (*index, key.clone()))
            .collect();
        selected.sort_unstable_by_key(|(index, _)| *index);

        let mut unselected: Vec<(usize, K)> = origin
            .selected
            .iter()
            .filter(|(key, _)| !self.selected.contains_key(*key))
            .map(|(key, index)| (*index, key.clone()))
            .collect();
        unselected.sort_unstable_by_key(|(index, _)| *index);

        let delta = SelectionDelta {
            selected: selected.into_iter().map(|(_, key)| key).collect(),
            unselected: unselected.into_iter().map(|(_, key)| key).collect(),
            indexes: self.sorted().into_iter().map(|(index, _)| index).collect(),
        };
        let anchor = key_of(&self.anchor);
        let anchor = if anchor != origin.anchor { Some(anchor) } else { None };
        let lead = key_of(&self.lead);
        let lead = if lead != origin.lead { Some(lead) } else { None };

        if delta.is_empty() && anchor.is_none() && lead.is_none() {
            return None;
        }
        return Some(Notice { delta, anchor, lead });
    }

    fn insert(&mut self, key: K, index: usize) {
        if self.mode == SelectionMode::Single {
            self.selected.clear();
        }
        self.selected.insert(key, index);
    }

    fn replace(&mut self, keys: Vec<(K, usize)>) {
        self.selected.clear();
        for (key, index) in keys {
            self.insert(key, index);
        }
    }

    /// Move every cached index through `permutation`, dropping keys whose
    /// items did not survive.
    fn remap(&mut self, permutation: &Permutation) {
        let before = self.selected.len();
        self.selected.retain(|_, index| match permutation.get(*index) {
            Some(new) => {
                *index = new;
                true
            }
            None => false,
        });
        remap_pinned(&mut self.anchor, permutation);
        remap_pinned(&mut self.lead, permutation);

        let dropped = before - self.selected.len();
        if dropped > 0 {
            debug!(dropped, remaining = self.selected.len(), "selection keys dropped by remap");
        }
    }

    /// The item at `index` now has identity `key`. Anything pinned to that
    /// index under a different key is gone.
    fn invalidate_at(&mut self, index: usize, key: &K) {
        let before = self.selected.len();
        self.selected.retain(|selected, at| *at != index || selected == key);
        for pinned in [&mut self.anchor, &mut self.lead] {
            if matches!(pinned.as_ref(), Some((pinned_key, at)) if *at == index && pinned_key != key) {
                *pinned = None;
            }
        }
        if self.selected.len() < before {
            debug!(index, "selection key dropped by in-place change");
        }
    }

    fn sorted(&self) -> Vec<(usize, &K)> {
        let mut entries: Vec<(usize, &K)> = self.selected.iter().map(|(key, index)| (*index, key)).collect();
        entries.sort_unstable_by_key(|(index, _)| *index);
        return entries;
    }
}

type ChangedCallback<K> = dyn FnMut(&SelectionDelta<K>);
type KeyCallback<K> = dyn FnMut(Option<&K>);

struct Callbacks<K> {
    ids: IdSource,
    dispatching: bool,
    queue: VecDeque<Notice<K>>,
    changed: Registry<ChangedCallback<K>>,
    lead: Registry<KeyCallback<K>>,
    anchor: Registry<KeyCallback<K>>,
}

/// State shared between the tracker handle and the listeners it registers
/// on its list.
struct Shared<K> {
    selection: RefCell<Selection<K>>,
    callbacks: RefCell<Callbacks<K>>,
}

impl<K: Eq + Hash + Clone> Shared<K> {
    fn new(mode: SelectionMode) -> Shared<K> {
        return Shared {
            selection: RefCell::new(Selection::new(mode)),
            callbacks: RefCell::new(Callbacks {
                ids: IdSource::default(),
                dispatching: false,
                queue: VecDeque::new(),
                changed: Registry::new(),
                lead: Registry::new(),
                anchor: Registry::new(),
            }),
        };
    }

    /// Run `f` as one change and notify listeners if anything differs.
    fn update<R>(&self, f: impl FnOnce(&mut Selection<K>) -> R) -> R {
        let (result, notice) = {
            let mut selection = self.selection.borrow_mut();
            selection.begin();
            let result = f(&mut *selection);
            (result, selection.end())
        };
        if let Some(notice) = notice {
            self.notify(notice);
        }
        return result;
    }

    fn notify(&self, notice: Notice<K>) {
        {
            let mut callbacks = self.callbacks.borrow_mut();
            callbacks.queue.push_back(notice);
            if callbacks.dispatching {
                return;
            }
            callbacks.dispatching = true;
        }

        loop {
            let (notice, mut changed, mut lead, mut anchor) = {
                let mut callbacks = self.callbacks.borrow_mut();
                let Some(notice) = callbacks.queue.pop_front() else {
                    callbacks.dispatching = false;
                    return;
                };
                let changed = callbacks.changed.take();
                let lead = callbacks.lead.take();
                let anchor = callbacks.anchor.take();
                (notice, changed, lead, anchor)
            };

            if !notice.delta.is_empty() {
                for callback in changed.callbacks() {
                    callback(&notice.delta);
                }
            }
            if let Some(key) = &notice.lead {
                for callback in lead.callbacks() {
                    callback(key.as_ref());
                }
            }
            if let Some(key) = &notice.anchor {
                for callback in anchor.callbacks() {
                    callback(key.as_ref());
                }
            }

            let mut callbacks = self.callbacks.borrow_mut();
            callbacks.changed.restore(changed);
            callbacks.lead.restore(lead);
            callbacks.anchor.restore(anchor);
        }
    }
}

/// Selection state bound to one [`ObservableList`].
///
/// The tracker holds only a weak reference to its list. Dropping the tracker
/// detaches it.
pub struct SelectionTracker<T, K> {
    list: Weak<RefCell<ObservableList<T>>>,
    identity: Rc<dyn Fn(&T) -> K>,
    shared: Rc<Shared<K>>,
    /// Listener ids on the list for `permuted` and `change`. `None` once
    /// detached.
    subscriptions: Option<(ListenerId, ListenerId)>,
}

impl<T, K> SelectionTracker<T, K> {
    pub fn state(&self) -> TrackerState {
        return match self.subscriptions {
            Some(_) => TrackerState::Attached,
            None => TrackerState::Detached,
        };
    }

    /// Unsubscribe from the list. Further operations fail with
    /// [`SelectionError::NotAttached`].
    pub fn detach(&mut self) -> Result<(), SelectionError> {
        let Some((on_permuted, on_change)) = self.subscriptions else {
            return Err(SelectionError::NotAttached);
        };
        if let Some(list) = self.list.upgrade() {
            let mut list = list.try_borrow_mut().map_err(|_| SelectionError::ListBusy)?;
            list.remove_listener(on_permuted);
            list.remove_listener(on_change);
        }
        self.subscriptions = None;
        debug!("selection tracker detached");
        return Ok(());
    }

    fn check_attached(&self) -> Result<(), SelectionError> {
        if self.subscriptions.is_none() {
            return Err(SelectionError::NotAttached);
        }
        return Ok(());
    }

    fn list(&self) -> Result<SharedList<T>, SelectionError> {
        self.check_attached()?;
        return self.list.upgrade().ok_or(SelectionError::ListDropped);
    }
}

impl<T: 'static, K: Eq + Hash + Clone + 'static> SelectionTracker<T, K> {
    /// Bind a new, empty selection to `list`.
    pub fn attach(
        list: &SharedList<T>,
        identity: impl Fn(&T) -> K + 'static,
        config: SelectionConfig,
    ) -> Result<SelectionTracker<T, K>, SelectionError> {
        let identity: Rc<dyn Fn(&T) -> K> = Rc::new(identity);
        let shared = Rc::new(Shared::new(config.mode));
        let mut target = list.try_borrow_mut().map_err(|_| SelectionError::ListBusy)?;

        let on_permuted = {
            let shared = shared.clone();
            target.on_permuted(move |permutation, _| {
                shared.update(|selection| selection.remap(permutation));
            })
        };

        let on_change = {
            let shared = shared.clone();
            let identity = identity.clone();
            target.on_change(move |index, items| {
                let Some(item) = items.get(index) else { return };
                let key = identity(item);
                shared.update(|selection| selection.invalidate_at(index, &key));
            })
        };

        drop(target);
        return Ok(SelectionTracker {
            list: Rc::downgrade(list),
            identity,
            shared,
            subscriptions: Some((on_permuted, on_change)),
        });
    }

    /// Every key in the list with its index.
    fn resolve_all(&self) -> Result<Vec<(K, usize)>, SelectionError> {
        let list = self.list()?;
        let list = list.try_borrow().map_err(|_| SelectionError::ListBusy)?;
        return Ok(list
            .iter()
            .enumerate()
            .map(|(index, item)| ((self.identity)(item), index))
            .collect());
    }

    fn index_of(&self, key: &K) -> Result<Option<usize>, SelectionError> {
        let list = self.list()?;
        let list = list.try_borrow().map_err(|_| SelectionError::ListBusy)?;
        return Ok(list.index_of_key(key, |item| (self.identity)(item)));
    }

    /// Replace the selection with those of `keys` present in the list.
    /// Keys that are not in the list are ignored.
    pub fn select(&mut self, keys: impl IntoIterator<Item = K>) -> Result<(), SelectionError> {
        let positions: FxHashMap<K, usize> = self.resolve_all()?.into_iter().collect();
        let wanted: Vec<(K, usize)> = keys
            .into_iter()
            .filter_map(|key| positions.get(&key).map(|&index| (key.clone(), index)))
            .collect();
        self.shared.update(|selection| selection.replace(wanted));
        return Ok(());
    }

    /// Select or unselect a single key. Selecting a key that is not in the
    /// list does nothing.
    pub fn set_selected(&mut self, key: K, selected: bool) -> Result<(), SelectionError> {
        if !selected {
            self.check_attached()?;
            self.shared.update(|selection| selection.selected.remove(&key));
            return Ok(());
        }
        if let Some(index) = self.index_of(&key)? {
            self.shared.update(|selection| selection.insert(key, index));
        }
        return Ok(());
    }

    /// Select every item. In single mode only the last item ends up
    /// selected.
    pub fn select_all(&mut self) -> Result<(), SelectionError> {
        let all = self.resolve_all()?;
        self.shared.update(|selection| selection.replace(all));
        return Ok(());
    }

    /// Add the items from `from` to `to` inclusive, in either direction. In
    /// single mode only `to` ends up selected.
    pub fn select_range(&mut self, from: usize, to: usize) -> Result<(), SelectionError> {
        let all = self.resolve_all()?;
        let len = all.len();
        for index in [from, to] {
            if index >= len {
                return Err(SelectionError::IndexOutOfRange { index, len });
            }
        }
        let range: Vec<(K, usize)> = if from <= to {
            all[from..=to].to_vec()
        } else {
            all[to..=from].iter().rev().cloned().collect()
        };
        self.shared.update(|selection| {
            for (key, index) in range {
                selection.insert(key, index);
            }
        });
        return Ok(());
    }

    /// Range-select from the anchor to `key` and make `key` the lead. The
    /// selection is replaced by the range. Without an anchor, `key` alone is
    /// selected and becomes both anchor and lead. A key not in the list does
    /// nothing.
    pub fn extend_to(&mut self, key: K) -> Result<(), SelectionError> {
        let all = self.resolve_all()?;
        let Some(to) = all.iter().position(|(candidate, _)| *candidate == key) else {
            return Ok(());
        };
        let anchor = self.shared.selection.borrow().anchor.as_ref().map(|(_, index)| *index);
        self.shared.update(|selection| match anchor {
            Some(from) => {
                let range: Vec<(K, usize)> = if from <= to {
                    all[from..=to].to_vec()
                } else {
                    all[to..=from].iter().rev().cloned().collect()
                };
                selection.replace(range);
                selection.lead = Some((key, to));
            }
            None => {
                selection.replace(vec![(key.clone(), to)]);
                selection.anchor = Some((key.clone(), to));
                selection.lead = Some((key, to));
            }
        });
        return Ok(());
    }

    /// Unselect everything. Anchor and lead are kept.
    pub fn clear(&mut self) -> Result<(), SelectionError> {
        self.check_attached()?;
        self.shared.update(|selection| selection.selected.clear());
        return Ok(());
    }

    /// Set the anchor. A key not in the list clears it.
    pub fn set_anchor(&mut self, key: Option<K>) -> Result<(), SelectionError> {
        let pinned = self.pin(key)?;
        self.shared.update(|selection| selection.anchor = pinned);
        return Ok(());
    }

    /// Set the lead. A key not in the list clears it.
    pub fn set_lead(&mut self, key: Option<K>) -> Result<(), SelectionError> {
        let pinned = self.pin(key)?;
        self.shared.update(|selection| selection.lead = pinned);
        return Ok(());
    }

    fn pin(&self, key: Option<K>) -> Result<Pinned<K>, SelectionError> {
        let Some(key) = key else {
            self.check_attached()?;
            return Ok(None);
        };
        return Ok(self.index_of(&key)?.map(|index| (key, index)));
    }

    /// Open a batch. Notifications are held until the matching outermost
    /// [`SelectionTracker::end_change`].
    pub fn begin_change(&mut self) -> Result<(), SelectionError> {
        self.check_attached()?;
        self.shared.selection.borrow_mut().begin();
        return Ok(());
    }

    /// Close a batch opened by [`SelectionTracker::begin_change`]. Closing
    /// the outermost batch fires one notification with the net change.
    pub fn end_change(&mut self) -> Result<(), SelectionError> {
        self.check_attached()?;
        let notice = self.shared.selection.borrow_mut().end();
        if let Some(notice) = notice {
            self.shared.notify(notice);
        }
        return Ok(());
    }

    /// Indices of the selected items, ascending.
    pub fn selected_indexes(&self) -> Result<Vec<usize>, SelectionError> {
        self.check_attached()?;
        let selection = self.shared.selection.borrow();
        return Ok(selection.sorted().into_iter().map(|(index, _)| index).collect());
    }

    /// Selected keys in list order.
    pub fn selected_keys(&self) -> Result<Vec<K>, SelectionError> {
        self.check_attached()?;
        let selection = self.shared.selection.borrow();
        return Ok(selection.sorted().into_iter().map(|(_, key)| key.clone()).collect());
    }

    pub fn is_selected(&self, key: &K) -> Result<bool, SelectionError> {
        self.check_attached()?;
        return Ok(self.shared.selection.borrow().selected.contains_key(key));
    }

    pub fn selected_count(&self) -> Result<usize, SelectionError> {
        self.check_attached()?;
        return Ok(self.shared.selection.borrow().selected.len());
    }

    pub fn anchor(&self) -> Result<Option<K>, SelectionError> {
        self.check_attached()?;
        return Ok(key_of(&self.shared.selection.borrow().anchor));
    }

    pub fn lead(&self) -> Result<Option<K>, SelectionError> {
        self.check_attached()?;
        return Ok(key_of(&self.shared.selection.borrow().lead));
    }

    pub fn anchor_index(&self) -> Result<Option<usize>, SelectionError> {
        self.check_attached()?;
        return Ok(self.shared.selection.borrow().anchor.as_ref().map(|(_, index)| *index));
    }

    pub fn lead_index(&self) -> Result<Option<usize>, SelectionError> {
        self.check_attached()?;
        return Ok(self.shared.selection.borrow().lead.as_ref().map(|(_, index)| *index));
    }

    /// Subscribe to `selection-changed`.
    ///
    /// The callback must not borrow the list: when a list mutation drops
    /// selected keys it runs while the caller still holds the list's
    /// `borrow_mut`. Everything a refresh needs is in the delta.
    pub fn on_selection_changed(
        &self,
        callback: impl FnMut(&SelectionDelta<K>) + 'static,
    ) -> Result<ListenerId, SelectionError> {
        self.check_attached()?;
        let mut callbacks = self.shared.callbacks.borrow_mut();
        let id = callbacks.ids.next();
        callbacks.changed.add(id, Box::new(callback));
        return Ok(id);
    }

    /// Subscribe to lead changes. The callback gets the new lead key.
    pub fn on_lead_changed(&self, callback: impl FnMut(Option<&K>) + 'static) -> Result<ListenerId, SelectionError> {
        self.check_attached()?;
        let mut callbacks = self.shared.callbacks.borrow_mut();
        let id = callbacks.ids.next();
        callbacks.lead.add(id, Box::new(callback));
        return Ok(id);
    }

    /// Subscribe to anchor changes. The callback gets the new anchor key.
    pub fn on_anchor_changed(&self, callback: impl FnMut(Option<&K>) + 'static) -> Result<ListenerId, SelectionError> {
        self.check_attached()?;
        let mut callbacks = self.shared.callbacks.borrow_mut();
        let id = callbacks.ids.next();
        callbacks.anchor.add(id, Box::new(callback));
        return Ok(id);
    }

    /// Unsubscribe a selection listener. Removing a listener while
    /// notifications are being delivered takes effect once delivery ends.
    pub fn remove_listener(&self, id: ListenerId) -> Result<bool, SelectionError> {
        self.check_attached()?;
        let mut callbacks = self.shared.callbacks.borrow_mut();
        if callbacks.changed.remove(id) || callbacks.lead.remove(id) || callbacks.anchor.remove(id) {
            return Ok(true);
        }
        if callbacks.dispatching {
            callbacks.changed.remove_after_dispatch(id);
            callbacks.lead.remove_after_dispatch(id);
            callbacks.anchor.remove_after_dispatch(id);
            return Ok(true);
        }
        warn!(?id, "remove_listener: no such selection listener");
        return Ok(false);
    }
}

impl<T, K> Drop for SelectionTracker<T, K> {
    fn drop(&mut self) {
        if self.subscriptions.is_some() && self.detach().is_err() {
            warn!("selection tracker dropped while its list was busy");
        }
    }
}
