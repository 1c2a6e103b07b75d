//! Callback registries shared by lists and selection trackers.

use smallvec::SmallVec;

/// Handle returned when a callback is registered. Pass it back to
/// `remove_listener` to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Hands out listener ids that are unique for one owner.
#[derive(Debug, Default)]
pub(crate) struct IdSource {
    next: u64,
}

impl IdSource {
    pub(crate) fn next(&mut self) -> ListenerId {
        let id = ListenerId(self.next);
        self.next += 1;
        return id;
    }
}

/// An ordered list of callbacks of one type. Most surfaces register one or
/// two listeners per event, so entries live inline.
pub(crate) struct Registry<F: ?Sized> {
    entries: SmallVec<[(ListenerId, Box<F>); 2]>,
    /// Ids removed while their entries were taken out for dispatch.
    pending_removal: SmallVec<[ListenerId; 2]>,
}

impl<F: ?Sized> Registry<F> {
    pub(crate) fn new() -> Registry<F> {
        return Registry {
            entries: SmallVec::new(),
            pending_removal: SmallVec::new(),
        };
    }

    pub(crate) fn add(&mut self, id: ListenerId, callback: Box<F>) {
        self.entries.push((id, callback));
    }

    /// Remove the callback registered under `id`. Returns false if it is not
    /// registered here.
    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        if let Some(at) = self.entries.iter().position(|(entry, _)| *entry == id) {
            self.entries.remove(at);
            return true;
        }
        return false;
    }

    /// Forget `id` once the entries currently out for dispatch come back.
    pub(crate) fn remove_after_dispatch(&mut self, id: ListenerId) {
        self.pending_removal.push(id);
    }

    pub(crate) fn len(&self) -> usize {
        return self.entries.len();
    }

    pub(crate) fn is_empty(&self) -> bool {
        return self.entries.is_empty();
    }

    pub(crate) fn callbacks(&mut self) -> impl Iterator<Item = &mut Box<F>> {
        return self.entries.iter_mut().map(|(_, callback)| callback);
    }

    /// Take every entry out so the callbacks can run without a borrow on the
    /// owner. Must be followed by [`Registry::restore`].
    pub(crate) fn take(&mut self) -> Registry<F> {
        return Registry {
            entries: std::mem::take(&mut self.entries),
            pending_removal: SmallVec::new(),
        };
    }

    /// Put entries taken by [`Registry::take`] back in front of any that were
    /// added during dispatch, dropping the ones removed meanwhile.
    pub(crate) fn restore(&mut self, mut taken: Registry<F>) {
        taken.entries.extend(self.entries.drain(..));
        let pending = std::mem::take(&mut self.pending_removal);
        taken.entries.retain(|(id, _)| !pending.contains(id));
        self.entries = taken.entries;
    }
}
