//! Reconcile - observable ordered collections with key-based selection.
//!
//! A UI surface holds an [`ObservableList`]. Each time a fresh snapshot
//! arrives, [`ObservableList::apply_diff`] computes the minimal set of
//! splices between the current items and the snapshot by identity key, and
//! applies them while reporting `permuted`, `splice`, and `change` events.
//! A [`SelectionTracker`] bound to the list keeps its selection keyed by
//! identity, so it follows items through moves and drops them on removal.
//!
//! # Quick Start
//!
//! ```
//! use reconcile::ObservableList;
//! use reconcile::SelectionConfig;
//! use reconcile::SelectionTracker;
//!
//! let list = ObservableList::new(vec![1, 2, 3]).into_shared();
//! let mut selection = SelectionTracker::attach(&list, |item: &u32| *item, SelectionConfig::default()).unwrap();
//! selection.select([3]).unwrap();
//!
//! // Reconcile with a snapshot that drops 1 and adds 4.
//! list.borrow_mut().apply_diff(vec![2, 3, 4], |item| *item).unwrap();
//! assert_eq!(list.borrow().as_slice(), &[2, 3, 4]);
//! assert_eq!(selection.selected_indexes().unwrap(), vec![1]);
//! ```

pub mod collection;
pub mod diff;
pub mod error;
pub mod list;
pub mod listeners;
pub mod permutation;
pub mod selection;

pub use collection::Collection;
pub use diff::SpliceRecord;
pub use diff::compute_splices;
pub use error::DiffError;
pub use error::ListError;
pub use error::SelectionError;
pub use list::ObservableList;
pub use list::SharedList;
pub use listeners::ListenerId;
pub use permutation::Permutation;
pub use selection::SelectionConfig;
pub use selection::SelectionDelta;
pub use selection::SelectionMode;
pub use selection::SelectionTracker;
pub use selection::TrackerState;
