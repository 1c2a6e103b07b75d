//! End-to-end tests for lists, diffs, and selection trackers working
//! together through the public API.

use std::cell::RefCell;
use std::rc::Rc;

use reconcile::Collection;
use reconcile::ListError;
use reconcile::ObservableList;
use reconcile::Permutation;
use reconcile::SelectionConfig;
use reconcile::SelectionError;
use reconcile::SelectionTracker;
use reconcile::SpliceRecord;
use reconcile::compute_splices;
use reconcile::diff::apply_splices;
use reconcile::error::DiffError;
use reconcile::error::Side;

// =============================================================================
// Helper functions
// =============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn id(value: &u32) -> u32 {
    return *value;
}

#[derive(Clone, Debug, PartialEq)]
enum Event {
    Splice(SpliceRecord<u32>),
    Change(usize),
    Permuted(Vec<isize>),
}

fn record(list: &mut ObservableList<u32>) -> Rc<RefCell<Vec<Event>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    list.on_splice(move |record, _| sink.borrow_mut().push(Event::Splice(record.clone())));
    let sink = log.clone();
    list.on_change(move |index, _| sink.borrow_mut().push(Event::Change(index)));
    let sink = log.clone();
    list.on_permuted(move |permutation, _| sink.borrow_mut().push(Event::Permuted(permutation.to_signed())));
    return log;
}

// =============================================================================
// Reconciliation scenarios
// =============================================================================

#[test]
fn identical_snapshot_reports_identity_permutation_only() {
    init_tracing();
    assert!(compute_splices(&[1, 2, 3], &[1, 2, 3]).unwrap().is_empty());

    let mut list = ObservableList::new(vec![1, 2, 3]);
    let log = record(&mut list);
    assert!(!list.apply_diff(vec![1, 2, 3], id).unwrap());
    assert_eq!(*log.borrow(), vec![Event::Permuted(vec![0, 1, 2])]);
}

#[test]
fn removal_in_the_middle() {
    init_tracing();
    assert_eq!(
        compute_splices(&[1, 2, 3], &[1, 3]).unwrap(),
        vec![SpliceRecord::new(1, vec![2], vec![])]
    );

    let mut list = ObservableList::new(vec![1, 2, 3]);
    let log = record(&mut list);
    assert!(list.apply_diff(vec![1, 3], id).unwrap());
    assert_eq!(
        *log.borrow(),
        vec![
            Event::Permuted(vec![0, -1, 1]),
            Event::Splice(SpliceRecord::new(1, vec![2], vec![])),
        ]
    );
    assert_eq!(list.as_slice(), &[1, 3]);
}

#[test]
fn push_appends_with_one_splice() {
    init_tracing();
    let mut list = ObservableList::new(vec![1, 2, 3]);
    let log = record(&mut list);
    assert_eq!(list.push(vec![4, 5]), 5);
    assert_eq!(*log.borrow(), vec![Event::Splice(SpliceRecord::new(3, vec![], vec![4, 5]))]);
    assert_eq!(list.as_slice(), &[1, 2, 3, 4, 5]);
}

#[test]
fn removed_key_leaves_the_selection() {
    init_tracing();
    let list = ObservableList::new(vec![1, 2, 3]).into_shared();
    let mut selection = SelectionTracker::attach(&list, id, SelectionConfig::default()).unwrap();
    selection.select([2]).unwrap();
    assert_eq!(selection.selected_indexes().unwrap(), vec![1]);

    list.borrow_mut().apply_diff(vec![1, 3], id).unwrap();
    assert!(selection.selected_keys().unwrap().is_empty());
}

#[test]
fn replace_item_emits_change_without_permutation() {
    init_tracing();
    let list = ObservableList::new(vec![1, 2, 3]).into_shared();
    let mut selection = SelectionTracker::attach(&list, id, SelectionConfig::default()).unwrap();
    selection.select([3]).unwrap();
    let log = record(&mut list.borrow_mut());

    assert_eq!(list.borrow_mut().replace_item(2, 4), Ok(3));
    assert_eq!(*log.borrow(), vec![Event::Change(2)]);
    assert_eq!(list.borrow().as_slice(), &[1, 2, 4]);
    assert!(selection.selected_keys().unwrap().is_empty());
}

// =============================================================================
// Records and permutations
// =============================================================================

#[test]
fn splices_replay_onto_the_old_keys() {
    let old = vec!['a', 'b', 'c', 'd', 'e', 'f'];
    let new = vec!['x', 'b', 'd', 'y', 'f', 'z'];
    let splices = compute_splices(&old, &new).unwrap();
    let mut replay = old.clone();
    apply_splices(&mut replay, &splices);
    assert_eq!(replay, new);
}

#[test]
fn splice_events_replay_onto_a_mirror() {
    let mut list = ObservableList::new(vec![10, 20, 30, 40]);
    let mirror = Rc::new(RefCell::new(list.as_slice().to_vec()));
    let sink = mirror.clone();
    list.on_splice(move |record, _| apply_splices(&mut sink.borrow_mut(), std::slice::from_ref(record)));

    list.apply_diff(vec![40, 10, 50, 30], id).unwrap();
    list.splice(1, 2, vec![60]).unwrap();
    list.push(vec![70]);
    assert_eq!(*mirror.borrow(), list.as_slice());
}

#[test]
fn moved_items_map_to_their_new_index() {
    let mut list = ObservableList::new(vec![1, 2, 3, 4]);
    let seen = Rc::new(RefCell::new(None));
    let sink = seen.clone();
    list.on_permuted(move |permutation: &Permutation, _| *sink.borrow_mut() = Some(permutation.clone()));

    list.apply_diff(vec![4, 2, 1], id).unwrap();
    let permutation = seen.borrow().clone().unwrap();
    assert_eq!(permutation.as_slice(), &[Some(2), Some(1), None, Some(0)]);
    assert!(permutation.is_well_formed(3));
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn duplicate_keys_are_rejected_up_front() {
    assert_eq!(
        compute_splices(&[1, 2, 1], &[1]),
        Err(DiffError::DuplicateIdentity { side: Side::Old, first: 0, second: 2 })
    );

    let mut list = ObservableList::new(vec![1, 2]);
    let log = record(&mut list);
    let result = list.apply_diff(vec![3, 3], id);
    assert_eq!(
        result,
        Err(ListError::DuplicateIdentity(DiffError::DuplicateIdentity {
            side: Side::New,
            first: 0,
            second: 1,
        }))
    );
    assert_eq!(list.as_slice(), &[1, 2]);
    assert!(log.borrow().is_empty());
}

#[test]
fn out_of_range_indexes_are_rejected() {
    let mut list = ObservableList::new(vec![1, 2, 3]);
    assert_eq!(list.replace_item(3, 9), Err(ListError::IndexOutOfRange { index: 3, len: 3 }));
    assert_eq!(list.splice(4, 0, vec![9]), Err(ListError::IndexOutOfRange { index: 4, len: 3 }));
    assert_eq!(list.update_indexes([0, 5]), Err(ListError::IndexOutOfRange { index: 5, len: 3 }));
}

#[test]
fn detached_tracker_reports_not_attached() {
    let list = ObservableList::new(vec![1, 2, 3]).into_shared();
    let mut selection = SelectionTracker::attach(&list, id, SelectionConfig::default()).unwrap();
    selection.detach().unwrap();
    assert_eq!(selection.select([1]), Err(SelectionError::NotAttached));
    assert_eq!(selection.selected_keys(), Err(SelectionError::NotAttached));

    // The list keeps working without the tracker.
    list.borrow_mut().apply_diff(vec![3], id).unwrap();
    assert_eq!(list.borrow().as_slice(), &[3]);
}

#[test]
fn attaching_to_a_busy_list_fails() {
    let list = ObservableList::new(vec![1]).into_shared();
    let guard = list.borrow_mut();
    let result = SelectionTracker::attach(&list, id, SelectionConfig::default());
    assert!(matches!(result, Err(SelectionError::ListBusy)));
    drop(guard);
}

// =============================================================================
// Capability interface
// =============================================================================

fn fill<C: Collection<Item = u32>>(collection: &mut C) -> Vec<u32> {
    collection.push(vec![1, 2, 3]);
    let removed = collection.splice(1, 1, vec![7, 8]).unwrap();
    collection.replace_item(0, 9).unwrap();
    return removed;
}

#[test]
fn list_and_vec_agree_through_the_collection_trait() {
    let mut list: ObservableList<u32> = ObservableList::default();
    let mut model: Vec<u32> = Vec::new();
    assert_eq!(fill(&mut list), fill(&mut model));
    assert_eq!(list.as_slice(), model.as_slice());
    assert_eq!(Collection::len(&list), 4);
}

// =============================================================================
// Structured items
// =============================================================================

#[derive(Clone, Debug, PartialEq)]
struct Entry {
    id: u64,
    name: String,
}

fn entry(id: u64, name: &str) -> Entry {
    return Entry { id, name: name.to_string() };
}

#[test]
fn entries_are_reconciled_by_id_and_updated_by_value() {
    init_tracing();
    let list = ObservableList::new(vec![entry(1, "a"), entry(2, "b"), entry(3, "c")]).into_shared();
    let mut selection = SelectionTracker::attach(&list, |e: &Entry| e.id, SelectionConfig::default()).unwrap();
    selection.select([2, 3]).unwrap();

    let changes = Rc::new(RefCell::new(Vec::new()));
    let sink = changes.clone();
    list.borrow_mut().on_change(move |index, _| sink.borrow_mut().push(index));

    let snapshot = vec![entry(2, "renamed"), entry(3, "c"), entry(4, "d")];
    list.borrow_mut()
        .apply_diff_with_updates(snapshot.clone(), |e| e.id, |current, fresh| current != fresh)
        .unwrap();

    assert_eq!(list.borrow().as_slice(), snapshot.as_slice());
    assert_eq!(*changes.borrow(), vec![0]);
    assert_eq!(selection.selected_keys().unwrap(), vec![2, 3]);
    assert_eq!(selection.selected_indexes().unwrap(), vec![0, 1]);
}
