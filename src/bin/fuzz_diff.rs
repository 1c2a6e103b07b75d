//! AFL fuzz harness for list reconciliation
//!
//! Splits the input into two snapshots of distinct keys and checks:
//! 1. Round-trip: apply_diff leaves exactly the new snapshot
//! 2. Replay: the emitted splice events rebuild the new snapshot from the old
//! 3. Selection: selected keys survive exactly when their item survives

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use afl::fuzz;
use reconcile::ObservableList;
use reconcile::SelectionConfig;
use reconcile::SelectionTracker;
use reconcile::diff::apply_splices;

/// Keys in input order, skipping repeats.
fn distinct(bytes: &[u8]) -> Vec<u8> {
    let mut seen = BTreeSet::new();
    return bytes.iter().copied().filter(|byte| seen.insert(*byte)).collect();
}

fn main() {
    fuzz!(|data: &[u8]| {
        let Some((&split, rest)) = data.split_first() else {
            return;
        };
        let split = (split as usize).min(rest.len());
        let old = distinct(&rest[..split]);
        let new = distinct(&rest[split..]);

        let list = ObservableList::new(old.clone()).into_shared();
        let mirror = Rc::new(RefCell::new(old.clone()));
        let sink = mirror.clone();
        list.borrow_mut()
            .on_splice(move |record, _| apply_splices(&mut sink.borrow_mut(), std::slice::from_ref(record)));

        // Select every other key.
        let chosen: BTreeSet<u8> = old.iter().copied().step_by(2).collect();
        let mut selection = SelectionTracker::attach(&list, |key: &u8| *key, SelectionConfig::default())
            .expect("attach to an idle list");
        selection.select(chosen.iter().copied()).expect("select");

        list.borrow_mut().apply_diff(new.clone(), |key| *key).expect("keys are distinct");

        assert_eq!(list.borrow().as_slice(), new.as_slice(), "Round-trip failure");
        assert_eq!(*mirror.borrow(), new, "Splice replay failure");

        let expected: Vec<u8> = new.iter().copied().filter(|key| chosen.contains(key)).collect();
        assert_eq!(selection.selected_keys().expect("attached"), expected, "Selection failure");
    });
}
