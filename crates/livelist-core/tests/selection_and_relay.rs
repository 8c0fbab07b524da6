//! Selection facets, inversion, reorders through a selection, and the
//! thread-confinement relay.

use std::sync::{Arc, Mutex};
use std::thread;

use livelist_core::{ChangeBatch, ListChange, Pipeline, SharedPipeline};

#[test]
fn facets_partition_the_source() {
    let mut p = Pipeline::new();
    let root = p.root(vec!['a', 'b', 'c', 'd']);
    let sel = p.selection(root);

    // Everything starts deselected.
    assert_eq!(p.len(sel.selected), 0);
    assert_eq!(p.snapshot(sel.deselected), vec!['a', 'b', 'c', 'd']);

    assert!(p.select(sel.controller, 1));
    assert!(p.select(sel.controller, 3));
    assert!(!p.select(sel.controller, 1));

    assert!(p.is_selected(sel.controller, 1));
    assert!(!p.is_selected(sel.controller, 0));
    assert_eq!(p.snapshot(sel.selected), vec!['b', 'd']);
    assert_eq!(p.snapshot(sel.deselected), vec!['a', 'c']);

    assert!(p.deselect(sel.controller, 1));
    assert_eq!(p.snapshot(sel.selected), vec!['d']);
    assert_eq!(p.snapshot(sel.deselected), vec!['a', 'b', 'c']);
}

#[test]
fn source_edits_land_on_the_right_facet() {
    let mut p = Pipeline::new();
    let root = p.root(vec![10, 20, 30]);
    let sel = p.selection(root);
    p.select(sel.controller, 0);
    p.select(sel.controller, 2);

    let sel_log: Arc<Mutex<Vec<ChangeBatch<i32>>>> = Arc::new(Mutex::new(Vec::new()));
    let desel_log: Arc<Mutex<Vec<ChangeBatch<i32>>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let log = Arc::clone(&sel_log);
        p.subscribe(sel.selected, move |_, _, b| log.lock().unwrap().push(b.clone()));
    }
    {
        let log = Arc::clone(&desel_log);
        p.subscribe(sel.deselected, move |_, _, b| {
            log.lock().unwrap().push(b.clone())
        });
    }

    // New elements start deselected.
    p.push(root, 40);
    assert_eq!(p.snapshot(sel.deselected), vec![20, 40]);
    assert!(sel_log.lock().unwrap().is_empty());
    assert_eq!(
        desel_log.lock().unwrap().last(),
        Some(&ChangeBatch::Edits(vec![ListChange::Insert {
            index: 1,
            value: 40
        }]))
    );

    // Deleting a selected element only disturbs the selected facet.
    p.remove(root, 0).unwrap();
    assert_eq!(p.snapshot(sel.selected), vec![30]);
    assert_eq!(
        sel_log.lock().unwrap().last(),
        Some(&ChangeBatch::Edits(vec![ListChange::Delete { index: 0 }]))
    );
    assert_eq!(desel_log.lock().unwrap().len(), 1);

    // Updates reach the facet that holds the position.
    p.set(root, 0, 21).unwrap(); // 20 is deselected
    assert_eq!(
        desel_log.lock().unwrap().last(),
        Some(&ChangeBatch::Edits(vec![ListChange::Update {
            index: 0,
            value: 21
        }]))
    );
}

#[test]
fn select_all_and_invert() {
    let mut p = Pipeline::new();
    let root = p.root(vec![1, 2, 3, 4]);
    let sel = p.selection(root);
    p.select(sel.controller, 2);

    assert!(p.select_all(sel.controller));
    assert_eq!(p.snapshot(sel.selected), vec![1, 2, 3, 4]);
    assert_eq!(p.len(sel.deselected), 0);
    // Already everything selected: nothing to announce.
    assert!(!p.select_all(sel.controller));

    assert!(p.deselect(sel.controller, 0));
    assert!(p.invert_selection(sel.controller));
    assert_eq!(p.snapshot(sel.selected), vec![1]);
    assert_eq!(p.snapshot(sel.deselected), vec![2, 3, 4]);

    assert!(p.deselect_all(sel.controller));
    assert_eq!(p.len(sel.selected), 0);
    assert_eq!(p.snapshot(sel.deselected), vec![1, 2, 3, 4]);
}

#[test]
fn views_layer_over_facets() {
    let mut p = Pipeline::new();
    let root = p.root(vec![5, 2, 8, 1]);
    let sel = p.selection(root);
    let sorted_selected = p.sorted(sel.selected, |a: &i32, b: &i32| a.cmp(b));

    p.select(sel.controller, 0); // 5
    p.select(sel.controller, 2); // 8
    p.select(sel.controller, 3); // 1
    assert_eq!(p.snapshot(sorted_selected), vec![1, 5, 8]);

    p.deselect(sel.controller, 0);
    assert_eq!(p.snapshot(sorted_selected), vec![1, 8]);

    p.set(root, 2, 0).unwrap(); // selected 8 -> 0
    assert_eq!(p.snapshot(sorted_selected), vec![0, 1]);
}

#[test]
fn reorder_rebuilds_facet_mappings() {
    let mut p = Pipeline::new();
    let root = p.root(vec![30, 10, 20]);
    let sorted = p.sorted(root, |a: &i32, b: &i32| a.cmp(b));
    let sel = p.selection(sorted);
    p.select(sel.controller, 0); // value 10
    p.select(sel.controller, 2); // value 30
    assert_eq!(p.snapshot(sel.selected), vec![10, 30]);

    let sel_log: Arc<Mutex<Vec<ChangeBatch<i32>>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let log = Arc::clone(&sel_log);
        p.subscribe(sel.selected, move |_, _, b| log.lock().unwrap().push(b.clone()));
    }

    // Descending resort permutes the source under the selection; the
    // selected elements keep their identity.
    p.set_comparator(sorted, |a: &i32, b: &i32| b.cmp(a));
    assert_eq!(p.snapshot(sorted), vec![30, 20, 10]);
    assert!(p.is_selected(sel.controller, 0)); // 30
    assert!(p.is_selected(sel.controller, 2)); // 10
    assert!(!p.is_selected(sel.controller, 1));
    assert_eq!(p.snapshot(sel.selected), vec![30, 10]);

    // The facet saw one reorder batch: old [10, 30] -> new [30, 10].
    let batches = sel_log.lock().unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0], ChangeBatch::Reorder(vec![1, 0]));
}

#[test]
fn relay_delivers_synchronously_on_the_designated_thread() {
    let mut p = Pipeline::new();
    let root = p.root(vec![1]);
    let (_view, port) = p.relay(root, thread::current().id());

    let seen: Arc<Mutex<Vec<ChangeBatch<i32>>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = Arc::clone(&seen);
        port.subscribe(move |batch| seen.lock().unwrap().push(batch.clone()));
    }

    p.push(root, 2);
    // Same thread: no pump needed.
    assert_eq!(port.pending(), 0);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![ChangeBatch::Edits(vec![ListChange::Insert {
            index: 1,
            value: 2
        }])]
    );
}

#[test]
fn relay_queues_cross_thread_batches_until_pumped() {
    let shared = SharedPipeline::new(Pipeline::new());
    let (root, port) = {
        let mut p = shared.write();
        let root = p.root(vec![0]);
        // This test thread is the designated consumer.
        let (_view, port) = p.relay(root, thread::current().id());
        (root, port)
    };

    let seen: Arc<Mutex<Vec<ChangeBatch<i32>>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = Arc::clone(&seen);
        port.subscribe(move |batch| seen.lock().unwrap().push(batch.clone()));
    }

    let producer = {
        let shared = shared.clone();
        thread::spawn(move || {
            let mut p = shared.write();
            p.begin(root);
            p.push(root, 1);
            p.push(root, 2);
            p.commit(root);
            p.push(root, 3);
        })
    };
    producer.join().unwrap();

    // Nothing delivered until the designated thread pumps; then both
    // batches arrive, in order, each still atomic.
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(port.pending(), 2);
    assert_eq!(port.pump(), 2);
    let batches = seen.lock().unwrap();
    assert_eq!(
        *batches,
        vec![
            ChangeBatch::Edits(vec![
                ListChange::Insert { index: 1, value: 1 },
                ListChange::Insert { index: 2, value: 2 },
            ]),
            ChangeBatch::Edits(vec![ListChange::Insert { index: 3, value: 3 }]),
        ]
    );

    // The confined consumer saw enough to mirror the collection.
    assert_eq!(shared.read().snapshot(root), vec![0, 1, 2, 3]);
}

#[test]
fn pump_off_thread_is_a_fault() {
    let mut p: Pipeline<i32> = Pipeline::new();
    let root = p.root(vec![]);
    let (_view, port) = p.relay(root, thread::current().id());
    let result = thread::spawn(move || port.pump()).join();
    assert!(result.is_err(), "pumping off the designated thread must panic");
}
