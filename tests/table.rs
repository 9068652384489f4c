// Table unit test suite (public API).
//
// Each test documents what behavior is being verified and which
// invariants are assumed or asserted. The core invariants exercised:
// - Counting: len equals the number of distinct keys stored.
// - Lookup: find yields the most recently inserted value per key.
// - Growth: no key is lost when the bucket array doubles.
// - Ownership: every reference acquired by the table is released exactly
//   once (replace, remove, clear, drop) or handed over (pop).
// - Enumeration: first_key/next_key visit every key exactly once.
use std::cell::Cell;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::Arc;
use strtab::{Config, Evaluator, Insertion, Shared, Table, TableError, Value};

fn init_tracing() {
    let _ = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// Test: small table scenario.
// Assumes: hint 4 rounds to the 16-bucket floor.
// Verifies: count, find and remove on a two-entry table.
#[test]
fn hint_four_scenario() {
    init_tracing();
    let mut t: Table<Rc<str>> = Table::with_capacity(4);
    assert_eq!(t.capacity(), 16);
    t.insert("a", &Value::int(1)).unwrap();
    t.insert("b", &Value::int(2)).unwrap();
    assert_eq!(t.len(), 2);
    assert_eq!(t.find("a").map(|e| e.value().as_int()), Some(Some(1)));
    assert!(t.remove("b"));
    assert_eq!(t.len(), 1);
    assert!(t.find("b").is_none());
    assert!(!t.remove("b"));
}

// Test: twenty inserts from hint 0.
// Assumes: growth 16 -> 32 -> 64 as the load threshold is crossed.
// Verifies: every key findable, count 20, final size 64.
#[test]
fn twenty_keys_grow_twice() {
    init_tracing();
    let mut t: Table<Rc<str>> = Table::with_capacity(0);
    for i in 0..20 {
        assert_eq!(
            t.insert(&format!("key-{i}"), &Value::int(i)),
            Ok(Insertion::Created)
        );
    }
    assert_eq!(t.len(), 20);
    assert_eq!(t.capacity(), 64);
    for i in 0..20 {
        assert_eq!(
            t.find(&format!("key-{i}")).unwrap().value(),
            &Value::int(i)
        );
    }
}

// Test: replacement keeps one entry per key.
// Verifies: second insert reports Replaced and its value wins.
#[test]
fn replacement_keeps_single_entry() {
    let mut t: Table<Rc<str>> = Table::new();
    assert_eq!(t.insert("k", &Value::int(1)), Ok(Insertion::Created));
    assert_eq!(t.insert("k", &Value::int(2)), Ok(Insertion::Replaced));
    assert_eq!(t.len(), 1);
    assert_eq!(t.find("k").unwrap().value().as_int(), Some(2));
    assert_eq!(t.keys().unwrap(), vec!["k"]);
}

// Test: resource accounting across the whole lifecycle.
// Assumes: Rc strong counts observe acquire/release.
// Verifies: table holds exactly one reference per entry.
#[test]
fn resource_lifecycle() {
    let a: Rc<str> = Rc::from("a");
    let b: Rc<str> = Rc::from("b");
    let mut t: Table<Rc<str>> = Table::new();

    t.insert("x", &Value::Resource(a.clone())).unwrap();
    t.insert("y", &Value::Resource(a.clone())).unwrap();
    assert_eq!(Rc::strong_count(&a), 3);

    t.insert("x", &Value::Resource(b.clone())).unwrap();
    assert_eq!(Rc::strong_count(&a), 2);
    assert_eq!(Rc::strong_count(&b), 2);

    let held = t.get("x").unwrap();
    assert_eq!(Rc::strong_count(&b), 3);
    held.release();

    assert!(t.remove("y"));
    assert_eq!(Rc::strong_count(&a), 1);

    let popped = t.pop("x").unwrap();
    assert_eq!(Rc::strong_count(&b), 2);
    assert_eq!(popped.as_resource().map(|r| &**r), Some("b"));
    popped.release();
    assert_eq!(Rc::strong_count(&b), 1);
    assert!(t.is_empty());
}

// Test: teardown after growth.
// Verifies: dropping a grown table releases every stored reference.
#[test]
fn drop_releases_everything() {
    let rc: Rc<str> = Rc::from("payload");
    {
        let mut t: Table<Rc<str>> = Table::new();
        for i in 0..100 {
            t.insert(&format!("k{i}"), &Value::Resource(rc.clone()))
                .unwrap();
        }
        assert_eq!(Rc::strong_count(&rc), 101);
    }
    assert_eq!(Rc::strong_count(&rc), 1);
}

// Test: Arc values satisfy the same capability.
#[test]
fn arc_values() {
    let v = Arc::new(vec![1u8, 2, 3]);
    let mut t: Table<Arc<Vec<u8>>> = Table::new();
    t.insert("blob", &Value::Resource(v.clone())).unwrap();
    assert_eq!(Arc::strong_count(&v), 2);
    t.clear();
    assert_eq!(Arc::strong_count(&v), 1);
}

// Host-style handle whose references are tracked by a shared counter,
// standing in for a runtime's own acquire/release API.
struct Handle {
    live: Rc<Cell<isize>>,
}

impl Handle {
    fn new(live: &Rc<Cell<isize>>) -> Self {
        live.set(live.get() + 1);
        Handle { live: live.clone() }
    }
}

impl Shared for Handle {
    fn acquire(&self) -> Self {
        Handle::new(&self.live)
    }

    fn release(self) {
        self.live.set(self.live.get() - 1);
    }
}

// Test: custom capability implementations see balanced calls.
// Verifies: each acquire is matched by exactly one release.
#[test]
fn custom_capability_is_balanced() {
    let live = Rc::new(Cell::new(0));
    let mut t: Table<Handle> = Table::new();
    let h = Handle::new(&live);
    for i in 0..50 {
        t.insert(&format!("n{}", i % 30), &Value::Resource(h.acquire()))
            .unwrap();
        // The temporary copy above is dropped without release.
        live.set(live.get() - 1);
    }
    assert_eq!(live.get(), 1 + 30);
    for i in 0..10 {
        assert!(t.remove(&format!("n{i}")));
    }
    assert_eq!(live.get(), 1 + 20);
    drop(t);
    assert_eq!(live.get(), 1);
    h.release();
    assert_eq!(live.get(), 0);
}

// Test: enumeration completeness.
// Verifies: first_key/next_key visit each key once and stop.
#[test]
fn enumeration_visits_each_key_once() {
    let mut t: Table<Rc<str>> = Table::new();
    let keys: BTreeSet<String> = (0..75).map(|i| format!("sym{i}")).collect();
    for k in &keys {
        t.insert(k, &Value::int(0)).unwrap();
    }
    let mut seen = BTreeSet::new();
    let mut cur = t.first_key();
    while let Some(k) = cur {
        assert!(seen.insert(k.to_string()));
        cur = t.next_key(k).unwrap();
    }
    assert_eq!(seen, keys);
    assert_eq!(t.next_key("absent"), Err(TableError::KeyNotFound));
}

// Test: invalid keys.
// Verifies: empty and NUL-bearing keys are rejected and never found.
#[test]
fn invalid_keys() {
    let mut t: Table<Rc<str>> = Table::new();
    assert_eq!(t.insert("", &Value::int(1)), Err(TableError::InvalidKey));
    assert_eq!(t.insert("a\0", &Value::int(1)), Err(TableError::InvalidKey));
    assert!(t.find("").is_none());
    assert!(t.pop("").is_none());
    assert!(t.is_empty());
}

// Test: configuration floor.
#[test]
fn config_floor() {
    let t: Table<Rc<str>> = Table::with_config(Config::new().min_buckets(64).size_hint(3));
    assert_eq!(t.capacity(), 64);
    let t: Table<Rc<str>> = Table::with_config(Config::default().size_hint(100));
    assert_eq!(t.capacity(), 256);
}

// Test: evaluator handle.
// Verifies: validated names, at most one evaluator per table.
#[test]
fn evaluator_handle() {
    let mut t: Table<Rc<str>> = Table::new();
    assert!(Evaluator::named("1bad").is_err());
    let old = t.set_evaluator(Some(Evaluator::named("first").unwrap()));
    assert!(old.is_none());
    let old = t.set_evaluator(Some(Evaluator::named("second").unwrap()));
    assert_eq!(old.map(|e| e.to_string()), Some("first".to_string()));
    assert_eq!(t.evaluator().unwrap().name(), "second");
}

// Test: stats on a healthy table.
#[test]
fn stats_are_consistent() {
    let mut t: Table<Rc<str>> = Table::new();
    for i in 0..33 {
        t.insert(&format!("v{i}"), &Value::int(i)).unwrap();
    }
    let s = t.bucket_stats().unwrap();
    assert_eq!(s.entries, 33);
    assert_eq!(s.buckets, t.capacity());
    assert_eq!(s.histogram.iter().sum::<usize>(), s.buckets);
}

// Test: iterator and from_pairs.
#[test]
fn from_pairs_and_iter() {
    let t: Table<Rc<str>> = Table::from_pairs([
        ("one", Value::int(1)),
        ("two", Value::int(2)),
        ("three", Value::int(3)),
    ])
    .unwrap();
    let mut total = 0;
    for (_, v) in &t {
        total += v.as_int().unwrap();
    }
    assert_eq!(total, 6);
    assert_eq!(t.iter().count(), 3);
}
