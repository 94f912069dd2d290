use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Mutex, Once};

use coop_task::{from_fn, Body, Builder, Scheduler, Step, Task, TaskState};
use log::{Level, LevelFilter, Log, Metadata, Record};

// Collects every record logged by the crate.
struct Capture {
    records: Mutex<Vec<(Level, String)>>,
}

impl Log for Capture {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.target().starts_with("coop_task")
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            self.records
                .lock()
                .unwrap()
                .push((record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

static CAPTURE: Capture = Capture {
    records: Mutex::new(Vec::new()),
};

fn capture() -> &'static Capture {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        log::set_logger(&CAPTURE).unwrap();
        log::set_max_level(LevelFilter::Trace);
    });
    &CAPTURE
}

// Returns `true` if some record at `level` contains `needle`.
fn logged(level: Level, needle: &str) -> bool {
    capture()
        .records
        .lock()
        .unwrap()
        .iter()
        .any(|(l, msg)| *l == level && msg.contains(needle))
}

// Spawns a body that borrows locals of the test.
//
// The tasks are never leaked, so each one is dropped before what its body borrows.
fn spawn<'a, B: Body + 'a>(sched: &'a Scheduler, body: B) -> Task<'a, B::Output> {
    unsafe { Builder::new().spawn_unchecked(sched, body) }
}

#[test]
fn panic_is_absorbed() {
    capture();
    let sched = Scheduler::new();
    let (s, r) = flume::unbounded();

    let a = Task::new(
        &sched,
        from_fn(|| -> Step<i32> { panic!("absorbed-boom") }),
    );
    let b = Task::new(
        &sched,
        from_fn(move || {
            s.send("b").unwrap();
            Step::Return(2)
        }),
    );

    // The failure ends `a`, and control moves on to `b`.
    assert!(a.resume().is_none());
    assert!(a.is_done());
    assert!(a.has_panicked());
    assert!(!a.is_registered());

    assert_eq!(r.try_iter().collect::<Vec<_>>(), ["b"]);
    assert!(b.is_done() && !b.has_panicked());
    assert!(sched.is_empty());

    assert!(logged(Level::Error, "panicked: absorbed-boom"));
}

#[test]
fn panic_clears_value() {
    capture();
    let sched = Scheduler::new();

    let mut turns = 0;
    let task = Task::new(
        &sched,
        from_fn(move || {
            turns += 1;
            if turns < 2 {
                Step::Emit(String::from("partial"))
            } else {
                panic!("cleared-boom")
            }
        }),
    );

    assert_eq!(task.resume().as_deref().map(String::as_str), Some("partial"));
    assert!(task.resume().is_none());
    assert!(task.has_panicked());
    assert_eq!(task.state(), TaskState::Completed);
}

#[test]
fn panic_is_propagated() {
    capture();
    let sched = Scheduler::new();

    let b = Builder::new()
        .propagate_panic(true)
        .spawn(&sched, from_fn(|| -> Step<i32> { panic!("propagated-boom") }));

    let a = {
        let b = &b;
        let mut awaited = false;
        spawn(
            &sched,
            from_fn(move || {
                if !awaited {
                    awaited = true;
                    return Step::Await(b.continuation());
                }
                Step::Return(b.value().map_or(-1, |v| *v))
            }),
        )
    };

    let payload = catch_unwind(AssertUnwindSafe(|| a.resume().is_some())).unwrap_err();
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"propagated-boom"));

    // The failed task is finished and its awaiter is free to go on.
    assert!(b.is_done() && b.has_panicked());
    assert!(!b.is_registered());
    assert_eq!(a.state(), TaskState::Yielded);
    assert_eq!(sched.len(), 1);

    assert_eq!(a.resume().as_deref(), Some(&-1));
    assert!(sched.is_empty());

    assert!(logged(Level::Debug, "panicked: propagated-boom"));
    assert!(!logged(Level::Error, "propagated-boom"));
}

#[test]
fn transfers_are_traced() {
    capture();
    let sched = Scheduler::new();
    let task = Task::new(&sched, from_fn(|| Step::Return("traced")));

    task.resume();
    assert!(logged(Level::Trace, "registered as"));
    assert!(logged(Level::Trace, "completed"));
}
