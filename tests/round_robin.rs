use std::cell::{Cell, RefCell};

use coop_task::{from_fn, Body, Builder, RoundRobin, Scheduler, Step, Task};

// Spawns a body that borrows locals of the test.
//
// The tasks are never leaked, so each one is dropped before what its body borrows.
fn spawn<'a, B: Body + 'a>(sched: &'a Scheduler, body: B) -> Task<'a, B::Output> {
    unsafe { Builder::new().spawn_unchecked(sched, body) }
}

// Creates a body that records its name on every turn.
//
// The body yields `yields` times and then finishes.
fn recorder(
    name: &'static str,
    yields: usize,
    sender: flume::Sender<(&'static str, usize)>,
) -> impl Body<Output = ()> {
    let mut turn = 0;
    from_fn(move || -> Step<()> {
        sender.send((name, turn)).unwrap();
        turn += 1;
        if turn <= yields {
            Step::Yield
        } else {
            Step::Done
        }
    })
}

#[test]
fn registry_order() {
    let mut rr = RoundRobin::new();
    let a = rr.insert('a');
    let b = rr.insert('b');
    let c = rr.insert('c');

    assert_eq!(rr.len(), 3);
    assert_eq!(rr.resume(a), (&'b', true));
    assert_eq!(rr.resume(b), (&'c', true));
    assert_eq!(rr.resume(c), (&'a', true));
    assert_eq!(rr.iter().copied().collect::<String>(), "abc");

    assert_eq!(rr.erase(b), 'b');
    assert_eq!(rr.resume(a), (&'c', true));
    assert_eq!(rr.resume(c), (&'a', true));
    assert_eq!(rr.get(b), None);
    assert_eq!(rr.get(c), Some(&'c'));
}

#[test]
fn registry_head_removal() {
    let mut rr = RoundRobin::new();
    let a = rr.insert(1);
    let b = rr.insert(2);
    let c = rr.insert(3);

    rr.erase(a);
    assert_eq!(rr.iter().copied().collect::<Vec<_>>(), [2, 3]);

    let d = rr.insert(4);
    assert_eq!(rr.iter().copied().collect::<Vec<_>>(), [2, 3, 4]);
    assert_eq!(rr.resume(d), (&2, true));
    assert_eq!(rr.resume(b), (&3, true));

    rr.erase(b);
    rr.erase(c);
    assert_eq!(rr.resume(d), (&4, false));

    rr.erase(d);
    assert!(rr.is_empty());
    assert_eq!(rr.iter().count(), 0);
}

#[test]
fn registry_reuses_slots() {
    let mut rr = RoundRobin::new();
    let a = rr.insert("a");
    let b = rr.insert("b");

    rr.erase(a);
    let c = rr.insert("c");
    assert_eq!(c, a);
    assert_eq!(rr.iter().copied().collect::<Vec<_>>(), ["b", "c"]);
    assert_eq!(rr.resume(b), (&"c", true));
}

#[test]
#[should_panic]
fn registry_erase_twice() {
    let mut rr = RoundRobin::new();
    let a = rr.insert(());
    rr.erase(a);
    rr.erase(a);
}

#[test]
fn fairness() {
    let sched = Scheduler::new();
    let (s, r) = flume::unbounded();

    let tasks = ["t1", "t2", "t3", "t4"]
        .iter()
        .map(|&name| Task::new(&sched, recorder(name, 1, s.clone())))
        .collect::<Vec<_>>();

    tasks[0].resume();

    let order = r.try_iter().map(|(name, _)| name).collect::<Vec<_>>();
    assert_eq!(order, ["t1", "t2", "t3", "t4", "t1", "t2", "t3", "t4"]);
    assert!(tasks.iter().all(|t| t.is_done()));
    assert!(sched.is_empty());
}

#[test]
fn self_resumption() {
    let sched = Scheduler::new();
    let sizes = RefCell::new(Vec::new());

    let task = {
        let (sched, sizes) = (&sched, &sizes);
        let mut turn = 0;
        spawn(
            sched,
            from_fn(move || {
                sizes.borrow_mut().push(sched.len());
                turn += 1;
                if turn < 4 {
                    Step::Yield
                } else {
                    Step::Return(turn)
                }
            }),
        )
    };

    assert_eq!(task.resume().as_deref(), Some(&4));
    assert_eq!(*sizes.borrow(), [1, 1, 1, 1]);
    assert!(sched.is_empty());
}

#[test]
fn completion_deregisters() {
    let sched = Scheduler::new();
    let (s, r) = flume::unbounded();

    let t1 = Task::new(&sched, recorder("t1", 0, s.clone()));
    let t2 = Task::new(&sched, recorder("t2", 1, s.clone()));
    let t3 = Task::new(&sched, recorder("t3", 1, s.clone()));
    assert_eq!(sched.len(), 3);

    t1.resume();

    let order = r.try_iter().collect::<Vec<_>>();
    assert_eq!(
        order,
        [("t1", 0), ("t2", 0), ("t3", 0), ("t2", 1), ("t3", 1)]
    );
    assert!(!t1.is_registered());
    assert!(t2.is_done() && t3.is_done());
    assert!(sched.is_empty());

    // A finished task is never handed control again.
    t2.resume();
    assert_eq!(r.try_iter().count(), 0);
}

#[test]
fn partial_completion_set() {
    let sched = Scheduler::new();
    let out = RefCell::new(String::new());

    let producer = |parts: &'static [&'static str]| {
        let out = &out;
        let mut parts = parts.iter().peekable();
        from_fn(move || -> Step<()> {
            if let Some(part) = parts.next() {
                out.borrow_mut().push_str(part);
            }
            if parts.peek().is_some() {
                Step::Yield
            } else {
                Step::Done
            }
        })
    };

    let a = spawn(&sched, producer(&["a1", "a2"]));
    let b = spawn(&sched, producer(&["b1"]));
    let c = spawn(&sched, producer(&["c1", "c2"]));
    let d = spawn(&sched, producer(&["d1"]));

    a.resume();

    assert_eq!(*out.borrow(), "a1b1c1d1a2c2");
    assert!(a.is_done() && b.is_done() && c.is_done() && d.is_done());
    assert!(sched.is_empty());
}

#[test]
fn driver_loop() {
    let sched = Scheduler::new();
    let out = RefCell::new(Vec::new());

    // Emitting hands control back to the driver without losing the task's place.
    let emitter = {
        let out = &out;
        let mut n = 0;
        spawn(
            &sched,
            from_fn(move || {
                n += 1;
                out.borrow_mut().push(n);
                if n < 3 {
                    Step::Emit(n)
                } else {
                    Step::Return(n)
                }
            }),
        )
    };
    let yielder = {
        let out = &out;
        let mut n = 10;
        spawn(
            &sched,
            from_fn(move || {
                n += 1;
                out.borrow_mut().push(n);
                if n < 12 {
                    Step::Yield
                } else {
                    Step::Return(n)
                }
            }),
        )
    };

    let mut values = Vec::new();
    while !yielder.is_done() {
        values.extend(yielder.resume().as_deref().copied());
    }

    assert_eq!(*out.borrow(), [11, 1, 12, 2]);
    assert_eq!(values, [12]);
    assert_eq!(emitter.value().as_deref(), Some(&2));
    assert_eq!(sched.len(), 1);

    assert_eq!(emitter.resume().as_deref(), Some(&3));
    assert!(sched.is_empty());
}

#[test]
fn long_chain() {
    const TURNS: usize = 100_000;

    let sched = Scheduler::new();
    let count = Cell::new(0);

    let make = || {
        let count = &count;
        let mut turn = 0;
        from_fn(move || -> Step<()> {
            count.set(count.get() + 1);
            turn += 1;
            if turn < TURNS {
                Step::Yield
            } else {
                Step::Done
            }
        })
    };

    let a = spawn(&sched, make());
    let b = spawn(&sched, make());

    a.resume();
    assert_eq!(count.get(), 2 * TURNS);
    assert!(a.is_done() && b.is_done());
}
