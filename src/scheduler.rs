use core::cell::RefCell;
use core::fmt;
use core::mem;

use slab::Slab;

use crate::continuation::Continuation;

/// A position in a [`RoundRobin`] registry.
///
/// Tokens stay valid while other entries come and go. Once erased, the slot may be handed out
/// again by a later insert, so a token must not be used after it was erased.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Token(usize);

struct Entry<C> {
    value: C,
    prev: usize,
    next: usize,
}

/// An ordered, cyclic registry of values.
///
/// Entries are kept in insertion order and the order wraps from the last entry to the first.
/// Insertion, erasure, and finding the successor of an entry are all O(1).
///
/// # Examples
///
/// ```
/// use coop_task::RoundRobin;
///
/// let mut rr = RoundRobin::new();
/// let a = rr.insert("a");
/// let b = rr.insert("b");
///
/// assert_eq!(rr.resume(a), (&"b", true));
/// assert_eq!(rr.resume(b), (&"a", true));
///
/// rr.erase(b);
/// assert_eq!(rr.resume(a), (&"a", false));
/// ```
pub struct RoundRobin<C> {
    entries: Slab<Entry<C>>,

    /// The oldest registered entry.
    head: Option<usize>,
}

impl<C> RoundRobin<C> {
    /// Creates an empty registry.
    pub fn new() -> RoundRobin<C> {
        RoundRobin {
            entries: Slab::new(),
            head: None,
        }
    }

    /// Returns the number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends a value at the end of the cyclic order.
    pub fn insert(&mut self, value: C) -> Token {
        match self.head {
            None => {
                let key = self.entries.vacant_key();
                self.entries.insert(Entry {
                    value,
                    prev: key,
                    next: key,
                });
                self.head = Some(key);
                Token(key)
            }
            Some(head) => {
                let tail = self.entries[head].prev;
                let key = self.entries.insert(Entry {
                    value,
                    prev: tail,
                    next: head,
                });
                self.entries[tail].next = key;
                self.entries[head].prev = key;
                Token(key)
            }
        }
    }

    /// Removes an entry and returns its value.
    ///
    /// # Panics
    ///
    /// Panics if `token` is not registered.
    pub fn erase(&mut self, token: Token) -> C {
        let entry = self.entries.remove(token.0);

        if entry.next == token.0 {
            self.head = None;
        } else {
            self.entries[entry.prev].next = entry.next;
            self.entries[entry.next].prev = entry.prev;
            if self.head == Some(token.0) {
                self.head = Some(entry.next);
            }
        }

        entry.value
    }

    /// Returns the entry following `token`, wrapping from the last to the first.
    ///
    /// The flag is `true` if more than one entry is registered. If `token` is the only entry,
    /// its own value is returned.
    ///
    /// # Panics
    ///
    /// Panics if `token` is not registered.
    pub fn resume(&self, token: Token) -> (&C, bool) {
        let next = self.entries[token.0].next;
        (&self.entries[next].value, self.entries.len() > 1)
    }

    /// Returns the value registered under `token`, if any.
    pub fn get(&self, token: Token) -> Option<&C> {
        self.entries.get(token.0).map(|e| &e.value)
    }

    /// Iterates over the entries in cyclic order, starting from the oldest one.
    pub fn iter(&self) -> impl Iterator<Item = &C> + '_ {
        let mut cursor = self.head;
        let mut remaining = self.entries.len();

        core::iter::from_fn(move || {
            if remaining == 0 {
                return None;
            }
            let key = cursor?;
            let entry = &self.entries[key];
            remaining -= 1;
            cursor = Some(entry.next);
            Some(&entry.value)
        })
    }
}

impl<C> Default for RoundRobin<C> {
    fn default() -> RoundRobin<C> {
        RoundRobin::new()
    }
}

impl<C: fmt::Debug> fmt::Debug for RoundRobin<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// A round-robin scheduler for tasks.
///
/// Tasks register with a scheduler when they are created and deregister when they complete or
/// get dropped. When a task yields, the scheduler names the next registered task, and the
/// yielding task transfers control to it. The scheduler itself never runs anything.
///
/// A scheduler must outlive every task created with it, which the borrow checker enforces. A
/// task that is leaked instead of dropped is detached when the scheduler goes away: it is no
/// longer registered, and yielding from it hands control back to the driver.
///
/// # Examples
///
/// ```
/// use coop_task::{from_fn, Scheduler, Step, Task};
///
/// let sched = Scheduler::new();
/// let task = Task::new(&sched, from_fn(|| Step::Return(())));
/// assert_eq!(sched.len(), 1);
///
/// task.resume();
/// assert!(sched.is_empty());
/// ```
pub struct Scheduler {
    registry: RefCell<RoundRobin<Continuation>>,
}

impl Scheduler {
    /// Creates a scheduler with no registered tasks.
    pub fn new() -> Scheduler {
        Scheduler {
            registry: RefCell::new(RoundRobin::new()),
        }
    }

    /// Returns the number of registered tasks.
    pub fn len(&self) -> usize {
        self.registry.borrow().len()
    }

    /// Returns `true` if no task is registered.
    pub fn is_empty(&self) -> bool {
        self.registry.borrow().is_empty()
    }

    pub(crate) fn insert(&self, continuation: Continuation) -> Token {
        let token = self.registry.borrow_mut().insert(continuation);
        log::trace!("scheduler {:p}: insert {:?}", self, token);
        token
    }

    pub(crate) fn erase(&self, token: Token) {
        log::trace!("scheduler {:p}: erase {:?}", self, token);
        let continuation = self.registry.borrow_mut().erase(token);

        // Dropping the continuation may free the task, so do it outside the borrow.
        drop(continuation);
    }

    pub(crate) fn resume(&self, token: Token) -> (Continuation, bool) {
        let registry = self.registry.borrow();
        let (next, others) = registry.resume(token);
        log::trace!("scheduler {:p}: resume {:?} -> {:?}", self, token, next);
        (next.clone(), others)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let registry = mem::take(self.registry.get_mut());

        // Leaked tasks may still be resumed through their continuations, and must not reach
        // back into a scheduler that is gone.
        for continuation in registry.iter() {
            continuation.header().token.set(None);
        }
        if !registry.is_empty() {
            log::debug!("scheduler {:p}: dropped with {} tasks", self, registry.len());
        }
    }
}

impl Default for Scheduler {
    fn default() -> Scheduler {
        Scheduler::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.registry.try_borrow() {
            Ok(registry) => f
                .debug_struct("Scheduler")
                .field("registry", &*registry)
                .finish(),
            Err(_) => f.debug_struct("Scheduler").finish_non_exhaustive(),
        }
    }
}
