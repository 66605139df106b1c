//! Dispatcher objects: the unit of wait.
//!
//! Every kind shares a header carrying the signal state and the waiter
//! chain; operations that do not depend on the variant go through the
//! header, hot paths match on the tag. The chain stores (thread, key)
//! pairs in head-insertion order; the most recent waiter is walked first,
//! which is the wake order the engine guarantees.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::thread::ThreadId;

pub type SyncRef = Rc<RefCell<Dispatcher>>;
pub type SyncWeak = Weak<RefCell<Dispatcher>>;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum EventKind {
    /// Manual-reset: stays signaled until explicitly reset.
    Notification,
    /// Auto-reset: consumed by the first satisfied wait.
    Synchronization,
}

/// One entry in an object's waiter chain. Non-owning: the thread slab is
/// the authority on thread state, this is just the back-reference the
/// signal walk follows.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Waiter {
    pub thread: ThreadId,
    pub wait_key: u32,
}

#[derive(Default, Debug)]
pub struct DispatcherHeader {
    /// `> 0` means signaled; mutants go negative to count recursion.
    pub signal: i32,
    /// Head-insertion chain: index 0 is the most recent waiter.
    pub waiters: Vec<Waiter>,
}

impl DispatcherHeader {
    fn signaled(initial: bool) -> DispatcherHeader {
        DispatcherHeader { signal: if initial { 1 } else { 0 }, waiters: Vec::new() }
    }

    pub fn link_waiter_at_head(&mut self, waiter: Waiter) {
        self.waiters.insert(0, waiter);
    }

    pub fn unlink_waiter(&mut self, thread: ThreadId) {
        self.waiters.retain(|w| w.thread != thread);
    }
}

#[derive(Debug)]
pub enum Dispatcher {
    Event {
        header: DispatcherHeader,
        kind: EventKind,
    },
    Semaphore {
        header: DispatcherHeader,
        limit: i32,
    },
    Mutant {
        header: DispatcherHeader,
        owner: ThreadId,
        recursion: u32,
        abandoned: bool,
    },
    Timer {
        header: DispatcherHeader,
        due_100ns: u64,
        period_ms: u32,
    },
    /// Signaled once the owning thread terminates; stays signaled.
    ThreadExit {
        header: DispatcherHeader,
        thread_id: ThreadId,
    },
}

impl Dispatcher {
    pub fn event(kind: EventKind, initial_state: bool) -> SyncRef {
        Rc::new(RefCell::new(Dispatcher::Event {
            header: DispatcherHeader::signaled(initial_state),
            kind,
        }))
    }

    /// `None` when the counts are out of range (limit must be positive,
    /// initial within `0..=limit`).
    pub fn semaphore(initial: i32, limit: i32) -> Option<SyncRef> {
        if limit <= 0 || initial < 0 || initial > limit {
            return None;
        }
        Some(Rc::new(RefCell::new(Dispatcher::Semaphore {
            header: DispatcherHeader { signal: initial, waiters: Vec::new() },
            limit,
        })))
    }

    pub fn mutant(initial_owner: Option<ThreadId>) -> SyncRef {
        let (signal, owner, recursion) = match initial_owner {
            // Owned by the creator: not signaled, recursion depth 1.
            Some(tid) => (-1, tid, 1),
            None => (1, 0, 0),
        };
        Rc::new(RefCell::new(Dispatcher::Mutant {
            header: DispatcherHeader { signal, waiters: Vec::new() },
            owner,
            recursion,
            abandoned: false,
        }))
    }

    pub fn timer() -> SyncRef {
        Rc::new(RefCell::new(Dispatcher::Timer {
            header: DispatcherHeader::default(),
            due_100ns: 0,
            period_ms: 0,
        }))
    }

    pub fn thread_exit(thread_id: ThreadId) -> SyncRef {
        Rc::new(RefCell::new(Dispatcher::ThreadExit {
            header: DispatcherHeader::default(),
            thread_id,
        }))
    }

    pub fn header(&self) -> &DispatcherHeader {
        match self {
            Dispatcher::Event { header, .. }
            | Dispatcher::Semaphore { header, .. }
            | Dispatcher::Mutant { header, .. }
            | Dispatcher::Timer { header, .. }
            | Dispatcher::ThreadExit { header, .. } => header,
        }
    }

    pub fn header_mut(&mut self) -> &mut DispatcherHeader {
        match self {
            Dispatcher::Event { header, .. }
            | Dispatcher::Semaphore { header, .. }
            | Dispatcher::Mutant { header, .. }
            | Dispatcher::Timer { header, .. }
            | Dispatcher::ThreadExit { header, .. } => header,
        }
    }

    /// Would a wait by `thread_id` be satisfiable right now?
    pub fn is_signaled(&self, thread_id: ThreadId) -> bool {
        match self {
            Dispatcher::Mutant { header, owner, .. } => {
                header.signal > 0 || (*owner == thread_id && thread_id != 0)
            }
            other => other.header().signal > 0,
        }
    }

    /// Consume the signal for one satisfied wait. Returns `true` when the
    /// acquisition picked up an abandoned mutant (reported once, to the
    /// new owner).
    pub fn satisfy_wait(&mut self, thread_id: ThreadId) -> bool {
        match self {
            Dispatcher::Event { header, kind } => {
                if *kind == EventKind::Synchronization {
                    header.signal = 0;
                }
                false
            }
            Dispatcher::Semaphore { header, .. } => {
                if header.signal > 0 {
                    header.signal -= 1;
                }
                false
            }
            Dispatcher::Mutant { header, owner, recursion, abandoned } => {
                if header.signal > 0 {
                    header.signal = -1;
                    *owner = thread_id;
                    *recursion = 1;
                    let was_abandoned = *abandoned;
                    *abandoned = false;
                    was_abandoned
                } else if *owner == thread_id {
                    header.signal -= 1;
                    *recursion += 1;
                    false
                } else {
                    // Unreachable under the is_signaled precondition.
                    debug_assert!(false, "mutant wait satisfied while owned elsewhere");
                    false
                }
            }
            // Timers are treated manual-reset; thread-exit and
            // notification events stay signaled.
            Dispatcher::Timer { .. } | Dispatcher::ThreadExit { .. } => false,
        }
    }
}
