//! Thread records, dispatcher-object synchronization and the cooperative
//! scheduler.
//!
//! One host thread runs everything; "context switch" means copying the
//! shared CPU register file in and out of thread records. Dispatcher
//! objects are shared via `Rc<RefCell<_>>`: handle-table slots hold strong
//! references, wait blocks hold weak ones, and waiter chains refer back to
//! threads by id only, so the reference cycle of the classic design never
//! owns anything twice.

#![forbid(unsafe_code)]

pub mod clock;
pub mod scheduler;
pub mod sync;
pub mod thread;

pub use clock::Clock;
pub use scheduler::Scheduler;
pub use sync::{Dispatcher, DispatcherHeader, EventKind, SyncRef, SyncWeak, Waiter};
pub use thread::{Thread, ThreadId, ThreadState, WaitBlock, MAIN_THREAD_ID, THREAD_DEFAULT_QUANTUM};
