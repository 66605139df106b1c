//! Per-guest-thread records: identity, saved CPU context, stack and TEB
//! geometry, wait state and scheduling fields.

use ntbox_abi::status::{NtStatus, WaitType, MAX_WAIT_OBJECTS};
use ntbox_cpu::CpuState;

use crate::sync::{SyncRef, SyncWeak};

pub type ThreadId = u32;

/// Main thread id; subsequent ids step by 4 like Windows client ids.
pub const MAIN_THREAD_ID: ThreadId = 0x1004;
pub const THREAD_ID_STEP: ThreadId = 4;

/// Default quantum in scheduler ticks.
pub const THREAD_DEFAULT_QUANTUM: u8 = 6;

pub const THREAD_DEFAULT_STACK_SIZE: u32 = 64 * 1024;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ThreadState {
    /// Created suspended; never scheduled until resumed.
    Initialized,
    Ready,
    Running,
    Waiting,
    Terminated,
}

/// One wait block. The thread owns its block array; the object side of the
/// link is the (thread, key) entry in the dispatcher's waiter chain, so
/// the reference here can stay weak.
#[derive(Clone, Debug)]
pub struct WaitBlock {
    pub object: SyncWeak,
    pub wait_key: u32,
}

pub struct Thread {
    pub id: ThreadId,
    pub process_id: u32,
    pub state: ThreadState,

    /// CPU state while not running. Only the running thread's state lives
    /// in the live register file.
    pub context: CpuState,
    pub context_valid: bool,

    /// Stack top (high address), bottom, and byte size.
    pub stack_base: u32,
    pub stack_limit: u32,
    pub stack_size: u32,

    pub teb_addr: u32,

    pub wait_status: NtStatus,
    /// Absolute deadline in 100 ns units; 0 = no timeout.
    pub wait_timeout: u64,
    pub wait_blocks: Vec<WaitBlock>,
    pub wait_type: WaitType,
    pub alertable: bool,
    pub alert_pending: bool,

    pub priority: i8,
    pub base_priority: i8,
    pub quantum: u8,
    pub quantum_reset: u8,

    pub exit_code: u32,
    pub terminated: bool,

    /// Dispatcher signaled on termination; NtCreateThread hands a strong
    /// reference to the handle table so the thread is waitable.
    pub exit_object: SyncRef,
}

impl Thread {
    pub fn new(id: ThreadId, process_id: u32, state: ThreadState, exit_object: SyncRef) -> Thread {
        Thread {
            id,
            process_id,
            state,
            context: CpuState::new(),
            context_valid: false,
            stack_base: 0,
            stack_limit: 0,
            stack_size: 0,
            teb_addr: 0,
            wait_status: NtStatus::SUCCESS,
            wait_timeout: 0,
            wait_blocks: Vec::with_capacity(4),
            wait_type: WaitType::Any,
            alertable: false,
            alert_pending: false,
            priority: 0,
            base_priority: 0,
            quantum: THREAD_DEFAULT_QUANTUM,
            quantum_reset: THREAD_DEFAULT_QUANTUM,
            exit_code: 0,
            terminated: false,
            exit_object,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.state == ThreadState::Waiting
    }

    pub fn is_terminated(&self) -> bool {
        self.state == ThreadState::Terminated
    }

    pub fn clear_wait(&mut self) {
        debug_assert!(self.wait_blocks.len() <= MAX_WAIT_OBJECTS);
        self.wait_blocks.clear();
        self.wait_timeout = 0;
    }
}

/// Legal state transitions; a violation is a scheduler bug, logged and
/// then tolerated.
pub fn transition_allowed(old: ThreadState, new: ThreadState) -> bool {
    use ThreadState::*;
    if old == new {
        return true;
    }
    match old {
        Initialized => matches!(new, Ready | Terminated),
        Ready => matches!(new, Running | Terminated),
        Running => matches!(new, Ready | Waiting | Terminated),
        Waiting => matches!(new, Ready | Terminated),
        Terminated => false,
    }
}
