//! The cooperative scheduler: ready queue, quantum tick, wait blocking,
//! signal delivery, timeout/timer sweeps and context switching.
//!
//! At most one thread is `Running` and its CPU state lives in the live
//! register file; everyone else's lives in their snapshot. Blocking a
//! thread switches the register file to the next ready thread and returns
//! to the syscall layer, which then must not touch the accumulator: the
//! wait status is delivered by the waker writing it into the sleeping
//! thread's saved EAX.

use std::collections::VecDeque;
use std::rc::Rc;

use log::{debug, trace, warn};
use ntbox_abi::status::{NtStatus, WaitType, MAX_WAIT_OBJECTS};
use ntbox_cpu::CpuState;

use crate::clock::ms_to_100ns;
use crate::sync::{Dispatcher, SyncRef, SyncWeak, Waiter};
use crate::thread::{transition_allowed, Thread, ThreadId, ThreadState, WaitBlock, THREAD_ID_STEP};

pub struct Scheduler {
    /// Slab of every thread ever created; terminated records stay until
    /// process exit (single-process model, bounded thread counts).
    threads: Vec<Thread>,
    current: Option<usize>,
    ready: VecDeque<usize>,
    next_thread_id: ThreadId,
    /// Armed timers, swept every tick. Weak: the handle table owns timers.
    timers: Vec<SyncWeak>,
    idle: bool,

    pub context_switches: u64,
    pub tick_count: u64,
    pub preemptions: u64,
    pub yields: u64,
}

impl Scheduler {
    pub fn new(first_thread_id: ThreadId) -> Scheduler {
        Scheduler {
            threads: Vec::new(),
            current: None,
            ready: VecDeque::new(),
            next_thread_id: first_thread_id,
            timers: Vec::new(),
            idle: false,
            context_switches: 0,
            tick_count: 0,
            preemptions: 0,
            yields: 0,
        }
    }

    pub fn alloc_thread_id(&mut self) -> ThreadId {
        let id = self.next_thread_id;
        self.next_thread_id += THREAD_ID_STEP;
        id
    }

    fn index_of(&self, id: ThreadId) -> Option<usize> {
        self.threads.iter().position(|t| t.id == id)
    }

    pub fn thread(&self, id: ThreadId) -> Option<&Thread> {
        self.threads.iter().find(|t| t.id == id)
    }

    pub fn thread_mut(&mut self, id: ThreadId) -> Option<&mut Thread> {
        self.threads.iter_mut().find(|t| t.id == id)
    }

    pub fn threads(&self) -> impl Iterator<Item = &Thread> {
        self.threads.iter()
    }

    pub fn current_thread(&self) -> Option<&Thread> {
        self.current.map(|i| &self.threads[i])
    }

    pub fn current_thread_id(&self) -> Option<ThreadId> {
        self.current.map(|i| self.threads[i].id)
    }

    pub fn is_idle(&self) -> bool {
        self.idle
    }

    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }

    fn set_state(&mut self, idx: usize, new: ThreadState) {
        let old = self.threads[idx].state;
        if !transition_allowed(old, new) {
            warn!(
                "thread {:#x}: state transition {:?} -> {:?} not allowed",
                self.threads[idx].id, old, new
            );
        }
        self.threads[idx].state = new;
    }

    /// The main thread is materialized from the CPU's starting state: it
    /// is already Running and its context is the live register file.
    pub fn adopt_main_thread(&mut self, thread: Thread) -> ThreadId {
        debug_assert!(self.threads.is_empty());
        let id = thread.id;
        self.threads.push(thread);
        self.current = Some(0);
        id
    }

    pub fn add_thread(&mut self, thread: Thread) -> ThreadId {
        let id = thread.id;
        let ready = thread.state == ThreadState::Ready;
        self.threads.push(thread);
        let idx = self.threads.len() - 1;
        if ready {
            self.ready.push_back(idx);
            self.idle = false;
        }
        debug!("created thread {id:#x} ({} total)", self.threads.len());
        id
    }

    /// Initialized (suspended) -> Ready.
    pub fn resume_thread(&mut self, id: ThreadId) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        if self.threads[idx].state != ThreadState::Initialized {
            return false;
        }
        self.set_state(idx, ThreadState::Ready);
        self.ready.push_back(idx);
        self.idle = false;
        true
    }

    /// Save the outgoing thread's context, load the incoming one, and
    /// point FS at the incoming TEB. With an empty ready queue the CPU
    /// parks: the caller's loop must stop executing guest code until a
    /// sweep or signal readies somebody.
    pub fn switch(&mut self, cpu: &mut CpuState) {
        let old = self.current;

        let Some(next_idx) = self.ready.pop_front() else {
            if let Some(old_idx) = old {
                self.save_context(old_idx, cpu);
            }
            self.current = None;
            self.idle = true;
            return;
        };

        if Some(next_idx) == old {
            self.set_state(next_idx, ThreadState::Running);
            let t = &mut self.threads[next_idx];
            t.quantum = t.quantum_reset;
            return;
        }

        if let Some(old_idx) = old {
            self.save_context(old_idx, cpu);
        }

        self.set_state(next_idx, ThreadState::Running);
        let t = &mut self.threads[next_idx];
        t.quantum = t.quantum_reset;
        if t.context_valid {
            // Exit flags belong to the VM, not to any one thread.
            let exit_requested = cpu.exit_requested;
            let exit_status = cpu.exit_status;
            *cpu = t.context;
            cpu.exit_requested = exit_requested;
            cpu.exit_status = exit_status;
        }
        cpu.set_fs_base(t.teb_addr);

        self.current = Some(next_idx);
        self.context_switches += 1;
        self.idle = false;
        trace!("switched to thread {:#x}", self.threads[next_idx].id);
    }

    fn save_context(&mut self, idx: usize, cpu: &CpuState) {
        let t = &mut self.threads[idx];
        if t.is_terminated() {
            return;
        }
        t.context = *cpu;
        t.context.exit_requested = false;
        t.context.exit_status = 0;
        t.context_valid = true;
    }

    /// Quantum tick plus the two sweeps; called from the CPU loop every
    /// fixed number of instructions, and from the park loop while idle.
    pub fn tick(&mut self, cpu: &mut CpuState, now: u64) {
        self.tick_count += 1;
        self.sweep_timers(now);
        self.sweep_timeouts(now);

        match self.current {
            Some(cur) => {
                let t = &mut self.threads[cur];
                if t.quantum > 0 {
                    t.quantum -= 1;
                }
                if t.quantum == 0 {
                    t.quantum = t.quantum_reset;
                    if !self.ready.is_empty() {
                        self.preemptions += 1;
                        self.set_state(cur, ThreadState::Ready);
                        self.ready.push_back(cur);
                        self.switch(cpu);
                    }
                }
            }
            None => {
                if !self.ready.is_empty() {
                    self.switch(cpu);
                }
            }
        }
    }

    pub fn yield_now(&mut self, cpu: &mut CpuState) {
        self.yields += 1;
        let Some(cur) = self.current else {
            return;
        };
        if self.ready.is_empty() {
            return;
        }
        self.set_state(cur, ThreadState::Ready);
        self.ready.push_back(cur);
        self.switch(cpu);
    }

    /// Evaluate a wait request (§dispatcher semantics). `Some(status)`
    /// means the request completed on the fast path and the handler should
    /// return it; `None` means the thread blocked and the register file
    /// now belongs to another thread.
    pub fn wait_on_objects(
        &mut self,
        cpu: &mut CpuState,
        objects: &[SyncRef],
        wait_type: WaitType,
        deadline: Option<u64>,
        alertable: bool,
        now: u64,
    ) -> Option<NtStatus> {
        if objects.len() > MAX_WAIT_OBJECTS {
            return Some(NtStatus::INVALID_PARAMETER);
        }
        let Some(cur) = self.current else {
            return Some(NtStatus::UNSUCCESSFUL);
        };
        let tid = self.threads[cur].id;

        if alertable && self.threads[cur].alert_pending {
            self.threads[cur].alert_pending = false;
            return Some(NtStatus::ALERTED);
        }

        // Fast path.
        match wait_type {
            WaitType::Any => {
                for (i, obj) in objects.iter().enumerate() {
                    if obj.borrow().is_signaled(tid) {
                        let abandoned = obj.borrow_mut().satisfy_wait(tid);
                        return Some(if abandoned {
                            NtStatus::abandoned_wait(i as u32)
                        } else {
                            NtStatus::wait(i as u32)
                        });
                    }
                }
            }
            WaitType::All => {
                if objects.iter().all(|o| o.borrow().is_signaled(tid)) {
                    let mut any_abandoned = false;
                    for obj in objects {
                        any_abandoned |= obj.borrow_mut().satisfy_wait(tid);
                    }
                    return Some(if any_abandoned {
                        NtStatus::ABANDONED_WAIT_0
                    } else {
                        NtStatus::WAIT_0
                    });
                }
            }
        }

        // Poll: expired (or zero) timeout never blocks.
        if let Some(deadline) = deadline {
            if deadline <= now {
                return Some(NtStatus::TIMEOUT);
            }
        }

        // Slow path: one wait block per object, linked at each chain head.
        let t = &mut self.threads[cur];
        t.wait_type = wait_type;
        t.wait_timeout = deadline.unwrap_or(0);
        t.alertable = alertable;
        t.wait_blocks.clear();
        for (i, obj) in objects.iter().enumerate() {
            t.wait_blocks.push(WaitBlock {
                object: Rc::downgrade(obj),
                wait_key: i as u32,
            });
            obj.borrow_mut()
                .header_mut()
                .link_waiter_at_head(Waiter { thread: tid, wait_key: i as u32 });
        }

        self.set_state(cur, ThreadState::Waiting);
        self.switch(cpu);
        None
    }

    /// Pure sleep (NtDelayExecution). Completion is delivered by the
    /// timeout sweep, which reports an empty-block wait as SUCCESS.
    pub fn delay(
        &mut self,
        cpu: &mut CpuState,
        deadline: Option<u64>,
        alertable: bool,
        now: u64,
    ) -> Option<NtStatus> {
        let Some(cur) = self.current else {
            return Some(NtStatus::UNSUCCESSFUL);
        };
        if alertable && self.threads[cur].alert_pending {
            self.threads[cur].alert_pending = false;
            return Some(NtStatus::ALERTED);
        }
        if let Some(deadline) = deadline {
            if deadline <= now {
                self.yield_now(cpu);
                return Some(NtStatus::SUCCESS);
            }
        }
        let t = &mut self.threads[cur];
        t.wait_blocks.clear();
        t.wait_type = WaitType::Any;
        t.wait_timeout = deadline.unwrap_or(0);
        t.alertable = alertable;
        self.set_state(cur, ThreadState::Waiting);
        self.switch(cpu);
        None
    }

    /// Detach `idx`'s wait blocks from every chain they are on, deliver
    /// `status` through the saved accumulator, and make the thread Ready.
    fn wake_thread(&mut self, idx: usize, status: NtStatus) {
        let t = &mut self.threads[idx];
        let tid = t.id;
        for wb in &t.wait_blocks {
            if let Some(obj) = wb.object.upgrade() {
                obj.borrow_mut().header_mut().unlink_waiter(tid);
            }
        }
        t.clear_wait();
        t.wait_status = status;
        t.context.eax = status.0;
        self.set_state(idx, ThreadState::Ready);
        self.ready.push_back(idx);
        self.idle = false;
        trace!("woke thread {tid:#x} with {}", status.name());
    }

    /// Walk `object`'s waiter chain after its state may have become
    /// signaled. Chain order is wake order; the walk stops as soon as the
    /// object is no longer signaled (auto-reset events, drained
    /// semaphores, acquired mutants).
    pub fn signal_object(&mut self, object: &SyncRef) {
        let snapshot: Vec<Waiter> = object.borrow().header().waiters.clone();

        for waiter in snapshot {
            if !object.borrow().header().waiters.contains(&waiter) {
                // Detached by an earlier wake in this same walk.
                continue;
            }
            let Some(idx) = self.index_of(waiter.thread) else {
                continue;
            };
            if self.threads[idx].state != ThreadState::Waiting {
                continue;
            }
            let tid = waiter.thread;

            let satisfiable = match self.threads[idx].wait_type {
                WaitType::Any => object.borrow().is_signaled(tid),
                WaitType::All => self.threads[idx].wait_blocks.iter().all(|wb| {
                    wb.object
                        .upgrade()
                        .is_some_and(|o| o.borrow().is_signaled(tid))
                }),
            };
            if !satisfiable {
                continue;
            }

            let status = match self.threads[idx].wait_type {
                WaitType::Any => {
                    let abandoned = object.borrow_mut().satisfy_wait(tid);
                    if abandoned {
                        NtStatus::abandoned_wait(waiter.wait_key)
                    } else {
                        NtStatus::wait(waiter.wait_key)
                    }
                }
                WaitType::All => {
                    // Satisfy every object in the waiter's index order.
                    let blocks: Vec<WaitBlock> = self.threads[idx].wait_blocks.clone();
                    let mut any_abandoned = false;
                    for wb in &blocks {
                        if let Some(o) = wb.object.upgrade() {
                            any_abandoned |= o.borrow_mut().satisfy_wait(tid);
                        }
                    }
                    if any_abandoned {
                        NtStatus::ABANDONED_WAIT_0
                    } else {
                        NtStatus::WAIT_0
                    }
                }
            };

            self.wake_thread(idx, status);

            if !object.borrow().is_signaled(0) {
                break;
            }
        }
    }

    /// Expired waits become TIMEOUT; expired empty-block waits are
    /// completed sleeps and report SUCCESS.
    fn sweep_timeouts(&mut self, now: u64) {
        for idx in 0..self.threads.len() {
            let t = &self.threads[idx];
            if t.state != ThreadState::Waiting || t.wait_timeout == 0 || now < t.wait_timeout {
                continue;
            }
            let status = if t.wait_blocks.is_empty() {
                NtStatus::SUCCESS
            } else {
                NtStatus::TIMEOUT
            };
            self.wake_thread(idx, status);
        }
    }

    pub fn register_timer(&mut self, timer: &SyncRef) {
        self.timers.push(Rc::downgrade(timer));
    }

    fn sweep_timers(&mut self, now: u64) {
        let mut fired: Vec<SyncRef> = Vec::new();
        self.timers.retain(|weak| match weak.upgrade() {
            Some(obj) => {
                let mut fires = false;
                if let Dispatcher::Timer { header, due_100ns, period_ms } = &mut *obj.borrow_mut()
                {
                    if *due_100ns != 0 && now >= *due_100ns {
                        header.signal = 1;
                        *due_100ns = if *period_ms > 0 {
                            now + ms_to_100ns(*period_ms)
                        } else {
                            0
                        };
                        fires = true;
                    }
                }
                if fires {
                    fired.push(obj);
                }
                true
            }
            None => false,
        });
        for obj in fired {
            self.signal_object(&obj);
        }
    }

    /// Cooperative cancellation: alertable waits complete with ALERTED,
    /// anyone else collects a pending alert for their next alertable wait.
    pub fn alert_thread(&mut self, id: ThreadId) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        if self.threads[idx].state == ThreadState::Waiting && self.threads[idx].alertable {
            self.wake_thread(idx, NtStatus::ALERTED);
        } else {
            self.threads[idx].alert_pending = true;
        }
        true
    }

    /// Consume a pending alert on the current thread.
    pub fn test_alert(&mut self) -> bool {
        let Some(cur) = self.current else {
            return false;
        };
        let pending = self.threads[cur].alert_pending;
        self.threads[cur].alert_pending = false;
        pending
    }

    /// Terminate a thread: record the exit code, detach its wait blocks,
    /// signal its exit object, and if it was current switch away; the
    /// caller must not run guest code for it again.
    pub fn terminate_thread(&mut self, id: ThreadId, exit_code: u32, cpu: &mut CpuState) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        if self.threads[idx].is_terminated() {
            return true;
        }

        {
            let t = &mut self.threads[idx];
            t.exit_code = exit_code;
            t.terminated = true;
            let tid = t.id;
            for wb in &t.wait_blocks {
                if let Some(obj) = wb.object.upgrade() {
                    obj.borrow_mut().header_mut().unlink_waiter(tid);
                }
            }
            t.clear_wait();
        }
        self.ready.retain(|&i| i != idx);
        self.set_state(idx, ThreadState::Terminated);
        debug!("thread {id:#x} terminated with exit code {exit_code:#x}");

        let exit_object = self.threads[idx].exit_object.clone();
        exit_object.borrow_mut().header_mut().signal = 1;
        self.signal_object(&exit_object);

        if self.current == Some(idx) {
            self.current = None;
            self.switch(cpu);
        }
        true
    }
}
