//! Scheduler and dispatcher-object scenarios, driven end to end through
//! the syscall surface.

use ntbox_abi::status::NtStatus;
use ntbox_abi::syscall::nt;
use ntbox_sched::{Dispatcher, ThreadState, MAIN_THREAD_ID};

use crate::VmFixture;

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Spawn a second guest thread through NtCreateThread; the entry point
/// is never executed by these tests, only scheduled.
fn spawn_thread(fx: &mut VmFixture) -> u32 {
    let handle_ptr = fx.scratch(4);
    let status = fx.nt_call(
        nt::NtCreateThread,
        &[handle_ptr, 0x0040_1000, 0, 0x8000, 0],
    );
    assert_eq!(status, NtStatus::SUCCESS.0);
    fx.vm.mem.read_u32(handle_ptr).unwrap()
}

fn create_event(fx: &mut VmFixture, kind: u32, initial: u32) -> u32 {
    let handle_ptr = fx.scratch(4);
    let status = fx.nt_call(nt::NtCreateEvent, &[handle_ptr, 0, 0, kind, initial]);
    assert_eq!(status, NtStatus::SUCCESS.0);
    fx.vm.mem.read_u32(handle_ptr).unwrap()
}

fn create_semaphore(fx: &mut VmFixture, initial: u32, max: u32) -> u32 {
    let handle_ptr = fx.scratch(4);
    let status = fx.nt_call(nt::NtCreateSemaphore, &[handle_ptr, 0, 0, initial, max]);
    assert_eq!(status, NtStatus::SUCCESS.0);
    fx.vm.mem.read_u32(handle_ptr).unwrap()
}

#[test]
fn auto_reset_event_wakes_one_waiter_and_resets() {
    init_logs();
    let mut fx = VmFixture::new();
    let event = create_event(&mut fx, 1, 0); // SynchronizationEvent, unsignaled
    let _t2 = spawn_thread(&mut fx);

    // Main waits: this blocks and switches to the new thread.
    fx.nt_call(nt::NtWaitForSingleObject, &[event, 0, 0]);
    assert_ne!(fx.vm.current_thread_id(), MAIN_THREAD_ID);
    assert_eq!(
        fx.vm.sched.thread(MAIN_THREAD_ID).unwrap().state,
        ThreadState::Waiting
    );

    // The second thread signals the event.
    let prev_ptr = fx.scratch(4);
    let status = fx.nt_call(nt::NtSetEvent, &[event, prev_ptr]);
    assert_eq!(status, NtStatus::SUCCESS.0);

    // Main is awake with WAIT_0 and the event auto-reset behind it.
    let main = fx.vm.sched.thread(MAIN_THREAD_ID).unwrap();
    assert_eq!(main.state, ThreadState::Ready);
    assert_eq!(main.wait_status, NtStatus::WAIT_0);
    assert_eq!(main.context.eax, NtStatus::WAIT_0.0);

    let sync = fx.vm.handles.sync_ref(event).unwrap();
    assert!(!sync.borrow().is_signaled(0), "auto-reset consumed the signal");
    assert!(sync.borrow().header().waiters.is_empty());

    // A fresh wait on the same event blocks again (poll times out).
    let poll_ptr = fx.scratch(8);
    fx.vm.mem.write_u64(poll_ptr, 0).unwrap();
    let status = fx.nt_call(nt::NtWaitForSingleObject, &[event, 0, poll_ptr]);
    assert_eq!(status, NtStatus::TIMEOUT.0);
}

#[test]
fn wait_all_three_semaphores_consumes_every_count() {
    init_logs();
    let mut fx = VmFixture::new();
    let s1 = create_semaphore(&mut fx, 1, 5);
    let s2 = create_semaphore(&mut fx, 0, 5);
    let s3 = create_semaphore(&mut fx, 1, 5);
    let _t2 = spawn_thread(&mut fx);

    let handles_ptr = fx.scratch(12);
    fx.vm.mem.write_u32(handles_ptr, s1).unwrap();
    fx.vm.mem.write_u32(handles_ptr + 4, s2).unwrap();
    fx.vm.mem.write_u32(handles_ptr + 8, s3).unwrap();

    // WaitAll: S2 is zero, so main blocks.
    fx.nt_call(nt::NtWaitForMultipleObjects, &[3, handles_ptr, 0, 0, 0]);
    assert_eq!(
        fx.vm.sched.thread(MAIN_THREAD_ID).unwrap().state,
        ThreadState::Waiting
    );

    // Releasing S2 satisfies the whole set.
    let prev_ptr = fx.scratch(4);
    let status = fx.nt_call(nt::NtReleaseSemaphore, &[s2, 1, prev_ptr]);
    assert_eq!(status, NtStatus::SUCCESS.0);

    let main = fx.vm.sched.thread(MAIN_THREAD_ID).unwrap();
    assert_eq!(main.state, ThreadState::Ready);
    assert_eq!(main.wait_status, NtStatus::WAIT_0);

    for handle in [s1, s2, s3] {
        let sync = fx.vm.handles.sync_ref(handle).unwrap();
        assert_eq!(sync.borrow().header().signal, 0, "count drained");
    }
}

#[test]
fn mutant_release_hands_ownership_to_waiter() {
    init_logs();
    let mut fx = VmFixture::new();

    // Mutant created owned by main (signal -1, recursion 1).
    let handle_ptr = fx.scratch(4);
    let status = fx.nt_call(nt::NtCreateMutant, &[handle_ptr, 0, 0, 1]);
    assert_eq!(status, NtStatus::SUCCESS.0);
    let mutant = fx.vm.mem.read_u32(handle_ptr).unwrap();

    let t2_handle = spawn_thread(&mut fx);

    // Main yields to let the second thread attempt the acquire.
    fx.nt_call(nt::NtYieldExecution, &[]);
    let t2_id = fx.vm.current_thread_id();
    assert_ne!(t2_id, MAIN_THREAD_ID);

    // T2 waits on the mutant: blocked, main runs again.
    fx.nt_call(nt::NtWaitForSingleObject, &[mutant, 0, 0]);
    assert_eq!(fx.vm.current_thread_id(), MAIN_THREAD_ID);
    assert_eq!(
        fx.vm.sched.thread(t2_id).unwrap().state,
        ThreadState::Waiting
    );

    // Main releases: T2 wakes as the new owner.
    let prev_ptr = fx.scratch(4);
    let status = fx.nt_call(nt::NtReleaseMutant, &[mutant, prev_ptr]);
    assert_eq!(status, NtStatus::SUCCESS.0);

    let waiter = fx.vm.sched.thread(t2_id).unwrap();
    assert_eq!(waiter.state, ThreadState::Ready);
    assert_eq!(waiter.wait_status, NtStatus::WAIT_0);

    let sync = fx.vm.handles.sync_ref(mutant).unwrap();
    match &*sync.borrow() {
        Dispatcher::Mutant { header, owner, recursion, .. } => {
            assert_eq!(header.signal, -1);
            assert_eq!(*owner, t2_id);
            assert_eq!(*recursion, 1);
        }
        _ => panic!("not a mutant"),
    }
    let _ = t2_handle;
}

#[test]
fn mutant_recursion_unwinds_to_free() {
    init_logs();
    let mut fx = VmFixture::new();
    let handle_ptr = fx.scratch(4);
    fx.nt_call(nt::NtCreateMutant, &[handle_ptr, 0, 0, 0]);
    let mutant = fx.vm.mem.read_u32(handle_ptr).unwrap();

    // Three recursive acquisitions by the same thread, all fast-path.
    for i in 0..3u32 {
        let status = fx.nt_call(nt::NtWaitForSingleObject, &[mutant, 0, 0]);
        assert_eq!(status, NtStatus::WAIT_0.0, "acquire {i}");
    }
    let sync = fx.vm.handles.sync_ref(mutant).unwrap();
    match &*sync.borrow() {
        Dispatcher::Mutant { header, recursion, .. } => {
            assert_eq!(header.signal, -3);
            assert_eq!(*recursion, 3);
        }
        _ => panic!("not a mutant"),
    }

    let prev_ptr = fx.scratch(4);
    for _ in 0..3 {
        let status = fx.nt_call(nt::NtReleaseMutant, &[mutant, prev_ptr]);
        assert_eq!(status, NtStatus::SUCCESS.0);
    }
    match &*sync.borrow() {
        Dispatcher::Mutant { header, owner, .. } => {
            assert_eq!(header.signal, 1, "fully released");
            assert_eq!(*owner, 0);
        }
        _ => panic!("not a mutant"),
    }

    // One release too many.
    let status = fx.nt_call(nt::NtReleaseMutant, &[mutant, prev_ptr]);
    assert_eq!(status, NtStatus::MUTANT_NOT_OWNED.0);
}

#[test]
fn abandoned_mutant_reports_distinguished_status() {
    init_logs();
    let mut fx = VmFixture::new();
    let handle_ptr = fx.scratch(4);
    fx.nt_call(nt::NtCreateMutant, &[handle_ptr, 0, 0, 0]);
    let mutant = fx.vm.mem.read_u32(handle_ptr).unwrap();

    let _t2 = spawn_thread(&mut fx);
    // Main acquires, then yields to T2.
    assert_eq!(fx.nt_call(nt::NtWaitForSingleObject, &[mutant, 0, 0]), 0);
    fx.nt_call(nt::NtYieldExecution, &[]);
    let t2_id = fx.vm.current_thread_id();

    // T2 blocks on the mutant; main runs again and dies owning it.
    fx.nt_call(nt::NtWaitForSingleObject, &[mutant, 0, 0]);
    assert_eq!(fx.vm.current_thread_id(), MAIN_THREAD_ID);
    fx.nt_call(nt::NtTerminateThread, &[0, 0]);

    // T2 acquired through abandonment.
    let waiter = fx.vm.sched.thread(t2_id).unwrap();
    assert_eq!(waiter.wait_status, NtStatus::ABANDONED_WAIT_0);
    let sync = fx.vm.handles.sync_ref(mutant).unwrap();
    match &*sync.borrow() {
        Dispatcher::Mutant { owner, abandoned, .. } => {
            assert_eq!(*owner, t2_id);
            assert!(!*abandoned, "flag consumed by the acquisition");
        }
        _ => panic!("not a mutant"),
    }
}

#[test]
fn wait_timeout_expires_on_the_host_clock() {
    init_logs();
    let mut fx = VmFixture::new();
    let event = create_event(&mut fx, 0, 0);
    let timeout_ptr = fx.relative_timeout_ms(100);

    let started = std::time::Instant::now();
    fx.nt_call(nt::NtWaitForSingleObject, &[event, 0, timeout_ptr]);
    assert_eq!(
        fx.vm.sched.thread(MAIN_THREAD_ID).unwrap().state,
        ThreadState::Waiting
    );

    // Drive the tick loop the way the parked CPU would.
    while fx.vm.sched.thread(MAIN_THREAD_ID).unwrap().state == ThreadState::Waiting {
        std::thread::sleep(std::time::Duration::from_millis(5));
        fx.vm.tick();
    }
    assert!(started.elapsed() >= std::time::Duration::from_millis(100));

    let main = fx.vm.sched.thread(MAIN_THREAD_ID).unwrap();
    assert_eq!(main.wait_status, NtStatus::TIMEOUT);
    let sync = fx.vm.handles.sync_ref(event).unwrap();
    assert!(sync.borrow().header().waiters.is_empty(), "unlinked by the sweep");
    // The sweep also dispatched the thread back onto the CPU.
    assert_eq!(fx.vm.current_thread_id(), MAIN_THREAD_ID);
}

#[test]
fn delay_execution_sleeps_and_returns_success() {
    init_logs();
    let mut fx = VmFixture::new();
    let timeout_ptr = fx.relative_timeout_ms(20);

    fx.nt_call(nt::NtDelayExecution, &[0, timeout_ptr]);
    while fx.vm.sched.thread(MAIN_THREAD_ID).unwrap().state == ThreadState::Waiting {
        std::thread::sleep(std::time::Duration::from_millis(5));
        fx.vm.tick();
    }
    let main = fx.vm.sched.thread(MAIN_THREAD_ID).unwrap();
    assert_eq!(main.wait_status, NtStatus::SUCCESS, "a finished sleep is not a timeout");
}

#[test]
fn timer_fires_through_the_sweep() {
    init_logs();
    let mut fx = VmFixture::new();
    let handle_ptr = fx.scratch(4);
    fx.nt_call(nt::NtCreateTimer, &[handle_ptr, 0, 0, 0]);
    let timer = fx.vm.mem.read_u32(handle_ptr).unwrap();

    let due_ptr = fx.relative_timeout_ms(20);
    let state_ptr = fx.scratch(4);
    let status = fx.nt_call(nt::NtSetTimer, &[timer, due_ptr, 0, 0, 0, 0, state_ptr]);
    assert_eq!(status, NtStatus::SUCCESS.0);

    fx.nt_call(nt::NtWaitForSingleObject, &[timer, 0, 0]);
    while fx.vm.sched.thread(MAIN_THREAD_ID).unwrap().state == ThreadState::Waiting {
        std::thread::sleep(std::time::Duration::from_millis(5));
        fx.vm.tick();
    }
    let main = fx.vm.sched.thread(MAIN_THREAD_ID).unwrap();
    assert_eq!(main.wait_status, NtStatus::WAIT_0, "woken by the timer, not a timeout");
}

#[test]
fn terminated_thread_is_waitable() {
    init_logs();
    let mut fx = VmFixture::new();
    let t2_handle = spawn_thread(&mut fx);

    // Kill the new thread before it ever runs.
    let status = fx.nt_call(nt::NtTerminateThread, &[t2_handle, 7]);
    assert_eq!(status, NtStatus::SUCCESS.0);

    // Its exit object is signaled: waiting is a fast-path success.
    let status = fx.nt_call(nt::NtWaitForSingleObject, &[t2_handle, 0, 0]);
    assert_eq!(status, NtStatus::WAIT_0.0);
}

#[test]
fn quantum_preemption_round_robins_between_threads() {
    init_logs();
    let mut fx = VmFixture::new();
    let _t2 = spawn_thread(&mut fx);

    let before = fx.vm.current_thread_id();
    // The quantum is measured in ticks; enough ticks force a rotation.
    for _ in 0..32 {
        fx.vm.tick();
    }
    assert_ne!(fx.vm.current_thread_id(), before, "quantum exhausted, rotated");
    assert_eq!(
        fx.vm.cpu.seg_fs.base,
        fx.vm.sched.current_thread().unwrap().teb_addr,
        "FS tracks the running thread's TEB"
    );
}
