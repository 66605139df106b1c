//! Dispatcher-object syscalls: events, semaphores, mutants, timers and
//! the wait family.
//!
//! Every handler resolves handles to strong dispatcher references before
//! touching the scheduler, so wait sets never outlive their objects. The
//! wait calls are the engine's suspension points: a `NoReturn` outcome
//! means the register file already belongs to another thread.

use log::trace;
use ntbox_abi::status::{NtStatus, WaitType, MAX_WAIT_OBJECTS};
use ntbox_sched::{Dispatcher, EventKind, SyncRef};

use crate::dispatch::{nt_arg, write_guest_u32, SysOutcome};
use crate::handles::NtObject;
use crate::vm::VmContext;

/// NT event types: NotificationEvent = 0, SynchronizationEvent = 1.
fn event_kind_from_raw(raw: u32) -> Option<EventKind> {
    match raw {
        0 => Some(EventKind::Notification),
        1 => Some(EventKind::Synchronization),
        _ => None,
    }
}

fn install(vm: &mut VmContext, handle_ptr: u32, object: SyncRef) -> SysOutcome {
    let handle = vm.handles.add(NtObject::Sync(object));
    if handle == 0 {
        return SysOutcome::Ret(NtStatus::NO_MEMORY);
    }
    write_guest_u32(vm, handle_ptr, handle);
    SysOutcome::Ret(NtStatus::SUCCESS)
}

/// Guest LARGE_INTEGER timeout to an absolute deadline: null pointer =
/// infinite, zero = poll, negative = relative 100 ns interval, positive =
/// absolute on the monotonic clock.
fn read_deadline(vm: &VmContext, ptr: u32, now: u64) -> Result<Option<u64>, NtStatus> {
    if ptr == 0 {
        return Ok(None);
    }
    let raw = vm.mem.read_u64(ptr).map_err(|_| NtStatus::INVALID_PARAMETER)? as i64;
    Ok(Some(if raw == 0 {
        now
    } else if raw < 0 {
        now.saturating_add(raw.unsigned_abs())
    } else {
        raw as u64
    }))
}

// ---- events ---------------------------------------------------------

pub fn sys_nt_create_event(vm: &mut VmContext) -> SysOutcome {
    let handle_ptr = nt_arg!(vm, 0);
    // args 1..2: DesiredAccess, ObjectAttributes (unnamed objects only).
    let event_type = nt_arg!(vm, 3);
    let initial_state = nt_arg!(vm, 4) != 0;

    let Some(kind) = event_kind_from_raw(event_type) else {
        return SysOutcome::Ret(NtStatus::INVALID_PARAMETER);
    };
    install(vm, handle_ptr, Dispatcher::event(kind, initial_state))
}

fn with_event(vm: &VmContext, handle: u32) -> Result<SyncRef, NtStatus> {
    let sync = vm.handles.sync_ref(handle).ok_or(NtStatus::INVALID_HANDLE)?;
    let is_event = matches!(&*sync.borrow(), Dispatcher::Event { .. });
    if is_event {
        Ok(sync)
    } else {
        Err(NtStatus::OBJECT_TYPE_MISMATCH)
    }
}

pub fn sys_nt_set_event(vm: &mut VmContext) -> SysOutcome {
    let handle = nt_arg!(vm, 0);
    let previous_ptr = nt_arg!(vm, 1);

    let event = match with_event(vm, handle) {
        Ok(e) => e,
        Err(status) => return SysOutcome::Ret(status),
    };
    let previous = {
        let mut guard = event.borrow_mut();
        let header = guard.header_mut();
        let previous = header.signal;
        header.signal = 1;
        previous
    };
    vm.sched.signal_object(&event);
    write_guest_u32(vm, previous_ptr, previous as u32);
    SysOutcome::Ret(NtStatus::SUCCESS)
}

pub fn sys_nt_reset_event(vm: &mut VmContext) -> SysOutcome {
    let handle = nt_arg!(vm, 0);
    let previous_ptr = nt_arg!(vm, 1);

    let event = match with_event(vm, handle) {
        Ok(e) => e,
        Err(status) => return SysOutcome::Ret(status),
    };
    let previous = {
        let mut guard = event.borrow_mut();
        let header = guard.header_mut();
        let previous = header.signal;
        header.signal = 0;
        previous
    };
    write_guest_u32(vm, previous_ptr, previous as u32);
    SysOutcome::Ret(NtStatus::SUCCESS)
}

/// Same as reset, without the previous-state report.
pub fn sys_nt_clear_event(vm: &mut VmContext) -> SysOutcome {
    let handle = nt_arg!(vm, 0);
    let event = match with_event(vm, handle) {
        Ok(e) => e,
        Err(status) => return SysOutcome::Ret(status),
    };
    event.borrow_mut().header_mut().signal = 0;
    SysOutcome::Ret(NtStatus::SUCCESS)
}

/// Signal, release whoever can be released, drop back to non-signaled.
pub fn sys_nt_pulse_event(vm: &mut VmContext) -> SysOutcome {
    let handle = nt_arg!(vm, 0);
    let previous_ptr = nt_arg!(vm, 1);

    let event = match with_event(vm, handle) {
        Ok(e) => e,
        Err(status) => return SysOutcome::Ret(status),
    };
    let previous = {
        let mut guard = event.borrow_mut();
        let header = guard.header_mut();
        let previous = header.signal;
        header.signal = 1;
        previous
    };
    vm.sched.signal_object(&event);
    event.borrow_mut().header_mut().signal = 0;
    write_guest_u32(vm, previous_ptr, previous as u32);
    SysOutcome::Ret(NtStatus::SUCCESS)
}

// ---- semaphores -----------------------------------------------------

pub fn sys_nt_create_semaphore(vm: &mut VmContext) -> SysOutcome {
    let handle_ptr = nt_arg!(vm, 0);
    let initial = nt_arg!(vm, 3) as i32;
    let maximum = nt_arg!(vm, 4) as i32;

    match Dispatcher::semaphore(initial, maximum) {
        Some(sem) => install(vm, handle_ptr, sem),
        None => SysOutcome::Ret(NtStatus::INVALID_PARAMETER),
    }
}

pub fn sys_nt_release_semaphore(vm: &mut VmContext) -> SysOutcome {
    let handle = nt_arg!(vm, 0);
    let release_count = nt_arg!(vm, 1) as i32;
    let previous_ptr = nt_arg!(vm, 2);

    if release_count <= 0 {
        return SysOutcome::Ret(NtStatus::INVALID_PARAMETER);
    }
    let Some(sync) = vm.handles.sync_ref(handle) else {
        return SysOutcome::Ret(NtStatus::INVALID_HANDLE);
    };
    let previous = {
        let mut guard = sync.borrow_mut();
        let Dispatcher::Semaphore { header, limit } = &mut *guard else {
            return SysOutcome::Ret(NtStatus::OBJECT_TYPE_MISMATCH);
        };
        if header.signal > *limit - release_count {
            return SysOutcome::Ret(NtStatus::SEMAPHORE_LIMIT_EXCEEDED);
        }
        let previous = header.signal;
        header.signal += release_count;
        previous
    };
    vm.sched.signal_object(&sync);
    write_guest_u32(vm, previous_ptr, previous as u32);
    SysOutcome::Ret(NtStatus::SUCCESS)
}

// ---- mutants --------------------------------------------------------

pub fn sys_nt_create_mutant(vm: &mut VmContext) -> SysOutcome {
    let handle_ptr = nt_arg!(vm, 0);
    let initial_owner = nt_arg!(vm, 3) != 0;

    let owner = initial_owner.then(|| vm.current_thread_id());
    install(vm, handle_ptr, Dispatcher::mutant(owner))
}

pub fn sys_nt_release_mutant(vm: &mut VmContext) -> SysOutcome {
    let handle = nt_arg!(vm, 0);
    let previous_ptr = nt_arg!(vm, 1);
    let current = vm.current_thread_id();

    let Some(sync) = vm.handles.sync_ref(handle) else {
        return SysOutcome::Ret(NtStatus::INVALID_HANDLE);
    };
    let (previous, released) = {
        let mut guard = sync.borrow_mut();
        let Dispatcher::Mutant { header, owner, recursion, .. } = &mut *guard else {
            return SysOutcome::Ret(NtStatus::OBJECT_TYPE_MISMATCH);
        };
        if *owner != current {
            return SysOutcome::Ret(NtStatus::MUTANT_NOT_OWNED);
        }
        // Acquisition takes the signal from 1 straight to -1, so the
        // final release restores 1 rather than stepping through 0.
        let previous = header.signal;
        *recursion -= 1;
        let released = *recursion == 0;
        if released {
            header.signal = 1;
            *owner = 0;
        } else {
            header.signal += 1;
        }
        (previous, released)
    };
    if released {
        vm.sched.signal_object(&sync);
    }
    write_guest_u32(vm, previous_ptr, previous as u32);
    trace!("released mutant {handle:#x} (fully={released})");
    SysOutcome::Ret(NtStatus::SUCCESS)
}

// ---- timers ---------------------------------------------------------

pub fn sys_nt_create_timer(vm: &mut VmContext) -> SysOutcome {
    let handle_ptr = nt_arg!(vm, 0);
    // arg 3: timer type; firing treats every timer manual-reset.
    let timer = Dispatcher::timer();
    vm.sched.register_timer(&timer);
    install(vm, handle_ptr, timer)
}

pub fn sys_nt_set_timer(vm: &mut VmContext) -> SysOutcome {
    let handle = nt_arg!(vm, 0);
    let due_ptr = nt_arg!(vm, 1);
    // args 2..4: ApcRoutine, ApcContext, Resume.
    let period = nt_arg!(vm, 5);
    let previous_state_ptr = nt_arg!(vm, 6);

    let Some(sync) = vm.handles.sync_ref(handle) else {
        return SysOutcome::Ret(NtStatus::INVALID_HANDLE);
    };
    let now = vm.now_100ns();
    let deadline = match read_deadline(vm, due_ptr, now) {
        Ok(Some(d)) => d.max(now),
        Ok(None) => return SysOutcome::Ret(NtStatus::INVALID_PARAMETER),
        Err(status) => return SysOutcome::Ret(status),
    };

    let previous = {
        let mut guard = sync.borrow_mut();
        let Dispatcher::Timer { header, due_100ns, period_ms } = &mut *guard else {
            return SysOutcome::Ret(NtStatus::OBJECT_TYPE_MISMATCH);
        };
        let previous = header.signal > 0;
        // Arming resets the signal; the sweep fires it at the deadline.
        header.signal = 0;
        *due_100ns = deadline;
        *period_ms = period;
        previous
    };
    write_guest_u32(vm, previous_state_ptr, previous as u32);
    SysOutcome::Ret(NtStatus::SUCCESS)
}

// ---- waits ----------------------------------------------------------

pub fn sys_nt_wait_for_single_object(vm: &mut VmContext) -> SysOutcome {
    let handle = nt_arg!(vm, 0);
    let alertable = nt_arg!(vm, 1) != 0;
    let timeout_ptr = nt_arg!(vm, 2);

    let Some(object) = vm.handles.sync_ref(handle) else {
        return SysOutcome::Ret(NtStatus::INVALID_HANDLE);
    };
    let now = vm.now_100ns();
    let deadline = match read_deadline(vm, timeout_ptr, now) {
        Ok(d) => d,
        Err(status) => return SysOutcome::Ret(status),
    };
    let VmContext { sched, cpu, .. } = vm;
    match sched.wait_on_objects(cpu, &[object], WaitType::Any, deadline, alertable, now) {
        Some(status) => SysOutcome::Ret(status),
        None => SysOutcome::NoReturn,
    }
}

pub fn sys_nt_wait_for_multiple_objects(vm: &mut VmContext) -> SysOutcome {
    let count = nt_arg!(vm, 0) as usize;
    let handles_ptr = nt_arg!(vm, 1);
    let wait_type_raw = nt_arg!(vm, 2);
    let alertable = nt_arg!(vm, 3) != 0;
    let timeout_ptr = nt_arg!(vm, 4);

    if count == 0 || count > MAX_WAIT_OBJECTS {
        return SysOutcome::Ret(NtStatus::INVALID_PARAMETER);
    }
    let Some(wait_type) = WaitType::from_raw(wait_type_raw) else {
        return SysOutcome::Ret(NtStatus::INVALID_PARAMETER);
    };

    let mut objects = Vec::with_capacity(count);
    for i in 0..count {
        let handle = match vm.mem.read_u32(handles_ptr + i as u32 * 4) {
            Ok(h) => h,
            Err(_) => return SysOutcome::Ret(NtStatus::INVALID_PARAMETER),
        };
        let Some(object) = vm.handles.sync_ref(handle) else {
            return SysOutcome::Ret(NtStatus::INVALID_HANDLE);
        };
        objects.push(object);
    }

    let now = vm.now_100ns();
    let deadline = match read_deadline(vm, timeout_ptr, now) {
        Ok(d) => d,
        Err(status) => return SysOutcome::Ret(status),
    };
    let VmContext { sched, cpu, .. } = vm;
    match sched.wait_on_objects(cpu, &objects, wait_type, deadline, alertable, now) {
        Some(status) => SysOutcome::Ret(status),
        None => SysOutcome::NoReturn,
    }
}

pub fn sys_nt_delay_execution(vm: &mut VmContext) -> SysOutcome {
    let alertable = nt_arg!(vm, 0) != 0;
    let timeout_ptr = nt_arg!(vm, 1);

    let now = vm.now_100ns();
    let deadline = match read_deadline(vm, timeout_ptr, now) {
        Ok(d) => d,
        Err(status) => return SysOutcome::Ret(status),
    };
    let VmContext { sched, cpu, .. } = vm;
    match sched.delay(cpu, deadline, alertable, now) {
        Some(status) => SysOutcome::Ret(status),
        None => SysOutcome::NoReturn,
    }
}
