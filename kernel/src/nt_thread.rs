//! Thread syscalls: creation, termination, resume, alerts and yield.
//!
//! New threads get a TEB page and a guard-paged stack in guest space, an
//! initial register context built from the live CPU's segment state, and
//! a waitable thread-exit object whose handle is returned to the caller.

use log::debug;
use ntbox_abi::status::NtStatus;
use ntbox_cpu::FLAG_IF;
use ntbox_sched::{Dispatcher, Thread, ThreadId, ThreadState, THREAD_DEFAULT_QUANTUM};

use crate::dispatch::{nt_arg, write_guest_u32, SysOutcome};
use crate::handles::NtObject;
use crate::vm::{VmContext, PROCESS_ID};

/// The current-thread pseudo-handle ((uint32)-2).
const CURRENT_THREAD: u32 = 0xFFFF_FFFE;

const DEFAULT_STACK_SIZE: u32 = 64 * 1024;

/// Build a new guest thread. Returns its id; the caller wraps the exit
/// object into a handle.
fn create_thread(
    vm: &mut VmContext,
    entry: u32,
    parameter: u32,
    stack_size: u32,
    suspended: bool,
) -> Result<ThreadId, NtStatus> {
    let stack_size = if stack_size == 0 { DEFAULT_STACK_SIZE } else { stack_size };
    let tid = vm.sched.alloc_thread_id();

    let teb = vm.alloc_teb(tid).map_err(|_| NtStatus::NO_MEMORY)?;
    let (stack_base, stack_limit) = vm.alloc_stack(stack_size).map_err(|_| NtStatus::NO_MEMORY)?;
    vm.write_teb(teb, tid, stack_base, stack_limit)
        .map_err(|_| NtStatus::NO_MEMORY)?;

    // Initial frame: parameter above a null return address, so falling
    // off the entry point faults visibly.
    let esp = stack_base - 8;
    vm.mem.write_u32(esp + 4, parameter).map_err(|_| NtStatus::NO_MEMORY)?;
    vm.mem.write_u32(esp, 0).map_err(|_| NtStatus::NO_MEMORY)?;

    let state = if suspended { ThreadState::Initialized } else { ThreadState::Ready };
    let mut thread = Thread::new(tid, PROCESS_ID, state, Dispatcher::thread_exit(tid));
    thread.teb_addr = teb;
    thread.stack_base = stack_base;
    thread.stack_limit = stack_limit;
    thread.stack_size = stack_size;
    thread.quantum = THREAD_DEFAULT_QUANTUM;

    // Register context: entry point, fresh stack, segment state copied
    // from the live CPU (all threads share the flat segmentation), FS
    // pointing at the new TEB.
    thread.context.eip = entry;
    thread.context.esp = esp;
    thread.context.ebp = 0;
    thread.context.flags = FLAG_IF;
    thread.context.seg_cs = vm.cpu.seg_cs;
    thread.context.seg_ds = vm.cpu.seg_ds;
    thread.context.seg_es = vm.cpu.seg_es;
    thread.context.seg_ss = vm.cpu.seg_ss;
    thread.context.seg_fs = vm.cpu.seg_fs;
    thread.context.seg_gs = vm.cpu.seg_gs;
    thread.context.seg_fs.base = teb;
    thread.context_valid = true;

    vm.sched.add_thread(thread);
    debug!("created thread {tid:#x} entry={entry:#010x} stack={stack_base:#010x}");
    Ok(tid)
}

/// Compact create contract shared with the guest-side thunk: out-handle,
/// entry, parameter, stack size, create-suspended.
pub fn sys_nt_create_thread(vm: &mut VmContext) -> SysOutcome {
    let handle_ptr = nt_arg!(vm, 0);
    let entry = nt_arg!(vm, 1);
    let parameter = nt_arg!(vm, 2);
    let stack_size = nt_arg!(vm, 3);
    let suspended = nt_arg!(vm, 4) != 0;

    if entry == 0 {
        return SysOutcome::Ret(NtStatus::INVALID_PARAMETER);
    }
    match create_thread(vm, entry, parameter, stack_size, suspended) {
        Ok(tid) => {
            let exit_object = vm
                .sched
                .thread(tid)
                .expect("just created")
                .exit_object
                .clone();
            let handle = vm.handles.add(NtObject::Sync(exit_object));
            if handle == 0 {
                return SysOutcome::Ret(NtStatus::NO_MEMORY);
            }
            write_guest_u32(vm, handle_ptr, handle);
            SysOutcome::Ret(NtStatus::SUCCESS)
        }
        Err(status) => SysOutcome::Ret(status),
    }
}

/// Map a thread handle (or pseudo-handle) to a thread id via its exit
/// object.
fn thread_id_for_handle(vm: &VmContext, handle: u32) -> Option<ThreadId> {
    if handle == 0 || handle == CURRENT_THREAD {
        return Some(vm.current_thread_id());
    }
    let sync = vm.handles.sync_ref(handle)?;
    let borrowed = sync.borrow();
    match &*borrowed {
        Dispatcher::ThreadExit { thread_id, .. } => Some(*thread_id),
        _ => None,
    }
}

/// Abandon every mutant the dying thread owns and wake their waiters
/// with the abandoned status.
pub(crate) fn abandon_owned_mutants(vm: &mut VmContext, tid: ThreadId) {
    let mut abandoned = Vec::new();
    vm.handles.for_each_sync(|sync| {
        let mut guard = sync.borrow_mut();
        if let Dispatcher::Mutant { header, owner, recursion, abandoned: flag } = &mut *guard {
            if *owner == tid {
                *flag = true;
                header.signal = 1;
                *owner = 0;
                *recursion = 0;
                abandoned.push(sync.clone());
            }
        }
    });
    for sync in abandoned {
        vm.sched.signal_object(&sync);
    }
}

pub fn sys_nt_terminate_thread(vm: &mut VmContext) -> SysOutcome {
    let handle = nt_arg!(vm, 0);
    let exit_code = nt_arg!(vm, 1);

    let Some(tid) = thread_id_for_handle(vm, handle) else {
        return SysOutcome::Ret(NtStatus::INVALID_HANDLE);
    };
    let is_current = tid == vm.current_thread_id();

    abandon_owned_mutants(vm, tid);
    let VmContext { sched, cpu, .. } = vm;
    if !sched.terminate_thread(tid, exit_code, cpu) {
        return SysOutcome::Ret(NtStatus::INVALID_HANDLE);
    }
    if is_current {
        // The register file now belongs to whatever ran next; this call
        // never returns to its issuer.
        SysOutcome::NoReturn
    } else {
        SysOutcome::Ret(NtStatus::SUCCESS)
    }
}

pub fn sys_nt_resume_thread(vm: &mut VmContext) -> SysOutcome {
    let handle = nt_arg!(vm, 0);
    let previous_count_ptr = nt_arg!(vm, 1);

    let Some(tid) = thread_id_for_handle(vm, handle) else {
        return SysOutcome::Ret(NtStatus::INVALID_HANDLE);
    };
    if vm.sched.resume_thread(tid) {
        write_guest_u32(vm, previous_count_ptr, 1);
        SysOutcome::Ret(NtStatus::SUCCESS)
    } else {
        write_guest_u32(vm, previous_count_ptr, 0);
        SysOutcome::Ret(NtStatus::SUCCESS)
    }
}

pub fn sys_nt_alert_thread(vm: &mut VmContext) -> SysOutcome {
    let handle = nt_arg!(vm, 0);
    let Some(tid) = thread_id_for_handle(vm, handle) else {
        return SysOutcome::Ret(NtStatus::INVALID_HANDLE);
    };
    if vm.sched.alert_thread(tid) {
        SysOutcome::Ret(NtStatus::SUCCESS)
    } else {
        SysOutcome::Ret(NtStatus::INVALID_HANDLE)
    }
}

pub fn sys_nt_test_alert(vm: &mut VmContext) -> SysOutcome {
    if vm.sched.test_alert() {
        SysOutcome::Ret(NtStatus::ALERTED)
    } else {
        SysOutcome::Ret(NtStatus::SUCCESS)
    }
}

pub fn sys_nt_yield_execution(vm: &mut VmContext) -> SysOutcome {
    // The yielding thread's saved context must already carry its return
    // value; set it before the switch copies the register file out.
    vm.cpu.eax = NtStatus::SUCCESS.0;
    let VmContext { sched, cpu, .. } = vm;
    sched.yield_now(cpu);
    SysOutcome::NoReturn
}
