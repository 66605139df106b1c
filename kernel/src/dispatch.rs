//! SYSENTER dispatch: fetch the service number from the accumulator,
//! read arguments from the guest stack, route by band, and write the
//! result back.
//!
//! Stack layout on entry differs per band: the NT stubs leave two return
//! addresses above the arguments (`ESP+8`), the Win32k stubs one
//! (`ESP+4`). Blocking handlers context-switch away and must leave the
//! accumulator alone; the waker delivers the status into the sleeping
//! thread's saved EAX.

use log::{debug, warn};
use ntbox_abi::status::NtStatus;
use ntbox_abi::syscall::{self, classify, nt_syscall_name, SyscallBand};

use crate::vm::VmContext;
use crate::{heap, nt_file, nt_process, nt_sync, nt_thread, strings, win32k};

/// What a handler did with the accumulator.
pub enum SysOutcome {
    /// Write this status into EAX.
    Ret(NtStatus),
    /// EAX already holds the result, or the thread blocked and the
    /// register file now belongs to someone else.
    NoReturn,
}

/// Argument fetch for NT-band handlers.
macro_rules! nt_arg {
    ($vm:expr, $i:expr) => {
        match $vm.mem.read_u32($vm.cpu.esp.wrapping_add(8 + $i * 4)) {
            Ok(v) => v,
            Err(_) => {
                return $crate::dispatch::SysOutcome::Ret(
                    ntbox_abi::status::NtStatus::INVALID_PARAMETER,
                )
            }
        }
    };
}

/// Argument fetch for Win32k-band handlers; failures produce the GDI
/// failure value (zero accumulator) instead of a status.
macro_rules! w32_arg {
    ($vm:expr, $i:expr) => {
        match $vm.mem.read_u32($vm.cpu.esp.wrapping_add(4 + $i * 4)) {
            Ok(v) => v,
            Err(_) => {
                $vm.cpu.eax = 0;
                return $crate::dispatch::SysOutcome::NoReturn;
            }
        }
    };
}

pub(crate) use {nt_arg, w32_arg};

/// Best-effort guest dword store; null and unmapped out-pointers are
/// skipped rather than failing the call.
pub(crate) fn write_guest_u32(vm: &mut VmContext, ptr: u32, value: u32) {
    if ptr == 0 {
        return;
    }
    let _ = vm.mem.write_u32(ptr, value);
}

pub(crate) fn write_guest_u64(vm: &mut VmContext, ptr: u32, value: u64) {
    if ptr == 0 {
        return;
    }
    let _ = vm.mem.write_u64(ptr, value);
}

/// The SYSENTER entry point.
pub fn sysenter(vm: &mut VmContext) {
    let num = vm.cpu.eax;
    let outcome = match classify(num) {
        SyscallBand::Nt(n) => nt_dispatch(vm, n),
        SyscallBand::Win32k(n) => win32k::dispatch(vm, n),
        SyscallBand::Pseudo(n) => pseudo_dispatch(vm, n),
    };
    if let SysOutcome::Ret(status) = outcome {
        if status.is_error() {
            debug!("{} -> {}", nt_syscall_name(num), status.name());
        }
        vm.cpu.eax = status.0;
    }
}

/// Bind NT service numbers to handler functions; `paste` derives the
/// handler name from the service name.
macro_rules! nt_table {
    ($vm:expr, $n:expr; $($module:ident :: $name:ident),* $(,)?) => {
        paste::paste! {
            match $n {
                $(syscall::nt::$name => $module::[<sys_ $name:snake>]($vm),)*
                other => {
                    warn!("unimplemented NT syscall {:#x} ({})", other, nt_syscall_name(other));
                    SysOutcome::Ret(NtStatus::NOT_IMPLEMENTED)
                }
            }
        }
    };
}

fn nt_dispatch(vm: &mut VmContext, n: u32) -> SysOutcome {
    nt_table! { vm, n;
        nt_file::NtClose,
        nt_file::NtCreateFile,
        nt_file::NtOpenFile,
        nt_file::NtReadFile,
        nt_file::NtWriteFile,
        nt_file::NtDuplicateObject,
        nt_process::NtTerminateProcess,
        nt_process::NtQueryPerformanceCounter,
        nt_process::NtQuerySystemTime,
        nt_thread::NtCreateThread,
        nt_thread::NtTerminateThread,
        nt_thread::NtResumeThread,
        nt_thread::NtAlertThread,
        nt_thread::NtTestAlert,
        nt_thread::NtYieldExecution,
        nt_sync::NtCreateEvent,
        nt_sync::NtSetEvent,
        nt_sync::NtResetEvent,
        nt_sync::NtClearEvent,
        nt_sync::NtPulseEvent,
        nt_sync::NtCreateSemaphore,
        nt_sync::NtReleaseSemaphore,
        nt_sync::NtCreateMutant,
        nt_sync::NtReleaseMutant,
        nt_sync::NtCreateTimer,
        nt_sync::NtSetTimer,
        nt_sync::NtWaitForSingleObject,
        nt_sync::NtWaitForMultipleObjects,
        nt_sync::NtDelayExecution,
    }
}

fn pseudo_dispatch(vm: &mut VmContext, n: u32) -> SysOutcome {
    match n {
        syscall::pseudo::HEAP_ALLOC => heap::sys_heap_alloc(vm),
        syscall::pseudo::HEAP_FREE => heap::sys_heap_free(vm),
        syscall::pseudo::HEAP_REALLOC => heap::sys_heap_realloc(vm),
        syscall::pseudo::HEAP_SIZE => heap::sys_heap_size(vm),
        syscall::pseudo::MBSTR_TO_UNICODE => strings::sys_mbstr_to_unicode(vm),
        syscall::pseudo::UNICODE_TO_MBSTR => strings::sys_unicode_to_mbstr(vm),
        syscall::pseudo::MBSTR_SIZE => strings::sys_mbstr_size(vm),
        syscall::pseudo::UNICODE_SIZE => strings::sys_unicode_size(vm),
        syscall::pseudo::IMAGE_INIT_DONE => {
            vm.image_init_done = true;
            debug!("guest image initialization complete");
            SysOutcome::Ret(NtStatus::SUCCESS)
        }
        _ => SysOutcome::Ret(NtStatus::NOT_IMPLEMENTED),
    }
}
