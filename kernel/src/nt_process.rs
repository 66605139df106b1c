//! Process-level syscalls: termination and the time queries.

use log::info;
use ntbox_abi::handle::CURRENT_PROCESS;
use ntbox_abi::status::NtStatus;

use crate::dispatch::{nt_arg, write_guest_u64, SysOutcome};
use crate::vm::VmContext;

/// The performance counter runs in 100 ns units, i.e. 10 MHz.
const PERF_FREQUENCY: u64 = 10_000_000;

pub fn sys_nt_terminate_process(vm: &mut VmContext) -> SysOutcome {
    let process_handle = nt_arg!(vm, 0);
    let exit_status = nt_arg!(vm, 1);

    // NULL or the current-process pseudo-handle.
    if process_handle != 0 && process_handle != CURRENT_PROCESS {
        return SysOutcome::Ret(NtStatus::INVALID_HANDLE);
    }
    info!("NtTerminateProcess(exit_status={exit_status:#x})");
    vm.request_exit(exit_status);
    SysOutcome::Ret(NtStatus::SUCCESS)
}

pub fn sys_nt_query_performance_counter(vm: &mut VmContext) -> SysOutcome {
    let counter_ptr = nt_arg!(vm, 0);
    let frequency_ptr = nt_arg!(vm, 1);

    let now = vm.now_100ns();
    write_guest_u64(vm, counter_ptr, now);
    write_guest_u64(vm, frequency_ptr, PERF_FREQUENCY);
    SysOutcome::Ret(NtStatus::SUCCESS)
}

/// Same clock as the performance counter; the guest runtime only does
/// interval arithmetic with it.
pub fn sys_nt_query_system_time(vm: &mut VmContext) -> SysOutcome {
    let time_ptr = nt_arg!(vm, 0);
    let now = vm.now_100ns();
    write_guest_u64(vm, time_ptr, now);
    SysOutcome::Ret(NtStatus::SUCCESS)
}
