//! String-conversion pseudo-syscalls: the RtlMultiByteToUnicodeN family,
//! intercepted from the guest runtime. Narrow conversion only (Latin-1
//! to UCS-2 and back, high code units collapse to '?').

use ntbox_abi::status::NtStatus;

use crate::dispatch::{nt_arg, write_guest_u32, SysOutcome};
use crate::vm::VmContext;

const MAX_CONVERT_BYTES: u32 = 1 << 16;

/// RtlMultiByteToUnicodeN(unicode, max_bytes, result_bytes*, mb, mb_size)
pub fn sys_mbstr_to_unicode(vm: &mut VmContext) -> SysOutcome {
    let unicode_ptr = nt_arg!(vm, 0);
    let max_bytes = nt_arg!(vm, 1).min(MAX_CONVERT_BYTES);
    let result_ptr = nt_arg!(vm, 2);
    let mb_ptr = nt_arg!(vm, 3);
    let mb_size = nt_arg!(vm, 4).min(MAX_CONVERT_BYTES);

    let chars = (max_bytes / 2).min(mb_size);
    let mut written = 0u32;
    for i in 0..chars {
        let byte = match vm.mem.read_u8(mb_ptr + i) {
            Ok(b) => b,
            Err(_) => return SysOutcome::Ret(NtStatus::INVALID_PARAMETER),
        };
        if vm.mem.write_u16(unicode_ptr + i * 2, byte as u16).is_err() {
            return SysOutcome::Ret(NtStatus::INVALID_PARAMETER);
        }
        written += 2;
    }
    write_guest_u32(vm, result_ptr, written);
    SysOutcome::Ret(NtStatus::SUCCESS)
}

/// RtlUnicodeToMultiByteN(mb, max_bytes, result_bytes*, unicode, uni_bytes)
pub fn sys_unicode_to_mbstr(vm: &mut VmContext) -> SysOutcome {
    let mb_ptr = nt_arg!(vm, 0);
    let max_bytes = nt_arg!(vm, 1).min(MAX_CONVERT_BYTES);
    let result_ptr = nt_arg!(vm, 2);
    let unicode_ptr = nt_arg!(vm, 3);
    let unicode_bytes = nt_arg!(vm, 4).min(MAX_CONVERT_BYTES);

    let chars = max_bytes.min(unicode_bytes / 2);
    let mut written = 0u32;
    for i in 0..chars {
        let unit = match vm.mem.read_u16(unicode_ptr + i * 2) {
            Ok(u) => u,
            Err(_) => return SysOutcome::Ret(NtStatus::INVALID_PARAMETER),
        };
        let byte = if unit <= 0xFF { unit as u8 } else { b'?' };
        if vm.mem.write_u8(mb_ptr + i, byte).is_err() {
            return SysOutcome::Ret(NtStatus::INVALID_PARAMETER);
        }
        written += 1;
    }
    write_guest_u32(vm, result_ptr, written);
    SysOutcome::Ret(NtStatus::SUCCESS)
}

/// RtlMultiByteToUnicodeSize(size*, mb, mb_size): one UCS-2 unit per byte.
pub fn sys_mbstr_size(vm: &mut VmContext) -> SysOutcome {
    let size_ptr = nt_arg!(vm, 0);
    let mb_size = nt_arg!(vm, 2).min(MAX_CONVERT_BYTES);
    write_guest_u32(vm, size_ptr, mb_size * 2);
    SysOutcome::Ret(NtStatus::SUCCESS)
}

/// RtlUnicodeToMultiByteSize(size*, unicode, uni_bytes).
pub fn sys_unicode_size(vm: &mut VmContext) -> SysOutcome {
    let size_ptr = nt_arg!(vm, 0);
    let unicode_bytes = nt_arg!(vm, 2).min(MAX_CONVERT_BYTES);
    write_guest_u32(vm, size_ptr, unicode_bytes / 2);
    SysOutcome::Ret(NtStatus::SUCCESS)
}
