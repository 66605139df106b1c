//! File and handle syscalls: NtClose, NtCreateFile/NtOpenFile,
//! NtReadFile/NtWriteFile, NtDuplicateObject.
//!
//! Guest paths arrive as NT object names (`\??\C:\dir\file`); they are
//! translated to host-relative paths. Console handles write straight to
//! the host's standard streams. The IO_STATUS_BLOCK receives the status
//! and the transferred length like the real interface.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};

use log::{debug, trace};
use ntbox_abi::file::FileAccess;
use ntbox_abi::status::{
    NtStatus, FILE_CREATED, FILE_DISP_CREATE, FILE_DISP_OPEN, FILE_DISP_OPEN_IF,
    FILE_DISP_OVERWRITE, FILE_DISP_OVERWRITE_IF, FILE_DISP_SUPERSEDE, FILE_OPENED,
    FILE_OVERWRITTEN,
};

use crate::dispatch::{nt_arg, write_guest_u32, SysOutcome};
use crate::handles::{ConsoleStream, FileObject, NtObject};
use crate::vm::VmContext;

/// OBJECT_ATTRIBUTES field offsets.
const OBJ_ATTR_NAME_PTR: u32 = 8;

fn fill_iosb(vm: &mut VmContext, iosb: u32, status: NtStatus, information: u32) {
    write_guest_u32(vm, iosb, status.0);
    if iosb != 0 {
        write_guest_u32(vm, iosb + 4, information);
    }
}

/// Read the ObjectName UNICODE_STRING out of a guest OBJECT_ATTRIBUTES.
fn read_object_name(vm: &VmContext, obj_attr: u32) -> Option<String> {
    let name_ptr = vm.mem.read_u32(obj_attr + OBJ_ATTR_NAME_PTR).ok()?;
    if name_ptr == 0 {
        return None;
    }
    let length = vm.mem.read_u16(name_ptr).ok()? as usize;
    let buffer = vm.mem.read_u32(name_ptr + 4).ok()?;
    let mut units = Vec::with_capacity(length / 2);
    for i in 0..(length / 2) {
        units.push(vm.mem.read_u16(buffer + i as u32 * 2).ok()?);
    }
    Some(String::from_utf16_lossy(&units))
}

/// `\??\C:\dir\file.txt` -> `dir/file.txt`, relative to the host working
/// directory. Device-less relative names pass through unchanged.
fn translate_path(nt_path: &str) -> String {
    let mut path = nt_path.strip_prefix("\\??\\").unwrap_or(nt_path);
    if path.len() >= 2 && path.as_bytes()[1] == b':' {
        path = &path[2..];
    }
    path.trim_start_matches('\\').replace('\\', "/")
}

fn open_host_file(
    vm: &mut VmContext,
    access: FileAccess,
    obj_attr: u32,
    disposition: u32,
) -> Result<(u32, u32), NtStatus> {
    let Some(name) = read_object_name(vm, obj_attr) else {
        return Err(NtStatus::OBJECT_NAME_INVALID);
    };
    let path = translate_path(&name);
    if path.is_empty() {
        return Err(NtStatus::OBJECT_NAME_INVALID);
    }

    let existed = std::path::Path::new(&path).exists();
    let mut options = OpenOptions::new();
    options.read(access.wants_read() || !access.wants_write());
    options.write(access.wants_write());
    match disposition {
        FILE_DISP_OPEN => {
            if !existed {
                return Err(NtStatus::OBJECT_NAME_NOT_FOUND);
            }
        }
        FILE_DISP_CREATE => {
            if existed {
                return Err(NtStatus::OBJECT_NAME_COLLISION);
            }
            options.write(true).create_new(true);
        }
        FILE_DISP_OPEN_IF => {
            if !existed {
                options.write(true).create(true);
            }
        }
        FILE_DISP_OVERWRITE | FILE_DISP_OVERWRITE_IF | FILE_DISP_SUPERSEDE => {
            if disposition == FILE_DISP_OVERWRITE && !existed {
                return Err(NtStatus::OBJECT_NAME_NOT_FOUND);
            }
            options.write(true).create(true).truncate(true);
        }
        _ => return Err(NtStatus::INVALID_PARAMETER),
    }

    let file = options.open(&path).map_err(|err| {
        debug!("open {path:?} failed: {err}");
        match err.kind() {
            std::io::ErrorKind::NotFound => NtStatus::OBJECT_NAME_NOT_FOUND,
            std::io::ErrorKind::PermissionDenied => NtStatus::ACCESS_DENIED,
            _ => NtStatus::IO_DEVICE_ERROR,
        }
    })?;

    let handle = vm
        .handles
        .add(NtObject::File(FileObject { file, access, offset: 0 }));
    if handle == 0 {
        return Err(NtStatus::NO_MEMORY);
    }
    let information = match disposition {
        FILE_DISP_CREATE => FILE_CREATED,
        FILE_DISP_OPEN_IF if !existed => FILE_CREATED,
        FILE_DISP_OVERWRITE | FILE_DISP_OVERWRITE_IF if existed => FILE_OVERWRITTEN,
        _ => FILE_OPENED,
    };
    trace!("opened {path:?} as handle {handle}");
    Ok((handle, information))
}

pub fn sys_nt_close(vm: &mut VmContext) -> SysOutcome {
    let handle = nt_arg!(vm, 0);
    if vm.handles.close(handle) {
        SysOutcome::Ret(NtStatus::SUCCESS)
    } else {
        SysOutcome::Ret(NtStatus::INVALID_HANDLE)
    }
}

pub fn sys_nt_create_file(vm: &mut VmContext) -> SysOutcome {
    let handle_ptr = nt_arg!(vm, 0);
    let access = FileAccess::from_bits_retain(nt_arg!(vm, 1));
    let obj_attr = nt_arg!(vm, 2);
    let iosb = nt_arg!(vm, 3);
    // args 4..6: AllocationSize, FileAttributes, ShareAccess.
    let disposition = nt_arg!(vm, 7);

    match open_host_file(vm, access, obj_attr, disposition) {
        Ok((handle, information)) => {
            write_guest_u32(vm, handle_ptr, handle);
            fill_iosb(vm, iosb, NtStatus::SUCCESS, information);
            SysOutcome::Ret(NtStatus::SUCCESS)
        }
        Err(status) => {
            fill_iosb(vm, iosb, status, 0);
            SysOutcome::Ret(status)
        }
    }
}

pub fn sys_nt_open_file(vm: &mut VmContext) -> SysOutcome {
    let handle_ptr = nt_arg!(vm, 0);
    let access = FileAccess::from_bits_retain(nt_arg!(vm, 1));
    let obj_attr = nt_arg!(vm, 2);
    let iosb = nt_arg!(vm, 3);

    match open_host_file(vm, access, obj_attr, FILE_DISP_OPEN) {
        Ok((handle, information)) => {
            write_guest_u32(vm, handle_ptr, handle);
            fill_iosb(vm, iosb, NtStatus::SUCCESS, information);
            SysOutcome::Ret(NtStatus::SUCCESS)
        }
        Err(status) => {
            fill_iosb(vm, iosb, status, 0);
            SysOutcome::Ret(status)
        }
    }
}

/// Clamp guest I/O lengths so a hostile length cannot balloon host
/// allocations; the transfer loops stop at the first unmapped page.
const MAX_IO_BYTES: u32 = 1 << 20;

pub fn sys_nt_read_file(vm: &mut VmContext) -> SysOutcome {
    let handle = nt_arg!(vm, 0);
    // args 1..3: Event, ApcRoutine, ApcContext (synchronous-only engine).
    let iosb = nt_arg!(vm, 4);
    let buffer = nt_arg!(vm, 5);
    let length = nt_arg!(vm, 6).min(MAX_IO_BYTES);
    let byte_offset_ptr = nt_arg!(vm, 7);

    let explicit_offset = if byte_offset_ptr != 0 {
        match vm.mem.read_u64(byte_offset_ptr) {
            Ok(v) if (v as i64) >= 0 => Some(v),
            _ => None,
        }
    } else {
        None
    };

    let mut data = vec![0u8; length as usize];
    let read = match vm.handles.resolve_mut(handle) {
        Some(NtObject::Console(ConsoleStream::In)) => match std::io::stdin().read(&mut data) {
            Ok(n) => n,
            Err(_) => return SysOutcome::Ret(NtStatus::IO_DEVICE_ERROR),
        },
        Some(NtObject::File(fo)) => {
            if !fo.access.wants_read() {
                return SysOutcome::Ret(NtStatus::ACCESS_DENIED);
            }
            let offset = explicit_offset.unwrap_or(fo.offset);
            let result = fo
                .file
                .seek(SeekFrom::Start(offset))
                .and_then(|_| fo.file.read(&mut data));
            match result {
                Ok(n) => {
                    fo.offset = offset + n as u64;
                    n
                }
                Err(_) => return SysOutcome::Ret(NtStatus::IO_DEVICE_ERROR),
            }
        }
        Some(_) => return SysOutcome::Ret(NtStatus::INVALID_HANDLE),
        None => return SysOutcome::Ret(NtStatus::INVALID_HANDLE),
    };

    if read == 0 && length > 0 {
        fill_iosb(vm, iosb, NtStatus::END_OF_FILE, 0);
        return SysOutcome::Ret(NtStatus::END_OF_FILE);
    }
    if vm.mem.write_bytes(buffer, &data[..read]).is_err() {
        return SysOutcome::Ret(NtStatus::INVALID_PARAMETER);
    }
    fill_iosb(vm, iosb, NtStatus::SUCCESS, read as u32);
    SysOutcome::Ret(NtStatus::SUCCESS)
}

pub fn sys_nt_write_file(vm: &mut VmContext) -> SysOutcome {
    let handle = nt_arg!(vm, 0);
    let iosb = nt_arg!(vm, 4);
    let buffer = nt_arg!(vm, 5);
    let length = nt_arg!(vm, 6).min(MAX_IO_BYTES);

    if length == 0 {
        fill_iosb(vm, iosb, NtStatus::SUCCESS, 0);
        return SysOutcome::Ret(NtStatus::SUCCESS);
    }
    let mut data = vec![0u8; length as usize];
    if vm.mem.read_bytes(buffer, &mut data).is_err() {
        return SysOutcome::Ret(NtStatus::INVALID_PARAMETER);
    }

    let written = match vm.handles.resolve_mut(handle) {
        Some(NtObject::Console(ConsoleStream::Out)) => std::io::stdout().write(&data),
        Some(NtObject::Console(ConsoleStream::Err)) => std::io::stderr().write(&data),
        Some(NtObject::File(fo)) => {
            if !fo.access.wants_write() {
                return SysOutcome::Ret(NtStatus::ACCESS_DENIED);
            }
            let offset = fo.offset;
            let result = fo
                .file
                .seek(SeekFrom::Start(offset))
                .and_then(|_| fo.file.write(&data));
            if let Ok(n) = result {
                fo.offset = offset + n as u64;
            }
            result
        }
        _ => return SysOutcome::Ret(NtStatus::INVALID_HANDLE),
    };

    match written {
        Ok(n) => {
            fill_iosb(vm, iosb, NtStatus::SUCCESS, n as u32);
            SysOutcome::Ret(NtStatus::SUCCESS)
        }
        Err(_) => SysOutcome::Ret(NtStatus::IO_DEVICE_ERROR),
    }
}

/// Same-process handle duplication for files, consoles and sync objects.
pub fn sys_nt_duplicate_object(vm: &mut VmContext) -> SysOutcome {
    // args 0/2: source/target process handles (single-process model).
    let source = nt_arg!(vm, 1);
    let target_ptr = nt_arg!(vm, 3);

    let duplicate = match vm.handles.resolve(source) {
        Some(NtObject::Console(stream)) => NtObject::Console(*stream),
        Some(NtObject::Sync(sync)) => NtObject::Sync(sync.clone()),
        Some(NtObject::File(fo)) => match fo.file.try_clone() {
            Ok(file) => NtObject::File(FileObject {
                file,
                access: fo.access,
                offset: fo.offset,
            }),
            Err(_) => return SysOutcome::Ret(NtStatus::IO_DEVICE_ERROR),
        },
        None => return SysOutcome::Ret(NtStatus::INVALID_HANDLE),
    };

    let handle = vm.handles.add(duplicate);
    if handle == 0 {
        return SysOutcome::Ret(NtStatus::NO_MEMORY);
    }
    write_guest_u32(vm, target_ptr, handle);
    SysOutcome::Ret(NtStatus::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::VmContext;
    use ntbox_abi::syscall::nt;
    use ntbox_gdi::HeadlessDisplay;

    #[test]
    fn nt_paths_translate_to_host_relative() {
        assert_eq!(translate_path("\\??\\C:\\dir\\file.txt"), "dir/file.txt");
        assert_eq!(translate_path("\\??\\D:\\x"), "x");
        assert_eq!(translate_path("plain.txt"), "plain.txt");
        assert_eq!(translate_path("\\??\\C:\\"), "");
    }

    fn vm() -> VmContext {
        let _ = env_logger::builder().is_test(true).try_init();
        VmContext::new(Box::new(HeadlessDisplay::new(640, 480).unwrap())).unwrap()
    }

    fn nt_call(vm: &mut VmContext, num: u32, args: &[u32]) -> u32 {
        // Leave room above ESP for the argument block.
        let esp = crate::vm::MAIN_STACK_TOP - 0x400;
        for (i, &arg) in args.iter().enumerate() {
            vm.mem.write_u32(esp + 8 + i as u32 * 4, arg).unwrap();
        }
        vm.cpu.esp = esp;
        vm.cpu.eax = num;
        vm.sysenter();
        vm.cpu.eax
    }

    /// Build OBJECT_ATTRIBUTES + UNICODE_STRING for `path` in guest space.
    fn guest_object_attributes(vm: &mut VmContext, path: &str) -> u32 {
        let units: Vec<u16> = path.encode_utf16().collect();
        let buffer = vm.heap.alloc((units.len() as u32 + 1) * 2).unwrap();
        for (i, unit) in units.iter().enumerate() {
            vm.mem.write_u16(buffer + i as u32 * 2, *unit).unwrap();
        }
        let name = vm.heap.alloc(8).unwrap();
        vm.mem.write_u16(name, units.len() as u16 * 2).unwrap();
        vm.mem.write_u16(name + 2, units.len() as u16 * 2).unwrap();
        vm.mem.write_u32(name + 4, buffer).unwrap();

        let attr = vm.heap.alloc(24).unwrap();
        vm.mem.write_u32(attr, 24).unwrap();
        vm.mem.write_u32(attr + OBJ_ATTR_NAME_PTR, name).unwrap();
        attr
    }

    #[test]
    fn create_write_read_round_trip() {
        let mut vm = vm();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt").to_string_lossy().into_owned();

        // Create and write.
        let attr = guest_object_attributes(&mut vm, &path);
        let handle_ptr = vm.heap.alloc(4).unwrap();
        let iosb = vm.heap.alloc(8).unwrap();
        let status = nt_call(
            &mut vm,
            nt::NtCreateFile,
            &[handle_ptr, FileAccess::GENERIC_WRITE.bits(), attr, iosb, 0, 0, 0, FILE_DISP_CREATE, 0, 0, 0],
        );
        assert_eq!(status, NtStatus::SUCCESS.0);
        assert_eq!(vm.mem.read_u32(iosb + 4).unwrap(), FILE_CREATED);
        let handle = vm.mem.read_u32(handle_ptr).unwrap();
        assert_ne!(handle, 0);

        let data = vm.heap.alloc(16).unwrap();
        vm.mem.write_bytes(data, b"hello").unwrap();
        let status = nt_call(
            &mut vm,
            nt::NtWriteFile,
            &[handle, 0, 0, 0, iosb, data, 5, 0, 0],
        );
        assert_eq!(status, NtStatus::SUCCESS.0);
        assert_eq!(vm.mem.read_u32(iosb + 4).unwrap(), 5, "bytes written");
        assert_eq!(nt_call(&mut vm, nt::NtClose, &[handle]), NtStatus::SUCCESS.0);
        assert_eq!(std::fs::read(dir.path().join("out.txt")).unwrap(), b"hello");

        // Open and read back through a fresh handle.
        let attr = guest_object_attributes(&mut vm, &path);
        let status = nt_call(
            &mut vm,
            nt::NtOpenFile,
            &[handle_ptr, FileAccess::GENERIC_READ.bits(), attr, iosb, 0, 0],
        );
        assert_eq!(status, NtStatus::SUCCESS.0);
        let handle = vm.mem.read_u32(handle_ptr).unwrap();

        let readback = vm.heap.alloc(16).unwrap();
        let status = nt_call(
            &mut vm,
            nt::NtReadFile,
            &[handle, 0, 0, 0, iosb, readback, 16, 0, 0],
        );
        assert_eq!(status, NtStatus::SUCCESS.0);
        assert_eq!(vm.mem.read_u32(iosb + 4).unwrap(), 5, "bytes read");
        let mut buf = [0u8; 5];
        vm.mem.read_bytes(readback, &mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        // Reading past the end reports END_OF_FILE.
        let status = nt_call(
            &mut vm,
            nt::NtReadFile,
            &[handle, 0, 0, 0, iosb, readback, 16, 0, 0],
        );
        assert_eq!(status, NtStatus::END_OF_FILE.0);
    }

    #[test]
    fn open_missing_file_reports_not_found() {
        let mut vm = vm();
        let attr = guest_object_attributes(&mut vm, "\\??\\C:\\no\\such\\file.bin");
        let handle_ptr = vm.heap.alloc(4).unwrap();
        let iosb = vm.heap.alloc(8).unwrap();
        let status = nt_call(
            &mut vm,
            nt::NtOpenFile,
            &[handle_ptr, FileAccess::GENERIC_READ.bits(), attr, iosb, 0, 0],
        );
        assert_eq!(status, NtStatus::OBJECT_NAME_NOT_FOUND.0);
    }

    #[test]
    fn console_write_succeeds_via_pseudo_handle() {
        let mut vm = vm();
        let data = vm.heap.alloc(8).unwrap();
        vm.mem.write_bytes(data, b"ok\n").unwrap();
        let iosb = vm.heap.alloc(8).unwrap();
        let status = nt_call(
            &mut vm,
            nt::NtWriteFile,
            &[ntbox_abi::handle::STD_OUTPUT_HANDLE, 0, 0, 0, iosb, data, 3, 0, 0],
        );
        assert_eq!(status, NtStatus::SUCCESS.0);
        assert_eq!(vm.mem.read_u32(iosb + 4).unwrap(), 3);
    }
}
