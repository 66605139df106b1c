//! The NT handle table: a small dense array of kernel object records.
//!
//! Handle values are direct slot indices; 0 is reserved, slots 1..3 are
//! prepopulated with the console streams, and the three Windows standard
//! pseudo-handles (plus plain 0/1/2) resolve onto those slots. There is
//! no generation counter on this path; closed slots are simply reused.

use std::fs::File;

use ntbox_abi::file::FileAccess;
use ntbox_abi::handle::{
    NtHandle, MAX_NT_HANDLES, STD_ERROR_HANDLE, STD_INPUT_HANDLE, STD_OUTPUT_HANDLE,
};
use ntbox_sched::SyncRef;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ConsoleStream {
    In,
    Out,
    Err,
}

pub struct FileObject {
    pub file: File,
    pub access: FileAccess,
    pub offset: u64,
}

pub enum NtObject {
    File(FileObject),
    Console(ConsoleStream),
    /// Dispatcher object; the slot's strong reference keeps it alive,
    /// last close frees it.
    Sync(SyncRef),
}

pub struct NtHandleTable {
    entries: Vec<Option<NtObject>>,
    /// Rolling allocation hint.
    next_handle: usize,
}

impl NtHandleTable {
    pub fn new() -> NtHandleTable {
        let mut entries: Vec<Option<NtObject>> = (0..MAX_NT_HANDLES).map(|_| None).collect();
        entries[1] = Some(NtObject::Console(ConsoleStream::In));
        entries[2] = Some(NtObject::Console(ConsoleStream::Out));
        entries[3] = Some(NtObject::Console(ConsoleStream::Err));
        NtHandleTable { entries, next_handle: 4 }
    }

    /// First free slot from the hint, wrapping to the bottom; 0 on a full
    /// table.
    pub fn add(&mut self, object: NtObject) -> NtHandle {
        let free = (self.next_handle..MAX_NT_HANDLES)
            .chain(1..self.next_handle)
            .find(|&i| self.entries[i].is_none());
        match free {
            Some(i) => {
                self.entries[i] = Some(object);
                self.next_handle = i + 1;
                i as NtHandle
            }
            None => 0,
        }
    }

    fn pseudo_slot(handle: NtHandle) -> Option<usize> {
        match handle {
            STD_INPUT_HANDLE | 0 => Some(1),
            STD_OUTPUT_HANDLE | 1 => Some(2),
            STD_ERROR_HANDLE | 2 => Some(3),
            _ => None,
        }
    }

    /// Resolve a handle including the standard pseudo-handles; the main
    /// entry point for syscall handlers.
    pub fn resolve(&self, handle: NtHandle) -> Option<&NtObject> {
        let slot = match Self::pseudo_slot(handle) {
            Some(slot) => slot,
            None => {
                if handle as usize >= MAX_NT_HANDLES {
                    return None;
                }
                handle as usize
            }
        };
        self.entries.get(slot)?.as_ref()
    }

    pub fn resolve_mut(&mut self, handle: NtHandle) -> Option<&mut NtObject> {
        let slot = match Self::pseudo_slot(handle) {
            Some(slot) => slot,
            None => {
                if handle as usize >= MAX_NT_HANDLES {
                    return None;
                }
                handle as usize
            }
        };
        self.entries.get_mut(slot)?.as_mut()
    }

    /// Close releases the slot; sync payloads die with their last strong
    /// reference.
    pub fn close(&mut self, handle: NtHandle) -> bool {
        let slot = handle as usize;
        if slot == 0 || slot >= MAX_NT_HANDLES {
            return false;
        }
        self.entries[slot].take().is_some()
    }

    /// Strong reference to the dispatcher object behind a handle.
    pub fn sync_ref(&self, handle: NtHandle) -> Option<SyncRef> {
        match self.resolve(handle)? {
            NtObject::Sync(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Visit every live dispatcher object (mutant abandonment sweep).
    pub fn for_each_sync(&self, mut f: impl FnMut(&SyncRef)) {
        for entry in self.entries.iter().flatten() {
            if let NtObject::Sync(s) = entry {
                f(s);
            }
        }
    }
}

impl Default for NtHandleTable {
    fn default() -> Self {
        NtHandleTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntbox_sched::{Dispatcher, EventKind};

    #[test]
    fn pseudo_handles_resolve_to_consoles() {
        let t = NtHandleTable::new();
        assert!(matches!(
            t.resolve(STD_OUTPUT_HANDLE),
            Some(NtObject::Console(ConsoleStream::Out))
        ));
        assert!(matches!(t.resolve(0), Some(NtObject::Console(ConsoleStream::In))));
        assert!(matches!(t.resolve(2), Some(NtObject::Console(ConsoleStream::Err))));
    }

    #[test]
    fn resolve_succeeds_until_close() {
        let mut t = NtHandleTable::new();
        let e = Dispatcher::event(EventKind::Notification, false);
        let h = t.add(NtObject::Sync(e));
        assert_ne!(h, 0);
        assert!(t.sync_ref(h).is_some());
        assert!(t.close(h));
        assert!(t.resolve(h).is_none());
        assert!(!t.close(h));
    }

    #[test]
    fn allocation_wraps_and_fails_when_full() {
        let mut t = NtHandleTable::new();
        let mut handles = Vec::new();
        loop {
            let h = t.add(NtObject::Sync(Dispatcher::event(EventKind::Notification, false)));
            if h == 0 {
                break;
            }
            handles.push(h);
        }
        assert_eq!(handles.len(), MAX_NT_HANDLES - 4);
        // Freeing one slot makes exactly one allocation possible again.
        assert!(t.close(handles[10]));
        let h = t.add(NtObject::Sync(Dispatcher::event(EventKind::Notification, false)));
        assert_eq!(h, handles[10]);
        assert_eq!(t.add(NtObject::Sync(Dispatcher::event(EventKind::Notification, false))), 0);
    }

    #[test]
    fn last_close_drops_sync_object() {
        let mut t = NtHandleTable::new();
        let e = Dispatcher::event(EventKind::Notification, false);
        let weak = std::rc::Rc::downgrade(&e);
        let h = t.add(NtObject::Sync(e));
        assert!(weak.upgrade().is_some());
        t.close(h);
        assert!(weak.upgrade().is_none(), "slot held the last strong ref");
    }
}
