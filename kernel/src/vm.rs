//! The VM context: single owner of every subsystem the syscall surface
//! touches. The CPU interpreter holds this value and calls in on
//! SYSENTER, on the instruction-count tick, and while parked waiting for
//! a thread to become ready.

use log::{debug, info};
use ntbox_cpu::{CpuState, FLAG_IF};
use ntbox_gdi::{DisplayBackend, GdiHandleTable};
use ntbox_mem::{GuestMemory, MemError, MemResult, PageFlags, PAGE_SIZE};
use ntbox_sched::{Clock, Dispatcher, Scheduler, Thread, ThreadId, ThreadState, MAIN_THREAD_ID};

use crate::handles::NtHandleTable;
use crate::heap::GuestHeap;

/// Single emulated process; client ids follow the Windows convention of
/// small multiples of four.
pub const PROCESS_ID: u32 = 0x1000;

/// Main-thread TEB page; further TEBs step downwards from here.
pub const MAIN_TEB_ADDR: u32 = 0x7FFD_F000;
pub const TEB_ALLOCATION_STEP: u32 = 0x3000;
pub const TEB_FLOOR: u32 = 0x7FF0_0000;

/// PEB page, referenced from every TEB.
pub const PEB_ADDR: u32 = 0x7FFD_E000;

/// Main thread stack.
pub const MAIN_STACK_TOP: u32 = 0x0013_0000;
pub const MAIN_STACK_SIZE: u32 = 0x0010_0000;

/// Region additional thread stacks are carved from, top down.
pub const STACK_REGION_BASE: u32 = 0x0400_0000;
pub const STACK_REGION_END: u32 = 0x0800_0000;

/// Guest heap backing the RtlAllocateHeap pseudo-syscalls.
pub const HEAP_BASE: u32 = 0x0020_0000;
pub const HEAP_SIZE: u32 = 0x0010_0000;

/// Default guest physical memory.
pub const DEFAULT_PHYS_BYTES: u32 = 64 * 1024 * 1024;

/// TEB field offsets (NT_TIB plus client id / PEB pointer).
pub mod teb {
    pub const STACK_BASE: u32 = 0x04;
    pub const STACK_LIMIT: u32 = 0x08;
    pub const SELF: u32 = 0x18;
    pub const PROCESS_ID: u32 = 0x20;
    pub const THREAD_ID: u32 = 0x24;
    pub const PEB_POINTER: u32 = 0x30;
}

pub struct VmContext {
    pub cpu: CpuState,
    pub mem: GuestMemory,
    pub clock: Clock,
    pub handles: NtHandleTable,
    pub sched: Scheduler,
    pub gdi: GdiHandleTable,
    pub display: Box<dyn DisplayBackend>,
    pub heap: GuestHeap,

    /// Guest page the GDI table mirrors its entries into, once mapped.
    pub gdi_shared_addr: Option<u32>,
    /// Guest runtime finished DLL initialization.
    pub image_init_done: bool,
    /// WM_QUIT pending for the message getters.
    pub quit_posted: bool,

    next_teb: u32,
    next_stack: u32,
}

impl VmContext {
    /// Build a VM with the main thread materialized from the CPU's
    /// starting state: TEB and stack mapped, FS pointing at the TEB.
    pub fn new(display: Box<dyn DisplayBackend>) -> MemResult<VmContext> {
        let mut vm = VmContext {
            cpu: CpuState::new(),
            mem: GuestMemory::new(DEFAULT_PHYS_BYTES),
            clock: Clock::new(),
            handles: NtHandleTable::new(),
            sched: Scheduler::new(MAIN_THREAD_ID),
            gdi: GdiHandleTable::new(),
            display,
            heap: GuestHeap::new(HEAP_BASE, HEAP_SIZE),
            gdi_shared_addr: None,
            image_init_done: false,
            quit_posted: false,
            next_teb: MAIN_TEB_ADDR - TEB_ALLOCATION_STEP,
            next_stack: STACK_REGION_END,
        };
        vm.setup_main_thread()?;
        vm.mem
            .alloc_region(HEAP_BASE, HEAP_SIZE, PageFlags::USER | PageFlags::WRITABLE)?;
        info!("vm ready: main thread {MAIN_THREAD_ID:#x}, process {PROCESS_ID:#x}");
        Ok(vm)
    }

    fn setup_main_thread(&mut self) -> MemResult<()> {
        let flags = PageFlags::USER | PageFlags::WRITABLE;
        self.mem.alloc_region(MAIN_TEB_ADDR, PAGE_SIZE, flags)?;
        self.mem.alloc_region(PEB_ADDR, PAGE_SIZE, flags)?;
        self.mem
            .alloc_region(MAIN_STACK_TOP - MAIN_STACK_SIZE, MAIN_STACK_SIZE, flags)?;

        let tid = self.sched.alloc_thread_id();
        debug_assert_eq!(tid, MAIN_THREAD_ID);
        self.write_teb(MAIN_TEB_ADDR, tid, MAIN_STACK_TOP, MAIN_STACK_TOP - MAIN_STACK_SIZE)?;

        let mut main = Thread::new(tid, PROCESS_ID, ThreadState::Running, Dispatcher::thread_exit(tid));
        main.teb_addr = MAIN_TEB_ADDR;
        main.stack_base = MAIN_STACK_TOP;
        main.stack_limit = MAIN_STACK_TOP - MAIN_STACK_SIZE;
        main.stack_size = MAIN_STACK_SIZE;
        self.sched.adopt_main_thread(main);

        self.cpu.esp = MAIN_STACK_TOP - 16;
        self.cpu.flags = FLAG_IF;
        self.cpu.set_fs_base(MAIN_TEB_ADDR);
        Ok(())
    }

    pub fn write_teb(&mut self, teb: u32, tid: ThreadId, stack_base: u32, stack_limit: u32) -> MemResult<()> {
        self.mem.write_u32(teb + teb::SELF, teb)?;
        self.mem.write_u32(teb + teb::STACK_BASE, stack_base)?;
        self.mem.write_u32(teb + teb::STACK_LIMIT, stack_limit)?;
        self.mem.write_u32(teb + teb::PROCESS_ID, PROCESS_ID)?;
        self.mem.write_u32(teb + teb::THREAD_ID, tid)?;
        self.mem.write_u32(teb + teb::PEB_POINTER, PEB_ADDR)
    }

    /// One TEB page per thread, allocated downwards from the main TEB.
    pub fn alloc_teb(&mut self, tid: ThreadId) -> MemResult<u32> {
        let teb = self.next_teb;
        if teb < TEB_FLOOR {
            return Err(MemError::OutOfMemory);
        }
        self.next_teb -= TEB_ALLOCATION_STEP;
        self.mem
            .alloc_region(teb, PAGE_SIZE, PageFlags::USER | PageFlags::WRITABLE)?;
        debug!("allocated TEB for thread {tid:#x} at {teb:#010x}");
        Ok(teb)
    }

    /// Carve a stack (plus an unmapped guard page below it) from the
    /// stack region, top down. Returns (base = top, limit = bottom).
    pub fn alloc_stack(&mut self, size: u32) -> MemResult<(u32, u32)> {
        let size = (size + (PAGE_SIZE - 1)) & !(PAGE_SIZE - 1);
        let total = size + PAGE_SIZE;
        if self.next_stack < STACK_REGION_BASE + total {
            return Err(MemError::OutOfMemory);
        }
        let top = self.next_stack;
        let bottom = top - size;
        self.next_stack = bottom - PAGE_SIZE;
        self.mem
            .alloc_region(bottom, size, PageFlags::USER | PageFlags::WRITABLE)?;
        debug!("allocated stack {bottom:#010x}..{top:#010x}");
        Ok((top, bottom))
    }

    pub fn now_100ns(&self) -> u64 {
        self.clock.now_100ns()
    }

    pub fn current_thread_id(&self) -> ThreadId {
        self.sched.current_thread_id().unwrap_or(MAIN_THREAD_ID)
    }

    pub fn request_exit(&mut self, status: u32) {
        self.cpu.request_exit(status);
    }

    /// SYSENTER hook entry.
    pub fn sysenter(&mut self) {
        crate::dispatch::sysenter(self);
    }

    /// Instruction-count tick: quantum accounting plus the timeout and
    /// timer sweeps. Also the dispatch point while the CPU is parked.
    pub fn tick(&mut self) {
        let now = self.clock.now_100ns();
        self.sched.tick(&mut self.cpu, now);
    }

    /// Drain host events; true when the user closed the window.
    pub fn pump_events(&mut self) -> bool {
        if self.display.poll_events() {
            self.quit_posted = true;
        }
        self.quit_posted
    }

    /// Mirror one handle's entry into the guest-visible GDI index page.
    pub fn sync_gdi_shared_entry(&mut self, handle: u32) {
        let Some(base) = self.gdi_shared_addr else {
            return;
        };
        let index = ntbox_abi::handle::gdi_handle_index(handle);
        if index >= ntbox_abi::gdi::MAX_SHARED_HANDLES {
            return;
        }
        let bytes = self.gdi.shared_entry(handle, PROCESS_ID as u16);
        let addr = base + (index * ntbox_abi::gdi::SHARED_ENTRY_SIZE) as u32;
        // The page is informational; translation faults just skip it.
        let _ = self.mem.write_bytes(addr, &bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntbox_gdi::HeadlessDisplay;

    fn vm() -> VmContext {
        VmContext::new(Box::new(HeadlessDisplay::new(640, 480).unwrap())).unwrap()
    }

    #[test]
    fn main_thread_is_materialized() {
        let vm = vm();
        let main = vm.sched.current_thread().unwrap();
        assert_eq!(main.id, MAIN_THREAD_ID);
        assert_eq!(main.state, ThreadState::Running);
        assert_eq!(vm.cpu.seg_fs.base, MAIN_TEB_ADDR);
        assert_eq!(vm.mem.read_u32(MAIN_TEB_ADDR + teb::SELF).unwrap(), MAIN_TEB_ADDR);
        assert_eq!(vm.mem.read_u32(MAIN_TEB_ADDR + teb::THREAD_ID).unwrap(), MAIN_THREAD_ID);
        assert_eq!(vm.mem.read_u32(MAIN_TEB_ADDR + teb::PEB_POINTER).unwrap(), PEB_ADDR);
    }

    #[test]
    fn stacks_grow_down_with_guard_gaps() {
        let mut vm = vm();
        let (top1, bottom1) = vm.alloc_stack(0x4000).unwrap();
        let (top2, _) = vm.alloc_stack(0x4000).unwrap();
        assert_eq!(top1, STACK_REGION_END);
        assert_eq!(top1 - bottom1, 0x4000);
        assert_eq!(top2, bottom1 - PAGE_SIZE, "guard page between stacks");
        // The guard page itself is unmapped.
        assert!(vm.mem.read_u8(bottom1 - 1).is_err());
        assert!(vm.mem.read_u8(bottom1).is_ok());
    }

    #[test]
    fn tebs_step_downwards() {
        let mut vm = vm();
        let a = vm.alloc_teb(0x1008).unwrap();
        let b = vm.alloc_teb(0x100C).unwrap();
        assert_eq!(a, MAIN_TEB_ADDR - TEB_ALLOCATION_STEP);
        assert_eq!(b, a - TEB_ALLOCATION_STEP);
    }
}
