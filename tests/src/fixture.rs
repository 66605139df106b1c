//! The VM fixture.

use ntbox_gdi::HeadlessDisplay;
use ntbox_kernel::VmContext;

/// Scratch area carved out of the guest heap region for out-parameters.
pub struct VmFixture {
    pub vm: VmContext,
}

impl VmFixture {
    pub fn new() -> VmFixture {
        let display = HeadlessDisplay::new(640, 480).expect("display size is valid");
        let vm = VmContext::new(Box::new(display)).expect("vm setup");
        VmFixture { vm }
    }

    /// A guest scratch buffer for handler out-parameters.
    pub fn scratch(&mut self, bytes: u32) -> u32 {
        self.vm.heap.alloc(bytes).expect("guest heap has room")
    }

    fn arg_base(&self) -> u32 {
        // Well below the current thread's stack top, well above its limit.
        let thread = self.vm.sched.current_thread().expect("a thread is running");
        thread.stack_base - 0x400
    }

    /// Issue an NT-band syscall: two return addresses above the argument
    /// block, number in EAX. Returns the accumulator after dispatch;
    /// for a blocking call that is the *next* thread's state.
    pub fn nt_call(&mut self, num: u32, args: &[u32]) -> u32 {
        let esp = self.arg_base();
        for (i, &arg) in args.iter().enumerate() {
            self.vm
                .mem
                .write_u32(esp + 8 + i as u32 * 4, arg)
                .expect("argument block is mapped");
        }
        self.vm.cpu.esp = esp;
        self.vm.cpu.eax = num;
        self.vm.sysenter();
        self.vm.cpu.eax
    }

    /// Issue a Win32k-band syscall (one return address above the args).
    pub fn w32_call(&mut self, num: u32, args: &[u32]) -> u32 {
        let esp = self.arg_base();
        for (i, &arg) in args.iter().enumerate() {
            self.vm
                .mem
                .write_u32(esp + 4 + i as u32 * 4, arg)
                .expect("argument block is mapped");
        }
        self.vm.cpu.esp = esp;
        self.vm.cpu.eax = num;
        self.vm.sysenter();
        self.vm.cpu.eax
    }

    /// Write a relative-millisecond timeout LARGE_INTEGER into guest
    /// scratch and return its address.
    pub fn relative_timeout_ms(&mut self, ms: u32) -> u32 {
        let ptr = self.scratch(8);
        let interval = -((ms as i64) * 10_000);
        self.vm
            .mem
            .write_u64(ptr, interval as u64)
            .expect("scratch is mapped");
        ptr
    }
}

impl Default for VmFixture {
    fn default() -> Self {
        VmFixture::new()
    }
}
