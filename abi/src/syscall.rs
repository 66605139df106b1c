//! Syscall numbers shared with the guest-side thunks.
//!
//! The NT band is the Windows Server 2003 ordering (0..296). The Win32k
//! band starts at [`WIN32K_BASE`] and is numbered by this project; the
//! guest thunks are generated from the same table, so the exact values
//! carry no outside compatibility requirement. Two reserved bands above
//! 0xFFE0 are pseudo-syscalls used by the guest runtime.

macro_rules! syscall_numbers {
    ($table:ident, $lookup:ident, $base:expr; $($name:ident = $num:expr;)*) => {
        #[allow(non_upper_case_globals)]
        pub mod $table {
            #[allow(unused_imports)]
            use super::*;
            $(pub const $name: u32 = $base + $num;)*
        }

        /// Symbolic name for diagnostics on unknown or traced numbers.
        pub fn $lookup(num: u32) -> &'static str {
            match num.wrapping_sub($base) {
                $($num => stringify!($name),)*
                _ => "<unknown>",
            }
        }
    };
}

syscall_numbers! { nt, nt_syscall_name, 0;
    NtAcceptConnectPort = 0;
    NtAlertResumeThread = 13;
    NtAlertThread = 14;
    NtAllocateVirtualMemory = 18;
    NtCancelTimer = 25;
    NtClearEvent = 26;
    NtClose = 27;
    NtCreateEvent = 37;
    NtCreateFile = 39;
    NtCreateMutant = 45;
    NtCreateSemaphore = 53;
    NtCreateThread = 55;
    NtCreateTimer = 56;
    NtDelayExecution = 61;
    NtDuplicateObject = 71;
    NtFreeVirtualMemory = 87;
    NtOpenEvent = 120;
    NtOpenFile = 122;
    NtOpenMutant = 126;
    NtOpenSemaphore = 132;
    NtOpenTimer = 137;
    NtPulseEvent = 144;
    NtQueryEvent = 155;
    NtQueryInformationFile = 158;
    NtQueryInformationProcess = 161;
    NtQueryInformationThread = 162;
    NtQueryMutant = 169;
    NtQueryPerformanceCounter = 173;
    NtQuerySemaphore = 177;
    NtQuerySystemTime = 182;
    NtReadFile = 191;
    NtReleaseMutant = 196;
    NtReleaseSemaphore = 197;
    NtResetEvent = 210;
    NtResumeThread = 214;
    NtSetEvent = 228;
    NtSetInformationFile = 233;
    NtSetTimer = 253;
    NtTerminateProcess = 266;
    NtTerminateThread = 267;
    NtTestAlert = 268;
    NtWaitForMultipleObjects = 280;
    NtWaitForSingleObject = 281;
    NtWriteFile = 284;
    NtYieldExecution = 288;
}

/// Count of NT service numbers in this build's table.
pub const NT_SYSCALL_COUNT: u32 = 296;

/// Win32k numbers live in their own band above the NT table.
pub const WIN32K_BASE: u32 = 0x1000;

syscall_numbers! { win32k, win32k_syscall_name, WIN32K_BASE;
    NtGdiInit = 0;
    NtGdiGetStockObject = 1;
    NtGdiOpenDCW = 2;
    NtGdiCreateCompatibleDC = 3;
    NtGdiDeleteObjectApp = 4;
    NtGdiSelectBrush = 5;
    NtGdiSelectPen = 6;
    NtGdiSelectFont = 7;
    NtGdiSelectBitmap = 8;
    NtGdiSelectObject = 9;
    NtGdiGetAndSetDCDword = 10;
    NtGdiGetDCPoint = 11;
    NtGdiGetDCObject = 12;
    NtGdiGetDeviceCaps = 13;
    NtGdiSaveDC = 14;
    NtGdiRestoreDC = 15;
    NtGdiSetBrushOrg = 16;
    NtGdiCreateSolidBrush = 17;
    NtGdiCreatePatternBrush = 18;
    NtGdiCreatePen = 19;
    NtGdiHfontCreate = 20;
    NtGdiCreateBitmap = 21;
    NtGdiCreateCompatibleBitmap = 22;
    NtGdiCreateRectRgn = 23;
    NtGdiSetRectRgn = 24;
    NtGdiCombineRgn = 25;
    NtGdiGetRgnBox = 26;
    NtGdiEqualRgn = 27;
    NtGdiPatBlt = 28;
    NtGdiBitBlt = 29;
    NtGdiStretchBlt = 30;
    NtGdiRectangle = 31;
    NtGdiMoveTo = 32;
    NtGdiLineTo = 33;
    NtGdiPolyline = 34;
    NtGdiPolygon = 35;
    NtGdiSetPixel = 36;
    NtGdiGetPixel = 37;
    NtGdiFillRgn = 38;
    NtGdiFrameRgn = 39;
    NtGdiInvertRgn = 40;
    NtGdiPaintRgn = 41;
    NtGdiExtGetObjectW = 42;
    NtGdiFlush = 43;
    NtUserGetDC = 64;
    NtUserGetDCEx = 65;
    NtUserGetWindowDC = 66;
    NtUserReleaseDC = 67;
    NtUserBeginPaint = 68;
    NtUserEndPaint = 69;
    NtUserInvalidateRect = 70;
    NtUserFillWindow = 71;
    NtUserSelectPalette = 72;
    NtUserCallNoParam = 73;
    NtUserCallOneParam = 74;
    NtUserCallTwoParam = 75;
    NtUserGetThreadState = 76;
    NtUserPostQuitMessage = 77;
    NtUserGetMessage = 78;
    NtUserPeekMessage = 79;
}

/// Pseudo-syscalls used by the guest runtime thunks (§dispatcher): ordinary
/// entries as far as routing is concerned.
pub mod pseudo {
    /// RtlMultiByteToUnicodeN
    pub const MBSTR_TO_UNICODE: u32 = 0xFFE0;
    /// RtlUnicodeToMultiByteN
    pub const UNICODE_TO_MBSTR: u32 = 0xFFE1;
    /// RtlMultiByteToUnicodeSize
    pub const MBSTR_SIZE: u32 = 0xFFE2;
    /// RtlUnicodeToMultiByteSize
    pub const UNICODE_SIZE: u32 = 0xFFE3;

    /// RtlAllocateHeap
    pub const HEAP_ALLOC: u32 = 0xFFF0;
    /// RtlFreeHeap
    pub const HEAP_FREE: u32 = 0xFFF1;
    /// RtlReAllocateHeap
    pub const HEAP_REALLOC: u32 = 0xFFF2;
    /// RtlSizeHeap
    pub const HEAP_SIZE: u32 = 0xFFF3;

    /// DLL entry points finished running.
    pub const IMAGE_INIT_DONE: u32 = 0xFFFE;
}

/// Classified routing band for a raw syscall number.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SyscallBand {
    Nt(u32),
    Win32k(u32),
    Pseudo(u32),
}

pub fn classify(num: u32) -> SyscallBand {
    match num {
        0xFFE0..=0xFFE3 | 0xFFF0..=0xFFF3 | 0xFFFE => SyscallBand::Pseudo(num),
        n if n >= WIN32K_BASE => SyscallBand::Win32k(n),
        n => SyscallBand::Nt(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_route_correctly() {
        assert_eq!(classify(nt::NtClose), SyscallBand::Nt(27));
        assert_eq!(
            classify(win32k::NtGdiBitBlt),
            SyscallBand::Win32k(WIN32K_BASE + 29)
        );
        assert_eq!(
            classify(pseudo::HEAP_ALLOC),
            SyscallBand::Pseudo(pseudo::HEAP_ALLOC)
        );
        assert_eq!(
            classify(pseudo::IMAGE_INIT_DONE),
            SyscallBand::Pseudo(pseudo::IMAGE_INIT_DONE)
        );
    }

    #[test]
    fn names_resolve() {
        assert_eq!(nt_syscall_name(nt::NtWaitForSingleObject), "NtWaitForSingleObject");
        assert_eq!(win32k_syscall_name(win32k::NtUserGetDC), "NtUserGetDC");
        assert_eq!(nt_syscall_name(0xBEEF), "<unknown>");
    }
}
