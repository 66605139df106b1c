//! NTSTATUS values returned through the guest accumulator.

/// 32-bit NT status code.
///
/// Success/information codes have the top two bits clear; warning and error
/// codes carry severity `0b10`/`0b11` in bits 31..30. Wait results are plain
/// small integers (`WAIT_0 + index`), so this is a newtype rather than an
/// enum.
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct NtStatus(pub u32);

macro_rules! nt_status_values {
    ($($name:ident = $val:expr, $text:literal;)*) => {
        impl NtStatus {
            $(pub const $name: NtStatus = NtStatus($val);)*

            /// Symbolic name for diagnostics; wait/abandoned ranges collapse
            /// onto their base value.
            pub fn name(self) -> &'static str {
                match self.0 {
                    $($val => $text,)*
                    1..=63 => "STATUS_WAIT_N",
                    0x81..=0xBF => "STATUS_ABANDONED_WAIT_N",
                    _ => "STATUS_<unknown>",
                }
            }
        }
    };
}

nt_status_values! {
    SUCCESS                 = 0x0000_0000, "STATUS_SUCCESS";
    ABANDONED_WAIT_0        = 0x0000_0080, "STATUS_ABANDONED_WAIT_0";
    ALERTED                 = 0x0000_0101, "STATUS_ALERTED";
    TIMEOUT                 = 0x0000_0102, "STATUS_TIMEOUT";
    PENDING                 = 0x0000_0103, "STATUS_PENDING";
    UNSUCCESSFUL            = 0xC000_0001, "STATUS_UNSUCCESSFUL";
    NOT_IMPLEMENTED         = 0xC000_0002, "STATUS_NOT_IMPLEMENTED";
    INVALID_HANDLE          = 0xC000_0008, "STATUS_INVALID_HANDLE";
    INVALID_PARAMETER       = 0xC000_000D, "STATUS_INVALID_PARAMETER";
    END_OF_FILE             = 0xC000_0011, "STATUS_END_OF_FILE";
    NO_MEMORY               = 0xC000_0017, "STATUS_NO_MEMORY";
    ACCESS_DENIED           = 0xC000_0022, "STATUS_ACCESS_DENIED";
    BUFFER_TOO_SMALL        = 0xC000_0023, "STATUS_BUFFER_TOO_SMALL";
    OBJECT_TYPE_MISMATCH    = 0xC000_0024, "STATUS_OBJECT_TYPE_MISMATCH";
    OBJECT_NAME_INVALID     = 0xC000_0033, "STATUS_OBJECT_NAME_INVALID";
    OBJECT_NAME_NOT_FOUND   = 0xC000_0034, "STATUS_OBJECT_NAME_NOT_FOUND";
    OBJECT_NAME_COLLISION   = 0xC000_0035, "STATUS_OBJECT_NAME_COLLISION";
    OBJECT_PATH_INVALID     = 0xC000_0039, "STATUS_OBJECT_PATH_INVALID";
    MUTANT_NOT_OWNED        = 0xC000_0046, "STATUS_MUTANT_NOT_OWNED";
    SEMAPHORE_LIMIT_EXCEEDED = 0xC000_0047, "STATUS_SEMAPHORE_LIMIT_EXCEEDED";
    THREAD_IS_TERMINATING   = 0xC000_004B, "STATUS_THREAD_IS_TERMINATING";
    IO_DEVICE_ERROR         = 0xC000_0185, "STATUS_IO_DEVICE_ERROR";
}

impl NtStatus {
    pub const WAIT_0: NtStatus = NtStatus::SUCCESS;

    /// `WAIT_0 + index` for a satisfied multi-object wait.
    pub const fn wait(index: u32) -> NtStatus {
        NtStatus(index)
    }

    /// `ABANDONED_WAIT_0 + index` for a wait satisfied by an abandoned mutant.
    pub const fn abandoned_wait(index: u32) -> NtStatus {
        NtStatus(0x80 + index)
    }

    pub const fn is_success(self) -> bool {
        // Severity bits 31..30: 00 success, 01 informational.
        self.0 >> 30 <= 1
    }

    pub const fn is_error(self) -> bool {
        !self.is_success()
    }
}

impl From<NtStatus> for u32 {
    fn from(status: NtStatus) -> u32 {
        status.0
    }
}

/// Maximum object count for a multiple-object wait.
pub const MAX_WAIT_OBJECTS: usize = 64;

/// Wait type for NtWaitForMultipleObjects.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum WaitType {
    /// Wait until every object is signaled.
    All = 0,
    /// Wait until any one object is signaled.
    Any = 1,
}

impl WaitType {
    pub fn from_raw(raw: u32) -> Option<WaitType> {
        match raw {
            0 => Some(WaitType::All),
            1 => Some(WaitType::Any),
            _ => None,
        }
    }
}

/// File operation results reported in IO_STATUS_BLOCK.Information.
pub const FILE_SUPERSEDED: u32 = 0;
pub const FILE_OPENED: u32 = 1;
pub const FILE_CREATED: u32 = 2;
pub const FILE_OVERWRITTEN: u32 = 3;

/// CreateDisposition values for NtCreateFile.
pub const FILE_DISP_SUPERSEDE: u32 = 0;
pub const FILE_DISP_OPEN: u32 = 1;
pub const FILE_DISP_CREATE: u32 = 2;
pub const FILE_DISP_OPEN_IF: u32 = 3;
pub const FILE_DISP_OVERWRITE: u32 = 4;
pub const FILE_DISP_OVERWRITE_IF: u32 = 5;
