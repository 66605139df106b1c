//! File access masks and open flags shared with the guest.

use bitflags::bitflags;

bitflags! {
    /// Access mask bits relevant to the file syscalls.
    #[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
    pub struct FileAccess: u32 {
        const FILE_READ_DATA        = 0x0000_0001;
        const FILE_WRITE_DATA       = 0x0000_0002;
        const FILE_APPEND_DATA      = 0x0000_0004;
        const FILE_READ_EA          = 0x0000_0008;
        const FILE_WRITE_EA         = 0x0000_0010;
        const FILE_EXECUTE          = 0x0000_0020;
        const FILE_READ_ATTRIBUTES  = 0x0000_0080;
        const FILE_WRITE_ATTRIBUTES = 0x0000_0100;
        const GENERIC_ALL           = 0x1000_0000;
        const GENERIC_EXECUTE       = 0x2000_0000;
        const GENERIC_WRITE         = 0x4000_0000;
        const GENERIC_READ          = 0x8000_0000;
    }
}

impl FileAccess {
    pub fn wants_read(self) -> bool {
        self.intersects(FileAccess::GENERIC_READ | FileAccess::GENERIC_ALL | FileAccess::FILE_READ_DATA)
    }

    pub fn wants_write(self) -> bool {
        self.intersects(
            FileAccess::GENERIC_WRITE
                | FileAccess::GENERIC_ALL
                | FileAccess::FILE_WRITE_DATA
                | FileAccess::FILE_APPEND_DATA,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_bits_imply_direction() {
        assert!(FileAccess::GENERIC_READ.wants_read());
        assert!(!FileAccess::GENERIC_READ.wants_write());
        assert!(FileAccess::GENERIC_WRITE.wants_write());
        assert!(FileAccess::GENERIC_ALL.wants_read() && FileAccess::GENERIC_ALL.wants_write());
        assert!(FileAccess::FILE_APPEND_DATA.wants_write());
    }
}
