//! Host monotonic time in NT 100-nanosecond units.

use std::time::Instant;

/// Wait deadlines and timer due times are measured against this clock.
/// The origin is process start, so values are small and never zero is
/// only returned at the exact first instant; callers that use `0` as
/// "infinite" are unaffected in practice because block/arm paths always
/// run after startup.
pub struct Clock {
    origin: Instant,
}

impl Clock {
    pub fn new() -> Clock {
        Clock { origin: Instant::now() }
    }

    pub fn now_100ns(&self) -> u64 {
        let elapsed = self.origin.elapsed();
        elapsed.as_secs() * 10_000_000 + u64::from(elapsed.subsec_nanos()) / 100
    }
}

impl Default for Clock {
    fn default() -> Self {
        Clock::new()
    }
}

/// Milliseconds to 100 ns units.
pub const fn ms_to_100ns(ms: u32) -> u64 {
    ms as u64 * 10_000
}
