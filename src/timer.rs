//! Clock supplied by the calling code

use embedded_hal::blocking::delay::DelayMs;

/// Polling granularity of every blocking wait, in milliseconds
pub const POLL_INTERVAL_MS: u32 = 1;

/// Monotonic millisecond clock with a blocking delay
pub trait Timer: DelayMs<u32> {
    /// Milliseconds since an arbitrary fixed origin
    fn now_ms(&mut self) -> u64;
}

/// Block until the clock reaches `deadline`
pub(crate) fn wait_until<T: Timer>(timer: &mut T, deadline: u64) {
    loop {
        let now = timer.now_ms();
        if now >= deadline {
            return;
        }
        let remaining = (deadline - now).min(u32::MAX as u64) as u32;
        timer.delay_ms(remaining);
    }
}
