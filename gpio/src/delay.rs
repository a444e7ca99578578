//! Blocking delays used to honor the timing of attached peripherals.
use std::fmt::Debug;
use std::thread::sleep;
use std::time::Duration;

/// A blocking delay provider.
///
/// Implementations must block the calling thread for *at least* the requested time. Drivers only
/// ever rely on the lower bound, so oversleeping is harmless.
pub trait Delay: Debug {
    /// Blocks for the given amount of microseconds.
    fn delay_us(&self, us: u32);

    /// Blocks for the given amount of milliseconds.
    fn delay_ms(&self, ms: u32) {
        self.delay_us(ms.saturating_mul(1000));
    }
}

/// [Delay] backed by [std::thread::sleep].
#[derive(Copy, Clone, Debug, Default)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay_us(&self, us: u32) {
        sleep(Duration::from_micros(us as u64));
    }

    fn delay_ms(&self, ms: u32) {
        sleep(Duration::from_millis(ms as u64));
    }
}
