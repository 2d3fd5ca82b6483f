//! App-relative millisecond clock
//!
//! The engine takes timestamps as arguments; only the runtime and CLI read
//! the clock.

use crate::core::Millis;
use std::sync::OnceLock;
use std::time::Instant;

/// Milliseconds since the first call in this process
pub fn now_millis() -> Millis {
    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_millis() as Millis
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_is_monotonic() {
        let a = now_millis();
        let b = now_millis();
        assert!(b >= a);
    }
}
