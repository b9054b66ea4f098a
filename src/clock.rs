// Copyright 2023, Antoine Catton
//
// Permission to use, copy, modify, and/or distribute this software for any purpose with or without
// fee is hereby granted, provided that the above copyright notice and this permission notice
// appear in all copies.
//
// THE SOFTWARE IS PROVIDED “AS IS” AND THE AUTHOR DISCLAIMS ALL WARRANTIES WITH REGARD TO THIS
// SOFTWARE INCLUDING ALL IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS. IN NO EVENT SHALL THE
// AUTHOR BE LIABLE FOR ANY SPECIAL, DIRECT, INDIRECT, OR CONSEQUENTIAL DAMAGES OR ANY DAMAGES
// WHATSOEVER RESULTING FROM LOSS OF USE, DATA OR PROFITS, WHETHER IN AN ACTION OF CONTRACT,
// NEGLIGENCE OR OTHER TORTIOUS ACTION, ARISING OUT OF OR IN CONNECTION WITH THE USE OR PERFORMANCE
// OF THIS SOFTWARE.

//! Injectable wall clock, so expiry timing is deterministic in tests.

use std::time::{SystemTime, UNIX_EPOCH};

/// Something that can report the current wall-clock time, in seconds
/// since the Unix epoch, as a float.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// The real clock, backed by `SystemTime::now()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before the Unix epoch")
            .as_secs_f64()
    }
}

#[cfg(test)]
pub mod test_support {
    use super::Clock;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// A clock tests can set to an arbitrary instant and advance freely.
    /// Stored as bits of an f64 so it can live in an `AtomicU64`.
    #[derive(Debug)]
    pub struct FakeClock {
        bits: AtomicU64,
    }

    impl FakeClock {
        pub fn new(start: f64) -> Self {
            FakeClock {
                bits: AtomicU64::new(start.to_bits()),
            }
        }

        pub fn set(&self, value: f64) {
            self.bits.store(value.to_bits(), Ordering::SeqCst);
        }

        pub fn advance(&self, delta: f64) {
            let current = f64::from_bits(self.bits.load(Ordering::SeqCst));
            self.set(current + delta);
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> f64 {
            f64::from_bits(self.bits.load(Ordering::SeqCst))
        }
    }
}
