//! Host stand-ins for the RTOS services an embedded MQTT client expects.

pub mod sync;

pub use sync::{ApiLock, EventGroup};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const DEFAULT_PLATFORM_SEED: u64 = 0x6d71_7474;

/// Clock, randomness and identifiers for one run.
///
/// Everything is derived from a fixed seed and a tick counter so two runs of
/// the same input behave identically.
#[derive(Debug)]
pub struct Platform {
    ticks: u64,
    rng: StdRng,
}

impl Default for Platform {
    fn default() -> Self {
        Self::with_seed(DEFAULT_PLATFORM_SEED)
    }
}

impl Platform {
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            ticks: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Advances and returns the millisecond tick; the first call returns 1.
    pub fn tick_ms(&mut self) -> u64 {
        self.ticks += 1;
        self.ticks
    }

    /// Current tick without advancing.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.ticks
    }

    /// Uniform value in `0..max`, or `0` when `max <= 0`.
    pub fn random(&mut self, max: i32) -> i32 {
        if max > 0 {
            self.rng.random_range(0..max)
        } else {
            0
        }
    }

    pub fn create_id_string(&mut self) -> String {
        format!("host_mqtt_{:08x}", self.rng.random::<u32>())
    }
}
