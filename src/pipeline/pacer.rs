//! Pacing between download starts
//!
//! Workers share one pacer so the batch as a whole never starts downloads
//! faster than the configured request delay, however many workers run.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub struct RequestPacer {
    min_delay: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RequestPacer {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            next_slot: Mutex::new(None),
        }
    }

    /// Waits until the next download may start and reserves the slot after it
    pub async fn wait(&self) {
        if self.min_delay.is_zero() {
            return;
        }

        let mut next_slot = self.next_slot.lock().await;
        let now = Instant::now();

        let start = match *next_slot {
            Some(slot) if slot > now => {
                tokio::time::sleep_until(slot).await;
                slot
            }
            _ => now,
        };

        *next_slot = Some(start + self.min_delay);
    }
}
